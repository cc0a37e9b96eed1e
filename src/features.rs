use crate::battle::{resolve, ResolveError, Resolution, Side};
use crate::model::{Move, Pokemon};
use crate::scenario::ScenarioType;
use crate::types::TypeChart;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bumped whenever a column is added, removed, renamed or reordered.
pub const FEATURE_SCHEMA_VERSION: &str = "v2";

/// Categorical value used when a Pokémon has a single type.
pub const NO_TYPE: &str = "none";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ColumnKind {
    /// Traceability only; never fed to the model.
    Identity,
    Numeric,
    Categorical,
    /// Battle outcome. Binary, and never part of the feature set.
    Label,
}

pub const COLUMNS: [(&str, ColumnKind); 41] = [
    ("pokemon_a_id", ColumnKind::Identity),
    ("pokemon_b_id", ColumnKind::Identity),
    ("move_a_name", ColumnKind::Identity),
    ("move_b_name", ColumnKind::Identity),
    ("a_hp", ColumnKind::Numeric),
    ("a_attack", ColumnKind::Numeric),
    ("a_defense", ColumnKind::Numeric),
    ("a_special_attack", ColumnKind::Numeric),
    ("a_special_defense", ColumnKind::Numeric),
    ("a_speed", ColumnKind::Numeric),
    ("b_hp", ColumnKind::Numeric),
    ("b_attack", ColumnKind::Numeric),
    ("b_defense", ColumnKind::Numeric),
    ("b_special_attack", ColumnKind::Numeric),
    ("b_special_defense", ColumnKind::Numeric),
    ("b_speed", ColumnKind::Numeric),
    ("a_type_1", ColumnKind::Categorical),
    ("a_type_2", ColumnKind::Categorical),
    ("b_type_1", ColumnKind::Categorical),
    ("b_type_2", ColumnKind::Categorical),
    ("move_a_power", ColumnKind::Numeric),
    ("move_a_type", ColumnKind::Categorical),
    ("move_a_priority", ColumnKind::Numeric),
    ("move_a_stab", ColumnKind::Numeric),
    ("move_a_type_multiplier", ColumnKind::Numeric),
    ("move_a_effective_power", ColumnKind::Numeric),
    ("move_b_power", ColumnKind::Numeric),
    ("move_b_type", ColumnKind::Categorical),
    ("move_b_priority", ColumnKind::Numeric),
    ("move_b_stab", ColumnKind::Numeric),
    ("move_b_type_multiplier", ColumnKind::Numeric),
    ("move_b_effective_power", ColumnKind::Numeric),
    ("speed_diff", ColumnKind::Numeric),
    ("hp_diff", ColumnKind::Numeric),
    ("a_total_stats", ColumnKind::Numeric),
    ("b_total_stats", ColumnKind::Numeric),
    ("a_moves_first", ColumnKind::Numeric),
    ("winner", ColumnKind::Label),
    ("scenario_type", ColumnKind::Categorical),
    ("knockout", ColumnKind::Label),
    ("schema_version", ColumnKind::Categorical),
];

pub fn column_names() -> Vec<&'static str> {
    COLUMNS.iter().map(|(name, _)| *name).collect()
}

/// Columns a model may train on: everything except identity and label columns.
pub fn feature_columns() -> Vec<&'static str> {
    COLUMNS
        .iter()
        .filter(|(_, kind)| matches!(kind, ColumnKind::Numeric | ColumnKind::Categorical))
        .map(|(name, _)| *name)
        .collect()
}

pub fn column_kind(name: &str) -> Option<ColumnKind> {
    COLUMNS
        .iter()
        .find(|(column, _)| *column == name)
        .map(|(_, kind)| *kind)
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// `(pokemon_a_id, pokemon_b_id, move_a_name, move_b_name)`.
pub type CompositeKey = (u32, u32, String, String);

/// One labelled training row. Field order is the artifact column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSample {
    pub pokemon_a_id: u32,
    pub pokemon_b_id: u32,
    pub move_a_name: String,
    pub move_b_name: String,
    pub a_hp: u32,
    pub a_attack: u32,
    pub a_defense: u32,
    pub a_special_attack: u32,
    pub a_special_defense: u32,
    pub a_speed: u32,
    pub b_hp: u32,
    pub b_attack: u32,
    pub b_defense: u32,
    pub b_special_attack: u32,
    pub b_special_defense: u32,
    pub b_speed: u32,
    pub a_type_1: String,
    pub a_type_2: String,
    pub b_type_1: String,
    pub b_type_2: String,
    pub move_a_power: u32,
    pub move_a_type: String,
    pub move_a_priority: i32,
    pub move_a_stab: f32,
    pub move_a_type_multiplier: f32,
    pub move_a_effective_power: f32,
    pub move_b_power: u32,
    pub move_b_type: String,
    pub move_b_priority: i32,
    pub move_b_stab: f32,
    pub move_b_type_multiplier: f32,
    pub move_b_effective_power: f32,
    pub speed_diff: i32,
    pub hp_diff: i32,
    pub a_total_stats: u32,
    pub b_total_stats: u32,
    pub a_moves_first: u8,
    pub winner: u8,
    pub scenario_type: ScenarioType,
    pub knockout: u8,
    pub schema_version: String,
}

impl BattleSample {
    pub fn composite_key(&self) -> CompositeKey {
        (
            self.pokemon_a_id,
            self.pokemon_b_id,
            self.move_a_name.clone(),
            self.move_b_name.clone(),
        )
    }

    /// Cells in [`COLUMNS`] order, formatted the way the artifact stores them.
    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.pokemon_a_id.to_string(),
            self.pokemon_b_id.to_string(),
            self.move_a_name.clone(),
            self.move_b_name.clone(),
            self.a_hp.to_string(),
            self.a_attack.to_string(),
            self.a_defense.to_string(),
            self.a_special_attack.to_string(),
            self.a_special_defense.to_string(),
            self.a_speed.to_string(),
            self.b_hp.to_string(),
            self.b_attack.to_string(),
            self.b_defense.to_string(),
            self.b_special_attack.to_string(),
            self.b_special_defense.to_string(),
            self.b_speed.to_string(),
            self.a_type_1.clone(),
            self.a_type_2.clone(),
            self.b_type_1.clone(),
            self.b_type_2.clone(),
            self.move_a_power.to_string(),
            self.move_a_type.clone(),
            self.move_a_priority.to_string(),
            self.move_a_stab.to_string(),
            self.move_a_type_multiplier.to_string(),
            self.move_a_effective_power.to_string(),
            self.move_b_power.to_string(),
            self.move_b_type.clone(),
            self.move_b_priority.to_string(),
            self.move_b_stab.to_string(),
            self.move_b_type_multiplier.to_string(),
            self.move_b_effective_power.to_string(),
            self.speed_diff.to_string(),
            self.hp_diff.to_string(),
            self.a_total_stats.to_string(),
            self.b_total_stats.to_string(),
            self.a_moves_first.to_string(),
            self.winner.to_string(),
            self.scenario_type.to_string(),
            self.knockout.to_string(),
            self.schema_version.clone(),
        ]
    }
}

fn type_slot(type_name: Option<&str>) -> String {
    type_name
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| NO_TYPE.to_string())
}

/// Resolves the exchange and flattens everything into one row.
pub fn encode(
    chart: &TypeChart,
    a: &Pokemon,
    move_a: &Move,
    b: &Pokemon,
    move_b: &Move,
    scenario: ScenarioType,
) -> Result<BattleSample, EncodeError> {
    let resolution = resolve(chart, a, move_a, b, move_b)?;
    Ok(encode_resolved(a, move_a, b, move_b, &resolution, scenario))
}

/// Row construction from an existing [`Resolution`]; no lookups, cannot fail.
pub fn encode_resolved(
    a: &Pokemon,
    move_a: &Move,
    b: &Pokemon,
    move_b: &Move,
    resolution: &Resolution,
    scenario: ScenarioType,
) -> BattleSample {
    let attack_a = resolution.attack(Side::A);
    let attack_b = resolution.attack(Side::B);
    BattleSample {
        pokemon_a_id: a.id,
        pokemon_b_id: b.id,
        move_a_name: move_a.name.clone(),
        move_b_name: move_b.name.clone(),
        a_hp: a.stats.hp,
        a_attack: a.stats.attack,
        a_defense: a.stats.defense,
        a_special_attack: a.stats.special_attack,
        a_special_defense: a.stats.special_defense,
        a_speed: a.stats.speed,
        b_hp: b.stats.hp,
        b_attack: b.stats.attack,
        b_defense: b.stats.defense,
        b_special_attack: b.stats.special_attack,
        b_special_defense: b.stats.special_defense,
        b_speed: b.stats.speed,
        a_type_1: a.primary_type().to_ascii_lowercase(),
        a_type_2: type_slot(a.secondary_type()),
        b_type_1: b.primary_type().to_ascii_lowercase(),
        b_type_2: type_slot(b.secondary_type()),
        move_a_power: move_a.power_value(),
        move_a_type: move_a.move_type.to_ascii_lowercase(),
        move_a_priority: move_a.priority,
        move_a_stab: attack_a.stab,
        move_a_type_multiplier: attack_a.type_multiplier,
        move_a_effective_power: attack_a.effective_power,
        move_b_power: move_b.power_value(),
        move_b_type: move_b.move_type.to_ascii_lowercase(),
        move_b_priority: move_b.priority,
        move_b_stab: attack_b.stab,
        move_b_type_multiplier: attack_b.type_multiplier,
        move_b_effective_power: attack_b.effective_power,
        speed_diff: a.stats.speed as i32 - b.stats.speed as i32,
        hp_diff: a.stats.hp as i32 - b.stats.hp as i32,
        a_total_stats: a.stats.total(),
        b_total_stats: b.stats.total(),
        a_moves_first: u8::from(resolution.a_moves_first()),
        winner: u8::from(resolution.a_wins()),
        scenario_type: scenario,
        knockout: u8::from(resolution.knockout),
        schema_version: FEATURE_SCHEMA_VERSION.to_string(),
    }
}
