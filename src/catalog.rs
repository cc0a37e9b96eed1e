use crate::model::{LearnsetRecord, Move, Pokemon, RecordError, Stats};
use crate::retry::with_retry;
use crate::source::{DataSource, LearnsetRow, MoveRow, PokemonRow, SourceError};
use crate::types::{ChartError, TypeChart};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("invalid type effectiveness table: {0}")]
    Chart(#[from] ChartError),
    #[error("data source contains no usable pokemon")]
    NoPokemon,
}

/// Rows dropped while turning source rows into catalog entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    pub malformed_rows: usize,
    pub rejected_pokemon: usize,
    pub rejected_moves: usize,
    pub rejected_learnsets: usize,
    pub unknown_learnset_refs: usize,
}

/// Immutable snapshot of every entity a build reads.
///
/// Constructed once per run and shared by reference; nothing here is
/// mutated after construction.
#[derive(Debug, Clone)]
pub struct Catalog {
    chart: TypeChart,
    pokemon: Vec<Pokemon>,
    pokemon_index: HashMap<u32, usize>,
    moves: HashMap<String, Move>,
    learnsets: HashMap<u32, Vec<String>>,
    stats: LoadStats,
}

fn move_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl Catalog {
    pub fn new(
        chart: TypeChart,
        pokemon: Vec<Pokemon>,
        moves: Vec<Move>,
        learnsets: Vec<LearnsetRecord>,
    ) -> Self {
        let mut stats = LoadStats::default();
        Self::assemble(chart, pokemon, moves, learnsets, &mut stats)
    }

    fn assemble(
        chart: TypeChart,
        pokemon: Vec<Pokemon>,
        moves: Vec<Move>,
        learnsets: Vec<LearnsetRecord>,
        stats: &mut LoadStats,
    ) -> Self {
        let mut by_id: BTreeMap<u32, Pokemon> = BTreeMap::new();
        for p in pokemon {
            if by_id.contains_key(&p.id) {
                warn!(id = p.id, name = %p.name, "duplicate pokemon id, keeping first");
                stats.rejected_pokemon += 1;
                continue;
            }
            by_id.insert(p.id, p);
        }
        let pokemon: Vec<Pokemon> = by_id.into_values().collect();
        let pokemon_index = pokemon
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.id, idx))
            .collect::<HashMap<_, _>>();

        let mut move_map: HashMap<String, Move> = HashMap::new();
        for m in moves {
            let key = move_key(&m.name);
            if move_map.contains_key(&key) {
                warn!(name = %m.name, "duplicate move name, keeping first");
                stats.rejected_moves += 1;
                continue;
            }
            move_map.insert(key, m);
        }

        let mut grouped: HashMap<u32, BTreeSet<String>> = HashMap::new();
        for record in learnsets {
            let key = move_key(record.move_name());
            if !pokemon_index.contains_key(&record.pokemon_id()) || !move_map.contains_key(&key) {
                stats.unknown_learnset_refs += 1;
                continue;
            }
            grouped.entry(record.pokemon_id()).or_default().insert(key);
        }
        if stats.unknown_learnset_refs > 0 {
            warn!(
                count = stats.unknown_learnset_refs,
                "learnset rows reference unknown pokemon or moves"
            );
        }
        let learnsets = grouped
            .into_iter()
            .map(|(id, names)| (id, names.into_iter().collect()))
            .collect();

        Catalog {
            chart,
            pokemon,
            pokemon_index,
            moves: move_map,
            learnsets,
            stats: stats.clone(),
        }
    }

    /// Reads every table from `source`, retrying transient failures, and
    /// rejects (never coerces) rows that fail validation.
    pub fn load(source: &dyn DataSource, retries: u32) -> Result<Self, CatalogError> {
        let mut stats = LoadStats::default();

        let chart_rows = with_retry(retries, "reading type effectiveness", || {
            source.type_effectiveness()
        })?;
        stats.malformed_rows += chart_rows.malformed;
        let chart = TypeChart::from_entries(&chart_rows.rows)?;

        let pokemon_rows = with_retry(retries, "reading pokemon", || source.pokemon())?;
        stats.malformed_rows += pokemon_rows.malformed;
        let pokemon: Vec<Pokemon> = pokemon_rows
            .rows
            .into_iter()
            .filter_map(|row| match pokemon_from_row(row) {
                Ok(p) => Some(p),
                Err(err) => {
                    warn!(%err, "rejecting pokemon row");
                    stats.rejected_pokemon += 1;
                    None
                }
            })
            .collect();
        if pokemon.is_empty() {
            return Err(CatalogError::NoPokemon);
        }

        let move_rows = with_retry(retries, "reading moves", || source.moves())?;
        stats.malformed_rows += move_rows.malformed;
        let moves: Vec<Move> = move_rows
            .rows
            .into_iter()
            .filter_map(|row| match move_from_row(row) {
                Ok(m) => Some(m),
                Err(err) => {
                    warn!(%err, "rejecting move row");
                    stats.rejected_moves += 1;
                    None
                }
            })
            .collect();

        let learnset_rows = with_retry(retries, "reading learnsets", || source.learnsets())?;
        stats.malformed_rows += learnset_rows.malformed;
        let learnsets: Vec<LearnsetRecord> = learnset_rows
            .rows
            .into_iter()
            .filter_map(|row| match learnset_from_row(&row) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(%err, pokemon_id = row.pokemon_id, "rejecting learnset row");
                    stats.rejected_learnsets += 1;
                    None
                }
            })
            .collect();

        let catalog = Self::assemble(chart, pokemon, moves, learnsets, &mut stats);
        info!(
            pokemon = catalog.pokemon.len(),
            moves = catalog.moves.len(),
            learnsets = catalog.learnsets.len(),
            rejected_pokemon = stats.rejected_pokemon,
            rejected_moves = stats.rejected_moves,
            rejected_learnsets = stats.rejected_learnsets,
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn chart(&self) -> &TypeChart {
        &self.chart
    }

    /// All Pokémon, ordered by id.
    pub fn pokemon(&self) -> &[Pokemon] {
        &self.pokemon
    }

    pub fn get_pokemon(&self, id: u32) -> Option<&Pokemon> {
        self.pokemon_index.get(&id).map(|&idx| &self.pokemon[idx])
    }

    pub fn get_move(&self, name: &str) -> Option<&Move> {
        self.moves.get(&move_key(name))
    }

    /// Damaging moves `pokemon_id` can learn, ordered by name.
    pub fn offensive_moves(&self, pokemon_id: u32) -> Vec<&Move> {
        self.learnsets
            .get(&pokemon_id)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| self.moves.get(name))
                    .filter(|m| m.is_offensive())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn load_stats(&self) -> &LoadStats {
        &self.stats
    }
}

fn pokemon_from_row(row: PokemonRow) -> Result<Pokemon, RecordError> {
    let mut types = vec![row.type_1];
    if let Some(second) = row.type_2.filter(|t| !t.trim().is_empty()) {
        types.push(second);
    }
    Pokemon::new(
        row.id,
        &row.name,
        types,
        Stats {
            hp: row.hp,
            attack: row.attack,
            defense: row.defense,
            special_attack: row.special_attack,
            special_defense: row.special_defense,
            speed: row.speed,
        },
    )
}

fn move_from_row(row: MoveRow) -> Result<Move, RecordError> {
    Move::new(
        &row.name,
        &row.move_type,
        row.category,
        row.power,
        row.priority,
    )
}

fn learnset_from_row(row: &LearnsetRow) -> Result<LearnsetRecord, RecordError> {
    LearnsetRecord::new(
        row.pokemon_id,
        &row.move_name,
        &row.learn_method,
        row.learn_level,
    )
}
