//! Structural gate run on both splits before a dataset may be published.
//!
//! The checks run on string tables rather than typed rows so the exact same
//! gate applies to freshly built data and to artifacts read back from disk.

use crate::features::{
    column_kind, column_names, BattleSample, ColumnKind, FEATURE_SCHEMA_VERSION, NO_TYPE,
};
use crate::model::{MAX_MOVE_POWER, MAX_STAT};
use crate::scenario::ScenarioType;
use crate::types::{combined_multipliers, PokemonType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

pub const MIN_CLASS_SHARE: f64 = 0.30;
pub const MAX_CLASS_SHARE: f64 = 0.70;

const SIDES: [&str; 2] = ["a", "b"];
const STAT_COLUMNS: [&str; 6] = [
    "hp",
    "attack",
    "defense",
    "special_attack",
    "special_defense",
    "speed",
];
const KEY_COLUMNS: [&str; 4] = ["pokemon_a_id", "pokemon_b_id", "move_a_name", "move_b_name"];
const BINARY_COLUMNS: [&str; 3] = ["winner", "a_moves_first", "knockout"];
const TYPE_COLUMNS: [&str; 6] = [
    "a_type_1",
    "a_type_2",
    "b_type_1",
    "b_type_2",
    "move_a_type",
    "move_b_type",
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => f.write_str("train"),
            Split::Test => f.write_str("test"),
        }
    }
}

/// A split as header + rows of raw cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub split: Split,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_samples(split: Split, samples: &[BattleSample]) -> Self {
        Table {
            split,
            headers: column_names().into_iter().map(str::to_string).collect(),
            rows: samples.iter().map(BattleSample::to_record).collect(),
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn cell(&self, row: usize, column: usize) -> &str {
        self.rows[row].get(column).map(String::as_str).unwrap_or("")
    }

    fn number(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.column(column)?;
        self.cell(row, idx).parse().ok()
    }

    fn key(&self, row: usize, columns: &[usize]) -> Vec<String> {
        columns
            .iter()
            .map(|&idx| self.cell(row, idx).to_string())
            .collect()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    ColumnSet,
    SchemaMismatch,
    RowShape,
    MissingValue,
    NumericType,
    CategoricalValue,
    StatRange,
    PowerRange,
    StabValue,
    TypeMultiplier,
    BinaryValue,
    DerivedIdentity,
    EmptySplit,
    ClassBalance,
    DuplicateRatio,
    KeyOverlap,
    PairOverlap,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Check::ColumnSet => "column_set",
            Check::SchemaMismatch => "schema_mismatch",
            Check::RowShape => "row_shape",
            Check::MissingValue => "missing_value",
            Check::NumericType => "numeric_type",
            Check::CategoricalValue => "categorical_value",
            Check::StatRange => "stat_range",
            Check::PowerRange => "power_range",
            Check::StabValue => "stab_value",
            Check::TypeMultiplier => "type_multiplier",
            Check::BinaryValue => "binary_value",
            Check::DerivedIdentity => "derived_identity",
            Check::EmptySplit => "empty_split",
            Check::ClassBalance => "class_balance",
            Check::DuplicateRatio => "duplicate_ratio",
            Check::KeyOverlap => "key_overlap",
            Check::PairOverlap => "pair_overlap",
        };
        f.write_str(name)
    }
}

/// One failed invariant. Row-level failures of the same kind on the same
/// column are folded into a single entry that keeps the first offending row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub split: Option<Split>,
    pub check: Check,
    pub column: Option<String>,
    pub row: Option<usize>,
    pub affected_rows: usize,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.check)?;
        if let Some(split) = self.split {
            write!(f, " split={split}")?;
        }
        if let Some(column) = &self.column {
            write!(f, " column={column}")?;
        }
        if let Some(row) = self.row {
            write!(f, " row={row}")?;
        }
        if self.affected_rows > 1 {
            write!(f, " (+{} more rows)", self.affected_rows - 1)?;
        }
        write!(f, ": {}", self.detail)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dataset failed {} invariant check(s)", self.violations.len())?;
        if let Some(first) = self.violations.first() {
            write!(f, "; first: {first}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn find(&self, check: Check) -> Option<&Violation> {
        self.violations.iter().find(|v| v.check == check)
    }

    pub fn affected_rows(&self) -> usize {
        self.violations.iter().map(|v| v.affected_rows).sum()
    }
}

/// Per-policy ceilings; `all_combinations` and `all` tolerate more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    pub min_class_share: f64,
    pub max_class_share: f64,
    pub max_duplicate_ratio: f64,
    pub max_key_overlap: f64,
    /// Ceiling on test Pokémon pairs also seen in train with other moves.
    /// `best_move` emits one key per ordered pair, so any overlap there is
    /// leakage. Multi-move policies split by key and keep such pairs.
    pub max_pair_overlap: f64,
}

impl ValidationPolicy {
    pub fn for_scenario(scenario: ScenarioType) -> Self {
        let (max_duplicate_ratio, max_key_overlap, max_pair_overlap) = match scenario {
            ScenarioType::BestMove => (0.01, 0.0, 0.0),
            ScenarioType::RandomMove => (0.01, 0.0, 1.0),
            ScenarioType::AllCombinations | ScenarioType::All => (0.05, 0.02, 1.0),
        };
        ValidationPolicy {
            min_class_share: MIN_CLASS_SHARE,
            max_class_share: MAX_CLASS_SHARE,
            max_duplicate_ratio,
            max_key_overlap,
            max_pair_overlap,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetrics {
    pub train_winner_share: f64,
    pub test_winner_share: f64,
    pub train_duplicate_ratio: f64,
    pub test_duplicate_ratio: f64,
    /// Share of test composite keys that also occur in train.
    pub key_overlap_ratio: f64,
    /// Share of test (pokemon_a_id, pokemon_b_id) pairs that also occur in train.
    pub pair_overlap_ratio: f64,
}

fn winner_share(table: &Table) -> f64 {
    let Some(idx) = table.column("winner") else {
        return 0.0;
    };
    if table.is_empty() {
        return 0.0;
    }
    let wins = (0..table.len())
        .filter(|&row| table.cell(row, idx) == "1")
        .count();
    wins as f64 / table.len() as f64
}

/// Rows identical to an earlier row on every column except the scenario tag.
fn duplicate_ratio(table: &Table) -> f64 {
    if table.is_empty() {
        return 0.0;
    }
    let skip = table.column("scenario_type");
    let mut seen: HashSet<Vec<&str>> = HashSet::with_capacity(table.len());
    let mut duplicates = 0usize;
    for row in &table.rows {
        let cells: Vec<&str> = row
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != skip)
            .map(|(_, cell)| cell.as_str())
            .collect();
        if !seen.insert(cells) {
            duplicates += 1;
        }
    }
    duplicates as f64 / table.len() as f64
}

fn overlap_ratio(train: &Table, test: &Table, columns: &[&str]) -> f64 {
    let train_cols: Option<Vec<usize>> = columns.iter().map(|c| train.column(c)).collect();
    let test_cols: Option<Vec<usize>> = columns.iter().map(|c| test.column(c)).collect();
    let (Some(train_cols), Some(test_cols)) = (train_cols, test_cols) else {
        return 0.0;
    };
    let train_keys: HashSet<Vec<String>> = (0..train.len())
        .map(|row| train.key(row, &train_cols))
        .collect();
    let test_keys: HashSet<Vec<String>> = (0..test.len())
        .map(|row| test.key(row, &test_cols))
        .collect();
    if test_keys.is_empty() {
        return 0.0;
    }
    let shared = test_keys.iter().filter(|k| train_keys.contains(*k)).count();
    shared as f64 / test_keys.len() as f64
}

pub fn metrics(train: &Table, test: &Table) -> DatasetMetrics {
    DatasetMetrics {
        train_winner_share: winner_share(train),
        test_winner_share: winner_share(test),
        train_duplicate_ratio: duplicate_ratio(train),
        test_duplicate_ratio: duplicate_ratio(test),
        key_overlap_ratio: overlap_ratio(train, test, &KEY_COLUMNS),
        pair_overlap_ratio: overlap_ratio(train, test, &KEY_COLUMNS[..2]),
    }
}

#[derive(Default)]
struct Collector {
    violations: Vec<Violation>,
    index: HashMap<(Option<Split>, Check, Option<String>), usize>,
}

impl Collector {
    fn table(&mut self, split: Option<Split>, check: Check, detail: String) {
        self.violations.push(Violation {
            split,
            check,
            column: None,
            row: None,
            affected_rows: 0,
            detail,
        });
    }

    fn row(&mut self, split: Split, check: Check, column: &str, row: usize, detail: impl FnOnce() -> String) {
        let key = (Some(split), check, Some(column.to_string()));
        if let Some(&idx) = self.index.get(&key) {
            self.violations[idx].affected_rows += 1;
            return;
        }
        self.index.insert(key, self.violations.len());
        self.violations.push(Violation {
            split: Some(split),
            check,
            column: Some(column.to_string()),
            row: Some(row),
            affected_rows: 1,
            detail: detail(),
        });
    }
}

fn check_columns(table: &Table, out: &mut Collector) -> bool {
    let expected = column_names();
    if table.headers.iter().map(String::as_str).eq(expected.iter().copied()) {
        return true;
    }
    let present: HashSet<&str> = table.headers.iter().map(String::as_str).collect();
    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|c| !present.contains(c))
        .collect();
    let extra: Vec<&str> = table
        .headers
        .iter()
        .map(String::as_str)
        .filter(|c| column_kind(c).is_none())
        .collect();
    out.table(
        Some(table.split),
        Check::ColumnSet,
        format!("columns differ from schema {FEATURE_SCHEMA_VERSION}: missing {missing:?}, unexpected {extra:?}"),
    );
    false
}

fn check_cells(table: &Table, out: &mut Collector) {
    let split = table.split;
    let headers = &table.headers;
    let multipliers = combined_multipliers();
    for (row_idx, row) in table.rows.iter().enumerate() {
        if row.len() != headers.len() {
            out.row(split, Check::RowShape, "*", row_idx, || {
                format!("expected {} cells, found {}", headers.len(), row.len())
            });
            continue;
        }
        for (column, cell) in headers.iter().zip(row) {
            let kind = column_kind(column).unwrap_or(ColumnKind::Categorical);
            if cell.trim().is_empty() {
                out.row(split, Check::MissingValue, column, row_idx, || {
                    "empty value".to_string()
                });
                continue;
            }
            if matches!(kind, ColumnKind::Numeric | ColumnKind::Label) && cell.parse::<f64>().map_or(true, |v| !v.is_finite()) {
                out.row(split, Check::NumericType, column, row_idx, || {
                    format!("`{cell}` is not numeric")
                });
            }
        }

        for side in SIDES {
            for stat in STAT_COLUMNS {
                let column = format!("{side}_{stat}");
                if let Some(value) = table.number(row_idx, &column) {
                    if value <= 0.0 || value > f64::from(MAX_STAT) || value.fract() != 0.0 {
                        out.row(split, Check::StatRange, &column, row_idx, || {
                            format!("{value} is outside (0, {MAX_STAT}]")
                        });
                    }
                }
            }
            let power_col = format!("move_{side}_power");
            if let Some(value) = table.number(row_idx, &power_col) {
                if !(0.0..=f64::from(MAX_MOVE_POWER)).contains(&value) {
                    out.row(split, Check::PowerRange, &power_col, row_idx, || {
                        format!("{value} is outside [0, {MAX_MOVE_POWER}]")
                    });
                }
            }
            let stab_col = format!("move_{side}_stab");
            if let Some(value) = table.number(row_idx, &stab_col) {
                if value != 1.0 && value != 1.5 {
                    out.row(split, Check::StabValue, &stab_col, row_idx, || {
                        format!("{value} is neither 1.0 nor 1.5")
                    });
                }
            }
            let mult_col = format!("move_{side}_type_multiplier");
            if let Some(value) = table.number(row_idx, &mult_col) {
                if !multipliers.contains(&value) {
                    out.row(split, Check::TypeMultiplier, &mult_col, row_idx, || {
                        format!("{value} is not a type-chart product")
                    });
                }
            }
            let eff_col = format!("move_{side}_effective_power");
            if let (Some(power), Some(stab), Some(mult), Some(eff)) = (
                table.number(row_idx, &power_col),
                table.number(row_idx, &stab_col),
                table.number(row_idx, &mult_col),
                table.number(row_idx, &eff_col),
            ) {
                if power * stab * mult != eff {
                    out.row(split, Check::DerivedIdentity, &eff_col, row_idx, || {
                        format!("{eff} != {power} * {stab} * {mult}")
                    });
                }
            }
            let total_col = format!("{side}_total_stats");
            let stats: Option<Vec<f64>> = STAT_COLUMNS
                .iter()
                .map(|stat| table.number(row_idx, &format!("{side}_{stat}")))
                .collect();
            if let (Some(stats), Some(total)) = (stats, table.number(row_idx, &total_col)) {
                let sum: f64 = stats.iter().sum();
                if sum != total {
                    out.row(split, Check::DerivedIdentity, &total_col, row_idx, || {
                        format!("{total} != sum of six stats ({sum})")
                    });
                }
            }
        }

        for (diff_col, stat) in [("speed_diff", "speed"), ("hp_diff", "hp")] {
            if let (Some(diff), Some(a), Some(b)) = (
                table.number(row_idx, diff_col),
                table.number(row_idx, &format!("a_{stat}")),
                table.number(row_idx, &format!("b_{stat}")),
            ) {
                if diff != a - b {
                    out.row(split, Check::DerivedIdentity, diff_col, row_idx, || {
                        format!("{diff} != a_{stat} - b_{stat} ({})", a - b)
                    });
                }
            }
        }

        if let (Some(flag), Some(prio_a), Some(prio_b), Some(speed_a), Some(speed_b), Some(id_a), Some(id_b)) = (
            table.number(row_idx, "a_moves_first"),
            table.number(row_idx, "move_a_priority"),
            table.number(row_idx, "move_b_priority"),
            table.number(row_idx, "a_speed"),
            table.number(row_idx, "b_speed"),
            table.number(row_idx, "pokemon_a_id"),
            table.number(row_idx, "pokemon_b_id"),
        ) {
            // Same precedence as battle::turn_order: priority, speed, lower id.
            let b_first = prio_b
                .total_cmp(&prio_a)
                .then_with(|| speed_b.total_cmp(&speed_a))
                .then_with(|| id_a.total_cmp(&id_b))
                == Ordering::Greater;
            let expected = if b_first { 0.0 } else { 1.0 };
            if (flag == 0.0 || flag == 1.0) && flag != expected {
                out.row(split, Check::DerivedIdentity, "a_moves_first", row_idx, || {
                    format!("{flag} contradicts priority/speed turn order ({expected})")
                });
            }
        }

        for column in BINARY_COLUMNS {
            if let Some(value) = table.number(row_idx, column) {
                if value != 0.0 && value != 1.0 {
                    out.row(split, Check::BinaryValue, column, row_idx, || {
                        format!("{value} is not 0 or 1")
                    });
                }
            }
        }

        for column in TYPE_COLUMNS {
            let Some(idx) = table.column(column) else {
                continue;
            };
            let value = table.cell(row_idx, idx);
            let optional = column.ends_with("_type_2");
            let valid = PokemonType::from_name(value).is_ok() || (optional && value == NO_TYPE);
            if !value.is_empty() && !valid {
                out.row(split, Check::CategoricalValue, column, row_idx, || {
                    format!("`{value}` is not a known type")
                });
            }
        }
        if let Some(idx) = table.column("scenario_type") {
            let value = table.cell(row_idx, idx);
            let valid = matches!(
                value.parse::<ScenarioType>(),
                Ok(s) if s != ScenarioType::All
            );
            if !value.is_empty() && !valid {
                out.row(split, Check::CategoricalValue, "scenario_type", row_idx, || {
                    format!("`{value}` is not a sampling policy")
                });
            }
        }
        if let Some(idx) = table.column("schema_version") {
            let value = table.cell(row_idx, idx);
            if !value.is_empty() && value != FEATURE_SCHEMA_VERSION {
                out.row(split, Check::CategoricalValue, "schema_version", row_idx, || {
                    format!("`{value}` != {FEATURE_SCHEMA_VERSION}")
                });
            }
        }
    }
}

fn check_split(table: &Table, policy: &ValidationPolicy, out: &mut Collector) {
    if !check_columns(table, out) {
        return;
    }
    if table.is_empty() {
        out.table(Some(table.split), Check::EmptySplit, "split has no rows".to_string());
        return;
    }
    check_cells(table, out);

    let share = winner_share(table);
    for (label, label_share) in [("1", share), ("0", 1.0 - share)] {
        if label_share < policy.min_class_share || label_share > policy.max_class_share {
            out.table(
                Some(table.split),
                Check::ClassBalance,
                format!(
                    "winner={label} share {label_share:.3} outside [{:.2}, {:.2}]",
                    policy.min_class_share, policy.max_class_share
                ),
            );
            break;
        }
    }
    let duplicates = duplicate_ratio(table);
    if duplicates > policy.max_duplicate_ratio {
        out.table(
            Some(table.split),
            Check::DuplicateRatio,
            format!(
                "duplicate ratio {duplicates:.4} > {:.4}",
                policy.max_duplicate_ratio
            ),
        );
    }
}

/// Runs every check on both splits and returns the observed metrics, or
/// every violation found.
pub fn validate(
    train: &Table,
    test: &Table,
    policy: &ValidationPolicy,
) -> Result<DatasetMetrics, ValidationError> {
    let mut out = Collector::default();
    check_split(train, policy, &mut out);
    check_split(test, policy, &mut out);
    if train.headers != test.headers {
        out.table(
            None,
            Check::SchemaMismatch,
            "train and test headers differ".to_string(),
        );
    }
    let observed = metrics(train, test);
    if observed.key_overlap_ratio > policy.max_key_overlap {
        out.table(
            None,
            Check::KeyOverlap,
            format!(
                "composite-key overlap {:.4} > {:.4}",
                observed.key_overlap_ratio, policy.max_key_overlap
            ),
        );
    }
    if observed.pair_overlap_ratio > policy.max_pair_overlap {
        out.table(
            None,
            Check::PairOverlap,
            format!(
                "pokemon-pair overlap {:.4} > {:.4}",
                observed.pair_overlap_ratio, policy.max_pair_overlap
            ),
        );
    }
    if out.violations.is_empty() {
        Ok(observed)
    } else {
        Err(ValidationError {
            violations: out.violations,
        })
    }
}
