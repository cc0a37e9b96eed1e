use crate::model::MoveCategory;
use crate::retry::Transient;
use crate::types::TypeEffectivenessRow;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

pub const POKEMON_FILE: &str = "pokemon.csv";
pub const MOVES_FILE: &str = "moves.csv";
pub const TYPE_EFFECTIVENESS_FILE: &str = "type_effectiveness.csv";
pub const LEARNSETS_FILE: &str = "learnsets.csv";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl Transient for SourceError {
    fn is_transient(&self) -> bool {
        match self {
            SourceError::Io { source, .. } => source.is_transient(),
            SourceError::Csv { source, .. } => match source.kind() {
                csv::ErrorKind::Io(err) => err.is_transient(),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PokemonRow {
    pub id: u32,
    pub name: String,
    pub type_1: String,
    #[serde(default)]
    pub type_2: Option<String>,
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub special_attack: u32,
    pub special_defense: u32,
    pub speed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MoveRow {
    pub name: String,
    #[serde(rename = "type")]
    pub move_type: String,
    pub category: MoveCategory,
    #[serde(default)]
    pub power: Option<u32>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LearnsetRow {
    pub pokemon_id: i64,
    pub move_name: String,
    pub learn_method: String,
    #[serde(default)]
    pub learn_level: Option<i64>,
}

/// Rows read from one table, plus how many lines could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Rows<T> {
    pub rows: Vec<T>,
    pub malformed: usize,
}

/// Read-only access to the relational entities the builder needs.
pub trait DataSource: Sync {
    fn pokemon(&self) -> Result<Rows<PokemonRow>, SourceError>;
    fn moves(&self) -> Result<Rows<MoveRow>, SourceError>;
    fn type_effectiveness(&self) -> Result<Rows<TypeEffectivenessRow>, SourceError>;
    fn learnsets(&self) -> Result<Rows<LearnsetRow>, SourceError>;
}

/// A directory of CSV seed tables, one file per entity.
#[derive(Debug, Clone)]
pub struct CsvSeedSource {
    dir: PathBuf,
}

impl CsvSeedSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_table<T: DeserializeOwned>(&self, file: &str) -> Result<Rows<T>, SourceError> {
        let path = self.dir.join(file);
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|source| SourceError::Csv {
                path: path.clone(),
                source,
            })?;
        let mut rows = Vec::new();
        let mut malformed = 0usize;
        for (line, record) in reader.deserialize::<T>().enumerate() {
            match record {
                Ok(row) => rows.push(row),
                Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => {
                    return Err(SourceError::Csv { path, source: err });
                }
                Err(err) => {
                    malformed += 1;
                    warn!(file, line = line + 2, %err, "rejecting malformed row");
                }
            }
        }
        debug!(file, rows = rows.len(), malformed, "read seed table");
        Ok(Rows { rows, malformed })
    }
}

impl DataSource for CsvSeedSource {
    fn pokemon(&self) -> Result<Rows<PokemonRow>, SourceError> {
        self.read_table(POKEMON_FILE)
    }

    fn moves(&self) -> Result<Rows<MoveRow>, SourceError> {
        self.read_table(MOVES_FILE)
    }

    fn type_effectiveness(&self) -> Result<Rows<TypeEffectivenessRow>, SourceError> {
        self.read_table(TYPE_EFFECTIVENESS_FILE)
    }

    fn learnsets(&self) -> Result<Rows<LearnsetRow>, SourceError> {
        self.read_table(LEARNSETS_FILE)
    }
}
