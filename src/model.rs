use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MAX_STAT: u32 = 255;
pub const MAX_MOVE_POWER: u32 = 250;
pub const MAX_LEVEL: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("pokemon {pokemon}: stat {stat} = {value} is outside (0, 255]")]
    StatOutOfRange {
        pokemon: String,
        stat: &'static str,
        value: u32,
    },
    #[error("pokemon {pokemon}: expected 1 or 2 types, got {count}")]
    TypeCount { pokemon: String, count: usize },
    #[error("pokemon id must be positive, got {0}")]
    InvalidPokemonId(i64),
    #[error("move {name}: power {power} exceeds 250")]
    PowerOutOfRange { name: String, power: u32 },
    #[error("move name must not be empty")]
    EmptyMoveName,
    #[error("unknown learn method `{0}`")]
    UnknownLearnMethod(String),
    #[error("{method} learnset entry for {move_name} requires a level")]
    MissingLevel {
        method: LearnMethod,
        move_name: String,
    },
    #[error("{method} learnset entry for {move_name} must not carry a level")]
    UnexpectedLevel {
        method: LearnMethod,
        move_name: String,
    },
    #[error("learn level {0} is outside 1..=100")]
    LevelOutOfRange(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveCategory {
    Physical,
    Special,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Stats {
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub special_attack: u32,
    pub special_defense: u32,
    pub speed: u32,
}

impl Stats {
    pub const NAMES: [&'static str; 6] = [
        "hp",
        "attack",
        "defense",
        "special_attack",
        "special_defense",
        "speed",
    ];

    pub fn values(&self) -> [u32; 6] {
        [
            self.hp,
            self.attack,
            self.defense,
            self.special_attack,
            self.special_defense,
            self.speed,
        ]
    }

    pub fn total(&self) -> u32 {
        self.values().iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Pokemon {
    pub id: u32,
    pub name: String,
    pub types: Vec<String>,
    pub stats: Stats,
}

impl Pokemon {
    pub fn new(id: u32, name: &str, types: Vec<String>, stats: Stats) -> Result<Self, RecordError> {
        if id == 0 {
            return Err(RecordError::InvalidPokemonId(0));
        }
        if types.is_empty() || types.len() > 2 {
            return Err(RecordError::TypeCount {
                pokemon: name.to_string(),
                count: types.len(),
            });
        }
        for (stat, value) in Stats::NAMES.into_iter().zip(stats.values()) {
            if value == 0 || value > MAX_STAT {
                return Err(RecordError::StatOutOfRange {
                    pokemon: name.to_string(),
                    stat,
                    value,
                });
            }
        }
        Ok(Pokemon {
            id,
            name: name.to_string(),
            types,
            stats,
        })
    }

    pub fn primary_type(&self) -> &str {
        self.types.first().map(String::as_str).unwrap_or_default()
    }

    pub fn secondary_type(&self) -> Option<&str> {
        self.types.get(1).map(String::as_str)
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.iter().any(|t| t.eq_ignore_ascii_case(type_name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Move {
    pub name: String,
    #[serde(rename = "type")]
    pub move_type: String,
    pub category: MoveCategory,
    #[serde(default)]
    pub power: Option<u32>,
    #[serde(default)]
    pub priority: i32,
}

impl Move {
    pub fn new(
        name: &str,
        move_type: &str,
        category: MoveCategory,
        power: Option<u32>,
        priority: i32,
    ) -> Result<Self, RecordError> {
        if name.trim().is_empty() {
            return Err(RecordError::EmptyMoveName);
        }
        if let Some(power) = power {
            if power > MAX_MOVE_POWER {
                return Err(RecordError::PowerOutOfRange {
                    name: name.to_string(),
                    power,
                });
            }
        }
        Ok(Move {
            name: name.to_string(),
            move_type: move_type.to_string(),
            category,
            power,
            priority,
        })
    }

    pub fn power_value(&self) -> u32 {
        self.power.unwrap_or(0)
    }

    /// Damaging moves only: status moves never enter battle resolution.
    pub fn is_offensive(&self) -> bool {
        self.power_value() > 0 && self.category != MoveCategory::Status
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnMethod {
    LevelUp,
    Machine,
    Tutor,
    Egg,
}

impl LearnMethod {
    pub fn requires_level(self) -> bool {
        matches!(self, LearnMethod::LevelUp)
    }
}

impl fmt::Display for LearnMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LearnMethod::LevelUp => "level_up",
            LearnMethod::Machine => "machine",
            LearnMethod::Tutor => "tutor",
            LearnMethod::Egg => "egg",
        };
        f.write_str(name)
    }
}

impl FromStr for LearnMethod {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "level_up" | "level-up" | "levelup" | "level" => Ok(LearnMethod::LevelUp),
            "machine" | "tm" | "hm" => Ok(LearnMethod::Machine),
            "tutor" => Ok(LearnMethod::Tutor),
            "egg" => Ok(LearnMethod::Egg),
            other => Err(RecordError::UnknownLearnMethod(other.to_string())),
        }
    }
}

/// A learnset association as delivered by batch ingestion (scraped or seeded).
///
/// Only constructible through [`LearnsetRecord::new`], which rejects rather
/// than coerces malformed input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearnsetRecord {
    pokemon_id: u32,
    move_name: String,
    learn_method: LearnMethod,
    learn_level: Option<u8>,
}

impl LearnsetRecord {
    pub fn new(
        pokemon_id: i64,
        move_name: &str,
        learn_method: &str,
        learn_level: Option<i64>,
    ) -> Result<Self, RecordError> {
        let id = u32::try_from(pokemon_id)
            .ok()
            .filter(|id| *id > 0)
            .ok_or(RecordError::InvalidPokemonId(pokemon_id))?;
        let move_name = move_name.trim();
        if move_name.is_empty() {
            return Err(RecordError::EmptyMoveName);
        }
        let method: LearnMethod = learn_method.parse()?;
        let level = match (method.requires_level(), learn_level) {
            (true, None) => {
                return Err(RecordError::MissingLevel {
                    method,
                    move_name: move_name.to_string(),
                })
            }
            (false, Some(_)) => {
                return Err(RecordError::UnexpectedLevel {
                    method,
                    move_name: move_name.to_string(),
                })
            }
            (_, Some(level)) => {
                if !(1..=MAX_LEVEL).contains(&level) {
                    return Err(RecordError::LevelOutOfRange(level));
                }
                Some(level as u8)
            }
            (false, None) => None,
        };
        Ok(LearnsetRecord {
            pokemon_id: id,
            move_name: move_name.to_string(),
            learn_method: method,
            learn_level: level,
        })
    }

    pub fn pokemon_id(&self) -> u32 {
        self.pokemon_id
    }

    pub fn move_name(&self) -> &str {
        &self.move_name
    }

    pub fn learn_method(&self) -> LearnMethod {
        self.learn_method
    }

    pub fn learn_level(&self) -> Option<u8> {
        self.learn_level
    }
}
