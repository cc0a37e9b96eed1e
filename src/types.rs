// Ref: pokemon-showdown/data/typechart.ts: gen 6+ chart (18 types, Fairy included).
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const TYPE_COUNT: usize = 18;

/// Every multiplier a single chart cell may hold.
pub const CHART_MULTIPLIERS: [f32; 6] = [0.0, 0.25, 0.5, 1.0, 2.0, 4.0];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown type `{name}`")]
pub struct UnknownTypeError {
    pub name: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum PokemonType {
    Normal,
    Fire,
    Water,
    Electric,
    Grass,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

static TYPE_NAMES: phf::Map<&'static str, PokemonType> = phf::phf_map! {
    "normal" => PokemonType::Normal,
    "fire" => PokemonType::Fire,
    "water" => PokemonType::Water,
    "electric" => PokemonType::Electric,
    "grass" => PokemonType::Grass,
    "ice" => PokemonType::Ice,
    "fighting" => PokemonType::Fighting,
    "poison" => PokemonType::Poison,
    "ground" => PokemonType::Ground,
    "flying" => PokemonType::Flying,
    "psychic" => PokemonType::Psychic,
    "bug" => PokemonType::Bug,
    "rock" => PokemonType::Rock,
    "ghost" => PokemonType::Ghost,
    "dragon" => PokemonType::Dragon,
    "dark" => PokemonType::Dark,
    "steel" => PokemonType::Steel,
    "fairy" => PokemonType::Fairy,
};

impl PokemonType {
    pub const ALL: [PokemonType; TYPE_COUNT] = [
        PokemonType::Normal,
        PokemonType::Fire,
        PokemonType::Water,
        PokemonType::Electric,
        PokemonType::Grass,
        PokemonType::Ice,
        PokemonType::Fighting,
        PokemonType::Poison,
        PokemonType::Ground,
        PokemonType::Flying,
        PokemonType::Psychic,
        PokemonType::Bug,
        PokemonType::Rock,
        PokemonType::Ghost,
        PokemonType::Dragon,
        PokemonType::Dark,
        PokemonType::Steel,
        PokemonType::Fairy,
    ];

    pub fn from_name(name: &str) -> Result<PokemonType, UnknownTypeError> {
        let key = name.trim().to_ascii_lowercase();
        TYPE_NAMES
            .get(key.as_str())
            .copied()
            .ok_or_else(|| UnknownTypeError {
                name: name.to_string(),
            })
    }

    pub fn name(self) -> &'static str {
        match self {
            PokemonType::Normal => "normal",
            PokemonType::Fire => "fire",
            PokemonType::Water => "water",
            PokemonType::Electric => "electric",
            PokemonType::Grass => "grass",
            PokemonType::Ice => "ice",
            PokemonType::Fighting => "fighting",
            PokemonType::Poison => "poison",
            PokemonType::Ground => "ground",
            PokemonType::Flying => "flying",
            PokemonType::Psychic => "psychic",
            PokemonType::Bug => "bug",
            PokemonType::Rock => "rock",
            PokemonType::Ghost => "ghost",
            PokemonType::Dragon => "dragon",
            PokemonType::Dark => "dark",
            PokemonType::Steel => "steel",
            PokemonType::Fairy => "fairy",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PokemonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PokemonType {
    type Err = UnknownTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PokemonType::from_name(s)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error(transparent)]
    UnknownType(#[from] UnknownTypeError),
    #[error("multiplier {multiplier} for {attacking} -> {defending} is not a chart value")]
    InvalidMultiplier {
        attacking: PokemonType,
        defending: PokemonType,
        multiplier: f32,
    },
    #[error("conflicting multipliers for {attacking} -> {defending}: {first} and {second}")]
    Conflict {
        attacking: PokemonType,
        defending: PokemonType,
        first: f32,
        second: f32,
    },
    #[error("type chart is missing {missing} pairs (first: {attacking} -> {defending})")]
    Incomplete {
        missing: usize,
        attacking: PokemonType,
        defending: PokemonType,
    },
}

/// One row of a type-effectiveness table as exposed by a data source.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TypeEffectivenessRow {
    pub attacking_type: String,
    pub defending_type: String,
    pub multiplier: f32,
}

/// Immutable attacking × defending multiplier matrix over the closed type set.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeChart {
    multipliers: [[f32; TYPE_COUNT]; TYPE_COUNT],
}

impl TypeChart {
    pub fn standard() -> Self {
        let mut multipliers = [[1.0; TYPE_COUNT]; TYPE_COUNT];
        for atk in PokemonType::ALL {
            for def in PokemonType::ALL {
                multipliers[atk.index()][def.index()] = standard_multiplier(atk, def);
            }
        }
        TypeChart { multipliers }
    }

    /// Builds a chart from data-source rows. Every ordered pair must be present.
    pub fn from_entries<'a, I>(rows: I) -> Result<Self, ChartError>
    where
        I: IntoIterator<Item = &'a TypeEffectivenessRow>,
    {
        let mut cells: [[Option<f32>; TYPE_COUNT]; TYPE_COUNT] = [[None; TYPE_COUNT]; TYPE_COUNT];
        for row in rows {
            let atk = PokemonType::from_name(&row.attacking_type)?;
            let def = PokemonType::from_name(&row.defending_type)?;
            if !is_chart_multiplier(row.multiplier) {
                return Err(ChartError::InvalidMultiplier {
                    attacking: atk,
                    defending: def,
                    multiplier: row.multiplier,
                });
            }
            let cell = &mut cells[atk.index()][def.index()];
            match *cell {
                Some(existing) if existing != row.multiplier => {
                    return Err(ChartError::Conflict {
                        attacking: atk,
                        defending: def,
                        first: existing,
                        second: row.multiplier,
                    });
                }
                _ => *cell = Some(row.multiplier),
            }
        }

        let mut multipliers = [[1.0; TYPE_COUNT]; TYPE_COUNT];
        let mut first_missing = None;
        let mut missing = 0usize;
        for atk in PokemonType::ALL {
            for def in PokemonType::ALL {
                match cells[atk.index()][def.index()] {
                    Some(value) => multipliers[atk.index()][def.index()] = value,
                    None => {
                        missing += 1;
                        first_missing.get_or_insert((atk, def));
                    }
                }
            }
        }
        if let Some((attacking, defending)) = first_missing {
            return Err(ChartError::Incomplete {
                missing,
                attacking,
                defending,
            });
        }
        Ok(TypeChart { multipliers })
    }

    pub fn multiplier(&self, attacking: PokemonType, defending: PokemonType) -> f32 {
        self.multipliers[attacking.index()][defending.index()]
    }

    pub fn effectiveness(&self, attacking: &str, defending: &str) -> Result<f32, UnknownTypeError> {
        let atk = PokemonType::from_name(attacking)?;
        let def = PokemonType::from_name(defending)?;
        Ok(self.multiplier(atk, def))
    }

    /// Product over every defending type; not clamped (a 4.0 × 4.0 stack stays 16.0).
    pub fn effectiveness_against<S: AsRef<str>>(
        &self,
        attacking: &str,
        defending: &[S],
    ) -> Result<f32, UnknownTypeError> {
        let atk = PokemonType::from_name(attacking)?;
        let mut multiplier = 1.0;
        for t in defending {
            let def = PokemonType::from_name(t.as_ref())?;
            multiplier *= self.multiplier(atk, def);
        }
        Ok(multiplier)
    }

    pub fn rows(&self) -> Vec<TypeEffectivenessRow> {
        let mut rows = Vec::with_capacity(TYPE_COUNT * TYPE_COUNT);
        for atk in PokemonType::ALL {
            for def in PokemonType::ALL {
                rows.push(TypeEffectivenessRow {
                    attacking_type: atk.name().to_string(),
                    defending_type: def.name().to_string(),
                    multiplier: self.multiplier(atk, def),
                });
            }
        }
        rows
    }
}

pub fn is_chart_multiplier(value: f32) -> bool {
    CHART_MULTIPLIERS.contains(&value)
}

/// Values a dual-type product of chart cells can take.
pub fn combined_multipliers() -> Vec<f64> {
    let mut values: Vec<f64> = Vec::new();
    for a in CHART_MULTIPLIERS {
        for b in CHART_MULTIPLIERS {
            let product = f64::from(a) * f64::from(b);
            if !values.contains(&product) {
                values.push(product);
            }
        }
    }
    values.sort_by(f64::total_cmp);
    values
}

fn standard_multiplier(attacking: PokemonType, defending: PokemonType) -> f32 {
    use PokemonType::*;
    match attacking {
        Normal => match defending {
            Rock | Steel => 0.5,
            Ghost => 0.0,
            _ => 1.0,
        },
        Fire => match defending {
            Fire | Water | Rock | Dragon => 0.5,
            Grass | Ice | Bug | Steel => 2.0,
            _ => 1.0,
        },
        Water => match defending {
            Water | Grass | Dragon => 0.5,
            Fire | Ground | Rock => 2.0,
            _ => 1.0,
        },
        Electric => match defending {
            Electric | Grass | Dragon => 0.5,
            Water | Flying => 2.0,
            Ground => 0.0,
            _ => 1.0,
        },
        Grass => match defending {
            Fire | Grass | Poison | Flying | Bug | Dragon | Steel => 0.5,
            Water | Ground | Rock => 2.0,
            _ => 1.0,
        },
        Ice => match defending {
            Fire | Water | Ice | Steel => 0.5,
            Grass | Ground | Flying | Dragon => 2.0,
            _ => 1.0,
        },
        Fighting => match defending {
            Normal | Ice | Rock | Dark | Steel => 2.0,
            Poison | Flying | Psychic | Bug | Fairy => 0.5,
            Ghost => 0.0,
            _ => 1.0,
        },
        Poison => match defending {
            Grass | Fairy => 2.0,
            Poison | Ground | Rock | Ghost => 0.5,
            Steel => 0.0,
            _ => 1.0,
        },
        Ground => match defending {
            Fire | Electric | Poison | Rock | Steel => 2.0,
            Grass | Bug => 0.5,
            Flying => 0.0,
            _ => 1.0,
        },
        Flying => match defending {
            Grass | Fighting | Bug => 2.0,
            Electric | Rock | Steel => 0.5,
            _ => 1.0,
        },
        Psychic => match defending {
            Fighting | Poison => 2.0,
            Psychic | Steel => 0.5,
            Dark => 0.0,
            _ => 1.0,
        },
        Bug => match defending {
            Grass | Psychic | Dark => 2.0,
            Fire | Fighting | Poison | Flying | Ghost | Steel | Fairy => 0.5,
            _ => 1.0,
        },
        Rock => match defending {
            Fire | Ice | Flying | Bug => 2.0,
            Fighting | Ground | Steel => 0.5,
            _ => 1.0,
        },
        Ghost => match defending {
            Ghost | Psychic => 2.0,
            Dark => 0.5,
            Normal => 0.0,
            _ => 1.0,
        },
        Dragon => match defending {
            Dragon => 2.0,
            Steel => 0.5,
            Fairy => 0.0,
            _ => 1.0,
        },
        Dark => match defending {
            Psychic | Ghost => 2.0,
            Fighting | Dark | Fairy => 0.5,
            _ => 1.0,
        },
        Steel => match defending {
            Rock | Ice | Fairy => 2.0,
            Fire | Water | Electric | Steel => 0.5,
            _ => 1.0,
        },
        Fairy => match defending {
            Fighting | Dragon | Dark => 2.0,
            Fire | Poison | Steel => 0.5,
            _ => 1.0,
        },
    }
}
