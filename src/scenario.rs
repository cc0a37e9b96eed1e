use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    /// Each side uses its highest effective-power move against that opponent.
    BestMove,
    /// Moves drawn uniformly from each side's offensive learnset.
    RandomMove,
    /// Every offensive move pair, sampled down to `max_combinations`.
    AllCombinations,
    /// Union of the three policies above.
    All,
}

impl ScenarioType {
    /// Policies that actually generate rows (`All` expands into these).
    pub const CONCRETE: [ScenarioType; 3] = [
        ScenarioType::BestMove,
        ScenarioType::RandomMove,
        ScenarioType::AllCombinations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioType::BestMove => "best_move",
            ScenarioType::RandomMove => "random_move",
            ScenarioType::AllCombinations => "all_combinations",
            ScenarioType::All => "all",
        }
    }

    pub fn policies(self) -> Vec<ScenarioType> {
        match self {
            ScenarioType::All => Self::CONCRETE.to_vec(),
            single => vec![single],
        }
    }
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best_move" => Ok(ScenarioType::BestMove),
            "random_move" => Ok(ScenarioType::RandomMove),
            "all_combinations" => Ok(ScenarioType::AllCombinations),
            "all" => Ok(ScenarioType::All),
            other => Err(ConfigError::UnknownScenario(other.to_string())),
        }
    }
}
