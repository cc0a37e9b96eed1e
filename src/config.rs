use crate::scenario::ScenarioType;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Class balancing may never allow a label share above this.
pub const CLASS_SHARE_CEILING: f64 = 0.70;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown scenario type {0} (use best_move, random_move, all_combinations or all)")]
    UnknownScenario(String),
    #[error("{option} must be > 0")]
    NonPositive { option: &'static str },
    #[error("test_ratio must be in (0, 1), got {0}")]
    TestRatio(f64),
    #[error("max_class_share must be in [0.5, 0.7], got {0}")]
    ClassShare(f64),
    #[error("max_skip_rate must be in [0, 1], got {0}")]
    SkipRate(f64),
    #[error("dataset_version `{0}` must be non-empty and use only [A-Za-z0-9._-]")]
    InvalidVersion(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    pub scenario_type: ScenarioType,
    pub num_random_samples: usize,
    pub max_combinations: usize,
    pub dataset_version: String,
    pub seed: u64,
    pub test_ratio: f64,
    /// Optional cap on the number of rows before splitting.
    pub max_samples: Option<usize>,
    pub max_class_share: f64,
    /// Abort when skipped candidates / attempted candidates exceeds this.
    pub max_skip_rate: f64,
    pub io_retries: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            scenario_type: ScenarioType::BestMove,
            num_random_samples: 5,
            max_combinations: 20,
            dataset_version: "v1".to_string(),
            seed: 42,
            test_ratio: 0.2,
            max_samples: None,
            max_class_share: 0.6,
            max_skip_rate: 0.05,
            io_retries: 3,
        }
    }
}

impl BuildConfig {
    pub fn load(path: &Path) -> anyhow::Result<BuildConfig> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read build config at {}", path.display()))?;
        let parsed: BuildConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_random_samples == 0 {
            return Err(ConfigError::NonPositive {
                option: "num_random_samples",
            });
        }
        if self.max_combinations == 0 {
            return Err(ConfigError::NonPositive {
                option: "max_combinations",
            });
        }
        if self.max_samples == Some(0) {
            return Err(ConfigError::NonPositive {
                option: "max_samples",
            });
        }
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(ConfigError::TestRatio(self.test_ratio));
        }
        if !(0.5..=CLASS_SHARE_CEILING).contains(&self.max_class_share) {
            return Err(ConfigError::ClassShare(self.max_class_share));
        }
        if !(0.0..=1.0).contains(&self.max_skip_rate) {
            return Err(ConfigError::SkipRate(self.max_skip_rate));
        }
        let version_ok = !self.dataset_version.is_empty()
            && self
                .dataset_version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !version_ok {
            return Err(ConfigError::InvalidVersion(self.dataset_version.clone()));
        }
        Ok(())
    }

    /// Tag embedded in artifact file names.
    pub fn artifact_tag(&self) -> String {
        format!("{}_{}", self.dataset_version, self.scenario_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(BuildConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_caps_fail_fast() {
        let config = BuildConfig {
            max_combinations: 0,
            ..BuildConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive {
                option: "max_combinations"
            })
        );
    }

    #[test]
    fn version_must_be_path_safe() {
        let config = BuildConfig {
            dataset_version: "../v1".to_string(),
            ..BuildConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidVersion(_))
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed: Result<BuildConfig, _> =
            serde_json::from_str(r#"{"scenario_type": "all", "grid": true}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let parsed: BuildConfig =
            serde_json::from_str(r#"{"scenario_type": "all_combinations", "max_combinations": 20}"#)
                .expect("valid config");
        assert_eq!(parsed.scenario_type, ScenarioType::AllCombinations);
        assert_eq!(parsed.num_random_samples, 5);
    }
}
