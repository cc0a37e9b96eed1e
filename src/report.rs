use crate::catalog::{Catalog, LoadStats};
use crate::config::BuildConfig;
use crate::dataset::{scenario_counts, BuildCounts, Dataset};
use crate::features::{BattleSample, FEATURE_SCHEMA_VERSION};
use crate::scenario::ScenarioType;
use crate::validate::{metrics, DatasetMetrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub rows: usize,
    /// Share of rows labelled `winner = 1`.
    pub winner_a_share: f64,
    pub rows_per_scenario: BTreeMap<String, usize>,
}

impl SplitSummary {
    fn from_samples(samples: &[BattleSample]) -> Self {
        let wins = samples.iter().filter(|s| s.winner == 1).count();
        SplitSummary {
            rows: samples.len(),
            winner_a_share: if samples.is_empty() {
                0.0
            } else {
                wins as f64 / samples.len() as f64
            },
            rows_per_scenario: scenario_counts(samples),
        }
    }
}

/// Observability summary written next to the dataset artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub dataset_version: String,
    pub scenario_type: ScenarioType,
    pub schema_version: String,
    pub seed: u64,
    pub eligible_pokemon: usize,
    pub excluded_pokemon: Vec<u32>,
    pub pairs: usize,
    pub attempted_candidates: usize,
    pub skipped_candidates: usize,
    pub generated_rows: usize,
    pub dropped_for_target: usize,
    pub dropped_for_balance: usize,
    pub rows_per_scenario: BTreeMap<String, usize>,
    pub train: SplitSummary,
    pub test: SplitSummary,
    pub metrics: DatasetMetrics,
    pub catalog: LoadStats,
}

impl BuildReport {
    pub fn new(
        config: &BuildConfig,
        catalog: &Catalog,
        dataset: &Dataset,
        counts: BuildCounts,
    ) -> Self {
        let (train_table, test_table) = dataset.tables();
        let mut rows_per_scenario = scenario_counts(&dataset.train);
        for (scenario, count) in scenario_counts(&dataset.test) {
            *rows_per_scenario.entry(scenario).or_insert(0) += count;
        }
        BuildReport {
            dataset_version: config.dataset_version.clone(),
            scenario_type: config.scenario_type,
            schema_version: FEATURE_SCHEMA_VERSION.to_string(),
            seed: config.seed,
            eligible_pokemon: counts.eligible_pokemon,
            excluded_pokemon: counts.excluded_pokemon,
            pairs: counts.pairs,
            attempted_candidates: counts.attempted_candidates,
            skipped_candidates: counts.skipped_candidates,
            generated_rows: counts.generated_rows,
            dropped_for_target: counts.dropped_for_target,
            dropped_for_balance: counts.dropped_for_balance,
            rows_per_scenario,
            train: SplitSummary::from_samples(&dataset.train),
            test: SplitSummary::from_samples(&dataset.test),
            metrics: metrics(&train_table, &test_table),
            catalog: catalog.load_stats().clone(),
        }
    }

    pub fn skip_rate(&self) -> f64 {
        if self.attempted_candidates == 0 {
            0.0
        } else {
            self.skipped_candidates as f64 / self.attempted_candidates as f64
        }
    }
}
