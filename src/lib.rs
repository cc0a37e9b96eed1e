pub mod artifact;
pub mod battle;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod features;
pub mod model;
pub mod report;
pub mod retry;
pub mod scenario;
pub mod source;
pub mod types;
pub mod validate;

use crate::artifact::{read_table, write_dataset, ArtifactError, ArtifactPaths};
use crate::catalog::{Catalog, CatalogError};
use crate::config::{BuildConfig, ConfigError};
use crate::dataset::{build_dataset, BuildError};
use crate::report::BuildReport;
use crate::source::CsvSeedSource;
use crate::validate::{validate, DatasetMetrics, Split, ValidationError, ValidationPolicy, Violation};
use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Build, validate and publish a dataset version.
    Build,
    /// Re-run the validator on previously published artifacts.
    Validate,
}

#[derive(Debug, Clone)]
pub struct CliOptions {
    pub command: Command,
    pub seed_dir: PathBuf,
    pub out_dir: PathBuf,
    pub config: BuildConfig,
    pub overwrite: bool,
}

/// Loads the catalog, builds both splits, gates them through the validator
/// and only then writes artifacts.
pub fn build_and_publish(opts: &CliOptions) -> anyhow::Result<(ArtifactPaths, BuildReport)> {
    let config = &opts.config;
    config.validate()?;

    let source = CsvSeedSource::new(&opts.seed_dir);
    let catalog = Catalog::load(&source, config.io_retries)
        .with_context(|| format!("Failed to load seed data from {}", opts.seed_dir.display()))?;

    let outcome = build_dataset(&catalog, config)?;
    let (train, test) = outcome.dataset.tables();
    let policy = ValidationPolicy::for_scenario(config.scenario_type);
    validate(&train, &test, &policy)?;

    let paths = write_dataset(
        &opts.out_dir,
        &config.artifact_tag(),
        &outcome.dataset,
        &outcome.report,
        opts.overwrite,
        config.io_retries,
    )?;
    Ok((paths, outcome.report))
}

/// Validates the artifacts that `opts.config` names under `opts.out_dir`.
pub fn validate_published(opts: &CliOptions) -> anyhow::Result<DatasetMetrics> {
    let config = &opts.config;
    config.validate()?;
    let paths = ArtifactPaths::new(&opts.out_dir, &config.artifact_tag());
    let train = read_table(Split::Train, paths.split(Split::Train), config.io_retries)?;
    let test = read_table(Split::Test, paths.split(Split::Test), config.io_retries)?;
    let policy = ValidationPolicy::for_scenario(config.scenario_type);
    let metrics = validate(&train, &test, &policy)?;
    info!(train = train.len(), test = test.len(), "artifacts passed validation");
    Ok(metrics)
}

pub fn run(opts: CliOptions) -> anyhow::Result<()> {
    match opts.command {
        Command::Build => {
            let (paths, report) = build_and_publish(&opts)?;
            println!(
                "Wrote {} train / {} test rows ({}, {:.1}% candidates skipped) to {} and {}",
                report.train.rows,
                report.test.rows,
                report.scenario_type,
                report.skip_rate() * 100.0,
                paths.train.display(),
                paths.test.display()
            );
        }
        Command::Validate => {
            let metrics = validate_published(&opts)?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
    }
    Ok(())
}

/// Machine-readable description of a failed run, printed to stderr.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub component: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_samples: Option<usize>,
    #[serde(skip)]
    pub exit_code: u8,
}

impl ErrorReport {
    pub fn from_error(err: &anyhow::Error) -> Self {
        let mut report = ErrorReport {
            component: "pipeline",
            message: format!("{err:#}"),
            violations: Vec::new(),
            affected_samples: None,
            exit_code: 1,
        };
        if err.downcast_ref::<ConfigError>().is_some()
            || matches!(err.downcast_ref::<BuildError>(), Some(BuildError::Config(_)))
        {
            report.component = "config";
            report.exit_code = 2;
        } else if let Some(build) = err.downcast_ref::<BuildError>() {
            report.component = "sampler";
            report.affected_samples = build.affected_samples();
        } else if let Some(invalid) = err.downcast_ref::<ValidationError>() {
            report.component = "validator";
            report.affected_samples = Some(invalid.affected_rows());
            report.violations = invalid.violations.clone();
        } else if err.downcast_ref::<CatalogError>().is_some() {
            report.component = "catalog";
        } else if err.downcast_ref::<ArtifactError>().is_some() {
            report.component = "artifact";
        }
        report
    }

    /// Report for arguments that could not be parsed at all.
    pub fn usage(err: &anyhow::Error) -> Self {
        ErrorReport {
            component: "cli",
            message: format!("{err:#}"),
            violations: Vec::new(),
            affected_samples: None,
            exit_code: 2,
        }
    }
}
