use pokemon_battle_dataset::config::BuildConfig;
use pokemon_battle_dataset::scenario::ScenarioType;
use pokemon_battle_dataset::{run, CliOptions, Command, ErrorReport};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn usage() -> ! {
    eprintln!(
        "Usage: cargo run --release -- [build|validate] [--seed-dir data/] [--out datasets/] [--config build.json] \
[--scenario best_move|random_move|all_combinations|all] [--num-random-samples N] [--max-combinations N] \
[--dataset-version v1] [--seed SEED] [--test-ratio R] [--max-samples N] [--max-class-share S] [--overwrite]"
    );
    std::process::exit(2);
}

/// Flag values that override whatever the config file says.
#[derive(Default)]
struct Overrides {
    scenario_type: Option<ScenarioType>,
    num_random_samples: Option<usize>,
    max_combinations: Option<usize>,
    dataset_version: Option<String>,
    seed: Option<u64>,
    test_ratio: Option<f64>,
    max_samples: Option<usize>,
    max_class_share: Option<f64>,
}

impl Overrides {
    fn apply(self, config: &mut BuildConfig) {
        if let Some(v) = self.scenario_type {
            config.scenario_type = v;
        }
        if let Some(v) = self.num_random_samples {
            config.num_random_samples = v;
        }
        if let Some(v) = self.max_combinations {
            config.max_combinations = v;
        }
        if let Some(v) = self.dataset_version {
            config.dataset_version = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.test_ratio {
            config.test_ratio = v;
        }
        if let Some(v) = self.max_samples {
            config.max_samples = Some(v);
        }
        if let Some(v) = self.max_class_share {
            config.max_class_share = v;
        }
    }
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str, what: &str) -> anyhow::Result<String> {
    args.next()
        .ok_or_else(|| anyhow::anyhow!("{flag} requires {what}"))
}

fn parse_args() -> anyhow::Result<CliOptions> {
    let mut seed_dir = PathBuf::from("data");
    let mut out_dir = PathBuf::from("datasets");
    let mut config_path: Option<PathBuf> = None;
    let mut overwrite = false;
    let mut overrides = Overrides::default();

    let mut args = env::args().skip(1).peekable();
    let command = match args.peek().map(String::as_str) {
        Some("validate") => Command::Validate,
        _ => Command::Build,
    };
    if matches!(args.peek().map(String::as_str), Some("build" | "validate")) {
        args.next();
    }
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seed-dir" => {
                seed_dir = PathBuf::from(next_value(&mut args, "--seed-dir", "a directory")?);
            }
            "--out" => {
                out_dir = PathBuf::from(next_value(&mut args, "--out", "a directory")?);
            }
            "--config" => {
                config_path = Some(PathBuf::from(next_value(
                    &mut args,
                    "--config",
                    "a path (e.g. --config build.json)",
                )?));
            }
            "--scenario" => {
                let val = next_value(&mut args, "--scenario", "a scenario type")?;
                overrides.scenario_type = Some(val.parse()?);
            }
            "--num-random-samples" => {
                let val = next_value(&mut args, "--num-random-samples", "a number")?;
                overrides.num_random_samples = Some(val.parse()?);
            }
            "--max-combinations" => {
                let val = next_value(&mut args, "--max-combinations", "a number")?;
                overrides.max_combinations = Some(val.parse()?);
            }
            "--dataset-version" => {
                overrides.dataset_version =
                    Some(next_value(&mut args, "--dataset-version", "a version tag")?);
            }
            "--seed" => {
                let val = next_value(&mut args, "--seed", "a number")?;
                overrides.seed = Some(val.parse()?);
            }
            "--test-ratio" => {
                let val = next_value(&mut args, "--test-ratio", "a float")?;
                overrides.test_ratio = Some(val.parse()?);
            }
            "--max-samples" => {
                let val = next_value(&mut args, "--max-samples", "a number")?;
                overrides.max_samples = Some(val.parse()?);
            }
            "--max-class-share" => {
                let val = next_value(&mut args, "--max-class-share", "a float")?;
                overrides.max_class_share = Some(val.parse()?);
            }
            "--overwrite" => overwrite = true,
            "--help" | "-h" => usage(),
            other => return Err(anyhow::anyhow!("Unknown argument {other}")),
        }
    }

    let mut config = match &config_path {
        Some(path) => BuildConfig::load(path)?,
        None => BuildConfig::default(),
    };
    overrides.apply(&mut config);

    Ok(CliOptions {
        command,
        seed_dir,
        out_dir,
        config,
        overwrite,
    })
}

fn emit(report: &ErrorReport) -> ExitCode {
    match serde_json::to_string(report) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("{}: {}", report.component, report.message),
    }
    ExitCode::from(report.exit_code)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let opts = match parse_args() {
        Ok(opts) => opts,
        Err(err) => return emit(&ErrorReport::usage(&err)),
    };
    match run(opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => emit(&ErrorReport::from_error(&err)),
    }
}
