use crate::battle::effective_power;
use crate::catalog::Catalog;
use crate::config::{BuildConfig, ConfigError};
use crate::features::{encode, BattleSample, CompositeKey};
use crate::model::{Move, Pokemon};
use crate::report::BuildReport;
use crate::scenario::ScenarioType;
use crate::validate::{Split, Table};
use rand::rngs::SmallRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

const SPLIT_SALT: u64 = 0x5350_4c49_54;
const TARGET_SALT: u64 = 0x5441_5247_4554;
const BALANCE_SALT: u64 = 0x4241_4c41_4e43;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("fewer than two pokemon have an offensive move ({eligible} eligible)")]
    NotEnoughPokemon { eligible: usize },
    #[error("skipped {skipped} of {attempted} candidates ({rate:.3} > max {max:.3})")]
    ExcessiveSkips {
        skipped: usize,
        attempted: usize,
        rate: f64,
        max: f64,
    },
}

impl BuildError {
    /// Samples affected by the failure, when the failure is about samples.
    pub fn affected_samples(&self) -> Option<usize> {
        match self {
            BuildError::ExcessiveSkips { skipped, .. } => Some(*skipped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub train: Vec<BattleSample>,
    pub test: Vec<BattleSample>,
}

impl Dataset {
    pub fn tables(&self) -> (Table, Table) {
        (
            Table::from_samples(Split::Train, &self.train),
            Table::from_samples(Split::Test, &self.test),
        )
    }
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub dataset: Dataset,
    pub report: BuildReport,
}

/// Rows produced for one ordered Pokémon pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairSamples {
    pub samples: Vec<BattleSample>,
    pub attempted: usize,
    pub skipped: usize,
}

impl PairSamples {
    fn merge(mut self, other: PairSamples) -> PairSamples {
        self.samples.extend(other.samples);
        self.attempted += other.attempted;
        self.skipped += other.skipped;
        self
    }
}

/// Avalanche mix giving an independent stream per (seed, a, b).
pub fn mix_seed(base: u64, a: u64, b: u64) -> u64 {
    let mut x = base ^ a.wrapping_mul(0x9E3779B97F4A7C15);
    x ^= b.wrapping_mul(0xC2B2AE3D27D4EB4F);
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51afd7ed558ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ceb9fe1a85ec53);
    x ^ (x >> 33)
}

fn pair_seed(seed: u64, a: &Pokemon, b: &Pokemon, scenario: ScenarioType) -> u64 {
    let pair = (u64::from(a.id) << 32) | u64::from(b.id);
    mix_seed(seed, pair, scenario as u64 + 1)
}

/// Picks `attacker`'s move with the highest effective power against `defender`.
///
/// Ties prefer higher base power, then the alphabetically first name. Moves
/// whose type cannot be looked up are skipped and counted.
pub fn best_move_against<'a>(
    catalog: &Catalog,
    attacker: &Pokemon,
    moves: &[&'a Move],
    defender: &Pokemon,
) -> (Option<&'a Move>, usize) {
    let mut skipped = 0usize;
    let mut best: Option<(f32, &'a Move)> = None;
    for &candidate in moves {
        let power = match effective_power(catalog.chart(), attacker, candidate, defender) {
            Ok(power) => power,
            Err(err) => {
                debug!(%err, pokemon = %attacker.name, mv = %candidate.name, "skipping move");
                skipped += 1;
                continue;
            }
        };
        let better = match best {
            None => true,
            Some((best_power, best_move)) => match power.total_cmp(&best_power) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => {
                    candidate.power_value() > best_move.power_value()
                        || (candidate.power_value() == best_move.power_value()
                            && candidate.name < best_move.name)
                }
            },
        };
        if better {
            best = Some((power, candidate));
        }
    }
    (best.map(|(_, m)| m), skipped)
}

fn candidates<'a>(
    catalog: &Catalog,
    config: &BuildConfig,
    scenario: ScenarioType,
    a: &Pokemon,
    moves_a: &[&'a Move],
    b: &Pokemon,
    moves_b: &[&'a Move],
    rng: &mut SmallRng,
) -> (Vec<(&'a Move, &'a Move)>, usize) {
    match scenario {
        ScenarioType::BestMove => {
            let (best_a, skipped_a) = best_move_against(catalog, a, moves_a, b);
            let (best_b, skipped_b) = best_move_against(catalog, b, moves_b, a);
            let pairs = match (best_a, best_b) {
                (Some(ma), Some(mb)) => vec![(ma, mb)],
                _ => Vec::new(),
            };
            (pairs, skipped_a + skipped_b)
        }
        ScenarioType::RandomMove => {
            let mut seen = HashSet::new();
            let mut pairs = Vec::new();
            for _ in 0..config.num_random_samples {
                let (Some(&ma), Some(&mb)) = (moves_a.choose(rng), moves_b.choose(rng)) else {
                    break;
                };
                if seen.insert((ma.name.as_str(), mb.name.as_str())) {
                    pairs.push((ma, mb));
                }
            }
            (pairs, 0)
        }
        ScenarioType::AllCombinations => {
            let total = moves_a.len() * moves_b.len();
            let pick = |i: usize| (moves_a[i / moves_b.len()], moves_b[i % moves_b.len()]);
            let pairs = if total <= config.max_combinations {
                (0..total).map(pick).collect()
            } else {
                let mut chosen = index::sample(rng, total, config.max_combinations).into_vec();
                chosen.sort_unstable();
                chosen.into_iter().map(pick).collect()
            };
            (pairs, 0)
        }
        ScenarioType::All => (Vec::new(), 0),
    }
}

/// Generates every row `config.scenario_type` asks for on the ordered pair (a, b).
///
/// Deterministic for a given seed; independent of other pairs.
pub fn generate_pair_samples(
    catalog: &Catalog,
    config: &BuildConfig,
    a: &Pokemon,
    b: &Pokemon,
) -> PairSamples {
    let moves_a = catalog.offensive_moves(a.id);
    let moves_b = catalog.offensive_moves(b.id);
    if a.id == b.id || moves_a.is_empty() || moves_b.is_empty() {
        return PairSamples::default();
    }

    let mut out = PairSamples::default();
    // Under `all`, a move pair already emitted by an earlier policy keeps that tag.
    let mut emitted: HashSet<(&str, &str)> = HashSet::new();
    for scenario in config.scenario_type.policies() {
        let mut rng = SmallRng::seed_from_u64(pair_seed(config.seed, a, b, scenario));
        let (pairs, skipped) =
            candidates(catalog, config, scenario, a, &moves_a, b, &moves_b, &mut rng);
        out.attempted += skipped;
        out.skipped += skipped;
        for (move_a, move_b) in pairs {
            if !emitted.insert((move_a.name.as_str(), move_b.name.as_str())) {
                continue;
            }
            out.attempted += 1;
            match encode(catalog.chart(), a, move_a, b, move_b, scenario) {
                Ok(sample) => out.samples.push(sample),
                Err(err) => {
                    debug!(%err, a = a.id, b = b.id, "skipping candidate");
                    out.skipped += 1;
                }
            }
        }
    }
    out
}

fn sort_samples(samples: &mut [BattleSample]) {
    samples.sort_by(|lhs, rhs| {
        lhs.pokemon_a_id
            .cmp(&rhs.pokemon_a_id)
            .then_with(|| lhs.pokemon_b_id.cmp(&rhs.pokemon_b_id))
            .then_with(|| lhs.move_a_name.cmp(&rhs.move_a_name))
            .then_with(|| lhs.move_b_name.cmp(&rhs.move_b_name))
            .then_with(|| lhs.scenario_type.cmp(&rhs.scenario_type))
    });
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Uniform value in [0, 1) derived only from the composite key and seed.
pub fn key_fraction(key: &CompositeKey, seed: u64) -> f64 {
    let text = format!("{}|{}|{}|{}", key.0, key.1, key.2, key.3);
    let hashed = mix_seed(seed, fnv1a(text.as_bytes()), SPLIT_SALT);
    (hashed >> 11) as f64 / (1u64 << 53) as f64
}

/// Splits by composite key so that every row of a key lands on the same side.
pub fn split_by_key(
    samples: Vec<BattleSample>,
    test_ratio: f64,
    seed: u64,
) -> (Vec<BattleSample>, Vec<BattleSample>) {
    samples
        .into_iter()
        .partition(|sample| key_fraction(&sample.composite_key(), seed) >= test_ratio)
}

/// Drops randomly chosen majority-label rows until the majority share is at
/// most `max_share`. Returns the number of rows removed.
pub fn rebalance(samples: &mut Vec<BattleSample>, max_share: f64, rng: &mut SmallRng) -> usize {
    let wins = samples.iter().filter(|s| s.winner == 1).count();
    let losses = samples.len() - wins;
    let (majority_label, majority, minority) = if wins >= losses {
        (1u8, wins, losses)
    } else {
        (0u8, losses, wins)
    };
    if samples.is_empty() || majority as f64 / samples.len() as f64 <= max_share {
        return 0;
    }
    // Small epsilon so 0.6 * 2 / 0.4 lands on 3, not 2.999.
    let keep_majority = ((max_share * minority as f64) / (1.0 - max_share) + 1e-9).floor() as usize;
    let drop = majority - keep_majority.min(majority);

    let mut majority_idx: Vec<usize> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.winner == majority_label)
        .map(|(idx, _)| idx)
        .collect();
    majority_idx.shuffle(rng);
    let dropped: HashSet<usize> = majority_idx.into_iter().take(drop).collect();
    let mut idx = 0usize;
    samples.retain(|_| {
        let keep = !dropped.contains(&idx);
        idx += 1;
        keep
    });
    drop
}

/// Runs the whole sampling pipeline: pairs → rows → target cap → split → balance.
pub fn build_dataset(catalog: &Catalog, config: &BuildConfig) -> Result<BuildOutcome, BuildError> {
    config.validate()?;

    let (eligible, excluded): (Vec<&Pokemon>, Vec<&Pokemon>) = catalog
        .pokemon()
        .iter()
        .partition(|p| !catalog.offensive_moves(p.id).is_empty());
    for p in &excluded {
        info!(id = p.id, name = %p.name, "excluding pokemon without offensive moves");
    }
    if eligible.len() < 2 {
        return Err(BuildError::NotEnoughPokemon {
            eligible: eligible.len(),
        });
    }

    let tasks: Vec<(usize, usize)> = (0..eligible.len())
        .flat_map(|a| (0..eligible.len()).filter(move |&b| b != a).map(move |b| (a, b)))
        .collect();
    info!(
        pairs = tasks.len(),
        scenario = %config.scenario_type,
        "generating battle samples"
    );
    let generated = tasks
        .par_iter()
        .map(|&(a_idx, b_idx)| generate_pair_samples(catalog, config, eligible[a_idx], eligible[b_idx]))
        .reduce(PairSamples::default, PairSamples::merge);

    if generated.attempted > 0 {
        let rate = generated.skipped as f64 / generated.attempted as f64;
        if generated.skipped > 0 {
            warn!(skipped = generated.skipped, attempted = generated.attempted, "skipped candidates");
        }
        if rate > config.max_skip_rate {
            return Err(BuildError::ExcessiveSkips {
                skipped: generated.skipped,
                attempted: generated.attempted,
                rate,
                max: config.max_skip_rate,
            });
        }
    }

    let mut samples = generated.samples;
    sort_samples(&mut samples);
    let generated_rows = samples.len();

    let mut dropped_for_target = 0usize;
    if let Some(target) = config.max_samples {
        if samples.len() > target {
            let mut rng = SmallRng::seed_from_u64(mix_seed(config.seed, TARGET_SALT, 0));
            dropped_for_target = samples.len() - target;
            samples.shuffle(&mut rng);
            samples.truncate(target);
            sort_samples(&mut samples);
        }
    }

    let (mut train, mut test) = split_by_key(samples, config.test_ratio, config.seed);
    let mut dropped_for_balance = 0usize;
    for (salt, split) in [(1u64, &mut train), (2u64, &mut test)] {
        let mut rng = SmallRng::seed_from_u64(mix_seed(config.seed, BALANCE_SALT, salt));
        dropped_for_balance += rebalance(split, config.max_class_share, &mut rng);
    }

    let dataset = Dataset { train, test };
    let report = BuildReport::new(
        config,
        catalog,
        &dataset,
        BuildCounts {
            eligible_pokemon: eligible.len(),
            excluded_pokemon: excluded.iter().map(|p| p.id).collect(),
            pairs: tasks.len(),
            attempted_candidates: generated.attempted,
            skipped_candidates: generated.skipped,
            generated_rows,
            dropped_for_target,
            dropped_for_balance,
        },
    );
    info!(
        train = dataset.train.len(),
        test = dataset.test.len(),
        dropped_for_balance,
        "dataset built"
    );
    Ok(BuildOutcome { dataset, report })
}

/// Counters gathered while building, before any table-level metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildCounts {
    pub eligible_pokemon: usize,
    pub excluded_pokemon: Vec<u32>,
    pub pairs: usize,
    pub attempted_candidates: usize,
    pub skipped_candidates: usize,
    pub generated_rows: usize,
    pub dropped_for_target: usize,
    pub dropped_for_balance: usize,
}

/// Rows per scenario tag.
pub fn scenario_counts(samples: &[BattleSample]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for sample in samples {
        *counts.entry(sample.scenario_type.to_string()).or_insert(0) += 1;
    }
    counts
}
