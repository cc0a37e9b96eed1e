use pokemon_battle_dataset::catalog::Catalog;
use pokemon_battle_dataset::config::{BuildConfig, ConfigError};
use pokemon_battle_dataset::dataset::{
    best_move_against, build_dataset, generate_pair_samples, rebalance, split_by_key, BuildError,
};
use pokemon_battle_dataset::features::{encode, BattleSample};
use pokemon_battle_dataset::model::{LearnsetRecord, Move, MoveCategory, Pokemon, Stats};
use pokemon_battle_dataset::scenario::ScenarioType;
use pokemon_battle_dataset::types::TypeChart;
use pokemon_battle_dataset::validate::{validate, ValidationPolicy};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::HashSet;

fn make_move(name: &str, move_type: &str, category: MoveCategory, power: u32, priority: i32) -> Move {
    let power = if power == 0 { None } else { Some(power) };
    Move::new(name, move_type, category, power, priority).expect("valid move")
}

fn make_mon(id: u32, name: &str, types: &[&str], stats: [u32; 6]) -> Pokemon {
    Pokemon::new(
        id,
        name,
        types.iter().map(|t| t.to_string()).collect(),
        Stats {
            hp: stats[0],
            attack: stats[1],
            defense: stats[2],
            special_attack: stats[3],
            special_defense: stats[4],
            speed: stats[5],
        },
    )
    .expect("valid pokemon")
}

fn learns(id: u32, moves: &[&str]) -> Vec<LearnsetRecord> {
    moves
        .iter()
        .map(|m| LearnsetRecord::new(i64::from(id), m, "machine", None).expect("valid learnset"))
        .collect()
}

fn move_pool() -> Vec<Move> {
    use MoveCategory::*;
    vec![
        make_move("Tackle", "normal", Physical, 40, 0),
        make_move("Quick Attack", "normal", Physical, 40, 1),
        make_move("Body Slam", "normal", Physical, 85, 0),
        make_move("Ember", "fire", Special, 40, 0),
        make_move("Flamethrower", "fire", Special, 90, 0),
        make_move("Water Gun", "water", Special, 40, 0),
        make_move("Surf", "water", Special, 90, 0),
        make_move("Vine Whip", "grass", Physical, 45, 0),
        make_move("Razor Leaf", "grass", Physical, 55, 0),
        make_move("Thunder Shock", "electric", Special, 40, 0),
        make_move("Thunderbolt", "electric", Special, 90, 0),
        make_move("Rock Throw", "rock", Physical, 50, 0),
        make_move("Earthquake", "ground", Physical, 100, 0),
        make_move("Psychic", "psychic", Special, 90, 0),
        make_move("Bite", "dark", Physical, 60, 0),
        make_move("Wing Attack", "flying", Physical, 60, 0),
        make_move("Growl", "normal", Status, 0, 0),
        make_move("Splash", "normal", Status, 0, 0),
    ]
}

/// A dozen battlers with varied types and stats plus one that only knows
/// status moves.
fn roster() -> Catalog {
    let species: [(u32, &str, &[&str], [u32; 6], &[&str]); 13] = [
        (1, "Bulbasaur", &["grass", "poison"], [45, 49, 49, 65, 65, 45], &["Tackle", "Vine Whip", "Razor Leaf", "Growl"]),
        (4, "Charmander", &["fire"], [39, 52, 43, 60, 50, 65], &["Tackle", "Ember", "Flamethrower", "Bite"]),
        (7, "Squirtle", &["water"], [44, 48, 65, 50, 64, 43], &["Tackle", "Water Gun", "Surf", "Bite"]),
        (25, "Pikachu", &["electric"], [35, 55, 40, 50, 50, 90], &["Quick Attack", "Thunder Shock", "Thunderbolt"]),
        (50, "Diglett", &["ground"], [10, 55, 25, 35, 45, 95], &["Earthquake", "Bite", "Growl"]),
        (63, "Abra", &["psychic"], [25, 20, 15, 105, 55, 90], &["Psychic", "Quick Attack"]),
        (74, "Geodude", &["rock", "ground"], [40, 80, 100, 30, 30, 20], &["Tackle", "Rock Throw", "Earthquake"]),
        (92, "Gastly", &["ghost", "poison"], [30, 35, 30, 100, 35, 80], &["Psychic", "Bite"]),
        (129, "Magikarp", &["water"], [20, 10, 55, 15, 20, 80], &["Splash"]),
        (133, "Eevee", &["normal"], [55, 55, 50, 45, 65, 55], &["Tackle", "Quick Attack", "Body Slam", "Bite"]),
        (143, "Snorlax", &["normal"], [160, 110, 65, 65, 110, 30], &["Body Slam", "Earthquake", "Surf"]),
        (16, "Pidgey", &["normal", "flying"], [40, 45, 40, 35, 35, 56], &["Tackle", "Quick Attack", "Wing Attack"]),
        (95, "Onix", &["rock", "ground"], [35, 45, 160, 30, 45, 70], &["Rock Throw", "Tackle", "Earthquake"]),
    ];
    let mut pokemon = Vec::new();
    let mut learnsets = Vec::new();
    for (id, name, types, stats, moves) in species {
        pokemon.push(make_mon(id, name, types, stats));
        learnsets.extend(learns(id, moves));
    }
    Catalog::new(TypeChart::standard(), pokemon, move_pool(), learnsets)
}

fn config(scenario: ScenarioType) -> BuildConfig {
    BuildConfig {
        scenario_type: scenario,
        ..BuildConfig::default()
    }
}

#[test]
fn pokemon_without_offensive_moves_are_excluded() {
    let catalog = roster();
    assert!(catalog.offensive_moves(129).is_empty());
    let outcome = build_dataset(&catalog, &config(ScenarioType::BestMove)).expect("builds");
    assert_eq!(outcome.report.excluded_pokemon, vec![129]);
    assert_eq!(outcome.report.eligible_pokemon, 12);
    assert_eq!(outcome.report.pairs, 12 * 11);
    for row in outcome.dataset.train.iter().chain(&outcome.dataset.test) {
        assert_ne!(row.pokemon_a_id, 129);
        assert_ne!(row.pokemon_b_id, 129);
    }
}

#[test]
fn status_moves_never_enter_rows() {
    let catalog = roster();
    let outcome = build_dataset(&catalog, &config(ScenarioType::All)).expect("builds");
    for row in outcome.dataset.train.iter().chain(&outcome.dataset.test) {
        assert!(row.move_a_power > 0 && row.move_b_power > 0);
        assert_ne!(row.move_a_name, "Growl");
        assert_ne!(row.move_b_name, "Splash");
    }
}

#[test]
fn best_move_maximises_effective_power() {
    let catalog = roster();
    let squirtle = catalog.get_pokemon(7).expect("squirtle");
    let charmander = catalog.get_pokemon(4).expect("charmander");
    let moves = catalog.offensive_moves(7);
    let (best, skipped) = best_move_against(&catalog, squirtle, &moves, charmander);
    assert_eq!(best.map(|m| m.name.as_str()), Some("Surf"));
    assert_eq!(skipped, 0);

    let samples = generate_pair_samples(&catalog, &config(ScenarioType::BestMove), squirtle, charmander);
    assert_eq!(samples.samples.len(), 1);
    assert_eq!(samples.samples[0].move_a_name, "Surf");
    assert_eq!(samples.samples[0].move_b_name, "Flamethrower");
}

#[test]
fn best_move_avoids_immune_matchups() {
    let catalog = roster();
    let eevee = catalog.get_pokemon(133).expect("eevee");
    let gastly = catalog.get_pokemon(92).expect("gastly");
    // Every normal move is 0x against ghost; Bite (60, dark, 2x) wins outright.
    let moves = catalog.offensive_moves(133);
    let (best, _) = best_move_against(&catalog, eevee, &moves, gastly);
    assert_eq!(best.map(|m| m.name.as_str()), Some("Bite"));

    let pikachu = catalog.get_pokemon(25).expect("pikachu");
    let diglett = catalog.get_pokemon(50).expect("diglett");
    // Electric is 0x against ground and Quick Attack is the only other option.
    let moves = catalog.offensive_moves(25);
    let (best, _) = best_move_against(&catalog, pikachu, &moves, diglett);
    assert_eq!(best.map(|m| m.name.as_str()), Some("Quick Attack"));
}

#[test]
fn all_combinations_is_capped() {
    use MoveCategory::*;
    let mut moves = move_pool();
    moves.push(make_move("Slash", "normal", Physical, 70, 0));
    let a = make_mon(1, "Many", &["normal"], [80, 80, 80, 80, 80, 80]);
    let b = make_mon(2, "Some", &["water"], [80, 80, 80, 80, 80, 70]);
    let mut learnsets = learns(
        1,
        &["Tackle", "Quick Attack", "Body Slam", "Slash", "Bite", "Earthquake"],
    );
    learnsets.extend(learns(2, &["Water Gun", "Surf", "Tackle", "Bite", "Psychic"]));
    let catalog = Catalog::new(TypeChart::standard(), vec![a.clone(), b.clone()], moves, learnsets);

    let cfg = BuildConfig {
        max_combinations: 20,
        ..config(ScenarioType::AllCombinations)
    };
    let out = generate_pair_samples(&catalog, &cfg, &a, &b);
    assert_eq!(out.samples.len(), 20);
    assert_eq!(out.skipped, 0);
    let keys: HashSet<_> = out.samples.iter().map(BattleSample::composite_key).collect();
    assert_eq!(keys.len(), 20);
    assert!(out
        .samples
        .iter()
        .all(|s| s.scenario_type == ScenarioType::AllCombinations));

    let wide = BuildConfig {
        max_combinations: 100,
        ..cfg.clone()
    };
    assert_eq!(generate_pair_samples(&catalog, &wide, &a, &b).samples.len(), 30);

    let again = generate_pair_samples(&catalog, &cfg, &a, &b);
    assert_eq!(again, out);
}

#[test]
fn random_move_respects_sample_count() {
    let catalog = roster();
    let cfg = BuildConfig {
        num_random_samples: 3,
        ..config(ScenarioType::RandomMove)
    };
    let eevee = catalog.get_pokemon(133).expect("eevee");
    let snorlax = catalog.get_pokemon(143).expect("snorlax");
    let out = generate_pair_samples(&catalog, &cfg, eevee, snorlax);
    assert!(!out.samples.is_empty() && out.samples.len() <= 3);
    let keys: HashSet<_> = out.samples.iter().map(BattleSample::composite_key).collect();
    assert_eq!(keys.len(), out.samples.len());
    let learnable: HashSet<String> = catalog
        .offensive_moves(133)
        .iter()
        .map(|m| m.name.clone())
        .collect();
    assert!(out.samples.iter().all(|s| learnable.contains(&s.move_a_name)));
}

#[test]
fn same_seed_reproduces_the_dataset() {
    let catalog = roster();
    let cfg = config(ScenarioType::All);
    let first = build_dataset(&catalog, &cfg).expect("builds");
    let second = build_dataset(&catalog, &cfg).expect("builds");
    assert_eq!(first.dataset, second.dataset);
    assert_eq!(first.report, second.report);
}

#[test]
fn split_never_shares_a_composite_key() {
    let catalog = roster();
    let outcome = build_dataset(&catalog, &config(ScenarioType::All)).expect("builds");
    let train: HashSet<_> = outcome
        .dataset
        .train
        .iter()
        .map(BattleSample::composite_key)
        .collect();
    assert!(!outcome.dataset.test.is_empty());
    for row in &outcome.dataset.test {
        assert!(!train.contains(&row.composite_key()));
    }
    assert_eq!(outcome.report.metrics.key_overlap_ratio, 0.0);
}

#[test]
fn split_assignment_depends_only_on_key_and_seed() {
    let catalog = roster();
    let outcome = build_dataset(&catalog, &config(ScenarioType::AllCombinations)).expect("builds");
    let mut rows = outcome.dataset.train.clone();
    rows.extend(outcome.dataset.test.clone());
    let (train_a, test_a) = split_by_key(rows.clone(), 0.2, 42);
    rows.reverse();
    let (train_b, test_b) = split_by_key(rows, 0.2, 42);
    let keys = |v: &[BattleSample]| -> HashSet<_> { v.iter().map(BattleSample::composite_key).collect() };
    assert_eq!(keys(&train_a), keys(&train_b));
    assert_eq!(keys(&test_a), keys(&test_b));
}

#[test]
fn both_splits_are_balanced() {
    let catalog = roster();
    for scenario in [ScenarioType::BestMove, ScenarioType::All] {
        let outcome = build_dataset(&catalog, &config(scenario)).expect("builds");
        for split in [&outcome.report.train, &outcome.report.test] {
            assert!(split.rows > 0);
            assert!(
                (0.3..=0.7).contains(&split.winner_a_share),
                "{scenario}: winner share {}",
                split.winner_a_share
            );
        }
    }
}

#[test]
fn rebalance_downsamples_the_majority() {
    let chart = TypeChart::standard();
    let a = make_mon(1, "A", &["normal"], [50, 50, 50, 50, 50, 50]);
    let b = make_mon(2, "B", &["normal"], [50, 50, 50, 50, 50, 40]);
    let tackle = make_move("Tackle", "normal", MoveCategory::Physical, 40, 0);
    let template = encode(&chart, &a, &tackle, &b, &tackle, ScenarioType::RandomMove).expect("encodes");
    let mut rows: Vec<BattleSample> = (0..10)
        .map(|i| {
            let mut row = template.clone();
            row.move_a_name = format!("Move {i}");
            row.winner = u8::from(i < 8);
            row
        })
        .collect();
    let mut rng = SmallRng::seed_from_u64(7);
    let dropped = rebalance(&mut rows, 0.6, &mut rng);
    assert_eq!(dropped, 5);
    assert_eq!(rows.len(), 5);
    assert_eq!(rows.iter().filter(|r| r.winner == 0).count(), 2);

    let mut balanced = rows.clone();
    assert_eq!(rebalance(&mut balanced, 0.6, &mut rng), 0);
    assert_eq!(balanced, rows);
}

#[test]
fn built_dataset_passes_validation() {
    let catalog = roster();
    for scenario in [
        ScenarioType::BestMove,
        ScenarioType::RandomMove,
        ScenarioType::AllCombinations,
        ScenarioType::All,
    ] {
        let outcome = build_dataset(&catalog, &config(scenario)).expect("builds");
        let (train, test) = outcome.dataset.tables();
        let result = validate(&train, &test, &ValidationPolicy::for_scenario(scenario));
        assert!(result.is_ok(), "{scenario}: {result:?}");
    }
}

#[test]
fn all_mixes_every_policy() {
    let catalog = roster();
    let outcome = build_dataset(&catalog, &config(ScenarioType::All)).expect("builds");
    for scenario in ScenarioType::CONCRETE {
        let count = outcome
            .report
            .rows_per_scenario
            .get(scenario.as_str())
            .copied()
            .unwrap_or(0);
        assert!(count > 0, "no {scenario} rows");
    }
    assert!(!outcome.report.rows_per_scenario.contains_key("all"));
}

#[test]
fn target_size_caps_rows_before_split() {
    let catalog = roster();
    let cfg = BuildConfig {
        max_samples: Some(60),
        ..config(ScenarioType::AllCombinations)
    };
    let outcome = build_dataset(&catalog, &cfg).expect("builds");
    assert!(outcome.report.generated_rows > 60);
    assert_eq!(outcome.report.dropped_for_target, outcome.report.generated_rows - 60);
    assert!(outcome.dataset.train.len() + outcome.dataset.test.len() <= 60);
}

#[test]
fn excessive_skips_abort_the_build() {
    let mut moves = move_pool();
    moves.push(make_move("Odd Beam", "cosmic", MoveCategory::Special, 80, 0));
    let pokemon = vec![
        make_mon(1, "A", &["normal"], [60, 60, 60, 60, 60, 60]),
        make_mon(2, "B", &["water"], [60, 60, 60, 60, 60, 50]),
        make_mon(3, "C", &["fire"], [60, 60, 60, 60, 60, 40]),
    ];
    let mut learnsets = learns(1, &["Tackle", "Odd Beam"]);
    learnsets.extend(learns(2, &["Water Gun", "Odd Beam"]));
    learnsets.extend(learns(3, &["Ember", "Odd Beam"]));
    let catalog = Catalog::new(TypeChart::standard(), pokemon, moves, learnsets);

    let strict = BuildConfig {
        max_skip_rate: 0.0,
        ..config(ScenarioType::AllCombinations)
    };
    match build_dataset(&catalog, &strict) {
        Err(err @ BuildError::ExcessiveSkips { .. }) => {
            assert!(err.affected_samples().unwrap_or(0) > 0);
        }
        other => panic!("expected skip failure, got {other:?}"),
    }

    let lenient = BuildConfig {
        max_skip_rate: 1.0,
        ..strict
    };
    let outcome = build_dataset(&catalog, &lenient).expect("builds");
    assert!(outcome.report.skipped_candidates > 0);
    assert!(outcome.report.skip_rate() > 0.0);
    for row in outcome.dataset.train.iter().chain(&outcome.dataset.test) {
        assert_ne!(row.move_a_name, "Odd Beam");
        assert_ne!(row.move_b_name, "Odd Beam");
    }
}

#[test]
fn invalid_config_fails_before_sampling() {
    let catalog = roster();
    let cfg = BuildConfig {
        num_random_samples: 0,
        ..config(ScenarioType::RandomMove)
    };
    assert_eq!(
        build_dataset(&catalog, &cfg).err(),
        Some(BuildError::Config(ConfigError::NonPositive {
            option: "num_random_samples"
        }))
    );
}

#[test]
fn too_few_eligible_pokemon_is_an_error() {
    let pokemon = vec![make_mon(1, "Solo", &["normal"], [60, 60, 60, 60, 60, 60])];
    let catalog = Catalog::new(
        TypeChart::standard(),
        pokemon,
        move_pool(),
        learns(1, &["Tackle"]),
    );
    assert_eq!(
        build_dataset(&catalog, &config(ScenarioType::BestMove)).err(),
        Some(BuildError::NotEnoughPokemon { eligible: 1 })
    );
}
