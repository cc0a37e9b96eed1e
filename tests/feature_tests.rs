use pokemon_battle_dataset::features::{
    column_kind, column_names, encode, feature_columns, ColumnKind, EncodeError, COLUMNS,
    FEATURE_SCHEMA_VERSION, NO_TYPE,
};
use pokemon_battle_dataset::model::{Move, MoveCategory, Pokemon, Stats};
use pokemon_battle_dataset::scenario::ScenarioType;
use pokemon_battle_dataset::types::TypeChart;
use proptest::prelude::*;

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

#[test]
fn schema_columns_are_stable() {
    let expected = [
        "pokemon_a_id",
        "pokemon_b_id",
        "move_a_name",
        "move_b_name",
        "a_hp",
        "a_attack",
        "a_defense",
        "a_special_attack",
        "a_special_defense",
        "a_speed",
        "b_hp",
        "b_attack",
        "b_defense",
        "b_special_attack",
        "b_special_defense",
        "b_speed",
        "a_type_1",
        "a_type_2",
        "b_type_1",
        "b_type_2",
        "move_a_power",
        "move_a_type",
        "move_a_priority",
        "move_a_stab",
        "move_a_type_multiplier",
        "move_a_effective_power",
        "move_b_power",
        "move_b_type",
        "move_b_priority",
        "move_b_stab",
        "move_b_type_multiplier",
        "move_b_effective_power",
        "speed_diff",
        "hp_diff",
        "a_total_stats",
        "b_total_stats",
        "a_moves_first",
        "winner",
        "scenario_type",
        "knockout",
        "schema_version",
    ];
    assert_eq!(column_names(), expected.to_vec());
    assert_eq!(FEATURE_SCHEMA_VERSION, "v2");
    assert_eq!(column_kind("pokemon_a_id"), Some(ColumnKind::Identity));
    assert_eq!(column_kind("a_type_2"), Some(ColumnKind::Categorical));
    assert_eq!(column_kind("winner"), Some(ColumnKind::Label));
    assert_eq!(column_kind("accuracy"), None);
}

#[test]
fn outcome_columns_are_labels_not_features() {
    for outcome in ["winner", "knockout"] {
        assert_eq!(column_kind(outcome), Some(ColumnKind::Label));
    }
    let features = feature_columns();
    assert!(!features.contains(&"winner"));
    assert!(!features.contains(&"knockout"));
    assert!(!features.contains(&"pokemon_a_id"));
    assert!(!features.contains(&"move_b_name"));
    // Turn order is known before the exchange and stays an input.
    assert!(features.contains(&"a_moves_first"));
    assert_eq!(features.len(), column_names().len() - 6);
    for (name, kind) in COLUMNS {
        if kind == ColumnKind::Numeric {
            assert!(features.contains(&name), "{name} missing from features");
        }
    }
}

#[test]
fn encoded_row_carries_both_sides() {
    let chart = TypeChart::standard();
    let squirtle = make_mon(7, "Squirtle", &["water"], [44, 48, 65, 50, 64, 43]);
    let charizard = make_mon(6, "Charizard", &["fire", "flying"], [78, 84, 78, 109, 85, 100]);
    let water_gun = make_move("Water Gun", "water", MoveCategory::Special, 40, 0);
    let flamethrower = make_move("Flamethrower", "fire", MoveCategory::Special, 90, 0);

    let row = encode(
        &chart,
        &squirtle,
        &water_gun,
        &charizard,
        &flamethrower,
        ScenarioType::BestMove,
    )
    .expect("encodes");

    assert_eq!(
        row.composite_key(),
        (7, 6, "Water Gun".to_string(), "Flamethrower".to_string())
    );
    assert_eq!(row.a_type_1, "water");
    assert_eq!(row.a_type_2, NO_TYPE);
    assert_eq!(row.b_type_2, "flying");
    assert_eq!(row.move_a_stab, 1.5);
    assert_eq!(row.move_a_type_multiplier, 2.0);
    assert_eq!(row.move_a_effective_power, 120.0);
    assert_eq!(row.move_b_type_multiplier, 0.5);
    assert_eq!(row.move_b_effective_power, 67.5);
    assert_eq!(row.speed_diff, 43 - 100);
    assert_eq!(row.hp_diff, 44 - 78);
    assert_eq!(row.a_total_stats, 314);
    assert_eq!(row.b_total_stats, 534);
    assert_eq!(row.a_moves_first, 0);
    assert_eq!(row.scenario_type, ScenarioType::BestMove);
    assert_eq!(row.schema_version, FEATURE_SCHEMA_VERSION);
    assert_eq!(row.to_record().len(), column_names().len());
}

#[test]
fn record_cells_follow_column_order() {
    let chart = TypeChart::standard();
    let a = make_mon(1, "Bulbasaur", &["grass", "poison"], [45, 49, 49, 65, 65, 45]);
    let b = make_mon(4, "Charmander", &["fire"], [39, 52, 43, 60, 50, 65]);
    let vine = make_move("Vine Whip", "grass", MoveCategory::Physical, 45, 0);
    let ember = make_move("Ember", "fire", MoveCategory::Special, 40, 0);
    let row = encode(&chart, &a, &vine, &b, &ember, ScenarioType::RandomMove).expect("encodes");
    let record = row.to_record();
    let cell = |name: &str| {
        let idx = column_names()
            .iter()
            .position(|c| *c == name)
            .expect("known column");
        record[idx].clone()
    };
    assert_eq!(cell("move_a_name"), "Vine Whip");
    assert_eq!(cell("a_type_2"), "poison");
    assert_eq!(cell("b_type_2"), "none");
    assert_eq!(cell("scenario_type"), "random_move");
    assert_eq!(cell("move_a_type_multiplier"), "0.5");
    assert_eq!(cell("move_b_type_multiplier"), "2");
    assert_eq!(cell("winner"), row.winner.to_string());
}

#[test]
fn status_moves_cannot_be_encoded() {
    let chart = TypeChart::standard();
    let a = make_mon(1, "A", &["normal"], [50, 50, 50, 50, 50, 50]);
    let b = make_mon(2, "B", &["normal"], [50, 50, 50, 50, 50, 50]);
    let growl = make_move("Growl", "normal", MoveCategory::Status, 0, 0);
    let tackle = make_move("Tackle", "normal", MoveCategory::Physical, 40, 0);
    assert!(matches!(
        encode(&chart, &a, &tackle, &b, &growl, ScenarioType::RandomMove),
        Err(EncodeError::Resolve(_))
    ));
}

const TYPES: [&str; 8] = [
    "normal", "fire", "water", "grass", "electric", "ground", "flying", "ghost",
];

fn arb_mon(id: u32) -> impl Strategy<Value = Pokemon> {
    (
        0..TYPES.len(),
        proptest::option::of(0..TYPES.len()),
        proptest::array::uniform6(1u32..=255),
    )
        .prop_map(move |(t1, t2, stats)| {
            let mut types = vec![TYPES[t1]];
            if let Some(t2) = t2.filter(|t2| *t2 != t1) {
                types.push(TYPES[t2]);
            }
            make_mon(id, &format!("mon{id}"), &types, stats)
        })
}

fn arb_move(name: &'static str) -> impl Strategy<Value = Move> {
    (0..TYPES.len(), 1u32..=250, -1i32..=2).prop_map(move |(t, power, priority)| {
        make_move(name, TYPES[t], MoveCategory::Physical, power, priority)
    })
}

proptest! {
    #[test]
    fn derived_columns_match_their_definitions(
        a in arb_mon(10),
        b in arb_mon(20),
        ma in arb_move("Alpha"),
        mb in arb_move("Beta"),
    ) {
        let chart = TypeChart::standard();
        let row = encode(&chart, &a, &ma, &b, &mb, ScenarioType::AllCombinations).expect("encodes");
        prop_assert_eq!(
            row.move_a_effective_power,
            row.move_a_power as f32 * row.move_a_stab * row.move_a_type_multiplier
        );
        prop_assert_eq!(
            row.move_b_effective_power,
            row.move_b_power as f32 * row.move_b_stab * row.move_b_type_multiplier
        );
        prop_assert_eq!(row.speed_diff, row.a_speed as i32 - row.b_speed as i32);
        prop_assert_eq!(row.hp_diff, row.a_hp as i32 - row.b_hp as i32);
        prop_assert_eq!(
            row.a_total_stats,
            row.a_hp + row.a_attack + row.a_defense + row.a_special_attack
                + row.a_special_defense + row.a_speed
        );
        prop_assert!(row.winner <= 1 && row.a_moves_first <= 1 && row.knockout <= 1);
        prop_assert!(row.move_a_stab == 1.0 || row.move_a_stab == 1.5);
    }
}
