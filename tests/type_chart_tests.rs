use pokemon_battle_dataset::types::{
    ChartError, PokemonType, TypeChart, TypeEffectivenessRow, UnknownTypeError, TYPE_COUNT,
};

fn row(attacking: &str, defending: &str, multiplier: f32) -> TypeEffectivenessRow {
    TypeEffectivenessRow {
        attacking_type: attacking.to_string(),
        defending_type: defending.to_string(),
        multiplier,
    }
}

#[test]
fn standard_chart_matches_the_game() {
    let chart = TypeChart::standard();
    assert_eq!(chart.effectiveness("water", "fire"), Ok(2.0));
    assert_eq!(chart.effectiveness("fire", "water"), Ok(0.5));
    assert_eq!(chart.effectiveness("normal", "ghost"), Ok(0.0));
    assert_eq!(chart.effectiveness("electric", "ground"), Ok(0.0));
    assert_eq!(chart.effectiveness("dragon", "fairy"), Ok(0.0));
    assert_eq!(chart.effectiveness("fairy", "dragon"), Ok(2.0));
    assert_eq!(chart.effectiveness("normal", "normal"), Ok(1.0));
}

#[test]
fn type_names_are_case_insensitive() {
    let chart = TypeChart::standard();
    assert_eq!(chart.effectiveness("Water", "FIRE"), Ok(2.0));
    assert_eq!(PokemonType::from_name("Psychic"), Ok(PokemonType::Psychic));
}

#[test]
fn unknown_type_is_an_error_not_neutral() {
    let chart = TypeChart::standard();
    assert_eq!(
        chart.effectiveness("shadow", "fire"),
        Err(UnknownTypeError {
            name: "shadow".to_string()
        })
    );
    assert!(chart.effectiveness_against("water", &["fire", "???"]).is_err());
}

#[test]
fn dual_types_multiply() {
    let chart = TypeChart::standard();
    assert_eq!(chart.effectiveness_against("ice", &["dragon", "flying"]), Ok(4.0));
    assert_eq!(chart.effectiveness_against("fire", &["water", "rock"]), Ok(0.25));
    assert_eq!(chart.effectiveness_against("ground", &["water", "flying"]), Ok(0.0));
    assert_eq!(chart.effectiveness_against("grass", &["water", "ground"]), Ok(4.0));
}

#[test]
fn every_standard_cell_is_a_chart_value() {
    let chart = TypeChart::standard();
    let rows = chart.rows();
    assert_eq!(rows.len(), TYPE_COUNT * TYPE_COUNT);
    for r in rows {
        assert!(
            [0.0, 0.5, 1.0, 2.0].contains(&r.multiplier),
            "{} -> {} = {}",
            r.attacking_type,
            r.defending_type,
            r.multiplier
        );
    }
}

#[test]
fn loaded_chart_must_be_complete() {
    let mut rows = TypeChart::standard().rows();
    rows.retain(|r| !(r.attacking_type == "fire" && r.defending_type == "grass"));
    match TypeChart::from_entries(&rows) {
        Err(ChartError::Incomplete {
            missing,
            attacking,
            defending,
        }) => {
            assert_eq!(missing, 1);
            assert_eq!(attacking, PokemonType::Fire);
            assert_eq!(defending, PokemonType::Grass);
        }
        other => panic!("expected incomplete chart, got {other:?}"),
    }
}

#[test]
fn loaded_chart_rejects_bad_values() {
    let mut rows = TypeChart::standard().rows();
    rows.push(row("water", "fire", 3.0));
    assert!(matches!(
        TypeChart::from_entries(&rows),
        Err(ChartError::InvalidMultiplier { .. })
    ));

    let mut rows = TypeChart::standard().rows();
    rows.push(row("water", "fire", 0.5));
    assert!(matches!(
        TypeChart::from_entries(&rows),
        Err(ChartError::Conflict { .. })
    ));

    let mut rows = TypeChart::standard().rows();
    rows.push(row("cosmic", "fire", 1.0));
    assert!(matches!(
        TypeChart::from_entries(&rows),
        Err(ChartError::UnknownType(_))
    ));
}

#[test]
fn loaded_chart_may_differ_from_standard() {
    let mut rows = TypeChart::standard().rows();
    for r in rows.iter_mut() {
        if r.attacking_type == "water" && r.defending_type == "fire" {
            r.multiplier = 1.0;
        }
    }
    let chart = TypeChart::from_entries(&rows).expect("complete chart");
    assert_eq!(chart.effectiveness("water", "fire"), Ok(1.0));
    assert_eq!(chart.effectiveness("fire", "water"), Ok(0.5));
}
