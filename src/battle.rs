//! Single-exchange battle resolution used to label training samples.
//!
//! Each side uses exactly one move. Turn order follows the game (priority,
//! then speed), with a fixed identity tie-break instead of the game's coin
//! flip so the same inputs always produce the same label.

use crate::model::{Move, MoveCategory, Pokemon};
use crate::types::{TypeChart, UnknownTypeError};
use std::cmp::Ordering;
use thiserror::Error;

/// Level every combatant is assumed to fight at.
pub const BATTLE_LEVEL: f64 = 50.0;
pub const STAB_BONUS: f32 = 1.5;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("{pokemon} cannot battle with status move {move_name}")]
    StatusMove { pokemon: String, move_name: String },
    #[error(transparent)]
    UnknownType(#[from] UnknownTypeError),
}

/// What one side's move does to the other side.
#[derive(Clone, Debug, PartialEq)]
pub struct Attack {
    pub stab: f32,
    pub type_multiplier: f32,
    pub effective_power: f32,
    pub damage: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub a: Attack,
    pub b: Attack,
    pub first: Side,
    pub winner: Side,
    /// True when the winning hit exceeds the loser's hp.
    pub knockout: bool,
}

impl Resolution {
    pub fn attack(&self, side: Side) -> &Attack {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    pub fn a_moves_first(&self) -> bool {
        self.first == Side::A
    }

    pub fn a_wins(&self) -> bool {
        self.winner == Side::A
    }
}

pub fn stab(attacker: &Pokemon, move_def: &Move) -> f32 {
    if attacker.has_type(&move_def.move_type) {
        STAB_BONUS
    } else {
        1.0
    }
}

/// `power × STAB × type multiplier` against every type of the defender.
pub fn effective_power(
    chart: &TypeChart,
    attacker: &Pokemon,
    move_def: &Move,
    defender: &Pokemon,
) -> Result<f32, UnknownTypeError> {
    let type_mod = chart.effectiveness_against(&move_def.move_type, &defender.types)?;
    Ok(move_def.power_value() as f32 * stab(attacker, move_def) * type_mod)
}

/// Level-50 damage formula without the random roll or critical hits.
///
/// Physical moves read attack/defense, special moves special attack/special
/// defense. An immune target (effective power 0) takes no damage.
pub fn estimate_damage(
    attacker: &Pokemon,
    defender: &Pokemon,
    move_def: &Move,
    effective_power: f32,
) -> f64 {
    // Ref: pokemon-showdown/sim/battle-actions.ts getDamage, minus randomizer/crit.
    if effective_power <= 0.0 {
        return 0.0;
    }
    let (atk, def) = match move_def.category {
        MoveCategory::Special => (
            attacker.stats.special_attack,
            defender.stats.special_defense,
        ),
        MoveCategory::Physical | MoveCategory::Status => {
            (attacker.stats.attack, defender.stats.defense)
        }
    };
    let level_factor = 2.0 * BATTLE_LEVEL / 5.0 + 2.0;
    let def = f64::from(def.max(1));
    (level_factor * f64::from(effective_power) * f64::from(atk) / def) / 50.0 + 2.0
}

/// Which side acts first: higher priority, then higher speed, then lower id.
pub fn turn_order(a: &Pokemon, move_a: &Move, b: &Pokemon, move_b: &Move) -> Side {
    let order = move_b
        .priority
        .cmp(&move_a.priority)
        .then_with(|| b.stats.speed.cmp(&a.stats.speed))
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.name.cmp(&b.name));
    match order {
        Ordering::Greater => Side::B,
        Ordering::Less | Ordering::Equal => Side::A,
    }
}

fn attack(
    chart: &TypeChart,
    attacker: &Pokemon,
    move_def: &Move,
    defender: &Pokemon,
) -> Result<Attack, ResolveError> {
    if !move_def.is_offensive() {
        return Err(ResolveError::StatusMove {
            pokemon: attacker.name.clone(),
            move_name: move_def.name.clone(),
        });
    }
    let type_multiplier = chart.effectiveness_against(&move_def.move_type, &defender.types)?;
    let stab = stab(attacker, move_def);
    let effective_power = move_def.power_value() as f32 * stab * type_multiplier;
    Ok(Attack {
        stab,
        type_multiplier,
        effective_power,
        damage: estimate_damage(attacker, defender, move_def, effective_power),
    })
}

/// Resolves one exchange where `a` uses `move_a` and `b` uses `move_b`.
///
/// The first mover wins outright if its damage exceeds the target's hp.
/// Otherwise the second mover answers and the larger damage wins; equal
/// damage goes to the first mover.
///
/// Status moves are a caller error and are reported as [`ResolveError::StatusMove`].
pub fn resolve(
    chart: &TypeChart,
    a: &Pokemon,
    move_a: &Move,
    b: &Pokemon,
    move_b: &Move,
) -> Result<Resolution, ResolveError> {
    let attack_a = attack(chart, a, move_a, b)?;
    let attack_b = attack(chart, b, move_b, a)?;
    let first = turn_order(a, move_a, b, move_b);
    let second = first.opponent();

    let (first_attack, second_attack) = match first {
        Side::A => (&attack_a, &attack_b),
        Side::B => (&attack_b, &attack_a),
    };
    let hp = |side: Side| -> f64 {
        match side {
            Side::A => f64::from(a.stats.hp),
            Side::B => f64::from(b.stats.hp),
        }
    };

    let (winner, knockout) = if first_attack.damage > hp(second) {
        (first, true)
    } else if second_attack.damage > first_attack.damage {
        (second, second_attack.damage > hp(first))
    } else {
        (first, false)
    };

    Ok(Resolution {
        a: attack_a,
        b: attack_b,
        first,
        winner,
        knockout,
    })
}
