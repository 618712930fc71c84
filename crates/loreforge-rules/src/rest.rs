//! Rest mechanics.
//!
//! A long rest restores a character to full HP and refills their hit-dice
//! pool. A short rest spends hit dice: each die heals
//! `max(1, roll + con modifier)`, and the total is capped by the missing
//! HP. Wasted overflow is the player's problem, as tradition demands.

use loreforge_core::dice::SeededDice;
use loreforge_types::Character;

use crate::character::{ability_modifier, clamp_hp};

// ---------------------------------------------------------------------------
// Long rest
// ---------------------------------------------------------------------------

/// The result of a long rest.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LongRestOutcome {
    /// HP before the rest.
    pub previous_hp: i64,
    /// HP after the rest (always `max_hp`).
    pub hp: i64,
    /// HP regained.
    pub restored: i64,
    /// Hit dice available after the rest.
    pub hit_dice_remaining: i64,
}

/// Resolve a long rest: full HP, full hit-dice pool.
pub fn resolve_long_rest(character: &Character) -> LongRestOutcome {
    let previous_hp = character.hp;
    let hp = character.max_hp;
    LongRestOutcome {
        previous_hp,
        hp,
        restored: hp.saturating_sub(previous_hp).max(0),
        hit_dice_remaining: character.level.max(0),
    }
}

// ---------------------------------------------------------------------------
// Short rest
// ---------------------------------------------------------------------------

/// The result of a short rest.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortRestOutcome {
    /// Hit dice actually spent (clamped by the remaining pool).
    pub dice_spent: i64,
    /// Each die's raw roll.
    pub rolls: Vec<i64>,
    /// HP regained after the missing-HP cap.
    pub healed: i64,
    /// HP after the rest.
    pub hp: i64,
    /// Hit dice left after the rest.
    pub hit_dice_remaining: i64,
}

/// Resolve a short rest spending up to `requested_dice` hit dice.
///
/// Each die heals `max(1, roll + con modifier)`; the sum is capped at
/// `max_hp - hp`. A request of zero (or a character with no dice left)
/// heals nothing and is not an error.
pub fn resolve_short_rest(
    character: &Character,
    requested_dice: i64,
    dice: &mut SeededDice,
) -> ShortRestOutcome {
    let con_modifier = ability_modifier(character.stats.con);
    let available = character.hit_dice_remaining.max(0);
    let to_spend = requested_dice.max(0).min(available);
    let die_sides = u32::try_from(character.hit_die.clamp(4, 12)).unwrap_or(8);

    let mut rolls = Vec::new();
    let mut healed_raw: i64 = 0;
    for _ in 0..to_spend {
        let roll = dice.roll(die_sides);
        rolls.push(roll);
        healed_raw = healed_raw.saturating_add(roll.saturating_add(con_modifier).max(1));
    }

    let missing = character.max_hp.saturating_sub(character.hp).max(0);
    let healed = healed_raw.min(missing);
    let hp = clamp_hp(character.hp.saturating_add(healed), character.max_hp);

    ShortRestOutcome {
        dice_spent: to_spend,
        rolls,
        healed,
        hp,
        hit_dice_remaining: available.saturating_sub(to_spend),
    }
}
