//! Arcane synthesis: improvising a spell from raw principles.
//!
//! The caster rolls `d20 + spellcasting modifier` against a DC assembled
//! from the spell level and circumstance:
//!
//! ```text
//! DC = 10 + 2 * level
//!    + 2  if cast mid-combat
//!    + 3  if no related spell is known    (else -2)
//!    - min(5, floor(material value / 100))
//!    - 3  on a ley line or nexus
//!    - 2  under a blood moon or eclipse
//!    + 2  when cast in desperation
//! ```
//!
//! The margin (`total - dc`) selects the outcome band; natural dice
//! override margins at both extremes. Mastery writes the spell into the
//! caster's synthesized spellbook without consuming a slot.

use loreforge_core::dice::{DiceExpr, RollBreakdown, SeededDice};
use loreforge_types::{CharacterId, Stats, SynthesisOutcome};

use crate::character::{ability_modifier, proficiency_bonus};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Base DC before level and circumstance.
const BASE_DC: i64 = 10;

/// DC added per spell level.
const DC_PER_LEVEL: i64 = 2;

/// Largest DC reduction a material component can buy.
const MAX_MATERIAL_REDUCTION: i64 = 5;

/// Margin at or above which the attempt is mastery.
const MASTERY_MARGIN: i64 = 10;

/// Margin at or below which the attempt is catastrophic.
const CATASTROPHE_MARGIN: i64 = -10;

/// Worst margin that still merely fizzles.
const FIZZLE_FLOOR: i64 = -5;

/// The wild-surge table, indexed by d100 bands of five. Entry `i` covers
/// rolls `(5i, 5(i+1)]`.
pub const WILD_SURGE_TABLE: &[&str] = &[
    "The caster's hair turns a vivid, unnatural color for a week.",
    "Every unlocked door within 60 feet slams shut at once.",
    "The caster speaks only in rhyme for the next hour.",
    "A harmless illusory duplicate of the caster appears and mimics them.",
    "All small unattended objects nearby float an inch off the ground.",
    "The caster smells strongly of ozone; animals avoid them for a day.",
    "A sudden localized rain shower soaks everyone within 20 feet.",
    "The nearest torch or lantern flares into a green flame.",
    "The caster's shadow detaches and lags a half-second behind.",
    "Every coin on the caster's person turns temporarily to glass.",
    "A deafening thunderclap marks the spell's failure for a mile around.",
    "The caster ages backward one day; they remember tomorrow's weather.",
    "Grass and moss sprout from every surface the caster touches today.",
    "The spell's energy arcs wild: the nearest creature takes 1d6 force.",
    "The caster is teleported 10 feet in a random direction.",
    "All ambient sound ceases around the caster for one minute.",
    "The caster glows faintly; stealth is impossible until dawn.",
    "A minor elemental mote adopts the caster and refuses to leave.",
    "The caster's voice booms at triple volume for ten minutes.",
    "Reality hiccups: the caster swaps places with their own reflection.",
];

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Circumstances of a synthesis attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisInput {
    /// The caster.
    pub caster: CharacterId,
    /// Name for the improvised spell (used on mastery).
    pub spell_name: String,
    /// Spell level attempted, 1–9 (bounded upstream).
    pub level: i64,
    /// School of magic.
    pub school: String,
    /// Effect kind label (damage, ward, utility, ...).
    pub effect_type: String,
    /// Effect dice, if the spell rolls any.
    pub effect_dice: Option<DiceExpr>,
    /// Cast mid-combat (+2 DC).
    pub in_combat: bool,
    /// The caster knows a related spell (-2 DC; +3 when absent).
    pub has_related_spell: bool,
    /// Gold value of the material component consumed.
    pub material_value: i64,
    /// Standing on a ley line or nexus (-3 DC).
    pub ley_line: bool,
    /// Under a blood moon or eclipse (-2 DC).
    pub celestial_event: bool,
    /// Cast in desperation or urgency (+2 DC).
    pub desperation: bool,
}

// ---------------------------------------------------------------------------
// DC assembly
// ---------------------------------------------------------------------------

/// One labeled component of the DC.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DcComponent {
    /// What the component is for.
    pub label: &'static str,
    /// Its signed contribution.
    pub amount: i64,
}

/// The assembled DC with its breakdown.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DcBreakdown {
    /// Each contributing component.
    pub components: Vec<DcComponent>,
    /// The final DC.
    pub total: i64,
}

/// Assemble the synthesis DC from level and circumstance.
pub fn compute_dc(input: &SynthesisInput) -> DcBreakdown {
    let mut components = vec![
        DcComponent {
            label: "base",
            amount: BASE_DC,
        },
        DcComponent {
            label: "spell_level",
            amount: DC_PER_LEVEL.saturating_mul(input.level.max(1)),
        },
    ];

    if input.in_combat {
        components.push(DcComponent {
            label: "in_combat",
            amount: 2,
        });
    }
    components.push(if input.has_related_spell {
        DcComponent {
            label: "related_spell_known",
            amount: -2,
        }
    } else {
        DcComponent {
            label: "no_related_spell",
            amount: 3,
        }
    });

    let material_reduction = input
        .material_value
        .max(0)
        .div_euclid(100)
        .min(MAX_MATERIAL_REDUCTION);
    if material_reduction > 0 {
        components.push(DcComponent {
            label: "material_component",
            amount: material_reduction.saturating_neg(),
        });
    }
    if input.ley_line {
        components.push(DcComponent {
            label: "ley_line",
            amount: -3,
        });
    }
    if input.celestial_event {
        components.push(DcComponent {
            label: "celestial_event",
            amount: -2,
        });
    }
    if input.desperation {
        components.push(DcComponent {
            label: "desperation",
            amount: 2,
        });
    }

    let total = components
        .iter()
        .fold(0_i64, |sum, c| sum.saturating_add(c.amount));
    DcBreakdown { components, total }
}

/// The caster's spellcasting modifier:
/// `floor((int - 10) / 2) + proficiency bonus`.
pub const fn spellcasting_modifier(stats: &Stats, caster_level: i64) -> i64 {
    ability_modifier(stats.int).saturating_add(proficiency_bonus(caster_level))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// A wild-surge result.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WildSurge {
    /// The d100 roll.
    pub roll: i64,
    /// The table entry.
    pub effect: String,
}

/// The structured result of a synthesis attempt.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisReport {
    /// The caster.
    pub caster: CharacterId,
    /// The raw d20.
    pub roll: i64,
    /// The spellcasting modifier added.
    pub modifier: i64,
    /// Roll plus modifier.
    pub total: i64,
    /// The assembled DC.
    pub dc: DcBreakdown,
    /// `total - dc`.
    pub margin: i64,
    /// The outcome band.
    pub outcome: SynthesisOutcome,
    /// Whether a spell slot is consumed.
    pub spell_slot_consumed: bool,
    /// Whether the spell was permanently mastered.
    pub spell_mastered: bool,
    /// Effect dice rolled on a successful casting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_rolled: Option<RollBreakdown>,
    /// Backfire damage (`level` d6) on a backfire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backfire_damage: Option<RollBreakdown>,
    /// Wild-surge entry on a catastrophe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wild_surge: Option<WildSurge>,
}

/// Select the outcome band. Natural dice override margins, with the
/// natural 1 taking precedence over everything.
pub const fn classify(natural: i64, margin: i64) -> SynthesisOutcome {
    if natural == 1 {
        return SynthesisOutcome::Catastrophic;
    }
    if natural == 20 {
        return SynthesisOutcome::Mastery;
    }
    if margin <= CATASTROPHE_MARGIN {
        return SynthesisOutcome::Catastrophic;
    }
    if margin >= MASTERY_MARGIN {
        return SynthesisOutcome::Mastery;
    }
    if margin >= 0 {
        SynthesisOutcome::Success
    } else if margin >= FIZZLE_FLOOR {
        SynthesisOutcome::Fizzle
    } else {
        SynthesisOutcome::Backfire
    }
}

/// Resolve a synthesis attempt.
pub fn resolve_synthesis(
    input: &SynthesisInput,
    caster_stats: &Stats,
    caster_level: i64,
    dice: &mut SeededDice,
) -> SynthesisReport {
    let dc = compute_dc(input);
    let roll = dice.d20();
    let modifier = spellcasting_modifier(caster_stats, caster_level);
    let total = roll.saturating_add(modifier);
    let margin = total.saturating_sub(dc.total);
    let outcome = classify(roll, margin);

    let spell_mastered = outcome == SynthesisOutcome::Mastery;
    let spell_slot_consumed = !spell_mastered;

    let effect_rolled = if matches!(
        outcome,
        SynthesisOutcome::Mastery | SynthesisOutcome::Success
    ) {
        input.effect_dice.as_ref().map(|expr| dice.roll_expr(expr))
    } else {
        None
    };

    let backfire_damage = if outcome == SynthesisOutcome::Backfire {
        let expr = DiceExpr {
            count: u32::try_from(input.level.clamp(1, 9)).unwrap_or(1),
            sides: 6,
            modifier: 0,
        };
        Some(dice.roll_expr(&expr))
    } else {
        None
    };

    let wild_surge = if outcome == SynthesisOutcome::Catastrophic {
        let surge_roll = dice.d100();
        Some(WildSurge {
            roll: surge_roll,
            effect: surge_entry(surge_roll).to_owned(),
        })
    } else {
        None
    };

    SynthesisReport {
        caster: input.caster.clone(),
        roll,
        modifier,
        total,
        dc,
        margin,
        outcome,
        spell_slot_consumed,
        spell_mastered,
        effect_rolled,
        backfire_damage,
        wild_surge,
    }
}

/// Look up the wild-surge entry for a d100 roll.
pub fn surge_entry(roll: i64) -> &'static str {
    let index = roll.clamp(1, 100).saturating_sub(1).div_euclid(5);
    WILD_SURGE_TABLE
        .get(usize::try_from(index).unwrap_or(0))
        .copied()
        .unwrap_or("The weave shudders, and nothing else happens.")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(level: i64) -> SynthesisInput {
        SynthesisInput {
            caster: CharacterId::new("wizard"),
            spell_name: String::from("Unraveling Bolt"),
            level,
            school: String::from("evocation"),
            effect_type: String::from("damage"),
            effect_dice: Some(DiceExpr {
                count: 3,
                sides: 6,
                modifier: 0,
            }),
            in_combat: false,
            has_related_spell: false,
            material_value: 0,
            ley_line: false,
            celestial_event: false,
            desperation: false,
        }
    }

    fn wizard_stats() -> Stats {
        Stats {
            int: 18,
            ..Stats::baseline()
        }
    }

    #[test]
    fn dc_assembles_all_components() {
        let mut circumstances = input(3);
        circumstances.in_combat = true;
        circumstances.has_related_spell = true;
        circumstances.material_value = 250;
        circumstances.ley_line = true;
        circumstances.celestial_event = true;
        circumstances.desperation = true;
        // 10 + 6 + 2 - 2 - 2 - 3 - 2 + 2 = 11
        assert_eq!(compute_dc(&circumstances).total, 11);
    }

    #[test]
    fn missing_related_spell_raises_dc() {
        // 10 + 6 + 3 = 19
        assert_eq!(compute_dc(&input(3)).total, 19);
    }

    #[test]
    fn material_reduction_caps_at_five() {
        let mut circumstances = input(1);
        circumstances.material_value = 10_000;
        // 10 + 2 + 3 - 5 = 10
        assert_eq!(compute_dc(&circumstances).total, 10);
    }

    #[test]
    fn spellcasting_modifier_is_int_plus_proficiency() {
        // int 18 -> +4, level 5 -> +3
        assert_eq!(spellcasting_modifier(&wizard_stats(), 5), 7);
    }

    #[test]
    fn outcome_bands() {
        assert_eq!(classify(20, -3), SynthesisOutcome::Mastery);
        assert_eq!(classify(14, 10), SynthesisOutcome::Mastery);
        assert_eq!(classify(12, 0), SynthesisOutcome::Success);
        assert_eq!(classify(12, 9), SynthesisOutcome::Success);
        assert_eq!(classify(9, -1), SynthesisOutcome::Fizzle);
        assert_eq!(classify(9, -5), SynthesisOutcome::Fizzle);
        assert_eq!(classify(7, -6), SynthesisOutcome::Backfire);
        assert_eq!(classify(7, -9), SynthesisOutcome::Backfire);
        assert_eq!(classify(1, 5), SynthesisOutcome::Catastrophic);
        assert_eq!(classify(5, -10), SynthesisOutcome::Catastrophic);
    }

    #[test]
    fn mastery_keeps_the_spell_slot() {
        for i in 0..500 {
            let mut dice = SeededDice::new(&format!("mastery-{i}"));
            let report = resolve_synthesis(&input(1), &wizard_stats(), 9, &mut dice);
            if report.outcome == SynthesisOutcome::Mastery {
                assert!(report.spell_mastered);
                assert!(!report.spell_slot_consumed);
                return;
            }
        }
        panic!("no mastery found in seed sweep");
    }

    #[test]
    fn backfire_deals_level_d6() {
        for i in 0..2000 {
            let mut dice = SeededDice::new(&format!("backfire-{i}"));
            let report = resolve_synthesis(&input(4), &Stats::baseline(), 1, &mut dice);
            if report.outcome == SynthesisOutcome::Backfire {
                let damage = report.backfire_damage.unwrap();
                assert_eq!(damage.rolls.len(), 4);
                assert!(damage.total >= 4 && damage.total <= 24);
                return;
            }
        }
        panic!("no backfire found in seed sweep");
    }

    #[test]
    fn catastrophe_rolls_the_surge_table() {
        for i in 0..2000 {
            let mut dice = SeededDice::new(&format!("surge-{i}"));
            let report = resolve_synthesis(&input(9), &Stats::baseline(), 1, &mut dice);
            if report.outcome == SynthesisOutcome::Catastrophic {
                let surge = report.wild_surge.unwrap();
                assert!((1..=100).contains(&surge.roll));
                assert!(!surge.effect.is_empty());
                assert!(report.spell_slot_consumed);
                return;
            }
        }
        panic!("no catastrophe found in seed sweep");
    }

    #[test]
    fn surge_table_covers_every_percent() {
        assert_eq!(WILD_SURGE_TABLE.len(), 20);
        for roll in 1..=100 {
            assert!(!surge_entry(roll).is_empty());
        }
        assert_eq!(surge_entry(1), surge_entry(5));
        assert_ne!(surge_entry(5), surge_entry(6));
        assert_eq!(surge_entry(100), *WILD_SURGE_TABLE.last().unwrap());
    }

    #[test]
    fn determinism_same_seed_same_report() {
        let mut first = SeededDice::new("pin");
        let mut second = SeededDice::new("pin");
        let a = resolve_synthesis(&input(3), &wizard_stats(), 5, &mut first);
        let b = resolve_synthesis(&input(3), &wizard_stats(), 5, &mut second);
        assert_eq!(a, b);
    }
}
