//! Stunt ("rule of cool") resolution.
//!
//! A stunt is an improvised action rolled as a skill check against a DC
//! in [5, 35]. Advantage and disadvantage never stack. Classification:
//!
//! - natural 20, or beat the DC by 10+  -> critical success
//! - natural 1, or miss the DC by 10+   -> critical failure
//! - otherwise meet-or-beat wins
//!
//! On success with damage declared, each target may roll a saving throw:
//! passing halves the damage (when the stunt allows it) or negates it,
//! and conditions attach only on failed saves. A critical failure with
//! self-damage declared hurts the actor.

use loreforge_core::dice::{DiceExpr, RollBreakdown, SeededDice};
use loreforge_types::{AdvantageMode, CharacterId, Skill, Stats, StuntOutcome};

use crate::character::skill_modifier;
use crate::error::RulesError;

/// Margin at which a success or failure becomes critical.
const CRITICAL_MARGIN: i64 = 10;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One target of a stunt, with an optional saving throw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuntTarget {
    /// The target.
    pub id: CharacterId,
    /// Saving-throw DC; `None` means no save, full effect.
    pub saving_throw_dc: Option<i64>,
    /// Whether a passed save halves instead of negating.
    pub half_on_save: bool,
    /// Conditions attached on a failed save.
    pub conditions: Vec<String>,
}

/// A validated stunt ready for resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuntInput {
    /// The acting character.
    pub actor: CharacterId,
    /// The skill the check is rolled with.
    pub skill: Skill,
    /// Difficulty class, 5–35 (bounded upstream).
    pub dc: i64,
    /// Advantage mode for the d20.
    pub advantage: AdvantageMode,
    /// Damage dealt to targets on success.
    pub success_damage: Option<DiceExpr>,
    /// Damage dealt to the actor on a critical failure.
    pub failure_damage: Option<DiceExpr>,
    /// Targets affected on success.
    pub targets: Vec<StuntTarget>,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Per-target resolution of a successful stunt.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetResolution {
    /// The target.
    pub id: CharacterId,
    /// The save roll, when a save was allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_roll: Option<i64>,
    /// The save DC, when a save was allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_dc: Option<i64>,
    /// Whether the save passed.
    pub saved: bool,
    /// Damage this target takes after the save.
    pub damage: i64,
    /// Conditions attached (only on failed saves).
    pub conditions_applied: Vec<String>,
}

/// The full structured result of a stunt.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StuntReport {
    /// The actor.
    pub actor: CharacterId,
    /// The skill used.
    pub skill: Skill,
    /// All d20 dice rolled (two under advantage or disadvantage).
    pub rolls: Vec<i64>,
    /// The die kept.
    pub roll: i64,
    /// The skill modifier added.
    pub modifier: i64,
    /// Roll plus modifier.
    pub total: i64,
    /// The DC.
    pub dc: i64,
    /// Margin over the DC (`total - dc`).
    pub margin: i64,
    /// The classification.
    pub outcome: StuntOutcome,
    /// Damage rolled on success (doubled total on a critical success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage_rolled: Option<RollBreakdown>,
    /// Per-target outcomes (empty on failure).
    pub targets: Vec<TargetResolution>,
    /// Self-damage taken on a critical failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_damage: Option<RollBreakdown>,
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Classify a kept die and margin into an outcome.
pub const fn classify(natural: i64, margin: i64) -> StuntOutcome {
    if natural == 20 || margin >= CRITICAL_MARGIN {
        return StuntOutcome::CriticalSuccess;
    }
    if natural == 1 || margin <= -CRITICAL_MARGIN {
        return StuntOutcome::CriticalFailure;
    }
    if margin >= 0 {
        StuntOutcome::Success
    } else {
        StuntOutcome::Failure
    }
}

/// Resolve a stunt against the actor's stat block.
pub fn resolve_stunt(
    input: &StuntInput,
    actor_stats: &Stats,
    dice: &mut SeededDice,
) -> Result<StuntReport, RulesError> {
    let d20 = dice.d20_with(input.advantage);
    let modifier = skill_modifier(actor_stats, input.skill);
    let total = d20.result.saturating_add(modifier);
    let margin = total.saturating_sub(input.dc);
    let outcome = classify(d20.result, margin);

    let succeeded = matches!(
        outcome,
        StuntOutcome::Success | StuntOutcome::CriticalSuccess
    );

    let mut damage_rolled = None;
    let mut targets = Vec::new();
    if succeeded {
        let base_damage = match &input.success_damage {
            Some(expr) => {
                let mut breakdown = dice.roll_expr(expr);
                if outcome == StuntOutcome::CriticalSuccess {
                    breakdown.total = breakdown.total.saturating_mul(2);
                }
                let total_damage = breakdown.total;
                damage_rolled = Some(breakdown);
                total_damage
            }
            None => 0,
        };

        for target in &input.targets {
            let resolution = resolve_target(target, base_damage, dice);
            targets.push(resolution);
        }
    }

    let self_damage = if outcome == StuntOutcome::CriticalFailure {
        input
            .failure_damage
            .as_ref()
            .map(|expr| dice.roll_expr(expr))
    } else {
        None
    };

    Ok(StuntReport {
        actor: input.actor.clone(),
        skill: input.skill,
        rolls: d20.rolls,
        roll: d20.result,
        modifier,
        total,
        dc: input.dc,
        margin,
        outcome,
        damage_rolled,
        targets,
        self_damage,
    })
}

/// Resolve one target's saving throw against the rolled damage.
fn resolve_target(
    target: &StuntTarget,
    base_damage: i64,
    dice: &mut SeededDice,
) -> TargetResolution {
    match target.saving_throw_dc {
        None => TargetResolution {
            id: target.id.clone(),
            save_roll: None,
            save_dc: None,
            saved: false,
            damage: base_damage,
            conditions_applied: target.conditions.clone(),
        },
        Some(save_dc) => {
            let roll = dice.d20();
            let saved = roll >= save_dc;
            let damage = if saved {
                if target.half_on_save {
                    base_damage.div_euclid(2)
                } else {
                    0
                }
            } else {
                base_damage
            };
            TargetResolution {
                id: target.id.clone(),
                save_roll: Some(roll),
                save_dc: Some(save_dc),
                saved,
                damage,
                conditions_applied: if saved {
                    Vec::new()
                } else {
                    target.conditions.clone()
                },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(dc: i64, advantage: AdvantageMode) -> StuntInput {
        StuntInput {
            actor: CharacterId::new("hero"),
            skill: Skill::Athletics,
            dc,
            advantage,
            success_damage: None,
            failure_damage: None,
            targets: Vec::new(),
        }
    }

    fn strong_stats() -> Stats {
        Stats {
            str: 18, // +4 athletics
            ..Stats::baseline()
        }
    }

    #[test]
    fn classification_bands() {
        assert_eq!(classify(20, -5), StuntOutcome::CriticalSuccess);
        assert_eq!(classify(15, 10), StuntOutcome::CriticalSuccess);
        assert_eq!(classify(1, 5), StuntOutcome::CriticalFailure);
        assert_eq!(classify(5, -10), StuntOutcome::CriticalFailure);
        assert_eq!(classify(12, 0), StuntOutcome::Success);
        assert_eq!(classify(12, 4), StuntOutcome::Success);
        assert_eq!(classify(8, -1), StuntOutcome::Failure);
    }

    #[test]
    fn modifier_comes_from_the_skill_table() {
        let mut dice = SeededDice::new("stunt-mod");
        let report = resolve_stunt(&input(10, AdvantageMode::Normal), &strong_stats(), &mut dice)
            .unwrap();
        assert_eq!(report.modifier, 4);
        assert_eq!(report.total, report.roll + 4);
        assert_eq!(report.margin, report.total - 10);
    }

    #[test]
    fn advantage_rolls_two_dice_and_keeps_the_better() {
        let mut dice = SeededDice::new("stunt-adv");
        let report = resolve_stunt(
            &input(10, AdvantageMode::Advantage),
            &strong_stats(),
            &mut dice,
        )
        .unwrap();
        assert_eq!(report.rolls.len(), 2);
        assert_eq!(report.roll, *report.rolls.iter().max().unwrap());
    }

    #[test]
    fn success_damage_is_rolled_and_doubled_on_crit() {
        // DC 5 with +4: only a natural 1 fails. Sweep seeds for a clean
        // success and a critical success and check damage behavior.
        let mut saw_plain = false;
        let mut saw_crit = false;
        for i in 0..300 {
            let mut dice = SeededDice::new(&format!("dmg-{i}"));
            let mut stunt = input(5, AdvantageMode::Normal);
            stunt.success_damage = Some(DiceExpr::flat(10));
            let report = resolve_stunt(&stunt, &strong_stats(), &mut dice).unwrap();
            match report.outcome {
                StuntOutcome::Success => {
                    saw_plain = true;
                    assert_eq!(report.damage_rolled.unwrap().total, 10);
                }
                StuntOutcome::CriticalSuccess => {
                    saw_crit = true;
                    assert_eq!(report.damage_rolled.unwrap().total, 20);
                }
                _ => {}
            }
            if saw_plain && saw_crit {
                break;
            }
        }
        assert!(saw_plain && saw_crit);
    }

    #[test]
    fn saves_halve_or_negate_and_gate_conditions() {
        let mut stunt = input(5, AdvantageMode::Normal);
        stunt.success_damage = Some(DiceExpr::flat(10));
        stunt.targets = vec![
            StuntTarget {
                id: CharacterId::new("half"),
                saving_throw_dc: Some(1), // always saves (roll >= 1)
                half_on_save: true,
                conditions: vec![String::from("prone")],
            },
            StuntTarget {
                id: CharacterId::new("negate"),
                saving_throw_dc: Some(1),
                half_on_save: false,
                conditions: vec![String::from("prone")],
            },
            StuntTarget {
                id: CharacterId::new("no-save"),
                saving_throw_dc: None,
                half_on_save: false,
                conditions: vec![String::from("stunned")],
            },
        ];

        // Find a seed with a plain (non-critical) success for a stable
        // base damage of 10.
        for i in 0..300 {
            let mut dice = SeededDice::new(&format!("save-{i}"));
            let report = resolve_stunt(&stunt, &strong_stats(), &mut dice).unwrap();
            if report.outcome != StuntOutcome::Success {
                continue;
            }
            let by_id = |id: &str| {
                report
                    .targets
                    .iter()
                    .find(|t| t.id.as_str() == id)
                    .cloned()
                    .unwrap()
            };
            let half = by_id("half");
            assert!(half.saved);
            assert_eq!(half.damage, 5);
            assert!(half.conditions_applied.is_empty());

            let negate = by_id("negate");
            assert!(negate.saved);
            assert_eq!(negate.damage, 0);

            let no_save = by_id("no-save");
            assert!(!no_save.saved);
            assert_eq!(no_save.damage, 10);
            assert_eq!(no_save.conditions_applied, vec![String::from("stunned")]);
            return;
        }
        panic!("no plain success found in seed sweep");
    }

    #[test]
    fn critical_failure_rolls_self_damage() {
        let mut stunt = input(35, AdvantageMode::Disadvantage);
        stunt.failure_damage = Some(DiceExpr::flat(7));
        // DC 35 with +4 cannot be reached (max total 24): every resolution
        // is a failure, critically when the margin is 10+ under or a
        // natural 1 shows up. Margin <= -11 always, so always critical.
        let mut dice = SeededDice::new("faceplant");
        let report = resolve_stunt(&stunt, &strong_stats(), &mut dice).unwrap();
        assert_eq!(report.outcome, StuntOutcome::CriticalFailure);
        assert_eq!(report.self_damage.unwrap().total, 7);
        assert!(report.targets.is_empty());
    }
}
