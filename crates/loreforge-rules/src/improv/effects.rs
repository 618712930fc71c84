//! Custom-effect bookkeeping: duration tick-down and trigger matching.
//!
//! Effects are opaque to the engine beyond their lifecycle: mechanics
//! strings pass through untouched, and only round-based durations tick
//! with encounter turns. Minute/hour/day durations are advanced by their
//! own clocks at the boundary; permanent and until-removed effects never
//! expire on their own.

use loreforge_types::{CustomEffect, DurationType, EffectId};

/// The partition produced by one duration advance.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationAdvance {
    /// Effects whose counters ticked down but remain active.
    pub advanced: Vec<EffectId>,
    /// Effects that reached zero and were flagged inactive.
    pub expired: Vec<EffectId>,
}

/// Advance every active round-based effect by `rounds`.
///
/// Effects that reach zero remaining rounds are flagged inactive and
/// reported in `expired`. An advance of zero rounds changes nothing and
/// reports nothing.
pub fn advance_round_durations(effects: &mut [CustomEffect], rounds: i64) -> DurationAdvance {
    let mut result = DurationAdvance::default();
    if rounds <= 0 {
        return result;
    }

    for effect in effects.iter_mut() {
        if !effect.is_active || effect.duration.duration_type != DurationType::Rounds {
            continue;
        }
        let remaining = effect.duration.value.unwrap_or(0);
        let next = remaining.saturating_sub(rounds);
        if next <= 0 {
            effect.duration.value = Some(0);
            effect.is_active = false;
            result.expired.push(effect.id.clone());
        } else {
            effect.duration.value = Some(next);
            result.advanced.push(effect.id.clone());
        }
    }
    result
}

/// Does this effect have a trigger for `event`? Inactive effects never
/// fire.
pub fn matches_trigger(effect: &CustomEffect, event: &str) -> bool {
    effect.is_active
        && effect
            .triggers
            .iter()
            .any(|trigger| trigger.event.eq_ignore_ascii_case(event))
}

/// The active effects on a target that fire for `event`, in application
/// order.
pub fn triggered<'a>(effects: &'a [CustomEffect], event: &str) -> Vec<&'a CustomEffect> {
    effects
        .iter()
        .filter(|effect| matches_trigger(effect, event))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use loreforge_types::{
        CharacterId, EffectCategory, EffectDuration, EffectTrigger,
    };

    use super::*;

    fn effect(id: &str, duration_type: DurationType, value: Option<i64>) -> CustomEffect {
        CustomEffect {
            id: EffectId::new(id),
            target_id: CharacterId::new("hero"),
            target_type: String::from("character"),
            name: format!("effect {id}"),
            category: EffectCategory::Boon,
            power_level: 2,
            mechanics: vec![String::from("+2 to saves")],
            duration: EffectDuration {
                duration_type,
                value,
            },
            triggers: vec![EffectTrigger {
                event: String::from("turn_start"),
                condition: None,
            }],
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn round_effects_tick_down_and_expire() {
        let mut effects = vec![
            effect("a", DurationType::Rounds, Some(3)),
            effect("b", DurationType::Rounds, Some(1)),
        ];
        let advance = advance_round_durations(&mut effects, 1);
        assert_eq!(advance.advanced, vec![EffectId::new("a")]);
        assert_eq!(advance.expired, vec![EffectId::new("b")]);

        let a = effects.iter().find(|e| e.id.as_str() == "a").unwrap();
        assert_eq!(a.duration.value, Some(2));
        assert!(a.is_active);
        let b = effects.iter().find(|e| e.id.as_str() == "b").unwrap();
        assert!(!b.is_active);
        assert_eq!(b.duration.value, Some(0));
    }

    #[test]
    fn zero_round_advance_is_a_noop() {
        let mut effects = vec![effect("a", DurationType::Rounds, Some(3))];
        let advance = advance_round_durations(&mut effects, 0);
        assert_eq!(advance, DurationAdvance::default());
        assert_eq!(
            effects.first().unwrap().duration.value,
            Some(3)
        );
    }

    #[test]
    fn non_round_durations_do_not_tick() {
        let mut effects = vec![
            effect("days", DurationType::Days, Some(2)),
            effect("perm", DurationType::Permanent, None),
            effect("held", DurationType::UntilRemoved, None),
        ];
        let advance = advance_round_durations(&mut effects, 5);
        assert!(advance.advanced.is_empty());
        assert!(advance.expired.is_empty());
        assert!(effects.iter().all(|e| e.is_active));
    }

    #[test]
    fn inactive_effects_are_skipped() {
        let mut expired = effect("gone", DurationType::Rounds, Some(2));
        expired.is_active = false;
        let mut effects = vec![expired];
        let advance = advance_round_durations(&mut effects, 1);
        assert!(advance.advanced.is_empty());
        assert!(advance.expired.is_empty());
    }

    #[test]
    fn triggers_match_case_insensitively_on_active_effects() {
        let active = effect("a", DurationType::Rounds, Some(2));
        let mut dormant = effect("b", DurationType::Rounds, Some(2));
        dormant.is_active = false;
        let effects = vec![active, dormant];

        let fired = triggered(&effects, "TURN_START");
        assert_eq!(fired.len(), 1);
        assert_eq!(fired.first().unwrap().id.as_str(), "a");
        assert!(triggered(&effects, "turn_end").is_empty());
    }
}
