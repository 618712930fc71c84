//! Turn-based combat engine.
//!
//! An encounter moves through `active -> (paused?) -> completed`. The
//! engine owns the token list and the turn pointer; every roll comes from
//! the encounter's own seeded dice stream, so a given encounter seed
//! replays identically.
//!
//! ## Resolution flow
//!
//! 1. Creation rolls `d20 + initiative bonus` per participant and sorts
//!    descending (stable, so insertion order breaks ties)
//! 2. Attacks roll d20: natural 1 always misses, natural 20 critically
//!    hits (damage doubled), otherwise `roll + bonus >= dc` hits
//! 3. Damage is clamped at 0 HP; a token at 0 is defeated but stays in
//!    the initiative order and is skipped on turn advance
//! 4. Ending the encounter produces the final per-token HP list the
//!    persistence layer writes back to character records

use chrono::Utc;

use loreforge_core::dice::{DiceExpr, RollBreakdown, SeededDice};
use loreforge_types::{CharacterId, Encounter, EncounterId, EncounterStatus, Terrain, Token};

use crate::error::RulesError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Name fragments that mark a participant as an enemy when the caller does
/// not say either way.
pub const ENEMY_NAME_TOKENS: &[&str] = &[
    "goblin", "orc", "bandit", "skeleton", "zombie", "wolf", "kobold", "troll", "cultist",
    "dragon", "giant", "spider", "rat", "gnoll", "wraith",
];

/// Critical hits double the rolled damage.
const CRIT_DAMAGE_MULTIPLIER: i64 = 2;

// ---------------------------------------------------------------------------
// Participant specification
// ---------------------------------------------------------------------------

/// One participant as supplied by the caller at encounter creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantSpec {
    /// Participant identifier. If it matches a persisted character the
    /// final HP is written back at encounter end.
    pub id: CharacterId,
    /// Display name; defaults to the identifier.
    pub name: Option<String>,
    /// Starting hit points.
    pub hp: i64,
    /// Maximum hit points.
    pub max_hp: i64,
    /// Armor class.
    pub ac: i64,
    /// Bonus added to the initiative roll.
    pub initiative_bonus: i64,
    /// Enemy flag; `None` defers to the name heuristic.
    pub is_enemy: Option<bool>,
}

/// Classify a participant as enemy or ally when the caller did not say.
/// The caller's explicit flag always wins over this heuristic.
pub fn infer_is_enemy(id: &CharacterId, name: &str) -> bool {
    let id_lower = id.as_str().to_lowercase();
    let name_lower = name.to_lowercase();
    ENEMY_NAME_TOKENS
        .iter()
        .any(|token| id_lower.contains(token) || name_lower.contains(token))
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Input to an attack resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackInput {
    /// The attacking token.
    pub actor: CharacterId,
    /// The targeted token.
    pub target: CharacterId,
    /// Bonus added to the attack roll.
    pub attack_bonus: i64,
    /// Difficulty class the total must meet.
    pub dc: i64,
    /// Damage expression applied on a hit.
    pub damage: DiceExpr,
}

/// The structured result of one attack.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackReport {
    /// The attacker.
    pub actor: CharacterId,
    /// The target.
    pub target: CharacterId,
    /// The raw d20.
    pub roll: i64,
    /// The bonus added.
    pub attack_bonus: i64,
    /// Roll plus bonus.
    pub total: i64,
    /// The difficulty class.
    pub dc: i64,
    /// Whether the attack landed.
    pub hit: bool,
    /// Natural 20.
    pub critical: bool,
    /// Natural 1.
    pub fumble: bool,
    /// Damage dice breakdown, present when damage was rolled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub damage_rolled: Option<RollBreakdown>,
    /// Damage actually subtracted from the target.
    pub damage_applied: i64,
    /// Target HP after the attack.
    pub target_hp: i64,
    /// Whether this attack dropped the target to 0.
    pub target_defeated: bool,
}

/// The structured result of one heal.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealReport {
    /// The healed token.
    pub target: CharacterId,
    /// Amount requested.
    pub amount: i64,
    /// Amount applied after the max-HP cap.
    pub healed: i64,
    /// Target HP after the heal.
    pub target_hp: i64,
}

/// The structured result of a turn advance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReport {
    /// Token whose turn just ended.
    pub previous: CharacterId,
    /// Token whose turn is starting.
    pub active: CharacterId,
    /// The round after the advance.
    pub round: i64,
    /// Whether the advance wrapped past the top of the order.
    pub new_round: bool,
    /// Defeated tokens that were skipped over.
    pub skipped: Vec<CharacterId>,
}

/// Final HP for one participant at encounter end.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalHp {
    /// The participant.
    pub id: CharacterId,
    /// HP when the encounter ended.
    pub hp: i64,
    /// Maximum HP.
    pub max_hp: i64,
    /// Whether they went down.
    pub defeated: bool,
}

/// The structured result of ending an encounter.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndReport {
    /// The encounter.
    pub encounter_id: EncounterId,
    /// Rounds fought.
    pub rounds: i64,
    /// Per-token final state, in initiative order. The persistence layer
    /// writes each entry whose ID matches a stored character back to that
    /// character's HP.
    pub final_hp: Vec<FinalHp>,
    /// `"party"` if every enemy fell, `"enemies"` if every non-enemy
    /// fell, absent when the encounter ended early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victor: Option<String>,
}

// ---------------------------------------------------------------------------
// CombatEngine
// ---------------------------------------------------------------------------

/// The runtime combat engine for one encounter.
#[derive(Debug, Clone)]
pub struct CombatEngine {
    encounter: Encounter,
    dice: SeededDice,
}

impl CombatEngine {
    /// Create an encounter: roll initiative for every participant, sort
    /// descending (stable), and open round 1.
    pub fn new(
        id: EncounterId,
        participants: Vec<ParticipantSpec>,
        seed: &str,
        terrain: Option<Terrain>,
    ) -> Result<Self, RulesError> {
        if participants.is_empty() {
            return Err(RulesError::EmptyEncounter);
        }

        let mut dice = SeededDice::new(seed);
        let mut tokens: Vec<Token> = Vec::with_capacity(participants.len());
        for spec in participants {
            let name = spec.name.clone().unwrap_or_else(|| spec.id.as_str().to_owned());
            let is_enemy = spec
                .is_enemy
                .unwrap_or_else(|| infer_is_enemy(&spec.id, &name));
            let initiative = dice.d20().saturating_add(spec.initiative_bonus);
            tokens.push(Token {
                id: spec.id,
                name,
                hp: spec.hp.max(0),
                max_hp: spec.max_hp.max(1),
                ac: spec.ac,
                initiative,
                initiative_bonus: spec.initiative_bonus,
                is_enemy,
                conditions: Vec::new(),
            });
        }

        // Stable sort: equal initiatives keep insertion order.
        tokens.sort_by(|a, b| b.initiative.cmp(&a.initiative));

        let now = Utc::now();
        Ok(Self {
            encounter: Encounter {
                id,
                status: EncounterStatus::Active,
                round: 1,
                turn_index: 0,
                tokens,
                seed: seed.to_owned(),
                terrain,
                created_at: now,
                updated_at: now,
            },
            dice,
        })
    }

    /// Reconstruct an engine from a persisted snapshot.
    ///
    /// Resumption is deterministic but does not replay past dice: the
    /// resumed stream is derived from the stored seed and the round so the
    /// continuation is reproducible without re-rolling history.
    pub fn from_snapshot(encounter: Encounter) -> Self {
        let resume_seed = format!("{}:resume:{}", encounter.seed, encounter.round);
        Self {
            dice: SeededDice::new(&resume_seed),
            encounter,
        }
    }

    /// The current encounter state.
    pub const fn encounter(&self) -> &Encounter {
        &self.encounter
    }

    /// Resolve an attack.
    pub fn attack(&mut self, input: &AttackInput) -> Result<AttackReport, RulesError> {
        self.ensure_active()?;
        let actor_index = self.token_index(&input.actor)?;
        let target_index = self.token_index(&input.target)?;

        if self
            .encounter
            .tokens
            .get(actor_index)
            .is_some_and(Token::is_defeated)
        {
            return Err(RulesError::ActorDefeated {
                token: input.actor.clone(),
            });
        }
        if self
            .encounter
            .tokens
            .get(target_index)
            .is_some_and(Token::is_defeated)
        {
            return Err(RulesError::TargetDefeated {
                token: input.target.clone(),
            });
        }

        let roll = self.dice.d20();
        let fumble = roll == 1;
        let critical = roll == 20;
        let total = roll.saturating_add(input.attack_bonus);
        let hit = !fumble && (critical || total >= input.dc);

        let mut damage_rolled = None;
        let mut damage_applied = 0;
        if hit {
            let breakdown = self.dice.roll_expr(&input.damage);
            damage_applied = if critical {
                breakdown.total.saturating_mul(CRIT_DAMAGE_MULTIPLIER)
            } else {
                breakdown.total
            }
            .max(0);
            damage_rolled = Some(breakdown);
        }

        let (target_hp, target_defeated) = {
            let target = self
                .encounter
                .tokens
                .get_mut(target_index)
                .ok_or_else(|| RulesError::UnknownToken {
                    encounter: self.encounter.id.clone(),
                    token: input.target.clone(),
                })?;
            target.hp = target.hp.saturating_sub(damage_applied).max(0);
            (target.hp, target.is_defeated())
        };
        self.encounter.updated_at = Utc::now();

        Ok(AttackReport {
            actor: input.actor.clone(),
            target: input.target.clone(),
            roll,
            attack_bonus: input.attack_bonus,
            total,
            dc: input.dc,
            hit,
            critical,
            fumble,
            damage_rolled,
            damage_applied,
            target_hp,
            target_defeated,
        })
    }

    /// Resolve a heal: `hp = min(hp + amount, max_hp)`. No roll.
    pub fn heal(&mut self, target: &CharacterId, amount: i64) -> Result<HealReport, RulesError> {
        self.ensure_active()?;
        let index = self.token_index(target)?;
        let token = self
            .encounter
            .tokens
            .get_mut(index)
            .ok_or_else(|| RulesError::UnknownToken {
                encounter: self.encounter.id.clone(),
                token: target.clone(),
            })?;

        let amount = amount.max(0);
        let before = token.hp;
        token.hp = token.hp.saturating_add(amount).min(token.max_hp);
        let healed = token.hp.saturating_sub(before);
        let target_hp = token.hp;
        self.encounter.updated_at = Utc::now();

        Ok(HealReport {
            target: target.clone(),
            amount,
            healed,
            target_hp,
        })
    }

    /// Advance to the next living token, skipping defeated ones, and
    /// increment the round when the order wraps.
    pub fn advance_turn(&mut self) -> Result<TurnReport, RulesError> {
        self.ensure_active()?;
        let token_count = self.encounter.tokens.len();
        let previous = self
            .encounter
            .active_token_id()
            .cloned()
            .ok_or(RulesError::AllDefeated {
                encounter: self.encounter.id.clone(),
            })?;

        let mut skipped = Vec::new();
        let mut index = self.encounter.turn_index;
        let mut new_round = false;

        for _ in 0..token_count {
            index = index.saturating_add(1);
            if index >= token_count {
                index = 0;
                new_round = true;
            }
            match self.encounter.tokens.get(index) {
                Some(token) if token.is_defeated() => {
                    skipped.push(token.id.clone());
                }
                Some(token) => {
                    self.encounter.turn_index = index;
                    if new_round {
                        self.encounter.round = self.encounter.round.saturating_add(1);
                    }
                    self.encounter.updated_at = Utc::now();
                    return Ok(TurnReport {
                        previous,
                        active: token.id.clone(),
                        round: self.encounter.round,
                        new_round,
                        skipped,
                    });
                }
                None => {}
            }
        }

        Err(RulesError::AllDefeated {
            encounter: self.encounter.id.clone(),
        })
    }

    /// Pause the encounter so it can be resumed later with
    /// [`from_snapshot`].
    ///
    /// [`from_snapshot`]: Self::from_snapshot
    pub fn pause(&mut self) -> Result<(), RulesError> {
        self.ensure_active()?;
        self.encounter.status = EncounterStatus::Paused;
        self.encounter.updated_at = Utc::now();
        Ok(())
    }

    /// Resume a paused encounter.
    pub fn resume(&mut self) -> Result<(), RulesError> {
        if self.encounter.status != EncounterStatus::Paused {
            return Err(RulesError::EncounterNotActive {
                encounter: self.encounter.id.clone(),
                status: self.encounter.status,
            });
        }
        self.encounter.status = EncounterStatus::Active;
        self.encounter.updated_at = Utc::now();
        Ok(())
    }

    /// End the encounter and produce the write-back list.
    ///
    /// Ending an already-completed encounter is rejected so rewards and
    /// write-backs cannot be applied twice.
    pub fn end(&mut self) -> Result<EndReport, RulesError> {
        if self.encounter.status == EncounterStatus::Completed {
            return Err(RulesError::EncounterNotActive {
                encounter: self.encounter.id.clone(),
                status: self.encounter.status,
            });
        }
        self.encounter.status = EncounterStatus::Completed;
        self.encounter.updated_at = Utc::now();

        let final_hp: Vec<FinalHp> = self
            .encounter
            .tokens
            .iter()
            .map(|token| FinalHp {
                id: token.id.clone(),
                hp: token.hp,
                max_hp: token.max_hp,
                defeated: token.is_defeated(),
            })
            .collect();

        let enemies_alive = self
            .encounter
            .tokens
            .iter()
            .any(|t| t.is_enemy && !t.is_defeated());
        let allies_alive = self
            .encounter
            .tokens
            .iter()
            .any(|t| !t.is_enemy && !t.is_defeated());
        let victor = match (enemies_alive, allies_alive) {
            (false, true) => Some(String::from("party")),
            (true, false) => Some(String::from("enemies")),
            _ => None,
        };

        Ok(EndReport {
            encounter_id: self.encounter.id.clone(),
            rounds: self.encounter.round,
            final_hp,
            victor,
        })
    }

    fn ensure_active(&self) -> Result<(), RulesError> {
        if self.encounter.status == EncounterStatus::Active {
            Ok(())
        } else {
            Err(RulesError::EncounterNotActive {
                encounter: self.encounter.id.clone(),
                status: self.encounter.status,
            })
        }
    }

    fn token_index(&self, id: &CharacterId) -> Result<usize, RulesError> {
        self.encounter
            .tokens
            .iter()
            .position(|token| &token.id == id)
            .ok_or_else(|| RulesError::UnknownToken {
                encounter: self.encounter.id.clone(),
                token: id.clone(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn spec(id: &str, hp: i64, bonus: i64) -> ParticipantSpec {
        ParticipantSpec {
            id: CharacterId::new(id),
            name: None,
            hp,
            max_hp: hp,
            ac: 12,
            initiative_bonus: bonus,
            is_enemy: None,
        }
    }

    fn engine(seed: &str) -> CombatEngine {
        CombatEngine::new(
            EncounterId::new("e-1"),
            vec![spec("hero", 20, 2), spec("goblin", 7, 1)],
            seed,
            None,
        )
        .unwrap()
    }

    #[test]
    fn creation_requires_participants() {
        let result = CombatEngine::new(EncounterId::new("e-0"), Vec::new(), "seed", None);
        assert_eq!(result.err(), Some(RulesError::EmptyEncounter));
    }

    #[test]
    fn initiative_is_descending_and_deterministic() {
        let first = engine("battle-1");
        let second = engine("battle-1");
        let order: Vec<&str> = first
            .encounter()
            .tokens
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        let order_again: Vec<&str> = second
            .encounter()
            .tokens
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(order, order_again);
        for pair in first.encounter().tokens.windows(2) {
            if let [a, b] = pair {
                assert!(a.initiative >= b.initiative);
            }
        }
        assert_eq!(first.encounter().round, 1);
        assert_eq!(first.encounter().turn_index, 0);
    }

    #[test]
    fn ties_keep_insertion_order() {
        // Force a three-way tie and re-sort: the stable sort must keep the
        // insertion order among equal initiatives.
        let mut combat = CombatEngine::new(
            EncounterId::new("e-tie"),
            vec![spec("first", 10, 0), spec("second", 10, 0), spec("third", 10, 0)],
            "tie-check",
            None,
        )
        .unwrap();
        let mut insertion: Vec<String> = Vec::new();
        for token in &mut combat.encounter.tokens {
            token.initiative = 10;
        }
        // Rebuild in known insertion order, then apply the engine's sort.
        combat
            .encounter
            .tokens
            .sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        for token in &combat.encounter.tokens {
            insertion.push(token.id.as_str().to_owned());
        }
        combat
            .encounter
            .tokens
            .sort_by(|a, b| b.initiative.cmp(&a.initiative));
        let after: Vec<String> = combat
            .encounter
            .tokens
            .iter()
            .map(|t| t.id.as_str().to_owned())
            .collect();
        assert_eq!(after, insertion);
    }

    #[test]
    fn enemy_heuristic_flags_known_names_and_respects_override() {
        assert!(infer_is_enemy(&CharacterId::new("goblin-1"), "Goblin"));
        assert!(infer_is_enemy(&CharacterId::new("x"), "Dire Wolf"));
        assert!(!infer_is_enemy(&CharacterId::new("hero"), "Hero"));

        let combat = CombatEngine::new(
            EncounterId::new("e-2"),
            vec![ParticipantSpec {
                is_enemy: Some(false),
                ..spec("goblin-friend", 7, 0)
            }],
            "seed",
            None,
        )
        .unwrap();
        assert!(!combat.encounter().tokens.first().unwrap().is_enemy);
    }

    #[test]
    fn attack_applies_damage_and_clamps_at_zero() {
        // Find a seed whose first attack roll is neither 1 nor 20 and
        // lands against dc 2 (almost any roll): use a fixed seed and a
        // trivial DC so the hit is certain unless the roll is a fumble.
        let mut combat = engine("battle-deterministic");
        let report = combat
            .attack(&AttackInput {
                actor: CharacterId::new("hero"),
                target: CharacterId::new("goblin"),
                attack_bonus: 5,
                dc: 2,
                damage: DiceExpr::flat(100),
            })
            .unwrap();
        if report.fumble {
            assert_eq!(report.damage_applied, 0);
        } else {
            assert!(report.hit);
            assert_eq!(report.target_hp, 0);
            assert!(report.target_defeated);
        }
    }

    #[test]
    fn natural_rolls_override_dc() {
        // Sweep seeds until both a natural 1 and a natural 20 show up as
        // first attack rolls, and assert the special-casing for each.
        let mut saw_fumble = false;
        let mut saw_crit = false;
        for i in 0..400 {
            let mut combat = engine(&format!("sweep-{i}"));
            let report = combat
                .attack(&AttackInput {
                    actor: CharacterId::new("hero"),
                    target: CharacterId::new("goblin"),
                    attack_bonus: 100,
                    dc: 10,
                    damage: DiceExpr::flat(1),
                })
                .unwrap();
            if report.fumble {
                saw_fumble = true;
                assert!(!report.hit, "natural 1 must miss even with +100");
                assert_eq!(report.damage_applied, 0);
            }
            if report.critical {
                saw_crit = true;
                assert!(report.hit);
                assert_eq!(report.damage_applied, 2, "crit doubles flat 1 damage");
            }
            if saw_fumble && saw_crit {
                break;
            }
        }
        assert!(saw_fumble && saw_crit, "seed sweep found neither extreme");
    }

    #[test]
    fn heal_caps_at_max_hp() {
        let mut combat = engine("heal-cap");
        combat
            .attack(&AttackInput {
                actor: CharacterId::new("goblin"),
                target: CharacterId::new("hero"),
                attack_bonus: 100,
                dc: 0,
                damage: DiceExpr::flat(5),
            })
            .unwrap();
        let report = combat.heal(&CharacterId::new("hero"), 50).unwrap();
        assert_eq!(report.target_hp, 20);
    }

    #[test]
    fn advance_skips_defeated_and_wraps_round() {
        let mut combat = CombatEngine::new(
            EncounterId::new("e-3"),
            vec![spec("hero", 20, 5), spec("goblin", 7, 0), spec("ally", 10, 0)],
            "turns",
            None,
        )
        .unwrap();

        // Defeat the goblin outright.
        combat
            .attack(&AttackInput {
                actor: CharacterId::new("hero"),
                target: CharacterId::new("goblin"),
                attack_bonus: 100,
                dc: 0,
                damage: DiceExpr::flat(100),
            })
            .unwrap();

        let order: Vec<String> = combat
            .encounter()
            .tokens
            .iter()
            .map(|t| t.id.as_str().to_owned())
            .collect();

        // Walk a full cycle: the goblin never becomes active.
        let mut seen = Vec::new();
        for _ in 0..order.len() {
            let report = combat.advance_turn().unwrap();
            seen.push(report.active.as_str().to_owned());
        }
        assert!(!seen.contains(&String::from("goblin")));
        assert!(combat.encounter().round >= 2, "wrap must increment round");
    }

    #[test]
    fn advance_fails_when_everyone_is_down() {
        let mut combat = engine("wipe");
        for id in ["hero", "goblin"] {
            let token = combat
                .encounter
                .tokens
                .iter_mut()
                .find(|t| t.id.as_str() == id)
                .unwrap();
            token.hp = 0;
        }
        let result = combat.advance_turn();
        assert!(matches!(result, Err(RulesError::AllDefeated { .. })));
    }

    #[test]
    fn end_reports_final_hp_and_victor() {
        let mut combat = engine("endgame");
        combat
            .attack(&AttackInput {
                actor: CharacterId::new("hero"),
                target: CharacterId::new("goblin"),
                attack_bonus: 100,
                dc: 0,
                damage: DiceExpr::flat(100),
            })
            .unwrap();
        let report = combat.end().unwrap();
        assert_eq!(report.victor.as_deref(), Some("party"));
        let goblin = report
            .final_hp
            .iter()
            .find(|f| f.id.as_str() == "goblin")
            .unwrap();
        assert_eq!(goblin.hp, 0);
        assert!(goblin.defeated);

        // Ending twice is rejected.
        assert!(combat.end().is_err());
    }

    #[test]
    fn completed_encounter_rejects_attacks() {
        let mut combat = engine("locked");
        combat.end().unwrap();
        let result = combat.attack(&AttackInput {
            actor: CharacterId::new("hero"),
            target: CharacterId::new("goblin"),
            attack_bonus: 0,
            dc: 10,
            damage: DiceExpr::flat(1),
        });
        assert!(matches!(result, Err(RulesError::EncounterNotActive { .. })));
    }

    #[test]
    fn snapshot_roundtrip_resumes_state() {
        let mut combat = engine("snapshot");
        combat
            .attack(&AttackInput {
                actor: CharacterId::new("hero"),
                target: CharacterId::new("goblin"),
                attack_bonus: 100,
                dc: 0,
                damage: DiceExpr::flat(3),
            })
            .unwrap();
        combat.advance_turn().unwrap();
        combat.pause().unwrap();

        let snapshot = combat.encounter().clone();
        let mut restored = CombatEngine::from_snapshot(snapshot.clone());
        restored.resume().unwrap();

        assert_eq!(restored.encounter().round, snapshot.round);
        assert_eq!(restored.encounter().turn_index, snapshot.turn_index);
        assert_eq!(restored.encounter().tokens, snapshot.tokens);
    }
}
