//! Combat lifecycle tools.
//!
//! The live engine for each encounter is cached in the session-keyed
//! combat manager and reconstructible from the persisted snapshot -- a
//! handler that finds the cache cold loads the encounter and resumes.
//! Every mutation persists the snapshot before responding, so the cache
//! can be dropped at any time without losing state.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use loreforge_core::dice::DiceExpr;
use loreforge_rules::combat::{AttackInput, CombatEngine, ParticipantSpec};
use loreforge_rules::improv::effects::advance_round_durations;
use loreforge_types::{CharacterId, EncounterId, EncounterStatus, EventType, Terrain};

use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::registry::{ToolContext, ToolRegistry, typed_tool};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One participant of a new encounter. Fields omitted for a persisted
/// character are frozen from its record.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInput {
    /// Participant ID; matching a stored character enables HP write-back.
    #[validate(length(min = 1))]
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Starting HP.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub hp: Option<i64>,
    /// Maximum HP.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_hp: Option<i64>,
    /// Armor class.
    #[serde(default)]
    pub ac: Option<i64>,
    /// Initiative bonus.
    #[serde(default)]
    pub initiative_bonus: Option<i64>,
    /// Enemy flag; omitted defers to the name heuristic.
    #[serde(default)]
    pub is_enemy: Option<bool>,
}

/// Input for `create_encounter`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEncounterInput {
    /// Explicit encounter ID; generated when omitted.
    #[serde(default)]
    pub encounter_id: Option<String>,
    /// The participants (at least one).
    #[validate(length(min = 1), nested)]
    pub participants: Vec<ParticipantInput>,
    /// Dice seed; derived from the encounter ID and clock when omitted.
    #[serde(default)]
    pub seed: Option<String>,
    /// Battlefield obstacle cells encoded as `"x,y"`.
    #[serde(default)]
    pub obstacles: Option<Vec<String>>,
}

/// Input naming an encounter.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EncounterRefInput {
    /// The encounter.
    #[validate(length(min = 1))]
    pub encounter_id: String,
}

/// What `execute_combat_action` should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CombatActionKind {
    /// Roll to hit and apply damage.
    Attack,
    /// Restore HP, no roll.
    Heal,
}

/// Input for `execute_combat_action`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CombatActionInput {
    /// The encounter.
    #[validate(length(min = 1))]
    pub encounter_id: String,
    /// Attack or heal.
    pub action_type: CombatActionKind,
    /// The acting token.
    #[validate(length(min = 1))]
    pub actor_id: String,
    /// The targeted token.
    #[validate(length(min = 1))]
    pub target_id: String,
    /// Attack bonus (attack only; default 0).
    #[serde(default)]
    pub attack_bonus: Option<i64>,
    /// Difficulty class to meet (attack only).
    #[serde(default)]
    pub dc: Option<i64>,
    /// Damage dice expression or bare integer (attack only).
    #[serde(default)]
    pub damage: Option<String>,
    /// HP restored (heal only).
    #[serde(default)]
    #[validate(range(min = 0))]
    pub amount: Option<i64>,
}

// ---------------------------------------------------------------------------
// Engine cache plumbing
// ---------------------------------------------------------------------------

/// Make sure the session has a live engine for the encounter, loading
/// the snapshot from the store when the cache is cold.
async fn ensure_engine(ctx: &ToolContext, id: &EncounterId) -> Result<(), ToolError> {
    let cached = ctx
        .state
        .combat()
        .with_engine(&ctx.session.session_id, id, |_| ())
        .is_some();
    if cached {
        return Ok(());
    }
    let snapshot = ctx.state.encounters().get(id).await?;
    ctx.state
        .combat()
        .insert(&ctx.session.session_id, CombatEngine::from_snapshot(snapshot));
    Ok(())
}

/// Run a closure against the live engine, then persist the mutated
/// snapshot. The closure runs under the manager lock; persistence does
/// not.
async fn with_persisted_engine<R>(
    ctx: &ToolContext,
    id: &EncounterId,
    f: impl FnOnce(&mut CombatEngine) -> Result<R, ToolError>,
) -> Result<(R, loreforge_types::Encounter), ToolError> {
    ensure_engine(ctx, id).await?;
    let outcome = ctx
        .state
        .combat()
        .with_engine(&ctx.session.session_id, id, |engine| {
            f(engine).map(|value| (value, engine.encounter().clone()))
        })
        .ok_or_else(|| ToolError::not_found("encounter", id.as_str()))??;
    ctx.state.encounters().save(&outcome.1).await?;
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_encounter(
    ctx: ToolContext,
    input: CreateEncounterInput,
) -> Result<ToolResponse, ToolError> {
    let id = input
        .encounter_id
        .map_or_else(EncounterId::generate, EncounterId::new);
    let seed = input
        .seed
        .unwrap_or_else(|| format!("encounter-{id}-{}", Utc::now().timestamp_millis()));

    // Freeze missing fields from persisted characters.
    let mut specs = Vec::with_capacity(input.participants.len());
    for participant in input.participants {
        let participant_id = CharacterId::new(participant.id);
        let stored = ctx.state.characters().try_get(&participant_id).await?;
        let (hp, max_hp, ac, name) = match &stored {
            Some(character) => (
                participant.hp.unwrap_or(character.hp),
                participant.max_hp.unwrap_or(character.max_hp),
                participant.ac.unwrap_or(character.ac),
                participant.name.clone().or_else(|| Some(character.name.clone())),
            ),
            None => {
                let max_hp = participant.max_hp.or(participant.hp).unwrap_or(10);
                (
                    participant.hp.unwrap_or(max_hp),
                    max_hp,
                    participant.ac.unwrap_or(10),
                    participant.name.clone(),
                )
            }
        };
        specs.push(ParticipantSpec {
            id: participant_id,
            name,
            hp,
            max_hp,
            ac,
            initiative_bonus: participant.initiative_bonus.unwrap_or(0),
            is_enemy: participant.is_enemy,
        });
    }

    let terrain = input.obstacles.map(|obstacles| Terrain { obstacles });
    let engine = CombatEngine::new(id.clone(), specs, &seed, terrain)?;
    ctx.state.encounters().save(engine.encounter()).await?;

    let encounter = engine.encounter().clone();
    ctx.state.combat().insert(&ctx.session.session_id, engine);

    ctx.state
        .audit(
            "create_encounter",
            None,
            Some(id.as_str()),
            serde_json::json!({"participants": encounter.tokens.len(), "seed": seed}),
        )
        .await?;
    ctx.state
        .publish(
            EventType::EncounterCreated,
            serde_json::json!({"encounterId": id, "round": encounter.round}),
        )
        .await?;

    let opener = encounter
        .active_token_id()
        .map_or_else(String::new, ToString::to_string);
    ToolResponse::narrated(
        &format!("Initiative is rolled; {opener} acts first."),
        &serde_json::json!({"encounter": encounter}),
    )
}

async fn get_encounter_state(
    ctx: ToolContext,
    input: EncounterRefInput,
) -> Result<ToolResponse, ToolError> {
    let id = EncounterId::new(input.encounter_id);
    ensure_engine(&ctx, &id).await?;
    let encounter = ctx
        .state
        .combat()
        .with_engine(&ctx.session.session_id, &id, |engine| {
            engine.encounter().clone()
        })
        .ok_or_else(|| ToolError::not_found("encounter", id.as_str()))?;
    ToolResponse::narrated(
        &format!(
            "Round {}, {} tokens, status {:?}.",
            encounter.round,
            encounter.tokens.len(),
            encounter.status
        ),
        &serde_json::json!({"encounter": encounter}),
    )
}

async fn execute_combat_action(
    ctx: ToolContext,
    input: CombatActionInput,
) -> Result<ToolResponse, ToolError> {
    let id = EncounterId::new(input.encounter_id.clone());
    let actor = CharacterId::new(input.actor_id.clone());
    let target = CharacterId::new(input.target_id.clone());

    match input.action_type {
        CombatActionKind::Attack => {
            let dc = input
                .dc
                .ok_or_else(|| ToolError::validation("attack requires a dc"))?;
            let damage: DiceExpr = input
                .damage
                .as_deref()
                .ok_or_else(|| ToolError::validation("attack requires a damage expression"))?
                .parse()?;
            let attack = AttackInput {
                actor: actor.clone(),
                target: target.clone(),
                attack_bonus: input.attack_bonus.unwrap_or(0),
                dc,
                damage,
            };
            let (report, encounter) =
                with_persisted_engine(&ctx, &id, |engine| Ok(engine.attack(&attack)?)).await?;

            if let Some(breakdown) = &report.damage_rolled {
                ctx.state
                    .audits()
                    .record_calculation(&encounter.seed, breakdown, "combat_damage")
                    .await?;
            }
            ctx.state
                .audit(
                    "execute_combat_action",
                    Some(actor.as_str()),
                    Some(target.as_str()),
                    serde_json::to_value(&report)?,
                )
                .await?;
            ctx.state
                .publish(EventType::CombatAction, serde_json::to_value(&report)?)
                .await?;

            let text = if report.hit {
                format!(
                    "{actor} hits {target} for {} damage ({} vs DC {}){}.",
                    report.damage_applied,
                    report.total,
                    report.dc,
                    if report.target_defeated {
                        " -- the target goes down"
                    } else {
                        ""
                    }
                )
            } else {
                format!("{actor} misses {target} ({} vs DC {}).", report.total, report.dc)
            };
            ToolResponse::narrated(&text, &serde_json::json!({"attack": report}))
        }
        CombatActionKind::Heal => {
            let amount = input
                .amount
                .ok_or_else(|| ToolError::validation("heal requires an amount"))?;
            let (report, _encounter) =
                with_persisted_engine(&ctx, &id, |engine| Ok(engine.heal(&target, amount)?))
                    .await?;
            ctx.state
                .audit(
                    "execute_combat_action",
                    Some(actor.as_str()),
                    Some(target.as_str()),
                    serde_json::to_value(&report)?,
                )
                .await?;
            ctx.state
                .publish(EventType::CombatAction, serde_json::to_value(&report)?)
                .await?;
            ToolResponse::narrated(
                &format!("{target} recovers {} HP.", report.healed),
                &serde_json::json!({"heal": report}),
            )
        }
    }
}

async fn advance_turn(
    ctx: ToolContext,
    input: EncounterRefInput,
) -> Result<ToolResponse, ToolError> {
    let id = EncounterId::new(input.encounter_id);
    ensure_engine(&ctx, &id).await?;

    // Tick round-based effect durations for the outgoing participant.
    let outgoing = ctx
        .state
        .combat()
        .with_engine(&ctx.session.session_id, &id, |engine| {
            engine.encounter().active_token_id().cloned()
        })
        .ok_or_else(|| ToolError::not_found("encounter", id.as_str()))?;
    let mut expired_effects = Vec::new();
    if let Some(outgoing) = &outgoing {
        let mut effects = ctx.state.effects().list_for(outgoing, true, None).await?;
        let advance = advance_round_durations(&mut effects, 1);
        if !(advance.advanced.is_empty() && advance.expired.is_empty()) {
            ctx.state.effects().save_all(&effects).await?;
        }
        for effect_id in &advance.expired {
            ctx.state
                .publish(
                    EventType::EffectRemoved,
                    serde_json::json!({"effectId": effect_id, "reason": "expired"}),
                )
                .await?;
        }
        expired_effects = advance.expired;
    }

    let (report, _encounter) =
        with_persisted_engine(&ctx, &id, |engine| Ok(engine.advance_turn()?)).await?;
    ctx.state
        .publish(EventType::TurnAdvanced, serde_json::to_value(&report)?)
        .await?;

    ToolResponse::narrated(
        &format!("Round {}: {} is up.", report.round, report.active),
        &serde_json::json!({"turn": report, "expiredEffects": expired_effects}),
    )
}

async fn end_encounter(
    ctx: ToolContext,
    input: EncounterRefInput,
) -> Result<ToolResponse, ToolError> {
    let id = EncounterId::new(input.encounter_id);
    ensure_engine(&ctx, &id).await?;

    let (report, encounter) = ctx
        .state
        .combat()
        .with_engine(&ctx.session.session_id, &id, |engine| {
            engine.end().map(|report| (report, engine.encounter().clone()))
        })
        .ok_or_else(|| ToolError::not_found("encounter", id.as_str()))??;

    let written_back = ctx
        .state
        .encounters()
        .end_with_write_back(&encounter, &report.final_hp)
        .await?;
    ctx.state.combat().take(&ctx.session.session_id, &id);

    ctx.state
        .audit(
            "end_encounter",
            None,
            Some(id.as_str()),
            serde_json::json!({"writtenBack": written_back, "victor": report.victor}),
        )
        .await?;
    ctx.state
        .publish(EventType::EncounterEnded, serde_json::to_value(&report)?)
        .await?;

    let text = match &report.victor {
        Some(side) => format!("The encounter ends after {} round(s); {side} prevail.", report.rounds),
        None => format!("The encounter ends after {} round(s).", report.rounds),
    };
    ToolResponse::narrated(
        &text,
        &serde_json::json!({"result": report, "hpWrittenBack": written_back}),
    )
}

async fn load_encounter(
    ctx: ToolContext,
    input: EncounterRefInput,
) -> Result<ToolResponse, ToolError> {
    let id = EncounterId::new(input.encounter_id);
    let snapshot = ctx.state.encounters().get(&id).await?;
    let mut engine = CombatEngine::from_snapshot(snapshot);
    if engine.encounter().status == EncounterStatus::Paused {
        engine.resume()?;
        ctx.state.encounters().save(engine.encounter()).await?;
    }
    let encounter = engine.encounter().clone();
    ctx.state.combat().insert(&ctx.session.session_id, engine);

    ToolResponse::narrated(
        &format!(
            "Encounter {id} resumes at round {}, {} to act.",
            encounter.round,
            encounter
                .active_token_id()
                .map_or_else(String::new, ToString::to_string)
        ),
        &serde_json::json!({"encounter": encounter}),
    )
}

/// Register the combat tools.
pub fn register(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register(typed_tool(
        "create_encounter",
        "Create an encounter: roll initiative with a seeded die and open round 1.",
        create_encounter,
    ))?;
    registry.register(typed_tool(
        "get_encounter_state",
        "Fetch the live state of an encounter.",
        get_encounter_state,
    ))?;
    registry.register(typed_tool(
        "execute_combat_action",
        "Resolve an attack (d20 vs DC, crit on 20, fumble on 1) or a heal.",
        execute_combat_action,
    ))?;
    registry.register(typed_tool(
        "advance_turn",
        "Advance to the next living token, ticking round-based effects.",
        advance_turn,
    ))?;
    registry.register(typed_tool(
        "end_encounter",
        "End an encounter and write each token's final HP back to its character.",
        end_encounter,
    ))?;
    registry.register(typed_tool(
        "load_encounter",
        "Load a persisted encounter into a fresh engine and resume it.",
        load_encounter,
    ))?;
    Ok(())
}
