//! The consolidated `improvisation_manage` tool.
//!
//! Eight actions: stunt resolution, custom-effect lifecycle (apply,
//! query, remove, triggers, duration ticks), arcane synthesis, and
//! spellbook introspection. Dice are seeded per call; callers that need
//! reproducibility pass an explicit seed.

use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use validator::Validate;

use loreforge_core::dice::{DiceExpr, SeededDice};
use loreforge_rules::character::clamp_hp;
use loreforge_rules::improv::effects::{advance_round_durations, triggered};
use loreforge_rules::improv::stunt::{StuntInput, StuntTarget, resolve_stunt};
use loreforge_rules::improv::synthesis::{SynthesisInput, resolve_synthesis};
use loreforge_types::{
    AdvantageMode, CharacterId, CustomEffect, DurationType, EffectCategory, EffectDuration,
    EffectId, EffectTrigger, EventType, Skill, SpellId, SynthesizedSpell,
};

use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::registry::{ToolContext, ToolRegistry};
use crate::router::{ActionSpec, consolidated_tool};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One target of a stunt.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StuntTargetArgs {
    /// The target.
    #[validate(length(min = 1))]
    pub target_id: String,
    /// Saving-throw DC; no save when omitted.
    #[serde(default)]
    pub saving_throw_dc: Option<i64>,
    /// Whether a passed save halves instead of negating.
    #[serde(default)]
    pub half_on_save: Option<bool>,
    /// Conditions attached on a failed save.
    #[serde(default)]
    pub conditions: Option<Vec<String>>,
}

/// `stunt`: an improvised skill check.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StuntArgs {
    /// The acting character (must exist; stats drive the modifier).
    #[validate(length(min = 1))]
    pub character_id: String,
    /// The skill rolled.
    pub skill: Skill,
    /// Difficulty class, 5–35.
    #[validate(range(min = 5, max = 35))]
    pub dc: i64,
    /// Roll with advantage.
    #[serde(default)]
    pub advantage: Option<bool>,
    /// Roll with disadvantage (never stacks with advantage).
    #[serde(default)]
    pub disadvantage: Option<bool>,
    /// Damage dealt to targets on success.
    #[serde(default)]
    pub success_damage: Option<String>,
    /// Damage dealt to the actor on a critical failure.
    #[serde(default)]
    pub failure_damage: Option<String>,
    /// Targets affected on success.
    #[serde(default)]
    #[validate(nested)]
    pub targets: Option<Vec<StuntTargetArgs>>,
    /// Explicit dice seed for deterministic tests.
    #[serde(default)]
    pub seed: Option<String>,
}

/// Duration of a new effect.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DurationArgs {
    /// The unit.
    #[serde(rename = "type")]
    pub duration_type: DurationType,
    /// Amount in that unit; required for finite durations.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub value: Option<i64>,
}

/// A trigger of a new effect.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriggerArgs {
    /// The event that fires the trigger.
    #[validate(length(min = 1))]
    pub event: String,
    /// Optional condition expression, evaluated downstream.
    #[serde(default)]
    pub condition: Option<String>,
}

/// `apply_effect`: attach a custom effect to an actor.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyEffectArgs {
    /// The actor the effect attaches to.
    #[validate(length(min = 1))]
    pub target_id: String,
    /// What kind of actor (default "character").
    #[serde(default)]
    pub target_type: Option<String>,
    /// Display name.
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Boon, curse, neutral, or transformative.
    pub category: EffectCategory,
    /// Narrative power, 1–5.
    #[validate(range(min = 1, max = 5))]
    pub power_level: i64,
    /// Opaque mechanic strings.
    #[serde(default)]
    pub mechanics: Option<Vec<String>>,
    /// How long the effect lasts.
    #[validate(nested)]
    pub duration: DurationArgs,
    /// When the effect fires.
    #[serde(default)]
    #[validate(nested)]
    pub triggers: Option<Vec<TriggerArgs>>,
}

/// `get_effects`: query effects on a target.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetEffectsArgs {
    /// The target.
    #[validate(length(min = 1))]
    pub target_id: String,
    /// Restrict to one category.
    #[serde(default)]
    pub category: Option<EffectCategory>,
    /// Only active effects (default true).
    #[serde(default)]
    pub active_only: Option<bool>,
}

/// `remove_effect`: by ID, or by `(target, name)`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoveEffectArgs {
    /// The effect ID.
    #[serde(default)]
    pub effect_id: Option<String>,
    /// The target, when removing by name.
    #[serde(default)]
    pub target_id: Option<String>,
    /// The effect name, when removing by name.
    #[serde(default)]
    pub name: Option<String>,
}

/// `process_triggers`: which active effects fire for an event?
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessTriggersArgs {
    /// The target whose effects are inspected.
    #[validate(length(min = 1))]
    pub target_id: String,
    /// The event name.
    #[validate(length(min = 1))]
    pub event: String,
}

/// `advance_durations`: tick round-based effects.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceDurationsArgs {
    /// The target whose effects tick.
    #[validate(length(min = 1))]
    pub target_id: String,
    /// Rounds to advance (0 is a no-op).
    #[validate(range(min = 0, max = 1000))]
    pub rounds: i64,
}

/// `synthesize`: improvise a spell.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeArgs {
    /// The caster (must exist).
    #[validate(length(min = 1))]
    pub character_id: String,
    /// Name for the improvised spell.
    #[serde(default)]
    pub spell_name: Option<String>,
    /// Spell level attempted, 1–9.
    #[validate(range(min = 1, max = 9))]
    pub spell_level: i64,
    /// School of magic.
    #[validate(length(min = 1))]
    pub school: String,
    /// Effect kind label.
    #[validate(length(min = 1))]
    pub effect_type: String,
    /// Effect dice expression.
    #[serde(default)]
    pub effect_dice: Option<String>,
    /// Cast mid-combat (+2 DC).
    #[serde(default)]
    pub in_combat: Option<bool>,
    /// The caster knows a related spell (-2 DC; +3 when absent).
    #[serde(default)]
    pub has_related_spell: Option<bool>,
    /// Gold value of the material component consumed.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub material_value: Option<i64>,
    /// Standing on a ley line or nexus (-3 DC).
    #[serde(default)]
    pub ley_line: Option<bool>,
    /// Under a blood moon or eclipse (-2 DC).
    #[serde(default)]
    pub celestial_event: Option<bool>,
    /// Cast in desperation (+2 DC).
    #[serde(default)]
    pub desperation: Option<bool>,
    /// Explicit dice seed for deterministic tests.
    #[serde(default)]
    pub seed: Option<String>,
}

/// `get_spellbook`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SpellbookArgs {
    /// The caster.
    #[validate(length(min = 1))]
    pub character_id: String,
}

/// The consolidated `improvisation_manage` union, tagged by `action`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ImprovAction {
    /// Resolve a stunt.
    Stunt(StuntArgs),
    /// Apply a custom effect.
    ApplyEffect(ApplyEffectArgs),
    /// Query effects.
    GetEffects(GetEffectsArgs),
    /// Remove an effect.
    RemoveEffect(RemoveEffectArgs),
    /// Match triggers for an event.
    ProcessTriggers(ProcessTriggersArgs),
    /// Tick round-based durations.
    AdvanceDurations(AdvanceDurationsArgs),
    /// Attempt arcane synthesis.
    Synthesize(SynthesizeArgs),
    /// Read a caster's synthesized spellbook.
    GetSpellbook(SpellbookArgs),
}

impl Validate for ImprovAction {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Self::Stunt(args) => args.validate(),
            Self::ApplyEffect(args) => args.validate(),
            Self::GetEffects(args) => args.validate(),
            Self::RemoveEffect(args) => args.validate(),
            Self::ProcessTriggers(args) => args.validate(),
            Self::AdvanceDurations(args) => args.validate(),
            Self::Synthesize(args) => args.validate(),
            Self::GetSpellbook(args) => args.validate(),
        }
    }
}

/// Actions of `improvisation_manage`.
const IMPROV_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "stunt",
        aliases: &["rule_of_cool", "improvise"],
        description: "Resolve an improvised skill check",
    },
    ActionSpec {
        name: "apply_effect",
        aliases: &["add_effect"],
        description: "Apply a custom effect",
    },
    ActionSpec {
        name: "get_effects",
        aliases: &["effects", "list_effects"],
        description: "Query effects on a target",
    },
    ActionSpec {
        name: "remove_effect",
        aliases: &["dispel"],
        description: "Remove an effect",
    },
    ActionSpec {
        name: "process_triggers",
        aliases: &["triggers"],
        description: "Match effect triggers for an event",
    },
    ActionSpec {
        name: "advance_durations",
        aliases: &["tick"],
        description: "Tick round-based effect durations",
    },
    ActionSpec {
        name: "synthesize",
        aliases: &["synthesise", "improvise_spell"],
        description: "Attempt arcane synthesis",
    },
    ActionSpec {
        name: "get_spellbook",
        aliases: &["spellbook"],
        description: "Read a synthesized spellbook",
    },
];

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn stunt(ctx: &ToolContext, args: StuntArgs) -> Result<ToolResponse, ToolError> {
    let actor = CharacterId::new(args.character_id);
    let character = ctx.state.characters().get(&actor).await?;

    let advantage = match (
        args.advantage.unwrap_or(false),
        args.disadvantage.unwrap_or(false),
    ) {
        // Advantage and disadvantage never stack; together they cancel.
        (true, false) => AdvantageMode::Advantage,
        (false, true) => AdvantageMode::Disadvantage,
        _ => AdvantageMode::Normal,
    };
    let success_damage: Option<DiceExpr> =
        args.success_damage.as_deref().map(str::parse).transpose()?;
    let failure_damage: Option<DiceExpr> =
        args.failure_damage.as_deref().map(str::parse).transpose()?;
    let targets: Vec<StuntTarget> = args
        .targets
        .unwrap_or_default()
        .into_iter()
        .map(|target| StuntTarget {
            id: CharacterId::new(target.target_id),
            saving_throw_dc: target.saving_throw_dc,
            half_on_save: target.half_on_save.unwrap_or(false),
            conditions: target.conditions.unwrap_or_default(),
        })
        .collect();

    let seed = args.seed.unwrap_or_else(|| {
        format!("stunt-{actor}-{}", Utc::now().timestamp_millis())
    });
    let mut dice = SeededDice::new(&seed);
    let input = StuntInput {
        actor: actor.clone(),
        skill: args.skill,
        dc: args.dc,
        advantage,
        success_damage,
        failure_damage,
        targets,
    };
    let report = resolve_stunt(&input, &character.stats, &mut dice)?;

    // Damage lands on persisted characters; ad-hoc targets are narrative.
    for target in &report.targets {
        if target.damage <= 0 {
            continue;
        }
        if let Some(mut stored) = ctx.state.characters().try_get(&target.id).await? {
            stored.hp = clamp_hp(stored.hp.saturating_sub(target.damage), stored.max_hp);
            ctx.state.characters().update(&stored).await?;
        }
    }
    if let Some(self_damage) = &report.self_damage {
        let mut stored = ctx.state.characters().get(&actor).await?;
        stored.hp = clamp_hp(stored.hp.saturating_sub(self_damage.total), stored.max_hp);
        ctx.state.characters().update(&stored).await?;
    }

    if let Some(breakdown) = &report.damage_rolled {
        ctx.state
            .audits()
            .record_calculation(&seed, breakdown, "stunt_damage")
            .await?;
    }
    ctx.state
        .audit(
            "improv_stunt",
            Some(actor.as_str()),
            None,
            serde_json::to_value(&report)?,
        )
        .await?;
    ctx.state
        .publish(EventType::StuntResolved, serde_json::to_value(&report)?)
        .await?;

    ToolResponse::narrated(
        &format!(
            "{actor} attempts the stunt: {} ({} vs DC {}) -- {:?}.",
            report.roll, report.total, report.dc, report.outcome
        ),
        &serde_json::json!({"stunt": report, "seed": seed}),
    )
}

async fn apply_effect(ctx: &ToolContext, args: ApplyEffectArgs) -> Result<ToolResponse, ToolError> {
    if matches!(
        args.duration.duration_type,
        DurationType::Rounds | DurationType::Minutes | DurationType::Hours | DurationType::Days
    ) && args.duration.value.is_none()
    {
        return Err(ToolError::validation(
            "a finite duration requires a value",
        ));
    }

    let effect = CustomEffect {
        id: EffectId::generate(),
        target_id: CharacterId::new(args.target_id),
        target_type: args.target_type.unwrap_or_else(|| String::from("character")),
        name: args.name,
        category: args.category,
        power_level: args.power_level,
        mechanics: args.mechanics.unwrap_or_default(),
        duration: EffectDuration {
            duration_type: args.duration.duration_type,
            value: args.duration.value,
        },
        triggers: args
            .triggers
            .unwrap_or_default()
            .into_iter()
            .map(|trigger| EffectTrigger {
                event: trigger.event,
                condition: trigger.condition,
            })
            .collect(),
        is_active: true,
        created_at: Utc::now(),
    };
    ctx.state.effects().apply(&effect).await?;
    ctx.state
        .audit(
            "improv_apply_effect",
            None,
            Some(effect.target_id.as_str()),
            serde_json::to_value(&effect)?,
        )
        .await?;
    ctx.state
        .publish(
            EventType::EffectApplied,
            serde_json::json!({"effectId": effect.id, "targetId": effect.target_id}),
        )
        .await?;

    ToolResponse::narrated(
        &format!("{} settles over {}.", effect.name, effect.target_id),
        &serde_json::json!({"effect": effect}),
    )
}

async fn get_effects(ctx: &ToolContext, args: GetEffectsArgs) -> Result<ToolResponse, ToolError> {
    let target = CharacterId::new(args.target_id);
    let effects = ctx
        .state
        .effects()
        .list_for(&target, args.active_only.unwrap_or(true), args.category)
        .await?;
    ToolResponse::narrated(
        &format!("{} effect(s) on {target}.", effects.len()),
        &serde_json::json!({"effects": effects}),
    )
}

async fn remove_effect(ctx: &ToolContext, args: RemoveEffectArgs) -> Result<ToolResponse, ToolError> {
    let removed = match (&args.effect_id, &args.target_id, &args.name) {
        (Some(effect_id), _, _) => {
            let id = EffectId::new(effect_id.clone());
            u64::from(ctx.state.effects().remove_by_id(&id).await?)
        }
        (None, Some(target_id), Some(name)) => {
            let target = CharacterId::new(target_id.clone());
            ctx.state.effects().remove_by_name(&target, name).await?
        }
        _ => {
            return Err(ToolError::validation(
                "remove_effect needs an effectId, or a targetId plus a name",
            ));
        }
    };
    if removed == 0 {
        return Err(ToolError::not_found(
            "effect",
            args.effect_id
                .or(args.name)
                .unwrap_or_else(|| String::from("?")),
        ));
    }
    ctx.state
        .publish(
            EventType::EffectRemoved,
            serde_json::json!({"removed": removed, "reason": "dispelled"}),
        )
        .await?;
    ToolResponse::narrated(
        &format!("{removed} effect(s) unravel."),
        &serde_json::json!({"removed": removed}),
    )
}

async fn process_triggers(
    ctx: &ToolContext,
    args: ProcessTriggersArgs,
) -> Result<ToolResponse, ToolError> {
    let target = CharacterId::new(args.target_id);
    let effects = ctx.state.effects().list_for(&target, true, None).await?;
    let fired: Vec<&CustomEffect> = triggered(&effects, &args.event);
    let payload: Vec<serde_json::Value> = fired
        .iter()
        .map(|effect| {
            serde_json::json!({
                "effectId": effect.id,
                "name": effect.name,
                "mechanics": effect.mechanics,
            })
        })
        .collect();
    ToolResponse::narrated(
        &format!(
            "{} effect(s) trigger on {:?} for {target}.",
            payload.len(),
            args.event
        ),
        &serde_json::json!({"triggered": payload}),
    )
}

async fn advance_durations(
    ctx: &ToolContext,
    args: AdvanceDurationsArgs,
) -> Result<ToolResponse, ToolError> {
    let target = CharacterId::new(args.target_id);
    let mut effects = ctx.state.effects().list_for(&target, true, None).await?;
    let advance = advance_round_durations(&mut effects, args.rounds);
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
    ToolResponse::narrated(
        &format!(
            "{} effect(s) tick down, {} expire.",
            advance.advanced.len(),
            advance.expired.len()
        ),
        &serde_json::json!({"advanced": advance.advanced, "expired": advance.expired}),
    )
}

async fn synthesize(ctx: &ToolContext, args: SynthesizeArgs) -> Result<ToolResponse, ToolError> {
    let caster = CharacterId::new(args.character_id);
    let character = ctx.state.characters().get(&caster).await?;

    let effect_dice: Option<DiceExpr> =
        args.effect_dice.as_deref().map(str::parse).transpose()?;
    let spell_name = args
        .spell_name
        .unwrap_or_else(|| format!("improvised {} {}", args.school, args.effect_type));
    let seed = args.seed.unwrap_or_else(|| {
        format!("synthesize-{caster}-{}", Utc::now().timestamp_millis())
    });

    let input = SynthesisInput {
        caster: caster.clone(),
        spell_name: spell_name.clone(),
        level: args.spell_level,
        school: args.school.clone(),
        effect_type: args.effect_type.clone(),
        effect_dice,
        in_combat: args.in_combat.unwrap_or(false),
        has_related_spell: args.has_related_spell.unwrap_or(false),
        material_value: args.material_value.unwrap_or(0),
        ley_line: args.ley_line.unwrap_or(false),
        celestial_event: args.celestial_event.unwrap_or(false),
        desperation: args.desperation.unwrap_or(false),
    };
    let mut dice = SeededDice::new(&seed);
    let report = resolve_synthesis(&input, &character.stats, character.level, &mut dice);

    // Mastery writes the spell into the spellbook; no slot is consumed.
    let mut spellbook_entry = None;
    if report.spell_mastered {
        let spell = SynthesizedSpell {
            id: SpellId::generate(),
            character_id: caster.clone(),
            name: spell_name.clone(),
            level: args.spell_level,
            school: args.school.clone(),
            effect_type: args.effect_type.clone(),
            effect_dice: args.effect_dice.clone(),
            created_at: Utc::now(),
        };
        ctx.state.effects().add_spell(&spell).await?;
        spellbook_entry = Some(spell);
    }

    // Backfire hurts the caster for real.
    if let Some(backfire) = &report.backfire_damage {
        let mut stored = ctx.state.characters().get(&caster).await?;
        stored.hp = clamp_hp(stored.hp.saturating_sub(backfire.total), stored.max_hp);
        ctx.state.characters().update(&stored).await?;
    }

    ctx.state
        .audit(
            "improv_synthesize",
            Some(caster.as_str()),
            None,
            serde_json::to_value(&report)?,
        )
        .await?;
    ctx.state
        .publish(
            EventType::SpellSynthesized,
            serde_json::json!({
                "casterId": caster,
                "outcome": report.outcome,
                "spellName": spell_name,
            }),
        )
        .await?;

    ToolResponse::narrated(
        &format!(
            "{caster} weaves raw magic: {} + {} vs DC {} -- {:?}.",
            report.roll, report.modifier, report.dc.total, report.outcome
        ),
        &serde_json::json!({
            "synthesis": report,
            "spellMastered": report.spell_mastered,
            "spellSlotConsumed": report.spell_slot_consumed,
            "spellbookEntry": spellbook_entry,
            "seed": seed,
        }),
    )
}

async fn get_spellbook(ctx: &ToolContext, args: SpellbookArgs) -> Result<ToolResponse, ToolError> {
    let caster = CharacterId::new(args.character_id);
    let spells = ctx.state.effects().spellbook_for(&caster).await?;
    ToolResponse::narrated(
        &format!("{caster} has mastered {} synthesized spell(s).", spells.len()),
        &serde_json::json!({"spellbook": spells}),
    )
}

async fn improvisation_manage(
    ctx: ToolContext,
    input: ImprovAction,
) -> Result<ToolResponse, ToolError> {
    match input {
        ImprovAction::Stunt(args) => stunt(&ctx, args).await,
        ImprovAction::ApplyEffect(args) => apply_effect(&ctx, args).await,
        ImprovAction::GetEffects(args) => get_effects(&ctx, args).await,
        ImprovAction::RemoveEffect(args) => remove_effect(&ctx, args).await,
        ImprovAction::ProcessTriggers(args) => process_triggers(&ctx, args).await,
        ImprovAction::AdvanceDurations(args) => advance_durations(&ctx, args).await,
        ImprovAction::Synthesize(args) => synthesize(&ctx, args).await,
        ImprovAction::GetSpellbook(args) => get_spellbook(&ctx, args).await,
    }
}

/// Register the consolidated improvisation tool.
pub fn register(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register(consolidated_tool(
        "improvisation_manage",
        "Stunts, custom effects, and arcane synthesis.",
        IMPROV_ACTIONS,
        improvisation_manage,
    ))
}
