//! Rest tools.
//!
//! `take_long_rest` restores full HP and the hit-dice pool;
//! `take_short_rest` spends hit dice through the seeded dice stream and
//! persists the result.

use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use validator::Validate;

use loreforge_core::dice::SeededDice;
use loreforge_rules::rest::{resolve_long_rest, resolve_short_rest};
use loreforge_types::{CharacterId, EventType};

use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::registry::{ToolContext, ToolRegistry, typed_tool};

/// Input for `take_long_rest`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LongRestInput {
    /// The resting character.
    #[validate(length(min = 1))]
    pub character_id: String,
}

/// Input for `take_short_rest`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShortRestInput {
    /// The resting character.
    #[validate(length(min = 1))]
    pub character_id: String,
    /// Hit dice to spend (clamped to the remaining pool).
    #[validate(range(min = 0, max = 20))]
    pub hit_dice: i64,
    /// Explicit dice seed for deterministic tests.
    #[serde(default)]
    pub seed: Option<String>,
}

async fn take_long_rest(ctx: ToolContext, input: LongRestInput) -> Result<ToolResponse, ToolError> {
    let id = CharacterId::new(input.character_id);
    let mut character = ctx.state.characters().get(&id).await?;

    let outcome = resolve_long_rest(&character);
    character.hp = outcome.hp;
    character.hit_dice_remaining = outcome.hit_dice_remaining;
    ctx.state.characters().update(&character).await?;

    ctx.state
        .audit("take_long_rest", Some(id.as_str()), None, serde_json::to_value(&outcome)?)
        .await?;
    ctx.state
        .publish(
            EventType::RestTaken,
            serde_json::json!({"characterId": id, "kind": "long", "restored": outcome.restored}),
        )
        .await?;

    ToolResponse::narrated(
        &format!(
            "{} wakes fully rested: {} HP restored.",
            character.name, outcome.restored
        ),
        &serde_json::json!({"rest": outcome}),
    )
}

async fn take_short_rest(
    ctx: ToolContext,
    input: ShortRestInput,
) -> Result<ToolResponse, ToolError> {
    let id = CharacterId::new(input.character_id);
    let mut character = ctx.state.characters().get(&id).await?;

    let seed = input.seed.unwrap_or_else(|| {
        format!("short-rest-{id}-{}", Utc::now().timestamp_millis())
    });
    let mut dice = SeededDice::new(&seed);
    let outcome = resolve_short_rest(&character, input.hit_dice, &mut dice);

    character.hp = outcome.hp;
    character.hit_dice_remaining = outcome.hit_dice_remaining;
    ctx.state.characters().update(&character).await?;

    ctx.state
        .audit("take_short_rest", Some(id.as_str()), None, serde_json::to_value(&outcome)?)
        .await?;
    ctx.state
        .publish(
            EventType::RestTaken,
            serde_json::json!({"characterId": id, "kind": "short", "healed": outcome.healed}),
        )
        .await?;

    ToolResponse::narrated(
        &format!(
            "{} spends {} hit dice and recovers {} HP.",
            character.name, outcome.dice_spent, outcome.healed
        ),
        &serde_json::json!({"rest": outcome, "seed": seed}),
    )
}

/// Register the rest tools.
pub fn register(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register(typed_tool(
        "take_long_rest",
        "Sleep it off: full HP and a refilled hit-dice pool.",
        take_long_rest,
    ))?;
    registry.register(typed_tool(
        "take_short_rest",
        "Spend hit dice; each heals max(1, roll + CON modifier), capped at max HP.",
        take_short_rest,
    ))?;
    Ok(())
}
