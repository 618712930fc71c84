//! Character and inventory tools.
//!
//! Flat tools (`create_character`, `get_character`, `update_character`,
//! `create_item`, `transfer_item`, `equip_item`) plus the consolidated
//! `character_manage` surface that multiplexes the same logic behind an
//! `action` field.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use loreforge_rules::character::clamp_hp;
use loreforge_rules::inventory::validate_equip;
use loreforge_types::{
    Character, CharacterId, CharacterType, EventType, Item, ItemId, ItemType, Stats,
};

use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::registry::{ToolContext, ToolRegistry, typed_tool};
use crate::router::{ActionSpec, consolidated_tool};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Input for `create_character`.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCharacterInput {
    /// Explicit ID; generated when omitted.
    #[serde(default)]
    pub character_id: Option<String>,
    /// Display name.
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    /// Ability scores; a flat array of 10s when omitted.
    #[serde(default)]
    pub stats: Option<Stats>,
    /// Maximum hit points (default 10).
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_hp: Option<i64>,
    /// Current hit points (defaults to `max_hp`).
    #[serde(default)]
    pub hp: Option<i64>,
    /// Armor class (default 10).
    #[serde(default)]
    pub ac: Option<i64>,
    /// Level (default 1).
    #[serde(default)]
    #[validate(range(min = 1, max = 20))]
    pub level: Option<i64>,
    /// Hit-die size for short rests (default 8).
    #[serde(default)]
    #[validate(range(min = 6, max = 12))]
    pub hit_die: Option<i64>,
    /// Faction membership.
    #[serde(default)]
    pub faction_id: Option<String>,
    /// Behavior notes for the orchestrator.
    #[serde(default)]
    pub behavior: Option<String>,
    /// Narrative role (default npc).
    #[serde(default)]
    pub character_type: Option<CharacterType>,
}

/// Input for `get_character`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetCharacterInput {
    /// The character to fetch.
    #[validate(length(min = 1))]
    pub character_id: String,
}

/// Input for `update_character`: a partial patch.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCharacterInput {
    /// The character to update.
    #[validate(length(min = 1))]
    pub character_id: String,
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New ability scores.
    #[serde(default)]
    pub stats: Option<Stats>,
    /// New current HP (clamped into `[0, max_hp]`).
    #[serde(default)]
    pub hp: Option<i64>,
    /// New maximum HP.
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_hp: Option<i64>,
    /// New armor class.
    #[serde(default)]
    pub ac: Option<i64>,
    /// New level.
    #[serde(default)]
    #[validate(range(min = 1, max = 20))]
    pub level: Option<i64>,
    /// New faction.
    #[serde(default)]
    pub faction_id: Option<String>,
    /// New behavior notes.
    #[serde(default)]
    pub behavior: Option<String>,
    /// New narrative role.
    #[serde(default)]
    pub character_type: Option<CharacterType>,
}

/// Input for `create_item`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemInput {
    /// Explicit ID; generated when omitted.
    #[serde(default)]
    pub item_id: Option<String>,
    /// Display name.
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    /// Mechanical category (default misc).
    #[serde(default)]
    pub item_type: Option<ItemType>,
    /// Weight in pounds.
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub weight: Option<f64>,
    /// Base value in gold.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub value: Option<i64>,
    /// Open property bag.
    #[serde(default)]
    pub properties: Option<serde_json::Value>,
}

/// Input for `transfer_item`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferItemInput {
    /// The giving character.
    #[validate(length(min = 1))]
    pub from_character_id: String,
    /// The receiving character.
    #[validate(length(min = 1))]
    pub to_character_id: String,
    /// The item to move.
    #[validate(length(min = 1))]
    pub item_id: String,
    /// Units to move (default 1).
    #[serde(default)]
    #[validate(range(min = 1))]
    pub quantity: Option<i64>,
}

/// Input for `equip_item`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EquipItemInput {
    /// The character equipping or unequipping.
    #[validate(length(min = 1))]
    pub character_id: String,
    /// The item.
    #[validate(length(min = 1))]
    pub item_id: String,
    /// True to equip, false to unequip.
    pub equip: bool,
    /// Equipment slot; required when equipping.
    #[serde(default)]
    pub slot: Option<String>,
}

/// The consolidated `character_manage` union.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CharacterAction {
    /// Create a character.
    Create(CreateCharacterInput),
    /// Fetch a character.
    Get(GetCharacterInput),
    /// Patch a character.
    Update(UpdateCharacterInput),
}

impl Validate for CharacterAction {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Self::Create(input) => input.validate(),
            Self::Get(input) => input.validate(),
            Self::Update(input) => input.validate(),
        }
    }
}

/// Actions of `character_manage`.
const CHARACTER_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "create",
        aliases: &["new", "add"],
        description: "Create a character",
    },
    ActionSpec {
        name: "get",
        aliases: &["fetch", "show"],
        description: "Fetch a character",
    },
    ActionSpec {
        name: "update",
        aliases: &["edit", "patch"],
        description: "Update a character",
    },
];

// ---------------------------------------------------------------------------
// Shared logic
// ---------------------------------------------------------------------------

/// Build and persist a character from a create input. Shared with the
/// batch tools.
pub(crate) async fn create_character_record(
    ctx: &ToolContext,
    input: CreateCharacterInput,
) -> Result<Character, ToolError> {
    let id = input
        .character_id
        .map_or_else(CharacterId::generate, CharacterId::new);
    let max_hp = input.max_hp.unwrap_or(10);
    let hp = clamp_hp(input.hp.unwrap_or(max_hp), max_hp);
    let level = input.level.unwrap_or(1);
    let now = Utc::now();
    let character = Character {
        id,
        name: input.name,
        stats: input.stats.unwrap_or_default(),
        hp,
        max_hp,
        ac: input.ac.unwrap_or(10),
        level,
        hit_die: input.hit_die.unwrap_or(8),
        hit_dice_remaining: level,
        faction_id: input.faction_id,
        behavior: input.behavior,
        character_type: input.character_type.unwrap_or(CharacterType::Npc),
        created_at: now,
        updated_at: now,
    };
    ctx.state.characters().create(&character).await?;
    ctx.state
        .audit(
            "create_character",
            None,
            Some(character.id.as_str()),
            serde_json::json!({"name": character.name, "type": character.character_type}),
        )
        .await?;
    ctx.state
        .publish(
            EventType::CharacterCreated,
            serde_json::json!({"characterId": character.id, "name": character.name}),
        )
        .await?;
    Ok(character)
}

async fn update_character_record(
    ctx: &ToolContext,
    input: UpdateCharacterInput,
) -> Result<Character, ToolError> {
    let id = CharacterId::new(input.character_id);
    let mut character = ctx.state.characters().get(&id).await?;

    if let Some(name) = input.name {
        character.name = name;
    }
    if let Some(stats) = input.stats {
        character.stats = stats;
    }
    if let Some(max_hp) = input.max_hp {
        character.max_hp = max_hp;
    }
    if let Some(hp) = input.hp {
        character.hp = hp;
    }
    if let Some(ac) = input.ac {
        character.ac = ac;
    }
    if let Some(level) = input.level {
        character.level = level;
        character.hit_dice_remaining = character.hit_dice_remaining.min(level);
    }
    if let Some(faction_id) = input.faction_id {
        character.faction_id = Some(faction_id);
    }
    if let Some(behavior) = input.behavior {
        character.behavior = Some(behavior);
    }
    if let Some(character_type) = input.character_type {
        character.character_type = character_type;
    }
    character.hp = clamp_hp(character.hp, character.max_hp);

    ctx.state.characters().update(&character).await?;
    ctx.state
        .audit(
            "update_character",
            None,
            Some(character.id.as_str()),
            serde_json::json!({"hp": character.hp, "maxHp": character.max_hp}),
        )
        .await?;
    ctx.state
        .publish(
            EventType::CharacterUpdated,
            serde_json::json!({"characterId": character.id}),
        )
        .await?;
    Ok(character)
}

async fn character_payload(
    ctx: &ToolContext,
    id: &CharacterId,
) -> Result<serde_json::Value, ToolError> {
    let character = ctx.state.characters().get(id).await?;
    let inventory = ctx.state.items().inventory_for(id).await?;
    Ok(serde_json::json!({
        "character": character,
        "inventory": inventory,
    }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_character(
    ctx: ToolContext,
    input: CreateCharacterInput,
) -> Result<ToolResponse, ToolError> {
    let character = create_character_record(&ctx, input).await?;
    ToolResponse::narrated(
        &format!("{} enters the world.", character.name),
        &serde_json::json!({"character": character}),
    )
}

async fn get_character(
    ctx: ToolContext,
    input: GetCharacterInput,
) -> Result<ToolResponse, ToolError> {
    let id = CharacterId::new(input.character_id);
    let payload = character_payload(&ctx, &id).await?;
    ToolResponse::narrated(&format!("Character sheet for {id}."), &payload)
}

async fn update_character(
    ctx: ToolContext,
    input: UpdateCharacterInput,
) -> Result<ToolResponse, ToolError> {
    let character = update_character_record(&ctx, input).await?;
    ToolResponse::narrated(
        &format!("{} has been updated.", character.name),
        &serde_json::json!({"character": character}),
    )
}

async fn character_manage(
    ctx: ToolContext,
    input: CharacterAction,
) -> Result<ToolResponse, ToolError> {
    match input {
        CharacterAction::Create(create) => create_character(ctx, create).await,
        CharacterAction::Get(get) => get_character(ctx, get).await,
        CharacterAction::Update(update) => update_character(ctx, update).await,
    }
}

async fn create_item(ctx: ToolContext, input: CreateItemInput) -> Result<ToolResponse, ToolError> {
    let item = Item {
        id: input.item_id.map_or_else(ItemId::generate, ItemId::new),
        name: input.name,
        item_type: input.item_type.unwrap_or(ItemType::Misc),
        weight: input.weight.unwrap_or(0.0),
        value: input.value.unwrap_or(0),
        properties: input.properties,
    };
    ctx.state.items().create_item(&item).await?;
    ctx.state
        .audit(
            "create_item",
            None,
            Some(item.id.as_str()),
            serde_json::json!({"name": item.name, "value": item.value}),
        )
        .await?;
    ToolResponse::narrated(
        &format!("{} has been forged.", item.name),
        &serde_json::json!({"item": item}),
    )
}

async fn transfer_item(
    ctx: ToolContext,
    input: TransferItemInput,
) -> Result<ToolResponse, ToolError> {
    let from = CharacterId::new(input.from_character_id);
    let to = CharacterId::new(input.to_character_id);
    let item = ItemId::new(input.item_id);
    let quantity = input.quantity.unwrap_or(1);

    let outcome = ctx.state.items().transfer(&from, &to, &item, quantity).await?;
    ctx.state
        .audit(
            "transfer_item",
            Some(from.as_str()),
            Some(to.as_str()),
            serde_json::to_value(&outcome)?,
        )
        .await?;
    ctx.state
        .publish(
            EventType::ItemTransferred,
            serde_json::json!({"from": from, "to": to, "itemId": item, "quantity": quantity}),
        )
        .await?;
    ToolResponse::narrated(
        &format!("{quantity} x {item} passed from {from} to {to}."),
        &serde_json::json!({"transfer": outcome}),
    )
}

async fn equip_item(ctx: ToolContext, input: EquipItemInput) -> Result<ToolResponse, ToolError> {
    let character = CharacterId::new(input.character_id);
    let item = ItemId::new(input.item_id);

    let entry = ctx
        .state
        .items()
        .entry(&character, &item)
        .await?
        .ok_or_else(|| ToolError::not_found("inventory entry", item.as_str()))?;

    if input.equip {
        let slot = input
            .slot
            .as_deref()
            .ok_or_else(|| ToolError::validation("equipping requires a slot"))?;
        let others = ctx.state.items().inventory_for(&character).await?;
        validate_equip(&entry, slot, &others)?;
        ctx.state
            .items()
            .set_equipped(&character, &item, true, Some(slot))
            .await?;
    } else {
        ctx.state
            .items()
            .set_equipped(&character, &item, false, None)
            .await?;
    }

    let verb = if input.equip { "equips" } else { "stows" };
    ctx.state
        .audit(
            "equip_item",
            Some(character.as_str()),
            Some(item.as_str()),
            serde_json::json!({"equip": input.equip, "slot": input.slot}),
        )
        .await?;
    ToolResponse::narrated(
        &format!("{character} {verb} {item}."),
        &serde_json::json!({"characterId": character, "itemId": item, "equipped": input.equip}),
    )
}

/// Register the character and inventory tools.
pub fn register(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register(typed_tool(
        "create_character",
        "Create a character (PC, NPC, enemy, or ally) with stats, HP, and AC.",
        create_character,
    ))?;
    registry.register(typed_tool(
        "get_character",
        "Fetch a character sheet with its inventory.",
        get_character,
    ))?;
    registry.register(typed_tool(
        "update_character",
        "Apply a partial update to a character record.",
        update_character,
    ))?;
    registry.register(consolidated_tool(
        "character_manage",
        "Manage characters through one consolidated surface.",
        CHARACTER_ACTIONS,
        character_manage,
    ))?;
    registry.register(typed_tool(
        "create_item",
        "Define a new world-unique item.",
        create_item,
    ))?;
    registry.register(typed_tool(
        "transfer_item",
        "Move items between characters atomically; equipped stacks refuse to move.",
        transfer_item,
    ))?;
    registry.register(typed_tool(
        "equip_item",
        "Equip or unequip an inventory stack into a named slot.",
        equip_item,
    ))?;
    Ok(())
}
