//! Core entity structs persisted by the store and exchanged with the
//! orchestrator.
//!
//! Wire names are camelCase to match the tool-call contract. The relational
//! store is the single source of truth for every struct here; in-memory
//! managers hold only transient copies keyed by session.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{
    CharacterType, DurationType, EffectCategory, EncounterStatus, HeatLevel, ItemType, QuestStatus,
};
use crate::ids::{
    CharacterId, EffectId, EncounterId, ItemId, ObjectiveId, PatchId, QuestId, RegionId, RiverId,
    SpellId, StructureId, WorldId,
};

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// A generated world. Owns its regions, tiles, structures, and rivers;
/// deletion cascades to all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct World {
    /// Unique world identifier.
    pub id: WorldId,
    /// Display name.
    pub name: String,
    /// The generation seed. Identical seeds produce identical worlds.
    pub seed: i64,
    /// Grid width in tiles (10–1000).
    pub width: i64,
    /// Grid height in tiles (10–1000).
    pub height: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A named region of a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    /// Unique region identifier.
    pub id: RegionId,
    /// Owning world.
    pub world_id: WorldId,
    /// Display name.
    pub name: String,
    /// Dominant biome label.
    pub biome: String,
}

/// One tile of a world's grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    /// Owning world.
    pub world_id: WorldId,
    /// Column, 0-based from the west edge.
    pub x: i64,
    /// Row, 0-based from the north edge.
    pub y: i64,
    /// Terrain label (opaque to the core; produced by the generator or
    /// a map patch).
    pub terrain: String,
    /// Region containing this tile, if any.
    pub region_id: Option<RegionId>,
}

/// A structure placed on the world map (settlement, ruin, landmark).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorldStructure {
    /// Unique structure identifier.
    pub id: StructureId,
    /// Owning world.
    pub world_id: WorldId,
    /// Display name.
    pub name: String,
    /// Structure kind label (opaque to the core).
    pub kind: String,
    /// Column position.
    pub x: i64,
    /// Row position.
    pub y: i64,
}

/// A river traced across the world map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct River {
    /// Unique river identifier.
    pub id: RiverId,
    /// Owning world.
    pub world_id: WorldId,
    /// Tile coordinates the river passes through, in flow order.
    pub path: Vec<(i64, i64)>,
}

/// One operation of a map patch: overwrite the terrain of a single tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatchOperation {
    /// Column of the tile to rewrite.
    pub x: i64,
    /// Row of the tile to rewrite.
    pub y: i64,
    /// New terrain label.
    pub terrain: String,
    /// Optional annotation carried in the patch record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// An applied map patch, kept for provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MapPatch {
    /// Unique patch identifier.
    pub id: PatchId,
    /// World the patch was applied to.
    pub world_id: WorldId,
    /// The operations, in application order.
    pub operations: Vec<PatchOperation>,
    /// Optional description supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// When the patch was committed.
    pub applied_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

/// The six ability scores of a character. Values are unbounded integers;
/// the modifier is `floor((score - 10) / 2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Strength score.
    pub str: i64,
    /// Dexterity score.
    pub dex: i64,
    /// Constitution score.
    pub con: i64,
    /// Intelligence score.
    pub int: i64,
    /// Wisdom score.
    pub wis: i64,
    /// Charisma score.
    pub cha: i64,
}

impl Stats {
    /// A flat array of 10s, the baseline commoner.
    pub const fn baseline() -> Self {
        Self {
            str: 10,
            dex: 10,
            con: 10,
            int: 10,
            wis: 10,
            cha: 10,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::baseline()
    }
}

/// A persisted character (PC, NPC, enemy, or ally).
///
/// Invariant: `0 <= hp <= max_hp` at rest. During combat the live HP is
/// owned by the encounter token and written back when the encounter ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    /// Unique character identifier.
    pub id: CharacterId,
    /// Display name.
    pub name: String,
    /// Ability scores.
    pub stats: Stats,
    /// Current hit points.
    pub hp: i64,
    /// Maximum hit points.
    pub max_hp: i64,
    /// Armor class.
    pub ac: i64,
    /// Character level (drives proficiency and hit-dice pool).
    pub level: i64,
    /// Hit-die size used by short rests (6, 8, 10, or 12).
    pub hit_die: i64,
    /// Hit dice not yet spent on short rests.
    pub hit_dice_remaining: i64,
    /// Faction membership, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction_id: Option<String>,
    /// Free-form behavior notes for the orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
    /// Narrative role.
    pub character_type: CharacterType,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Items and inventory
// ---------------------------------------------------------------------------

/// An item. Items are world-unique by identity: the inventory layer can
/// answer "which characters hold item X".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique item identifier.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Mechanical category.
    pub item_type: ItemType,
    /// Weight in pounds (>= 0).
    pub weight: f64,
    /// Base value in gold pieces (>= 0).
    pub value: i64,
    /// Open property bag passed through opaquely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

/// One stack of an item held by a character. The `(character, item)` pair
/// is the primary key.
///
/// Invariants: `quantity >= 1`; `equipped` implies `slot` is set; only one
/// equipped entry per slot per character; an equipped stack cannot be
/// transferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    /// The holding character.
    pub character_id: CharacterId,
    /// The held item.
    pub item_id: ItemId,
    /// Stack size (>= 1).
    pub quantity: i64,
    /// Whether the stack is currently equipped.
    pub equipped: bool,
    /// Equipment slot; required when `equipped` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
}

// ---------------------------------------------------------------------------
// Combat
// ---------------------------------------------------------------------------

/// A frozen snapshot of a character used as a combat participant.
///
/// The token owns its own mutable HP for the duration of the encounter;
/// the persisted character is reconciled only at `end_encounter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Participant identifier. If it matches a persisted character ID the
    /// final HP is written back when the encounter ends.
    pub id: CharacterId,
    /// Display name.
    pub name: String,
    /// Current hit points (0 means defeated).
    pub hp: i64,
    /// Maximum hit points.
    pub max_hp: i64,
    /// Armor class.
    pub ac: i64,
    /// Rolled initiative (d20 + bonus).
    pub initiative: i64,
    /// The bonus that was added to the initiative roll.
    pub initiative_bonus: i64,
    /// Whether this token fights against the party.
    pub is_enemy: bool,
    /// Condition labels currently on the token (opaque to the engine).
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl Token {
    /// A token is defeated when its HP has been reduced to zero.
    pub const fn is_defeated(&self) -> bool {
        self.hp <= 0
    }
}

/// Battlefield terrain attached to an encounter.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Terrain {
    /// Obstacle cells encoded as `"x,y"` strings.
    #[serde(default)]
    pub obstacles: Vec<String>,
}

/// A combat encounter: tokens in initiative order plus the turn machine
/// state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    /// Unique encounter identifier.
    pub id: EncounterId,
    /// Lifecycle state.
    pub status: EncounterStatus,
    /// Current round, starting at 1.
    pub round: i64,
    /// Index into `tokens` of the active participant.
    pub turn_index: usize,
    /// Participants sorted by initiative, descending, stable on insertion
    /// order.
    pub tokens: Vec<Token>,
    /// The seed string the encounter's dice stream was created from.
    pub seed: String,
    /// Optional battlefield terrain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terrain: Option<Terrain>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Encounter {
    /// The ID of the token whose turn it is, if any.
    pub fn active_token_id(&self) -> Option<&CharacterId> {
        self.tokens.get(self.turn_index).map(|t| &t.id)
    }
}

// ---------------------------------------------------------------------------
// Quests
// ---------------------------------------------------------------------------

/// One objective within a quest.
///
/// Invariant: `completed` holds exactly when `current >= required`; the two
/// fields are always updated together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Objective {
    /// Unique objective identifier.
    pub id: ObjectiveId,
    /// What must be done, in prose.
    pub description: String,
    /// Objective kind label (kill, collect, explore, ...; opaque).
    #[serde(rename = "type")]
    pub objective_type: String,
    /// What the objective counts (a creature name, an item, a place).
    pub target: String,
    /// How many are needed (>= 1).
    pub required: i64,
    /// How many have been done so far (clamped to `required`).
    pub current: i64,
    /// Whether the objective is done.
    pub completed: bool,
}

/// Rewards granted when a quest completes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestRewards {
    /// Experience points (echoed informationally; not persisted).
    #[serde(default)]
    pub experience: i64,
    /// Gold (echoed informationally; not persisted).
    #[serde(default)]
    pub gold: i64,
    /// Item IDs added to the completing character's inventory.
    #[serde(default)]
    pub items: Vec<ItemId>,
}

/// A quest definition with objectives, rewards, and prerequisite chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    /// Unique quest identifier.
    pub id: QuestId,
    /// World this quest belongs to.
    pub world_id: WorldId,
    /// Display name.
    pub name: String,
    /// Narrative description.
    pub description: String,
    /// Lifecycle state.
    pub status: QuestStatus,
    /// The objectives, all of which must complete before the quest can.
    pub objectives: Vec<Objective>,
    /// Rewards granted on completion.
    pub rewards: QuestRewards,
    /// Quests that must be completed before this one can be assigned.
    #[serde(default)]
    pub prerequisites: Vec<QuestId>,
    /// The NPC who gives the quest, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub giver: Option<CharacterId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Per-character quest bookkeeping. A quest ID appears in at most one of
/// the three lists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestLog {
    /// Quests currently being pursued.
    #[serde(default)]
    pub active_quests: Vec<QuestId>,
    /// Quests finished successfully.
    #[serde(default)]
    pub completed_quests: Vec<QuestId>,
    /// Quests failed or abandoned.
    #[serde(default)]
    pub failed_quests: Vec<QuestId>,
}

// ---------------------------------------------------------------------------
// Theft
// ---------------------------------------------------------------------------

/// Provenance record of a stolen item, keyed by item ID.
///
/// Invariant: `stolen_from != stolen_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TheftRecord {
    /// The stolen item.
    pub item_id: ItemId,
    /// The victim.
    pub stolen_from: CharacterId,
    /// The thief.
    pub stolen_by: CharacterId,
    /// Where the theft happened, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stolen_location: Option<String>,
    /// Characters who saw it happen.
    #[serde(default)]
    pub witnesses: Vec<CharacterId>,
    /// Current heat. New records start at burning.
    pub heat_level: HeatLevel,
    /// Whether the victim went to the guards.
    pub reported_to_guards: bool,
    /// Bounty posted for recovery (>= 0).
    pub bounty: i64,
    /// Whether the item has been laundered through a fence.
    pub fenced: bool,
    /// The world day of the fence sale, if any; gates the re-sale cooldown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fenced_at_day: Option<i64>,
    /// When the theft was recorded.
    pub created_at: DateTime<Utc>,
}

/// An NPC authorized to buy stolen goods under heat and capacity limits.
///
/// Invariant: an NPC that is the victim of any open theft record cannot be
/// registered as a fence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Fence {
    /// The NPC acting as the fence.
    pub npc_id: CharacterId,
    /// Faction affiliation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction_id: Option<String>,
    /// Fraction of base value the fence pays, in [0.1, 1.0].
    pub buy_rate: Decimal,
    /// The hottest heat level the fence will touch.
    pub max_heat_level: HeatLevel,
    /// Total heat value the fence can absorb per day (>= 0).
    pub daily_heat_capacity: i64,
    /// Heat value already absorbed today (reset by decay).
    pub daily_heat_used: i64,
    /// Item types the fence prefers (informational).
    #[serde(default)]
    pub specializations: Vec<ItemType>,
    /// Days before the same item can be fenced again (>= 0).
    pub cooldown_days: i64,
}

// ---------------------------------------------------------------------------
// Improvisation
// ---------------------------------------------------------------------------

/// How long a custom effect lasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EffectDuration {
    /// The unit the duration is measured in.
    #[serde(rename = "type")]
    pub duration_type: DurationType,
    /// Remaining amount in that unit; `None` for permanent/until-removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

/// A condition under which a custom effect fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EffectTrigger {
    /// The event name that activates the trigger (opaque).
    pub event: String,
    /// An optional condition expression evaluated downstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// A custom effect applied to an actor by the improvisation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomEffect {
    /// Unique effect identifier.
    pub id: EffectId,
    /// The actor the effect is attached to.
    pub target_id: CharacterId,
    /// What kind of actor the target is (character, token, object).
    pub target_type: String,
    /// Display name.
    pub name: String,
    /// Boon, curse, neutral, or transformative.
    pub category: EffectCategory,
    /// Narrative power, 1–5.
    pub power_level: i64,
    /// Opaque mechanic strings evaluated downstream.
    #[serde(default)]
    pub mechanics: Vec<String>,
    /// How long the effect lasts.
    pub duration: EffectDuration,
    /// When the effect fires.
    #[serde(default)]
    pub triggers: Vec<EffectTrigger>,
    /// Whether the effect is live. Expired effects are flagged inactive
    /// before cleanup.
    pub is_active: bool,
    /// When the effect was applied.
    pub created_at: DateTime<Utc>,
}

/// A spell permanently learned through an arcane-synthesis mastery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedSpell {
    /// Unique spellbook-entry identifier.
    pub id: SpellId,
    /// The caster who mastered the spell.
    pub character_id: CharacterId,
    /// Spell name.
    pub name: String,
    /// Spell level the synthesis was attempted at.
    pub level: i64,
    /// School of magic.
    pub school: String,
    /// Effect kind label (damage, ward, utility, ...).
    pub effect_type: String,
    /// Effect dice expression, if the spell rolls dice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_dice: Option<String>,
    /// When mastery was achieved.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Audit and events
// ---------------------------------------------------------------------------

/// One appended row of the audit log. IDs are monotonically increasing per
/// process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Monotonic identifier.
    pub id: i64,
    /// The operation performed (tool or engine action name).
    pub action: String,
    /// Acting entity, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    /// Affected entity, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Structured details of the mutation.
    pub details: serde_json::Value,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
}

/// One event published to subscribers and appended to `event_logs`.
/// Distinct from the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventEntry {
    /// Monotonic identifier assigned at append time.
    pub id: i64,
    /// The event type.
    #[serde(rename = "type")]
    pub event_type: crate::enums::EventType,
    /// Structured payload.
    pub payload: serde_json::Value,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}
