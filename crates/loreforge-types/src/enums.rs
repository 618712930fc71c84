//! Enumeration types for the Loreforge engine.
//!
//! All closed vocabularies used across the workspace. Wire names are
//! lower snake case to match the orchestrator-facing JSON contract.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

/// The narrative role of a character.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CharacterType {
    /// A player character.
    Pc,
    /// A non-player character.
    Npc,
    /// A hostile combatant.
    Enemy,
    /// A friendly combatant.
    Ally,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// The mechanical category of an item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// A weapon usable in combat.
    Weapon,
    /// Wearable protection.
    Armor,
    /// A single-use item (potion, scroll).
    Consumable,
    /// A quest-critical item.
    Quest,
    /// Anything else.
    Misc,
}

// ---------------------------------------------------------------------------
// Combat
// ---------------------------------------------------------------------------

/// Lifecycle state of an encounter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EncounterStatus {
    /// Combat is in progress.
    Active,
    /// Combat is suspended and may be resumed via `load_encounter`.
    Paused,
    /// Combat has ended; token HP has been written back.
    Completed,
}

/// How a d20 roll is taken.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AdvantageMode {
    /// One die.
    Normal,
    /// Two dice, keep the higher.
    Advantage,
    /// Two dice, keep the lower.
    Disadvantage,
}

// ---------------------------------------------------------------------------
// Theft
// ---------------------------------------------------------------------------

/// Ordinal freshness of a stolen item.
///
/// Variant order is coldest-first so the derived ordering reads
/// "hotter is greater": a fence with `max_heat = Warm` accepts `Cool`
/// (`Cool <= Warm`) but not `Hot`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum HeatLevel {
    /// Long forgotten; effectively clean.
    Cold,
    /// Mostly forgotten.
    Cool,
    /// Still remembered by some.
    Warm,
    /// Recently stolen and talked about.
    Hot,
    /// Freshly stolen; everyone is looking for it.
    Burning,
}

/// Risk band reported when searching a character for stolen goods.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DetectionRisk {
    /// No stolen goods, or everything has gone cold.
    None,
    /// Hottest item is cool.
    Low,
    /// Hottest item is warm.
    Moderate,
    /// Hottest item is hot.
    High,
    /// Hottest item is burning.
    VeryHigh,
}

/// How an NPC reacts after a recognition check against a stolen item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionReaction {
    /// The NPC is the victim: immediate hostility.
    Hostile,
    /// The NPC witnessed the theft or connected the rumors.
    Suspicious,
    /// The NPC did not recognize the item.
    Unaware,
}

// ---------------------------------------------------------------------------
// Quests
// ---------------------------------------------------------------------------

/// Lifecycle state of a quest definition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    /// Defined but not yet taken by anyone.
    Available,
    /// At least one character is pursuing it.
    Active,
    /// Finished successfully.
    Completed,
    /// Abandoned or botched.
    Failed,
}

// ---------------------------------------------------------------------------
// Improvisation
// ---------------------------------------------------------------------------

/// The six ability scores.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Ability {
    /// Raw physical power.
    Strength,
    /// Agility and reflexes.
    Dexterity,
    /// Endurance and vitality.
    Constitution,
    /// Reasoning and memory.
    Intelligence,
    /// Perception and intuition.
    Wisdom,
    /// Force of personality.
    Charisma,
}

/// The skills a stunt check can be rolled against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    /// Climbing, jumping, grappling.
    Athletics,
    /// Balance, tumbling, escapes.
    Acrobatics,
    /// Pickpocketing and palming.
    SleightOfHand,
    /// Moving unseen and unheard.
    Stealth,
    /// Magical lore.
    Arcana,
    /// Historical lore.
    History,
    /// Deduction and searching.
    Investigation,
    /// Natural lore.
    Nature,
    /// Religious lore.
    Religion,
    /// Calming and directing beasts.
    AnimalHandling,
    /// Reading intentions.
    Insight,
    /// Stabilizing and diagnosing.
    Medicine,
    /// Noticing things.
    Perception,
    /// Wilderness craft.
    Survival,
    /// Convincing lies.
    Deception,
    /// Coercion.
    Intimidation,
    /// Entertaining an audience.
    Performance,
    /// Honest persuasion.
    Persuasion,
}

/// Classification of a stunt check result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum StuntOutcome {
    /// Natural 20, or beat the DC by 10 or more.
    CriticalSuccess,
    /// Met or beat the DC.
    Success,
    /// Missed the DC.
    Failure,
    /// Natural 1, or missed the DC by 10 or more.
    CriticalFailure,
}

/// Category of a custom effect.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EffectCategory {
    /// Beneficial.
    Boon,
    /// Detrimental.
    Curse,
    /// Neither helps nor harms by itself.
    Neutral,
    /// Changes what the target fundamentally is.
    Transformative,
}

/// How a custom effect's duration is measured.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DurationType {
    /// Ticks down with encounter turns.
    Rounds,
    /// Simulated minutes.
    Minutes,
    /// Simulated hours.
    Hours,
    /// Simulated days.
    Days,
    /// Never expires.
    Permanent,
    /// Lasts until explicitly removed.
    UntilRemoved,
}

/// Outcome band of an arcane synthesis attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisOutcome {
    /// Natural 20 or margin >= +10: spell learned permanently, no slot spent.
    Mastery,
    /// Margin in [0, +9]: effect resolves, slot consumed.
    Success,
    /// Margin in [-5, -1]: nothing happens, slot consumed.
    Fizzle,
    /// Margin <= -6 (and not a natural 1): caster takes backlash damage.
    Backfire,
    /// Natural 1 or margin <= -10: roll on the wild-surge table.
    Catastrophic,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The type of an event published on the bus and appended to `event_logs`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A world was generated.
    WorldGenerated,
    /// A map patch was applied to a world.
    MapPatched,
    /// A character was created.
    CharacterCreated,
    /// A character record was updated.
    CharacterUpdated,
    /// An encounter was created and initiative rolled.
    EncounterCreated,
    /// An attack or heal was resolved inside an encounter.
    CombatAction,
    /// The turn pointer advanced.
    TurnAdvanced,
    /// An encounter ended and HP was written back.
    EncounterEnded,
    /// Items moved between characters.
    ItemTransferred,
    /// A theft was recorded.
    TheftRecorded,
    /// A theft was reported to the guards.
    TheftReported,
    /// A stolen item was sold to a fence.
    FenceSale,
    /// Heat decayed over simulated days.
    HeatDecayed,
    /// A quest was created.
    QuestCreated,
    /// A quest was assigned to a character.
    QuestAssigned,
    /// Objective progress changed.
    ObjectiveUpdated,
    /// A quest was completed and rewards granted.
    QuestCompleted,
    /// A stunt was resolved.
    StuntResolved,
    /// A custom effect was applied.
    EffectApplied,
    /// A custom effect was removed or expired.
    EffectRemoved,
    /// An arcane synthesis attempt was resolved.
    SpellSynthesized,
    /// A character took a rest.
    RestTaken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heat_ordering_is_hotter_greater() {
        assert!(HeatLevel::Burning > HeatLevel::Hot);
        assert!(HeatLevel::Hot > HeatLevel::Warm);
        assert!(HeatLevel::Warm > HeatLevel::Cool);
        assert!(HeatLevel::Cool > HeatLevel::Cold);
    }

    #[test]
    fn wire_names_are_snake_case() {
        let json = serde_json::to_string(&Skill::SleightOfHand).ok();
        assert_eq!(json.as_deref(), Some("\"sleight_of_hand\""));
        let json = serde_json::to_string(&DurationType::UntilRemoved).ok();
        assert_eq!(json.as_deref(), Some("\"until_removed\""));
        let json = serde_json::to_string(&CharacterType::Pc).ok();
        assert_eq!(json.as_deref(), Some("\"pc\""));
    }

    #[test]
    fn enum_roundtrip() {
        let original = SynthesisOutcome::Backfire;
        let json = serde_json::to_string(&original).ok();
        let restored: Option<SynthesisOutcome> =
            json.as_deref().and_then(|j| serde_json::from_str(j).ok());
        assert_eq!(restored, Some(original));
    }
}
