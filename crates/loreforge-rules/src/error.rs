//! Error types for the rules crate.
//!
//! Every domain operation that can be refused returns a typed error rather
//! than panicking. Variants split into two broad families the boundary
//! layer maps onto its taxonomy: requests that would break a documented
//! invariant, and requests that are valid in isolation but forbidden by
//! the current state.

use loreforge_types::{CharacterId, EncounterId, EncounterStatus, ItemId, QuestId};

use loreforge_core::dice::DiceParseError;

/// Why a fence refused a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceRefusal {
    /// The item is hotter than the fence will touch.
    HeatTooHigh,
    /// The fence has no daily heat capacity left for this item.
    CapacityExhausted,
    /// The item was fenced too recently.
    CooldownActive {
        /// First world day the item can be fenced again.
        until_day: i64,
    },
}

impl core::fmt::Display for FenceRefusal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::HeatTooHigh => write!(f, "item is too hot for this fence"),
            Self::CapacityExhausted => write!(f, "fence has no heat capacity left today"),
            Self::CooldownActive { until_day } => {
                write!(f, "item is under fence cooldown until day {until_day}")
            }
        }
    }
}

/// Errors that can occur during domain resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    /// An encounter needs at least one participant.
    #[error("an encounter requires at least one participant")]
    EmptyEncounter,

    /// A referenced token is not in the encounter.
    #[error("token {token} is not part of encounter {encounter}")]
    UnknownToken {
        /// The encounter searched.
        encounter: EncounterId,
        /// The missing token.
        token: CharacterId,
    },

    /// The encounter is not in a state that allows the operation.
    #[error("encounter {encounter} is {status:?} and cannot accept this action")]
    EncounterNotActive {
        /// The encounter.
        encounter: EncounterId,
        /// Its current status.
        status: EncounterStatus,
    },

    /// The acting token has already been defeated.
    #[error("token {token} is defeated and cannot act")]
    ActorDefeated {
        /// The defeated actor.
        token: CharacterId,
    },

    /// The targeted token has already been defeated.
    #[error("token {token} is already defeated")]
    TargetDefeated {
        /// The defeated target.
        token: CharacterId,
    },

    /// Every living participant is defeated; the turn cannot advance.
    #[error("all participants in encounter {encounter} are defeated")]
    AllDefeated {
        /// The encounter.
        encounter: EncounterId,
    },

    /// A character cannot steal from themself.
    #[error("character {character} cannot steal from themself")]
    SelfTheft {
        /// The offending character.
        character: CharacterId,
    },

    /// An NPC with an open theft-victim record cannot be a fence.
    #[error("npc {npc} is the victim of an open theft record for item {item}")]
    VictimCannotFence {
        /// The would-be fence.
        npc: CharacterId,
        /// An item stolen from them.
        item: ItemId,
    },

    /// A fence declined a sale.
    #[error("fence {npc} refused: {reason}")]
    FenceRefused {
        /// The fence.
        npc: CharacterId,
        /// Why.
        reason: FenceRefusal,
    },

    /// Quest prerequisites are not all completed.
    #[error("quest {quest} has unmet prerequisites: {missing:?}")]
    PrerequisitesUnmet {
        /// The quest being assigned.
        quest: QuestId,
        /// Prerequisite quests not in the character's completed list.
        missing: Vec<QuestId>,
    },

    /// The quest is already in one of the character's log lists.
    #[error("quest {quest} is already {state} for this character")]
    QuestAlreadyHeld {
        /// The quest.
        quest: QuestId,
        /// Which list it was found in.
        state: &'static str,
    },

    /// Completing a quest requires every objective to be complete.
    #[error("quest {quest} has {incomplete} incomplete objective(s)")]
    ObjectivesIncomplete {
        /// The quest.
        quest: QuestId,
        /// How many objectives remain.
        incomplete: usize,
    },

    /// The prerequisite graph would contain a cycle.
    #[error("quest {quest} would create a prerequisite cycle")]
    PrerequisiteCycle {
        /// The quest whose prerequisites close the loop.
        quest: QuestId,
    },

    /// An equipped stack cannot be transferred.
    #[error("item {item} is equipped and cannot be transferred")]
    EquippedTransfer {
        /// The equipped item.
        item: ItemId,
    },

    /// The source does not hold enough of the item.
    #[error("insufficient quantity of {item}: wanted {requested}, have {available}")]
    InsufficientQuantity {
        /// The item.
        item: ItemId,
        /// How many were requested.
        requested: i64,
        /// How many the source holds.
        available: i64,
    },

    /// Equip-slot bookkeeping was violated.
    #[error("equipment slot violation: {reason}")]
    SlotViolation {
        /// Description of the violation.
        reason: String,
    },

    /// A dice expression failed to parse.
    #[error(transparent)]
    Dice(#[from] DiceParseError),

    /// A documented invariant not covered by a specific variant.
    #[error("invariant violation: {reason}")]
    Invariant {
        /// Description of the violated invariant.
        reason: String,
    },
}
