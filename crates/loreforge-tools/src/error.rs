//! The boundary error taxonomy.
//!
//! Handlers recover nothing locally: every failure bubbles to the
//! registry, which renders it into the response envelope with a
//! machine-readable payload. The taxonomy mirrors what the orchestrator
//! needs to re-plan: caller-fault validation, missing dispatch targets
//! (with suggestions), missing entities, invariant violations,
//! state conflicts, and storage failures.

use loreforge_core::dice::DiceParseError;
use loreforge_core::fuzzy::Suggestion;
use loreforge_rules::RulesError;
use loreforge_store::StoreError;

/// Errors surfaced to the orchestrator by the boundary layer.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// A tool name was registered twice.
    #[error("tool already registered: {name}")]
    DuplicateTool {
        /// The offending name.
        name: String,
    },

    /// No tool with this name exists.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// The name that missed.
        name: String,
    },

    /// A consolidated tool could not resolve the `action` discriminator.
    #[error("unknown action {provided:?} for {tool}")]
    UnknownAction {
        /// The consolidated tool.
        tool: String,
        /// What the caller sent.
        provided: String,
        /// The canonical actions the tool accepts.
        available: Vec<String>,
        /// Ranked near-misses, best first.
        suggestions: Vec<Suggestion>,
    },

    /// Input failed schema parsing or bound checks. Caller fault; never
    /// retried.
    #[error("validation failed: {message}")]
    Validation {
        /// Field-level description of the failure.
        message: String,
    },

    /// A referenced entity is not in the store.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity family.
        entity: String,
        /// The identifier that missed.
        id: String,
    },

    /// The request would break a documented invariant. Not retriable.
    #[error("invariant violation: {message}")]
    Invariant {
        /// The invariant that would break.
        message: String,
    },

    /// Valid in isolation, but the current state forbids it.
    #[error("conflicting state: {message}")]
    Conflict {
        /// Why the current state refuses the operation.
        message: String,
    },

    /// The persistence layer failed. Surfaced as-is, no automatic retry.
    #[error("storage failure: {0}")]
    Storage(StoreError),

    /// An internal serialization fault while building a response.
    #[error("internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl ToolError {
    /// The machine-readable error kind embedded in the response envelope.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateTool { .. } => "duplicate_tool",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::UnknownAction { .. } => "unknown_action",
            Self::Validation { .. } => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::Invariant { .. } => "invariant_violation",
            Self::Conflict { .. } => "conflicting_state",
            Self::Storage(_) => "storage_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Extra structured details for the envelope, when the kind carries
    /// any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::UnknownAction {
                available,
                suggestions,
                ..
            } => Some(serde_json::json!({
                "availableActions": available,
                "suggestions": suggestions,
            })),
            Self::NotFound { entity, id } => Some(serde_json::json!({
                "entity": entity,
                "id": id,
            })),
            _ => None,
        }
    }

    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a missing entity.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<RulesError> for ToolError {
    fn from(error: RulesError) -> Self {
        match &error {
            // State conflicts: the request was well-formed, the world
            // just is not in a state that allows it.
            RulesError::EncounterNotActive { .. }
            | RulesError::ActorDefeated { .. }
            | RulesError::TargetDefeated { .. }
            | RulesError::AllDefeated { .. }
            | RulesError::ObjectivesIncomplete { .. }
            | RulesError::QuestAlreadyHeld { .. }
            | RulesError::FenceRefused { .. } => Self::Conflict {
                message: error.to_string(),
            },
            // Malformed dice notation is the caller's input problem.
            RulesError::Dice(_) => Self::Validation {
                message: error.to_string(),
            },
            // Everything else breaks a documented invariant.
            _ => Self::Invariant {
                message: error.to_string(),
            },
        }
    }
}

impl From<StoreError> for ToolError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { entity, id } => Self::NotFound {
                entity: entity.to_owned(),
                id,
            },
            StoreError::Rules(rules) => rules.into(),
            other => Self::Storage(other),
        }
    }
}

impl From<DiceParseError> for ToolError {
    fn from(error: DiceParseError) -> Self {
        Self::Validation {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(error: serde_json::Error) -> Self {
        Self::Internal {
            message: error.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for ToolError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation {
            message: errors.to_string(),
        }
    }
}
