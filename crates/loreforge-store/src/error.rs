//! Error types for the data layer.
//!
//! All errors propagate via [`StoreError`], which wraps the underlying
//! [`sqlx`] and serde errors with context about which entity was involved.
//! Domain refusals raised inside transactional store methods (transfer,
//! decay) surface through the transparent `Rules` variant so the boundary
//! can classify them.

use loreforge_rules::RulesError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `SQLite` operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A serialization or deserialization error on a JSON column.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced entity is not in the store.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity family searched.
        entity: &'static str,
        /// The identifier that missed.
        id: String,
    },

    /// A stored row no longer parses through the entity schema.
    #[error("stored {entity} row {id} is corrupt: {reason}")]
    Corrupt {
        /// The entity family.
        entity: &'static str,
        /// The offending row's identifier.
        id: String,
        /// What failed to parse.
        reason: String,
    },

    /// Filesystem or compression I/O failed.
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A domain rule was violated inside a transactional mutation.
    #[error(transparent)]
    Rules(#[from] RulesError),
}

impl StoreError {
    /// Shorthand for a [`StoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a [`StoreError::Corrupt`].
    pub fn corrupt(
        entity: &'static str,
        id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Corrupt {
            entity,
            id: id.into(),
            reason: reason.into(),
        }
    }
}
