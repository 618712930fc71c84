//! Type-safe identifier wrappers around compact strings.
//!
//! Every entity in the engine has a strongly-typed ID to prevent accidental
//! mixing of identifiers at compile time. Unlike a pure-UUID scheme, the
//! orchestrator is allowed to supply its own ad-hoc identifiers (`"hero"`,
//! `"goblin-2"`), so IDs wrap an owned string. Engine-minted IDs use
//! UUID v7 (time-ordered) via [`generate`].
//!
//! [`generate`]: WorldId::generate

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around `String` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize, JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mint a new engine-generated identifier using UUID v7.
            pub fn generate() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Return the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the wrapper and return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a world.
    WorldId
}

define_id! {
    /// Unique identifier for a character (PC, NPC, enemy, or ally).
    ///
    /// Combat tokens reuse this type: an ad-hoc participant's ID simply
    /// never resolves to a persisted character row.
    CharacterId
}

define_id! {
    /// Unique identifier for an item. Items are world-unique by identity.
    ItemId
}

define_id! {
    /// Unique identifier for a combat encounter.
    EncounterId
}

define_id! {
    /// Unique identifier for a quest.
    QuestId
}

define_id! {
    /// Unique identifier for a quest objective.
    ObjectiveId
}

define_id! {
    /// Unique identifier for a custom effect applied to an actor.
    EffectId
}

define_id! {
    /// Unique identifier for a synthesized-spellbook entry.
    SpellId
}

define_id! {
    /// Unique identifier for an applied map patch.
    PatchId
}

define_id! {
    /// Unique identifier for a region within a world.
    RegionId
}

define_id! {
    /// Unique identifier for a structure placed on the world map.
    StructureId
}

define_id! {
    /// Unique identifier for a river on the world map.
    RiverId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_hoc_ids_are_preserved() {
        let id = CharacterId::new("hero");
        assert_eq!(id.as_str(), "hero");
        assert_eq!(id.to_string(), "hero");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = WorldId::generate();
        let b = WorldId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn id_roundtrip_serde_is_transparent() {
        let id = QuestId::new("q-1");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"q-1\""));
        let restored: Result<QuestId, _> = serde_json::from_str("\"q-1\"");
        assert_eq!(restored.ok(), Some(id));
    }
}
