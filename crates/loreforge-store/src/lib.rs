//! Data layer for the Loreforge engine (`SQLite` via `sqlx`).
//!
//! The relational store is the single source of truth; in-memory managers
//! elsewhere are reconstructible caches. Each entity family has its own
//! store with the contract `create | find | update | delete | list`, and
//! store methods are the only sanctioned writers -- no handler issues raw
//! SQL. Rows are parsed back through the entity schema on every read as
//! defense against schema drift, and multi-row mutations (inventory
//! transfer, encounter-end write-back, quest completion with rewards,
//! heat decay) run inside single transactions.
//!
//! # Modules
//!
//! - [`sqlite`] -- Pool construction and shared column helpers
//! - [`schema`] -- The declarative DDL applied at startup
//! - [`tile_cache`] -- The gzip codec for `worlds.tile_cache`
//! - [`world_store`] -- Worlds, regions, tiles, structures, rivers, patches
//! - [`character_store`] / [`item_store`] -- Characters and inventories
//! - [`encounter_store`] -- Encounters and the HP write-back transaction
//! - [`quest_store`] -- Quests, quest logs, and reward grants
//! - [`theft_store`] -- Theft records, fences, and heat decay
//! - [`effect_store`] -- Custom effects and the synthesized spellbook
//! - [`audit_store`] / [`event_store`] -- The append-only logs
//! - [`turn_store`] -- The world-day singleton

pub mod audit_store;
pub mod character_store;
pub mod effect_store;
pub mod encounter_store;
pub mod error;
pub mod event_store;
pub mod item_store;
pub mod quest_store;
pub mod schema;
pub mod sqlite;
pub mod theft_store;
pub mod tile_cache;
pub mod turn_store;
pub mod world_store;

// Re-export primary types for convenience.
pub use audit_store::AuditStore;
pub use character_store::CharacterStore;
pub use effect_store::EffectStore;
pub use encounter_store::EncounterStore;
pub use error::StoreError;
pub use event_store::EventStore;
pub use item_store::{ItemStore, TransferOutcome};
pub use quest_store::{QuestStore, RewardGrant};
pub use sqlite::StorePool;
pub use theft_store::{DecaySummary, TheftStore};
pub use turn_store::TurnStore;
pub use world_store::WorldStore;
