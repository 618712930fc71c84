//! Infrastructure for the Loreforge engine: seeded dice, fuzzy action
//! matching, the event bus, and configuration.
//!
//! # Modules
//!
//! - [`dice`] -- Deterministic per-call dice streams and notation parsing
//! - [`fuzzy`] -- Normalized edit-distance matching for action aliases
//! - [`bus`] -- In-process publish-subscribe event bus
//! - [`config`] -- Layered engine configuration

pub mod bus;
pub mod config;
pub mod dice;
pub mod fuzzy;

pub use bus::EventBus;
pub use config::{ConfigError, EngineConfig, ObserverConfig, StorageConfig};
pub use dice::{D20Roll, DiceExpr, DiceParseError, RollBreakdown, SeededDice};
pub use fuzzy::{DISPATCH_THRESHOLD, Resolution, Suggestion, resolve, similarity};
