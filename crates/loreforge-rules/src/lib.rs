//! Domain engines for the Loreforge simulation.
//!
//! Every narrative operation the boundary layer exposes resolves through
//! the logic here: pure-ish functions and small engines that take
//! pre-assembled state plus a seeded dice stream and return structured
//! reports. Persistence and transport never leak into this crate.
//!
//! # Modules
//!
//! - [`character`] -- Ability-score and proficiency math
//! - [`combat`] -- Initiative, the turn machine, attack/heal resolution
//! - [`theft`] -- Stolen-item heat, recognition, fencing, decay
//! - [`quest`] -- Prerequisite chains, objective progress, completion
//! - [`improv`] -- Stunts, custom effects, arcane synthesis
//! - [`rest`] -- Long and short rests
//! - [`inventory`] -- Transfer and equip-slot rules
//! - [`worldgen`] -- The opaque world-generation seam
//! - [`error`] -- The crate's error hierarchy

pub mod character;
pub mod combat;
pub mod error;
pub mod improv;
pub mod inventory;
pub mod quest;
pub mod rest;
pub mod theft;
pub mod worldgen;

pub use combat::{AttackInput, AttackReport, CombatEngine, EndReport, ParticipantSpec};
pub use error::{FenceRefusal, RulesError};
pub use worldgen::{GeneratedWorld, SeededWorldGenerator, WorldGenerator};
