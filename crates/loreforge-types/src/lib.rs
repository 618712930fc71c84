//! Shared type definitions for the Loreforge simulation engine.
//!
//! This crate is the single source of truth for all types used across the
//! workspace. Entities defined here are what the relational store persists
//! and what tool responses embed in their machine-readable payloads.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe string-backed wrappers for all entity identifiers
//! - [`enums`] -- Closed vocabularies (character types, heat levels, outcomes)
//! - [`entities`] -- Core entity structs (worlds, characters, encounters, ...)

pub mod entities;
pub mod enums;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use entities::{
    AuditEntry, Character, CustomEffect, EffectDuration, EffectTrigger, Encounter, EventEntry,
    Fence, InventoryEntry, Item, MapPatch, Objective, PatchOperation, Quest, QuestLog,
    QuestRewards, Region, River, Stats, SynthesizedSpell, Terrain, TheftRecord, Tile, Token, World,
    WorldStructure,
};
pub use enums::{
    Ability, AdvantageMode, CharacterType, DetectionRisk, DurationType, EffectCategory,
    EncounterStatus, EventType, HeatLevel, ItemType, QuestStatus, RecognitionReaction, Skill,
    StuntOutcome, SynthesisOutcome,
};
pub use ids::{
    CharacterId, EffectId, EncounterId, ItemId, ObjectiveId, PatchId, QuestId, RegionId, RiverId,
    SpellId, StructureId, WorldId,
};
