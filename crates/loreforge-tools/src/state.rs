//! Shared engine state injected into every tool handler.
//!
//! [`EngineState`] is the explicit collaborator bundle: the store pool,
//! the event bus, the session-keyed combat manager, and the world
//! generator. It is created once at startup (`init`) and dropped at
//! shutdown -- no hidden process-global state. Runtime caches are keyed
//! by `session:entity` so concurrent conversations stay isolated.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use loreforge_core::EventBus;
use loreforge_rules::combat::CombatEngine;
use loreforge_rules::worldgen::WorldGenerator;
use loreforge_store::{
    AuditStore, CharacterStore, EffectStore, EncounterStore, EventStore, ItemStore, QuestStore,
    StorePool, TheftStore, TurnStore, WorldStore,
};
use loreforge_types::{EncounterId, EventEntry, EventType};

use crate::error::ToolError;
use crate::registry::ToolRegistry;

// ---------------------------------------------------------------------------
// CombatManager
// ---------------------------------------------------------------------------

/// Session-keyed cache of live combat engines.
///
/// Engines are reconstructible from persisted encounter snapshots; this
/// cache only saves the reconstruction cost between calls. Keys are
/// `"<session>:<encounter>"`.
#[derive(Debug, Default)]
pub struct CombatManager {
    engines: Mutex<HashMap<String, CombatEngine>>,
}

impl CombatManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(session_id: &str, encounter: &EncounterId) -> String {
        format!("{session_id}:{encounter}")
    }

    /// Insert or replace the engine for an encounter.
    pub fn insert(&self, session_id: &str, engine: CombatEngine) {
        let key = Self::key(session_id, &engine.encounter().id);
        self.engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, engine);
    }

    /// Run a closure against the cached engine, if present. The lock is
    /// held only for the duration of the closure -- never across awaits.
    pub fn with_engine<R>(
        &self,
        session_id: &str,
        encounter: &EncounterId,
        f: impl FnOnce(&mut CombatEngine) -> R,
    ) -> Option<R> {
        let key = Self::key(session_id, encounter);
        let mut engines = self
            .engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        engines.get_mut(&key).map(f)
    }

    /// Remove and return the engine for an encounter.
    pub fn take(&self, session_id: &str, encounter: &EncounterId) -> Option<CombatEngine> {
        let key = Self::key(session_id, encounter);
        self.engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
    }
}

// ---------------------------------------------------------------------------
// EngineState
// ---------------------------------------------------------------------------

/// The collaborator bundle shared by every handler.
pub struct EngineState {
    store: StorePool,
    bus: EventBus,
    combat: CombatManager,
    generator: Box<dyn WorldGenerator>,
    registry: OnceLock<Weak<ToolRegistry>>,
}

impl EngineState {
    /// Assemble the engine state. Called once at startup.
    pub fn new(store: StorePool, bus: EventBus, generator: Box<dyn WorldGenerator>) -> Arc<Self> {
        Arc::new(Self {
            store,
            bus,
            combat: CombatManager::new(),
            generator,
            registry: OnceLock::new(),
        })
    }

    /// Attach the registry after construction (the registry holds
    /// handlers that hold this state, so the link must be weak and
    /// late-bound). Used by the workflow executor.
    pub fn attach_registry(&self, registry: &Arc<ToolRegistry>) {
        let _ = self.registry.set(Arc::downgrade(registry));
    }

    /// The registry, when attached and still alive.
    pub fn registry(&self) -> Option<Arc<ToolRegistry>> {
        self.registry.get().and_then(Weak::upgrade)
    }

    /// The event bus.
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The combat-engine cache.
    pub const fn combat(&self) -> &CombatManager {
        &self.combat
    }

    /// The world generator seam.
    pub fn generator(&self) -> &dyn WorldGenerator {
        self.generator.as_ref()
    }

    // -----------------------------------------------------------------------
    // Store accessors
    // -----------------------------------------------------------------------

    /// The character store.
    pub const fn characters(&self) -> CharacterStore<'_> {
        CharacterStore::new(self.store.pool())
    }

    /// The item/inventory store.
    pub const fn items(&self) -> ItemStore<'_> {
        ItemStore::new(self.store.pool())
    }

    /// The world store.
    pub const fn worlds(&self) -> WorldStore<'_> {
        WorldStore::new(self.store.pool())
    }

    /// The encounter store.
    pub const fn encounters(&self) -> EncounterStore<'_> {
        EncounterStore::new(self.store.pool())
    }

    /// The quest store.
    pub const fn quests(&self) -> QuestStore<'_> {
        QuestStore::new(self.store.pool())
    }

    /// The theft store.
    pub const fn thefts(&self) -> TheftStore<'_> {
        TheftStore::new(self.store.pool())
    }

    /// The effect/spellbook store.
    pub const fn effects(&self) -> EffectStore<'_> {
        EffectStore::new(self.store.pool())
    }

    /// The audit store.
    pub const fn audits(&self) -> AuditStore<'_> {
        AuditStore::new(self.store.pool())
    }

    /// The event-log store.
    pub const fn events(&self) -> EventStore<'_> {
        EventStore::new(self.store.pool())
    }

    /// The world-day singleton.
    pub const fn turns(&self) -> TurnStore<'_> {
        TurnStore::new(self.store.pool())
    }

    // -----------------------------------------------------------------------
    // Cross-cutting emissions
    // -----------------------------------------------------------------------

    /// Append an audit entry for a mutating operation.
    pub async fn audit(
        &self,
        action: &str,
        actor_id: Option<&str>,
        target_id: Option<&str>,
        details: serde_json::Value,
    ) -> Result<(), ToolError> {
        self.audits()
            .append(action, actor_id, target_id, details)
            .await?;
        Ok(())
    }

    /// Append an event to `event_logs` and publish it on the bus.
    /// Publication is fire-and-forget; persistence is not.
    pub async fn publish(
        &self,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<EventEntry, ToolError> {
        let entry = self.events().append(event_type, payload).await?;
        self.bus.publish(entry.clone());
        Ok(entry)
    }
}

impl core::fmt::Debug for EngineState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EngineState").finish_non_exhaustive()
    }
}
