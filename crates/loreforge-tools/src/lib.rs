//! The boundary layer of the Loreforge engine: tool registry, action
//! router, schema validation, and handlers.
//!
//! Every narrative operation flows through the same pipeline:
//!
//! ```text
//! caller -> registry.invoke(name, args)
//!        -> schema parse + bounds (ValidationError on mismatch)
//!        -> handler (consolidated tools route the `action` field first,
//!           with fuzzy alias resolution)
//!        -> repositories (the only writers)
//!        -> audit + event emission
//!        -> response envelope with an embedded STATE_JSON payload
//! ```
//!
//! # Modules
//!
//! - [`registry`] -- Registration, discovery, invocation
//! - [`router`] -- The consolidated-tool action router
//! - [`envelope`] -- The response envelope and `STATE_JSON` contract
//! - [`state`] -- The injected collaborator bundle and combat manager
//! - [`handlers`] -- Every tool, grouped by domain
//! - [`error`] -- The boundary error taxonomy

pub mod envelope;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod state;

pub use envelope::{ContentBlock, STATE_CLOSE, STATE_OPEN, ToolResponse};
pub use error::ToolError;
pub use registry::{
    SessionContext, ToolContext, ToolDef, ToolDescriptor, ToolRegistry, typed_tool,
};
pub use router::{ActionSpec, consolidated_tool, resolve_action};
pub use state::{CombatManager, EngineState};

use std::sync::Arc;

use loreforge_core::EventBus;
use loreforge_rules::SeededWorldGenerator;
use loreforge_store::StorePool;

/// Build a ready-to-serve engine: state, full tool catalog, and the
/// registry back-link that workflows need.
pub fn build_engine(
    store: StorePool,
    bus: EventBus,
) -> Result<(Arc<EngineState>, Arc<ToolRegistry>), ToolError> {
    let state = EngineState::new(store, bus, Box::new(SeededWorldGenerator::new()));
    let mut registry = ToolRegistry::new();
    handlers::register_all(&mut registry)?;
    let registry = Arc::new(registry);
    state.attach_registry(&registry);
    Ok((state, registry))
}
