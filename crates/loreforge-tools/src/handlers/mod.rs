//! Tool handlers, grouped by domain.
//!
//! [`register_all`] assembles the full catalog into a registry; each
//! module registers its own tools so the catalog stays declarative.

pub mod batch;
pub mod character;
pub mod combat;
pub mod improv;
pub mod quest;
pub mod rest;
pub mod theft;
pub mod world;

use crate::error::ToolError;
use crate::registry::ToolRegistry;

/// Register every tool the engine exposes.
pub fn register_all(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    world::register(registry)?;
    character::register(registry)?;
    combat::register(registry)?;
    quest::register(registry)?;
    theft::register(registry)?;
    improv::register(registry)?;
    rest::register(registry)?;
    batch::register(registry)?;
    Ok(())
}
