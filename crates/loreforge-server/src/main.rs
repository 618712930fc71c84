//! Loreforge engine binary.
//!
//! Wires configuration, the store, the event bus, and the tool registry
//! together, then serves JSON-RPC over stdio (with an optional WebSocket
//! observer republishing the event bus).
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration (defaults <- optional TOML <- `LOREFORGE_` env)
//! 3. Connect the `SQLite` store and apply the schema
//! 4. Build the engine state and register the tool catalog
//! 5. Spawn the observer, when enabled
//! 6. Serve stdio until the orchestrator hangs up

mod rpc;
mod ws;

use tracing::info;
use tracing_subscriber::EnvFilter;

use loreforge_core::{EngineConfig, EventBus};
use loreforge_store::StorePool;
use loreforge_tools::build_engine;

/// Application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize structured logging. Logs go to stderr so stdout
    //    stays a clean JSON-RPC stream.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    info!("loreforge-server starting");

    // 2. Load configuration.
    let config_path = std::env::args().nth(1);
    let config = EngineConfig::load(config_path.as_deref())?;
    info!(
        data_dir = config.storage.data_dir,
        in_memory = config.storage.in_memory,
        observer = config.observer.enabled,
        "configuration loaded"
    );

    // 3. Connect the store.
    let store = StorePool::connect(&config.storage).await?;
    info!("store connected, schema applied");

    // 4. Build the engine and register the tool catalog.
    let bus = EventBus::new();
    let (state, registry) = build_engine(store, bus)?;
    info!(tools = registry.list().len(), "tool catalog registered");

    // 5. Observer, when enabled.
    if config.observer.enabled {
        ws::spawn(state.clone(), &config.observer.bind_addr).await?;
    }

    // 6. Serve stdio until the orchestrator hangs up.
    rpc::run_stdio(registry, state).await?;

    info!("loreforge-server stopped");
    Ok(())
}
