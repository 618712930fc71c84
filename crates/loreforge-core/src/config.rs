//! Engine configuration.
//!
//! Configuration is layered: built-in defaults, then an optional
//! `loreforge.toml`, then `LOREFORGE_`-prefixed environment variables
//! (`LOREFORGE_STORAGE__DATA_DIR` and friends). The only setting the
//! engine strictly needs is the storage location; everything else has a
//! working default.

use serde::Deserialize;

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The underlying config source failed to load or deserialize.
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

/// Where and how state is persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the SQLite database file. Created if missing.
    pub data_dir: String,
    /// When true, an in-memory store is used instead (tests).
    pub in_memory: bool,
}

/// The optional WebSocket observer surface.
#[derive(Debug, Clone, Deserialize)]
pub struct ObserverConfig {
    /// Whether to serve the observer at all.
    pub enabled: bool,
    /// Bind address, e.g. `127.0.0.1:8787`.
    pub bind_addr: String,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Persistence settings.
    pub storage: StorageConfig,
    /// Observer settings.
    pub observer: ObserverConfig,
}

impl EngineConfig {
    /// Load configuration from defaults, an optional TOML file, and the
    /// environment.
    pub fn load(file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("storage.data_dir", "./loreforge-data")?
            .set_default("storage.in_memory", false)?
            .set_default("observer.enabled", false)?
            .set_default("observer.bind_addr", "127.0.0.1:8787")?;

        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("LOREFORGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// An in-memory configuration for tests.
    pub fn in_memory() -> Self {
        Self {
            storage: StorageConfig {
                data_dir: String::new(),
                in_memory: true,
            },
            observer: ObserverConfig {
                enabled: false,
                bind_addr: String::from("127.0.0.1:0"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let loaded = EngineConfig::load(None);
        assert!(loaded.is_ok());
        if let Ok(config) = loaded {
            assert!(!config.storage.in_memory);
            assert!(!config.observer.enabled);
        }
    }

    #[test]
    fn in_memory_preset_is_in_memory() {
        let config = EngineConfig::in_memory();
        assert!(config.storage.in_memory);
    }
}
