//! `SQLite` pool construction and shared column helpers.
//!
//! The storage location comes from [`StorageConfig`]: a directory path for
//! the file-backed database, or the in-memory mode used by tests. The
//! in-memory pool is pinned to a single connection -- each `SQLite`
//! in-memory connection is its own database, so a wider pool would shear
//! the state apart.

use std::path::Path;
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use loreforge_core::config::StorageConfig;

use crate::error::StoreError;
use crate::schema::SCHEMA;

/// Database file name inside the data directory.
const DB_FILE: &str = "loreforge.db";

/// The shared connection pool with the schema applied.
#[derive(Debug, Clone)]
pub struct StorePool {
    pool: SqlitePool,
}

impl StorePool {
    /// Connect according to the storage configuration and apply the
    /// schema.
    pub async fn connect(config: &StorageConfig) -> Result<Self, StoreError> {
        if config.in_memory {
            return Self::in_memory().await;
        }

        let dir = Path::new(&config.data_dir);
        std::fs::create_dir_all(dir)?;
        let options = SqliteConnectOptions::new()
            .filename(dir.join(DB_FILE))
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        Self::initialize(pool).await
    }

    /// An in-memory pool for tests: one connection, one database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::initialize(pool).await
    }

    async fn initialize(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        // Seed the world-day singleton.
        sqlx::query(
            "INSERT OR IGNORE INTO turn_state (id, day, updated_at) VALUES (1, 0, ?1)",
        )
        .bind(chrono::Utc::now())
        .execute(&pool)
        .await?;
        tracing::debug!("schema applied");
        Ok(Self { pool })
    }

    /// The underlying pool, for the per-family stores.
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

/// Serialize a unit-variant enum to its wire name for a TEXT column.
pub(crate) fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(name) => Ok(name),
        other => Err(StoreError::corrupt(
            "enum",
            other.to_string(),
            "enum did not serialize to a string",
        )),
    }
}

/// Parse a TEXT column back into a unit-variant enum by its wire name.
pub(crate) fn enum_from_db<T: serde::de::DeserializeOwned>(
    entity: &'static str,
    id: &str,
    raw: &str,
) -> Result<T, StoreError> {
    serde_json::from_value(serde_json::Value::String(raw.to_owned()))
        .map_err(|e| StoreError::corrupt(entity, id, format!("bad enum value {raw:?}: {e}")))
}

/// Serialize any value to a JSON TEXT column.
pub(crate) fn json_to_db<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    Ok(serde_json::to_string(value)?)
}

/// Parse a JSON TEXT column, attributing failures to the owning row.
pub(crate) fn json_from_db<T: serde::de::DeserializeOwned>(
    entity: &'static str,
    id: &str,
    raw: &str,
) -> Result<T, StoreError> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::corrupt(entity, id, format!("bad json column: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use loreforge_types::HeatLevel;

    use super::*;

    #[tokio::test]
    async fn in_memory_pool_applies_schema() {
        let store = StorePool::in_memory().await.unwrap();
        let day: (i64,) = sqlx::query_as("SELECT day FROM turn_state WHERE id = 1")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(day.0, 0);
    }

    #[test]
    fn enum_columns_round_trip() {
        let raw = enum_to_db(&HeatLevel::Burning).unwrap();
        assert_eq!(raw, "burning");
        let back: HeatLevel = enum_from_db("heat", "x", &raw).unwrap();
        assert_eq!(back, HeatLevel::Burning);
        let bad: Result<HeatLevel, _> = enum_from_db("heat", "x", "molten");
        assert!(bad.is_err());
    }
}
