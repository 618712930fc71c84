//! Operations on the `event_logs` table.
//!
//! Events are appended here first, then published on the bus with the ID
//! the append assigned. The table is append-only and distinct from the
//! audit log: audit rows answer "who changed what", event rows feed
//! subscribers.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use loreforge_types::{EventEntry, EventType};

use crate::error::StoreError;
use crate::sqlite::{enum_from_db, enum_to_db, json_from_db, json_to_db};

/// Operations on the `event_logs` table.
pub struct EventStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EventStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an event and return it with its assigned ID.
    pub async fn append(
        &self,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<EventEntry, StoreError> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            "INSERT INTO event_logs (event_type, payload, timestamp) VALUES (?1, ?2, ?3)",
        )
        .bind(enum_to_db(&event_type)?)
        .bind(json_to_db(&payload)?)
        .bind(timestamp)
        .execute(self.pool)
        .await?;

        Ok(EventEntry {
            id: result.last_insert_rowid(),
            event_type,
            payload,
            timestamp,
        })
    }

    /// The most recent `limit` events, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<EventEntry>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT * FROM event_logs ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit.max(0))
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(EventRow::into_entity).collect()
    }
}

/// A row from the `event_logs` table.
#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: i64,
    event_type: String,
    payload: String,
    timestamp: DateTime<Utc>,
}

impl EventRow {
    fn into_entity(self) -> Result<EventEntry, StoreError> {
        let id = self.id.to_string();
        let event_type: EventType = enum_from_db("event", &id, &self.event_type)?;
        let payload = json_from_db("event", &id, &self.payload)?;
        Ok(EventEntry {
            id: self.id,
            event_type,
            payload,
            timestamp: self.timestamp,
        })
    }
}
