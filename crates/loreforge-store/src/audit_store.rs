//! Operations on the `audit_logs` and `calculations` tables.
//!
//! The audit log is the append-only record of every mutating operation,
//! independent of the event bus. `calculations` keeps each dice roll's
//! full breakdown (seed, expression, individual dice) so any contested
//! result can be replayed after the fact.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use loreforge_core::dice::RollBreakdown;
use loreforge_types::AuditEntry;

use crate::error::StoreError;
use crate::sqlite::{json_from_db, json_to_db};

/// Operations on the audit log and roll calculations.
pub struct AuditStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an audit entry and return it with its monotonic ID.
    pub async fn append(
        &self,
        action: &str,
        actor_id: Option<&str>,
        target_id: Option<&str>,
        details: serde_json::Value,
    ) -> Result<AuditEntry, StoreError> {
        let timestamp = Utc::now();
        let result = sqlx::query(
            r"INSERT INTO audit_logs (action, actor_id, target_id, details, timestamp)
              VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(action)
        .bind(actor_id)
        .bind(target_id)
        .bind(json_to_db(&details)?)
        .bind(timestamp)
        .execute(self.pool)
        .await?;

        Ok(AuditEntry {
            id: result.last_insert_rowid(),
            action: action.to_owned(),
            actor_id: actor_id.map(str::to_owned),
            target_id: target_id.map(str::to_owned),
            details,
            timestamp,
        })
    }

    /// The most recent `limit` entries, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditEntry>, StoreError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            "SELECT * FROM audit_logs ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit.max(0))
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(AuditRow::into_entity).collect()
    }

    /// Record one dice roll's breakdown for forensic replay.
    pub async fn record_calculation(
        &self,
        seed: &str,
        breakdown: &RollBreakdown,
        context: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO calculations (seed, expression, rolls, total, context, timestamp)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(seed)
        .bind(&breakdown.expression)
        .bind(json_to_db(&breakdown.rolls)?)
        .bind(breakdown.total)
        .bind(context)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

/// A row from the `audit_logs` table.
#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: i64,
    action: String,
    actor_id: Option<String>,
    target_id: Option<String>,
    details: String,
    timestamp: DateTime<Utc>,
}

impl AuditRow {
    fn into_entity(self) -> Result<AuditEntry, StoreError> {
        let id = self.id.to_string();
        let details = json_from_db("audit entry", &id, &self.details)?;
        Ok(AuditEntry {
            id: self.id,
            action: self.action,
            actor_id: self.actor_id,
            target_id: self.target_id,
            details,
            timestamp: self.timestamp,
        })
    }
}
