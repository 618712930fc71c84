//! The `turn_state` singleton: the simulated world-day counter.
//!
//! Heat decay and fence cooldowns measure time in world days. The counter
//! only moves forward, via the theft engine's decay pass.

use sqlx::SqlitePool;

use crate::error::StoreError;

/// Operations on the `turn_state` singleton row.
pub struct TurnStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TurnStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// The current world day.
    pub async fn current_day(&self) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT day FROM turn_state WHERE id = 1")
            .fetch_one(self.pool)
            .await?;
        Ok(row.0)
    }
}
