//! Operations on the `theft_records` and `fences` tables.
//!
//! Theft records are keyed by item -- one open provenance per item; a
//! re-steal replaces the record. Heat decay is a single transaction
//! stepping every record toward cold, resetting fence daily capacity,
//! and advancing the world day counter.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use loreforge_rules::theft::decay_heat;
use loreforge_types::{CharacterId, Fence, HeatLevel, ItemId, ItemType, TheftRecord};

use crate::error::StoreError;
use crate::sqlite::{enum_from_db, enum_to_db, json_from_db, json_to_db};

/// Summary of one decay pass.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecaySummary {
    /// Days advanced.
    pub days_advanced: i64,
    /// The world day after the decay.
    pub current_day: i64,
    /// How many records changed heat level.
    pub records_cooled: i64,
    /// How many fences had their daily capacity reset.
    pub fences_reset: i64,
}

/// Operations on theft records and fences.
pub struct TheftStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TheftStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Insert or replace the provenance record for an item.
    pub async fn upsert_record(&self, record: &TheftRecord) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO theft_records
              (item_id, stolen_from, stolen_by, stolen_location, witnesses, heat_level,
               reported_to_guards, bounty, fenced, fenced_at_day, created_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
              ON CONFLICT (item_id) DO UPDATE SET
                stolen_from = excluded.stolen_from,
                stolen_by = excluded.stolen_by,
                stolen_location = excluded.stolen_location,
                witnesses = excluded.witnesses,
                heat_level = excluded.heat_level,
                reported_to_guards = excluded.reported_to_guards,
                bounty = excluded.bounty,
                fenced = excluded.fenced,
                fenced_at_day = excluded.fenced_at_day,
                created_at = excluded.created_at",
        )
        .bind(record.item_id.as_str())
        .bind(record.stolen_from.as_str())
        .bind(record.stolen_by.as_str())
        .bind(record.stolen_location.as_deref())
        .bind(json_to_db(&record.witnesses)?)
        .bind(enum_to_db(&record.heat_level)?)
        .bind(record.reported_to_guards)
        .bind(record.bounty)
        .bind(record.fenced)
        .bind(record.fenced_at_day)
        .bind(record.created_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch the record for an item, if any.
    pub async fn try_get_record(
        &self,
        item: &ItemId,
    ) -> Result<Option<TheftRecord>, StoreError> {
        let row = sqlx::query_as::<_, TheftRow>(
            "SELECT * FROM theft_records WHERE item_id = ?1",
        )
        .bind(item.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(TheftRow::into_entity).transpose()
    }

    /// The records for a set of items (used by search-character).
    pub async fn records_for_items(
        &self,
        items: &[ItemId],
    ) -> Result<Vec<TheftRecord>, StoreError> {
        let mut found = Vec::new();
        for item in items {
            if let Some(record) = self.try_get_record(item).await? {
                found.push(record);
            }
        }
        Ok(found)
    }

    /// Every record, ordered hottest-first by creation time.
    pub async fn list_records(&self) -> Result<Vec<TheftRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TheftRow>(
            "SELECT * FROM theft_records ORDER BY created_at DESC",
        )
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TheftRow::into_entity).collect()
    }

    /// Items with an open (un-fenced) record naming this NPC as the
    /// victim. Non-empty means the NPC cannot register as a fence.
    pub async fn open_victim_items(
        &self,
        npc: &CharacterId,
    ) -> Result<Vec<ItemId>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT item_id FROM theft_records WHERE stolen_from = ?1 AND fenced = 0 ORDER BY item_id",
        )
        .bind(npc.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| ItemId::new(id)).collect())
    }

    // -----------------------------------------------------------------------
    // Fences
    // -----------------------------------------------------------------------

    /// Insert or overwrite a fence.
    pub async fn upsert_fence(&self, fence: &Fence) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO fences
              (npc_id, faction_id, buy_rate, max_heat_level, daily_heat_capacity,
               daily_heat_used, specializations, cooldown_days)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
              ON CONFLICT (npc_id) DO UPDATE SET
                faction_id = excluded.faction_id,
                buy_rate = excluded.buy_rate,
                max_heat_level = excluded.max_heat_level,
                daily_heat_capacity = excluded.daily_heat_capacity,
                daily_heat_used = excluded.daily_heat_used,
                specializations = excluded.specializations,
                cooldown_days = excluded.cooldown_days",
        )
        .bind(fence.npc_id.as_str())
        .bind(fence.faction_id.as_deref())
        .bind(fence.buy_rate.to_string())
        .bind(enum_to_db(&fence.max_heat_level)?)
        .bind(fence.daily_heat_capacity)
        .bind(fence.daily_heat_used)
        .bind(json_to_db(&fence.specializations)?)
        .bind(fence.cooldown_days)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a fence if registered.
    pub async fn try_get_fence(&self, npc: &CharacterId) -> Result<Option<Fence>, StoreError> {
        let row = sqlx::query_as::<_, FenceRow>("SELECT * FROM fences WHERE npc_id = ?1")
            .bind(npc.as_str())
            .fetch_optional(self.pool)
            .await?;
        row.map(FenceRow::into_entity).transpose()
    }

    /// Fetch a fence or fail with `NotFound`.
    pub async fn get_fence(&self, npc: &CharacterId) -> Result<Fence, StoreError> {
        self.try_get_fence(npc)
            .await?
            .ok_or_else(|| StoreError::not_found("fence", npc.as_str()))
    }

    /// Every registered fence.
    pub async fn list_fences(&self) -> Result<Vec<Fence>, StoreError> {
        let rows = sqlx::query_as::<_, FenceRow>("SELECT * FROM fences ORDER BY npc_id")
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(FenceRow::into_entity).collect()
    }

    /// Record a completed sale: mark the record fenced, reset its heat to
    /// cold-side bookkeeping day, and charge the fence's daily capacity.
    pub async fn record_sale(
        &self,
        item: &ItemId,
        fence: &CharacterId,
        heat_cost: i64,
        current_day: i64,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE theft_records SET fenced = 1, fenced_at_day = ?2 WHERE item_id = ?1",
        )
        .bind(item.as_str())
        .bind(current_day)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE fences SET daily_heat_used = daily_heat_used + ?2 WHERE npc_id = ?1",
        )
        .bind(fence.as_str())
        .bind(heat_cost)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Decay
    // -----------------------------------------------------------------------

    /// Advance simulated days: step every un-fenced record's heat toward
    /// cold (one step per day), reset every fence's daily capacity, and
    /// move the world day counter. One transaction.
    pub async fn apply_decay(&self, days: i64) -> Result<DecaySummary, StoreError> {
        let days = days.max(0);
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query_as::<_, TheftRow>("SELECT * FROM theft_records")
            .fetch_all(&mut *tx)
            .await?;
        let mut records_cooled = 0_i64;
        for row in rows {
            let record = row.into_entity()?;
            let cooled = decay_heat(record.heat_level, days);
            if cooled != record.heat_level {
                sqlx::query("UPDATE theft_records SET heat_level = ?2 WHERE item_id = ?1")
                    .bind(record.item_id.as_str())
                    .bind(enum_to_db(&cooled)?)
                    .execute(&mut *tx)
                    .await?;
                records_cooled = records_cooled.saturating_add(1);
            }
        }

        let reset = sqlx::query("UPDATE fences SET daily_heat_used = 0")
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE turn_state SET day = day + ?1, updated_at = ?2 WHERE id = 1")
            .bind(days)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        let (current_day,): (i64,) =
            sqlx::query_as("SELECT day FROM turn_state WHERE id = 1")
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(DecaySummary {
            days_advanced: days,
            current_day,
            records_cooled,
            fences_reset: i64::try_from(reset.rows_affected()).unwrap_or(i64::MAX),
        })
    }
}

/// A row from the `theft_records` table.
#[derive(Debug, sqlx::FromRow)]
struct TheftRow {
    item_id: String,
    stolen_from: String,
    stolen_by: String,
    stolen_location: Option<String>,
    witnesses: String,
    heat_level: String,
    reported_to_guards: bool,
    bounty: i64,
    fenced: bool,
    fenced_at_day: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TheftRow {
    fn into_entity(self) -> Result<TheftRecord, StoreError> {
        let witnesses: Vec<CharacterId> =
            json_from_db("theft_record", &self.item_id, &self.witnesses)?;
        let heat_level: HeatLevel =
            enum_from_db("theft_record", &self.item_id, &self.heat_level)?;
        Ok(TheftRecord {
            item_id: ItemId::new(self.item_id),
            stolen_from: CharacterId::new(self.stolen_from),
            stolen_by: CharacterId::new(self.stolen_by),
            stolen_location: self.stolen_location,
            witnesses,
            heat_level,
            reported_to_guards: self.reported_to_guards,
            bounty: self.bounty,
            fenced: self.fenced,
            fenced_at_day: self.fenced_at_day,
            created_at: self.created_at,
        })
    }
}

/// A row from the `fences` table.
#[derive(Debug, sqlx::FromRow)]
struct FenceRow {
    npc_id: String,
    faction_id: Option<String>,
    buy_rate: String,
    max_heat_level: String,
    daily_heat_capacity: i64,
    daily_heat_used: i64,
    specializations: String,
    cooldown_days: i64,
}

impl FenceRow {
    fn into_entity(self) -> Result<Fence, StoreError> {
        let buy_rate: Decimal = self.buy_rate.parse().map_err(|e| {
            StoreError::corrupt("fence", self.npc_id.as_str(), format!("bad buy_rate: {e}"))
        })?;
        let max_heat_level: HeatLevel =
            enum_from_db("fence", &self.npc_id, &self.max_heat_level)?;
        let specializations: Vec<ItemType> =
            json_from_db("fence", &self.npc_id, &self.specializations)?;
        Ok(Fence {
            npc_id: CharacterId::new(self.npc_id),
            faction_id: self.faction_id,
            buy_rate,
            max_heat_level,
            daily_heat_capacity: self.daily_heat_capacity,
            daily_heat_used: self.daily_heat_used,
            specializations,
            cooldown_days: self.cooldown_days,
        })
    }
}
