//! Operations on the `items` and `inventory_items` tables.
//!
//! Inventory entries are keyed by the `(character, item)` pair. The
//! transfer path is the one multi-row mutation here and runs inside a
//! single transaction: validate against the live source row, decrement or
//! delete it, insert-or-increment the destination. No partial transfer is
//! ever observable.

use sqlx::SqlitePool;

use loreforge_rules::inventory::validate_transfer;
use loreforge_types::{CharacterId, InventoryEntry, Item, ItemId, ItemType};

use crate::error::StoreError;
use crate::sqlite::{enum_from_db, enum_to_db, json_from_db, json_to_db};

/// Operations on items and inventories.
pub struct ItemStore<'a> {
    pool: &'a SqlitePool,
}

/// The result of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    /// The item moved.
    pub item_id: ItemId,
    /// Units moved.
    pub quantity: i64,
    /// Units left at the source (0 means the row was deleted).
    pub source_remaining: i64,
    /// Units now at the destination.
    pub destination_quantity: i64,
}

impl<'a> ItemStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Items
    // -----------------------------------------------------------------------

    /// Insert a new item definition.
    pub async fn create_item(&self, item: &Item) -> Result<(), StoreError> {
        let properties = item
            .properties
            .as_ref()
            .map(json_to_db)
            .transpose()?;
        sqlx::query(
            r"INSERT INTO items (id, name, item_type, weight, value, properties)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(item.id.as_str())
        .bind(&item.name)
        .bind(enum_to_db(&item.item_type)?)
        .bind(item.weight)
        .bind(item.value)
        .bind(properties)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch an item if it exists.
    pub async fn try_get_item(&self, id: &ItemId) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query_as::<_, ItemRow>("SELECT * FROM items WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(self.pool)
            .await?;
        row.map(ItemRow::into_entity).transpose()
    }

    /// Fetch an item or fail with `NotFound`.
    pub async fn get_item(&self, id: &ItemId) -> Result<Item, StoreError> {
        self.try_get_item(id)
            .await?
            .ok_or_else(|| StoreError::not_found("item", id.as_str()))
    }

    /// List every item, ordered by name.
    pub async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query_as::<_, ItemRow>("SELECT * FROM items ORDER BY name, id")
            .fetch_all(self.pool)
            .await?;
        rows.into_iter().map(ItemRow::into_entity).collect()
    }

    // -----------------------------------------------------------------------
    // Inventory
    // -----------------------------------------------------------------------

    /// Give a character `quantity` units of an item, creating or
    /// incrementing the stack.
    pub async fn grant(
        &self,
        character: &CharacterId,
        item: &ItemId,
        quantity: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO inventory_items (character_id, item_id, quantity, equipped, slot)
              VALUES (?1, ?2, ?3, 0, NULL)
              ON CONFLICT (character_id, item_id)
              DO UPDATE SET quantity = quantity + excluded.quantity",
        )
        .bind(character.as_str())
        .bind(item.as_str())
        .bind(quantity.max(1))
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// The entry for one `(character, item)` pair, if any.
    pub async fn entry(
        &self,
        character: &CharacterId,
        item: &ItemId,
    ) -> Result<Option<InventoryEntry>, StoreError> {
        let row = sqlx::query_as::<_, InventoryRow>(
            "SELECT * FROM inventory_items WHERE character_id = ?1 AND item_id = ?2",
        )
        .bind(character.as_str())
        .bind(item.as_str())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(InventoryRow::into_entity))
    }

    /// Every stack a character holds.
    pub async fn inventory_for(
        &self,
        character: &CharacterId,
    ) -> Result<Vec<InventoryEntry>, StoreError> {
        let rows = sqlx::query_as::<_, InventoryRow>(
            "SELECT * FROM inventory_items WHERE character_id = ?1 ORDER BY item_id",
        )
        .bind(character.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(InventoryRow::into_entity).collect())
    }

    /// Every character holding the given item -- the world-unique-item
    /// answer.
    pub async fn holders_of(&self, item: &ItemId) -> Result<Vec<CharacterId>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT character_id FROM inventory_items WHERE item_id = ?1 ORDER BY character_id",
        )
        .bind(item.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| CharacterId::new(id)).collect())
    }

    /// Set the equipped flag and slot on an existing entry. Slot
    /// exclusivity is validated by the caller against the full inventory.
    pub async fn set_equipped(
        &self,
        character: &CharacterId,
        item: &ItemId,
        equipped: bool,
        slot: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE inventory_items SET equipped = ?3, slot = ?4
              WHERE character_id = ?1 AND item_id = ?2",
        )
        .bind(character.as_str())
        .bind(item.as_str())
        .bind(equipped)
        .bind(slot)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("inventory entry", item.as_str()));
        }
        Ok(())
    }

    /// Move `quantity` units of `item` between characters atomically.
    ///
    /// Fails without touching anything if the source stack is missing,
    /// equipped, or too small.
    pub async fn transfer(
        &self,
        from: &CharacterId,
        to: &CharacterId,
        item: &ItemId,
        quantity: i64,
    ) -> Result<TransferOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let source = sqlx::query_as::<_, InventoryRow>(
            "SELECT * FROM inventory_items WHERE character_id = ?1 AND item_id = ?2",
        )
        .bind(from.as_str())
        .bind(item.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .map(InventoryRow::into_entity)
        .ok_or_else(|| StoreError::not_found("inventory entry", item.as_str()))?;

        validate_transfer(&source, quantity)?;

        let source_remaining = source.quantity.saturating_sub(quantity);
        if source_remaining == 0 {
            sqlx::query(
                "DELETE FROM inventory_items WHERE character_id = ?1 AND item_id = ?2",
            )
            .bind(from.as_str())
            .bind(item.as_str())
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                r"UPDATE inventory_items SET quantity = ?3
                  WHERE character_id = ?1 AND item_id = ?2",
            )
            .bind(from.as_str())
            .bind(item.as_str())
            .bind(source_remaining)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r"INSERT INTO inventory_items (character_id, item_id, quantity, equipped, slot)
              VALUES (?1, ?2, ?3, 0, NULL)
              ON CONFLICT (character_id, item_id)
              DO UPDATE SET quantity = quantity + excluded.quantity",
        )
        .bind(to.as_str())
        .bind(item.as_str())
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        let destination: (i64,) = sqlx::query_as(
            "SELECT quantity FROM inventory_items WHERE character_id = ?1 AND item_id = ?2",
        )
        .bind(to.as_str())
        .bind(item.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(%from, %to, %item, quantity, "inventory transferred");

        Ok(TransferOutcome {
            item_id: item.clone(),
            quantity,
            source_remaining,
            destination_quantity: destination.0,
        })
    }
}

/// A row from the `items` table.
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    name: String,
    item_type: String,
    weight: f64,
    value: i64,
    properties: Option<String>,
}

impl ItemRow {
    fn into_entity(self) -> Result<Item, StoreError> {
        let item_type: ItemType = enum_from_db("item", &self.id, &self.item_type)?;
        let properties = self
            .properties
            .as_deref()
            .map(|raw| json_from_db("item", &self.id, raw))
            .transpose()?;
        Ok(Item {
            id: ItemId::new(self.id),
            name: self.name,
            item_type,
            weight: self.weight,
            value: self.value,
            properties,
        })
    }
}

/// A row from the `inventory_items` table.
#[derive(Debug, sqlx::FromRow)]
struct InventoryRow {
    character_id: String,
    item_id: String,
    quantity: i64,
    equipped: bool,
    slot: Option<String>,
}

impl InventoryRow {
    fn into_entity(self) -> InventoryEntry {
        InventoryEntry {
            character_id: CharacterId::new(self.character_id),
            item_id: ItemId::new(self.item_id),
            quantity: self.quantity,
            equipped: self.equipped,
            slot: self.slot,
        }
    }
}
