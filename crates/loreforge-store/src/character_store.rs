//! Operations on the `characters` table.
//!
//! Every row read is parsed back through the entity schema before being
//! returned -- stored JSON (stats) and enum columns are not trusted to
//! still match the code that wrote them.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use loreforge_types::{Character, CharacterId, CharacterType, Stats};

use crate::error::StoreError;
use crate::sqlite::{enum_from_db, enum_to_db, json_from_db, json_to_db};

/// Operations on the `characters` table.
pub struct CharacterStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CharacterStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new character. Fails on a duplicate ID.
    pub async fn create(&self, character: &Character) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO characters
              (id, name, stats, hp, max_hp, ac, level, hit_die, hit_dice_remaining,
               faction_id, behavior, character_type, created_at, updated_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .bind(character.id.as_str())
        .bind(&character.name)
        .bind(json_to_db(&character.stats)?)
        .bind(character.hp)
        .bind(character.max_hp)
        .bind(character.ac)
        .bind(character.level)
        .bind(character.hit_die)
        .bind(character.hit_dice_remaining)
        .bind(character.faction_id.as_deref())
        .bind(character.behavior.as_deref())
        .bind(enum_to_db(&character.character_type)?)
        .bind(character.created_at)
        .bind(character.updated_at)
        .execute(self.pool)
        .await?;
        tracing::debug!(id = %character.id, "character created");
        Ok(())
    }

    /// Fetch a character if it exists.
    pub async fn try_get(&self, id: &CharacterId) -> Result<Option<Character>, StoreError> {
        let row = sqlx::query_as::<_, CharacterRow>(
            "SELECT * FROM characters WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(CharacterRow::into_entity).transpose()
    }

    /// Fetch a character or fail with `NotFound`.
    pub async fn get(&self, id: &CharacterId) -> Result<Character, StoreError> {
        self.try_get(id)
            .await?
            .ok_or_else(|| StoreError::not_found("character", id.as_str()))
    }

    /// Whether a character row exists.
    pub async fn exists(&self, id: &CharacterId) -> Result<bool, StoreError> {
        Ok(self.try_get(id).await?.is_some())
    }

    /// Overwrite an existing character.
    pub async fn update(&self, character: &Character) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE characters SET
              name = ?2, stats = ?3, hp = ?4, max_hp = ?5, ac = ?6, level = ?7,
              hit_die = ?8, hit_dice_remaining = ?9, faction_id = ?10,
              behavior = ?11, character_type = ?12, updated_at = ?13
              WHERE id = ?1",
        )
        .bind(character.id.as_str())
        .bind(&character.name)
        .bind(json_to_db(&character.stats)?)
        .bind(character.hp)
        .bind(character.max_hp)
        .bind(character.ac)
        .bind(character.level)
        .bind(character.hit_die)
        .bind(character.hit_dice_remaining)
        .bind(character.faction_id.as_deref())
        .bind(character.behavior.as_deref())
        .bind(enum_to_db(&character.character_type)?)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("character", character.id.as_str()));
        }
        Ok(())
    }

    /// Delete a character; inventory and quest-log rows cascade.
    pub async fn delete(&self, id: &CharacterId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM characters WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List every character, ordered by name.
    pub async fn list(&self) -> Result<Vec<Character>, StoreError> {
        let rows = sqlx::query_as::<_, CharacterRow>(
            "SELECT * FROM characters ORDER BY name, id",
        )
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(CharacterRow::into_entity).collect()
    }
}

/// A row from the `characters` table.
#[derive(Debug, sqlx::FromRow)]
struct CharacterRow {
    id: String,
    name: String,
    stats: String,
    hp: i64,
    max_hp: i64,
    ac: i64,
    level: i64,
    hit_die: i64,
    hit_dice_remaining: i64,
    faction_id: Option<String>,
    behavior: Option<String>,
    character_type: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CharacterRow {
    fn into_entity(self) -> Result<Character, StoreError> {
        let stats: Stats = json_from_db("character", &self.id, &self.stats)?;
        let character_type: CharacterType =
            enum_from_db("character", &self.id, &self.character_type)?;
        Ok(Character {
            id: CharacterId::new(self.id),
            name: self.name,
            stats,
            hp: self.hp,
            max_hp: self.max_hp,
            ac: self.ac,
            level: self.level,
            hit_die: self.hit_die,
            hit_dice_remaining: self.hit_dice_remaining,
            faction_id: self.faction_id,
            behavior: self.behavior,
            character_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
