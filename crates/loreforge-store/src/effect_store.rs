//! Operations on the `custom_effects` and `synthesized_spells` tables.
//!
//! Effects are queried by target with optional category and active-only
//! filters; duration updates write back whole rows after the rules layer
//! has ticked them. The spellbook is append-only per character.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use loreforge_types::{
    CharacterId, CustomEffect, DurationType, EffectCategory, EffectDuration, EffectId,
    EffectTrigger, SpellId, SynthesizedSpell,
};

use crate::error::StoreError;
use crate::sqlite::{enum_from_db, enum_to_db, json_from_db, json_to_db};

/// Operations on custom effects and the synthesized spellbook.
pub struct EffectStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EffectStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    /// Insert a new effect.
    pub async fn apply(&self, effect: &CustomEffect) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO custom_effects
              (id, target_id, target_type, name, category, power_level, mechanics,
               duration_type, duration_value, triggers, is_active, created_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(effect.id.as_str())
        .bind(effect.target_id.as_str())
        .bind(&effect.target_type)
        .bind(&effect.name)
        .bind(enum_to_db(&effect.category)?)
        .bind(effect.power_level)
        .bind(json_to_db(&effect.mechanics)?)
        .bind(enum_to_db(&effect.duration.duration_type)?)
        .bind(effect.duration.value)
        .bind(json_to_db(&effect.triggers)?)
        .bind(effect.is_active)
        .bind(effect.created_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch one effect if it exists.
    pub async fn try_get(&self, id: &EffectId) -> Result<Option<CustomEffect>, StoreError> {
        let row = sqlx::query_as::<_, EffectRow>(
            "SELECT * FROM custom_effects WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool)
        .await?;
        row.map(EffectRow::into_entity).transpose()
    }

    /// Effects on a target, optionally active-only and category-filtered,
    /// in application order.
    pub async fn list_for(
        &self,
        target: &CharacterId,
        active_only: bool,
        category: Option<EffectCategory>,
    ) -> Result<Vec<CustomEffect>, StoreError> {
        let rows = sqlx::query_as::<_, EffectRow>(
            "SELECT * FROM custom_effects WHERE target_id = ?1 ORDER BY created_at, id",
        )
        .bind(target.as_str())
        .fetch_all(self.pool)
        .await?;
        let mut effects = Vec::new();
        for row in rows {
            let effect = row.into_entity()?;
            if active_only && !effect.is_active {
                continue;
            }
            if let Some(wanted) = category
                && effect.category != wanted
            {
                continue;
            }
            effects.push(effect);
        }
        Ok(effects)
    }

    /// Write back a batch of effects after a duration tick.
    pub async fn save_all(&self, effects: &[CustomEffect]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for effect in effects {
            sqlx::query(
                r"UPDATE custom_effects SET
                    duration_type = ?2, duration_value = ?3, is_active = ?4
                  WHERE id = ?1",
            )
            .bind(effect.id.as_str())
            .bind(enum_to_db(&effect.duration.duration_type)?)
            .bind(effect.duration.value)
            .bind(effect.is_active)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Remove an effect by ID. Returns whether a row was deleted.
    pub async fn remove_by_id(&self, id: &EffectId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM custom_effects WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove effects by `(target, name)`. Returns how many were deleted.
    pub async fn remove_by_name(
        &self,
        target: &CharacterId,
        name: &str,
    ) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM custom_effects WHERE target_id = ?1 AND name = ?2")
                .bind(target.as_str())
                .bind(name)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Delete every inactive effect. Returns how many were purged.
    pub async fn purge_inactive(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM custom_effects WHERE is_active = 0")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // -----------------------------------------------------------------------
    // Spellbook
    // -----------------------------------------------------------------------

    /// Append a mastered spell to a character's spellbook.
    pub async fn add_spell(&self, spell: &SynthesizedSpell) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO synthesized_spells
              (id, character_id, name, level, school, effect_type, effect_dice, created_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(spell.id.as_str())
        .bind(spell.character_id.as_str())
        .bind(&spell.name)
        .bind(spell.level)
        .bind(&spell.school)
        .bind(&spell.effect_type)
        .bind(spell.effect_dice.as_deref())
        .bind(spell.created_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// A character's synthesized spellbook, oldest first.
    pub async fn spellbook_for(
        &self,
        character: &CharacterId,
    ) -> Result<Vec<SynthesizedSpell>, StoreError> {
        let rows = sqlx::query_as::<_, SpellRow>(
            "SELECT * FROM synthesized_spells WHERE character_id = ?1 ORDER BY created_at, id",
        )
        .bind(character.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(SpellRow::into_entity).collect())
    }
}

/// A row from the `custom_effects` table.
#[derive(Debug, sqlx::FromRow)]
struct EffectRow {
    id: String,
    target_id: String,
    target_type: String,
    name: String,
    category: String,
    power_level: i64,
    mechanics: String,
    duration_type: String,
    duration_value: Option<i64>,
    triggers: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl EffectRow {
    fn into_entity(self) -> Result<CustomEffect, StoreError> {
        let category: EffectCategory = enum_from_db("effect", &self.id, &self.category)?;
        let duration_type: DurationType =
            enum_from_db("effect", &self.id, &self.duration_type)?;
        let mechanics: Vec<String> = json_from_db("effect", &self.id, &self.mechanics)?;
        let triggers: Vec<EffectTrigger> = json_from_db("effect", &self.id, &self.triggers)?;
        Ok(CustomEffect {
            id: EffectId::new(self.id),
            target_id: CharacterId::new(self.target_id),
            target_type: self.target_type,
            name: self.name,
            category,
            power_level: self.power_level,
            mechanics,
            duration: EffectDuration {
                duration_type,
                value: self.duration_value,
            },
            triggers,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

/// A row from the `synthesized_spells` table.
#[derive(Debug, sqlx::FromRow)]
struct SpellRow {
    id: String,
    character_id: String,
    name: String,
    level: i64,
    school: String,
    effect_type: String,
    effect_dice: Option<String>,
    created_at: DateTime<Utc>,
}

impl SpellRow {
    fn into_entity(self) -> SynthesizedSpell {
        SynthesizedSpell {
            id: SpellId::new(self.id),
            character_id: CharacterId::new(self.character_id),
            name: self.name,
            level: self.level,
            school: self.school,
            effect_type: self.effect_type,
            effect_dice: self.effect_dice,
            created_at: self.created_at,
        }
    }
}
