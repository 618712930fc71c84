//! Operations on the `encounters` and `battlefield` tables.
//!
//! Tokens are persisted as a JSON column on the encounter row; terrain
//! obstacles live in the `battlefield` table and cascade with the
//! encounter. Ending an encounter is the canonical write-back
//! transaction: the encounter row and every matching character's HP
//! commit together or not at all.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use loreforge_rules::combat::FinalHp;
use loreforge_types::{
    CharacterId, Encounter, EncounterId, EncounterStatus, Terrain, Token,
};

use crate::error::StoreError;
use crate::sqlite::{enum_from_db, enum_to_db, json_from_db, json_to_db};

/// Operations on encounters.
pub struct EncounterStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EncounterStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite an encounter snapshot, terrain included.
    pub async fn save(&self, encounter: &Encounter) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r"INSERT INTO encounters
              (id, status, round, turn_index, active_token_id, seed, tokens, created_at, updated_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
              ON CONFLICT (id) DO UPDATE SET
                status = excluded.status,
                round = excluded.round,
                turn_index = excluded.turn_index,
                active_token_id = excluded.active_token_id,
                tokens = excluded.tokens,
                updated_at = excluded.updated_at",
        )
        .bind(encounter.id.as_str())
        .bind(enum_to_db(&encounter.status)?)
        .bind(encounter.round)
        .bind(i64::try_from(encounter.turn_index).unwrap_or(0))
        .bind(encounter.active_token_id().map(CharacterId::as_str))
        .bind(&encounter.seed)
        .bind(json_to_db(&encounter.tokens)?)
        .bind(encounter.created_at)
        .bind(encounter.updated_at)
        .execute(&mut *tx)
        .await?;

        if let Some(terrain) = &encounter.terrain {
            sqlx::query(
                r"INSERT INTO battlefield (encounter_id, obstacles) VALUES (?1, ?2)
                  ON CONFLICT (encounter_id) DO UPDATE SET obstacles = excluded.obstacles",
            )
            .bind(encounter.id.as_str())
            .bind(json_to_db(&terrain.obstacles)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Fetch an encounter if it exists, terrain included.
    pub async fn try_get(&self, id: &EncounterId) -> Result<Option<Encounter>, StoreError> {
        let row = sqlx::query_as::<_, EncounterRow>(
            "SELECT id, status, round, turn_index, seed, tokens, created_at, updated_at
             FROM encounters WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let obstacles: Option<(String,)> = sqlx::query_as(
            "SELECT obstacles FROM battlefield WHERE encounter_id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool)
        .await?;
        let terrain = obstacles
            .map(|(raw,)| -> Result<Terrain, StoreError> {
                Ok(Terrain {
                    obstacles: json_from_db("battlefield", id.as_str(), &raw)?,
                })
            })
            .transpose()?;

        Ok(Some(row.into_entity(terrain)?))
    }

    /// Fetch an encounter or fail with `NotFound`.
    pub async fn get(&self, id: &EncounterId) -> Result<Encounter, StoreError> {
        self.try_get(id)
            .await?
            .ok_or_else(|| StoreError::not_found("encounter", id.as_str()))
    }

    /// Delete an encounter; the battlefield row cascades.
    pub async fn delete(&self, id: &EncounterId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM encounters WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist a completed encounter and write each token's final HP back
    /// into the matching character row, in one transaction.
    ///
    /// Ad-hoc participants (no character row) are silently skipped.
    /// Returns the IDs that were written back.
    pub async fn end_with_write_back(
        &self,
        encounter: &Encounter,
        final_hp: &[FinalHp],
    ) -> Result<Vec<CharacterId>, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"UPDATE encounters SET
                status = ?2, round = ?3, turn_index = ?4, active_token_id = ?5,
                tokens = ?6, updated_at = ?7
              WHERE id = ?1",
        )
        .bind(encounter.id.as_str())
        .bind(enum_to_db(&encounter.status)?)
        .bind(encounter.round)
        .bind(i64::try_from(encounter.turn_index).unwrap_or(0))
        .bind(encounter.active_token_id().map(CharacterId::as_str))
        .bind(json_to_db(&encounter.tokens)?)
        .bind(encounter.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut written_back = Vec::new();
        let now = Utc::now();
        for token in final_hp {
            let result = sqlx::query(
                "UPDATE characters SET hp = ?2, updated_at = ?3 WHERE id = ?1",
            )
            .bind(token.id.as_str())
            .bind(token.hp.max(0))
            .bind(now)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                written_back.push(token.id.clone());
            }
        }

        tx.commit().await?;
        tracing::debug!(
            encounter = %encounter.id,
            written_back = written_back.len(),
            "encounter ended with hp write-back"
        );
        Ok(written_back)
    }
}

/// A row from the `encounters` table (terrain joined separately).
#[derive(Debug, sqlx::FromRow)]
struct EncounterRow {
    id: String,
    status: String,
    round: i64,
    turn_index: i64,
    seed: String,
    tokens: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EncounterRow {
    fn into_entity(self, terrain: Option<Terrain>) -> Result<Encounter, StoreError> {
        let status: EncounterStatus = enum_from_db("encounter", &self.id, &self.status)?;
        let tokens: Vec<Token> = json_from_db("encounter", &self.id, &self.tokens)?;
        Ok(Encounter {
            id: EncounterId::new(self.id),
            status,
            round: self.round,
            turn_index: usize::try_from(self.turn_index).unwrap_or(0),
            tokens,
            seed: self.seed,
            terrain,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
