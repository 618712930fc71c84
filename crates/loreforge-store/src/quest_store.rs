//! Operations on the `quests` and `quest_logs` tables.
//!
//! Objectives, rewards, and prerequisite lists are JSON columns parsed
//! back through the entity schema on every read. Completion is the one
//! transaction here: the quest row, the character's log, and the reward
//! items commit together.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use loreforge_types::{
    CharacterId, Objective, Quest, QuestId, QuestLog, QuestRewards, QuestStatus, WorldId,
};

use crate::error::StoreError;
use crate::sqlite::{enum_from_db, enum_to_db, json_from_db, json_to_db};

/// Items granted (and found missing) while completing a quest.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardGrant {
    /// Item IDs added to the character's inventory.
    pub granted_items: Vec<String>,
    /// Reward item IDs that do not exist in the store; noted, not fatal.
    pub missing_items: Vec<String>,
}

/// Operations on quests and quest logs.
pub struct QuestStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QuestStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new quest.
    pub async fn create(&self, quest: &Quest) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO quests
              (id, world_id, name, description, status, objectives, rewards,
               prerequisites, giver, created_at, updated_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(quest.id.as_str())
        .bind(quest.world_id.as_str())
        .bind(&quest.name)
        .bind(&quest.description)
        .bind(enum_to_db(&quest.status)?)
        .bind(json_to_db(&quest.objectives)?)
        .bind(json_to_db(&quest.rewards)?)
        .bind(json_to_db(&quest.prerequisites)?)
        .bind(quest.giver.as_ref().map(CharacterId::as_str))
        .bind(quest.created_at)
        .bind(quest.updated_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a quest if it exists.
    pub async fn try_get(&self, id: &QuestId) -> Result<Option<Quest>, StoreError> {
        let row = sqlx::query_as::<_, QuestRow>("SELECT * FROM quests WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(self.pool)
            .await?;
        row.map(QuestRow::into_entity).transpose()
    }

    /// Fetch a quest or fail with `NotFound`.
    pub async fn get(&self, id: &QuestId) -> Result<Quest, StoreError> {
        self.try_get(id)
            .await?
            .ok_or_else(|| StoreError::not_found("quest", id.as_str()))
    }

    /// Overwrite an existing quest.
    pub async fn update(&self, quest: &Quest) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE quests SET
                world_id = ?2, name = ?3, description = ?4, status = ?5,
                objectives = ?6, rewards = ?7, prerequisites = ?8, giver = ?9,
                updated_at = ?10
              WHERE id = ?1",
        )
        .bind(quest.id.as_str())
        .bind(quest.world_id.as_str())
        .bind(&quest.name)
        .bind(&quest.description)
        .bind(enum_to_db(&quest.status)?)
        .bind(json_to_db(&quest.objectives)?)
        .bind(json_to_db(&quest.rewards)?)
        .bind(json_to_db(&quest.prerequisites)?)
        .bind(quest.giver.as_ref().map(CharacterId::as_str))
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("quest", quest.id.as_str()));
        }
        Ok(())
    }

    /// List quests, optionally filtered by world.
    pub async fn list(&self, world: Option<&WorldId>) -> Result<Vec<Quest>, StoreError> {
        let rows = match world {
            Some(world_id) => {
                sqlx::query_as::<_, QuestRow>(
                    "SELECT * FROM quests WHERE world_id = ?1 ORDER BY name, id",
                )
                .bind(world_id.as_str())
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, QuestRow>("SELECT * FROM quests ORDER BY name, id")
                    .fetch_all(self.pool)
                    .await?
            }
        };
        rows.into_iter().map(QuestRow::into_entity).collect()
    }

    /// The full prerequisite graph, for cycle detection.
    pub async fn prerequisite_graph(
        &self,
    ) -> Result<BTreeMap<QuestId, Vec<QuestId>>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, prerequisites FROM quests")
                .fetch_all(self.pool)
                .await?;
        let mut graph = BTreeMap::new();
        for (id, raw) in rows {
            let prerequisites: Vec<QuestId> = json_from_db("quest", &id, &raw)?;
            graph.insert(QuestId::new(id), prerequisites);
        }
        Ok(graph)
    }

    // -----------------------------------------------------------------------
    // Quest logs
    // -----------------------------------------------------------------------

    /// A character's quest log; empty if they have never touched a quest.
    pub async fn log_for(&self, character: &CharacterId) -> Result<QuestLog, StoreError> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            r"SELECT active_quests, completed_quests, failed_quests
              FROM quest_logs WHERE character_id = ?1",
        )
        .bind(character.as_str())
        .fetch_optional(self.pool)
        .await?;
        match row {
            None => Ok(QuestLog::default()),
            Some((active, completed, failed)) => Ok(QuestLog {
                active_quests: json_from_db("quest_log", character.as_str(), &active)?,
                completed_quests: json_from_db("quest_log", character.as_str(), &completed)?,
                failed_quests: json_from_db("quest_log", character.as_str(), &failed)?,
            }),
        }
    }

    /// Upsert a character's quest log.
    pub async fn save_log(
        &self,
        character: &CharacterId,
        log: &QuestLog,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO quest_logs (character_id, active_quests, completed_quests, failed_quests)
              VALUES (?1, ?2, ?3, ?4)
              ON CONFLICT (character_id) DO UPDATE SET
                active_quests = excluded.active_quests,
                completed_quests = excluded.completed_quests,
                failed_quests = excluded.failed_quests",
        )
        .bind(character.as_str())
        .bind(json_to_db(&log.active_quests)?)
        .bind(json_to_db(&log.completed_quests)?)
        .bind(json_to_db(&log.failed_quests)?)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Complete a quest for a character in one transaction: quest row,
    /// log transition, and reward items together.
    ///
    /// The caller has already validated that every objective is complete.
    /// Reward items missing from the `items` table are noted in the
    /// grant and do not block completion.
    pub async fn complete_quest(
        &self,
        quest: &Quest,
        character: &CharacterId,
        log: &QuestLog,
    ) -> Result<RewardGrant, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE quests SET status = ?2, objectives = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(quest.id.as_str())
            .bind(enum_to_db(&QuestStatus::Completed)?)
            .bind(json_to_db(&quest.objectives)?)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"INSERT INTO quest_logs (character_id, active_quests, completed_quests, failed_quests)
              VALUES (?1, ?2, ?3, ?4)
              ON CONFLICT (character_id) DO UPDATE SET
                active_quests = excluded.active_quests,
                completed_quests = excluded.completed_quests,
                failed_quests = excluded.failed_quests",
        )
        .bind(character.as_str())
        .bind(json_to_db(&log.active_quests)?)
        .bind(json_to_db(&log.completed_quests)?)
        .bind(json_to_db(&log.failed_quests)?)
        .execute(&mut *tx)
        .await?;

        let mut grant = RewardGrant::default();
        for item in &quest.rewards.items {
            let exists: Option<(String,)> =
                sqlx::query_as("SELECT id FROM items WHERE id = ?1")
                    .bind(item.as_str())
                    .fetch_optional(&mut *tx)
                    .await?;
            if exists.is_none() {
                grant.missing_items.push(item.as_str().to_owned());
                continue;
            }
            sqlx::query(
                r"INSERT INTO inventory_items (character_id, item_id, quantity, equipped, slot)
                  VALUES (?1, ?2, 1, 0, NULL)
                  ON CONFLICT (character_id, item_id)
                  DO UPDATE SET quantity = quantity + 1",
            )
            .bind(character.as_str())
            .bind(item.as_str())
            .execute(&mut *tx)
            .await?;
            grant.granted_items.push(item.as_str().to_owned());
        }

        tx.commit().await?;
        tracing::debug!(quest = %quest.id, %character, "quest completed with rewards");
        Ok(grant)
    }
}

/// A row from the `quests` table.
#[derive(Debug, sqlx::FromRow)]
struct QuestRow {
    id: String,
    world_id: String,
    name: String,
    description: String,
    status: String,
    objectives: String,
    rewards: String,
    prerequisites: String,
    giver: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QuestRow {
    fn into_entity(self) -> Result<Quest, StoreError> {
        let status: QuestStatus = enum_from_db("quest", &self.id, &self.status)?;
        let objectives: Vec<Objective> = json_from_db("quest", &self.id, &self.objectives)?;
        let rewards: QuestRewards = json_from_db("quest", &self.id, &self.rewards)?;
        let prerequisites: Vec<QuestId> = json_from_db("quest", &self.id, &self.prerequisites)?;
        Ok(Quest {
            id: QuestId::new(self.id),
            world_id: WorldId::new(self.world_id),
            name: self.name,
            description: self.description,
            status,
            objectives,
            rewards,
            prerequisites,
            giver: self.giver.map(CharacterId::new),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
