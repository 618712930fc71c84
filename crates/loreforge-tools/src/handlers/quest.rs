//! Quest lifecycle tools.
//!
//! Prerequisites are enforced at assignment against the character's
//! completed list; the prerequisite graph is checked for cycles on
//! create; completion validates every objective, grants rewards in one
//! transaction, and echoes XP and gold informationally (they are not
//! persisted).

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use loreforge_rules::quest::{
    apply_objective_progress, complete_objective as finish_objective, missing_prerequisites,
    progress_label, validate_assignment, validate_completion, validate_prerequisites,
};
use loreforge_types::{
    CharacterId, EventType, Objective, ObjectiveId, Quest, QuestId, QuestRewards, QuestStatus,
    WorldId,
};

use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::registry::{ToolContext, ToolRegistry, typed_tool};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One objective of a new quest.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveInput {
    /// Explicit ID; generated when omitted.
    #[serde(default)]
    pub id: Option<String>,
    /// What must be done.
    #[validate(length(min = 1))]
    pub description: String,
    /// Objective kind label (kill, collect, explore, ...).
    #[serde(default, rename = "type")]
    pub objective_type: Option<String>,
    /// What the objective counts.
    #[serde(default)]
    pub target: Option<String>,
    /// How many are needed (default 1).
    #[serde(default)]
    #[validate(range(min = 1))]
    pub required: Option<i64>,
}

/// Reward block of a new quest.
#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RewardsInput {
    /// Experience points, echoed on completion.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub experience: Option<i64>,
    /// Gold, echoed on completion.
    #[serde(default)]
    #[validate(range(min = 0))]
    pub gold: Option<i64>,
    /// Item IDs granted to the completing character.
    #[serde(default)]
    pub items: Option<Vec<String>>,
}

/// Input for `create_quest`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestInput {
    /// Explicit ID; generated when omitted.
    #[serde(default)]
    pub quest_id: Option<String>,
    /// The world this quest belongs to.
    #[validate(length(min = 1))]
    pub world_id: String,
    /// Display name.
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Narrative description.
    #[serde(default)]
    pub description: Option<String>,
    /// The objectives.
    #[validate(length(min = 1), nested)]
    pub objectives: Vec<ObjectiveInput>,
    /// Rewards granted on completion.
    #[serde(default)]
    #[validate(nested)]
    pub rewards: Option<RewardsInput>,
    /// Quests that must be completed first.
    #[serde(default)]
    pub prerequisites: Option<Vec<String>>,
    /// The quest giver.
    #[serde(default)]
    pub giver: Option<String>,
}

/// Input naming a quest.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestRefInput {
    /// The quest.
    #[validate(length(min = 1))]
    pub quest_id: String,
}

/// Input for `list_quests`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListQuestsInput {
    /// Restrict to one world when present.
    #[serde(default)]
    pub world_id: Option<String>,
}

/// Input binding a quest to a character.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestCharacterInput {
    /// The quest.
    #[validate(length(min = 1))]
    pub quest_id: String,
    /// The character.
    #[validate(length(min = 1))]
    pub character_id: String,
}

/// Input for `update_objective`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateObjectiveInput {
    /// The quest.
    #[validate(length(min = 1))]
    pub quest_id: String,
    /// The objective inside it.
    #[validate(length(min = 1))]
    pub objective_id: String,
    /// Progress delta to add (default 1; may be negative).
    #[serde(default)]
    pub delta: Option<i64>,
}

/// Input for `complete_objective`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteObjectiveInput {
    /// The quest.
    #[validate(length(min = 1))]
    pub quest_id: String,
    /// The objective to finish outright.
    #[validate(length(min = 1))]
    pub objective_id: String,
}

/// Input for `get_quest_log`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestLogInput {
    /// The character whose log to hydrate.
    #[validate(length(min = 1))]
    pub character_id: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn quest_summary(quest: &Quest) -> serde_json::Value {
    let objectives: Vec<serde_json::Value> = quest
        .objectives
        .iter()
        .map(|objective| {
            serde_json::json!({
                "id": objective.id,
                "description": objective.description,
                "progress": progress_label(objective),
                "completed": objective.completed,
            })
        })
        .collect();
    serde_json::json!({
        "id": quest.id,
        "name": quest.name,
        "status": quest.status,
        "objectives": objectives,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_quest(ctx: ToolContext, input: CreateQuestInput) -> Result<ToolResponse, ToolError> {
    let world_id = WorldId::new(input.world_id);
    // The world must exist; quests cascade with it.
    ctx.state.worlds().get(&world_id).await?;

    let id = input.quest_id.map_or_else(QuestId::generate, QuestId::new);
    let prerequisites: Vec<QuestId> = input
        .prerequisites
        .unwrap_or_default()
        .into_iter()
        .map(QuestId::new)
        .collect();
    let graph = ctx.state.quests().prerequisite_graph().await?;
    validate_prerequisites(&id, &prerequisites, &graph)?;

    let objectives: Vec<Objective> = input
        .objectives
        .into_iter()
        .map(|objective| Objective {
            id: objective.id.map_or_else(ObjectiveId::generate, ObjectiveId::new),
            description: objective.description,
            objective_type: objective.objective_type.unwrap_or_else(|| String::from("custom")),
            target: objective.target.unwrap_or_default(),
            required: objective.required.unwrap_or(1),
            current: 0,
            completed: false,
        })
        .collect();

    let rewards = input.rewards.unwrap_or_default();
    let now = Utc::now();
    let quest = Quest {
        id: id.clone(),
        world_id,
        name: input.name,
        description: input.description.unwrap_or_default(),
        status: QuestStatus::Available,
        objectives,
        rewards: QuestRewards {
            experience: rewards.experience.unwrap_or(0),
            gold: rewards.gold.unwrap_or(0),
            items: rewards
                .items
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
        },
        prerequisites,
        giver: input.giver.map(CharacterId::new),
        created_at: now,
        updated_at: now,
    };
    ctx.state.quests().create(&quest).await?;
    ctx.state
        .audit(
            "create_quest",
            None,
            Some(id.as_str()),
            serde_json::json!({"name": quest.name, "objectives": quest.objectives.len()}),
        )
        .await?;
    ctx.state
        .publish(
            EventType::QuestCreated,
            serde_json::json!({"questId": id, "name": quest.name}),
        )
        .await?;

    ToolResponse::narrated(
        &format!("A new quest is posted: {}.", quest.name),
        &serde_json::json!({"quest": quest}),
    )
}

async fn get_quest(ctx: ToolContext, input: QuestRefInput) -> Result<ToolResponse, ToolError> {
    let quest = ctx.state.quests().get(&QuestId::new(input.quest_id)).await?;
    ToolResponse::narrated(
        &format!("Quest {}: {:?}.", quest.name, quest.status),
        &serde_json::json!({"quest": quest}),
    )
}

async fn list_quests(ctx: ToolContext, input: ListQuestsInput) -> Result<ToolResponse, ToolError> {
    let world = input.world_id.map(WorldId::new);
    let quests = ctx.state.quests().list(world.as_ref()).await?;
    let summaries: Vec<serde_json::Value> = quests.iter().map(quest_summary).collect();
    ToolResponse::narrated(
        &format!("{} quest(s) on the board.", quests.len()),
        &serde_json::json!({"quests": summaries}),
    )
}

async fn assign_quest(
    ctx: ToolContext,
    input: QuestCharacterInput,
) -> Result<ToolResponse, ToolError> {
    let quest_id = QuestId::new(input.quest_id);
    let character_id = CharacterId::new(input.character_id);

    // Both sides must exist.
    ctx.state.characters().get(&character_id).await?;
    let mut quest = ctx.state.quests().get(&quest_id).await?;
    let mut log = ctx.state.quests().log_for(&character_id).await?;

    validate_assignment(&quest, &log)?;
    debug_assert!(missing_prerequisites(&quest, &log).is_empty());

    log.active_quests.push(quest_id.clone());
    log.failed_quests.retain(|failed| failed != &quest_id);
    ctx.state.quests().save_log(&character_id, &log).await?;

    if quest.status == QuestStatus::Available {
        quest.status = QuestStatus::Active;
        ctx.state.quests().update(&quest).await?;
    }

    ctx.state
        .audit(
            "assign_quest",
            Some(character_id.as_str()),
            Some(quest_id.as_str()),
            serde_json::json!({}),
        )
        .await?;
    ctx.state
        .publish(
            EventType::QuestAssigned,
            serde_json::json!({"questId": quest_id, "characterId": character_id}),
        )
        .await?;

    ToolResponse::narrated(
        &format!("{character_id} takes on {}.", quest.name),
        &serde_json::json!({"quest": quest_summary(&quest), "log": log}),
    )
}

async fn update_objective_progress(
    ctx: &ToolContext,
    quest_id: QuestId,
    objective_id: &str,
    apply: impl FnOnce(&mut Objective) -> loreforge_rules::quest::ObjectiveProgress,
) -> Result<ToolResponse, ToolError> {
    let mut quest = ctx.state.quests().get(&quest_id).await?;
    let objective = quest
        .objectives
        .iter_mut()
        .find(|objective| objective.id.as_str() == objective_id)
        .ok_or_else(|| ToolError::not_found("objective", objective_id))?;

    let progress = apply(objective);
    let label = progress_label(objective);
    let description = objective.description.clone();
    ctx.state.quests().update(&quest).await?;

    ctx.state
        .publish(
            EventType::ObjectiveUpdated,
            serde_json::json!({
                "questId": quest_id,
                "objectiveId": objective_id,
                "progress": progress,
            }),
        )
        .await?;

    let text = if progress.completed_now {
        format!("Objective complete: {description} ({label}).")
    } else {
        format!("Objective progress: {description} ({label}).")
    };
    ToolResponse::narrated(
        &text,
        &serde_json::json!({"quest": quest_summary(&quest), "progress": progress}),
    )
}

async fn update_objective(
    ctx: ToolContext,
    input: UpdateObjectiveInput,
) -> Result<ToolResponse, ToolError> {
    let delta = input.delta.unwrap_or(1);
    update_objective_progress(
        &ctx,
        QuestId::new(input.quest_id),
        &input.objective_id,
        |objective| apply_objective_progress(objective, delta),
    )
    .await
}

async fn complete_objective(
    ctx: ToolContext,
    input: CompleteObjectiveInput,
) -> Result<ToolResponse, ToolError> {
    update_objective_progress(
        &ctx,
        QuestId::new(input.quest_id),
        &input.objective_id,
        finish_objective,
    )
    .await
}

async fn complete_quest(
    ctx: ToolContext,
    input: QuestCharacterInput,
) -> Result<ToolResponse, ToolError> {
    let quest_id = QuestId::new(input.quest_id);
    let character_id = CharacterId::new(input.character_id);

    let mut quest = ctx.state.quests().get(&quest_id).await?;
    if quest.status == QuestStatus::Completed {
        return Err(ToolError::Conflict {
            message: format!("quest {quest_id} is already completed"),
        });
    }
    validate_completion(&quest)?;

    let mut log = ctx.state.quests().log_for(&character_id).await?;
    if !log.active_quests.contains(&quest_id) {
        return Err(ToolError::Conflict {
            message: format!("quest {quest_id} is not active for {character_id}"),
        });
    }
    log.active_quests.retain(|active| active != &quest_id);
    log.completed_quests.push(quest_id.clone());

    quest.status = QuestStatus::Completed;
    let grant = ctx
        .state
        .quests()
        .complete_quest(&quest, &character_id, &log)
        .await?;

    ctx.state
        .audit(
            "complete_quest",
            Some(character_id.as_str()),
            Some(quest_id.as_str()),
            serde_json::to_value(&grant)?,
        )
        .await?;
    ctx.state
        .publish(
            EventType::QuestCompleted,
            serde_json::json!({"questId": quest_id, "characterId": character_id}),
        )
        .await?;

    // XP and gold are informational: echoed, not persisted.
    ToolResponse::narrated(
        &format!(
            "{character_id} completes {} -- {} XP and {} gold earned.",
            quest.name, quest.rewards.experience, quest.rewards.gold
        ),
        &serde_json::json!({
            "quest": quest_summary(&quest),
            "rewards": {
                "experience": quest.rewards.experience,
                "gold": quest.rewards.gold,
                "grantedItems": grant.granted_items,
                "missingItems": grant.missing_items,
            },
            "log": log,
        }),
    )
}

async fn get_quest_log(ctx: ToolContext, input: QuestLogInput) -> Result<ToolResponse, ToolError> {
    let character_id = CharacterId::new(input.character_id);
    ctx.state.characters().get(&character_id).await?;
    let log = ctx.state.quests().log_for(&character_id).await?;

    // Hydrate IDs into full quest objects lazily; dangling IDs are
    // reported as-is rather than failing the whole log.
    async fn hydrate(
        ctx: &ToolContext,
        ids: &[QuestId],
    ) -> Result<Vec<serde_json::Value>, ToolError> {
        let mut hydrated = Vec::with_capacity(ids.len());
        for id in ids {
            match ctx.state.quests().try_get(id).await? {
                Some(quest) => hydrated.push(quest_summary(&quest)),
                None => hydrated.push(serde_json::json!({"id": id, "missing": true})),
            }
        }
        Ok(hydrated)
    }

    let active = hydrate(&ctx, &log.active_quests).await?;
    let completed = hydrate(&ctx, &log.completed_quests).await?;
    let failed = hydrate(&ctx, &log.failed_quests).await?;

    ToolResponse::narrated(
        &format!(
            "{character_id}: {} active, {} completed, {} failed.",
            log.active_quests.len(),
            log.completed_quests.len(),
            log.failed_quests.len()
        ),
        &serde_json::json!({
            "active": active,
            "completed": completed,
            "failed": failed,
        }),
    )
}

/// Register the quest tools.
pub fn register(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register(typed_tool(
        "create_quest",
        "Create a quest with objectives, rewards, and prerequisite quests.",
        create_quest,
    ))?;
    registry.register(typed_tool("get_quest", "Fetch a quest by ID.", get_quest))?;
    registry.register(typed_tool(
        "list_quests",
        "List quests, optionally for one world.",
        list_quests,
    ))?;
    registry.register(typed_tool(
        "assign_quest",
        "Assign a quest to a character; every prerequisite must be completed.",
        assign_quest,
    ))?;
    registry.register(typed_tool(
        "update_objective",
        "Add progress to a quest objective (clamped to its requirement).",
        update_objective,
    ))?;
    registry.register(typed_tool(
        "complete_objective",
        "Mark a quest objective fully complete.",
        complete_objective,
    ))?;
    registry.register(typed_tool(
        "complete_quest",
        "Complete a quest: all objectives done, rewards granted once.",
        complete_quest,
    ))?;
    registry.register(typed_tool(
        "get_quest_log",
        "Hydrate a character's active/completed/failed quest lists.",
        get_quest_log,
    ))?;
    Ok(())
}
