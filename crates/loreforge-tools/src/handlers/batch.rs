//! The consolidated `batch_manage` tool.
//!
//! Bulk operations for session setup: create many characters at once,
//! stamp NPCs from the built-in template catalog, hand out items, and
//! run multi-step workflows back through the registry itself.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use loreforge_types::{CharacterId, CharacterType, EventType, ItemId, Stats};

use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::handlers::character::{CreateCharacterInput, create_character_record};
use crate::registry::{SessionContext, ToolContext, ToolRegistry};
use crate::router::{ActionSpec, consolidated_tool};

// ---------------------------------------------------------------------------
// Template catalog
// ---------------------------------------------------------------------------

/// A stamped NPC stat block.
#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcTemplate {
    /// Template key.
    pub name: &'static str,
    /// Hit points.
    pub hp: i64,
    /// Armor class.
    pub ac: i64,
    /// Level.
    pub level: i64,
    /// Ability scores as `[str, dex, con, int, wis, cha]`.
    pub stats: [i64; 6],
    /// Narrative role.
    pub character_type: CharacterType,
}

/// The built-in NPC templates.
pub const NPC_TEMPLATES: &[NpcTemplate] = &[
    NpcTemplate {
        name: "goblin",
        hp: 7,
        ac: 15,
        level: 1,
        stats: [8, 14, 10, 10, 8, 8],
        character_type: CharacterType::Enemy,
    },
    NpcTemplate {
        name: "bandit",
        hp: 11,
        ac: 12,
        level: 1,
        stats: [11, 12, 12, 10, 10, 10],
        character_type: CharacterType::Enemy,
    },
    NpcTemplate {
        name: "wolf",
        hp: 11,
        ac: 13,
        level: 1,
        stats: [12, 15, 12, 3, 12, 6],
        character_type: CharacterType::Enemy,
    },
    NpcTemplate {
        name: "cultist",
        hp: 9,
        ac: 12,
        level: 1,
        stats: [11, 12, 10, 10, 11, 10],
        character_type: CharacterType::Enemy,
    },
    NpcTemplate {
        name: "guard",
        hp: 11,
        ac: 16,
        level: 1,
        stats: [13, 12, 12, 10, 11, 10],
        character_type: CharacterType::Npc,
    },
    NpcTemplate {
        name: "merchant",
        hp: 4,
        ac: 10,
        level: 1,
        stats: [10, 10, 10, 12, 11, 13],
        character_type: CharacterType::Npc,
    },
    NpcTemplate {
        name: "commoner",
        hp: 4,
        ac: 10,
        level: 1,
        stats: [10, 10, 10, 10, 10, 10],
        character_type: CharacterType::Npc,
    },
];

fn template_by_name(name: &str) -> Option<&'static NpcTemplate> {
    NPC_TEMPLATES
        .iter()
        .find(|template| template.name.eq_ignore_ascii_case(name))
}

const fn template_stats(template: &NpcTemplate) -> Stats {
    let [str_score, dex, con, int, wis, cha] = template.stats;
    Stats {
        str: str_score,
        dex,
        con,
        int,
        wis,
        cha,
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// `create_characters`: bulk create from explicit stat blocks.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCharactersArgs {
    /// The characters to create.
    #[validate(length(min = 1, max = 50), nested)]
    pub characters: Vec<CreateCharacterInput>,
}

/// One templated NPC.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NpcSpawnInput {
    /// Template key (goblin, guard, bandit, merchant, wolf, cultist,
    /// commoner).
    #[validate(length(min = 1))]
    pub template: String,
    /// Explicit ID; generated when omitted.
    #[serde(default)]
    pub character_id: Option<String>,
    /// Display name; the template key when omitted.
    #[serde(default)]
    pub name: Option<String>,
    /// Faction membership.
    #[serde(default)]
    pub faction_id: Option<String>,
}

/// `create_npcs`: stamp NPCs from templates.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateNpcsArgs {
    /// The NPCs to stamp.
    #[validate(length(min = 1, max = 50), nested)]
    pub npcs: Vec<NpcSpawnInput>,
}

/// One grant of `distribute_items`.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemGrantInput {
    /// The receiving character.
    #[validate(length(min = 1))]
    pub character_id: String,
    /// The item to grant (must exist).
    #[validate(length(min = 1))]
    pub item_id: String,
    /// Units granted (default 1).
    #[serde(default)]
    #[validate(range(min = 1))]
    pub quantity: Option<i64>,
}

/// `distribute_items`: hand out items in one transaction per grant.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DistributeItemsArgs {
    /// The grants to apply.
    #[validate(length(min = 1, max = 100), nested)]
    pub grants: Vec<ItemGrantInput>,
}

/// One step of a workflow.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStepInput {
    /// The tool to invoke.
    #[validate(length(min = 1))]
    pub tool: String,
    /// Its arguments.
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

/// `execute_workflow`: run steps through the registry, stopping at the
/// first failure.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteWorkflowArgs {
    /// The steps, in order.
    #[validate(length(min = 1, max = 20), nested)]
    pub steps: Vec<WorkflowStepInput>,
}

/// `get_template`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetTemplateArgs {
    /// The template key.
    #[validate(length(min = 1))]
    pub template: String,
}

/// An empty argument set.
#[derive(Debug, Clone, Default, Deserialize, Validate, JsonSchema)]
pub struct NoArgs {}

/// The consolidated `batch_manage` union, tagged by `action`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BatchAction {
    /// Bulk-create characters.
    CreateCharacters(CreateCharactersArgs),
    /// Stamp NPCs from templates.
    CreateNpcs(CreateNpcsArgs),
    /// Hand out items.
    DistributeItems(DistributeItemsArgs),
    /// Run a tool workflow.
    ExecuteWorkflow(ExecuteWorkflowArgs),
    /// List the template catalog.
    ListTemplates(NoArgs),
    /// Fetch one template.
    GetTemplate(GetTemplateArgs),
}

impl Validate for BatchAction {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Self::CreateCharacters(args) => args.validate(),
            Self::CreateNpcs(args) => args.validate(),
            Self::DistributeItems(args) => args.validate(),
            Self::ExecuteWorkflow(args) => args.validate(),
            Self::ListTemplates(args) => args.validate(),
            Self::GetTemplate(args) => args.validate(),
        }
    }
}

/// Actions of `batch_manage`.
const BATCH_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "create_characters",
        aliases: &["bulk_create"],
        description: "Bulk-create characters",
    },
    ActionSpec {
        name: "create_npcs",
        aliases: &["spawn_npcs"],
        description: "Stamp NPCs from templates",
    },
    ActionSpec {
        name: "distribute_items",
        aliases: &["give_items", "hand_out"],
        description: "Hand out items",
    },
    ActionSpec {
        name: "execute_workflow",
        aliases: &["workflow", "run_steps"],
        description: "Run a tool workflow",
    },
    ActionSpec {
        name: "list_templates",
        aliases: &["templates"],
        description: "List the template catalog",
    },
    ActionSpec {
        name: "get_template",
        aliases: &[],
        description: "Fetch one template",
    },
];

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_characters(
    ctx: &ToolContext,
    args: CreateCharactersArgs,
) -> Result<ToolResponse, ToolError> {
    let mut created = Vec::with_capacity(args.characters.len());
    for input in args.characters {
        let character = create_character_record(ctx, input).await?;
        created.push(serde_json::json!({"id": character.id, "name": character.name}));
    }
    ToolResponse::narrated(
        &format!("{} character(s) join the world.", created.len()),
        &serde_json::json!({"created": created}),
    )
}

async fn create_npcs(ctx: &ToolContext, args: CreateNpcsArgs) -> Result<ToolResponse, ToolError> {
    let mut created = Vec::with_capacity(args.npcs.len());
    for spawn in args.npcs {
        let template = template_by_name(&spawn.template)
            .ok_or_else(|| ToolError::not_found("npc template", spawn.template.clone()))?;
        let input = CreateCharacterInput {
            character_id: spawn.character_id,
            name: spawn.name.unwrap_or_else(|| template.name.to_owned()),
            stats: Some(template_stats(template)),
            max_hp: Some(template.hp),
            hp: Some(template.hp),
            ac: Some(template.ac),
            level: Some(template.level),
            hit_die: Some(8),
            faction_id: spawn.faction_id,
            behavior: None,
            character_type: Some(template.character_type),
        };
        let character = create_character_record(ctx, input).await?;
        created.push(serde_json::json!({
            "id": character.id,
            "name": character.name,
            "template": template.name,
        }));
    }
    ToolResponse::narrated(
        &format!("{} NPC(s) stamped from templates.", created.len()),
        &serde_json::json!({"created": created}),
    )
}

async fn distribute_items(
    ctx: &ToolContext,
    args: DistributeItemsArgs,
) -> Result<ToolResponse, ToolError> {
    let mut distributed = Vec::with_capacity(args.grants.len());
    for grant in args.grants {
        let character = CharacterId::new(grant.character_id);
        let item = ItemId::new(grant.item_id);
        // The item must exist; the character must exist for the foreign
        // key to hold.
        ctx.state.items().get_item(&item).await?;
        ctx.state.characters().get(&character).await?;
        let quantity = grant.quantity.unwrap_or(1);
        ctx.state.items().grant(&character, &item, quantity).await?;
        distributed.push(serde_json::json!({
            "characterId": character,
            "itemId": item,
            "quantity": quantity,
        }));
    }
    ctx.state
        .audit(
            "distribute_items",
            None,
            None,
            serde_json::json!({"grants": distributed.len()}),
        )
        .await?;
    ctx.state
        .publish(
            EventType::ItemTransferred,
            serde_json::json!({"distributed": distributed.len()}),
        )
        .await?;
    ToolResponse::narrated(
        &format!("{} grant(s) handed out.", distributed.len()),
        &serde_json::json!({"distributed": distributed}),
    )
}

async fn execute_workflow(
    ctx: &ToolContext,
    args: ExecuteWorkflowArgs,
) -> Result<ToolResponse, ToolError> {
    let registry = ctx.state.registry().ok_or_else(|| ToolError::Internal {
        message: String::from("the registry is not attached; workflows are unavailable"),
    })?;

    let mut results = Vec::with_capacity(args.steps.len());
    for (index, step) in args.steps.into_iter().enumerate() {
        // A workflow never nests: that way lies unbounded recursion.
        if step.tool == "batch_manage" {
            return Err(ToolError::validation(
                "workflows may not invoke batch_manage",
            ));
        }
        let arguments = step
            .arguments
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        let outcome = registry
            .try_invoke(
                &step.tool,
                arguments,
                SessionContext::new(ctx.session.session_id.clone()),
                ctx.state.clone(),
            )
            .await;
        match outcome {
            Ok(response) => {
                results.push(serde_json::json!({
                    "step": index,
                    "tool": step.tool,
                    "ok": true,
                    "state": response.extract_state(),
                }));
            }
            Err(error) => {
                results.push(serde_json::json!({
                    "step": index,
                    "tool": step.tool,
                    "ok": false,
                    "kind": error.kind(),
                    "message": error.to_string(),
                }));
                // Stop at the first failure; later steps never run.
                return ToolResponse::narrated(
                    &format!("The workflow stopped at step {index} ({}).", step.tool),
                    &serde_json::json!({"completed": false, "steps": results}),
                );
            }
        }
    }

    ToolResponse::narrated(
        &format!("All {} workflow step(s) completed.", results.len()),
        &serde_json::json!({"completed": true, "steps": results}),
    )
}

fn list_templates() -> Result<ToolResponse, ToolError> {
    ToolResponse::narrated(
        &format!("{} NPC template(s) available.", NPC_TEMPLATES.len()),
        &serde_json::json!({"templates": NPC_TEMPLATES}),
    )
}

fn get_template(args: &GetTemplateArgs) -> Result<ToolResponse, ToolError> {
    let template = template_by_name(&args.template)
        .ok_or_else(|| ToolError::not_found("npc template", args.template.clone()))?;
    ToolResponse::narrated(
        &format!("Template {}: {} HP, AC {}.", template.name, template.hp, template.ac),
        &serde_json::json!({"template": template}),
    )
}

async fn batch_manage(ctx: ToolContext, input: BatchAction) -> Result<ToolResponse, ToolError> {
    match input {
        BatchAction::CreateCharacters(args) => create_characters(&ctx, args).await,
        BatchAction::CreateNpcs(args) => create_npcs(&ctx, args).await,
        BatchAction::DistributeItems(args) => distribute_items(&ctx, args).await,
        BatchAction::ExecuteWorkflow(args) => execute_workflow(&ctx, args).await,
        BatchAction::ListTemplates(_) => list_templates(),
        BatchAction::GetTemplate(args) => get_template(&args),
    }
}

/// Register the consolidated batch tool.
pub fn register(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register(consolidated_tool(
        "batch_manage",
        "Bulk setup: characters, templated NPCs, item distribution, and workflows.",
        BATCH_ACTIONS,
        batch_manage,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_is_reachable_case_insensitively() {
        for template in NPC_TEMPLATES {
            assert!(template_by_name(template.name).is_some());
            assert!(template_by_name(&template.name.to_uppercase()).is_some());
        }
        assert!(template_by_name("tarrasque").is_none());
    }

    #[test]
    fn template_stats_map_in_order() {
        let goblin = template_by_name("goblin").map(template_stats);
        assert_eq!(
            goblin,
            Some(Stats {
                str: 8,
                dex: 14,
                con: 10,
                int: 10,
                wis: 8,
                cha: 8,
            })
        );
    }
}
