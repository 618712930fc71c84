//! World lifecycle and map tools.
//!
//! Generation consumes the opaque [`WorldGenerator`] seam; everything
//! derived (regions, tiles, structures, rivers) persists in one
//! transaction. Map patches are the only sanctioned terrain mutation:
//! previewed without commit, applied transactionally, always invalidating
//! the tile cache.
//!
//! [`WorldGenerator`]: loreforge_rules::worldgen::WorldGenerator

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use loreforge_types::{EventType, PatchOperation, World, WorldId};

use crate::envelope::ToolResponse;
use crate::error::ToolError;
use crate::registry::{ToolContext, ToolRegistry, typed_tool};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Input for `generate_world`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateWorldInput {
    /// Explicit ID; generated when omitted.
    #[serde(default)]
    pub world_id: Option<String>,
    /// Display name.
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Grid width in tiles.
    #[validate(range(min = 10, max = 1000))]
    pub width: i64,
    /// Grid height in tiles.
    #[validate(range(min = 10, max = 1000))]
    pub height: i64,
    /// Generation seed; derived from the clock when omitted.
    #[serde(default)]
    pub seed: Option<i64>,
}

/// Input naming a world.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorldRefInput {
    /// The world.
    #[validate(length(min = 1))]
    pub world_id: String,
}

/// One tile rewrite of a patch.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatchOperationInput {
    /// Column of the tile.
    #[validate(range(min = 0))]
    pub x: i64,
    /// Row of the tile.
    #[validate(range(min = 0))]
    pub y: i64,
    /// New terrain label.
    #[validate(length(min = 1, max = 60))]
    pub terrain: String,
    /// Optional annotation.
    #[serde(default)]
    pub note: Option<String>,
}

/// Input for `apply_map_patch` and `preview_map_patch`.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MapPatchInput {
    /// The world to patch.
    #[validate(length(min = 1))]
    pub world_id: String,
    /// The tile rewrites, in order.
    #[validate(length(min = 1, max = 500), nested)]
    pub operations: Vec<PatchOperationInput>,
    /// Patch-level description.
    #[serde(default)]
    pub note: Option<String>,
}

/// Input for `get_region_map`: a rectangular window.
#[derive(Debug, Clone, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegionMapInput {
    /// The world.
    #[validate(length(min = 1))]
    pub world_id: String,
    /// West edge of the window.
    #[validate(range(min = 0))]
    pub x: i64,
    /// North edge of the window.
    #[validate(range(min = 0))]
    pub y: i64,
    /// Window width.
    #[validate(range(min = 1, max = 200))]
    pub width: i64,
    /// Window height.
    #[validate(range(min = 1, max = 200))]
    pub height: i64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_operations(input: Vec<PatchOperationInput>) -> Vec<PatchOperation> {
    input
        .into_iter()
        .map(|op| PatchOperation {
            x: op.x,
            y: op.y,
            terrain: op.terrain,
            note: op.note,
        })
        .collect()
}

/// Operations outside the world's grid, reported back verbatim.
fn out_of_bounds(world: &World, operations: &[PatchOperation]) -> Vec<serde_json::Value> {
    operations
        .iter()
        .filter(|op| op.x >= world.width || op.y >= world.height)
        .map(|op| serde_json::json!({"x": op.x, "y": op.y}))
        .collect()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn generate_world(
    ctx: ToolContext,
    input: GenerateWorldInput,
) -> Result<ToolResponse, ToolError> {
    let now = Utc::now();
    let world = World {
        id: input.world_id.map_or_else(WorldId::generate, WorldId::new),
        name: input.name,
        seed: input.seed.unwrap_or_else(|| now.timestamp_millis()),
        width: input.width,
        height: input.height,
        created_at: now,
        updated_at: now,
    };
    let generated = ctx.state.generator().generate(&world);
    ctx.state.worlds().create(&world, &generated).await?;

    ctx.state
        .audit(
            "generate_world",
            None,
            Some(world.id.as_str()),
            serde_json::json!({
                "name": world.name,
                "seed": world.seed,
                "tiles": generated.tiles.len(),
            }),
        )
        .await?;
    ctx.state
        .publish(
            EventType::WorldGenerated,
            serde_json::json!({"worldId": world.id, "name": world.name}),
        )
        .await?;

    ToolResponse::narrated(
        &format!(
            "{} takes shape: {}x{} tiles across {} regions.",
            world.name,
            world.width,
            world.height,
            generated.regions.len()
        ),
        &serde_json::json!({
            "world": world,
            "regions": generated.regions,
            "structures": generated.structures,
        }),
    )
}

async fn get_world_state(ctx: ToolContext, input: WorldRefInput) -> Result<ToolResponse, ToolError> {
    let id = WorldId::new(input.world_id);
    let world = ctx.state.worlds().get(&id).await?;
    let regions = ctx.state.worlds().regions_for(&id).await?;
    let structures = ctx.state.worlds().structures_for(&id).await?;
    let rivers = ctx.state.worlds().rivers_for(&id).await?;
    let patches = ctx.state.worlds().patches_for(&id).await?;

    ToolResponse::narrated(
        &format!(
            "{}: {} regions, {} structures, {} rivers, {} patches applied.",
            world.name,
            regions.len(),
            structures.len(),
            rivers.len(),
            patches.len()
        ),
        &serde_json::json!({
            "world": world,
            "regions": regions,
            "structures": structures,
            "rivers": rivers,
            "patchCount": patches.len(),
        }),
    )
}

async fn get_world_map_overview(
    ctx: ToolContext,
    input: WorldRefInput,
) -> Result<ToolResponse, ToolError> {
    let id = WorldId::new(input.world_id);
    let world = ctx.state.worlds().get(&id).await?;
    let histogram = ctx.state.worlds().terrain_histogram(&id).await?;
    let terrain: Vec<serde_json::Value> = histogram
        .iter()
        .map(|(label, count)| serde_json::json!({"terrain": label, "tiles": count}))
        .collect();

    let dominant = histogram
        .first()
        .map_or("nothing", |(label, _)| label.as_str());
    ToolResponse::narrated(
        &format!(
            "{} spans {}x{} tiles, mostly {dominant}.",
            world.name, world.width, world.height
        ),
        &serde_json::json!({
            "worldId": id,
            "width": world.width,
            "height": world.height,
            "terrain": terrain,
        }),
    )
}

async fn get_region_map(ctx: ToolContext, input: RegionMapInput) -> Result<ToolResponse, ToolError> {
    let id = WorldId::new(input.world_id);
    ctx.state.worlds().get(&id).await?;
    let tiles = ctx
        .state
        .worlds()
        .tiles_window(&id, input.x, input.y, input.width, input.height)
        .await?;
    ToolResponse::narrated(
        &format!(
            "Window ({},{}) {}x{}: {} tiles.",
            input.x,
            input.y,
            input.width,
            input.height,
            tiles.len()
        ),
        &serde_json::json!({"tiles": tiles}),
    )
}

async fn get_world_tiles(ctx: ToolContext, input: WorldRefInput) -> Result<ToolResponse, ToolError> {
    let id = WorldId::new(input.world_id);
    ctx.state.worlds().get(&id).await?;
    let tiles = ctx.state.worlds().cached_tiles(&id).await?;
    ToolResponse::narrated(
        &format!("The full grid: {} tiles (served from the tile cache).", tiles.len()),
        &serde_json::json!({"tiles": tiles}),
    )
}

async fn preview_map_patch(ctx: ToolContext, input: MapPatchInput) -> Result<ToolResponse, ToolError> {
    let id = WorldId::new(input.world_id);
    let world = ctx.state.worlds().get(&id).await?;
    let operations = to_operations(input.operations);

    let rejected = out_of_bounds(&world, &operations);
    if !rejected.is_empty() {
        return Err(ToolError::validation(format!(
            "{} operation(s) fall outside the {}x{} grid",
            rejected.len(),
            world.width,
            world.height
        )));
    }

    // Summarize the transitions without committing anything.
    let mut transitions = Vec::with_capacity(operations.len());
    for op in &operations {
        let current = ctx
            .state
            .worlds()
            .tiles_window(&id, op.x, op.y, 1, 1)
            .await?;
        let from = current
            .first()
            .map_or("void", |tile| tile.terrain.as_str())
            .to_owned();
        transitions.push(serde_json::json!({
            "x": op.x,
            "y": op.y,
            "from": from,
            "to": op.terrain,
        }));
    }

    ToolResponse::narrated(
        &format!(
            "Preview: {} tile(s) would change; nothing has been committed.",
            transitions.len()
        ),
        &serde_json::json!({"preview": true, "changes": transitions}),
    )
}

async fn apply_map_patch(ctx: ToolContext, input: MapPatchInput) -> Result<ToolResponse, ToolError> {
    let id = WorldId::new(input.world_id);
    let world = ctx.state.worlds().get(&id).await?;
    let operations = to_operations(input.operations);

    let rejected = out_of_bounds(&world, &operations);
    if !rejected.is_empty() {
        return Err(ToolError::validation(format!(
            "{} operation(s) fall outside the {}x{} grid",
            rejected.len(),
            world.width,
            world.height
        )));
    }

    let patch = ctx
        .state
        .worlds()
        .apply_patch(&world, &operations, input.note.as_deref())
        .await?;
    ctx.state
        .audit(
            "apply_map_patch",
            None,
            Some(id.as_str()),
            serde_json::json!({"patchId": patch.id, "operations": patch.operations.len()}),
        )
        .await?;
    ctx.state
        .publish(
            EventType::MapPatched,
            serde_json::json!({"worldId": id, "patchId": patch.id}),
        )
        .await?;

    ToolResponse::narrated(
        &format!(
            "The land changes: {} tile(s) rewritten (patch {}).",
            patch.operations.len(),
            patch.id
        ),
        &serde_json::json!({"patch": patch}),
    )
}

/// Register the world tools.
pub fn register(registry: &mut ToolRegistry) -> Result<(), ToolError> {
    registry.register(typed_tool(
        "generate_world",
        "Generate a world from a seed: regions, tiles, structures, rivers.",
        generate_world,
    ))?;
    registry.register(typed_tool(
        "get_world_state",
        "Fetch a world with its regions, structures, and rivers.",
        get_world_state,
    ))?;
    registry.register(typed_tool(
        "get_world_map_overview",
        "Dimensions and terrain histogram of a world.",
        get_world_map_overview,
    ))?;
    registry.register(typed_tool(
        "get_region_map",
        "A rectangular window of tiles.",
        get_region_map,
    ))?;
    registry.register(typed_tool(
        "get_world_tiles",
        "The full tile grid, served through the compressed tile cache.",
        get_world_tiles,
    ))?;
    registry.register(typed_tool(
        "preview_map_patch",
        "Validate and summarize a map patch without committing it.",
        preview_map_patch,
    ))?;
    registry.register(typed_tool(
        "apply_map_patch",
        "Apply a map patch transactionally and invalidate the tile cache.",
        apply_map_patch,
    ))?;
    Ok(())
}
