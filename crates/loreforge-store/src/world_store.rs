//! Operations on the `worlds` table and its derived families: regions,
//! tiles, structures, rivers, and patches.
//!
//! The `tile_cache` column is a gzip snapshot of the tile grid and is
//! never primary state: every mutating method here nulls it, and
//! [`WorldStore::cached_tiles`] rebuilds it on the next read.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use loreforge_rules::GeneratedWorld;
use loreforge_types::{
    MapPatch, PatchId, PatchOperation, Region, RegionId, River, RiverId, StructureId, Tile,
    World, WorldId, WorldStructure,
};

use crate::error::StoreError;
use crate::sqlite::{json_from_db, json_to_db};
use crate::tile_cache;

/// Operations on worlds and their derived content.
pub struct WorldStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WorldStore<'a> {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a world and everything the generator produced for it, in
    /// one transaction.
    pub async fn create(
        &self,
        world: &World,
        generated: &GeneratedWorld,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"INSERT INTO worlds (id, name, seed, width, height, tile_cache, created_at, updated_at)
              VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?7)",
        )
        .bind(world.id.as_str())
        .bind(&world.name)
        .bind(world.seed)
        .bind(world.width)
        .bind(world.height)
        .bind(world.created_at)
        .bind(world.updated_at)
        .execute(&mut *tx)
        .await?;

        for region in &generated.regions {
            sqlx::query(
                "INSERT INTO regions (id, world_id, name, biome) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(region.id.as_str())
            .bind(region.world_id.as_str())
            .bind(&region.name)
            .bind(&region.biome)
            .execute(&mut *tx)
            .await?;
        }

        for tile in &generated.tiles {
            sqlx::query(
                r"INSERT INTO tiles (world_id, x, y, terrain, region_id)
                  VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(tile.world_id.as_str())
            .bind(tile.x)
            .bind(tile.y)
            .bind(&tile.terrain)
            .bind(tile.region_id.as_ref().map(RegionId::as_str))
            .execute(&mut *tx)
            .await?;
        }

        for structure in &generated.structures {
            sqlx::query(
                r"INSERT INTO structures (id, world_id, name, kind, x, y)
                  VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(structure.id.as_str())
            .bind(structure.world_id.as_str())
            .bind(&structure.name)
            .bind(&structure.kind)
            .bind(structure.x)
            .bind(structure.y)
            .execute(&mut *tx)
            .await?;
        }

        for river in &generated.rivers {
            sqlx::query("INSERT INTO rivers (id, world_id, path) VALUES (?1, ?2, ?3)")
                .bind(river.id.as_str())
                .bind(river.world_id.as_str())
                .bind(json_to_db(&river.path)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(world = %world.id, tiles = generated.tiles.len(), "world created");
        Ok(())
    }

    /// Fetch a world if it exists.
    pub async fn try_get(&self, id: &WorldId) -> Result<Option<World>, StoreError> {
        let row = sqlx::query_as::<_, WorldRow>(
            "SELECT id, name, seed, width, height, created_at, updated_at FROM worlds WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(WorldRow::into_entity))
    }

    /// Fetch a world or fail with `NotFound`.
    pub async fn get(&self, id: &WorldId) -> Result<World, StoreError> {
        self.try_get(id)
            .await?
            .ok_or_else(|| StoreError::not_found("world", id.as_str()))
    }

    /// List every world, newest first.
    pub async fn list(&self) -> Result<Vec<World>, StoreError> {
        let rows = sqlx::query_as::<_, WorldRow>(
            "SELECT id, name, seed, width, height, created_at, updated_at
             FROM worlds ORDER BY created_at DESC, id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(WorldRow::into_entity).collect())
    }

    /// Delete a world; every derived family cascades.
    pub async fn delete(&self, id: &WorldId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM worlds WHERE id = ?1")
            .bind(id.as_str())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The regions of a world.
    pub async fn regions_for(&self, id: &WorldId) -> Result<Vec<Region>, StoreError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, world_id, name, biome FROM regions WHERE world_id = ?1 ORDER BY id",
        )
        .bind(id.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(region_id, world_id, name, biome)| Region {
                id: RegionId::new(region_id),
                world_id: WorldId::new(world_id),
                name,
                biome,
            })
            .collect())
    }

    /// The structures of a world.
    pub async fn structures_for(
        &self,
        id: &WorldId,
    ) -> Result<Vec<WorldStructure>, StoreError> {
        let rows = sqlx::query_as::<_, StructureRow>(
            "SELECT * FROM structures WHERE world_id = ?1 ORDER BY id",
        )
        .bind(id.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(StructureRow::into_entity).collect())
    }

    /// The rivers of a world.
    pub async fn rivers_for(&self, id: &WorldId) -> Result<Vec<River>, StoreError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT id, world_id, path FROM rivers WHERE world_id = ?1 ORDER BY id",
        )
        .bind(id.as_str())
        .fetch_all(self.pool)
        .await?;
        rows.into_iter()
            .map(|(river_id, world_id, raw)| {
                Ok(River {
                    path: json_from_db("river", &river_id, &raw)?,
                    id: RiverId::new(river_id),
                    world_id: WorldId::new(world_id),
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Tiles and the tile cache
    // -----------------------------------------------------------------------

    /// Every tile of a world, row-major, straight from the table.
    pub async fn all_tiles(&self, id: &WorldId) -> Result<Vec<Tile>, StoreError> {
        let rows = sqlx::query_as::<_, TileRow>(
            "SELECT * FROM tiles WHERE world_id = ?1 ORDER BY y, x",
        )
        .bind(id.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(TileRow::into_entity).collect())
    }

    /// A rectangular window of tiles.
    pub async fn tiles_window(
        &self,
        id: &WorldId,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    ) -> Result<Vec<Tile>, StoreError> {
        let rows = sqlx::query_as::<_, TileRow>(
            r"SELECT * FROM tiles
              WHERE world_id = ?1 AND x >= ?2 AND x < ?3 AND y >= ?4 AND y < ?5
              ORDER BY y, x",
        )
        .bind(id.as_str())
        .bind(x)
        .bind(x.saturating_add(width))
        .bind(y)
        .bind(y.saturating_add(height))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(TileRow::into_entity).collect())
    }

    /// Terrain counts for the overview, most common first.
    pub async fn terrain_histogram(
        &self,
        id: &WorldId,
    ) -> Result<Vec<(String, i64)>, StoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"SELECT terrain, COUNT(*) as n FROM tiles
              WHERE world_id = ?1 GROUP BY terrain ORDER BY n DESC, terrain",
        )
        .bind(id.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// The tile grid through the cache: decompress the stored snapshot,
    /// or rebuild and store it when the cache is cold.
    pub async fn cached_tiles(&self, id: &WorldId) -> Result<Vec<Tile>, StoreError> {
        let cached: Option<(Option<Vec<u8>>,)> =
            sqlx::query_as("SELECT tile_cache FROM worlds WHERE id = ?1")
                .bind(id.as_str())
                .fetch_optional(self.pool)
                .await?;
        let Some((blob,)) = cached else {
            return Err(StoreError::not_found("world", id.as_str()));
        };

        if let Some(blob) = blob {
            return tile_cache::decompress(&blob);
        }

        let tiles = self.all_tiles(id).await?;
        let blob = tile_cache::compress(&tiles)?;
        sqlx::query("UPDATE worlds SET tile_cache = ?2 WHERE id = ?1")
            .bind(id.as_str())
            .bind(blob)
            .execute(self.pool)
            .await?;
        tracing::debug!(world = %id, tiles = tiles.len(), "tile cache rebuilt");
        Ok(tiles)
    }

    // -----------------------------------------------------------------------
    // Patches
    // -----------------------------------------------------------------------

    /// Apply a map patch in one transaction: rewrite the targeted tiles,
    /// record the patch, invalidate the tile cache, and bump the world's
    /// `updated_at`. The caller has already validated bounds.
    pub async fn apply_patch(
        &self,
        world: &World,
        operations: &[PatchOperation],
        note: Option<&str>,
    ) -> Result<MapPatch, StoreError> {
        let mut tx = self.pool.begin().await?;
        let applied_at = Utc::now();

        for op in operations {
            sqlx::query(
                "UPDATE tiles SET terrain = ?4 WHERE world_id = ?1 AND x = ?2 AND y = ?3",
            )
            .bind(world.id.as_str())
            .bind(op.x)
            .bind(op.y)
            .bind(&op.terrain)
            .execute(&mut *tx)
            .await?;
        }

        let patch = MapPatch {
            id: PatchId::generate(),
            world_id: world.id.clone(),
            operations: operations.to_vec(),
            note: note.map(str::to_owned),
            applied_at,
        };
        sqlx::query(
            r"INSERT INTO patches (id, world_id, operations, note, applied_at)
              VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(patch.id.as_str())
        .bind(patch.world_id.as_str())
        .bind(json_to_db(&patch.operations)?)
        .bind(patch.note.as_deref())
        .bind(patch.applied_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE worlds SET tile_cache = NULL, updated_at = ?2 WHERE id = ?1")
            .bind(world.id.as_str())
            .bind(applied_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(world = %world.id, ops = operations.len(), "map patch applied");
        Ok(patch)
    }

    /// Every patch applied to a world, oldest first.
    pub async fn patches_for(&self, id: &WorldId) -> Result<Vec<MapPatch>, StoreError> {
        let rows: Vec<(String, String, String, Option<String>, DateTime<Utc>)> =
            sqlx::query_as(
                r"SELECT id, world_id, operations, note, applied_at
                  FROM patches WHERE world_id = ?1 ORDER BY applied_at, id",
            )
            .bind(id.as_str())
            .fetch_all(self.pool)
            .await?;
        rows.into_iter()
            .map(|(patch_id, world_id, raw_ops, note, applied_at)| {
                Ok(MapPatch {
                    operations: json_from_db("patch", &patch_id, &raw_ops)?,
                    id: PatchId::new(patch_id),
                    world_id: WorldId::new(world_id),
                    note,
                    applied_at,
                })
            })
            .collect()
    }
}

/// A row from the `worlds` table (cache column excluded).
#[derive(Debug, sqlx::FromRow)]
struct WorldRow {
    id: String,
    name: String,
    seed: i64,
    width: i64,
    height: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorldRow {
    fn into_entity(self) -> World {
        World {
            id: WorldId::new(self.id),
            name: self.name,
            seed: self.seed,
            width: self.width,
            height: self.height,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A row from the `tiles` table.
#[derive(Debug, sqlx::FromRow)]
struct TileRow {
    world_id: String,
    x: i64,
    y: i64,
    terrain: String,
    region_id: Option<String>,
}

impl TileRow {
    fn into_entity(self) -> Tile {
        Tile {
            world_id: WorldId::new(self.world_id),
            x: self.x,
            y: self.y,
            terrain: self.terrain,
            region_id: self.region_id.map(RegionId::new),
        }
    }
}

/// A row from the `structures` table.
#[derive(Debug, sqlx::FromRow)]
struct StructureRow {
    id: String,
    world_id: String,
    name: String,
    kind: String,
    x: i64,
    y: i64,
}

impl StructureRow {
    fn into_entity(self) -> WorldStructure {
        WorldStructure {
            id: StructureId::new(self.id),
            world_id: WorldId::new(self.world_id),
            name: self.name,
            kind: self.kind,
            x: self.x,
            y: self.y,
        }
    }
}
