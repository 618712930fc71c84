//! The world-generation seam.
//!
//! Procedural terrain math (noise, biome gradients, hydrology) is an
//! external collaborator: the engine consumes opaque
//! `(seed, width, height) -> world` output through the [`WorldGenerator`]
//! trait. The built-in [`SeededWorldGenerator`] is a deliberately simple
//! deterministic filler that satisfies the interface: same seed, same
//! world, every time.

use loreforge_types::{
    Region, RegionId, River, RiverId, StructureId, Tile, World, WorldStructure,
};

use loreforge_core::dice::SeededDice;

/// Terrain labels the built-in generator draws from, with roll weights
/// expressed as cumulative d100 bands.
const TERRAIN_BANDS: &[(i64, &str)] = &[
    (35, "plains"),
    (55, "forest"),
    (70, "hills"),
    (82, "mountains"),
    (92, "swamp"),
    (100, "desert"),
];

/// Biome labels assigned to the four quadrant regions.
const QUADRANT_BIOMES: &[&str] = &["temperate", "boreal", "arid", "coastal"];

/// Everything a generator produces for one world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedWorld {
    /// The regions partitioning the grid.
    pub regions: Vec<Region>,
    /// Every tile of the grid, row-major.
    pub tiles: Vec<Tile>,
    /// Structures placed on the map.
    pub structures: Vec<WorldStructure>,
    /// Rivers traced across the map.
    pub rivers: Vec<River>,
}

/// A source of generated worlds.
pub trait WorldGenerator: Send + Sync {
    /// Generate the derived content for `world`. Must be a pure function
    /// of the world's seed and dimensions.
    fn generate(&self, world: &World) -> GeneratedWorld;
}

/// The built-in deterministic generator: quadrant regions, dice-weighted
/// terrain, one wandering river, and a structure per region.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeededWorldGenerator;

impl SeededWorldGenerator {
    /// Create the generator.
    pub const fn new() -> Self {
        Self
    }
}

impl WorldGenerator for SeededWorldGenerator {
    fn generate(&self, world: &World) -> GeneratedWorld {
        let mut dice = SeededDice::new(&format!("world-{}-{}", world.id, world.seed));
        let width = world.width.max(1);
        let height = world.height.max(1);
        let mid_x = width.div_euclid(2);
        let mid_y = height.div_euclid(2);

        // Four quadrant regions with rotated biome assignment.
        let biome_offset = dice.roll(4).saturating_sub(1);
        let mut regions = Vec::with_capacity(4);
        for (index, corner) in ["northwest", "northeast", "southwest", "southeast"]
            .iter()
            .enumerate()
        {
            let biome_index = usize::try_from(
                i64::try_from(index)
                    .unwrap_or(0)
                    .saturating_add(biome_offset)
                    .rem_euclid(4),
            )
            .unwrap_or(0);
            regions.push(Region {
                id: RegionId::new(format!("{}-region-{corner}", world.id)),
                world_id: world.id.clone(),
                name: format!("The {corner} reaches"),
                biome: QUADRANT_BIOMES.get(biome_index).copied().unwrap_or("temperate").to_owned(),
            });
        }

        let region_for = |x: i64, y: i64| -> usize {
            match (x >= mid_x, y >= mid_y) {
                (false, false) => 0,
                (true, false) => 1,
                (false, true) => 2,
                (true, true) => 3,
            }
        };

        // Dice-weighted terrain per tile.
        let capacity = usize::try_from(width.saturating_mul(height)).unwrap_or(0);
        let mut tiles = Vec::with_capacity(capacity);
        for y in 0..height {
            for x in 0..width {
                let band_roll = dice.d100();
                let terrain = TERRAIN_BANDS
                    .iter()
                    .find(|(ceiling, _)| band_roll <= *ceiling)
                    .map_or("plains", |(_, label)| *label);
                tiles.push(Tile {
                    world_id: world.id.clone(),
                    x,
                    y,
                    terrain: terrain.to_owned(),
                    region_id: regions
                        .get(region_for(x, y))
                        .map(|region| region.id.clone()),
                });
            }
        }

        // One river wandering south, drifting at most one column per row.
        let mut river_x = dice.roll(u32::try_from(width).unwrap_or(1)).saturating_sub(1);
        let mut path = Vec::with_capacity(usize::try_from(height).unwrap_or(0));
        for y in 0..height {
            path.push((river_x, y));
            let drift = dice.roll(3).saturating_sub(2); // -1, 0, or +1
            river_x = river_x.saturating_add(drift).clamp(0, width.saturating_sub(1));
        }
        for (x, y) in &path {
            if let Some(tile) = tiles
                .iter_mut()
                .find(|tile| tile.x == *x && tile.y == *y)
            {
                tile.terrain = String::from("river");
            }
        }
        let rivers = vec![River {
            id: RiverId::new(format!("{}-river-1", world.id)),
            world_id: world.id.clone(),
            path,
        }];

        // One structure per region at a dice-chosen offset.
        let structure_kinds = ["village", "ruin", "watchtower", "shrine"];
        let mut structures = Vec::with_capacity(4);
        for (index, kind) in structure_kinds.iter().enumerate() {
            let x = dice.roll(u32::try_from(width).unwrap_or(1)).saturating_sub(1);
            let y = dice.roll(u32::try_from(height).unwrap_or(1)).saturating_sub(1);
            structures.push(WorldStructure {
                id: StructureId::new(format!("{}-structure-{}", world.id, index.saturating_add(1))),
                world_id: world.id.clone(),
                name: format!("{} {}", world.name, kind),
                kind: (*kind).to_owned(),
                x,
                y,
            });
        }

        GeneratedWorld {
            regions,
            tiles,
            structures,
            rivers,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use loreforge_types::WorldId;

    use super::*;

    fn world(seed: i64, width: i64, height: i64) -> World {
        World {
            id: WorldId::new("w-1"),
            name: String::from("Testlands"),
            seed,
            width,
            height,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let generator = SeededWorldGenerator::new();
        let first = generator.generate(&world(42, 12, 10));
        let second = generator.generate(&world(42, 12, 10));
        assert_eq!(first, second);

        let different = generator.generate(&world(43, 12, 10));
        assert_ne!(first.tiles, different.tiles);
    }

    #[test]
    fn every_tile_is_generated_with_a_region() {
        let generated = SeededWorldGenerator::new().generate(&world(7, 10, 10));
        assert_eq!(generated.tiles.len(), 100);
        assert_eq!(generated.regions.len(), 4);
        assert!(generated.tiles.iter().all(|tile| tile.region_id.is_some()));
    }

    #[test]
    fn river_path_stays_in_bounds_and_spans_height() {
        let generated = SeededWorldGenerator::new().generate(&world(11, 20, 15));
        let river = generated.rivers.first().unwrap();
        assert_eq!(river.path.len(), 15);
        for (x, y) in &river.path {
            assert!((0..20).contains(x));
            assert!((0..15).contains(y));
        }
    }

    #[test]
    fn structures_land_inside_the_grid() {
        let generated = SeededWorldGenerator::new().generate(&world(3, 16, 12));
        assert_eq!(generated.structures.len(), 4);
        for structure in &generated.structures {
            assert!((0..16).contains(&structure.x));
            assert!((0..12).contains(&structure.y));
        }
    }
}
