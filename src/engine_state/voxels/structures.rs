//! # Structures
//!
//! Surface decoration placed after terrain: trees, cacti and crop patches.
//!
//! A structure may straddle chunk borders, so every write goes through a
//! [`StructureContext`]. The context resolves the target chunk for each block
//! position, edits a private copy of that chunk's blocks, and publishes all
//! touched chunks at once when placement for the source chunk is finished.
//!
//! Placement runs on a single dedicated thread. Two structures never write at
//! the same time, so a chunk copy taken here cannot be overwritten by a
//! concurrent placement.

use std::{collections::HashMap, sync::Arc};

use cgmath::{Point3, Vector3};
use log::trace;

use super::{
    biome::position_roll,
    block::BlockType,
    chunk::{Chunk, ChunkBlocks, ChunkCoordinate, ChunkStatus, CHUNK_DIMENSION},
    terrain::TerrainGenerator,
    world::ChunkRegistry,
};

/// Salt for the "does a structure spawn here" roll.
const SPAWN_SALT: u64 = 0x7370_6177;
/// Salt for the roll handed to `Structure::place`.
const SHAPE_SALT: u64 = 0x7368_6170;

/// The closed set of placeable structures.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Structure {
    Tree,
    Cactus,
    Crops,
}

impl Structure {
    /// Places the structure with its base at `origin` (the first air voxel above
    /// the trigger block).
    ///
    /// # Arguments
    /// * `context` - Write target resolving chunk borders
    /// * `origin` - World block position of the structure's base
    /// * `roll` - Uniform value in `[0, 1)` shaping this instance
    pub fn place(&self, context: &mut StructureContext<'_>, origin: Point3<i32>, roll: f64) {
        match self {
            Structure::Tree => place_tree(context, origin, roll),
            Structure::Cactus => place_cactus(context, origin, roll),
            Structure::Crops => place_crops(context, origin, roll),
        }
    }
}

fn place_tree(context: &mut StructureContext<'_>, origin: Point3<i32>, roll: f64) {
    let trunk_height = 4 + (roll * 3.0) as i32;

    for dy in 0..trunk_height {
        let position = origin + Vector3::new(0, dy, 0);
        if matches!(context.block_at(position), BlockType::AIR | BlockType::LEAVES) {
            context.set_block(position, BlockType::LOG);
        }
    }

    let top = trunk_height - 1;
    for dy in (top - 2)..=(top + 1) {
        let radius: i32 = if dy > top - 1 { 1 } else { 2 };
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                // Round the corners of the wide layers.
                if radius == 2 && dx.abs() == 2 && dz.abs() == 2 {
                    continue;
                }
                context.set_if_air(origin + Vector3::new(dx, dy, dz), BlockType::LEAVES);
            }
        }
    }
}

fn place_cactus(context: &mut StructureContext<'_>, origin: Point3<i32>, roll: f64) {
    let height = 1 + (roll * 3.0) as i32;
    for dy in 0..height {
        if !context.set_if_air(origin + Vector3::new(0, dy, 0), BlockType::CACTUS) {
            break;
        }
    }
}

fn place_crops(context: &mut StructureContext<'_>, origin: Point3<i32>, roll: f64) {
    let mut rng = fastrand::Rng::with_seed(roll.to_bits());
    for dx in -1..=1 {
        for dz in -1..=1 {
            let position = origin + Vector3::new(dx, 0, dz);
            let ground = position + Vector3::new(0, -1, 0);
            if context.block_at(ground) == BlockType::GRASS && rng.f64() < 0.6 {
                context.set_if_air(position, BlockType::WHEAT);
            }
        }
    }
}

/// Copy-on-write view over the chunks a structure pass touches.
pub struct StructureContext<'a> {
    chunks: &'a ChunkRegistry,
    edits: HashMap<ChunkCoordinate, Option<(Arc<Chunk>, ChunkBlocks)>>,
}

impl<'a> StructureContext<'a> {
    pub fn new(chunks: &'a ChunkRegistry) -> Self {
        StructureContext {
            chunks,
            edits: HashMap::new(),
        }
    }

    /// Resolves the editable copy of a chunk. Chunks that are missing or have no
    /// terrain yet resolve to `None` and are never written.
    fn slot(&mut self, coordinate: ChunkCoordinate) -> Option<&mut ChunkBlocks> {
        let chunks = self.chunks;
        self.edits
            .entry(coordinate)
            .or_insert_with(|| {
                chunks
                    .get(coordinate)
                    .filter(|chunk| chunk.status() >= ChunkStatus::WAIT_NEIGHBORS)
                    .map(|chunk| {
                        let blocks = (*chunk.blocks()).clone();
                        (chunk, blocks)
                    })
            })
            .as_mut()
            .map(|(_, blocks)| blocks)
    }

    /// Block at a world position as seen by this pass, `INVALID` if unknown.
    pub fn block_at(&mut self, position: Point3<i32>) -> BlockType {
        let (coordinate, local) = ChunkCoordinate::split_block_position(position);
        self.slot(coordinate)
            .map(|blocks| blocks.get(local))
            .unwrap_or(BlockType::INVALID)
    }

    /// Writes a block. Writes into unknown chunks are dropped.
    ///
    /// # Returns
    /// `true` if the write landed.
    pub fn set_block(&mut self, position: Point3<i32>, block: BlockType) -> bool {
        let (coordinate, local) = ChunkCoordinate::split_block_position(position);
        match self.slot(coordinate) {
            Some(blocks) => {
                blocks.set(local, block);
                true
            }
            None => false,
        }
    }

    /// Writes a block only where there is air.
    pub fn set_if_air(&mut self, position: Point3<i32>, block: BlockType) -> bool {
        self.block_at(position) == BlockType::AIR && self.set_block(position, block)
    }

    /// Publishes every touched chunk.
    ///
    /// # Returns
    /// The number of chunks whose blocks changed.
    pub fn publish(self) -> usize {
        let mut published = 0;
        for (chunk, blocks) in self.edits.into_values().flatten() {
            if *chunk.blocks() != blocks {
                chunk.publish_blocks(blocks);
                published += 1;
            }
        }
        published
    }
}

/// Decorates one chunk's surface according to its biomes.
///
/// Every column is scanned from the top for its highest trigger block with air
/// above it; a deterministic roll then decides whether the biome's structure
/// grows there.
///
/// # Returns
/// The number of structures placed.
pub fn decorate_chunk(
    chunks: &ChunkRegistry,
    generator: &TerrainGenerator,
    coordinate: ChunkCoordinate,
) -> usize {
    let mut context = StructureContext::new(chunks);
    let origin = coordinate.origin();
    let seed = generator.seed();
    let mut placed = 0;

    for z in 0..CHUNK_DIMENSION {
        for x in 0..CHUNK_DIMENSION {
            let world_x = origin.x + x;
            let world_z = origin.z + z;
            let biome = generator.biome_at(world_x, world_z);
            if biome.structures.is_empty() {
                continue;
            }

            for y in (0..CHUNK_DIMENSION).rev() {
                let ground = Point3::new(world_x, origin.y + y, world_z);
                let block = context.block_at(ground);
                if block.is_air() || block == BlockType::INVALID {
                    continue;
                }

                let above = ground + Vector3::new(0, 1, 0);
                if context.block_at(above) == BlockType::AIR {
                    let spawn = position_roll(seed, SPAWN_SALT, ground.x, ground.y, ground.z);
                    let mut threshold = 0.0;
                    for rule in biome.structures.iter().filter(|rule| rule.trigger == block) {
                        threshold += rule.chance;
                        if spawn < threshold {
                            let shape = position_roll(seed, SHAPE_SALT, ground.x, ground.y, ground.z);
                            rule.structure.place(&mut context, above, shape);
                            placed += 1;
                            break;
                        }
                    }
                }
                break;
            }
        }
    }

    let published = context.publish();
    trace!(
        "Placed {} structure(s) from chunk {:?}, {} chunk(s) changed",
        placed,
        coordinate,
        published
    );
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ComponentRegistry;

    fn ready_registry(coordinates: &[ChunkCoordinate]) -> ChunkRegistry {
        let registry = ChunkRegistry::new(Arc::new(ComponentRegistry::new()));
        for &coordinate in coordinates {
            registry
                .get_or_create(coordinate)
                .advance_status(ChunkStatus::WAIT_NEIGHBORS);
        }
        registry
    }

    #[test]
    fn trees_spill_into_the_neighbouring_chunk() {
        let here = ChunkCoordinate::new(0, 0, 0);
        let east = ChunkCoordinate::new(1, 0, 0);
        let registry = ready_registry(&[here, east]);

        let mut context = StructureContext::new(&registry);
        Structure::Tree.place(&mut context, Point3::new(15, 2, 8), 0.0);
        assert_eq!(context.publish(), 2);

        assert_eq!(registry.block_at(Point3::new(15, 2, 8)), BlockType::LOG);
        assert_eq!(registry.block_at(Point3::new(16, 5, 8)), BlockType::LEAVES);
    }

    #[test]
    fn writes_into_chunks_without_terrain_are_dropped() {
        let here = ChunkCoordinate::new(0, 0, 0);
        let registry = ready_registry(&[here]);
        registry.get_or_create(ChunkCoordinate::new(-1, 0, 0));

        let mut context = StructureContext::new(&registry);
        assert!(!context.set_block(Point3::new(-1, 0, 0), BlockType::LOG));
        assert!(context.set_block(Point3::new(0, 0, 0), BlockType::LOG));
        assert_eq!(context.publish(), 1);
    }

    #[test]
    fn leaves_never_replace_solid_blocks() {
        let here = ChunkCoordinate::new(0, 0, 0);
        let registry = ready_registry(&[here]);
        let mut blocks = ChunkBlocks::Air;
        blocks.set(Point3::new(9, 5, 8), BlockType::STONE);
        registry.get_or_create(here).publish_blocks(blocks);

        let mut context = StructureContext::new(&registry);
        Structure::Tree.place(&mut context, Point3::new(8, 2, 8), 0.0);
        context.publish();

        assert_eq!(registry.block_at(Point3::new(9, 5, 8)), BlockType::STONE);
        assert_eq!(registry.block_at(Point3::new(7, 5, 8)), BlockType::LEAVES);
    }
}
