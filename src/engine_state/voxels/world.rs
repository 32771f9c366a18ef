//! # World Module
//!
//! This module provides the `ChunkRegistry`, the process-wide map from chunk
//! coordinate to chunk shared by the orchestrator and every stage.
//!
//! ## Architecture
//!
//! The registry uses sparse storage: only chunks that have been referenced are
//! kept in memory, which allows an effectively infinite world. The map is a
//! `DashMap`, so stages running on different threads can look up and insert
//! chunks concurrently without a global lock.
//!
//! Lookups come in two flavours:
//! - [`ChunkRegistry::get_or_create`] creates a chunk at status `NONE` on first
//!   reference. The orchestrator's scan uses it.
//! - [`ChunkRegistry::get`] never creates. Queries and neighbour lookups from the
//!   stages use it, treating a missing chunk exactly like one at `NONE`.

use std::sync::Arc;

use cgmath::Point3;
use dashmap::DashMap;

use crate::core::ComponentRegistry;

use super::{
    block::BlockType,
    chunk::{Chunk, ChunkCoordinate, ChunkStatus},
};

/// Shared map of every resident chunk.
pub struct ChunkRegistry {
    chunks: DashMap<ChunkCoordinate, Arc<Chunk>>,
    components: Arc<ComponentRegistry>,
}

impl ChunkRegistry {
    /// Creates an empty registry whose chunks register their entities in `components`.
    pub fn new(components: Arc<ComponentRegistry>) -> Self {
        ChunkRegistry {
            chunks: DashMap::new(),
            components,
        }
    }

    /// The component registry chunk entities live in.
    pub fn components(&self) -> &Arc<ComponentRegistry> {
        &self.components
    }

    /// Retrieves the chunk at the given coordinate, if it is resident.
    pub fn get(&self, coordinate: ChunkCoordinate) -> Option<Arc<Chunk>> {
        self.chunks.get(&coordinate).map(|entry| entry.value().clone())
    }

    /// Retrieves the chunk at the given coordinate, creating it at `NONE` on
    /// first reference.
    ///
    /// Concurrent callers racing on the same coordinate all receive the same chunk.
    pub fn get_or_create(&self, coordinate: ChunkCoordinate) -> Arc<Chunk> {
        self.chunks
            .entry(coordinate)
            .or_insert_with(|| {
                let entity = self.components.create_entity();
                self.components.add_component(entity, coordinate);
                Arc::new(Chunk::new(coordinate, entity))
            })
            .value()
            .clone()
    }

    /// Removes a chunk from the registry and returns it.
    ///
    /// Stages still holding the `Arc` finish their work on the detached chunk.
    pub fn remove(&self, coordinate: ChunkCoordinate) -> Option<Arc<Chunk>> {
        self.chunks.remove(&coordinate).map(|(_, chunk)| chunk)
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Coordinates of every resident chunk.
    pub fn coordinates(&self) -> Vec<ChunkCoordinate> {
        self.chunks.iter().map(|entry| *entry.key()).collect()
    }

    /// Status of a chunk, with missing chunks reported as `NONE`.
    pub fn status_of(&self, coordinate: ChunkCoordinate) -> ChunkStatus {
        self.get(coordinate)
            .map(|chunk| chunk.status())
            .unwrap_or(ChunkStatus::NONE)
    }

    /// `true` when all 26 neighbours of `coordinate` are at least at `required`.
    ///
    /// This is the synchronisation barrier between spatially adjacent chunks. A
    /// missing neighbour never satisfies it.
    pub fn neighbors_reached(&self, coordinate: ChunkCoordinate, required: ChunkStatus) -> bool {
        coordinate
            .neighbors()
            .all(|neighbor| self.status_of(neighbor) >= required)
    }

    /// `true` when all 26 neighbours of `coordinate` share at least the urgency
    /// of `required`.
    ///
    /// Looser than [`ChunkRegistry::neighbors_reached`]: statuses that share an
    /// urgency level count as equally far along, so a neighbour waiting on its
    /// own neighbours still satisfies a `LOADED` requirement.
    pub fn neighbors_urgent(&self, coordinate: ChunkCoordinate, required: ChunkStatus) -> bool {
        let required = required.urgency();
        coordinate
            .neighbors()
            .all(|neighbor| self.status_of(neighbor).urgency() >= required)
    }

    /// Returns the block at a block position.
    ///
    /// Yields `INVALID` when the owning chunk is not resident or has not finished
    /// its terrain pass. Never creates chunks.
    pub fn block_at(&self, position: Point3<i32>) -> BlockType {
        let (coordinate, local) = ChunkCoordinate::split_block_position(position);
        match self.get(coordinate) {
            Some(chunk) if chunk.status().has_blocks() => chunk.block_at_local(local),
            _ => BlockType::INVALID,
        }
    }

    /// Returns the block containing a continuous world position.
    pub fn block_at_world(&self, position: Point3<f32>) -> BlockType {
        self.block_at(Point3::new(
            position.x.floor() as i32,
            position.y.floor() as i32,
            position.z.floor() as i32,
        ))
    }

    /// Sky light at a block position, `0` when the owning chunk is not resident.
    pub fn light_at(&self, position: Point3<i32>) -> u8 {
        let (coordinate, local) = ChunkCoordinate::split_block_position(position);
        self.get(coordinate)
            .map(|chunk| chunk.light_at_local(local))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::chunk::ChunkBlocks;

    fn registry() -> ChunkRegistry {
        ChunkRegistry::new(Arc::new(ComponentRegistry::new()))
    }

    #[test]
    fn get_or_create_is_idempotent_and_get_never_creates() {
        let registry = registry();
        let coordinate = ChunkCoordinate::new(1, 2, 3);

        assert!(registry.get(coordinate).is_none());
        let first = registry.get_or_create(coordinate);
        let second = registry.get_or_create(coordinate);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.status(), ChunkStatus::NONE);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.components().get_component::<ChunkCoordinate>(first.entity()),
            Some(coordinate)
        );
    }

    #[test]
    fn block_at_is_invalid_until_terrain_is_done() {
        let registry = registry();
        let position = Point3::new(-3, 5, 17);
        assert_eq!(registry.block_at(position), BlockType::INVALID);

        let (coordinate, local) = ChunkCoordinate::split_block_position(position);
        let chunk = registry.get_or_create(coordinate);
        let mut blocks = ChunkBlocks::Air;
        blocks.set(local, BlockType::SAND);
        chunk.publish_blocks(blocks);

        chunk.advance_status(ChunkStatus::TERRAIN_GENERATING);
        assert_eq!(registry.block_at(position), BlockType::INVALID);

        chunk.advance_status(ChunkStatus::WAIT_NEIGHBORS);
        assert_eq!(registry.block_at(position), BlockType::SAND);
        assert_eq!(registry.block_at_world(Point3::new(-2.5, 5.9, 17.1)), BlockType::SAND);
    }

    #[test]
    fn barrier_requires_every_neighbor() {
        let registry = registry();
        let center = ChunkCoordinate::new(0, 0, 0);
        assert!(!registry.neighbors_reached(center, ChunkStatus::WAIT_NEIGHBORS));

        for neighbor in center.neighbors() {
            registry
                .get_or_create(neighbor)
                .advance_status(ChunkStatus::WAIT_NEIGHBORS);
        }
        assert!(registry.neighbors_reached(center, ChunkStatus::WAIT_NEIGHBORS));
        assert!(!registry.neighbors_reached(center, ChunkStatus::LOADED));
    }
}
