//! # Chunk Module
//!
//! This module provides the `Chunk` struct: a 16x16x16 block of voxels together
//! with its light values and its position in the loading pipeline.
//!
//! ## Concurrency
//!
//! A chunk is shared between the orchestrator and every stage thread behind an
//! `Arc`. Its fields are synchronised individually:
//! - `status` and `spoiled` are atomics, so a status written on one thread is seen
//!   by the orchestrator on its next scan.
//! - `blocks` and `light` are copy-on-publish. Readers take a cheap `Arc` snapshot;
//!   writers build a full replacement and swap it in with a single store.
//!
//! Only the stage currently responsible for a chunk publishes its arrays, so the
//! swap never races with another writer.
//!
//! ## Neighbours
//!
//! Chunks never hold references to their neighbours. Neighbour lookups always go
//! through the [`ChunkRegistry`](super::world::ChunkRegistry).

use std::sync::{
    atomic::{AtomicBool, AtomicU8, Ordering},
    Arc,
};

use cgmath::Point3;
use log::trace;
use num_traits::FromPrimitive;

use crate::core::{EntityId, MtResource};

use super::block::BlockType;

pub mod chunk_iteration;
mod coordinate;
mod status;
mod storage;

pub use coordinate::{ChunkCoordinate, NEIGHBOR_OFFSETS};
pub use status::ChunkStatus;
pub use storage::{index_to_local, is_inside, local_index, ChunkBlocks, LightMap};

/// The dimension (width, height, depth) of a chunk in blocks.
pub const CHUNK_DIMENSION: i32 = 16;
/// `log2(CHUNK_DIMENSION)`, used to convert block positions to chunk coordinates.
pub const CHUNK_SHIFT: i32 = 4;
/// The number of blocks in a single 2D plane of a chunk (CHUNK_DIMENSION²).
pub const CHUNK_PLANE_SIZE: i32 = CHUNK_DIMENSION * CHUNK_DIMENSION;
/// The total number of blocks in a chunk (CHUNK_DIMENSION³).
pub const CHUNK_SIZE: i32 = CHUNK_PLANE_SIZE * CHUNK_DIMENSION;
/// Brightest sky light value. Open sky is always `MAX_LIGHT`.
pub const MAX_LIGHT: u8 = 15;

/// Represents a 16x16x16 collection of voxel blocks in the world.
pub struct Chunk {
    coordinate: ChunkCoordinate,
    entity: EntityId,
    status: AtomicU8,
    spoiled: AtomicBool,
    blocks: MtResource<Arc<ChunkBlocks>>,
    light: MtResource<Arc<LightMap>>,
}

impl Chunk {
    /// Creates an all-air, unlit chunk at status `NONE`.
    ///
    /// # Arguments
    /// * `coordinate` - Position of the chunk in the chunk grid
    /// * `entity` - Entity the chunk's components are attached to
    pub fn new(coordinate: ChunkCoordinate, entity: EntityId) -> Self {
        Chunk {
            coordinate,
            entity,
            status: AtomicU8::new(ChunkStatus::NONE as u8),
            spoiled: AtomicBool::new(false),
            blocks: MtResource::new(Arc::new(ChunkBlocks::Air)),
            light: MtResource::new(Arc::new(LightMap::default())),
        }
    }

    pub fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// The current lifecycle state.
    pub fn status(&self) -> ChunkStatus {
        ChunkStatus::from_u8(self.status.load(Ordering::Acquire)).unwrap_or(ChunkStatus::NONE)
    }

    /// Moves the chunk forward to `target`.
    ///
    /// The status never moves backwards: if the chunk is already at or past
    /// `target` nothing changes.
    ///
    /// # Returns
    /// `true` if the status changed.
    pub fn advance_status(&self, target: ChunkStatus) -> bool {
        let mut current = self.status.load(Ordering::Acquire);
        loop {
            if current >= target as u8 {
                return false;
            }
            match self.status.compare_exchange_weak(
                current,
                target as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    trace!("Chunk {:?} -> {:?}", self.coordinate, target);
                    return true;
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Puts the chunk back to `NONE`. Only save-and-unload calls this.
    pub fn reset_status(&self) {
        self.status.store(ChunkStatus::NONE as u8, Ordering::Release);
        self.spoiled.store(false, Ordering::Release);
    }

    /// Flags the chunk's lighting as stale.
    pub fn mark_spoiled(&self) {
        self.spoiled.store(true, Ordering::Release);
    }

    pub fn is_spoiled(&self) -> bool {
        self.spoiled.load(Ordering::Acquire)
    }

    /// Clears the spoiled flag, returning whether it was set.
    pub fn take_spoiled(&self) -> bool {
        self.spoiled.swap(false, Ordering::AcqRel)
    }

    /// Snapshot of the published block array.
    pub fn blocks(&self) -> Arc<ChunkBlocks> {
        self.blocks.get().clone()
    }

    /// Replaces the block array.
    pub fn publish_blocks(&self, blocks: ChunkBlocks) {
        self.blocks.replace(Arc::new(blocks));
    }

    /// Snapshot of the published light map.
    pub fn light(&self) -> Arc<LightMap> {
        self.light.get().clone()
    }

    /// Replaces the light map.
    pub fn publish_light(&self, light: LightMap) {
        self.light.replace(Arc::new(light));
    }

    /// `true` while the chunk uses the compact all-air representation.
    pub fn is_air_chunk(&self) -> bool {
        self.blocks().is_air()
    }

    /// Block at a local position.
    pub fn block_at_local(&self, position: Point3<usize>) -> BlockType {
        self.blocks().get(position)
    }

    /// Sky light at a local position.
    pub fn light_at_local(&self, position: Point3<usize>) -> u8 {
        self.light().sky_light(position)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coordinate", &self.coordinate)
            .field("status", &self.status())
            .field("spoiled", &self.is_spoiled())
            .finish()
    }
}
