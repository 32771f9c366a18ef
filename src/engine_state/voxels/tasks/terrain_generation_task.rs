//! # Terrain Generation Task
//!
//! This module defines the `TerrainGenerationTask` which fills a chunk's blocks
//! on the terrain worker pool. Terrain for different chunks is independent, so
//! any number of these run in parallel.

use std::sync::Arc;

use log::trace;

use crate::{
    engine_state::{
        task_management::task::{ResultContext, Task, TaskResult},
        voxels::{
            chunk::{Chunk, ChunkCoordinate, ChunkStatus},
            terrain::TerrainGenerator,
        },
    },
    error::Result,
};

/// A task that generates a chunk's terrain asynchronously.
///
/// This task is responsible for:
/// 1. Generating the chunk's blocks from the shared generator
/// 2. Publishing them into the chunk
/// 3. Moving the chunk to `WAIT_NEIGHBORS`
pub struct TerrainGenerationTask {
    /// Shared, immutable terrain generator
    generator: Arc<TerrainGenerator>,
    /// The chunk to fill
    chunk: Arc<Chunk>,
}

impl TerrainGenerationTask {
    /// Creates a new terrain generation task.
    ///
    /// # Arguments
    /// * `generator` - The terrain generator shared by all terrain workers
    /// * `chunk` - The chunk whose blocks should be generated
    ///
    /// # Returns
    /// A new `TerrainGenerationTask` instance
    pub fn new(generator: Arc<TerrainGenerator>, chunk: Arc<Chunk>) -> Self {
        TerrainGenerationTask { generator, chunk }
    }
}

impl Task for TerrainGenerationTask {
    /// Executes the terrain generation task.
    ///
    /// The blocks are published before the status changes, so any stage that
    /// sees `WAIT_NEIGHBORS` also sees the finished blocks.
    ///
    /// # Returns
    /// A boxed `TaskResult` recording whether the chunk came out all air
    fn process(&self) -> Result<Box<dyn TaskResult>> {
        let coordinate = self.chunk.coordinate();
        let blocks = self.generator.generate(coordinate);
        let is_air = blocks.is_air();

        self.chunk.publish_blocks(blocks);
        self.chunk.advance_status(ChunkStatus::WAIT_NEIGHBORS);

        Ok(Box::new(TerrainGenerationTaskResult { coordinate, is_air }))
    }

    fn describe(&self) -> String {
        format!("chunk {:?}", self.chunk.coordinate())
    }
}

/// The result of a terrain generation task.
pub struct TerrainGenerationTaskResult {
    /// The generated chunk
    coordinate: ChunkCoordinate,
    /// Whether the chunk uses the compact all-air representation
    is_air: bool,
}

impl TaskResult for TerrainGenerationTaskResult {
    /// Handles the result of terrain generation on the orchestrator thread.
    ///
    /// Nothing is scheduled from here: the orchestrator picks the chunk up on its
    /// next scan once the neighbour barrier allows it.
    fn handle_result(self: Box<Self>, _context: &mut ResultContext<'_>) {
        trace!(
            "Generated terrain for {:?}{}",
            self.coordinate,
            if self.is_air { " (air)" } else { "" }
        );
    }
}
