//! # Structure Generation Task
//!
//! Runs surface decoration for one chunk on the single structure thread.

use std::sync::Arc;

use log::trace;

use crate::{
    engine_state::{
        task_management::task::{ResultContext, Task, TaskResult},
        voxels::{
            chunk::{ChunkCoordinate, ChunkStatus},
            structures::decorate_chunk,
            terrain::TerrainGenerator,
            world::ChunkRegistry,
        },
    },
    error::{PipelineError, Result},
};

/// Places the structures rooted in one chunk, then moves it to `LOADED`.
pub struct StructureGenerationTask {
    chunks: Arc<ChunkRegistry>,
    generator: Arc<TerrainGenerator>,
    coordinate: ChunkCoordinate,
}

impl StructureGenerationTask {
    /// # Arguments
    /// * `chunks` - Registry used to reach neighbouring chunks
    /// * `generator` - Source of biomes and the world seed
    /// * `coordinate` - The chunk to decorate
    pub fn new(chunks: Arc<ChunkRegistry>, generator: Arc<TerrainGenerator>, coordinate: ChunkCoordinate) -> Self {
        StructureGenerationTask {
            chunks,
            generator,
            coordinate,
        }
    }
}

impl Task for StructureGenerationTask {
    fn process(&self) -> Result<Box<dyn TaskResult>> {
        let chunk = self
            .chunks
            .get(self.coordinate)
            .ok_or(PipelineError::ChunkMissing(self.coordinate))?;

        let placed = decorate_chunk(&self.chunks, &self.generator, self.coordinate);
        chunk.advance_status(ChunkStatus::LOADED);

        Ok(Box::new(StructureGenerationTaskResult {
            coordinate: self.coordinate,
            placed,
        }))
    }

    fn describe(&self) -> String {
        format!("chunk {:?}", self.coordinate)
    }
}

pub struct StructureGenerationTaskResult {
    coordinate: ChunkCoordinate,
    placed: usize,
}

impl TaskResult for StructureGenerationTaskResult {
    fn handle_result(self: Box<Self>, _context: &mut ResultContext<'_>) {
        if self.placed > 0 {
            trace!("Chunk {:?} grew {} structure(s)", self.coordinate, self.placed);
        }
    }
}
