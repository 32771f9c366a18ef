//! Task for generating mesh data for chunks in a background thread.
//!
//! This module contains the `ChunkMeshGenerationTask` which builds the vertex
//! and index data for one chunk on the mesh worker pool. The mesh is attached
//! to the chunk's entity; uploading it is left to the main thread.

use std::sync::Arc;

use log::trace;

use crate::{
    engine_state::{
        rendering::meshing::generate_chunk_mesh,
        task_management::task::{ResultContext, Task, TaskResult},
        voxels::{
            chunk::{ChunkCoordinate, ChunkStatus},
            world::ChunkRegistry,
        },
    },
    error::{PipelineError, Result},
};

/// A task that generates mesh data for a chunk in a background thread.
///
/// This task is responsible for:
/// 1. Building the chunk's mesh from its blocks, its light and its face neighbours
/// 2. Attaching the mesh to the chunk entity as a `ChunkMesh` component
/// 3. Moving a first-time chunk from `MESH_GENERATING` to `PREPARED`
///
/// Remeshes of `FINAL` chunks keep their status; the result queues the new mesh
/// for upload directly.
pub struct ChunkMeshGenerationTask {
    /// Registry used to reach the chunk and its neighbours
    chunks: Arc<ChunkRegistry>,
    /// The chunk that needs mesh generation
    coordinate: ChunkCoordinate,
}

impl ChunkMeshGenerationTask {
    /// Creates a new chunk mesh generation task.
    ///
    /// # Arguments
    /// * `chunks` - The shared chunk registry
    /// * `coordinate` - The chunk that needs mesh generation
    pub fn new(chunks: Arc<ChunkRegistry>, coordinate: ChunkCoordinate) -> Self {
        ChunkMeshGenerationTask { chunks, coordinate }
    }
}

impl Task for ChunkMeshGenerationTask {
    /// Processes the mesh generation task on a mesh worker.
    ///
    /// # Returns
    /// A boxed `TaskResult` telling the main thread how many faces were built
    fn process(&self) -> Result<Box<dyn TaskResult>> {
        let chunk = self
            .chunks
            .get(self.coordinate)
            .ok_or(PipelineError::ChunkMissing(self.coordinate))?;

        let mesh = generate_chunk_mesh(&self.chunks, self.coordinate)?;
        let faces = mesh.face_count();

        self.chunks.components().add_component(chunk.entity(), mesh);
        if chunk.status() == ChunkStatus::MESH_GENERATING {
            chunk.advance_status(ChunkStatus::PREPARED);
        }

        Ok(Box::new(ChunkMeshGenerationTaskResult {
            coordinate: self.coordinate,
            faces,
        }))
    }

    fn describe(&self) -> String {
        format!("chunk {:?}", self.coordinate)
    }
}

/// The result of a chunk mesh generation task.
pub struct ChunkMeshGenerationTaskResult {
    coordinate: ChunkCoordinate,
    faces: usize,
}

impl TaskResult for ChunkMeshGenerationTaskResult {
    /// Handles the result of the mesh generation task on the main thread.
    ///
    /// First-time meshes are picked up by the orchestrator once it sees
    /// `PREPARED`. A rebuilt mesh for a `FINAL` chunk replaces the live model,
    /// so it goes straight into the upload queue.
    fn handle_result(self: Box<Self>, context: &mut ResultContext<'_>) {
        trace!("Meshed {:?} with {} faces", self.coordinate, self.faces);

        if context.chunks.status_of(self.coordinate) == ChunkStatus::FINAL {
            context.model_loader.enqueue(self.coordinate);
        }
    }
}
