//! # Light Map Generation Task
//!
//! Runs skylight propagation for one chunk on the single lighting thread, for
//! both first-time lighting and relighting of spoiled chunks.

use std::sync::Arc;

use log::debug;

use crate::{
    engine_state::{
        task_management::task::{ResultContext, Task, TaskResult},
        voxels::{
            block::BlockSide,
            chunk::{ChunkCoordinate, ChunkStatus},
            lighting::{light_chunk, LightingOutcome},
            world::ChunkRegistry,
        },
    },
    error::{PipelineError, Result},
};

/// Lights one chunk and moves it to `LIGHTS_GENERATED`.
///
/// The status is advanced here on the lighting thread rather than in the
/// result handler: the next lighting run must already see this chunk as lit
/// when it decides whether to read its light or spoil it.
pub struct LightMapGenerationTask {
    chunks: Arc<ChunkRegistry>,
    coordinate: ChunkCoordinate,
}

impl LightMapGenerationTask {
    pub fn new(chunks: Arc<ChunkRegistry>, coordinate: ChunkCoordinate) -> Self {
        LightMapGenerationTask { chunks, coordinate }
    }
}

/// Releases the relight reservation of a lighting run that failed.
struct LightMapGenerationFailed {
    coordinate: ChunkCoordinate,
}

impl TaskResult for LightMapGenerationFailed {
    fn handle_result(self: Box<Self>, context: &mut ResultContext<'_>) {
        context.relighting.remove(&self.coordinate);
    }
}

impl Task for LightMapGenerationTask {
    fn process(&self) -> Result<Box<dyn TaskResult>> {
        let chunk = self
            .chunks
            .get(self.coordinate)
            .ok_or(PipelineError::ChunkMissing(self.coordinate))?;

        let outcome = light_chunk(&self.chunks, self.coordinate)?;
        chunk.advance_status(ChunkStatus::LIGHTS_GENERATED);

        Ok(Box::new(LightMapGenerationTaskResult {
            coordinate: self.coordinate,
            outcome,
        }))
    }

    fn describe(&self) -> String {
        format!("chunk {:?}", self.coordinate)
    }

    fn on_failure(&self) -> Option<Box<dyn TaskResult>> {
        Some(Box::new(LightMapGenerationFailed {
            coordinate: self.coordinate,
        }))
    }
}

pub struct LightMapGenerationTaskResult {
    coordinate: ChunkCoordinate,
    outcome: LightingOutcome,
}

impl TaskResult for LightMapGenerationTaskResult {
    /// Clears the relight bookkeeping and requests new meshes for chunks whose
    /// faces may now be lit differently: the chunk itself and its six face
    /// neighbours. Visible chunks are remeshed now; chunks with a mesh in flight
    /// are marked stale and remeshed once they are visible.
    ///
    /// Meshing only waits for neighbours to hold blocks, so this is also what
    /// repairs boundary shading computed before a neighbour was lit.
    fn handle_result(self: Box<Self>, context: &mut ResultContext<'_>) {
        context.relighting.remove(&self.coordinate);

        if !self.outcome.spoiled.is_empty() {
            debug!(
                "Lighting {:?} spoiled {:?}",
                self.coordinate, self.outcome.spoiled
            );
        }
        if self.outcome.updated.is_empty() {
            return;
        }

        let affected = std::iter::once(self.coordinate).chain(
            BlockSide::all()
                .into_iter()
                .map(|side| self.coordinate.offset(side.offset())),
        );
        for coordinate in affected {
            match context.chunks.status_of(coordinate) {
                ChunkStatus::FINAL => {
                    if !context.remesh.contains(&coordinate) {
                        context.remesh.push(coordinate);
                    }
                }
                ChunkStatus::MESH_GENERATING | ChunkStatus::PREPARED | ChunkStatus::MESH_LOADING => {
                    context.stale_meshes.push(coordinate);
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::ComponentRegistry,
        engine_state::{
            rendering::model_loader::{HeadlessUploader, ModelLoader},
            task_management::TaskManager,
        },
    };
    use std::{
        collections::HashSet,
        time::{Duration, Instant},
    };

    #[test]
    fn a_failed_relight_releases_its_reservation() {
        let chunks = Arc::new(ChunkRegistry::new(Arc::new(ComponentRegistry::new())));
        let coordinate = ChunkCoordinate::new(3, 0, -3);
        let mut relighting = HashSet::from([coordinate]);
        let mut loader = ModelLoader::new(Box::new(HeadlessUploader::default()));

        // The chunk was unloaded before the relight ran.
        let mut lighting = TaskManager::new("lighting", 1, 1);
        lighting.publish_task(Box::new(LightMapGenerationTask::new(chunks.clone(), coordinate)));

        let deadline = Instant::now() + Duration::from_secs(10);
        while lighting.pending() > 0 && Instant::now() < deadline {
            let mut context = ResultContext::new(&chunks, chunks.components(), &mut loader, &mut relighting);
            assert_eq!(lighting.process_completed_tasks(&mut context), 0);
            std::thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(lighting.pending(), 0);
        assert!(relighting.is_empty());
    }

    #[test]
    fn new_light_remeshes_visible_neighbours_and_marks_in_flight_meshes_stale() {
        let chunks = ChunkRegistry::new(Arc::new(ComponentRegistry::new()));
        let lit = ChunkCoordinate::new(0, 0, 0);
        let visible = ChunkCoordinate::new(1, 0, 0);
        let meshing = ChunkCoordinate::new(0, 0, 1);
        let waiting = ChunkCoordinate::new(0, 1, 0);
        chunks.get_or_create(lit).advance_status(ChunkStatus::LIGHTS_GENERATED);
        chunks.get_or_create(visible).advance_status(ChunkStatus::FINAL);
        chunks.get_or_create(meshing).advance_status(ChunkStatus::MESH_GENERATING);
        chunks.get_or_create(waiting).advance_status(ChunkStatus::LOADED);

        let mut relighting = HashSet::from([lit]);
        let mut loader = ModelLoader::new(Box::new(HeadlessUploader::default()));
        let mut context = ResultContext::new(&chunks, chunks.components(), &mut loader, &mut relighting);
        Box::new(LightMapGenerationTaskResult {
            coordinate: lit,
            outcome: LightingOutcome {
                updated: vec![lit],
                spoiled: Vec::new(),
            },
        })
        .handle_result(&mut context);

        assert_eq!(context.remesh, vec![visible]);
        assert_eq!(context.stale_meshes, vec![meshing]);
        drop(context);
        assert!(relighting.is_empty());
    }
}
