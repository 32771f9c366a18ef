//! # Chunk Loader
//!
//! The orchestrator of the chunk pipeline. Every tick it scans the chunks around
//! a focal point, nearest first, and hands each one to the next stage its status
//! and its neighbours allow. It never waits: a chunk whose neighbours are not
//! ready is skipped and looked at again on the next scan.
//!
//! ## Stages
//!
//! | Status             | Next step                                   | Runs on            |
//! |--------------------|---------------------------------------------|--------------------|
//! | `NONE`             | terrain generation or load from disk        | terrain pool       |
//! | `WAIT_NEIGHBORS`   | structure placement                         | structure thread   |
//! | `LOADED`           | skylight                                    | lighting thread    |
//! | `LIGHTS_GENERATED` | mesh generation (or relight when spoiled)   | mesh pool          |
//! | `PREPARED`         | model upload                                | main thread        |
//! | `FINAL`            | relight when spoiled, remesh when stale     | lighting, meshing  |
//!
//! Stages other than model upload advance the chunk's status from their worker
//! thread once their output is published.
//!
//! Structures and lighting wait for every neighbour to reach the chunk's own
//! status. Meshing only waits for neighbours to match the urgency of `LOADED`,
//! so it may read a neighbour's light before that neighbour is lit; the
//! neighbour's lighting result then remeshes the chunk.

use std::{collections::HashSet, sync::Arc};

use cgmath::{Point3, Vector3};
use log::{debug, trace};

use crate::{
    config::PipelineConfig,
    engine_state::{
        rendering::{model_loader::ModelLoader, tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask},
        task_management::{task::ResultContext, TaskManager},
    },
};

use super::{
    chunk::{Chunk, ChunkCoordinate, ChunkStatus},
    serializer::ChunkSerializer,
    tasks::{
        light_map_generation_task::LightMapGenerationTask,
        structure_generation_task::StructureGenerationTask,
        terrain_generation_task::TerrainGenerationTask,
    },
    terrain::TerrainGenerator,
    world::ChunkRegistry,
};

/// Offsets of a cube of the given radius, ordered by shell: the centre first,
/// then every offset at Chebyshev distance 1, then 2, and so on.
pub fn scan_order(radius: i32) -> Vec<Vector3<i32>> {
    let radius = radius.max(0);
    let mut offsets = Vec::with_capacity(((2 * radius + 1) as usize).pow(3));

    for shell in 0..=radius {
        for x in -shell..=shell {
            for y in -shell..=shell {
                for z in -shell..=shell {
                    if x.abs().max(y.abs()).max(z.abs()) == shell {
                        offsets.push(Vector3::new(x, y, z));
                    }
                }
            }
        }
    }

    offsets
}

/// Drives chunks through the pipeline and owns the stage workers.
pub struct ChunkLoader {
    chunks: Arc<ChunkRegistry>,
    generator: Arc<TerrainGenerator>,
    terrain: TaskManager,
    structures: TaskManager,
    lighting: TaskManager,
    meshing: TaskManager,
    /// Chunks with a relight queued or running
    relighting: HashSet<ChunkCoordinate>,
    /// Chunks whose in-flight mesh missed a light update
    stale_meshes: HashSet<ChunkCoordinate>,
    scan_order: Vec<Vector3<i32>>,
    generate_structures: bool,
}

impl ChunkLoader {
    /// Creates the loader and starts its worker threads.
    ///
    /// Terrain and mesh generation get `config.worker_threads` workers each;
    /// structures and lighting get exactly one.
    pub fn new(config: &PipelineConfig, chunks: Arc<ChunkRegistry>, generator: Arc<TerrainGenerator>) -> Self {
        let workers = config.worker_threads.max(1);

        ChunkLoader {
            chunks,
            generator,
            terrain: TaskManager::new("terrain", workers, config.max_tasks_in_flight),
            structures: TaskManager::new("structures", 1, 1),
            lighting: TaskManager::new("lighting", 1, 1),
            meshing: TaskManager::new("meshing", workers, config.max_tasks_in_flight),
            relighting: HashSet::new(),
            stale_meshes: HashSet::new(),
            scan_order: scan_order(config.load_radius),
            generate_structures: config.generate_structures,
        }
    }

    pub fn generator(&self) -> &Arc<TerrainGenerator> {
        &self.generator
    }

    /// `true` while a relight of the chunk is queued or running.
    pub fn is_relighting(&self, coordinate: ChunkCoordinate) -> bool {
        self.relighting.contains(&coordinate)
    }

    /// Scans the load cube around `focal` and dispatches every chunk that can
    /// move on.
    ///
    /// # Arguments
    /// * `focal` - World position the load cube is centred on
    /// * `model_loader` - Receives chunks whose mesh is ready
    /// * `serializer` - When present, chunks with a save file are loaded instead of generated
    ///
    /// # Returns
    /// The number of chunks handed to a stage
    pub fn advance(
        &mut self,
        focal: Point3<f32>,
        model_loader: &mut ModelLoader,
        mut serializer: Option<&mut ChunkSerializer>,
    ) -> usize {
        let center = ChunkCoordinate::from_world_position(focal);
        let mut dispatched = 0;

        for index in 0..self.scan_order.len() {
            let coordinate = center.offset(self.scan_order[index]);
            if self.dispatch(coordinate, model_loader, serializer.as_deref_mut()) {
                dispatched += 1;
            }
        }

        if dispatched > 0 {
            trace!("Dispatched {} chunk(s) around {:?}", dispatched, center);
        }
        dispatched
    }

    fn dispatch(
        &mut self,
        coordinate: ChunkCoordinate,
        model_loader: &mut ModelLoader,
        serializer: Option<&mut ChunkSerializer>,
    ) -> bool {
        let chunk = self.chunks.get_or_create(coordinate);

        match chunk.status() {
            ChunkStatus::NONE => {
                chunk.advance_status(ChunkStatus::TERRAIN_GENERATING);
                match serializer {
                    Some(serializer) => {
                        if serializer.has_saved(coordinate) {
                            serializer.deserialize(chunk, self.generator.clone());
                        } else {
                            self.generate_terrain(chunk);
                        }
                    }
                    None => self.generate_terrain(chunk),
                }
                true
            }
            ChunkStatus::WAIT_NEIGHBORS => {
                if !self.chunks.neighbors_urgent(coordinate, ChunkStatus::WAIT_NEIGHBORS) {
                    return false;
                }
                if self.generate_structures {
                    chunk.advance_status(ChunkStatus::STRUCTURE_GENERATING);
                    self.structures.publish_task(Box::new(StructureGenerationTask::new(
                        self.chunks.clone(),
                        self.generator.clone(),
                        coordinate,
                    )));
                } else {
                    chunk.advance_status(ChunkStatus::LOADED);
                }
                true
            }
            ChunkStatus::LOADED => {
                if !self.chunks.neighbors_reached(coordinate, ChunkStatus::LOADED) {
                    return false;
                }
                chunk.advance_status(ChunkStatus::LIGHT_GENERATING);
                self.lighting
                    .publish_task(Box::new(LightMapGenerationTask::new(self.chunks.clone(), coordinate)));
                true
            }
            ChunkStatus::LIGHTS_GENERATED => {
                if self.relight_if_spoiled(&chunk) {
                    return true;
                }
                if self.relighting.contains(&coordinate)
                    || !self.chunks.neighbors_urgent(coordinate, ChunkStatus::LOADED)
                {
                    return false;
                }
                chunk.advance_status(ChunkStatus::MESH_GENERATING);
                self.meshing
                    .publish_task(Box::new(ChunkMeshGenerationTask::new(self.chunks.clone(), coordinate)));
                true
            }
            ChunkStatus::PREPARED => {
                chunk.advance_status(ChunkStatus::MESH_LOADING);
                model_loader.enqueue(coordinate);
                true
            }
            ChunkStatus::FINAL => {
                if self.relight_if_spoiled(&chunk) {
                    return true;
                }
                if !self.stale_meshes.remove(&coordinate) {
                    return false;
                }
                trace!("Remeshing stale chunk {:?}", coordinate);
                self.meshing
                    .publish_task(Box::new(ChunkMeshGenerationTask::new(self.chunks.clone(), coordinate)));
                true
            }
            _ => false,
        }
    }

    fn generate_terrain(&mut self, chunk: Arc<Chunk>) {
        self.terrain
            .publish_task(Box::new(TerrainGenerationTask::new(self.generator.clone(), chunk)));
    }

    /// Queues a relight for a spoiled chunk, at most one per chunk at a time.
    ///
    /// A chunk spoiled again while its relight is in flight keeps the flag and is
    /// picked up by a scan after the relight finishes.
    fn relight_if_spoiled(&mut self, chunk: &Arc<Chunk>) -> bool {
        let coordinate = chunk.coordinate();
        if self.relighting.contains(&coordinate) || !chunk.take_spoiled() {
            return false;
        }

        debug!("Relighting spoiled chunk {:?}", coordinate);
        self.relighting.insert(coordinate);
        self.lighting
            .publish_task(Box::new(LightMapGenerationTask::new(self.chunks.clone(), coordinate)));
        true
    }

    /// Applies every finished stage result, then queues the remeshes those
    /// results asked for.
    ///
    /// # Returns
    /// The number of results applied
    pub fn process_completed(
        &mut self,
        model_loader: &mut ModelLoader,
        serializer: Option<&mut ChunkSerializer>,
    ) -> usize {
        let mut context = ResultContext::new(
            &self.chunks,
            self.chunks.components(),
            model_loader,
            &mut self.relighting,
        );

        let mut completed = self.terrain.process_completed_tasks(&mut context)
            + self.structures.process_completed_tasks(&mut context)
            + self.lighting.process_completed_tasks(&mut context)
            + self.meshing.process_completed_tasks(&mut context);
        if let Some(serializer) = serializer {
            completed += serializer.process_completed(&mut context);
        }

        let remesh = std::mem::take(&mut context.remesh);
        self.stale_meshes.extend(context.stale_meshes.drain(..));
        for coordinate in remesh {
            trace!("Remeshing {:?}", coordinate);
            self.meshing
                .publish_task(Box::new(ChunkMeshGenerationTask::new(self.chunks.clone(), coordinate)));
        }

        completed
    }

    /// Resident chunks farther than `radius` from `focal` that no stage is
    /// working on.
    pub fn unload_candidates(&self, focal: Point3<f32>, radius: i32) -> Vec<ChunkCoordinate> {
        let center = ChunkCoordinate::from_world_position(focal);

        self.chunks
            .coordinates()
            .into_iter()
            .filter(|coordinate| coordinate.chebyshev_distance(&center) > radius)
            .filter(|coordinate| !self.relighting.contains(coordinate))
            .filter(|coordinate| !self.stale_meshes.contains(coordinate))
            .filter(|coordinate| !self.chunks.status_of(*coordinate).is_in_flight())
            .collect()
    }

    /// Stage tasks queued or running.
    pub fn pending(&self) -> usize {
        self.terrain.pending() + self.structures.pending() + self.lighting.pending() + self.meshing.pending()
    }

    /// Lets every published task finish and stops all stage workers.
    pub fn shutdown(&mut self) {
        self.terrain.shutdown();
        self.structures.shutdown();
        self.lighting.shutdown();
        self.meshing.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::ComponentRegistry,
        engine_state::{rendering::model_loader::HeadlessUploader, voxels::chunk::ChunkBlocks},
    };
    use std::time::{Duration, Instant};

    fn loader_with(chunks: Arc<ChunkRegistry>) -> ChunkLoader {
        let config = PipelineConfig {
            load_radius: 1,
            worker_threads: 1,
            ..PipelineConfig::default()
        };
        ChunkLoader::new(&config, chunks, Arc::new(TerrainGenerator::new(3)))
    }

    fn drain(loader: &mut ChunkLoader, model_loader: &mut ModelLoader) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while loader.pending() > 0 && Instant::now() < deadline {
            loader.process_completed(model_loader, None);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(loader.pending(), 0);
    }

    #[test]
    fn spoiled_final_chunks_relight_one_at_a_time() {
        let chunks = Arc::new(ChunkRegistry::new(Arc::new(ComponentRegistry::new())));
        let coordinate = ChunkCoordinate::new(0, 2, 0);
        let chunk = chunks.get_or_create(coordinate);
        chunk.publish_blocks(ChunkBlocks::Air);
        chunk.advance_status(ChunkStatus::FINAL);

        let mut loader = loader_with(chunks.clone());
        let uploader = HeadlessUploader::default();
        let mut model_loader = ModelLoader::new(Box::new(uploader.clone()));

        chunk.mark_spoiled();
        assert!(loader.relight_if_spoiled(&chunk));
        assert!(loader.is_relighting(coordinate));
        assert!(!chunk.is_spoiled());

        // Spoiled again while queued: no second relight, the flag is kept.
        chunk.mark_spoiled();
        assert!(!loader.relight_if_spoiled(&chunk));
        assert!(chunk.is_spoiled());

        drain(&mut loader, &mut model_loader);
        assert!(!loader.is_relighting(coordinate));
        assert_eq!(chunk.status(), ChunkStatus::FINAL);

        // The relight changed the light, so the chunk was remeshed and re-uploaded.
        let uploaded = model_loader.flush_up_to(usize::MAX, &chunks, chunks.components());
        assert_eq!(uploaded, 1);
        assert_eq!(uploader.upload_count(), 1);
        assert_eq!(chunk.status(), ChunkStatus::FINAL);

        assert!(loader.relight_if_spoiled(&chunk));
        drain(&mut loader, &mut model_loader);
        assert!(!loader.is_relighting(coordinate));
    }

    #[test]
    fn scan_order_visits_nearer_shells_first() {
        let order = scan_order(2);
        assert_eq!(order.len(), 125);
        assert_eq!(order[0], Vector3::new(0, 0, 0));

        let shells: Vec<i32> = order
            .iter()
            .map(|o| o.x.abs().max(o.y.abs()).max(o.z.abs()))
            .collect();
        assert!(shells.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(shells.iter().filter(|&&shell| shell == 1).count(), 26);
    }

    #[test]
    fn negative_radius_scans_only_the_focal_chunk() {
        assert_eq!(scan_order(-3), vec![Vector3::new(0, 0, 0)]);
    }
}
