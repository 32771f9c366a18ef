//! # Engine State Module
//!
//! The core engine module that owns the state of a streaming voxel world.
//!
//! ## Key Components
//!
//! * `WorldContext` - The main state container: chunk registry, stage workers,
//!   model loader and serializer
//! * `rendering` - Mesh generation and the main-thread model loader
//! * `task_management` - Worker pools and the task traits stages implement
//! * `voxels` - Voxel data, chunks, world generation, lighting and persistence
//!
//! ## Architecture
//!
//! Nothing in the pipeline is global. A `WorldContext` is built from a
//! [`PipelineConfig`] and hands every stage the shared pieces it needs, so any
//! number of independent worlds (one per test, for instance) can coexist.
//! Dropping the context drains and stops every worker.
//!
//! ## Per-tick Work
//!
//! [`WorldContext::tick`] is meant to be called once per frame from the thread
//! that owns the context:
//!
//! 1. Finished stage results are applied
//! 2. The chunk loader dispatches every chunk that can move on
//! 3. A bounded number of meshes are uploaded
//! 4. Chunks beyond the unload radius are saved and evicted

use std::{sync::Arc, thread, time::Duration};

use cgmath::Point3;
use log::{error, info};

use rendering::model_loader::{HeadlessUploader, ModelLoader, ModelUploader};
use voxels::{
    block::BlockType,
    chunk::{Chunk, ChunkCoordinate},
    chunk_loader::ChunkLoader,
    entities::EntityKinds,
    serializer::ChunkSerializer,
    terrain::TerrainGenerator,
    world::ChunkRegistry,
};

use crate::{config::PipelineConfig, core::ComponentRegistry, error::Result};

pub mod rendering;
pub mod task_management;
pub mod voxels;

/// The state of one streaming world.
///
/// # Examples
///
/// ```no_run
/// use cgmath::Point3;
/// use voxel_streaming::{config::PipelineConfig, WorldContext};
///
/// let mut world = WorldContext::new(PipelineConfig::default()).unwrap();
/// let player = Point3::new(0.0, 20.0, 0.0);
///
/// // Main loop
/// loop {
///     world.tick(player);
///     let _ground = world.block_at(Point3::new(0.0, 0.0, 0.0));
/// #   break;
/// }
/// ```
pub struct WorldContext {
    config: PipelineConfig,
    components: Arc<ComponentRegistry>,
    chunks: Arc<ChunkRegistry>,
    loader: ChunkLoader,
    model_loader: ModelLoader,
    serializer: Option<ChunkSerializer>,
}

impl WorldContext {
    /// Creates a world with the climate-driven terrain generator and an
    /// in-memory model uploader.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let generator = Arc::new(TerrainGenerator::new(config.seed));
        Self::with_parts(config, generator, Box::new(HeadlessUploader::default()))
    }

    /// Creates a world from explicit collaborators.
    ///
    /// # Arguments
    /// * `config` - Pipeline tunables
    /// * `generator` - Terrain generator shared by the terrain workers
    /// * `uploader` - Graphics backend receiving finished meshes
    ///
    /// # Errors
    /// Fails when the save directory cannot be created. A world file that cannot
    /// be read is logged and skipped.
    pub fn with_parts(
        config: PipelineConfig,
        generator: Arc<TerrainGenerator>,
        uploader: Box<dyn ModelUploader>,
    ) -> Result<Self> {
        let components = Arc::new(ComponentRegistry::new());
        let chunks = Arc::new(ChunkRegistry::new(components.clone()));
        let kinds = Arc::new(EntityKinds::with_builtin());

        let serializer = match &config.save_directory {
            Some(directory) => {
                let serializer = ChunkSerializer::new(directory.clone(), components.clone(), kinds)?;
                if let Err(e) = serializer.load_world() {
                    error!("Failed to load world entities: {}", e);
                }
                Some(serializer)
            }
            None => None,
        };

        let loader = ChunkLoader::new(&config, chunks.clone(), generator);
        info!(
            "World ready (seed {}, load radius {}, persistence {})",
            config.seed,
            config.load_radius,
            if serializer.is_some() { "on" } else { "off" }
        );

        Ok(WorldContext {
            config,
            components,
            chunks,
            loader,
            model_loader: ModelLoader::new(uploader),
            serializer,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The registry of every resident chunk.
    pub fn chunks(&self) -> &Arc<ChunkRegistry> {
        &self.chunks
    }

    /// Component storage shared with gameplay code.
    pub fn components(&self) -> &Arc<ComponentRegistry> {
        &self.components
    }

    /// Runs one frame of pipeline work around `focal`.
    ///
    /// # Returns
    /// The number of chunks that moved to a new stage: dispatched by the loader
    /// or uploaded by the model loader.
    pub fn tick(&mut self, focal: Point3<f32>) -> usize {
        self.loader
            .process_completed(&mut self.model_loader, self.serializer.as_mut());

        let dispatched = self
            .loader
            .advance(focal, &mut self.model_loader, self.serializer.as_mut());
        let uploaded = self.model_loader.flush_up_to(
            self.config.model_uploads_per_tick,
            &self.chunks,
            &self.components,
        );

        if let Some(radius) = self.config.unload_radius {
            // Never unload inside the loaded cube or its neighbour ring.
            let radius = radius.max(self.config.load_radius + 1);
            for coordinate in self.loader.unload_candidates(focal, radius) {
                if let Err(e) = self.unload_chunk(coordinate) {
                    error!("Failed to unload chunk {:?}: {}", coordinate, e);
                }
            }
        }

        dispatched + uploaded
    }

    /// Ticks until nothing is dispatched, uploaded or pending, or until
    /// `max_ticks` have run.
    ///
    /// # Returns
    /// `true` if the world settled
    pub fn settle(&mut self, focal: Point3<f32>, max_ticks: usize) -> bool {
        for _ in 0..max_ticks {
            let progressed = self.tick(focal);
            if progressed == 0 && self.pending() == 0 {
                return true;
            }
            if progressed == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        }
        false
    }

    /// The block containing a world position, `INVALID` when its chunk has no
    /// terrain yet.
    pub fn block_at(&self, position: Point3<f32>) -> BlockType {
        self.chunks.block_at_world(position)
    }

    /// `true` while a relight of the chunk is queued or running.
    pub fn is_relighting(&self, coordinate: ChunkCoordinate) -> bool {
        self.loader.is_relighting(coordinate)
    }

    /// The resident chunk at a chunk coordinate.
    pub fn chunk_at(&self, coordinate: ChunkCoordinate) -> Option<Arc<Chunk>> {
        self.chunks.get(coordinate)
    }

    /// Saves a chunk and evicts it from the registry.
    ///
    /// With persistence on, the chunk leaves the registry once its file is
    /// written; without it, or for a chunk that never got terrain, it is evicted
    /// immediately. Chunks that a stage is still working on are left alone.
    ///
    /// # Returns
    /// `true` if the chunk was evicted or its save was queued
    pub fn unload_chunk(&mut self, coordinate: ChunkCoordinate) -> Result<bool> {
        let Some(chunk) = self.chunks.get(coordinate) else {
            return Ok(false);
        };
        let status = chunk.status();
        if status.is_in_flight() || self.loader.is_relighting(coordinate) {
            return Ok(false);
        }

        match self.serializer.as_mut() {
            Some(serializer) if status.has_blocks() => serializer.serialize(chunk),
            _ => {
                self.model_loader
                    .remove_model(coordinate, &self.chunks, &self.components);
                self.components.remove_entity(chunk.entity());
                self.chunks.remove(coordinate);
                Ok(true)
            }
        }
    }

    /// Writes every persistent entity to the world file. Returns `0` when
    /// persistence is off.
    pub fn save_world(&self) -> Result<usize> {
        match &self.serializer {
            Some(serializer) => serializer.save_world(),
            None => Ok(0),
        }
    }

    /// Tasks queued or running in any stage, plus meshes waiting for upload.
    pub fn pending(&self) -> usize {
        self.loader.pending()
            + self.model_loader.queued()
            + self.serializer.as_ref().map_or(0, ChunkSerializer::pending)
    }

    /// Lets every published task finish and stops all workers. Queued saves are
    /// written before this returns.
    pub fn shutdown(&mut self) {
        self.loader.shutdown();
        if let Some(serializer) = self.serializer.as_mut() {
            serializer.shutdown();
        }
    }
}

impl Drop for WorldContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
