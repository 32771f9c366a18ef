//! # Chunk Serializer
//!
//! Saves chunks (blocks plus the entities standing in them) to one file per
//! chunk and loads them back, on a single background thread so that writes and
//! reads of the same chunk happen in submission order.
//!
//! ## File layout
//!
//! `chunk_{x}_{y}_{z}.dat`, big-endian:
//!
//! ```text
//! [u8 is_air][4096 x u8 blocks][entity record]...
//! ```
//!
//! An all-air chunk writes a zeroed block array and sets `is_air`; loading it
//! restores the compact representation without reading the array back in.
//!
//! Chunk files are written to a `.tmp` sibling and renamed into place, so an
//! interrupted write never replaces a good save.
//!
//! `world.dat` holds entity records only, for entities not saved with a chunk.

use std::{
    fs,
    io::{BufWriter, Write},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::DashSet;
use log::{debug, error, info};
use lru::LruCache;

use crate::{
    core::{ComponentRegistry, EntityId, MtResource},
    engine_state::task_management::{
        task::{ResultContext, Task, TaskResult},
        TaskManager,
    },
    error::{PipelineError, Result},
};

use super::{
    block::BlockTypeSize,
    chunk::{Chunk, ChunkBlocks, ChunkCoordinate, ChunkStatus, CHUNK_SIZE},
    entities::{entities_in_chunk, persistent_entities, EntityKinds},
    terrain::TerrainGenerator,
};

/// Name of the file holding entities that are not bound to a chunk.
pub const WORLD_FILE: &str = "world.dat";

/// Number of chunk coordinates whose file existence is remembered.
const SAVED_CACHE_CAPACITY: usize = 4096;

/// Encodes a chunk file: air flag, block bytes, then pre-encoded entity records.
pub fn encode_chunk(blocks: &ChunkBlocks, entity_records: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + CHUNK_SIZE as usize + entity_records.len());
    bytes.push(blocks.is_air() as u8);
    bytes.extend_from_slice(&blocks.to_bytes());
    bytes.extend_from_slice(entity_records);
    bytes
}

/// Decodes the block section of a chunk file.
///
/// # Returns
/// The blocks and the remaining bytes, which hold entity records.
pub fn decode_chunk<'a>(bytes: &'a [u8], path: &Path) -> Result<(ChunkBlocks, &'a [u8])> {
    let block_bytes = CHUNK_SIZE as usize;
    if bytes.len() < 1 + block_bytes {
        return Err(PipelineError::CorruptChunkFile {
            path: path.to_path_buf(),
            reason: format!("expected at least {} bytes, found {}", 1 + block_bytes, bytes.len()),
        });
    }

    let is_air = match bytes[0] {
        0 => false,
        1 => true,
        other => {
            return Err(PipelineError::CorruptChunkFile {
                path: path.to_path_buf(),
                reason: format!("invalid air flag {other}"),
            })
        }
    };

    let blocks = if is_air {
        ChunkBlocks::Air
    } else {
        let dense: Box<[BlockTypeSize]> = bytes[1..=block_bytes].into();
        ChunkBlocks::Dense(dense)
    };

    Ok((blocks, &bytes[1 + block_bytes..]))
}

/// Background persistence for chunks and free-standing entities.
pub struct ChunkSerializer {
    directory: PathBuf,
    components: Arc<ComponentRegistry>,
    kinds: Arc<EntityKinds>,
    /// Shared with save tasks, which record a file only once it is written
    saved: MtResource<LruCache<ChunkCoordinate, bool>>,
    /// Chunks with a save queued or running
    saving: Arc<DashSet<ChunkCoordinate>>,
    tasks: TaskManager,
}

impl ChunkSerializer {
    /// Creates a serializer writing into `directory`, creating it if needed.
    ///
    /// # Arguments
    /// * `directory` - Directory holding chunk files and the world file
    /// * `components` - Registry persisted entities are read from and created in
    /// * `kinds` - Codec table for entity records
    pub fn new(
        directory: impl Into<PathBuf>,
        components: Arc<ComponentRegistry>,
        kinds: Arc<EntityKinds>,
    ) -> Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        info!("Chunk serializer writing to {:?}", directory);

        Ok(ChunkSerializer {
            directory,
            components,
            kinds,
            saved: MtResource::new(LruCache::new(
                NonZeroUsize::new(SAVED_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
            saving: Arc::new(DashSet::new()),
            tasks: TaskManager::new("serializer", 1, 1),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of a chunk's save file.
    pub fn chunk_path(&self, coordinate: ChunkCoordinate) -> PathBuf {
        self.directory.join(coordinate.file_name())
    }

    /// `true` if a save file for the chunk exists.
    pub fn has_saved(&self, coordinate: ChunkCoordinate) -> bool {
        let mut saved = self.saved.get_mut();
        if let Some(&exists) = saved.get(&coordinate) {
            return exists;
        }
        let exists = self.chunk_path(coordinate).is_file();
        saved.put(coordinate, exists);
        exists
    }

    /// `true` while a save of the chunk is queued or running.
    pub fn is_saving(&self, coordinate: ChunkCoordinate) -> bool {
        self.saving.contains(&coordinate)
    }

    /// Queues a chunk for saving and eviction.
    ///
    /// Entities standing in the chunk are encoded now. The file is written on
    /// the serializer thread; only then are those entities removed from the live
    /// set and the chunk's status reset to `NONE`. Once the write is confirmed
    /// on the main thread the chunk's model is released and it leaves the
    /// registry, unless the orchestrator has already picked it up again. A
    /// failed write leaves the chunk and its entities loaded.
    ///
    /// # Returns
    /// `false` if a save for this chunk was already queued.
    pub fn serialize(&mut self, chunk: Arc<Chunk>) -> Result<bool> {
        let coordinate = chunk.coordinate();
        if self.saving.contains(&coordinate) {
            return Ok(false);
        }
        let entities = entities_in_chunk(&self.components, coordinate);

        let mut records = Vec::new();
        for &entity in &entities {
            self.kinds.write_entity(&self.components, entity, &mut records)?;
        }

        self.saving.insert(coordinate);
        self.tasks.publish_task(Box::new(SaveChunkTask {
            path: self.chunk_path(coordinate),
            chunk,
            records,
            entities,
            components: self.components.clone(),
            saved: self.saved.clone(),
            saving: self.saving.clone(),
        }));
        Ok(true)
    }

    /// Queues a chunk for loading.
    ///
    /// If the file cannot be read the chunk is generated with `fallback` instead.
    /// Either way the chunk ends at `WAIT_NEIGHBORS`.
    pub fn deserialize(&mut self, chunk: Arc<Chunk>, fallback: Arc<TerrainGenerator>) {
        self.tasks.publish_task(Box::new(LoadChunkTask {
            path: self.chunk_path(chunk.coordinate()),
            chunk,
            components: self.components.clone(),
            kinds: self.kinds.clone(),
            fallback,
        }));
    }

    /// Writes every live persistent entity to the world file.
    ///
    /// # Returns
    /// The number of entities written.
    pub fn save_world(&self) -> Result<usize> {
        let path = self.directory.join(WORLD_FILE);
        let mut writer = BufWriter::new(fs::File::create(&path)?);
        let mut written = 0;
        for entity in persistent_entities(&self.components) {
            if self.kinds.write_entity(&self.components, entity, &mut writer)? {
                written += 1;
            }
        }
        writer.flush()?;
        info!("Saved {} entities to {:?}", written, path);
        Ok(written)
    }

    /// Recreates the entities stored in the world file, if there is one.
    ///
    /// # Returns
    /// The number of entities created.
    pub fn load_world(&self) -> Result<usize> {
        let path = self.directory.join(WORLD_FILE);
        if !path.is_file() {
            return Ok(0);
        }
        let bytes = fs::read(&path)?;
        let created = self.kinds.read_entities(&bytes, &self.components, &path)?;
        info!("Loaded {} entities from {:?}", created.len(), path);
        Ok(created.len())
    }

    /// Applies finished saves and loads. Returns the number completed.
    pub fn process_completed(&mut self, context: &mut ResultContext<'_>) -> usize {
        self.tasks.process_completed_tasks(context)
    }

    /// Saves and loads not yet finished.
    pub fn pending(&self) -> usize {
        self.tasks.pending()
    }

    /// Finishes every queued save and stops the serializer thread.
    pub fn shutdown(&mut self) {
        self.tasks.shutdown();
    }
}

/// Writes one chunk file.
struct SaveChunkTask {
    path: PathBuf,
    chunk: Arc<Chunk>,
    records: Vec<u8>,
    /// Entities encoded into `records`, removed once the file is on disk
    entities: Vec<EntityId>,
    components: Arc<ComponentRegistry>,
    saved: MtResource<LruCache<ChunkCoordinate, bool>>,
    saving: Arc<DashSet<ChunkCoordinate>>,
}

impl SaveChunkTask {
    fn write(&self) -> Result<()> {
        let bytes = encode_chunk(&self.chunk.blocks(), &self.records);
        let staging = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(fs::File::create(&staging)?);
            writer.write_all(&bytes)?;
            writer.flush()?;
        }
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl Task for SaveChunkTask {
    fn process(&self) -> Result<Box<dyn TaskResult>> {
        let coordinate = self.chunk.coordinate();
        let written = self.write();
        if written.is_ok() {
            // Recorded before the reset: a chunk seen at `NONE` must load from disk.
            self.saved.get_mut().put(coordinate, true);
            for &entity in &self.entities {
                self.components.remove_entity(entity);
            }
            self.chunk.reset_status();
        }
        self.saving.remove(&coordinate);
        written?;

        Ok(Box::new(SaveChunkResult {
            chunk: self.chunk.clone(),
            entity_count: self.entities.len(),
        }))
    }

    fn describe(&self) -> String {
        format!("save {:?}", self.chunk.coordinate())
    }
}

struct SaveChunkResult {
    chunk: Arc<Chunk>,
    entity_count: usize,
}

impl TaskResult for SaveChunkResult {
    /// Evicts the saved chunk, unless it is no longer the registered instance
    /// or the orchestrator has restarted it since the save.
    fn handle_result(self: Box<Self>, context: &mut ResultContext<'_>) {
        let coordinate = self.chunk.coordinate();
        debug!("Saved chunk {:?} with {} entities", coordinate, self.entity_count);

        let registered = context
            .chunks
            .get(coordinate)
            .is_some_and(|chunk| Arc::ptr_eq(&chunk, &self.chunk));
        if !registered || self.chunk.status() != ChunkStatus::NONE {
            return;
        }

        context
            .model_loader
            .remove_model(coordinate, context.chunks, context.components);
        context.components.remove_entity(self.chunk.entity());
        context.chunks.remove(coordinate);
        debug!("Unloaded chunk {:?}", coordinate);
    }
}

/// Reads one chunk file, falling back to terrain generation on failure.
struct LoadChunkTask {
    path: PathBuf,
    chunk: Arc<Chunk>,
    components: Arc<ComponentRegistry>,
    kinds: Arc<EntityKinds>,
    fallback: Arc<TerrainGenerator>,
}

impl LoadChunkTask {
    fn load(&self) -> Result<(ChunkBlocks, usize)> {
        let bytes = fs::read(&self.path)?;
        let (blocks, records) = decode_chunk(&bytes, &self.path)?;

        // Entities decoded before a bad record are kept; the rest are lost.
        let entities = match self.kinds.read_entities(records, &self.components, &self.path) {
            Ok(created) => created.len(),
            Err(e) => {
                error!("Chunk {:?}: {}", self.chunk.coordinate(), e);
                0
            }
        };
        Ok((blocks, entities))
    }
}

impl Task for LoadChunkTask {
    fn process(&self) -> Result<Box<dyn TaskResult>> {
        let coordinate = self.chunk.coordinate();
        let from_disk = match self.load() {
            Ok((blocks, entities)) => {
                self.chunk.publish_blocks(blocks);
                debug!("Loaded chunk {:?} with {} entities", coordinate, entities);
                true
            }
            Err(e) => {
                error!("Failed to load chunk {:?}, regenerating: {}", coordinate, e);
                self.chunk.publish_blocks(self.fallback.generate(coordinate));
                false
            }
        };
        self.chunk.advance_status(ChunkStatus::WAIT_NEIGHBORS);

        Ok(Box::new(LoadChunkResult {
            coordinate,
            from_disk,
        }))
    }

    fn describe(&self) -> String {
        format!("load {:?}", self.chunk.coordinate())
    }
}

struct LoadChunkResult {
    coordinate: ChunkCoordinate,
    from_disk: bool,
}

impl TaskResult for LoadChunkResult {
    fn handle_result(self: Box<Self>, _context: &mut ResultContext<'_>) {
        if !self.from_disk {
            debug!("Chunk {:?} was regenerated instead of loaded", self.coordinate);
        }
    }
}
