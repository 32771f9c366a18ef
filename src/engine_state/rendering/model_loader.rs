//! # Model Loader Module
//!
//! This module moves finished chunk meshes into renderer-owned models on the
//! main thread, a bounded number per tick.
//!
//! ## Architecture
//!
//! Mesh tasks leave a [`ChunkMesh`] component on the chunk's entity. Chunks are
//! queued here once their mesh is ready; [`ModelLoader::flush_up_to`] takes the
//! mesh off the entity, hands it to a [`ModelUploader`], attaches the resulting
//! [`ChunkModel`] and [`ChunkTransform`] components and marks the chunk `FINAL`.
//!
//! The uploader is the seam to the graphics backend. [`HeadlessUploader`] keeps
//! uploaded models in memory and is what the pipeline uses when no renderer is
//! attached.
//!
//! ## Performance Considerations
//!
//! * Uploads are capped per tick so a burst of finished meshes never stalls a frame
//! * A chunk queued twice is uploaded once, with whatever mesh is newest

use std::collections::{HashMap, HashSet, VecDeque};

use cgmath::{Matrix4, Vector3};
use log::{debug, warn};

use crate::{
    core::{ComponentRegistry, StResource},
    engine_state::voxels::{
        chunk::{ChunkCoordinate, ChunkStatus},
        world::ChunkRegistry,
    },
};

use super::{meshing::ChunkMesh, meshing::DirectionRange, Vertex};

/// Opaque handle to a model owned by a [`ModelUploader`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelHandle(pub u64);

/// Component attached to a chunk entity once its mesh is resident.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChunkModel {
    pub handle: ModelHandle,
    /// Per-direction draw ranges, indexed by `BlockSide as usize`
    pub ranges: [DirectionRange; 6],
}

/// World transform of a chunk model: a translation to the chunk origin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChunkTransform(pub Matrix4<f32>);

impl ChunkTransform {
    pub fn for_chunk(coordinate: ChunkCoordinate) -> Self {
        let origin = coordinate.origin();
        ChunkTransform(Matrix4::from_translation(Vector3::new(
            origin.x as f32,
            origin.y as f32,
            origin.z as f32,
        )))
    }
}

/// Backend that turns chunk meshes into drawable models.
///
/// Implementations live on the main thread and may own graphics resources.
pub trait ModelUploader {
    /// Uploads `mesh` and returns a handle to the new model.
    fn upload(&mut self, coordinate: ChunkCoordinate, mesh: &ChunkMesh) -> ModelHandle;

    /// Frees a model previously returned by `upload`.
    fn release(&mut self, handle: ModelHandle);
}

/// Bookkeeping kept for each model held by a [`HeadlessUploader`].
#[derive(Clone, Debug, PartialEq)]
pub struct UploadedModel {
    pub coordinate: ChunkCoordinate,
    pub vertex_bytes: usize,
    pub index_count: usize,
}

#[derive(Debug, Default)]
struct HeadlessModels {
    next_handle: u64,
    resident: HashMap<ModelHandle, UploadedModel>,
    uploads: u64,
}

/// In-memory [`ModelUploader`].
///
/// Clones share the same store, so a caller can keep one clone to inspect the
/// models after handing the other to a [`ModelLoader`].
#[derive(Clone)]
pub struct HeadlessUploader {
    models: StResource<HeadlessModels>,
}

impl Default for HeadlessUploader {
    fn default() -> Self {
        HeadlessUploader {
            models: StResource::new(HeadlessModels::default()),
        }
    }
}

impl HeadlessUploader {
    /// Number of models currently resident.
    pub fn resident_count(&self) -> usize {
        self.models.get().resident.len()
    }

    /// Total uploads performed, including replaced models.
    pub fn upload_count(&self) -> u64 {
        self.models.get().uploads
    }

    /// The resident model for a chunk, if any.
    pub fn model_for(&self, coordinate: ChunkCoordinate) -> Option<UploadedModel> {
        self.models
            .get()
            .resident
            .values()
            .find(|model| model.coordinate == coordinate)
            .cloned()
    }
}

impl ModelUploader for HeadlessUploader {
    fn upload(&mut self, coordinate: ChunkCoordinate, mesh: &ChunkMesh) -> ModelHandle {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
        let mut models = self.models.get_mut();

        models.next_handle += 1;
        models.uploads += 1;
        let handle = ModelHandle(models.next_handle);
        models.resident.insert(
            handle,
            UploadedModel {
                coordinate,
                vertex_bytes: vertex_bytes.len(),
                index_count: mesh.indices.len(),
            },
        );
        handle
    }

    fn release(&mut self, handle: ModelHandle) {
        self.models.get_mut().resident.remove(&handle);
    }
}

/// Main-thread queue of chunks whose meshes are waiting to become models.
pub struct ModelLoader {
    uploader: Box<dyn ModelUploader>,
    queue: VecDeque<ChunkCoordinate>,
    queued: HashSet<ChunkCoordinate>,
}

impl ModelLoader {
    pub fn new(uploader: Box<dyn ModelUploader>) -> Self {
        ModelLoader {
            uploader,
            queue: VecDeque::new(),
            queued: HashSet::new(),
        }
    }

    /// Queues a chunk whose `ChunkMesh` component is ready. Queuing a chunk that
    /// is already waiting is a no-op.
    pub fn enqueue(&mut self, coordinate: ChunkCoordinate) {
        if self.queued.insert(coordinate) {
            self.queue.push_back(coordinate);
        }
    }

    /// Number of chunks waiting for upload.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Uploads at most `limit` queued meshes, in queue order.
    ///
    /// A chunk that already has a model gets it replaced. Chunks that were evicted
    /// or lost their mesh in the meantime are skipped without counting against
    /// the limit.
    ///
    /// # Returns
    /// The number of models uploaded
    pub fn flush_up_to(&mut self, limit: usize, chunks: &ChunkRegistry, components: &ComponentRegistry) -> usize {
        let mut uploaded = 0;

        while uploaded < limit {
            let Some(coordinate) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&coordinate);

            let Some(chunk) = chunks.get(coordinate) else {
                continue;
            };
            let entity = chunk.entity();
            let Some(mesh) = components.remove_component::<ChunkMesh>(entity) else {
                warn!("Chunk {:?} was queued for upload without a mesh", coordinate);
                continue;
            };

            if let Some(previous) = components.remove_component::<ChunkModel>(entity) {
                self.uploader.release(previous.handle);
            }

            let handle = self.uploader.upload(coordinate, &mesh);
            components.add_component(
                entity,
                ChunkModel {
                    handle,
                    ranges: mesh.ranges,
                },
            );
            components.add_component(entity, ChunkTransform::for_chunk(coordinate));

            if chunk.advance_status(ChunkStatus::FINAL) {
                debug!(
                    "Chunk {:?} is final ({} faces, {} bytes)",
                    coordinate,
                    mesh.face_count(),
                    mesh.vertices.len() * Vertex::STRIDE
                );
            }
            uploaded += 1;
        }

        uploaded
    }

    /// Releases the model of a chunk that is being unloaded and drops it from
    /// the queue.
    pub fn remove_model(&mut self, coordinate: ChunkCoordinate, chunks: &ChunkRegistry, components: &ComponentRegistry) {
        if self.queued.remove(&coordinate) {
            self.queue.retain(|queued| *queued != coordinate);
        }

        if let Some(chunk) = chunks.get(coordinate) {
            if let Some(model) = components.remove_component::<ChunkModel>(chunk.entity()) {
                self.uploader.release(model.handle);
            }
            components.remove_component::<ChunkTransform>(chunk.entity());
            components.remove_component::<ChunkMesh>(chunk.entity());
        }
    }
}
