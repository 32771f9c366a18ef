//! Rendering side of the chunk pipeline.
//!
//! This module contains everything between a lit chunk and a drawable model:
//! mesh generation, the vertex format, and the main-thread model loader that
//! hands finished meshes to a graphics backend. No graphics API is linked here;
//! a backend plugs in through [`ModelUploader`].

pub mod meshing;
pub mod model_loader;
pub mod tasks;
mod vertex;

// Re-export commonly used types
pub use meshing::{ChunkMesh, DirectionRange};
pub use model_loader::{ChunkModel, ChunkTransform, HeadlessUploader, ModelLoader, ModelUploader};
pub use vertex::Vertex;
