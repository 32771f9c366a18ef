//! Mesh generation for voxel rendering.
//!
//! This module converts chunk blocks into triangle meshes ready for upload.
//!
//! # Architecture
//! - `face`: Quad tables for every block side and face geometry kind
//! - `mesh`: Visibility culling, light sampling and the per-direction layout of
//!   a `ChunkMesh`
//!
//! # Direction Ranges
//! Faces are written grouped by the direction they point in. A renderer can
//! then skip every group that faces away from the camera without looking at
//! individual triangles.

pub mod face;
mod mesh;

pub use mesh::*;
