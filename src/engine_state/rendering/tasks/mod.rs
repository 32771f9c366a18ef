//! Background tasks for the rendering system.
//!
//! This module contains background tasks that handle potentially expensive
//! rendering-related operations. They run on the mesh worker pool to keep the
//! main thread responsive.
//!
//! # Available Tasks
//! - `ChunkMeshGenerationTask`: Generates mesh data for chunks in the background

pub mod chunk_mesh_generation_task;
