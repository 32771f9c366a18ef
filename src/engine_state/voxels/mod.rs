//! # Voxel World
//!
//! This module contains the block side of the chunk pipeline: the data a chunk
//! holds, how it is generated, decorated, lit and persisted, and the loader that
//! moves chunks from one stage to the next.
//!
//! ## Architecture
//!
//! The voxel system is organized into several key components:
//!
//! * **Block**: Block types and the per-face transparency that drives lighting and culling
//! * **Chunk**: Fixed-size 16³ block and light arrays with an atomic lifecycle status
//! * **World**: The shared `ChunkRegistry` and world-space block queries
//! * **Terrain / Biome / Structures**: Procedural generation of the blocks
//! * **Lighting**: Cross-chunk skylight flood fill with spoiling
//! * **Entities / Serializer**: Entity codecs and per-chunk save files
//! * **Chunk loader**: The orchestrator that dispatches chunks to stages
//! * **Tasks**: The stage work units run on the worker pools
//!
//! ## Data Flow
//!
//! 1. The chunk loader scans around the focal point and creates missing chunks
//! 2. Terrain (or a save file) fills the blocks, then structures are placed once
//!    all neighbours have terrain
//! 3. Skylight is computed once all neighbours are decorated
//! 4. Meshes are built once all neighbours are lit, then uploaded on the main thread
//!
//! ## Thread Safety
//!
//! * Chunk arrays are replaced whole, never written in place, so readers on
//!   other threads always see a complete array
//! * Status and spoiled flags are atomics
//! * Structure placement and lighting each run on a single dedicated thread

pub mod biome;
pub mod block;
pub mod chunk;
pub mod chunk_loader;
pub mod entities;
pub mod lighting;
pub mod serializer;
pub mod structures;
pub mod tasks;
pub mod terrain;
pub mod world;
