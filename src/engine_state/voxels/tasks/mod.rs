//! # Voxel Task System
//!
//! This module contains the block-side pipeline stages as tasks: terrain
//! generation (worker pool), structure placement and lighting (one thread each).
//! Mesh generation lives with the rest of the rendering code.

pub mod light_map_generation_task;
pub mod structure_generation_task;
pub mod terrain_generation_task;
