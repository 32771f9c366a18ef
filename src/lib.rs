#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Streaming
//!
//! The chunk lifecycle pipeline of a streaming voxel world: chunks around a
//! focal point are generated, decorated, lit, meshed and uploaded on worker
//! threads without ever blocking the thread that drives the world.
//!
//! ## Key Modules
//!
//! * `config` - Pipeline tunables, loadable from JSON
//! * `core` - Shared-resource primitives and the component registry
//! * `engine_state` - The `WorldContext` and every pipeline stage
//! * `error` - The pipeline's error type
//!
//! ## Architecture
//!
//! The pipeline follows a staged architecture with clear separation between:
//! * Orchestration (a per-tick scan around the focal point)
//! * Parallel stages (terrain and mesh generation on a worker pool)
//! * Serial stages (structures and lighting, one thread each)
//! * Main-thread work (model upload)
//! * Persistence (one background thread)
//!
//! ## Usage
//!
//! ```no_run
//! use cgmath::Point3;
//! use voxel_streaming::{config::PipelineConfig, WorldContext};
//!
//! voxel_streaming::init_logging();
//! let mut world = WorldContext::new(PipelineConfig::default()).unwrap();
//! world.settle(Point3::new(0.0, 0.0, 0.0), 10_000);
//! ```

use std::path::Path;

use cgmath::Point3;
use log::info;

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;

pub use config::PipelineConfig;
pub use engine_state::WorldContext;
pub use error::{PipelineError, Result};

use engine_state::voxels::chunk::ChunkStatus;

/// Ticks allowed for the headless driver to settle.
const SETTLE_TICKS: usize = 100_000;

/// Initializes the `env_logger` backend from `RUST_LOG`, writing to stdout.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    let _ = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init();
}

/// Runs the headless driver: streams the world around the origin until it
/// settles, then logs a summary.
///
/// # Arguments
/// * `config_path` - Optional JSON configuration file; defaults are used without one
pub fn run(config_path: Option<&Path>) -> Result<()> {
    init_logging();

    let config = match config_path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    info!("Starting with {:?}", config);

    let mut world = WorldContext::new(config)?;
    let focal = Point3::new(0.0, 0.0, 0.0);
    let settled = world.settle(focal, SETTLE_TICKS);

    let coordinates = world.chunks().coordinates();
    let visible = coordinates
        .iter()
        .filter(|coordinate| world.chunks().status_of(**coordinate) == ChunkStatus::FINAL)
        .count();
    info!(
        "{} after streaming: {} chunks resident, {} visible",
        if settled { "Settled" } else { "Gave up" },
        coordinates.len(),
        visible
    );

    let saved = world.save_world()?;
    if saved > 0 {
        info!("Saved {} entities", saved);
    }
    world.shutdown();
    Ok(())
}
