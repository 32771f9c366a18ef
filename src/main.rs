//! # Voxel Streaming Entry Point
//!
//! Headless driver for the chunk pipeline. It calls into the library's `run()`
//! function with an optional JSON configuration path.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- pipeline.json
//! ```

use std::{path::PathBuf, process::ExitCode};

fn main() -> ExitCode {
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    match voxel_streaming::run(config_path.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
