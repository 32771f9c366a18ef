//! # Pipeline Configuration
//!
//! Tunables for the chunk pipeline. Every field has a default, so a JSON file only
//! needs to name the values it overrides:
//!
//! ```json
//! { "seed": 42, "load_radius": 6, "save_directory": "saves/world" }
//! ```

use std::{fs, path::Path, path::PathBuf, thread};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for a [`WorldContext`](crate::WorldContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seed shared by terrain, biome and structure generation.
    pub seed: u32,
    /// Radius, in chunks, of the cube scanned around the focal point.
    pub load_radius: i32,
    /// Chunks farther than this from the focal chunk are saved and evicted.
    /// `None` keeps every chunk resident.
    pub unload_radius: Option<i32>,
    /// Size of the worker pool shared by terrain and mesh generation.
    pub worker_threads: usize,
    /// Tasks a single worker may hold before new work is queued on the caller.
    pub max_tasks_in_flight: usize,
    /// Upper bound on meshes uploaded per tick.
    pub model_uploads_per_tick: usize,
    /// When false, chunks skip structure placement.
    pub generate_structures: bool,
    /// Directory holding chunk and world files. Persistence is off when `None`.
    pub save_directory: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get().saturating_sub(2))
            .unwrap_or(1)
            .max(1);

        Self {
            seed: 1337,
            load_radius: 4,
            unload_radius: None,
            worker_threads,
            max_tasks_in_flight: 1,
            model_uploads_per_tick: 8,
            generate_structures: true,
            save_directory: None,
        }
    }
}

impl PipelineConfig {
    /// Reads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Writes this configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "seed": 7, "load_radius": 2 }"#).unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.load_radius, 2);
        assert_eq!(config.model_uploads_per_tick, 8);
        assert!(config.generate_structures);
        assert!(config.worker_threads >= 1);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        let config = PipelineConfig {
            unload_radius: Some(9),
            save_directory: Some(dir.path().join("world")),
            ..PipelineConfig::default()
        };

        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            PipelineConfig::load(&path),
            Err(crate::error::PipelineError::Config(_))
        ));
    }
}
