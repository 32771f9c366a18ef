//! # Pipeline Errors
//!
//! Every fallible stage reports through [`PipelineError`]. Errors are scoped to the
//! chunk that produced them: stages log them and move on to the next queued chunk.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::engine_state::voxels::chunk::ChunkCoordinate;

/// Errors raised by the chunk pipeline and its persistence layer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying file system failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A chunk file exists but does not match the expected layout.
    #[error("corrupt chunk file {path:?}: {reason}")]
    CorruptChunkFile { path: PathBuf, reason: String },

    /// An entity record carried a tag with no registered decoder. The remainder
    /// of the file is unrecoverable.
    #[error("unknown entity type tag {tag} in {path:?}")]
    UnknownEntityTag { tag: i32, path: PathBuf },

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A stage task panicked on its worker thread.
    #[error("{stage} task panicked: {message}")]
    TaskPanicked { stage: &'static str, message: String },

    /// A chunk was evicted from the registry while work for it was queued.
    #[error("chunk {0:?} is no longer registered")]
    ChunkMissing(ChunkCoordinate),

    /// A stage worker thread has exited and can no longer accept work.
    #[error("{stage} worker disconnected")]
    WorkerDisconnected { stage: &'static str },
}

/// Result alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, PipelineError>;
