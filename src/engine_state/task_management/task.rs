//! # Task System Core Traits
//!
//! This module defines the fundamental building blocks of the task system,
//! which provides a framework for executing pipeline stages on worker threads.
//!
//! ## Core Components
//! - `Task`: A unit of stage work (one chunk, usually) run on a worker thread
//! - `TaskResult`: The outcome of a task, applied on the orchestrator thread
//! - `ResultContext`: The orchestrator-owned state a result may touch
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread, which publishes
//!    the chunk's new data and advances its status
//! 3. The task returns a boxed `TaskResult`, or an error that is logged; a
//!    failed or panicked task may still hand back a cleanup result through
//!    `Task::on_failure()`
//! 4. The result's `handle_result()` is called on the orchestrator thread
//! 5. The result may request follow-up work: relights, remeshes, uploads
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - `TaskResult` must be `Send` to be transferred back to the orchestrator thread
//! - Chunk data touched by a task is published through the chunk's own
//!   copy-on-publish slots, never through the result

use std::collections::HashSet;

use crate::{
    core::ComponentRegistry,
    engine_state::{
        rendering::model_loader::ModelLoader,
        voxels::{chunk::ChunkCoordinate, world::ChunkRegistry},
    },
    error::Result,
};

/// A trait representing a unit of work that can be executed asynchronously.
///
/// Tasks own everything they need (usually an `Arc` to the registry and a
/// chunk coordinate), so they can be moved to any worker.
pub trait Task: Send {
    /// Processes the task and returns a result.
    ///
    /// Runs on a worker thread. Errors are reported back to the orchestrator
    /// thread and logged with [`Task::describe`]; they never stop the worker.
    ///
    /// # Returns
    /// A boxed `TaskResult` that will be processed on the orchestrator thread.
    fn process(&self) -> Result<Box<dyn TaskResult>>;

    /// Short human-readable label used in log lines, e.g. the chunk coordinate.
    fn describe(&self) -> String;

    /// Result applied on the orchestrator thread when `process` returns an
    /// error or panics. Tasks that reserve orchestrator state release it here.
    fn on_failure(&self) -> Option<Box<dyn TaskResult>> {
        None
    }
}

/// A trait representing the result of processing a `Task`.
///
/// Results are processed on the orchestrator thread, which makes them the one
/// place allowed to touch main-thread-only state such as the model loader.
pub trait TaskResult: Send {
    /// Applies the result.
    ///
    /// # Arguments
    /// * `context` - Orchestrator-owned state the result may read or update
    fn handle_result(self: Box<Self>, context: &mut ResultContext<'_>);
}

/// State lent to [`TaskResult::handle_result`].
pub struct ResultContext<'a> {
    /// Every resident chunk.
    pub chunks: &'a ChunkRegistry,
    /// Component storage for chunk and entity data.
    pub components: &'a ComponentRegistry,
    /// Main-thread upload queue.
    pub model_loader: &'a mut ModelLoader,
    /// Chunks with a relight currently queued or running.
    pub relighting: &'a mut HashSet<ChunkCoordinate>,
    /// Chunks whose mesh must be rebuilt after a relight.
    pub remesh: Vec<ChunkCoordinate>,
    /// Chunks whose mesh was in flight while their light changed; rebuilt once
    /// they reach `FINAL`.
    pub stale_meshes: Vec<ChunkCoordinate>,
}

impl<'a> ResultContext<'a> {
    pub fn new(
        chunks: &'a ChunkRegistry,
        components: &'a ComponentRegistry,
        model_loader: &'a mut ModelLoader,
        relighting: &'a mut HashSet<ChunkCoordinate>,
    ) -> Self {
        ResultContext {
            chunks,
            components,
            model_loader,
            relighting,
            remesh: Vec::new(),
            stale_meshes: Vec::new(),
        }
    }
}
