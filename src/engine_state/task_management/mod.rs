//! # Task Management System
//!
//! This module provides the worker pools that run the pipeline stages off the
//! orchestrator thread.
//!
//! ## Architecture Overview
//!
//! The task management system consists of several key components:
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work that can be executed asynchronously
//! - `TaskResult`: The result of a completed task, applied on the orchestrator thread
//! - `TaskChannel`: Communication channel between the orchestrator and one worker
//!
//! Every stage owns its own `TaskManager`. Parallel stages (terrain, meshing) use
//! several workers; stages that must never run concurrently with themselves
//! (structures, lighting, persistence) use exactly one, which also makes them
//! strictly FIFO.
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin
//! 3. Workers process tasks and send back either a result or an error
//! 4. Results are applied on the orchestrator thread in `process_completed_tasks()`
//! 5. Errors and panics are logged with the stage name and the task's failure
//!    result, if any, is applied; the worker keeps going
//!
//! ## Example Usage
//! ```ignore
//! let mut terrain = TaskManager::new("terrain", 4, 1);
//! terrain.publish_task(Box::new(TerrainGenerationTask::new(...)));
//!
//! // In the tick loop:
//! terrain.process_completed_tasks(&mut context);
//! terrain.process_queued_tasks();
//! ```

pub mod task;

use std::{
    any::Any,
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::mpsc::{channel, Receiver, Sender},
    thread::{self, JoinHandle},
};

use log::{error, info, warn};
use task::{ResultContext, Task, TaskResult};

use crate::error::{PipelineError, Result};

/// What a worker sends back for each task.
struct TaskOutcome {
    label: String,
    result: Result<Box<dyn TaskResult>>,
    /// From [`Task::on_failure`], set only when `result` is an error
    cleanup: Option<Box<dyn TaskResult>>,
}

/// A communication channel between the orchestrator thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from the orchestrator to the worker
/// - `result_receiver`: Receives task outcomes from the worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `worker`: Handle to the worker thread, joined on shutdown
pub struct TaskChannel {
    task_sender: Sender<Box<dyn Task>>,
    result_receiver: Receiver<TaskOutcome>,
    num_tasks_in_flight: usize,
    worker: JoinHandle<()>,
}

/// Manages a pool of worker threads and coordinates task execution for one stage.
///
/// # Fields
/// - `stage`: Name used in thread names and log lines
/// - `channels`: Set of active worker channels
/// - `queued_tasks`: Tasks waiting for an available worker
/// - `current_channel`: Index for round-robin scheduling
/// - `max_tasks_in_flight`: Cap on tasks handed to a single worker at once
///
/// # Implementation Notes
/// - Drop-safe: dropping the manager drains its queue and joins the workers
/// - Panic-safe: a panicking task is reported as an error, the worker survives
pub struct TaskManager {
    stage: &'static str,
    channels: Vec<TaskChannel>,
    queued_tasks: VecDeque<Box<dyn Task>>,
    current_channel: usize,
    max_tasks_in_flight: usize,
}

impl TaskManager {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `stage` - Stage name, used for thread names and logging
    /// * `num_workers` - Number of worker threads to create
    /// * `max_tasks_in_flight` - Tasks a single worker may hold at once (at least 1)
    ///
    /// A worker thread that fails to spawn is logged and skipped; tasks published
    /// to a manager with no workers stay queued.
    pub fn new(stage: &'static str, num_workers: usize, max_tasks_in_flight: usize) -> Self {
        let mut channels = Vec::with_capacity(num_workers);

        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<Box<dyn Task>>();
            let (result_tx, result_rx) = channel::<TaskOutcome>();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let label = task.describe();
                    let result = panic::catch_unwind(AssertUnwindSafe(|| task.process()))
                        .unwrap_or_else(|payload| {
                            Err(PipelineError::TaskPanicked {
                                stage,
                                message: panic_message(payload.as_ref()),
                            })
                        });
                    let cleanup = if result.is_err() { task.on_failure() } else { None };
                    if result_tx.send(TaskOutcome { label, result, cleanup }).is_err() {
                        break;
                    }
                }
            };

            match thread::Builder::new()
                .name(format!("{stage}-worker-{index}"))
                .spawn(task_closure)
            {
                Ok(worker) => channels.push(TaskChannel {
                    task_sender: task_tx,
                    result_receiver: result_rx,
                    num_tasks_in_flight: 0,
                    worker,
                }),
                Err(e) => error!("Failed to spawn {stage} worker {index}: {e}"),
            }
        }

        info!("Started {} {} worker(s)", channels.len(), stage);

        TaskManager {
            stage,
            channels,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
            max_tasks_in_flight: max_tasks_in_flight.max(1),
        }
    }

    /// The stage name this manager was created with.
    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was successfully sent to the worker
    /// - `Err(task)` if the send failed (the worker has exited)
    fn try_send_task(&mut self, task: Box<dyn Task>, channel_idx: usize) -> std::result::Result<(), Box<dyn Task>> {
        match self.channels[channel_idx].task_sender.send(task) {
            Ok(_) => {
                self.channels[channel_idx].num_tasks_in_flight += 1;
                Ok(())
            }
            Err(task) => {
                warn!("{}", PipelineError::WorkerDisconnected { stage: self.stage });
                Err(task.0)
            }
        }
    }

    /// Finds an available worker channel that can accept a new task.
    ///
    /// Round-robin starting from the last used channel, skipping channels that
    /// have reached `max_tasks_in_flight`.
    fn find_available_channel(&self) -> Option<usize> {
        if self.channels.is_empty() {
            return None;
        }

        let start_channel = self.current_channel % self.channels.len();
        let mut current = start_channel;

        loop {
            if self.channels[current].num_tasks_in_flight < self.max_tasks_in_flight {
                return Some(current);
            }
            current = (current + 1) % self.channels.len();
            if current == start_channel {
                return None;
            }
        }
    }

    /// Publishes a new task for execution.
    ///
    /// The task goes straight to a worker if one has capacity, otherwise it is
    /// queued and picked up by a later `process_queued_tasks()`.
    ///
    /// # Returns
    /// - `true` if the task was immediately scheduled on an available worker
    /// - `false` if the task was queued because all workers are busy
    pub fn publish_task(&mut self, task: Box<dyn Task>) -> bool {
        if !self.queued_tasks.is_empty() {
            // Keep FIFO order behind tasks that are already waiting.
            self.queued_tasks.push_back(task);
            self.process_queued_tasks();
            return false;
        }

        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Hands queued tasks to workers until the queue is empty or every worker
    /// is at capacity. Tasks leave the queue in FIFO order.
    pub fn process_queued_tasks(&mut self) {
        while !self.queued_tasks.is_empty() {
            let Some(channel_idx) = self.find_available_channel() else {
                break;
            };
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    self.queued_tasks.push_front(task);
                    break;
                }
            }
        }
    }

    /// Applies all completed task results on the calling thread.
    ///
    /// Failed tasks are logged with the stage name and the task's label, then
    /// their failure result is applied.
    ///
    /// # Returns
    /// The number of tasks that completed successfully.
    pub fn process_completed_tasks(&mut self, context: &mut ResultContext<'_>) -> usize {
        let mut completed = 0;
        for channel in &mut self.channels {
            while let Ok(outcome) = channel.result_receiver.try_recv() {
                channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                match outcome.result {
                    Ok(result) => {
                        result.handle_result(context);
                        completed += 1;
                    }
                    Err(e) => {
                        error!("{} task for {} failed: {}", self.stage, outcome.label, e);
                        if let Some(cleanup) = outcome.cleanup {
                            cleanup.handle_result(context);
                        }
                    }
                }
            }
        }

        self.process_queued_tasks();
        completed
    }

    /// Tasks queued or running that have not reported back yet.
    pub fn pending(&self) -> usize {
        self.queued_tasks.len()
            + self
                .channels
                .iter()
                .map(|channel| channel.num_tasks_in_flight)
                .sum::<usize>()
    }

    /// Drains the queue into the workers, then stops and joins them.
    ///
    /// Every task published before the call runs to completion; their results
    /// are discarded.
    pub fn shutdown(&mut self) {
        let mut channels = std::mem::take(&mut self.channels);
        let worker_count = channels.len();

        if !channels.is_empty() {
            let mut next = 0;
            while let Some(task) = self.queued_tasks.pop_front() {
                if channels[next].task_sender.send(task).is_err() {
                    warn!("Dropping queued {} task during shutdown", self.stage);
                }
                next = (next + 1) % channels.len();
            }
        }
        self.queued_tasks.clear();

        for channel in channels.drain(..) {
            let TaskChannel {
                task_sender,
                result_receiver,
                worker,
                ..
            } = channel;
            drop(task_sender);
            if worker.join().is_err() {
                error!("{} worker exited abnormally", self.stage);
            }
            drop(result_receiver);
        }

        if worker_count > 0 {
            info!("Stopped {} {} worker(s)", worker_count, self.stage);
        }
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Extracts the message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::ComponentRegistry,
        engine_state::{
            rendering::model_loader::{HeadlessUploader, ModelLoader},
            voxels::world::ChunkRegistry,
        },
    };
    use std::{
        collections::HashSet,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    };

    struct CountingTask {
        counter: Arc<AtomicUsize>,
        panic: bool,
    }

    struct CountingResult;

    impl TaskResult for CountingResult {
        fn handle_result(self: Box<Self>, _context: &mut ResultContext<'_>) {}
    }

    impl Task for CountingTask {
        fn process(&self) -> Result<Box<dyn TaskResult>> {
            if self.panic {
                panic!("boom");
            }
            self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingResult))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    struct ReleaseCounter(Arc<AtomicUsize>);

    impl TaskResult for ReleaseCounter {
        fn handle_result(self: Box<Self>, _context: &mut ResultContext<'_>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Fails or panics, and releases through `on_failure`.
    struct FailingTask {
        released: Arc<AtomicUsize>,
        panic: bool,
    }

    impl Task for FailingTask {
        fn process(&self) -> Result<Box<dyn TaskResult>> {
            if self.panic {
                panic!("boom");
            }
            Err(PipelineError::WorkerDisconnected { stage: "test" })
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }

        fn on_failure(&self) -> Option<Box<dyn TaskResult>> {
            Some(Box::new(ReleaseCounter(self.released.clone())))
        }
    }

    fn drain(manager: &mut TaskManager) -> usize {
        let components = Arc::new(ComponentRegistry::new());
        let chunks = ChunkRegistry::new(components.clone());
        let mut loader = ModelLoader::new(Box::new(HeadlessUploader::default()));
        let mut relighting = HashSet::new();
        let mut context = ResultContext::new(&chunks, &components, &mut loader, &mut relighting);

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut completed = 0;
        while manager.pending() > 0 && Instant::now() < deadline {
            completed += manager.process_completed_tasks(&mut context);
            std::thread::sleep(Duration::from_millis(1));
        }
        completed
    }

    #[test]
    fn queued_tasks_all_run_on_a_single_worker() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut manager = TaskManager::new("test", 1, 1);

        for _ in 0..5 {
            manager.publish_task(Box::new(CountingTask {
                counter: counter.clone(),
                panic: false,
            }));
        }

        assert_eq!(drain(&mut manager), 5);
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn a_panicking_task_does_not_stop_the_worker() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut manager = TaskManager::new("test", 1, 1);

        manager.publish_task(Box::new(CountingTask {
            counter: counter.clone(),
            panic: true,
        }));
        manager.publish_task(Box::new(CountingTask {
            counter: counter.clone(),
            panic: false,
        }));

        assert_eq!(drain(&mut manager), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_and_panicked_tasks_apply_their_failure_result() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::new(AtomicUsize::new(0));
        let mut manager = TaskManager::new("test", 1, 1);

        for panic in [false, true] {
            manager.publish_task(Box::new(FailingTask {
                released: released.clone(),
                panic,
            }));
        }
        manager.publish_task(Box::new(CountingTask {
            counter: counter.clone(),
            panic: false,
        }));

        assert_eq!(drain(&mut manager), 1);
        assert_eq!(released.load(Ordering::SeqCst), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shutdown_runs_everything_already_published() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut manager = TaskManager::new("test", 2, 1);

        for _ in 0..8 {
            manager.publish_task(Box::new(CountingTask {
                counter: counter.clone(),
                panic: false,
            }));
        }
        manager.shutdown();

        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert_eq!(manager.pending(), 0);
    }
}
