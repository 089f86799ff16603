//! Bounded submission pipeline
//!
//! A fixed pool of `max_concurrent` workers drains a bounded task queue. The
//! scheduler only ever enqueues (`try_send`), so a slow or hung submission can
//! never hold up the next tick. Each worker owns its task and process handle
//! exclusively; the worker count is the concurrency bound.
//!
//! Failures stay inside the worker: a non-zero exit, a spawn error, a timeout
//! or even a panic in the runner is logged and counted, and the worker moves
//! on to the next task. Nothing is retried.

use crate::runner::CommandRunner;
use crate::stats::{FeederStats, WorkerSlot};
use chrono::{DateTime, Utc};
use feeder_rust_core::command::CommandDescription;
use feeder_rust_core::error::{FeederError, Result};
use futures_util::future::join_all;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A command handed from the scheduler to the pipeline
#[derive(Debug, Clone)]
pub struct SubmissionTask {
    pub command: CommandDescription,
    pub symbol: String,
    pub tick: u64,
    pub enqueued_at: DateTime<Utc>,
}

impl SubmissionTask {
    pub fn new(command: CommandDescription, symbol: impl Into<String>, tick: u64) -> Self {
        Self {
            command,
            symbol: symbol.into(),
            tick,
            enqueued_at: Utc::now(),
        }
    }
}

pub struct SubmissionPipeline {
    sender: Option<mpsc::Sender<SubmissionTask>>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
    stats: Arc<FeederStats>,
}

impl SubmissionPipeline {
    /// Spawn `max_concurrent` workers fed by a queue of `queue_capacity` tasks.
    pub fn start(
        max_concurrent: usize,
        queue_capacity: usize,
        submit_timeout: Duration,
        runner: Arc<dyn CommandRunner>,
        stats: Arc<FeederStats>,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..max_concurrent)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    receiver.clone(),
                    runner.clone(),
                    stats.clone(),
                    submit_timeout,
                ))
            })
            .collect();

        info!(
            "Submission pipeline started ({} workers, queue capacity {}, timeout {:?})",
            max_concurrent, queue_capacity, submit_timeout
        );

        Self {
            sender: Some(sender),
            workers,
            queue_capacity,
            stats,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue without waiting. A full queue drops the task.
    pub fn submit(&self, task: SubmissionTask) -> Result<()> {
        let sender = self.sender.as_ref().ok_or(FeederError::PipelineClosed)?;

        match sender.try_send(task) {
            Ok(()) => {
                self.stats.submissions_enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(task)) => {
                self.stats.submissions_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    tick = task.tick,
                    symbol = %task.symbol,
                    "Submission queue full, dropping update"
                );
                Err(FeederError::QueueFull {
                    capacity: self.queue_capacity,
                })
            }
            Err(TrySendError::Closed(_)) => Err(FeederError::PipelineClosed),
        }
    }

    /// Stop accepting tasks and wait for queued and in-flight ones to finish.
    pub async fn shutdown(mut self) {
        self.sender.take();
        let pending = self.workers.len();
        debug!("Waiting for {} submission workers to drain", pending);

        for result in join_all(self.workers.drain(..)).await {
            if let Err(e) = result {
                error!("Submission worker ended abnormally: {}", e);
            }
        }
        info!("Submission pipeline stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<SubmissionTask>>>,
    runner: Arc<dyn CommandRunner>,
    stats: Arc<FeederStats>,
    submit_timeout: Duration,
) {
    debug!(worker_id, "Submission worker started");

    loop {
        // Lock only while waiting for the next task, never while executing it
        let task = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(task) = task else { break };

        execute(worker_id, task, &runner, &stats, submit_timeout).await;
    }

    debug!(worker_id, "Submission worker stopped");
}

async fn execute(
    worker_id: usize,
    task: SubmissionTask,
    runner: &Arc<dyn CommandRunner>,
    stats: &Arc<FeederStats>,
    submit_timeout: Duration,
) {
    let slot = WorkerSlot::acquire(stats.clone());
    let queued_ms = (Utc::now() - task.enqueued_at).num_milliseconds();
    debug!(
        worker_id,
        tick = task.tick,
        symbol = %task.symbol,
        queued_ms,
        "Executing submission"
    );

    // Run on its own task so a panicking runner cannot take the worker down
    let run_runner = runner.clone();
    let command = task.command.clone();
    let handle = tokio::spawn(async move {
        match tokio::time::timeout(submit_timeout, run_runner.run(&command)).await {
            Ok(result) => result,
            Err(_) => Err(FeederError::Timeout {
                operation: "submission".to_string(),
                after: submit_timeout,
            }),
        }
    });

    let result = match handle.await {
        Ok(result) => result,
        Err(join_error) => Err(FeederError::Submission {
            exit_code: None,
            message: format!("runner task aborted: {}", join_error),
            output: String::new(),
        }),
    };

    drop(slot);

    match result {
        Ok(output) => {
            stats.submissions_succeeded.fetch_add(1, Ordering::Relaxed);
            info!(
                worker_id,
                tick = task.tick,
                symbol = %task.symbol,
                scaled_price = task.command.scaled_price.value(),
                "Price update submitted: {}",
                output.stdout.trim()
            );
            if !output.stderr.trim().is_empty() {
                warn!(worker_id, tick = task.tick, "Client stderr: {}", output.stderr.trim());
            }
        }
        Err(FeederError::Submission {
            exit_code,
            message,
            output,
        }) => {
            stats.submissions_failed.fetch_add(1, Ordering::Relaxed);
            error!(
                worker_id,
                tick = task.tick,
                symbol = %task.symbol,
                ?exit_code,
                "Price update failed: {}\n{}",
                message,
                output
            );
        }
        Err(e) => {
            stats.submissions_failed.fetch_add(1, Ordering::Relaxed);
            error!(
                worker_id,
                tick = task.tick,
                symbol = %task.symbol,
                "Price update failed: {}",
                e
            );
        }
    }
}
