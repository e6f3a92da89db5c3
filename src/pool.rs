//! Bounded-concurrency task scheduling
//!
//! Two entry points over the same pipeline: a long-lived
//! [`WorkerPool`] with submit/shutdown/status semantics, and the
//! one-shot [`process_batch`] that drains a fixed task list through a
//! shared cursor while reporting per-file progress.
//!
//! A fixed set of workers reads one FIFO intake channel, so at most
//! `max_concurrency` tasks are ever in flight. Shutdown closes the
//! intake immediately (new submissions are rejected with a distinct
//! error) and then drains: tasks accepted before shutdown still run to
//! completion, so every accepted task yields exactly one result. The
//! pool performs no per-path locking; callers must not submit the same
//! path concurrently.

use crate::pipeline::TrackPipeline;
use crate::types::{ProcessingResult, ProcessingTask};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Scheduler errors
#[derive(Debug, Error)]
pub enum PoolError {
    /// Submission after shutdown was requested
    #[error("Worker pool is shutting down, submission rejected")]
    ShuttingDown,
}

/// Snapshot of the pool's lifecycle state.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    pub active: usize,
    pub queued: usize,
    pub max_concurrency: usize,
    pub shutting_down: bool,
}

struct Job {
    task: ProcessingTask,
    reply: oneshot::Sender<ProcessingResult>,
}

struct PoolShared {
    active: AtomicUsize,
    queued: AtomicUsize,
    shutting_down: AtomicBool,
    max_concurrency: usize,
}

/// Bounded worker pool over the track pipeline.
pub struct WorkerPool {
    intake: StdMutex<Option<mpsc::UnboundedSender<Job>>>,
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(pipeline: Arc<TrackPipeline>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let shared = Arc::new(PoolShared {
            active: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            shutting_down: AtomicBool::new(false),
            max_concurrency,
        });

        let workers = (0..max_concurrency)
            .map(|worker_id| {
                let rx = rx.clone();
                let pipeline = pipeline.clone();
                let shared = shared.clone();
                tokio::spawn(worker_loop(worker_id, rx, pipeline, shared))
            })
            .collect();

        Self {
            intake: StdMutex::new(Some(tx)),
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Queue one task. Returns the receiving end of the task's result;
    /// the task runs as soon as a worker frees up, FIFO.
    pub fn submit(
        &self,
        task: ProcessingTask,
    ) -> Result<oneshot::Receiver<ProcessingResult>, PoolError> {
        if self.shared.shutting_down.load(Ordering::Acquire) {
            return Err(PoolError::ShuttingDown);
        }

        let intake = self.intake.lock().expect("intake lock poisoned");
        let tx = intake.as_ref().ok_or(PoolError::ShuttingDown)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        if tx
            .send(Job {
                task,
                reply: reply_tx,
            })
            .is_err()
        {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::ShuttingDown);
        }

        Ok(reply_rx)
    }

    /// Stop accepting new work immediately, then wait for the workers
    /// to drain everything already accepted.
    pub async fn shutdown(&self) {
        self.shared.shutting_down.store(true, Ordering::Release);
        {
            let mut intake = self.intake.lock().expect("intake lock poisoned");
            intake.take(); // closes the channel once workers drain it
        }

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }
        debug!("Worker pool drained");
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            active: self.shared.active.load(Ordering::SeqCst),
            queued: self.shared.queued.load(Ordering::SeqCst),
            max_concurrency: self.shared.max_concurrency,
            shutting_down: self.shared.shutting_down.load(Ordering::Acquire),
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    pipeline: Arc<TrackPipeline>,
    shared: Arc<PoolShared>,
) {
    loop {
        // Workers take turns waiting on the shared receiver; the lock
        // is only held while dequeuing, never while processing.
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(job) = job else {
            break; // intake closed and drained
        };

        shared.queued.fetch_sub(1, Ordering::SeqCst);
        shared.active.fetch_add(1, Ordering::SeqCst);

        let result = pipeline.process(&job.task).await;

        shared.active.fetch_sub(1, Ordering::SeqCst);
        // The submitter may have dropped its receiver; the result is
        // complete either way.
        let _ = job.reply.send(result);
    }

    debug!(worker_id, "Worker exited");
}

/// Progress callback: `(processed_count, total, path)` after each
/// task's completion.
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &Path) + Send + Sync>;

/// One-shot batch variant: process a fixed list at the given
/// concurrency, refilling from a shared cursor as slots free up.
///
/// Cancellation stops workers from pulling further tasks; in-flight
/// tasks finish and their results are included. Results come back in
/// task order, completed entries only.
pub async fn process_batch(
    pipeline: Arc<TrackPipeline>,
    tasks: Vec<ProcessingTask>,
    concurrency: usize,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
) -> Vec<ProcessingResult> {
    let total = tasks.len();
    if total == 0 {
        return Vec::new();
    }

    let tasks = Arc::new(tasks);
    let cursor = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    let results: Arc<Mutex<Vec<Option<ProcessingResult>>>> =
        Arc::new(Mutex::new((0..total).map(|_| None).collect()));

    let workers: Vec<JoinHandle<()>> = (0..concurrency.max(1).min(total))
        .map(|_| {
            let tasks = tasks.clone();
            let cursor = cursor.clone();
            let completed = completed.clone();
            let results = results.clone();
            let pipeline = pipeline.clone();
            let cancel = cancel.clone();
            let progress = progress.clone();

            tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= total {
                        break;
                    }

                    let task = &tasks[index];
                    let result = pipeline.process(task).await;

                    let processed = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = &progress {
                        callback(processed, total, &task.path);
                    }

                    results.lock().await[index] = Some(result);
                }
            })
        })
        .collect();

    for handle in workers {
        let _ = handle.await;
    }

    let mut results = results.lock().await;
    results.drain(..).flatten().collect()
}
