//! Bounded-concurrency FIFO task executor.
//!
//! Tasks are deferred closures pushed onto an unbounded channel. A single
//! worker pulls them in submission order and starts each one only after it
//! holds one of `concurrency` semaphore permits, so with the default width of
//! one a task never starts before its predecessor has settled. Panics are
//! caught per task and never stop the worker.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::metrics::QueueMetrics;

/// Default executor width
pub const DEFAULT_CONCURRENCY: usize = 1;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

enum Command {
    Run(Job),
    Close(oneshot::Sender<()>),
}

/// The queue no longer accepts tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task queue is closed")]
pub struct QueueClosed;

#[derive(Debug, Default)]
struct QueueCounters {
    pending: AtomicUsize,
    in_flight: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Point-in-time view of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub concurrency: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub completed: u64,
    pub panicked: u64,
}

/// FIFO executor with a fixed concurrency width
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<Command>,
    counters: Arc<QueueCounters>,
    closed: AtomicBool,
    concurrency: usize,
}

impl TaskQueue {
    /// Create a queue and spawn its worker on the current tokio runtime.
    ///
    /// A `concurrency` of zero is treated as one.
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(QueueCounters::default());

        tokio::spawn(run_worker(rx, concurrency, counters.clone()));

        tracing::debug!(concurrency = concurrency, "Task queue started");

        Self {
            tx,
            counters,
            closed: AtomicBool::new(false),
            concurrency,
        }
    }

    /// Schedule a task. Returns immediately; the closure is invoked once the
    /// task reaches the front of the queue and a slot is free.
    pub fn enqueue<F, Fut>(&self, task: F) -> Result<(), QueueClosed>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueClosed);
        }

        let job: Job = Box::new(move || task().boxed());

        self.counters.pending.fetch_add(1, Ordering::SeqCst);
        QueueMetrics::set_pending(self.counters.pending.load(Ordering::SeqCst));

        if self.tx.send(Command::Run(job)).is_err() {
            self.counters.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueClosed);
        }

        Ok(())
    }

    /// Stop accepting tasks and wait until every task enqueued so far has settled.
    ///
    /// Calling this more than once returns immediately after the first call.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Close(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;

        tracing::debug!(
            completed = self.counters.completed.load(Ordering::Relaxed),
            "Task queue drained"
        );
    }

    /// Whether `shutdown` has been requested
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            concurrency: self.concurrency,
            pending: self.counters.pending.load(Ordering::Relaxed),
            in_flight: self.counters.in_flight.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Command>,
    concurrency: usize,
    counters: Arc<QueueCounters>,
) {
    let slots = Arc::new(Semaphore::new(concurrency));
    let mut close_waiters = Vec::new();

    // After `Close` the channel stops accepting sends, but tasks that slipped
    // in behind it were already accepted and still run before the loop ends.
    while let Some(command) = rx.recv().await {
        match command {
            Command::Run(job) => {
                let Ok(permit) = slots.clone().acquire_owned().await else {
                    break;
                };

                counters.pending.fetch_sub(1, Ordering::SeqCst);
                counters.in_flight.fetch_add(1, Ordering::SeqCst);
                QueueMetrics::set_pending(counters.pending.load(Ordering::SeqCst));
                QueueMetrics::set_in_flight(counters.in_flight.load(Ordering::SeqCst));

                let counters = counters.clone();
                tokio::spawn(async move {
                    let outcome = AssertUnwindSafe(async move { job().await })
                        .catch_unwind()
                        .await;
                    if outcome.is_err() {
                        counters.panicked.fetch_add(1, Ordering::SeqCst);
                        QueueMetrics::record_panic();
                        tracing::error!("Queued task panicked; continuing with next task");
                    }

                    counters.completed.fetch_add(1, Ordering::SeqCst);
                    counters.in_flight.fetch_sub(1, Ordering::SeqCst);
                    QueueMetrics::set_in_flight(counters.in_flight.load(Ordering::SeqCst));
                    drop(permit);
                });
            }
            Command::Close(done) => {
                rx.close();
                close_waiters.push(done);
            }
        }
    }

    // Every task has started; holding every permit means they settled.
    let _ = slots.acquire_many(concurrency as u32).await;
    for done in close_waiters {
        let _ = done.send(());
    }
}
