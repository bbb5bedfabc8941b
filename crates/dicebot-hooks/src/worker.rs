//! Single-consumer scripting worker.
//!
//! Scripted hooks are not safe to run concurrently, so every one of them is
//! queued onto one dedicated blocking thread that drains jobs in order.

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{HookError, HookResult};
use crate::panic::install_backtrace_capture;

/// A queued unit of scripted work. Completion is reported by the job itself.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the scripting worker. Dropping every handle stops the worker
/// once its queue drains.
#[derive(Debug, Clone)]
pub struct ScriptWorker {
    tx: mpsc::Sender<Job>,
}

impl ScriptWorker {
    /// Start the worker on the blocking pool of the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(queue_capacity: usize) -> Self {
        install_backtrace_capture();
        let (tx, mut rx) = mpsc::channel::<Job>(queue_capacity.max(1));
        tokio::task::spawn_blocking(move || {
            debug!("Scripting worker started");
            while let Some(job) = rx.blocking_recv() {
                job();
            }
            debug!("Scripting worker stopped");
        });
        Self { tx }
    }

    /// Queue a job, waiting for space if the queue is full.
    pub(crate) async fn submit(&self, job: Job) -> HookResult<()> {
        self.tx.send(job).await.map_err(|_| HookError::WorkerClosed)
    }

    /// Whether the worker has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
