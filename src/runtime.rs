// SPDX-License-Identifier: MPL-2.0

//! Shared async runtime for all network operations, plus the single worker
//! thread that applies response data to the local store.
//!
//! Network requests run on the Tokio runtime. Anything that reads or writes
//! the store as a consequence of a response is queued on [`StoreWorker`], so
//! those mutations are applied one at a time in arrival order.

use once_cell::sync::Lazy;
use std::future::Future;
use std::thread;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Shared multi-threaded Tokio runtime for all async operations.
/// Using 2 worker threads is sufficient for I/O-bound network operations.
static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("reader-async")
        .build()
        .expect("failed to create async runtime")
});

/// Execute a future on the shared runtime, blocking until completion.
/// Use this from synchronous code that needs to call async functions.
pub fn block_on<F: Future>(future: F) -> F::Output {
    RUNTIME.block_on(future)
}

/// Spawn a future on the shared runtime without blocking.
/// Returns a JoinHandle that can be used to await the result.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    RUNTIME.spawn(future)
}

#[derive(Error, Debug)]
#[error("store worker has stopped")]
pub struct WorkerStopped;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single-consumer queue of store jobs backed by one dedicated thread.
///
/// Cloning the handle shares the same queue. The thread exits once every
/// handle has been dropped and the queue is drained.
#[derive(Clone)]
pub struct StoreWorker {
    tx: mpsc::UnboundedSender<Job>,
}

impl StoreWorker {
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let spawned = thread::Builder::new()
            .name("reader-store".to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    job();
                }
                debug!("store worker drained, exiting");
            });

        if let Err(e) = spawned {
            // The receiver was moved into the failed closure and dropped, so
            // every later `run` reports WorkerStopped instead of hanging.
            warn!(error = %e, "failed to start store worker thread");
        }

        Self { tx }
    }

    /// Queue `job` and wait for its result.
    pub async fn run<F, T>(&self, job: F) -> Result<T, WorkerStopped>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(Box::new(move || {
                let _ = done_tx.send(job());
            }))
            .map_err(|_| WorkerStopped)?;
        done_rx.await.map_err(|_| WorkerStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_jobs_run_in_submission_order() {
        let worker = StoreWorker::start();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut pending = Vec::new();
        for i in 0..10 {
            let seen = seen.clone();
            pending.push(worker.run(move || seen.lock().unwrap().push(i)));
        }
        for job in pending {
            job.await.unwrap();
        }

        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_job_result_is_returned() {
        let worker = StoreWorker::start();
        let value = worker.run(|| 6 * 7).await.unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_spawn_on_shared_runtime() {
        let handle = spawn(async { "done" });
        assert_eq!(block_on(handle).unwrap(), "done");
    }
}
