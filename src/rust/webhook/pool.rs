//! Bounded pool of worker tasks for webhook jobs.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("worker queue is full")]
    QueueFull,
    #[error("worker pool is shut down")]
    Closed,
}

/// A fixed number of workers draining a bounded job queue.
///
/// Each job runs in its own task so a panicking job is logged without taking its
/// worker down. Jobs are not ordered relative to each other.
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    submitted: AtomicUsize,
    rejected: AtomicUsize,
}

impl WorkerPool {
    /// Starts `concurrency` workers over a queue of `capacity` jobs. Both are at least 1.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(concurrency: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let workers = (0..concurrency.max(1))
            .map(|id| tokio::spawn(run_worker(id, rx.clone())))
            .collect();
        log::info!(
            "worker pool started: {} workers, queue capacity {}",
            concurrency.max(1),
            capacity.max(1)
        );
        Self {
            sender: Mutex::new(Some(tx)),
            workers: tokio::sync::Mutex::new(workers),
            submitted: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
        }
    }

    /// Queues `job` without waiting. Fails when the queue is full or the pool is closed.
    pub fn submit<F>(&self, job: F) -> Result<(), SubmitError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let result = match self.sender.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(tx) => tx.try_send(Box::pin(job)).map_err(|e| match e {
                    TrySendError::Full(_) => SubmitError::QueueFull,
                    TrySendError::Closed(_) => SubmitError::Closed,
                }),
                None => Err(SubmitError::Closed),
            },
            Err(_) => Err(SubmitError::Closed),
        };
        match result {
            Ok(()) => self.submitted.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.rejected.fetch_add(1, Ordering::Relaxed),
        };
        result
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Stops intake, then waits for the workers to finish every queued job.
    pub async fn shutdown(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                log::error!("worker exited abnormally: {}", e);
            }
        }
        log::info!(
            "worker pool stopped ({} jobs accepted, {} rejected)",
            self.submitted(),
            self.rejected()
        );
    }
}

async fn run_worker(id: usize, queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = queue.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };
        if let Err(e) = tokio::spawn(job).await {
            if e.is_panic() {
                log::error!("worker {}: job panicked: {}", id, e);
            } else {
                log::warn!("worker {}: job cancelled: {}", id, e);
            }
        }
    }
    log::debug!("worker {} stopped", id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_runs_jobs_and_drains_on_shutdown() {
        let pool = WorkerPool::new(2, 16);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let done = done.clone();
            pool.submit(async move {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert_eq!(pool.submitted(), 10);
        assert_eq!(pool.submit(async {}), Err(SubmitError::Closed));
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let pool = WorkerPool::new(1, 1);
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());

        let (g, s) = (gate.clone(), started.clone());
        pool.submit(async move {
            s.notify_one();
            g.notified().await;
        })
        .unwrap();
        // The single worker is now busy with the first job.
        started.notified().await;

        pool.submit(async {}).unwrap();
        assert_eq!(pool.submit(async {}), Err(SubmitError::QueueFull));
        assert_eq!(pool.rejected(), 1);

        gate.notify_one();
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_panicking_job_keeps_worker_alive() {
        let pool = WorkerPool::new(1, 4);
        let done = Arc::new(AtomicUsize::new(0));
        pool.submit(async { panic!("boom") }).unwrap();
        let d = done.clone();
        pool.submit(async move {
            d.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        pool.shutdown().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
