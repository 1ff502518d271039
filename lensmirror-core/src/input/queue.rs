//! Serial configuration queue
//!
//! A single named worker thread that runs jobs in submission order. Every
//! write to the capture connection and every input swap goes through it,
//! so no two hardware reconfigurations can interleave.

use std::sync::mpsc;
use std::thread::{JoinHandle, ThreadId};
use tracing::{debug, error};

use crate::error::{MirrorError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Serial job queue backed by a dedicated thread
pub struct ConfigurationQueue {
    job_tx: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
}

impl ConfigurationQueue {
    /// Spawn the worker thread
    pub fn new(label: &str) -> Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();

        let worker = std::thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    job();
                }
                debug!("Configuration queue drained");
            })
            .map_err(|e| {
                MirrorError::session(format!("Failed to spawn configuration thread: {}", e))
            })?;

        Ok(Self {
            job_tx: Some(job_tx),
            worker_id: worker.thread().id(),
            worker: Some(worker),
        })
    }

    /// Whether the caller is running on the queue's worker thread
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.worker_id
    }

    /// Queue a job without waiting for it
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        self.job_tx
            .as_ref()
            .ok_or(MirrorError::QueueClosed)?
            .send(Box::new(job))
            .map_err(|_| MirrorError::QueueClosed)
    }

    /// Queue a job and block until it has run, returning its result
    ///
    /// Runs inline when called from the worker itself.
    pub fn dispatch_sync<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.is_current() {
            return Ok(job());
        }

        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        self.dispatch(move || {
            let _ = reply_tx.send(job());
        })?;

        reply_rx.recv().map_err(|_| MirrorError::QueueClosed)
    }

    /// Block until every job queued so far has run
    pub fn flush(&self) -> Result<()> {
        self.dispatch_sync(|| ())
    }
}

impl Drop for ConfigurationQueue {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once pending jobs ran
        self.job_tx.take();

        if let Some(worker) = self.worker.take() {
            if self.is_current() {
                return;
            }
            if worker.join().is_err() {
                error!("Configuration thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_jobs_run_in_order() {
        let queue = ConfigurationQueue::new("test-config").unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..50 {
            let log = Arc::clone(&log);
            queue.dispatch(move || log.lock().push(i)).unwrap();
        }
        queue.flush().unwrap();

        let log = log.lock();
        assert_eq!(*log, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_dispatch_sync_returns_value() {
        let queue = ConfigurationQueue::new("test-config").unwrap();
        let value = queue.dispatch_sync(|| 21 * 2).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_jobs_run_on_worker_thread() {
        let queue = Arc::new(ConfigurationQueue::new("test-config").unwrap());
        assert!(!queue.is_current());

        let inner = Arc::clone(&queue);
        let on_worker = queue.dispatch_sync(move || inner.is_current()).unwrap();
        assert!(on_worker);
    }

    #[test]
    fn test_nested_sync_dispatch_runs_inline() {
        let queue = Arc::new(ConfigurationQueue::new("test-config").unwrap());
        let inner = Arc::clone(&queue);
        let value = queue
            .dispatch_sync(move || inner.dispatch_sync(|| "inline").unwrap())
            .unwrap();
        assert_eq!(value, "inline");
    }
}
