//! Background jobs and cooperative cancellation.
//!
//! Long operations (catalog builds, commits, checkout preparation, builds)
//! run on a named worker thread via [`Worker::spawn`]. They poll a shared
//! [`CancelToken`] at safe points; nothing is ever killed mid-step.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Worker;

impl Worker {
    /// Run `job` on a thread named `name`; the result arrives over a channel.
    pub fn spawn<T, F>(name: &str, job: F) -> std::io::Result<JobHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let label = name.to_string();
        thread::Builder::new().name(label.clone()).spawn(move || {
            tracing::debug!(worker = %label, "job started");
            // The receiver may be gone if the caller stopped waiting.
            let _ = tx.send(job());
            tracing::debug!(worker = %label, "job finished");
        })?;
        Ok(JobHandle {
            name: name.to_string(),
            rx,
        })
    }
}

/// Receiving end of a spawned job.
pub struct JobHandle<T> {
    name: String,
    rx: Receiver<T>,
}

impl<T> JobHandle<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the job completes. `None` if the job panicked.
    pub fn wait(self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Poll for completion without blocking.
    ///
    /// `Ok(None)` while the job is still running, `Err(())` if it panicked.
    #[allow(clippy::result_unit_err)]
    pub fn try_result(&self) -> Result<Option<T>, ()> {
        match self.rx.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn job_result_is_delivered() {
        let handle = Worker::spawn("sum", || (1..=10).sum::<u32>()).unwrap();
        assert_eq!(handle.name(), "sum");
        assert_eq!(handle.wait(), Some(55));
    }

    #[test]
    fn job_runs_on_named_thread() {
        let handle =
            Worker::spawn("kmgr-probe", || thread::current().name().map(str::to_string)).unwrap();
        assert_eq!(handle.wait().flatten().as_deref(), Some("kmgr-probe"));
    }

    #[test]
    fn try_result_polls_until_done() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = Worker::spawn("gated", move || {
            release_rx.recv().ok();
            7
        })
        .unwrap();
        assert_eq!(handle.try_result(), Ok(None));

        release_tx.send(()).unwrap();
        let mut result = Ok(None);
        for _ in 0..200 {
            result = handle.try_result();
            if result != Ok(None) {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(result, Ok(Some(7)));
    }

    #[test]
    fn job_observes_cancellation() {
        let token = CancelToken::new();
        let job_token = token.clone();
        token.cancel();
        let handle = Worker::spawn("cancellable", move || {
            if job_token.is_cancelled() { "skipped" } else { "ran" }
        })
        .unwrap();
        assert_eq!(handle.wait(), Some("skipped"));
    }

    #[test]
    fn panicking_job_reports_none() {
        let handle = Worker::spawn("boom", || -> u8 { panic!("job failed") }).unwrap();
        assert_eq!(handle.wait(), None);
    }
}
