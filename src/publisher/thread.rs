//! Dedicated thread running a publisher worker.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::error;

use super::worker::{PublisherWorker, WorkerStats};
use crate::broker::Broker;

/// Handle to a running publisher worker thread.
///
/// ## Example
///
/// ```ignore
/// let handle = PublisherWorker::new("events", "events", broker, candidates, queue).spawn()?;
///
/// // ... events flow ...
///
/// let stats = handle.stop();
/// println!("Published {} messages", stats.messages_published);
/// ```
pub struct WorkerHandle {
    profile: String,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<WorkerStats>>,
}

impl<B: Broker> PublisherWorker<B> {
    /// Move the worker onto its own thread.
    pub fn spawn(self) -> io::Result<WorkerHandle> {
        let profile = self.profile().to_string();
        let running = self.running();
        running.store(true, Ordering::Release);

        let handle = thread::Builder::new()
            .name(format!("publisher-{profile}"))
            .spawn(move || self.run())?;

        Ok(WorkerHandle {
            profile,
            running,
            handle: Some(handle),
        })
    }
}

impl WorkerHandle {
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Whether the worker loop is still supposed to run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Signal the worker to stop without waiting.
    pub fn signal_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Signal the worker to stop and wait for it to finish.
    /// Returns the worker statistics.
    pub fn stop(mut self) -> WorkerStats {
        self.join()
    }

    fn join(&mut self) -> WorkerStats {
        self.signal_stop();
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                error!(profile = %self.profile, "publisher worker panicked");
                WorkerStats::default()
            }),
            None => WorkerStats::default(),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Shared state may only be released once the worker is gone.
        self.join();
    }
}
