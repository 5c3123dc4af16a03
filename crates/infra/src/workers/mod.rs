//! Background worker threads.

pub mod rollover_worker;

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::error;

pub use rollover_worker::{RolloverWorker, RolloverWorkerHandle};

/// How often worker loops wake up to check for shutdown.
pub(crate) const TICK: Duration = Duration::from_millis(250);

/// Handle to control and join a background worker.
///
/// Dropping the handle stops the worker as well.
#[derive(Debug)]
pub struct WorkerHandle {
    name: String,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn a named worker thread. The body receives the shutdown receiver
    /// and must return once it yields a message or disconnects.
    pub(crate) fn spawn<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(mpsc::Receiver<()>) + Send + 'static,
    {
        let name = name.into();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || body(shutdown_rx))
            .expect("failed to spawn worker thread");

        Self {
            name,
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker thread has exited (on its own or after shutdown).
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|j| j.is_finished())
    }

    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                error!(worker = %self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Whether the loop should exit: shutdown requested or its sender gone.
pub(crate) fn shutdown_requested(shutdown_rx: &mpsc::Receiver<()>) -> bool {
    !matches!(shutdown_rx.try_recv(), Err(mpsc::TryRecvError::Empty))
}
