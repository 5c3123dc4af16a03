use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

use tracing::{debug, warn};

use crate::label_counter::LabelCounter;
use crate::store::RemoteStore;

use super::{TICK, WorkerHandle, shutdown_requested};

/// Handle to the rollover worker: signal it, observe it, stop it.
#[derive(Debug)]
pub struct RolloverWorkerHandle {
    trigger: mpsc::Sender<()>,
    passes: Arc<AtomicU64>,
    worker: WorkerHandle,
}

impl RolloverWorkerHandle {
    /// Ask for a reconciliation pass. Returns `false` once the worker is gone.
    pub fn signal(&self) -> bool {
        self.trigger.send(()).is_ok()
    }

    /// Completed reconciliation passes (successful or not).
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    pub fn shutdown(self) {
        self.worker.shutdown();
    }
}

/// Runs label-counter reconciliation off the print path.
///
/// Signals that pile up while a pass is running are coalesced into one
/// follow-up pass; reconciliation reads the counters fresh each time, so a
/// single pass covers every increment before it.
#[derive(Debug)]
pub struct RolloverWorker;

impl RolloverWorker {
    pub fn spawn<S>(counter: LabelCounter<S>) -> RolloverWorkerHandle
    where
        S: RemoteStore + 'static,
    {
        let (trigger_tx, trigger_rx) = mpsc::channel::<()>();
        let passes = Arc::new(AtomicU64::new(0));
        let worker_passes = passes.clone();

        let worker = WorkerHandle::spawn("rollover-worker", move |shutdown_rx| {
            worker_loop(&counter, &trigger_rx, &shutdown_rx, &worker_passes)
        });

        RolloverWorkerHandle {
            trigger: trigger_tx,
            passes,
            worker,
        }
    }
}

fn worker_loop<S: RemoteStore>(
    counter: &LabelCounter<S>,
    trigger_rx: &mpsc::Receiver<()>,
    shutdown_rx: &mpsc::Receiver<()>,
    passes: &AtomicU64,
) {
    loop {
        if shutdown_requested(shutdown_rx) {
            break;
        }

        match trigger_rx.recv_timeout(TICK) {
            Ok(()) => {
                while trigger_rx.try_recv().is_ok() {}

                match counter.reconcile() {
                    Ok(outcome) if outcome.is_noop() => debug!("no label rolls to deduct"),
                    Ok(outcome) => debug!(
                        small = outcome.rolls_small_deducted,
                        large = outcome.rolls_large_deducted,
                        "rollover pass applied"
                    ),
                    Err(err) => warn!(error = %err, "rollover pass failed"),
                }
                passes.fetch_add(1, Ordering::SeqCst);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    use printfloor_core::EntityClass;

    use crate::config::PackagingItems;
    use crate::store::InMemoryRemoteStore;
    use crate::store::row::quantity_row;

    #[test]
    fn signal_triggers_a_reconciliation_pass() {
        let store = Arc::new(InMemoryRemoteStore::new());
        store
            .upsert(EntityClass::Counters, "small", quantity_row(1500).unwrap())
            .unwrap();
        let counter = LabelCounter::new(store.clone(), PackagingItems::default(), 1000);
        let handle = RolloverWorker::spawn(counter.clone());

        assert!(handle.signal());

        let deadline = Instant::now() + Duration::from_secs(2);
        while handle.passes() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        assert!(handle.passes() >= 1);
        assert_eq!(counter.get().unwrap().small, 500);
        handle.shutdown();
    }

    #[test]
    fn shutdown_stops_the_thread() {
        let counter = LabelCounter::new(
            Arc::new(InMemoryRemoteStore::new()),
            PackagingItems::default(),
            1000,
        );
        let handle = RolloverWorker::spawn(counter);
        assert!(handle.is_running());
        handle.shutdown();
    }
}
