//! Realtime synchronization of a station's local view.
//!
//! Two producers feed one refresh channel:
//!
//! - **push**: one forwarder thread per watched class turns store change
//!   notifications into refresh signals
//! - **poll**: a poller thread signals the production-event log every
//!   `poll_interval`
//!
//! A single refresher thread drains the channel, coalesces signals that
//! arrive within the debounce window, and re-fetches each signalled class as a
//! whole. Notifications are never applied as patches; the fetched snapshot
//! replaces the cached one (last writer wins).

pub mod view;

use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use printfloor_core::{EntityClass, FloorError, FloorResult};
use printfloor_events::{ClassScoped, Subscription};
use printfloor_inventory::{
    CategoryKey, LabelCounters, LabelSize, LedgerSnapshot, MinimumLevels, StockAlert, StockKey,
    low_stock_alerts,
};
use printfloor_production::ProductionEvent;

use crate::config::FloorConfig;
use crate::event_log::{EVENT_RETENTION, decode_events};
use crate::ledger::decode_snapshot;
use crate::store::RemoteStore;
use crate::store::row::quantity_or_zero;
use crate::workers::{TICK, WorkerHandle, shutdown_requested};

pub use view::{ClassSnapshot, LocalView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub poll_interval: Duration,
    pub debounce: Duration,
    pub event_retention: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            debounce: Duration::from_millis(50),
            event_retention: EVENT_RETENTION,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &FloorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            debounce: config.debounce,
            event_retention: config.event_retention,
        }
    }
}

/// Keeps one station's [`LocalView`] converged with the remote store.
///
/// Dropping it stops every thread it started.
pub struct RealtimeSync<S> {
    store: S,
    view: Arc<LocalView>,
    signals: mpsc::Sender<EntityClass>,
    watchers: Mutex<HashMap<EntityClass, WorkerHandle>>,
    poller: WorkerHandle,
    refresher: WorkerHandle,
    options: SyncOptions,
}

impl<S> RealtimeSync<S>
where
    S: RemoteStore + Clone + 'static,
{
    /// Start the refresher and the poller. No class is watched yet.
    pub fn start(store: S, options: SyncOptions) -> Self {
        let view = Arc::new(LocalView::new());
        let (signal_tx, signal_rx) = mpsc::channel::<EntityClass>();

        let refresher = {
            let store = store.clone();
            let view = view.clone();
            let debounce = options.debounce;
            WorkerHandle::spawn("sync-refresher", move |shutdown_rx| {
                refresher_loop(&store, &view, &signal_rx, &shutdown_rx, debounce)
            })
        };

        let poller = {
            let signals = signal_tx.clone();
            let interval = options.poll_interval;
            WorkerHandle::spawn("sync-poller", move |shutdown_rx| {
                poller_loop(&signals, &shutdown_rx, interval)
            })
        };

        info!(
            poll_interval_ms = options.poll_interval.as_millis() as u64,
            debounce_ms = options.debounce.as_millis() as u64,
            "realtime sync started"
        );

        Self {
            store,
            view,
            signals: signal_tx,
            watchers: Mutex::new(HashMap::new()),
            poller,
            refresher,
            options,
        }
    }

    /// Subscribe to a class and schedule an initial load.
    ///
    /// Idempotent while the subscription is alive. After the subscription was
    /// lost (its forwarder exited) calling it again re-subscribes.
    pub fn watch(&self, class: EntityClass) -> FloorResult<()> {
        let mut watchers = self
            .watchers
            .lock()
            .map_err(|_| FloorError::backend("watcher registry lock poisoned"))?;

        if watchers.get(&class).is_some_and(|w| !w.is_finished()) {
            return Ok(());
        }

        let subscription = self.store.subscribe(class)?;
        let signals = self.signals.clone();
        let forwarder = WorkerHandle::spawn(format!("sync-watch-{class}"), move |shutdown_rx| {
            forward_loop(class, &subscription, &signals, &shutdown_rx)
        });

        if watchers.insert(class, forwarder).is_some() {
            info!(class = %class, "re-subscribed after lost subscription");
        } else {
            info!(class = %class, "watching");
        }
        drop(watchers);

        if self.signals.send(class).is_err() {
            debug!(class = %class, "refresher stopped; initial load not scheduled");
        }
        Ok(())
    }
}

impl<S> RealtimeSync<S>
where
    S: RemoteStore,
{
    /// Release the subscription of a class. Returns whether it was watched.
    pub fn unwatch(&self, class: EntityClass) -> bool {
        let removed = self
            .watchers
            .lock()
            .ok()
            .and_then(|mut w| w.remove(&class));

        match removed {
            Some(forwarder) => {
                forwarder.shutdown();
                info!(class = %class, "stopped watching");
                true
            }
            None => false,
        }
    }

    pub fn is_watching(&self, class: EntityClass) -> bool {
        self.watchers
            .lock()
            .map(|w| w.get(&class).is_some_and(|f| !f.is_finished()))
            .unwrap_or(false)
    }

    /// Fetch a class now, bypassing the refresh channel; returns the new revision.
    pub fn refresh_now(&self, class: EntityClass) -> FloorResult<u64> {
        refresh_class(&self.store, &self.view, class)
    }

    pub fn view(&self) -> &Arc<LocalView> {
        &self.view
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn revision(&self, class: EntityClass) -> u64 {
        self.view.revision(class)
    }

    pub fn stock(&self) -> LedgerSnapshot<StockKey> {
        decode_snapshot(&self.view.rows(EntityClass::Stock))
    }

    pub fn categories(&self) -> LedgerSnapshot<CategoryKey> {
        decode_snapshot(&self.view.rows(EntityClass::CategoryStock))
    }

    pub fn counters(&self) -> LabelCounters {
        let rows = self.view.rows(EntityClass::Counters);
        let mut counters = LabelCounters::default();
        for size in LabelSize::BOTH {
            match quantity_or_zero(rows.get(size.counter_key())) {
                Ok(value) => counters.set(size, value),
                Err(err) => warn!(size = size.counter_key(), error = %err, "malformed counter row"),
            }
        }
        counters
    }

    /// Cached production events, newest first, capped at the retention limit.
    pub fn events(&self) -> Vec<ProductionEvent> {
        let mut events = decode_events(&self.view.rows(EntityClass::ProductionEvents));
        events.truncate(self.options.event_retention);
        events
    }

    pub fn low_stock_alerts(&self, minimums: &MinimumLevels) -> Vec<StockAlert> {
        low_stock_alerts(&self.stock(), &self.categories(), minimums)
    }

    /// Stop every watcher, the poller and the refresher.
    pub fn shutdown(self) {
        let RealtimeSync {
            watchers,
            poller,
            refresher,
            ..
        } = self;

        if let Ok(watchers) = watchers.into_inner() {
            for forwarder in watchers.into_values() {
                forwarder.shutdown();
            }
        }
        poller.shutdown();
        refresher.shutdown();
        info!("realtime sync stopped");
    }
}

fn refresh_class<S>(store: &S, view: &LocalView, class: EntityClass) -> FloorResult<u64>
where
    S: RemoteStore + ?Sized,
{
    let rows = store.snapshot(class)?;
    let count = rows.len();
    let revision = view.replace(class, rows)?;
    debug!(class = %class, rows = count, revision, "class snapshot replaced");
    Ok(revision)
}

fn forward_loop<M>(
    class: EntityClass,
    subscription: &Subscription<M>,
    signals: &mpsc::Sender<EntityClass>,
    shutdown_rx: &mpsc::Receiver<()>,
) where
    M: ClassScoped,
{
    loop {
        if shutdown_requested(shutdown_rx) {
            break;
        }

        match subscription.recv_timeout(TICK) {
            Ok(notification) => {
                let changed = notification.class();
                debug!(class = %changed, "change notification");
                if signals.send(changed).is_err() {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                warn!(class = %class, "change subscription closed; watch again to resume");
                break;
            }
        }
    }
}

fn poller_loop(signals: &mpsc::Sender<EntityClass>, shutdown_rx: &mpsc::Receiver<()>, interval: Duration) {
    loop {
        if signals.send(EntityClass::ProductionEvents).is_err() {
            break;
        }
        match shutdown_rx.recv_timeout(interval) {
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            _ => break,
        }
    }
}

fn refresher_loop<S>(
    store: &S,
    view: &LocalView,
    signals: &mpsc::Receiver<EntityClass>,
    shutdown_rx: &mpsc::Receiver<()>,
    debounce: Duration,
) where
    S: RemoteStore,
{
    loop {
        if shutdown_requested(shutdown_rx) {
            break;
        }

        let first = match signals.recv_timeout(TICK) {
            Ok(class) => class,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        let mut pending = BTreeSet::from([first]);
        let deadline = Instant::now() + debounce;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match signals.recv_timeout(remaining) {
                Ok(class) => {
                    pending.insert(class);
                }
                Err(_) => break,
            }
        }

        for class in pending {
            if let Err(err) = refresh_class(store, view, class) {
                // Keep serving the previous snapshot; the next signal retries.
                warn!(class = %class, error = %err, "snapshot refresh failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use crate::ledger::StockLedger;
    use crate::store::InMemoryRemoteStore;

    fn options() -> SyncOptions {
        SyncOptions {
            poll_interval: Duration::from_millis(50),
            debounce: Duration::from_millis(5),
            event_retention: EVENT_RETENTION,
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    #[test]
    fn watch_is_idempotent_and_unwatch_releases() {
        let store = Arc::new(InMemoryRemoteStore::new());
        let sync = RealtimeSync::start(store.clone(), options());

        sync.watch(EntityClass::Stock).unwrap();
        sync.watch(EntityClass::Stock).unwrap();
        assert!(sync.is_watching(EntityClass::Stock));
        assert_eq!(store.subscriber_count(EntityClass::Stock), 1);

        assert!(sync.unwatch(EntityClass::Stock));
        assert!(!sync.unwatch(EntityClass::Stock));
        assert!(!sync.is_watching(EntityClass::Stock));
        sync.shutdown();
    }

    #[test]
    fn notifications_refresh_the_watched_class() {
        let store = Arc::new(InMemoryRemoteStore::new());
        let sync = RealtimeSync::start(store.clone(), options());
        sync.watch(EntityClass::Stock).unwrap();

        let ledger = StockLedger::new(store);
        ledger.add(&StockKey::new("PLA", "Red"), 4).unwrap();

        assert!(wait_until(|| sync.stock().get(&StockKey::new("PLA", "Red")) == Some(&4)));
        sync.shutdown();
    }

    #[test]
    fn watch_succeeds_when_the_initial_load_cannot_be_scheduled() {
        let store = Arc::new(InMemoryRemoteStore::new());
        let mut sync = RealtimeSync::start(store.clone(), options());

        // Stopping the refresher drops the receiving end of the signal channel.
        let idle = WorkerHandle::spawn("idle-refresher", |shutdown_rx| {
            let _ = shutdown_rx.recv();
        });
        std::mem::replace(&mut sync.refresher, idle).shutdown();

        sync.watch(EntityClass::Counters).unwrap();
        assert!(sync.is_watching(EntityClass::Counters));
        assert_eq!(sync.revision(EntityClass::Counters), 0);
        sync.shutdown();
    }

    #[test]
    fn refresh_now_bumps_revision() {
        let store = Arc::new(InMemoryRemoteStore::new());
        let sync = RealtimeSync::start(store, options());
        let before = sync.revision(EntityClass::Counters);
        let after = sync.refresh_now(EntityClass::Counters).unwrap();
        assert!(after > before);
        sync.shutdown();
    }

    #[test]
    fn failed_refresh_keeps_previous_snapshot() {
        let store = Arc::new(InMemoryRemoteStore::new());
        StockLedger::new(store.clone())
            .set(&StockKey::new("PLA", "Red"), 9)
            .unwrap();
        let sync = RealtimeSync::start(store.clone(), options());
        sync.refresh_now(EntityClass::Stock).unwrap();

        store.set_offline(true);
        assert!(sync.refresh_now(EntityClass::Stock).is_err());
        assert_eq!(sync.stock().get(&StockKey::new("PLA", "Red")), Some(&9));
        store.set_offline(false);
        sync.shutdown();
    }
}
