use std::marker::PhantomData;

use tracing::{debug, warn};

use printfloor_core::{EntityClass, FloorResult};
use printfloor_events::Event;
use printfloor_production::ProductionEvent;

use crate::store::{ClassRows, RemoteStore, StoreError};

/// Events kept in the remote log unless configured otherwise.
pub const EVENT_RETENTION: usize = 1000;

/// Append-only event log stored in [`EntityClass::ProductionEvents`].
///
/// The log is capped: after every append the oldest events beyond the
/// retention limit are deleted from the store.
#[derive(Debug)]
pub struct EventLog<S, E = ProductionEvent> {
    store: S,
    retention: usize,
    _event: PhantomData<fn() -> E>,
}

impl<S: Clone, E> Clone for EventLog<S, E> {
    fn clone(&self) -> Self {
        Self::new(self.store.clone()).with_retention(self.retention)
    }
}

impl<S, E> EventLog<S, E> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            retention: EVENT_RETENTION,
            _event: PhantomData,
        }
    }

    /// Keep at most `retention` events (at least one).
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn retention(&self) -> usize {
        self.retention
    }
}

impl<S, E> EventLog<S, E>
where
    S: RemoteStore,
    E: Event,
{
    /// Append once; a second append under the same key is a `BackendError`.
    ///
    /// Pruning runs after the append has landed. A failed prune is logged and
    /// retried by the next append; it never fails this call.
    pub fn append(&self, event: &E) -> FloorResult<()> {
        let key = event.log_key();
        let row = serde_json::to_value(event).map_err(StoreError::from)?;
        self.store
            .append_only(EntityClass::ProductionEvents, &key, row)?;
        debug!(
            key = %key,
            event_type = E::EVENT_TYPE,
            version = E::VERSION,
            "event appended"
        );

        if let Err(err) = self.prune() {
            warn!(error = %err, retention = self.retention, "event log prune failed");
        }
        Ok(())
    }

    /// Delete the oldest events beyond the retention limit; returns how many
    /// were deleted.
    pub fn prune(&self) -> FloorResult<usize> {
        let rows = self.store.snapshot(EntityClass::ProductionEvents)?;
        if rows.len() <= self.retention {
            return Ok(0);
        }

        let expired: Vec<String> = decode_keyed::<E>(&rows)
            .into_iter()
            .skip(self.retention)
            .map(|(key, _)| key)
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }

        let removed = self
            .store
            .remove(EntityClass::ProductionEvents, &expired)?;
        debug!(removed, retention = self.retention, "event log pruned");
        Ok(removed)
    }

    pub fn get(&self, key: &str) -> FloorResult<Option<E>> {
        let row = self.store.get(EntityClass::ProductionEvents, key)?;
        Ok(row.and_then(|r| serde_json::from_value(r).ok()))
    }

    /// Up to `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> FloorResult<Vec<E>> {
        let rows = self.store.snapshot(EntityClass::ProductionEvents)?;
        let mut events = decode_events(&rows);
        events.truncate(limit);
        Ok(events)
    }
}

/// Decode event rows, newest first. Undecodable rows are skipped.
pub fn decode_events<E: Event>(rows: &ClassRows) -> Vec<E> {
    decode_keyed(rows).into_iter().map(|(_, ev)| ev).collect()
}

fn decode_keyed<E: Event>(rows: &ClassRows) -> Vec<(String, E)> {
    let mut events: Vec<(String, E)> = rows
        .iter()
        .filter_map(|(key, row)| match serde_json::from_value(row.clone()) {
            Ok(ev) => Some((key.clone(), ev)),
            Err(err) => {
                warn!(key = %key, event_type = E::EVENT_TYPE, error = %err, "skipping malformed event");
                None
            }
        })
        .collect();

    // Keys are time-ordered ids, which breaks ties within one timestamp.
    events.sort_by(|(ka, a), (kb, b)| {
        b.occurred_at()
            .cmp(&a.occurred_at())
            .then_with(|| kb.cmp(ka))
    });
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use printfloor_core::{EventId, MachineId};
    use printfloor_production::PrintRequest;

    use crate::store::InMemoryRemoteStore;

    fn event(minutes_ago: i64) -> ProductionEvent {
        let req = PrintRequest::new(MachineId::new(1), "PLA", "Red", "Ana", 1);
        ProductionEvent::from_request(&req, EventId::new(), Utc::now() - Duration::minutes(minutes_ago))
    }

    #[test]
    fn recent_returns_newest_first_up_to_limit() {
        let log: EventLog<_> = EventLog::new(InMemoryRemoteStore::new());
        let old = event(30);
        let mid = event(20);
        let new = event(10);
        for ev in [&mid, &old, &new] {
            log.append(ev).unwrap();
        }

        let recent = log.recent(2).unwrap();
        assert_eq!(recent, vec![new, mid]);
    }

    #[test]
    fn append_prunes_the_oldest_events_beyond_retention() {
        let store = Arc::new(InMemoryRemoteStore::new());
        let log: EventLog<_> = EventLog::new(store.clone()).with_retention(3);
        let events: Vec<ProductionEvent> = (0..5).rev().map(event).collect();
        for ev in &events {
            log.append(ev).unwrap();
        }

        assert_eq!(store.snapshot(EntityClass::ProductionEvents).unwrap().len(), 3);
        let kept = log.recent(10).unwrap();
        assert_eq!(kept, vec![events[4].clone(), events[3].clone(), events[2].clone()]);
        assert_eq!(log.get(&events[0].log_key()).unwrap(), None);
    }

    #[test]
    fn remote_log_stays_at_the_default_retention() {
        let store = Arc::new(InMemoryRemoteStore::new());
        let log: EventLog<_> = EventLog::new(store.clone());
        for _ in 0..EVENT_RETENTION + 100 {
            log.append(&event(0)).unwrap();
        }
        assert_eq!(
            store.snapshot(EntityClass::ProductionEvents).unwrap().len(),
            EVENT_RETENTION
        );
    }

    #[test]
    fn events_are_never_overwritten() {
        let log: EventLog<_> = EventLog::new(InMemoryRemoteStore::new());
        let ev = event(0);
        log.append(&ev).unwrap();
        assert!(log.append(&ev).is_err());
        assert_eq!(log.get(&ev.log_key()).unwrap(), Some(ev));
    }
}
