use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use printfloor_core::EntityClass;
use printfloor_events::{ChangeKind, ChangeNotification, EventBus, InMemoryEventBus, Subscription};
use printfloor_inventory::apply_delta;

use super::row::{quantity_or_zero, quantity_row};
use super::r#trait::{ClassRows, RemoteStore, Row, StoreError};

/// In-process remote store.
///
/// Intended for tests/dev and single-station setups. Each entity class has its
/// own notification bus. The atomic primitive can be switched off to exercise
/// the read-modify-write fallback, and the store can be taken "offline" to
/// simulate transient backend failures.
#[derive(Debug)]
pub struct InMemoryRemoteStore {
    classes: RwLock<HashMap<EntityClass, ClassRows>>,
    buses: HashMap<EntityClass, InMemoryEventBus<ChangeNotification>>,
    atomic_adjust: bool,
    offline: AtomicBool,
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(HashMap::new()),
            buses: EntityClass::ALL
                .into_iter()
                .map(|class| (class, InMemoryEventBus::new()))
                .collect(),
            atomic_adjust: true,
            offline: AtomicBool::new(false),
        }
    }

    /// A store lacking the server-side atomic primitive.
    pub fn without_atomic_adjust() -> Self {
        Self {
            atomic_adjust: false,
            ..Self::new()
        }
    }

    /// While offline every operation fails with [`StoreError::Backend`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Close every subscription of a class, as a dropped connection would.
    pub fn disconnect_subscribers(&self, class: EntityClass) {
        if let Some(bus) = self.buses.get(&class) {
            bus.disconnect_all();
        }
    }

    pub fn subscriber_count(&self, class: EntityClass) -> usize {
        self.buses.get(&class).map(|b| b.subscriber_count()).unwrap_or(0)
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store is offline".to_string()));
        }
        Ok(())
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("lock poisoned".to_string())
    }

    fn notify(&self, class: EntityClass, key: &str, kind: ChangeKind) {
        if let Some(bus) = self.buses.get(&class) {
            // Publishing only fails on a poisoned bus; subscribers still poll.
            if let Err(err) = bus.publish(ChangeNotification::new(class, key, kind)) {
                debug!(class = %class, key, error = ?err, "change notification dropped");
            }
        }
    }
}

impl RemoteStore for InMemoryRemoteStore {
    fn upsert(&self, class: EntityClass, key: &str, row: Row) -> Result<(), StoreError> {
        self.ensure_online()?;
        let previous = {
            let mut classes = self.classes.write().map_err(|_| Self::poisoned())?;
            classes.entry(class).or_default().insert(key.to_string(), row)
        };

        let kind = if previous.is_some() {
            ChangeKind::Updated
        } else {
            ChangeKind::Inserted
        };
        self.notify(class, key, kind);
        Ok(())
    }

    fn get(&self, class: EntityClass, key: &str) -> Result<Option<Row>, StoreError> {
        self.ensure_online()?;
        let classes = self.classes.read().map_err(|_| Self::poisoned())?;
        Ok(classes.get(&class).and_then(|rows| rows.get(key)).cloned())
    }

    fn snapshot(&self, class: EntityClass) -> Result<ClassRows, StoreError> {
        self.ensure_online()?;
        let classes = self.classes.read().map_err(|_| Self::poisoned())?;
        Ok(classes.get(&class).cloned().unwrap_or_default())
    }

    fn supports_atomic_adjust(&self) -> bool {
        self.atomic_adjust
    }

    fn atomic_adjust(&self, class: EntityClass, key: &str, delta: i64) -> Result<u64, StoreError> {
        if !self.atomic_adjust {
            return Err(StoreError::Unsupported("atomic adjust"));
        }
        self.ensure_online()?;

        // The write lock spans read and write, which is what makes it atomic.
        let (next, existed) = {
            let mut classes = self.classes.write().map_err(|_| Self::poisoned())?;
            let rows = classes.entry(class).or_default();
            let existed = rows.contains_key(key);
            let current = quantity_or_zero(rows.get(key))?;
            let next = apply_delta(current, delta);
            rows.insert(key.to_string(), quantity_row(next)?);
            (next, existed)
        };

        let kind = if existed {
            ChangeKind::Updated
        } else {
            ChangeKind::Inserted
        };
        self.notify(class, key, kind);
        Ok(next)
    }

    fn subscribe(&self, class: EntityClass) -> Result<Subscription<ChangeNotification>, StoreError> {
        self.ensure_online()?;
        self.buses
            .get(&class)
            .map(|bus| bus.subscribe())
            .ok_or_else(|| StoreError::Backend(format!("no channel for {class}")))
    }

    fn append_only(&self, class: EntityClass, key: &str, row: Row) -> Result<(), StoreError> {
        self.ensure_online()?;
        {
            let mut classes = self.classes.write().map_err(|_| Self::poisoned())?;
            let rows = classes.entry(class).or_default();
            if rows.contains_key(key) {
                return Err(StoreError::Duplicate {
                    class,
                    key: key.to_string(),
                });
            }
            rows.insert(key.to_string(), row);
        }

        self.notify(class, key, ChangeKind::Inserted);
        Ok(())
    }

    fn remove(&self, class: EntityClass, keys: &[String]) -> Result<usize, StoreError> {
        self.ensure_online()?;
        let removed: Vec<&String> = {
            let mut classes = self.classes.write().map_err(|_| Self::poisoned())?;
            let removed = match classes.get_mut(&class) {
                Some(rows) => keys.iter().filter(|k| rows.remove(k.as_str()).is_some()).collect(),
                None => Vec::new(),
            };
            removed
        };

        for key in &removed {
            self.notify(class, key, ChangeKind::Deleted);
        }
        Ok(removed.len())
    }
}
