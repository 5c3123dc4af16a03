use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use printfloor_core::{EntityClass, FloorError, FloorResult};

use crate::store::ClassRows;

/// Locally cached copy of one entity class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassSnapshot {
    pub rows: ClassRows,
    /// Bumped on every replacement; 0 means never fetched.
    pub revision: u64,
    pub fetched_at: DateTime<Utc>,
}

/// The station's local view: one wholesale-replaced snapshot per class.
///
/// Never authoritative. Readers get clones, so a refresh never tears a read.
#[derive(Debug, Default)]
pub struct LocalView {
    classes: RwLock<HashMap<EntityClass, ClassSnapshot>>,
}

impl LocalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot of a class; returns the new revision.
    pub fn replace(&self, class: EntityClass, rows: ClassRows) -> FloorResult<u64> {
        let mut classes = self
            .classes
            .write()
            .map_err(|_| FloorError::backend("local view lock poisoned"))?;
        let revision = classes.get(&class).map(|s| s.revision).unwrap_or(0) + 1;
        classes.insert(
            class,
            ClassSnapshot {
                rows,
                revision,
                fetched_at: Utc::now(),
            },
        );
        Ok(revision)
    }

    pub fn snapshot(&self, class: EntityClass) -> Option<ClassSnapshot> {
        self.classes.read().ok()?.get(&class).cloned()
    }

    pub fn rows(&self, class: EntityClass) -> ClassRows {
        self.snapshot(class).map(|s| s.rows).unwrap_or_default()
    }

    pub fn revision(&self, class: EntityClass) -> u64 {
        self.classes
            .read()
            .ok()
            .and_then(|c| c.get(&class).map(|s| s.revision))
            .unwrap_or(0)
    }
}
