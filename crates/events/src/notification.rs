use serde::{Deserialize, Serialize};

use printfloor_core::EntityClass;

/// Kind of row change reported by the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// A change notification for one row of an entity class.
///
/// Notifications are a *trigger*, never a patch: receivers re-fetch the whole
/// class snapshot instead of applying the row they were told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    class: EntityClass,
    key: String,
    kind: ChangeKind,
}

impl ChangeNotification {
    pub fn new(class: EntityClass, key: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            class,
            key: key.into(),
            kind,
        }
    }

    pub fn class(&self) -> EntityClass {
        self.class
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }
}

/// Messages scoped to a single entity class.
///
/// Lets workers filter a shared stream down to the classes they watch.
pub trait ClassScoped {
    fn class(&self) -> EntityClass;
}

impl ClassScoped for ChangeNotification {
    fn class(&self) -> EntityClass {
        self.class
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_lowercase_kind() {
        let n = ChangeNotification::new(EntityClass::Stock, "PLA::Red", ChangeKind::Updated);
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["kind"], "updated");
        assert_eq!(json["class"], "stock");

        let back: ChangeNotification = serde_json::from_value(json).unwrap();
        assert_eq!(back, n);
    }
}
