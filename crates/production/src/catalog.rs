//! Collaborator seams: the color catalog and the machine operator roster.
//!
//! Both are owned by other parts of the system (catalog manager, operator
//! assignment screen). The orchestrator only asks them yes/no questions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Placeholder operator assigned to a machine nobody is running.
pub const LINE_FREE_OPERATOR: &str = "Line Free";

/// Answers whether a color exists for a material type.
pub trait ColorCatalog: Send + Sync {
    fn is_known_color(&self, material_type: &str, color: &str) -> bool;
}

/// Answers whether an operator name denotes the "line free" state.
pub trait OperatorRoster: Send + Sync {
    fn is_line_free(&self, operator: &str) -> bool;
}

impl<T: ColorCatalog + ?Sized> ColorCatalog for Arc<T> {
    fn is_known_color(&self, material_type: &str, color: &str) -> bool {
        (**self).is_known_color(material_type, color)
    }
}

impl<T: OperatorRoster + ?Sized> OperatorRoster for Arc<T> {
    fn is_line_free(&self, operator: &str) -> bool {
        (**self).is_line_free(operator)
    }
}

/// Fixed color catalog, e.g. loaded once at station start-up.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    colors: BTreeMap<String, BTreeSet<String>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_colors<I, S>(mut self, material_type: impl Into<String>, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.colors
            .entry(material_type.into())
            .or_default()
            .extend(colors.into_iter().map(Into::into));
        self
    }

    pub fn material_types(&self) -> impl Iterator<Item = &str> {
        self.colors.keys().map(String::as_str)
    }

    pub fn colors_of(&self, material_type: &str) -> impl Iterator<Item = &str> {
        self.colors
            .get(material_type)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }
}

impl ColorCatalog for StaticCatalog {
    fn is_known_color(&self, material_type: &str, color: &str) -> bool {
        self.colors
            .get(material_type)
            .is_some_and(|set| set.contains(color))
    }
}

/// Roster that only knows the reserved "line free" name.
#[derive(Debug, Copy, Clone, Default)]
pub struct LineFreeRoster;

impl OperatorRoster for LineFreeRoster {
    fn is_line_free(&self, operator: &str) -> bool {
        operator.trim() == LINE_FREE_OPERATOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_scopes_colors_by_material_type() {
        let catalog = StaticCatalog::new()
            .with_colors("PLA", ["Red", "Blue"])
            .with_colors("PETG", ["Black"]);

        assert!(catalog.is_known_color("PLA", "Red"));
        assert!(!catalog.is_known_color("PETG", "Red"));
        assert!(!catalog.is_known_color("ABS", "Red"));
        assert_eq!(catalog.colors_of("PLA").collect::<Vec<_>>(), vec!["Blue", "Red"]);
    }

    #[test]
    fn only_the_reserved_name_is_line_free() {
        assert!(LineFreeRoster.is_line_free("Line Free"));
        assert!(!LineFreeRoster.is_line_free("Ana"));
    }
}
