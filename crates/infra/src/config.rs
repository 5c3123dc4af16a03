//! Station configuration, read from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `PRINTFLOOR_STORE` (`memory` / `redis`) | unset: no store |
//! | `PRINTFLOOR_REDIS_URL` | required for `redis` |
//! | `PRINTFLOOR_LABEL_THRESHOLD` | `1000` |
//! | `PRINTFLOOR_POLL_INTERVAL_MS` | `2000` |
//! | `PRINTFLOOR_DEBOUNCE_MS` | `50` |
//! | `PRINTFLOOR_ROLLOVER` (`inline` / `background`) | `background` |
//! | `PRINTFLOOR_EVENT_RETENTION` | `1000` |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use printfloor_inventory::{CategoryKey, LABEL_ROLL_THRESHOLD, LabelSize};

use crate::event_log::EVENT_RETENTION;

pub const STORE_VAR: &str = "PRINTFLOOR_STORE";
pub const REDIS_URL_VAR: &str = "PRINTFLOOR_REDIS_URL";
pub const LABEL_THRESHOLD_VAR: &str = "PRINTFLOOR_LABEL_THRESHOLD";
pub const POLL_INTERVAL_VAR: &str = "PRINTFLOOR_POLL_INTERVAL_MS";
pub const DEBOUNCE_VAR: &str = "PRINTFLOOR_DEBOUNCE_MS";
pub const ROLLOVER_VAR: &str = "PRINTFLOOR_ROLLOVER";
pub const EVENT_RETENTION_VAR: &str = "PRINTFLOOR_EVENT_RETENTION";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Which backend holds the shared state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Nothing configured; every store call fails with `BackendUnavailable`.
    Unconfigured,
    Memory,
    Redis { url: String },
}

/// Where label-counter reconciliation runs after a print.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloverMode {
    /// Right after the counter increment, on the caller's thread.
    Inline,
    /// On a dedicated worker thread, coalescing bursts of prints.
    Background,
}

/// Packaging items consumed by printing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingItems {
    pub box_item: CategoryKey,
    pub sealed_bag: CategoryKey,
    pub small_label_roll: CategoryKey,
    pub large_label_roll: CategoryKey,
}

impl Default for PackagingItems {
    fn default() -> Self {
        Self {
            box_item: CategoryKey::new("boxes-1k", "1k Box"),
            sealed_bag: CategoryKey::new("sealed-bags", "Sealed Bag"),
            small_label_roll: CategoryKey::new("label-rolls-small", "Small Label Roll"),
            large_label_roll: CategoryKey::new("label-rolls-large", "Large Label Roll"),
        }
    }
}

impl PackagingItems {
    /// The label-roll item consumed when a counter of `size` rolls over.
    pub fn label_roll(&self, size: LabelSize) -> &CategoryKey {
        match size {
            LabelSize::Small => &self.small_label_roll,
            LabelSize::Large => &self.large_label_roll,
        }
    }

    pub fn all(&self) -> [CategoryKey; 4] {
        [
            self.box_item.clone(),
            self.sealed_bag.clone(),
            self.small_label_roll.clone(),
            self.large_label_roll.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorConfig {
    pub store: StoreConfig,
    pub label_threshold: u64,
    pub poll_interval: Duration,
    pub debounce: Duration,
    pub rollover: RolloverMode,
    /// Production events kept in the remote log; older ones are pruned.
    pub event_retention: usize,
    pub packaging: PackagingItems,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::Unconfigured,
            label_threshold: LABEL_ROLL_THRESHOLD,
            poll_interval: Duration::from_millis(2000),
            debounce: Duration::from_millis(50),
            rollover: RolloverMode::Background,
            event_retention: EVENT_RETENTION,
            packaging: PackagingItems::default(),
        }
    }
}

impl FloorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (tests, config files).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let store = match var(STORE_VAR).as_deref().map(str::trim) {
            None => StoreConfig::Unconfigured,
            Some(v) if v.eq_ignore_ascii_case("memory") => StoreConfig::Memory,
            Some(v) if v.eq_ignore_ascii_case("redis") => StoreConfig::Redis {
                url: var(REDIS_URL_VAR).ok_or(ConfigError::Missing(REDIS_URL_VAR))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: STORE_VAR,
                    value: other.to_string(),
                });
            }
        };

        let label_threshold = positive(var(LABEL_THRESHOLD_VAR), LABEL_THRESHOLD_VAR)?
            .unwrap_or(defaults.label_threshold);
        let event_retention = positive(var(EVENT_RETENTION_VAR), EVENT_RETENTION_VAR)?
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(defaults.event_retention);

        let poll_interval = millis(var(POLL_INTERVAL_VAR), POLL_INTERVAL_VAR)?
            .unwrap_or(defaults.poll_interval);
        let debounce = millis(var(DEBOUNCE_VAR), DEBOUNCE_VAR)?.unwrap_or(defaults.debounce);

        let rollover = match var(ROLLOVER_VAR).as_deref().map(str::trim) {
            None => defaults.rollover,
            Some(v) if v.eq_ignore_ascii_case("inline") => RolloverMode::Inline,
            Some(v) if v.eq_ignore_ascii_case("background") => RolloverMode::Background,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: ROLLOVER_VAR,
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            store,
            label_threshold,
            poll_interval,
            debounce,
            rollover,
            event_retention,
            packaging: defaults.packaging,
        })
    }
}

fn positive(raw: Option<String>, var: &'static str) -> Result<Option<u64>, ConfigError> {
    raw.map(|value| match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid { var, value }),
    })
    .transpose()
}

fn millis(raw: Option<String>, var: &'static str) -> Result<Option<Duration>, ConfigError> {
    raw.map(|value| {
        value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::Invalid { var, value })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<FloorConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        FloorConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, FloorConfig::default());
        assert_eq!(cfg.store, StoreConfig::Unconfigured);
        assert_eq!(cfg.label_threshold, 1000);
        assert_eq!(cfg.poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.rollover, RolloverMode::Background);
        assert_eq!(cfg.event_retention, 1000);
    }

    #[test]
    fn event_retention_must_be_positive() {
        assert_eq!(config(&[(EVENT_RETENTION_VAR, "250")]).unwrap().event_retention, 250);
        assert_eq!(
            config(&[(EVENT_RETENTION_VAR, "0")]),
            Err(ConfigError::Invalid {
                var: EVENT_RETENTION_VAR,
                value: "0".to_string()
            })
        );
    }

    #[test]
    fn redis_requires_a_url() {
        assert_eq!(
            config(&[(STORE_VAR, "redis")]),
            Err(ConfigError::Missing(REDIS_URL_VAR))
        );
        let cfg = config(&[(STORE_VAR, "redis"), (REDIS_URL_VAR, "redis://localhost:6379")]).unwrap();
        assert_eq!(
            cfg.store,
            StoreConfig::Redis {
                url: "redis://localhost:6379".to_string()
            }
        );
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(matches!(
            config(&[(LABEL_THRESHOLD_VAR, "0")]),
            Err(ConfigError::Invalid { var: LABEL_THRESHOLD_VAR, .. })
        ));
        assert!(matches!(
            config(&[(POLL_INTERVAL_VAR, "soon")]),
            Err(ConfigError::Invalid { var: POLL_INTERVAL_VAR, .. })
        ));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = config(&[
            (STORE_VAR, "Memory"),
            (LABEL_THRESHOLD_VAR, "500"),
            (DEBOUNCE_VAR, "5"),
            (ROLLOVER_VAR, "inline"),
        ])
        .unwrap();
        assert_eq!(cfg.store, StoreConfig::Memory);
        assert_eq!(cfg.label_threshold, 500);
        assert_eq!(cfg.debounce, Duration::from_millis(5));
        assert_eq!(cfg.rollover, RolloverMode::Inline);
    }
}
