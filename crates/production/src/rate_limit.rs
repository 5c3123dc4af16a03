//! Print admission policy.
//!
//! The policy is a stateless rule on the size of a single request: a regular
//! operator may print one roll (two labels) per action, a privileged operator
//! anything. There is no time window; adding a cool-down would change the
//! policy operators work under.
//!
//! The limiter also keeps a short in-memory history of attempts per operator.
//! That history is advisory (debugging, "who pressed print") and is never
//! consulted when deciding. It is bounded both per operator and in the number
//! of operators tracked; the least recently active operator is evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use printfloor_core::{FloorError, FloorResult};

use crate::print::LABELS_PER_ROLL;

/// Labels a non-privileged operator may request in one print action.
pub const MAX_LABELS_PER_PRINT: u64 = LABELS_PER_ROLL;

const DEFAULT_HISTORY_PER_OPERATOR: usize = 32;
const DEFAULT_TRACKED_OPERATORS: usize = 256;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum Admission {
    Allow,
    Deny { limit: u64 },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allow)
    }

    /// Turn a denial into [`FloorError::RateLimited`].
    pub fn into_result(self, requested: u64) -> FloorResult<()> {
        match self {
            Admission::Allow => Ok(()),
            Admission::Deny { limit } => Err(FloorError::RateLimited { requested, limit }),
        }
    }
}

/// One recorded admission decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub at: DateTime<Utc>,
    pub requested: u64,
    pub privileged: bool,
    pub admitted: bool,
}

#[derive(Debug, Default)]
struct OperatorHistory {
    /// Value of the limiter's activity counter at this operator's last attempt.
    last_active: u64,
    attempts: VecDeque<AttemptRecord>,
}

#[derive(Debug, Default)]
struct History {
    activity: u64,
    operators: HashMap<String, OperatorHistory>,
}

impl History {
    fn evict_least_recent(&mut self) {
        let stalest = self
            .operators
            .iter()
            .min_by_key(|(_, h)| h.last_active)
            .map(|(operator, _)| operator.clone());
        if let Some(operator) = stalest {
            self.operators.remove(&operator);
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u64,
    history_cap: usize,
    max_operators: usize,
    history: Mutex<History>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            limit: MAX_LABELS_PER_PRINT,
            history_cap: DEFAULT_HISTORY_PER_OPERATOR,
            max_operators: DEFAULT_TRACKED_OPERATORS,
            history: Mutex::new(History::default()),
        }
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap;
        self
    }

    /// Track at most `max` operators (at least one).
    pub fn with_max_operators(mut self, max: usize) -> Self {
        self.max_operators = max.max(1);
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Decide whether `requested_labels` may be printed.
    pub fn admit(&self, privileged: bool, requested_labels: u64) -> Admission {
        if privileged || requested_labels <= self.limit {
            Admission::Allow
        } else {
            Admission::Deny { limit: self.limit }
        }
    }

    /// [`admit`](Self::admit), additionally recording the attempt for `operator`.
    pub fn admit_for(&self, operator: &str, privileged: bool, requested_labels: u64) -> Admission {
        let decision = self.admit(privileged, requested_labels);

        if self.history_cap > 0 {
            if let Ok(mut history) = self.history.lock() {
                if !history.operators.contains_key(operator)
                    && history.operators.len() >= self.max_operators
                {
                    history.evict_least_recent();
                }

                history.activity += 1;
                let activity = history.activity;
                let entry = history.operators.entry(operator.to_string()).or_default();
                entry.last_active = activity;
                if entry.attempts.len() == self.history_cap {
                    entry.attempts.pop_front();
                }
                entry.attempts.push_back(AttemptRecord {
                    at: Utc::now(),
                    requested: requested_labels,
                    privileged,
                    admitted: decision.is_allowed(),
                });
            }
        }

        decision
    }

    /// Recorded attempts for an operator, oldest first.
    pub fn history(&self, operator: &str) -> Vec<AttemptRecord> {
        self.history
            .lock()
            .ok()
            .and_then(|h| {
                h.operators
                    .get(operator)
                    .map(|e| e.attempts.iter().cloned().collect())
            })
            .unwrap_or_default()
    }

    /// Number of operators with recorded attempts.
    pub fn tracked_operators(&self) -> usize {
        self.history.lock().map(|h| h.operators.len()).unwrap_or(0)
    }

    /// Forget the history of one operator, or of everyone when `None`.
    pub fn clear_history(&self, operator: Option<&str>) {
        if let Ok(mut history) = self.history.lock() {
            match operator {
                Some(op) => {
                    history.operators.remove(op);
                }
                None => history.operators.clear(),
            }
        }
    }
}
