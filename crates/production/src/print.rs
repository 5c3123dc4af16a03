use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use printfloor_core::{EventId, FloorError, FloorResult, MachineId};
use printfloor_events::Event;
use printfloor_inventory::{LedgerKey, StockKey};

/// Labels in one roll: one small plus one large.
pub const LABELS_PER_ROLL: u64 = 2;

/// Suffix distinguishing a large-label color from its base color.
pub const LARGE_COLOR_SUFFIX: &str = "_LARGE";

/// Base color of a label color (`"Red_LARGE"` -> `"Red"`).
///
/// Stock is always credited to the base color: a roll is one small plus one
/// large label of the same material.
pub fn color_base(color: &str) -> &str {
    color.strip_suffix(LARGE_COLOR_SUFFIX).unwrap_or(color)
}

/// Large-label variant of a base color.
pub fn large_color(base: &str) -> String {
    format!("{}{LARGE_COLOR_SUFFIX}", color_base(base))
}

/// Command: print `roll_count` rolls of one color on one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintRequest {
    pub machine_id: MachineId,
    pub material_type: String,
    pub color_base: String,
    pub operator: String,
    /// Supplied by the caller's auth layer; exempts the operator from the rate limit.
    pub privileged: bool,
    pub roll_count: u32,
}

impl PrintRequest {
    pub fn new(
        machine_id: MachineId,
        material_type: impl Into<String>,
        color: impl Into<String>,
        operator: impl Into<String>,
        roll_count: u32,
    ) -> Self {
        Self {
            machine_id,
            material_type: material_type.into(),
            color_base: color.into(),
            operator: operator.into(),
            privileged: false,
            roll_count,
        }
    }

    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Labels the limiter is asked to admit (two per roll).
    pub fn labels_requested(&self) -> u64 {
        u64::from(self.roll_count) * LABELS_PER_ROLL
    }

    /// Stock entry credited with the printed rolls.
    pub fn stock_key(&self) -> StockKey {
        StockKey::new(self.material_type.clone(), color_base(&self.color_base))
    }

    /// Input checks that need no collaborator.
    pub fn validate(&self) -> FloorResult<()> {
        if self.roll_count == 0 {
            return Err(FloorError::invalid("roll count must be greater than zero"));
        }
        if self.operator.trim().is_empty() {
            return Err(FloorError::invalid("an operator must be assigned to print"));
        }
        if self.material_type.trim().is_empty() || color_base(&self.color_base).trim().is_empty() {
            return Err(FloorError::invalid("material type and color are required"));
        }
        self.stock_key().validate()
    }
}

/// Event: rolls were printed. Appended once per accepted print, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionEvent {
    pub id: EventId,
    pub machine_id: MachineId,
    pub material_type: String,
    pub color_small: String,
    pub color_large: String,
    pub operator: String,
    pub quantity_small: u64,
    pub quantity_large: u64,
    pub timestamp: DateTime<Utc>,
}

impl ProductionEvent {
    pub fn from_request(request: &PrintRequest, id: EventId, timestamp: DateTime<Utc>) -> Self {
        let base = color_base(&request.color_base);
        let rolls = u64::from(request.roll_count);
        Self {
            id,
            machine_id: request.machine_id,
            material_type: request.material_type.clone(),
            color_small: base.to_string(),
            color_large: large_color(base),
            operator: request.operator.clone(),
            quantity_small: rolls,
            quantity_large: rolls,
            timestamp,
        }
    }
}

impl Event for ProductionEvent {
    const EVENT_TYPE: &'static str = "production.print.recorded";
    const VERSION: u32 = 1;

    fn log_key(&self) -> String {
        self.id.to_string()
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
