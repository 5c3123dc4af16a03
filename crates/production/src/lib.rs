//! Production domain module.
//!
//! Pure rules around a print action: the request and its validation, the
//! immutable production event it records, the admission policy, and the
//! collaborator seams (color catalog, operator roster) the orchestrator
//! consults. No IO.

pub mod catalog;
pub mod print;
pub mod rate_limit;

pub use catalog::{ColorCatalog, LINE_FREE_OPERATOR, LineFreeRoster, OperatorRoster, StaticCatalog};
pub use print::{
    LABELS_PER_ROLL, LARGE_COLOR_SUFFIX, PrintRequest, ProductionEvent, color_base, large_color,
};
pub use rate_limit::{Admission, AttemptRecord, MAX_LABELS_PER_PRINT, RateLimiter};
