//! Print execution pipeline.
//!
//! `ProductionService::submit_print` turns one operator action into the
//! production event and its side effects:
//!
//! ```text
//! PrintRequest
//!   ↓
//! 1. Validate (roll count, operator on the line, known color)
//!   ↓
//! 2. Admit through the rate limiter
//!   ↓
//! 3. Append the ProductionEvent            ← failure aborts here
//!   ↓
//! 4. Credit stock, deduct box and bag, increment label counters
//!   ↓
//! 5. Trigger rollover (inline or background)
//! ```
//!
//! Steps 1-3 are gates: an error returns before anything is written. Step 4 is
//! an ordered task list whose tasks are independent. Each outcome lands in the
//! [`PrintReport`]; a failed task is logged and never rolled back, and the
//! event stays appended as the record of intent.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use printfloor_core::{EventId, FloorError, FloorResult};
use printfloor_inventory::{RolloverOutcome, StockKey};
use printfloor_production::{
    ColorCatalog, OperatorRoster, PrintRequest, ProductionEvent, RateLimiter, color_base,
};

use crate::config::{FloorConfig, PackagingItems, RolloverMode};
use crate::event_log::EventLog;
use crate::label_counter::LabelCounter;
use crate::ledger::{CategoryStockLedger, StockLedger};
use crate::store::RemoteStore;
use crate::workers::{RolloverWorker, RolloverWorkerHandle};

/// Side-effect tasks of an accepted print, in execution order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintStep {
    CreditStock,
    DeductBoxes,
    DeductBags,
    IncrementCounters,
}

impl PrintStep {
    pub const ORDER: [PrintStep; 4] = [
        PrintStep::CreditStock,
        PrintStep::DeductBoxes,
        PrintStep::DeductBags,
        PrintStep::IncrementCounters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrintStep::CreditStock => "credit_stock",
            PrintStep::DeductBoxes => "deduct_boxes",
            PrintStep::DeductBags => "deduct_bags",
            PrintStep::IncrementCounters => "increment_counters",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub step: PrintStep,
    pub result: Result<(), FloorError>,
}

impl StepOutcome {
    pub fn is_applied(&self) -> bool {
        self.result.is_ok()
    }
}

/// What happened to label-roll reconciliation for this print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloverStatus {
    /// Handed to the background worker.
    Scheduled,
    /// The background worker is gone; the next inline or scheduled pass catches up.
    NotScheduled,
    Reconciled(RolloverOutcome),
    Failed(FloorError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintReport {
    pub event: ProductionEvent,
    pub steps: Vec<StepOutcome>,
    pub rollover: RolloverStatus,
}

impl PrintReport {
    pub fn event_id(&self) -> EventId {
        self.event.id
    }

    /// Every side-effect task succeeded.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(StepOutcome::is_applied)
            && !matches!(self.rollover, RolloverStatus::Failed(_))
    }

    pub fn failures(&self) -> impl Iterator<Item = (PrintStep, &FloorError)> {
        self.steps
            .iter()
            .filter_map(|s| s.result.as_ref().err().map(|e| (s.step, e)))
    }
}

enum RolloverDispatch {
    Inline,
    Background(RolloverWorkerHandle),
}

/// Composes ledgers, counters, limiter and event log into one print action.
///
/// Not transactional across resources. Every collaborator is injected once;
/// the service itself keeps no shop-floor state.
pub struct ProductionService<S, C, R> {
    stock: StockLedger<S>,
    categories: CategoryStockLedger<S>,
    counters: LabelCounter<S>,
    events: EventLog<S>,
    limiter: RateLimiter,
    catalog: C,
    roster: R,
    packaging: PackagingItems,
    rollover: RolloverDispatch,
}

impl<S, C, R> ProductionService<S, C, R>
where
    S: RemoteStore + Clone + 'static,
    C: ColorCatalog,
    R: OperatorRoster,
{
    /// Build the service; in background mode this spawns the rollover worker.
    pub fn new(store: S, catalog: C, roster: R, config: &FloorConfig) -> Self {
        let counters = LabelCounter::new(
            store.clone(),
            config.packaging.clone(),
            config.label_threshold,
        );
        let rollover = match config.rollover {
            RolloverMode::Inline => RolloverDispatch::Inline,
            RolloverMode::Background => {
                RolloverDispatch::Background(RolloverWorker::spawn(counters.clone()))
            }
        };

        Self {
            stock: StockLedger::new(store.clone()),
            categories: CategoryStockLedger::new(store.clone()),
            events: EventLog::new(store).with_retention(config.event_retention),
            counters,
            limiter: RateLimiter::new(),
            catalog,
            roster,
            packaging: config.packaging.clone(),
            rollover,
        }
    }
}

impl<S, C, R> ProductionService<S, C, R>
where
    S: RemoteStore,
    C: ColorCatalog,
    R: OperatorRoster,
{
    pub fn stock(&self) -> &StockLedger<S> {
        &self.stock
    }

    pub fn categories(&self) -> &CategoryStockLedger<S> {
        &self.categories
    }

    pub fn counters(&self) -> &LabelCounter<S> {
        &self.counters
    }

    pub fn events(&self) -> &EventLog<S> {
        &self.events
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn packaging(&self) -> &PackagingItems {
        &self.packaging
    }

    /// Create every packaging entry a print touches, at zero if missing.
    pub fn ensure_packaging(&self) -> FloorResult<usize> {
        self.categories.ensure_present(self.packaging.all())
    }

    /// Create stock entries at zero for the given colors of a material type.
    pub fn ensure_colors<'a, I>(&self, material_type: &str, colors: I) -> FloorResult<usize>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.stock.ensure_present(
            colors
                .into_iter()
                .map(|c| StockKey::new(material_type, color_base(c))),
        )
    }

    /// Record a print and apply its side effects.
    ///
    /// Errors are returned only for the gates (validation, rate limit, event
    /// append). Once the event is appended the call succeeds and failures of
    /// later tasks are reported in the [`PrintReport`].
    pub fn submit_print(&self, request: PrintRequest) -> FloorResult<PrintReport> {
        request.validate()?;

        if self.roster.is_line_free(&request.operator) {
            return Err(FloorError::invalid(format!(
                "machine {} has no operator assigned",
                request.machine_id
            )));
        }

        let base = color_base(&request.color_base);
        if !self.catalog.is_known_color(&request.material_type, base) {
            return Err(FloorError::invalid(format!(
                "unknown color {base} for {}",
                request.material_type
            )));
        }

        let labels = request.labels_requested();
        let admission = self
            .limiter
            .admit_for(&request.operator, request.privileged, labels);
        if let Err(err) = admission.into_result(labels) {
            warn!(
                operator = %request.operator,
                machine = %request.machine_id,
                labels,
                "print denied by rate limit"
            );
            return Err(err);
        }

        let event = ProductionEvent::from_request(&request, EventId::new(), Utc::now());
        self.events.append(&event)?;

        let steps = self.apply_side_effects(&request);
        let rollover = self.trigger_rollover();

        let report = PrintReport {
            event,
            steps,
            rollover,
        };

        info!(
            event_id = %report.event_id(),
            machine = %request.machine_id,
            operator = %request.operator,
            material = %request.material_type,
            color = base,
            rolls = request.roll_count,
            complete = report.is_complete(),
            "print recorded"
        );

        Ok(report)
    }

    fn apply_side_effects(&self, request: &PrintRequest) -> Vec<StepOutcome> {
        let rolls = u64::from(request.roll_count);
        let stock_key = request.stock_key();

        let tasks: [(PrintStep, &dyn Fn() -> FloorResult<()>); 4] = [
            (PrintStep::CreditStock, &|| {
                self.stock.add(&stock_key, rolls).map(drop)
            }),
            (PrintStep::DeductBoxes, &|| {
                self.categories
                    .subtract(&self.packaging.box_item, rolls)
                    .map(drop)
            }),
            (PrintStep::DeductBags, &|| {
                self.categories
                    .subtract(&self.packaging.sealed_bag, rolls)
                    .map(drop)
            }),
            (PrintStep::IncrementCounters, &|| {
                self.counters.increment(rolls, rolls).map(drop)
            }),
        ];

        tasks
            .into_iter()
            .map(|(step, task)| {
                let result = task();
                if let Err(err) = &result {
                    warn!(
                        step = step.as_str(),
                        machine = %request.machine_id,
                        error = %err,
                        retryable = err.is_retryable(),
                        "print step failed"
                    );
                }
                StepOutcome { step, result }
            })
            .collect()
    }

    fn trigger_rollover(&self) -> RolloverStatus {
        match &self.rollover {
            RolloverDispatch::Inline => match self.counters.reconcile() {
                Ok(outcome) => RolloverStatus::Reconciled(outcome),
                Err(err) => {
                    warn!(error = %err, "inline rollover failed");
                    RolloverStatus::Failed(err)
                }
            },
            RolloverDispatch::Background(worker) => {
                if worker.signal() {
                    RolloverStatus::Scheduled
                } else {
                    warn!("rollover worker is not running");
                    RolloverStatus::NotScheduled
                }
            }
        }
    }

    /// Reconciliation passes completed by the background worker, if any.
    pub fn rollover_passes(&self) -> Option<u64> {
        match &self.rollover {
            RolloverDispatch::Inline => None,
            RolloverDispatch::Background(worker) => Some(worker.passes()),
        }
    }

    /// Stop the background rollover worker, if one is running.
    pub fn shutdown(self) {
        if let RolloverDispatch::Background(worker) = self.rollover {
            worker.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use printfloor_core::MachineId;
    use printfloor_production::{LineFreeRoster, StaticCatalog};

    use crate::store::InMemoryRemoteStore;

    type Service = ProductionService<Arc<InMemoryRemoteStore>, StaticCatalog, LineFreeRoster>;

    fn service() -> (Arc<InMemoryRemoteStore>, Service) {
        let store = Arc::new(InMemoryRemoteStore::new());
        let config = FloorConfig {
            rollover: RolloverMode::Inline,
            ..FloorConfig::default()
        };
        let catalog = StaticCatalog::new().with_colors("PLA", ["Red", "Blue"]);
        let svc = ProductionService::new(store.clone(), catalog, LineFreeRoster, &config);
        (store, svc)
    }

    fn print(operator: &str, rolls: u32) -> PrintRequest {
        PrintRequest::new(MachineId::new(2), "PLA", "Red", operator, rolls)
    }

    #[test]
    fn line_free_machine_cannot_print() {
        let (_, svc) = service();
        let err = svc.submit_print(print("Line Free", 1)).unwrap_err();
        assert!(matches!(err, FloorError::InvalidState(_)));
        assert!(svc.events().recent(10).unwrap().is_empty());
    }

    #[test]
    fn unknown_color_is_rejected_before_admission() {
        let (_, svc) = service();
        let req = PrintRequest::new(MachineId::new(2), "PLA", "Green", "Ana", 1);
        assert!(matches!(svc.submit_print(req), Err(FloorError::InvalidState(_))));
        assert!(svc.limiter().history("Ana").is_empty());
    }

    #[test]
    fn malformed_stock_key_is_rejected_before_the_event_is_recorded() {
        let store = Arc::new(InMemoryRemoteStore::new());
        let config = FloorConfig {
            rollover: RolloverMode::Inline,
            ..FloorConfig::default()
        };
        let catalog = StaticCatalog::new().with_colors("PLA::X", ["Red"]);
        let svc = ProductionService::new(store, catalog, LineFreeRoster, &config);

        let req = PrintRequest::new(MachineId::new(2), "PLA::X", "Red", "Ana", 1);
        assert!(matches!(svc.submit_print(req), Err(FloorError::InvalidState(_))));
        assert!(svc.events().recent(10).unwrap().is_empty());
        assert!(svc.stock().get_all().unwrap().is_empty());
        assert!(svc.limiter().history("Ana").is_empty());
    }

    #[test]
    fn large_color_alias_credits_the_base_color() {
        let (_, svc) = service();
        let req = PrintRequest::new(MachineId::new(2), "PLA", "Red_LARGE", "Ana", 1);
        svc.submit_print(req).unwrap();
        assert_eq!(svc.stock().get(&StockKey::new("PLA", "Red")).unwrap(), 1);
    }

    #[test]
    fn rate_limited_print_has_no_side_effects() {
        let (_, svc) = service();
        let err = svc.submit_print(print("Ana", 2)).unwrap_err();
        assert_eq!(err, FloorError::RateLimited { requested: 4, limit: 2 });
        assert!(svc.stock().get_all().unwrap().is_empty());
        assert!(svc.events().recent(10).unwrap().is_empty());
    }

    #[test]
    fn privileged_operator_may_print_many_rolls() {
        let (_, svc) = service();
        let report = svc.submit_print(print("Supervisor", 40).privileged(true)).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.event.quantity_small, 40);
    }

    #[test]
    fn failed_append_stops_before_side_effects() {
        let (store, svc) = service();
        store.set_offline(true);
        let err = svc.submit_print(print("Ana", 1)).unwrap_err();
        assert!(err.is_retryable());
        store.set_offline(false);
        assert!(svc.stock().get_all().unwrap().is_empty());
    }

    #[test]
    fn report_lists_every_step_in_order() {
        let (_, svc) = service();
        let report = svc.submit_print(print("Ana", 1)).unwrap();
        let steps: Vec<PrintStep> = report.steps.iter().map(|s| s.step).collect();
        assert_eq!(steps, PrintStep::ORDER.to_vec());
        assert_eq!(report.rollover, RolloverStatus::Reconciled(RolloverOutcome::default()));
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn ensure_packaging_creates_all_items_once() {
        let (_, svc) = service();
        assert_eq!(svc.ensure_packaging().unwrap(), 4);
        assert_eq!(svc.ensure_packaging().unwrap(), 0);
        assert_eq!(svc.ensure_colors("PLA", ["Red", "Blue_LARGE"]).unwrap(), 2);
    }
}
