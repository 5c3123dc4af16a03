use std::io::Write;

use tracing::warn;

use printfloor_core::EntityClass;
use printfloor_infra::production::{PrintReport, ProductionService, RolloverStatus};
use printfloor_infra::store::RemoteStore;
use printfloor_infra::sync::RealtimeSync;
use printfloor_inventory::{AlertSubject, MinimumLevels};
use printfloor_production::{ColorCatalog, OperatorRoster};

use crate::command::Command;

const HELP: &str = "\
commands:
  print <machine> <material> <color> <rolls> <operator...> [--privileged]
  stock | packaging | counters | events [n] | alerts <minimum>
  reconcile | reset-counters | help | quit";

/// Run one command against the station's service and local view.
///
/// Domain failures (rate limit, invalid input, backend errors) are printed
/// and do not end the session; only output errors are returned.
pub fn execute<S, C, R, W>(
    service: &ProductionService<S, C, R>,
    sync: &RealtimeSync<S>,
    command: Command,
    out: &mut W,
) -> std::io::Result<()>
where
    S: RemoteStore,
    C: ColorCatalog,
    R: OperatorRoster,
    W: Write,
{
    match command {
        Command::Print(request) => match service.submit_print(request) {
            Ok(report) => write_report(&report, out)?,
            Err(err) => writeln!(out, "print rejected: {err}")?,
        },
        Command::Stock => {
            refresh(sync, EntityClass::Stock);
            for (key, qty) in sync.stock() {
                writeln!(out, "{key}: {qty}")?;
            }
        }
        Command::Packaging => {
            refresh(sync, EntityClass::CategoryStock);
            for (key, qty) in sync.categories() {
                writeln!(out, "{key}: {qty}")?;
            }
        }
        Command::Counters => match service.counters().get() {
            Ok(c) => writeln!(out, "small: {} large: {}", c.small, c.large)?,
            Err(err) => writeln!(out, "counters unavailable: {err}")?,
        },
        Command::Events { limit } => {
            refresh(sync, EntityClass::ProductionEvents);
            for ev in sync.events().into_iter().take(limit) {
                writeln!(
                    out,
                    "{} {} {} {}/{} x{} by {}",
                    ev.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    ev.machine_id,
                    ev.material_type,
                    ev.color_small,
                    ev.color_large,
                    ev.quantity_small,
                    ev.operator
                )?;
            }
        }
        Command::Alerts { minimum } => {
            refresh(sync, EntityClass::Stock);
            refresh(sync, EntityClass::CategoryStock);
            let mut minimums = MinimumLevels::new();
            for key in sync.stock().into_keys() {
                minimums = minimums.with_material(key, minimum);
            }
            for key in sync.categories().into_keys() {
                minimums = minimums.with_category(key, minimum);
            }
            for alert in sync.low_stock_alerts(&minimums) {
                let subject = match &alert.subject {
                    AlertSubject::Material(k) => k.to_string(),
                    AlertSubject::Category(k) => k.to_string(),
                };
                writeln!(out, "LOW {subject}: {} (short {})", alert.current, alert.shortfall())?;
            }
        }
        Command::Reconcile => match service.counters().reconcile() {
            Ok(o) => writeln!(
                out,
                "deducted rolls: small {} large {}",
                o.rolls_small_deducted, o.rolls_large_deducted
            )?,
            Err(err) => writeln!(out, "reconcile failed: {err}")?,
        },
        Command::ResetCounters => match service.counters().reset() {
            Ok(()) => writeln!(out, "counters reset")?,
            Err(err) => writeln!(out, "reset failed: {err}")?,
        },
        Command::Help => writeln!(out, "{HELP}")?,
        Command::Quit => {}
    }
    Ok(())
}

fn refresh<S: RemoteStore>(sync: &RealtimeSync<S>, class: EntityClass) {
    if let Err(err) = sync.refresh_now(class) {
        warn!(class = %class, error = %err, "showing cached view");
    }
}

fn write_report<W: Write>(report: &PrintReport, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "recorded {}", report.event_id())?;
    for (step, err) in report.failures() {
        writeln!(out, "  {} failed: {err}", step.as_str())?;
    }
    match &report.rollover {
        RolloverStatus::Reconciled(o) if !o.is_noop() => writeln!(
            out,
            "  label rolls deducted: small {} large {}",
            o.rolls_small_deducted, o.rolls_large_deducted
        )?,
        RolloverStatus::Failed(err) => writeln!(out, "  rollover failed: {err}")?,
        RolloverStatus::NotScheduled => writeln!(out, "  rollover not scheduled")?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use printfloor_infra::config::{FloorConfig, RolloverMode};
    use printfloor_infra::store::InMemoryRemoteStore;
    use printfloor_infra::sync::SyncOptions;
    use printfloor_production::{LineFreeRoster, StaticCatalog};

    fn run(lines: &[&str]) -> String {
        let store = Arc::new(InMemoryRemoteStore::new());
        let config = FloorConfig {
            rollover: RolloverMode::Inline,
            ..FloorConfig::default()
        };
        let catalog = StaticCatalog::new().with_colors("PLA", ["Red"]);
        let service = ProductionService::new(store.clone(), catalog, LineFreeRoster, &config);
        let sync = RealtimeSync::start(store, SyncOptions::default());

        let mut out = Vec::new();
        for line in lines {
            if let Some(cmd) = Command::parse(line).unwrap() {
                execute(&service, &sync, cmd, &mut out).unwrap();
            }
        }
        sync.shutdown();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn print_then_stock_shows_the_credit() {
        let out = run(&["print 1 PLA Red 1 Ana", "stock"]);
        assert!(out.starts_with("recorded "));
        assert!(out.contains("PLA Red: 1"));
    }

    #[test]
    fn denied_print_is_reported_not_fatal() {
        let out = run(&["print 1 PLA Red 5 Ana", "counters"]);
        assert!(out.contains("print rejected: rate limited"));
        assert!(out.contains("small: 0 large: 0"));
    }

    #[test]
    fn alerts_use_a_uniform_minimum() {
        let out = run(&["print 1 PLA Red 1 Ana", "alerts 3"]);
        assert!(out.contains("LOW PLA Red: 1 (short 2)"));
    }
}
