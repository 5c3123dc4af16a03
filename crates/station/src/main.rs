use std::io::{self, BufRead, Write};

use anyhow::Context;
use tracing::{info, warn};

use printfloor_core::EntityClass;
use printfloor_infra::config::FloorConfig;
use printfloor_infra::production::ProductionService;
use printfloor_infra::store::open_store;
use printfloor_infra::sync::{RealtimeSync, SyncOptions};
use printfloor_production::LineFreeRoster;
use printfloor_station::{COLORS_VAR, Command, execute, parse_catalog};

fn main() -> anyhow::Result<()> {
    printfloor_observability::init();

    let config = FloorConfig::from_env().context("invalid station configuration")?;
    let store = open_store(&config.store).context("failed to open remote store")?;
    let catalog = parse_catalog(&std::env::var(COLORS_VAR).unwrap_or_default())
        .with_context(|| format!("invalid {COLORS_VAR}"))?;

    let sync = RealtimeSync::start(store.clone(), SyncOptions::from_config(&config));
    for class in EntityClass::ALL {
        if let Err(err) = sync.watch(class) {
            warn!(class = %class, error = %err, "cannot watch class; relying on polling");
        }
    }

    let service = ProductionService::new(store, catalog, LineFreeRoster, &config);
    if let Err(err) = service.ensure_packaging() {
        warn!(error = %err, "packaging entries not initialized");
    }

    info!(rollover = ?config.rollover, threshold = config.label_threshold, "station ready");

    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read console input")?;
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                writeln!(out, "error: {err:#}")?;
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        execute(&service, &sync, command, &mut out)?;
        out.flush()?;
    }

    service.shutdown();
    sync.shutdown();
    info!("station stopped");
    Ok(())
}
