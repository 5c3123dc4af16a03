use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use printfloor_core::MachineId;
use printfloor_infra::config::{FloorConfig, RolloverMode};
use printfloor_infra::ledger::StockLedger;
use printfloor_infra::production::ProductionService;
use printfloor_infra::store::InMemoryRemoteStore;
use printfloor_inventory::StockKey;
use printfloor_production::{LineFreeRoster, PrintRequest, StaticCatalog};

fn colors(n: usize) -> Vec<StockKey> {
    (0..n).map(|i| StockKey::new("PLA", format!("Color{i}"))).collect()
}

/// Atomic adjust vs the read-modify-write fallback, which rewrites the whole
/// class on every call and so slows down as the class grows.
fn bench_adjust_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_adjust_path");
    group.throughput(Throughput::Elements(1));

    for class_size in [1usize, 10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("atomic", class_size),
            class_size,
            |b, &size| {
                let ledger = StockLedger::new(InMemoryRemoteStore::new());
                let keys = colors(size);
                ledger.ensure_present(keys.clone()).unwrap();

                b.iter(|| black_box(ledger.add(&keys[0], black_box(1)).unwrap()));
            },
        );

        #[cfg(feature = "rmw-fallback")]
        group.bench_with_input(
            BenchmarkId::new("read_modify_write", class_size),
            class_size,
            |b, &size| {
                let ledger = StockLedger::new(InMemoryRemoteStore::without_atomic_adjust());
                let keys = colors(size);
                ledger.ensure_present(keys.clone()).unwrap();

                b.iter(|| black_box(ledger.add(&keys[0], black_box(1)).unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_snapshot_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_get_all");

    for class_size in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*class_size as u64));
        group.bench_with_input(
            BenchmarkId::new("decode_snapshot", class_size),
            class_size,
            |b, &size| {
                let ledger = StockLedger::new(InMemoryRemoteStore::new());
                ledger.ensure_present(colors(size)).unwrap();

                b.iter(|| black_box(ledger.get_all().unwrap()));
            },
        );
    }

    group.finish();
}

fn bench_submit_print(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_print");
    group.sample_size(200);

    group.bench_function("inline_rollover", |b| {
        let store = Arc::new(InMemoryRemoteStore::new());
        let config = FloorConfig {
            rollover: RolloverMode::Inline,
            ..FloorConfig::default()
        };
        let catalog = StaticCatalog::new().with_colors("PLA", ["Red"]);
        let svc = ProductionService::new(store, catalog, LineFreeRoster, &config);
        svc.ensure_packaging().unwrap();

        b.iter(|| {
            let req = PrintRequest::new(MachineId::new(1), "PLA", "Red", "Bench", 1);
            black_box(svc.submit_print(black_box(req)).unwrap())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_adjust_paths,
    bench_snapshot_decode,
    bench_submit_print
);
criterion_main!(benches);
