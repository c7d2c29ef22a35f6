use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use prodplan_calc::{FifoLedger, PlanCalculator, RequirementAggregator};
use prodplan_core::{
    Bundle, EngineConfig, MemoryCatalog, MemoryStore, Recipe, Target, TargetKind, UnitConverter,
};
use rust_decimal::Decimal;

/// `depth` 層的組合鏈，每層含 `width` 個下一層組合；最底層含兩種成品
fn nested_catalog(depth: usize, width: usize) -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    for r in 0..4 {
        catalog.upsert_recipe(
            Recipe::new(&format!("R{r}"), "recipe")
                .with_yield(Decimal::from(24))
                .with_ingredient("FLOUR", Decimal::from(250), "g")
                .with_ingredient(&format!("FLAVOR-{r}"), Decimal::from(15), "ml"),
        );
    }

    for level in (0..depth).rev() {
        let mut bundle = Bundle::new(&format!("L{level}"), "bundle")
            .with_packaging("BOX", Decimal::ONE, "each");
        if level + 1 == depth {
            bundle = bundle
                .with_unit(&format!("R{}", level % 4), Decimal::from(6))
                .with_unit(&format!("R{}", (level + 1) % 4), Decimal::from(3));
        } else {
            bundle = bundle.with_sub_bundle(&format!("L{}", level + 1), Decimal::from(width as i64));
        }
        catalog.upsert_bundle(bundle);
    }
    catalog
}

fn bench_aggregate_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_depth");
    let config = EngineConfig::default();

    for depth in [1usize, 4, 16, 64] {
        let catalog = nested_catalog(depth, 2);
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            let aggregator = RequirementAggregator::new(&catalog, &config);
            b.iter(|| {
                aggregator
                    .aggregate(&TargetKind::Bundle("L0".to_string()), black_box(Decimal::from(10)))
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_calculate_plan(c: &mut Criterion) {
    let catalog = nested_catalog(8, 3);
    let converter = UnitConverter::new();
    let config = EngineConfig::default();
    let store = MemoryStore::new();
    let mut tx = store.begin().unwrap();

    let ledger = FifoLedger::new(&converter);
    for i in 0..200 {
        ledger
            .receive(&mut tx, "FLOUR", Decimal::from(5), "kg", Decimal::new(120 + i, 2), Utc::now())
            .unwrap();
    }

    let targets = vec![
        Target::bundle("T1", "L0", Decimal::from(25)),
        Target::units("T2", "R1", Decimal::from(500)),
    ];
    let calculator = PlanCalculator::new(&catalog, &converter, &config);

    c.bench_function("calculate_plan", |b| {
        b.iter(|| calculator.calculate(&tx, black_box(&targets)).unwrap())
    });
}

criterion_group!(benches, bench_aggregate_depth, bench_calculate_plan);
criterion_main!(benches);
