//! Link refresher and command pipeline benchmarks.
//!
//! Run with: `cargo bench -p ttd_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ttd_core::cargo::CargoId;
use ttd_core::command::CommandDispatcher;
use ttd_core::link_refresher;
use ttd_core::order::{ConditionComparator, ConditionVariable, Order};
use ttd_test_utils::fixtures::Scenario;

/// Station stops with a conditional jump every fourth order and an
/// auto-refit every seventh.
fn order_list(scenario: &Scenario, len: u8) -> Vec<Order> {
    (0..len)
        .map(|n| {
            if n % 4 == 3 {
                Order::conditional(
                    ConditionVariable::LoadPercentage,
                    ConditionComparator::LessThan,
                    50,
                    (n / 2) % len,
                )
            } else {
                let order = Order::goto_station(scenario.station(usize::from(n) % 3));
                if n % 7 == 6 {
                    order.with_refit(CargoId::AUTO_REFIT)
                } else {
                    order
                }
            }
        })
        .collect()
}

pub fn refresher_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("link_refresher");
    for len in [4u8, 16, 64, 200] {
        let mut scenario = Scenario::new();
        let orders = order_list(&scenario, len);
        let vehicle = scenario.spawn_train_with_orders(orders);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| {
                let mut world = scenario.world.clone();
                black_box(link_refresher::run(&mut world, vehicle))
            });
        });
    }
    group.finish();
}

pub fn dispatch_benchmark(c: &mut Criterion) {
    c.bench_function("build_and_order_train", |b| {
        b.iter(|| {
            let mut scenario = Scenario::new();
            let mut dispatcher = CommandDispatcher::offline();
            let vehicle = scenario.build_train(&mut dispatcher);
            let orders = order_list(&scenario, 12);
            scenario.give_orders(&mut dispatcher, vehicle, &orders);
            black_box(scenario.world.state_hash())
        });
    });
}

criterion_group!(benches, refresher_benchmark, dispatch_benchmark);
criterion_main!(benches);
