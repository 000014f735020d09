//! Link refresher tests on the shared fixture.
//!
//! The refresher must terminate on any order list and stay within its step
//! budgets, however the conditional jumps are wired.

use proptest::prelude::*;
use ttd_core::cargo::CargoId;
use ttd_core::link_refresher::{self, RefreshReport};
use ttd_core::order::{ConditionComparator, ConditionVariable, Order};
use ttd_core::order_list::VehicleOrderId;
use ttd_test_utils::determinism::strategies::arb_order_list;
use ttd_test_utils::fixtures::{
    Scenario, HEAD_CAPACITY, WAGON_CAPACITY, WAGON_COAL_CAPACITY,
};

fn refresh(orders: Vec<Order>) -> (Scenario, RefreshReport) {
    let mut scenario = Scenario::new();
    let vehicle = scenario.spawn_train_with_orders(orders);
    let report = link_refresher::run(&mut scenario.world, vehicle);
    (scenario, report)
}

fn assert_within_budget(report: &RefreshReport, len: usize) {
    assert!(report.budgets >= 1 || report.steps == 0);
    assert!(
        report.steps <= report.budgets * 2 * len,
        "{} steps exceed {} budgets of {} orders",
        report.steps,
        report.budgets,
        len
    );
}

fn capacity(scenario: &Scenario, from: usize, to: usize, cargo: CargoId) -> u32 {
    scenario
        .world
        .link_graph
        .edge(scenario.station(from), scenario.station(to), cargo)
        .map_or(0, |edge| edge.capacity)
}

#[test]
fn test_single_order_terminates() {
    let mut scenario = Scenario::new();
    let orders = vec![Order::goto_station(scenario.station(0))];
    let vehicle = scenario.spawn_train_with_orders(orders);
    let report = link_refresher::run(&mut scenario.world, vehicle);
    assert_within_budget(&report, 1);
    assert!(scenario.world.link_graph.is_empty());
}

#[test]
fn test_two_orders_link_both_ways() {
    let scenario = Scenario::new();
    let orders = vec![
        Order::goto_station(scenario.station(0)),
        Order::goto_station(scenario.station(1)),
    ];
    let (scenario, report) = refresh(orders);
    assert_within_budget(&report, 2);
    let full = u32::from(HEAD_CAPACITY + WAGON_CAPACITY);
    assert_eq!(capacity(&scenario, 0, 1, CargoId::PASSENGERS), full);
    assert_eq!(capacity(&scenario, 1, 0, CargoId::PASSENGERS), full);
}

#[test]
fn test_fifty_chained_conditionals_terminate() {
    let scenario = Scenario::new();
    let orders: Vec<Order> = (0..50u8)
        .map(|n| {
            if n % 2 == 0 {
                Order::conditional(
                    ConditionVariable::LoadPercentage,
                    ConditionComparator::LessThan,
                    50,
                    (n + 3) % 50,
                )
            } else {
                Order::goto_station(scenario.station(usize::from(n) % 3))
            }
        })
        .collect();
    let (_, report) = refresh(orders);
    assert_within_budget(&report, 50);
    assert!(report.branches > 1);
}

#[test]
fn test_fifty_jumps_to_self_terminate() {
    let orders: Vec<Order> = (0..50u8).map(Order::jump).collect();
    let (scenario, report) = refresh(orders);
    assert_within_budget(&report, 50);
    assert!(scenario.world.link_graph.is_empty());
}

#[test]
fn test_refit_splits_capacity_between_parts() {
    let scenario = Scenario::new();
    let orders = vec![
        Order::goto_station(scenario.station(0)),
        Order::goto_station(scenario.station(1)).with_refit(CargoId::COAL),
        Order::goto_station(scenario.station(2)),
    ];
    let (scenario, _) = refresh(orders);

    let head = u32::from(HEAD_CAPACITY);
    let coal = u32::from(WAGON_COAL_CAPACITY);
    assert_eq!(
        capacity(&scenario, 0, 1, CargoId::PASSENGERS),
        head + u32::from(WAGON_CAPACITY)
    );
    assert_eq!(capacity(&scenario, 1, 2, CargoId::PASSENGERS), head);
    assert_eq!(capacity(&scenario, 1, 2, CargoId::COAL), coal);
    assert_eq!(capacity(&scenario, 2, 0, CargoId::PASSENGERS), head);
    assert_eq!(capacity(&scenario, 2, 0, CargoId::COAL), coal);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_refresh_terminates_within_budget(orders in arb_order_list(3, 50)) {
        let len = orders.len();
        let (_, report) = refresh(orders);
        prop_assert!(report.steps <= report.budgets * 2 * len);
    }

    #[test]
    fn prop_refresh_is_deterministic(orders in arb_order_list(3, 20)) {
        let (first, first_report) = refresh(orders.clone());
        let (second, second_report) = refresh(orders);
        prop_assert_eq!(first_report, second_report);
        prop_assert_eq!(first.world.link_graph, second.world.link_graph);
    }

    #[test]
    fn prop_short_lists_terminate(len in 1usize..=2, target in 0u8..2) {
        let scenario = Scenario::new();
        let target: VehicleOrderId = target % u8::try_from(len).unwrap();
        let mut orders = vec![Order::goto_station(scenario.station(0))];
        if len == 2 {
            orders.push(Order::jump(target));
        }
        let (_, report) = refresh(orders);
        prop_assert!(report.steps <= report.budgets * 2 * len);
    }
}
