//! Order command tests.
//!
//! These drive order lists through the offline dispatcher exactly as a
//! player would, and check the resulting lists, indices and error messages.

use ttd_core::cargo::CargoId;
use ttd_core::command::{
    CloneMode, Command, CommandDispatcher, CommandOutcome, CommandRequest, OrderModification,
    OutcomeKind, TimetableField,
};
use ttd_core::ids::{CompanyId, VehicleId};
use ttd_core::order::{
    ConditionComparator, ConditionVariable, DepotAction, LoadType, Order, UnloadType,
    NO_SPEED_LIMIT,
};
use ttd_core::settings::GameSettings;
use ttd_core::strings::{STR_ERROR_OWNED_BY, STR_ERROR_TIMETABLE_ONLY_WAIT_AT_STATIONS, STR_ERROR_TOO_MANY_ORDERS};
use ttd_test_utils::fixtures::{Scenario, COMPANY, RIVAL};

// =============================================================================
// Helpers
// =============================================================================

fn post(scenario: &mut Scenario, dispatcher: &mut CommandDispatcher, command: Command) -> CommandOutcome {
    post_as(scenario, dispatcher, command, COMPANY)
}

fn post_as(
    scenario: &mut Scenario,
    dispatcher: &mut CommandDispatcher,
    command: Command,
    company: CompanyId,
) -> CommandOutcome {
    dispatcher
        .post(&mut scenario.world, CommandRequest::new(command, company))
        .expect("order commands are allowed offline")
}

/// Train with orders A, B, C.
fn three_stop_train() -> (Scenario, CommandDispatcher, VehicleId) {
    let mut scenario = Scenario::new();
    let mut dispatcher = CommandDispatcher::offline();
    let vehicle = scenario.build_train(&mut dispatcher);
    let orders = [
        Order::goto_station(scenario.station(0)),
        Order::goto_station(scenario.station(1)),
        Order::goto_station(scenario.station(2)),
    ];
    scenario.give_orders(&mut dispatcher, vehicle, &orders);
    (scenario, dispatcher, vehicle)
}

fn skip_target(scenario: &Scenario, vehicle: VehicleId, index: usize) -> Option<u8> {
    scenario.orders(vehicle)[index].skip_to()
}

// =============================================================================
// Insert / delete / move
// =============================================================================

#[test]
fn test_insert_shifts_conditional_targets() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let cond = Order::conditional(
        ConditionVariable::LoadPercentage,
        ConditionComparator::LessThan,
        50,
        2,
    );
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 3, order: cond },
    );
    assert!(outcome.succeeded());
    assert_eq!(skip_target(&scenario, vehicle, 3), Some(2));

    let front = Order::goto_station(scenario.station(2));
    post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 0, order: front },
    );
    assert_eq!(scenario.orders(vehicle).len(), 5);
    assert_eq!(skip_target(&scenario, vehicle, 4), Some(3));
}

#[test]
fn test_insert_past_end_fails() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let order = Order::goto_station(scenario.station(0));
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 5, order },
    );
    assert_eq!(outcome.kind, OutcomeKind::Failed);
    assert_eq!(scenario.orders(vehicle).len(), 3);
}

#[test]
fn test_insert_conditional_with_out_of_range_target_fails() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let order = Order::jump(7);
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 0, order },
    );
    assert!(!outcome.succeeded());
}

#[test]
fn test_insert_respects_list_limit() {
    let mut settings = GameSettings::default();
    settings.vehicle.max_orders_per_list = 2;
    let mut scenario = Scenario::with_settings(settings);
    let mut dispatcher = CommandDispatcher::offline();
    let vehicle = scenario.build_train(&mut dispatcher);
    let orders = [
        Order::goto_station(scenario.station(0)),
        Order::goto_station(scenario.station(1)),
    ];
    scenario.give_orders(&mut dispatcher, vehicle, &orders);

    let order = Order::goto_station(scenario.station(2));
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 2, order },
    );
    assert_eq!(outcome.cost.message(), STR_ERROR_TOO_MANY_ORDERS);
    assert_eq!(dispatcher.last_error(), Some(STR_ERROR_TOO_MANY_ORDERS));
}

#[test]
fn test_no_load_no_unload_is_rejected() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let order = Order::goto_station(scenario.station(0))
        .with_load(LoadType::NoLoad)
        .with_unload(UnloadType::NoUnload);
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 0, order },
    );
    assert!(!outcome.succeeded());
}

#[test]
fn test_orders_to_rival_station_need_ownership() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let order = Order::goto_station(scenario.rival_station);
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 0, order },
    );
    assert_eq!(outcome.cost.message(), STR_ERROR_OWNED_BY);
}

#[test]
fn test_other_company_cannot_edit_orders() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let outcome = post_as(
        &mut scenario,
        &mut dispatcher,
        Command::DeleteOrder { vehicle, sel: 0 },
        RIVAL,
    );
    assert_eq!(outcome.cost.message(), STR_ERROR_OWNED_BY);
    assert_eq!(scenario.orders(vehicle).len(), 3);
}

#[test]
fn test_delete_moves_targets_back() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 3, order: Order::jump(2) },
    );
    post(&mut scenario, &mut dispatcher, Command::DeleteOrder { vehicle, sel: 0 });

    let orders = scenario.orders(vehicle);
    assert_eq!(orders.len(), 3);
    assert_eq!(orders[2].skip_to(), Some(1));
}

#[test]
fn test_delete_past_end_drops_all_orders() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let outcome = post(&mut scenario, &mut dispatcher, Command::DeleteOrder { vehicle, sel: 200 });
    assert!(outcome.succeeded());
    assert!(scenario.world.orders_of(vehicle).is_none());
    assert!(scenario.world.order_lists.is_empty());
}

#[test]
fn test_delete_before_current_keeps_destination() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    post(&mut scenario, &mut dispatcher, Command::SkipToOrder { vehicle, sel: 2 });
    post(&mut scenario, &mut dispatcher, Command::DeleteOrder { vehicle, sel: 0 });

    let v = scenario.world.vehicles.get(vehicle).unwrap();
    assert_eq!(v.cur_real_order_index, 1);
    assert_eq!(
        scenario.orders(vehicle)[1].station(),
        Some(scenario.station(2))
    );
}

#[test]
fn test_move_rewrites_targets_and_current_order() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 3, order: Order::jump(0) },
    );
    post(&mut scenario, &mut dispatcher, Command::SkipToOrder { vehicle, sel: 1 });
    let outcome = post(&mut scenario, &mut dispatcher, Command::MoveOrder { vehicle, from: 0, to: 2 });
    assert!(outcome.succeeded());

    let orders = scenario.orders(vehicle);
    assert_eq!(orders[2].station(), Some(scenario.station(0)));
    assert_eq!(orders[3].skip_to(), Some(2));
    let v = scenario.world.vehicles.get(vehicle).unwrap();
    assert_eq!(v.cur_real_order_index, 0);
}

#[test]
fn test_move_to_same_position_fails() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let outcome = post(&mut scenario, &mut dispatcher, Command::MoveOrder { vehicle, from: 1, to: 1 });
    assert!(!outcome.succeeded());
}

#[test]
fn test_skip_to_current_order_fails() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let outcome = post(&mut scenario, &mut dispatcher, Command::SkipToOrder { vehicle, sel: 0 });
    assert!(!outcome.succeeded());
}

// =============================================================================
// Modify / refit
// =============================================================================

#[test]
fn test_no_load_clears_refit_and_no_unload() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    post(
        &mut scenario,
        &mut dispatcher,
        Command::OrderRefit { vehicle, sel: 0, cargo: Some(CargoId::COAL) },
    );
    post(
        &mut scenario,
        &mut dispatcher,
        Command::ModifyOrder {
            vehicle,
            sel: 0,
            modification: OrderModification::Unload(UnloadType::NoUnload),
        },
    );
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::ModifyOrder {
            vehicle,
            sel: 0,
            modification: OrderModification::Load(LoadType::NoLoad),
        },
    );
    assert!(outcome.succeeded());

    let order = &scenario.orders(vehicle)[0];
    assert_eq!(order.load, LoadType::NoLoad);
    assert_eq!(order.unload, UnloadType::UnloadIfPossible);
    assert_eq!(order.refit, None);
}

#[test]
fn test_no_load_with_auto_refit_is_rejected() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    post(
        &mut scenario,
        &mut dispatcher,
        Command::OrderRefit { vehicle, sel: 1, cargo: Some(CargoId::AUTO_REFIT) },
    );
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::ModifyOrder {
            vehicle,
            sel: 1,
            modification: OrderModification::Load(LoadType::NoLoad),
        },
    );
    assert!(!outcome.succeeded());
    assert!(scenario.orders(vehicle)[1].is_auto_refit());
}

#[test]
fn test_modify_to_same_value_fails() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::ModifyOrder {
            vehicle,
            sel: 0,
            modification: OrderModification::Load(LoadType::LoadIfPossible),
        },
    );
    assert!(!outcome.succeeded());
}

#[test]
fn test_condition_variable_change_normalises_comparator() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let cond = Order::conditional(
        ConditionVariable::MaxSpeed,
        ConditionComparator::MoreThan,
        300,
        1,
    );
    post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 3, order: cond },
    );
    post(
        &mut scenario,
        &mut dispatcher,
        Command::ModifyOrder {
            vehicle,
            sel: 3,
            modification: OrderModification::CondVariable(ConditionVariable::LoadPercentage),
        },
    );
    let order = &scenario.orders(vehicle)[3];
    assert_eq!(
        order.kind,
        ttd_core::order::OrderKind::Conditional {
            variable: ConditionVariable::LoadPercentage,
            comparator: ConditionComparator::MoreThan,
            value: 100,
            skip_to: 1,
        }
    );

    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::ModifyOrder {
            vehicle,
            sel: 3,
            modification: OrderModification::CondValue(101),
        },
    );
    assert!(!outcome.succeeded());
}

#[test]
fn test_depot_refit_forces_always_go() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let depot = Order::goto_depot(scenario.depot, DepotAction::Service);
    post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 3, order: depot },
    );
    post(
        &mut scenario,
        &mut dispatcher,
        Command::OrderRefit { vehicle, sel: 3, cargo: Some(CargoId::COAL) },
    );
    let order = &scenario.orders(vehicle)[3];
    assert_eq!(order.depot_action, DepotAction::AlwaysGo);
    assert_eq!(order.refit, Some(CargoId::COAL));

    post(
        &mut scenario,
        &mut dispatcher,
        Command::ModifyOrder {
            vehicle,
            sel: 3,
            modification: OrderModification::DepotAction(DepotAction::Stop),
        },
    );
    assert_eq!(scenario.orders(vehicle)[3].refit, None);
}

#[test]
fn test_auto_refit_only_at_stations() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let depot = Order::goto_depot(scenario.depot, DepotAction::AlwaysGo);
    post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 3, order: depot },
    );
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::OrderRefit { vehicle, sel: 3, cargo: Some(CargoId::AUTO_REFIT) },
    );
    assert!(!outcome.succeeded());
}

// =============================================================================
// Sharing and copying
// =============================================================================

#[test]
fn test_share_then_edit_is_seen_by_both() {
    let (mut scenario, mut dispatcher, first) = three_stop_train();
    let second = scenario.build_train(&mut dispatcher);
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::CloneOrder { mode: CloneMode::Share, vehicle: second, source: Some(first) },
    );
    assert!(outcome.succeeded());
    assert!(scenario.world.orders_of(first).unwrap().is_shared());

    post(&mut scenario, &mut dispatcher, Command::DeleteOrder { vehicle: second, sel: 0 });
    assert_eq!(scenario.orders(first).len(), 2);
    assert_eq!(scenario.orders(first), scenario.orders(second));
}

#[test]
fn test_share_same_list_twice_fails() {
    let (mut scenario, mut dispatcher, first) = three_stop_train();
    let second = scenario.build_train(&mut dispatcher);
    let share = Command::CloneOrder { mode: CloneMode::Share, vehicle: second, source: Some(first) };
    assert!(post(&mut scenario, &mut dispatcher, share.clone()).succeeded());
    assert!(!post(&mut scenario, &mut dispatcher, share).succeeded());
}

#[test]
fn test_copy_is_independent() {
    let (mut scenario, mut dispatcher, first) = three_stop_train();
    let second = scenario.build_train(&mut dispatcher);
    post(
        &mut scenario,
        &mut dispatcher,
        Command::CloneOrder { mode: CloneMode::Copy, vehicle: second, source: Some(first) },
    );
    post(&mut scenario, &mut dispatcher, Command::DeleteOrder { vehicle: second, sel: 0 });

    assert_eq!(scenario.orders(first).len(), 3);
    assert_eq!(scenario.orders(second).len(), 2);
    assert!(!scenario.world.orders_of(first).unwrap().is_shared());
}

#[test]
fn test_unshare_drops_orders_of_one_sharer() {
    let (mut scenario, mut dispatcher, first) = three_stop_train();
    let second = scenario.build_train(&mut dispatcher);
    post(
        &mut scenario,
        &mut dispatcher,
        Command::CloneOrder { mode: CloneMode::Share, vehicle: second, source: Some(first) },
    );
    post(
        &mut scenario,
        &mut dispatcher,
        Command::CloneOrder { mode: CloneMode::Unshare, vehicle: second, source: None },
    );
    assert!(scenario.world.orders_of(second).is_none());
    assert_eq!(scenario.orders(first).len(), 3);
    assert!(!scenario.world.orders_of(first).unwrap().is_shared());
}

#[test]
fn test_share_from_vehicle_without_orders_creates_list() {
    let mut scenario = Scenario::new();
    let mut dispatcher = CommandDispatcher::offline();
    let first = scenario.build_train(&mut dispatcher);
    let second = scenario.build_train(&mut dispatcher);
    post(
        &mut scenario,
        &mut dispatcher,
        Command::CloneOrder { mode: CloneMode::Share, vehicle: second, source: Some(first) },
    );
    let order = Order::goto_station(scenario.station(0));
    post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle: first, sel: 0, order },
    );
    assert_eq!(scenario.orders(second).len(), 1);
}

// =============================================================================
// Timetable
// =============================================================================

#[test]
fn test_wait_time_only_at_stations() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let depot = Order::goto_depot(scenario.depot, DepotAction::AlwaysGo);
    post(
        &mut scenario,
        &mut dispatcher,
        Command::InsertOrder { vehicle, sel: 3, order: depot },
    );
    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::ChangeTimetable { vehicle, sel: 3, field: TimetableField::WaitTime, value: 20 },
    );
    assert_eq!(outcome.cost.message(), STR_ERROR_TIMETABLE_ONLY_WAIT_AT_STATIONS);

    let outcome = post(
        &mut scenario,
        &mut dispatcher,
        Command::ChangeTimetable { vehicle, sel: 0, field: TimetableField::WaitTime, value: 20 },
    );
    assert!(outcome.succeeded());
    let order = &scenario.orders(vehicle)[0];
    assert_eq!(order.wait_time, 20);
    assert!(order.wait_timetabled);
}

#[test]
fn test_zero_speed_removes_limit() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    post(
        &mut scenario,
        &mut dispatcher,
        Command::ChangeTimetable { vehicle, sel: 1, field: TimetableField::MaxSpeed, value: 80 },
    );
    assert_eq!(scenario.orders(vehicle)[1].max_speed, 80);
    post(
        &mut scenario,
        &mut dispatcher,
        Command::ChangeTimetable { vehicle, sel: 1, field: TimetableField::MaxSpeed, value: 0 },
    );
    assert_eq!(scenario.orders(vehicle)[1].max_speed, NO_SPEED_LIMIT);
}

// =============================================================================
// Link refresh on order changes
// =============================================================================

#[test]
fn test_order_edits_refresh_links() {
    let (scenario, _dispatcher, _vehicle) = three_stop_train();
    let graph = &scenario.world.link_graph;
    let a = scenario.station(0);
    let b = scenario.station(1);
    let c = scenario.station(2);
    assert!(graph.edge(a, b, CargoId::PASSENGERS).is_some());
    assert!(graph.edge(c, a, CargoId::PASSENGERS).is_some());
    assert!(graph.edge(a, c, CargoId::PASSENGERS).is_none());
}

#[test]
fn test_estimate_only_changes_nothing() {
    let (mut scenario, mut dispatcher, vehicle) = three_stop_train();
    let before = scenario.world.clone();
    let order = Order::goto_station(scenario.station(0));
    let outcome = dispatcher
        .post(
            &mut scenario.world,
            CommandRequest::new(Command::InsertOrder { vehicle, sel: 0, order }, COMPANY)
                .estimate_only(),
        )
        .unwrap();
    assert_eq!(outcome.kind, OutcomeKind::Estimated);
    assert_eq!(scenario.world, before);
}
