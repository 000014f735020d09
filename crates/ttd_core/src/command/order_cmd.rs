//! Order commands: editing, sharing and timetabling order lists.

use serde::{Deserialize, Serialize};

use super::{check_ownership, Check, CommandContext, CommandCost};
use crate::cargo::CargoId;
use crate::ids::VehicleId;
use crate::order::{
    is_valid_condition, ConditionComparator, ConditionVariable, DepotAction, LoadType,
    NonStopType, Order, OrderKind, UnloadType, VehicleOrderId, MAX_CONDITION_VALUE,
    MAX_VEH_ORDER_ID, NO_SPEED_LIMIT,
};
use crate::order_list::OrderList;
use crate::strings::{
    STR_ERROR_CAN_T_ADD_ORDER, STR_ERROR_CAN_T_COPY_ORDER_VEHICLE_LIST,
    STR_ERROR_CAN_T_GO_TO_DEPOT, STR_ERROR_CAN_T_SHARE_ORDER_LIST, STR_ERROR_CAN_T_USE_WAYPOINT,
    STR_ERROR_NO_MORE_SPACE_FOR_ORDERS, STR_ERROR_TIMETABLE_NOT_STOPPING_HERE,
    STR_ERROR_TIMETABLE_ONLY_WAIT_AT_STATIONS, STR_ERROR_TOO_MANY_ORDERS,
};
use crate::vehicle::{clamp_service_interval, Vehicle, VehicleType};
use crate::world::World;

/// One property of an order together with its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderModification {
    /// Non-stop behaviour (ground vehicles only).
    NonStop(NonStopType),
    /// Unloading behaviour of a station order.
    Unload(UnloadType),
    /// Loading behaviour of a station order.
    Load(LoadType),
    /// What to do at a depot.
    DepotAction(DepotAction),
    /// Tested variable of a conditional order.
    CondVariable(ConditionVariable),
    /// Comparator of a conditional order.
    CondComparator(ConditionComparator),
    /// Compared value of a conditional order.
    CondValue(u16),
    /// Skip target of a conditional order.
    CondDestination(VehicleOrderId),
}

/// How [`super::Command::CloneOrder`] treats the source's orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloneMode {
    /// Follow the very same list as the source.
    Share,
    /// Get an independent copy of the source's orders.
    Copy,
    /// Stop sharing and drop all orders.
    Unshare,
}

/// Timetable value changed by [`super::Command::ChangeTimetable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimetableField {
    /// Waiting time at the destination, in ticks.
    WaitTime,
    /// Travel time to the destination, in ticks.
    TravelTime,
    /// Maximum speed while heading for the destination.
    MaxSpeed,
}

/// The vehicle `id`, which must exist and belong to the acting company.
fn owned_vehicle<'w>(world: &'w World, ctx: &CommandContext, id: VehicleId) -> Check<&'w Vehicle> {
    let vehicle = world.vehicles.get(id).ok_or_else(CommandCost::cmd_error)?;
    check_ownership(vehicle.owner, ctx)?;
    Ok(vehicle)
}

/// Order `sel` of `vehicle`'s list.
fn order_of<'w>(world: &'w World, vehicle: &Vehicle, sel: VehicleOrderId) -> Check<&'w Order> {
    vehicle
        .orders
        .and_then(|id| world.order_lists.get(id))
        .and_then(|list| list.get(usize::from(sel)))
        .ok_or_else(CommandCost::cmd_error)
}

/// Mutable order `sel` of `vehicle`'s list.
fn order_of_mut(world: &mut World, vehicle: VehicleId, sel: VehicleOrderId) -> Check<&mut Order> {
    let list = world
        .vehicles
        .get(vehicle)
        .and_then(|v| v.orders)
        .ok_or_else(CommandCost::cmd_error)?;
    world
        .order_lists
        .get_mut(list)
        .and_then(|list| list.get_mut(usize::from(sel)))
        .ok_or_else(CommandCost::cmd_error)
}

/// Check that every station in `orders` can be served by `vehicle_type`.
fn check_stations_usable(world: &World, orders: &[Order], vehicle_type: VehicleType) -> Check<()> {
    for order in orders.iter().filter(|o| o.is_goto_station()) {
        let usable = order
            .station()
            .and_then(|id| world.stations.get(id))
            .is_some_and(|st| st.serves(vehicle_type));
        if !usable {
            return Err(CommandCost::error(STR_ERROR_CAN_T_COPY_ORDER_VEHICLE_LIST));
        }
    }
    Ok(())
}

/// Validate `order` as a new order for `vehicle`.
fn validate_new_order(
    world: &World,
    ctx: &CommandContext,
    vehicle: &Vehicle,
    order: &Order,
    num_orders: usize,
) -> Check<()> {
    if !vehicle.is_ground_vehicle() && order.non_stop != NonStopType::StopEverywhere {
        return Err(CommandCost::cmd_error());
    }
    match order.kind {
        OrderKind::GotoStation { station } => {
            let st = world.stations.get(station).ok_or_else(CommandCost::cmd_error)?;
            if st.is_waypoint() {
                return Err(CommandCost::cmd_error());
            }
            if st.owner != crate::ids::CompanyId::NONE {
                check_ownership(st.owner, ctx)?;
            }
            if !st.serves(vehicle.vehicle_type) {
                return Err(CommandCost::error(STR_ERROR_CAN_T_ADD_ORDER));
            }
            if order.load == LoadType::NoLoad && order.unload == UnloadType::NoUnload {
                return Err(CommandCost::cmd_error());
            }
            match order.refit {
                Some(cargo) if cargo == CargoId::AUTO_REFIT => {
                    if order.load == LoadType::NoLoad {
                        return Err(CommandCost::cmd_error());
                    }
                }
                Some(cargo) if !world.is_valid_cargo(cargo) => return Err(CommandCost::cmd_error()),
                _ => {}
            }
        }
        OrderKind::GotoDepot { depot } => {
            let dp = world.depots.get(depot).ok_or_else(CommandCost::cmd_error)?;
            check_ownership(dp.owner, ctx)?;
            if dp.vehicle_type != vehicle.vehicle_type {
                return Err(CommandCost::error(STR_ERROR_CAN_T_GO_TO_DEPOT));
            }
            if let Some(cargo) = order.refit {
                if cargo == CargoId::AUTO_REFIT || !world.is_valid_cargo(cargo) {
                    return Err(CommandCost::cmd_error());
                }
            }
        }
        OrderKind::GotoWaypoint { waypoint } => {
            let wp = world.stations.get(waypoint).ok_or_else(CommandCost::cmd_error)?;
            if !wp.is_waypoint()
                || !matches!(vehicle.vehicle_type, VehicleType::Train | VehicleType::Ship)
            {
                return Err(CommandCost::error(STR_ERROR_CAN_T_USE_WAYPOINT));
            }
            if wp.owner != crate::ids::CompanyId::NONE {
                check_ownership(wp.owner, ctx)?;
            }
            if order.refit.is_some() {
                return Err(CommandCost::cmd_error());
            }
        }
        OrderKind::Conditional {
            variable,
            comparator,
            value,
            skip_to,
        } => {
            if skip_to != 0 && usize::from(skip_to) >= num_orders {
                return Err(CommandCost::cmd_error());
            }
            if !is_valid_condition(variable, comparator, value) || order.refit.is_some() {
                return Err(CommandCost::cmd_error());
            }
        }
        OrderKind::Nothing | OrderKind::Implicit { .. } | OrderKind::Dummy => {
            return Err(CommandCost::cmd_error());
        }
    }
    Ok(())
}

/// Insert `order` at position `sel`.
pub(super) fn insert_order(
    world: &mut World,
    ctx: &CommandContext,
    vehicle: VehicleId,
    sel: VehicleOrderId,
    order: &Order,
) -> Check<CommandCost> {
    let v = owned_vehicle(world, ctx, vehicle)?;
    let list_id = v.orders;
    let num_orders = world.num_orders(vehicle);
    validate_new_order(world, ctx, v, order, num_orders)?;

    if usize::from(sel) > num_orders {
        return Err(CommandCost::cmd_error());
    }
    let max_orders = usize::from(MAX_VEH_ORDER_ID)
        .min(usize::from(world.settings.vehicle.max_orders_per_list));
    if num_orders >= max_orders {
        return Err(CommandCost::error(STR_ERROR_TOO_MANY_ORDERS));
    }
    if !world.can_allocate_orders(1) || (list_id.is_none() && !world.order_lists.can_allocate(1))
    {
        return Err(CommandCost::error(STR_ERROR_NO_MORE_SPACE_FOR_ORDERS));
    }

    if ctx.exec() {
        let Some(list_id) = list_id else {
            let order = order.clone();
            let list_id = world
                .order_lists
                .insert_with(|_| OrderList::new(vec![order], vehicle))
                .ok_or_else(|| CommandCost::error(STR_ERROR_NO_MORE_SPACE_FOR_ORDERS))?;
            if let Some(v) = world.vehicles.get_mut(vehicle) {
                v.orders = Some(list_id);
            }
            return Ok(CommandCost::new());
        };
        let list = world
            .order_lists
            .get_mut(list_id)
            .ok_or_else(CommandCost::cmd_error)?;
        list.insert(usize::from(sel), order.clone());
        let len = list.len();
        for sharer in list.sharers() {
            if let Some(v) = world.vehicles.get_mut(*sharer) {
                v.fix_indices_after_insert(sel, len);
            }
        }
    }
    Ok(CommandCost::new())
}

/// Delete order `sel`; a position past the end drops the whole list.
pub(super) fn delete_order(
    world: &mut World,
    ctx: &CommandContext,
    vehicle: VehicleId,
    sel: VehicleOrderId,
) -> Check<CommandCost> {
    let list_id = owned_vehicle(world, ctx, vehicle)?.orders;
    if usize::from(sel) >= world.num_orders(vehicle) {
        return declone_order(world, ctx, vehicle);
    }

    if ctx.exec() {
        let list = list_id
            .and_then(|id| world.order_lists.get_mut(id))
            .ok_or_else(CommandCost::cmd_error)?;
        list.delete(usize::from(sel));
        for sharer in list.sharers() {
            if let Some(v) = world.vehicles.get_mut(*sharer) {
                v.fix_indices_after_delete(sel, list);
            }
        }
    }
    Ok(CommandCost::new())
}

/// Stop sharing and drop all orders of `vehicle`.
fn declone_order(world: &mut World, ctx: &CommandContext, vehicle: VehicleId) -> Check<CommandCost> {
    owned_vehicle(world, ctx, vehicle)?;
    if ctx.exec() {
        world.delete_vehicle_orders(vehicle);
    }
    Ok(CommandCost::new())
}

/// Check that `modification` applies to `order` with a new value.
fn validate_modification(
    vehicle: &Vehicle,
    order: &Order,
    modification: OrderModification,
    num_orders: usize,
) -> Check<()> {
    use OrderModification as M;

    let applicable = match order.kind {
        OrderKind::GotoStation { .. } => {
            matches!(modification, M::NonStop(_) | M::Unload(_) | M::Load(_))
        }
        OrderKind::GotoDepot { .. } => matches!(modification, M::NonStop(_) | M::DepotAction(_)),
        OrderKind::GotoWaypoint { .. } => matches!(modification, M::NonStop(_)),
        OrderKind::Conditional { .. } => matches!(
            modification,
            M::CondVariable(_) | M::CondComparator(_) | M::CondValue(_) | M::CondDestination(_)
        ),
        _ => false,
    };
    if !applicable {
        return Err(CommandCost::cmd_error());
    }

    let (variable, _) = condition_of(order);
    let valid = match modification {
        M::NonStop(non_stop) => vehicle.is_ground_vehicle() && non_stop != order.non_stop,
        M::Unload(unload) => !order.non_stop.skips_destination() && unload != order.unload,
        M::Load(load) => {
            !order.non_stop.skips_destination()
                && load != order.load
                && !(load == LoadType::NoLoad && order.is_auto_refit())
        }
        M::DepotAction(_) | M::CondVariable(_) => true,
        M::CondComparator(comparator) => match variable {
            ConditionVariable::Unconditionally => false,
            ConditionVariable::RequiresService => comparator.is_boolean(),
            _ => !comparator.is_boolean(),
        },
        M::CondValue(value) => match variable {
            ConditionVariable::Unconditionally | ConditionVariable::RequiresService => false,
            v if v.is_percentage() => value <= 100,
            _ => value <= MAX_CONDITION_VALUE,
        },
        M::CondDestination(target) => usize::from(target) < num_orders,
    };
    if valid {
        Ok(())
    } else {
        Err(CommandCost::cmd_error())
    }
}

fn condition_of(order: &Order) -> (ConditionVariable, ConditionComparator) {
    match order.kind {
        OrderKind::Conditional {
            variable,
            comparator,
            ..
        } => (variable, comparator),
        _ => (ConditionVariable::Unconditionally, ConditionComparator::Equals),
    }
}

/// Apply a validated modification.
fn apply_modification(order: &mut Order, modification: OrderModification) {
    match modification {
        OrderModification::NonStop(non_stop) => order.non_stop = non_stop,
        OrderModification::Unload(unload) => {
            order.unload = unload;
            if unload == UnloadType::NoUnload && order.load == LoadType::NoLoad {
                order.load = LoadType::LoadIfPossible;
            }
        }
        OrderModification::Load(load) => {
            order.load = load;
            if load == LoadType::NoLoad {
                order.refit = None;
                if order.unload == UnloadType::NoUnload {
                    order.unload = UnloadType::UnloadIfPossible;
                }
            }
        }
        OrderModification::DepotAction(action) => {
            order.depot_action = action;
            if action != DepotAction::AlwaysGo {
                order.refit = None;
            }
        }
        OrderModification::CondVariable(new_variable) => {
            if let OrderKind::Conditional {
                variable,
                comparator,
                value,
                ..
            } = &mut order.kind
            {
                *variable = new_variable;
                match new_variable {
                    ConditionVariable::Unconditionally => {
                        *comparator = ConditionComparator::Equals;
                        *value = 0;
                    }
                    ConditionVariable::RequiresService => {
                        if !comparator.is_boolean() {
                            *comparator = ConditionComparator::IsTrue;
                        }
                        *value = 0;
                    }
                    v => {
                        if comparator.is_boolean() {
                            *comparator = ConditionComparator::Equals;
                        }
                        if v.is_percentage() {
                            *value = (*value).min(100);
                        }
                    }
                }
            }
        }
        OrderModification::CondComparator(new_comparator) => {
            if let OrderKind::Conditional { comparator, .. } = &mut order.kind {
                *comparator = new_comparator;
            }
        }
        OrderModification::CondValue(new_value) => {
            if let OrderKind::Conditional { value, .. } = &mut order.kind {
                *value = new_value;
            }
        }
        OrderModification::CondDestination(target) => order.set_skip_to(target),
    }
}

/// Change one property of order `sel`.
pub(super) fn modify_order(
    world: &mut World,
    ctx: &CommandContext,
    vehicle: VehicleId,
    sel: VehicleOrderId,
    modification: OrderModification,
) -> Check<CommandCost> {
    let v = owned_vehicle(world, ctx, vehicle)?;
    let order = order_of(world, v, sel)?;
    validate_modification(v, order, modification, world.num_orders(vehicle))?;

    if ctx.exec() {
        apply_modification(order_of_mut(world, vehicle, sel)?, modification);
    }
    Ok(CommandCost::new())
}

/// Make `vehicle` continue with order `sel`.
pub(super) fn skip_to_order(
    world: &mut World,
    ctx: &CommandContext,
    vehicle: VehicleId,
    sel: VehicleOrderId,
) -> Check<CommandCost> {
    let v = owned_vehicle(world, ctx, vehicle)?;
    let num_orders = world.num_orders(vehicle);
    if num_orders < 2 || usize::from(sel) >= num_orders || sel == v.cur_implicit_order_index {
        return Err(CommandCost::cmd_error());
    }

    if ctx.exec() {
        let list = v.orders.and_then(|id| world.order_lists.get(id));
        let Some(v) = world.vehicles.get_mut(vehicle) else {
            return Err(CommandCost::cmd_error());
        };
        v.cur_real_order_index = sel;
        v.cur_implicit_order_index = sel;
        v.update_real_order_index(list);
    }
    Ok(CommandCost::new())
}

/// Move order `from` to position `to`.
pub(super) fn move_order(
    world: &mut World,
    ctx: &CommandContext,
    vehicle: VehicleId,
    from: VehicleOrderId,
    to: VehicleOrderId,
) -> Check<CommandCost> {
    let list_id = owned_vehicle(world, ctx, vehicle)?.orders;
    let num_orders = world.num_orders(vehicle);
    if usize::from(from) >= num_orders || usize::from(to) >= num_orders || from == to {
        return Err(CommandCost::cmd_error());
    }

    if ctx.exec() {
        let list = list_id
            .and_then(|id| world.order_lists.get_mut(id))
            .ok_or_else(CommandCost::cmd_error)?;
        list.move_order(usize::from(from), usize::from(to));
        for sharer in list.sharers() {
            if let Some(v) = world.vehicles.get_mut(*sharer) {
                v.fix_indices_after_move(from, to);
            }
        }
    }
    Ok(CommandCost::new())
}

/// Share, copy or unshare orders.
pub(super) fn clone_order(
    world: &mut World,
    ctx: &CommandContext,
    mode: CloneMode,
    vehicle: VehicleId,
    source: Option<VehicleId>,
) -> Check<CommandCost> {
    let dst = owned_vehicle(world, ctx, vehicle)?;
    if mode == CloneMode::Unshare {
        return declone_order(world, ctx, vehicle);
    }

    let src_id = source.ok_or_else(CommandCost::cmd_error)?;
    let src = owned_vehicle(world, ctx, src_id)?;
    if src_id == vehicle {
        return Err(CommandCost::cmd_error());
    }
    if src.vehicle_type != dst.vehicle_type {
        return Err(CommandCost::error(STR_ERROR_CAN_T_SHARE_ORDER_LIST));
    }
    let src_list = src.orders;
    let src_orders: Vec<Order> = world
        .orders_of(src_id)
        .map(|list| list.orders().to_vec())
        .unwrap_or_default();
    check_stations_usable(world, &src_orders, dst.vehicle_type)?;

    match mode {
        CloneMode::Share => {
            if src_list.is_some() && src_list == dst.orders {
                return Err(CommandCost::cmd_error());
            }
            if src_list.is_none() && !world.order_lists.can_allocate(1) {
                return Err(CommandCost::error(STR_ERROR_NO_MORE_SPACE_FOR_ORDERS));
            }
            if ctx.exec() {
                world.delete_vehicle_orders(vehicle);
                let list_id = match src_list {
                    Some(id) => id,
                    None => {
                        let id = world
                            .order_lists
                            .insert_with(|_| OrderList::new(Vec::new(), src_id))
                            .ok_or_else(|| CommandCost::error(STR_ERROR_NO_MORE_SPACE_FOR_ORDERS))?;
                        if let Some(src) = world.vehicles.get_mut(src_id) {
                            src.orders = Some(id);
                        }
                        id
                    }
                };
                if let Some(list) = world.order_lists.get_mut(list_id) {
                    list.add_sharer(src_id, vehicle);
                }
                if let Some(dst) = world.vehicles.get_mut(vehicle) {
                    dst.orders = Some(list_id);
                }
            }
        }
        CloneMode::Copy => {
            if !world.can_allocate_orders(src_orders.len())
                || (!src_orders.is_empty() && !world.order_lists.can_allocate(1))
            {
                return Err(CommandCost::error(STR_ERROR_NO_MORE_SPACE_FOR_ORDERS));
            }
            if ctx.exec() {
                world.delete_vehicle_orders(vehicle);
                if !src_orders.is_empty() {
                    let list_id = world
                        .order_lists
                        .insert_with(|_| OrderList::new(src_orders, vehicle))
                        .ok_or_else(|| CommandCost::error(STR_ERROR_NO_MORE_SPACE_FOR_ORDERS))?;
                    if let Some(dst) = world.vehicles.get_mut(vehicle) {
                        dst.orders = Some(list_id);
                    }
                }
            }
        }
        CloneMode::Unshare => {}
    }
    Ok(CommandCost::new())
}

/// Set or clear the refit of order `sel`.
pub(super) fn order_refit(
    world: &mut World,
    ctx: &CommandContext,
    vehicle: VehicleId,
    sel: VehicleOrderId,
    cargo: Option<CargoId>,
) -> Check<CommandCost> {
    if let Some(cargo) = cargo {
        if cargo != CargoId::AUTO_REFIT && !world.is_valid_cargo(cargo) {
            return Err(CommandCost::cmd_error());
        }
    }
    let v = owned_vehicle(world, ctx, vehicle)?;
    let order = order_of(world, v, sel)?;
    if cargo == Some(CargoId::AUTO_REFIT) && !order.is_goto_station() {
        return Err(CommandCost::cmd_error());
    }
    if !(order.is_goto_station() || order.is_goto_depot()) || order.load == LoadType::NoLoad {
        return Err(CommandCost::cmd_error());
    }

    if ctx.exec() {
        let order = order_of_mut(world, vehicle, sel)?;
        order.refit = cargo;
        if cargo.is_some() && order.is_goto_depot() {
            order.depot_action = DepotAction::AlwaysGo;
        }
    }
    Ok(CommandCost::new())
}

/// Change a timetable value of order `sel`.
pub(super) fn change_timetable(
    world: &mut World,
    ctx: &CommandContext,
    vehicle: VehicleId,
    sel: VehicleOrderId,
    field: TimetableField,
    value: u16,
) -> Check<CommandCost> {
    let v = owned_vehicle(world, ctx, vehicle)?;
    let is_aircraft = v.vehicle_type == VehicleType::Aircraft;
    let order = order_of(world, v, sel)?;
    if order.is_implicit() {
        return Err(CommandCost::cmd_error());
    }

    let changed = match field {
        TimetableField::WaitTime => value != order.wait_time,
        TimetableField::TravelTime => value != order.travel_time,
        TimetableField::MaxSpeed => {
            let speed = if value == 0 { NO_SPEED_LIMIT } else { value };
            speed != order.max_speed
        }
    };
    if changed {
        match field {
            TimetableField::WaitTime => match order.kind {
                OrderKind::GotoStation { .. } => {
                    if order.non_stop.skips_destination() {
                        return Err(CommandCost::error(STR_ERROR_TIMETABLE_NOT_STOPPING_HERE));
                    }
                }
                OrderKind::Conditional { .. } => {}
                _ => return Err(CommandCost::error(STR_ERROR_TIMETABLE_ONLY_WAIT_AT_STATIONS)),
            },
            TimetableField::TravelTime => {
                if order.is_conditional() {
                    return Err(CommandCost::cmd_error());
                }
            }
            TimetableField::MaxSpeed => {
                if order.is_conditional() || is_aircraft {
                    return Err(CommandCost::cmd_error());
                }
            }
        }
    }

    if ctx.exec() {
        let order = order_of_mut(world, vehicle, sel)?;
        match field {
            TimetableField::WaitTime => {
                order.wait_time = value;
                order.wait_timetabled = value > 0;
            }
            TimetableField::TravelTime => {
                order.travel_time = value;
                order.travel_timetabled = value > 0;
            }
            TimetableField::MaxSpeed => {
                order.max_speed = if value == 0 { NO_SPEED_LIMIT } else { value };
            }
        }
    }
    Ok(CommandCost::new())
}

/// Restore the current order and service interval of a rebuilt vehicle.
pub(super) fn restore_order_index(
    world: &mut World,
    ctx: &CommandContext,
    vehicle: VehicleId,
    order_index: VehicleOrderId,
    service_interval: u16,
) -> Check<CommandCost> {
    let list_id = owned_vehicle(world, ctx, vehicle)?.orders;
    if service_interval != clamp_service_interval(service_interval)
        || usize::from(order_index) >= world.num_orders(vehicle)
    {
        return Err(CommandCost::cmd_error());
    }

    if ctx.exec() {
        let list = list_id.and_then(|id| world.order_lists.get(id));
        let Some(v) = world.vehicles.get_mut(vehicle) else {
            return Err(CommandCost::cmd_error());
        };
        v.cur_real_order_index = order_index;
        v.cur_implicit_order_index = order_index;
        v.update_real_order_index(list);
        v.service_interval = service_interval;
    }
    Ok(CommandCost::new())
}
