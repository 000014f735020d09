//! Vehicle commands: building, selling, naming and servicing.

use super::{check_ownership, Check, CommandContext, CommandCost, CommandResult};
use crate::cargo::CargoId;
use crate::ids::{ClientId, EngineId, TileIndex, VehicleId};
use crate::order_backup;
use crate::strings::{
    STR_ERROR_CAN_T_BUY_VEHICLE, STR_ERROR_CAN_T_REFIT_VEHICLE, STR_ERROR_NAME_MUST_BE_UNIQUE,
    STR_ERROR_TOO_MANY_VEHICLES_IN_GAME, STR_ERROR_VEHICLE_MUST_BE_STOPPED_INSIDE_DEPOT,
};
use crate::vehicle::{clamp_service_interval, Vehicle};
use crate::world::World;

/// Longest custom vehicle name, in characters.
pub const MAX_LENGTH_VEHICLE_NAME_CHARS: usize = 32;

fn owned_vehicle<'w>(world: &'w World, ctx: &CommandContext, id: VehicleId) -> Check<&'w Vehicle> {
    let vehicle = world.vehicles.get(id).ok_or_else(CommandCost::cmd_error)?;
    check_ownership(vehicle.owner, ctx)?;
    Ok(vehicle)
}

/// Build a vehicle of `engine` in the depot on `tile`.
pub(super) fn build_vehicle(
    world: &mut World,
    ctx: &CommandContext,
    tile: TileIndex,
    engine_id: EngineId,
    refit: Option<CargoId>,
) -> Check<(CommandCost, CommandResult)> {
    let depot = world
        .depot_at(tile)
        .and_then(|id| world.depots.get(id))
        .ok_or_else(CommandCost::cmd_error)?;
    check_ownership(depot.owner, ctx)?;
    let engine = world.engines.get(engine_id).ok_or_else(CommandCost::cmd_error)?;
    if engine.vehicle_type != depot.vehicle_type {
        return Err(CommandCost::error(STR_ERROR_CAN_T_BUY_VEHICLE));
    }
    if let Some(cargo) = refit {
        if !engine.can_carry(cargo) {
            return Err(CommandCost::error(STR_ERROR_CAN_T_REFIT_VEHICLE));
        }
    }
    if !world.vehicles.can_allocate(1) {
        return Err(CommandCost::error(STR_ERROR_TOO_MANY_VEHICLES_IN_GAME));
    }
    let cost = CommandCost::with_cost(engine.cost);

    if !ctx.exec() {
        return Ok((cost, CommandResult::None));
    }
    let id = world
        .spawn_vehicle(ctx.company, engine_id, tile, refit)
        .ok_or_else(|| CommandCost::error(STR_ERROR_TOO_MANY_VEHICLES_IN_GAME))?;
    tracing::debug!(vehicle = id.0, engine = engine_id.0, "vehicle built");
    Ok((cost, CommandResult::Vehicle(id)))
}

/// Sell a vehicle stopped in a depot, optionally backing up its orders for `client`.
pub(super) fn sell_vehicle(
    world: &mut World,
    ctx: &CommandContext,
    vehicle: VehicleId,
    backup_orders: bool,
    client: ClientId,
) -> Check<CommandCost> {
    let v = owned_vehicle(world, ctx, vehicle)?;
    if !v.stopped_in_depot || world.depot_at(v.tile).is_none() {
        return Err(CommandCost::error(
            STR_ERROR_VEHICLE_MUST_BE_STOPPED_INSIDE_DEPOT,
        ));
    }
    let cost = CommandCost::with_cost(-v.value);

    if ctx.exec() {
        if backup_orders {
            order_backup::backup(world, vehicle, client);
        }
        world.delete_vehicle(vehicle);
    }
    Ok(cost)
}

/// Set or reset the custom name of a vehicle.
pub(super) fn rename_vehicle(
    world: &mut World,
    ctx: &CommandContext,
    vehicle: VehicleId,
    name: Option<&str>,
) -> Check<CommandCost> {
    owned_vehicle(world, ctx, vehicle)?;
    let name = name.filter(|n| !n.is_empty());
    if let Some(name) = name {
        if name.chars().count() >= MAX_LENGTH_VEHICLE_NAME_CHARS {
            return Err(CommandCost::cmd_error());
        }
        let taken = world
            .vehicles
            .iter()
            .any(|(_, v)| v.name.as_deref() == Some(name));
        if taken {
            return Err(CommandCost::error(STR_ERROR_NAME_MUST_BE_UNIQUE));
        }
    }

    if ctx.exec() {
        if let Some(v) = world.vehicles.get_mut(vehicle) {
            v.name = name.map(str::to_owned);
        }
    }
    Ok(CommandCost::new())
}

/// Change how often a vehicle visits a depot for servicing.
pub(super) fn change_service_interval(
    world: &mut World,
    ctx: &CommandContext,
    vehicle: VehicleId,
    interval: u16,
) -> Check<CommandCost> {
    owned_vehicle(world, ctx, vehicle)?;
    if clamp_service_interval(interval) != interval {
        return Err(CommandCost::cmd_error());
    }

    if ctx.exec() {
        if let Some(v) = world.vehicles.get_mut(vehicle) {
            v.service_interval = interval;
        }
    }
    Ok(CommandCost::new())
}
