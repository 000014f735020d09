//! Vehicle group commands.

use super::{check_ownership, Check, CommandContext, CommandCost, CommandResult};
use crate::ids::{GroupId, VehicleId};
use crate::strings::STR_ERROR_GROUP_CAN_T_CREATE;
use crate::vehicle::VehicleType;
use crate::world::{Group, World};

/// Create an empty group for `vehicle_type`.
pub(super) fn create_group(
    world: &mut World,
    ctx: &CommandContext,
    vehicle_type: VehicleType,
) -> Check<(CommandCost, CommandResult)> {
    if !ctx.company.is_company() {
        return Err(CommandCost::cmd_error());
    }
    if !world.groups.can_allocate(1) {
        return Err(CommandCost::error(STR_ERROR_GROUP_CAN_T_CREATE));
    }
    if !ctx.exec() {
        return Ok((CommandCost::new(), CommandResult::None));
    }
    let owner = ctx.company;
    let id = world
        .groups
        .insert_with(|_| Group {
            owner,
            vehicle_type,
            name: None,
        })
        .ok_or_else(|| CommandCost::error(STR_ERROR_GROUP_CAN_T_CREATE))?;
    Ok((CommandCost::new(), CommandResult::Group(id)))
}

/// Delete a group.
pub(super) fn delete_group(
    world: &mut World,
    ctx: &CommandContext,
    group: GroupId,
) -> Check<CommandCost> {
    let g = world.groups.get(group).ok_or_else(CommandCost::cmd_error)?;
    check_ownership(g.owner, ctx)?;
    if ctx.exec() {
        world.delete_group(group);
    }
    Ok(CommandCost::new())
}

/// Move `vehicle` into `group`.
pub(super) fn add_vehicle_to_group(
    world: &mut World,
    ctx: &CommandContext,
    group: GroupId,
    vehicle: VehicleId,
) -> Check<CommandCost> {
    let v = world.vehicles.get(vehicle).ok_or_else(CommandCost::cmd_error)?;
    check_ownership(v.owner, ctx)?;
    if !group.is_default() {
        let g = world.groups.get(group).ok_or_else(CommandCost::cmd_error)?;
        check_ownership(g.owner, ctx)?;
        if g.vehicle_type != v.vehicle_type {
            return Err(CommandCost::cmd_error());
        }
    }

    if ctx.exec() {
        if let Some(v) = world.vehicles.get_mut(vehicle) {
            v.group = group;
        }
    }
    Ok(CommandCost::new())
}
