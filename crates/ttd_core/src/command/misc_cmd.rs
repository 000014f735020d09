//! Server, backup bookkeeping and cheat commands.

use super::{Check, CommandContext, CommandCost};
use crate::ids::{ClientId, TileIndex};
use crate::money::Money;
use crate::world::World;

/// Drop order backups of `client` on `tile`, or on every tile for
/// [`TileIndex::INVALID`].
#[allow(clippy::unnecessary_wraps)]
pub(super) fn clear_order_backup(
    world: &mut World,
    ctx: &CommandContext,
    tile: TileIndex,
    client: ClientId,
) -> Check<CommandCost> {
    if ctx.exec() {
        let tile = (tile != TileIndex::INVALID).then_some(tile);
        world.order_backups.reset_of_user(tile, client);
    }
    Ok(CommandCost::new())
}

/// Pause or unpause the simulation clock.
pub(super) fn pause(world: &mut World, ctx: &CommandContext, paused: bool) -> Check<CommandCost> {
    if world.paused == paused {
        return Err(CommandCost::cmd_error());
    }
    if ctx.exec() {
        world.paused = paused;
        tracing::info!(paused, "game pause state changed");
    }
    Ok(CommandCost::new())
}

/// Hand the acting company `amount`; the negative cost is booked as income.
#[allow(clippy::unnecessary_wraps)]
pub(super) fn money_cheat(
    _world: &mut World,
    _ctx: &CommandContext,
    amount: Money,
) -> Check<CommandCost> {
    Ok(CommandCost::with_cost(-amount))
}
