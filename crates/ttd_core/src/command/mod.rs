//! Commands: the only way to change the world.
//!
//! Every mutating action is a [`Command`]. A command handler runs twice: once
//! without [`DoCommandFlags::EXEC`] to validate and price the action without
//! touching the world, and once with it to apply the change. Both runs must
//! agree on the resulting [`CommandCost`]; handlers read only the world and
//! their own parameters so every peer computes the same result.
//!
//! Static properties of a command (server-only, offline-only, ...) are looked
//! up with [`CommandTag::info`], an exhaustive `match` so a new command cannot
//! be added without declaring them.

mod dispatch;
mod group_cmd;
mod misc_cmd;
mod order_cmd;
mod vehicle_cmd;

use serde::{Deserialize, Serialize};

use crate::cargo::CargoId;
use crate::ids::{ClientId, CompanyId, GroupId, TileIndex, VehicleId};
use crate::money::Money;
use crate::order::{Order, VehicleOrderId};
use crate::strings::StringId;
use crate::vehicle::VehicleType;
use crate::world::World;

pub use dispatch::{
    CommandDispatcher, CommandError, CommandOutcome, CommandPacket, CommandRequest, NetworkMode,
    OutcomeKind,
};
pub use order_cmd::{CloneMode, OrderModification, TimetableField};

/// Result of a command: success with a cost, or failure with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandCost {
    cost: Money,
    message: StringId,
    success: bool,
}

impl Default for CommandCost {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandCost {
    /// Successful, free.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cost: Money::ZERO,
            message: StringId::INVALID,
            success: true,
        }
    }

    /// Successful with the given cost. Negative costs are income.
    #[must_use]
    pub const fn with_cost(cost: Money) -> Self {
        Self {
            cost,
            message: StringId::INVALID,
            success: true,
        }
    }

    /// Failed with `message`.
    #[must_use]
    pub const fn error(message: StringId) -> Self {
        Self {
            cost: Money::ZERO,
            message,
            success: false,
        }
    }

    /// Generic failure without a specific message.
    #[must_use]
    pub const fn cmd_error() -> Self {
        Self::error(StringId::INVALID)
    }

    /// Add to the accumulated cost.
    pub fn add_cost(&mut self, cost: Money) {
        self.cost += cost;
    }

    /// Add the cost of a sub-command; a failing sub-command makes this fail
    /// with its message.
    pub fn add_result(&mut self, other: &Self) {
        self.cost += other.cost;
        if self.success && !other.success {
            self.message = other.message;
            self.success = false;
        }
    }

    /// Multiply the accumulated cost.
    pub fn multiply_cost(&mut self, factor: i64) {
        self.cost = self.cost * factor;
    }

    /// Turn into a failure with `message`, keeping the accumulated cost.
    pub fn make_error(&mut self, message: StringId) {
        self.message = message;
        self.success = false;
    }

    /// Accumulated cost.
    #[must_use]
    pub const fn cost(&self) -> Money {
        self.cost
    }

    /// Failure message; [`StringId::INVALID`] on success.
    #[must_use]
    pub const fn message(&self) -> StringId {
        if self.success {
            StringId::INVALID
        } else {
            self.message
        }
    }

    /// Whether the command succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.success
    }

    /// Whether the command failed.
    #[must_use]
    pub const fn failed(&self) -> bool {
        !self.success
    }
}

/// Flags passed to a handler invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DoCommandFlags(u16);

impl DoCommandFlags {
    /// Apply side effects; without it the handler only tests.
    pub const EXEC: Self = Self(1 << 0);
    /// Building over removable obstacles is allowed.
    pub const AUTO: Self = Self(1 << 1);
    /// Only the cost is wanted; the test run skips the cash check.
    pub const QUERY_COST: Self = Self(1 << 2);
    /// Do not allow building on water.
    pub const NO_WATER: Self = Self(1 << 3);
    /// Allow operating on every tile, including map borders.
    pub const ALL_TILES: Self = Self(1 << 6);

    /// Returns an empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Checks if all flags in `other` are set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Static properties of a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandFlags(u16);

impl CommandFlags {
    /// Only the server may issue it.
    pub const SERVER: Self = Self(1 << 0);
    /// Spectators may issue it; it runs without a company.
    pub const SPECTATOR: Self = Self(1 << 1);
    /// Only allowed in single player.
    pub const OFFLINE: Self = Self(1 << 2);
    /// Set [`DoCommandFlags::AUTO`].
    pub const AUTO: Self = Self(1 << 3);
    /// Allowed on every tile.
    pub const ALL_TILES: Self = Self(1 << 4);
    /// Test and execution may legitimately yield different costs.
    pub const NO_TEST: Self = Self(1 << 5);
    /// Set [`DoCommandFlags::NO_WATER`].
    pub const NO_WATER: Self = Self(1 << 6);
    /// The command carries the issuing client's id, filled in by the dispatcher.
    pub const CLIENT_ID: Self = Self(1 << 7);

    /// Returns an empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Checks if all flags in `other` are set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Checks if any flags in `other` are set.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Handler flags implied by these command flags.
    #[must_use]
    pub const fn to_do_flags(self) -> DoCommandFlags {
        let mut flags = DoCommandFlags::empty();
        if self.contains(Self::AUTO) {
            flags = flags.union(DoCommandFlags::AUTO);
        }
        if self.contains(Self::NO_WATER) {
            flags = flags.union(DoCommandFlags::NO_WATER);
        }
        if self.contains(Self::ALL_TILES) {
            flags = flags.union(DoCommandFlags::ALL_TILES);
        }
        flags
    }
}

/// Post-execution action run on the issuing client.
///
/// The discriminants travel with networked commands; never reorder them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandCallback {
    /// Nothing.
    #[default]
    None = 0,
    /// A primary vehicle was built: restore backed up orders onto it.
    BuildPrimaryVehicle = 1,
}

impl CommandCallback {
    /// Callback from its wire id.
    #[must_use]
    pub const fn from_u8(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::None),
            1 => Some(Self::BuildPrimaryVehicle),
            _ => None,
        }
    }
}

/// Id created by a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandResult {
    /// Nothing created.
    #[default]
    None,
    /// A vehicle was built.
    Vehicle(VehicleId),
    /// A group was created.
    Group(GroupId),
}

/// A mutating action with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Insert `order` before position `sel` of the vehicle's orders.
    InsertOrder {
        /// Vehicle whose orders change.
        vehicle: VehicleId,
        /// Insert position; equal to the order count to append.
        sel: VehicleOrderId,
        /// New order.
        order: Order,
    },
    /// Delete the order at `sel`; a position past the end drops all orders.
    DeleteOrder {
        /// Vehicle whose orders change.
        vehicle: VehicleId,
        /// Order to delete.
        sel: VehicleOrderId,
    },
    /// Change one property of an order.
    ModifyOrder {
        /// Vehicle whose orders change.
        vehicle: VehicleId,
        /// Order to change.
        sel: VehicleOrderId,
        /// Property and new value.
        modification: OrderModification,
    },
    /// Make the vehicle head for order `sel` now.
    SkipToOrder {
        /// Vehicle to redirect.
        vehicle: VehicleId,
        /// Order to continue with.
        sel: VehicleOrderId,
    },
    /// Move an order to a new position.
    MoveOrder {
        /// Vehicle whose orders change.
        vehicle: VehicleId,
        /// Current position.
        from: VehicleOrderId,
        /// New position.
        to: VehicleOrderId,
    },
    /// Copy or share the orders of `source`, or stop sharing.
    CloneOrder {
        /// Copy, share or unshare.
        mode: CloneMode,
        /// Vehicle receiving the orders.
        vehicle: VehicleId,
        /// Vehicle providing them; unused when unsharing.
        source: Option<VehicleId>,
    },
    /// Set or clear the refit of an order.
    OrderRefit {
        /// Vehicle whose orders change.
        vehicle: VehicleId,
        /// Order to change.
        sel: VehicleOrderId,
        /// Target cargo, [`CargoId::AUTO_REFIT`], or `None` to clear.
        cargo: Option<CargoId>,
    },
    /// Change a timetable value of an order.
    ChangeTimetable {
        /// Vehicle whose orders change.
        vehicle: VehicleId,
        /// Order to change.
        sel: VehicleOrderId,
        /// Which value.
        field: TimetableField,
        /// New value; a speed of zero removes the limit.
        value: u16,
    },
    /// Set the current order and the service interval of a rebuilt vehicle.
    RestoreOrderIndex {
        /// Vehicle to update.
        vehicle: VehicleId,
        /// Current order.
        order_index: VehicleOrderId,
        /// Service interval in days.
        service_interval: u16,
    },
    /// Build a vehicle in the depot on `tile`.
    BuildVehicle {
        /// Depot tile.
        tile: TileIndex,
        /// Engine to build.
        engine: crate::ids::EngineId,
        /// Cargo to refit to right away.
        refit: Option<CargoId>,
    },
    /// Sell a vehicle stopped in a depot.
    SellVehicle {
        /// Vehicle to sell.
        vehicle: VehicleId,
        /// Keep its orders for a replacement built on the same tile.
        backup_orders: bool,
        /// Issuing client; filled in by the dispatcher.
        client: ClientId,
    },
    /// Give a vehicle a custom name, or reset it with `None` or an empty name.
    RenameVehicle {
        /// Vehicle to rename.
        vehicle: VehicleId,
        /// New name.
        name: Option<String>,
    },
    /// Change the service interval.
    ChangeServiceInterval {
        /// Vehicle to update.
        vehicle: VehicleId,
        /// Interval in days.
        interval: u16,
    },
    /// Create an empty vehicle group.
    CreateGroup {
        /// Vehicle kind of the group.
        vehicle_type: VehicleType,
    },
    /// Delete a group.
    DeleteGroup {
        /// Group to delete.
        group: GroupId,
    },
    /// Move a vehicle into a group (or the default group).
    AddVehicleToGroup {
        /// Target group.
        group: GroupId,
        /// Vehicle to move.
        vehicle: VehicleId,
    },
    /// Drop the order backups of `client` on `tile` (every tile with
    /// [`TileIndex::INVALID`]).
    ClearOrderBackup {
        /// Backup tile.
        tile: TileIndex,
        /// Issuing client; filled in by the dispatcher.
        client: ClientId,
    },
    /// Pause or unpause the game.
    Pause {
        /// New state.
        paused: bool,
    },
    /// Give the acting company money.
    MoneyCheat {
        /// Amount to add.
        amount: Money,
    },
}

/// Discriminant of a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CommandTag {
    /// [`Command::InsertOrder`]
    InsertOrder,
    /// [`Command::DeleteOrder`]
    DeleteOrder,
    /// [`Command::ModifyOrder`]
    ModifyOrder,
    /// [`Command::SkipToOrder`]
    SkipToOrder,
    /// [`Command::MoveOrder`]
    MoveOrder,
    /// [`Command::CloneOrder`]
    CloneOrder,
    /// [`Command::OrderRefit`]
    OrderRefit,
    /// [`Command::ChangeTimetable`]
    ChangeTimetable,
    /// [`Command::RestoreOrderIndex`]
    RestoreOrderIndex,
    /// [`Command::BuildVehicle`]
    BuildVehicle,
    /// [`Command::SellVehicle`]
    SellVehicle,
    /// [`Command::RenameVehicle`]
    RenameVehicle,
    /// [`Command::ChangeServiceInterval`]
    ChangeServiceInterval,
    /// [`Command::CreateGroup`]
    CreateGroup,
    /// [`Command::DeleteGroup`]
    DeleteGroup,
    /// [`Command::AddVehicleToGroup`]
    AddVehicleToGroup,
    /// [`Command::ClearOrderBackup`]
    ClearOrderBackup,
    /// [`Command::Pause`]
    Pause,
    /// [`Command::MoneyCheat`]
    MoneyCheat,
}

/// Static description of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    /// Name used in logs.
    pub name: &'static str,
    /// Static flags.
    pub flags: CommandFlags,
    /// Whether a successful execution changes the orders of a vehicle and so
    /// requires refreshing its predicted links.
    pub refreshes_links: bool,
}

const fn info(name: &'static str, flags: CommandFlags, refreshes_links: bool) -> CommandInfo {
    CommandInfo {
        name,
        flags,
        refreshes_links,
    }
}

impl CommandTag {
    /// Every command tag.
    pub const ALL: [Self; 19] = [
        Self::InsertOrder,
        Self::DeleteOrder,
        Self::ModifyOrder,
        Self::SkipToOrder,
        Self::MoveOrder,
        Self::CloneOrder,
        Self::OrderRefit,
        Self::ChangeTimetable,
        Self::RestoreOrderIndex,
        Self::BuildVehicle,
        Self::SellVehicle,
        Self::RenameVehicle,
        Self::ChangeServiceInterval,
        Self::CreateGroup,
        Self::DeleteGroup,
        Self::AddVehicleToGroup,
        Self::ClearOrderBackup,
        Self::Pause,
        Self::MoneyCheat,
    ];

    /// Static description.
    #[must_use]
    pub const fn info(self) -> CommandInfo {
        let none = CommandFlags::empty();
        match self {
            Self::InsertOrder => info("InsertOrder", none, true),
            Self::DeleteOrder => info("DeleteOrder", none, true),
            Self::ModifyOrder => info("ModifyOrder", none, true),
            Self::SkipToOrder => info("SkipToOrder", none, false),
            Self::MoveOrder => info("MoveOrder", none, true),
            Self::CloneOrder => info("CloneOrder", none, true),
            Self::OrderRefit => info("OrderRefit", none, true),
            Self::ChangeTimetable => info("ChangeTimetable", none, false),
            Self::RestoreOrderIndex => info("RestoreOrderIndex", none, false),
            Self::BuildVehicle => info("BuildVehicle", none, false),
            Self::SellVehicle => info("SellVehicle", CommandFlags::CLIENT_ID, false),
            Self::RenameVehicle => info("RenameVehicle", none, false),
            Self::ChangeServiceInterval => info("ChangeServiceInterval", none, false),
            Self::CreateGroup => info("CreateGroup", none, false),
            Self::DeleteGroup => info("DeleteGroup", none, false),
            Self::AddVehicleToGroup => info("AddVehicleToGroup", none, false),
            Self::ClearOrderBackup => info("ClearOrderBackup", CommandFlags::CLIENT_ID, false),
            Self::Pause => info(
                "Pause",
                CommandFlags::SERVER.union(CommandFlags::NO_TEST),
                false,
            ),
            Self::MoneyCheat => info("MoneyCheat", CommandFlags::OFFLINE, false),
        }
    }
}

impl Command {
    /// Discriminant.
    #[must_use]
    pub const fn tag(&self) -> CommandTag {
        match self {
            Self::InsertOrder { .. } => CommandTag::InsertOrder,
            Self::DeleteOrder { .. } => CommandTag::DeleteOrder,
            Self::ModifyOrder { .. } => CommandTag::ModifyOrder,
            Self::SkipToOrder { .. } => CommandTag::SkipToOrder,
            Self::MoveOrder { .. } => CommandTag::MoveOrder,
            Self::CloneOrder { .. } => CommandTag::CloneOrder,
            Self::OrderRefit { .. } => CommandTag::OrderRefit,
            Self::ChangeTimetable { .. } => CommandTag::ChangeTimetable,
            Self::RestoreOrderIndex { .. } => CommandTag::RestoreOrderIndex,
            Self::BuildVehicle { .. } => CommandTag::BuildVehicle,
            Self::SellVehicle { .. } => CommandTag::SellVehicle,
            Self::RenameVehicle { .. } => CommandTag::RenameVehicle,
            Self::ChangeServiceInterval { .. } => CommandTag::ChangeServiceInterval,
            Self::CreateGroup { .. } => CommandTag::CreateGroup,
            Self::DeleteGroup { .. } => CommandTag::DeleteGroup,
            Self::AddVehicleToGroup { .. } => CommandTag::AddVehicleToGroup,
            Self::ClearOrderBackup { .. } => CommandTag::ClearOrderBackup,
            Self::Pause { .. } => CommandTag::Pause,
            Self::MoneyCheat { .. } => CommandTag::MoneyCheat,
        }
    }

    /// Vehicle whose orders the command touches.
    #[must_use]
    pub const fn order_vehicle(&self) -> Option<VehicleId> {
        match self {
            Self::InsertOrder { vehicle, .. }
            | Self::DeleteOrder { vehicle, .. }
            | Self::ModifyOrder { vehicle, .. }
            | Self::SkipToOrder { vehicle, .. }
            | Self::MoveOrder { vehicle, .. }
            | Self::CloneOrder { vehicle, .. }
            | Self::OrderRefit { vehicle, .. }
            | Self::ChangeTimetable { vehicle, .. }
            | Self::RestoreOrderIndex { vehicle, .. } => Some(*vehicle),
            _ => None,
        }
    }

    /// Fill in the issuing client of [`CommandFlags::CLIENT_ID`] commands.
    pub fn set_client_id(&mut self, id: ClientId) {
        match self {
            Self::SellVehicle { client, .. } | Self::ClearOrderBackup { client, .. } => {
                *client = id;
            }
            _ => {}
        }
    }
}

/// Who runs a handler and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandContext {
    /// Handler flags.
    pub flags: DoCommandFlags,
    /// Acting company; [`CompanyId::SPECTATOR`] for server and spectator commands.
    pub company: CompanyId,
}

impl CommandContext {
    /// Whether side effects should be applied.
    #[must_use]
    pub const fn exec(&self) -> bool {
        self.flags.contains(DoCommandFlags::EXEC)
    }

    /// Whether the caller only wants the cost.
    #[must_use]
    pub const fn query_cost(&self) -> bool {
        self.flags.contains(DoCommandFlags::QUERY_COST)
    }
}

/// Early-return type used inside handlers: `Err` carries the failure.
pub(crate) type Check<T> = std::result::Result<T, CommandCost>;

/// Fail unless `owner` is the acting company.
pub(crate) fn check_ownership(owner: CompanyId, ctx: &CommandContext) -> Check<()> {
    if owner == ctx.company {
        Ok(())
    } else {
        Err(CommandCost::error(crate::strings::STR_ERROR_OWNED_BY))
    }
}

/// Run the handler of `command`.
///
/// Without [`DoCommandFlags::EXEC`] the world is left untouched.
pub fn execute(
    world: &mut World,
    ctx: &CommandContext,
    command: &Command,
) -> (CommandCost, CommandResult) {
    let outcome = match command {
        Command::InsertOrder {
            vehicle,
            sel,
            order,
        } => order_cmd::insert_order(world, ctx, *vehicle, *sel, order).map(plain),
        Command::DeleteOrder { vehicle, sel } => {
            order_cmd::delete_order(world, ctx, *vehicle, *sel).map(plain)
        }
        Command::ModifyOrder {
            vehicle,
            sel,
            modification,
        } => order_cmd::modify_order(world, ctx, *vehicle, *sel, *modification).map(plain),
        Command::SkipToOrder { vehicle, sel } => {
            order_cmd::skip_to_order(world, ctx, *vehicle, *sel).map(plain)
        }
        Command::MoveOrder { vehicle, from, to } => {
            order_cmd::move_order(world, ctx, *vehicle, *from, *to).map(plain)
        }
        Command::CloneOrder {
            mode,
            vehicle,
            source,
        } => order_cmd::clone_order(world, ctx, *mode, *vehicle, *source).map(plain),
        Command::OrderRefit {
            vehicle,
            sel,
            cargo,
        } => order_cmd::order_refit(world, ctx, *vehicle, *sel, *cargo).map(plain),
        Command::ChangeTimetable {
            vehicle,
            sel,
            field,
            value,
        } => order_cmd::change_timetable(world, ctx, *vehicle, *sel, *field, *value).map(plain),
        Command::RestoreOrderIndex {
            vehicle,
            order_index,
            service_interval,
        } => order_cmd::restore_order_index(world, ctx, *vehicle, *order_index, *service_interval)
            .map(plain),
        Command::BuildVehicle {
            tile,
            engine,
            refit,
        } => vehicle_cmd::build_vehicle(world, ctx, *tile, *engine, *refit),
        Command::SellVehicle {
            vehicle,
            backup_orders,
            client,
        } => vehicle_cmd::sell_vehicle(world, ctx, *vehicle, *backup_orders, *client).map(plain),
        Command::RenameVehicle { vehicle, name } => {
            vehicle_cmd::rename_vehicle(world, ctx, *vehicle, name.as_deref()).map(plain)
        }
        Command::ChangeServiceInterval { vehicle, interval } => {
            vehicle_cmd::change_service_interval(world, ctx, *vehicle, *interval).map(plain)
        }
        Command::CreateGroup { vehicle_type } => group_cmd::create_group(world, ctx, *vehicle_type),
        Command::DeleteGroup { group } => group_cmd::delete_group(world, ctx, *group).map(plain),
        Command::AddVehicleToGroup { group, vehicle } => {
            group_cmd::add_vehicle_to_group(world, ctx, *group, *vehicle).map(plain)
        }
        Command::ClearOrderBackup { tile, client } => {
            misc_cmd::clear_order_backup(world, ctx, *tile, *client).map(plain)
        }
        Command::Pause { paused } => misc_cmd::pause(world, ctx, *paused).map(plain),
        Command::MoneyCheat { amount } => misc_cmd::money_cheat(world, ctx, *amount).map(plain),
    };
    outcome.unwrap_or_else(|failure| (failure, CommandResult::None))
}

fn plain(cost: CommandCost) -> (CommandCost, CommandResult) {
    (cost, CommandResult::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::STR_ERROR_NOT_ENOUGH_CASH_REQUIRES_CURRENCY;

    #[test]
    fn test_add_result_takes_first_failure() {
        let mut total = CommandCost::with_cost(Money(100));
        total.add_result(&CommandCost::with_cost(Money(50)));
        assert_eq!(total.cost(), Money(150));
        assert!(total.succeeded());

        total.add_result(&CommandCost::error(STR_ERROR_NOT_ENOUGH_CASH_REQUIRES_CURRENCY));
        assert!(total.failed());
        assert_eq!(total.message(), STR_ERROR_NOT_ENOUGH_CASH_REQUIRES_CURRENCY);

        total.add_result(&CommandCost::cmd_error());
        assert_eq!(total.message(), STR_ERROR_NOT_ENOUGH_CASH_REQUIRES_CURRENCY);
    }

    #[test]
    fn test_multiply_cost_saturates() {
        let mut cost = CommandCost::with_cost(Money(i64::MAX / 2));
        cost.multiply_cost(4);
        assert_eq!(cost.cost(), Money(i64::MAX));
    }

    #[test]
    fn test_message_hidden_on_success() {
        assert_eq!(CommandCost::new().message(), StringId::INVALID);
    }

    #[test]
    fn test_callback_wire_ids_are_stable() {
        assert_eq!(CommandCallback::None as u8, 0);
        assert_eq!(CommandCallback::BuildPrimaryVehicle as u8, 1);
        assert_eq!(CommandCallback::from_u8(1), Some(CommandCallback::BuildPrimaryVehicle));
        assert_eq!(CommandCallback::from_u8(2), None);
    }

    #[test]
    fn test_trait_flags() {
        assert!(CommandTag::Pause.info().flags.contains(CommandFlags::SERVER));
        assert!(CommandTag::MoneyCheat.info().flags.contains(CommandFlags::OFFLINE));
        let restricted = CommandFlags::SERVER.union(CommandFlags::OFFLINE);
        let unrestricted = CommandTag::ALL
            .iter()
            .filter(|tag| !tag.info().flags.intersects(restricted))
            .count();
        assert_eq!(unrestricted, CommandTag::ALL.len() - 2);
    }

    #[test]
    fn test_set_client_id_only_on_client_commands() {
        let mut sell = Command::SellVehicle {
            vehicle: VehicleId(1),
            backup_orders: true,
            client: ClientId::INVALID,
        };
        sell.set_client_id(ClientId(7));
        assert!(matches!(sell, Command::SellVehicle { client: ClientId(7), .. }));
        assert!(CommandTag::SellVehicle.info().flags.contains(CommandFlags::CLIENT_ID));
    }
}
