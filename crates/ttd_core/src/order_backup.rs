//! Preserving orders across vehicle reconstruction.
//!
//! Selling a vehicle with `backup_orders` set snapshots its orders (or a
//! reference to a vehicle it shares them with) together with its name, group
//! and service interval, keyed by the depot tile and the client that sold it.
//! When that client builds a new vehicle on the same tile, the
//! [`CommandCallback::BuildPrimaryVehicle`](crate::command::CommandCallback)
//! callback replays the snapshot as ordinary commands so every peer applies
//! the restore in lockstep.
//!
//! Restoring is best effort: the first failing replayed order stops the order
//! replay, but the remaining state (index, group, backup removal) is still
//! restored.

use serde::{Deserialize, Serialize};

use crate::command::{
    CloneMode, Command, CommandDispatcher, CommandRequest, OrderModification, TimetableField,
};
use crate::ids::{ClientId, DepotId, GroupId, StationId, TileIndex, VehicleId};
use crate::order::{Order, OrderKind, VehicleOrderId};
use crate::pool::{pool_id, Pool};
use crate::world::World;

pool_id!(
    /// Handle of an order backup.
    OrderBackupId(u32)
);

/// Saved state of a vehicle that is about to be replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBackup {
    /// Depot tile the vehicle was sold on.
    pub tile: TileIndex,
    /// Client that created the backup.
    pub user: ClientId,
    /// Custom name of the vehicle.
    pub name: Option<String>,
    /// Group of the vehicle.
    pub group: GroupId,
    /// Service interval in days.
    pub service_interval: u16,
    /// Current order at the time of the backup.
    pub cur_real_order_index: VehicleOrderId,
    /// Vehicle the orders were shared with; `orders` is empty then.
    pub clone: Option<VehicleId>,
    /// Copy of the (unshared) orders, implicit orders left out.
    pub orders: Vec<Order>,
}

/// A destination that was removed from the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovedDestination {
    /// A station or waypoint.
    Station(StationId),
    /// A depot or hangar.
    Depot(DepotId),
}

impl RemovedDestination {
    fn matches(self, order: &Order) -> bool {
        match (self, order.kind) {
            (Self::Station(id), OrderKind::GotoStation { station }) => id == station,
            (Self::Station(id), OrderKind::GotoWaypoint { waypoint }) => id == waypoint,
            (Self::Station(id), OrderKind::Implicit { station }) => id == station,
            (Self::Depot(id), OrderKind::GotoDepot { depot }) => id == depot,
            _ => false,
        }
    }
}

/// All pending order backups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBackups {
    pool: Pool<OrderBackupId, OrderBackup>,
}

impl OrderBackups {
    /// Empty set holding at most `capacity` backups.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            pool: Pool::new(capacity),
        }
    }

    /// Number of pending backups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Whether no backup is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Iterate over pending backups.
    pub fn iter(&self) -> impl Iterator<Item = (OrderBackupId, &OrderBackup)> {
        self.pool.iter()
    }

    /// Get a backup by handle.
    #[must_use]
    pub fn get(&self, id: OrderBackupId) -> Option<&OrderBackup> {
        self.pool.get(id)
    }

    /// Backup of `user` on `tile`.
    #[must_use]
    pub fn find(&self, tile: TileIndex, user: ClientId) -> Option<(OrderBackupId, &OrderBackup)> {
        self.pool
            .iter()
            .find(|(_, backup)| backup.tile == tile && backup.user == user)
    }

    fn insert(&mut self, backup: OrderBackup) -> Option<OrderBackupId> {
        self.pool.insert_with(|_| backup)
    }

    /// Drop the backups of `user` on `tile`, or on every tile for `None`.
    pub fn reset_of_user(&mut self, tile: Option<TileIndex>, user: ClientId) {
        self.pool
            .retain(|_, b| !(b.user == user && tile.map_or(true, |t| b.tile == t)));
    }

    /// Drop every backup on `tile`, or all backups for `None`.
    pub fn reset(&mut self, tile: Option<TileIndex>) {
        self.pool.retain(|_, b| tile.is_some_and(|t| b.tile != t));
    }

    /// `user` left the game: its backups no longer belong to anybody.
    pub fn reset_user(&mut self, user: ClientId) {
        for (_, backup) in self.pool.iter_mut() {
            if backup.user == user {
                backup.user = ClientId::INVALID;
            }
        }
    }

    /// `group` was deleted: backups in it fall back to the default group.
    pub fn clear_group(&mut self, group: GroupId) {
        for (_, backup) in self.pool.iter_mut() {
            if backup.group == group {
                backup.group = GroupId::DEFAULT;
            }
        }
    }

    /// `vehicle` is being deleted: backups sharing its orders switch to
    /// `partner`, or are dropped when there is none.
    pub fn clear_vehicle(&mut self, vehicle: VehicleId, partner: Option<VehicleId>) {
        self.pool.retain(|_, backup| {
            if backup.clone != Some(vehicle) {
                return true;
            }
            backup.clone = partner;
            partner.is_some()
        });
    }

    /// `destination` was removed: orders heading there become placeholders.
    pub fn remove_order(&mut self, destination: RemovedDestination) {
        for (_, backup) in self.pool.iter_mut() {
            for order in backup.orders.iter_mut().filter(|o| destination.matches(o)) {
                order.kind = OrderKind::Dummy;
            }
        }
    }
}

/// Orders of a list without its implicit orders, skip targets and the
/// current index remapped to the remaining positions.
fn strip_implicit_orders(orders: &[Order], cur: VehicleOrderId) -> (Vec<Order>, VehicleOrderId) {
    let mut new_index = Vec::with_capacity(orders.len());
    let mut kept = 0usize;
    for order in orders {
        new_index.push(kept);
        if !order.is_implicit() {
            kept += 1;
        }
    }
    let remap = |index: VehicleOrderId| -> VehicleOrderId {
        let mapped = new_index.get(usize::from(index)).copied().unwrap_or(0);
        let mapped = if kept == 0 { 0 } else { mapped % kept };
        VehicleOrderId::try_from(mapped).unwrap_or(0)
    };

    let stripped = orders
        .iter()
        .filter(|o| !o.is_implicit())
        .map(|order| {
            let mut order = order.clone();
            if let Some(target) = order.skip_to() {
                order.set_skip_to(remap(target));
            }
            order
        })
        .collect();
    (stripped, remap(cur))
}

/// Snapshot `vehicle` for `user`, replacing that user's previous backup and
/// any other backup on the same tile.
pub fn backup(world: &mut World, vehicle: VehicleId, user: ClientId) {
    let Some(v) = world.vehicles.get(vehicle) else {
        return;
    };
    let tile = v.tile;
    let list = world.orders_of(vehicle);
    let clone = list.and_then(|l| l.sharing_partner(vehicle));
    let (orders, cur_real_order_index) = match (clone, list) {
        (None, Some(list)) => strip_implicit_orders(list.orders(), v.cur_real_order_index),
        _ => (Vec::new(), v.cur_real_order_index),
    };
    let backup = OrderBackup {
        tile,
        user,
        name: v.name.clone(),
        group: v.group,
        service_interval: v.service_interval,
        cur_real_order_index,
        clone,
        orders,
    };

    world
        .order_backups
        .pool
        .retain(|_, b| b.user != user && b.tile != tile);
    if world.order_backups.insert(backup).is_none() {
        tracing::warn!(vehicle = vehicle.0, "order backup pool full, orders not saved");
        return;
    }
    tracing::debug!(vehicle = vehicle.0, tile = tile.0, user = user.0, "orders backed up");
}

/// What a restore did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Orders replayed successfully (0 when orders were shared instead).
    pub orders_restored: usize,
    /// Whether the orders were shared with the saved partner.
    pub shared: bool,
    /// Position of the replayed order that failed, if any.
    pub failed_at: Option<usize>,
}

/// Replay the backup of `user` on the tile of `vehicle` onto `vehicle`.
///
/// The replay consists of ordinary commands posted through `dispatcher` on
/// behalf of the vehicle's owner. Returns `None` when there is nothing to
/// restore.
pub fn restore(
    dispatcher: &mut CommandDispatcher,
    world: &mut World,
    vehicle: VehicleId,
    user: ClientId,
) -> Option<RestoreReport> {
    let v = world.vehicles.get(vehicle)?;
    let owner = v.owner;
    let backup = world.order_backups.find(v.tile, user)?.1.clone();
    let timetabling = world.settings.order.timetabling;
    let mut report = RestoreReport::default();

    let mut post = |dispatcher: &mut CommandDispatcher, world: &mut World, command: Command| {
        let request = CommandRequest::new(command, owner).no_test_if_in_network();
        dispatcher
            .post(world, request)
            .is_ok_and(|outcome| outcome.succeeded())
    };

    if backup.name.is_some() {
        post(
            dispatcher,
            world,
            Command::RenameVehicle {
                vehicle,
                name: backup.name.clone(),
            },
        );
    }

    let num_orders = if let Some(partner) = backup.clone {
        report.shared = post(
            dispatcher,
            world,
            Command::CloneOrder {
                mode: CloneMode::Share,
                vehicle,
                source: Some(partner),
            },
        );
        world.num_orders(partner)
    } else {
        for (index, order) in backup.orders.iter().enumerate() {
            let Ok(sel) = VehicleOrderId::try_from(index) else {
                report.failed_at = Some(index);
                break;
            };
            let mut placeholder = order.clone();
            placeholder.set_skip_to(0);
            placeholder.wait_time = 0;
            placeholder.wait_timetabled = false;
            placeholder.travel_time = 0;
            placeholder.travel_timetabled = false;
            if !post(
                dispatcher,
                world,
                Command::InsertOrder {
                    vehicle,
                    sel,
                    order: placeholder,
                },
            ) {
                report.failed_at = Some(index);
                break;
            }
            if timetabling {
                for (field, value) in [
                    (TimetableField::WaitTime, order.wait_time),
                    (TimetableField::TravelTime, order.travel_time),
                ] {
                    if value > 0 {
                        post(
                            dispatcher,
                            world,
                            Command::ChangeTimetable {
                                vehicle,
                                sel,
                                field,
                                value,
                            },
                        );
                    }
                }
            }
            report.orders_restored += 1;
        }

        for (index, order) in backup.orders.iter().enumerate().take(report.orders_restored) {
            let (Some(target), Ok(sel)) = (order.skip_to(), VehicleOrderId::try_from(index)) else {
                continue;
            };
            if target == 0 {
                continue;
            }
            if !post(
                dispatcher,
                world,
                Command::ModifyOrder {
                    vehicle,
                    sel,
                    modification: OrderModification::CondDestination(target),
                },
            ) {
                report.failed_at.get_or_insert(index);
                break;
            }
        }
        report.orders_restored
    };

    if let Some(index) = report.failed_at {
        tracing::warn!(
            vehicle = vehicle.0,
            index,
            "order restore stopped at failing order"
        );
    }

    let index_command = match VehicleOrderId::try_from(num_orders) {
        Ok(len) if len > 0 => Command::RestoreOrderIndex {
            vehicle,
            order_index: backup.cur_real_order_index % len,
            service_interval: backup.service_interval,
        },
        _ => Command::ChangeServiceInterval {
            vehicle,
            interval: backup.service_interval,
        },
    };
    post(dispatcher, world, index_command);
    post(
        dispatcher,
        world,
        Command::AddVehicleToGroup {
            group: backup.group,
            vehicle,
        },
    );
    post(
        dispatcher,
        world,
        Command::ClearOrderBackup {
            tile: backup.tile,
            client: user,
        },
    );

    tracing::debug!(
        vehicle = vehicle.0,
        orders = report.orders_restored,
        shared = report.shared,
        "orders restored"
    );
    Some(report)
}
