//! Vehicles and engine types.
//!
//! A [`Vehicle`] here is the head of a consist. Its physical parts (wagons,
//! articulated parts, an aircraft's mail compartment) are kept inline as
//! [`VehiclePart`]s, each with its own cargo type and capacity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cargo::{CargoId, CargoMask};
use crate::ids::{CompanyId, EngineId, GroupId, StationId, TileIndex, VehicleId};
use crate::money::Money;
use crate::order_list::{OrderList, OrderListId, VehicleOrderId};

/// Smallest non-zero service interval in days.
pub const MIN_SERVINT_DAYS: u16 = 30;
/// Largest service interval in days.
pub const MAX_SERVINT_DAYS: u16 = 800;

/// Clamp a service interval to its valid range. Zero disables servicing.
#[must_use]
pub fn clamp_service_interval(interval: u16) -> u16 {
    if interval == 0 {
        0
    } else {
        interval.clamp(MIN_SERVINT_DAYS, MAX_SERVINT_DAYS)
    }
}

/// Kind of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VehicleType {
    /// Rail vehicle.
    Train,
    /// Road vehicle.
    Road,
    /// Ship.
    Ship,
    /// Aircraft; carries mail in a second compartment.
    Aircraft,
}

impl VehicleType {
    /// Trains and road vehicles.
    #[must_use]
    pub const fn is_ground(self) -> bool {
        matches!(self, Self::Train | Self::Road)
    }
}

/// Static properties of a buildable vehicle type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Engine {
    /// Display name.
    pub name: String,
    /// Transport kind.
    pub vehicle_type: VehicleType,
    /// Cargo carried when built without refit.
    pub default_cargo: CargoId,
    /// Capacity for the default cargo.
    pub capacity: u16,
    /// Cargos this engine can be refitted to.
    pub refit_mask: CargoMask,
    /// Capacity after refitting, for cargos whose capacity differs.
    pub refit_capacities: BTreeMap<CargoId, u16>,
    /// Mail capacity of aircraft.
    pub mail_capacity: u16,
    /// Maximum speed; zero for vehicles that never move on their own.
    pub max_speed: u16,
    /// Purchase cost.
    pub cost: Money,
    /// Engines of additional articulated parts.
    pub articulated_parts: Vec<EngineId>,
}

impl Engine {
    /// Capacity of a part of this engine when carrying `cargo`, and the
    /// secondary mail capacity for aircraft.
    #[must_use]
    pub fn determine_capacity(&self, cargo: CargoId) -> (u16, u16) {
        let capacity = if cargo == self.default_cargo {
            self.capacity
        } else {
            self.refit_capacities
                .get(&cargo)
                .copied()
                .unwrap_or(self.capacity)
        };
        let mail = if self.vehicle_type == VehicleType::Aircraft {
            self.mail_capacity
        } else {
            0
        };
        (capacity, mail)
    }

    /// Whether parts of this engine can carry `cargo`.
    #[must_use]
    pub fn can_carry(&self, cargo: CargoId) -> bool {
        cargo == self.default_cargo || self.refit_mask.contains(cargo)
    }
}

/// One physical part of a consist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehiclePart {
    /// Engine type of the part.
    pub engine: EngineId,
    /// Cargo currently carried.
    pub cargo_type: CargoId,
    /// Current capacity.
    pub cargo_cap: u16,
    /// Capacity available since the last refit.
    pub refit_cap: u16,
}

impl VehiclePart {
    /// Part carrying `cargo` with full capacity.
    #[must_use]
    pub const fn new(engine: EngineId, cargo_type: CargoId, capacity: u16) -> Self {
        Self {
            engine,
            cargo_type,
            cargo_cap: capacity,
            refit_cap: capacity,
        }
    }
}

/// Head of a consist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vehicle {
    /// Own handle.
    pub id: VehicleId,
    /// Owning company.
    pub owner: CompanyId,
    /// Transport kind.
    pub vehicle_type: VehicleType,
    /// Current tile.
    pub tile: TileIndex,
    /// Physical parts in consist order.
    pub parts: Vec<VehiclePart>,
    /// Order list followed, if any.
    pub orders: Option<OrderListId>,
    /// Index of the order currently executed.
    pub cur_real_order_index: VehicleOrderId,
    /// Index of the order (possibly implicit) last reached.
    pub cur_implicit_order_index: VehicleOrderId,
    /// Service interval in days.
    pub service_interval: u16,
    /// Group membership.
    pub group: GroupId,
    /// Custom name.
    pub name: Option<String>,
    /// Maximum speed of the consist.
    pub max_speed: u16,
    /// Value when sold.
    pub value: Money,
    /// Whether the vehicle is stopped inside a depot.
    pub stopped_in_depot: bool,
    /// Station most recently visited.
    pub last_station_visited: StationId,
    /// Station where cargo was most recently loaded.
    pub last_loading_station: StationId,
    /// Whether the vehicle is waiting for a full load right now.
    pub is_full_loading: bool,
    /// Ticks spent loading at the current station.
    pub load_unload_ticks: u16,
    /// Ticks spent on the current order.
    pub current_order_time: u32,
}

impl Vehicle {
    /// A vehicle without orders standing on `tile`.
    #[must_use]
    pub fn new(
        id: VehicleId,
        owner: CompanyId,
        vehicle_type: VehicleType,
        tile: TileIndex,
        parts: Vec<VehiclePart>,
    ) -> Self {
        Self {
            id,
            owner,
            vehicle_type,
            tile,
            parts,
            orders: None,
            cur_real_order_index: 0,
            cur_implicit_order_index: 0,
            service_interval: 150,
            group: GroupId::DEFAULT,
            name: None,
            max_speed: 0,
            value: Money::ZERO,
            stopped_in_depot: false,
            last_station_visited: StationId::INVALID,
            last_loading_station: StationId::INVALID,
            is_full_loading: false,
            load_unload_ticks: 0,
            current_order_time: 0,
        }
    }

    /// Whether the vehicle runs on land.
    #[must_use]
    pub const fn is_ground_vehicle(&self) -> bool {
        self.vehicle_type.is_ground()
    }

    /// Total capacity per cargo of all parts.
    #[must_use]
    pub fn capacities(&self) -> BTreeMap<CargoId, u32> {
        let mut totals = BTreeMap::new();
        for part in self.parts.iter().filter(|p| p.cargo_cap > 0) {
            *totals.entry(part.cargo_type).or_insert(0) += u32::from(part.cargo_cap);
        }
        totals
    }

    /// Move the real order index onto the next non-implicit order.
    pub fn update_real_order_index(&mut self, list: Option<&OrderList>) {
        let len = list.map_or(0, OrderList::len);
        if usize::from(self.cur_real_order_index) >= len {
            self.cur_real_order_index = 0;
        }
        let Some(list) = list else {
            return;
        };
        if list.num_manual_orders() == 0 {
            self.cur_real_order_index = 0;
            return;
        }
        while list
            .get(usize::from(self.cur_real_order_index))
            .is_some_and(crate::order::Order::is_implicit)
        {
            self.cur_real_order_index = next_order_id(self.cur_real_order_index, len);
        }
    }

    /// Order indices after inserting an order at `sel` into a list now `len` long.
    pub fn fix_indices_after_insert(&mut self, sel: VehicleOrderId, len: usize) {
        if sel <= self.cur_real_order_index {
            let cur = self.cur_real_order_index.saturating_add(1);
            if usize::from(cur) < len {
                self.cur_real_order_index = cur;
            }
        }
        if sel <= self.cur_implicit_order_index {
            let cur = self.cur_implicit_order_index.saturating_add(1);
            if usize::from(cur) < len {
                self.cur_implicit_order_index = cur;
            }
        }
    }

    /// Order indices after deleting the order at `sel` from `list`.
    pub fn fix_indices_after_delete(&mut self, sel: VehicleOrderId, list: &OrderList) {
        if sel < self.cur_real_order_index {
            self.cur_real_order_index -= 1;
        } else if sel == self.cur_real_order_index {
            self.update_real_order_index(Some(list));
        }

        if sel < self.cur_implicit_order_index {
            self.cur_implicit_order_index -= 1;
        } else if sel == self.cur_implicit_order_index {
            let len = list.len();
            if usize::from(self.cur_implicit_order_index) >= len {
                self.cur_implicit_order_index = 0;
            }
            while self.cur_implicit_order_index != self.cur_real_order_index
                && list
                    .get(usize::from(self.cur_implicit_order_index))
                    .is_some_and(|o| !o.is_implicit())
            {
                self.cur_implicit_order_index = next_order_id(self.cur_implicit_order_index, len);
            }
        }
    }

    /// Order indices after moving the order at `from` to `to`.
    pub fn fix_indices_after_move(&mut self, from: VehicleOrderId, to: VehicleOrderId) {
        let shift = |index: VehicleOrderId| {
            let moved = crate::order_list::shift_for_move(
                usize::from(index),
                usize::from(from),
                usize::from(to),
            );
            VehicleOrderId::try_from(moved).unwrap_or(index)
        };
        self.cur_real_order_index = shift(self.cur_real_order_index);
        self.cur_implicit_order_index = shift(self.cur_implicit_order_index);
    }
}

fn next_order_id(index: VehicleOrderId, len: usize) -> VehicleOrderId {
    let next = usize::from(index) + 1;
    if next >= len {
        0
    } else {
        VehicleOrderId::try_from(next).unwrap_or(0)
    }
}
