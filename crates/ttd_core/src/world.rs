//! The replicated game state.
//!
//! Every command operates on a [`World`]. It bundles what used to be global
//! state (order backups, cargo monitors, link statistics) with the entity
//! pools, so tests can build a fresh world per case and peers can compare
//! worlds by [`World::state_hash`].

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::cargo::{CargoId, CargoMask};
use crate::cargo_monitor::CargoMonitors;
use crate::error::{GameError, Result};
use crate::ids::{
    CompanyId, DepotId, EngineId, GroupId, IndustryId, StationId, TileIndex, TownId, VehicleId,
};
use crate::link_graph::LinkGraph;
use crate::money::Money;
use crate::order_backup::OrderBackups;
use crate::order_list::{OrderList, OrderListId};
use crate::pool::Pool;
use crate::settings::GameSettings;
use crate::vehicle::{Engine, Vehicle, VehiclePart, VehicleType};

/// Ticks per game day.
pub const DAY_TICKS: u16 = 74;

/// Climate of the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Landscape {
    /// Temperate climate.
    #[default]
    Temperate = 0,
    /// Sub-arctic climate.
    Arctic = 1,
    /// Sub-tropical climate.
    Tropic = 2,
    /// Toyland.
    Toyland = 3,
}

impl Landscape {
    /// Number of landscapes.
    pub const COUNT: u8 = 4;

    /// Landscape from its wire byte; unknown values map to temperate.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Arctic,
            2 => Self::Tropic,
            3 => Self::Toyland,
            _ => Self::Temperate,
        }
    }
}

/// Map dimensions and climate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapInfo {
    /// Width in tiles.
    pub size_x: u16,
    /// Height in tiles.
    pub size_y: u16,
    /// Climate.
    pub landscape: Landscape,
}

impl Default for MapInfo {
    fn default() -> Self {
        Self {
            size_x: 256,
            size_y: 256,
            landscape: Landscape::Temperate,
        }
    }
}

/// A company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Company {
    /// Display name.
    pub name: String,
    /// Cash at hand.
    pub money: Money,
    /// Whether the company is controlled by an AI.
    pub is_ai: bool,
}

/// Which kinds of vehicles a station serves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StationFacilities(u8);

impl StationFacilities {
    /// Railway platforms.
    pub const TRAIN: Self = Self(1 << 0);
    /// Lorry stops.
    pub const TRUCK_STOP: Self = Self(1 << 1);
    /// Bus stops.
    pub const BUS_STOP: Self = Self(1 << 2);
    /// Airport.
    pub const AIRPORT: Self = Self(1 << 3);
    /// Dock.
    pub const DOCK: Self = Self(1 << 4);
    /// Rail waypoint.
    pub const WAYPOINT: Self = Self(1 << 7);

    /// Returns an empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
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
}

/// A station or waypoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Station {
    /// Display name.
    pub name: String,
    /// Owner; [`CompanyId::NONE`] for neutral stations.
    pub owner: CompanyId,
    /// Location.
    pub tile: TileIndex,
    /// Served vehicle kinds.
    pub facilities: StationFacilities,
    /// Nearest town.
    pub town: TownId,
}

impl Station {
    /// Whether this is a waypoint rather than a station.
    #[must_use]
    pub const fn is_waypoint(&self) -> bool {
        self.facilities.intersects(StationFacilities::WAYPOINT)
    }

    /// Whether vehicles of `vehicle_type` can stop here.
    #[must_use]
    pub const fn serves(&self, vehicle_type: VehicleType) -> bool {
        let needed = match vehicle_type {
            VehicleType::Train => StationFacilities::TRAIN,
            VehicleType::Road => StationFacilities::TRUCK_STOP.union(StationFacilities::BUS_STOP),
            VehicleType::Ship => StationFacilities::DOCK,
            VehicleType::Aircraft => StationFacilities::AIRPORT,
        };
        self.facilities.intersects(needed)
    }
}

/// A depot or hangar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Depot {
    /// Owner.
    pub owner: CompanyId,
    /// Location; vehicles built here start on this tile.
    pub tile: TileIndex,
    /// Vehicle kind built and serviced here.
    pub vehicle_type: VehicleType,
}

/// A town.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Town {
    /// Display name.
    pub name: String,
}

/// An industry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Industry {
    /// Display name.
    pub name: String,
    /// Town the industry belongs to.
    pub town: TownId,
}

/// A vehicle group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    /// Owner.
    pub owner: CompanyId,
    /// Vehicle kind in this group.
    pub vehicle_type: VehicleType,
    /// Custom name.
    pub name: Option<String>,
}

/// Complete replicated state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct World {
    /// Days since year 0.
    pub date: u32,
    /// Tick within the current day.
    pub date_fract: u16,
    /// Whether the game is paused.
    pub paused: bool,
    /// Map description.
    pub map: MapInfo,
    /// Companies by slot.
    pub companies: BTreeMap<CompanyId, Company>,
    /// Stations and waypoints.
    pub stations: Pool<StationId, Station>,
    /// Depots.
    pub depots: Pool<DepotId, Depot>,
    /// Towns.
    pub towns: Pool<TownId, Town>,
    /// Industries.
    pub industries: Pool<IndustryId, Industry>,
    /// Engine types.
    pub engines: Pool<EngineId, Engine>,
    /// Vehicle groups.
    pub groups: Pool<GroupId, Group>,
    /// Vehicles.
    pub vehicles: Pool<VehicleId, Vehicle>,
    /// Order lists.
    pub order_lists: Pool<OrderListId, OrderList>,
    /// Pending order backups.
    pub order_backups: OrderBackups,
    /// Predicted and observed cargo links.
    pub link_graph: LinkGraph,
    /// Script cargo monitors.
    pub cargo_monitors: CargoMonitors,
    /// Cargo types present in this game.
    pub valid_cargos: CargoMask,
    /// Settings.
    pub settings: GameSettings,
}

impl World {
    /// Create an empty world.
    #[must_use]
    pub fn new(settings: GameSettings) -> Self {
        let pools = &settings.pools;
        Self {
            date: 0,
            date_fract: 0,
            paused: false,
            map: MapInfo::default(),
            companies: BTreeMap::new(),
            stations: Pool::new(u32::from(u16::MAX - 1)),
            depots: Pool::new(u32::from(u16::MAX - 1)),
            towns: Pool::new(u32::from(u16::MAX - 1)),
            industries: Pool::new(u32::from(u16::MAX - 1)),
            engines: Pool::new(u32::from(u16::MAX - 1)),
            groups: Pool::new(pools.groups.min(u32::from(GroupId::DEFAULT.0) - 1)),
            vehicles: Pool::new(pools.vehicles),
            order_lists: Pool::new(pools.order_lists),
            order_backups: OrderBackups::new(pools.order_backups),
            link_graph: LinkGraph::new(),
            cargo_monitors: CargoMonitors::default(),
            valid_cargos: CargoMask(0b111),
            settings,
        }
    }

    /// Add a company with starting money.
    pub fn add_company(&mut self, id: CompanyId, name: impl Into<String>, money: Money) {
        self.companies.insert(
            id,
            Company {
                name: name.into(),
                money,
                is_ai: false,
            },
        );
    }

    /// Money of `company`, zero if it does not exist.
    #[must_use]
    pub fn company_money(&self, company: CompanyId) -> Money {
        self.companies.get(&company).map_or(Money::ZERO, |c| c.money)
    }

    /// Add a station.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PoolFull`] when no station id is left.
    pub fn add_station(
        &mut self,
        name: impl Into<String>,
        owner: CompanyId,
        tile: TileIndex,
        facilities: StationFacilities,
    ) -> Result<StationId> {
        let station = Station {
            name: name.into(),
            owner,
            tile,
            facilities,
            town: TownId::INVALID,
        };
        self.stations
            .insert_with(|_| station)
            .ok_or(GameError::PoolFull("station"))
    }

    /// Add a depot.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PoolFull`] when no depot id is left.
    pub fn add_depot(
        &mut self,
        owner: CompanyId,
        tile: TileIndex,
        vehicle_type: VehicleType,
    ) -> Result<DepotId> {
        self.depots
            .insert_with(|_| Depot {
                owner,
                tile,
                vehicle_type,
            })
            .ok_or(GameError::PoolFull("depot"))
    }

    /// Add a town.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PoolFull`] when no town id is left.
    pub fn add_town(&mut self, name: impl Into<String>) -> Result<TownId> {
        let name = name.into();
        self.towns
            .insert_with(|_| Town { name })
            .ok_or(GameError::PoolFull("town"))
    }

    /// Add an industry.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PoolFull`] when no industry id is left.
    pub fn add_industry(&mut self, name: impl Into<String>, town: TownId) -> Result<IndustryId> {
        let name = name.into();
        self.industries
            .insert_with(|_| Industry { name, town })
            .ok_or(GameError::PoolFull("industry"))
    }

    /// Add an engine type. Its cargos become valid cargos of this game.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PoolFull`] when no engine id is left.
    pub fn add_engine(&mut self, engine: Engine) -> Result<EngineId> {
        self.valid_cargos = self
            .valid_cargos
            .union(CargoMask::single(engine.default_cargo))
            .union(engine.refit_mask);
        self.engines
            .insert_with(|_| engine)
            .ok_or(GameError::PoolFull("engine"))
    }

    /// Depot standing on `tile`.
    #[must_use]
    pub fn depot_at(&self, tile: TileIndex) -> Option<DepotId> {
        self.depots
            .iter()
            .find(|(_, depot)| depot.tile == tile)
            .map(|(id, _)| id)
    }

    /// Whether `cargo` exists in this game.
    #[must_use]
    pub fn is_valid_cargo(&self, cargo: CargoId) -> bool {
        self.valid_cargos.contains(cargo)
    }

    /// Order list followed by `vehicle`.
    #[must_use]
    pub fn orders_of(&self, vehicle: VehicleId) -> Option<&OrderList> {
        let list = self.vehicles.get(vehicle)?.orders?;
        self.order_lists.get(list)
    }

    /// Number of orders of `vehicle`.
    #[must_use]
    pub fn num_orders(&self, vehicle: VehicleId) -> usize {
        self.orders_of(vehicle).map_or(0, OrderList::len)
    }

    /// Number of orders across all lists.
    #[must_use]
    pub fn total_orders(&self) -> usize {
        self.order_lists.iter().map(|(_, list)| list.len()).sum()
    }

    /// Whether `count` more orders fit in the order pool.
    #[must_use]
    pub fn can_allocate_orders(&self, count: usize) -> bool {
        self.total_orders().saturating_add(count) <= self.settings.pools.orders as usize
    }

    /// Parts of a new consist of `engine`.
    fn build_parts(&self, engine_id: EngineId, engine: &Engine, cargo: CargoId) -> Vec<VehiclePart> {
        let head_cargo = if engine.can_carry(cargo) {
            cargo
        } else {
            engine.default_cargo
        };
        let (capacity, mail) = engine.determine_capacity(head_cargo);
        let mut parts = vec![VehiclePart::new(engine_id, head_cargo, capacity)];
        if engine.vehicle_type == VehicleType::Aircraft {
            parts.push(VehiclePart::new(engine_id, CargoId::MAIL, mail));
            return parts;
        }
        for part_id in &engine.articulated_parts {
            if let Some(part) = self.engines.get(*part_id) {
                let part_cargo = if part.can_carry(cargo) {
                    cargo
                } else {
                    part.default_cargo
                };
                let (capacity, _) = part.determine_capacity(part_cargo);
                parts.push(VehiclePart::new(*part_id, part_cargo, capacity));
            }
        }
        parts
    }

    /// Number of vehicle parts a consist of `engine` consists of.
    #[must_use]
    pub fn parts_needed(&self, engine: &Engine) -> usize {
        if engine.vehicle_type == VehicleType::Aircraft {
            2
        } else {
            1 + engine.articulated_parts.len()
        }
    }

    /// Create a stopped vehicle of `engine` owned by `owner` on `tile`,
    /// refitted to `cargo` where its parts allow.
    ///
    /// Returns `None` if the engine does not exist or the vehicle pool is full.
    pub fn spawn_vehicle(
        &mut self,
        owner: CompanyId,
        engine_id: EngineId,
        tile: TileIndex,
        cargo: Option<CargoId>,
    ) -> Option<VehicleId> {
        let engine = self.engines.get(engine_id)?;
        let parts = self.build_parts(engine_id, engine, cargo.unwrap_or(CargoId::INVALID));
        let vehicle_type = engine.vehicle_type;
        let max_speed = engine.max_speed;
        let value = engine.cost;
        let service_interval = self.settings.vehicle.default_service_interval;
        self.vehicles.insert_with(|id| {
            let mut vehicle = Vehicle::new(id, owner, vehicle_type, tile, parts);
            vehicle.max_speed = max_speed;
            vehicle.value = value;
            vehicle.service_interval = service_interval;
            vehicle.stopped_in_depot = true;
            vehicle
        })
    }

    /// Detach `vehicle` from its order list, freeing the list when it was the
    /// last sharer, and reset its order indices.
    pub fn delete_vehicle_orders(&mut self, vehicle: VehicleId) {
        let Some(v) = self.vehicles.get_mut(vehicle) else {
            return;
        };
        let list_id = v.orders.take();
        v.cur_real_order_index = 0;
        v.cur_implicit_order_index = 0;
        let Some(list_id) = list_id else {
            return;
        };
        let remaining = self
            .order_lists
            .get_mut(list_id)
            .map_or(0, |list| list.remove_sharer(vehicle));
        if remaining == 0 {
            self.order_lists.remove(list_id);
        }
    }

    /// Remove `vehicle` from the world.
    ///
    /// Backups sharing orders with it are repointed first; then its orders are
    /// released.
    pub fn delete_vehicle(&mut self, vehicle: VehicleId) -> Option<Vehicle> {
        let partner = self
            .orders_of(vehicle)
            .and_then(|list| list.sharing_partner(vehicle));
        self.order_backups.clear_vehicle(vehicle, partner);
        self.delete_vehicle_orders(vehicle);
        self.vehicles.remove(vehicle)
    }

    /// Remove a group; its vehicles and backups fall back to the default group.
    pub fn delete_group(&mut self, group: GroupId) -> Option<Group> {
        for (_, vehicle) in self.vehicles.iter_mut() {
            if vehicle.group == group {
                vehicle.group = GroupId::DEFAULT;
            }
        }
        self.order_backups.clear_group(group);
        self.groups.remove(group)
    }

    /// Advance the clock by one tick.
    pub fn tick(&mut self) {
        if self.paused {
            return;
        }
        self.date_fract += 1;
        if self.date_fract >= DAY_TICKS {
            self.date_fract = 0;
            self.date = self.date.saturating_add(1);
        }
    }

    /// Hash of the complete state.
    ///
    /// Two worlds with identical state produce identical hashes; peers
    /// compare these to detect desyncs.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// Serialize the world for snapshots and replays.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize world: {}", e)))
    }

    /// Deserialize a world snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize world: {}", e)))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(GameSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Order;

    fn engine(vehicle_type: VehicleType) -> Engine {
        Engine {
            name: "Test".to_string(),
            vehicle_type,
            default_cargo: CargoId::PASSENGERS,
            capacity: 30,
            refit_mask: CargoMask::EMPTY,
            refit_capacities: BTreeMap::new(),
            mail_capacity: 10,
            max_speed: 100,
            cost: Money(500),
            articulated_parts: Vec::new(),
        }
    }

    #[test]
    fn test_spawn_aircraft_has_mail_part() {
        let mut world = World::default();
        let e = world.add_engine(engine(VehicleType::Aircraft)).unwrap();
        let v = world
            .spawn_vehicle(CompanyId(0), e, TileIndex(5), None)
            .unwrap();
        let vehicle = world.vehicles.get(v).unwrap();
        assert_eq!(vehicle.parts.len(), 2);
        assert_eq!(vehicle.parts[1].cargo_type, CargoId::MAIL);
        assert_eq!(vehicle.parts[1].cargo_cap, 10);
        assert!(vehicle.stopped_in_depot);
    }

    #[test]
    fn test_delete_vehicle_orders_frees_unshared_list() {
        let mut world = World::default();
        let e = world.add_engine(engine(VehicleType::Train)).unwrap();
        let a = world.spawn_vehicle(CompanyId(0), e, TileIndex(5), None).unwrap();
        let b = world.spawn_vehicle(CompanyId(0), e, TileIndex(5), None).unwrap();
        let list = world
            .order_lists
            .insert_with(|_| OrderList::new(vec![Order::goto_station(StationId(1))], a))
            .unwrap();
        world.order_lists.get_mut(list).unwrap().add_sharer(a, b);
        world.vehicles.get_mut(a).unwrap().orders = Some(list);
        world.vehicles.get_mut(b).unwrap().orders = Some(list);

        world.delete_vehicle_orders(a);
        assert!(world.order_lists.contains(list));
        assert_eq!(world.num_orders(b), 1);

        world.delete_vehicle_orders(b);
        assert!(!world.order_lists.contains(list));
    }

    #[test]
    fn test_state_hash_tracks_changes() {
        let mut a = World::default();
        let b = World::default();
        assert_eq!(a.state_hash(), b.state_hash());
        a.add_company(CompanyId(0), "Rail Co", Money(1000));
        assert_ne!(a.state_hash(), b.state_hash());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut world = World::default();
        world.add_company(CompanyId(0), "Rail Co", Money(1000));
        world
            .add_station("Central", CompanyId(0), TileIndex(3), StationFacilities::TRAIN)
            .unwrap();
        let bytes = world.serialize().unwrap();
        let restored = World::deserialize(&bytes).unwrap();
        assert_eq!(world.state_hash(), restored.state_hash());
    }

    #[test]
    fn test_tick_rolls_over_days() {
        let mut world = World::default();
        for _ in 0..DAY_TICKS {
            world.tick();
        }
        assert_eq!(world.date, 1);
        assert_eq!(world.date_fract, 0);
    }
}
