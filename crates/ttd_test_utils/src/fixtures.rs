//! Test fixtures and helpers.
//!
//! A small pre-built world shared by the integration tests: one company with
//! three train stations, a train depot, and a two-part train whose wagon can
//! be refitted from passengers to coal.

use std::collections::BTreeMap;

use ttd_core::cargo::{CargoId, CargoMask};
use ttd_core::command::{
    Command, CommandCallback, CommandDispatcher, CommandRequest, CommandResult,
};
use ttd_core::ids::{CompanyId, DepotId, EngineId, StationId, TileIndex, VehicleId};
use ttd_core::money::Money;
use ttd_core::order::Order;
use ttd_core::order_list::{OrderList, VehicleOrderId};
use ttd_core::settings::GameSettings;
use ttd_core::vehicle::{Engine, VehicleType};
use ttd_core::world::{StationFacilities, World};

/// Company playing in every fixture.
pub const COMPANY: CompanyId = CompanyId(0);

/// A second company, owning nothing but its own station.
pub const RIVAL: CompanyId = CompanyId(1);

/// Money both companies start with.
pub const STARTING_MONEY: Money = Money(1_000_000);

/// Tile of the fixture's train depot.
pub const DEPOT_TILE: TileIndex = TileIndex(100);

/// Price of the fixture's train.
pub const TRAIN_COST: Money = Money(5_000);

/// Capacity of the locomotive for passengers.
pub const HEAD_CAPACITY: u16 = 10;

/// Capacity of the wagon for passengers.
pub const WAGON_CAPACITY: u16 = 20;

/// Capacity of the wagon after a refit to coal.
pub const WAGON_COAL_CAPACITY: u16 = 15;

/// Build an engine type for tests.
#[must_use]
pub fn engine(
    vehicle_type: VehicleType,
    cargo: CargoId,
    capacity: u16,
    refits: &[(CargoId, u16)],
) -> Engine {
    let mut refit_mask = CargoMask::EMPTY;
    let mut refit_capacities = BTreeMap::new();
    for (refit, refit_capacity) in refits {
        refit_mask = refit_mask.union(CargoMask::single(*refit));
        refit_capacities.insert(*refit, *refit_capacity);
    }
    Engine {
        name: format!("{vehicle_type:?} {}", cargo.0),
        vehicle_type,
        default_cargo: cargo,
        capacity,
        refit_mask,
        refit_capacities,
        mail_capacity: 0,
        max_speed: 112,
        cost: Money::ZERO,
        articulated_parts: Vec::new(),
    }
}

/// Ready-made world with handles to everything in it.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// The world.
    pub world: World,
    /// Train stations of [`COMPANY`], in creation order.
    pub stations: Vec<StationId>,
    /// Station of [`RIVAL`].
    pub rival_station: StationId,
    /// Train depot of [`COMPANY`] on [`DEPOT_TILE`].
    pub depot: DepotId,
    /// Locomotive engine; builds with one articulated wagon.
    pub train: EngineId,
    /// Engine of the articulated wagon.
    pub wagon: EngineId,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    /// Fixture with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(GameSettings::default())
    }

    /// Fixture with custom settings.
    ///
    /// # Panics
    ///
    /// Panics if a fixture pool is full, which only happens with absurd
    /// pool settings.
    #[must_use]
    pub fn with_settings(settings: GameSettings) -> Self {
        let mut world = World::new(settings);
        world.add_company(COMPANY, "Fixture Transport", STARTING_MONEY);
        world.add_company(RIVAL, "Rival Lines", STARTING_MONEY);

        let stations = (0..3)
            .map(|n| {
                world
                    .add_station(
                        format!("Station {n}"),
                        COMPANY,
                        TileIndex(n * 10),
                        StationFacilities::TRAIN,
                    )
                    .expect("station pool")
            })
            .collect();
        let rival_station = world
            .add_station("Rival Halt", RIVAL, TileIndex(500), StationFacilities::TRAIN)
            .expect("station pool");
        let depot = world
            .add_depot(COMPANY, DEPOT_TILE, VehicleType::Train)
            .expect("depot pool");

        let wagon = world
            .add_engine(engine(
                VehicleType::Train,
                CargoId::PASSENGERS,
                WAGON_CAPACITY,
                &[(CargoId::COAL, WAGON_COAL_CAPACITY)],
            ))
            .expect("engine pool");
        let mut head = engine(VehicleType::Train, CargoId::PASSENGERS, HEAD_CAPACITY, &[]);
        head.cost = TRAIN_COST;
        head.articulated_parts = vec![wagon];
        let train = world.add_engine(head).expect("engine pool");

        Self {
            world,
            stations,
            rival_station,
            depot,
            train,
            wagon,
        }
    }

    /// The `n`th station of [`COMPANY`].
    #[must_use]
    pub fn station(&self, n: usize) -> StationId {
        self.stations[n]
    }

    /// Request building the fixture train in the depot, restoring any order
    /// backup left there.
    #[must_use]
    pub fn build_request(&self) -> CommandRequest {
        CommandRequest::new(
            Command::BuildVehicle {
                tile: DEPOT_TILE,
                engine: self.train,
                refit: None,
            },
            COMPANY,
        )
        .with_callback(CommandCallback::BuildPrimaryVehicle)
    }

    /// Build the fixture train through `dispatcher`, which must be offline.
    ///
    /// # Panics
    ///
    /// Panics if the build fails.
    pub fn build_train(&mut self, dispatcher: &mut CommandDispatcher) -> VehicleId {
        let request = self.build_request();
        let outcome = dispatcher
            .post(&mut self.world, request)
            .expect("build is allowed everywhere");
        match outcome.result {
            CommandResult::Vehicle(vehicle) => vehicle,
            other => panic!("build failed: {:?} {:?}", outcome.kind, other),
        }
    }

    /// Append `orders` to `vehicle` through `dispatcher`.
    ///
    /// # Panics
    ///
    /// Panics if an insertion fails.
    pub fn give_orders(
        &mut self,
        dispatcher: &mut CommandDispatcher,
        vehicle: VehicleId,
        orders: &[Order],
    ) {
        for order in orders {
            let sel = VehicleOrderId::try_from(self.world.num_orders(vehicle))
                .expect("order count fits");
            let request = CommandRequest::new(
                Command::InsertOrder {
                    vehicle,
                    sel,
                    order: order.clone(),
                },
                COMPANY,
            );
            let outcome = dispatcher
                .post(&mut self.world, request)
                .expect("insert is allowed everywhere");
            assert!(outcome.succeeded(), "insert {order:?} failed: {:?}", outcome.cost);
        }
    }

    /// Spawn the fixture train and attach `orders` directly, bypassing
    /// command validation. Handy for order lists commands would reject.
    ///
    /// # Panics
    ///
    /// Panics if a pool is full.
    pub fn spawn_train_with_orders(&mut self, orders: Vec<Order>) -> VehicleId {
        let vehicle = self
            .world
            .spawn_vehicle(COMPANY, self.train, DEPOT_TILE, None)
            .expect("vehicle pool");
        if !orders.is_empty() {
            let list = self
                .world
                .order_lists
                .insert_with(|_| OrderList::new(orders, vehicle))
                .expect("order list pool");
            if let Some(v) = self.world.vehicles.get_mut(vehicle) {
                v.orders = Some(list);
            }
        }
        vehicle
    }

    /// Orders of `vehicle`, cloned; empty if it has none.
    #[must_use]
    pub fn orders(&self, vehicle: VehicleId) -> Vec<Order> {
        self.world
            .orders_of(vehicle)
            .map(|list| list.orders().to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_train_has_articulated_wagon() {
        let mut scenario = Scenario::new();
        let mut dispatcher = CommandDispatcher::offline();
        let vehicle = scenario.build_train(&mut dispatcher);

        let v = scenario.world.vehicles.get(vehicle).unwrap();
        assert_eq!(v.parts.len(), 2);
        assert_eq!(v.parts[1].cargo_cap, WAGON_CAPACITY);
        assert_eq!(
            scenario.world.company_money(COMPANY),
            STARTING_MONEY - TRAIN_COST
        );
    }

    #[test]
    fn test_give_orders_appends() {
        let mut scenario = Scenario::new();
        let mut dispatcher = CommandDispatcher::offline();
        let vehicle = scenario.build_train(&mut dispatcher);
        let orders = [
            Order::goto_station(scenario.station(0)),
            Order::goto_station(scenario.station(1)),
        ];
        scenario.give_orders(&mut dispatcher, vehicle, &orders);
        assert_eq!(scenario.orders(vehicle), orders.to_vec());
    }
}
