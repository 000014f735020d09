//! A single vehicle order.
//!
//! An [`Order`] tells a vehicle where to go ([`OrderKind`]) and what to do
//! there (load/unload behaviour, non-stop handling, depot action, refit and
//! timetable values). Orders are plain values; the sequence a vehicle
//! follows lives in an [`crate::order_list::OrderList`].

use serde::{Deserialize, Serialize};

use crate::cargo::CargoId;
use crate::ids::{DepotId, StationId};

/// Index of an order inside its list.
pub type VehicleOrderId = u8;

/// No order; also the skip target of a conditional that was never set.
pub const INVALID_VEH_ORDER_ID: VehicleOrderId = 0xFF;

/// Maximum number of orders a single list may hold.
pub const MAX_VEH_ORDER_ID: VehicleOrderId = 0xFE;

/// Timetable travel speed meaning "no speed limit".
pub const NO_SPEED_LIMIT: u16 = u16::MAX;

/// Largest comparison value for conditional orders on non-percentage variables.
pub const MAX_CONDITION_VALUE: u16 = 2047;

/// Loading behaviour at a station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadType {
    /// Load whatever is waiting.
    #[default]
    LoadIfPossible,
    /// Wait until every cargo type is fully loaded.
    FullLoad,
    /// Wait until any cargo type is fully loaded.
    FullLoadAny,
    /// Never load.
    NoLoad,
}

/// Unloading behaviour at a station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnloadType {
    /// Unload cargo accepted by the station.
    #[default]
    UnloadIfPossible,
    /// Unload everything.
    Unload,
    /// Unload everything for transfer.
    Transfer,
    /// Keep the cargo on board.
    NoUnload,
}

/// Which stations on the way the vehicle stops at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NonStopType {
    /// Stop at every station passed.
    #[default]
    StopEverywhere,
    /// Skip intermediate stations, stop at the destination.
    NoStopAtIntermediate,
    /// Stop at intermediate stations but pass through the destination.
    NoStopAtDestination,
    /// Stop nowhere.
    NoStopAtAny,
}

impl NonStopType {
    /// Whether the destination station itself is passed through.
    #[must_use]
    pub const fn skips_destination(self) -> bool {
        matches!(self, Self::NoStopAtDestination | Self::NoStopAtAny)
    }
}

/// What a vehicle does on arrival at a depot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepotAction {
    /// Always enter the depot and continue.
    #[default]
    AlwaysGo,
    /// Only go for servicing when the vehicle needs it.
    Service,
    /// Enter the depot and stop there.
    Stop,
}

impl DepotAction {
    /// Whether the vehicle halts in the depot.
    #[must_use]
    pub const fn halts(self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Vehicle property tested by a conditional order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionVariable {
    /// Current load in percent.
    LoadPercentage,
    /// Reliability in percent.
    Reliability,
    /// Maximum speed.
    MaxSpeed,
    /// Age in years.
    Age,
    /// Whether the vehicle needs servicing.
    RequiresService,
    /// Always jump.
    #[default]
    Unconditionally,
    /// Remaining lifetime in years.
    RemainingLifetime,
    /// Maximum reliability in percent.
    MaxReliability,
}

impl ConditionVariable {
    /// Whether the variable is a percentage (values above 100 are meaningless).
    #[must_use]
    pub const fn is_percentage(self) -> bool {
        matches!(self, Self::LoadPercentage | Self::Reliability)
    }
}

/// Comparison used by a conditional order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionComparator {
    /// `==`
    #[default]
    Equals,
    /// `!=`
    NotEquals,
    /// `<`
    LessThan,
    /// `<=`
    LessEquals,
    /// `>`
    MoreThan,
    /// `>=`
    MoreEquals,
    /// Boolean variable is true.
    IsTrue,
    /// Boolean variable is false.
    IsFalse,
}

impl ConditionComparator {
    /// Whether the comparator tests a boolean rather than comparing a value.
    #[must_use]
    pub const fn is_boolean(self) -> bool {
        matches!(self, Self::IsTrue | Self::IsFalse)
    }
}

/// Checks whether a (variable, comparator, value) triple forms a valid condition.
#[must_use]
pub fn is_valid_condition(
    variable: ConditionVariable,
    comparator: ConditionComparator,
    value: u16,
) -> bool {
    match variable {
        ConditionVariable::Unconditionally => {
            comparator == ConditionComparator::Equals && value == 0
        }
        ConditionVariable::RequiresService => comparator.is_boolean() && value == 0,
        _ => {
            let max = if variable.is_percentage() {
                100
            } else {
                MAX_CONDITION_VALUE
            };
            !comparator.is_boolean() && value <= max
        }
    }
}

/// Where an order sends the vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Empty order.
    #[default]
    Nothing,
    /// Go to a station and (possibly) load/unload.
    GotoStation {
        /// Target station.
        station: StationId,
    },
    /// Go to a depot.
    GotoDepot {
        /// Target depot.
        depot: DepotId,
    },
    /// Pass through a waypoint.
    GotoWaypoint {
        /// Target waypoint.
        waypoint: StationId,
    },
    /// Jump to another order if the condition holds.
    Conditional {
        /// Tested vehicle property.
        variable: ConditionVariable,
        /// Comparison.
        comparator: ConditionComparator,
        /// Compared value.
        value: u16,
        /// Order to continue with when the condition holds.
        skip_to: VehicleOrderId,
    },
    /// A stop the vehicle made without being ordered to.
    Implicit {
        /// Visited station.
        station: StationId,
    },
    /// Placeholder for an order whose destination no longer exists.
    Dummy,
}

/// One entry of an order list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Order {
    /// Destination and type.
    pub kind: OrderKind,
    /// Loading behaviour.
    pub load: LoadType,
    /// Unloading behaviour.
    pub unload: UnloadType,
    /// Non-stop behaviour.
    pub non_stop: NonStopType,
    /// Depot behaviour (only used by depot orders).
    pub depot_action: DepotAction,
    /// Cargo to refit to, [`CargoId::AUTO_REFIT`], or `None`.
    pub refit: Option<CargoId>,
    /// Timetabled waiting time in ticks.
    pub wait_time: u16,
    /// Whether `wait_time` is an explicit timetable entry.
    pub wait_timetabled: bool,
    /// Timetabled travel time in ticks.
    pub travel_time: u16,
    /// Whether `travel_time` is an explicit timetable entry.
    pub travel_timetabled: bool,
    /// Maximum speed while heading for this order.
    pub max_speed: u16,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            kind: OrderKind::Nothing,
            load: LoadType::default(),
            unload: UnloadType::default(),
            non_stop: NonStopType::default(),
            depot_action: DepotAction::default(),
            refit: None,
            wait_time: 0,
            wait_timetabled: false,
            travel_time: 0,
            travel_timetabled: false,
            max_speed: NO_SPEED_LIMIT,
        }
    }
}

impl Order {
    /// Order to go to `station`.
    #[must_use]
    pub fn goto_station(station: StationId) -> Self {
        Self {
            kind: OrderKind::GotoStation { station },
            ..Self::default()
        }
    }

    /// Order to go to `depot`.
    #[must_use]
    pub fn goto_depot(depot: DepotId, action: DepotAction) -> Self {
        Self {
            kind: OrderKind::GotoDepot { depot },
            depot_action: action,
            ..Self::default()
        }
    }

    /// Order to pass `waypoint`.
    #[must_use]
    pub fn goto_waypoint(waypoint: StationId) -> Self {
        Self {
            kind: OrderKind::GotoWaypoint { waypoint },
            ..Self::default()
        }
    }

    /// Conditional jump to `skip_to`.
    #[must_use]
    pub fn conditional(
        variable: ConditionVariable,
        comparator: ConditionComparator,
        value: u16,
        skip_to: VehicleOrderId,
    ) -> Self {
        Self {
            kind: OrderKind::Conditional {
                variable,
                comparator,
                value,
                skip_to,
            },
            ..Self::default()
        }
    }

    /// Unconditional jump to `skip_to`.
    #[must_use]
    pub fn jump(skip_to: VehicleOrderId) -> Self {
        Self::conditional(
            ConditionVariable::Unconditionally,
            ConditionComparator::Equals,
            0,
            skip_to,
        )
    }

    /// Implicit stop at `station`.
    #[must_use]
    pub fn implicit(station: StationId) -> Self {
        Self {
            kind: OrderKind::Implicit { station },
            ..Self::default()
        }
    }

    /// Builder: set the load type.
    #[must_use]
    pub fn with_load(mut self, load: LoadType) -> Self {
        self.load = load;
        self
    }

    /// Builder: set the unload type.
    #[must_use]
    pub fn with_unload(mut self, unload: UnloadType) -> Self {
        self.unload = unload;
        self
    }

    /// Builder: set the non-stop type.
    #[must_use]
    pub fn with_non_stop(mut self, non_stop: NonStopType) -> Self {
        self.non_stop = non_stop;
        self
    }

    /// Builder: set the refit cargo.
    #[must_use]
    pub fn with_refit(mut self, cargo: CargoId) -> Self {
        self.refit = Some(cargo);
        self
    }

    /// Whether this is a station order.
    #[must_use]
    pub const fn is_goto_station(&self) -> bool {
        matches!(self.kind, OrderKind::GotoStation { .. })
    }

    /// Whether this is a depot order.
    #[must_use]
    pub const fn is_goto_depot(&self) -> bool {
        matches!(self.kind, OrderKind::GotoDepot { .. })
    }

    /// Whether this is an implicit order.
    #[must_use]
    pub const fn is_implicit(&self) -> bool {
        matches!(self.kind, OrderKind::Implicit { .. })
    }

    /// Whether this is a conditional order.
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self.kind, OrderKind::Conditional { .. })
    }

    /// Whether the vehicle stops at a station for this order (real or implicit).
    #[must_use]
    pub const fn is_station_stop(&self) -> bool {
        self.is_goto_station() || self.is_implicit()
    }

    /// Station this order goes to, if any.
    #[must_use]
    pub const fn station(&self) -> Option<StationId> {
        match self.kind {
            OrderKind::GotoStation { station } | OrderKind::Implicit { station } => Some(station),
            OrderKind::GotoWaypoint { waypoint } => Some(waypoint),
            _ => None,
        }
    }

    /// Skip target of a conditional order.
    #[must_use]
    pub const fn skip_to(&self) -> Option<VehicleOrderId> {
        match self.kind {
            OrderKind::Conditional { skip_to, .. } => Some(skip_to),
            _ => None,
        }
    }

    /// Change the skip target. No effect on non-conditional orders.
    pub fn set_skip_to(&mut self, target: VehicleOrderId) {
        if let OrderKind::Conditional { skip_to, .. } = &mut self.kind {
            *skip_to = target;
        }
    }

    /// Whether the order carries any refit, automatic or not.
    #[must_use]
    pub const fn is_refit(&self) -> bool {
        self.refit.is_some()
    }

    /// Whether the order refits to whatever cargo is available.
    #[must_use]
    pub fn is_auto_refit(&self) -> bool {
        self.refit == Some(CargoId::AUTO_REFIT)
    }

    /// Whether loading is forbidden for this order.
    #[must_use]
    pub fn forbids_loading(&self) -> bool {
        self.load == LoadType::NoLoad
    }

    /// Whether the order is a full-load order.
    #[must_use]
    pub const fn is_full_load(&self) -> bool {
        matches!(self.load, LoadType::FullLoad | LoadType::FullLoadAny)
    }

    /// Whether the vehicle can load or unload anything while executing this order.
    #[must_use]
    pub fn can_load_or_unload(&self) -> bool {
        self.is_station_stop()
            && !self.non_stop.skips_destination()
            && (self.load != LoadType::NoLoad || self.unload != UnloadType::NoUnload)
    }

    /// Whether the vehicle can leave with cargo after this order.
    ///
    /// `has_cargo` tells whether cargo was already on board on arrival.
    #[must_use]
    pub fn can_leave_with_cargo(&self, has_cargo: bool) -> bool {
        self.load != LoadType::NoLoad
            || (has_cargo && matches!(self.unload, UnloadType::UnloadIfPossible | UnloadType::NoUnload))
    }
}
