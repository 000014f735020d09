//! # TTD Core
//!
//! Deterministic command, order and link-graph core of a transport
//! simulation.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No wall clock or system randomness
//!
//! This separation enables:
//! - Lockstep multiplayer (every peer executes the same command stream)
//! - Headless dedicated servers
//! - Command logs that replay to the same state hash
//!
//! ## Crate Structure
//!
//! - [`command`] - Command types, [`command::CommandCost`] and the dispatcher
//! - [`order`] / [`order_list`] - Vehicle orders and (shared) order lists
//! - [`order_backup`] - Saving orders across vehicle reconstruction
//! - [`link_refresher`] - Predicting cargo links from order lists
//! - [`cargo_monitor`] - Bit-packed pickup/delivery monitors for scripts
//! - [`world`] - The state object every command operates on

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod cargo;
pub mod cargo_monitor;
pub mod command;
pub mod error;
pub mod ids;
pub mod link_graph;
pub mod link_refresher;
pub mod money;
pub mod order;
pub mod order_backup;
pub mod order_list;
pub mod pool;
pub mod replay;
pub mod settings;
pub mod strings;
pub mod vehicle;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cargo::{CargoId, CargoMask, NUM_CARGO};
    pub use crate::command::{
        Command, CommandCost, CommandDispatcher, CommandRequest, CommandTag, DoCommandFlags,
        NetworkMode,
    };
    pub use crate::error::{GameError, Result};
    pub use crate::ids::{
        ClientId, CompanyId, DepotId, EngineId, GroupId, IndustryId, StationId, TileIndex, TownId,
        VehicleId,
    };
    pub use crate::money::Money;
    pub use crate::order::{LoadType, NonStopType, Order, OrderKind, UnloadType};
    pub use crate::order_list::{OrderList, VehicleOrderId};
    pub use crate::settings::GameSettings;
    pub use crate::vehicle::{Engine, Vehicle, VehicleType};
    pub use crate::world::World;
}
