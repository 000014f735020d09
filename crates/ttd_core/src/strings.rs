//! String-table references.
//!
//! The core never formats user-facing text. Failures carry a [`StringId`]
//! that the presentation layer resolves in its own language table. The
//! numeric values are stable because they travel inside command results.

use serde::{Deserialize, Serialize};

/// Opaque reference into the string table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringId(pub u16);

impl StringId {
    /// "No message"; also the message of a generic command error.
    pub const INVALID: Self = Self(0xFFFF);

    /// Whether this refers to an actual string.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

/// Not enough cash; requires more money.
pub const STR_ERROR_NOT_ENOUGH_CASH_REQUIRES_CURRENCY: StringId = StringId(0x0003);
/// The object is owned by another company.
pub const STR_ERROR_OWNED_BY: StringId = StringId(0x0013);
/// The command is not available in multiplayer.
pub const STR_ERROR_NOT_ALLOWED_WHILE_IN_MULTIPLAYER: StringId = StringId(0x0021);
/// The command may only be issued by the server.
pub const STR_ERROR_ONLY_AVAILABLE_TO_SERVER: StringId = StringId(0x0022);
/// Spectators cannot issue this command.
pub const STR_ERROR_SPECTATORS_CANNOT_DO_THIS: StringId = StringId(0x0023);
/// Too many orders in one list.
pub const STR_ERROR_TOO_MANY_ORDERS: StringId = StringId(0x0110);
/// The order pool is exhausted.
pub const STR_ERROR_NO_MORE_SPACE_FOR_ORDERS: StringId = StringId(0x0111);
/// The vehicle cannot use this station.
pub const STR_ERROR_CAN_T_ADD_ORDER: StringId = StringId(0x0112);
/// The vehicle cannot go to this depot.
pub const STR_ERROR_CAN_T_GO_TO_DEPOT: StringId = StringId(0x0113);
/// Waypoints are only for vehicles that can use them.
pub const STR_ERROR_CAN_T_USE_WAYPOINT: StringId = StringId(0x0114);
/// Sharing/copying orders between vehicles of different kinds.
pub const STR_ERROR_CAN_T_SHARE_ORDER_LIST: StringId = StringId(0x0115);
/// Copying would put an unusable station into the destination's orders.
pub const STR_ERROR_CAN_T_COPY_ORDER_VEHICLE_LIST: StringId = StringId(0x0116);
/// Timetable wait times are only allowed at stations.
pub const STR_ERROR_TIMETABLE_ONLY_WAIT_AT_STATIONS: StringId = StringId(0x0120);
/// Timetable wait time on an order that does not stop.
pub const STR_ERROR_TIMETABLE_NOT_STOPPING_HERE: StringId = StringId(0x0121);
/// Too many vehicles in game.
pub const STR_ERROR_TOO_MANY_VEHICLES_IN_GAME: StringId = StringId(0x0130);
/// The vehicle must be stopped inside a depot.
pub const STR_ERROR_VEHICLE_MUST_BE_STOPPED_INSIDE_DEPOT: StringId = StringId(0x0131);
/// The engine cannot be refitted to this cargo.
pub const STR_ERROR_CAN_T_REFIT_VEHICLE: StringId = StringId(0x0132);
/// The engine is not buildable in this depot.
pub const STR_ERROR_CAN_T_BUY_VEHICLE: StringId = StringId(0x0133);
/// Vehicle names must be unique.
pub const STR_ERROR_NAME_MUST_BE_UNIQUE: StringId = StringId(0x0140);
/// Too many groups.
pub const STR_ERROR_GROUP_CAN_T_CREATE: StringId = StringId(0x0150);
