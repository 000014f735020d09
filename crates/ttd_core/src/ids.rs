//! Identifier types shared across the core.
//!
//! Every id is a small `Copy` newtype so ids of different kinds cannot be
//! mixed up. Sentinel values mirror the wire protocol: they are part of the
//! packed encodings and must not change.

use serde::{Deserialize, Serialize};

use crate::pool::pool_id;

pool_id!(
    /// Handle of a vehicle (the head of a consist).
    VehicleId(u32)
);

pool_id!(
    /// Handle of a vehicle group.
    GroupId(u16)
);

impl GroupId {
    /// The implicit group every ungrouped vehicle belongs to.
    pub const DEFAULT: Self = Self(0xFFFD);

    /// Whether this is the implicit default group.
    #[must_use]
    pub const fn is_default(self) -> bool {
        self.0 == Self::DEFAULT.0
    }
}

pool_id!(
    /// Handle of a station or waypoint.
    StationId(u16)
);

impl StationId {
    /// No station.
    pub const INVALID: Self = Self(0xFFFF);

    /// Check if this is a valid ID (not INVALID).
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

pool_id!(
    /// Handle of a depot (or aircraft hangar).
    DepotId(u16)
);

pool_id!(
    /// Handle of an engine type.
    EngineId(u16)
);

pool_id!(
    /// Handle of a town.
    TownId(u16)
);

impl TownId {
    /// No town.
    pub const INVALID: Self = Self(0xFFFF);
}

pool_id!(
    /// Handle of an industry.
    IndustryId(u16)
);

impl IndustryId {
    /// No industry.
    pub const INVALID: Self = Self(0xFFFF);
}

/// Owner of companies-owned things; also used for the acting party of a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompanyId(pub u8);

impl CompanyId {
    /// Maximum number of playable companies.
    pub const MAX_COMPANIES: u8 = 15;
    /// Owned by nobody (town-owned, neutral).
    pub const NONE: Self = Self(0x10);
    /// The game script acting as an all-powerful deity.
    pub const DEITY: Self = Self(0x12);
    /// A spectator; may only run commands flagged as spectator-safe.
    pub const SPECTATOR: Self = Self(0xFF);

    /// Whether this is a playable company slot.
    #[must_use]
    pub const fn is_company(self) -> bool {
        self.0 < Self::MAX_COMPANIES
    }
}

/// Network client identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl ClientId {
    /// Not a client (used by the simulation itself).
    pub const INVALID: Self = Self(0);
    /// The server's own client id.
    pub const SERVER: Self = Self(1);
}

/// Index of a map tile.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TileIndex(pub u32);

impl TileIndex {
    /// No tile.
    pub const INVALID: Self = Self(u32::MAX);
}
