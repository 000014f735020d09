//! Game settings that influence command behaviour.
//!
//! Settings are part of the replicated world state: every peer must run with
//! the same values, so they are serialized with the world and hashed with it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Order related settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSettings {
    /// Whether timetables are in use; restoring a backup replays timetable
    /// values only when this is set.
    pub timetabling: bool,
    /// Whether orders may be given to go to a non-stop station by default.
    pub nonstop_by_default: bool,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            timetabling: true,
            nonstop_by_default: false,
        }
    }
}

/// Vehicle related settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSettings {
    /// Service interval given to newly built vehicles, in days.
    pub default_service_interval: u16,
    /// Maximum number of orders in one order list.
    pub max_orders_per_list: u16,
}

impl Default for VehicleSettings {
    fn default() -> Self {
        Self {
            default_service_interval: 150,
            max_orders_per_list: 254,
        }
    }
}

/// Pool capacities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of vehicles.
    pub vehicles: u32,
    /// Maximum number of order lists.
    pub order_lists: u32,
    /// Maximum number of orders across all lists.
    pub orders: u32,
    /// Maximum number of groups.
    pub groups: u32,
    /// Maximum number of pending order backups.
    pub order_backups: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            vehicles: 4096,
            order_lists: 4096,
            orders: 64_000,
            groups: 1024,
            order_backups: 256,
        }
    }
}

/// All settings of a running game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Order settings.
    pub order: OrderSettings,
    /// Vehicle settings.
    pub vehicle: VehicleSettings,
    /// Pool capacities.
    pub pools: PoolSettings,
}

impl GameSettings {
    /// Parse settings from RON text. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if the text is not valid RON.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load settings from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::DataParseError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        ron::from_str(&contents).map_err(|e| GameError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_uses_defaults() {
        let settings = GameSettings::from_ron_str("(order: (timetabling: false))").unwrap();
        assert!(!settings.order.timetabling);
        assert_eq!(settings.vehicle.default_service_interval, 150);
        assert_eq!(settings.pools, PoolSettings::default());
    }

    #[test]
    fn test_invalid_ron_is_parse_error() {
        let err = GameSettings::from_ron_str("(order: 5").unwrap_err();
        assert!(matches!(err, GameError::DataParseError { .. }));
    }
}
