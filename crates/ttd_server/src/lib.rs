//! # TTD Dedicated Server
//!
//! Network side of the transport simulation:
//! - [`packet`] - little-endian packet codec
//! - [`game_info`] - the versioned server game-info record
//! - [`udp`] - answers server-discovery queries with fresh game info
//!
//! The simulation itself lives in `ttd_core`; this crate only reads the
//! [`ttd_core::world::World`] it is given.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ttd_core::world::{Landscape, MapInfo};

pub mod game_info;
pub mod packet;
pub mod udp;

use game_info::{GameInfoError, GrfIdentifier, NetworkRevision};
use packet::PacketError;

/// Result type alias using [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors of the server process.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket or file failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration could not be parsed.
    #[error("Failed to parse config '{path}': {message}")]
    Config {
        /// Config file path.
        path: String,
        /// Parser message.
        message: String,
    },

    /// Malformed packet.
    #[error(transparent)]
    Packet(#[from] PacketError),

    /// Game info could not be encoded or decoded.
    #[error(transparent)]
    GameInfo(#[from] GameInfoError),
}

/// A NewGRF loaded by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGrfConfig {
    /// Identity.
    pub ident: GrfIdentifier,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Static NewGRFs are not announced.
    #[serde(default)]
    pub is_static: bool,
}

/// The GameScript running on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameScriptConfig {
    /// Script name.
    pub name: String,
    /// Script version.
    pub version: i32,
}

/// Server configuration, read from a RON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// UDP port for server discovery.
    pub port: u16,
    /// Name shown in server lists.
    pub server_name: String,
    /// Join password; `None` or empty means open.
    pub password: Option<String>,
    /// Client limit.
    pub max_clients: u8,
    /// Company limit.
    pub max_companies: u8,
    /// Spectator limit.
    pub max_spectators: u8,
    /// Whether the server runs without a local player.
    pub dedicated: bool,
    /// Map width in tiles.
    pub map_x: u16,
    /// Map height in tiles.
    pub map_y: u16,
    /// Climate.
    pub landscape: Landscape,
    /// Loaded NewGRFs.
    pub newgrfs: Vec<NewGrfConfig>,
    /// Whether discovery replies carry NewGRF names.
    pub send_newgrf_names: bool,
    /// Running GameScript, if any.
    pub game_script: Option<GameScriptConfig>,
    /// Build identity announced to clients.
    pub revision: NetworkRevision,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let map = MapInfo::default();
        Self {
            port: 3979,
            server_name: "Unnamed Server".to_string(),
            password: None,
            max_clients: 25,
            max_companies: 15,
            max_spectators: 15,
            dedicated: true,
            map_x: map.size_x,
            map_y: map.size_y,
            landscape: map.landscape,
            newgrfs: Vec::new(),
            send_newgrf_names: true,
            game_script: None,
            revision: NetworkRevision::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a configuration from RON text. Missing fields take their defaults.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| ServerError::Config {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load a configuration from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        ron::from_str(&contents).map_err(|e| ServerError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Map settings for a new world.
    #[must_use]
    pub fn map_info(&self) -> MapInfo {
        MapInfo {
            size_x: self.map_x,
            size_y: self.map_y,
            landscape: self.landscape,
        }
    }
}
