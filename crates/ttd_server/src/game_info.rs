//! Server game-info record and its versioned wire format.
//!
//! The record is written as a version byte followed by the fields of every
//! version, newest first. A reader that knows fewer versions stops after the
//! fields it understands; a reader handed an older payload falls through
//! from the version it read down to version 1 and leaves newer fields at
//! their defaults.
//!
//! | Version | Adds                                                        |
//! |---------|-------------------------------------------------------------|
//! | 6       | NewGRF serialization type, drops server language and map name |
//! | 5       | GameScript version and name                                 |
//! | 4       | NewGRF list                                                 |
//! | 3       | 32-bit game and start dates                                 |
//! | 2       | Company and spectator limits                                |
//! | 1       | Server name, revision, clients, map size, landscape         |

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ttd_core::ids::CompanyId;
use ttd_core::world::{Landscape, World};

use crate::packet::{PacketError, PacketReader, PacketWriter};
use crate::ServerConfig;

/// Newest game-info version this build reads and writes.
pub const NETWORK_GAME_INFO_VERSION: u8 = 6;
/// Buffer size for server, GameScript and company names.
pub const NETWORK_NAME_LENGTH: usize = 80;
/// Buffer size for the revision string.
pub const NETWORK_REVISION_LENGTH: usize = 33;
/// Buffer size for NewGRF names.
pub const NETWORK_GRF_NAME_LENGTH: usize = 80;
/// Most NewGRFs a server may announce.
pub const NETWORK_MAX_GRF_COUNT: usize = 62;
/// Length of the `-g<hash>` suffix kept in untagged revisions.
pub const GITHASH_SUFFIX_LEN: usize = 8;
/// Latest representable date, in days since year 0.
pub const MAX_DATE: u32 = 1_826_212_864;
/// Days from year 0 to 1920, the base of the old 16-bit dates.
pub const DAYS_TILL_ORIGINAL_BASE_YEAR: u32 = 701_265;

/// Errors raised while encoding or decoding game info.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameInfoError {
    /// The packet itself is malformed.
    #[error(transparent)]
    Packet(#[from] PacketError),

    /// Version byte outside `1..=6`.
    #[error("Unsupported game info version {0}")]
    UnsupportedVersion(u8),

    /// NewGRF serialization type not understood.
    #[error("Unknown NewGRF serialization type {0}")]
    UnknownGrfSerialization(u8),

    /// Lookup-table serialization without a table.
    #[error("NewGRF lookup ids received but no lookup table is available")]
    MissingLookupTable,

    /// Lookup id absent from the table.
    #[error("NewGRF lookup id {0} is not in the lookup table")]
    UnknownGrfLookup(u32),

    /// NewGRF absent from the table used for writing lookup ids.
    #[error("NewGRF {0:08X} is not in the lookup table")]
    GrfNotInLookupTable(u32),

    /// More NewGRFs than the protocol can announce.
    #[error("{0} NewGRFs exceed the limit of 62")]
    TooManyGrfs(usize),
}

/// Identity of a NewGRF: its id and the MD5 of its file.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GrfIdentifier {
    /// NewGRF id.
    pub grfid: u32,
    /// MD5 checksum of the file.
    pub md5sum: [u8; 16],
}

impl GrfIdentifier {
    fn write(&self, packet: &mut PacketWriter) -> Result<(), PacketError> {
        packet.write_u32(self.grfid)?;
        packet.write_bytes(&self.md5sum)
    }

    fn read(reader: &mut PacketReader<'_>) -> Result<Self, PacketError> {
        Ok(Self {
            grfid: reader.read_u32()?,
            md5sum: reader.read_array()?,
        })
    }
}

/// A NewGRF identity with its display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedGrfIdentifier {
    /// Identity.
    pub ident: GrfIdentifier,
    /// Display name; empty when the sender did not include it.
    pub name: String,
}

/// Lookup ids agreed out of band, mapped to the NewGRFs they stand for.
pub type GrfLookupTable = BTreeMap<u32, NamedGrfIdentifier>;

/// How the NewGRF list is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GrfSerialization {
    /// Id and MD5.
    IdMd5 = 0,
    /// Id, MD5 and name.
    IdMd5Name = 1,
    /// Index into a lookup table.
    LookupId = 2,
}

impl GrfSerialization {
    /// Serialization type from its wire byte.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::IdMd5),
            1 => Some(Self::IdMd5Name),
            2 => Some(Self::LookupId),
            _ => None,
        }
    }
}

/// What a server tells the world about its game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkServerGameInfo {
    /// Server name.
    pub server_name: String,
    /// Network revision string of the server build.
    pub server_revision: String,
    /// Whether joining needs a password.
    pub use_password: bool,
    /// Client limit.
    pub clients_max: u8,
    /// Connected clients.
    pub clients_on: u8,
    /// Connected spectators.
    pub spectators_on: u8,
    /// Spectator limit.
    pub spectators_max: u8,
    /// Company limit.
    pub companies_max: u8,
    /// Companies in the game.
    pub companies_on: u8,
    /// Map width in tiles.
    pub map_width: u16,
    /// Map height in tiles.
    pub map_height: u16,
    /// Climate.
    pub landscape: Landscape,
    /// Whether the server has no local player.
    pub dedicated: bool,
    /// Current date in days.
    pub game_date: u32,
    /// Start date in days.
    pub start_date: u32,
    /// GameScript name; empty without a script.
    pub gamescript_name: String,
    /// GameScript version; -1 without a script.
    pub gamescript_version: i32,
    /// Non-static NewGRFs of the game.
    pub grfs: Vec<NamedGrfIdentifier>,
}

impl Default for NetworkServerGameInfo {
    fn default() -> Self {
        Self {
            server_name: String::new(),
            server_revision: String::new(),
            use_password: false,
            clients_max: 0,
            clients_on: 0,
            spectators_on: 0,
            spectators_max: 0,
            companies_max: 0,
            companies_on: 0,
            map_width: 0,
            map_height: 0,
            landscape: Landscape::Temperate,
            dedicated: false,
            game_date: 0,
            start_date: 0,
            gamescript_name: String::new(),
            gamescript_version: -1,
            grfs: Vec::new(),
        }
    }
}

impl NetworkServerGameInfo {
    /// Fill the fields that do not change while the server runs.
    #[must_use]
    pub fn from_config(config: &ServerConfig, revision: &NetworkRevision, world: &World) -> Self {
        let (gamescript_name, gamescript_version) = config
            .game_script
            .as_ref()
            .map_or((String::new(), -1), |gs| (gs.name.clone(), gs.version));
        let mut info = Self {
            server_name: config.server_name.clone(),
            server_revision: revision.network_string(),
            use_password: config.password.as_deref().is_some_and(|p| !p.is_empty()),
            clients_max: config.max_clients,
            spectators_max: config.max_spectators,
            companies_max: config.max_companies,
            dedicated: config.dedicated,
            start_date: world.date,
            gamescript_name,
            gamescript_version,
            grfs: config
                .newgrfs
                .iter()
                .filter(|grf| !grf.is_static)
                .map(|grf| NamedGrfIdentifier {
                    ident: grf.ident,
                    name: grf.name.clone(),
                })
                .collect(),
            ..Self::default()
        };
        info.refresh(world, 0, 0);
        info
    }

    /// Bring the changing fields up to date with `world`.
    pub fn refresh(&mut self, world: &World, clients_on: u8, spectators_on: u8) {
        let companies = world.companies.keys().filter(|c| c.is_company()).count();
        self.companies_on = u8::try_from(companies).unwrap_or(CompanyId::MAX_COMPANIES);
        self.clients_on = clients_on;
        self.spectators_on = spectators_on;
        self.game_date = world.date.min(MAX_DATE);
        self.map_width = world.map.size_x;
        self.map_height = world.map.size_y;
        self.landscape = world.map.landscape;
    }
}

/// Game info as seen by a client, with the outcome of its compatibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkGameInfo {
    /// The announced info.
    pub info: NetworkServerGameInfo,
    /// Whether the revision allows joining.
    pub version_compatible: bool,
    /// Whether the revision matches and every NewGRF is available.
    pub compatible: bool,
    /// Announced NewGRFs the client does not have.
    pub missing_grfs: Vec<GrfIdentifier>,
}

/// Largest prefix of `value` no longer than `max` bytes that ends on a
/// character boundary.
fn floor_str(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

fn write_limited(packet: &mut PacketWriter, value: &str, buffer: usize) -> Result<(), PacketError> {
    packet.write_string(floor_str(value, buffer.saturating_sub(1)))
}

/// Write `info` in the newest format.
pub fn serialize_network_game_info(
    packet: &mut PacketWriter,
    info: &NetworkServerGameInfo,
    send_newgrf_names: bool,
) -> Result<(), GameInfoError> {
    let serialization = if send_newgrf_names {
        GrfSerialization::IdMd5Name
    } else {
        GrfSerialization::IdMd5
    };
    serialize_network_game_info_version(
        packet,
        info,
        NETWORK_GAME_INFO_VERSION,
        serialization,
        None,
    )
}

/// Write `info` as `version`, for talking to older peers.
///
/// `serialization` only applies from version 6; older versions always send
/// id and MD5. `lookup` is needed for [`GrfSerialization::LookupId`].
pub fn serialize_network_game_info_version(
    packet: &mut PacketWriter,
    info: &NetworkServerGameInfo,
    version: u8,
    serialization: GrfSerialization,
    lookup: Option<&GrfLookupTable>,
) -> Result<(), GameInfoError> {
    if !(1..=NETWORK_GAME_INFO_VERSION).contains(&version) {
        return Err(GameInfoError::UnsupportedVersion(version));
    }
    packet.write_u8(version)?;

    let serialization = if version >= 6 {
        packet.write_u8(serialization as u8)?;
        serialization
    } else {
        GrfSerialization::IdMd5
    };

    if version >= 5 {
        packet.write_u32(u32::from_le_bytes(info.gamescript_version.to_le_bytes()))?;
        write_limited(packet, &info.gamescript_name, NETWORK_NAME_LENGTH)?;
    }

    if version >= 4 {
        let count = u8::try_from(info.grfs.len())
            .ok()
            .filter(|&n| usize::from(n) <= NETWORK_MAX_GRF_COUNT)
            .ok_or(GameInfoError::TooManyGrfs(info.grfs.len()))?;
        packet.write_u8(count)?;
        for grf in &info.grfs {
            match serialization {
                GrfSerialization::IdMd5 => grf.ident.write(packet)?,
                GrfSerialization::IdMd5Name => {
                    grf.ident.write(packet)?;
                    write_limited(packet, &grf.name, NETWORK_GRF_NAME_LENGTH)?;
                }
                GrfSerialization::LookupId => {
                    let table = lookup.ok_or(GameInfoError::MissingLookupTable)?;
                    let id = table
                        .iter()
                        .find(|(_, named)| named.ident == grf.ident)
                        .map(|(&id, _)| id)
                        .ok_or(GameInfoError::GrfNotInLookupTable(grf.ident.grfid))?;
                    packet.write_u32(id)?;
                }
            }
        }
    }

    if version >= 3 {
        packet.write_u32(info.game_date.min(MAX_DATE))?;
        packet.write_u32(info.start_date.min(MAX_DATE))?;
    }

    if version >= 2 {
        packet.write_u8(info.companies_max)?;
        packet.write_u8(info.companies_on)?;
        packet.write_u8(info.spectators_max)?;
    }

    write_limited(packet, &info.server_name, NETWORK_NAME_LENGTH)?;
    write_limited(packet, &info.server_revision, NETWORK_REVISION_LENGTH)?;
    if version < 6 {
        // Server language, no longer announced.
        packet.write_u8(0)?;
    }
    packet.write_bool(info.use_password)?;
    packet.write_u8(info.clients_max)?;
    packet.write_u8(info.clients_on)?;
    packet.write_u8(info.spectators_on)?;
    if version < 3 {
        packet.write_u16(legacy_date(info.game_date))?;
        packet.write_u16(legacy_date(info.start_date))?;
    }
    if version < 6 {
        // Map name, no longer announced.
        packet.write_string("")?;
    }
    packet.write_u16(info.map_width)?;
    packet.write_u16(info.map_height)?;
    packet.write_u8(info.landscape as u8)?;
    packet.write_bool(info.dedicated)?;
    Ok(())
}

fn legacy_date(date: u32) -> u16 {
    let days = date.saturating_sub(DAYS_TILL_ORIGINAL_BASE_YEAR);
    u16::try_from(days).unwrap_or(u16::MAX)
}

/// Read game info of any version from `1..=6`.
///
/// Fields newer than the payload's version keep their defaults. Dates are
/// clamped to [`MAX_DATE`] and unknown landscapes read as temperate.
pub fn deserialize_network_game_info(
    reader: &mut PacketReader<'_>,
    lookup: Option<&GrfLookupTable>,
) -> Result<NetworkServerGameInfo, GameInfoError> {
    let version = reader.read_u8()?;
    if !(1..=NETWORK_GAME_INFO_VERSION).contains(&version) {
        return Err(GameInfoError::UnsupportedVersion(version));
    }
    let mut info = NetworkServerGameInfo::default();
    let mut serialization = GrfSerialization::IdMd5;

    if version >= 6 {
        let value = reader.read_u8()?;
        serialization =
            GrfSerialization::from_u8(value).ok_or(GameInfoError::UnknownGrfSerialization(value))?;
    }

    if version >= 5 {
        info.gamescript_version = i32::from_le_bytes(reader.read_u32()?.to_le_bytes());
        info.gamescript_name = reader.read_string(NETWORK_NAME_LENGTH)?;
    }

    if version >= 4 {
        let count = reader.read_u8()?;
        if usize::from(count) > NETWORK_MAX_GRF_COUNT {
            return Err(GameInfoError::TooManyGrfs(count.into()));
        }
        for _ in 0..count {
            let grf = match serialization {
                GrfSerialization::IdMd5 => NamedGrfIdentifier {
                    ident: GrfIdentifier::read(reader)?,
                    name: String::new(),
                },
                GrfSerialization::IdMd5Name => NamedGrfIdentifier {
                    ident: GrfIdentifier::read(reader)?,
                    name: reader.read_string(NETWORK_GRF_NAME_LENGTH)?,
                },
                GrfSerialization::LookupId => {
                    let table = lookup.ok_or(GameInfoError::MissingLookupTable)?;
                    let id = reader.read_u32()?;
                    table
                        .get(&id)
                        .cloned()
                        .ok_or(GameInfoError::UnknownGrfLookup(id))?
                }
            };
            info.grfs.push(grf);
        }
    }

    if version >= 3 {
        info.game_date = reader.read_u32()?.min(MAX_DATE);
        info.start_date = reader.read_u32()?.min(MAX_DATE);
    }

    if version >= 2 {
        info.companies_max = reader.read_u8()?;
        info.companies_on = reader.read_u8()?;
        info.spectators_max = reader.read_u8()?;
    }

    info.server_name = reader.read_string(NETWORK_NAME_LENGTH)?;
    info.server_revision = reader.read_string(NETWORK_REVISION_LENGTH)?;
    if version < 6 {
        reader.read_u8()?;
    }
    info.use_password = reader.read_bool()?;
    info.clients_max = reader.read_u8()?;
    info.clients_on = reader.read_u8()?;
    info.spectators_on = reader.read_u8()?;
    if version < 3 {
        info.game_date = u32::from(reader.read_u16()?) + DAYS_TILL_ORIGINAL_BASE_YEAR;
        info.start_date = u32::from(reader.read_u16()?) + DAYS_TILL_ORIGINAL_BASE_YEAR;
    }
    if version < 6 {
        reader.skip_string()?;
    }
    info.map_width = reader.read_u16()?;
    info.map_height = reader.read_u16()?;
    info.landscape = Landscape::from_u8(reader.read_u8()?);
    info.dedicated = reader.read_bool()?;

    tracing::trace!(version, server = %info.server_name, grfs = info.grfs.len(), "read game info");
    Ok(info)
}

/// Whether the build that produced the revision was locally modified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevisionModified {
    /// Clean checkout.
    #[default]
    Unmodified,
    /// Could not be determined.
    Unknown,
    /// Local changes.
    Modified,
}

impl RevisionModified {
    const fn marker(self) -> char {
        match self {
            Self::Unmodified => 'g',
            Self::Unknown => 'u',
            Self::Modified => 'm',
        }
    }
}

/// Build identity used to decide who may join whom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkRevision {
    /// Human readable revision, e.g. `1.2.0` or `20240101-master-g1a2b3c4d`.
    pub revision: String,
    /// Git hash of the build.
    pub hash: String,
    /// Whether the build is a release tag.
    pub tagged: bool,
    /// Local modification state.
    pub modified: RevisionModified,
}

impl Default for NetworkRevision {
    fn default() -> Self {
        Self {
            revision: env!("CARGO_PKG_VERSION").to_string(),
            hash: String::new(),
            tagged: true,
            modified: RevisionModified::Unmodified,
        }
    }
}

impl NetworkRevision {
    /// The revision as announced on the network.
    ///
    /// Tagged builds send the revision as is, cut to fit. Untagged builds
    /// replace the text after the last `-` with `-<marker><hash>`, where the
    /// suffix is at most [`GITHASH_SUFFIX_LEN`] bytes.
    #[must_use]
    pub fn network_string(&self) -> String {
        let limit = NETWORK_REVISION_LENGTH - 1;
        if self.tagged {
            return floor_str(&self.revision, limit).to_string();
        }
        let suffix = format!("-{}{}", self.modified.marker(), self.hash);
        let suffix = floor_str(&suffix, GITHASH_SUFFIX_LEN);
        let mut hash_start = self.revision.rfind('-').unwrap_or(self.revision.len());
        if hash_start + suffix.len() > limit {
            hash_start = limit - suffix.len();
        }
        let mut out = floor_str(&self.revision, hash_start).to_string();
        out.push_str(suffix);
        out
    }

    /// Whether a server announcing `other` runs a build we can join.
    ///
    /// Exact matches always are. Tagged builds need an exact match; untagged
    /// builds compare the hash suffixes, which are empty without a `-`.
    #[must_use]
    pub fn is_compatible(&self, other: &str) -> bool {
        let ours = self.network_string();
        if ours == other {
            return true;
        }
        if self.tagged {
            return false;
        }
        revision_hash(&ours) == revision_hash(other)
    }
}

fn revision_hash(revision: &str) -> &str {
    revision.rfind('-').map_or("", |index| &revision[index..])
}

/// Decide whether a client with build `local` and NewGRFs `available` can
/// join the game described by `info`.
#[must_use]
pub fn check_game_compatibility(
    info: NetworkServerGameInfo,
    local: &NetworkRevision,
    available: &BTreeSet<GrfIdentifier>,
) -> NetworkGameInfo {
    let version_compatible = local.is_compatible(&info.server_revision);
    let missing_grfs: Vec<GrfIdentifier> = info
        .grfs
        .iter()
        .map(|grf| grf.ident)
        .filter(|ident| !available.contains(ident))
        .collect();
    let compatible = version_compatible && missing_grfs.is_empty();
    if !compatible {
        tracing::debug!(
            server = %info.server_name,
            revision = %info.server_revision,
            missing = missing_grfs.len(),
            "server marked incompatible"
        );
    }
    NetworkGameInfo {
        info,
        version_compatible,
        compatible,
        missing_grfs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grf(id: u32, name: &str) -> NamedGrfIdentifier {
        let mut md5sum = [0u8; 16];
        for (i, byte) in md5sum.iter_mut().enumerate() {
            *byte = (id as u8).wrapping_add(i as u8);
        }
        NamedGrfIdentifier {
            ident: GrfIdentifier { grfid: id, md5sum },
            name: name.to_string(),
        }
    }

    fn sample_info() -> NetworkServerGameInfo {
        NetworkServerGameInfo {
            server_name: "Coal Valley".to_string(),
            server_revision: "1.2.0".to_string(),
            use_password: true,
            clients_max: 25,
            clients_on: 3,
            spectators_on: 1,
            spectators_max: 10,
            companies_max: 15,
            companies_on: 2,
            map_width: 512,
            map_height: 256,
            landscape: Landscape::Arctic,
            dedicated: true,
            game_date: 730_000,
            start_date: 720_000,
            gamescript_name: "Cargo Goals".to_string(),
            gamescript_version: 7,
            grfs: vec![grf(0x4D47_0101, "Trains"), grf(0x4D47_0202, "Stations")],
        }
    }

    fn encode(info: &NetworkServerGameInfo, version: u8, serialization: GrfSerialization) -> Vec<u8> {
        let mut packet = PacketWriter::new(1);
        serialize_network_game_info_version(&mut packet, info, version, serialization, None)
            .unwrap();
        packet.finish()
    }

    fn decode(bytes: &[u8]) -> Result<NetworkServerGameInfo, GameInfoError> {
        let mut reader = PacketReader::new(bytes).unwrap();
        let info = deserialize_network_game_info(&mut reader, None)?;
        assert_eq!(reader.remaining(), 0);
        Ok(info)
    }

    #[test]
    fn test_round_trip_with_names() {
        let info = sample_info();
        let mut packet = PacketWriter::new(1);
        serialize_network_game_info(&mut packet, &info, true).unwrap();
        assert_eq!(decode(&packet.finish()).unwrap(), info);
    }

    #[test]
    fn test_round_trip_without_names_drops_them() {
        let info = sample_info();
        let decoded = decode(&encode(&info, 6, GrfSerialization::IdMd5)).unwrap();
        assert_eq!(decoded.grfs.len(), 2);
        assert!(decoded.grfs.iter().all(|g| g.name.is_empty()));
        assert_eq!(decoded.grfs[1].ident, info.grfs[1].ident);
    }

    #[test]
    fn test_version_three_keeps_newer_fields_at_defaults() {
        let info = sample_info();
        let decoded = decode(&encode(&info, 3, GrfSerialization::IdMd5Name)).unwrap();

        let defaults = NetworkServerGameInfo::default();
        assert_eq!(decoded.gamescript_name, defaults.gamescript_name);
        assert_eq!(decoded.gamescript_version, -1);
        assert!(decoded.grfs.is_empty());

        assert_eq!(decoded.game_date, info.game_date);
        assert_eq!(decoded.start_date, info.start_date);
        assert_eq!(decoded.companies_max, info.companies_max);
        assert_eq!(decoded.server_name, info.server_name);
        assert_eq!(decoded.map_width, info.map_width);
        assert_eq!(decoded.landscape, info.landscape);
        assert!(decoded.dedicated);
    }

    #[test]
    fn test_version_one_uses_short_dates() {
        let info = sample_info();
        let decoded = decode(&encode(&info, 1, GrfSerialization::IdMd5)).unwrap();
        assert_eq!(decoded.game_date, info.game_date);
        assert_eq!(decoded.start_date, info.start_date);
        assert_eq!(decoded.companies_max, 0);
        assert_eq!(decoded.clients_on, info.clients_on);
    }

    #[test]
    fn test_version_five_skips_legacy_fields() {
        let info = sample_info();
        let decoded = decode(&encode(&info, 5, GrfSerialization::IdMd5Name)).unwrap();
        assert_eq!(decoded.gamescript_name, "Cargo Goals");
        assert_eq!(decoded.gamescript_version, 7);
        assert!(decoded.grfs.iter().all(|g| g.name.is_empty()));
        assert_eq!(decoded.map_height, 256);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        assert_eq!(
            decode(&[4, 0, 1, 9]),
            Err(GameInfoError::UnsupportedVersion(9))
        );
        let mut packet = PacketWriter::new(1);
        assert_eq!(
            serialize_network_game_info_version(
                &mut packet,
                &sample_info(),
                0,
                GrfSerialization::IdMd5,
                None
            ),
            Err(GameInfoError::UnsupportedVersion(0))
        );
    }

    #[test]
    fn test_unknown_serialization_is_rejected() {
        assert_eq!(
            decode(&[5, 0, 1, 6, 3]),
            Err(GameInfoError::UnknownGrfSerialization(3))
        );
    }

    #[test]
    fn test_truncated_payload_fails() {
        let bytes = encode(&sample_info(), 6, GrfSerialization::IdMd5);
        let mut cut = bytes[..bytes.len() - 3].to_vec();
        let size = u16::try_from(cut.len()).unwrap();
        cut[..2].copy_from_slice(&size.to_le_bytes());
        assert!(matches!(
            decode(&cut),
            Err(GameInfoError::Packet(PacketError::Underflow { .. }))
        ));
    }

    #[test]
    fn test_dates_are_clamped() {
        let mut info = sample_info();
        info.game_date = u32::MAX;
        let decoded = decode(&encode(&info, 6, GrfSerialization::IdMd5)).unwrap();
        assert_eq!(decoded.game_date, MAX_DATE);
    }

    #[test]
    fn test_unknown_landscape_reads_as_temperate() {
        let mut bytes = encode(&sample_info(), 6, GrfSerialization::IdMd5);
        let at = bytes.len() - 2;
        bytes[at] = 9;
        assert_eq!(decode(&bytes).unwrap().landscape, Landscape::Temperate);
    }

    #[test]
    fn test_lookup_ids() {
        let info = sample_info();
        let table: GrfLookupTable = info
            .grfs
            .iter()
            .enumerate()
            .map(|(i, g)| (u32::try_from(i).unwrap() + 100, g.clone()))
            .collect();
        let mut packet = PacketWriter::new(1);
        serialize_network_game_info_version(
            &mut packet,
            &info,
            6,
            GrfSerialization::LookupId,
            Some(&table),
        )
        .unwrap();
        let bytes = packet.finish();

        let mut reader = PacketReader::new(&bytes).unwrap();
        assert_eq!(deserialize_network_game_info(&mut reader, Some(&table)).unwrap(), info);

        let mut reader = PacketReader::new(&bytes).unwrap();
        assert_eq!(
            deserialize_network_game_info(&mut reader, None),
            Err(GameInfoError::MissingLookupTable)
        );

        let partial: GrfLookupTable = table.into_iter().take(1).collect();
        let mut reader = PacketReader::new(&bytes).unwrap();
        assert_eq!(
            deserialize_network_game_info(&mut reader, Some(&partial)),
            Err(GameInfoError::UnknownGrfLookup(101))
        );
    }

    #[test]
    fn test_too_many_grfs() {
        let mut info = sample_info();
        info.grfs = (0..=NETWORK_MAX_GRF_COUNT as u32).map(|i| grf(i, "")).collect();
        let mut packet = PacketWriter::with_limit(1, usize::from(u16::MAX));
        assert_eq!(
            serialize_network_game_info(&mut packet, &info, false),
            Err(GameInfoError::TooManyGrfs(NETWORK_MAX_GRF_COUNT + 1))
        );
    }

    #[test]
    fn test_too_many_grfs_are_rejected_on_read() {
        let mut packet = PacketWriter::with_limit(1, usize::from(u16::MAX));
        packet.write_u8(4).unwrap();
        let count = NETWORK_MAX_GRF_COUNT + 1;
        packet.write_u8(u8::try_from(count).unwrap()).unwrap();
        for i in 0..count {
            let ident = GrfIdentifier {
                grfid: u32::try_from(i).unwrap(),
                md5sum: [1; 16],
            };
            ident.write(&mut packet).unwrap();
        }
        packet.write_u32(730_000).unwrap();
        packet.write_u32(720_000).unwrap();
        for byte in [15, 1, 10] {
            packet.write_u8(byte).unwrap();
        }
        packet.write_string("Coal Valley").unwrap();
        packet.write_string("14.1").unwrap();
        // Language, password, clients max/on, spectators on.
        for byte in [0, 0, 25, 1, 0] {
            packet.write_u8(byte).unwrap();
        }
        packet.write_string("").unwrap();
        packet.write_u16(256).unwrap();
        packet.write_u16(256).unwrap();
        packet.write_u8(0).unwrap();
        packet.write_bool(true).unwrap();
        let bytes = packet.finish();

        let mut reader = PacketReader::new(&bytes).unwrap();
        assert_eq!(
            deserialize_network_game_info(&mut reader, None),
            Err(GameInfoError::TooManyGrfs(count))
        );
    }

    #[test]
    fn test_long_names_are_cut_on_write() {
        let mut info = sample_info();
        info.server_name = "x".repeat(200);
        let decoded = decode(&encode(&info, 6, GrfSerialization::IdMd5)).unwrap();
        assert_eq!(decoded.server_name.len(), NETWORK_NAME_LENGTH - 1);
    }

    #[test]
    fn test_tagged_revision_is_sent_as_is() {
        let revision = NetworkRevision {
            revision: "14.1".to_string(),
            hash: "0123456789abcdef".to_string(),
            tagged: true,
            modified: RevisionModified::Unmodified,
        };
        assert_eq!(revision.network_string(), "14.1");
        assert!(revision.is_compatible("14.1"));
        assert!(!revision.is_compatible("14.0"));
    }

    #[test]
    fn test_untagged_revision_gets_hash_suffix() {
        let revision = NetworkRevision {
            revision: "20240101-master-g0123456789".to_string(),
            hash: "0123456789abcdef".to_string(),
            tagged: false,
            modified: RevisionModified::Modified,
        };
        assert_eq!(revision.network_string(), "20240101-master-m012345");
        assert!(revision.is_compatible("20231224-feature-m012345"));
        assert!(!revision.is_compatible("20240101-master-g012345"));
        assert!(!revision.is_compatible("nohash"));
    }

    #[test]
    fn test_untagged_revisions_without_hash_match() {
        let revision = NetworkRevision {
            revision: "local".to_string(),
            hash: String::new(),
            tagged: false,
            modified: RevisionModified::Unmodified,
        };
        assert_eq!(revision.network_string(), "local-g");
        assert!(revision.is_compatible("other-g"));
        assert!(!revision.is_compatible("other"));
        assert!(!revision.is_compatible("other-gabc"));
    }

    #[test]
    fn test_long_untagged_revision_fits() {
        let revision = NetworkRevision {
            revision: "a".repeat(60),
            hash: "fedcba9876".to_string(),
            tagged: false,
            modified: RevisionModified::Unmodified,
        };
        let network = revision.network_string();
        assert_eq!(network.len(), NETWORK_REVISION_LENGTH - 1);
        assert!(network.ends_with("-gfedcba"));
    }

    #[test]
    fn test_compatibility_needs_every_grf() {
        let local = NetworkRevision::default();
        let mut info = sample_info();
        info.server_revision = local.network_string();
        let mut available: BTreeSet<GrfIdentifier> =
            info.grfs.iter().map(|g| g.ident).collect();

        let game = check_game_compatibility(info.clone(), &local, &available);
        assert!(game.version_compatible);
        assert!(game.compatible);

        available.remove(&info.grfs[0].ident);
        let game = check_game_compatibility(info.clone(), &local, &available);
        assert!(game.version_compatible);
        assert!(!game.compatible);
        assert_eq!(game.missing_grfs, vec![info.grfs[0].ident]);

        info.server_revision = "0.0.1".to_string();
        let game = check_game_compatibility(info, &local, &BTreeSet::new());
        assert!(!game.version_compatible);
        assert!(!game.compatible);
    }

    proptest! {
        #[test]
        fn prop_newest_format_keeps_every_field(
            name in "[a-zA-Z0-9 ]{0,79}",
            script in "[a-zA-Z ]{0,40}",
            script_version in any::<i32>(),
            clients in any::<(u8, u8, u8)>(),
            map in any::<(u16, u16)>(),
            dates in (0..=MAX_DATE, 0..=MAX_DATE),
            grf_names in prop::collection::vec("[a-z]{0,20}", 0..8),
        ) {
            let info = NetworkServerGameInfo {
                server_name: name,
                gamescript_name: script,
                gamescript_version: script_version,
                clients_max: clients.0,
                clients_on: clients.1,
                spectators_on: clients.2,
                map_width: map.0,
                map_height: map.1,
                game_date: dates.0,
                start_date: dates.1,
                grfs: grf_names
                    .iter()
                    .enumerate()
                    .map(|(i, n)| grf(u32::try_from(i).unwrap(), n))
                    .collect(),
                ..sample_info()
            };
            let decoded = decode(&encode(&info, 6, GrfSerialization::IdMd5Name)).unwrap();
            prop_assert_eq!(decoded, info);
        }
    }
}
