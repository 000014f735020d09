//! Per-cargo link statistics between stations.
//!
//! The link refresher reports predicted capacity here. An edge remembers
//! when it was last refreshed by a vehicle that may load at its source
//! (unrestricted) and by one that may not (restricted).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cargo::CargoId;
use crate::ids::StationId;

/// How an edge update is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeUpdateMode(u8);

impl EdgeUpdateMode {
    /// Add to the existing capacity.
    pub const INCREASE: Self = Self(1 << 0);
    /// Raise the capacity to at least the reported value.
    pub const REFRESH: Self = Self(1 << 1);
    /// The reporting vehicle may not load at the source.
    pub const RESTRICTED: Self = Self(1 << 2);
    /// The reporting vehicle may load at the source.
    pub const UNRESTRICTED: Self = Self(1 << 3);

    /// Returns an empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Checks if all flags in `other` are set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for EdgeUpdateMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// Statistics of one directed link for one cargo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkStats {
    /// Predicted monthly capacity.
    pub capacity: u32,
    /// Cargo actually moved.
    pub usage: u32,
    /// Date of the last unrestricted update.
    pub last_unrestricted_update: Option<u32>,
    /// Date of the last restricted update.
    pub last_restricted_update: Option<u32>,
}

/// Key of a link: source, destination, cargo.
pub type LinkKey = (StationId, StationId, CargoId);

/// All known links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkGraph {
    edges: BTreeMap<LinkKey, LinkStats>,
}

impl LinkGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `capacity` (and `usage`) for the link `from -> to` carrying `cargo`.
    pub fn increase_stats(
        &mut self,
        from: StationId,
        to: StationId,
        cargo: CargoId,
        capacity: u32,
        usage: u32,
        mode: EdgeUpdateMode,
        date: u32,
    ) {
        let edge = self.edges.entry((from, to, cargo)).or_default();
        if mode.contains(EdgeUpdateMode::INCREASE) {
            edge.capacity = edge.capacity.saturating_add(capacity);
            edge.usage = edge.usage.saturating_add(usage);
        } else if mode.contains(EdgeUpdateMode::REFRESH) {
            edge.capacity = edge.capacity.max(capacity);
            edge.usage = edge.usage.max(usage);
        }
        if mode.contains(EdgeUpdateMode::UNRESTRICTED) {
            edge.last_unrestricted_update = Some(date);
        }
        if mode.contains(EdgeUpdateMode::RESTRICTED) {
            edge.last_restricted_update = Some(date);
        }
    }

    /// Statistics of one link.
    #[must_use]
    pub fn edge(&self, from: StationId, to: StationId, cargo: CargoId) -> Option<&LinkStats> {
        self.edges.get(&(from, to, cargo))
    }

    /// Every link in key order.
    pub fn edges(&self) -> impl Iterator<Item = (&LinkKey, &LinkStats)> {
        self.edges.iter()
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether no link is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Drop every link touching `station`.
    pub fn remove_station(&mut self, station: StationId) {
        self.edges
            .retain(|(from, to, _), _| *from != station && *to != station);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: StationId = StationId(1);
    const B: StationId = StationId(2);

    #[test]
    fn test_refresh_takes_maximum() {
        let mut graph = LinkGraph::new();
        let mode = EdgeUpdateMode::REFRESH | EdgeUpdateMode::UNRESTRICTED;
        graph.increase_stats(A, B, CargoId::COAL, 30, 0, mode, 5);
        graph.increase_stats(A, B, CargoId::COAL, 10, 0, mode, 6);
        let edge = graph.edge(A, B, CargoId::COAL).unwrap();
        assert_eq!(edge.capacity, 30);
        assert_eq!(edge.last_unrestricted_update, Some(6));
        assert_eq!(edge.last_restricted_update, None);
    }

    #[test]
    fn test_increase_adds() {
        let mut graph = LinkGraph::new();
        let mode = EdgeUpdateMode::INCREASE | EdgeUpdateMode::RESTRICTED;
        graph.increase_stats(A, B, CargoId::MAIL, 3, 1, mode, 1);
        graph.increase_stats(A, B, CargoId::MAIL, 4, 1, mode, 2);
        let edge = graph.edge(A, B, CargoId::MAIL).unwrap();
        assert_eq!(edge.capacity, 7);
        assert_eq!(edge.usage, 2);
        assert_eq!(edge.last_restricted_update, Some(2));
    }

    #[test]
    fn test_remove_station() {
        let mut graph = LinkGraph::new();
        graph.increase_stats(A, B, CargoId::COAL, 1, 0, EdgeUpdateMode::REFRESH, 0);
        graph.increase_stats(B, StationId(3), CargoId::COAL, 1, 0, EdgeUpdateMode::REFRESH, 0);
        graph.remove_station(A);
        assert_eq!(graph.len(), 1);
    }
}
