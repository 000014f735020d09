//! Cargo types and cargo sets.

use serde::{Deserialize, Serialize};

/// Number of cargo type slots.
pub const NUM_CARGO: usize = 64;

/// A cargo type slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CargoId(pub u8);

impl CargoId {
    /// Passengers in the default cargo set.
    pub const PASSENGERS: Self = Self(0);
    /// Coal in the default cargo set.
    pub const COAL: Self = Self(1);
    /// Mail in the default cargo set; aircraft carry it in their second part.
    pub const MAIL: Self = Self(2);
    /// Refit order placeholder: pick whatever cargo is available at the stop.
    pub const AUTO_REFIT: Self = Self(0xFD);
    /// Invalid cargo.
    pub const INVALID: Self = Self(0xFF);

    /// Whether this names an actual cargo slot.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        (self.0 as usize) < NUM_CARGO
    }

    /// Slot index. Only meaningful for valid cargos.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A set of cargo types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CargoMask(pub u64);

impl CargoMask {
    /// Empty set.
    pub const EMPTY: Self = Self(0);
    /// Every cargo slot.
    pub const ALL: Self = Self(u64::MAX);

    /// Set containing just `cargo`.
    #[must_use]
    pub const fn single(cargo: CargoId) -> Self {
        if cargo.is_valid() {
            Self(1 << cargo.0)
        } else {
            Self::EMPTY
        }
    }

    /// Whether `cargo` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, cargo: CargoId) -> bool {
        cargo.is_valid() && (self.0 >> cargo.0) & 1 != 0
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Intersection of two sets.
    #[inline]
    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Cargos in the set, ascending.
    pub fn iter(self) -> impl Iterator<Item = CargoId> {
        (0..NUM_CARGO as u8)
            .map(CargoId)
            .filter(move |c| self.contains(*c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_contains() {
        let mask = CargoMask::single(CargoId::COAL).union(CargoMask::single(CargoId::MAIL));
        assert!(mask.contains(CargoId::COAL));
        assert!(mask.contains(CargoId::MAIL));
        assert!(!mask.contains(CargoId::PASSENGERS));
        assert!(!CargoMask::ALL.contains(CargoId::AUTO_REFIT));
    }

    #[test]
    fn test_mask_iter() {
        let mask = CargoMask::single(CargoId(5)).union(CargoMask::single(CargoId(63)));
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![CargoId(5), CargoId(63)]);
    }
}
