//! Keyed storage with stable integer handles.
//!
//! Vehicles, order lists, groups and order backups all live in pools. Ids are
//! handed out monotonically and never reused while the pool lives, so a stale
//! handle never aliases a newer item. Items are kept in a `BTreeMap` so that
//! iteration (and therefore serialization and hashing) is deterministic.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// A handle type usable as a pool key.
pub trait PoolId: Copy + Ord + Debug {
    /// Build the handle from its raw pool index.
    fn from_index(index: u32) -> Self;
    /// Raw pool index of the handle.
    fn index(self) -> u32;
}

/// Declare a newtype id usable as a [`PoolId`].
macro_rules! pool_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(pub $inner);

        impl $crate::pool::PoolId for $name {
            #[allow(clippy::cast_possible_truncation)]
            fn from_index(index: u32) -> Self {
                Self(index as $inner)
            }

            fn index(self) -> u32 {
                u32::from(self.0)
            }
        }
    };
}

pub(crate) use pool_id;

/// Storage for pooled items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pool<I: PoolId, T> {
    /// Live items by handle.
    items: BTreeMap<I, T>,
    /// Next raw index to hand out.
    next_index: u32,
    /// Maximum number of simultaneously live items.
    capacity: u32,
}

impl<I: PoolId, T> Pool<I, T> {
    /// Create an empty pool. Index 0 is never handed out.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            items: BTreeMap::new(),
            next_index: 1,
            capacity,
        }
    }

    /// Whether `count` more items fit.
    #[must_use]
    pub fn can_allocate(&self, count: usize) -> bool {
        self.items.len().saturating_add(count) <= self.capacity as usize
    }

    /// Insert an item built from its new handle.
    ///
    /// Returns `None` when the pool is full.
    pub fn insert_with(&mut self, build: impl FnOnce(I) -> T) -> Option<I> {
        if !self.can_allocate(1) {
            return None;
        }
        let id = I::from_index(self.next_index);
        self.next_index += 1;
        self.items.insert(id, build(id));
        Some(id)
    }

    /// Remove an item by handle.
    pub fn remove(&mut self, id: I) -> Option<T> {
        self.items.remove(&id)
    }

    /// Get an item by handle.
    #[must_use]
    pub fn get(&self, id: I) -> Option<&T> {
        self.items.get(&id)
    }

    /// Get a mutable reference to an item by handle.
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.items.get_mut(&id)
    }

    /// Check if an item exists.
    #[must_use]
    pub fn contains(&self, id: I) -> bool {
        self.items.contains_key(&id)
    }

    /// Number of live items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Handles in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<I> {
        self.items.keys().copied().collect()
    }

    /// Iterate in ascending handle order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.items.iter().map(|(id, item)| (*id, item))
    }

    /// Iterate mutably in ascending handle order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> {
        self.items.iter_mut().map(|(id, item)| (*id, item))
    }

    /// Keep only items for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(I, &mut T) -> bool) {
        self.items.retain(|id, item| keep(*id, item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pool_id!(
        /// Test handle.
        TestId(u16)
    );

    #[test]
    fn test_ids_are_not_reused() {
        let mut pool: Pool<TestId, &str> = Pool::new(8);
        let a = pool.insert_with(|_| "a").unwrap();
        pool.remove(a);
        let b = pool.insert_with(|_| "b").unwrap();
        assert_ne!(a, b);
        assert!(pool.get(a).is_none());
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut pool: Pool<TestId, u8> = Pool::new(2);
        assert!(pool.insert_with(|_| 1).is_some());
        assert!(pool.insert_with(|_| 2).is_some());
        assert!(!pool.can_allocate(1));
        assert!(pool.insert_with(|_| 3).is_none());
    }

    #[test]
    fn test_iteration_is_ordered() {
        let mut pool: Pool<TestId, u8> = Pool::new(8);
        for n in 0..5 {
            pool.insert_with(|_| n);
        }
        let ids = pool.ids();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
