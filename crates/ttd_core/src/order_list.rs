//! Order lists and order sharing.
//!
//! An [`OrderList`] lives in the world's order-list pool and is referenced by
//! every vehicle following it. Vehicles that share orders point at the same
//! list; the list keeps the sharers in sharing order so "first shared" and
//! "next shared" are plain lookups. The list is freed when its last sharer
//! leaves.
//!
//! Inserting, deleting and moving orders keep every conditional skip target
//! in range. Per-vehicle order indices are fixed up by the commands, which
//! have access to the sharers.

use serde::{Deserialize, Serialize};

pub use crate::order::VehicleOrderId;
use crate::ids::VehicleId;
use crate::order::{ConditionVariable, Order, OrderKind};
use crate::pool::pool_id;

pool_id!(
    /// Handle of an order list.
    OrderListId(u32)
);

/// Orders of one vehicle or of a group of vehicles sharing them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderList {
    orders: Vec<Order>,
    /// Vehicles following this list, first sharer first.
    sharers: Vec<VehicleId>,
}

impl OrderList {
    /// Create a list followed by `first`.
    #[must_use]
    pub fn new(orders: Vec<Order>, first: VehicleId) -> Self {
        Self {
            orders,
            sharers: vec![first],
        }
    }

    /// Number of orders, implicit ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Whether the list holds no orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of orders that are not implicit.
    #[must_use]
    pub fn num_manual_orders(&self) -> usize {
        self.orders.iter().filter(|o| !o.is_implicit()).count()
    }

    /// All orders in sequence.
    #[must_use]
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Order at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Order> {
        self.orders.get(index)
    }

    /// Mutable order at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Order> {
        self.orders.get_mut(index)
    }

    /// Position of order `id`, if it exists.
    #[must_use]
    pub fn order_at(&self, id: VehicleOrderId) -> Option<usize> {
        let index = usize::from(id);
        (index < self.orders.len()).then_some(index)
    }

    /// Position following `index`, wrapping at the end.
    #[must_use]
    pub fn next_index(&self, index: usize) -> usize {
        if index + 1 >= self.orders.len() {
            0
        } else {
            index + 1
        }
    }

    /// Insert `order` before position `sel` (or append when `sel == len`).
    ///
    /// Skip targets at or behind `sel` move along with their orders.
    pub fn insert(&mut self, sel: usize, order: Order) {
        let sel = sel.min(self.orders.len());
        self.orders.insert(sel, order);
        let len = self.orders.len();
        for (cur, order) in self.orders.iter_mut().enumerate() {
            let Some(target) = order.skip_to() else {
                continue;
            };
            let target = usize::from(target);
            let mut new_target = target;
            if target >= sel {
                new_target = target + 1;
            }
            if target == cur {
                new_target = (target + 1) % len;
            }
            order.set_skip_to(to_order_id(new_target));
        }
    }

    /// Remove the order at `sel`.
    ///
    /// Skip targets behind `sel` move back; a target that would point at its
    /// own conditional is moved to the following order.
    pub fn delete(&mut self, sel: usize) -> Option<Order> {
        if sel >= self.orders.len() {
            return None;
        }
        let removed = self.orders.remove(sel);
        let len = self.orders.len();
        for (cur, order) in self.orders.iter_mut().enumerate() {
            let Some(target) = order.skip_to() else {
                continue;
            };
            let mut target = usize::from(target);
            if target >= sel {
                target = target.saturating_sub(1);
            }
            if target == cur {
                target = (target + 1) % len;
            }
            order.set_skip_to(to_order_id(target));
        }
        Some(removed)
    }

    /// Move the order at `from` so that it ends up at position `to`.
    pub fn move_order(&mut self, from: usize, to: usize) {
        if from >= self.orders.len() || to >= self.orders.len() || from == to {
            return;
        }
        let order = self.orders.remove(from);
        self.orders.insert(to, order);
        for order in &mut self.orders {
            let Some(target) = order.skip_to() else {
                continue;
            };
            let target = usize::from(target);
            let new_target = shift_for_move(target, from, to);
            order.set_skip_to(to_order_id(new_target));
        }
    }

    /// Replace every order, keeping the sharers.
    pub fn replace_orders(&mut self, orders: Vec<Order>) {
        self.orders = orders;
    }

    /// Find the next order, starting at `next`, that makes the vehicle do
    /// something.
    ///
    /// Unconditional jumps are followed; halting depot orders end the search;
    /// refitting depot orders count; orders that neither load nor unload are
    /// passed. Every step increases `hops`, and the search gives up once it
    /// exceeds the list length.
    #[must_use]
    pub fn get_next_decision_node(&self, mut next: Option<usize>, mut hops: u32) -> Option<usize> {
        loop {
            let index = next?;
            if hops as usize > self.orders.len() {
                return None;
            }
            let order = self.orders.get(index)?;
            match order.kind {
                OrderKind::Conditional {
                    variable, skip_to, ..
                } => {
                    if variable != ConditionVariable::Unconditionally {
                        return Some(index);
                    }
                    next = self.order_at(skip_to);
                    hops += 1;
                    continue;
                }
                OrderKind::GotoDepot { .. } => {
                    if order.depot_action.halts() {
                        return None;
                    }
                    if order.is_refit() {
                        return Some(index);
                    }
                }
                _ => {}
            }
            if !order.can_load_or_unload() {
                next = Some(self.next_index(index));
                hops += 1;
                continue;
            }
            return Some(index);
        }
    }

    /// Sum of all wait and travel times in ticks.
    #[must_use]
    pub fn total_duration(&self) -> u32 {
        self.orders
            .iter()
            .map(|o| u32::from(o.wait_time) + u32::from(o.travel_time))
            .sum()
    }

    /// Vehicles following this list.
    #[must_use]
    pub fn sharers(&self) -> &[VehicleId] {
        &self.sharers
    }

    /// Whether more than one vehicle follows this list.
    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.sharers.len() > 1
    }

    /// First vehicle of the sharing chain.
    #[must_use]
    pub fn first_shared(&self) -> Option<VehicleId> {
        self.sharers.first().copied()
    }

    /// Vehicle following `vehicle` in the sharing chain.
    #[must_use]
    pub fn next_shared(&self, vehicle: VehicleId) -> Option<VehicleId> {
        let pos = self.sharers.iter().position(|v| *v == vehicle)?;
        self.sharers.get(pos + 1).copied()
    }

    /// Another vehicle sharing with `vehicle`: the first sharer, or the next
    /// one when `vehicle` is the first.
    #[must_use]
    pub fn sharing_partner(&self, vehicle: VehicleId) -> Option<VehicleId> {
        if self.first_shared() == Some(vehicle) {
            self.next_shared(vehicle)
        } else {
            self.first_shared()
        }
    }

    /// Add `vehicle` to the chain right after `after`.
    pub fn add_sharer(&mut self, after: VehicleId, vehicle: VehicleId) {
        let pos = self
            .sharers
            .iter()
            .position(|v| *v == after)
            .map_or(self.sharers.len(), |p| p + 1);
        self.sharers.insert(pos, vehicle);
    }

    /// Remove `vehicle` from the chain. Returns the number of remaining sharers.
    pub fn remove_sharer(&mut self, vehicle: VehicleId) -> usize {
        self.sharers.retain(|v| *v != vehicle);
        self.sharers.len()
    }
}

/// New position of an index after moving the entry at `from` to `to`.
#[must_use]
pub const fn shift_for_move(index: usize, from: usize, to: usize) -> usize {
    if index == from {
        to
    } else if index > from && index <= to {
        index - 1
    } else if index < from && index >= to {
        index + 1
    } else {
        index
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn to_order_id(index: usize) -> VehicleOrderId {
    index as VehicleOrderId
}
