//! Predicting the links a vehicle will serve from its orders.
//!
//! Starting at the vehicle's current order, the refresher walks the order
//! list the way the vehicle would drive it and reports the capacity it will
//! offer on every station-to-station hop to the [`LinkGraph`]. Conditional
//! orders cannot be evaluated ahead of time, so both outcomes are walked:
//! the skip target by a branch holding a full copy of the walker's state.
//! Branches live on an explicit work stack. A walk that forks is suspended
//! behind its forks, so every fork is walked to the end before the walk that
//! spawned it goes on, forks in the order they were found. This decides which
//! walk claims a hop both of them reach.
//!
//! Refit orders change what the consist carries. The walker tracks, per
//! part, the capacity it would have after the refit and how much of the old
//! cargo it still holds; the old cargo is only gone once the vehicle reaches
//! a stop where it can load again.
//!
//! Termination: every conceptual vehicle has a budget of twice the order
//! count in steps, shared by all conditional branches forked from it, and a
//! hop that any branch already walked is never walked again.

use std::collections::BTreeSet;

use crate::cargo::{CargoId, CargoMask, NUM_CARGO};
use crate::ids::{EngineId, VehicleId};
use crate::link_graph::{EdgeUpdateMode, LinkGraph};
use crate::order::Order;
use crate::order_list::OrderList;
use crate::pool::Pool;
use crate::vehicle::{Engine, Vehicle, VehicleType};
use crate::world::World;

/// Walker state flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RefreshFlags(u8);

impl RefreshFlags {
    /// The next order has already been decided; do not advance past it.
    const USE_NEXT: Self = Self(1 << 0);
    /// The consist may carry cargo on the current hop.
    const HAS_CARGO: Self = Self(1 << 1);
    /// A refit happened since the last loading stop.
    const WAS_REFIT: Self = Self(1 << 2);
    /// Capacities must be reset at the next stop.
    const RESET_REFIT: Self = Self(1 << 3);
    /// An auto-refit was already expanded on this walk.
    const IN_AUTOREFIT: Self = Self(1 << 4);

    const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

/// Capacity bookkeeping of one consist part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RefitDesc {
    /// Cargo the part carries (after any refit).
    cargo: CargoId,
    /// Capacity for `cargo`.
    capacity: u16,
    /// Capacity still counted in the running map; lower than `capacity`
    /// until the part can load again after a refit.
    remaining: u16,
}

/// Where a suspended walk picks up again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Resume {
    /// At the top of the step for `next`.
    #[default]
    Start,
    /// After the refit handling of `next`.
    AfterRefit,
    /// After predicting the order following `next`.
    Predicted(usize),
}

/// A walk in progress.
#[derive(Debug, Clone)]
struct Branch {
    capacities: [u32; NUM_CARGO],
    refits: Vec<RefitDesc>,
    /// Cargo the consist was last refitted to.
    cargo: CargoId,
    /// Last station stop.
    cur: usize,
    /// Order to process next.
    next: Option<usize>,
    flags: RefreshFlags,
    /// Conditional jumps taken to reach this branch.
    num_hops: u32,
    /// Index of the step budget this branch draws from.
    budget: usize,
    resume: Resume,
}

/// Summary of one refresh run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Orders processed over all branches.
    pub steps: usize,
    /// Walks started, the initial one included.
    pub branches: usize,
    /// Conceptual vehicles, each with its own step budget.
    pub budgets: usize,
    /// Link updates sent to the link graph.
    pub links_refreshed: usize,
}

/// A hop `(from order, to order, cargo)` already walked.
type Hop = (usize, usize, CargoId);

struct LinkRefresher<'a> {
    vehicle: &'a Vehicle,
    orders: &'a OrderList,
    engines: &'a Pool<EngineId, Engine>,
    valid_cargos: CargoMask,
    graph: &'a mut LinkGraph,
    date: u32,
    first: usize,
    seen_hops: BTreeSet<Hop>,
    budgets: Vec<usize>,
    report: RefreshReport,
}

/// Refresh the links of `vehicle` in the world's link graph.
///
/// Does nothing for vehicles without orders or without any order that makes
/// them load or unload.
pub fn run(world: &mut World, vehicle: VehicleId) -> RefreshReport {
    let World {
        vehicles,
        order_lists,
        engines,
        link_graph,
        valid_cargos,
        date,
        ..
    } = world;
    let Some(v) = vehicles.get(vehicle) else {
        return RefreshReport::default();
    };
    let Some(orders) = v.orders.and_then(|id| order_lists.get(id)) else {
        return RefreshReport::default();
    };
    let start = orders.order_at(v.cur_implicit_order_index);
    let Some(first) = orders.get_next_decision_node(start, 0) else {
        return RefreshReport::default();
    };

    let mut refresher = LinkRefresher {
        vehicle: v,
        orders,
        engines,
        valid_cargos: *valid_cargos,
        graph: link_graph,
        date: *date,
        first,
        seen_hops: BTreeSet::new(),
        budgets: Vec::new(),
        report: RefreshReport::default(),
    };
    let report = refresher.refresh(first);
    tracing::trace!(
        vehicle = vehicle.0,
        steps = report.steps,
        branches = report.branches,
        links = report.links_refreshed,
        "links refreshed"
    );
    report
}

/// Refresh the links of every vehicle sharing orders with `vehicle`.
pub fn refresh_order_sharers(world: &mut World, vehicle: VehicleId) {
    let sharers = world
        .orders_of(vehicle)
        .map(|list| list.sharers().to_vec())
        .unwrap_or_default();
    for sharer in sharers {
        run(world, sharer);
    }
}

impl LinkRefresher<'_> {
    fn refresh(&mut self, first: usize) -> RefreshReport {
        let mut capacities = [0u32; NUM_CARGO];
        let mut refits = Vec::with_capacity(self.vehicle.parts.len());
        for part in &self.vehicle.parts {
            refits.push(RefitDesc {
                cargo: part.cargo_type,
                capacity: part.cargo_cap,
                remaining: part.refit_cap,
            });
            if part.refit_cap > 0 && part.cargo_type.is_valid() {
                capacities[part.cargo_type.index()] += u32::from(part.refit_cap);
            }
        }
        let mut flags = RefreshFlags::default();
        if self.vehicle.last_loading_station.is_valid() {
            flags.insert(RefreshFlags::HAS_CARGO);
        }

        let initial = Branch {
            capacities,
            refits,
            cargo: CargoId::INVALID,
            cur: first,
            next: Some(first),
            flags,
            num_hops: 0,
            budget: self.new_budget(),
            resume: Resume::Start,
        };
        let mut stack = vec![initial];
        while let Some(branch) = stack.pop() {
            if branch.resume == Resume::Start {
                self.report.branches += 1;
            }
            self.walk(branch, &mut stack);
        }
        self.report.budgets = self.budgets.len();
        self.report
    }

    fn new_budget(&mut self) -> usize {
        self.budgets.push(self.orders.len() * 2);
        self.budgets.len() - 1
    }

    fn walk(&mut self, mut b: Branch, stack: &mut Vec<Branch>) {
        let orders = self.orders;
        let mut resume = std::mem::take(&mut b.resume);
        while let Some(next) = b.next {
            let Some(order) = orders.get(next) else {
                break;
            };

            if resume == Resume::Start {
                let Some(budget) = self.budgets.get_mut(b.budget) else {
                    break;
                };
                if *budget == 0 {
                    break;
                }
                *budget -= 1;
                self.report.steps += 1;

                let forks = self.handle_refit_order(&mut b, order);
                if !forks.is_empty() {
                    b.resume = Resume::AfterRefit;
                    suspend(stack, Some(b), forks);
                    return;
                }
            }

            let predicted = if let Resume::Predicted(predicted) = resume {
                predicted
            } else {
                if b.flags.contains(RefreshFlags::WAS_REFIT) && order.is_station_stop() {
                    b.flags.insert(RefreshFlags::RESET_REFIT);
                } else {
                    b.flags.remove(RefreshFlags::RESET_REFIT);
                }

                let (predicted, forks) = self.predict_next_order(&b, next);
                if !forks.is_empty() {
                    let parent = match predicted {
                        Some(predicted) => Some(Branch {
                            resume: Resume::Predicted(predicted),
                            ..b
                        }),
                        None => None,
                    };
                    suspend(stack, parent, forks);
                    return;
                }
                let Some(predicted) = predicted else {
                    break;
                };
                predicted
            };
            resume = Resume::Start;

            if !self.seen_hops.insert((b.cur, predicted, b.cargo)) {
                break;
            }
            b.flags.remove(RefreshFlags::USE_NEXT);
            b.next = Some(predicted);

            let Some(next_order) = orders.get(predicted) else {
                break;
            };
            if !next_order.is_station_stop() {
                continue;
            }

            if b.flags.contains(RefreshFlags::RESET_REFIT) {
                reset_refit(&mut b);
                b.flags.remove(RefreshFlags::RESET_REFIT);
                b.flags.remove(RefreshFlags::WAS_REFIT);
            }

            if let Some(cur_order) = orders.get(b.cur) {
                if cur_order.is_station_stop() {
                    if cur_order.can_leave_with_cargo(b.flags.contains(RefreshFlags::HAS_CARGO)) {
                        b.flags.insert(RefreshFlags::HAS_CARGO);
                        self.refresh_stats(&b, cur_order, next_order);
                    } else {
                        b.flags.remove(RefreshFlags::HAS_CARGO);
                    }
                }
            }

            b.cur = predicted;
            if predicted == self.first {
                break;
            }
        }
    }

    /// Apply the refit of `order`, if any. An auto-refit not yet expanded on
    /// this walk returns one fork per cargo the consist can be refitted to.
    fn handle_refit_order(&mut self, b: &mut Branch, order: &Order) -> Vec<Branch> {
        let mut forks = Vec::new();
        if !(order.is_goto_depot() || order.is_goto_station()) || !order.is_refit() {
            return forks;
        }
        b.flags.insert(RefreshFlags::WAS_REFIT);
        if !order.is_auto_refit() {
            if let Some(cargo) = order.refit {
                self.handle_refit(b, cargo);
            }
        } else if !b.flags.contains(RefreshFlags::IN_AUTOREFIT) {
            b.flags.insert(RefreshFlags::IN_AUTOREFIT);
            for cargo in self.valid_cargos.iter() {
                let mut fork = b.clone();
                if self.handle_refit(&mut fork, cargo) {
                    fork.budget = self.new_budget();
                    forks.push(fork);
                }
            }
        }
        forks
    }

    /// Order the vehicle heads for after `next`, with a fork for every
    /// conditional skip target passed on the way.
    fn predict_next_order(&self, b: &Branch, next: usize) -> (Option<usize>, Vec<Branch>) {
        let orders = self.orders;
        let mut forks = Vec::new();
        let mut flags = b.flags;
        let mut num_hops = b.num_hops;
        let mut next = Some(next);
        while let Some(index) = next {
            let Some(order) = orders.get(index) else {
                return (None, forks);
            };
            if flags.contains(RefreshFlags::USE_NEXT) && !order.is_conditional() {
                break;
            }
            flags.insert(RefreshFlags::USE_NEXT);
            if let Some(skip_to) = order.skip_to() {
                let target = orders.get_next_decision_node(orders.order_at(skip_to), num_hops);
                if let Some(target) = target {
                    if (num_hops as usize) < orders.len() {
                        let mut fork = b.clone();
                        fork.next = Some(target);
                        fork.flags = flags;
                        fork.num_hops = num_hops + 1;
                        forks.push(fork);
                    }
                }
            }
            next = orders.get_next_decision_node(Some(orders.next_index(index)), num_hops);
            num_hops += 1;
        }
        (next, forks)
    }

    /// Capacities as if the consist were refitted to `cargo`. Returns whether
    /// any part could be refitted.
    fn handle_refit(&self, b: &mut Branch, cargo: CargoId) -> bool {
        b.cargo = cargo;
        let is_aircraft = self.vehicle.vehicle_type == VehicleType::Aircraft;
        let mut any = false;
        for (i, part) in self.vehicle.parts.iter().enumerate() {
            let Some(engine) = self.engines.get(part.engine) else {
                continue;
            };
            if !engine.refit_mask.contains(cargo) {
                continue;
            }
            any = true;
            let (amount, mail) = engine.determine_capacity(cargo);
            shrink_part(b, i, cargo, amount);
            if is_aircraft {
                if let Some(mail_desc) = b.refits.get(i + 1).copied() {
                    shrink_part(b, i + 1, mail_desc.cargo, mail);
                }
                break;
            }
        }
        any
    }

    fn refresh_stats(&mut self, b: &Branch, cur_order: &Order, next_order: &Order) {
        let (Some(from), Some(to)) = (cur_order.station(), next_order.station()) else {
            return;
        };
        if from == to || !to.is_valid() || self.vehicle.max_speed == 0 {
            return;
        }
        let restriction = if cur_order.forbids_loading() {
            EdgeUpdateMode::RESTRICTED
        } else {
            EdgeUpdateMode::UNRESTRICTED
        };
        let total = self.orders.total_duration();
        let full_loading_here = self.vehicle.is_full_loading
            && self.vehicle.last_station_visited == from
            && total > self.vehicle.current_order_time;

        for (index, capacity) in b.capacities.iter().enumerate() {
            if *capacity == 0 {
                continue;
            }
            let Ok(raw) = u8::try_from(index) else {
                continue;
            };
            let cargo = CargoId(raw);
            let (amount, mode) = if full_loading_here {
                let effective = capacity.saturating_mul(u32::from(self.vehicle.load_unload_ticks));
                if effective > total {
                    (effective / total, EdgeUpdateMode::INCREASE)
                } else {
                    (*capacity, EdgeUpdateMode::REFRESH)
                }
            } else {
                (*capacity, EdgeUpdateMode::REFRESH)
            };
            self.graph
                .increase_stats(from, to, cargo, amount, 0, mode | restriction, self.date);
            self.report.links_refreshed += 1;
        }
    }
}

/// Put `parent` behind `forks` on the stack so the forks are walked first,
/// in the order given.
fn suspend(stack: &mut Vec<Branch>, parent: Option<Branch>, forks: Vec<Branch>) {
    stack.extend(parent);
    stack.extend(forks.into_iter().rev());
}

/// Set part `i` to carry `amount` of `cargo`, taking what it can no longer
/// hold out of the running capacities.
fn shrink_part(b: &mut Branch, i: usize, cargo: CargoId, amount: u16) {
    let Some(desc) = b.refits.get_mut(i) else {
        return;
    };
    if cargo != desc.cargo && desc.remaining > 0 {
        if desc.cargo.is_valid() {
            let slot = &mut b.capacities[desc.cargo.index()];
            *slot = slot.saturating_sub(u32::from(desc.remaining));
        }
        desc.remaining = 0;
    } else if amount < desc.remaining {
        if cargo.is_valid() {
            let slot = &mut b.capacities[cargo.index()];
            *slot = slot.saturating_sub(u32::from(desc.remaining - amount));
        }
        desc.remaining = amount;
    }
    desc.capacity = amount;
    desc.cargo = cargo;
}

/// The consist reached a stop where it can load: every part holds its full
/// capacity again.
fn reset_refit(b: &mut Branch) {
    for desc in &mut b.refits {
        if desc.remaining == desc.capacity {
            continue;
        }
        if desc.cargo.is_valid() {
            b.capacities[desc.cargo.index()] += u32::from(desc.capacity.saturating_sub(desc.remaining));
        }
        desc.remaining = desc.capacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cargo::CargoMask;
    use crate::ids::{CompanyId, StationId, TileIndex};
    use crate::money::Money;
    use crate::order::{ConditionComparator, ConditionVariable, LoadType, Order, UnloadType};
    use crate::vehicle::VehiclePart;
    use crate::world::StationFacilities;
    use std::collections::BTreeMap;

    const C1: CargoId = CargoId(0);
    const C2: CargoId = CargoId(1);

    fn engine(cargo: CargoId, capacity: u16, refit: &[(CargoId, u16)]) -> Engine {
        let mut refit_mask = CargoMask::EMPTY;
        let mut refit_capacities = BTreeMap::new();
        for (c, cap) in refit {
            refit_mask = refit_mask.union(CargoMask::single(*c));
            refit_capacities.insert(*c, *cap);
        }
        Engine {
            name: "test".to_owned(),
            vehicle_type: VehicleType::Train,
            default_cargo: cargo,
            capacity,
            refit_mask,
            refit_capacities,
            mail_capacity: 0,
            max_speed: 100,
            cost: Money(1000),
            articulated_parts: Vec::new(),
        }
    }

    /// World with three train stations and a two-part train following `orders`.
    fn setup(orders: Vec<Order>) -> (World, VehicleId) {
        let mut world = World::default();
        let company = CompanyId(0);
        world.add_company(company, "Test", Money(1_000_000));
        for n in 0..3 {
            world
                .add_station(format!("S{n}"), company, TileIndex(n), StationFacilities::TRAIN)
                .unwrap();
        }
        let head = world.add_engine(engine(C1, 10, &[])).unwrap();
        let wagon = world.add_engine(engine(C1, 20, &[(C2, 15)])).unwrap();
        let id = world
            .vehicles
            .insert_with(|id| {
                let mut v = Vehicle::new(
                    id,
                    company,
                    VehicleType::Train,
                    TileIndex(0),
                    vec![VehiclePart::new(head, C1, 10), VehiclePart::new(wagon, C1, 20)],
                );
                v.max_speed = 100;
                v
            })
            .unwrap();
        let list = world
            .order_lists
            .insert_with(|_| OrderList::new(orders, id))
            .unwrap();
        world.vehicles.get_mut(id).unwrap().orders = Some(list);
        (world, id)
    }

    fn station(n: u16) -> StationId {
        StationId(n + 1)
    }

    fn capacity(world: &World, from: u16, to: u16, cargo: CargoId) -> u32 {
        world
            .link_graph
            .edge(station(from), station(to), cargo)
            .map_or(0, |e| e.capacity)
    }

    #[test]
    fn test_simple_loop_reports_every_hop() {
        let (mut world, v) = setup(vec![
            Order::goto_station(station(0)),
            Order::goto_station(station(1)),
            Order::goto_station(station(2)),
        ]);
        let report = run(&mut world, v);
        assert_eq!(capacity(&world, 0, 1, C1), 30);
        assert_eq!(capacity(&world, 1, 2, C1), 30);
        assert_eq!(capacity(&world, 2, 0, C1), 30);
        assert_eq!(world.link_graph.len(), 3);
        assert_eq!(report.links_refreshed, 3);
    }

    #[test]
    fn test_refit_accounting_two_parts() {
        let (mut world, v) = setup(vec![
            Order::goto_station(station(0)),
            Order::goto_station(station(1)).with_refit(C2),
            Order::goto_station(station(2)),
        ]);
        run(&mut world, v);

        assert_eq!(capacity(&world, 0, 1, C1), 30);
        assert_eq!(capacity(&world, 0, 1, C2), 0);
        assert_eq!(capacity(&world, 1, 2, C1), 10);
        assert_eq!(capacity(&world, 1, 2, C2), 15);
        assert_eq!(capacity(&world, 2, 0, C1), 10);
        assert_eq!(capacity(&world, 2, 0, C2), 15);
    }

    #[test]
    fn test_depot_refit_waits_for_loading_stop() {
        let (mut world, v) = setup(vec![
            Order::goto_station(station(0)),
            Order::goto_depot(crate::ids::DepotId(1), crate::order::DepotAction::AlwaysGo)
                .with_refit(C2),
            Order::goto_station(station(1)),
        ]);
        run(&mut world, v);

        // The wagon's coal is gone at the depot, the new cargo only loads at S1.
        assert_eq!(capacity(&world, 0, 1, C1), 10);
        assert_eq!(capacity(&world, 0, 1, C2), 0);
        assert_eq!(capacity(&world, 1, 0, C2), 15);
    }

    #[test]
    fn test_no_load_source_is_restricted() {
        let (mut world, v) = setup(vec![
            Order::goto_station(station(0)).with_load(LoadType::NoLoad),
            Order::goto_station(station(1)),
        ]);
        world.vehicles.get_mut(v).unwrap().last_loading_station = station(2);
        run(&mut world, v);
        let edge = world.link_graph.edge(station(0), station(1), C1).unwrap();
        assert!(edge.last_restricted_update.is_some());
        assert!(edge.last_unrestricted_update.is_none());
    }

    #[test]
    fn test_without_orders_does_nothing() {
        let (mut world, v) = setup(Vec::new());
        world.delete_vehicle_orders(v);
        assert_eq!(run(&mut world, v), RefreshReport::default());
        assert!(world.link_graph.is_empty());
    }

    #[test]
    fn test_conditional_branches_both_targets() {
        let (mut world, v) = setup(vec![
            Order::goto_station(station(0)),
            Order::conditional(ConditionVariable::Age, ConditionComparator::MoreThan, 5, 3),
            Order::goto_station(station(1)),
            Order::goto_station(station(2)),
        ]);
        let report = run(&mut world, v);
        assert!(report.branches >= 2);
        assert_eq!(capacity(&world, 0, 1, C1), 30);
        assert_eq!(capacity(&world, 0, 2, C1), 30);
    }

    #[test]
    fn test_conditional_fork_claims_shared_hop_first() {
        // Both walks reach the S2 -> S0 hop. The direct walk arrives empty
        // after unloading everything at S1; the fork jumping straight to S2
        // still carries cargo and must be the one that claims the hop.
        let (mut world, v) = setup(vec![
            Order::goto_station(station(0)),
            Order::conditional(ConditionVariable::Age, ConditionComparator::MoreThan, 5, 3),
            Order::goto_station(station(1))
                .with_load(LoadType::NoLoad)
                .with_unload(UnloadType::Unload),
            Order::goto_station(station(2)).with_load(LoadType::NoLoad),
        ]);
        run(&mut world, v);
        assert_eq!(capacity(&world, 0, 1, C1), 30);
        assert_eq!(capacity(&world, 0, 2, C1), 30);
        assert_eq!(capacity(&world, 1, 2, C1), 0);
        assert_eq!(capacity(&world, 2, 0, C1), 30);
    }

    #[test]
    fn test_auto_refit_forks_per_cargo() {
        let (mut world, v) = setup(vec![
            Order::goto_station(station(0)).with_refit(CargoId::AUTO_REFIT),
            Order::goto_station(station(1)),
        ]);
        let report = run(&mut world, v);
        assert!(report.budgets >= 2);
        assert_eq!(capacity(&world, 0, 1, C2), 15);
        assert_eq!(capacity(&world, 0, 1, C1), 30);
    }

    #[test]
    fn test_self_jump_terminates() {
        let (mut world, v) = setup(vec![Order::jump(0), Order::goto_station(station(0))]);
        let report = run(&mut world, v);
        assert!(report.steps <= 4 * report.budgets.max(1));
    }
}
