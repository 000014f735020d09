//! Cargo pickup and delivery monitors for scripts.
//!
//! A monitor is identified by a packed 32-bit [`CargoMonitorId`]:
//!
//! | bits   | field                       |
//! |--------|-----------------------------|
//! | 0..16  | town or industry index      |
//! | 16     | set when monitoring an industry |
//! | 19..25 | cargo type                  |
//! | 25..29 | company                     |
//!
//! The packed form is what scripts hold and what the maps are keyed by.
//! Inside the core the decoded [`CargoMonitor`] is used; [`CargoMonitor::encode`]
//! and [`CargoMonitor::decode`] are the only conversions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cargo::CargoId;
use crate::ids::{CompanyId, IndustryId, TownId};
use crate::world::World;

/// Packed monitor key.
pub type CargoMonitorId = u32;

const TOWN_IND_NUMBER_START: u32 = 0;
const TOWN_IND_NUMBER_LENGTH: u32 = 16;
const IS_INDUSTRY_BIT: u32 = 16;
const CARGO_TYPE_START: u32 = 19;
const CARGO_TYPE_LENGTH: u32 = 6;
const COMPANY_START: u32 = 25;
const COMPANY_LENGTH: u32 = 4;

const fn get_bits(value: u32, start: u32, length: u32) -> u32 {
    (value >> start) & ((1 << length) - 1)
}

const fn set_bits(value: u32, start: u32, length: u32, data: u32) -> u32 {
    let mask = ((1 << length) - 1) << start;
    (value & !mask) | ((data << start) & mask)
}

/// Key for monitoring `cargo` of `company` at industry `industry`.
///
/// `cargo` must be below 64 and `company` below 16; violating that is a
/// caller bug.
#[must_use]
pub fn encode_cargo_industry_monitor(
    company: CompanyId,
    cargo: CargoId,
    industry: IndustryId,
) -> CargoMonitorId {
    debug_assert!(u32::from(cargo.0) < (1 << CARGO_TYPE_LENGTH));
    debug_assert!(u32::from(company.0) < (1 << COMPANY_LENGTH));
    let mut ret = 0;
    ret = set_bits(ret, TOWN_IND_NUMBER_START, TOWN_IND_NUMBER_LENGTH, u32::from(industry.0));
    ret |= 1 << IS_INDUSTRY_BIT;
    ret = set_bits(ret, CARGO_TYPE_START, CARGO_TYPE_LENGTH, u32::from(cargo.0));
    set_bits(ret, COMPANY_START, COMPANY_LENGTH, u32::from(company.0))
}

/// Key for monitoring `cargo` of `company` at town `town`.
///
/// Same preconditions as [`encode_cargo_industry_monitor`].
#[must_use]
pub fn encode_cargo_town_monitor(company: CompanyId, cargo: CargoId, town: TownId) -> CargoMonitorId {
    debug_assert!(u32::from(cargo.0) < (1 << CARGO_TYPE_LENGTH));
    debug_assert!(u32::from(company.0) < (1 << COMPANY_LENGTH));
    let mut ret = 0;
    ret = set_bits(ret, TOWN_IND_NUMBER_START, TOWN_IND_NUMBER_LENGTH, u32::from(town.0));
    ret = set_bits(ret, CARGO_TYPE_START, CARGO_TYPE_LENGTH, u32::from(cargo.0));
    set_bits(ret, COMPANY_START, COMPANY_LENGTH, u32::from(company.0))
}

/// Company of a monitor.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn decode_monitor_company(num: CargoMonitorId) -> CompanyId {
    CompanyId(get_bits(num, COMPANY_START, COMPANY_LENGTH) as u8)
}

/// Cargo type of a monitor.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn decode_monitor_cargo_type(num: CargoMonitorId) -> CargoId {
    CargoId(get_bits(num, CARGO_TYPE_START, CARGO_TYPE_LENGTH) as u8)
}

/// Whether the monitor watches an industry (otherwise a town).
#[must_use]
pub const fn monitor_monitors_industry(num: CargoMonitorId) -> bool {
    (num >> IS_INDUSTRY_BIT) & 1 != 0
}

/// Industry of a monitor, [`IndustryId::INVALID`] for town monitors.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn decode_monitor_industry(num: CargoMonitorId) -> IndustryId {
    if !monitor_monitors_industry(num) {
        return IndustryId::INVALID;
    }
    IndustryId(get_bits(num, TOWN_IND_NUMBER_START, TOWN_IND_NUMBER_LENGTH) as u16)
}

/// Town of a monitor, [`TownId::INVALID`] for industry monitors.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn decode_monitor_town(num: CargoMonitorId) -> TownId {
    if monitor_monitors_industry(num) {
        return TownId::INVALID;
    }
    TownId(get_bits(num, TOWN_IND_NUMBER_START, TOWN_IND_NUMBER_LENGTH) as u16)
}

/// What a monitor watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorTarget {
    /// Cargo to or from a town.
    Town(TownId),
    /// Cargo to or from an industry.
    Industry(IndustryId),
}

/// Decoded monitor key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CargoMonitor {
    /// Monitored company.
    pub company: CompanyId,
    /// Monitored cargo.
    pub cargo: CargoId,
    /// Monitored town or industry.
    pub target: MonitorTarget,
}

impl CargoMonitor {
    /// Packed key of this monitor.
    #[must_use]
    pub fn encode(self) -> CargoMonitorId {
        match self.target {
            MonitorTarget::Town(town) => encode_cargo_town_monitor(self.company, self.cargo, town),
            MonitorTarget::Industry(industry) => {
                encode_cargo_industry_monitor(self.company, self.cargo, industry)
            }
        }
    }

    /// Unpack a key.
    #[must_use]
    pub const fn decode(num: CargoMonitorId) -> Self {
        let target = if monitor_monitors_industry(num) {
            MonitorTarget::Industry(decode_monitor_industry(num))
        } else {
            MonitorTarget::Town(decode_monitor_town(num))
        };
        Self {
            company: decode_monitor_company(num),
            cargo: decode_monitor_cargo_type(num),
            target,
        }
    }
}

/// Where delivered cargo was originally picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CargoSource {
    /// Produced by an industry.
    Industry(IndustryId),
    /// Produced by a town.
    Town(TownId),
    /// Produced somewhere that is not monitored (e.g. a headquarters).
    Other,
}

/// Accumulated amounts of every active monitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CargoMonitors {
    pickups: BTreeMap<CargoMonitorId, i32>,
    deliveries: BTreeMap<CargoMonitorId, i32>,
}

fn take_amount(map: &mut BTreeMap<CargoMonitorId, i32>, monitor: CargoMonitorId, keep: bool) -> i32 {
    match map.get_mut(&monitor) {
        None => {
            if keep {
                map.insert(monitor, 0);
            }
            0
        }
        Some(amount) => {
            let result = std::mem::take(amount);
            if !keep {
                map.remove(&monitor);
            }
            result
        }
    }
}

fn clear_company(map: &mut BTreeMap<CargoMonitorId, i32>, company: Option<CompanyId>) {
    match company {
        None => map.clear(),
        Some(company) => map.retain(|num, _| decode_monitor_company(*num) != company),
    }
}

fn accumulate(map: &mut BTreeMap<CargoMonitorId, i32>, monitor: CargoMonitorId, amount: i32) {
    if let Some(total) = map.get_mut(&monitor) {
        *total = total.saturating_add(amount);
    }
}

impl CargoMonitors {
    /// Amount delivered since the last query.
    ///
    /// An unknown monitor yields 0. With `keep_monitoring` the counter is reset
    /// to 0 and keeps accumulating (and an unknown monitor starts being
    /// monitored); without it the monitor is removed.
    pub fn get_delivery_amount(&mut self, monitor: CargoMonitorId, keep_monitoring: bool) -> i32 {
        take_amount(&mut self.deliveries, monitor, keep_monitoring)
    }

    /// Amount picked up since the last query. Same semantics as
    /// [`Self::get_delivery_amount`].
    pub fn get_pickup_amount(&mut self, monitor: CargoMonitorId, keep_monitoring: bool) -> i32 {
        take_amount(&mut self.pickups, monitor, keep_monitoring)
    }

    /// Stop delivery monitoring for `company`, or for everyone with `None`.
    pub fn clear_delivery_monitoring(&mut self, company: Option<CompanyId>) {
        clear_company(&mut self.deliveries, company);
    }

    /// Stop pickup monitoring for `company`, or for everyone with `None`.
    pub fn clear_pickup_monitoring(&mut self, company: Option<CompanyId>) {
        clear_company(&mut self.pickups, company);
    }

    /// Whether deliveries of `monitor` are being accumulated.
    #[must_use]
    pub fn is_monitoring_delivery(&self, monitor: CargoMonitorId) -> bool {
        self.deliveries.contains_key(&monitor)
    }

    /// Whether pickups of `monitor` are being accumulated.
    #[must_use]
    pub fn is_monitoring_pickup(&self, monitor: CargoMonitorId) -> bool {
        self.pickups.contains_key(&monitor)
    }

    /// Record `amount` of `cargo` delivered by `company` to a station near
    /// `dest_town` (and `dest_industry` when it accepted the cargo).
    ///
    /// Only already monitored keys accumulate.
    pub fn add_cargo_delivery(
        &mut self,
        cargo: CargoId,
        company: CompanyId,
        amount: u32,
        source: CargoSource,
        dest_town: TownId,
        dest_industry: Option<IndustryId>,
    ) {
        if amount == 0 || !cargo.is_valid() || !company.is_company() {
            return;
        }
        let amount = i32::try_from(amount).unwrap_or(i32::MAX);
        match source {
            CargoSource::Industry(industry) => accumulate(
                &mut self.pickups,
                encode_cargo_industry_monitor(company, cargo, industry),
                amount,
            ),
            CargoSource::Town(town) => accumulate(
                &mut self.pickups,
                encode_cargo_town_monitor(company, cargo, town),
                amount,
            ),
            CargoSource::Other => {}
        }

        accumulate(
            &mut self.deliveries,
            encode_cargo_town_monitor(company, cargo, dest_town),
            amount,
        );
        if let Some(industry) = dest_industry {
            accumulate(
                &mut self.deliveries,
                encode_cargo_industry_monitor(company, cargo, industry),
                amount,
            );
        }
    }
}

/// Checks script-supplied company and cargo; returns `None` if either is out of range.
fn checked_script_ids(world: &World, company: u32, cargo: u32) -> Option<(CompanyId, CargoId)> {
    let company = u8::try_from(company).ok().map(CompanyId)?;
    let cargo = u8::try_from(cargo).ok().map(CargoId)?;
    (company.is_company() && world.is_valid_cargo(cargo)).then_some((company, cargo))
}

fn checked_town(world: &World, town: u32) -> Option<TownId> {
    let town = TownId(u16::try_from(town).ok()?);
    world.towns.contains(town).then_some(town)
}

fn checked_industry(world: &World, industry: u32) -> Option<IndustryId> {
    let industry = IndustryId(u16::try_from(industry).ok()?);
    world.industries.contains(industry).then_some(industry)
}

/// Script query: cargo delivered to a town. Returns -1 on invalid input.
pub fn town_delivery_amount(world: &mut World, company: u32, cargo: u32, town: u32, keep_monitoring: bool) -> i32 {
    let Some((company, cargo)) = checked_script_ids(world, company, cargo) else {
        return -1;
    };
    let Some(town) = checked_town(world, town) else {
        return -1;
    };
    let monitor = encode_cargo_town_monitor(company, cargo, town);
    world.cargo_monitors.get_delivery_amount(monitor, keep_monitoring)
}

/// Script query: cargo delivered to an industry. Returns -1 on invalid input.
pub fn industry_delivery_amount(
    world: &mut World,
    company: u32,
    cargo: u32,
    industry: u32,
    keep_monitoring: bool,
) -> i32 {
    let Some((company, cargo)) = checked_script_ids(world, company, cargo) else {
        return -1;
    };
    let Some(industry) = checked_industry(world, industry) else {
        return -1;
    };
    let monitor = encode_cargo_industry_monitor(company, cargo, industry);
    world.cargo_monitors.get_delivery_amount(monitor, keep_monitoring)
}

/// Script query: cargo picked up at a town. Returns -1 on invalid input.
pub fn town_pickup_amount(world: &mut World, company: u32, cargo: u32, town: u32, keep_monitoring: bool) -> i32 {
    let Some((company, cargo)) = checked_script_ids(world, company, cargo) else {
        return -1;
    };
    let Some(town) = checked_town(world, town) else {
        return -1;
    };
    let monitor = encode_cargo_town_monitor(company, cargo, town);
    world.cargo_monitors.get_pickup_amount(monitor, keep_monitoring)
}

/// Script query: cargo picked up at an industry. Returns -1 on invalid input.
pub fn industry_pickup_amount(
    world: &mut World,
    company: u32,
    cargo: u32,
    industry: u32,
    keep_monitoring: bool,
) -> i32 {
    let Some((company, cargo)) = checked_script_ids(world, company, cargo) else {
        return -1;
    };
    let Some(industry) = checked_industry(world, industry) else {
        return -1;
    };
    let monitor = encode_cargo_industry_monitor(company, cargo, industry);
    world.cargo_monitors.get_pickup_amount(monitor, keep_monitoring)
}
