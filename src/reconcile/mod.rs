//! Reconciliation engine.
//!
//! Turns the sources chosen by [`crate::selection`] into one [`ProcessedRecord`]. `reconcile`
//! is a pure function: identical inputs always produce an identical record. The device type
//! and source mode pick one of three arms; each arm is assembled from the per-group rules in
//! the submodules, so a rule (say, the grid sign convention) exists in exactly one place.
//!
//! Missing or non-numeric vendor fields leave the corresponding output absent. The only
//! exception is nighttime, where PV, phase and "today" fields are zero-filled to keep the
//! record shape stable from cycle to cycle.

mod battery;
mod energy;
mod environment;
mod grid;
mod pv;

pub use environment::{annual_estimate, DEFAULT_SAVINGS_RATE};

use crate::api::payload;
use crate::model::{
    DeviceType, LoadMonitoring, ProcessedRecord, ProcessedValue, RawSource, SourceMode,
};
use num_derive::FromPrimitive;

/// Vendor direction indicator carried next to an unsigned magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
enum Direction {
    Negative = -1,
    Neutral = 0,
    Positive = 1,
}

impl Direction {
    fn of(source: &RawSource, key: &str) -> Option<Self> {
        payload::code(source, key).and_then(num::FromPrimitive::from_i64)
    }
}

/// Everything `reconcile` looks at. Borrowed so the caller keeps the raw sources for the
/// snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a> {
    pub device_type: &'a DeviceType,
    pub mode: SourceMode,
    pub primary: &'a RawSource,
    pub plant_stats: Option<&'a RawSource>,
    pub load_monitoring: Option<&'a LoadMonitoring>,
    /// 1-based; 0 disables the annual projection.
    pub day_of_year: u32,
    pub savings_rate: f64,
}

enum Profile {
    Battery,
    Solar { nighttime: bool },
    Generic,
}

fn profile(device_type: &DeviceType, mode: SourceMode) -> Profile {
    match device_type {
        DeviceType::Battery => Profile::Battery,
        DeviceType::Solar => Profile::Solar {
            nighttime: mode == SourceMode::Nighttime,
        },
        DeviceType::Other(_) => Profile::Generic,
    }
}

pub fn reconcile(input: &ReconcileInput<'_>) -> ProcessedRecord {
    let mut record = match profile(input.device_type, input.mode) {
        Profile::Battery => battery_record(input),
        Profile::Solar { nighttime } => solar_record(input, nighttime),
        Profile::Generic => generic_record(input),
    };

    environment::reconcile(
        &mut record,
        input.plant_stats,
        input.primary,
        input.day_of_year,
        input.savings_rate,
    );
    operating_status(&mut record, input.primary, input.plant_stats);
    record.set("source_mode", ProcessedValue::Mode(input.mode));
    record
}

/* (record key, vendor key, zero means "not reported") */
type Passthrough = (&'static str, &'static str, bool);

const SOLAR_PASSTHROUGH: &[Passthrough] = &[
    ("inverter_temp", "invTempC", true),
    ("operating_mode", "mpvMode", false),
    ("self_consumption_power", "selfUsePower", false),
];

const BATTERY_PASSTHROUGH: &[Passthrough] = &[
    ("operating_mode", "mpvMode", false),
    ("backup_load_power", "backupTotalLoadPowerWatt", false),
    ("self_consumption_power", "selfUsePower", false),
];

fn copy_through(record: &mut ProcessedRecord, source: &RawSource, fields: &[Passthrough]) {
    for &(key, vendor, zero_is_missing) in fields {
        let value = if zero_is_missing {
            payload::nonzero(source, vendor)
        } else {
            payload::number(source, vendor)
        };
        record.set_opt(key, value);
    }
}

/// Inverter state code; plant statistics carry it when the device sample does not.
fn operating_status(
    record: &mut ProcessedRecord,
    primary: &RawSource,
    plant_stats: Option<&RawSource>,
) {
    let status = payload::code(primary, "deviceStatus")
        .or_else(|| plant_stats.and_then(|stats| payload::code(stats, "deviceStatus")));
    record.set_opt("operating_status", status.map(|code| code as f64));
}

/// Home consumption: the load monitor when present, else the device's own aggregate.
fn home_load_power(
    record: &mut ProcessedRecord,
    load_monitoring: Option<&LoadMonitoring>,
    primary: &RawSource,
) {
    let load = load_monitoring
        .and_then(|window| payload::number(&window.latest, "loadPower"))
        .or_else(|| payload::number(primary, "totalLoadPowerWatt"));
    record.set_opt("home_load_power", load);
}

fn energy_sources<'a>(input: &ReconcileInput<'a>) -> energy::Sources<'a> {
    energy::Sources {
        primary: input.primary,
        load_monitoring: input.load_monitoring,
        plant_stats: input.plant_stats,
    }
}

/* Battery systems are reconciled from their realtime sample alone */
fn battery_record(input: &ReconcileInput<'_>) -> ProcessedRecord {
    let mut record = ProcessedRecord::new();
    let primary = input.primary;

    battery::reconcile(&mut record, primary);
    grid::reconcile(&mut record, None, primary);
    home_load_power(&mut record, None, primary);
    pv::reported_total(&mut record, primary);

    let sources = energy_sources(input);
    energy::reconcile(&mut record, energy::COMMON_FIELDS, &sources, false);
    energy::reconcile(&mut record, energy::BATTERY_FIELDS, &sources, false);
    copy_through(&mut record, primary, BATTERY_PASSTHROUGH);
    record
}

fn solar_record(input: &ReconcileInput<'_>, nighttime: bool) -> ProcessedRecord {
    let mut record = ProcessedRecord::new();
    let primary = input.primary;

    pv::aggregate(&mut record, primary, nighttime);
    grid::reconcile(&mut record, input.load_monitoring, primary);
    grid::phases(&mut record, primary, nighttime);
    home_load_power(&mut record, input.load_monitoring, primary);

    energy::reconcile(
        &mut record,
        energy::COMMON_FIELDS,
        &energy_sources(input),
        nighttime,
    );
    copy_through(&mut record, primary, SOLAR_PASSTHROUGH);
    record
}

fn generic_record(input: &ReconcileInput<'_>) -> ProcessedRecord {
    let mut record = ProcessedRecord::new();
    let primary = input.primary;

    pv::reported_total(&mut record, primary);
    grid::reconcile(&mut record, input.load_monitoring, primary);
    home_load_power(&mut record, input.load_monitoring, primary);
    energy::reconcile(
        &mut record,
        energy::COMMON_FIELDS,
        &energy_sources(input),
        false,
    );
    copy_through(&mut record, primary, SOLAR_PASSTHROUGH);
    record
}
