use super::Direction;
use crate::api::payload;
use crate::model::{BatteryStatus, ProcessedRecord, ProcessedValue, RawSource};

/// State of charge, temperature, power magnitude and flow direction.
///
/// `batteryDirection` 1 is discharging, -1 charging and 0 standby, whatever the power reads.
/// Without a direction the sign of `batPower` decides.
pub fn reconcile(record: &mut ProcessedRecord, source: &RawSource) {
    record.set_opt("battery_level", payload::number(source, "batEnergyPercent"));
    record.set_opt("battery_temp", payload::nonzero(source, "batTempC"));

    let power = payload::number(source, "batPower");
    record.set_opt("battery_power_abs", power.map(f64::abs));

    let status = match Direction::of(source, "batteryDirection") {
        Some(Direction::Positive) => Some(BatteryStatus::Discharging),
        Some(Direction::Negative) => Some(BatteryStatus::Charging),
        Some(Direction::Neutral) => Some(BatteryStatus::Standby),
        None => power.map(|p| {
            if p > 0.0 {
                BatteryStatus::Discharging
            } else if p < 0.0 {
                BatteryStatus::Charging
            } else {
                BatteryStatus::Standby
            }
        }),
    };

    if let Some(status) = status {
        record.set("battery_status_calculated", ProcessedValue::Battery(status));
    }
}
