//! Display-side derivations over a [`DeviceSnapshot`].
//!
//! Nothing here feeds back into the processed record: unit conversions and signed display
//! values are computed on the way out.

use crate::model::{BatteryStatus, DeviceSnapshot, DeviceType, ProcessedRecord, SourceMode};
use crate::selection;
use serde::Serialize;

const KG_PER_TONNE: f64 = 1000.0;

/// Grid power for display, positive when importing.
pub fn grid_power(record: &ProcessedRecord) -> Option<f64> {
    record.number("grid_power_net")
}

/// Battery power for display, positive when discharging.
pub fn battery_power(record: &ProcessedRecord) -> Option<f64> {
    let power = record.number("battery_power_abs")?;
    Some(match record.battery_status()? {
        BatteryStatus::Discharging => power,
        BatteryStatus::Charging => -power,
        BatteryStatus::Standby => 0.0,
    })
}

pub fn co2_reduction_kg(record: &ProcessedRecord) -> Option<f64> {
    record.number("co2_reduction").map(|t| t * KG_PER_TONNE)
}

/// Lifetime discharge over lifetime charge, in percent with two decimals.
pub fn round_trip_efficiency(record: &ProcessedRecord) -> Option<f64> {
    let charge = record.number("total_battery_charge").filter(|c| *c > 0.0)?;
    let discharge = record.number("total_battery_discharge")?;
    Some((discharge / charge * 100.0 * 100.0).round() / 100.0)
}

pub fn operating_status_label(code: i64) -> String {
    let label = match code {
        0 => "Initialization",
        1 => "Waiting (Standby)",
        2 => "Grid connected mode (Generating)",
        3 => "Off grid mode (Battery)",
        4 => "Grid load mode (Storage)",
        5 => "Fault",
        6 => "Upgrade",
        7 => "Debugging",
        8 => "Self inspection",
        9 => "Reset",
        _ => return format!("Unknown status ({})", code),
    };
    label.to_string()
}

pub fn operating_mode_label(code: i64) -> String {
    let label = match code {
        0 => "Unknown",
        1 => "Backup Mode",
        2 => "Self-Consumption Mode",
        3 => "Time-of-Use Mode",
        4 => "Export Limitation Mode",
        _ => return format!("Unknown mode ({})", code),
    };
    label.to_string()
}

/// A solar inverter asleep because it is dark, as decided when its sources were selected.
pub fn is_nighttime(snapshot: &DeviceSnapshot) -> bool {
    snapshot.device_type == DeviceType::Solar
        && snapshot.processed_data.source_mode() == Some(SourceMode::Nighttime)
}

pub fn is_online(snapshot: &DeviceSnapshot) -> bool {
    let reported = snapshot
        .realtime_data
        .as_ref()
        .map_or(false, selection::is_online);

    reported
        || (snapshot.device_type == DeviceType::Battery
            && snapshot.processed_data.contains_key("battery_level"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub online: bool,
    pub nighttime: bool,
    pub note: Option<&'static str>,
    pub operating_status: Option<String>,
    pub operating_mode: String,
    pub last_update_time: Option<String>,
}

pub fn status(snapshot: &DeviceSnapshot) -> DeviceStatus {
    let record = &snapshot.processed_data;
    let online = is_online(snapshot);
    let nighttime = is_nighttime(snapshot);

    let note = if nighttime {
        Some("Solar inverter is in sleep mode (normal during nighttime)")
    } else if snapshot.device_type == DeviceType::Battery && !online {
        Some("Battery system appears to be disconnected")
    } else {
        None
    };

    DeviceStatus {
        online,
        nighttime,
        note,
        operating_status: record
            .number("operating_status")
            .map(|code| operating_status_label(code as i64)),
        operating_mode: operating_mode_label(
            record.number("operating_mode").map_or(0, |code| code as i64),
        ),
        last_update_time: snapshot
            .realtime_data
            .as_ref()
            .and_then(|realtime| crate::api::payload::text(realtime, "recordTime"))
            .map(str::to_string),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::payload::object;
    use crate::model::{LoadMonitoring, ProcessedValue};
    use serde_json::json;

    fn snapshot(device_type: DeviceType, record: ProcessedRecord) -> DeviceSnapshot {
        DeviceSnapshot {
            device_info: None,
            plant_stats: None,
            history_data: None,
            realtime_data: None,
            load_monitoring: None,
            device_type,
            processed_data: record,
        }
    }

    #[test]
    fn battery_power_sign() {
        let mut record = ProcessedRecord::new();
        record.set_number("battery_power_abs", 200.0);
        record.set(
            "battery_status_calculated",
            ProcessedValue::Battery(BatteryStatus::Charging),
        );
        assert_eq!(Some(-200.0), battery_power(&record));

        record.set(
            "battery_status_calculated",
            ProcessedValue::Battery(BatteryStatus::Standby),
        );
        assert_eq!(Some(0.0), battery_power(&record));
    }

    #[test]
    fn co2_in_kg() {
        let mut record = ProcessedRecord::new();
        record.set_number("co2_reduction", 6.42);
        assert!((co2_reduction_kg(&record).unwrap() - 6420.0).abs() < 1e-9);
        /* the record keeps tonnes */
        assert_eq!(Some(6.42), record.number("co2_reduction"));
    }

    #[test]
    fn efficiency_needs_charge() {
        let mut record = ProcessedRecord::new();
        record.set_number("total_battery_discharge", 812.0);
        assert_eq!(None, round_trip_efficiency(&record));

        record.set_number("total_battery_charge", 0.0);
        assert_eq!(None, round_trip_efficiency(&record));

        record.set_number("total_battery_charge", 903.0);
        assert_eq!(Some(89.92), round_trip_efficiency(&record));
    }

    #[test]
    fn labels() {
        assert_eq!("Grid connected mode (Generating)", operating_status_label(2));
        assert_eq!("Unknown status (42)", operating_status_label(42));
        assert_eq!("Self-Consumption Mode", operating_mode_label(2));
        assert_eq!("Unknown mode (-1)", operating_mode_label(-1));
    }

    #[test]
    fn nighttime_comes_from_source_mode() {
        let mut record = ProcessedRecord::new();
        record.set("source_mode", ProcessedValue::Mode(SourceMode::Nighttime));
        /* a producing array does not override the selected mode */
        record.set_number("total_pv_power_calculated", 1.0);
        let mut solar = snapshot(DeviceType::Solar, record);
        solar.load_monitoring = Some(LoadMonitoring::default());

        let status = status(&solar);
        assert!(status.nighttime);
        assert!(!status.online);
        assert!(status.note.is_some());
        assert_eq!("Unknown", status.operating_mode);
    }

    #[test]
    fn online_status() {
        let mut solar = snapshot(DeviceType::Solar, ProcessedRecord::new());
        solar.realtime_data = Some(object(json!({"isOnline": "1", "recordTime": "2026-06-01 12:55:00"})));
        let status = status(&solar);
        assert!(status.online);
        assert_eq!(Some("2026-06-01 12:55:00".to_string()), status.last_update_time);

        let mut record = ProcessedRecord::new();
        record.set_number("battery_level", 77.0);
        let mut battery = snapshot(DeviceType::Battery, record);
        battery.realtime_data = Some(object(json!({"isOnline": "0"})));
        assert!(is_online(&battery));

        let disconnected = snapshot(DeviceType::Battery, ProcessedRecord::new());
        assert_eq!(
            Some("Battery system appears to be disconnected"),
            super::status(&disconnected).note
        );
    }
}
