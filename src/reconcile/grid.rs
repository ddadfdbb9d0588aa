use super::Direction;
use crate::api::payload;
use crate::model::{GridStatus, LoadMonitoring, ProcessedRecord, ProcessedValue, RawSource};

const PHASES: [&str; 3] = ["r", "s", "t"];

/* (record suffix, vendor suffix) */
const PHASE_FIELDS: [(&str, &str); 4] = [
    ("power", "GridPowerWatt"),
    ("voltage", "GridVolt"),
    ("current", "GridCurr"),
    ("frequency", "GridFreq"),
];

/// Net grid power from the load monitor's meter, positive when importing.
pub fn net_from_load_monitor(window: &LoadMonitoring) -> Option<f64> {
    let buy = payload::number(&window.latest, "buyPower");
    let sell = payload::number(&window.latest, "sellPower");
    if buy.is_none() && sell.is_none() {
        return None;
    }
    Some(buy.unwrap_or(0.0) - sell.unwrap_or(0.0))
}

/// Net grid power from a device sample, positive when importing.
///
/// `gridDirection` 1 means exporting and -1 importing; the power field then only carries the
/// magnitude. Without a direction the power field is taken as already signed.
pub fn net_from_device(source: &RawSource) -> Option<f64> {
    let power = payload::number(source, "sysGridPowerWatt")
        .or_else(|| payload::number(source, "totalGridPowerWatt"))?;

    Some(match Direction::of(source, "gridDirection") {
        Some(Direction::Positive) => -power.abs(),
        Some(Direction::Negative) => power.abs(),
        Some(Direction::Neutral) => 0.0,
        None => power,
    })
}

pub fn reconcile(
    record: &mut ProcessedRecord,
    load_monitoring: Option<&LoadMonitoring>,
    source: &RawSource,
) {
    let net = load_monitoring
        .and_then(net_from_load_monitor)
        .or_else(|| net_from_device(source));

    if let Some(net) = net {
        /* no negative zero */
        let net = if net == 0.0 { 0.0 } else { net };
        record.set_number("grid_power_net", net);
        record.set_number("grid_power_abs", net.abs());
        record.set(
            "grid_status_calculated",
            ProcessedValue::Grid(GridStatus::from_net(net)),
        );
    }
}

/// Per-phase grid readings; zeros are treated as "not reported" outside nighttime.
pub fn phases(record: &mut ProcessedRecord, source: &RawSource, nighttime: bool) {
    let mut total: Option<f64> = None;

    for phase in PHASES.iter() {
        for (name, vendor) in PHASE_FIELDS.iter() {
            let key = format!("{}_phase_{}", phase, name);
            if nighttime {
                record.set_number(key, 0.0);
                continue;
            }

            if let Some(value) = payload::nonzero(source, &format!("{}{}", phase, vendor)) {
                record.set_number(key, value);
                if *name == "power" {
                    total = Some(total.unwrap_or(0.0) + value);
                }
            }
        }
    }

    if nighttime {
        record.set_number("total_phase_power", 0.0);
    } else {
        record.set_opt("total_phase_power", total);
    }
}
