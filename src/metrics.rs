use prometheus::{Encoder, Gauge, GaugeVec, TextEncoder};
use saj_monitor::api;
use saj_monitor::coordinator::DeviceData;
use saj_monitor::exposure;
use saj_monitor::model::{BatteryStatus, DeviceSnapshot, GridStatus};
use std::sync::{Mutex, MutexGuard, PoisonError};

lazy_static! {
    /* held by `publish` across reset and refill, and by `read` while gathering */
    static ref PUBLISH_LOCK: Mutex<()> = Mutex::new(());
    static ref LAST_UPDATE_SUCCESS_GAUGE: Gauge = register_gauge!(opts!(
        "saj_last_update_success",
        "1 when the last polling cycle published data, 0 otherwise",
    ))
    .unwrap();
    static ref DEVICE_METRIC_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "saj_device_metric",
            "reconciled numeric device field, named by the metric label",
        ),
        &["device_sn", "device_type", "metric"],
    )
    .unwrap();
    static ref GRID_STATUS_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("saj_grid_status", "1 for the current grid flow direction"),
        &["device_sn", "status"],
    )
    .unwrap();
    static ref BATTERY_STATUS_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("saj_battery_status", "1 for the current battery state"),
        &["device_sn", "status"],
    )
    .unwrap();
    static ref GRID_POWER_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("saj_grid_power_watts", "grid power, positive when importing"),
        &["device_sn"],
    )
    .unwrap();
    static ref BATTERY_POWER_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "saj_battery_power_watts",
            "battery power, positive when discharging",
        ),
        &["device_sn"],
    )
    .unwrap();
    static ref CO2_REDUCTION_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("saj_co2_reduction_kg", "lifetime CO2 reduction of the plant"),
        &["device_sn"],
    )
    .unwrap();
    static ref EFFICIENCY_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "saj_battery_round_trip_efficiency_percent",
            "lifetime battery discharge over charge",
        ),
        &["device_sn"],
    )
    .unwrap();
    static ref ONLINE_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("saj_device_online", "device connectivity"),
        &["device_sn", "device_type"],
    )
    .unwrap();
    static ref NIGHTTIME_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("saj_device_nighttime", "1 while a solar inverter sleeps"),
        &["device_sn"],
    )
    .unwrap();
    static ref OPERATING_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("saj_device_operating_info", "operating status and mode labels"),
        &["device_sn", "status", "mode"],
    )
    .unwrap();
}

const GRID_STATUSES: [GridStatus; 3] = [
    GridStatus::Importing,
    GridStatus::Exporting,
    GridStatus::Idle,
];

const BATTERY_STATUSES: [BatteryStatus; 3] = [
    BatteryStatus::Charging,
    BatteryStatus::Discharging,
    BatteryStatus::Standby,
];

fn exclusive() -> MutexGuard<'static, ()> {
    PUBLISH_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

fn bool_value(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn set_if(gauge: &GaugeVec, sn: &str, value: Option<f64>) {
    if let Some(value) = value {
        gauge.with_label_values(&[sn]).set(value);
    }
}

fn publish_device(sn: &str, snapshot: &DeviceSnapshot) {
    let record = &snapshot.processed_data;
    let device_type = snapshot.device_type.as_str();

    for (metric, value) in record.iter() {
        if let Some(value) = value.as_f64() {
            DEVICE_METRIC_GAUGE
                .with_label_values(&[sn, device_type, metric.as_str()])
                .set(value);
        }
    }

    if let Some(current) = record.grid_status() {
        for status in GRID_STATUSES.iter() {
            GRID_STATUS_GAUGE
                .with_label_values(&[sn, status.as_str()])
                .set(bool_value(*status == current));
        }
    }
    if let Some(current) = record.battery_status() {
        for status in BATTERY_STATUSES.iter() {
            BATTERY_STATUS_GAUGE
                .with_label_values(&[sn, status.as_str()])
                .set(bool_value(*status == current));
        }
    }

    set_if(&GRID_POWER_GAUGE, sn, exposure::grid_power(record));
    set_if(&BATTERY_POWER_GAUGE, sn, exposure::battery_power(record));
    set_if(&CO2_REDUCTION_GAUGE, sn, exposure::co2_reduction_kg(record));
    set_if(&EFFICIENCY_GAUGE, sn, exposure::round_trip_efficiency(record));

    let status = exposure::status(snapshot);
    ONLINE_GAUGE
        .with_label_values(&[sn, device_type])
        .set(bool_value(status.online));
    NIGHTTIME_GAUGE
        .with_label_values(&[sn])
        .set(bool_value(status.nighttime));
    OPERATING_GAUGE
        .with_label_values(&[
            sn,
            status.operating_status.as_deref().unwrap_or(""),
            status.operating_mode.as_str(),
        ])
        .set(1.0);
}

/// Replace all device gauges with the contents of `data`. Scrapes never observe the gauges
/// half-refilled.
pub fn publish(data: &DeviceData, last_update_success: bool) {
    let _guard = exclusive();
    LAST_UPDATE_SUCCESS_GAUGE.set(bool_value(last_update_success));

    for gauge in [
        &*DEVICE_METRIC_GAUGE,
        &*GRID_STATUS_GAUGE,
        &*BATTERY_STATUS_GAUGE,
        &*GRID_POWER_GAUGE,
        &*BATTERY_POWER_GAUGE,
        &*CO2_REDUCTION_GAUGE,
        &*EFFICIENCY_GAUGE,
        &*ONLINE_GAUGE,
        &*NIGHTTIME_GAUGE,
        &*OPERATING_GAUGE,
    ]
    .iter()
    {
        gauge.reset();
    }

    for (sn, snapshot) in data.iter() {
        publish_device(sn, snapshot);
    }
}

/// Read metrics from Prometheus exporter registry.
pub fn read() -> Result<String, api::Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = {
        let _guard = exclusive();
        prometheus::gather()
    };

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| api::Error::Unknown(format!("Unable to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| api::Error::Unknown(format!("Metrics are not valid UTF-8: {}", e)))
}
