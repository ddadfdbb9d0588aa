use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Vendor field map exactly as received, one per fetched source.
pub type RawSource = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Solar,
    Battery,
    /// Any tag other than `solar`/`battery`; reconciled from history data.
    Other(String),
}

impl DeviceType {
    pub fn as_str(&self) -> &str {
        match self {
            DeviceType::Solar => "solar",
            DeviceType::Battery => "battery",
            DeviceType::Other(tag) => tag,
        }
    }
}

impl From<&str> for DeviceType {
    fn from(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "solar" => DeviceType::Solar,
            "battery" => DeviceType::Battery,
            other => DeviceType::Other(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for DeviceType {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(d)?;
        Ok(DeviceType::from(tag.as_str()))
    }
}

impl Serialize for DeviceType {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

/// Monitored unit, as configured by the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Device {
    pub sn: String,
    pub plant_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
}

#[derive(Debug, Clone)]
pub struct Api {
    pub api_url: String,
    pub app_id: String,
    pub app_secret: String,
    pub client: reqwest::Client,
}

#[derive(Clone)]
pub struct Token {
    pub access_token: String,
    pub expires_at: Instant,
}

impl Token {
    /// True while more than `margin` of the token lifetime remains.
    pub fn is_fresh(&self, margin: Duration) -> bool {
        self.expires_at
            .checked_duration_since(Instant::now())
            .map(|remaining| remaining > margin)
            .unwrap_or(false)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Plant-level metering window: latest sample plus same-day totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadMonitoring {
    pub latest: RawSource,
    pub total: RawSource,
    pub module_sn: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Realtime,
    History,
    Nighttime,
}

impl SourceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceMode::Realtime => "realtime",
            SourceMode::History => "history",
            SourceMode::Nighttime => "nighttime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GridStatus {
    Importing,
    Exporting,
    Idle,
}

impl GridStatus {
    /// Positive net power is drawn from the grid.
    pub fn from_net(net: f64) -> Self {
        if net > 0.0 {
            GridStatus::Importing
        } else if net < 0.0 {
            GridStatus::Exporting
        } else {
            GridStatus::Idle
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GridStatus::Importing => "importing",
            GridStatus::Exporting => "exporting",
            GridStatus::Idle => "idle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BatteryStatus {
    Charging,
    Discharging,
    Standby,
}

impl BatteryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BatteryStatus::Charging => "Charging",
            BatteryStatus::Discharging => "Discharging",
            BatteryStatus::Standby => "Standby",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProcessedValue {
    Number(f64),
    Grid(GridStatus),
    Battery(BatteryStatus),
    Mode(SourceMode),
}

impl ProcessedValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ProcessedValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// Reconciled per-device output. Only finite numbers and fixed-vocabulary statuses get in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProcessedRecord(BTreeMap<String, ProcessedValue>);

impl ProcessedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-finite values are dropped so the field stays absent.
    pub fn set_number<K: Into<String>>(&mut self, key: K, value: f64) {
        if value.is_finite() {
            self.0.insert(key.into(), ProcessedValue::Number(value));
        }
    }

    pub fn set_opt<K: Into<String>>(&mut self, key: K, value: Option<f64>) {
        if let Some(value) = value {
            self.set_number(key, value);
        }
    }

    pub fn set(&mut self, key: &str, value: ProcessedValue) {
        if let ProcessedValue::Number(v) = value {
            self.set_number(key, v);
        } else {
            self.0.insert(key.to_string(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&ProcessedValue> {
        self.0.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(ProcessedValue::as_f64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn grid_status(&self) -> Option<GridStatus> {
        match self.0.get("grid_status_calculated") {
            Some(ProcessedValue::Grid(status)) => Some(*status),
            _ => None,
        }
    }

    pub fn battery_status(&self) -> Option<BatteryStatus> {
        match self.0.get("battery_status_calculated") {
            Some(ProcessedValue::Battery(status)) => Some(*status),
            _ => None,
        }
    }

    pub fn source_mode(&self) -> Option<SourceMode> {
        match self.0.get("source_mode") {
            Some(ProcessedValue::Mode(mode)) => Some(*mode),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProcessedValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything known about one device after one polling cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub device_info: Option<RawSource>,
    pub plant_stats: Option<RawSource>,
    pub history_data: Option<RawSource>,
    pub realtime_data: Option<RawSource>,
    pub load_monitoring: Option<LoadMonitoring>,
    pub device_type: DeviceType,
    pub processed_data: ProcessedRecord,
}
