//! Which fetched source is authoritative for a device this cycle.

use crate::api::{payload, Error};
use crate::model::{Device, DeviceType, LoadMonitoring, RawSource, SourceMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    DeviceInfo,
    PlantStats,
    HistoryPoint,
    RealtimePoint,
    LoadMonitoring,
}

const BATTERY_PLAN: &[SourceKind] = &[
    SourceKind::DeviceInfo,
    SourceKind::PlantStats,
    SourceKind::RealtimePoint,
    SourceKind::LoadMonitoring,
];

const SOLAR_PLAN: &[SourceKind] = &[
    SourceKind::DeviceInfo,
    SourceKind::PlantStats,
    SourceKind::RealtimePoint,
    SourceKind::HistoryPoint,
    SourceKind::LoadMonitoring,
];

const OTHER_PLAN: &[SourceKind] = &[
    SourceKind::DeviceInfo,
    SourceKind::PlantStats,
    SourceKind::HistoryPoint,
    SourceKind::LoadMonitoring,
];

/// Sources to fetch for a device, in request order.
pub fn fetch_plan(device_type: &DeviceType) -> &'static [SourceKind] {
    match device_type {
        DeviceType::Battery => BATTERY_PLAN,
        DeviceType::Solar => SOLAR_PLAN,
        DeviceType::Other(_) => OTHER_PLAN,
    }
}

/// Results of one cycle's fetches for one device; `None` means the source was unavailable.
#[derive(Debug, Clone, Default)]
pub struct FetchedSources {
    pub device_info: Option<RawSource>,
    pub plant_stats: Option<RawSource>,
    pub history: Option<RawSource>,
    pub realtime: Option<RawSource>,
    pub load_monitoring: Option<LoadMonitoring>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub mode: SourceMode,
    /// Empty in nighttime mode.
    pub primary: RawSource,
}

fn non_empty(source: &Option<RawSource>) -> Option<&RawSource> {
    source.as_ref().filter(|s| !s.is_empty())
}

pub fn is_online(realtime: &RawSource) -> bool {
    payload::flag(realtime, "isOnline") == Some(true)
}

pub fn select(device: &Device, sources: &FetchedSources) -> Result<Selection, Error> {
    match &device.device_type {
        DeviceType::Battery => non_empty(&sources.realtime)
            .map(|realtime| Selection {
                mode: SourceMode::Realtime,
                primary: realtime.clone(),
            })
            .ok_or_else(|| {
                Error::DataUnavailable(format!("no realtime data for battery {}", device.sn))
            }),
        DeviceType::Solar => select_solar(device, sources),
        DeviceType::Other(_) => non_empty(&sources.history)
            .map(|history| Selection {
                mode: SourceMode::History,
                primary: history.clone(),
            })
            .ok_or_else(|| {
                Error::DataUnavailable(format!("no history data for device {}", device.sn))
            }),
    }
}

fn select_solar(device: &Device, sources: &FetchedSources) -> Result<Selection, Error> {
    if let Some(realtime) = non_empty(&sources.realtime).filter(|r| is_online(r)) {
        log::debug!("{}: using realtime data (inverter online)", device.sn);
        return Ok(Selection {
            mode: SourceMode::Realtime,
            primary: realtime.clone(),
        });
    }

    if let Some(history) = non_empty(&sources.history) {
        log::debug!("{}: using history data", device.sn);
        return Ok(Selection {
            mode: SourceMode::History,
            primary: history.clone(),
        });
    }

    if sources.load_monitoring.is_none() {
        return Err(Error::DataUnavailable(format!(
            "no realtime, history or load monitoring data for {}",
            device.sn
        )));
    }

    log::debug!("{}: nighttime mode, relying on load monitoring", device.sn);
    Ok(Selection {
        mode: SourceMode::Nighttime,
        primary: RawSource::new(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::payload::object;
    use serde_json::json;

    fn device(device_type: DeviceType) -> Device {
        Device {
            sn: "SN1".to_string(),
            plant_id: "P1".to_string(),
            name: "Test".to_string(),
            device_type,
        }
    }

    fn window() -> LoadMonitoring {
        LoadMonitoring {
            latest: object(json!({"loadPower": "300"})),
            total: object(json!({"pvEnergy": "0"})),
            module_sn: "M1".to_string(),
        }
    }

    #[test]
    fn plans() {
        assert!(!fetch_plan(&DeviceType::Battery).contains(&SourceKind::HistoryPoint));
        assert!(fetch_plan(&DeviceType::Solar).contains(&SourceKind::HistoryPoint));
        assert!(fetch_plan(&DeviceType::Solar).contains(&SourceKind::RealtimePoint));
        assert!(!fetch_plan(&DeviceType::Other("x".into())).contains(&SourceKind::RealtimePoint));
    }

    #[test]
    fn battery_requires_realtime() {
        let battery = device(DeviceType::Battery);
        let sources = FetchedSources {
            load_monitoring: Some(window()),
            ..Default::default()
        };
        assert!(matches!(
            select(&battery, &sources),
            Err(Error::DataUnavailable(_))
        ));

        let sources = FetchedSources {
            realtime: Some(object(json!({"batPower": "200", "isOnline": "0"}))),
            ..Default::default()
        };
        let selection = select(&battery, &sources).unwrap();
        assert_eq!(SourceMode::Realtime, selection.mode);
        assert_eq!(Some(200.0), payload::number(&selection.primary, "batPower"));
    }

    #[test]
    fn solar_prefers_online_realtime() {
        let sources = FetchedSources {
            realtime: Some(object(json!({"isOnline": "1", "pv1power": "10"}))),
            history: Some(object(json!({"pv1power": "5"}))),
            ..Default::default()
        };
        let selection = select(&device(DeviceType::Solar), &sources).unwrap();
        assert_eq!(SourceMode::Realtime, selection.mode);
        assert_eq!(Some(10.0), payload::number(&selection.primary, "pv1power"));
    }

    #[test]
    fn solar_offline_realtime_falls_back_to_history() {
        let sources = FetchedSources {
            realtime: Some(object(json!({"isOnline": "0", "pv1power": "10"}))),
            history: Some(object(json!({"pv1power": "5"}))),
            ..Default::default()
        };
        let selection = select(&device(DeviceType::Solar), &sources).unwrap();
        assert_eq!(SourceMode::History, selection.mode);
        assert_eq!(Some(5.0), payload::number(&selection.primary, "pv1power"));
    }

    #[test]
    fn solar_nighttime_with_load_monitoring() {
        let sources = FetchedSources {
            realtime: Some(object(json!({"isOnline": "0"}))),
            history: Some(RawSource::new()),
            load_monitoring: Some(window()),
            ..Default::default()
        };
        let selection = select(&device(DeviceType::Solar), &sources).unwrap();
        assert_eq!(SourceMode::Nighttime, selection.mode);
        assert!(selection.primary.is_empty());
    }

    #[test]
    fn solar_without_anything_fails() {
        let sources = FetchedSources {
            plant_stats: Some(object(json!({"yearPvEnergy": "1"}))),
            ..Default::default()
        };
        assert!(matches!(
            select(&device(DeviceType::Solar), &sources),
            Err(Error::DataUnavailable(_))
        ));
    }

    #[test]
    fn other_requires_history() {
        let other = device(DeviceType::Other("meter".into()));
        assert!(select(&other, &FetchedSources::default()).is_err());

        let sources = FetchedSources {
            history: Some(object(json!({"totalPVPower": "42"}))),
            ..Default::default()
        };
        assert_eq!(SourceMode::History, select(&other, &sources).unwrap().mode);
    }
}
