//! One polling cycle over every configured device.
//!
//! Devices are processed one after another, each fetch waiting for the previous one. The whole
//! cycle runs against a single deadline; devices not reached in time are skipped and whatever
//! completed is still published. The published mapping is replaced wholesale, never patched.

use crate::api::{self, Error};
use crate::model::{Api, Device, DeviceSnapshot};
use crate::reconcile::{reconcile, ReconcileInput};
use crate::selection::{self, FetchedSources, SourceKind};
use crate::settings::Settings;
use crate::token::TokenManager;
use chrono::Datelike;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

pub type DeviceData = HashMap<String, DeviceSnapshot>;

pub struct Coordinator {
    api: Api,
    tokens: TokenManager,
    devices: Vec<Device>,
    cycle_timeout: Duration,
    savings_rate: f64,
    data: RwLock<Arc<DeviceData>>,
    last_update_success: AtomicBool,
}

impl Coordinator {
    pub fn new(
        api: Api,
        tokens: TokenManager,
        devices: Vec<Device>,
        cycle_timeout: Duration,
        savings_rate: f64,
    ) -> Self {
        Coordinator {
            api,
            tokens,
            devices,
            cycle_timeout,
            savings_rate,
            data: RwLock::new(Arc::new(DeviceData::new())),
            last_update_success: AtomicBool::new(false),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, Error> {
        let api = api::api(
            settings.api_url.clone(),
            settings.app_id.clone(),
            settings.app_secret.clone(),
            settings.request_timeout(),
        )?;
        let tokens = TokenManager::new(settings.token_refresh_margin(), settings.cache_token);

        Ok(Coordinator::new(
            api,
            tokens,
            settings.devices.clone(),
            settings.cycle_timeout(),
            settings.savings_rate,
        ))
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Latest published mapping of serial number to snapshot.
    pub fn data(&self) -> Arc<DeviceData> {
        match self.data.read() {
            Ok(data) => Arc::clone(&data),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn snapshot(&self, sn: &str) -> Option<DeviceSnapshot> {
        self.data().get(sn).cloned()
    }

    /// Whether the most recent cycle published anything.
    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::Relaxed)
    }

    fn publish(&self, fresh: DeviceData) {
        match self.data.write() {
            Ok(mut data) => *data = Arc::new(fresh),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(fresh),
        }
    }

    /// Run one cycle. Returns the number of devices published.
    ///
    /// Fails without touching any device when no token can be obtained, and when no device
    /// produced data; the previously published mapping is kept in both cases.
    pub async fn refresh(&self) -> Result<usize, Error> {
        let result = self.run_cycle().await;
        self.last_update_success
            .store(result.is_ok(), Ordering::Relaxed);
        result
    }

    async fn run_cycle(&self) -> Result<usize, Error> {
        let deadline = Instant::now() + self.cycle_timeout;

        timeout_at(deadline, self.tokens.ensure_valid(&self.api))
            .await
            .map_err(|_| Error::Comm("Timed out requesting access token".to_string()))??;

        let day_of_year = chrono::Local::now().ordinal();
        let mut fresh = DeviceData::new();
        let mut timed_out = false;

        for device in &self.devices {
            match timeout_at(deadline, self.device_snapshot(device, day_of_year)).await {
                Ok(Ok(snapshot)) => {
                    fresh.insert(device.sn.clone(), snapshot);
                }
                Ok(Err(e)) => log::warn!("No data for device {} ({}): {}", device.name, device.sn, e),
                Err(_) => {
                    log::error!(
                        "Cycle deadline of {:?} reached at device {}; skipping remaining devices",
                        self.cycle_timeout,
                        device.sn
                    );
                    timed_out = true;
                    break;
                }
            }
        }

        if fresh.is_empty() {
            self.tokens.invalidate().await;
            return Err(if timed_out {
                Error::Comm("Polling cycle timed out before any device completed".to_string())
            } else {
                Error::DataUnavailable("No device returned data".to_string())
            });
        }

        let published = fresh.len();
        log::info!(
            "Updated {} of {} devices",
            published,
            self.devices.len()
        );
        self.publish(fresh);
        Ok(published)
    }

    async fn token(&self) -> Result<String, Error> {
        self.tokens.ensure_valid(&self.api).await
    }

    /// Fetch, select and reconcile one device.
    pub async fn device_snapshot(
        &self,
        device: &Device,
        day_of_year: u32,
    ) -> Result<DeviceSnapshot, Error> {
        let api = &self.api;
        let mut sources = FetchedSources::default();

        for kind in selection::fetch_plan(&device.device_type) {
            let token = self.token().await?;
            match kind {
                SourceKind::DeviceInfo => {
                    sources.device_info = api::device_info(api, &token, &device.sn).await
                }
                SourceKind::PlantStats => {
                    sources.plant_stats =
                        api::plant_statistics(api, &token, &device.plant_id).await
                }
                SourceKind::HistoryPoint => {
                    sources.history = api::history_point(api, &token, device).await
                }
                SourceKind::RealtimePoint => {
                    sources.realtime = api::realtime_point(api, &token, &device.sn).await
                }
                SourceKind::LoadMonitoring => {
                    sources.load_monitoring =
                        api::load_monitoring_window(api, &token, &device.plant_id).await
                }
            }
        }

        let selection = selection::select(device, &sources)?;
        let processed_data = reconcile(&ReconcileInput {
            device_type: &device.device_type,
            mode: selection.mode,
            primary: &selection.primary,
            plant_stats: sources.plant_stats.as_ref(),
            load_monitoring: sources.load_monitoring.as_ref(),
            day_of_year,
            savings_rate: self.savings_rate,
        });

        Ok(DeviceSnapshot {
            device_info: sources.device_info,
            plant_stats: sources.plant_stats,
            history_data: sources.history,
            realtime_data: sources.realtime,
            load_monitoring: sources.load_monitoring,
            device_type: device.device_type.clone(),
            processed_data,
        })
    }
}
