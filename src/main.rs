#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use rocket::fairing::AdHoc;
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State};
use saj_monitor::coordinator::{Coordinator, DeviceData};
use saj_monitor::exposure::{self, DeviceStatus};
use saj_monitor::model::DeviceSnapshot;
use saj_monitor::{api, settings};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

mod metrics;

/// Structure containing state for API handlers.
pub struct StateData {
    coordinator: Arc<Coordinator>,
}

/// Poll at a fixed cadence; a slow cycle delays the next tick instead of overlapping it.
async fn poll(coordinator: Arc<Coordinator>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = coordinator.refresh().await {
            log::error!("Update failed: {}", e);
        }
        metrics::publish(&coordinator.data(), coordinator.last_update_success());
    }
}

#[get("/metrics")]
fn metrics_route() -> Result<String, api::Error> {
    metrics::read()
}

#[get("/devices")]
fn devices_route(state: &State<StateData>) -> Json<DeviceData> {
    Json(state.coordinator.data().as_ref().clone())
}

#[get("/devices/<sn>")]
fn device_route(state: &State<StateData>, sn: &str) -> Option<Json<DeviceSnapshot>> {
    state.coordinator.snapshot(sn).map(Json)
}

#[get("/devices/<sn>/status")]
fn device_status_route(state: &State<StateData>, sn: &str) -> Option<Json<DeviceStatus>> {
    state
        .coordinator
        .snapshot(sn)
        .map(|snapshot| Json(exposure::status(&snapshot)))
}

#[launch]
fn rocket() -> Rocket<Build> {
    env_logger::init();

    let settings = match settings::read_settings() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    let coordinator = match Coordinator::from_settings(&settings) {
        Ok(coordinator) => Arc::new(coordinator),
        Err(e) => {
            log::error!("Unable to set up API client: {}", e);
            std::process::exit(1);
        }
    };
    log::info!(
        "Polling {} devices every {}s",
        coordinator.devices().len(),
        settings.interval
    );

    let poller = Arc::clone(&coordinator);
    let interval = settings.interval();

    rocket::build()
        .manage(StateData { coordinator })
        .attach(AdHoc::on_liftoff("SAJ poller", move |_| {
            let poller = Arc::clone(&poller);
            Box::pin(async move {
                tokio::spawn(poll(poller, interval));
            })
        }))
        .mount(
            "/",
            routes![metrics_route, devices_route, device_route, device_status_route],
        )
}
