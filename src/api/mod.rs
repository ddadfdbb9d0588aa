pub mod endpoint;
pub mod error;
pub mod payload;
pub mod response;

use crate::model::{self, LoadMonitoring, RawSource};
use chrono::{Duration as ChronoDuration, Local, Utc};
pub use error::Error;
use reqwest::Response;
use response::access_token::AccessToken;
use response::load_monitoring::SecData;
use response::Envelope;
use serde_json::Value;
use std::time::{Duration, Instant};

const ACCESS_TOKEN_HEADER: &str = "accessToken";
const LANGUAGE_HEADER: &str = "content-language";
const LANGUAGE: &str = "en_US";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Token lifetime assumed when the token response carries no `expires`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(2 * 60 * 60);
/// History and load-monitoring requests look this far back.
const RECENT_WINDOW_MINUTES: i64 = 60;
/// `msg` fragment returned for plants without a load monitor; not an error.
const LOAD_MONITOR_NOT_BOUND: &str = "not bound";

pub fn api(
    api_url: String,
    app_id: String,
    app_secret: String,
    timeout: Duration,
) -> Result<model::Api, Error> {
    let client = reqwest::ClientBuilder::new()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Unknown(format!("Unable to build HTTP client: {}", e)))?;

    Ok(model::Api {
        api_url,
        app_id,
        app_secret,
        client,
    })
}

/// Map transport-level failures (including non-2xx statuses) to Error
fn map_transport_err(error: reqwest::Error) -> Error {
    match error.status() {
        Some(http::StatusCode::UNAUTHORIZED) | Some(http::StatusCode::FORBIDDEN) => {
            Error::Auth(error.to_string())
        }
        _ if error.is_timeout() => Error::Comm(format!("Request timed out: {}", error)),
        _ => Error::Comm(error.to_string()),
    }
}

async fn get(
    api: &model::Api,
    endpoint: &endpoint::Endpoint,
    token: Option<&str>,
    query: &[(&str, String)],
) -> Result<Envelope, Error> {
    let url = format!("{}{}", api.api_url, endpoint);

    let mut request = api
        .client
        .get(url)
        .query(query)
        .header(LANGUAGE_HEADER, LANGUAGE);
    if let Some(token) = token {
        request = request.header(ACCESS_TOKEN_HEADER, token);
    }

    let response_text = request
        .send()
        .await
        .and_then(Response::error_for_status)
        .map_err(map_transport_err)?
        .text()
        .await
        .map_err(|e| Error::Comm(format!("Error reading API response: {}", e)))?;

    log::trace!("endpoint: {}, response_text: {}", endpoint, response_text);

    serde_json::from_str::<Envelope>(&response_text)
        .map_err(|e| Error::InvalidResponse(response_text, e.to_string()))
}

/// Payload of a successful envelope, or the vendor's message as an error.
fn data_of(envelope: Envelope) -> Result<Value, Error> {
    if envelope.is_success() {
        Ok(envelope.data)
    } else {
        Err(Error::DataUnavailable(format!(
            "API error {}: {}",
            envelope
                .code
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_default(),
            envelope.message()
        )))
    }
}

/// Failures of a single source are logged and reported as absence.
fn logged<T>(result: Result<Option<T>, Error>, source: &str, id: &str) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::error!("Failed to get {} for {}: {}", source, id, e);
            None
        }
    }
}

fn recent_window() -> (String, String) {
    let end = Local::now();
    let start = end - ChronoDuration::minutes(RECENT_WINDOW_MINUTES);
    (
        start.format(TIMESTAMP_FORMAT).to_string(),
        end.format(TIMESTAMP_FORMAT).to_string(),
    )
}

/// Request a fresh access token for the configured credential pair.
pub async fn access_token(api: &model::Api) -> Result<model::Token, Error> {
    let query = [
        ("appId", api.app_id.to_owned()),
        ("appSecret", api.app_secret.to_owned()),
    ];

    let envelope = get(api, endpoint::ACCESS_TOKEN, None, &query)
        .await
        .map_err(|e| match e {
            Error::InvalidResponse(body, reason) => {
                Error::Auth(format!("Invalid token response ({}): {}", reason, body))
            }
            e => e,
        })?;

    let msg = envelope.message().to_string();
    let token: AccessToken = serde_json::from_value(envelope.data).map_err(|e| {
        log::error!("Invalid token response: {} ({})", msg, e);
        Error::Auth(format!("Invalid token response: {}", msg))
    })?;

    let lifetime = token
        .expires
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TOKEN_LIFETIME);

    Ok(model::Token {
        access_token: token.access_token,
        expires_at: Instant::now() + lifetime,
    })
}

async fn try_device_info(
    api: &model::Api,
    token: &str,
    device_sn: &str,
) -> Result<Option<RawSource>, Error> {
    let query = [("deviceSn", device_sn.to_owned())];
    let data = data_of(get(api, endpoint::DEVICE_INFO, Some(token), &query).await?)?;
    Ok(Some(payload::object(data)))
}

/// Nameplate and firmware metadata of a device.
pub async fn device_info(api: &model::Api, token: &str, device_sn: &str) -> Option<RawSource> {
    logged(
        try_device_info(api, token, device_sn).await,
        "device info",
        device_sn,
    )
}

async fn try_plant_statistics(
    api: &model::Api,
    token: &str,
    plant_id: &str,
) -> Result<Option<RawSource>, Error> {
    let query = [
        ("plantId", plant_id.to_owned()),
        ("clientDate", Utc::now().format(TIMESTAMP_FORMAT).to_string()),
    ];
    let data = data_of(get(api, endpoint::PLANT_STATISTICS, Some(token), &query).await?)?;
    Ok(Some(payload::object(data)).filter(|stats| !stats.is_empty()))
}

/// Plant-level cumulative and environmental figures.
pub async fn plant_statistics(api: &model::Api, token: &str, plant_id: &str) -> Option<RawSource> {
    logged(
        try_plant_statistics(api, token, plant_id).await,
        "plant statistics",
        plant_id,
    )
}

async fn try_history_point(
    api: &model::Api,
    token: &str,
    device: &model::Device,
) -> Result<Option<RawSource>, Error> {
    let (start, end) = recent_window();
    let query = [
        ("deviceSn", device.sn.to_owned()),
        ("startTime", start),
        ("endTime", end),
    ];
    let data = data_of(get(api, endpoint::HISTORY_DATA, Some(token), &query).await?)?;

    let points = match data {
        Value::Array(points) => points,
        Value::Null => Vec::new(),
        other => {
            return Err(Error::InvalidResponse(
                other.to_string(),
                String::from("history data is not a list"),
            ))
        }
    };

    /* An empty window is a valid answer: the inverter logged nothing recently */
    let latest = points
        .into_iter()
        .map(payload::object)
        .max_by(|a, b| payload::text(a, "dataTime").cmp(&payload::text(b, "dataTime")))
        .unwrap_or_default();

    log::debug!(
        "Using history point of {} (plant {}): {:?}",
        device.sn,
        device.plant_id,
        payload::text(&latest, "dataTime")
    );
    Ok(Some(latest))
}

/// Most recent sample of the device's history log within the last hour.
///
/// `Some` of an empty map means the log had no samples, which is normal at night.
pub async fn history_point(
    api: &model::Api,
    token: &str,
    device: &model::Device,
) -> Option<RawSource> {
    logged(
        try_history_point(api, token, device).await,
        "history data",
        &device.sn,
    )
}

async fn try_realtime_point(
    api: &model::Api,
    token: &str,
    device_sn: &str,
) -> Result<Option<RawSource>, Error> {
    let query = [("deviceSn", device_sn.to_owned())];
    let data = data_of(get(api, endpoint::REALTIME_DATA, Some(token), &query).await?)?;
    Ok(Some(payload::object(data)))
}

/// Live sample including the `isOnline` flag.
pub async fn realtime_point(api: &model::Api, token: &str, device_sn: &str) -> Option<RawSource> {
    logged(
        try_realtime_point(api, token, device_sn).await,
        "realtime data",
        device_sn,
    )
}

async fn try_load_monitoring_window(
    api: &model::Api,
    token: &str,
    plant_id: &str,
) -> Result<Option<LoadMonitoring>, Error> {
    let (start, end) = recent_window();
    let query = [
        ("plantId", plant_id.to_owned()),
        ("startTime", start),
        ("endTime", end),
        ("timeUnit", String::from("0")),
    ];
    let envelope = get(api, endpoint::LOAD_MONITORING, Some(token), &query).await?;

    if !envelope.is_success()
        && envelope
            .message()
            .to_ascii_lowercase()
            .contains(LOAD_MONITOR_NOT_BOUND)
    {
        log::debug!("No load monitor bound to plant {}", plant_id);
        return Ok(None);
    }

    let sec_data: SecData = serde_json::from_value(data_of(envelope)?)
        .map_err(|e| Error::InvalidResponse(String::from("secData"), e.to_string()))?;
    Ok(sec_data.into_window())
}

/// Latest load-monitor sample plus today's totals for the plant.
pub async fn load_monitoring_window(
    api: &model::Api,
    token: &str,
    plant_id: &str,
) -> Option<LoadMonitoring> {
    logged(
        try_load_monitoring_window(api, token, plant_id).await,
        "load monitoring data",
        plant_id,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{Device, DeviceType};
    use mockito::{Matcher, Server};
    use std::fs;
    use std::path::PathBuf;

    fn read_resource(filename: &str) -> String {
        let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push(format!("resources/test/{}", filename));
        fs::read_to_string(d.as_path()).unwrap()
    }

    fn path(endpoint: &str) -> Matcher {
        Matcher::Regex(format!("^{}", endpoint))
    }

    fn test_api(url: String) -> model::Api {
        api(
            url,
            "app".to_string(),
            "secret".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn solar() -> Device {
        Device {
            sn: "R6X2203J2333E06123".to_string(),
            plant_id: "P1".to_string(),
            name: "Roof".to_string(),
            device_type: DeviceType::Solar,
        }
    }

    #[tokio::test]
    async fn token_request_carries_credentials() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", path(endpoint::ACCESS_TOKEN))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("appId".into(), "app".into()),
                Matcher::UrlEncoded("appSecret".into(), "secret".into()),
            ]))
            .match_header("content-language", "en_US")
            .with_status(200)
            .with_body(read_resource("accessToken.json"))
            .create_async()
            .await;

        let token = access_token(&test_api(server.url())).await.unwrap();
        assert_eq!("0f9c2e4b7d1a4c3e", token.access_token);
        assert!(token.is_fresh(Duration::from_secs(28000)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn token_missing_is_auth_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", path(endpoint::ACCESS_TOKEN))
            .with_status(200)
            .with_body(read_resource("accessToken_missing.json"))
            .create_async()
            .await;

        match access_token(&test_api(server.url())).await {
            Err(Error::Auth(msg)) => assert!(msg.contains("appId or appSecret error")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn token_garbage_is_auth_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", path(endpoint::ACCESS_TOKEN))
            .with_status(200)
            .with_body(read_resource("invalid_json.json"))
            .create_async()
            .await;

        assert!(matches!(
            access_token(&test_api(server.url())).await,
            Err(Error::Auth(_))
        ));
    }

    #[tokio::test]
    async fn token_transport_failure_is_comm_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", path(endpoint::ACCESS_TOKEN))
            .with_status(500)
            .create_async()
            .await;

        assert!(matches!(
            access_token(&test_api(server.url())).await,
            Err(Error::Comm(_))
        ));
    }

    #[tokio::test]
    async fn fetchers_send_token_header() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", path(endpoint::REALTIME_DATA))
            .match_header("accessToken", "tok")
            .match_query(Matcher::UrlEncoded("deviceSn".into(), "AS1".into()))
            .with_status(200)
            .with_body(read_resource("realtimeDataCommon_battery.json"))
            .create_async()
            .await;

        let realtime = realtime_point(&test_api(server.url()), "tok", "AS1")
            .await
            .unwrap();
        assert_eq!(Some(77.0), payload::number(&realtime, "batEnergyPercent"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn history_picks_latest_point() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", path(endpoint::HISTORY_DATA))
            .with_status(200)
            .with_body(read_resource("historyDataCommon.json"))
            .create_async()
            .await;

        let point = history_point(&test_api(server.url()), "tok", &solar())
            .await
            .unwrap();
        assert_eq!(Some("2026-06-01 12:55:00"), payload::text(&point, "dataTime"));
        assert_eq!(Some(1200.0), payload::number(&point, "pv1power"));
    }

    #[tokio::test]
    async fn empty_history_is_present_but_empty() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", path(endpoint::HISTORY_DATA))
            .with_status(200)
            .with_body(r#"{"code": 200, "msg": "success", "data": []}"#)
            .create_async()
            .await;

        let point = history_point(&test_api(server.url()), "tok", &solar()).await;
        assert_eq!(Some(RawSource::new()), point);
    }

    #[tokio::test]
    async fn api_error_is_absence() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", path(endpoint::HISTORY_DATA))
            .with_status(200)
            .with_body(r#"{"code": 500, "msg": "system busy"}"#)
            .create_async()
            .await;
        server
            .mock("GET", path(endpoint::PLANT_STATISTICS))
            .with_status(502)
            .create_async()
            .await;

        let api = test_api(server.url());
        assert_eq!(None, history_point(&api, "tok", &solar()).await);
        assert_eq!(None, plant_statistics(&api, "tok", "P1").await);
    }

    #[tokio::test]
    async fn load_monitor_not_bound_is_absence() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", path(endpoint::LOAD_MONITORING))
            .with_status(200)
            .with_body(r#"{"code": 10010, "msg": "The plant is not bound to a load monitor"}"#)
            .create_async()
            .await;

        assert_eq!(
            None,
            load_monitoring_window(&test_api(server.url()), "tok", "P1").await
        );
    }

    #[tokio::test]
    async fn load_monitoring_window_uses_minute_data() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", path(endpoint::LOAD_MONITORING))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("plantId".into(), "P1".into()),
                Matcher::UrlEncoded("timeUnit".into(), "0".into()),
            ]))
            .with_status(200)
            .with_body(read_resource("secData.json"))
            .create_async()
            .await;

        let window = load_monitoring_window(&test_api(server.url()), "tok", "P1")
            .await
            .unwrap();
        assert_eq!(Some(310.0), payload::number(&window.latest, "loadPower"));
        assert_eq!(Some(1.36), payload::number(&window.total, "sellEnergy"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn plant_statistics_and_device_info() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", path(endpoint::PLANT_STATISTICS))
            .match_query(Matcher::UrlEncoded("plantId".into(), "P1".into()))
            .with_status(200)
            .with_body(read_resource("getPlantStatisticsData.json"))
            .create_async()
            .await;
        server
            .mock("GET", path(endpoint::DEVICE_INFO))
            .with_status(200)
            .with_body(read_resource("batInfo.json"))
            .create_async()
            .await;

        let api = test_api(server.url());
        let stats = plant_statistics(&api, "tok", "P1").await.unwrap();
        assert_eq!(Some(3650.0), payload::number(&stats, "yearPvEnergy"));
        let info = device_info(&api, "tok", "R6").await.unwrap();
        assert!(info.contains_key("deviceInfo"));
    }
}
