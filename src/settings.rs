use crate::model::Device;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::time::Duration;

pub const API_URL: &str = "https://intl-developer.saj-electric.com";

/// Environment variable naming the configuration file (without extension).
pub const CONFIG_FILE_VAR: &str = "SAJ_CONFIG";
const CONFIG_FILE: &str = "saj-monitor";
const ENV_PREFIX: &str = "SAJ";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_url: String,
    pub app_id: String,
    pub app_secret: String,
    /// Seconds between polling cycles.
    pub interval: u64,
    pub request_timeout: u64,
    pub cycle_timeout: u64,
    pub token_refresh_margin: u64,
    pub cache_token: bool,
    pub savings_rate: f64,
    pub devices: Vec<Device>,
}

impl Settings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout)
    }

    pub fn token_refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token_refresh_margin)
    }
}

fn with_defaults() -> Result<Config, ConfigError> {
    let mut settings = Config::default();
    settings
        .set_default("api_url", API_URL)?
        .set_default("interval", 300i64)?
        .set_default("request_timeout", 10i64)?
        .set_default("cycle_timeout", 30i64)?
        .set_default("token_refresh_margin", 3600i64)?
        .set_default("cache_token", true)?
        .set_default("savings_rate", crate::reconcile::DEFAULT_SAVINGS_RATE)?
        .set_default("devices", Vec::<config::Value>::new())?;
    Ok(settings)
}

fn finish(settings: Config) -> Result<Settings, ConfigError> {
    let settings: Settings = settings.try_into()?;

    if settings.app_id.trim().is_empty() || settings.app_secret.trim().is_empty() {
        return Err(ConfigError::Message(
            "app_id and app_secret must not be empty".to_string(),
        ));
    }
    for (key, value) in &[
        ("interval", settings.interval),
        ("request_timeout", settings.request_timeout),
        ("cycle_timeout", settings.cycle_timeout),
    ] {
        if *value == 0 {
            return Err(ConfigError::Message(format!("{} must be positive", key)));
        }
    }
    if let Some(device) = settings.devices.iter().find(|d| d.sn.trim().is_empty()) {
        return Err(ConfigError::Message(format!(
            "device '{}' has an empty serial number",
            device.name
        )));
    }
    if settings.devices.is_empty() {
        log::warn!("No devices configured; nothing will be polled");
    }

    Ok(settings)
}

/// Optional config file, then `SAJ_*` environment variables on top.
pub fn read_settings() -> Result<Settings, ConfigError> {
    let file = std::env::var(CONFIG_FILE_VAR).unwrap_or_else(|_| CONFIG_FILE.to_string());

    let mut settings = with_defaults()?;
    settings
        .merge(File::with_name(&file).required(false))?
        .merge(Environment::with_prefix(ENV_PREFIX))?;

    finish(settings)
}

/// Settings from a TOML document alone, ignoring the environment.
pub fn parse_settings(toml: &str) -> Result<Settings, ConfigError> {
    let mut settings = with_defaults()?;
    settings.merge(File::from_str(toml, FileFormat::Toml))?;
    finish(settings)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::DeviceType;

    #[test]
    fn defaults() {
        let settings = parse_settings(
            r#"
            app_id = "app"
            app_secret = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(API_URL, settings.api_url);
        assert_eq!(Duration::from_secs(300), settings.interval());
        assert_eq!(Duration::from_secs(10), settings.request_timeout());
        assert_eq!(Duration::from_secs(30), settings.cycle_timeout());
        assert_eq!(Duration::from_secs(3600), settings.token_refresh_margin());
        assert!(settings.cache_token);
        assert_eq!(0.15, settings.savings_rate);
        assert!(settings.devices.is_empty());
    }

    #[test]
    fn devices_table() {
        let settings = parse_settings(
            r#"
            app_id = "app"
            app_secret = "secret"
            interval = 120
            cache_token = false

            [[devices]]
            sn = "R6X2203J2333E06123"
            plant_id = "P1"
            name = "Roof"
            type = "solar"

            [[devices]]
            sn = "HSR2103J2251E08456"
            plant_id = "P1"
            name = "Garage battery"
            type = "battery"
            "#,
        )
        .unwrap();

        assert_eq!(120, settings.interval);
        assert!(!settings.cache_token);
        assert_eq!(2, settings.devices.len());
        assert_eq!(DeviceType::Solar, settings.devices[0].device_type);
        assert_eq!(DeviceType::Battery, settings.devices[1].device_type);
        assert_eq!("Garage battery", settings.devices[1].name);
    }

    #[test]
    fn missing_credentials() {
        assert!(parse_settings("interval = 60").is_err());
        assert!(parse_settings(
            r#"
            app_id = ""
            app_secret = "secret"
            "#
        )
        .is_err());
    }

    #[test]
    fn zero_durations_rejected() {
        for key in &["interval", "request_timeout", "cycle_timeout"] {
            let toml = format!(
                "app_id = \"app\"\napp_secret = \"secret\"\n{} = 0\n",
                key
            );
            match parse_settings(&toml) {
                Err(ConfigError::Message(msg)) => assert!(msg.contains(*key), "{}", msg),
                other => panic!("{} = 0 accepted: {:?}", key, other.map(|s| s.interval)),
            }
        }
    }

    #[test]
    fn malformed_device() {
        let result = parse_settings(
            r#"
            app_id = "app"
            app_secret = "secret"

            [[devices]]
            sn = "R6X2203J2333E06123"
            name = "Roof"
            type = "solar"
            "#,
        );
        assert!(result.is_err());
    }
}
