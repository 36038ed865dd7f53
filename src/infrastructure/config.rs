use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;
const DEFAULT_TICK_INTERVAL_MILLIS: u64 = 500;
const DEFAULT_HISTORY_DISPLAY_LIMIT: usize = 30;
const DEFAULT_WEATHER_REFRESH_SECONDS: u64 = 300;
const DEFAULT_WEATHER_ENDPOINT: &str = "https://wttr.in/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "default_tick_interval_millis")]
    pub tick_interval_millis: u64,
    #[serde(default)]
    pub auto_start_next_phase: bool,
    #[serde(default = "default_history_display_limit")]
    pub history_display_limit: usize,
    #[serde(default = "default_weather_refresh_seconds")]
    pub weather_refresh_seconds: u64,
    #[serde(default = "default_weather_endpoint")]
    pub weather_endpoint: String,
}

fn default_tick_interval_millis() -> u64 {
    DEFAULT_TICK_INTERVAL_MILLIS
}

fn default_history_display_limit() -> usize {
    DEFAULT_HISTORY_DISPLAY_LIMIT
}

fn default_weather_refresh_seconds() -> u64 {
    DEFAULT_WEATHER_REFRESH_SECONDS
}

fn default_weather_endpoint() -> String {
    DEFAULT_WEATHER_ENDPOINT.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema: SUPPORTED_SCHEMA as u8,
            timezone: None,
            tick_interval_millis: DEFAULT_TICK_INTERVAL_MILLIS,
            auto_start_next_phase: false,
            history_display_limit: DEFAULT_HISTORY_DISPLAY_LIMIT,
            weather_refresh_seconds: DEFAULT_WEATHER_REFRESH_SECONDS,
            weather_endpoint: DEFAULT_WEATHER_ENDPOINT.to_string(),
        }
    }
}

impl AppConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_millis.clamp(100, 5_000))
    }

    pub fn history_limit(&self) -> usize {
        self.history_display_limit.clamp(1, 50)
    }

    pub fn weather_refresh(&self) -> Duration {
        Duration::from_secs(self.weather_refresh_seconds.max(30))
    }

    pub fn timezone(&self) -> Option<&str> {
        self.timezone
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let value = read_config(&config_dir.join(APP_JSON))?;
    Ok(serde_json::from_value(value)?)
}

pub fn save_app_config(config_dir: &Path, config: &AppConfig) -> Result<(), InfraError> {
    let formatted = serde_json::to_string_pretty(config)?;
    fs::write(config_dir.join(APP_JSON), format!("{formatted}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_written_once_and_loads_back() {
        let dir = TempDir::new().expect("temp dir");
        ensure_default_configs(dir.path()).expect("write defaults");
        let loaded = load_app_config(dir.path()).expect("load config");
        assert_eq!(loaded, AppConfig::default());

        let customised = AppConfig {
            auto_start_next_phase: true,
            ..AppConfig::default()
        };
        save_app_config(dir.path(), &customised).expect("save config");
        ensure_default_configs(dir.path()).expect("defaults are not rewritten");
        let reloaded = load_app_config(dir.path()).expect("load config");
        assert!(reloaded.auto_start_next_phase);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join(APP_JSON), r#"{"schema": 2}"#).expect("write config");
        match load_app_config(dir.path()) {
            Err(InfraError::InvalidConfig(message)) => {
                assert!(message.contains("unsupported schema 2"))
            }
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let dir = TempDir::new().expect("temp dir");
        fs::write(
            dir.path().join(APP_JSON),
            r#"{"schema": 1, "timezone": " ", "tickIntervalMillis": 5}"#,
        )
        .expect("write config");
        let config = load_app_config(dir.path()).expect("load config");
        assert_eq!(config.timezone(), None);
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.history_limit(), DEFAULT_HISTORY_DISPLAY_LIMIT);
        assert_eq!(config.weather_endpoint, DEFAULT_WEATHER_ENDPOINT);
    }
}
