//! Persistent settings.
//!
//! Settings are stored as JSON. Every field has a default, so a partial file
//! (or `{}`) is valid input. Durations are written as human strings such as
//! `"2s"` or `"500ms"`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TypeAssistError};
use crate::global_hotkey::parse_hotkey;
use crate::scheduler::DEFAULT_START_DELAY;
use crate::speed::{DEFAULT_SPEED, MAX_SPEED, MIN_SPEED};

/// Longest start delay accepted by [`Config::validate`].
pub const MAX_START_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_speed")]
    pub speed: i32,

    #[serde(
        default = "default_start_delay",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub start_delay: Duration,

    #[serde(default)]
    pub hotkeys_enabled: bool,

    #[serde(default = "default_start_hotkey")]
    pub start_hotkey: String,

    #[serde(default = "default_pause_hotkey")]
    pub pause_hotkey: String,

    #[serde(default = "default_stop_hotkey")]
    pub stop_hotkey: String,

    #[serde(default)]
    pub verbose: bool,

    /// GitHub `owner/name` whose releases are checked for updates.
    #[serde(default = "default_update_repo")]
    pub update_repo: String,

    #[serde(default)]
    pub check_updates_on_start: bool,
}

fn default_speed() -> i32 {
    DEFAULT_SPEED
}

fn default_start_delay() -> Duration {
    DEFAULT_START_DELAY
}

fn default_start_hotkey() -> String {
    "f8".to_string()
}

fn default_pause_hotkey() -> String {
    "f9".to_string()
}

fn default_stop_hotkey() -> String {
    "f10".to_string()
}

fn default_update_repo() -> String {
    "roheal/AutoType".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            start_delay: default_start_delay(),
            hotkeys_enabled: false,
            start_hotkey: default_start_hotkey(),
            pause_hotkey: default_pause_hotkey(),
            stop_hotkey: default_stop_hotkey(),
            verbose: false,
            update_repo: default_update_repo(),
            check_updates_on_start: false,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| TypeAssistError::config_load(path.display().to_string(), e.to_string()))?;
        serde_json::from_str(&content)
            .map_err(|e| TypeAssistError::config_load(path.display().to_string(), e.to_string()))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .map_err(|e| TypeAssistError::config_save(path.display().to_string(), e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(TypeAssistError::config_validation(format!(
                "speed must be between {MIN_SPEED} and {MAX_SPEED}, got {}",
                self.speed
            )));
        }

        if self.start_delay > MAX_START_DELAY {
            return Err(TypeAssistError::config_validation(format!(
                "start_delay must be at most {}s",
                MAX_START_DELAY.as_secs()
            )));
        }

        if self.hotkeys_enabled {
            let bindings = [
                ("start_hotkey", &self.start_hotkey),
                ("pause_hotkey", &self.pause_hotkey),
                ("stop_hotkey", &self.stop_hotkey),
            ];
            let mut parsed = Vec::with_capacity(bindings.len());
            for (field, value) in bindings {
                let hotkey = parse_hotkey(value).map_err(|e| {
                    TypeAssistError::config_validation(format!("{field}: {e}"))
                })?;
                if parsed.contains(&hotkey) {
                    return Err(TypeAssistError::config_validation(format!(
                        "{field} '{value}' is already bound to another action"
                    )));
                }
                parsed.push(hotkey);
            }
        }

        let mut repo = self.update_repo.split('/');
        let valid_repo = matches!(
            (repo.next(), repo.next(), repo.next()),
            (Some(owner), Some(name), None) if !owner.trim().is_empty() && !name.trim().is_empty()
        );
        if !valid_repo {
            return Err(TypeAssistError::config_validation(format!(
                "update_repo must look like 'owner/name', got '{}'",
                self.update_repo
            )));
        }

        Ok(())
    }
}

/// Parse `"500ms"`, `"2s"`, `"1.5s"`, `"3m"` or a bare number of milliseconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(TypeAssistError::invalid_duration(value, "empty value"));
    }

    let (number, scale_secs) = if let Some(n) = normalized.strip_suffix("ms") {
        (n, 0.001)
    } else if let Some(n) = normalized.strip_suffix('s') {
        (n, 1.0)
    } else if let Some(n) = normalized.strip_suffix('m') {
        (n, 60.0)
    } else {
        (normalized.as_str(), 0.001)
    };

    let number = number.trim();
    if number.starts_with('-') {
        return Err(TypeAssistError::invalid_duration(value, "must not be negative"));
    }
    let amount: f64 = number
        .parse()
        .map_err(|_| TypeAssistError::invalid_duration(value, "expected a number with an optional ms, s or m suffix"))?;
    if !amount.is_finite() {
        return Err(TypeAssistError::invalid_duration(value, "must be finite"));
    }

    Duration::try_from_secs_f64(amount * scale_secs)
        .map_err(|e| TypeAssistError::invalid_duration(value, e.to_string()))
}

/// Render a duration the way [`parse_duration`] reads it back.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{millis}ms")
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("750").unwrap(), Duration::from_millis(750));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(2)), "2s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.speed, 70);
        assert_eq!(config.start_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_speed_out_of_range() {
        let config = Config {
            speed: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            speed: 101,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
