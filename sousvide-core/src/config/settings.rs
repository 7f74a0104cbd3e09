//! Settings file and the validated controller configuration
//!
//! The file uses dotted keys:
//!
//! ```toml
//! duration.minutes = 90
//! sample.interval.seconds = 10
//! temperature.delta.degrees = 2
//! temperature.target.degrees = 135
//! serial.port = "/dev/ttyUSB0"
//! ```

use crate::error::{Result, SousVideError};
use crate::hysteresis::HysteresisBand;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DurationSettings {
    pub minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntervalSettings {
    pub seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SampleSettings {
    pub interval: IntervalSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Degrees {
    pub degrees: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemperatureSettings {
    pub delta: Degrees,
    pub target: Degrees,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerialSettings {
    pub port: String,
}

/// Raw settings as written in the settings file.
///
/// Every key is required.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub duration: DurationSettings,
    pub sample: SampleSettings,
    pub temperature: TemperatureSettings,
    pub serial: SerialSettings,
}

impl Settings {
    /// Parse settings from TOML.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate and convert into the immutable controller configuration.
    pub fn into_controller_config(self) -> Result<ControllerConfig> {
        let minutes = non_negative("duration.minutes", self.duration.minutes)?;
        let seconds = non_negative("sample.interval.seconds", self.sample.interval.seconds)?;
        let delta = degrees("temperature.delta.degrees", self.temperature.delta.degrees)?;
        let target = degrees("temperature.target.degrees", self.temperature.target.degrees)?;

        let duration_secs = minutes.checked_mul(60).ok_or_else(|| {
            SousVideError::Config(format!("duration.minutes is too large: {}", minutes))
        })?;

        let port = self.serial.port.trim().to_string();
        if port.is_empty() {
            return Err(SousVideError::Config("serial.port is empty".to_string()));
        }

        Ok(ControllerConfig {
            target_temperature: target,
            temperature_delta: delta,
            duration: Duration::from_secs(duration_secs),
            sample_interval: Duration::from_secs(seconds),
            port,
        })
    }
}

fn non_negative(key: &str, value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| SousVideError::Config(format!("{} must not be negative, got {}", key, value)))
}

fn degrees(key: &str, value: i64) -> Result<i32> {
    let value = non_negative(key, value)?;
    i32::try_from(value)
        .map_err(|_| SousVideError::Config(format!("{} is out of range: {}", key, value)))
}

/// Validated controller configuration, immutable for the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Target temperature in degrees
    pub target_temperature: i32,
    /// Offset added to every reading before comparing with the target
    pub temperature_delta: i32,
    /// Total run duration
    pub duration: Duration,
    /// Wait between sample requests
    pub sample_interval: Duration,
    /// Serial port identifier (e.g. "/dev/ttyUSB0")
    pub port: String,
}

impl ControllerConfig {
    pub fn band(&self) -> HysteresisBand {
        HysteresisBand::new(self.target_temperature, self.temperature_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        duration.minutes = 90
        sample.interval.seconds = 10
        temperature.delta.degrees = 2
        temperature.target.degrees = 135
        serial.port = "/dev/ttyUSB0"
    "#;

    #[test]
    fn test_parse_dotted_keys() {
        let settings = Settings::from_toml(VALID).unwrap();
        assert_eq!(settings.duration.minutes, 90);
        assert_eq!(settings.sample.interval.seconds, 10);
        assert_eq!(settings.temperature.delta.degrees, 2);
        assert_eq!(settings.temperature.target.degrees, 135);
        assert_eq!(settings.serial.port, "/dev/ttyUSB0");
    }

    #[test]
    fn test_into_controller_config() {
        let config = Settings::from_toml(VALID)
            .unwrap()
            .into_controller_config()
            .unwrap();

        assert_eq!(config.duration, Duration::from_secs(90 * 60));
        assert_eq!(config.sample_interval, Duration::from_secs(10));
        assert_eq!(config.band(), HysteresisBand::new(135, 2));
        assert_eq!(config.port, "/dev/ttyUSB0");
    }

    #[test]
    fn test_tables_are_equivalent_to_dotted_keys() {
        let toml_str = r#"
            [duration]
            minutes = 1

            [sample.interval]
            seconds = 1

            [temperature]
            delta.degrees = 0
            target.degrees = 70

            [serial]
            port = "COM3"
        "#;

        let config = Settings::from_toml(toml_str)
            .unwrap()
            .into_controller_config()
            .unwrap();
        assert_eq!(config.temperature_delta, 0);
        assert_eq!(config.port, "COM3");
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let toml_str = VALID.replace("temperature.target.degrees = 135", "");
        let err = Settings::from_toml(&toml_str).unwrap_err();
        assert!(matches!(err, SousVideError::Config(_)));
    }

    #[test]
    fn test_non_numeric_value_is_rejected() {
        let toml_str = VALID.replace("sample.interval.seconds = 10", "sample.interval.seconds = \"ten\"");
        assert!(matches!(
            Settings::from_toml(&toml_str),
            Err(SousVideError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let toml_str = format!("{}\ntemperature.unit = \"F\"\n", VALID);
        assert!(Settings::from_toml(&toml_str).is_err());
    }

    #[test]
    fn test_negative_value_is_rejected() {
        let toml_str = VALID.replace("temperature.delta.degrees = 2", "temperature.delta.degrees = -2");
        let err = Settings::from_toml(&toml_str)
            .unwrap()
            .into_controller_config()
            .unwrap_err();

        match err {
            SousVideError::Config(msg) => assert!(msg.contains("temperature.delta.degrees")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_port_is_rejected() {
        let toml_str = VALID.replace("\"/dev/ttyUSB0\"", "\"  \"");
        assert!(Settings::from_toml(&toml_str)
            .unwrap()
            .into_controller_config()
            .is_err());
    }

    #[test]
    fn test_zero_delta_is_allowed() {
        let toml_str = VALID.replace("temperature.delta.degrees = 2", "temperature.delta.degrees = 0");
        let config = Settings::from_toml(&toml_str)
            .unwrap()
            .into_controller_config()
            .unwrap();
        assert_eq!(config.temperature_delta, 0);
    }
}
