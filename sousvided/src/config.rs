//! Settings loading
//!
//! Reads the settings file once at startup. Any problem aborts the run before
//! hardware is touched.

use sousvide_core::{ControllerConfig, Result, Settings, SousVideError};
use std::path::Path;
use tokio::fs;
use tracing::info;

/// Load and validate the settings file.
pub async fn load_controller_config(path: &Path) -> Result<ControllerConfig> {
    info!("Reading settings file {}", path.display());

    let contents = fs::read_to_string(path).await.map_err(|e| {
        SousVideError::Config(format!(
            "Failed to read settings file {}: {}",
            path.display(),
            e
        ))
    })?;

    let config = Settings::from_toml(&contents)?.into_controller_config()?;

    info!("Done. Found values:");
    info!("  duration = {} minutes", config.duration.as_secs() / 60);
    info!("  sample interval = {} seconds", config.sample_interval.as_secs());
    info!("  temperature delta = {} degrees F", config.temperature_delta);
    info!("  target temperature = {} degrees F", config.target_temperature);
    info!("  serial port = {}", config.port);

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn write_settings(dir: &Path, contents: &str) -> std::path::PathBuf {
        let path = dir.join("settings.toml");
        fs::write(&path, contents).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_valid_settings() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_settings(
            temp_dir.path(),
            r#"
                duration.minutes = 2
                sample.interval.seconds = 5
                temperature.delta.degrees = 1
                temperature.target.degrees = 131
                serial.port = "/dev/ttyACM0"
            "#,
        )
        .await;

        let config = load_controller_config(&path).await.unwrap();
        assert_eq!(config.duration, Duration::from_secs(120));
        assert_eq!(config.sample_interval, Duration::from_secs(5));
        assert_eq!(config.target_temperature, 131);
        assert_eq!(config.temperature_delta, 1);
        assert_eq!(config.port, "/dev/ttyACM0");
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_controller_config(&temp_dir.path().join("nope.toml")).await;
        assert!(matches!(result, Err(SousVideError::Config(_))));
    }

    #[tokio::test]
    async fn test_partial_settings_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_settings(
            temp_dir.path(),
            r#"
                duration.minutes = 2
                serial.port = "/dev/ttyACM0"
            "#,
        )
        .await;

        let result = load_controller_config(&path).await;
        assert!(matches!(result, Err(SousVideError::Config(_))));
    }
}
