//! Application configuration loaded from TOML.

use crate::platform::{ExerciseCapabilities, SimulatorConfig};
use crate::sensors::codec::to_platform_type;
use crate::sensors::types::{ExerciseKind, SensorType};
use crate::session::types::StartArguments;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Session settings
    pub session: SessionSettings,
    /// Simulated device settings
    pub simulator: SimulatorSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            session: SessionSettings::default(),
            simulator: SimulatorSettings::default(),
        }
    }
}

/// What session the demo runner starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Exercise selector (see `ExerciseKind::id`)
    pub exercise_type: i32,
    /// Sensor wire tags to request
    pub sensors: Vec<String>,
    /// Enable GPS
    pub enable_gps: bool,
    /// Let the platform auto-pause
    pub auto_pause_and_resume: bool,
    /// How long the demo session runs
    pub duration_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            exercise_type: ExerciseKind::Running.id(),
            sensors: SensorType::ALL
                .iter()
                .map(|s| s.wire_tag().to_string())
                .collect(),
            enable_gps: true,
            auto_pause_and_resume: false,
            duration_secs: 10,
        }
    }
}

impl SessionSettings {
    /// Arguments for `start`, as a foreground caller would send them.
    pub fn start_arguments(&self) -> StartArguments {
        StartArguments {
            exercise_type: self.exercise_type,
            sensors: self.sensors.clone(),
            enable_gps: self.enable_gps,
        }
    }
}

/// Simulated device settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    /// Update cadence in milliseconds (0 disables synthetic updates)
    pub update_interval_ms: u64,
    /// Exercise selectors the device can track
    pub supported_exercise_types: Vec<i32>,
    /// Sensor wire tags the device supports for every supported exercise kind
    pub supported_sensors: Vec<String>,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            update_interval_ms: 1000,
            supported_exercise_types: ExerciseKind::ALL.iter().map(|k| k.id()).collect(),
            supported_sensors: ["heartRate", "calories", "steps", "distance", "speed"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SimulatorSettings {
    /// Build the simulated device description.
    pub fn to_simulator_config(&self) -> Result<SimulatorConfig, ConfigError> {
        let data_types = self
            .supported_sensors
            .iter()
            .map(|tag| to_platform_type(tag))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let kinds = self
            .supported_exercise_types
            .iter()
            .map(|id| ExerciseKind::from_id(*id))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let capabilities = kinds
            .into_iter()
            .fold(ExerciseCapabilities::default(), |caps, kind| {
                caps.with_kind(kind, data_types.iter().copied())
            });

        let update_interval = match self.update_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        Ok(SimulatorConfig {
            capabilities,
            update_interval,
        })
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "workout", "WorkoutSession")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load application configuration from a file. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        let config = AppConfig {
            data_dir: get_data_dir(),
            ..Default::default()
        };
        return Ok(config);
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = get_data_dir();

    Ok(config)
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

/// Save application configuration to a file.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
