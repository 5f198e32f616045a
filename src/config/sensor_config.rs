use crate::errors::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::fs;

/// Root configuration struct expecting `[[sensor]]` TOML array format
#[derive(Debug, Deserialize)]
pub struct SensorConfig {
    #[serde(rename = "sensor", default)]
    pub sensors: Vec<SensorEntry>,
}

fn enabled() -> bool {
    true
}

/// One sensor entry, matching each `[[sensor]]` section
#[derive(Debug, Clone, Deserialize)]
pub struct SensorEntry {
    pub id: String,
    pub driver: String,
    pub bus: String,
    /// Polling rate in Hz
    pub frequency: Option<u32>,
    #[serde(default = "enabled")]
    pub accel: bool,
    #[serde(default = "enabled")]
    pub gyro: bool,
    #[serde(default = "enabled")]
    pub magneto: bool,
    pub accel_scale: Option<String>,
    pub gyro_scale: Option<String>,
    pub magneto_scale: Option<String>,
}

impl SensorConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        for (i, s) in self.sensors.iter().enumerate() {
            if s.frequency == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: format!("sensor[{}].frequency", i),
                    reason: "must be greater than zero".to_string(),
                });
            }
            if self.sensors[..i].iter().any(|other| other.id == s.id) {
                return Err(ConfigError::InvalidValue {
                    field: format!("sensor[{}].id", i),
                    reason: format!("duplicate sensor id '{}'", s.id),
                });
            }
        }
        Ok(())
    }
}

/// Loads config from TOML file
pub fn load_sensor_config(path: &str) -> ConfigResult<SensorConfig> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
        path: path.to_string(),
        source,
    })?;
    let parsed: SensorConfig = toml::from_str(&content)?;
    parsed.validate()?;
    Ok(parsed)
}
