pub mod board_config;
pub mod sensor_config;

pub use board_config::{load_board_config, BoardConfig};
pub use sensor_config::{load_sensor_config, SensorConfig, SensorEntry};

/// Directory holding `board.toml` and `sensors.toml`, from `CONFIG_PATH`
pub fn config_dir() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string())
}
