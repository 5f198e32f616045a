use crate::errors::{ConfigError, ConfigResult};
use crate::gpio::sysfs::{
    DEFAULT_ANALOG_ROOT, DEFAULT_GPIO_ROOT, DEFAULT_PINMUX_ROOT, DEFAULT_PWM_ROOT,
};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Board adaptor settings from `board.toml`. Every field has a default, so
/// a missing file section means "stock Edison image".
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Name sensors use in their `bus` field to refer to the board's I2C bus
    pub bus_id: String,
    pub gpio_root: PathBuf,
    pub pwm_root: PathBuf,
    pub analog_root: PathBuf,
    pub pinmux_root: PathBuf,
    /// Directory holding the `i2c-N` device nodes
    pub dev_dir: PathBuf,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            bus_id: "i2c".to_string(),
            gpio_root: DEFAULT_GPIO_ROOT.into(),
            pwm_root: DEFAULT_PWM_ROOT.into(),
            analog_root: DEFAULT_ANALOG_ROOT.into(),
            pinmux_root: DEFAULT_PINMUX_ROOT.into(),
            dev_dir: "/dev".into(),
        }
    }
}

impl BoardConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.bus_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "bus_id".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Root of `board.toml`
#[derive(Debug, Default, Deserialize)]
struct BoardFile {
    #[serde(default)]
    board: BoardConfig,
}

/// Loads board settings; a missing file yields the defaults
pub fn load_board_config(path: &str) -> ConfigResult<BoardConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(BoardConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::LoadError {
                path: path.to_string(),
                source,
            })
        }
    };
    let parsed: BoardFile = toml::from_str(&content)?;
    parsed.board.validate()?;
    Ok(parsed.board)
}
