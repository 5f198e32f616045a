use crate::bus::I2c;
use crate::config::SensorEntry;
use crate::errors::{SensorError, SensorResult};
use serde::Serialize;

#[cfg(feature = "lsm9ds0")]
pub mod lsm9ds0;

/// Three-axis reading in the driver's physical unit
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    /// Decode three little-endian i16 samples, scaled by `sensitivity`
    /// milli-units per LSB.
    pub fn from_le_bytes(raw: &[u8; 6], sensitivity: f64) -> Self {
        let axis =
            |i: usize| f64::from(i16::from_le_bytes([raw[i], raw[i + 1]])) * sensitivity / 1000.0;
        Self {
            x: axis(0),
            y: axis(2),
            z: axis(4),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SensorDataFrame {
    /// g
    pub accel: Option<Vector3>,
    /// degrees per second
    pub gyro: Option<Vector3>,
    /// gauss
    pub mag: Option<Vector3>,
}

/// A peripheral the daemon polls. The bus is borrowed per call; drivers
/// never own it.
pub trait SensorDriver: Send {
    fn init(&mut self, bus: &mut dyn I2c) -> SensorResult<()>;
    fn read(&mut self, bus: &mut dyn I2c) -> SensorResult<SensorDataFrame>;
    fn id(&self) -> &str;
    fn bus(&self) -> &str;
}

pub trait SensorFactory: Sync {
    fn name(&self) -> &'static str;
    fn create(&self, entry: &SensorEntry) -> SensorResult<Box<dyn SensorDriver>>;
}

#[cfg(feature = "lsm9ds0")]
pub use self::lsm9ds0::LSM9DS0_FACTORY;

pub static SENSOR_FACTORIES: &[&dyn SensorFactory] = &[
    #[cfg(feature = "lsm9ds0")]
    &LSM9DS0_FACTORY,
];

pub fn create_sensor_driver(entry: &SensorEntry) -> SensorResult<Box<dyn SensorDriver>> {
    SENSOR_FACTORIES
        .iter()
        .find(|f| f.name() == entry.driver)
        .ok_or_else(|| SensorError::UnsupportedDriver {
            driver: entry.driver.clone(),
        })?
        .create(entry)
}
