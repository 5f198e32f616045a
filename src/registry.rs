use crate::board::EdisonAdaptor;
use crate::config::{BoardConfig, SensorConfig};
use crate::errors::{RegistryError, RegistryResult};
use crate::gpio::LineController;
use crate::sensors::{create_sensor_driver, SensorDriver};
use tracing::{info, warn};

/// Connect the board, open its bus and initialize every configured sensor.
/// On failure everything already acquired is released again.
pub fn init_all(
    board_config: &BoardConfig,
    sensor_config: &SensorConfig,
) -> RegistryResult<(Vec<Box<dyn SensorDriver>>, EdisonAdaptor)> {
    let mut adaptor = EdisonAdaptor::new(board_config);
    match bring_up(&mut adaptor, board_config, sensor_config) {
        Ok(sensors) => Ok((sensors, adaptor)),
        Err(e) => {
            for err in adaptor.finalize() {
                warn!("[registry] cleanup after failed start: {}", err);
            }
            Err(e)
        }
    }
}

pub fn bring_up<C: LineController>(
    adaptor: &mut EdisonAdaptor<C>,
    board_config: &BoardConfig,
    sensor_config: &SensorConfig,
) -> RegistryResult<Vec<Box<dyn SensorDriver>>> {
    adaptor.connect()?;

    let mut sensors: Vec<Box<dyn SensorDriver>> = Vec::new();
    if sensor_config.sensors.is_empty() {
        warn!("[registry] no sensors configured");
        return Ok(sensors);
    }
    adaptor.i2c_start()?;

    info!(
        "[registry] initializing {} sensors...",
        sensor_config.sensors.len()
    );
    for s in sensor_config.sensors.iter() {
        if s.bus != board_config.bus_id {
            return Err(RegistryError::BusNotFound { bus: s.bus.clone() });
        }
        let mut sensor = create_sensor_driver(s).map_err(RegistryError::DriverCreationError)?;
        info!(
            "[registry] registering sensor: id={} driver={} bus={}",
            s.id, s.driver, s.bus
        );

        let bus = adaptor.i2c()?;
        sensor
            .init(bus)
            .map_err(RegistryError::RegistrationError)?;
        sensors.push(sensor);
    }

    Ok(sensors)
}
