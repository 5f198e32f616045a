use crate::board::EdisonAdaptor;
use crate::config::SensorConfig;
use crate::messages::{Header, ReadingMessage};
use crate::sensors::{SensorDataFrame, SensorDriver};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

pub const DEFAULT_FREQUENCY_HZ: u32 = 10;

/// Period for `frequency` Hz, never shorter than 1 ms
pub fn poll_interval(frequency: u32) -> Duration {
    Duration::from_millis((1000 / u64::from(frequency.max(1))).max(1))
}

/// Run one bus transaction set for `sensor` while holding the board lock
async fn poll_once(
    sensor: &mut dyn SensorDriver,
    board: &Mutex<EdisonAdaptor>,
) -> Result<SensorDataFrame, String> {
    let mut board = board.lock().await;
    let bus = board.i2c().map_err(|e| e.to_string())?;
    sensor.read(bus).map_err(String::from)
}

/// Spawn one polling task per sensor. Readings go to stdout as JSON lines.
pub fn spawn_sensor_tasks(
    sensors: Vec<Box<dyn SensorDriver>>,
    board: Arc<Mutex<EdisonAdaptor>>,
    sensor_config: &SensorConfig,
    device_id: &str,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::with_capacity(sensors.len());

    for mut sensor in sensors.into_iter() {
        let sensor_id = sensor.id().to_string();
        let frequency = sensor_config
            .sensors
            .iter()
            .find(|s| s.id == sensor_id)
            .and_then(|s| s.frequency)
            .unwrap_or(DEFAULT_FREQUENCY_HZ);
        let sleep_duration = poll_interval(frequency);
        let board = board.clone();
        let device_id = device_id.to_string();

        tasks.push(tokio::spawn(async move {
            info!("[{}] Starting sensor task at {}Hz", sensor_id, frequency);
            let mut sequence_counter = 0u64;

            loop {
                match poll_once(sensor.as_mut(), &board).await {
                    Ok(frame) => {
                        sequence_counter += 1;
                        let header =
                            Header::new(device_id.clone(), sensor_id.clone(), sequence_counter);
                        match ReadingMessage::new(header, frame).to_json() {
                            Ok(line) => println!("{}", line),
                            Err(e) => warn!("[{}] Failed to serialize reading: {}", sensor_id, e),
                        }
                    }
                    Err(e) => {
                        warn!("[{}] Sensor read error: {}", sensor_id, e);
                    }
                }

                sleep(sleep_duration).await;
            }
        }));
    }

    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval() {
        assert_eq!(poll_interval(10), Duration::from_millis(100));
        assert_eq!(poll_interval(1000), Duration::from_millis(1));
        assert_eq!(poll_interval(0), Duration::from_millis(1000));
    }

    #[test]
    fn test_poll_interval_floor() {
        assert_eq!(poll_interval(1001), Duration::from_millis(1));
        assert_eq!(poll_interval(u32::MAX), Duration::from_millis(1));
    }
}
