//! I2C transaction engine, multiplexed pin management and LSM9DS0 support
//! for the Intel Edison, over the kernel's i2c-dev and sysfs interfaces.

pub mod board;
pub mod bus;
pub mod config;
pub mod errors;
pub mod gpio;
pub mod messages;
pub mod registry;
pub mod scheduler;
pub mod sensors;

use crate::config::{config_dir, load_board_config, load_sensor_config};
use crate::registry::init_all;
use crate::scheduler::spawn_sensor_tasks;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber, honouring `RUST_LOG`
pub fn init_tracing() {
    // RUST_LOG=debug for verbose, RUST_LOG=trace to see every bus transfer
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

/// Bring the board up, poll sensors until Ctrl-C, then release the board
pub async fn run() -> Result<(), String> {
    let config_path = config_dir();
    let board_config = load_board_config(&format!("{}/board.toml", config_path))?;
    let sensor_config = load_sensor_config(&format!("{}/sensors.toml", config_path))?;
    info!("[config] loaded {} sensor(s)", sensor_config.sensors.len());

    let (sensors, adaptor) =
        init_all(&board_config, &sensor_config).map_err(|e| e.to_string())?;
    info!("[registry] sensors and bus initialized");

    let adaptor = Arc::new(Mutex::new(adaptor));
    let tasks = spawn_sensor_tasks(sensors, adaptor.clone(), &sensor_config, "edison");
    info!("[main] {} sensor task(s) launched", tasks.len());

    let shutdown = tokio::signal::ctrl_c().await;
    info!("[main] shutting down");
    for task in &tasks {
        task.abort();
    }

    let errors = adaptor.lock().await.finalize();
    for e in &errors {
        warn!("[main] teardown: {}", e);
    }
    shutdown.map_err(|e| format!("waiting for Ctrl-C failed: {}", e))
}
