mod bus;
mod config;
mod errors;
mod hub;
mod sensors;

use crate::bus::bitbang::{GpioTwoWire, TwoWire};
use crate::bus::i2c::I2CBus;
use crate::config::load_hub_config;
use crate::errors::BusResult;
use crate::hub::SensorHub;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing with RUST_LOG environment variable support
    // RUST_LOG=debug for verbose, RUST_LOG=info for normal, RUST_LOG=warn for production
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("[HiveSensorHub] starting up...");

    // Load configuration from CONFIG_PATH or default
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
    let hub_config_path = format!("{}/hub.toml", config_path);
    let config = load_hub_config(&hub_config_path).expect("Failed to load hub config");

    let bus = I2CBus::new(&config.bus.i2c_path).expect("Failed to open I2C bus");

    let weight_pins: Option<BusResult<Box<dyn TwoWire>>> = config.weight.as_ref().map(|weight| {
        GpioTwoWire::new(&config.bus.gpio_chip, weight.clk_pin, weight.dat_pin)
            .map(|pins| Box::new(pins) as Box<dyn TwoWire>)
    });

    let mut hub = SensorHub::init(Box::new(bus), weight_pins, &config).await;
    for issue in hub.init_issues() {
        warn!("[init] {}", issue);
    }

    let poll_interval = Duration::from_millis(config.hub.poll_interval_ms);
    info!("[main] polling every {:?}", poll_interval);

    loop {
        let report = hub.report().await;
        match serde_json::to_string(&report) {
            Ok(json) => info!("[report] {}", json),
            Err(e) => error!("[report] serialization failed: {}", e),
        }
        sleep(poll_interval).await;
    }
}
