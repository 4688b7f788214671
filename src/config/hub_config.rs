use crate::errors::{ConfigError, ConfigResult};
use crate::sensors::{aht10, bmp180, pca9548, veml7700};
use serde::Deserialize;
use std::fs;

/// Root configuration, one TOML file per deployment.
#[derive(Debug, Deserialize, Default)]
pub struct HubConfig {
    #[serde(default)]
    pub bus: BusSection,
    #[serde(default)]
    pub hub: HubSection,
    #[serde(default)]
    pub barometer: BarometerSection,
    #[serde(default)]
    pub light: LightSection,
    /// Weight cell is optional; absent section means no HX711 fitted.
    pub weight: Option<WeightSection>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BusSection {
    pub i2c_path: String,
    pub gpio_chip: String,
}

impl Default for BusSection {
    fn default() -> Self {
        Self {
            i2c_path: "/dev/i2c-1".to_string(),
            gpio_chip: "/dev/gpiochip0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HubSection {
    pub poll_interval_ms: u64,
    pub mux_address: u8,
    pub bmp180: bool,
    pub veml7700: bool,
    /// Temperature/humidity units, one per mux channel starting at 0.
    pub aht10_count: u8,
    pub aht10_address: u8,
    /// Per-unit temperature calibration shift, degree C.
    pub aht10_offset: f64,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            mux_address: pca9548::DEFAULT_ADDRESS,
            bmp180: true,
            veml7700: true,
            aht10_count: 5,
            aht10_address: aht10::DEFAULT_ADDRESS,
            aht10_offset: 0.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BarometerSection {
    pub address: u8,
    pub oversampling: u8,
}

impl Default for BarometerSection {
    fn default() -> Self {
        Self {
            address: bmp180::DEFAULT_ADDRESS,
            oversampling: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LightSection {
    pub address: u8,
    pub int_time_ms: u32,
    pub gain: f64,
}

impl Default for LightSection {
    fn default() -> Self {
        Self {
            address: veml7700::DEFAULT_ADDRESS,
            int_time_ms: 25,
            gain: 0.125,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WeightSection {
    pub clk_pin: u32,
    pub dat_pin: u32,
    pub scale: f64,
    pub offset: f64,
    pub tare: f64,
    pub cycles: u32,
}

impl Default for WeightSection {
    fn default() -> Self {
        Self {
            clk_pin: 4,
            dat_pin: 36,
            scale: 0.00005,
            offset: 245500.0,
            tare: 0.0,
            cycles: 8,
        }
    }
}

/// Loads config from TOML file
pub fn load_hub_config(path: &str) -> ConfigResult<HubConfig> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadError {
        path: path.to_string(),
        source: e,
    })?;
    let parsed: HubConfig = toml::from_str(&content)?;
    validate(&parsed)?;
    Ok(parsed)
}

fn validate(config: &HubConfig) -> ConfigResult<()> {
    if config.hub.aht10_count > 8 {
        return Err(ConfigError::InvalidValue {
            field: "hub.aht10_count".to_string(),
            reason: "at most 8 units fit behind the multiplexer".to_string(),
        });
    }
    if config.barometer.oversampling > 3 {
        return Err(ConfigError::InvalidValue {
            field: "barometer.oversampling".to_string(),
            reason: "oversampling setting must be 0..=3".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_gets_defaults() {
        let config: HubConfig = toml::from_str("").unwrap();
        assert_eq!(config.hub.mux_address, 0x70);
        assert_eq!(config.hub.aht10_count, 5);
        assert_eq!(config.barometer.oversampling, 3);
        assert_eq!(config.light.int_time_ms, 25);
        assert!(config.weight.is_none());
    }

    #[test]
    fn sections_override_selectively() {
        let config: HubConfig = toml::from_str(
            r#"
            [hub]
            aht10_count = 2
            veml7700 = false

            [weight]
            clk_pin = 17
            dat_pin = 27
            tare = 1.25
            "#,
        )
        .unwrap();
        assert_eq!(config.hub.aht10_count, 2);
        assert!(!config.hub.veml7700);
        assert!(config.hub.bmp180);
        let weight = config.weight.unwrap();
        assert_eq!(weight.clk_pin, 17);
        assert_eq!(weight.cycles, 8);
        assert_eq!(weight.tare, 1.25);
    }

    #[test]
    fn too_many_units_rejected() {
        let config: HubConfig = toml::from_str("[hub]\naht10_count = 9\n").unwrap();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
