use crate::bus::I2cTransport;
use crate::errors::{SensorError, SensorResult};

pub const DEFAULT_ADDRESS: u8 = 0x10;

// Write registers
const ALS_CONF_0: u8 = 0x00;
const ALS_WH: u8 = 0x01;
const ALS_WL: u8 = 0x02;
const POW_SAV: u8 = 0x03;

// Read registers
const ALS: u8 = 0x04;

/// ALS gain selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gain {
    Eighth,
    Quarter,
    X1,
    X2,
}

impl Gain {
    /// Maps the numeric factor from the configuration file; anything
    /// other than 1/8, 1/4, 1, or 2 is unsupported.
    pub fn from_factor(factor: f64) -> Option<Self> {
        if factor == 0.125 {
            Some(Gain::Eighth)
        } else if factor == 0.25 {
            Some(Gain::Quarter)
        } else if factor == 1.0 {
            Some(Gain::X1)
        } else if factor == 2.0 {
            Some(Gain::X2)
        } else {
            None
        }
    }

    fn index(self) -> usize {
        match self {
            Gain::Eighth => 0,
            Gain::Quarter => 1,
            Gain::X1 => 2,
            Gain::X2 => 3,
        }
    }
}

/// (ALS_CONF register value, lux-per-count resolution) for a supported
/// (integration time, gain) pair. Literal table from the vendor
/// datasheet; unsupported pairs get `None`, never a fallback.
fn als_config(int_time_ms: u32, gain: Gain) -> Option<([u8; 2], f64)> {
    let idx = gain.index();
    // Low config bytes and resolutions ordered 1/8, 1/4, 1, 2.
    let (high, lows, resolutions): (u8, [u8; 4], [f64; 4]) = match int_time_ms {
        25 => (0x00, [0x13, 0x1B, 0x01, 0x0B], [1.8432, 0.9216, 0.2304, 0.1152]),
        50 => (0x00, [0x12, 0x1A, 0x02, 0x0A], [0.9216, 0.4608, 0.1152, 0.0576]),
        100 => (0x00, [0x10, 0x18, 0x00, 0x08], [0.4608, 0.2304, 0.0288, 0.0144]),
        200 => (0x40, [0x10, 0x18, 0x00, 0x08], [0.2304, 0.1152, 0.0288, 0.0144]),
        400 => (0x80, [0x10, 0x18, 0x00, 0x08], [0.1152, 0.0576, 0.0144, 0.0072]),
        800 => (0xC0, [0x10, 0x18, 0x00, 0x08], [0.0876, 0.0288, 0.0072, 0.0036]),
        _ => return None,
    };
    Some(([high, lows[idx]], resolutions[idx]))
}

/// VEML7700 ambient-light sensor.
///
/// The lux resolution depends on the configured integration time and
/// gain, not on anything re-derived at read time, so `configure()` must
/// complete before any measurement.
pub struct Veml7700 {
    address: u8,
    raw_lux: [u8; 2],
    resolution: Option<f64>,
}

impl Veml7700 {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            raw_lux: [0; 2],
            resolution: None,
        }
    }

    pub async fn configure(
        &mut self,
        bus: &mut dyn I2cTransport,
        int_time_ms: u32,
        gain_factor: f64,
    ) -> SensorResult<()> {
        let gain = Gain::from_factor(gain_factor).ok_or_else(|| SensorError::Config {
            reason: format!("gain must be one of 1/8, 1/4, 1, or 2 (got {})", gain_factor),
        })?;
        let (conf, resolution) = als_config(int_time_ms, gain).ok_or_else(|| {
            SensorError::Config {
                reason: format!(
                    "int_time_ms must be one of 25, 50, 100, 200, 400, or 800 (got {})",
                    int_time_ms
                ),
            }
        })?;

        bus.write_reg(self.address, ALS_CONF_0, &conf).await?;

        let defaults = [0x00, 0x00];
        bus.write_reg(self.address, ALS_WH, &defaults).await?;
        bus.write_reg(self.address, ALS_WL, &defaults).await?;
        bus.write_reg(self.address, POW_SAV, &defaults).await?;

        self.resolution = Some(resolution);
        Ok(())
    }

    pub async fn measure(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<()> {
        if self.resolution.is_none() {
            return Err(SensorError::NotReady {
                sensor: "veml7700",
                reason: "configure() has not run",
            });
        }
        let mut raw = [0u8; 2];
        bus.read_reg(self.address, ALS, &mut raw).await?;
        self.raw_lux = raw;
        Ok(())
    }

    pub async fn lux(&mut self, bus: &mut dyn I2cTransport, trigger: bool) -> SensorResult<f64> {
        if trigger {
            self.measure(bus).await?;
        }
        let resolution = self.resolution.ok_or(SensorError::NotReady {
            sensor: "veml7700",
            reason: "configure() has not run",
        })?;
        let counts = self.raw_lux[0] as u32 | (self.raw_lux[1] as u32) << 8;
        Ok(counts as f64 * resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{MockBus, Txn};

    #[test]
    fn config_table_lookup() {
        let (conf, res) = als_config(25, Gain::X1).unwrap();
        assert_eq!(conf, [0x00, 0x01]);
        assert_eq!(res, 0.2304);

        let (conf, res) = als_config(800, Gain::Eighth).unwrap();
        assert_eq!(conf, [0xC0, 0x10]);
        assert_eq!(res, 0.0876);

        assert!(als_config(75, Gain::X1).is_none());
    }

    #[test]
    fn gain_factor_mapping() {
        assert_eq!(Gain::from_factor(0.125), Some(Gain::Eighth));
        assert_eq!(Gain::from_factor(2.0), Some(Gain::X2));
        assert_eq!(Gain::from_factor(3.0), None);
    }

    #[tokio::test]
    async fn unsupported_gain_is_a_config_error() {
        let mut veml = Veml7700::new(DEFAULT_ADDRESS);
        let mut bus = MockBus::new();
        let err = veml.configure(&mut bus, 25, 3.0).await.unwrap_err();
        assert!(matches!(err, SensorError::Config { .. }));
        assert!(bus.log().is_empty(), "nothing may be written on bad config");
    }

    #[tokio::test]
    async fn configure_writes_conf_and_zeroes_thresholds() {
        let mut veml = Veml7700::new(DEFAULT_ADDRESS);
        let mut bus = MockBus::new();
        veml.configure(&mut bus, 25, 0.125).await.unwrap();
        assert_eq!(
            bus.log(),
            vec![
                Txn::WriteReg {
                    address: 0x10,
                    reg: ALS_CONF_0,
                    bytes: vec![0x00, 0x13],
                },
                Txn::WriteReg {
                    address: 0x10,
                    reg: ALS_WH,
                    bytes: vec![0x00, 0x00],
                },
                Txn::WriteReg {
                    address: 0x10,
                    reg: ALS_WL,
                    bytes: vec![0x00, 0x00],
                },
                Txn::WriteReg {
                    address: 0x10,
                    reg: POW_SAV,
                    bytes: vec![0x00, 0x00],
                },
            ]
        );
    }

    #[tokio::test]
    async fn lux_applies_configured_resolution() {
        let mut veml = Veml7700::new(DEFAULT_ADDRESS);
        let mut bus = MockBus::new();
        veml.configure(&mut bus, 25, 1.0).await.unwrap();
        bus.push_response(&[0x64, 0x00]);
        let lux = veml.lux(&mut bus, true).await.unwrap();
        assert!((lux - 100.0 * 0.2304).abs() < 1e-9);
    }

    #[tokio::test]
    async fn lux_before_configure_is_an_error() {
        let mut veml = Veml7700::new(DEFAULT_ADDRESS);
        let mut bus = MockBus::new();
        bus.push_response(&[0x64, 0x00]);
        let err = veml.lux(&mut bus, true).await.unwrap_err();
        assert!(matches!(err, SensorError::NotReady { .. }));
        assert!(bus.log().is_empty(), "no bus traffic before configuration");
    }
}
