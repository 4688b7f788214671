use crate::bus::I2cTransport;
use crate::errors::{SensorError, SensorResult};
use tokio::time::{sleep, Duration};

pub const DEFAULT_ADDRESS: u8 = 0x38; // or 0x39 with a resistor mod

// Commands are REG VALUE NOP where NOPs are 0x00
const CMD_INITIALIZE: [u8; 3] = [0xE1, 0x08, 0x00]; // Calibration ON, Normal mode
const CMD_MEASURE: [u8; 3] = [0xAC, 0x33, 0x00]; // Docs claim 0x33 is related to ADC

const STATUS_BUSY: u8 = 0x80;
const STATUS_CALIBRATED: u8 = 0x08;

// The busy bit is unreliable immediately after trigger, so this is a
// fixed wait keyed to the device conversion time, not a poll loop.
const CONVERSION_DELAY: Duration = Duration::from_millis(75);

/// AHT10 temperature/humidity sensor.
///
/// One driver type, instantiated once per physical unit behind the
/// multiplexer. The caller is responsible for selecting the unit's mux
/// channel before every call that touches the bus.
pub struct Aht10 {
    address: u8,
    data: [u8; 6],
    raw_temp: u32,
    raw_humid: u32,
    /// Per-unit calibration shift, stored as `configured_offset - 50`
    /// so the conversion formula reads `raw/2^20 * 200 + offset`.
    offset: f64,
    configured: bool,
}

impl Aht10 {
    pub fn new(address: u8, offset: f64) -> Self {
        Self {
            address,
            data: [0u8; 6],
            raw_temp: 0,
            raw_humid: 0,
            offset: offset - 50.0,
            configured: false,
        }
    }

    /// Enables calibration and normal mode. Must succeed before any
    /// measurement.
    pub async fn configure(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<()> {
        bus.write(self.address, &CMD_INITIALIZE).await?;
        self.configured = true;
        Ok(())
    }

    /// Triggers a conversion, waits out the conversion time, and
    /// captures a fresh 6-byte frame.
    ///
    /// A set busy bit or a clear calibration bit in the status byte is
    /// a hard error; the caller may retry the whole `measure()`.
    pub async fn measure(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<()> {
        if !self.configured {
            return Err(SensorError::NotReady {
                sensor: "aht10",
                reason: "configure() has not run",
            });
        }
        bus.write(self.address, &CMD_MEASURE).await?;
        sleep(CONVERSION_DELAY).await;
        bus.read(self.address, &mut self.data).await?;

        let status = self.data[0];
        if status & STATUS_BUSY != 0 {
            return Err(SensorError::Busy { status });
        }
        if status & STATUS_CALIBRATED == 0 {
            return Err(SensorError::NotCalibrated { status });
        }

        let (raw_humid, raw_temp) = decode_frame(&self.data);
        self.raw_humid = raw_humid;
        self.raw_temp = raw_temp;
        Ok(())
    }

    pub async fn both(
        &mut self,
        bus: &mut dyn I2cTransport,
        trigger: bool,
    ) -> SensorResult<(f64, f64)> {
        if trigger {
            self.measure(bus).await?;
        }
        Ok((
            temperature_c(self.raw_temp, self.offset),
            humidity_percent(self.raw_humid),
        ))
    }

    pub async fn humidity(&mut self, bus: &mut dyn I2cTransport, trigger: bool) -> SensorResult<f64> {
        if trigger {
            self.measure(bus).await?;
        }
        Ok(humidity_percent(self.raw_humid))
    }

    pub async fn temperature(
        &mut self,
        bus: &mut dyn I2cTransport,
        trigger: bool,
    ) -> SensorResult<f64> {
        if trigger {
            self.measure(bus).await?;
        }
        Ok(temperature_c(self.raw_temp, self.offset))
    }

    /// Dew point in degree C, Magnus formula over a fresh reading.
    pub async fn dew_point(
        &mut self,
        bus: &mut dyn I2cTransport,
        trigger: bool,
    ) -> SensorResult<f64> {
        let (t, h) = self.both(bus, trigger).await?;
        let gamma = (h.log10() - 2.0) / 0.4343 + (17.62 * t) / (243.12 + t);
        Ok(243.12 * gamma / (17.62 - gamma))
    }
}

/// Splits a 6-byte frame into (20-bit humidity, 20-bit temperature).
///
/// Byte 0 is the status byte. Humidity occupies bytes 1-2 and the high
/// nibble of byte 3; temperature the low nibble of byte 3 and bytes 4-5.
fn decode_frame(data: &[u8; 6]) -> (u32, u32) {
    let raw_humid =
        (data[1] as u32) << 12 | (data[2] as u32) << 4 | (data[3] as u32) >> 4;
    let raw_temp =
        ((data[3] & 0x0F) as u32) << 16 | (data[4] as u32) << 8 | (data[5] as u32);
    (raw_humid, raw_temp)
}

fn humidity_percent(raw: u32) -> f64 {
    (raw as f64 / (1 << 20) as f64) * 100.0
}

fn temperature_c(raw: u32, offset: f64) -> f64 {
    (raw as f64 / (1 << 20) as f64) * 200.0 + offset
}
