use crate::bus::I2cTransport;
use crate::errors::{SensorError, SensorResult};
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

pub const DEFAULT_ADDRESS: u8 = 0x77;

// Register addresses for the BMP180
const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIBRATION: u8 = 0xAA; // AC1..MD, 22 bytes big-endian
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_OUT: u8 = 0xF6;

const CMD_READ_TEMPERATURE: u8 = 0x2E;
const CMD_READ_PRESSURE_BASE: u8 = 0x34;

const CHIP_ID: u8 = 0x55;

const TEMPERATURE_DELAY: Duration = Duration::from_millis(5);
// Pressure conversion time indexed by oversampling setting. The device
// has no ready flag that works across all settings, so these are
// unconditional waits.
const PRESSURE_DELAY_MS: [u64; 4] = [5, 8, 14, 25];

// Hardware settling: full measurement cycles to run at configuration
// time before the coefficients are trusted.
const WARM_UP_CYCLES: u32 = 128;

/// Compensation coefficients from the device EEPROM, read once at
/// configuration time and immutable thereafter.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl Calibration {
    fn from_eeprom(raw: &[u8; 22]) -> Self {
        let be16 = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]);
        let beu16 = |i: usize| u16::from_be_bytes([raw[i], raw[i + 1]]);
        Self {
            ac1: be16(0),
            ac2: be16(2),
            ac3: be16(4),
            ac4: beu16(6),
            ac5: beu16(8),
            ac6: beu16(10),
            b1: be16(12),
            b2: be16(14),
            mb: be16(16),
            mc: be16(18),
            md: be16(20),
        }
    }
}

/// BMP180 barometer.
///
/// Measurement is a two-phase, time-gated sequence: a temperature
/// conversion, then a pressure conversion whose wait depends on the
/// oversampling setting. The hub is strictly sequential, so `measure()`
/// runs both phases to completion synchronously.
///
/// Temperature conversion produces the intermediate term `B5` that the
/// pressure conversion consumes, so for any given sample `temperature()`
/// must run before `pressure()`. The driver enforces this: committing a
/// fresh sample clears the held `B5`.
pub struct Bmp180 {
    address: u8,
    oversampling: u8, // 0..=3
    /// Pressure at an altitude of zero, Pa.
    baseline: f64,
    chip_id: [u8; 2],
    cal: Option<Calibration>,
    ut: Option<u16>,
    up_bytes: Option<[u8; 3]>,
    b5: Option<f64>,
}

impl Bmp180 {
    pub fn new(address: u8, oversampling: u8) -> SensorResult<Self> {
        if oversampling > 3 {
            return Err(SensorError::Config {
                reason: format!("oversampling setting {} out of range 0..=3", oversampling),
            });
        }
        Ok(Self {
            address,
            oversampling,
            baseline: 101325.0,
            chip_id: [0; 2],
            cal: None,
            ut: None,
            up_bytes: None,
            b5: None,
        })
    }

    /// Reads the chip id and calibration EEPROM, then runs the
    /// settling warm-up. Must succeed before any conversion.
    pub async fn configure(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<()> {
        bus.read_reg(self.address, REG_CHIP_ID, &mut self.chip_id)
            .await?;
        if self.chip_id[0] != CHIP_ID {
            // Diagnostic only; an unexpected id does not fail configuration.
            warn!(
                "[bmp180] unexpected chip id {:#04x} (expected {:#04x})",
                self.chip_id[0], CHIP_ID
            );
        }

        let mut raw = [0u8; 22];
        bus.read_reg(self.address, REG_CALIBRATION, &mut raw).await?;
        let cal = Calibration::from_eeprom(&raw);
        debug!("[bmp180] calibration: {:?}", cal);
        self.cal = Some(cal);

        for _ in 0..WARM_UP_CYCLES {
            self.measure(bus).await?;
        }
        Ok(())
    }

    /// Calibration coefficients, available once configured.
    pub fn calibration(&self) -> Option<&Calibration> {
        self.cal.as_ref()
    }

    /// Runs both conversion phases and captures a fresh raw sample.
    ///
    /// A transport failure in either phase leaves the previously held
    /// sample untouched; partial results are never committed.
    pub async fn measure(&mut self, bus: &mut dyn I2cTransport) -> SensorResult<()> {
        // Phase A: uncompensated temperature.
        bus.write_reg(self.address, REG_CTRL_MEAS, &[CMD_READ_TEMPERATURE])
            .await?;
        sleep(TEMPERATURE_DELAY).await;
        let mut ut = [0u8; 2];
        bus.read_reg(self.address, REG_OUT, &mut ut).await?;

        // Phase B: uncompensated pressure, wait keyed to oversampling.
        let cmd = CMD_READ_PRESSURE_BASE + (self.oversampling << 6);
        bus.write_reg(self.address, REG_CTRL_MEAS, &[cmd]).await?;
        sleep(Duration::from_millis(
            PRESSURE_DELAY_MS[self.oversampling as usize],
        ))
        .await;
        let mut up = [0u8; 3];
        bus.read_reg(self.address, REG_OUT, &mut up).await?;

        self.ut = Some(u16::from_be_bytes(ut));
        self.up_bytes = Some(up);
        // New sample: the old B5 no longer applies.
        self.b5 = None;
        Ok(())
    }

    /// Temperature in degree C. Stores `B5` for the pressure
    /// conversion on the same sample.
    pub async fn temperature(
        &mut self,
        bus: &mut dyn I2cTransport,
        trigger: bool,
    ) -> SensorResult<f64> {
        if trigger {
            self.measure(bus).await?;
        }
        let cal = self.cal.ok_or(SensorError::NotReady {
            sensor: "bmp180",
            reason: "configure() has not run",
        })?;
        let ut = self.ut.ok_or(SensorError::NotReady {
            sensor: "bmp180",
            reason: "no temperature sample captured",
        })?;
        let (b5, t) = compensate_temperature(&cal, ut);
        self.b5 = Some(b5);
        Ok(t)
    }

    /// Pressure in Pa. Requires `temperature()` to have run on the
    /// current sample (it establishes `B5`).
    pub async fn pressure(
        &mut self,
        bus: &mut dyn I2cTransport,
        trigger: bool,
    ) -> SensorResult<f64> {
        if trigger {
            self.temperature(bus, true).await?;
        }
        let cal = self.cal.ok_or(SensorError::NotReady {
            sensor: "bmp180",
            reason: "configure() has not run",
        })?;
        let [msb, lsb, xlsb] = self.up_bytes.ok_or(SensorError::NotReady {
            sensor: "bmp180",
            reason: "no pressure sample captured",
        })?;
        let b5 = self.b5.ok_or(SensorError::NotReady {
            sensor: "bmp180",
            reason: "temperature conversion has not run for this sample",
        })?;
        let up = unpack_up(msb, lsb, xlsb, self.oversampling);
        Ok(compensate_pressure(&cal, b5, up, self.oversampling))
    }

    /// Altitude in m above the baseline pressure.
    ///
    /// Returns the 0.0 sentinel on any failure, including math-domain
    /// failures on the pressure ratio. This is inconsistent with the
    /// absent-on-failure convention used everywhere else; callers that
    /// need the failure distinction should use `pressure()`.
    pub async fn altitude(&mut self, bus: &mut dyn I2cTransport, trigger: bool) -> f64 {
        match self.pressure(bus, trigger).await {
            Ok(p) => altitude_m(p, self.baseline),
            Err(e) => {
                debug!("[bmp180] altitude unavailable: {}", e);
                0.0
            }
        }
    }
}

/// Temperature compensation. Returns `(B5, degree_C)`.
fn compensate_temperature(cal: &Calibration, ut: u16) -> (f64, f64) {
    let x1 = (ut as f64 - cal.ac6 as f64) * cal.ac5 as f64 / (1 << 15) as f64;
    let x2 = cal.mc as f64 * (1 << 11) as f64 / (x1 + cal.md as f64);
    let b5 = x1 + x2;
    let t = ((b5 + 8.0) / (1 << 4) as f64) / 10.0;
    (b5, t)
}

/// 19-bit uncompensated pressure from the MSB/LSB/XLSB burst.
fn unpack_up(msb: u8, lsb: u8, xlsb: u8, oversampling: u8) -> u32 {
    (((msb as u32) << 16) + ((lsb as u32) << 8) + xlsb as u32) >> (8 - oversampling)
}

/// Pressure compensation per the vendor reference algorithm, Pa.
///
/// Carried out in floats, including the truncating integer cast on the
/// inner sum of B3.
fn compensate_pressure(cal: &Calibration, b5: f64, up: u32, oversampling: u8) -> f64 {
    let b6 = b5 - 4000.0;
    let x1 = (cal.b2 as f64 * (b6 * b6 / (1 << 12) as f64)) / (1 << 11) as f64;
    let x2 = cal.ac2 as f64 * b6 / (1 << 11) as f64;
    let x3 = x1 + x2;
    let b3 =
        (((((cal.ac1 as f64 * 4.0 + x3).trunc() as i64) << oversampling) + 2) as f64) / 4.0;
    let x1 = cal.ac3 as f64 * b6 / (1 << 13) as f64;
    let x2 = (cal.b1 as f64 * (b6 * b6 / (1 << 12) as f64)) / (1 << 16) as f64;
    let x3 = (x1 + x2 + 2.0) / 4.0;
    let b4 = cal.ac4 as f64 * (x3 + 32768.0) / (1 << 15) as f64;
    let b7 = (up as f64 - b3) * (50000u32 >> oversampling) as f64;
    let pressure = if b7 < 0x80000000u32 as f64 {
        (b7 * 2.0) / b4
    } else {
        (b7 / b4) * 2.0
    };
    let x1 = (pressure / (1 << 8) as f64).powi(2);
    let x1 = (x1 * 3038.0) / (1 << 16) as f64;
    let x2 = (-7357.0 * pressure) / (1 << 16) as f64;
    pressure + (x1 + x2 + 3791.0) / (1 << 4) as f64
}

/// `-7990 * ln(p / baseline)`, 0.0 when the ratio is not positive.
fn altitude_m(pressure: f64, baseline: f64) -> f64 {
    let ratio = pressure / baseline;
    if ratio > 0.0 {
        -7990.0 * ratio.ln()
    } else {
        0.0
    }
}
