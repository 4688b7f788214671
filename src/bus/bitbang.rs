use crate::errors::{BusError, BusResult};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};

/// Two-pin clock/data transport for the weight cell.
///
/// Not an addressed bus: one host-driven clock line and one
/// device-driven data line, no chip select. The driver owns its pin
/// pair outright instead of borrowing a shared bus per call.
pub trait TwoWire: Send {
    fn set_clock(&mut self, high: bool) -> BusResult<()>;
    fn data(&mut self) -> BusResult<bool>;
}

/// `TwoWire` over two Linux GPIO character-device lines.
pub struct GpioTwoWire {
    clk: LineHandle,
    dat: LineHandle,
}

impl GpioTwoWire {
    /// Requests `clk` as an output (initially high, the protocol's rest
    /// state) and `dat` as an input on the given gpiochip.
    pub fn new(chip_path: &str, clk_offset: u32, dat_offset: u32) -> BusResult<Self> {
        let mut chip = Chip::new(chip_path).map_err(|e| BusError::Gpio(e.to_string()))?;
        let clk = chip
            .get_line(clk_offset)
            .and_then(|line| line.request(LineRequestFlags::OUTPUT, 1, "hive-sensorhub-clk"))
            .map_err(|e| BusError::Gpio(e.to_string()))?;
        let dat = chip
            .get_line(dat_offset)
            .and_then(|line| line.request(LineRequestFlags::INPUT, 0, "hive-sensorhub-dat"))
            .map_err(|e| BusError::Gpio(e.to_string()))?;
        Ok(Self { clk, dat })
    }
}

impl TwoWire for GpioTwoWire {
    fn set_clock(&mut self, high: bool) -> BusResult<()> {
        self.clk
            .set_value(if high { 1 } else { 0 })
            .map_err(|e| BusError::Gpio(e.to_string()))
    }

    fn data(&mut self) -> BusResult<bool> {
        let value = self
            .dat
            .get_value()
            .map_err(|e| BusError::Gpio(e.to_string()))?;
        Ok(value != 0)
    }
}
