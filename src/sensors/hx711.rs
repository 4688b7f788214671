use crate::bus::bitbang::TwoWire;
use crate::errors::{SensorError, SensorResult};
use tokio::time::{sleep, Duration};
use tracing::debug;

// Bounded ready wait: the data line must drop within this many 1 ms
// polls or the read is abandoned.
const READY_POLL_LIMIT: u32 = 500;

const SETTLE: Duration = Duration::from_millis(1);

/// Input channel / gain selection, expressed as the number of extra
/// clock pulses after the 24 data bits. The pulses configure the *next*
/// conversion, so they are reapplied on every read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelGain {
    A128,
    A64,
    B32,
}

impl ChannelGain {
    fn pulses(self) -> u32 {
        match self {
            ChannelGain::A128 => 1,
            ChannelGain::A64 => 2,
            ChannelGain::B32 => 3,
        }
    }
}

/// Unit-conversion parameters for a weight reading.
#[derive(Debug, Clone, Copy)]
pub struct WeightParams {
    /// kg per count of raw value.
    pub scale: f64,
    /// Subtracted from the raw count before unit conversion.
    pub offset: f64,
    /// Subtracted after conversion to kg.
    pub tare: f64,
}

impl Default for WeightParams {
    fn default() -> Self {
        Self {
            scale: 0.00005,
            offset: 245500.0,
            tare: 0.0,
        }
    }
}

/// HX711 strain-gauge ADC on a dedicated bit-banged pin pair.
///
/// The device has no addressed interface: the host drives the clock
/// line and samples the data line, 24 bits MSB-first per conversion,
/// clock left high at rest.
pub struct Hx711 {
    pins: Box<dyn TwoWire>,
    mode: ChannelGain,
    params: WeightParams,
}

impl Hx711 {
    pub fn new(pins: Box<dyn TwoWire>, params: WeightParams) -> Self {
        Self {
            pins,
            mode: ChannelGain::A128,
            params,
        }
    }

    /// Resets the clock line and latches the channel/gain mode with a
    /// throwaway read.
    pub async fn configure(&mut self, mode: ChannelGain) -> SensorResult<()> {
        self.pins.set_clock(true)?;
        self.set_mode(mode).await
    }

    /// Changes the channel/gain mode. Takes effect on the following
    /// conversion, so one read is spent latching it.
    pub async fn set_mode(&mut self, mode: ChannelGain) -> SensorResult<()> {
        self.mode = mode;
        self.read_raw().await?;
        Ok(())
    }

    /// One 24-bit conversion, returned undecoded.
    pub async fn read_raw(&mut self) -> SensorResult<u32> {
        self.pins.set_clock(true)?;
        sleep(SETTLE).await;
        self.pins.set_clock(false)?;
        sleep(SETTLE).await;

        let mut polls = 0u32;
        while self.pins.data()? {
            sleep(SETTLE).await;
            polls += 1;
            if polls > READY_POLL_LIMIT {
                return Err(SensorError::Timeout { polls });
            }
        }

        let mut val = 0u32;
        for _ in 0..24 {
            self.pins.set_clock(true)?;
            self.pins.set_clock(false)?;
            val = (val << 1) | self.pins.data()? as u32;
        }
        for _ in 0..self.mode.pulses() {
            self.pins.set_clock(true)?;
            self.pins.set_clock(false)?;
        }
        self.pins.set_clock(true)?;
        debug!("[hx711] raw conversion {:#08x}", val);
        Ok(val)
    }

    /// Weight in kg averaged over `cycles` conversions, using the
    /// driver's stored conversion parameters.
    pub async fn weight(&mut self, cycles: u32) -> SensorResult<f64> {
        let params = self.params;
        self.weight_with(cycles, &params).await
    }

    /// Weight in kg with explicit per-call conversion parameters.
    pub async fn weight_with(&mut self, cycles: u32, params: &WeightParams) -> SensorResult<f64> {
        if cycles == 0 {
            return Err(SensorError::Config {
                reason: "averaging cycle count must be at least 1".to_string(),
            });
        }
        let mut sum = 0i64;
        for _ in 0..cycles {
            sum += decode(self.read_raw().await?) as i64;
        }
        let mean = sum as f64 / cycles as f64;
        Ok((mean - params.offset) * params.scale - params.tare)
    }
}

/// Two's-complement decode of the 24-bit conversion value.
fn decode(raw: u32) -> i32 {
    if raw > 0x7FFFFF {
        (raw as i64 - 0x1000000) as i32
    } else {
        raw as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BusResult;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted pin pair. Per conversion the data line reads high for
    /// `ready_polls` samples, then drops (the sample that exits the
    /// ready wait consumes no queued bit), then serves the queued bits.
    /// Clock writes go to a log the test keeps a handle on.
    struct MockTwoWire {
        bits: VecDeque<bool>,
        ready_polls: u32,
        in_bits: bool,
        bits_read: u8,
        clock_log: Arc<Mutex<Vec<bool>>>,
    }

    impl MockTwoWire {
        fn new() -> Self {
            Self {
                bits: VecDeque::new(),
                ready_polls: 0,
                in_bits: false,
                bits_read: 0,
                clock_log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn push_raw(&mut self, raw: u32) {
            for i in (0..24).rev() {
                self.bits.push_back(raw >> i & 1 != 0);
            }
        }
    }

    impl TwoWire for MockTwoWire {
        fn set_clock(&mut self, high: bool) -> BusResult<()> {
            self.clock_log.lock().unwrap().push(high);
            Ok(())
        }

        fn data(&mut self) -> BusResult<bool> {
            if !self.in_bits {
                if self.ready_polls > 0 {
                    self.ready_polls -= 1;
                    return Ok(true);
                }
                self.in_bits = true;
                self.bits_read = 0;
                return Ok(false);
            }
            let bit = self.bits.pop_front().unwrap_or(false);
            self.bits_read += 1;
            if self.bits_read == 24 {
                self.in_bits = false;
            }
            Ok(bit)
        }
    }

    fn hx711_with(pins: MockTwoWire) -> Hx711 {
        Hx711::new(Box::new(pins), WeightParams::default())
    }

    #[test]
    fn twos_complement_decode_endpoints() {
        assert_eq!(decode(0x800000), -8388608);
        assert_eq!(decode(0x7FFFFF), 8388607);
        assert_eq!(decode(0xFFFFFF), -1);
        assert_eq!(decode(0), 0);
    }

    #[tokio::test]
    async fn reads_bits_msb_first() {
        let mut pins = MockTwoWire::new();
        pins.push_raw(0x800001);
        let mut hx = hx711_with(pins);
        assert_eq!(hx.read_raw().await.unwrap(), 0x800001);
    }

    #[tokio::test]
    async fn mode_pulses_follow_the_data_bits() {
        for (mode, pulses) in [
            (ChannelGain::A128, 1usize),
            (ChannelGain::A64, 2),
            (ChannelGain::B32, 3),
        ] {
            let mut pins = MockTwoWire::new();
            pins.push_raw(0);
            let log = pins.clock_log.clone();
            let mut hx = hx711_with(pins);
            hx.mode = mode;
            hx.read_raw().await.unwrap();
            let log = log.lock().unwrap();
            // prefix high+low, 24 bit cycles, mode pulses, final rest high
            assert_eq!(log.len(), 2 + 24 * 2 + pulses * 2 + 1);
            assert_eq!(*log.last().unwrap(), true, "clock must rest high");
        }
    }

    #[tokio::test]
    async fn ready_wait_times_out() {
        let mut pins = MockTwoWire::new();
        pins.ready_polls = u32::MAX;
        let mut hx = hx711_with(pins);
        let err = hx.read_raw().await.unwrap_err();
        assert!(matches!(err, SensorError::Timeout { polls } if polls > READY_POLL_LIMIT));
    }

    #[tokio::test]
    async fn tolerates_a_short_ready_wait() {
        let mut pins = MockTwoWire::new();
        pins.ready_polls = 3;
        pins.push_raw(0x000123);
        let mut hx = hx711_with(pins);
        assert_eq!(hx.read_raw().await.unwrap(), 0x123);
    }

    #[tokio::test]
    async fn averaging_identical_samples_equals_single_read() {
        let raw = 245_500 + 20_000; // one kg at the default scale
        let mut single_pins = MockTwoWire::new();
        single_pins.push_raw(raw);
        let mut hx = hx711_with(single_pins);
        let single = hx.weight(1).await.unwrap();

        let mut avg_pins = MockTwoWire::new();
        for _ in 0..8 {
            avg_pins.push_raw(raw);
        }
        let mut hx = hx711_with(avg_pins);
        let averaged = hx.weight(8).await.unwrap();

        assert!((single - averaged).abs() < 1e-12);
        assert!((single - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn per_call_params_override_defaults() {
        let mut pins = MockTwoWire::new();
        pins.push_raw(1000);
        let mut hx = hx711_with(pins);
        let params = WeightParams {
            scale: 1.0,
            offset: 0.0,
            tare: 500.0,
        };
        let w = hx.weight_with(1, &params).await.unwrap();
        assert!((w - 500.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn zero_cycles_is_a_config_error() {
        let mut hx = hx711_with(MockTwoWire::new());
        assert!(matches!(
            hx.weight(0).await.unwrap_err(),
            SensorError::Config { .. }
        ));
    }
}
