use crate::bus::I2cTransport;
use crate::errors::{SensorError, SensorResult};

pub const DEFAULT_ADDRESS: u8 = 0x70;

/// PCA9548-style 8-channel I2C multiplexer.
///
/// Deliberately stateless: no "currently selected channel" is cached
/// anywhere. Every driver behind the mux must re-select its channel
/// immediately before each transaction, because any other driver may
/// have moved the mux since. Caching the selection across driver
/// boundaries is unsound as soon as a second multiplexed device exists.
pub struct Pca9548 {
    address: u8,
}

impl Pca9548 {
    pub fn new(address: u8) -> Self {
        Self { address }
    }

    /// Connects sub-bus `channel` (0..=7) by writing the one-hot mask
    /// `1 << channel` to the control register.
    pub async fn select(&self, bus: &mut dyn I2cTransport, channel: u8) -> SensorResult<()> {
        if channel > 7 {
            return Err(SensorError::Config {
                reason: format!("mux channel {} out of range 0..=7", channel),
            });
        }
        bus.write(self.address, &[1 << channel]).await?;
        Ok(())
    }

    /// Reads back the current channel mask, for diagnostics only.
    pub async fn get_state(&self, bus: &mut dyn I2cTransport) -> SensorResult<u8> {
        let mut buf = [0u8; 1];
        bus.read(self.address, &mut buf).await?;
        Ok(buf[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{MockBus, Txn};

    #[tokio::test]
    async fn select_writes_one_hot_mask() {
        let mux = Pca9548::new(DEFAULT_ADDRESS);
        let mut bus = MockBus::new();
        mux.select(&mut bus, 3).await.unwrap();
        assert_eq!(
            bus.log(),
            vec![Txn::Write {
                address: 0x70,
                bytes: vec![0x08],
            }]
        );
    }

    #[tokio::test]
    async fn select_rejects_out_of_range_channel() {
        let mux = Pca9548::new(DEFAULT_ADDRESS);
        let mut bus = MockBus::new();
        let err = mux.select(&mut bus, 8).await.unwrap_err();
        assert!(matches!(err, SensorError::Config { .. }));
        assert!(bus.log().is_empty());
    }

    #[tokio::test]
    async fn get_state_reads_mask() {
        let mux = Pca9548::new(DEFAULT_ADDRESS);
        let mut bus = MockBus::new();
        bus.push_response(&[0x04]);
        assert_eq!(mux.get_state(&mut bus).await.unwrap(), 0x04);
    }
}
