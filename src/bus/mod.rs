pub mod bitbang;
pub mod i2c;
#[cfg(test)]
pub mod mock;

use crate::errors::BusResult;
use async_trait::async_trait;

/// Addressed read/write primitives over the shared I2C bus.
///
/// Drivers borrow a transport per call and never hold it across calls;
/// the hub owns the single concrete bus. Both raw (address-only) and
/// register-addressed transactions are needed: the multiplexer and the
/// AHT10 speak raw byte streams, the BMP180 and VEML7700 are
/// register-addressed.
#[async_trait]
pub trait I2cTransport: Send {
    async fn write(&mut self, address: u8, bytes: &[u8]) -> BusResult<()>;
    async fn read(&mut self, address: u8, buf: &mut [u8]) -> BusResult<()>;
    async fn write_reg(&mut self, address: u8, reg: u8, bytes: &[u8]) -> BusResult<()>;
    async fn read_reg(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> BusResult<()>;
}
