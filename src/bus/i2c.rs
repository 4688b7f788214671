use crate::bus::I2cTransport;
use crate::errors::{BusError, BusResult};
use async_trait::async_trait;
#[cfg(target_os = "linux")]
use i2cdev::core::I2CDevice;
#[cfg(target_os = "linux")]
use i2cdev::linux::LinuxI2CDevice;

/// Shared I2C bus over the Linux character device.
///
/// The slave address is re-asserted on every transaction: several
/// devices (and the multiplexer itself) share this bus, so no
/// addressing state may persist between calls.
#[cfg(target_os = "linux")]
pub struct I2CBus {
    device: LinuxI2CDevice,
}

#[cfg(not(target_os = "linux"))]
pub struct I2CBus {
    _phantom: std::marker::PhantomData<()>,
}

#[cfg(target_os = "linux")]
impl I2CBus {
    pub fn new(path: &str) -> BusResult<Self> {
        let device = LinuxI2CDevice::new(path, 0).map_err(|e| BusError::I2c(e.to_string()))?;
        Ok(Self { device })
    }

    fn select(&mut self, address: u8) -> BusResult<()> {
        self.device
            .set_slave_address(address as u16)
            .map_err(|e| BusError::I2c(e.to_string()))
    }
}

#[cfg(target_os = "linux")]
#[async_trait]
impl I2cTransport for I2CBus {
    async fn write(&mut self, address: u8, bytes: &[u8]) -> BusResult<()> {
        self.select(address)?;
        self.device
            .write(bytes)
            .map_err(|e| BusError::I2c(e.to_string()))
    }

    async fn read(&mut self, address: u8, buf: &mut [u8]) -> BusResult<()> {
        self.select(address)?;
        self.device
            .read(buf)
            .map_err(|e| BusError::I2c(e.to_string()))
    }

    async fn write_reg(&mut self, address: u8, reg: u8, bytes: &[u8]) -> BusResult<()> {
        self.select(address)?;
        let mut payload = Vec::with_capacity(bytes.len() + 1);
        payload.push(reg);
        payload.extend_from_slice(bytes);
        self.device
            .write(&payload)
            .map_err(|e| BusError::I2c(e.to_string()))
    }

    async fn read_reg(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> BusResult<()> {
        self.select(address)?;

        if buf.len() == 1 {
            // Use SMBus read byte data for single byte reads
            let byte = self
                .device
                .smbus_read_byte_data(reg)
                .map_err(|e| BusError::I2c(e.to_string()))?;
            buf[0] = byte;
        } else {
            // Use SMBus block read for multi-byte reads
            let temp_buf = self
                .device
                .smbus_read_i2c_block_data(reg, buf.len() as u8)
                .map_err(|e| BusError::I2c(e.to_string()))?;
            if temp_buf.len() != buf.len() {
                return Err(BusError::I2c(format!(
                    "short read from {:#04x}/{:#04x}: expected {} bytes, got {}",
                    address,
                    reg,
                    buf.len(),
                    temp_buf.len()
                )));
            }
            buf.copy_from_slice(&temp_buf);
        }

        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl I2CBus {
    pub fn new(_path: &str) -> BusResult<Self> {
        Err(BusError::I2c(
            "I2C is only supported on Linux".to_string(),
        ))
    }
}

#[cfg(not(target_os = "linux"))]
#[async_trait]
impl I2cTransport for I2CBus {
    async fn write(&mut self, _address: u8, _bytes: &[u8]) -> BusResult<()> {
        Err(BusError::I2c("I2C is only supported on Linux".to_string()))
    }

    async fn read(&mut self, _address: u8, _buf: &mut [u8]) -> BusResult<()> {
        Err(BusError::I2c("I2C is only supported on Linux".to_string()))
    }

    async fn write_reg(&mut self, _address: u8, _reg: u8, _bytes: &[u8]) -> BusResult<()> {
        Err(BusError::I2c("I2C is only supported on Linux".to_string()))
    }

    async fn read_reg(&mut self, _address: u8, _reg: u8, _buf: &mut [u8]) -> BusResult<()> {
        Err(BusError::I2c("I2C is only supported on Linux".to_string()))
    }
}
