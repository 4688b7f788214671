//! Transaction-logging bus doubles for driver and hub tests.

use crate::bus::I2cTransport;
use crate::errors::{BusError, BusResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Txn {
    Write { address: u8, bytes: Vec<u8> },
    Read { address: u8, len: usize },
    WriteReg { address: u8, reg: u8, bytes: Vec<u8> },
    ReadReg { address: u8, reg: u8, len: usize },
}

/// Records every transaction and serves queued responses to reads in
/// FIFO order. With `fail` set, every transaction errors out. The log
/// lives behind an `Arc` so a test can keep a handle after moving the
/// bus into the hub.
#[derive(Default)]
pub struct MockBus {
    log: Arc<Mutex<Vec<Txn>>>,
    pub responses: VecDeque<Vec<u8>>,
    pub fail: bool,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn push_response(&mut self, bytes: &[u8]) {
        self.responses.push_back(bytes.to_vec());
    }

    /// Snapshot of the transaction log.
    pub fn log(&self) -> Vec<Txn> {
        self.log.lock().unwrap().clone()
    }

    /// Shared handle onto the log, usable after the bus is moved away.
    pub fn log_handle(&self) -> Arc<Mutex<Vec<Txn>>> {
        self.log.clone()
    }

    fn record(&self, txn: Txn) {
        self.log.lock().unwrap().push(txn);
    }

    fn check(&self) -> BusResult<()> {
        if self.fail {
            Err(BusError::I2c("mock bus failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn fill(&mut self, buf: &mut [u8]) {
        let response = self.responses.pop_front().unwrap_or_default();
        for (dst, src) in buf.iter_mut().zip(response.iter()) {
            *dst = *src;
        }
    }
}

#[async_trait]
impl I2cTransport for MockBus {
    async fn write(&mut self, address: u8, bytes: &[u8]) -> BusResult<()> {
        self.check()?;
        self.record(Txn::Write {
            address,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    async fn read(&mut self, address: u8, buf: &mut [u8]) -> BusResult<()> {
        self.check()?;
        self.record(Txn::Read {
            address,
            len: buf.len(),
        });
        self.fill(buf);
        Ok(())
    }

    async fn write_reg(&mut self, address: u8, reg: u8, bytes: &[u8]) -> BusResult<()> {
        self.check()?;
        self.record(Txn::WriteReg {
            address,
            reg,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    async fn read_reg(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> BusResult<()> {
        self.check()?;
        self.record(Txn::ReadReg {
            address,
            reg,
            len: buf.len(),
        });
        self.fill(buf);
        Ok(())
    }
}
