//! MB85RC64 I2C FRAM (8 KiB) driver.
//!
//! FRAM has no page-erase or write-endurance concerns, so the record store
//! writes it in place.  Transfers use a two-byte big-endian memory address
//! followed by data; writes are split into small frames so the on-stack
//! buffer stays bounded.
//!
//! Generic over any `embedded_hal::i2c::I2c`, so the same driver runs on
//! the ESP-IDF I2C peripheral and against a mock bus in tests.

use embedded_hal::i2c::I2c;
use heapless::Vec;
use log::{info, warn};

use crate::app::ports::NvStorage;
use crate::error::StorageError;

/// Default 7-bit address with A0..A2 tied low.
pub const DEFAULT_ADDRESS: u8 = 0x50;

/// MB85RC64 capacity in bytes.
pub const MB85RC64_CAPACITY: usize = 8 * 1024;

/// Data bytes per write frame.
const WRITE_CHUNK: usize = 32;

pub struct Mb85rcFram<I2C> {
    i2c: I2C,
    address: u8,
    capacity: usize,
}

impl<I2C: I2c> Mb85rcFram<I2C> {
    pub fn new(i2c: I2C, address: u8, capacity: usize) -> Self {
        Self {
            i2c,
            address,
            capacity,
        }
    }

    /// Probe the device by reading its first byte.
    pub fn begin(&mut self) -> Result<(), StorageError> {
        let mut probe = [0u8; 1];
        self.i2c
            .write_read(self.address, &[0, 0], &mut probe)
            .map_err(|_| {
                warn!("FRAM: no answer at {:#04x}", self.address);
                StorageError::NotPresent
            })?;
        info!(
            "FRAM: {} bytes at {:#04x}",
            self.capacity, self.address
        );
        Ok(())
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn check_bounds(&self, offset: usize, len: usize) -> Result<(), StorageError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(StorageError::OutOfBounds),
        }
    }
}

impl<I2C: I2c> NvStorage for Mb85rcFram<I2C> {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        self.check_bounds(offset, buf.len())?;
        let addr = (offset as u16).to_be_bytes();
        self.i2c
            .write_read(self.address, &addr, buf)
            .map_err(|_| StorageError::IoError)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        self.check_bounds(offset, data.len())?;
        for (i, chunk) in data.chunks(WRITE_CHUNK).enumerate() {
            let at = (offset + i * WRITE_CHUNK) as u16;
            let mut frame: Vec<u8, { WRITE_CHUNK + 2 }> = Vec::new();
            frame
                .extend_from_slice(&at.to_be_bytes())
                .map_err(|_| StorageError::IoError)?;
            frame
                .extend_from_slice(chunk)
                .map_err(|_| StorageError::IoError)?;
            self.i2c
                .write(self.address, &frame)
                .map_err(|_| StorageError::IoError)?;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
