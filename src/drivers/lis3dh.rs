//! LIS3DH three-axis accelerometer over I²C.
//!
//! Runs at 100 Hz, ±2 g, high-resolution mode with block data update, so a
//! 1 g axis reads about ±16 000 in the left-justified 16-bit output.
//! INT1 fires on movement above [`MOVEMENT_THRESHOLD`], measured after the
//! high-pass filter so gravity alone never triggers it.

use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::app::ports::{AccelSample, OrientationSensor};
use crate::error::SensorError;

/// SA0 tied low.
pub const DEFAULT_ADDRESS: u8 = 0x18;

const WHO_AM_I: u8 = 0x0F;
const WHO_AM_I_VALUE: u8 = 0x33;
const CTRL_REG1: u8 = 0x20;
const CTRL_REG2: u8 = 0x21;
const CTRL_REG3: u8 = 0x22;
const CTRL_REG4: u8 = 0x23;
const STATUS_REG: u8 = 0x27;
const OUT_X_L: u8 = 0x28;
const INT1_CFG: u8 = 0x30;
const INT1_THS: u8 = 0x32;
const INT1_DURATION: u8 = 0x33;

/// Set on the sub-address to auto-increment across a multi-byte read.
const AUTO_INCREMENT: u8 = 0x80;

/// 100 Hz, normal power, X/Y/Z enabled.
const CTRL1_100HZ_XYZ: u8 = 0x57;
/// High-pass filter on the INT1 path only.
const CTRL2_HP_IA1: u8 = 0x01;
/// IA1 routed to INT1.
const CTRL3_I1_IA1: u8 = 0x40;
/// Block data update, ±2 g, high resolution.
const CTRL4_BDU_HR: u8 = 0x88;
/// OR of the X/Y/Z high events.
const INT1_CFG_XYZ_HIGH: u8 = 0x2A;
const STATUS_ZYXDA: u8 = 0x08;

/// INT1 threshold in 16 mg steps (≈ 256 mg).
pub const MOVEMENT_THRESHOLD: u8 = 16;

pub struct Lis3dh<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Lis3dh<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|_| SensorError::BusError)?;
        Ok(buf[0])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(|_| SensorError::BusError)
    }

    fn read_axes(&mut self) -> Result<Option<AccelSample>, SensorError> {
        if self.read_reg(STATUS_REG)? & STATUS_ZYXDA == 0 {
            return Ok(None);
        }
        let mut raw = [0u8; 6];
        self.i2c
            .write_read(self.address, &[OUT_X_L | AUTO_INCREMENT], &mut raw)
            .map_err(|_| SensorError::BusError)?;
        Ok(Some(AccelSample {
            x: i16::from_le_bytes([raw[0], raw[1]]),
            y: i16::from_le_bytes([raw[2], raw[3]]),
            z: i16::from_le_bytes([raw[4], raw[5]]),
        }))
    }
}

impl<I2C: I2c> OrientationSensor for Lis3dh<I2C> {
    fn begin(&mut self) -> Result<(), SensorError> {
        let id = self.read_reg(WHO_AM_I).map_err(|_| SensorError::InitFailed)?;
        if id != WHO_AM_I_VALUE {
            warn!("LIS3DH: unexpected WHO_AM_I {:#04x}", id);
            return Err(SensorError::InitFailed);
        }

        for (reg, value) in [
            (CTRL_REG1, CTRL1_100HZ_XYZ),
            (CTRL_REG2, CTRL2_HP_IA1),
            (CTRL_REG3, CTRL3_I1_IA1),
            (CTRL_REG4, CTRL4_BDU_HR),
            (INT1_THS, MOVEMENT_THRESHOLD),
            (INT1_DURATION, 0),
            (INT1_CFG, INT1_CFG_XYZ_HIGH),
        ] {
            self.write_reg(reg, value)?;
        }

        info!("LIS3DH: 100 Hz, movement wake on INT1");
        Ok(())
    }

    fn sample(&mut self) -> Option<AccelSample> {
        match self.read_axes() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("LIS3DH: {}", e);
                None
            }
        }
    }
}
