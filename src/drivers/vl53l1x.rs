//! VL53L1X time-of-flight distance sensor over I²C.
//!
//! Registers use 16-bit big-endian sub-addresses.  The sensor is held in
//! hardware standby through XSHUT between measurements; every power-up
//! reloads its register defaults, so the orchestrator reprograms the
//! region of interest on each ranging cycle.

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::app::ports::DistanceSensor;
use crate::error::SensorError;

pub const DEFAULT_ADDRESS: u8 = 0x29;

const GPIO_HV_MUX_CTRL: u16 = 0x0030;
const GPIO_TIO_HV_STATUS: u16 = 0x0031;
const ROI_CENTRE_SPAD: u16 = 0x007F;
const ROI_GLOBAL_XY_SIZE: u16 = 0x0080;
const SYSTEM_INTERRUPT_CLEAR: u16 = 0x0086;
const SYSTEM_MODE_START: u16 = 0x0087;
const RESULT_RANGE_MM: u16 = 0x0096;
const FIRMWARE_SYSTEM_STATUS: u16 = 0x00E5;
const IDENTIFICATION_MODEL_ID: u16 = 0x010F;

const MODEL_ID: u16 = 0xEACC;
const MODE_START: u8 = 0x40;
const MODE_STOP: u8 = 0x00;

/// Boot-status polls before giving up on a freshly powered sensor.
const BOOT_POLLS: u32 = 100;

/// Smallest and largest ROI edge in SPADs.
const ROI_MIN: u8 = 4;
const ROI_MAX: u8 = 16;
/// Optical centre forced for ROIs wider than 10 SPADs.
const ROI_WIDE_CENTRE: u8 = 199;

pub struct Vl53l1x<I2C, P> {
    i2c: I2C,
    xshut: P,
    address: u8,
}

impl<I2C: I2c, P: OutputPin> Vl53l1x<I2C, P> {
    pub fn new(i2c: I2C, xshut: P, address: u8) -> Self {
        Self {
            i2c,
            xshut,
            address,
        }
    }

    pub fn release(self) -> (I2C, P) {
        (self.i2c, self.xshut)
    }

    fn read(&mut self, reg: u16, buf: &mut [u8]) -> Result<(), SensorError> {
        self.i2c
            .write_read(self.address, &reg.to_be_bytes(), buf)
            .map_err(|_| SensorError::BusError)
    }

    fn read_u8(&mut self, reg: u16) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.read(reg, &mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self, reg: u16) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.read(reg, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn write_u8(&mut self, reg: u16, value: u8) -> Result<(), SensorError> {
        let [hi, lo] = reg.to_be_bytes();
        self.i2c
            .write(self.address, &[hi, lo, value])
            .map_err(|_| SensorError::BusError)
    }

    fn wait_for_boot(&mut self) -> Result<(), SensorError> {
        for _ in 0..BOOT_POLLS {
            if self.read_u8(FIRMWARE_SYSTEM_STATUS).unwrap_or(0) & 0x01 != 0 {
                return Ok(());
            }
        }
        Err(SensorError::Timeout)
    }

    /// Level GPIO1 shows when a result is waiting.
    fn interrupt_polarity(&mut self) -> Result<u8, SensorError> {
        let mux = self.read_u8(GPIO_HV_MUX_CTRL)?;
        Ok(u8::from(mux & 0x10 == 0))
    }
}

impl<I2C: I2c, P: OutputPin> DistanceSensor for Vl53l1x<I2C, P> {
    fn begin(&mut self) -> Result<(), SensorError> {
        self.power_on();
        self.wait_for_boot().map_err(|_| SensorError::InitFailed)?;
        let id = self
            .read_u16(IDENTIFICATION_MODEL_ID)
            .map_err(|_| SensorError::InitFailed)?;
        if id != MODEL_ID {
            warn!("VL53L1X: unexpected model id {:#06x}", id);
            return Err(SensorError::InitFailed);
        }
        // TODO: upload the vendor default-configuration block (0x2D..0x87)
        // once the board moves off the factory register defaults.
        info!("VL53L1X: ready at {:#04x}", self.address);
        Ok(())
    }

    fn power_on(&mut self) {
        if self.xshut.set_high().is_err() {
            warn!("VL53L1X: XSHUT high failed");
        }
    }

    fn power_off(&mut self) {
        if self.xshut.set_low().is_err() {
            warn!("VL53L1X: XSHUT low failed");
        }
    }

    fn start_ranging(&mut self) -> Result<(), SensorError> {
        self.write_u8(SYSTEM_MODE_START, MODE_START)
    }

    fn stop_ranging(&mut self) -> Result<(), SensorError> {
        self.write_u8(SYSTEM_MODE_START, MODE_STOP)
    }

    fn clear_interrupt(&mut self) -> Result<(), SensorError> {
        self.write_u8(SYSTEM_INTERRUPT_CLEAR, 0x01)
    }

    fn set_region_of_interest(
        &mut self,
        width: u8,
        height: u8,
        center: u8,
    ) -> Result<(), SensorError> {
        let w = width.clamp(ROI_MIN, ROI_MAX);
        let h = height.clamp(ROI_MIN, ROI_MAX);
        let center = if w > 10 || h > 10 { ROI_WIDE_CENTRE } else { center };
        self.write_u8(ROI_CENTRE_SPAD, center)?;
        self.write_u8(ROI_GLOBAL_XY_SIZE, ((h - 1) << 4) | (w - 1))
    }

    fn data_ready(&mut self) -> Result<bool, SensorError> {
        let polarity = self.interrupt_polarity()?;
        let status = self.read_u8(GPIO_TIO_HV_STATUS)?;
        Ok(status & 0x01 == polarity)
    }

    fn distance_mm(&mut self) -> Result<u16, SensorError> {
        self.read_u16(RESULT_RANGE_MM)
    }
}
