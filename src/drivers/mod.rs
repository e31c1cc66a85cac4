//! Peripheral drivers that sit directly under the port traits.

pub mod board;
pub mod fram;
pub mod i2c_bus;
pub mod lis3dh;
pub mod vl53l1x;
pub mod watchdog;
