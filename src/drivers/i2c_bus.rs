//! One I²C peripheral shared by several drivers.
//!
//! FRAM, the time-of-flight sensor and the accelerometer sit on the same
//! bus.  Each driver gets a [`SharedI2c`] handle; a transaction borrows the
//! bus for its duration only.  The control loop is single-threaded, so a
//! `RefCell` is enough.

use core::cell::RefCell;

use embedded_hal::i2c::{ErrorType, I2c, Operation};

pub struct SharedI2c<'a, T> {
    bus: &'a RefCell<T>,
}

impl<'a, T> SharedI2c<'a, T> {
    pub fn new(bus: &'a RefCell<T>) -> Self {
        Self { bus }
    }
}

impl<T: ErrorType> ErrorType for SharedI2c<'_, T> {
    type Error = T::Error;
}

impl<T: I2c> I2c for SharedI2c<'_, T> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.bus.borrow_mut().transaction(address, operations)
    }
}
