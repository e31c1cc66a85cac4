//! GPIO / peripheral pin assignments for the TrashPanda sensor board.
//!
//! Single source of truth.  Every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// I²C bus (FRAM, time-of-flight sensor, accelerometer)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 14;
pub const I2C_SCL_GPIO: i32 = 15;
/// Standard mode.  The accelerometer misbehaves at 400 kHz on long leads.
pub const I2C_FREQ_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// Time-of-flight distance sensor (VL53L1X)
// ---------------------------------------------------------------------------

/// Digital output: XSHUT.  LOW holds the sensor in hardware standby.
pub const TOF_XSHUT_GPIO: i32 = 3;
/// Digital input: GPIO1 data-ready line (unused, the driver polls).
pub const TOF_INT_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Accelerometer (LIS3DH)
// ---------------------------------------------------------------------------

/// Digital input: INT1, HIGH on movement above the wake threshold.
pub const ACCEL_INT_GPIO: i32 = 6;

// ---------------------------------------------------------------------------
// Analog inputs (ADC1)
// ---------------------------------------------------------------------------

/// TMP36 enclosure temperature sensor.  ADC1 channel 8 (GPIO 9 on ESP32-S3).
pub const TEMP_ADC_GPIO: i32 = 9;
pub const TEMP_ADC_CHANNEL: u32 = 8;

/// Battery through a 1:2 divider.  ADC1 channel 4 (GPIO 5 on ESP32-S3).
pub const BATTERY_ADC_GPIO: i32 = 5;
pub const BATTERY_ADC_CHANNEL: u32 = 4;
/// Divider ratio applied to the battery ADC reading.
pub const BATTERY_DIVIDER: f32 = 2.0;

// ---------------------------------------------------------------------------
// User switch (active-low with external pull-up)
// ---------------------------------------------------------------------------

/// Held at boot: restore defaults and connect.  Pressed while asleep: wake.
pub const USER_SWITCH_GPIO: i32 = 4;

