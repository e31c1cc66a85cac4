//! Fill-level arithmetic: distance → height → percent full.
//!
//! The distance sensor sits in the lid looking down.  A short distance
//! means the can is full.
//!
//! ```text
//!   lid ─┬─────────────  0 in
//!        │  full  ······  9 in   (100 %)
//!        │
//!        │  empty ······ 38 in   (  0 %)
//! ```

use crate::status::Calibration;

/// Millimetres → inches.
pub const INCHES_PER_MM: f32 = 0.039_370_1;

/// Below this a can counts as emptied…
pub const EMPTIED_BELOW_PERCENT: f32 = 20.0;
/// …provided it was above this at the previous reading.
pub const EMPTIED_FROM_PERCENT: f32 = 30.0;

/// Whole inches from a raw distance, clamped into the calibration band.
/// Non-finite input is treated as zero before clamping.
pub fn height_inches(distance_mm: f32, calibration: Calibration) -> i32 {
    let inches = distance_mm * INCHES_PER_MM;
    let inches = if inches.is_finite() { inches as i32 } else { 0 };
    inches.clamp(calibration.full_inches, calibration.empty_inches)
}

/// Percent full for a clamped height.
pub fn percent_full(height_inches: i32, calibration: Calibration) -> f32 {
    let span = (calibration.empty_inches - calibration.full_inches) as f32;
    if span <= 0.0 {
        return 0.0;
    }
    let above_full = (height_inches - calibration.full_inches) as f32;
    ((span - above_full) / span * 100.0).clamp(0.0, 100.0)
}

/// A can was emptied if it dropped from above 30 % to below 20 %.
pub fn was_emptied(previous_percent: f32, new_percent: f32) -> bool {
    new_percent < EMPTIED_BELOW_PERCENT && previous_percent > EMPTIED_FROM_PERCENT
}
