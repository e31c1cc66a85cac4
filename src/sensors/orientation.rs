//! Lid orientation from the accelerometer z axis.

use crate::app::ports::AccelSample;
use crate::status::LidOrientation;

/// Raw z magnitude beyond which the lid counts as flat (≈ 0.6 g at ±2 g full scale).
pub const Z_FLAT_THRESHOLD: i16 = 10_000;

pub fn classify(sample: Option<AccelSample>) -> LidOrientation {
    match sample {
        None => LidOrientation::Unknown,
        Some(s) if s.z > Z_FLAT_THRESHOLD => LidOrientation::RightSideUp,
        Some(s) if s.z < -Z_FLAT_THRESHOLD => LidOrientation::UpsideDown,
        Some(_) => LidOrientation::Side,
    }
}
