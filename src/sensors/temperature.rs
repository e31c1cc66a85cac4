//! TMP36 analog temperature probe on a 12-bit ADC.
//!
//! 10 mV/°C with a 500 mV offset, so 0.75 V reads 25 °C.  Counts above
//! half scale (≈ 115 °C) cannot come from a working probe inside the
//! enclosure and are rejected.

const V_REF: f32 = 3.3;
const ADC_COUNTS: f32 = 4096.0;
const OFFSET_V: f32 = 0.5;
const DEG_PER_VOLT: f32 = 100.0;

/// Highest raw count accepted as a genuine reading.
pub const MAX_VALID_RAW: u16 = 2048;

/// Convert a raw count to °C, `None` when the count is implausible.
pub fn celsius_from_raw(raw: u16) -> Option<f32> {
    if raw > MAX_VALID_RAW {
        return None;
    }
    let volts = f32::from(raw) * V_REF / ADC_COUNTS;
    Some((volts - OFFSET_V) * DEG_PER_VOLT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_temperature() {
        // 0.75 V → 25 °C
        let raw = (0.75 / V_REF * ADC_COUNTS) as u16;
        let c = celsius_from_raw(raw).unwrap();
        assert!((c - 25.0).abs() < 0.2, "got {c}");
    }

    #[test]
    fn zero_counts_is_minus_fifty() {
        let c = celsius_from_raw(0).unwrap();
        assert!((c + 50.0).abs() < f32::EPSILON);
    }

    #[test]
    fn above_half_scale_rejected() {
        assert!(celsius_from_raw(2049).is_none());
        assert!(celsius_from_raw(4095).is_none());
    }
}
