//! Raw ADC remapping.
//!
//! Control inputs are wired bipolar: -5 V..+5 V spans the full 12-bit range,
//! so the usable 0..5 V half starts at 2048.

use crate::constants::FACTOR_MAX;

const ZERO_VOLTS: i32 = 2048;
const FULL_SCALE_MV: u32 = 5000;

/// Map a raw bipolar reading onto `0..=4095`.
#[inline]
pub fn unipolar(raw: u16) -> u16 {
    ((raw as i32 - ZERO_VOLTS) * 2).clamp(0, FACTOR_MAX as i32) as u16
}

/// Convert a raw bipolar reading to millivolts in `0..=5000`.
#[inline]
pub fn millivolts(raw: u16) -> u32 {
    unipolar(raw) as u32 * FULL_SCALE_MV / FACTOR_MAX as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_half_reads_zero() {
        assert_eq!(unipolar(0), 0);
        assert_eq!(unipolar(2047), 0);
        assert_eq!(unipolar(2048), 0);
    }

    #[test]
    fn positive_half_doubles() {
        assert_eq!(unipolar(2049), 2);
        assert_eq!(unipolar(3072), 2048);
        assert_eq!(unipolar(4095), 4094);
        assert_eq!(unipolar(u16::MAX), 4095);
    }

    #[test]
    fn millivolt_scale() {
        assert_eq!(millivolts(2048), 0);
        assert_eq!(millivolts(4095), 4094 * 5000 / 4095);
        assert_eq!(millivolts(3072), 2500);
    }
}
