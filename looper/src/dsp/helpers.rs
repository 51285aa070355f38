//! Output conversion and bit-depth reduction.

use super::intrinsics::unsigned_saturate;

/// Bit-crush masks, index 0 = full resolution, index 15 = one bit left.
pub const BIT_CRUSH_MASK: [u16; 16] = [
    0xFFFF, 0xFFFE, 0xFFFC, 0xFFF8, 0xFFF0, 0xFFE0, 0xFFC0, 0xFF80, 0xFF00, 0xFE00, 0xFC00,
    0xF800, 0xF000, 0xE000, 0xC000, 0x8000,
];

/// Apply a bit-depth mask to a signed sample.
#[inline(always)]
pub fn crush(sample: i16, mask: u16) -> i16 {
    ((sample as u16) & mask) as i16
}

/// Look up the crush mask for a 0–4095 control value.
#[inline]
pub fn crush_mask_for(control: u16) -> u16 {
    BIT_CRUSH_MASK[((control >> 8) as usize).min(BIT_CRUSH_MASK.len() - 1)]
}

/// Convert a signed 16-bit sample to a 12-bit unsigned DAC code.
///
/// `-32768` maps to 0, `0` to 2048 and `32767` to 4095.
#[inline(always)]
pub fn to_dac(sample: i16) -> u16 {
    unsigned_saturate::<12>((sample as i32 + 0x8000) >> 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_dac_covers_full_range() {
        assert_eq!(to_dac(i16::MIN), 0);
        assert_eq!(to_dac(0), 2048);
        assert_eq!(to_dac(i16::MAX), 4095);
        assert_eq!(to_dac(-16), 2047);
    }

    #[test]
    fn crush_masks_low_bits() {
        assert_eq!(crush(0x1234, BIT_CRUSH_MASK[0]), 0x1234);
        assert_eq!(crush(0x1237, BIT_CRUSH_MASK[2]), 0x1234);
        assert_eq!(crush(0x7FFF, BIT_CRUSH_MASK[15]), 0);
        assert_eq!(crush(-1, BIT_CRUSH_MASK[15]), i16::MIN);
    }

    #[test]
    fn crush_mask_for_spans_table() {
        assert_eq!(crush_mask_for(0), 0xFFFF);
        assert_eq!(crush_mask_for(255), 0xFFFF);
        assert_eq!(crush_mask_for(256), 0xFFFE);
        assert_eq!(crush_mask_for(4095), 0x8000);
        assert_eq!(crush_mask_for(u16::MAX), 0x8000);
    }
}
