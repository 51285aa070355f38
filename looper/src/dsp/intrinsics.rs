//! ARM DSP instruction wrappers with pure-Rust fallbacks.
//!
//! On `thumbv7em` targets these compile to single-cycle saturating
//! instructions. Host tests and Cortex-M0 parts use the portable versions.

/// Saturate an `i32` to `i16` range (`-32768..=32767`).
///
/// Maps to ARM `SSAT #16`.
#[inline(always)]
pub fn saturate16(val: i32) -> i16 {
    #[cfg(all(target_arch = "arm", target_feature = "dsp"))]
    {
        let out: i32;
        unsafe {
            core::arch::asm!(
                "ssat {out}, #16, {val}",
                out = out(reg) out,
                val = in(reg) val,
            );
        }
        out as i16
    }
    #[cfg(not(all(target_arch = "arm", target_feature = "dsp")))]
    {
        if val > i16::MAX as i32 {
            i16::MAX
        } else if val < i16::MIN as i32 {
            i16::MIN
        } else {
            val as i16
        }
    }
}

/// Unsigned saturate to `0..=(2^BITS - 1)`.
///
/// Maps to ARM `USAT`. Used to pin DAC codes into the converter's range.
#[inline(always)]
pub fn unsigned_saturate<const BITS: u32>(val: i32) -> u16 {
    #[cfg(all(target_arch = "arm", target_feature = "dsp"))]
    {
        let out: i32;
        unsafe {
            core::arch::asm!(
                "usat {out}, #{bits}, {val}",
                out = out(reg) out,
                val = in(reg) val,
                bits = const BITS,
            );
        }
        out as u16
    }
    #[cfg(not(all(target_arch = "arm", target_feature = "dsp")))]
    {
        let max = (1i32 << BITS) - 1;
        if val > max {
            max as u16
        } else if val < 0 {
            0
        } else {
            val as u16
        }
    }
}
