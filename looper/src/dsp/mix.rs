//! Two-stream mixing algorithms.

use super::intrinsics::saturate16;

/// How the two active loops of a channel are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MixMode {
    /// Play the first active loop only; the mix trigger is ignored.
    #[default]
    None,
    /// Play the first active loop; the mix trigger steps through loops.
    Toggle,
    /// Crossfade between the two active loops by the mix factor.
    Blend,
    /// Jump between streams each time their samples coincide.
    Glitch,
    /// Bitwise XOR of both streams.
    Xor,
    /// Bitwise AND of both streams.
    And,
    /// Ring modulation (`a * b >> 16`).
    Ring,
}

impl MixMode {
    /// Parse a patch mode name. Unknown names fall back to [`MixMode::None`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "toggle" => MixMode::Toggle,
            "blend" => MixMode::Blend,
            "glitch" => MixMode::Glitch,
            "xor" => MixMode::Xor,
            "and" => MixMode::And,
            "ring" => MixMode::Ring,
            _ => MixMode::None,
        }
    }

    /// Whether the second active stream is pulled on every tick.
    #[inline(always)]
    pub const fn uses_second(self) -> bool {
        !matches!(self, MixMode::None | MixMode::Toggle)
    }

    /// Whether the mix trigger steps through the loop bank in this mode.
    pub const fn steps_on_trigger(self) -> bool {
        !matches!(self, MixMode::None | MixMode::Blend)
    }
}

/// Per-channel mixer state.
///
/// All modes are pure functions of `(a, b, factor)` except [`MixMode::Glitch`],
/// which keeps one stream-select flag, and [`MixMode::Blend`], which XORs in the
/// caller-supplied dither bit.
#[derive(Debug, Clone)]
pub struct Mixer {
    mode: MixMode,
    glitch_stream: bool,
}

impl Mixer {
    pub const fn new(mode: MixMode) -> Self {
        Mixer {
            mode,
            glitch_stream: false,
        }
    }

    pub fn mode(&self) -> MixMode {
        self.mode
    }

    /// `true` while GLITCH mode is emitting the second stream.
    pub fn glitch_stream(&self) -> bool {
        self.glitch_stream
    }

    /// Combine one sample from each stream.
    ///
    /// `factor` is the 0–4095 blend position (0 = all `a`). `dither` is one
    /// random bit, only consumed by BLEND.
    #[inline(always)]
    pub fn mix(&mut self, a: i16, b: i16, factor: u16, dither: bool) -> i16 {
        let (a32, b32) = (a as i32, b as i32);
        match self.mode {
            MixMode::None | MixMode::Toggle => a,
            MixMode::And => a & b,
            MixMode::Xor => a ^ b,
            MixMode::Blend => {
                let m = factor.min(4095) as i32;
                let v1 = (a32 * (4096 - m)) >> 12;
                let v2 = (b32 * m) >> 12;
                saturate16((v1 + v2) ^ dither as i32)
            }
            MixMode::Glitch => {
                self.glitch_stream ^= a == b;
                if self.glitch_stream {
                    b
                } else {
                    a
                }
            }
            MixMode::Ring => ((a32 * b32) >> 16) as i16,
        }
    }
}
