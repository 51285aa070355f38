/// Number of 16-bit samples per stream buffer bank.
pub const BANK_SIZE: usize = 4096;

/// Maximum number of loops a single looper channel can hold.
pub const MAX_LOOPS: usize = 8;

/// Largest value accepted by the 12-bit output DAC.
pub const DAC_MAX: u16 = 4095;

/// Upper bound of every 0–4095 control-rate factor (mix, start, length).
pub const FACTOR_MAX: u16 = 4095;

/// Minimum change, in raw control units, before a control value is committed.
pub const CONTROL_CHANGE_THRESHOLD: i32 = 25;

/// Analog controls on a looper are sampled when `t % CONTROL_RATE_MS == 0`.
pub const CONTROL_RATE_MS: u32 = 10;

/// Envelope follower controls are sampled when `t % ENVELOPE_CONTROL_RATE_MS == 0`.
pub const ENVELOPE_CONTROL_RATE_MS: u32 = 100;

/// A trigger must sit low for this long before it can fire again.
pub const DEBOUNCE_MS: u32 = 20;

/// Upper bound (inclusive) of the uniform draw compared against the density control.
pub const DENSITY_RANGE: u32 = 4000;

/// Smallest playback window a streaming source will shrink to, in samples.
pub const MIN_WINDOW_SAMPLES: u32 = 256;

/// Storage reads are issued in chunks of this many bytes (one SD sector).
pub const SECTOR_BYTES: usize = 512;

/// Top-level directory holding loop files: `loops/<subfolder>/<filename>`.
pub const LOOP_ROOT: &str = "loops";
