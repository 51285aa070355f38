//! Sample arithmetic used on the interrupt path.
//!
//! Everything here is allocation-free, branch-light and total over its
//! input domain, so it can be called from the sample-rate ISR.

pub mod intrinsics;
pub mod helpers;
mod mix;

pub use mix::{MixMode, Mixer};
