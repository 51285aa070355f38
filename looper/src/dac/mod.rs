//! External DAC drivers.
//!
//! # Feature gate
//!
//! [`Mcp4922`] is available when the `mcp4922` feature is enabled (on by default).

mod mcp4922;

pub use mcp4922::{DacChannel, Gain, Mcp4922};
