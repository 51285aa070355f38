//! Control-rate input conditioning.
//!
//! Everything here runs from [`Channel::timer_tick`](crate::channel::Channel::timer_tick),
//! never from the sample interrupt.

pub mod analog;
mod debounce;
mod hysteresis;

pub use debounce::Debouncer;
pub use hysteresis::Hysteresis;
