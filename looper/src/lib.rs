//! # looper
//!
//! A `no_std`, zero-allocation engine that streams pre-recorded loops from slow
//! block storage and mixes them into a 12-bit DAC at audio rate, for modular
//! synthesizer controllers.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Seams | [`hal`] / [`storage`] | DAC, ADC, trigger, timer and file traits |
//! | Sources | [`source`] | In-memory tables and ping-pong streamed files |
//! | Control | [`control`] | Debounce, hysteresis, ADC remapping |
//! | DSP | [`dsp`] | Saturation, mix modes, bit crushing |
//! | Channels | [`channel`] | Looper and envelope follower |
//! | Setup | [`config`] / [`error`] | Typed patch configuration |
//! | Drivers | [`dac`] | MCP4922 SPI DAC (feature-gated) |
//!
//! ## Execution model
//!
//! Every channel is split in two. The cooperative half runs from the main
//! loop once per millisecond and does all storage I/O and control handling.
//! The voice half runs in the channel's timer interrupt, costs O(1) per
//! sample and never blocks. They share nothing but atomics.
//!
//! ```ignore
//! static SHARED: LooperShared = LooperShared::new();
//!
//! let pairs = open_loops(&mut sd, &config.loops, &mut buffers, true)?;
//! let (mut looper, voice) = Looper::create(
//!     &config,
//!     pairs,
//!     &SHARED,
//!     LooperInputs::resolve(&config.pins, board::digital, board::analog),
//!     ChannelOutput { bindings: &board::BINDINGS, clock: &mut timers, dac },
//!     SmallRng::seed_from_u64(board::entropy()),
//! )?;
//!
//! // Timer interrupt:
//! voice.interrupt_tick();
//!
//! // Main loop, every millisecond:
//! looper.timer_tick(millis);
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `mcp4922` | yes | MCP4922 DAC driver over `embedded-hal` SPI |
//!
//! ## Audio parameters
//!
//! - **Bank size:** 4096 samples ([`constants::BANK_SIZE`])
//! - **Sample rates:** 10 000 to 48 000 Hz ([`config::SampleRate`])
//! - **Sample format:** `i16` little-endian on storage, 12-bit unsigned at the DAC
//! - **Loops per channel:** up to 8 ([`constants::MAX_LOOPS`])

#![no_std]

#[cfg(test)]
extern crate std;

pub mod constants;
pub mod error;
pub mod hal;
pub mod storage;
pub mod source;
pub mod control;
pub mod dsp;
pub mod config;
pub mod channel;

#[cfg(feature = "mcp4922")]
pub mod dac;

#[cfg(test)]
mod testutil;
