use thiserror::Error;

use crate::config::AudioOut;
use crate::constants::MAX_LOOPS;

/// Rejected channel configuration. Returned from construction only; nothing
/// on the sample path can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("channel has no loops")]
    NoSources,
    #[error("{requested} loops requested, at most {MAX_LOOPS} supported")]
    TooManySources { requested: usize },
    #[error("output {0:?} has no timer binding")]
    UnmappedOutput(AudioOut),
    #[error("{needed} stream buffers needed, {available} provided")]
    NotEnoughBuffers { needed: usize, available: usize },
}
