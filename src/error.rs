//! Crate-wide error type.
//!
//! Resource exhaustion (pool empty, queue full) and malformed-input
//! conditions on hot paths are represented as `Option`/`bool` returns or
//! counters, not `Error` — see `memory::pool`, `concurrency::queue` and
//! `transport::endpoint`. `Error` is reserved for setup-time and
//! configuration failures a caller can act on.

use thiserror::Error;

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type used throughout this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A command referenced a mixer handle that does not exist in the engine's table.
    #[error("unknown mixer handle: {0:?}")]
    UnknownMixer(crate::engine::MixerHandle),

    /// A codec failed to encode or decode a frame.
    #[error("codec error: {0}")]
    Codec(String),

    /// A bandwidth estimator configuration had a non-positive or otherwise invalid parameter.
    #[error("invalid bandwidth estimator configuration: {0}")]
    BweConfig(String),

    /// A configuration value failed validation after `sanitize()`.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Underlying I/O error (socket setup, bind, etc).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for errors that don't warrant their own variant.
    #[error("{0}")]
    Other(String),
}
