//! # bridge-media-core
//!
//! The hard core of a real-time conferencing media bridge: the engine loop
//! that ticks conference mixers, the UKF-based downlink bandwidth
//! estimator, the UDP endpoint that demultiplexes STUN/DTLS/RTCP/RTP, and
//! the Opus/G.711 codec adapters that sit behind them.
//!
//! Everything above the UDP wire — signaling, recording file layout,
//! simulcast selection policy — lives outside this crate; see the
//! module docs below for where each piece's responsibility ends.

pub mod bwe;
pub mod classify;
pub mod codec;
pub mod concurrency;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod memory;
pub mod mixer;
pub mod transport;

pub use error::{Error, Result};

/// Commonly used types, re-exported for `use bridge_media_core::prelude::*;`.
pub mod prelude {
    pub use crate::bwe::{BandwidthEstimator, Config as BweConfig};
    pub use crate::codec::{AudioDecoder, AudioEncoder};
    pub use crate::config::{CodecConfig, EngineConfig, PoolConfig};
    pub use crate::engine::{Command, Engine, EngineStats, MixerHandle, MixerStats};
    pub use crate::error::{Error, Result};
    pub use crate::memory::{Packet, Pool, RefCountedPacket};
    pub use crate::mixer::Mixer;
    pub use crate::transport::{EndpointListener, UdpEndpoint};
}
