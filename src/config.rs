//! Typed, programmatically-constructed configuration. There is no file or
//! environment-variable loader: construction is always explicit, and every
//! struct here follows the same `Default` + `sanitize()` shape as
//! [`crate::bwe::Config`].

use std::time::Duration;

use crate::codec::g711::Variant as G711Variant;

/// Re-exported under the name used in the specification; the UKF sigma
/// parameters and congestion/silence thresholds live on the estimator's
/// own config type.
pub use crate::bwe::Config as BweConfig;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tick_period: Duration,
    pub max_commands_per_tick: usize,
    pub stats_update_ticks: u64,
    pub max_mixers: usize,
    pub command_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(1),
            max_commands_per_tick: 64,
            stats_update_ticks: 100,
            max_mixers: 4096,
            command_queue_capacity: 4096,
        }
    }
}

impl EngineConfig {
    pub fn sanitize(&mut self) {
        if self.tick_period.is_zero() {
            self.tick_period = Duration::from_millis(1);
        }
        self.max_commands_per_tick = self.max_commands_per_tick.max(1);
        self.stats_update_ticks = self.stats_update_ticks.max(1);
        self.max_mixers = self.max_mixers.clamp(1, 4096);
        self.command_queue_capacity = self.command_queue_capacity.max(self.max_commands_per_tick);
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub name: String,
    pub block_size: usize,
    pub block_count: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            block_size: 1500,
            block_count: 1024,
        }
    }
}

impl PoolConfig {
    pub fn sanitize(&mut self) {
        self.block_size = self.block_size.max(64);
        self.block_count = self.block_count.max(1);
    }
}

#[derive(Debug, Clone)]
pub struct CodecConfig {
    pub g711_variant: G711Variant,
    pub opus_enabled: bool,
    pub opus_sample_rate: u32,
    pub opus_stereo: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            g711_variant: G711Variant::Pcmu,
            opus_enabled: cfg!(feature = "opus"),
            opus_sample_rate: 48_000,
            opus_stereo: true,
        }
    }
}

impl CodecConfig {
    pub fn sanitize(&mut self) {
        if self.opus_sample_rate == 0 {
            self.opus_sample_rate = 48_000;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_sanitize_enforces_minimums() {
        let mut config = EngineConfig {
            tick_period: Duration::ZERO,
            max_commands_per_tick: 0,
            stats_update_ticks: 0,
            max_mixers: 999_999,
            command_queue_capacity: 0,
        };
        config.sanitize();
        assert!(!config.tick_period.is_zero());
        assert_eq!(config.max_commands_per_tick, 1);
        assert_eq!(config.stats_update_ticks, 1);
        assert_eq!(config.max_mixers, 4096);
        assert!(config.command_queue_capacity >= config.max_commands_per_tick);
    }
}
