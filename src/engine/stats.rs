//! Statistics the engine publishes once per `stats_update_ticks` ticks.
//! Readers load a never-torn snapshot through [`crate::concurrency::PublishSlot`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PacketCounters {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_lost: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportStats {
    pub packet_counters: PacketCounters,
    pub rtt_ms: Option<f64>,
    pub estimated_downlink_kbps: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaStats {
    pub packet_counters: PacketCounters,
    pub transport: TransportStats,
}

/// Counters a single mixer contributes to [`EngineStats`] each publish.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MixerStats {
    pub audio_in_queue_samples: u64,
    pub max_audio_in_queue_samples: u64,
    pub audio_in_queues: u32,
    pub media: MediaStats,
}

impl MixerStats {
    pub fn merge(&mut self, other: &MixerStats) {
        self.audio_in_queue_samples += other.audio_in_queue_samples;
        self.max_audio_in_queue_samples = self
            .max_audio_in_queue_samples
            .max(other.max_audio_in_queue_samples);
        self.audio_in_queues += other.audio_in_queues;
        self.media.packet_counters.packets_sent += other.media.packet_counters.packets_sent;
        self.media.packet_counters.packets_received += other.media.packet_counters.packets_received;
        self.media.packet_counters.bytes_sent += other.media.packet_counters.bytes_sent;
        self.media.packet_counters.bytes_received += other.media.packet_counters.bytes_received;
        self.media.packet_counters.packets_lost += other.media.packet_counters.packets_lost;
    }
}

/// Aggregate engine-wide snapshot, summed from every live mixer's
/// [`MixerStats`] at the moment of publish.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub active_mixers: u32,
    pub tick_count: u64,
    pub avg_idle: f64,
    pub time_slip_count: u64,
    pub poll_period_ms: f64,
    pub mixer_totals: MixerStats,
}
