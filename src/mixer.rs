//! The contract the engine calls on every conference mixer it owns.
//!
//! Beyond these five methods the engine treats a mixer as opaque: stream
//! lifecycle, recording, and per-endpoint pinning are all variant-specific
//! payloads the mixer interprets itself (see [`crate::engine::Command`]).

use crate::engine::stats::MixerStats;

pub trait Mixer: Send {
    /// Advance this mixer by one engine tick. `now_ms` is the engine's
    /// monotonic tick clock, not wall time.
    fn tick(&mut self, now_ms: f64);

    fn add_audio_stream(&mut self, stream_id: u32);
    fn remove_audio_stream(&mut self, stream_id: u32);
    fn add_video_stream(&mut self, stream_id: u32);
    fn remove_video_stream(&mut self, stream_id: u32);
    fn add_data_stream(&mut self, stream_id: u32);
    fn remove_data_stream(&mut self, stream_id: u32);

    /// Merge this mixer's counters into `out`.
    fn gather_stats(&self, out: &mut MixerStats);

    /// Whether the mixer has enough configured state to usefully tick.
    fn is_ready(&self) -> bool;
}
