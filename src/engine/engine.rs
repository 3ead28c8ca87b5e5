//! The single-threaded tick scheduler that owns every mixer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::concurrency::{MpmcQueue, PublishSlot};
use crate::config::EngineConfig;
use crate::mixer::Mixer;

use super::command::Command;
use super::stats::{EngineStats, MixerStats};
use super::MixerHandle;

const EWMA_ALPHA: f64 = 0.1;

/// Owns the mixer table and drives it at a fixed tick period on whatever
/// thread calls [`Engine::run`]. Commands may be pushed from any thread;
/// the stats snapshot may be read from any thread.
pub struct Engine {
    config: EngineConfig,
    mixers: Vec<Option<Box<dyn Mixer>>>,
    free_slots: Vec<MixerHandle>,
    commands: MpmcQueue<Command>,
    stats: Arc<PublishSlot<EngineStats>>,
    running: Arc<AtomicBool>,
    tick_count: u64,
    avg_idle: f64,
    time_slip_count: u64,
    outstanding_handles: AtomicUsize,
}

impl Engine {
    pub fn new(mut config: EngineConfig) -> Self {
        config.sanitize();
        let mixers = (0..config.max_mixers).map(|_| None).collect();
        let commands = MpmcQueue::new(config.command_queue_capacity);
        Self {
            mixers,
            free_slots: Vec::new(),
            commands,
            stats: Arc::new(PublishSlot::new(EngineStats::default())),
            running: Arc::new(AtomicBool::new(false)),
            tick_count: 0,
            avg_idle: 1.0,
            time_slip_count: 0,
            outstanding_handles: AtomicUsize::new(0),
            config,
        }
    }

    /// A handle for the caller's next `AddMixer` command. The slot is
    /// marked reserved but stays `None` in the table until the command
    /// drains.
    pub fn reserve_mixer(&mut self) -> Option<MixerHandle> {
        let handle = self.free_slots.pop().unwrap_or_else(|| {
            let next = self.mixers.len() as MixerHandle;
            next
        });
        if handle as usize >= self.mixers.len() {
            if handle as usize >= self.config.max_mixers {
                return None;
            }
            self.mixers.push(None);
        }
        self.outstanding_handles.fetch_add(1, Ordering::Relaxed);
        Some(handle)
    }

    /// Wait-free from any thread; returns `false` if the intake queue is full.
    pub fn push_command(&self, command: Command) -> bool {
        self.commands.push(command).is_ok()
    }

    pub fn stats(&self) -> Arc<PublishSlot<EngineStats>> {
        self.stats.clone()
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn outstanding_mixers(&self) -> usize {
        self.outstanding_handles.load(Ordering::Relaxed)
    }

    /// Drain up to `max_commands_per_tick` pending commands, applying each
    /// to its target mixer. Commands whose mixer no longer exists are
    /// dropped.
    fn drain_commands(&mut self) {
        for _ in 0..self.config.max_commands_per_tick {
            let Some(command) = self.commands.pop() else {
                break;
            };
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: Command) {
        let target = command.target();
        match command {
            Command::AddMixer(handle, mixer) => {
                if let Some(slot) = self.mixers.get_mut(handle as usize) {
                    *slot = Some(mixer);
                } else {
                    warn!(handle, "AddMixer: handle out of range");
                }
                return;
            }
            Command::RemoveMixer(handle) => {
                if let Some(slot) = self.mixers.get_mut(handle as usize) {
                    if slot.take().is_some() {
                        self.free_slots.push(handle);
                        self.outstanding_handles.fetch_sub(1, Ordering::Relaxed);
                    }
                }
                return;
            }
            _ => {}
        }

        let Some(Some(mixer)) = self.mixers.get_mut(target as usize) else {
            debug!(target, "command dropped: unknown mixer handle");
            return;
        };

        match command {
            Command::AddAudioStream(_, cfg) => mixer.add_audio_stream(cfg.stream_id),
            Command::RemoveAudioStream(_, id) => mixer.remove_audio_stream(id),
            Command::ReconfigureAudioStream(_, cfg) => {
                mixer.remove_audio_stream(cfg.stream_id);
                mixer.add_audio_stream(cfg.stream_id);
            }
            Command::AddVideoStream(_, cfg) => mixer.add_video_stream(cfg.stream_id),
            Command::RemoveVideoStream(_, id) => mixer.remove_video_stream(id),
            Command::ReconfigureVideoStream(_, cfg) => {
                mixer.remove_video_stream(cfg.stream_id);
                mixer.add_video_stream(cfg.stream_id);
            }
            Command::AddDataStream(_, id) => mixer.add_data_stream(id),
            Command::RemoveDataStream(_, id) => mixer.remove_data_stream(id),
            Command::AddRecordingStream(_, id) => mixer.add_data_stream(id),
            Command::RemoveRecordingStream(_, id) => mixer.remove_data_stream(id),
            Command::StartRecording(_)
            | Command::StopRecording(_)
            | Command::StartTransport(_)
            | Command::PinEndpoint(_, _)
            | Command::SendEndpointMessage(_, _, _)
            | Command::SctpControl(_, _)
            | Command::AddPacketCache(_, _) => {
                debug!(target, "command accepted, no core-engine side effect");
            }
            Command::AddMixer(_, _) | Command::RemoveMixer(_) => unreachable!(),
        }
    }

    fn publish_stats(&self) {
        let mut totals = MixerStats::default();
        let mut active = 0u32;
        for mixer in self.mixers.iter().flatten() {
            let mut per_mixer = MixerStats::default();
            mixer.gather_stats(&mut per_mixer);
            totals.merge(&per_mixer);
            active += 1;
        }
        self.stats.publish(EngineStats {
            active_mixers: active,
            tick_count: self.tick_count,
            avg_idle: self.avg_idle,
            time_slip_count: self.time_slip_count,
            poll_period_ms: self.config.tick_period.as_secs_f64() * 1000.0,
            mixer_totals: totals,
        });
    }

    /// Run one tick: drain commands, tick every live mixer, and publish
    /// stats if this tick lands on the publish interval. Returns the work
    /// time so the caller (normally [`Engine::run`]) can compute idle
    /// fraction and sleep to the next boundary.
    pub fn tick_once(&mut self, now_ms: f64) -> Duration {
        let t0 = Instant::now();

        self.drain_commands();
        for mixer in self.mixers.iter_mut().flatten() {
            mixer.tick(now_ms);
        }

        self.tick_count += 1;
        if self.tick_count % self.config.stats_update_ticks == 0 {
            self.publish_stats();
        }

        t0.elapsed()
    }

    fn record_idle_fraction(&mut self, work_time: Duration) {
        let target = self.config.tick_period.as_secs_f64();
        let idle = ((target - work_time.as_secs_f64()) / target).clamp(-1.0, 1.0);
        self.avg_idle = (1.0 - EWMA_ALPHA) * self.avg_idle + EWMA_ALPHA * idle;
        if work_time > self.config.tick_period {
            self.time_slip_count += 1;
        }
    }

    /// Block the calling thread, ticking at `config.tick_period` until
    /// [`Engine::stop_flag`] is cleared. Missed deadlines are recorded as
    /// `time_slip_count` and the loop continues without catching up.
    pub fn run(&mut self) {
        self.running.store(true, Ordering::SeqCst);
        let start = Instant::now();
        let mut next_deadline = start + self.config.tick_period;

        while self.running.load(Ordering::SeqCst) {
            let now_ms = start.elapsed().as_secs_f64() * 1000.0;
            let work_time = self.tick_once(now_ms);
            self.record_idle_fraction(work_time);

            let now = Instant::now();
            if now < next_deadline {
                std::thread::sleep(next_deadline - now);
            }
            next_deadline += self.config.tick_period;
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullMixer {
        ready: bool,
        audio_streams: Vec<u32>,
    }

    impl Mixer for NullMixer {
        fn tick(&mut self, _now_ms: f64) {}
        fn add_audio_stream(&mut self, stream_id: u32) {
            self.audio_streams.push(stream_id);
        }
        fn remove_audio_stream(&mut self, stream_id: u32) {
            self.audio_streams.retain(|s| *s != stream_id);
        }
        fn add_video_stream(&mut self, _stream_id: u32) {}
        fn remove_video_stream(&mut self, _stream_id: u32) {}
        fn add_data_stream(&mut self, _stream_id: u32) {}
        fn remove_data_stream(&mut self, _stream_id: u32) {}
        fn gather_stats(&self, out: &mut MixerStats) {
            out.audio_in_queues = self.audio_streams.len() as u32;
        }
        fn is_ready(&self) -> bool {
            self.ready
        }
    }

    #[test]
    fn add_then_remove_mixer_round_trips_through_a_tick() {
        let mut engine = Engine::new(EngineConfig::default());
        let handle = engine.reserve_mixer().unwrap();
        assert!(engine.push_command(Command::AddMixer(
            handle,
            Box::new(NullMixer { ready: true, audio_streams: Vec::new() })
        )));
        engine.tick_once(0.0);
        assert!(engine.mixers[handle as usize].is_some());

        assert!(engine.push_command(Command::RemoveMixer(handle)));
        engine.tick_once(1.0);
        assert!(engine.mixers[handle as usize].is_none());

        let snapshot = engine.stats();
        let _ = snapshot.load();
    }

    #[test]
    fn command_for_destroyed_mixer_is_dropped_without_panic() {
        let mut engine = Engine::new(EngineConfig::default());
        let handle = engine.reserve_mixer().unwrap();
        engine.push_command(Command::AddAudioStream(
            handle,
            super::super::command::AudioStreamConfig {
                stream_id: 1,
                payload_type: 0,
                sample_rate_hz: 8000,
            },
        ));
        engine.tick_once(0.0);
    }

    #[test]
    fn stats_publish_sums_every_mixer() {
        let mut config = EngineConfig::default();
        config.stats_update_ticks = 1;
        let mut engine = Engine::new(config);
        let handle = engine.reserve_mixer().unwrap();
        engine.push_command(Command::AddMixer(
            handle,
            Box::new(NullMixer { ready: true, audio_streams: vec![1, 2] }),
        ));
        engine.tick_once(0.0);
        let snapshot = engine.stats().load();
        assert_eq!(snapshot.active_mixers, 1);
        assert_eq!(snapshot.mixer_totals.audio_in_queues, 2);
    }
}
