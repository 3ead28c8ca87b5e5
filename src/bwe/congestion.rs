//! Congestion sub-state layered on top of the UKF delay estimate: how long
//! delay has been rising, how hard to clamp the reported bitrate while it
//! is, and the Schmitt-trigger ("flank latch") that counts discrete
//! congestion "dips" rather than reacting to every noisy sample.

/// A Schmitt trigger: flips on once `value` clears `on_threshold`, only
/// flips back off once it falls below `off_threshold`. `update` reports
/// whether *this* call was the rising edge.
#[derive(Debug, Clone, Copy)]
pub struct FlankLatch {
    on_threshold: f64,
    off_threshold: f64,
    state: bool,
}

impl FlankLatch {
    pub fn new(on_threshold: f64, off_threshold: f64) -> Self {
        Self {
            on_threshold,
            off_threshold,
            state: false,
        }
    }

    /// Returns `true` exactly on the sample that switches the latch on.
    pub fn update(&mut self, value: f64) -> bool {
        let was_on = self.state;
        if !self.state && value > self.on_threshold {
            self.state = true;
        } else if self.state && value < self.off_threshold {
            self.state = false;
        }
        self.state && !was_on
    }

    pub fn is_on(&self) -> bool {
        self.state
    }
}

/// Bandwidth cap/floor applied while repeated congestion "dips" are
/// observed in a short window. `cap_kbps` starts unbounded so an estimate
/// read before the first packet isn't clamped to zero.
#[derive(Debug, Clone, Copy)]
pub struct Dip {
    pub count: u32,
    pub intensity: f64,
    pub cap_kbps: f64,
    pub floor_kbps: f64,
}

impl Default for Dip {
    fn default() -> Self {
        Self {
            count: 0,
            intensity: 0.0,
            cap_kbps: f64::MAX,
            floor_kbps: 0.0,
        }
    }
}

/// Tunables for [`super::estimator::BandwidthEstimator`]'s congestion logic.
#[derive(Debug, Clone)]
pub struct CongestionConfig {
    pub recovery_time_s: f64,
    pub back_off: f64,
    pub tolerated_congestion_duration_ms: f64,
    pub threshold_ms: f64,
    pub congestion_event_limit: u32,
    pub choke_tolerance_ms: f64,
    pub dip_ratio: f64,
    pub min_kbps: f64,
}

impl Default for CongestionConfig {
    fn default() -> Self {
        Self {
            recovery_time_s: 1.0,
            back_off: 0.4,
            tolerated_congestion_duration_ms: 2000.0,
            threshold_ms: 35.0,
            congestion_event_limit: 3,
            choke_tolerance_ms: 5000.0,
            dip_ratio: 0.7,
            min_kbps: 50.0,
        }
    }
}

impl CongestionConfig {
    pub fn sanitize(&mut self) {
        self.recovery_time_s = self.recovery_time_s.max(1.0);
        self.back_off = self.back_off.clamp(0.0, 1.0);
    }
}

pub struct CongestionState {
    pub consecutive_over: u32,
    pub consecutive_under: u32,
    pub margin: f64,
    pub hold_scale: f64,
    pub avg_estimate_kbps: f64,
    pub estimate_before_congestion_kbps: f64,
    pub dip: Dip,
    pub congestion_start_ms: Option<f64>,
    pub timestamp_uncongested_ms: f64,
    trigger: FlankLatch,
}

impl CongestionState {
    pub fn new(config: &CongestionConfig) -> Self {
        Self {
            consecutive_over: 0,
            consecutive_under: 0,
            margin: 0.0,
            hold_scale: 1.0,
            avg_estimate_kbps: 0.0,
            estimate_before_congestion_kbps: 0.0,
            dip: Dip::default(),
            congestion_start_ms: None,
            timestamp_uncongested_ms: 0.0,
            trigger: FlankLatch::new(config.threshold_ms, config.threshold_ms * 0.5),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(&CongestionConfig::default());
    }

    /// Update the over/under streak counters from the sign of the delay
    /// residual (observed minus expected).
    pub fn count_delays(&mut self, delay_error_ms: f64) {
        if delay_error_ms > 0.0 {
            self.consecutive_over += 1;
            self.consecutive_under = 0;
        } else if delay_error_ms < 0.0 {
            self.consecutive_over = 0;
            self.consecutive_under += 1;
        } else {
            self.consecutive_over = 0;
            self.consecutive_under = 0;
        }
    }

    fn on_new_estimate(&mut self, bandwidth_kbps: f64) {
        const ALPHA: f64 = 0.05;
        if self.avg_estimate_kbps == 0.0 {
            self.avg_estimate_kbps = bandwidth_kbps;
        } else {
            self.avg_estimate_kbps =
                (1.0 - ALPHA) * self.avg_estimate_kbps + ALPHA * bandwidth_kbps;
        }
        if self.consecutive_over == 0 {
            self.estimate_before_congestion_kbps = bandwidth_kbps;
        }
    }

    /// Run one update of the congestion model, returning the multiplier to
    /// apply to the UKF's measurement noise this step.
    #[allow(clippy::too_many_arguments)]
    pub fn analyse_congestion(
        &mut self,
        config: &CongestionConfig,
        now_ms: f64,
        actual_delay_ms: f64,
        owd_error_ms: f64,
        expected_queued_bits: f64,
        packet_bits: f64,
        bandwidth_kbps: f64,
        max_kbps: f64,
    ) -> f64 {
        self.on_new_estimate(bandwidth_kbps);

        if self.consecutive_over == 0 {
            self.timestamp_uncongested_ms = now_ms;
        }

        if owd_error_ms > 5.0 && expected_queued_bits < packet_bits + 80.0 {
            self.hold_scale = 10_000.0;
        }
        let mut congestion_scale = self.hold_scale;
        if self.hold_scale > 1.0 {
            self.hold_scale += (1.0 - self.hold_scale) * 0.001;
        }
        if self.hold_scale < 1.0001 || self.consecutive_over == 0 {
            self.hold_scale = 1.0;
            congestion_scale = 1.0;
        }

        if self.consecutive_over > 25 && actual_delay_ms > config.threshold_ms {
            if self.consecutive_over == 26 {
                self.congestion_start_ms = Some(now_ms);
                let drain_ratio = expected_queued_bits
                    / (config.recovery_time_s * 1000.0 * bandwidth_kbps.max(1.0));
                self.margin = drain_ratio.min(config.back_off);
            }
        }
        if self.margin > 0.0 {
            if actual_delay_ms < config.threshold_ms / 2.0 {
                self.margin = 0.0;
            } else {
                let drain_ratio = expected_queued_bits
                    / (config.recovery_time_s * 1000.0 * bandwidth_kbps.max(1.0));
                self.margin = self.margin.max(drain_ratio.min(config.back_off));
            }
        }

        let switched_on = self.trigger.update(actual_delay_ms);
        if switched_on {
            self.dip.count += 1;
            if self.dip.count > config.congestion_event_limit {
                self.dip.intensity = 1.0;
            }
        }

        if self.dip.intensity < 0.1 {
            self.dip.cap_kbps = max_kbps;
            self.dip.floor_kbps = 0.0;
        } else {
            self.dip.cap_kbps = config
                .min_kbps
                .max(self.avg_estimate_kbps * config.dip_ratio);
            let within_choke_tolerance = self
                .congestion_start_ms
                .map(|start| (now_ms - start).abs() < config.choke_tolerance_ms)
                .unwrap_or(false);
            self.dip.floor_kbps = if self.dip.cap_kbps < max_kbps && within_choke_tolerance {
                self.dip.cap_kbps
            } else {
                0.0
            };
        }

        congestion_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flank_latch_fires_once_per_rising_edge() {
        let mut latch = FlankLatch::new(10.0, 5.0);
        assert!(!latch.update(0.0));
        assert!(latch.update(20.0));
        assert!(!latch.update(15.0));
        assert!(!latch.update(6.0));
        assert!(!latch.update(4.0));
        assert!(latch.update(20.0));
    }

    #[test]
    fn count_delays_tracks_streaks() {
        let mut state = CongestionState::new(&CongestionConfig::default());
        state.count_delays(1.0);
        state.count_delays(1.0);
        assert_eq!(state.consecutive_over, 2);
        state.count_delays(-1.0);
        assert_eq!(state.consecutive_over, 0);
        assert_eq!(state.consecutive_under, 1);
    }
}
