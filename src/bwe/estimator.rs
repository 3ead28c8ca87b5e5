//! Unscented Kalman Filter downlink bandwidth estimator.
//!
//! State `x = (queuedBits, bandwidthKbps, clockOffsetMs)`. Every received
//! packet's arrival timing nudges the filter through a sigma-point
//! predict/update cycle; [`CongestionState`] layers damping on top so the
//! reported estimate backs off smoothly instead of oscillating with every
//! noisy delay sample.

use nalgebra::{Cholesky, Matrix3, Vector3};

use super::congestion::{CongestionConfig, CongestionState};

const QUEUED_BITS: usize = 0;
const BANDWIDTH: usize = 1;
const CLOCK_OFFSET: usize = 2;
const STATE_DIM: f64 = 3.0;

/// Tunables for [`BandwidthEstimator`]. `sanitize` clamps user-supplied
/// values into range before the filter is constructed, the way the
/// engine's own configuration structs do.
#[derive(Debug, Clone)]
pub struct Config {
    pub alpha: f64,
    pub beta: f64,
    pub kappa: f64,
    pub initial_kbps_downlink: f64,
    pub mtu_bytes: f64,
    pub max_kbps: f64,
    pub model_min_kbps: f64,
    pub max_network_queue_bytes: f64,
    pub silence_timeout_ms: f64,
    pub silence_back_off: f64,
    pub silence_max_kbps: f64,
    pub min_reported_kbps: f64,
    pub congestion: CongestionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 2.0,
            kappa: 0.0,
            initial_kbps_downlink: 1000.0,
            mtu_bytes: 1200.0,
            max_kbps: 50_000.0,
            model_min_kbps: 50.0,
            max_network_queue_bytes: 8_000.0,
            silence_timeout_ms: 2_000.0,
            silence_back_off: 0.2,
            silence_max_kbps: 2_000.0,
            min_reported_kbps: 50.0,
            congestion: CongestionConfig::default(),
        }
    }
}

impl Config {
    pub fn sanitize(&mut self) {
        self.congestion.sanitize();
        self.initial_kbps_downlink = self.initial_kbps_downlink.max(100.0);
        self.max_kbps = self.max_kbps.max(self.initial_kbps_downlink);
        self.model_min_kbps = self.model_min_kbps.max(1.0);
    }
}

pub struct BandwidthEstimator {
    config: Config,
    state: Vector3<f64>,
    covariance: Matrix3<f64>,
    process_noise: Vector3<f64>,
    base_clock_offset_ns: Option<i64>,
    previous_transmit_ns: i64,
    previous_receive_ns: i64,
    reference_packet_bytes: f64,
    receive_bitrate_ewma_kbps: f64,
    congestion: CongestionState,
    lambda: f64,
    weight_mean0: f64,
    weight_mean: f64,
    weight_cov0: f64,
    weight_cov: f64,
    sigma_weight: f64,
}

impl BandwidthEstimator {
    pub fn new(mut config: Config) -> Self {
        config.sanitize();

        let lambda = config.alpha.powi(2) * (STATE_DIM + config.kappa) - STATE_DIM;
        let weight_cov0 = lambda / (STATE_DIM + lambda) + (1.0 - config.alpha.powi(2) + config.beta);
        let weight_cov = 1.0 / (2.0 * (STATE_DIM + lambda));
        let weight_mean = weight_cov;
        let weight_mean0 = 1.0 - weight_mean * STATE_DIM * 2.0;
        let sigma_weight = (STATE_DIM + lambda).sqrt();

        let init_delta = Vector3::new(8_000.0 * 8.0, config.initial_kbps_downlink * 0.001, 0.1);
        let covariance = init_delta * init_delta.transpose();
        let state = Vector3::new(0.0, config.initial_kbps_downlink, 0.0);
        let congestion = CongestionState::new(&config.congestion);

        Self {
            process_noise: Vector3::new(0.0, 40.0, 0.01),
            config,
            state,
            covariance,
            base_clock_offset_ns: None,
            previous_transmit_ns: 0,
            previous_receive_ns: 0,
            reference_packet_bytes: 0.0,
            receive_bitrate_ewma_kbps: 0.0,
            congestion,
            lambda,
            weight_mean0,
            weight_mean,
            weight_cov0,
            weight_cov,
            sigma_weight,
        }
    }

    /// Return the filter to its initial conditions; subsequent packets
    /// re-seed the base clock offset as if this were a fresh connection.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    pub fn bandwidth_kbps(&self) -> f64 {
        self.state[BANDWIDTH]
    }

    /// Unlabelled received bytes that don't carry the wire timestamps the
    /// main update needs (e.g. padding traffic): still nudge the queue
    /// estimate and the plain receive-bitrate EWMA.
    pub fn on_unmarked_traffic(&mut self, packet_bytes: usize, receive_ns: i64) {
        if self.base_clock_offset_ns.is_none() {
            return;
        }
        let mtu_bits = self.config.mtu_bytes * 8.0;
        if self.state[QUEUED_BITS] < mtu_bits * 2.0 {
            self.state[QUEUED_BITS] += packet_bytes as f64 * 8.0;
        }
        const ALPHA: f64 = 0.1;
        let elapsed_ms = if self.previous_receive_ns != 0 {
            ((receive_ns - self.previous_receive_ns) as f64 / 1e6).max(1.0)
        } else {
            1.0
        };
        let instantaneous_kbps = (packet_bytes as f64 * 8.0) / elapsed_ms;
        self.receive_bitrate_ewma_kbps =
            (1.0 - ALPHA) * self.receive_bitrate_ewma_kbps + ALPHA * instantaneous_kbps;
        self.previous_receive_ns = receive_ns;
    }

    /// Feed one packet's wire timestamps through the filter.
    pub fn on_packet_received(&mut self, packet_bytes: usize, transmit_ns: i64, receive_ns: i64) {
        let packet_bits = packet_bytes as f64 * 8.0;

        if self.base_clock_offset_ns.is_none() {
            self.base_clock_offset_ns = Some(receive_ns - transmit_ns);
            self.previous_transmit_ns = transmit_ns - 5_000_000_000;
            self.previous_receive_ns = receive_ns - 5_000_000;
            self.reference_packet_bytes = packet_bytes as f64;
        }
        let base_offset = self.base_clock_offset_ns.unwrap();

        let tau_ms = ((transmit_ns - self.previous_transmit_ns) as f64 / 1e6).max(0.0);
        let observed_delay_ms = (receive_ns - transmit_ns - base_offset) as f64 / 1e6;

        let mut actual_delay_ms = observed_delay_ms - self.state[CLOCK_OFFSET];
        if actual_delay_ms < 0.0 {
            self.state[QUEUED_BITS] = 0.0;
            self.state[CLOCK_OFFSET] = observed_delay_ms;
            actual_delay_ms = 0.0;
            self.reference_packet_bytes = packet_bytes as f64;
        }

        let expected_state = self.transition_state(&self.state, packet_bits, tau_ms);
        let expected_delay_ms = self.predict_absolute_delay(&expected_state);
        let owd_error_ms = observed_delay_ms - expected_delay_ms;
        self.congestion.count_delays(owd_error_ms);

        let now_ms = receive_ns as f64 / 1e6;
        let mut measurement_noise =
            self.calculate_process_noise(now_ms, owd_error_ms, expected_state[QUEUED_BITS]);
        let congestion_scale = self.congestion.analyse_congestion(
            &self.config.congestion,
            now_ms,
            actual_delay_ms,
            owd_error_ms,
            expected_state[QUEUED_BITS],
            packet_bits,
            self.state[BANDWIDTH],
            self.config.max_kbps,
        );
        measurement_noise *= congestion_scale;

        let sigma_points = self.generate_sigma_points();
        let transitioned: Vec<Vector3<f64>> = sigma_points
            .iter()
            .map(|s| self.transition_state(s, packet_bits, tau_ms))
            .collect();
        let mut predicted_delays: Vec<f64> = transitioned
            .iter()
            .map(|s| self.predict_absolute_delay(s))
            .collect();
        let n = predicted_delays.len();
        predicted_delays[n - 2] += measurement_noise;
        predicted_delays[n - 1] -= measurement_noise;

        let mut mean_state = transitioned[0] * self.weight_mean0;
        for s in &transitioned[1..] {
            mean_state += s * self.weight_mean;
        }
        let mut mean_delay = predicted_delays[0] * self.weight_mean0;
        for d in &predicted_delays[1..] {
            mean_delay += d * self.weight_mean;
        }

        let mut state_pred_cov = Matrix3::zeros();
        let mut cross_cov = Vector3::zeros();
        let mut delay_variance = measurement_noise;
        for (i, s) in transitioned.iter().enumerate() {
            let weight = if i == 0 { self.weight_cov0 } else { self.weight_cov };
            let ds = s - mean_state;
            state_pred_cov += ds * ds.transpose() * weight;
            let dd = predicted_delays[i] - mean_delay;
            cross_cov += ds * (weight * dd);
            delay_variance += weight * dd * dd;
        }

        let gain = cross_cov / delay_variance.max(1e-6);
        self.state = mean_state + gain * (observed_delay_ms - mean_delay);
        self.covariance = state_pred_cov - gain * cross_cov.transpose();

        if self.state[CLOCK_OFFSET] < expected_state[CLOCK_OFFSET] {
            self.state[CLOCK_OFFSET] = expected_state[CLOCK_OFFSET];
        }

        self.sanitize_state(observed_delay_ms, packet_bits);
        self.covariance = 0.5 * (self.covariance + self.covariance.transpose());

        self.previous_transmit_ns = transmit_ns;
        self.previous_receive_ns = receive_ns;
    }

    /// The bitrate callers should actually use right now.
    pub fn get_estimate(&self, now_ms: f64) -> f64 {
        let cap = self.congestion.dip.cap_kbps;
        let mut estimated = self.state[BANDWIDTH].min(cap);
        if self.congestion.consecutive_over < 50 {
            let lower = self.congestion.estimate_before_congestion_kbps.min(cap);
            estimated = self.state[BANDWIDTH].clamp(lower, cap);
        }

        if self.previous_receive_ns != 0 {
            let idle_ms = now_ms - (self.previous_receive_ns as f64 / 1e6);
            if idle_ms > self.config.silence_timeout_ms {
                return (estimated * (1.0 - self.config.silence_back_off))
                    .clamp(self.config.min_reported_kbps, self.config.silence_max_kbps);
            }
        }

        (self.congestion.dip.floor_kbps.max(self.config.min_reported_kbps))
            .max(estimated * (1.0 - self.congestion.margin))
    }

    fn transition_state(&self, prev: &Vector3<f64>, packet_bits: f64, tau_ms: f64) -> Vector3<f64> {
        let bandwidth = prev[BANDWIDTH].clamp(0.0, self.config.max_kbps);
        let queued = (prev[QUEUED_BITS] - bandwidth * tau_ms).max(0.0) + packet_bits;
        Vector3::new(queued, bandwidth, prev[CLOCK_OFFSET])
    }

    fn predict_absolute_delay(&self, state: &Vector3<f64>) -> f64 {
        let bandwidth = state[BANDWIDTH].max(1e-6);
        let offset_adjustment = (self.reference_packet_bytes * 8.0) / bandwidth;
        state[QUEUED_BITS] / bandwidth + state[CLOCK_OFFSET] - offset_adjustment
    }

    fn calculate_process_noise(
        &mut self,
        now_ms: f64,
        observation_error_ms: f64,
        expected_queued_bits: f64,
    ) -> f64 {
        let longer_queue_bits = self.config.mtu_bytes * 8.0 * 4.0;
        let mut measurement_noise = 10.0;

        if observation_error_ms < -0.5 && self.state[BANDWIDTH] < 8_000.0 {
            self.process_noise[BANDWIDTH] = 300.0;
            measurement_noise *= 0.005;
        } else if self.congestion.consecutive_under > 5
            || (self.congestion.consecutive_over > 30
                && now_ms - self.congestion.timestamp_uncongested_ms
                    > self.config.congestion.tolerated_congestion_duration_ms)
        {
            self.process_noise[BANDWIDTH] = 300.0;
            let denom = (self.congestion.consecutive_under + self.congestion.consecutive_over).max(1) as f64;
            measurement_noise *= 5.0 / denom;
        } else if expected_queued_bits > longer_queue_bits && self.congestion.consecutive_over < 5 {
            self.process_noise[BANDWIDTH] = 200.0;
            measurement_noise *= longer_queue_bits * 2.0 / (longer_queue_bits + expected_queued_bits);
        }

        measurement_noise
    }

    fn sanitize_state(&mut self, observed_delay_ms: f64, packet_bits: f64) {
        self.state[BANDWIDTH] = self.state[BANDWIDTH].clamp(self.config.model_min_kbps, self.config.max_kbps);
        self.state[QUEUED_BITS] = self.state[QUEUED_BITS].max(packet_bits);

        let predicted = self.predict_absolute_delay(&self.state);
        if observed_delay_ms - predicted < 0.0 && self.state[QUEUED_BITS] > self.config.mtu_bytes * 8.0 * 3.0 {
            let delay_err = predicted - observed_delay_ms;
            self.state[QUEUED_BITS] -= delay_err * self.state[BANDWIDTH] / 3.0;
            self.state[QUEUED_BITS] = self.state[QUEUED_BITS].max(packet_bits);
        }

        let max_queue_bits = (self.config.max_network_queue_bytes * 8.0).max(packet_bits);
        self.state[QUEUED_BITS] = self.state[QUEUED_BITS].clamp(packet_bits, max_queue_bits);
        self.state[CLOCK_OFFSET] = self.state[CLOCK_OFFSET].min(observed_delay_ms);
    }

    /// `2*D + 1` classic sigma points from the Cholesky factor of the
    /// (jittered, for positive-definiteness) covariance, plus two extra
    /// points used to fold the measurement noise into the predicted delay
    /// spread.
    fn generate_sigma_points(&self) -> Vec<Vector3<f64>> {
        const EPSILON: f64 = 1e-7;
        let jittered = self.covariance + Matrix3::identity() * EPSILON;
        let l = Cholesky::new(jittered)
            .unwrap_or_else(|| Cholesky::new(Matrix3::identity() * EPSILON).expect("identity is PD"))
            .l();

        let mut points = Vec::with_capacity(9);
        points.push(self.state);
        for c in 0..3 {
            let column = l.column(c).into_owned();
            let mut offset = column * self.sigma_weight;
            offset[QUEUED_BITS] = offset[QUEUED_BITS].clamp(-self.state[QUEUED_BITS], self.state[QUEUED_BITS]);
            let bandwidth_room = (self.state[BANDWIDTH] - 10.0).max(0.0);
            offset[BANDWIDTH] = offset[BANDWIDTH].clamp(-bandwidth_room, bandwidth_room);
            points.push(self.state + offset);
            points.push(self.state - offset);
        }
        // measurement-noise points: transitioned identically to the mean,
        // the ± adjustment is applied to their predicted delay afterwards.
        points.push(self.state);
        points.push(self.state);
        points
    }
}
