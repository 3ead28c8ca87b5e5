//! Downlink bandwidth estimation: an Unscented Kalman Filter over packet
//! arrival timing, damped by a congestion sub-state so the reported
//! bitrate doesn't chase every noisy delay sample.

mod congestion;
mod estimator;

pub use congestion::{CongestionConfig, CongestionState, Dip, FlankLatch};
pub use estimator::{BandwidthEstimator, Config};
