//! Stateful 6x FIR resampling between the 8 kHz G.711 wire rate and the
//! 48 kHz internal stereo rate.
//!
//! Both directions share one windowed-sinc low-pass kernel (Hann window,
//! cutoff at the 8 kHz Nyquist), built once via [`once_cell`] the same way
//! [`super::g711::tables`] builds its lookup tables. Each resampler keeps a
//! short ring of prior samples so the filter stays continuous across
//! packet boundaries instead of re-windowing from silence every call.

use std::collections::VecDeque;

use once_cell::sync::Lazy;

const RATIO: usize = 6;
const TAPS: usize = 36;

static KERNEL: Lazy<[f32; TAPS]> = Lazy::new(|| {
    let cutoff = 1.0 / RATIO as f32;
    let center = (TAPS - 1) as f32 / 2.0;
    let mut kernel = [0f32; TAPS];
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - center;
        let sinc = if x == 0.0 {
            2.0 * cutoff
        } else {
            (2.0 * std::f32::consts::PI * cutoff * x).sin() / (std::f32::consts::PI * x)
        };
        let window =
            0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (TAPS - 1) as f32).cos();
        *k = sinc * window;
    }
    let gain: f32 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= gain;
    }
    kernel
});

/// 8 kHz mono → 48 kHz stereo.
pub struct Upsampler6x {
    history: VecDeque<f32>,
}

impl Upsampler6x {
    pub fn new() -> Self {
        Self {
            history: VecDeque::from(vec![0.0f32; TAPS.div_ceil(RATIO)]),
        }
    }

    /// Writes `input.len() * RATIO` interleaved stereo samples into `out`
    /// and returns the number of stereo frames produced.
    pub fn process(&mut self, input: &[i16], out: &mut [i16]) -> usize {
        let mut produced = 0;
        for &sample in input {
            self.history.pop_front();
            self.history.push_back(sample as f32);
            for phase in 0..RATIO {
                let mut acc = 0.0f32;
                for (tap_idx, hist_sample) in self.history.iter().rev().enumerate() {
                    let k = phase + tap_idx * RATIO;
                    if let Some(coeff) = KERNEL.get(k) {
                        acc += coeff * hist_sample;
                    }
                }
                let v = (acc * RATIO as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                out[produced * 2] = v;
                out[produced * 2 + 1] = v;
                produced += 1;
            }
        }
        produced
    }
}

impl Default for Upsampler6x {
    fn default() -> Self {
        Self::new()
    }
}

/// 48 kHz stereo → 8 kHz mono.
pub struct Downsampler6x {
    history: VecDeque<f32>,
    phase: usize,
}

impl Downsampler6x {
    pub fn new() -> Self {
        Self {
            history: VecDeque::from(vec![0.0f32; TAPS]),
            phase: 0,
        }
    }

    /// `input` is interleaved stereo 48 kHz PCM (even length). Returns the
    /// number of 8 kHz mono samples written to `out`.
    pub fn process(&mut self, input: &[i16], out: &mut [i16]) -> usize {
        let mut produced = 0;
        for chunk in input.chunks_exact(2) {
            let mono = (chunk[0] as f32 + chunk[1] as f32) / 2.0;
            self.history.pop_front();
            self.history.push_back(mono);
            self.phase = (self.phase + 1) % RATIO;
            if self.phase == 0 {
                let acc: f32 = self
                    .history
                    .iter()
                    .rev()
                    .zip(KERNEL.iter())
                    .map(|(s, k)| s * k)
                    .sum();
                out[produced] = acc.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                produced += 1;
            }
        }
        produced
    }
}

impl Default for Downsampler6x {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsample_ratio_holds() {
        let mut up = Upsampler6x::new();
        let input = vec![1000i16; 10];
        let mut out = vec![0i16; input.len() * RATIO * 2];
        let produced = up.process(&input, &mut out);
        assert_eq!(produced, input.len() * RATIO);
    }

    #[test]
    fn downsample_ratio_holds() {
        let mut down = Downsampler6x::new();
        let input = vec![1000i16; 120]; // 60 stereo frames
        let mut out = vec![0i16; 60 / RATIO + 1];
        let produced = down.process(&input, &mut out);
        assert_eq!(produced, 60 / RATIO);
    }
}
