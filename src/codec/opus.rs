//! Opus decoder with gap-concealment, wrapping the opaque native decoder
//! handle from the `opus` crate.
//!
//! On a sequence-number gap the decoder plays back up to two internally
//! concealed frames before decoding the newly arrived packet: the last of
//! those concealment calls passes the new packet's bytes to libopus as a
//! forward-error-correction hint, the earlier ones rely purely on decoder
//! history. This mirrors how a live call recovers audio for a handful of
//! lost packets without waiting for a retransmission.

use super::AudioDecoder;

/// Maximum concealment frames synthesised for one gap, regardless of how
/// many packets were actually lost.
const MAX_CONCEAL_FRAMES: usize = 2;

pub struct OpusDecoder {
    decoder: opus::Decoder,
    channels: usize,
    has_decoded: bool,
    expected_seq: Option<u32>,
    last_frame_samples: usize,
}

impl OpusDecoder {
    pub fn new(sample_rate: u32, stereo: bool) -> crate::Result<Self> {
        let channels = if stereo {
            opus::Channels::Stereo
        } else {
            opus::Channels::Mono
        };
        let decoder = opus::Decoder::new(sample_rate, channels)
            .map_err(|e| crate::Error::Codec(e.to_string()))?;
        Ok(Self {
            decoder,
            channels: if stereo { 2 } else { 1 },
            has_decoded: false,
            expected_seq: None,
            last_frame_samples: 0,
        })
    }

    fn expected_sequence_number(&self) -> Option<u32> {
        self.expected_seq
    }
}

impl AudioDecoder for OpusDecoder {
    fn decode_packet(&mut self, ext_seq: u32, payload: &[u8], out: &mut [i16]) -> usize {
        let mut produced_frames = 0usize;

        if self.has_decoded {
            if let Some(expected) = self.expected_sequence_number() {
                let gap = ext_seq.wrapping_sub(expected) as i32;
                if gap > 0 {
                    let max_pcm_frames = out.len() / self.channels;
                    let conceal_count = MAX_CONCEAL_FRAMES
                        .min(if self.last_frame_samples > 0 {
                            max_pcm_frames / self.last_frame_samples
                        } else {
                            0
                        })
                        .min(gap as usize);

                    for i in 0..conceal_count {
                        let is_last = i + 1 == conceal_count;
                        let start = produced_frames * self.channels;
                        let slot = &mut out[start..];
                        let samples = if is_last {
                            // forward-error hint: decode using the new packet's bytes
                            self.decoder.decode(payload, slot, true).unwrap_or(0)
                        } else {
                            self.decoder.decode(&[], slot, true).unwrap_or(0)
                        };
                        produced_frames += samples;
                    }
                }
            }
        }

        let start = produced_frames * self.channels;
        let samples = self.decoder.decode(payload, &mut out[start..], false).unwrap_or(0);
        produced_frames += samples;

        if samples > 0 {
            self.last_frame_samples = samples;
        }
        self.has_decoded = true;
        self.expected_seq = Some(ext_seq.wrapping_add(1));
        produced_frames
    }

    fn on_unused_packet_received(&mut self, ext_seq: u32) {
        let advance = self
            .expected_seq
            .map(|expected| ext_seq.wrapping_sub(expected) as i32)
            .unwrap_or(1);
        if advance > 0 {
            self.expected_seq = Some(ext_seq.wrapping_add(1));
        }
    }

    fn conceal(&mut self, out: &mut [i16]) -> usize {
        self.decoder.decode(&[], out, false).unwrap_or(0)
    }
}
