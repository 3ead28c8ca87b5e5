//! Stateful G.711 (μ-law / A-law) decoder and encoder with packet-loss
//! concealment.
//!
//! This is the canonical G.711 codec surface (see [`crate::codec`] doc).
//! An earlier, stateless, sample-at-a-time variant is kept only as the
//! [`tables`] free functions used to build the lookup tables below — it is
//! not exposed as an alternative codec.

use super::resample::{Downsampler6x, Upsampler6x};
use super::{AudioDecoder, AudioEncoder};

/// μ-law / A-law sample codecs, plus the lookup tables both build from.
pub mod tables {
    use once_cell::sync::Lazy;

    /// 256-entry μ-law decode table, expansion to 14-bit linear PCM.
    pub static ULAW_DECODE: Lazy<[i16; 256]> = Lazy::new(|| {
        let mut table = [0i16; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = ulaw_decode_sample(i as u8);
        }
        table
    });

    /// 256-entry A-law decode table, expansion to 13-bit linear PCM.
    pub static ALAW_DECODE: Lazy<[i16; 256]> = Lazy::new(|| {
        let mut table = [0i16; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = alaw_decode_sample(i as u8);
        }
        table
    });

    /// Stateless μ-law encode of one 16-bit linear sample.
    pub fn ulaw_encode_sample(pcm: i16) -> u8 {
        const BIAS: i32 = 0x84;
        const CLIP: i32 = 32635;
        let sign = if pcm < 0 { 0x80 } else { 0x00 };
        let mut sample = (pcm as i32).abs().min(CLIP) + BIAS;
        let mut exponent = 7i32;
        while exponent > 0 && (sample & 0x4000) == 0 {
            sample <<= 1;
            exponent -= 1;
        }
        let mantissa = (sample >> (exponent + 3)) & 0x0F;
        !(sign | (exponent << 4) as u8 | mantissa as u8)
    }

    /// Stateless μ-law decode of one 8-bit code.
    pub fn ulaw_decode_sample(code: u8) -> i16 {
        let code = !code;
        let sign = code & 0x80;
        let exponent = (code >> 4) & 0x07;
        let mantissa = code & 0x0F;
        let mut sample = ((mantissa as i32) << 3) + 0x84;
        sample <<= exponent as i32;
        sample -= 0x84;
        (if sign != 0 { -sample } else { sample }) as i16
    }

    /// Stateless A-law encode of one 16-bit linear sample.
    pub fn alaw_encode_sample(pcm: i16) -> u8 {
        const CLIP: i32 = 32635;
        let sign = if pcm >= 0 { 0x80 } else { 0x00 };
        let mut sample = (pcm as i32).abs().min(CLIP);
        if sample < 256 {
            let code = sign | (sample >> 4) as u8;
            return code ^ 0x55;
        }
        let mut exponent = 7i32;
        while exponent > 0 && (sample & 0x4000) == 0 {
            sample <<= 1;
            exponent -= 1;
        }
        let mantissa = (sample >> (exponent + 3)) & 0x0F;
        (sign | (exponent << 4) as u8 | mantissa as u8) ^ 0x55
    }

    /// Stateless A-law decode of one 8-bit code.
    pub fn alaw_decode_sample(code: u8) -> i16 {
        let code = code ^ 0x55;
        let sign = code & 0x80;
        let exponent = (code >> 4) & 0x07;
        let mantissa = code & 0x0F;
        let mut sample = ((mantissa as i32) << 4) + 0x08;
        if exponent != 0 {
            sample += 0x100;
        }
        sample <<= exponent.saturating_sub(1) as i32;
        (if sign != 0 { -sample } else { sample }) as i16
    }
}

/// Which G.711 variant a codec instance speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Pcmu,
    Pcma,
}

impl Variant {
    fn decode_table(self) -> &'static [i16; 256] {
        match self {
            Variant::Pcmu => &tables::ULAW_DECODE,
            Variant::Pcma => &tables::ALAW_DECODE,
        }
    }

    fn encode_sample(self, pcm: i16) -> u8 {
        match self {
            Variant::Pcmu => tables::ulaw_encode_sample(pcm),
            Variant::Pcma => tables::alaw_encode_sample(pcm),
        }
    }
}

/// Stateful G.711 decoder: 8 kHz mono wire samples in, 48 kHz stereo PCM
/// out, with silence concealment sized to the last accepted packet.
pub struct G711Decoder {
    variant: Variant,
    upsampler: Upsampler6x,
    last_frame_samples: usize,
    expected_seq: Option<u32>,
}

impl G711Decoder {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            upsampler: Upsampler6x::new(),
            last_frame_samples: 0,
            expected_seq: None,
        }
    }
}

impl AudioDecoder for G711Decoder {
    fn decode_packet(&mut self, ext_seq: u32, payload: &[u8], out: &mut [i16]) -> usize {
        let table = self.variant.decode_table();
        let mono: Vec<i16> = payload.iter().map(|&b| table[b as usize]).collect();
        let produced = self.upsampler.process(&mono, out);
        self.last_frame_samples = produced;
        self.expected_seq = Some(ext_seq.wrapping_add(1));
        produced
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
        let frames = self.last_frame_samples.min(out.len() / 2);
        for pair in out[..frames * 2].chunks_exact_mut(2) {
            pair[0] = 0;
            pair[1] = 0;
        }
        frames
    }
}

/// Stateless G.711 encoder: 48 kHz stereo PCM in, 8 kHz mono wire bytes out.
pub struct G711Encoder {
    variant: Variant,
    downsampler: Downsampler6x,
}

impl G711Encoder {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            downsampler: Downsampler6x::new(),
        }
    }
}

impl AudioEncoder for G711Encoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> usize {
        let mut mono = vec![0i16; pcm.len() / 2 / 6 + 1];
        let produced = self.downsampler.process(pcm, &mut mono);
        for (i, &sample) in mono[..produced].iter().enumerate() {
            out[i] = self.variant.encode_sample(sample);
        }
        produced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ulaw_round_trip_is_close() {
        for pcm in [-30000i16, -1000, 0, 1000, 30000] {
            let code = tables::ulaw_encode_sample(pcm);
            let back = tables::ulaw_decode_sample(code);
            assert!((pcm as i32 - back as i32).abs() < 600, "pcm={pcm} back={back}");
        }
    }

    #[test]
    fn alaw_round_trip_is_close() {
        for pcm in [-30000i16, -1000, 0, 1000, 30000] {
            let code = tables::alaw_encode_sample(pcm);
            let back = tables::alaw_decode_sample(code);
            assert!((pcm as i32 - back as i32).abs() < 600, "pcm={pcm} back={back}");
        }
    }

    #[test]
    fn conceal_emits_silence_sized_to_last_packet() {
        let mut decoder = G711Decoder::new(Variant::Pcmu);
        let mut out = vec![0i16; 20 * 6 * 2];
        let payload = vec![0xFFu8; 20];
        let produced = decoder.decode_packet(1, &payload, &mut out);
        assert_eq!(produced, 20 * 6);

        let mut conceal_out = vec![1i16; produced * 2];
        let concealed = decoder.conceal(&mut conceal_out);
        assert_eq!(concealed, produced);
        assert!(conceal_out[..concealed * 2].iter().all(|&s| s == 0));
    }
}
