//! Scenario 6: a 400 Hz sine round-tripped through G.711 A-law preserves
//! the signal's audio level.

use bridge_media_core::codec::g711::{G711Decoder, G711Encoder, Variant};
use bridge_media_core::codec::{AudioDecoder, AudioEncoder};

const FRAMES: usize = 960;
const SAMPLE_RATE: f64 = 48_000.0;
const TONE_HZ: f64 = 400.0;
const AMPLITUDE: f64 = 2000.0;

fn sine_stereo_frame() -> Vec<i16> {
    let mut pcm = Vec::with_capacity(FRAMES * 2);
    for n in 0..FRAMES {
        let t = n as f64 / SAMPLE_RATE;
        let sample = (AMPLITUDE * (2.0 * std::f64::consts::PI * TONE_HZ * t).sin()) as i16;
        pcm.push(sample);
        pcm.push(sample);
    }
    pcm
}

fn rms_db(samples: &[i16]) -> f64 {
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
    let rms = (sum_sq / samples.len() as f64).sqrt().max(1.0);
    20.0 * rms.log10()
}

#[test]
fn alaw_round_trip_preserves_audio_level() {
    let input = sine_stereo_frame();

    let mut encoder = G711Encoder::new(Variant::Pcma);
    let mut wire = vec![0u8; FRAMES / 6 + 8];
    let encoded_len = encoder.encode(&input, &mut wire);
    assert_eq!(encoded_len, FRAMES / 6);

    let mut decoder = G711Decoder::new(Variant::Pcma);
    let mut output = vec![0i16; encoded_len * 6 * 2];
    let produced = decoder.decode_packet(0, &wire[..encoded_len], &mut output);
    assert_eq!(produced, encoded_len * 6);

    let input_db = rms_db(&input).round();
    let output_db = rms_db(&output[..produced * 2]).round();
    assert_eq!(
        input_db, output_db,
        "input={input_db}dB output={output_db}dB"
    );
}
