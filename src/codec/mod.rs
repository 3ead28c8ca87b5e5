//! Audio codec adapters.
//!
//! Every decoder in this module speaks one contract regardless of the
//! underlying codec: decode the next packet, note a packet that arrived
//! but was not decoded (e.g. redundancy), or conceal a missing one. Output
//! is always 48 kHz interleaved 16-bit stereo PCM.
//!
//! Two `AudioDecoder` contracts existed historically upstream: one that
//! took a `timestamp` parameter and had no concealment method, and one
//! that dropped `timestamp` in favour of an explicit `conceal`. This crate
//! implements the latter — concealment is a first-class operation here,
//! not something callers approximate by decoding silence themselves.

pub mod g711;
pub mod resample;
#[cfg(feature = "opus")]
pub mod opus;

/// Decodes one audio stream's packets into 48 kHz stereo PCM, with
/// packet-loss concealment for gaps in the sequence number space.
pub trait AudioDecoder: Send {
    /// Decode `payload` (the RTP payload for extended sequence number
    /// `ext_seq`) into `out`, returning the number of stereo sample pairs
    /// written. Implementations that detect a gap since the last decoded
    /// packet should conceal it internally before decoding `payload`.
    fn decode_packet(&mut self, ext_seq: u32, payload: &[u8], out: &mut [i16]) -> usize;

    /// Note that a packet for `ext_seq` was received but will not be
    /// decoded (e.g. it was redundant or duplicate). Must not move the
    /// decoder's expected sequence number backwards.
    fn on_unused_packet_received(&mut self, ext_seq: u32);

    /// Produce one concealment frame in place of a missing packet,
    /// returning the number of stereo sample pairs written.
    fn conceal(&mut self, out: &mut [i16]) -> usize;
}

/// Encodes 48 kHz stereo PCM into one audio stream's wire format.
pub trait AudioEncoder: Send {
    /// Encode `pcm` into `out`, returning the number of bytes written.
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> usize;
}
