//! Commands accepted by the engine's intake queue. Each variant carries the
//! target mixer handle plus whatever payload that mutation needs; a command
//! whose mixer no longer exists is dropped on drain (see
//! [`super::engine::Engine::drain_commands`]).

use bytes::Bytes;

use crate::mixer::Mixer;

use super::MixerHandle;

#[derive(Debug, Clone)]
pub struct AudioStreamConfig {
    pub stream_id: u32,
    pub payload_type: u8,
    pub sample_rate_hz: u32,
}

#[derive(Debug, Clone)]
pub struct VideoStreamConfig {
    pub stream_id: u32,
    pub payload_type: u8,
    pub max_kbps: u32,
}

pub enum Command {
    /// The handle was already reserved by `Engine::reserve_mixer`; draining
    /// this command installs `mixer` at that slot.
    AddMixer(MixerHandle, Box<dyn Mixer>),
    RemoveMixer(MixerHandle),

    AddAudioStream(MixerHandle, AudioStreamConfig),
    RemoveAudioStream(MixerHandle, u32),
    ReconfigureAudioStream(MixerHandle, AudioStreamConfig),

    AddVideoStream(MixerHandle, VideoStreamConfig),
    RemoveVideoStream(MixerHandle, u32),
    ReconfigureVideoStream(MixerHandle, VideoStreamConfig),

    AddDataStream(MixerHandle, u32),
    RemoveDataStream(MixerHandle, u32),

    AddRecordingStream(MixerHandle, u32),
    RemoveRecordingStream(MixerHandle, u32),
    StartRecording(MixerHandle),
    StopRecording(MixerHandle),

    StartTransport(MixerHandle),
    PinEndpoint(MixerHandle, u32),
    SendEndpointMessage(MixerHandle, u32, Bytes),
    SctpControl(MixerHandle, Bytes),
    AddPacketCache(MixerHandle, u32),
}

impl Command {
    /// The mixer every variant targets; used to drop commands whose mixer
    /// was destroyed before the command was drained.
    pub fn target(&self) -> MixerHandle {
        match self {
            Command::AddMixer(h, _)
            | Command::RemoveMixer(h)
            | Command::AddAudioStream(h, _)
            | Command::RemoveAudioStream(h, _)
            | Command::ReconfigureAudioStream(h, _)
            | Command::AddVideoStream(h, _)
            | Command::RemoveVideoStream(h, _)
            | Command::ReconfigureVideoStream(h, _)
            | Command::AddDataStream(h, _)
            | Command::RemoveDataStream(h, _)
            | Command::AddRecordingStream(h, _)
            | Command::RemoveRecordingStream(h, _)
            | Command::StartRecording(h)
            | Command::StopRecording(h)
            | Command::StartTransport(h)
            | Command::PinEndpoint(h, _)
            | Command::SendEndpointMessage(h, _, _)
            | Command::SctpControl(h, _)
            | Command::AddPacketCache(h, _) => *h,
        }
    }
}
