//! Contracts between the engine core and the platform.
//!
//! The session owns one implementation of each trait and drives them from the
//! event loop thread. Backends deliver their asynchronous results by sending
//! [`EngineEvent`]s back through the channel handed to them at construction.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;

use crate::events::EngineEvent;

/// Sender half of the engine's event channel, cloned into every backend.
pub type EventSender = crossbeam_channel::Sender<EngineEvent>;

/// How a clip's bytes are laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEncoding {
    /// Interleaved little-endian f32 PCM.
    PcmF32 { sample_rate: u32, channels: u16 },
    /// A complete WAV container.
    Wav,
}

impl AudioEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            AudioEncoding::PcmF32 { .. } => "pcm_f32",
            AudioEncoding::Wav => "wav",
        }
    }
}

/// Decoded audio: one sample vector per channel, all the same length.
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frames() as u64 * 1000) / u64::from(self.sample_rate)
    }
}

/// One sentence handed to the synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    /// Engine-minted id echoed back in every related [`EngineEvent`].
    pub id: u64,
    pub text: String,
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
}

/// Text-to-speech port.
///
/// `speak` returns once the utterance is underway (or queued); progress and
/// completion come back as `UtteranceStarted` / `WordBoundary` /
/// `UtteranceEnded` / `UtteranceFailed` events carrying the request id.
pub trait SpeechSynthesizer {
    fn speak(&mut self, request: UtteranceRequest) -> Result<()>;

    /// Stop the current utterance, if any. Canceled utterances must not send
    /// an `UtteranceEnded` event.
    fn cancel(&mut self);
}

/// Why the microphone could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MicError {
    PermissionDenied,
    Unavailable(String),
}

impl fmt::Display for MicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MicError::PermissionDenied => write!(f, "microphone permission denied"),
            MicError::Unavailable(msg) => write!(f, "microphone unavailable: {msg}"),
        }
    }
}

impl Error for MicError {}

/// Microphone port: stream lifecycle plus a recorder gate on top of it.
///
/// The stream may run continuously while the recorder flag toggles per
/// capture session; only a live recorder produces `MicFrame` / `MicChunk`
/// events.
pub trait MicrophonePort {
    /// Open the input stream if it is not already open.
    fn ensure_stream(&mut self) -> Result<(), MicError>;

    fn has_live_stream(&self) -> bool;

    /// Begin delivering frames and chunks. Returns the encoding the chunk
    /// bytes will use for this capture session.
    fn start_recorder(&mut self) -> Result<AudioEncoding, MicError>;

    /// Stop delivering frames and chunks. Events already in flight may still
    /// arrive; the engine drops anything stamped before the active capture
    /// began.
    fn stop_recorder(&mut self);

    /// Tear the stream down entirely.
    fn release(&mut self);
}

/// Byte-level audio codec. `Send + Sync` because trimming runs off-thread.
pub trait AudioCodec: Send + Sync {
    fn decode(&self, bytes: &[u8], encoding: &AudioEncoding) -> Result<AudioBuffer>;

    fn encode(&self, buffer: &AudioBuffer, encoding: &AudioEncoding) -> Result<Vec<u8>>;

    /// Duration without a caller-visible decode. The default decodes.
    fn duration_ms(&self, bytes: &[u8], encoding: &AudioEncoding) -> Result<u64> {
        Ok(self.decode(bytes, encoding)?.duration_ms())
    }
}

/// Clip replay port.
///
/// `play` starts playback and returns; a `ClipEnded { token }` event arrives
/// when the clip finishes naturally. Stopped playback sends nothing, and the
/// engine ignores tokens it no longer expects.
pub trait ClipPlayer {
    fn play(&mut self, bytes: Arc<Vec<u8>>, encoding: &AudioEncoding, token: u64) -> Result<()>;

    fn stop(&mut self);
}

/// Shared millisecond timeline for system backends.
///
/// Every backend stamping events clones one `Clock` so all timestamps share
/// an epoch. The engine core never reads a clock; it trusts event timestamps.
#[derive(Debug, Clone)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }

    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
