//! Engine input events and host-facing notices.
//!
//! [`EngineEvent`] is everything the engine can be woken up by: synthesis
//! progress, microphone frames and chunks, clip playback completion, trim
//! worker results, and plain clock ticks. [`Notice`] is the outbound side:
//! newline-delimited-JSON-friendly messages the embedding host renders
//! (highlighting, status, errors).

use std::fmt;

use serde::Serialize;

use crate::audio::TrimmedClip;

/// Inputs to the engine's event pump.
///
/// Timestamps are milliseconds on a monotone timeline shared by all event
/// sources (see [`crate::services::Clock`]); tests feed synthetic values.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The synthesizer began speaking the identified utterance.
    UtteranceStarted { utterance: u64, at_ms: u64 },
    /// A word boundary was reached within the identified utterance.
    WordBoundary { utterance: u64, char_index: usize },
    /// The identified utterance finished naturally.
    UtteranceEnded { utterance: u64, at_ms: u64 },
    /// The identified utterance failed mid-flight.
    UtteranceFailed { utterance: u64, message: String },
    /// One fixed-size mono audio frame from the live microphone stream.
    MicFrame { samples: Vec<f32>, at_ms: u64 },
    /// One encoded chunk from the recorder.
    MicChunk { bytes: Vec<u8>, at_ms: u64 },
    /// Clip replay finished naturally. The token identifies which play call.
    ClipEnded { token: u64 },
    /// Clip replay failed.
    ClipFailed { token: u64, message: String },
    /// Result of a background trim pass. `None` means keep the untrimmed
    /// provisional clip as the final answer.
    TrimFinished {
        index: usize,
        generation: u64,
        trimmed: Option<TrimmedClip>,
    },
    /// Time advanced with nothing else to report. Lets the capture ceiling
    /// fire even when no frames are flowing.
    Tick { at_ms: u64 },
}

/// Failure taxonomy for the practice lifecycle.
///
/// Everything here is recoverable at the session level: a failure ends in a
/// usable clip, no clip, or a continued sequencing decision. The engine never
/// stops pumping because of one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PracticeError {
    /// Microphone access refused; recording skipped for this attempt only.
    PermissionDenied,
    /// Platform lacks capture capability; recording disabled for the session.
    CaptureUnavailable(String),
    /// Hard ceiling reached without any voice activity; recording discarded.
    NoSpeechDetected,
    /// Speech synthesis failed; sequencing still advances.
    PlaybackError(String),
    /// Decode/encode failed during silence trimming; untrimmed clip kept.
    TrimFailure(String),
}

impl PracticeError {
    pub fn label(&self) -> &'static str {
        match self {
            PracticeError::PermissionDenied => "permission_denied",
            PracticeError::CaptureUnavailable(_) => "capture_unavailable",
            PracticeError::NoSpeechDetected => "no_speech_detected",
            PracticeError::PlaybackError(_) => "playback_error",
            PracticeError::TrimFailure(_) => "trim_failure",
        }
    }

    /// Whether the next attempt may succeed. `CaptureUnavailable` is the one
    /// condition that disables the recording feature for the session.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PracticeError::CaptureUnavailable(_))
    }
}

impl fmt::Display for PracticeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PracticeError::PermissionDenied => write!(f, "microphone access was denied"),
            PracticeError::CaptureUnavailable(msg) => {
                write!(f, "audio capture is unavailable: {msg}")
            }
            PracticeError::NoSpeechDetected => {
                write!(f, "no speech detected before the recording limit")
            }
            PracticeError::PlaybackError(msg) => write!(f, "playback failed: {msg}"),
            PracticeError::TrimFailure(msg) => write!(f, "silence trimming failed: {msg}"),
        }
    }
}

/// Messages emitted to the embedding host.
///
/// Serialized as JSON with a `"notice"` tag field for type discrimination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    /// Text was processed into sentences; the recording store was reset.
    SentencesReady { count: usize, words: usize },
    /// Synthesis started for the sentence at `index`.
    UtteranceStarted { index: usize },
    /// Word-boundary progress for the highlighting consumer.
    WordBoundary { index: usize, char_index: usize },
    /// The per-sentence lifecycle (utterance plus any recording) is over.
    SentenceCompleted { index: usize },
    /// A capture session began for the sentence at `index`.
    RecordingStarted { index: usize },
    /// A clip was stored. `provisional` is true for the raw pre-trim clip.
    RecordingSaved {
        index: usize,
        duration_ms: Option<u64>,
        provisional: bool,
    },
    /// A capture session ended without producing a clip.
    RecordingDiscarded { index: usize, reason: String },
    /// Replay of a stored clip finished.
    ReplayFinished { index: usize },
    /// Play-all state changed.
    Sequencer {
        state: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },
    /// Play-all ran off the end of the sentence list.
    PlayAllFinished,
    /// A practice error surfaced to the user.
    Error {
        kind: String,
        message: String,
        recoverable: bool,
    },
}

impl Notice {
    /// JSON encoding for hosts that bridge notices over a pipe or socket.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}
