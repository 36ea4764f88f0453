//! Engine configuration.
//!
//! Hosts construct a [`ReaderConfig`] (directly or by deserializing JSON),
//! tweak what they need, and hand it to the session. Validation happens once
//! at session construction.

pub mod defaults;
mod validation;

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audio::{CaptureConfig, TrimConfig, VadConfig};

/// Tunables for the whole practice lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Linear RMS threshold for voice activity.
    pub rms_threshold: f32,
    /// Continuous silence (ms) that ends an active recording.
    pub silence_duration_ms: u64,
    /// Minimum recording length (ms) before silence may end it.
    pub min_recording_duration_ms: u64,
    /// Hard recording ceiling (ms).
    pub max_recording_duration_ms: u64,
    /// Lead-in (ms) kept ahead of detected speech when trimming.
    pub guard_buffer_ms: u64,
    /// Removable lead-in (ms) below which trimming is skipped.
    pub trim_floor_ms: u64,
    /// Mono samples per activity-analysis frame.
    pub frame_samples: usize,
    /// Whether recording is attempted at all.
    pub microphone_enabled: bool,
    /// Synthesizer voice identifier, backend-specific.
    pub voice: Option<String>,
    /// Speaking rate multiplier.
    pub rate: f32,
    /// Pitch multiplier.
    pub pitch: f32,
    /// JSON trace log destination. `None` disables file telemetry.
    pub trace_log: Option<PathBuf>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            rms_threshold: defaults::DEFAULT_RMS_THRESHOLD,
            silence_duration_ms: defaults::DEFAULT_SILENCE_DURATION_MS,
            min_recording_duration_ms: defaults::DEFAULT_MIN_RECORDING_DURATION_MS,
            max_recording_duration_ms: defaults::DEFAULT_MAX_RECORDING_DURATION_MS,
            guard_buffer_ms: defaults::DEFAULT_GUARD_BUFFER_MS,
            trim_floor_ms: defaults::DEFAULT_TRIM_FLOOR_MS,
            frame_samples: defaults::DEFAULT_FRAME_SAMPLES,
            microphone_enabled: true,
            voice: None,
            rate: defaults::DEFAULT_SPEECH_RATE,
            pitch: defaults::DEFAULT_SPEECH_PITCH,
            trace_log: None,
        }
    }
}

impl ReaderConfig {
    pub fn vad_config(&self) -> VadConfig {
        VadConfig {
            rms_threshold: self.rms_threshold,
            silence_duration_ms: self.silence_duration_ms,
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            min_recording_duration_ms: self.min_recording_duration_ms,
            max_recording_duration_ms: self.max_recording_duration_ms,
        }
    }

    pub fn trim_config(&self) -> TrimConfig {
        TrimConfig {
            guard_buffer_ms: self.guard_buffer_ms,
            trim_floor_ms: self.trim_floor_ms,
        }
    }
}
