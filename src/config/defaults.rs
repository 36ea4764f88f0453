//! Default values and hard limits for [`super::ReaderConfig`].

/// Linear RMS level above which a frame counts as voice activity.
pub const DEFAULT_RMS_THRESHOLD: f32 = 0.01;

/// Continuous silence that auto-stops an active recording.
pub const DEFAULT_SILENCE_DURATION_MS: u64 = 500;

/// Recordings shorter than this cannot be ended by silence.
pub const DEFAULT_MIN_RECORDING_DURATION_MS: u64 = 400;

/// Hard ceiling on a single recording.
pub const DEFAULT_MAX_RECORDING_DURATION_MS: u64 = 15_000;

/// Leading audio preserved ahead of detected speech when trimming.
pub const DEFAULT_GUARD_BUFFER_MS: u64 = 250;

/// Minimum removable lead-in worth a trim pass at all.
pub const DEFAULT_TRIM_FLOOR_MS: u64 = 50;

/// Mono samples per analysis frame handed to the activity monitor.
pub const DEFAULT_FRAME_SAMPLES: usize = 4096;

/// Synthesis speaking rate multiplier.
pub const DEFAULT_SPEECH_RATE: f32 = 1.0;

/// Synthesis pitch multiplier.
pub const DEFAULT_SPEECH_PITCH: f32 = 1.0;

/// Upper bound accepted for `max_recording_duration_ms`.
pub const MAX_RECORDING_HARD_LIMIT_MS: u64 = 120_000;

/// Bounds accepted for `frame_samples`.
pub const MIN_FRAME_SAMPLES: usize = 64;
pub const MAX_FRAME_SAMPLES: usize = 65_536;
