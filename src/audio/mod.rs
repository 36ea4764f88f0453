//! Recording pipeline: voice activity detection, capture sessions, and
//! leading-silence trimming.
//!
//! Everything here is pure state driven by timestamps carried on the events
//! themselves, so the whole pipeline is testable without a real clock or a
//! real microphone.

mod capture;
#[cfg(test)]
mod tests;
mod trim;
mod vad;

pub use capture::{
    CaptureConfig, CaptureOutcome, CaptureSession, CaptureStop, RawRecording,
};
pub use trim::{
    silence_to_remove_ms, spawn_trim_worker, trim_leading_silence, TrimConfig, TrimmedClip,
};
pub use vad::{frame_rms, ActivityEvent, ActivityMonitor, VadConfig};
