use anyhow::{bail, Result};

use super::defaults::{MAX_FRAME_SAMPLES, MAX_RECORDING_HARD_LIMIT_MS, MIN_FRAME_SAMPLES};
use super::ReaderConfig;

impl ReaderConfig {
    /// Check value ranges and cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.rms_threshold.is_finite() || !(0.0..=1.0).contains(&self.rms_threshold) {
            bail!(
                "rms_threshold must be between 0.0 and 1.0, got {}",
                self.rms_threshold
            );
        }
        if self.silence_duration_ms == 0 || self.silence_duration_ms > self.max_recording_duration_ms
        {
            bail!(
                "silence_duration_ms must be between 1 and max_recording_duration_ms ({}), got {}",
                self.max_recording_duration_ms,
                self.silence_duration_ms
            );
        }
        if self.max_recording_duration_ms == 0
            || self.max_recording_duration_ms > MAX_RECORDING_HARD_LIMIT_MS
        {
            bail!(
                "max_recording_duration_ms must be between 1 and {MAX_RECORDING_HARD_LIMIT_MS}, got {}",
                self.max_recording_duration_ms
            );
        }
        if self.min_recording_duration_ms > self.max_recording_duration_ms {
            bail!(
                "min_recording_duration_ms ({}) cannot exceed max_recording_duration_ms ({})",
                self.min_recording_duration_ms,
                self.max_recording_duration_ms
            );
        }
        if self.guard_buffer_ms > self.max_recording_duration_ms {
            bail!(
                "guard_buffer_ms ({}) cannot exceed max_recording_duration_ms ({})",
                self.guard_buffer_ms,
                self.max_recording_duration_ms
            );
        }
        if !(MIN_FRAME_SAMPLES..=MAX_FRAME_SAMPLES).contains(&self.frame_samples) {
            bail!(
                "frame_samples must be between {MIN_FRAME_SAMPLES} and {MAX_FRAME_SAMPLES}, got {}",
                self.frame_samples
            );
        }
        if !self.rate.is_finite() || !(0.25..=4.0).contains(&self.rate) {
            bail!("rate must be between 0.25 and 4.0, got {}", self.rate);
        }
        if !self.pitch.is_finite() || !(0.25..=4.0).contains(&self.pitch) {
            bail!("pitch must be between 0.25 and 4.0, got {}", self.pitch);
        }
        Ok(())
    }
}
