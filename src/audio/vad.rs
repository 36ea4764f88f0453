//! RMS-threshold voice activity detection.
//!
//! Classifies mono frames as active or silent by comparing the frame's RMS
//! level against a linear threshold, and tracks when sustained silence has
//! followed detected speech.

/// Activity detection tunables.
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Linear RMS level above which a frame counts as voice activity.
    pub rms_threshold: f32,
    /// Continuous silence after speech that triggers [`ActivityEvent::SilenceReached`].
    pub silence_duration_ms: u64,
}

/// What the monitor noticed on this frame or poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    /// First active frame of the utterance.
    SpeechStart { at_ms: u64 },
    /// Silence has persisted for the configured window since the last active
    /// frame. `at_ms` is when the window filled, not when it was observed.
    SilenceReached { at_ms: u64 },
}

/// Root-mean-square level of a frame. Empty frames measure 0.
pub fn frame_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Tracks speech onset and trailing silence across a capture session.
///
/// The silence check is a repeating query: once the window has filled,
/// [`ActivityMonitor::poll`] keeps reporting it until a new active frame
/// re-arms the monitor. Callers decide when the report is actionable (for
/// example, only after a minimum recording length).
#[derive(Debug)]
pub struct ActivityMonitor {
    cfg: VadConfig,
    speech_start_ms: Option<u64>,
    last_active_ms: Option<u64>,
}

impl ActivityMonitor {
    pub fn new(cfg: VadConfig) -> Self {
        Self {
            cfg,
            speech_start_ms: None,
            last_active_ms: None,
        }
    }

    /// Classify one frame stamped at `at_ms`.
    pub fn process_frame(&mut self, samples: &[f32], at_ms: u64) -> Option<ActivityEvent> {
        if frame_rms(samples) > self.cfg.rms_threshold {
            self.last_active_ms = Some(at_ms);
            if self.speech_start_ms.is_none() {
                self.speech_start_ms = Some(at_ms);
                return Some(ActivityEvent::SpeechStart { at_ms });
            }
            return None;
        }
        self.poll(at_ms)
    }

    /// Check whether the silence window has filled as of `now_ms`.
    pub fn poll(&self, now_ms: u64) -> Option<ActivityEvent> {
        self.speech_start_ms?;
        let last_active = self.last_active_ms?;
        if now_ms.saturating_sub(last_active) >= self.cfg.silence_duration_ms {
            return Some(ActivityEvent::SilenceReached {
                at_ms: last_active + self.cfg.silence_duration_ms,
            });
        }
        None
    }

    /// When speech was first detected, if it was.
    pub fn speech_start_ms(&self) -> Option<u64> {
        self.speech_start_ms
    }

    pub fn reset(&mut self) {
        self.speech_start_ms = None;
        self.last_active_ms = None;
    }
}
