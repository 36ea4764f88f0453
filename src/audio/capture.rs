//! Per-sentence capture session state machine.
//!
//! A [`CaptureSession`] accumulates recorder chunks while feeding analysis
//! frames through the [`ActivityMonitor`], and decides when the recording is
//! over: sustained silence after enough audio, the hard ceiling, or an
//! external interruption.

use std::sync::Arc;

use super::vad::{ActivityEvent, ActivityMonitor, VadConfig};
use crate::services::AudioEncoding;

/// Duration gates for a capture session.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Silence cannot end the recording before this much time has elapsed.
    pub min_recording_duration_ms: u64,
    /// Elapsed time at which the recording stops unconditionally.
    pub max_recording_duration_ms: u64,
}

/// Why a capture session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStop {
    /// Trailing silence filled the configured window.
    Silence { at_ms: u64 },
    /// The hard duration ceiling was reached.
    Ceiling { at_ms: u64 },
    /// The session was cut short from outside (stop, skip, mic toggle).
    Interrupted { at_ms: u64 },
}

impl CaptureStop {
    pub fn label(&self) -> &'static str {
        match self {
            CaptureStop::Silence { .. } => "silence",
            CaptureStop::Ceiling { .. } => "ceiling",
            CaptureStop::Interrupted { .. } => "interrupted",
        }
    }

    pub fn at_ms(&self) -> u64 {
        match self {
            CaptureStop::Silence { at_ms }
            | CaptureStop::Ceiling { at_ms }
            | CaptureStop::Interrupted { at_ms } => *at_ms,
        }
    }
}

/// An untrimmed recording with the timing facts the trimmer needs.
#[derive(Debug, Clone)]
pub struct RawRecording {
    /// Sentence slot this recording belongs to.
    pub index: usize,
    /// Capture generation, used to discard stale trim results.
    pub generation: u64,
    pub bytes: Arc<Vec<u8>>,
    pub encoding: AudioEncoding,
    pub capture_start_ms: u64,
    pub speech_start_ms: Option<u64>,
    pub stopped_at_ms: u64,
}

impl RawRecording {
    pub fn duration_ms(&self) -> u64 {
        self.stopped_at_ms.saturating_sub(self.capture_start_ms)
    }
}

/// What a finished session produced.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    Recorded {
        recording: RawRecording,
        stop: CaptureStop,
    },
    /// The session ended without a single active frame.
    NoSpeech,
    /// The session was discarded outright; nothing is published.
    Discarded,
}

/// Accumulates one sentence's recording.
#[derive(Debug)]
pub struct CaptureSession {
    index: usize,
    generation: u64,
    encoding: AudioEncoding,
    monitor: ActivityMonitor,
    cfg: CaptureConfig,
    capture_start_ms: u64,
    chunks: Vec<Vec<u8>>,
}

impl CaptureSession {
    pub fn new(
        index: usize,
        generation: u64,
        encoding: AudioEncoding,
        vad_cfg: VadConfig,
        cfg: CaptureConfig,
        start_ms: u64,
    ) -> Self {
        Self {
            index,
            generation,
            encoding,
            monitor: ActivityMonitor::new(vad_cfg),
            cfg,
            capture_start_ms: start_ms,
            chunks: Vec::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn capture_start_ms(&self) -> u64 {
        self.capture_start_ms
    }

    /// Store one encoded recorder chunk.
    pub fn on_chunk(&mut self, bytes: Vec<u8>) {
        self.chunks.push(bytes);
    }

    /// Feed one analysis frame. Returns a stop decision when the session is
    /// over; the caller then calls [`CaptureSession::finish`].
    pub fn on_frame(&mut self, samples: &[f32], at_ms: u64) -> Option<CaptureStop> {
        if let Some(stop) = self.check_ceiling(at_ms) {
            return Some(stop);
        }
        match self.monitor.process_frame(samples, at_ms) {
            Some(ActivityEvent::SilenceReached { at_ms: silence_at }) => {
                self.silence_stop(silence_at, at_ms)
            }
            _ => None,
        }
    }

    /// Re-check the time gates without new audio.
    pub fn on_tick(&mut self, now_ms: u64) -> Option<CaptureStop> {
        if let Some(stop) = self.check_ceiling(now_ms) {
            return Some(stop);
        }
        match self.monitor.poll(now_ms) {
            Some(ActivityEvent::SilenceReached { at_ms: silence_at }) => {
                self.silence_stop(silence_at, now_ms)
            }
            _ => None,
        }
    }

    fn check_ceiling(&self, now_ms: u64) -> Option<CaptureStop> {
        let elapsed = now_ms.saturating_sub(self.capture_start_ms);
        if elapsed >= self.cfg.max_recording_duration_ms {
            return Some(CaptureStop::Ceiling {
                at_ms: self.capture_start_ms + self.cfg.max_recording_duration_ms,
            });
        }
        None
    }

    fn silence_stop(&self, silence_at_ms: u64, now_ms: u64) -> Option<CaptureStop> {
        // The silence window may fill before the minimum length; the monitor
        // keeps reporting it, so the stop fires once the minimum has elapsed.
        let earliest = self.capture_start_ms + self.cfg.min_recording_duration_ms;
        if now_ms < earliest {
            return None;
        }
        Some(CaptureStop::Silence {
            at_ms: silence_at_ms.max(earliest),
        })
    }

    /// Seal the session into an outcome.
    pub fn finish(self, stop: CaptureStop) -> CaptureOutcome {
        let speech_start_ms = self.monitor.speech_start_ms();
        if speech_start_ms.is_none() {
            return CaptureOutcome::NoSpeech;
        }
        let total: usize = self.chunks.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in &self.chunks {
            bytes.extend_from_slice(chunk);
        }
        CaptureOutcome::Recorded {
            recording: RawRecording {
                index: self.index,
                generation: self.generation,
                bytes: Arc::new(bytes),
                encoding: self.encoding,
                capture_start_ms: self.capture_start_ms,
                speech_start_ms,
                stopped_at_ms: stop.at_ms(),
            },
            stop,
        }
    }

    /// Throw the session away without publishing anything.
    pub fn discard(self) -> CaptureOutcome {
        CaptureOutcome::Discarded
    }
}
