//! Leading-silence trimming.
//!
//! Trimming is timestamp-driven: the capture session already knows when
//! speech started relative to the capture start, so the trimmer just drops
//! that lead-in (minus a guard buffer) from the decoded samples and
//! re-encodes. Runs on a detached worker thread; the result comes back as a
//! [`TrimFinished`](crate::events::EngineEvent::TrimFinished) event carrying
//! the capture generation, so a superseded recording's trim is dropped on
//! arrival.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::capture::RawRecording;
use crate::events::EngineEvent;
use crate::services::{AudioBuffer, AudioCodec, AudioEncoding, EventSender};

/// Trim tunables.
#[derive(Debug, Clone)]
pub struct TrimConfig {
    /// Lead-in preserved ahead of detected speech.
    pub guard_buffer_ms: u64,
    /// Removable lead-in below which trimming is skipped entirely.
    pub trim_floor_ms: u64,
}

/// A re-encoded clip with its measured duration.
#[derive(Debug, Clone)]
pub struct TrimmedClip {
    pub bytes: Vec<u8>,
    pub encoding: AudioEncoding,
    pub duration_ms: u64,
}

/// How much leading audio the trim pass would remove. Zero means skip the
/// pass and keep the clip as recorded.
pub fn silence_to_remove_ms(
    speech_start_ms: Option<u64>,
    capture_start_ms: u64,
    cfg: &TrimConfig,
) -> u64 {
    let Some(speech_start) = speech_start_ms else {
        return 0;
    };
    if speech_start <= capture_start_ms {
        return 0;
    }
    let removable = (speech_start - capture_start_ms).saturating_sub(cfg.guard_buffer_ms);
    if removable < cfg.trim_floor_ms.max(1) {
        return 0;
    }
    removable
}

/// Drop the leading silence from a recording.
///
/// Returns `None` when there is nothing worth removing or when the codec
/// fails; the caller keeps the untrimmed clip in both cases.
pub fn trim_leading_silence(
    codec: &dyn AudioCodec,
    recording: &RawRecording,
    cfg: &TrimConfig,
) -> Option<TrimmedClip> {
    let remove_ms = silence_to_remove_ms(
        recording.speech_start_ms,
        recording.capture_start_ms,
        cfg,
    );
    if remove_ms == 0 {
        return None;
    }

    let buffer = match codec.decode(&recording.bytes, &recording.encoding) {
        Ok(buffer) => buffer,
        Err(err) => {
            warn!(index = recording.index, error = %err, "trim decode failed, keeping raw clip");
            return None;
        }
    };
    if buffer.sample_rate == 0 {
        return None;
    }

    let skip = (remove_ms as usize * buffer.sample_rate as usize) / 1000;
    if skip == 0 || skip >= buffer.frames() {
        return None;
    }

    let trimmed = AudioBuffer {
        channels: buffer
            .channels
            .iter()
            .map(|ch| ch[skip..].to_vec())
            .collect(),
        sample_rate: buffer.sample_rate,
    };
    let duration_ms = trimmed.duration_ms();

    match codec.encode(&trimmed, &recording.encoding) {
        Ok(bytes) => Some(TrimmedClip {
            bytes,
            encoding: recording.encoding.clone(),
            duration_ms,
        }),
        Err(err) => {
            warn!(index = recording.index, error = %err, "trim encode failed, keeping raw clip");
            None
        }
    }
}

/// Run the trim pass off-thread and report back through the event channel.
pub fn spawn_trim_worker(
    codec: Arc<dyn AudioCodec>,
    recording: RawRecording,
    cfg: TrimConfig,
    events: EventSender,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let index = recording.index;
        let generation = recording.generation;
        let trimmed = trim_leading_silence(codec.as_ref(), &recording, &cfg);
        debug!(
            index,
            generation,
            trimmed = trimmed.is_some(),
            "trim pass finished"
        );
        // A closed channel just means the session is gone.
        let _ = events.send(EngineEvent::TrimFinished {
            index,
            generation,
            trimmed,
        });
    })
}
