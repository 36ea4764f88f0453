//! System microphone capture via CPAL.
//!
//! The input stream stays open across capture sessions; a recording flag
//! gates whether the callback's audio is forwarded. The callback thread never
//! blocks: when the pump mutex is contended the batch is dropped and counted.

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::events::EngineEvent;
use crate::services::{AudioEncoding, Clock, EventSender, MicError, MicrophonePort};

/// Downmix interleaved multi-channel input to mono while converting to f32.
fn append_downmixed_samples<T, F>(buf: &mut Vec<f32>, data: &[T], channels: usize, mut convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }
    let mut acc = 0.0f32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += convert(sample);
        count += 1;
        if count == channels {
            buf.push(acc / channels as f32);
            acc = 0.0;
            count = 0;
        }
    }
    if count > 0 {
        buf.push(acc / count as f32);
    }
}

/// Accumulates callback audio and emits frame and chunk events.
struct FramePump {
    events: EventSender,
    clock: Clock,
    frame_samples: usize,
    pending: Vec<f32>,
}

impl FramePump {
    fn new(events: EventSender, clock: Clock, frame_samples: usize) -> Self {
        Self {
            events,
            clock,
            frame_samples: frame_samples.max(1),
            pending: Vec::with_capacity(frame_samples),
        }
    }

    /// Forward one mono batch: the raw bytes as a chunk, plus fixed-size
    /// analysis frames as they fill.
    fn push(&mut self, mono: &[f32]) {
        if mono.is_empty() {
            return;
        }
        let at_ms = self.clock.now_ms();
        let bytes: Vec<u8> = mono.iter().flat_map(|s| s.to_le_bytes()).collect();
        let _ = self.events.send(EngineEvent::MicChunk { bytes, at_ms });

        self.pending.extend_from_slice(mono);
        while self.pending.len() >= self.frame_samples {
            let frame: Vec<f32> = self.pending.drain(..self.frame_samples).collect();
            let _ = self.events.send(EngineEvent::MicFrame {
                samples: frame,
                at_ms: self.clock.now_ms(),
            });
        }
    }

}

/// CPAL-backed implementation of [`MicrophonePort`].
pub struct SystemMicrophone {
    events: EventSender,
    clock: Clock,
    frame_samples: usize,
    preferred_device: Option<String>,
    stream: Option<cpal::Stream>,
    recording: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
    encoding: Option<AudioEncoding>,
}

impl SystemMicrophone {
    pub fn new(
        events: EventSender,
        clock: Clock,
        frame_samples: usize,
        preferred_device: Option<String>,
    ) -> Self {
        Self {
            events,
            clock,
            frame_samples,
            preferred_device,
            stream: None,
            recording: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicUsize::new(0)),
            encoding: None,
        }
    }

    /// Input device names, for host-side device pickers.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| anyhow::anyhow!("no input devices available: {e}"))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// Callback batches dropped because the pump was contended.
    pub fn dropped_batches(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    fn classify(message: String) -> MicError {
        let lower = message.to_lowercase();
        if lower.contains("permission") || lower.contains("denied") {
            MicError::PermissionDenied
        } else {
            MicError::Unavailable(message)
        }
    }

    fn pick_device(&self) -> Result<cpal::Device, MicError> {
        let host = cpal::default_host();
        match &self.preferred_device {
            Some(name) => {
                let mut devices = host
                    .input_devices()
                    .map_err(|e| Self::classify(e.to_string()))?;
                devices
                    .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                    .ok_or_else(|| MicError::Unavailable(format!("input device '{name}' not found")))
            }
            None => host
                .default_input_device()
                .ok_or_else(|| MicError::Unavailable("no default input device".to_string())),
        }
    }

    fn build_stream(&mut self) -> Result<(), MicError> {
        let device = self.pick_device()?;
        let default_config = device
            .default_input_config()
            .map_err(|e| Self::classify(e.to_string()))?;
        let format = default_config.sample_format();
        let stream_config: StreamConfig = default_config.into();
        let sample_rate = stream_config.sample_rate.0;
        let channels = usize::from(stream_config.channels.max(1));
        debug!(?format, sample_rate, channels, "opening input stream");

        let pump = Arc::new(Mutex::new(FramePump::new(
            self.events.clone(),
            self.clock.clone(),
            self.frame_samples,
        )));
        let recording = Arc::clone(&self.recording);
        let dropped = Arc::clone(&self.dropped);
        let err_fn = |err| warn!(error = %err, "input stream error");

        macro_rules! input_stream {
            ($ty:ty, $convert:expr) => {{
                let pump = Arc::clone(&pump);
                let recording = Arc::clone(&recording);
                let dropped = Arc::clone(&dropped);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[$ty], _| {
                        if !recording.load(Ordering::Relaxed) {
                            return;
                        }
                        // Never block the audio thread on the pump lock.
                        match pump.try_lock() {
                            Ok(mut pump) => {
                                let mut mono = Vec::with_capacity(data.len() / channels.max(1));
                                append_downmixed_samples(&mut mono, data, channels, $convert);
                                pump.push(&mono);
                            }
                            Err(_) => {
                                dropped.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    },
                    err_fn,
                    None,
                )
            }};
        }

        let stream = match format {
            SampleFormat::F32 => input_stream!(f32, |s| s),
            SampleFormat::I16 => input_stream!(i16, |s: i16| f32::from(s) / 32_768.0),
            SampleFormat::U16 => {
                input_stream!(u16, |s: u16| (f32::from(s) - 32_768.0) / 32_768.0)
            }
            other => {
                return Err(MicError::Unavailable(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }
        .map_err(|e| Self::classify(e.to_string()))?;

        stream.play().map_err(|e| Self::classify(e.to_string()))?;
        self.stream = Some(stream);
        self.encoding = Some(AudioEncoding::PcmF32 { sample_rate, channels: 1 });
        Ok(())
    }
}

impl MicrophonePort for SystemMicrophone {
    fn ensure_stream(&mut self) -> Result<(), MicError> {
        if self.stream.is_some() {
            return Ok(());
        }
        self.build_stream()
    }

    fn has_live_stream(&self) -> bool {
        self.stream.is_some()
    }

    fn start_recorder(&mut self) -> Result<AudioEncoding, MicError> {
        self.ensure_stream()?;
        self.recording.store(true, Ordering::Relaxed);
        self.encoding
            .clone()
            .ok_or_else(|| MicError::Unavailable("stream has no negotiated format".to_string()))
    }

    fn stop_recorder(&mut self) {
        self.recording.store(false, Ordering::Relaxed);
    }

    fn release(&mut self) {
        self.recording.store(false, Ordering::Relaxed);
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
        }
        self.encoding = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_passthrough_for_mono() {
        let mut buf = Vec::new();
        append_downmixed_samples(&mut buf, &[1i16, -2, 3], 1, |s| f32::from(s));
        assert_eq!(buf, vec![1.0, -2.0, 3.0]);
    }

    #[test]
    fn downmix_averages_stereo_frames() {
        let mut buf = Vec::new();
        append_downmixed_samples(&mut buf, &[0.2f32, 0.4, -0.6, 0.6], 2, |s| s);
        assert_eq!(buf.len(), 2);
        assert!((buf[0] - 0.3).abs() < 1e-6);
        assert!(buf[1].abs() < 1e-6);
    }

    #[test]
    fn downmix_handles_trailing_partial_frame() {
        let mut buf = Vec::new();
        append_downmixed_samples(&mut buf, &[0.5f32, 0.5, 0.8], 2, |s| s);
        assert_eq!(buf.len(), 2);
        assert!((buf[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn pump_emits_chunk_per_batch_and_frames_on_fill() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut pump = FramePump::new(tx, Clock::new(), 4);
        pump.push(&[0.1; 3]);
        pump.push(&[0.2; 3]);

        let mut chunks = 0;
        let mut frames = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                EngineEvent::MicChunk { bytes, .. } => {
                    assert_eq!(bytes.len() % 4, 0);
                    chunks += 1;
                }
                EngineEvent::MicFrame { samples, .. } => {
                    assert_eq!(samples.len(), 4);
                    frames += 1;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(chunks, 2);
        assert_eq!(frames, 1);
        // Two samples still pending toward the next frame.
        assert_eq!(pump.pending.len(), 2);
    }

    #[test]
    fn classify_spots_permission_errors() {
        assert_eq!(
            SystemMicrophone::classify("Access denied by user".to_string()),
            MicError::PermissionDenied
        );
        assert!(matches!(
            SystemMicrophone::classify("device busy".to_string()),
            MicError::Unavailable(_)
        ));
    }
}
