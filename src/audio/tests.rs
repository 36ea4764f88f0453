use std::sync::Arc;

use anyhow::Result;

use super::capture::{CaptureConfig, CaptureOutcome, CaptureSession, CaptureStop};
use super::trim::{silence_to_remove_ms, trim_leading_silence, TrimConfig};
use super::vad::{frame_rms, ActivityEvent, ActivityMonitor, VadConfig};
use crate::services::{AudioBuffer, AudioCodec, AudioEncoding};

const RATE: u32 = 16_000;

fn vad_cfg() -> VadConfig {
    VadConfig {
        rms_threshold: 0.01,
        silence_duration_ms: 500,
    }
}

fn capture_cfg() -> CaptureConfig {
    CaptureConfig {
        min_recording_duration_ms: 400,
        max_recording_duration_ms: 15_000,
    }
}

fn loud_frame() -> Vec<f32> {
    vec![0.5; 256]
}

fn quiet_frame() -> Vec<f32> {
    vec![0.001; 256]
}

/// Mono f32 codec backed by plain little-endian byte copies.
struct PcmCodec;

impl AudioCodec for PcmCodec {
    fn decode(&self, bytes: &[u8], encoding: &AudioEncoding) -> Result<AudioBuffer> {
        let AudioEncoding::PcmF32 { sample_rate, .. } = encoding else {
            anyhow::bail!("unsupported encoding");
        };
        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(AudioBuffer {
            channels: vec![samples],
            sample_rate: *sample_rate,
        })
    }

    fn encode(&self, buffer: &AudioBuffer, _encoding: &AudioEncoding) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for sample in &buffer.channels[0] {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(bytes)
    }
}

fn pcm_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

// --- frame_rms ---

#[test]
fn rms_of_empty_frame_is_zero() {
    assert_eq!(frame_rms(&[]), 0.0);
}

#[test]
fn rms_of_constant_frame_is_its_magnitude() {
    let rms = frame_rms(&[0.5; 128]);
    assert!((rms - 0.5).abs() < 1e-6, "got {rms}");
}

#[test]
fn rms_ignores_sign() {
    assert!((frame_rms(&[-0.25; 64]) - 0.25).abs() < 1e-6);
}

// --- ActivityMonitor ---

#[test]
fn reports_speech_start_once() {
    let mut monitor = ActivityMonitor::new(vad_cfg());
    assert_eq!(
        monitor.process_frame(&loud_frame(), 100),
        Some(ActivityEvent::SpeechStart { at_ms: 100 })
    );
    assert_eq!(monitor.process_frame(&loud_frame(), 200), None);
    assert_eq!(monitor.speech_start_ms(), Some(100));
}

#[test]
fn silence_before_speech_reports_nothing() {
    let mut monitor = ActivityMonitor::new(vad_cfg());
    assert_eq!(monitor.process_frame(&quiet_frame(), 100), None);
    assert_eq!(monitor.poll(10_000), None);
}

#[test]
fn silence_window_fills_after_last_active_frame() {
    let mut monitor = ActivityMonitor::new(vad_cfg());
    monitor.process_frame(&loud_frame(), 100);
    monitor.process_frame(&loud_frame(), 300);
    assert_eq!(monitor.process_frame(&quiet_frame(), 600), None);
    assert_eq!(
        monitor.process_frame(&quiet_frame(), 800),
        Some(ActivityEvent::SilenceReached { at_ms: 800 })
    );
}

#[test]
fn silence_report_repeats_until_rearmed() {
    let mut monitor = ActivityMonitor::new(vad_cfg());
    monitor.process_frame(&loud_frame(), 0);
    assert_eq!(
        monitor.poll(600),
        Some(ActivityEvent::SilenceReached { at_ms: 500 })
    );
    assert_eq!(
        monitor.poll(900),
        Some(ActivityEvent::SilenceReached { at_ms: 500 })
    );
    // New speech re-arms.
    monitor.process_frame(&loud_frame(), 1000);
    assert_eq!(monitor.poll(1200), None);
    assert_eq!(
        monitor.poll(1500),
        Some(ActivityEvent::SilenceReached { at_ms: 1500 })
    );
}

#[test]
fn reset_clears_history() {
    let mut monitor = ActivityMonitor::new(vad_cfg());
    monitor.process_frame(&loud_frame(), 100);
    monitor.reset();
    assert_eq!(monitor.speech_start_ms(), None);
    assert_eq!(monitor.poll(10_000), None);
}

// --- CaptureSession ---

fn session(start_ms: u64) -> CaptureSession {
    CaptureSession::new(
        0,
        1,
        AudioEncoding::PcmF32 { sample_rate: RATE, channels: 1 },
        vad_cfg(),
        capture_cfg(),
        start_ms,
    )
}

#[test]
fn stops_on_silence_after_speech() {
    let mut s = session(0);
    assert_eq!(s.on_frame(&loud_frame(), 100), None);
    assert_eq!(s.on_frame(&loud_frame(), 300), None);
    assert_eq!(s.on_frame(&quiet_frame(), 600), None);
    assert_eq!(
        s.on_frame(&quiet_frame(), 900),
        Some(CaptureStop::Silence { at_ms: 800 })
    );
}

#[test]
fn silence_waits_for_minimum_duration() {
    // Speech ends almost immediately; the silence window fills at 550 ms,
    // well before the 1000 ms minimum, so the stop is deferred.
    let cfg = CaptureConfig {
        min_recording_duration_ms: 1000,
        max_recording_duration_ms: 15_000,
    };
    let mut s = CaptureSession::new(
        0,
        1,
        AudioEncoding::PcmF32 { sample_rate: RATE, channels: 1 },
        vad_cfg(),
        cfg,
        0,
    );
    s.on_frame(&loud_frame(), 50);
    // Window fills at 550, still under the 1000 ms minimum.
    assert_eq!(s.on_frame(&quiet_frame(), 600), None);
    assert_eq!(s.on_tick(900), None);
    // Past the minimum the standing silence report becomes actionable,
    // stamped at the earliest legal stop time.
    assert_eq!(s.on_tick(1100), Some(CaptureStop::Silence { at_ms: 1000 }));
}

#[test]
fn ceiling_stops_even_during_speech() {
    let mut s = session(0);
    s.on_frame(&loud_frame(), 100);
    assert_eq!(
        s.on_frame(&loud_frame(), 15_000),
        Some(CaptureStop::Ceiling { at_ms: 15_000 })
    );
}

#[test]
fn ceiling_fires_from_tick_without_frames() {
    let mut s = session(1000);
    assert_eq!(s.on_tick(15_999), None);
    assert_eq!(
        s.on_tick(16_000),
        Some(CaptureStop::Ceiling { at_ms: 16_000 })
    );
}

#[test]
fn finish_without_speech_is_no_speech() {
    let mut s = session(0);
    s.on_chunk(vec![1, 2, 3, 4]);
    s.on_frame(&quiet_frame(), 100);
    let outcome = s.finish(CaptureStop::Ceiling { at_ms: 15_000 });
    assert!(matches!(outcome, CaptureOutcome::NoSpeech));
}

#[test]
fn finish_concatenates_chunks() {
    let mut s = session(100);
    s.on_chunk(vec![1, 2]);
    s.on_chunk(vec![3, 4]);
    s.on_frame(&loud_frame(), 200);
    let outcome = s.finish(CaptureStop::Silence { at_ms: 900 });
    let CaptureOutcome::Recorded { recording, stop } = outcome else {
        panic!("expected a recording");
    };
    assert_eq!(recording.bytes.as_slice(), &[1, 2, 3, 4]);
    assert_eq!(recording.capture_start_ms, 100);
    assert_eq!(recording.speech_start_ms, Some(200));
    assert_eq!(recording.duration_ms(), 800);
    assert_eq!(stop.label(), "silence");
}

#[test]
fn discard_publishes_nothing() {
    let mut s = session(0);
    s.on_chunk(vec![9; 64]);
    s.on_frame(&loud_frame(), 100);
    assert!(matches!(s.discard(), CaptureOutcome::Discarded));
}

// --- trimming ---

fn trim_cfg() -> TrimConfig {
    TrimConfig {
        guard_buffer_ms: 250,
        trim_floor_ms: 50,
    }
}

#[test]
fn nothing_to_remove_without_speech_timing() {
    assert_eq!(silence_to_remove_ms(None, 0, &trim_cfg()), 0);
    assert_eq!(silence_to_remove_ms(Some(100), 100, &trim_cfg()), 0);
    assert_eq!(silence_to_remove_ms(Some(50), 100, &trim_cfg()), 0);
}

#[test]
fn guard_buffer_is_preserved() {
    // 1000 ms of lead-in minus the 250 ms guard leaves 750 ms to remove.
    assert_eq!(silence_to_remove_ms(Some(1000), 0, &trim_cfg()), 750);
}

#[test]
fn tiny_lead_in_is_left_alone() {
    // 280 ms lead-in minus the guard leaves 30 ms, under the 50 ms floor.
    assert_eq!(silence_to_remove_ms(Some(280), 0, &trim_cfg()), 0);
}

#[test]
fn trim_drops_leading_samples() {
    // One second of silence then one second of tone, speech detected at
    // 1000 ms. Expect 750 ms removed (guard preserved).
    let mut samples = vec![0.0f32; RATE as usize];
    samples.extend(vec![0.5f32; RATE as usize]);
    let recording = super::capture::RawRecording {
        index: 0,
        generation: 1,
        bytes: Arc::new(pcm_bytes(&samples)),
        encoding: AudioEncoding::PcmF32 { sample_rate: RATE, channels: 1 },
        capture_start_ms: 0,
        speech_start_ms: Some(1000),
        stopped_at_ms: 2000,
    };
    let clip = trim_leading_silence(&PcmCodec, &recording, &trim_cfg())
        .expect("trim should produce a clip");
    assert_eq!(clip.duration_ms, 1250);
    let expected_frames = (RATE as usize * 2) - (RATE as usize * 750 / 1000);
    assert_eq!(clip.bytes.len(), expected_frames * 4);
}

#[test]
fn trim_skipping_whole_clip_falls_back() {
    // Speech "starts" after the audio actually ends; skip would cover every
    // frame, so the raw clip is kept.
    let recording = super::capture::RawRecording {
        index: 0,
        generation: 1,
        bytes: Arc::new(pcm_bytes(&vec![0.0f32; 160])),
        encoding: AudioEncoding::PcmF32 { sample_rate: RATE, channels: 1 },
        capture_start_ms: 0,
        speech_start_ms: Some(5000),
        stopped_at_ms: 5100,
    };
    assert!(trim_leading_silence(&PcmCodec, &recording, &trim_cfg()).is_none());
}

#[test]
fn trim_below_floor_returns_none() {
    let recording = super::capture::RawRecording {
        index: 0,
        generation: 1,
        bytes: Arc::new(pcm_bytes(&vec![0.5f32; RATE as usize])),
        encoding: AudioEncoding::PcmF32 { sample_rate: RATE, channels: 1 },
        capture_start_ms: 0,
        speech_start_ms: Some(260),
        stopped_at_ms: 1000,
    };
    assert!(trim_leading_silence(&PcmCodec, &recording, &trim_cfg()).is_none());
}
