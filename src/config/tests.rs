use super::ReaderConfig;

#[test]
fn defaults_validate() {
    assert!(ReaderConfig::default().validate().is_ok());
}

#[test]
fn rejects_threshold_out_of_range() {
    let mut cfg = ReaderConfig::default();
    cfg.rms_threshold = -0.1;
    assert!(cfg.validate().is_err());

    cfg.rms_threshold = 1.5;
    assert!(cfg.validate().is_err());

    cfg.rms_threshold = f32::NAN;
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_zero_silence_duration() {
    let mut cfg = ReaderConfig::default();
    cfg.silence_duration_ms = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_silence_duration_beyond_ceiling() {
    let mut cfg = ReaderConfig::default();
    cfg.silence_duration_ms = cfg.max_recording_duration_ms + 1;
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_min_duration_above_max() {
    let mut cfg = ReaderConfig::default();
    cfg.min_recording_duration_ms = cfg.max_recording_duration_ms + 1;
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_excessive_recording_ceiling() {
    let mut cfg = ReaderConfig::default();
    cfg.max_recording_duration_ms = 200_000;
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_frame_samples_out_of_bounds() {
    let mut cfg = ReaderConfig::default();
    cfg.frame_samples = 16;
    assert!(cfg.validate().is_err());

    cfg.frame_samples = 1 << 20;
    assert!(cfg.validate().is_err());
}

#[test]
fn rejects_extreme_rate_and_pitch() {
    let mut cfg = ReaderConfig::default();
    cfg.rate = 0.1;
    assert!(cfg.validate().is_err());

    cfg.rate = 1.0;
    cfg.pitch = 8.0;
    assert!(cfg.validate().is_err());
}

#[test]
fn accepts_boundary_values() {
    let mut cfg = ReaderConfig::default();
    cfg.rate = 0.25;
    cfg.pitch = 4.0;
    cfg.silence_duration_ms = 1;
    cfg.min_recording_duration_ms = 0;
    assert!(cfg.validate().is_ok());
}

#[test]
fn config_round_trips_through_json() {
    let cfg = ReaderConfig {
        voice: Some("samantha".into()),
        silence_duration_ms: 700,
        ..ReaderConfig::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    let back: ReaderConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn partial_json_fills_defaults() {
    let cfg: ReaderConfig = serde_json::from_str(r#"{"rms_threshold":0.02}"#).unwrap();
    assert_eq!(cfg.rms_threshold, 0.02);
    assert_eq!(cfg.silence_duration_ms, 500);
    assert!(cfg.microphone_enabled);
}

#[test]
fn derived_configs_mirror_fields() {
    let cfg = ReaderConfig::default();
    assert_eq!(cfg.vad_config().rms_threshold, cfg.rms_threshold);
    assert_eq!(cfg.capture_config().max_recording_duration_ms, cfg.max_recording_duration_ms);
    assert_eq!(cfg.trim_config().guard_buffer_ms, cfg.guard_buffer_ms);
}
