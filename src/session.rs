//! The practice session engine.
//!
//! [`ReaderSession`] is the single-threaded heart of the crate: hosts call
//! command methods (play, record, toggle play-all, replay) and pump
//! [`EngineEvent`]s through [`ReaderSession::pump`]; the engine reacts by
//! driving the service ports and emitting [`Notice`]s. All asynchronous
//! machinery (synthesis, microphone, trim workers) lives behind the event
//! channel, so every state transition happens on the caller's thread.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use tracing::{debug, info};

use crate::audio::{
    silence_to_remove_ms, spawn_trim_worker, CaptureOutcome, CaptureSession, CaptureStop,
};
use crate::config::ReaderConfig;
use crate::events::{EngineEvent, Notice, PracticeError};
use crate::sequencer::{Sequencer, SequencerEffect, SequencerState};
use crate::services::{
    AudioCodec, ClipPlayer, EventSender, MicError, MicrophonePort, SpeechSynthesizer,
    UtteranceRequest,
};
use crate::store::{Clip, RecordingStore};
use crate::telemetry;
use crate::text::{split_sentences, total_words, Sentence};

/// Recording behavior for one sentence playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayOptions {
    /// Record even if the sentence already has a clip.
    pub force_record: bool,
    /// Record only if the sentence has no clip yet.
    pub auto_record_missing: bool,
}

impl PlayOptions {
    /// Speak the sentence, never record.
    pub fn listen_only() -> Self {
        Self { force_record: false, auto_record_missing: false }
    }

    /// Speak the sentence, then record a new take regardless of stored clips.
    pub fn forced_record() -> Self {
        Self { force_record: true, auto_record_missing: false }
    }

    /// Play-all behavior: record whatever is still missing.
    pub fn sequenced() -> Self {
        Self { force_record: false, auto_record_missing: true }
    }
}

/// The external ports a session drives.
pub struct Services {
    pub synthesizer: Box<dyn SpeechSynthesizer>,
    pub microphone: Box<dyn MicrophonePort>,
    pub codec: Arc<dyn AudioCodec>,
    pub clip_player: Box<dyn ClipPlayer>,
}

/// Counters for the host's status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub sentences: usize,
    pub words: usize,
    pub recorded: usize,
}

struct ActiveUtterance {
    id: u64,
    index: usize,
    options: PlayOptions,
}

/// One shadow-reading practice session over a block of text.
pub struct ReaderSession {
    config: ReaderConfig,
    sentences: Vec<Sentence>,
    store: RecordingStore,
    sequencer: Sequencer,
    services: Services,
    events_tx: EventSender,
    events_rx: Receiver<EngineEvent>,
    notices: Sender<Notice>,
    next_utterance_id: u64,
    next_generation: u64,
    next_replay_token: u64,
    utterance: Option<ActiveUtterance>,
    capture: Option<CaptureSession>,
    /// Set when the platform reported capture as permanently unavailable.
    capture_disabled: bool,
    replaying: Option<(usize, u64)>,
    current_index: Option<usize>,
    /// High-water mark of event timestamps; the engine has no clock of its own.
    now_ms: u64,
}

impl ReaderSession {
    /// Build the engine's event channel. Backends get clones of the sender.
    pub fn channel() -> (EventSender, Receiver<EngineEvent>) {
        crossbeam_channel::unbounded()
    }

    pub fn new(
        config: ReaderConfig,
        services: Services,
        events_tx: EventSender,
        events_rx: Receiver<EngineEvent>,
    ) -> Result<(Self, Receiver<Notice>)> {
        config.validate()?;
        telemetry::init_tracing(&config);
        let (notices, notices_rx) = crossbeam_channel::unbounded();
        let session = Self {
            config,
            sentences: Vec::new(),
            store: RecordingStore::new(),
            sequencer: Sequencer::new(),
            services,
            events_tx,
            events_rx,
            notices,
            next_utterance_id: 0,
            next_generation: 0,
            next_replay_token: 0,
            utterance: None,
            capture: None,
            capture_disabled: false,
            replaying: None,
            current_index: None,
            now_ms: 0,
        };
        Ok((session, notices_rx))
    }

    /// Sender half of the event channel, for wiring additional backends.
    pub fn event_sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    pub fn store(&self) -> &RecordingStore {
        &self.store
    }

    pub fn sequencer_state(&self) -> SequencerState {
        self.sequencer.state()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            sentences: self.sentences.len(),
            words: total_words(&self.sentences),
            recorded: self.store.recorded_count(),
        }
    }

    // --- commands ---

    /// Replace the working text. Drops all clips and sequencing progress.
    pub fn process_text(&mut self, text: &str) {
        self.halt_everything();
        self.sentences = split_sentences(text);
        let count = self.sentences.len();
        let words = total_words(&self.sentences);
        self.store.reset(count);
        self.sequencer.reset(count);
        self.current_index = None;
        info!(sentences = count, words, "text processed");
        self.notify(Notice::SentencesReady { count, words });
    }

    /// Drop the text, clips, and all progress.
    pub fn clear(&mut self) {
        self.halt_everything();
        self.sentences.clear();
        self.store.reset(0);
        self.sequencer.reset(0);
        self.current_index = None;
        self.notify(Notice::SentencesReady { count: 0, words: 0 });
    }

    /// Speak one sentence without recording. Interrupts play-all but keeps
    /// its resume point.
    pub fn play_sentence(&mut self, index: usize) -> bool {
        if index >= self.sentences.len() {
            return false;
        }
        self.interrupt_sequencer();
        self.begin_sentence(index, PlayOptions::listen_only());
        true
    }

    /// Speak one sentence, then record a fresh take for it.
    pub fn record_sentence(&mut self, index: usize) -> bool {
        if index >= self.sentences.len() {
            return false;
        }
        self.interrupt_sequencer();
        self.begin_sentence(index, PlayOptions::forced_record());
        true
    }

    /// Play/pause/resume the whole-text run.
    pub fn toggle_play_all(&mut self) {
        let effect = self.sequencer.toggle();
        self.apply_effect(effect);
        self.emit_sequencer_notice();
    }

    /// Hard-stop the run and forget its resume point.
    pub fn stop_all(&mut self) {
        let effect = self.sequencer.stop();
        self.apply_effect(effect);
        self.emit_sequencer_notice();
    }

    /// Play the sentence after the current one.
    pub fn next_sentence(&mut self) -> bool {
        let next = match self.current_index {
            Some(i) => i + 1,
            None => 0,
        };
        self.play_sentence(next)
    }

    /// Play the sentence before the current one.
    pub fn previous_sentence(&mut self) -> bool {
        let prev = match self.current_index {
            Some(i) if i > 0 => i - 1,
            _ => 0,
        };
        self.play_sentence(prev)
    }

    /// Play back the stored clip for a sentence.
    pub fn replay_recording(&mut self, index: usize) -> bool {
        let Some(clip) = self.store.get(index) else {
            return false;
        };
        let bytes = clip.bytes();
        let encoding = clip.encoding().clone();
        self.interrupt_sequencer();
        self.halt_everything();
        self.next_replay_token += 1;
        let token = self.next_replay_token;
        match self.services.clip_player.play(bytes, &encoding, token) {
            Ok(()) => {
                self.replaying = Some((index, token));
                self.current_index = Some(index);
                true
            }
            Err(err) => {
                self.emit_error(PracticeError::PlaybackError(err.to_string()));
                false
            }
        }
    }

    /// Turn recording on or off for the rest of the session.
    ///
    /// Disabling mid-capture finalizes the in-flight recording as interrupted
    /// rather than throwing it away; the sentence lifecycle still completes.
    pub fn set_microphone_enabled(&mut self, enabled: bool) {
        if !enabled && self.capture.is_some() {
            self.abort_capture(false);
        }
        self.config.microphone_enabled = enabled;
        if enabled {
            // A fresh opt-in gets a fresh chance even after a hard failure.
            self.capture_disabled = false;
        } else {
            self.services.microphone.release();
        }
    }

    // --- event pump ---

    /// Wait up to `timeout` for one event and handle it. Returns whether an
    /// event was handled.
    pub fn pump(&mut self, timeout: Duration) -> bool {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Handle everything already queued without blocking.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::UtteranceStarted { utterance, at_ms } => {
                self.advance_clock(at_ms);
                if let Some(active) = &self.utterance {
                    if active.id == utterance {
                        let index = active.index;
                        self.notify(Notice::UtteranceStarted { index });
                    }
                }
            }
            EngineEvent::WordBoundary { utterance, char_index } => {
                if let Some(active) = &self.utterance {
                    if active.id == utterance {
                        let index = active.index;
                        self.notify(Notice::WordBoundary { index, char_index });
                    }
                }
            }
            EngineEvent::UtteranceEnded { utterance, at_ms } => {
                self.advance_clock(at_ms);
                self.on_utterance_ended(utterance);
            }
            EngineEvent::UtteranceFailed { utterance, message } => {
                self.on_utterance_failed(utterance, message);
            }
            EngineEvent::MicFrame { samples, at_ms } => {
                self.advance_clock(at_ms);
                // A frame stamped before this capture began belongs to an
                // earlier, already-stopped recorder.
                let stop = self
                    .capture
                    .as_mut()
                    .filter(|c| at_ms >= c.capture_start_ms())
                    .and_then(|c| c.on_frame(&samples, at_ms));
                if let Some(stop) = stop {
                    self.stop_capture(stop);
                }
            }
            EngineEvent::MicChunk { bytes, at_ms } => {
                self.advance_clock(at_ms);
                if let Some(capture) = self.capture.as_mut() {
                    if at_ms >= capture.capture_start_ms() {
                        capture.on_chunk(bytes);
                    }
                }
            }
            EngineEvent::ClipEnded { token } => {
                if let Some((index, expected)) = self.replaying {
                    if expected == token {
                        self.replaying = None;
                        self.notify(Notice::ReplayFinished { index });
                    }
                }
            }
            EngineEvent::ClipFailed { token, message } => {
                if let Some((_, expected)) = self.replaying {
                    if expected == token {
                        self.replaying = None;
                        self.emit_error(PracticeError::PlaybackError(message));
                    }
                }
            }
            EngineEvent::TrimFinished { index, generation, trimmed } => {
                self.on_trim_finished(index, generation, trimmed);
            }
            EngineEvent::Tick { at_ms } => {
                self.advance_clock(at_ms);
                let stop = self.capture.as_mut().and_then(|c| c.on_tick(at_ms));
                if let Some(stop) = stop {
                    self.stop_capture(stop);
                }
            }
        }
    }

    // --- internals ---

    fn advance_clock(&mut self, at_ms: u64) {
        self.now_ms = self.now_ms.max(at_ms);
    }

    fn notify(&self, notice: Notice) {
        // A dropped receiver means the host went away; keep running.
        let _ = self.notices.send(notice);
    }

    fn emit_error(&mut self, error: PracticeError) {
        if !error.is_recoverable() {
            self.capture_disabled = true;
        }
        self.notify(Notice::Error {
            kind: error.label().to_string(),
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        });
    }

    fn emit_sequencer_notice(&self) {
        let state = self.sequencer.state();
        self.notify(Notice::Sequencer {
            state: state.label().to_string(),
            index: state.index(),
        });
    }

    fn recording_allowed(&self) -> bool {
        self.config.microphone_enabled && !self.capture_disabled
    }

    fn interrupt_sequencer(&mut self) {
        if self.sequencer.state() != SequencerState::Stopped {
            self.sequencer.interrupt();
            self.emit_sequencer_notice();
        }
    }

    fn begin_sentence(&mut self, index: usize, options: PlayOptions) {
        if let Some(effect) = self.start_utterance(index, options) {
            self.apply_effect(effect);
        }
    }

    /// Start speaking one sentence. When the synthesizer fails synchronously,
    /// the sentence is completed in place and the sequencer's follow-up
    /// effect is returned for the caller to run.
    fn start_utterance(&mut self, index: usize, options: PlayOptions) -> Option<SequencerEffect> {
        self.halt_everything();
        self.current_index = Some(index);
        let sentence = self.sentences.get(index)?;
        self.next_utterance_id += 1;
        let id = self.next_utterance_id;
        let request = UtteranceRequest {
            id,
            text: sentence.text.clone(),
            voice: self.config.voice.clone(),
            rate: self.config.rate,
            pitch: self.config.pitch,
        };
        self.utterance = Some(ActiveUtterance { id, index, options });
        debug!(index, utterance = id, "speaking sentence");
        match self.services.synthesizer.speak(request) {
            Ok(()) => None,
            Err(err) => {
                self.utterance = None;
                self.emit_error(PracticeError::PlaybackError(err.to_string()));
                Some(self.complete_sentence(index))
            }
        }
    }

    fn on_utterance_ended(&mut self, id: u64) {
        let Some(active) = self.utterance.take() else {
            return;
        };
        if active.id != id {
            // A stale completion from a canceled utterance.
            self.utterance = Some(active);
            return;
        }
        let should_record = self.recording_allowed()
            && (active.options.force_record
                || (active.options.auto_record_missing && !self.store.has_clip(active.index)));
        if should_record {
            self.start_capture(active.index);
        } else {
            self.sentence_done(active.index);
        }
    }

    fn on_utterance_failed(&mut self, id: u64, message: String) {
        let Some(active) = self.utterance.take() else {
            return;
        };
        if active.id != id {
            self.utterance = Some(active);
            return;
        }
        self.emit_error(PracticeError::PlaybackError(message));
        self.sentence_done(active.index);
    }

    fn start_capture(&mut self, index: usize) {
        if let Err(err) = self.services.microphone.ensure_stream() {
            self.handle_mic_error(err);
            self.sentence_done(index);
            return;
        }
        let encoding = match self.services.microphone.start_recorder() {
            Ok(encoding) => encoding,
            Err(err) => {
                self.handle_mic_error(err);
                self.sentence_done(index);
                return;
            }
        };
        self.next_generation += 1;
        let generation = self.next_generation;
        self.capture = Some(CaptureSession::new(
            index,
            generation,
            encoding,
            self.config.vad_config(),
            self.config.capture_config(),
            self.now_ms,
        ));
        debug!(index, generation, start_ms = self.now_ms, "capture started");
        self.notify(Notice::RecordingStarted { index });
    }

    fn handle_mic_error(&mut self, err: MicError) {
        match err {
            MicError::PermissionDenied => self.emit_error(PracticeError::PermissionDenied),
            MicError::Unavailable(msg) => self.emit_error(PracticeError::CaptureUnavailable(msg)),
        }
    }

    fn stop_capture(&mut self, stop: CaptureStop) {
        self.services.microphone.stop_recorder();
        if let Some(capture) = self.capture.take() {
            self.finalize_capture(capture, stop, true);
        }
    }

    /// End an in-flight capture from outside the normal stop path.
    ///
    /// `discard` throws the audio away without completing the sentence
    /// lifecycle (the interrupting command takes over). A non-discarding
    /// abort keeps whatever was captured and lets the lifecycle finish.
    fn abort_capture(&mut self, discard: bool) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        self.services.microphone.stop_recorder();
        if discard {
            let index = capture.index();
            let _ = capture.discard();
            self.notify(Notice::RecordingDiscarded {
                index,
                reason: "interrupted".to_string(),
            });
        } else {
            let stop = CaptureStop::Interrupted { at_ms: self.now_ms };
            self.finalize_capture(capture, stop, true);
        }
    }

    fn finalize_capture(&mut self, capture: CaptureSession, stop: CaptureStop, advance: bool) {
        let index = capture.index();
        match capture.finish(stop) {
            CaptureOutcome::NoSpeech => {
                debug!(index, stop = stop.label(), "capture ended without speech");
                // An interrupted take with no speech is the user's own stop,
                // not a detection failure.
                if !matches!(stop, CaptureStop::Interrupted { .. }) {
                    self.emit_error(PracticeError::NoSpeechDetected);
                }
                self.notify(Notice::RecordingDiscarded {
                    index,
                    reason: "no_speech".to_string(),
                });
            }
            CaptureOutcome::Discarded => {}
            CaptureOutcome::Recorded { recording, stop } => {
                let generation = recording.generation;
                let duration_ms = recording.duration_ms();
                debug!(
                    index,
                    generation,
                    stop = stop.label(),
                    duration_ms,
                    bytes = recording.bytes.len(),
                    "capture finished"
                );
                self.store.publish(
                    index,
                    Clip::provisional(
                        Arc::clone(&recording.bytes),
                        recording.encoding.clone(),
                        generation,
                        Some(duration_ms),
                    ),
                );
                self.notify(Notice::RecordingSaved {
                    index,
                    duration_ms: Some(duration_ms),
                    provisional: true,
                });
                let trim_cfg = self.config.trim_config();
                let remove_ms = silence_to_remove_ms(
                    recording.speech_start_ms,
                    recording.capture_start_ms,
                    &trim_cfg,
                );
                if remove_ms > 0 {
                    spawn_trim_worker(
                        Arc::clone(&self.services.codec),
                        recording,
                        trim_cfg,
                        self.events_tx.clone(),
                    );
                } else {
                    self.store.settle(index, generation);
                    self.notify(Notice::RecordingSaved {
                        index,
                        duration_ms: Some(duration_ms),
                        provisional: false,
                    });
                }
            }
        }
        if advance {
            self.sentence_done(index);
        }
    }

    fn on_trim_finished(
        &mut self,
        index: usize,
        generation: u64,
        trimmed: Option<crate::audio::TrimmedClip>,
    ) {
        match trimmed {
            Some(clip) => {
                let duration_ms = clip.duration_ms;
                let applied = self.store.apply_trimmed(
                    index,
                    generation,
                    Clip::finalized(
                        Arc::new(clip.bytes),
                        clip.encoding,
                        generation,
                        Some(duration_ms),
                    ),
                );
                if applied {
                    self.notify(Notice::RecordingSaved {
                        index,
                        duration_ms: Some(duration_ms),
                        provisional: false,
                    });
                }
            }
            None => {
                if self.store.settle(index, generation) {
                    let codec = Arc::clone(&self.services.codec);
                    let duration_ms = self
                        .store
                        .get_mut(index)
                        .and_then(|clip| clip.duration_or_compute(codec.as_ref()));
                    self.notify(Notice::RecordingSaved {
                        index,
                        duration_ms,
                        provisional: false,
                    });
                }
            }
        }
    }

    fn sentence_done(&mut self, index: usize) {
        let effect = self.complete_sentence(index);
        self.apply_effect(effect);
    }

    fn complete_sentence(&mut self, index: usize) -> SequencerEffect {
        self.current_index = Some(index);
        self.notify(Notice::SentenceCompleted { index });
        self.sequencer.on_sentence_done(index)
    }

    /// Run sequencer effects to quiescence. The advance is a loop, not a
    /// recursion: a synthesizer failing synchronously can complete every
    /// remaining sentence within this one call.
    fn apply_effect(&mut self, mut effect: SequencerEffect) {
        loop {
            match effect {
                SequencerEffect::None => return,
                SequencerEffect::Play { index } => {
                    match self.start_utterance(index, PlayOptions::sequenced()) {
                        Some(next) => effect = next,
                        None => return,
                    }
                }
                SequencerEffect::Halt => {
                    self.halt_everything();
                    return;
                }
                SequencerEffect::Finished => {
                    self.notify(Notice::PlayAllFinished);
                    return;
                }
            }
        }
    }

    fn halt_everything(&mut self) {
        if self.utterance.take().is_some() {
            self.services.synthesizer.cancel();
        }
        if self.replaying.take().is_some() {
            self.services.clip_player.stop();
        }
        self.abort_capture(true);
    }
}
