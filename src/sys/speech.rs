//! Subprocess speech synthesis.
//!
//! Speaks through an external command (`say` on macOS, `espeak` elsewhere, or
//! anything the host supplies) built from a shell-style template. Because
//! subprocess TTS has no word-boundary callbacks, a watcher thread paces
//! synthetic boundary events from the speaking rate while polling the child
//! for exit.

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::events::EngineEvent;
use crate::services::{Clock, EventSender, SpeechSynthesizer, UtteranceRequest};

/// Nominal speaking speed the rate multiplier scales.
const BASE_WPM: f32 = 175.0;

/// How often the watcher polls the child process.
const POLL_INTERVAL: Duration = Duration::from_millis(40);

/// Platform default command template.
pub fn default_speech_command() -> String {
    if cfg!(target_os = "macos") {
        "say -r {wpm} {text}".to_string()
    } else {
        "espeak -s {wpm} -p {pitch50} {text}".to_string()
    }
}

/// Expand a command template into argv for one utterance.
///
/// Placeholders: `{text}`, `{voice}`, `{rate}`, `{pitch}`, `{wpm}` (rate as
/// words per minute), `{pitch50}` (pitch on a 0-99 scale). When the request
/// has no voice, the `{voice}` token and its preceding flag are dropped. A
/// template without `{text}` gets the text appended as the last argument.
fn build_command(template: &str, request: &UtteranceRequest) -> Result<Vec<String>> {
    let tokens = shell_words::split(template).context("invalid speech command template")?;
    if tokens.is_empty() {
        bail!("speech command template is empty");
    }
    let wpm = (BASE_WPM * request.rate).round() as i64;
    let pitch50 = ((50.0 * request.pitch).round() as i64).clamp(0, 99);

    let mut argv: Vec<String> = Vec::with_capacity(tokens.len() + 1);
    let mut saw_text = false;
    for token in tokens {
        if token.contains("{voice}") {
            match &request.voice {
                Some(voice) => argv.push(token.replace("{voice}", voice)),
                None => {
                    // Drop the voice value and the flag in front of it.
                    if argv.last().map(|t| t.starts_with('-')).unwrap_or(false) {
                        argv.pop();
                    }
                }
            }
            continue;
        }
        if token.contains("{text}") {
            saw_text = true;
        }
        let expanded = token
            .replace("{text}", &request.text)
            .replace("{rate}", &format!("{:.2}", request.rate))
            .replace("{pitch}", &format!("{:.2}", request.pitch))
            .replace("{wpm}", &wpm.to_string())
            .replace("{pitch50}", &pitch50.to_string());
        argv.push(expanded);
    }
    if !saw_text {
        argv.push(request.text.clone());
    }
    Ok(argv)
}

/// Character offsets where each word starts, for paced boundary events.
fn word_offsets(text: &str) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut in_word = false;
    for (i, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            in_word = false;
        } else if !in_word {
            offsets.push(i);
            in_word = true;
        }
    }
    offsets
}

/// Milliseconds between synthetic word boundaries at a given rate.
fn word_interval_ms(rate: f32) -> u64 {
    let wpm = BASE_WPM * rate.clamp(0.25, 4.0);
    (60_000.0 / wpm).round() as u64
}

type ChildSlot = Arc<Mutex<Option<Child>>>;

/// Subprocess implementation of [`SpeechSynthesizer`].
pub struct CommandSynthesizer {
    events: EventSender,
    clock: Clock,
    command: String,
    /// Slot for the current utterance's child. Replaced wholesale on each
    /// `speak`, so a watcher for a canceled utterance never sees the new one.
    slot: ChildSlot,
}

impl CommandSynthesizer {
    pub fn new(events: EventSender, clock: Clock, command: String) -> Self {
        Self {
            events,
            clock,
            command,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_default_command(events: EventSender, clock: Clock) -> Self {
        Self::new(events, clock, default_speech_command())
    }

    fn lock_slot(slot: &ChildSlot) -> std::sync::MutexGuard<'_, Option<Child>> {
        slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&mut self, request: UtteranceRequest) -> Result<()> {
        self.cancel();

        let argv = build_command(&self.command, &request)?;
        let (program, args) = argv
            .split_first()
            .context("speech command resolved to nothing")?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch speech command '{program}'"))?;
        debug!(utterance = request.id, program, "speech child spawned");

        let slot: ChildSlot = Arc::new(Mutex::new(Some(child)));
        self.slot = Arc::clone(&slot);

        let events = self.events.clone();
        let clock = self.clock.clone();
        let id = request.id;
        let offsets = word_offsets(&request.text);
        let interval_ms = word_interval_ms(request.rate);

        thread::spawn(move || {
            let _ = events.send(EngineEvent::UtteranceStarted {
                utterance: id,
                at_ms: clock.now_ms(),
            });
            let started = Instant::now();
            let mut next_word = 0usize;
            loop {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                while next_word < offsets.len()
                    && elapsed_ms >= next_word as u64 * interval_ms
                {
                    let _ = events.send(EngineEvent::WordBoundary {
                        utterance: id,
                        char_index: offsets[next_word],
                    });
                    next_word += 1;
                }

                let mut guard = Self::lock_slot(&slot);
                let Some(child) = guard.as_mut() else {
                    // Canceled: say nothing, the engine already moved on.
                    return;
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        guard.take();
                        drop(guard);
                        if status.success() {
                            let _ = events.send(EngineEvent::UtteranceEnded {
                                utterance: id,
                                at_ms: clock.now_ms(),
                            });
                        } else {
                            let _ = events.send(EngineEvent::UtteranceFailed {
                                utterance: id,
                                message: format!("speech command exited with {status}"),
                            });
                        }
                        return;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        guard.take();
                        drop(guard);
                        let _ = events.send(EngineEvent::UtteranceFailed {
                            utterance: id,
                            message: err.to_string(),
                        });
                        return;
                    }
                }
                drop(guard);
                thread::sleep(POLL_INTERVAL);
            }
        });
        Ok(())
    }

    fn cancel(&mut self) {
        let mut guard = Self::lock_slot(&self.slot);
        if let Some(mut child) = guard.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
