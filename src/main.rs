//! Interactive shadow-reading CLI.
//!
//! Loads a text, then takes commands on stdin (`play 2`, `rec 2`, `all`,
//! `replay 2`, ...) while pumping the engine and printing notices.

use std::io::{BufRead, Read};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::Receiver;

use shadowread::services::Clock;
use shadowread::sys::{
    default_speech_command, CommandSynthesizer, SystemClipPlayer, SystemMicrophone, WavCodec,
};
use shadowread::{EngineEvent, Notice, ReaderConfig, ReaderSession, Services};

const PUMP_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "shadowread", about = "Shadow-reading practice at the terminal")]
struct Cli {
    /// Text file to practice. Reads stdin to EOF when omitted.
    file: Option<PathBuf>,

    /// Synthesizer voice identifier.
    #[arg(long)]
    voice: Option<String>,

    /// Speaking rate multiplier.
    #[arg(long, default_value_t = 1.0)]
    rate: f32,

    /// Pitch multiplier.
    #[arg(long, default_value_t = 1.0)]
    pitch: f32,

    /// Disable recording entirely.
    #[arg(long)]
    no_mic: bool,

    /// Input device name (see --list-input-devices).
    #[arg(long)]
    input_device: Option<String>,

    /// Print input device names and exit.
    #[arg(long)]
    list_input_devices: bool,

    /// Speech command template; defaults to the platform synthesizer.
    #[arg(long)]
    speech_command: Option<String>,

    /// Write a JSON trace log to this path.
    #[arg(long, env = "SHADOWREAD_TRACE_LOG")]
    trace_log: Option<PathBuf>,

    /// Print notices as JSON lines instead of human-readable text.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_input_devices {
        for name in SystemMicrophone::list_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    let text = match &cli.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let config = ReaderConfig {
        voice: cli.voice.clone(),
        rate: cli.rate,
        pitch: cli.pitch,
        microphone_enabled: !cli.no_mic,
        trace_log: cli.trace_log.clone(),
        ..ReaderConfig::default()
    };

    let clock = Clock::new();
    let (tx, rx) = ReaderSession::channel();
    let services = Services {
        synthesizer: Box::new(CommandSynthesizer::new(
            tx.clone(),
            clock.clone(),
            cli.speech_command
                .clone()
                .unwrap_or_else(default_speech_command),
        )),
        microphone: Box::new(SystemMicrophone::new(
            tx.clone(),
            clock.clone(),
            config.frame_samples,
            cli.input_device.clone(),
        )),
        codec: std::sync::Arc::new(WavCodec::new()),
        clip_player: Box::new(SystemClipPlayer::new(tx.clone())),
    };
    let (mut session, notices) = ReaderSession::new(config, services, tx.clone(), rx)?;

    session.process_text(&text);
    for (i, sentence) in session.sentences().iter().enumerate() {
        println!("[{i}] {}", sentence.text);
    }
    println!("commands: play N | rec N | replay N | all | stop | next | prev | mic on|off | stats | quit");

    let commands = spawn_stdin_reader();
    loop {
        session.pump(PUMP_TIMEOUT);
        // Keep time moving so duration gates fire between audio frames.
        let _ = tx.send(EngineEvent::Tick { at_ms: clock.now_ms() });
        print_notices(&notices, cli.json);

        match commands.try_recv() {
            Ok(line) => {
                if !dispatch(&mut session, line.trim()) {
                    break;
                }
            }
            Err(crossbeam_channel::TryRecvError::Empty) => {}
            Err(crossbeam_channel::TryRecvError::Disconnected) => break,
        }
    }
    Ok(())
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::bounded(16);
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Run one command line. Returns false when the session should end.
fn dispatch(session: &mut ReaderSession, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return true;
    };
    let index = parts.next().and_then(|s| s.parse::<usize>().ok());
    match (command, index) {
        ("play", Some(i)) => {
            if !session.play_sentence(i) {
                eprintln!("no sentence {i}");
            }
        }
        ("rec", Some(i)) => {
            if !session.record_sentence(i) {
                eprintln!("no sentence {i}");
            }
        }
        ("replay", Some(i)) => {
            if !session.replay_recording(i) {
                eprintln!("no recording for sentence {i}");
            }
        }
        ("all", _) => session.toggle_play_all(),
        ("stop", _) => session.stop_all(),
        ("next", _) => {
            session.next_sentence();
        }
        ("prev", _) => {
            session.previous_sentence();
        }
        ("mic", _) => match line.split_whitespace().nth(1) {
            Some("on") => session.set_microphone_enabled(true),
            Some("off") => session.set_microphone_enabled(false),
            _ => eprintln!("usage: mic on|off"),
        },
        ("stats", _) => {
            let stats = session.stats();
            println!(
                "{} sentences, {} words, {} recorded",
                stats.sentences, stats.words, stats.recorded
            );
        }
        ("clear", _) => session.clear(),
        ("quit", _) | ("q", _) => return false,
        _ => eprintln!("unknown command: {line}"),
    }
    true
}

fn print_notices(notices: &Receiver<Notice>, json: bool) {
    while let Ok(notice) = notices.try_recv() {
        if json {
            println!("{}", notice.to_json());
            continue;
        }
        match notice {
            Notice::SentencesReady { count, words } => {
                println!("ready: {count} sentences, {words} words");
            }
            Notice::UtteranceStarted { index } => println!("speaking [{index}]"),
            Notice::WordBoundary { .. } => {}
            Notice::SentenceCompleted { index } => println!("done [{index}]"),
            Notice::RecordingStarted { index } => println!("recording [{index}]..."),
            Notice::RecordingSaved { index, duration_ms, provisional } => {
                if !provisional {
                    let ms = duration_ms.unwrap_or(0);
                    println!("saved [{index}] ({ms} ms)");
                }
            }
            Notice::RecordingDiscarded { index, reason } => {
                println!("discarded [{index}]: {reason}");
            }
            Notice::ReplayFinished { index } => println!("replayed [{index}]"),
            Notice::Sequencer { state, index } => match index {
                Some(i) => println!("play-all: {state} [{i}]"),
                None => println!("play-all: {state}"),
            },
            Notice::PlayAllFinished => println!("play-all finished"),
            Notice::Error { message, .. } => eprintln!("error: {message}"),
        }
    }
}
