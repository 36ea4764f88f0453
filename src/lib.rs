//! Shadow-reading practice engine.
//!
//! A host application hands over a block of text; the engine splits it into
//! sentences, speaks each one through a speech synthesizer, and optionally
//! records the user repeating it. Recording auto-stops on detected silence,
//! leading silence is trimmed off the stored clip, and a play-all sequencer
//! chains the whole per-sentence lifecycle across the sentence list with
//! pause/resume/interrupt at any point.
//!
//! The engine core is single-threaded and event-driven: commands are plain
//! method calls on [`session::ReaderSession`], and everything asynchronous
//! (synthesis progress, microphone frames, trim results) arrives as
//! [`events::EngineEvent`]s over one channel. System backends for the
//! external service contracts live in [`sys`].

pub mod audio;
pub mod config;
pub mod events;
pub mod sequencer;
pub mod services;
pub mod session;
pub mod store;
pub mod sys;
mod telemetry;
pub mod text;

pub use config::ReaderConfig;
pub use events::{EngineEvent, Notice, PracticeError};
pub use sequencer::{Sequencer, SequencerEffect, SequencerState};
pub use session::{PlayOptions, ReaderSession, Services, SessionStats};
pub use store::{Clip, RecordingStore};
pub use text::{Direction, Sentence};
