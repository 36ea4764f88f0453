//! System backends for the service ports: a CPAL microphone, a hound-backed
//! WAV/PCM codec, a rodio clip player, and a subprocess speech synthesizer.
//!
//! Each backend gets a clone of the engine's event sender plus a shared
//! [`Clock`](crate::services::Clock) so all timestamps share one epoch.

mod codec;
mod mic;
mod player;
mod speech;

pub use codec::WavCodec;
pub use mic::SystemMicrophone;
pub use player::SystemClipPlayer;
pub use speech::{default_speech_command, CommandSynthesizer};
