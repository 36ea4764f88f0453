//! Clip replay through rodio.

use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::debug;

use crate::events::EngineEvent;
use crate::services::{AudioEncoding, ClipPlayer, EventSender};

/// Rodio-backed implementation of [`ClipPlayer`].
///
/// Completion is reported by a watcher thread that parks on the sink and then
/// sends `ClipEnded { token }`. A stopped sink drains immediately, so the
/// watcher still exits; the stale token is ignored by the engine.
pub struct SystemClipPlayer {
    events: EventSender,
    // The stream must stay alive for its handle to keep working.
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Arc<Sink>>,
}

impl SystemClipPlayer {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            output: None,
            sink: None,
        }
    }

    fn ensure_output(&mut self) -> Result<&OutputStreamHandle> {
        if self.output.is_none() {
            let pair = OutputStream::try_default().context("no default audio output device")?;
            self.output = Some(pair);
        }
        let Some((_, handle)) = &self.output else {
            unreachable!("output opened above");
        };
        Ok(handle)
    }
}

impl ClipPlayer for SystemClipPlayer {
    fn play(&mut self, bytes: Arc<Vec<u8>>, encoding: &AudioEncoding, token: u64) -> Result<()> {
        self.stop();

        let handle = self.ensure_output()?;
        let sink = Sink::try_new(handle).context("failed to create playback sink")?;

        match encoding {
            AudioEncoding::PcmF32 { sample_rate, channels } => {
                let samples: Vec<f32> = bytes
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect();
                // Chunk bytes are already interleaved.
                sink.append(SamplesBuffer::new((*channels).max(1), *sample_rate, samples));
            }
            AudioEncoding::Wav => {
                let cursor = Cursor::new(bytes.as_ref().clone());
                let source = Decoder::new(cursor).context("failed to decode clip")?;
                sink.append(source);
            }
        }

        let sink = Arc::new(sink);
        self.sink = Some(Arc::clone(&sink));
        let events = self.events.clone();
        thread::spawn(move || {
            sink.sleep_until_end();
            debug!(token, "clip playback drained");
            let _ = events.send(EngineEvent::ClipEnded { token });
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}
