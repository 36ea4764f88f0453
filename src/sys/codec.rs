//! WAV and raw-PCM codec backed by hound.

use std::io::Cursor;

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::services::{AudioBuffer, AudioCodec, AudioEncoding};

/// Codec for the two byte layouts the recorder and store deal in: raw
/// interleaved f32 PCM and WAV containers.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavCodec;

impl WavCodec {
    pub fn new() -> Self {
        Self
    }

    fn decode_pcm(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioBuffer> {
        if bytes.len() % 4 != 0 {
            bail!("pcm byte length {} is not a multiple of 4", bytes.len());
        }
        let channels = usize::from(channels.max(1));
        let samples: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        let mut out = vec![Vec::with_capacity(samples.len() / channels); channels];
        for frame in samples.chunks(channels) {
            for (ch, sample) in frame.iter().enumerate() {
                out[ch].push(*sample);
            }
        }
        Ok(AudioBuffer { channels: out, sample_rate })
    }

    fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer> {
        let mut reader =
            WavReader::new(Cursor::new(bytes)).context("failed to parse wav header")?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));
        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .context("failed to read float wav samples")?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .context("failed to read int wav samples")?
            }
        };
        let mut out = vec![Vec::with_capacity(samples.len() / channels); channels];
        for frame in samples.chunks(channels) {
            for (ch, sample) in frame.iter().enumerate() {
                out[ch].push(*sample);
            }
        }
        Ok(AudioBuffer {
            channels: out,
            sample_rate: spec.sample_rate,
        })
    }

    fn encode_pcm(buffer: &AudioBuffer) -> Vec<u8> {
        let channels = buffer.channels.len().max(1);
        let frames = buffer.frames();
        let mut bytes = Vec::with_capacity(frames * channels * 4);
        for frame in 0..frames {
            for ch in &buffer.channels {
                let sample = ch.get(frame).copied().unwrap_or(0.0);
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
        }
        bytes
    }

    fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
        let spec = WavSpec {
            channels: buffer.channels.len().max(1) as u16,
            sample_rate: buffer.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer =
            WavWriter::new(&mut cursor, spec).context("failed to start wav writer")?;
        let frames = buffer.frames();
        for frame in 0..frames {
            for ch in &buffer.channels {
                let sample = ch.get(frame).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
                writer
                    .write_sample((sample * f32::from(i16::MAX)) as i16)
                    .context("failed to write wav sample")?;
            }
        }
        writer.finalize().context("failed to finalize wav")?;
        Ok(cursor.into_inner())
    }
}

impl AudioCodec for WavCodec {
    fn decode(&self, bytes: &[u8], encoding: &AudioEncoding) -> Result<AudioBuffer> {
        match encoding {
            AudioEncoding::PcmF32 { sample_rate, channels } => {
                Self::decode_pcm(bytes, *sample_rate, *channels)
            }
            AudioEncoding::Wav => Self::decode_wav(bytes),
        }
    }

    fn encode(&self, buffer: &AudioBuffer, encoding: &AudioEncoding) -> Result<Vec<u8>> {
        match encoding {
            AudioEncoding::PcmF32 { .. } => Ok(Self::encode_pcm(buffer)),
            AudioEncoding::Wav => Self::encode_wav(buffer),
        }
    }

    fn duration_ms(&self, bytes: &[u8], encoding: &AudioEncoding) -> Result<u64> {
        match encoding {
            // Raw PCM duration falls out of the byte count.
            AudioEncoding::PcmF32 { sample_rate, channels } => {
                if *sample_rate == 0 {
                    return Ok(0);
                }
                let frames = bytes.len() as u64 / 4 / u64::from((*channels).max(1));
                Ok(frames * 1000 / u64::from(*sample_rate))
            }
            AudioEncoding::Wav => Ok(self.decode(bytes, encoding)?.duration_ms()),
        }
    }
}
