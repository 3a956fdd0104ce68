//! Decode an audio file (any container/codec Symphonia supports) into mono `f32` at
//! [`TARGET_SAMPLE_RATE`], handing fixed-size chunks to a [`SamplesSink`].
//!
//! Error policy while decoding:
//! - a corrupt frame (`DecodeError`) is skipped
//! - an I/O error is treated as end-of-stream
//! - anything else is fatal

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio_pipeline::{AudioPipeline, TARGET_SAMPLE_RATE};

/// Consumer of decoded mono samples at [`TARGET_SAMPLE_RATE`].
///
/// Returning `Ok(false)` stops decoding early.
pub trait SamplesSink {
    fn on_samples(&mut self, samples: &[f32]) -> Result<bool>;
}

impl SamplesSink for Vec<f32> {
    fn on_samples(&mut self, samples: &[f32]) -> Result<bool> {
        self.extend_from_slice(samples);
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct DecodeOpts {
    /// Chunk size handed to the sink, in target-rate frames (1600 = 100 ms).
    pub chunk_frames: usize,
}

impl Default for DecodeOpts {
    fn default() -> Self {
        Self { chunk_frames: 1024 }
    }
}

/// Decode the whole file into one buffer.
pub fn decode_file_to_vec(path: &Path) -> Result<Vec<f32>> {
    let mut samples = Vec::new();
    decode_file(path, &DecodeOpts::default(), &mut samples)?;
    Ok(samples)
}

/// Decode `path` and stream normalized chunks into `sink`.
pub fn decode_file(path: &Path, opts: &DecodeOpts, sink: &mut dyn SamplesSink) -> Result<()> {
    let mut input = OpenTrack::open(path)?;

    let chunk_frames = opts.chunk_frames.max(1);
    let mut pipeline = AudioPipeline::new();
    let mut ready = Vec::new();

    loop {
        let packet = match input.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(anyhow!(e)).context("failed reading packet"),
        };
        if packet.track_id() != input.track_id {
            continue;
        }

        match input.decoder.decode(&packet) {
            Ok(decoded) => pipeline
                .push(&decoded, &mut ready)
                .context("failed to normalize decoded audio")?,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(anyhow!(e)).context("decoder failure"),
        }

        if !emit_full_chunks(&mut ready, chunk_frames, sink)? {
            return Ok(());
        }
    }

    pipeline
        .finish(&mut ready)
        .context("failed to flush resampler")?;

    for chunk in ready.chunks(chunk_frames) {
        if !sink.on_samples(chunk)? {
            break;
        }
    }

    Ok(())
}

/// The audio track of an opened file, ready to decode.
struct OpenTrack {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
}

impl OpenTrack {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open audio file: {}", path.display()))?;

        // 256 KiB: symphonia needs a power of two above 32 KiB.
        let stream = MediaSourceStream::new(
            Box::new(file),
            MediaSourceStreamOptions {
                buffer_len: 256 * 1024,
            },
        );

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let format = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("unrecognized audio format: {}", path.display()))?
            .format;

        let params = format
            .tracks()
            .iter()
            .map(|track| (track.id, &track.codec_params))
            .find(|(_, params)| params.codec != CODEC_TYPE_NULL && params.sample_rate.is_some());
        let Some((track_id, params)) = params else {
            bail!("no audio track found");
        };

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| anyhow!(e))
            .context("failed to create decoder for audio track")?;

        Ok(Self {
            format,
            decoder,
            track_id,
        })
    }
}

/// Hand every complete chunk in `ready` to the sink, keeping the remainder buffered.
fn emit_full_chunks(
    ready: &mut Vec<f32>,
    chunk_frames: usize,
    sink: &mut dyn SamplesSink,
) -> Result<bool> {
    let full = ready.len() / chunk_frames * chunk_frames;
    if full == 0 {
        return Ok(true);
    }

    for chunk in ready[..full].chunks(chunk_frames) {
        if !sink.on_samples(chunk)? {
            return Ok(false);
        }
    }
    ready.drain(..full);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    /// Minimal 16-bit PCM WAV writer for fixtures.
    fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) -> Result<()> {
        let data_len = (samples.len() * 2) as u32;
        let byte_rate = sample_rate * u32::from(channels) * 2;

        let mut f = File::create(path)?;
        f.write_all(b"RIFF")?;
        f.write_all(&(36 + data_len).to_le_bytes())?;
        f.write_all(b"WAVEfmt ")?;
        f.write_all(&16u32.to_le_bytes())?;
        f.write_all(&1u16.to_le_bytes())?;
        f.write_all(&channels.to_le_bytes())?;
        f.write_all(&sample_rate.to_le_bytes())?;
        f.write_all(&byte_rate.to_le_bytes())?;
        f.write_all(&(channels * 2).to_le_bytes())?;
        f.write_all(&16u16.to_le_bytes())?;
        f.write_all(b"data")?;
        f.write_all(&data_len.to_le_bytes())?;
        for s in samples {
            f.write_all(&s.to_le_bytes())?;
        }
        Ok(())
    }

    #[test]
    fn decodes_16k_mono_wav_without_resampling() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tone.wav");
        write_wav(&path, TARGET_SAMPLE_RATE, 1, &vec![i16::MAX / 2; 4000])?;

        let samples = decode_file_to_vec(&path)?;
        assert_eq!(samples.len(), 4000);
        assert!(samples.iter().all(|s| (s - 0.5).abs() < 0.01));
        Ok(())
    }

    #[test]
    fn stereo_is_downmixed() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("stereo.wav");
        let interleaved: Vec<i16> = (0..2000).flat_map(|_| [i16::MAX / 2, 0]).collect();
        write_wav(&path, TARGET_SAMPLE_RATE, 2, &interleaved)?;

        let samples = decode_file_to_vec(&path)?;
        assert_eq!(samples.len(), 2000);
        assert!(samples.iter().all(|s| (s - 0.25).abs() < 0.01));
        Ok(())
    }

    #[test]
    fn resamples_8k_input_to_16k() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("low.wav");
        write_wav(&path, 8_000, 1, &vec![0; 8_000])?;

        let samples = decode_file_to_vec(&path)?;
        // One second of audio either way.
        let expected = TARGET_SAMPLE_RATE as usize;
        assert!(samples.len().abs_diff(expected) < 64, "{}", samples.len());
        Ok(())
    }

    #[test]
    fn sink_can_stop_early() -> Result<()> {
        struct FirstChunkOnly(usize);
        impl SamplesSink for FirstChunkOnly {
            fn on_samples(&mut self, samples: &[f32]) -> Result<bool> {
                self.0 += samples.len();
                Ok(false)
            }
        }

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("long.wav");
        write_wav(&path, TARGET_SAMPLE_RATE, 1, &vec![0; 16_000])?;

        let mut sink = FirstChunkOnly(0);
        decode_file(&path, &DecodeOpts { chunk_frames: 500 }, &mut sink)?;
        assert_eq!(sink.0, 500);
        Ok(())
    }

    #[test]
    fn garbage_input_fails_to_probe() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not audio")?;

        let err = decode_file_to_vec(&path).unwrap_err();
        assert!(format!("{err:#}").contains("unrecognized audio format"));
        Ok(())
    }

    #[test]
    fn missing_file_fails_to_open() {
        let err = decode_file_to_vec(Path::new("/no/such/file.wav")).unwrap_err();
        assert!(err.to_string().contains("failed to open audio file"));
    }
}
