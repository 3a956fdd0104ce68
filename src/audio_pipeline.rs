//! PCM normalization for the Whisper backend.
//!
//! Turns Symphonia-decoded buffers of any channel layout and sample rate into mono `f32`
//! at [`TARGET_SAMPLE_RATE`]:
//! - copy into an interleaved `f32` scratch buffer
//! - downmix by averaging channels
//! - resample with rubato when the source rate differs
//!
//! Call [`AudioPipeline::finish`] at end-of-stream to flush the resampler's pending input.

use anyhow::{Context, Result, bail};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};

/// Sample rate whisper.cpp expects (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Source frames fed to rubato per `process()` call.
const RESAMPLER_BLOCK_FRAMES: usize = 2048;

/// Converts decoded audio into mono 16 kHz samples, appending them to a caller-owned buffer.
#[derive(Default)]
pub struct AudioPipeline {
    scratch: Option<SampleBuffer<f32>>,
    src_rate: Option<u32>,
    resampler: Option<SincFixedIn<f32>>,
    // Mono source samples waiting for a full resampler block.
    pending: Vec<f32>,
}

impl AudioPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one decoded buffer and append any ready output samples to `out`.
    pub fn push(&mut self, decoded: &AudioBufferRef<'_>, out: &mut Vec<f32>) -> Result<()> {
        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            bail!("decoded audio had zero channels");
        }
        if decoded.frames() == 0 {
            return Ok(());
        }

        match self.src_rate {
            None => self.src_rate = Some(spec.rate),
            Some(rate) if rate != spec.rate => {
                bail!("sample rate changed mid-stream ({rate} Hz -> {} Hz)", spec.rate)
            }
            Some(_) => {}
        }

        let interleaved = self.interleave(decoded, channels);
        let mono = downmix_to_mono(interleaved, channels);

        if spec.rate == TARGET_SAMPLE_RATE {
            out.extend_from_slice(&mono);
            return Ok(());
        }

        self.ensure_resampler(spec.rate)?;
        self.pending.extend_from_slice(&mono);
        self.drain_full_blocks(out)
    }

    /// Flush whatever the resampler still holds. A no-op when no resampling was needed.
    pub fn finish(&mut self, out: &mut Vec<f32>) -> Result<()> {
        if self.resampler.is_none() || self.pending.is_empty() {
            return Ok(());
        }

        // rubato wants exact block sizes, so pad the tail with silence and trim the
        // corresponding output afterwards.
        let tail_frames = self.pending.len();
        self.pending.resize(RESAMPLER_BLOCK_FRAMES, 0.0);

        let before = out.len();
        self.drain_full_blocks(out)?;

        let src_rate = self.src_rate.unwrap_or(TARGET_SAMPLE_RATE);
        let ratio = f64::from(TARGET_SAMPLE_RATE) / f64::from(src_rate);
        let expected = (tail_frames as f64 * ratio).ceil() as usize;
        out.truncate(before + expected.min(out.len() - before));
        Ok(())
    }

    fn interleave(&mut self, decoded: &AudioBufferRef<'_>, channels: usize) -> &[f32] {
        let needed = decoded.capacity() * channels;
        let too_small = self
            .scratch
            .as_ref()
            .is_none_or(|buf| buf.capacity() < needed);
        if too_small {
            self.scratch = Some(SampleBuffer::new(decoded.capacity() as u64, *decoded.spec()));
        }

        match self.scratch.as_mut() {
            Some(buf) => {
                buf.copy_interleaved_ref(decoded.clone());
                buf.samples()
            }
            None => &[],
        }
    }

    fn ensure_resampler(&mut self, src_rate: u32) -> Result<()> {
        if self.resampler.is_some() {
            return Ok(());
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(
            f64::from(TARGET_SAMPLE_RATE) / f64::from(src_rate),
            2.0,
            params,
            RESAMPLER_BLOCK_FRAMES,
            1,
        )
        .with_context(|| format!("failed to init resampler for {src_rate} Hz input"))?;

        self.resampler = Some(resampler);
        Ok(())
    }

    fn drain_full_blocks(&mut self, out: &mut Vec<f32>) -> Result<()> {
        let Some(resampler) = self.resampler.as_mut() else {
            bail!("resampler not initialized");
        };

        while self.pending.len() >= RESAMPLER_BLOCK_FRAMES {
            let block: Vec<f32> = self.pending.drain(..RESAMPLER_BLOCK_FRAMES).collect();
            let resampled = resampler
                .process(&[block], None)
                .context("resampler process failed")?;

            let [mono] = resampled.as_slice() else {
                bail!("expected mono output from resampler");
            };
            out.extend_from_slice(mono);
        }

        Ok(())
    }
}

/// Equal-weight average across channels.
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
