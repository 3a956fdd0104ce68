use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, ensure};
use tracing::{debug, info};
use whisper_rs::{WhisperContext, WhisperContextParameters};

use crate::backend::Backend;
use crate::decoder::decode_file_to_vec;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::transcript::Transcript;

mod logging;
mod segments;

use segments::transcribe_samples;

/// Built-in backend powered by `whisper-rs` / `whisper.cpp`.
///
/// The model is loaded once in [`WhisperBackend::new`] and only read afterwards, so a failed
/// transcription never affects later ones.
pub struct WhisperBackend {
    ctx: WhisperContext,
    opts: Opts,
}

impl WhisperBackend {
    /// Load a whisper.cpp GGML model from disk.
    ///
    /// Fails with [`Error::Startup`] if the model cannot be loaded.
    pub fn new(model_path: impl Into<PathBuf>, opts: Opts) -> Result<Self> {
        let model_path = model_path.into();
        info!(model = %model_path.display(), "loading model");

        let started = Instant::now();
        let ctx = load_context(&model_path).map_err(Error::startup)?;

        info!(
            model = %model_path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model loaded"
        );

        Ok(Self { ctx, opts })
    }

    fn transcribe_file(&self, audio_path: &Path) -> anyhow::Result<Transcript> {
        let samples = decode_file_to_vec(audio_path)
            .with_context(|| format!("failed to decode audio: {}", audio_path.display()))?;

        debug!(
            samples = samples.len(),
            seconds = samples.len() as f64 / f64::from(crate::audio_pipeline::TARGET_SAMPLE_RATE),
            "decoded audio"
        );

        if samples.is_empty() {
            return Ok(Transcript::default());
        }

        let sentences = transcribe_samples(&self.ctx, &self.opts, &samples)?;
        Ok(Transcript::from_sentences(sentences))
    }
}

/// A missing file is reported before the model or decoder is touched.
fn ensure_audio_exists(audio_path: &Path) -> Result<()> {
    if audio_path.exists() {
        Ok(())
    } else {
        Err(Error::AudioNotFound(audio_path.display().to_string()))
    }
}

fn load_context(model_path: &Path) -> anyhow::Result<WhisperContext> {
    logging::install_log_hook();

    ensure!(
        model_path.is_file(),
        "model file not found: {}",
        model_path.display()
    );
    let path = model_path
        .to_str()
        .with_context(|| format!("model path is not valid UTF-8: {}", model_path.display()))?;

    WhisperContext::new_with_params(path, WhisperContextParameters::default())
        .with_context(|| format!("failed to load model: {path}"))
}

impl Backend for WhisperBackend {
    fn name(&self) -> &str {
        "whisper"
    }

    fn transcribe(&mut self, audio_path: &Path) -> Result<Transcript> {
        ensure_audio_exists(audio_path)?;

        self.transcribe_file(audio_path)
            .map_err(Error::transcription)
    }
}
