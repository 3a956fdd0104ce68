//! Command-line flags shared by the server binaries.
//!
//! The binaries flatten these into their own `clap` parsers and map them into library types
//! ([`Opts`], [`LogOpts`]) so the library itself stays CLI-agnostic.

use std::path::PathBuf;

use clap::Args;

use crate::logging::{DEFAULT_LOG_FILE, LogOpts};
use crate::models::{DEFAULT_MODEL, DEFAULT_MODEL_DIR, resolve_model};
use crate::opts::Opts;

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// File that receives JSON log lines (stderr always gets logs).
    #[arg(long = "log-file", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Only log to stderr.
    #[arg(long = "no-log-file", default_value_t = false)]
    pub no_log_file: bool,
}

impl LogArgs {
    pub fn log_opts(&self) -> LogOpts {
        LogOpts {
            file: (!self.no_log_file).then(|| self.log_file.clone()),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model file path or known model name (e.g. `base.en`, `large-v3-turbo`).
    #[arg(short = 'm', long = "model", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Directory that known model names resolve into.
    #[arg(long = "model-dir", default_value = DEFAULT_MODEL_DIR)]
    pub model_dir: PathBuf,

    /// Spoken language hint (e.g. `en`). Auto-detected when omitted.
    #[arg(short = 'l', long = "language")]
    pub language: Option<String>,

    /// Translate speech to English.
    #[arg(short = 't', long = "translate", default_value_t = false)]
    pub translate: bool,

    /// Inference threads (defaults to every available core).
    #[arg(long = "threads")]
    pub threads: Option<usize>,
}

impl ModelArgs {
    pub fn opts(&self) -> Opts {
        Opts {
            enable_translate_to_english: self.translate,
            language: self.language.clone(),
            threads: self.threads,
        }
    }

    /// Resolve `--model` into a model file path.
    pub fn model_path(&self) -> anyhow::Result<PathBuf> {
        resolve_model(&self.model, &self.model_dir)
    }
}
