//! Model identifier resolution.
//!
//! A model identifier is either a path to a GGML model file or the short name of a known
//! whisper.cpp model (e.g. `base.en`, `large-v3-turbo`). Short names resolve to a file in the
//! model directory; with the `download` feature a missing file is fetched from the
//! whisper.cpp Hugging Face repository first.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail, ensure};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "large-v3-turbo";

/// Directory short model names resolve into.
pub const DEFAULT_MODEL_DIR: &str = "./models";

const WHISPER_CPP_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// A whisper.cpp GGML model we know how to locate and fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownModel {
    /// Short name users type (e.g. `"large-v3-turbo"`).
    pub name: &'static str,

    /// File name on disk and in the upstream repository.
    pub filename: &'static str,
}

impl KnownModel {
    pub fn url(&self) -> String {
        format!("{WHISPER_CPP_BASE_URL}/{}", self.filename)
    }
}

macro_rules! known {
    ($name:literal) => {
        KnownModel {
            name: $name,
            filename: concat!("ggml-", $name, ".bin"),
        }
    };
}

/// Allow-list of known-good model artifacts.
pub static KNOWN_MODELS: &[KnownModel] = &[
    known!("tiny"),
    known!("tiny.en"),
    known!("base"),
    known!("base.en"),
    known!("base.en-q5_1"),
    known!("small"),
    known!("small.en"),
    known!("small.en-q5_1"),
    known!("medium"),
    known!("medium.en"),
    known!("large-v2"),
    known!("large-v3"),
    known!("large-v3-q5_0"),
    known!("large-v3-turbo"),
    known!("large-v3-turbo-q5_0"),
    known!("large-v3-turbo-q8_0"),
];

pub fn lookup(name: &str) -> Option<&'static KnownModel> {
    KNOWN_MODELS.iter().find(|m| m.name == name)
}

/// One known model name per line, for `--list` style output.
pub fn model_list_string() -> String {
    KNOWN_MODELS
        .iter()
        .map(|m| format!("  - {}\n", m.name))
        .collect()
}

/// Turn a model identifier into a model file path.
///
/// Resolution order:
/// 1. an existing file path is used as-is
/// 2. a known short name resolves to `<model_dir>/<filename>`, downloading it when missing
///    (only with the `download` feature)
/// 3. anything else is an error
pub fn resolve_model(identifier: &str, model_dir: &Path) -> Result<PathBuf> {
    let identifier = identifier.trim();
    ensure!(!identifier.is_empty(), "model identifier must be provided");

    let as_path = Path::new(identifier);
    if as_path.is_file() {
        return Ok(as_path.to_path_buf());
    }

    let Some(model) = lookup(identifier) else {
        bail!("unknown model identifier '{identifier}' (not a file and not a known model name)");
    };

    let dest = model_dir.join(model.filename);
    if dest.is_file() {
        return Ok(dest);
    }

    fetch_missing(model, model_dir)
}

#[cfg(feature = "download")]
fn fetch_missing(model: &KnownModel, model_dir: &Path) -> Result<PathBuf> {
    download::download_model(model, model_dir)
}

#[cfg(not(feature = "download"))]
fn fetch_missing(model: &KnownModel, model_dir: &Path) -> Result<PathBuf> {
    bail!(
        "model '{}' not found at {} (fetch it with `model-downloader --name {}`)",
        model.name,
        model_dir.join(model.filename).display(),
        model.name
    )
}

#[cfg(feature = "download")]
pub mod download {
    use std::fs;
    use std::io::{Read, Write};
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use indicatif::{ProgressBar, ProgressStyle};
    use reqwest::blocking::Client;
    use tracing::info;

    use super::KnownModel;

    /// Download `model` into `dir` (created if missing) and return the final path.
    pub fn download_model(model: &KnownModel, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create model directory: {}", dir.display()))?;

        let dest = dir.join(model.filename);
        let url = model.url();
        info!(model = model.name, %url, dest = %dest.display(), "downloading model");

        let resp = Client::new()
            .get(&url)
            .send()
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("download failed (bad status): {url}"))?;

        let total = resp.content_length();
        download_to_path_with_reader(resp, total, &dest)?;

        info!(model = model.name, dest = %dest.display(), "model downloaded");
        Ok(dest)
    }

    /// Stream `reader` into `<dest>.part`, fsync, then rename into place.
    ///
    /// The partial file is removed on failure so a retry never sees a truncated model.
    pub fn download_to_path_with_reader<R: Read>(
        mut reader: R,
        total_bytes: Option<u64>,
        dest: &Path,
    ) -> Result<()> {
        let pb = match total_bytes {
            Some(total) if total > 0 => ProgressBar::new(total),
            _ => ProgressBar::new_spinner(),
        };
        let template = "{spinner:.green} {bytes}/{total_bytes} {bar:40.cyan/blue} {eta}";
        if let Ok(style) = ProgressStyle::with_template(template) {
            pb.set_style(style.progress_chars("#>-"));
        }

        let tmp = PathBuf::from(format!("{}.part", dest.display()));

        let result = (|| -> Result<()> {
            let mut file = fs::File::create(&tmp)
                .with_context(|| format!("failed to create temp file: {}", tmp.display()))?;

            let mut buf = [0u8; 64 * 1024];
            loop {
                let n = reader.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                file.write_all(&buf[..n])?;
                pb.inc(n as u64);
            }
            file.sync_all()?;

            fs::rename(&tmp, dest)
                .with_context(|| format!("failed to move into place: {}", dest.display()))?;
            Ok(())
        })();

        pb.finish_and_clear();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn writes_and_renames() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let dest = dir.path().join("model.bin");

            download_to_path_with_reader(std::io::Cursor::new(b"abc123".to_vec()), Some(6), &dest)?;

            assert_eq!(fs::read(&dest)?, b"abc123");
            assert!(!dir.path().join("model.bin.part").exists());
            Ok(())
        }

        struct FailingReader;

        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("simulated read failure"))
            }
        }

        #[test]
        fn cleans_up_part_file_on_error() -> Result<()> {
            let dir = tempfile::tempdir()?;
            let dest = dir.path().join("model.bin");

            let err = download_to_path_with_reader(FailingReader, None, &dest).unwrap_err();
            assert!(err.to_string().contains("simulated read failure"));
            assert!(!dest.exists());
            assert!(!dir.path().join("model.bin.part").exists());
            Ok(())
        }
    }
}
