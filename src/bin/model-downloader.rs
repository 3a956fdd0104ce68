// Downloads a known whisper.cpp model into the model directory used by `scribe-server`.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

use scribe_stdio::logging::LogOpts;
use scribe_stdio::models::download::download_model;
use scribe_stdio::models::{DEFAULT_MODEL_DIR, lookup, model_list_string};

#[derive(Parser, Debug)]
#[command(name = "model-downloader")]
#[command(about = "Download Whisper models for scribe-server", long_about = None)]
struct Args {
    /// List supported model names and exit.
    #[arg(long)]
    list: bool,

    /// Model name (examples: tiny, base.en, large-v3-turbo).
    #[arg(long, required_unless_present = "list")]
    name: Option<String>,

    /// Target directory to store models (created if missing).
    #[arg(long, default_value = DEFAULT_MODEL_DIR)]
    dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    scribe_stdio::init_logging(&LogOpts { file: None });

    if args.list {
        print!("Whisper models:\n{}", model_list_string());
        return Ok(());
    }

    let Some(name) = args.name.as_deref() else {
        bail!("--name is required");
    };
    let Some(model) = lookup(name) else {
        bail!("unknown model '{name}'; run with --list to see supported names");
    };

    let dest = args.dir.join(model.filename);
    if dest.is_file() {
        println!("already present: {}", dest.display());
        return Ok(());
    }

    let saved = download_model(model, &args.dir)?;
    println!("saved: {}", saved.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_required_unless_listing() {
        let err = Args::try_parse_from(["model-downloader"])
            .err()
            .expect("expected missing-args error");
        assert!(err.to_string().contains("--name"));

        let args = Args::try_parse_from(["model-downloader", "--list"]).expect("parse --list");
        assert!(args.list);
        assert!(args.name.is_none());
        assert_eq!(args.dir, PathBuf::from(DEFAULT_MODEL_DIR));
    }
}
