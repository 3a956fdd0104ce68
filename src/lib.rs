//! `scribe_stdio`: a line-delimited JSON transcription server over stdin/stdout.
//!
//! A parent process writes one JSON command per line (`ping`, `transcribe`, `quit`) and reads
//! one JSON response per line. The crate provides:
//! - the command loop ([`Server`]) and its wire types ([`Command`], [`Response`])
//! - a Whisper backend (`whisper-rs`) and a mock backend with canned output
//! - audio file decoding to 16 kHz mono (Symphonia + rubato)
//! - model identifier resolution and optional model download
//! - a client for driving a server child process
//!
//! The model is loaded once, before the loop starts; a failure there is the only fatal error.

mod error;

// Protocol and command loop.
pub mod json_line;
pub mod protocol;
pub mod server;

// Backends and their results.
pub mod backend;
pub mod backends;
pub mod opts;
pub mod transcript;

// Audio decoding for the Whisper backend.
pub mod audio_pipeline;
pub mod decoder;

pub mod models;

pub mod client;

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "cli")]
pub mod cli;

pub use backend::Backend;
pub use backends::mock::MockBackend;
pub use backends::whisper::WhisperBackend;
pub use client::ServerClient;
pub use error::{Error, Result};
pub use opts::Opts;
pub use protocol::{Command, Response};
pub use server::{Exit, Server, Step};
pub use transcript::{Sentence, Transcript};

#[cfg(feature = "logging")]
pub use logging::{LogOpts, init as init_logging};
