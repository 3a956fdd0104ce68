use thiserror::Error;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Every way a request (or startup) can fail.
///
/// The `Display` text of each variant is exactly the message a client sees in the
/// `{"error": ...}` response, so the server never formats error strings itself.
#[derive(Debug, Error)]
pub enum Error {
    /// The input line was not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// A `transcribe` command without a usable `audio_path`.
    #[error("Missing audio_path parameter")]
    MissingAudioPath,

    /// The requested audio file does not exist.
    #[error("Audio file not found: {0}")]
    AudioNotFound(String),

    /// The model failed while transcribing. The backend stays usable afterwards.
    #[error("Transcription failed: {0}")]
    Transcription(String),

    /// `action` was absent or not one of the supported commands.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The model could not be acquired. Fatal: the loop never starts.
    #[error("Server startup failed: {0}")]
    Startup(String),

    /// Anything else that went wrong while handling a single request.
    #[error("Server error: {0}")]
    Server(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an `anyhow` chain as a model failure, keeping the full context chain.
    pub(crate) fn transcription(err: anyhow::Error) -> Self {
        Self::Transcription(format!("{err:#}"))
    }

    /// Wrap an `anyhow` chain as a startup failure.
    pub fn startup(err: anyhow::Error) -> Self {
        Self::Startup(format!("{err:#}"))
    }
}
