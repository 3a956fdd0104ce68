use std::path::Path;

use tracing::debug;

use crate::Result;
use crate::backend::Backend;
use crate::transcript::{Sentence, Transcript};

/// Text of the single canned sentence returned by [`MockBackend`].
pub const MOCK_TEXT: &str = "This is a test transcription from the mock server.";

/// Start and end (seconds) of the canned sentence.
pub const MOCK_SPAN: (f64, f64) = (0.0, 3.0);

/// A backend that never touches a model or the filesystem.
///
/// Every call returns the same one-sentence transcript, whatever path it is given. It exists
/// so a parent process can exercise the protocol without a model download.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockBackend;

impl MockBackend {
    pub fn new() -> Self {
        Self
    }

    /// The transcript every call returns.
    pub fn canned_transcript() -> Transcript {
        let (start, end) = MOCK_SPAN;
        Transcript::from_sentences(vec![Sentence::new(MOCK_TEXT, start, end)])
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn transcribe(&mut self, audio_path: &Path) -> Result<Transcript> {
        debug!(audio_path = %audio_path.display(), "returning canned transcript");
        Ok(Self::canned_transcript())
    }
}
