use std::path::Path;

use crate::Result;
use crate::transcript::Transcript;

/// Pluggable transcription backend driven by [`crate::Server`].
///
/// A backend owns whatever long-lived model state it needs and turns one audio file into a
/// [`Transcript`]. It is constructed once, before the server accepts any input.
///
/// Errors are reported through the crate error type so the server can put them on the wire
/// unchanged:
/// - [`crate::Error::AudioNotFound`] when the backend checks for the file and it is missing
/// - [`crate::Error::Transcription`] for any failure inside decoding or inference
///
/// A failed call must leave the backend able to serve the next request.
pub trait Backend {
    /// Short name for logs (e.g. `"whisper"`, `"mock"`).
    fn name(&self) -> &str;

    /// Transcribe the audio file at `audio_path`.
    fn transcribe(&mut self, audio_path: &Path) -> Result<Transcript>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn transcribe(&mut self, audio_path: &Path) -> Result<Transcript> {
        (**self).transcribe(audio_path)
    }
}
