use serde::{Deserialize, Serialize};

/// A time-aligned piece of the transcription.
///
/// Times are in seconds from the start of the audio file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

impl Sentence {
    /// Build a sentence, deriving `duration` as `end - start`.
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            duration: end - start,
        }
    }
}

/// The full result of transcribing one audio file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub sentences: Vec<Sentence>,
}

impl Transcript {
    /// Build a transcript whose `text` is every sentence joined by single spaces.
    ///
    /// Whisper segments usually carry a leading space, so each piece is trimmed first.
    pub fn from_sentences(sentences: Vec<Sentence>) -> Self {
        let text = sentences
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Self { text, sentences }
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentence_duration_is_end_minus_start() {
        let s = Sentence::new("hi", 1.25, 3.5);
        assert_eq!(s.duration, 2.25);
    }

    #[test]
    fn from_sentences_joins_trimmed_text() {
        let t = Transcript::from_sentences(vec![
            Sentence::new(" Treat.", 0.0, 0.8),
            Sentence::new("   ", 0.8, 0.9),
            Sentence::new(" Yo. Self.", 0.9, 2.0),
        ]);
        assert_eq!(t.text, "Treat. Yo. Self.");
        assert_eq!(t.sentences.len(), 3);
        assert_eq!(t.sentences[0].text, " Treat.");
    }

    #[test]
    fn empty_transcript_has_empty_text() {
        let t = Transcript::from_sentences(Vec::new());
        assert!(t.is_empty());
        assert_eq!(t.text, "");
    }
}
