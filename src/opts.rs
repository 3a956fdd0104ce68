/// Options that control how the Whisper backend transcribes.
///
/// This is library-level configuration, not CLI flags directly. The binaries map their
/// flags into this type so other frontends (tests, embedding applications) can build it
/// programmatically.
#[derive(Debug, Clone, Default)]
pub struct Opts {
    /// Translate speech to English instead of transcribing verbatim.
    pub enable_translate_to_english: bool,

    /// Optional language hint (e.g. `"en"`, `"es"`).
    ///
    /// When `None`, Whisper auto-detects the spoken language.
    pub language: Option<String>,

    /// Inference threads. `None` uses every available core.
    pub threads: Option<usize>,
}

impl Opts {
    pub(crate) fn thread_count(&self) -> i32 {
        let n = self.threads.unwrap_or_else(num_cpus::get).max(1);
        i32::try_from(n).unwrap_or(i32::MAX)
    }
}
