use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter (e.g. `debug`, `scribe_stdio=trace`).
pub const LOG_ENV_VAR: &str = "SCRIBE_LOG";

/// Log file used when none is configured.
pub const DEFAULT_LOG_FILE: &str = "/tmp/voice_transcriber.log";

/// Where diagnostic logs go. stdout is never a target: it carries the protocol.
#[derive(Debug, Clone)]
pub struct LogOpts {
    /// Append JSON log lines to this file, in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogOpts {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }
}

/// Initialize logging: human-readable lines on stderr, plus JSON lines in the log file.
///
/// Defaults to `info` unless overridden by `SCRIBE_LOG`. A log file that cannot be opened
/// is reported on stderr and skipped; logging never prevents the server from starting.
/// Safe to call more than once; later calls are no-ops.
pub fn init(opts: &LogOpts) {
    let filter = || {
        EnvFilter::builder()
            .with_env_var(LOG_ENV_VAR)
            .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
            .from_env_lossy()
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter());

    let mut file_error = None;
    let file_layer = opts.file.as_ref().and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter()),
            ),
            Err(err) => {
                file_error = Some((path.clone(), err));
                None
            }
        }
    });

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if let Some((path, err)) = file_error {
        tracing::warn!(path = %path.display(), error = %err, "log file disabled");
    }
}
