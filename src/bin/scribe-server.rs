use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use scribe_stdio::cli::{LogArgs, ModelArgs};
use scribe_stdio::server::report_startup_failure;
use scribe_stdio::{Error, Server, WhisperBackend};

#[derive(Parser, Debug)]
#[command(name = "scribe-server")]
#[command(about = "Line-delimited JSON transcription server on stdin/stdout (Whisper)")]
struct Params {
    #[command(flatten)]
    model: ModelArgs,

    #[command(flatten)]
    log: LogArgs,
}

fn main() -> ExitCode {
    let params = Params::parse();
    scribe_stdio::init_logging(&params.log.log_opts());

    let mut stdout = io::stdout().lock();

    // The model is loaded before any input is read; failing here is the only fatal error.
    let backend = match load_backend(&params.model) {
        Ok(backend) => backend,
        Err(err) => {
            if let Err(write_err) = report_startup_failure(&mut stdout, err) {
                error!(error = %write_err, "failed to write startup failure response");
            }
            return ExitCode::FAILURE;
        }
    };

    let mut server = Server::new(backend);
    match server.run(io::stdin().lock(), &mut stdout) {
        Ok(exit) => {
            info!(?exit, "server stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "server I/O failed");
            ExitCode::FAILURE
        }
    }
}

fn load_backend(model: &ModelArgs) -> scribe_stdio::Result<WhisperBackend> {
    let model_path = model.model_path().map_err(Error::startup)?;
    WhisperBackend::new(model_path, model.opts())
}
