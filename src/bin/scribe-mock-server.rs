use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use scribe_stdio::cli::LogArgs;
use scribe_stdio::{MockBackend, Server};

/// Same protocol as `scribe-server`, but every `transcribe` returns one canned sentence and
/// no model is loaded. For testing parent-process integrations.
#[derive(Parser, Debug)]
#[command(name = "scribe-mock-server")]
#[command(about = "Mock transcription server with canned output (no model required)")]
struct Params {
    #[command(flatten)]
    log: LogArgs,
}

fn main() -> ExitCode {
    let params = Params::parse();
    scribe_stdio::init_logging(&params.log.log_opts());

    let mut server = Server::new(MockBackend::new());
    match server.run(io::stdin().lock(), io::stdout().lock()) {
        Ok(exit) => {
            info!(?exit, "mock server stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "mock server I/O failed");
            ExitCode::FAILURE
        }
    }
}
