//! The command loop.
//!
//! Reads one line at a time, decodes it into a [`Command`], dispatches it, and writes exactly
//! one [`Response`] line per input line. Every per-request failure (malformed JSON, missing
//! fields, missing files, model errors, even a panicking backend) becomes an `{"error": ...}`
//! line; only `quit`, end-of-input, or a broken stdin/stdout ends the loop.

use std::any::Any;
use std::io::{BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::json_line::write_line;
use crate::protocol::{Command, Response};

/// Why [`Server::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// A `quit` command was handled.
    Quit,
    /// The input stream closed.
    EndOfInput,
}

/// The outcome of handling one input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub response: Response,
    /// Set only for `quit`; the loop stops after writing `response`.
    pub shutdown: bool,
}

impl Step {
    fn reply(response: Response) -> Self {
        Self {
            response,
            shutdown: false,
        }
    }
}

/// Serves the protocol on top of a single, already-initialized backend.
pub struct Server<B: Backend> {
    backend: B,
}

impl<B: Backend> Server<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run the loop until `quit` or end-of-input.
    ///
    /// Only I/O failures on `input`/`output` are returned as errors.
    pub fn run<R, W>(&mut self, mut input: R, mut output: W) -> Result<Exit>
    where
        R: BufRead,
        W: Write,
    {
        info!(backend = self.backend.name(), "transcription server started");

        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                info!("end of input");
                return Ok(Exit::EndOfInput);
            }

            let step = match std::str::from_utf8(&buf) {
                Ok(line) => self.handle_line(line),
                Err(e) => {
                    warn!(error = %e, "input line is not valid UTF-8");
                    Step::reply(Error::InvalidJson(e.to_string()).into())
                }
            };

            write_response(&mut output, &step.response)?;

            if step.shutdown {
                info!("shutting down");
                return Ok(Exit::Quit);
            }
        }
    }

    /// Handle one raw input line. Never fails: errors come back as error responses.
    pub fn handle_line(&mut self, line: &str) -> Step {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(err) => {
                warn!(error = %err, "rejected input line");
                return Step::reply(err.into());
            }
        };

        debug!(action = command.action(), "received command");
        let shutdown = command == Command::Quit;

        let response = match self.dispatch(command) {
            Ok(response) => response,
            Err(err) => {
                if matches!(err, Error::Transcription(_) | Error::Server(_)) {
                    error!(error = %err, "request failed");
                } else {
                    warn!(error = %err, "request rejected");
                }
                err.into()
            }
        };

        Step { response, shutdown }
    }

    fn dispatch(&mut self, command: Command) -> Result<Response> {
        match command {
            Command::Ping => Ok(Response::pong()),
            Command::Quit => Ok(Response::shutting_down()),
            Command::Transcribe { audio_path: None } => Err(Error::MissingAudioPath),
            Command::Transcribe {
                audio_path: Some(path),
            } => self.transcribe(&path),
            Command::Unknown(action) => Err(Error::UnknownAction(action)),
        }
    }

    fn transcribe(&mut self, audio_path: &str) -> Result<Response> {
        info!(audio_path, "transcribing");
        let started = Instant::now();

        let backend = &mut self.backend;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            backend.transcribe(Path::new(audio_path))
        }));

        let transcript = match outcome {
            Ok(result) => result?,
            Err(payload) => return Err(Error::Server(panic_message(payload.as_ref()))),
        };

        info!(
            audio_path,
            sentences = transcript.sentences.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "transcription complete"
        );
        Ok(transcript.into())
    }
}

/// Write one response line and flush it.
pub fn write_response<W: Write + ?Sized>(writer: &mut W, response: &Response) -> Result<()> {
    write_line(writer, response)
}

/// Write the single `{"error": "Server startup failed: ..."}` line.
///
/// `err` is wrapped as [`Error::Startup`] unless it already is one.
pub fn report_startup_failure<W: Write + ?Sized>(writer: &mut W, err: Error) -> Result<()> {
    let err = match err {
        Error::Startup(_) => err,
        other => Error::Startup(other.to_string()),
    };
    error!(error = %err, "startup failed");
    write_response(writer, &err.into())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "backend panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::backends::mock::{MOCK_TEXT, MockBackend};
    use crate::transcript::{Sentence, Transcript};

    /// Scripted backend: fails or panics on specific file names.
    struct Scripted {
        calls: usize,
    }

    impl Backend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn transcribe(&mut self, audio_path: &Path) -> Result<Transcript> {
            self.calls += 1;
            match audio_path.to_str() {
                Some("missing.wav") => Err(Error::AudioNotFound("missing.wav".into())),
                Some("corrupt.wav") => Err(Error::Transcription("bad header".into())),
                Some("panic.wav") => panic!("decoder exploded"),
                _ => Ok(Transcript::from_sentences(vec![Sentence::new("ok", 0.0, 1.0)])),
            }
        }
    }

    fn run_lines<B: Backend>(server: &mut Server<B>, input: &str) -> (Exit, Vec<serde_json::Value>) {
        let mut out = Vec::new();
        let exit = server
            .run(Cursor::new(input.as_bytes().to_vec()), &mut out)
            .expect("in-memory streams do not fail");
        let lines = String::from_utf8(out)
            .expect("ascii output")
            .lines()
            .map(|l| serde_json::from_str(l).expect("every line is JSON"))
            .collect();
        (exit, lines)
    }

    #[test]
    fn ping_pongs() {
        let mut server = Server::new(MockBackend::new());
        let step = server.handle_line(r#"{"action": "ping"}"#);
        assert_eq!(step.response, Response::pong());
        assert!(!step.shutdown);
    }

    #[test]
    fn quit_requests_shutdown() {
        let mut server = Server::new(MockBackend::new());
        let step = server.handle_line(r#"{"action": "quit"}"#);
        assert_eq!(step.response, Response::shutting_down());
        assert!(step.shutdown);
    }

    #[test]
    fn missing_audio_path_is_reported() {
        let mut server = Server::new(MockBackend::new());
        let step = server.handle_line(r#"{"action": "transcribe"}"#);
        assert_eq!(
            step.response.error_message(),
            Some("Missing audio_path parameter")
        );
    }

    #[test]
    fn unknown_action_is_reported() {
        let mut server = Server::new(MockBackend::new());
        let step = server.handle_line(r#"{"action": "frobnicate"}"#);
        assert_eq!(
            step.response.error_message(),
            Some("Unknown action: frobnicate")
        );
        let step = server.handle_line("{}");
        assert_eq!(step.response.error_message(), Some("Unknown action: None"));
    }

    #[test]
    fn backend_errors_pass_through_verbatim() {
        let mut server = Server::new(Scripted { calls: 0 });

        let step = server.handle_line(r#"{"action":"transcribe","audio_path":"missing.wav"}"#);
        assert_eq!(
            step.response.error_message(),
            Some("Audio file not found: missing.wav")
        );

        let step = server.handle_line(r#"{"action":"transcribe","audio_path":"corrupt.wav"}"#);
        assert_eq!(
            step.response.error_message(),
            Some("Transcription failed: bad header")
        );
    }

    #[test]
    fn backend_panic_becomes_server_error_and_backend_stays_usable() {
        let mut server = Server::new(Scripted { calls: 0 });

        let step = server.handle_line(r#"{"action":"transcribe","audio_path":"panic.wav"}"#);
        assert_eq!(
            step.response.error_message(),
            Some("Server error: decoder exploded")
        );

        let step = server.handle_line(r#"{"action":"transcribe","audio_path":"fine.wav"}"#);
        assert!(step.response.is_success());
        assert_eq!(server.backend().calls, 2);
    }

    #[test]
    fn invalid_json_does_not_stop_the_loop() {
        let mut server = Server::new(MockBackend::new());
        let (exit, lines) = run_lines(&mut server, "{oops\n{\"action\":\"ping\"}\n");

        assert_eq!(exit, Exit::EndOfInput);
        assert_eq!(lines.len(), 2);
        assert!(
            lines[0]["error"]
                .as_str()
                .is_some_and(|e| e.starts_with("Invalid JSON: "))
        );
        assert_eq!(lines[1], serde_json::json!({"success": true, "message": "pong"}));
    }

    #[test]
    fn blank_lines_get_an_invalid_json_response() {
        let mut server = Server::new(MockBackend::new());
        let (_, lines) = run_lines(&mut server, "\n   \n");
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let error = line["error"].as_str().unwrap_or_default();
            assert!(error.starts_with("Invalid JSON: "), "{error}");
        }
    }

    #[test]
    fn invalid_utf8_is_invalid_json() -> anyhow::Result<()> {
        let mut server = Server::new(MockBackend::new());
        let mut input = vec![0xff, 0xfe, b'\n'];
        input.extend_from_slice(b"{\"action\":\"quit\"}\n");

        let mut out = Vec::new();
        let exit = server.run(Cursor::new(input), &mut out)?;

        let text = String::from_utf8(out)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(exit, Exit::Quit);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"error": "Invalid JSON: "#));
        Ok(())
    }

    #[test]
    fn quit_stops_reading_further_input() {
        let mut server = Server::new(MockBackend::new());
        let (exit, lines) = run_lines(
            &mut server,
            "{\"action\":\"quit\"}\n{\"action\":\"ping\"}\n",
        );
        assert_eq!(exit, Exit::Quit);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "Shutting down");
    }

    #[test]
    fn last_line_without_newline_is_still_handled() {
        let mut server = Server::new(MockBackend::new());
        let (exit, lines) = run_lines(&mut server, r#"{"action":"ping"}"#);
        assert_eq!(exit, Exit::EndOfInput);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn repeated_pings_are_identical() {
        let mut server = Server::new(MockBackend::new());
        let (_, lines) = run_lines(&mut server, &"{\"action\":\"ping\"}\n".repeat(5));
        assert_eq!(lines.len(), 5);
        assert!(lines.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn mock_transcription_shape() {
        let mut server = Server::new(MockBackend::new());
        let step = server.handle_line(r#"{"action":"transcribe","audio_path":"/x.wav"}"#);
        let Response::Transcription {
            success,
            text,
            sentences,
        } = step.response
        else {
            panic!("expected a transcription response");
        };
        assert!(success);
        assert_eq!(text, MOCK_TEXT);
        assert_eq!(sentences, vec![Sentence::new(MOCK_TEXT, 0.0, 3.0)]);
    }

    #[test]
    fn startup_failure_is_one_error_line() -> anyhow::Result<()> {
        let mut out = Vec::new();
        report_startup_failure(&mut out, Error::Startup("model file not found: x".into()))?;
        assert_eq!(
            String::from_utf8(out)?,
            "{\"error\": \"Server startup failed: model file not found: x\"}\n"
        );
        Ok(())
    }

    #[test]
    fn non_startup_errors_are_wrapped_for_startup_reporting() -> anyhow::Result<()> {
        let mut out = Vec::new();
        report_startup_failure(&mut out, Error::Server("boom".into()))?;
        let v: serde_json::Value = serde_json::from_slice(&out)?;
        assert_eq!(v["error"], "Server startup failed: Server error: boom");
        Ok(())
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn startup_failure_surfaces_write_errors() {
        let err = report_startup_failure(&mut ClosedPipe, Error::Startup("x".into())).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::BrokenPipe));
    }
}
