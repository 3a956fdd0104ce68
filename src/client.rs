//! Parent-process side of the protocol.
//!
//! [`ServerClient`] spawns a server binary with piped stdin/stdout and exchanges one command
//! line for one response line at a time. The protocol has no request ids, so a client must
//! never have more than one command in flight; `&mut self` on every call enforces that.

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command as Process, ExitStatus, Stdio};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::json_line::write_line;
use crate::protocol::{Command, Response};

pub struct ServerClient {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    quit_sent: bool,
}

impl ServerClient {
    /// Start `program` with `args`. The server's stderr is inherited.
    pub fn spawn<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Process::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Server("child stdout was not captured".into()))?;

        debug!(pid = child.id(), "spawned transcription server");

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            quit_sent: false,
        })
    }

    pub fn ping(&mut self) -> Result<Response> {
        self.send(&Command::Ping)
    }

    pub fn transcribe(&mut self, audio_path: impl Into<String>) -> Result<Response> {
        self.send(&Command::Transcribe {
            audio_path: Some(audio_path.into()),
        })
    }

    /// Ask the server to shut down and return its acknowledgement.
    pub fn quit(&mut self) -> Result<Response> {
        let response = self.send(&Command::Quit)?;
        self.quit_sent = true;
        Ok(response)
    }

    pub fn send(&mut self, command: &Command) -> Result<Response> {
        self.send_value(&command.to_value())
    }

    /// Send an arbitrary JSON value as one line and read the single response line.
    pub fn send_value(&mut self, value: &Value) -> Result<Response> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Server("server stdin is closed".into()))?;
        write_line(stdin, value)?;
        self.read_response()
    }

    /// Send raw text (plus a newline) and read the single response line.
    pub fn send_raw(&mut self, line: &str) -> Result<Response> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Server("server stdin is closed".into()))?;
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        self.read_response()
    }

    fn read_response(&mut self) -> Result<Response> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(Error::Server("server closed its output".into()));
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }

    /// Close the server's stdin (end-of-input) and wait for it to exit.
    pub fn wait(mut self) -> Result<ExitStatus> {
        self.stdin.take();
        Ok(self.child.wait()?)
    }
}

impl Drop for ServerClient {
    fn drop(&mut self) {
        if !self.quit_sent && self.stdin.is_some() {
            if let Err(err) = self.quit() {
                warn!(error = %err, "failed to send quit to transcription server");
                let _ = self.child.kill();
            }
        }
        self.stdin.take();
        if let Err(err) = self.child.wait() {
            warn!(error = %err, "failed to reap transcription server");
        }
    }
}
