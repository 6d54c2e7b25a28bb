//! Client side of the pinentry protocol
//!
//! Pinentry speaks a small line-oriented request/response protocol over its
//! stdin and stdout: it greets with `OK`, accepts `SET*` and `OPTION`
//! commands one at a time, and answers `GETPIN` with either a `D` data line
//! or an `ERR` line. The exchange is strictly turn based, so every command
//! is followed by exactly one reply line.

use std::borrow::Cow;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::{ErrorCategory, ErrorKind, PinError, Result};
use crate::request::Request;
use crate::read_line_zeroized;

/// Error code pinentry reports when the user cancels the dialog.
///
/// This is GPG_ERR_CANCELED tagged with the pinentry error source. It is a
/// property of the protocol version spoken by current pinentry releases; a
/// helper using a different error source would not be recognized as a
/// cancellation and would surface as a protocol error instead.
pub const CANCELLED_ERROR_CODE: u32 = 83886179;

/// Terminal details forwarded to pinentry as `OPTION` commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalInfo {
    /// Value of `TERM`, possibly empty.
    pub ttytype: String,
    /// Device path of the terminal on stdin, if there is one.
    pub ttyname: Option<PathBuf>,
}

impl TerminalInfo {
    /// Describes the terminal of the current process.
    pub fn current() -> Self {
        Self {
            ttytype: std::env::var("TERM").unwrap_or_default(),
            ttyname: stdin_tty_path(),
        }
    }
}

fn stdin_tty_path() -> Option<PathBuf> {
    if !io::stdin().is_terminal() {
        return None;
    }
    std::fs::read_link("/proc/self/fd/0").ok()
}

/// One pinentry conversation over an arbitrary reader/writer pair.
pub struct Session<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Runs the full handshake and asks for the secret.
    ///
    /// Any unexpected reply aborts the conversation; nothing is retried.
    pub fn get_pin(
        &mut self,
        request: &Request,
        terminal: &TerminalInfo,
    ) -> Result<Zeroizing<String>> {
        self.expect_greeting()?;

        for (command, value) in request.settings() {
            self.set(command, value)?;
        }
        self.set("OPTION", &format!("ttytype={}", terminal.ttytype))?;
        match terminal.ttyname.as_deref().map(Path::to_str) {
            Some(Some(tty)) => self.set("OPTION", &format!("ttyname={}", tty))?,
            Some(None) => debug!("terminal path is not UTF-8; not sending ttyname"),
            None => {}
        }

        self.send("GETPIN", None)?;
        let line = self.read_line("GETPIN")?;
        parse_pin_reply(&line)
    }

    fn expect_greeting(&mut self) -> Result<()> {
        let line = self.read_line("greeting").map_err(|e| {
            PinError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Greeting,
                "failed to get pinentry greeting",
                e,
            )
        })?;
        if !line.starts_with("OK") {
            return Err(PinError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Greeting,
                format!("pinentry greeting said {:?}", line.as_str()),
            ));
        }
        debug!("pinentry greeted");
        Ok(())
    }

    fn set(&mut self, command: &str, value: &str) -> Result<()> {
        self.send(command, Some(value))?;
        let line = self.read_line(command)?;
        if line.as_str() != "OK" {
            return Err(PinError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Protocol,
                format!("response to {} was {:?}", command, line.as_str()),
            ));
        }
        debug!(command, "pinentry accepted command");
        Ok(())
    }

    fn send(&mut self, command: &str, argument: Option<&str>) -> Result<()> {
        let written = match argument {
            Some(argument) => writeln!(self.writer, "{} {}", command, escape(argument)),
            None => writeln!(self.writer, "{}", command),
        };
        written.and_then(|()| self.writer.flush()).map_err(|e| {
            PinError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to send {} to pinentry: {}", command, e),
                e,
            )
        })
    }

    fn read_line(&mut self, step: &str) -> Result<Zeroizing<String>> {
        let line = read_line_zeroized(&mut self.reader).map_err(|e| {
            PinError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to read pinentry reply to {}: {}", step, e),
                e,
            )
        })?;
        line.ok_or_else(|| {
            PinError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("pinentry closed its output before replying to {}", step),
            )
        })
    }
}

/// Classifies the reply to `GETPIN`.
///
/// The secret is returned exactly as it follows the `D ` prefix; percent
/// escapes are not decoded. Pinentry escapes `%`, CR and LF in data lines, so
/// a secret containing `%` arrives as `%25`.
fn parse_pin_reply(line: &str) -> Result<Zeroizing<String>> {
    if let Some(pin) = line.strip_prefix("D ") {
        return Ok(Zeroizing::new(pin.to_owned()));
    }
    if line.starts_with(&format!("ERR {} ", CANCELLED_ERROR_CODE)) {
        debug!("user cancelled pinentry");
        return Err(PinError::cancelled());
    }
    Err(PinError::with_kind(
        ErrorCategory::Internal,
        ErrorKind::Protocol,
        format!("GETPIN response didn't start with D; got {:?}", line),
    ))
}

/// Percent-escapes the characters that would otherwise end or corrupt a
/// protocol line.
fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['%', '\r', '\n']) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// A running pinentry process.
///
/// Dropping it closes both pipes and waits for the process to exit, so
/// every return path of a call releases the helper exactly once.
struct HelperProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
}

impl HelperProcess {
    fn spawn(program: &Path, working_dir: &Path) -> Result<Self> {
        let mut child = Command::new(program)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                PinError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Spawn,
                    format!("failed to start {}: {}", program.display(), e),
                    e,
                )
            })?;
        debug!(program = %program.display(), pid = child.id(), "spawned pinentry");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(BufReader::new);
        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }

    fn session(&mut self) -> Result<Session<&mut BufReader<ChildStdout>, &mut ChildStdin>> {
        match (self.stdout.as_mut(), self.stdin.as_mut()) {
            (Some(reader), Some(writer)) => Ok(Session::new(reader, writer)),
            _ => Err(PinError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::Spawn,
                "pinentry started without its pipes",
            )),
        }
    }
}

impl Drop for HelperProcess {
    fn drop(&mut self) {
        drop(self.stdin.take());
        drop(self.stdout.take());
        match self.child.wait() {
            Ok(status) => debug!(%status, "pinentry exited"),
            Err(e) => warn!(error = %e, "failed to wait for pinentry"),
        }
    }
}

/// Asks for secrets by running a pinentry binary.
#[derive(Debug, Clone)]
pub struct PinentryClient {
    program: PathBuf,
    working_dir: PathBuf,
}

impl PinentryClient {
    /// Uses the given pinentry binary, run from `/`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: PathBuf::from("/"),
        }
    }

    /// Looks up the configured pinentry program in `PATH`.
    ///
    /// Returns `None` if it cannot be found or is not executable.
    pub fn locate(config: &Config) -> Option<Self> {
        which::which(&config.pinentry_program)
            .ok()
            .map(|program| Self {
                program,
                working_dir: config.working_dir.clone(),
            })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Asks for the secret, describing the current terminal to pinentry.
    pub fn get_pin(&self, request: &Request) -> Result<Zeroizing<String>> {
        self.get_pin_on(request, &TerminalInfo::current())
    }

    /// Asks for the secret with explicit terminal details.
    ///
    /// A fresh pinentry process is started for every call and is reaped
    /// before this returns, whatever the outcome.
    pub fn get_pin_on(
        &self,
        request: &Request,
        terminal: &TerminalInfo,
    ) -> Result<Zeroizing<String>> {
        let mut helper = HelperProcess::spawn(&self.program, &self.working_dir)?;
        let mut session = helper.session()?;
        session.get_pin(request, terminal)
    }
}
