//! Bare terminal prompt used when pinentry is not available

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::config::Config;
use crate::echo::EchoGuard;
use crate::error::{ErrorCategory, ErrorKind, PinError, Result};
use crate::request::Request;
use crate::read_line_zeroized;

/// Label printed when the request has no prompt of its own.
pub const DEFAULT_PROMPT: &str = "Password";

/// Asks on stdout and reads the answer from stdin with echo turned off.
#[derive(Debug, Clone)]
pub struct TerminalPrompt {
    echo_program: PathBuf,
    working_dir: PathBuf,
}

impl TerminalPrompt {
    /// Uses the given echo-toggle program, run from `/`.
    pub fn new(echo_program: impl Into<PathBuf>) -> Self {
        Self {
            echo_program: echo_program.into(),
            working_dir: PathBuf::from("/"),
        }
    }

    /// Looks up the configured echo-toggle program in `PATH`.
    ///
    /// There is nothing left to fall back to if it is missing, so this fails
    /// with [`ErrorKind::Unavailable`].
    pub fn locate(config: &Config) -> Result<Self> {
        let echo_program = which::which(&config.echo_program).map_err(|e| {
            PinError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Unavailable,
                "no pinentry or stty found",
                e,
            )
        })?;
        Ok(Self {
            echo_program,
            working_dir: config.working_dir.clone(),
        })
    }

    pub fn echo_program(&self) -> &Path {
        &self.echo_program
    }

    /// Prompts on the process's stdout and reads from its stdin.
    pub fn get_pin(&self, request: &Request) -> Result<Zeroizing<String>> {
        self.prompt_with(request, io::stdin().lock(), io::stdout().lock())
    }

    /// Prompts on `output` and reads one line from `input`.
    ///
    /// Echo stays disabled from before the prompt is printed until this
    /// returns or unwinds.
    pub fn prompt_with<R: BufRead, W: Write>(
        &self,
        request: &Request,
        mut input: R,
        mut output: W,
    ) -> Result<Zeroizing<String>> {
        let _echo = EchoGuard::disable(&self.echo_program, &self.working_dir);
        write_prompt(request, &mut output).map_err(|e| {
            PinError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write prompt: {}", e),
                e,
            )
        })?;
        read_secret_line(&mut input)
    }
}

fn write_prompt<W: Write>(request: &Request, output: &mut W) -> io::Result<()> {
    if !request.description.is_empty() {
        write!(output, "{}\n\n", request.description)?;
    }
    let prompt = if request.prompt.is_empty() {
        DEFAULT_PROMPT
    } else {
        request.prompt.as_str()
    };
    write!(output, "{}: ", prompt)?;
    output.flush()
}

fn read_secret_line<R: BufRead>(input: &mut R) -> Result<Zeroizing<String>> {
    let line = read_line_zeroized(input).map_err(|e| {
        PinError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failure reading passphrase: {}", e),
            e,
        )
    })?;
    line.ok_or_else(|| {
        PinError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "input ended before a passphrase was entered",
        )
    })
}
