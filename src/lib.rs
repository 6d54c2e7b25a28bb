//! pinprompt - ask a human for a PIN or passphrase
//!
//! Secrets are requested through a `pinentry` helper when one is installed.
//! Otherwise the user is prompted on the terminal, with echo suspended via
//! `stty` for the duration of the read.
//!
//! ```no_run
//! use pinprompt::Request;
//!
//! let request = Request::new()
//!     .with_description("Unlock the signing key")
//!     .with_prompt("Passphrase");
//! match request.get_pin() {
//!     Ok(pin) => println!("got {} characters", pin.chars().count()),
//!     Err(e) if e.is_cancelled() => println!("maybe later"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]

pub mod assuan;
pub mod config;
pub mod echo;
pub mod error;
pub mod fallback;
pub mod reader;
pub mod request;

use std::io::{self, BufRead, Read, Write};

use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

pub use crate::assuan::{CANCELLED_ERROR_CODE, PinentryClient};
pub use crate::config::Config;
pub use crate::error::{ErrorCategory, ErrorKind, PinError, Result};
pub use crate::fallback::TerminalPrompt;
pub use crate::reader::{PinReader, SecretPrompt};
pub use crate::request::Request;

/// Ask the user for a secret using the default configuration.
pub fn get_pin(request: &Request) -> Result<Zeroizing<String>> {
    get_pin_with(request, &Config::default())
}

/// Ask the user for a secret.
///
/// Pinentry is used if it can be found in `PATH`. If it is missing, cannot
/// be started, or does not greet properly, the terminal is used instead,
/// prompting on stdout. Once pinentry has greeted, its answer is final: a
/// cancellation or a protocol error is returned as is.
pub fn get_pin_with(request: &Request, config: &Config) -> Result<Zeroizing<String>> {
    get_pin_prompting_on(request, config, io::stdout())
}

/// Like [`get_pin_with`], but a terminal prompt is written to `output`.
///
/// Programs that print the secret on stdout pass stderr here, so the prompt
/// stays visible when stdout is captured.
pub fn get_pin_prompting_on<W: Write>(
    request: &Request,
    config: &Config,
    output: W,
) -> Result<Zeroizing<String>> {
    match PinentryClient::locate(config) {
        Some(client) => {
            debug!(program = %client.program().display(), "asking through pinentry");
            match client.get_pin(request) {
                Err(e) if matches!(e.kind, Some(ErrorKind::Spawn | ErrorKind::Greeting)) => {
                    warn!(error = %e, "pinentry unusable, falling back to terminal");
                }
                outcome => return outcome,
            }
        }
        None => debug!("pinentry not found, falling back to terminal"),
    }

    let prompt = TerminalPrompt::locate(config)?;
    debug!(program = %prompt.echo_program().display(), "asking on the terminal");
    prompt.prompt_with(request, io::stdin().lock(), output)
}

/// Longest line accepted from pinentry or the terminal, without its ending.
pub const MAX_LINE_LEN: usize = 4096;

/// Reads one line and strips its `\n` or `\r\n` ending.
///
/// Returns `None` at end of input. The buffer is allocated up front for the
/// longest accepted line, so it never moves and every byte read is wiped on
/// drop. Longer lines and invalid UTF-8 are `InvalidData` errors.
pub(crate) fn read_line_zeroized<R: BufRead>(
    reader: &mut R,
) -> io::Result<Option<Zeroizing<String>>> {
    let mut buf = Zeroizing::new(Vec::with_capacity(MAX_LINE_LEN + 2));
    let n = reader
        .take(MAX_LINE_LEN as u64 + 2)
        .read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    if buf.len() > MAX_LINE_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
    }
    match String::from_utf8(std::mem::take(&mut *buf)) {
        Ok(line) => Ok(Some(Zeroizing::new(line))),
        Err(e) => {
            e.into_bytes().zeroize();
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "line is not valid UTF-8",
            ))
        }
    }
}
