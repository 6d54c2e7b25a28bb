//! pinprompt CLI - ask for a PIN or passphrase
//!
//! Prints the secret on stdout, for use from scripts and askpass hooks. The
//! terminal fallback prompts on stderr so that stdout carries only the
//! secret. Exits with status 1 when the user cancels and 2 on any other failure.

use std::ffi::OsString;
use std::io::{self, Write};
use std::process;

use clap::{ArgAction, Parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use pinprompt::{Config, Request};

const EXIT_CANCELLED: i32 = 1;
const EXIT_FAILURE: i32 = 2;

#[derive(Parser)]
#[command(name = "pinprompt")]
#[command(version)]
#[command(
    about = "Ask for a PIN or passphrase through pinentry, falling back to the terminal.",
    long_about = None
)]
struct Cli {
    /// Longer explanation shown above the entry field
    #[arg(short, long, value_name = "TEXT", default_value = "")]
    description: String,

    /// Label shown right before the entry field
    #[arg(short, long, value_name = "TEXT", default_value = "")]
    prompt: String,

    /// Text of the confirm button
    #[arg(long, value_name = "TEXT", default_value = "")]
    ok: String,

    /// Text of the cancel button
    #[arg(long, value_name = "TEXT", default_value = "")]
    cancel: String,

    /// Error text to show, e.g. after a wrong passphrase
    #[arg(short, long, value_name = "TEXT", default_value = "")]
    error: String,

    /// Name of, or path to, the pinentry program
    #[arg(long, env = "PINPROMPT_PINENTRY", value_name = "PROGRAM", default_value = "pinentry")]
    pinentry: OsString,

    /// Name of, or path to, the program used to turn terminal echo off and on
    #[arg(long, env = "PINPROMPT_STTY", value_name = "PROGRAM", default_value = "stty")]
    stty: OsString,

    /// Increase log verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn setup_logging(level: &str) {
    // RUST_LOG takes precedence over the command line flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the secret, so logs always go to stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };
    setup_logging(log_level);

    let request = Request {
        description: cli.description,
        prompt: cli.prompt,
        ok: cli.ok,
        cancel: cli.cancel,
        error: cli.error,
    };
    let config = Config::default()
        .with_pinentry_program(cli.pinentry)
        .with_echo_program(cli.stty);

    match pinprompt::get_pin_prompting_on(&request, &config, io::stderr()) {
        Ok(pin) => {
            let mut stdout = io::stdout().lock();
            if let Err(e) = writeln!(stdout, "{}", pin.as_str()).and_then(|()| stdout.flush()) {
                eprintln!("Error: failed to write secret: {}", e);
                process::exit(EXIT_FAILURE);
            }
        }
        Err(e) if e.is_cancelled() => {
            eprintln!("Cancelled");
            process::exit(EXIT_CANCELLED);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_FAILURE);
        }
    }
}
