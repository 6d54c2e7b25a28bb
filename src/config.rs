//! Where to find the helper programs

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Program names and process settings used when asking for a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Name of, or path to, the pinentry binary.
    pub pinentry_program: OsString,
    /// Name of, or path to, the program toggling terminal echo.
    pub echo_program: OsString,
    /// Working directory for every spawned helper.
    pub working_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pinentry_program: OsString::from("pinentry"),
            echo_program: OsString::from("stty"),
            working_dir: PathBuf::from("/"),
        }
    }
}

impl Config {
    pub fn with_pinentry_program(mut self, program: impl Into<OsString>) -> Self {
        self.pinentry_program = program.into();
        self
    }

    pub fn with_echo_program(mut self, program: impl Into<OsString>) -> Self {
        self.echo_program = program.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = dir.as_ref().to_path_buf();
        self
    }
}
