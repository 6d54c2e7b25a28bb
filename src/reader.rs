//! Secret sources behind a common trait

use zeroize::Zeroizing;

use crate::assuan::PinentryClient;
use crate::config::Config;
use crate::error::Result;
use crate::fallback::TerminalPrompt;
use crate::request::Request;

/// Trait for obtaining a secret from some source.
pub trait PinReader {
    /// Ask for the secret described by `request`.
    ///
    /// Returns the secret wrapped in `Zeroizing` so it is wiped from memory
    /// when dropped.
    fn read_pin(&mut self, request: &Request) -> Result<Zeroizing<String>>;
}

impl PinReader for PinentryClient {
    fn read_pin(&mut self, request: &Request) -> Result<Zeroizing<String>> {
        self.get_pin(request)
    }
}

impl PinReader for TerminalPrompt {
    fn read_pin(&mut self, request: &Request) -> Result<Zeroizing<String>> {
        self.get_pin(request)
    }
}

/// Picks pinentry when it is installed and the terminal otherwise, anew on
/// every call.
#[derive(Debug, Clone, Default)]
pub struct SecretPrompt {
    config: Config,
}

impl SecretPrompt {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl PinReader for SecretPrompt {
    fn read_pin(&mut self, request: &Request) -> Result<Zeroizing<String>> {
        crate::get_pin_with(request, &self.config)
    }
}

/// Returns a fixed secret whatever is asked (for testing)
pub struct ConstantPinReader {
    pin: Zeroizing<String>,
}

impl ConstantPinReader {
    pub fn new(pin: impl Into<String>) -> Self {
        Self {
            pin: Zeroizing::new(pin.into()),
        }
    }
}

impl PinReader for ConstantPinReader {
    fn read_pin(&mut self, _request: &Request) -> Result<Zeroizing<String>> {
        Ok(self.pin.clone())
    }
}
