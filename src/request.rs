//! What to ask the user

use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::Result;

/// The texts shown to the user when asking for a secret.
///
/// Every field is optional; an empty string means "use the default of
/// whatever ends up asking", either pinentry or the terminal fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Longer explanation shown above the entry field.
    pub description: String,
    /// Label right before the entry field.
    pub prompt: String,
    /// Text of the confirm button.
    pub ok: String,
    /// Text of the cancel button.
    pub cancel: String,
    /// Error text, typically shown when asking again after a wrong secret.
    pub error: String,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_ok(mut self, ok: impl Into<String>) -> Self {
        self.ok = ok.into();
        self
    }

    pub fn with_cancel(mut self, cancel: impl Into<String>) -> Self {
        self.cancel = cancel.into();
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self
    }

    /// The pinentry `SET*` commands this request translates to.
    ///
    /// Always in the order prompt, description, ok, cancel, error; empty
    /// fields are skipped.
    pub fn settings(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("SETPROMPT", self.prompt.as_str()),
            ("SETDESC", self.description.as_str()),
            ("SETOK", self.ok.as_str()),
            ("SETCANCEL", self.cancel.as_str()),
            ("SETERROR", self.error.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
    }

    /// Ask the user for the secret using the default configuration.
    ///
    /// See [`crate::get_pin`].
    pub fn get_pin(&self) -> Result<Zeroizing<String>> {
        crate::get_pin_with(self, &Config::default())
    }
}
