use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to the user.
    ///
    /// Broken helpers, pipe failures and protocol violations all land here.
    Internal,

    /// The user declined, or the environment offers no way to ask them.
    User,
}

/// Fine-grained condition flags for callers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Neither pinentry nor the echo-toggle helper could be found.
    Unavailable,
    /// The pinentry process could not be started.
    Spawn,
    /// Pinentry did not greet with `OK`.
    Greeting,
    /// Reading from or writing to a pipe or standard stream failed.
    Io,
    /// Pinentry answered with a line the client did not expect.
    Protocol,
    /// The user explicitly cancelled the prompt.
    Cancelled,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct PinError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag. Code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl PinError {
    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The error returned when the user cancels the pinentry dialog.
    pub fn cancelled() -> Self {
        Self::with_kind(
            ErrorCategory::User,
            ErrorKind::Cancelled,
            "pinentry: operation cancelled",
        )
    }

    /// True if the user declined to enter a secret.
    ///
    /// Callers should present this as a normal outcome rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        self.kind == Some(ErrorKind::Cancelled)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PinError>;
