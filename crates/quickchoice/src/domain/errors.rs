//! Domain-specific errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChoiceError {
    /// A precondition on caller-supplied input was violated.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A choice, template, or prompt lookup came back empty.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
    /// The AI provider or the document store reported a failure.
    #[error("external request failed: {0}")]
    ExternalRequest(String),
}

impl ChoiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }
}
