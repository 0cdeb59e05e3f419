//! Error types for messaging domain value construction.

use thiserror::Error;

/// Errors returned while constructing messaging domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessagingDomainError {
    /// The subject is empty after trimming.
    #[error("subject must not be empty")]
    EmptySubject,

    /// The subject contains whitespace or empty dot-separated tokens.
    #[error("subject '{0}' is invalid (no whitespace or empty tokens allowed)")]
    InvalidSubject(String),

    /// The subject exceeds the 255-character limit.
    #[error("subject exceeds 255 character limit: {0}")]
    SubjectTooLong(String),

    /// The handler identifier is empty after trimming.
    #[error("handler identifier must not be empty")]
    EmptyHandlerId,
}

/// Errors raised while parsing a binary-mode event envelope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// A required `ce-*` header is absent or blank.
    #[error("missing required envelope header '{0}'")]
    MissingAttribute(&'static str),

    /// The `ce-specversion` header names an unsupported version.
    #[error("unsupported event spec version '{received}' (supported: {supported})")]
    UnsupportedSpecVersion {
        /// Version found on the message.
        received: String,
        /// Version this crate understands.
        supported: &'static str,
    },

    /// The `ce-datacontenttype` header names a media type the codec cannot read.
    #[error("unsupported data content type '{0}'")]
    UnsupportedContentType(String),

    /// The message carries a structured-mode envelope in its body.
    #[error("structured-mode envelopes are not supported; expected binary-mode ce-* headers")]
    StructuredMode,
}
