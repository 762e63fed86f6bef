//! API error types.

use serde::Deserialize;
use thiserror::Error;

/// Where an [`ApiError`] originated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// No response or status was obtained.
    Transport,
    /// The server answered with a status of 300 or above.
    #[default]
    Server,
    /// A body was received but did not match the expected shape.
    Decoding,
    /// The request could not be built (bad URL, unserializable body).
    Local,
}

/// Unified error returned by the API client.
///
/// Deserializes from the standard `{"message": ..., "code": ...}` error body.
#[derive(Debug, Clone, PartialEq, Eq, Error, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    /// Human readable message.
    pub message: String,
    /// Optional machine readable code.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(skip)]
    kind: ApiErrorKind,
    #[serde(skip)]
    status: Option<u16>,
}

impl ApiError {
    /// Creates a server error with the given message and code.
    #[must_use]
    pub fn new(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            message: message.into(),
            code,
            kind: ApiErrorKind::Server,
            status: None,
        }
    }

    /// Creates transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(message, None).with_kind(ApiErrorKind::Transport)
    }

    /// Creates decoding error.
    #[must_use]
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::new(message, None).with_kind(ApiErrorKind::Decoding)
    }

    /// Creates local error.
    #[must_use]
    pub fn local(message: impl Into<String>) -> Self {
        Self::new(message, None).with_kind(ApiErrorKind::Local)
    }

    /// Sets the error kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: ApiErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attaches the HTTP status the error was produced from.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    /// Returns the HTTP status, if one was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns whether no response was obtained.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Transport)
    }

    /// Returns whether the server rejected the request.
    #[must_use]
    pub const fn is_server(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Server)
    }

    /// Returns whether a body failed to decode.
    #[must_use]
    pub const fn is_decoding(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Decoding)
    }
}
