//! Error types for the Kaitaku API client.
//!
//! # Design
//! Every failed call surfaces as a single `ApiError` shape carrying the
//! envelope's `status`, `code` and `error` fields. Errors the server reports
//! are built from the envelope directly. Transport and JSON failures are
//! converted once through the `From` impls below, with `UNKNOWN` as the
//! status, so callers never see a raw `reqwest` or `serde_json` error.
//!
//! `ConfigError` is separate because it can only happen while constructing a
//! client, before any request exists.

/// Status used when the server never produced an envelope.
pub const UNKNOWN_STATUS: &str = "UNKNOWN";
pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
pub const DECODE_ERROR: &str = "DECODE_ERROR";
pub const ENCODE_ERROR: &str = "ENCODE_ERROR";

/// Where an `ApiError` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server answered with a non-`OK` envelope.
    Application,
    /// No response arrived.
    Transport,
    /// The response body or its `data` could not be decoded.
    Decode,
    /// The request body could not be serialized.
    Encode,
}

/// The structured error returned by every client call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{app_status_code} ({response_code}): {response_error}")]
pub struct ApiError {
    /// The envelope's `status`, or `UNKNOWN` for local failures.
    pub app_status_code: String,
    /// Machine-readable code such as `INVALID_EMAIL_ALREADY_REGISTERED`.
    pub response_code: String,
    /// Human-readable message.
    pub response_error: String,
    pub kind: ErrorKind,
}

impl ApiError {
    /// An error reported by the server in an envelope.
    pub fn application(
        app_status_code: impl Into<String>,
        response_code: impl Into<String>,
        response_error: impl Into<String>,
    ) -> Self {
        Self {
            app_status_code: app_status_code.into(),
            response_code: response_code.into(),
            response_error: response_error.into(),
            kind: ErrorKind::Application,
        }
    }

    fn local(kind: ErrorKind, response_code: &str, message: impl Into<String>) -> Self {
        Self {
            app_status_code: UNKNOWN_STATUS.to_string(),
            response_code: response_code.to_string(),
            response_error: message.into(),
            kind,
        }
    }

    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::local(ErrorKind::Decode, DECODE_ERROR, message)
    }

    pub(crate) fn encode(err: serde_json::Error) -> Self {
        Self::local(ErrorKind::Encode, ENCODE_ERROR, err.to_string())
    }

    /// True when the server itself reported this error in an envelope.
    pub fn is_application(&self) -> bool {
        self.kind == ErrorKind::Application
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        Self::local(ErrorKind::Transport, TRANSPORT_ERROR, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(err.to_string())
    }
}

/// Failure raised by a [`Transport`](crate::transport::Transport) before a
/// response body was received.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while building a client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("base API URL is required")]
    MissingBaseUrl,

    #[error("environment variable {0} is not valid unicode")]
    InvalidEnv(&'static str),
}
