//! Decoding and validation of the `{status, data | code, error}` envelope.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpResponse;

/// The only status that marks a successful call.
pub const STATUS_OK: &str = "OK";

/// Every API response is wrapped in this shape.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Envelope {
    pub status: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Envelope {
    /// Returns `data` on `"OK"` (exact match), otherwise the reported error.
    pub fn into_result(self) -> Result<Value, ApiError> {
        if self.status == STATUS_OK {
            return Ok(self.data);
        }
        Err(ApiError::application(
            self.status,
            self.code.unwrap_or_default(),
            self.error.unwrap_or_default(),
        ))
    }
}

/// Decodes the body of `response` and validates its envelope.
///
/// The HTTP status does not decide the outcome; error envelopes are commonly
/// sent with 4xx statuses. A body that is not an envelope is a decode error.
pub fn parse_envelope(response: &HttpResponse) -> Result<Value, ApiError> {
    let envelope: Envelope = serde_json::from_str(&response.body).map_err(|e| {
        ApiError::decode(format!(
            "HTTP {}: invalid response envelope: {e}",
            response.status
        ))
    })?;
    envelope.into_result()
}
