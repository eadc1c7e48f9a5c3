//! Client configuration.

use crate::error::ConfigError;

pub const ENV_API_URL: &str = "KAITAKU_API_URL";
pub const ENV_TOKEN: &str = "KAITAKU_TOKEN";

/// Base URL and optional bearer token for a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Empty means requests are sent without an `Authorization` header.
    pub token: String,
}

impl ClientConfig {
    /// Fails when `base_url` is empty or only whitespace.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ConfigError> {
        let base_url = base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Reads `KAITAKU_API_URL` (required) and `KAITAKU_TOKEN` (optional).
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = read_env(ENV_API_URL)?.ok_or(ConfigError::MissingBaseUrl)?;
        let token = read_env(ENV_TOKEN)?.unwrap_or_default();
        Self::new(&base_url, &token)
    }
}

fn read_env(name: &'static str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnv(name)),
    }
}
