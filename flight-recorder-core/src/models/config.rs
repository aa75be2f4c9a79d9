use serde::Deserialize;

use super::error::RecorderError;
use super::stream_request::DEFAULT_BLOCK_SIZE;

/// Client-side settings for a connection and the recordings it hands out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfiguration {
    /// Block size for streams opened without an explicit one (default: 50000 bytes).
    pub default_block_size: i64,

    /// Fall back to the text-command recorder when the structured one is
    /// missing (default: true).
    pub allow_legacy_fallback: bool,
}

impl ClientConfiguration {
    pub fn from_json(json: &str) -> Result<Self, RecorderError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RecorderError::Validation(format!("failed to parse client configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.default_block_size <= 0 {
            return Err(RecorderError::Validation(format!(
                "default block size must be positive, got {}",
                self.default_block_size
            )));
        }
        Ok(())
    }
}

impl Default for ClientConfiguration {
    fn default() -> Self {
        Self {
            default_block_size: DEFAULT_BLOCK_SIZE,
            allow_legacy_fallback: true,
        }
    }
}
