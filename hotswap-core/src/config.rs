//! Configuration
//!
//! All fields have defaults, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Encoding used for notifications pushed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Json,
    #[serde(rename = "msgpack")]
    MessagePack,
}

/// Runtime configuration for the change handler and the update applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotConfig {
    /// Url prefix stripped when reporting relative urls.
    pub root: String,

    /// Query parameter carrying the cache-busting marker.
    pub cache_bust_param: String,

    /// Codec for outbound notifications.
    pub wire_format: WireFormat,

    /// Capacity of the outbound broadcast channel.
    pub channel_capacity: usize,
}

impl Default for HotConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            cache_bust_param: "t".to_string(),
            wire_format: WireFormat::Json,
            channel_capacity: 64,
        }
    }
}

impl HotConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: HotConfig = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field-level constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_bust_param.is_empty() {
            return Err(ConfigError::Invalid {
                field: "cacheBustParam",
                message: "must not be empty".to_string(),
            });
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "channelCapacity",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Strip the configured root from a url for display.
    pub fn relative<'a>(&self, url: &'a str) -> &'a str {
        if self.root.is_empty() {
            return url;
        }
        url.strip_prefix(self.root.as_str()).unwrap_or(url)
    }
}
