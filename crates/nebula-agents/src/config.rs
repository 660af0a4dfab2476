//! Gateway configuration

use serde::{Deserialize, Serialize};

/// Default primary endpoint (OpenAI-compatible chat completions)
pub const DEFAULT_PRIMARY_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default primary model
pub const DEFAULT_PRIMARY_MODEL: &str = "llama-3.3-70b-versatile";

/// Default secondary endpoint (Gemini REST base)
pub const DEFAULT_SECONDARY_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default secondary model
pub const DEFAULT_SECONDARY_MODEL: &str = "gemini-1.5-flash";

/// One provider's connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Endpoint URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// API key; a provider without one is unavailable
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Create provider settings without a key
    #[must_use]
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
        }
    }

    /// Set API key
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Key, if present and non-blank
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

/// Model Provider Gateway settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Low-latency provider tried first, twice
    pub primary: ProviderConfig,
    /// Fallback provider tried last
    pub secondary: ProviderConfig,
    /// Completion token ceiling for the primary provider
    pub max_tokens: u32,
    /// Temperature of the strict (JSON mode) attempt
    pub strict_temperature: f32,
    /// Temperature of the permissive (text mode) attempt
    pub permissive_temperature: f32,
    /// Temperature of the secondary attempt
    pub secondary_temperature: f32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            primary: ProviderConfig::new(DEFAULT_PRIMARY_ENDPOINT, DEFAULT_PRIMARY_MODEL),
            secondary: ProviderConfig::new(DEFAULT_SECONDARY_ENDPOINT, DEFAULT_SECONDARY_MODEL),
            max_tokens: 4000,
            strict_temperature: 0.1,
            permissive_temperature: 0.2,
            secondary_temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

impl GatewayConfig {
    /// Set primary API key
    #[must_use]
    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary.api_key = Some(key.into());
        self
    }

    /// Set secondary API key
    #[must_use]
    pub fn with_secondary_key(mut self, key: impl Into<String>) -> Self {
        self.secondary.api_key = Some(key.into());
        self
    }

    /// Set request timeout
    #[must_use]
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
