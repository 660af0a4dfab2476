//! Provider-agnostic completion interface

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output constraint requested from a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// Provider-enforced JSON object
    JsonObject,
}

/// One completion request
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    /// System instruction
    pub system: String,
    /// User payload
    pub user: String,
    /// Model name understood by the provider
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token ceiling
    pub max_tokens: Option<u32>,
    /// Output constraint
    pub response_format: ResponseFormat,
}

/// Completion backend
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion and return the raw text
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

/// Provider failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// Transport failure or timeout
    #[error("http error: {0}")]
    Http(String),

    /// Non-success status or empty completion
    #[error("response error: {0}")]
    Response(String),

    /// Body did not match the provider's schema
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        // URLs may carry credentials
        Self::Http(err.without_url().to_string())
    }
}
