//! Model Provider Gateway
//!
//! One invocation walks a fixed chain and stops at the first attempt that
//! yields a JSON object:
//!
//! | Attempt | Provider  | Mode                                   |
//! |---------|-----------|----------------------------------------|
//! | 1       | primary   | strict (provider-enforced JSON object) |
//! | 2       | primary   | permissive (plain text, JSON reminder) |
//! | 3       | secondary | plain text                             |
//!
//! Transport errors, empty completions and unparseable output all count as
//! a failed attempt. A missing provider fails its attempts without a
//! network call. When the chain is exhausted the result is `None`.

use crate::config::GatewayConfig;
use crate::llm::{LlmClient, LlmError, LlmRequest, ResponseFormat};
use crate::parse::{clean_and_parse, truncate_for_log};
use crate::providers::{GeminiClient, HttpLlmClient};
use crate::roles::AgentRole;
use serde_json::Value;
use std::sync::Arc;

const PERMISSIVE_SUFFIX: &str = "\n\nIMPORTANT: Output ONLY Raw JSON. No Markdown.";

const MAX_LOGGED_OUTPUT: usize = 100;

/// Stage of the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Primary provider, JSON mode
    Strict,
    /// Primary provider, text mode
    Permissive,
    /// Secondary provider
    Secondary,
}

impl Attempt {
    /// Chain order
    pub const CHAIN: [Attempt; 3] = [Self::Strict, Self::Permissive, Self::Secondary];
}

impl std::fmt::Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Strict => "primary/strict",
            Self::Permissive => "primary/permissive",
            Self::Secondary => "secondary",
        };
        f.write_str(s)
    }
}

/// Stateless front door to the generative back-ends
#[derive(Clone)]
pub struct ModelGateway {
    primary: Option<Arc<dyn LlmClient>>,
    secondary: Option<Arc<dyn LlmClient>>,
    config: GatewayConfig,
}

impl std::fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGateway")
            .field("primary", &self.primary.is_some())
            .field("secondary", &self.secondary.is_some())
            .field("primary_model", &self.config.primary.model)
            .field("secondary_model", &self.config.secondary.model)
            .finish()
    }
}

impl ModelGateway {
    /// Create gateway with no providers attached
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            primary: None,
            secondary: None,
            config,
        }
    }

    /// Build the HTTP provider clients for every provider that has a key
    ///
    /// # Errors
    /// Returns [`LlmError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: GatewayConfig) -> Result<Self, LlmError> {
        let mut gateway = Self::new(config);
        let timeout = gateway.config.timeout_secs;

        if gateway.config.primary.key().is_some() {
            gateway.primary = Some(Arc::new(HttpLlmClient::new(&gateway.config.primary, timeout)?));
        } else {
            tracing::warn!("Primary provider has no API key; it will be skipped");
        }

        if gateway.config.secondary.key().is_some() {
            gateway.secondary =
                Some(Arc::new(GeminiClient::new(&gateway.config.secondary, timeout)?));
        } else {
            tracing::warn!("Secondary provider has no API key; it will be skipped");
        }

        Ok(gateway)
    }

    /// Attach primary provider
    #[must_use]
    pub fn with_primary(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.primary = Some(client);
        self
    }

    /// Attach secondary provider
    #[must_use]
    pub fn with_secondary(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.secondary = Some(client);
        self
    }

    /// Settings in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Check whether any provider is attached
    #[inline]
    #[must_use]
    pub fn has_providers(&self) -> bool {
        self.primary.is_some() || self.secondary.is_some()
    }

    /// Send one instruction/payload pair through the fallback chain
    ///
    /// Never fails: exhaustion is reported as `None`.
    pub async fn invoke(&self, role: AgentRole, instruction: &str, payload: &str) -> Option<Value> {
        tracing::info!("{} agent working...", role);

        for attempt in Attempt::CHAIN {
            let Some((client, request)) = self.prepare(attempt, instruction, payload) else {
                tracing::warn!("{} {} attempt skipped: provider unavailable", role, attempt);
                continue;
            };

            match client.complete(request).await {
                Ok(raw) => {
                    if let Some(value) = clean_and_parse(&raw) {
                        tracing::debug!("{} answered via {}", role, attempt);
                        return Some(value);
                    }
                    tracing::warn!(
                        "{} {} attempt returned invalid JSON: {}",
                        role,
                        attempt,
                        truncate_for_log(&raw, MAX_LOGGED_OUTPUT)
                    );
                }
                Err(e) => tracing::warn!("{} {} attempt failed: {}", role, attempt, e),
            }
        }

        tracing::error!("{} all model providers failed", role);
        None
    }

    fn prepare(
        &self,
        attempt: Attempt,
        instruction: &str,
        payload: &str,
    ) -> Option<(&Arc<dyn LlmClient>, LlmRequest)> {
        let cfg = &self.config;
        match attempt {
            Attempt::Strict => self.primary.as_ref().map(|client| {
                let request = LlmRequest {
                    system: instruction.to_string(),
                    user: payload.to_string(),
                    model: cfg.primary.model.clone(),
                    temperature: cfg.strict_temperature,
                    max_tokens: Some(cfg.max_tokens),
                    response_format: ResponseFormat::JsonObject,
                };
                (client, request)
            }),
            Attempt::Permissive => self.primary.as_ref().map(|client| {
                let request = LlmRequest {
                    system: format!("{instruction}{PERMISSIVE_SUFFIX}"),
                    user: payload.to_string(),
                    model: cfg.primary.model.clone(),
                    temperature: cfg.permissive_temperature,
                    max_tokens: Some(cfg.max_tokens),
                    response_format: ResponseFormat::Text,
                };
                (client, request)
            }),
            Attempt::Secondary => self.secondary.as_ref().map(|client| {
                let request = LlmRequest {
                    system: instruction.to_string(),
                    user: payload.to_string(),
                    model: cfg.secondary.model.clone(),
                    temperature: cfg.secondary_temperature,
                    max_tokens: None,
                    response_format: ResponseFormat::Text,
                };
                (client, request)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use mockall::predicate::function;
    use mockall::Sequence;
    use serde_json::json;

    fn gateway(primary: MockLlmClient, secondary: MockLlmClient) -> ModelGateway {
        ModelGateway::new(GatewayConfig::default())
            .with_primary(Arc::new(primary))
            .with_secondary(Arc::new(secondary))
    }

    #[tokio::test]
    async fn strict_success_stops_the_chain() {
        let mut primary = MockLlmClient::new();
        primary
            .expect_complete()
            .with(function(|r: &LlmRequest| r.response_format == ResponseFormat::JsonObject))
            .times(1)
            .returning(|_| Ok(r#"{"summary":"ok"}"#.to_string()));
        let mut secondary = MockLlmClient::new();
        secondary.expect_complete().never();

        let result = gateway(primary, secondary)
            .invoke(AgentRole::Drafter, "sys", "user")
            .await;
        assert_eq!(result, Some(json!({"summary": "ok"})));
    }

    #[tokio::test]
    async fn malformed_strict_output_falls_back_to_permissive() {
        let mut seq = Sequence::new();
        let mut primary = MockLlmClient::new();
        primary
            .expect_complete()
            .with(function(|r: &LlmRequest| r.response_format == ResponseFormat::JsonObject))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("not json".to_string()));
        primary
            .expect_complete()
            .with(function(|r: &LlmRequest| {
                r.response_format == ResponseFormat::Text
                    && r.system.ends_with("Output ONLY Raw JSON. No Markdown.")
                    && (r.temperature - 0.2).abs() < f32::EPSILON
            }))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("```json\n{\"findings\": []}\n```".to_string()));
        let mut secondary = MockLlmClient::new();
        secondary.expect_complete().never();

        let result = gateway(primary, secondary)
            .invoke(AgentRole::Auditor, "sys", "code")
            .await;
        assert_eq!(result, Some(json!({"findings": []})));
    }

    #[tokio::test]
    async fn secondary_receives_its_own_model() {
        let mut primary = MockLlmClient::new();
        primary
            .expect_complete()
            .times(2)
            .returning(|_| Err(LlmError::Http("timeout".to_string())));
        let mut secondary = MockLlmClient::new();
        secondary
            .expect_complete()
            .with(function(|r: &LlmRequest| r.model == "gemini-1.5-flash"))
            .times(1)
            .returning(|_| Ok(r#"{"codeDocument":"x"}"#.to_string()));

        let result = gateway(primary, secondary)
            .invoke(AgentRole::Syncer, "sys", "payload")
            .await;
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn exhausted_chain_is_none_after_three_calls() {
        let mut primary = MockLlmClient::new();
        primary
            .expect_complete()
            .times(2)
            .returning(|_| Err(LlmError::Response("HTTP 400".to_string())));
        let mut secondary = MockLlmClient::new();
        secondary
            .expect_complete()
            .times(1)
            .returning(|_| Ok("I cannot help with that".to_string()));

        let result = gateway(primary, secondary)
            .invoke(AgentRole::Fixer, "sys", "payload")
            .await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn missing_providers_make_no_calls() {
        let gateway = ModelGateway::new(GatewayConfig::default());
        assert!(!gateway.has_providers());
        assert_eq!(gateway.invoke(AgentRole::Drafter, "sys", "p").await, None);
    }

    #[test]
    fn from_config_without_keys_attaches_nothing() {
        let gateway = ModelGateway::from_config(GatewayConfig::default()).unwrap();
        assert!(!gateway.has_providers());
    }
}
