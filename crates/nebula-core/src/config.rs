//! Configuration
//!
//! [`NebulaConfig`] is read from TOML, then overlaid with environment
//! variables. Every field has a default, so an empty or missing file is a
//! valid configuration.

use nebula_agents::GatewayConfig;
use nebula_graph::{Direction, LayoutConfig, Position};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Primary provider key
pub const ENV_PRIMARY_KEY: &str = "GROQ_API_KEY";
/// Secondary provider key
pub const ENV_SECONDARY_KEY: &str = "GEMINI_API_KEY";
/// Primary model override
pub const ENV_PRIMARY_MODEL: &str = "NEBULA_PRIMARY_MODEL";
/// Secondary model override
pub const ENV_SECONDARY_MODEL: &str = "NEBULA_SECONDARY_MODEL";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Reconciliation engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Layout flow direction
    pub direction: Direction,
    /// Layout geometry
    pub layout: LayoutConfig,
    /// Position given to nodes a Fix response introduces
    pub fix_fallback_position: Position,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            direction: Direction::TopBottom,
            layout: LayoutConfig::default(),
            fix_fallback_position: Position::new(100.0, 450.0),
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With layout direction
    #[inline]
    #[must_use]
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// With layout geometry
    #[inline]
    #[must_use]
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NebulaConfig {
    /// Engine settings
    pub engine: EngineConfig,
    /// Provider settings
    pub gateway: GatewayConfig,
}

impl NebulaConfig {
    /// Parse TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed input.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a file, falling back to defaults when it does not exist
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Overlay environment variables
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Overlay values from any key lookup (environment in production)
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_PRIMARY_KEY) {
            self.gateway.primary.api_key = Some(key);
        }
        if let Some(key) = get(ENV_SECONDARY_KEY) {
            self.gateway.secondary.api_key = Some(key);
        }
        if let Some(model) = get(ENV_PRIMARY_MODEL) {
            self.gateway.primary.model = model;
        }
        if let Some(model) = get(ENV_SECONDARY_MODEL) {
            self.gateway.secondary.model = model;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(NebulaConfig::from_toml("").unwrap(), NebulaConfig::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = NebulaConfig::from_toml(
            r#"
            [engine]
            direction = "LR"

            [gateway]
            timeout_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.direction, Direction::LeftRight);
        assert_eq!(config.engine.layout, LayoutConfig::default());
        assert_eq!(config.gateway.timeout_secs, 5);
        assert_eq!(config.gateway.max_tokens, 4000);
    }

    #[test]
    fn env_overlay_sets_keys_and_models() {
        let env: HashMap<&str, &str> = [
            (ENV_PRIMARY_KEY, "gsk"),
            (ENV_SECONDARY_MODEL, "gemini-2.0-flash"),
            (ENV_SECONDARY_KEY, "  "),
        ]
        .into_iter()
        .collect();

        let config = NebulaConfig::default()
            .with_overrides(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.gateway.primary.key(), Some("gsk"));
        assert_eq!(config.gateway.secondary.key(), None);
        assert_eq!(config.gateway.secondary.model, "gemini-2.0-flash");
    }
}
