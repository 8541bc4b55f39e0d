use super::{CoreError, Result};
use crate::services::Edition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tuning knobs for the type registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Upper bound on memoized entity-name normalizations.
    pub name_cache_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name_cache_capacity: 1024,
        }
    }
}

/// Configuration consumed by the service orchestrator at bring-up.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrchestratorConfig {
    /// Enabled services, separated by commas and/or whitespace.
    #[serde(default)]
    pub configured_services: String,
    /// Licensed edition; services requiring a higher edition are skipped.
    #[serde(default)]
    pub edition: Edition,
    /// Free-form settings handed to every service on initialize.
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

impl OrchestratorConfig {
    pub fn new(configured_services: &str) -> Self {
        Self {
            configured_services: configured_services.to_string(),
            ..Self::default()
        }
    }

    /// Set the licensed edition
    pub fn edition(mut self, edition: Edition) -> Self {
        self.edition = edition;
        self
    }

    /// Add a service setting
    pub fn setting(mut self, key: &str, value: &str) -> Self {
        self.settings.insert(key.to_string(), value.to_string());
        self
    }

    /// Enabled service names in configuration order.
    pub fn configured_service_names(&self) -> Vec<String> {
        self.configured_services
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub services: OrchestratorConfig,
}

impl RuntimeConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.registry.name_cache_capacity == 0 {
            return Err(CoreError::ConfigError(
                "registry.name_cache_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
