//! Configuration module
//!
//! Handles loading and managing run configuration. Values are layered as
//! defaults, then config file, then environment, then command-line flags.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::resolve_config;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default gateway endpoint when `APIM_ENDPOINT` is unset
pub const DEFAULT_ENDPOINT: &str = "https://apim-dev-genaishared-3dr5cskzi3l5q.azure-api.net";
pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o-mini-2024-07-18";
/// Token audience for Azure Cognitive Services
pub const DEFAULT_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

/// Run configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Gateway endpoint URL
    pub endpoint: String,

    /// Azure OpenAI API version query parameter
    pub api_version: String,

    /// Deployment (model) name
    pub deployment: String,

    /// Number of probes to submit
    pub requests: usize,

    /// Maximum probes in flight
    pub concurrency: usize,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Token scope requested from the identity provider
    pub scope: String,

    /// Fixed request payload
    pub prompt: PromptConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            deployment: DEFAULT_DEPLOYMENT.to_string(),
            requests: 100,
            concurrency: 10,
            timeout_secs: 60,
            scope: DEFAULT_SCOPE.to_string(),
            prompt: PromptConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    ///
    /// Not validated here; later layers may still fix individual values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if file::is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if file::is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            anyhow::bail!("Gateway endpoint must not be empty");
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            anyhow::bail!("Gateway endpoint must be an http(s) URL: {}", self.endpoint);
        }
        if self.deployment.trim().is_empty() {
            anyhow::bail!("Deployment name must not be empty");
        }
        if self.concurrency == 0 {
            anyhow::bail!("Concurrency must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.prompt.temperature) {
            anyhow::bail!(
                "Temperature {} out of range. Valid range: 0.0-2.0",
                self.prompt.temperature
            );
        }
        Ok(())
    }

    /// Full chat-completions URL for the configured deployment
    pub fn chat_completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

/// Conversation sent by every probe
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system: "You are a helpful assistant. You always answer in detail.".to_string(),
            user: "What is Azure API Management? Please give me a detailed breakdown of the main features."
                .to_string(),
            temperature: 0.7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.requests, 100);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.prompt.temperature, 0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chat_completions_url() {
        let config = AppConfig {
            endpoint: "https://gw.example.net/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.chat_completions_url(),
            "https://gw.example.net/openai/deployments/gpt-4o-mini-2024-07-18/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = AppConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let hot = AppConfig {
            prompt: PromptConfig {
                temperature: 3.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(hot.validate().is_err());

        let no_scheme = AppConfig {
            endpoint: "gw.example.net".to_string(),
            ..Default::default()
        };
        assert!(no_scheme.validate().is_err());
    }

    #[test]
    fn test_save_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = AppConfig {
            requests: 4,
            concurrency: 2,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"deployment": "gpt-35-turbo", "prompt": {"temperature": 0.2}}"#)
            .unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.deployment, "gpt-35-turbo");
        assert_eq!(loaded.requests, 100);
        assert_eq!(loaded.prompt.temperature, 0.2);
        assert_eq!(loaded.prompt.system, PromptConfig::default().system);
    }

    #[test]
    fn test_load_keeps_values_for_later_layers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "concurrency: 0\n").unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.concurrency, 0);
        assert!(loaded.validate().is_err());
    }
}
