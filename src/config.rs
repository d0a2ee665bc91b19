//! Client configuration
//!
//! TOML file with sections `[client]`, `[endpoint]`, `[session]`, `[stream]` and
//! `[capabilities]`. Secrets are never stored in the file; `endpoint.api_key_env` names
//! the environment variable that holds the bearer token.

use crate::transport::http::HttpTransportConfig;
use crate::transport::sse::FramingPolicy;
use crate::validation::capability::CapabilityRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Paths searched when no `--config` is given, in order
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["sentient.toml", "config/sentient.toml"];

/// Main client configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub client: ClientSection,
    pub endpoint: EndpointSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub stream: StreamSection,
    /// Capability name to JSON Schema file for its `request_payload`
    #[serde(default)]
    pub capabilities: BTreeMap<String, PathBuf>,
}

/// Who is sending requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// Sender label recorded on every request message
    pub sender: String,
}

/// Where requests go
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointSection {
    /// Agent URL receiving the POST
    pub url: String,
    /// Whole-request timeout in seconds (default: 300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment variable containing the bearer token
    pub api_key_env: Option<String>,
}

fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    /// Processor identifier placed on new sessions
    #[serde(default = "default_processor_id")]
    pub processor_id: String,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            processor_id: default_processor_id(),
        }
    }
}

fn default_processor_id() -> String {
    "sentient-client".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamSection {
    /// Fail the stream on malformed frames instead of skipping them
    #[serde(default)]
    pub strict_framing: bool,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// First existing file from [`DEFAULT_CONFIG_PATHS`]
    pub fn find_default() -> Option<&'static Path> {
        DEFAULT_CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.sender.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "client.sender cannot be empty".to_string(),
            ));
        }
        if self.session.processor_id.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "session.processor_id cannot be empty".to_string(),
            ));
        }
        if self.endpoint.timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "endpoint.timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.endpoint_url()?;
        Ok(())
    }

    /// Parsed endpoint; only http and https are accepted
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.endpoint.url)
            .map_err(|e| ConfigError::InvalidEndpoint(format!("{}: {e}", self.endpoint.url)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidEndpoint(format!(
                "unsupported scheme '{other}' in {}",
                self.endpoint.url
            ))),
        }
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Bearer token, if the config names a variable and it is set
    pub fn get_api_key(&self) -> Option<String> {
        Self::get_env_var_optional(self.endpoint.api_key_env.as_ref())
    }

    /// Bearer token; fails when the config names a variable that is not set
    pub fn require_api_key(&self) -> Result<Option<String>, ConfigError> {
        self.endpoint
            .api_key_env
            .as_deref()
            .map(Self::get_env_var_required)
            .transpose()
    }

    pub fn framing_policy(&self) -> FramingPolicy {
        FramingPolicy::from_strict(self.stream.strict_framing)
    }

    /// Transport settings derived from `[endpoint]`
    pub fn transport_config(&self) -> Result<HttpTransportConfig, ConfigError> {
        let mut config = HttpTransportConfig::new(self.endpoint_url()?)
            .with_timeout(Duration::from_secs(self.endpoint.timeout_secs));
        if let Some(api_key) = self.require_api_key()? {
            config = config.with_api_key(api_key);
        }
        Ok(config)
    }

    /// Compile every `[capabilities]` schema file into a registry
    ///
    /// Relative paths are resolved against `base_dir`.
    pub fn capability_registry(&self, base_dir: &Path) -> Result<CapabilityRegistry, ConfigError> {
        let mut registry = CapabilityRegistry::new();
        for (name, path) in &self.capabilities {
            let path = base_dir.join(path);
            let content = std::fs::read_to_string(&path)?;
            let schema: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
                ConfigError::InvalidConfig(format!(
                    "capability '{name}' schema {} is not valid JSON: {e}",
                    path.display()
                ))
            })?;
            registry
                .register(name, schema)
                .map_err(|e| ConfigError::InvalidConfig(format!("capability '{name}': {e}")))?;
        }
        Ok(registry)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[client]
sender = "test-user"

[endpoint]
url = "http://localhost:8000/assist"

[session]
processor_id = "test-processor"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[client]
sender = "alice"

[endpoint]
url = "https://agent.example.com/assist"
timeout_secs = 30
api_key_env = "SENTIENT_API_KEY"

[session]
processor_id = "research-agent"

[stream]
strict_framing = true
"#;

        let config = ClientConfig::from_toml(toml_content).unwrap();
        assert_eq!(config.client.sender, "alice");
        assert_eq!(config.endpoint.timeout_secs, 30);
        assert_eq!(
            config.endpoint.api_key_env.as_deref(),
            Some("SENTIENT_API_KEY")
        );
        assert_eq!(config.session.processor_id, "research-agent");
        assert_eq!(config.framing_policy(), FramingPolicy::Strict);
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = ClientConfig::test_config();
        assert_eq!(config.endpoint.timeout_secs, 300);
        assert_eq!(config.endpoint.api_key_env, None);
        assert!(!config.stream.strict_framing);
        assert_eq!(config.framing_policy(), FramingPolicy::Lenient);

        let toml_content = r#"
[client]
sender = "bob"

[endpoint]
url = "http://localhost:8000"
"#;
        let config = ClientConfig::from_toml(toml_content).unwrap();
        assert_eq!(config.session.processor_id, "sentient-client");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut config = ClientConfig::test_config();
        config.endpoint.url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint(_))
        ));

        config.endpoint.url = "ftp://agent.example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_empty_sender_rejected() {
        let mut config = ClientConfig::test_config();
        config.client.sender = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_api_key_variable() {
        let mut config = ClientConfig::test_config();
        config.endpoint.api_key_env = Some("SENTIENT_TEST_KEY_THAT_IS_NEVER_SET".to_string());

        assert_eq!(config.get_api_key(), None);
        assert!(matches!(
            config.transport_config(),
            Err(ConfigError::EnvVarNotFound(name)) if name == "SENTIENT_TEST_KEY_THAT_IS_NEVER_SET"
        ));
    }

    #[test]
    fn test_capability_registry_from_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("search.json"),
            r#"{"type": "object", "required": ["terms"]}"#,
        )
        .unwrap();

        let mut config = ClientConfig::test_config();
        config
            .capabilities
            .insert("search".to_string(), PathBuf::from("search.json"));

        let registry = config.capability_registry(dir.path()).unwrap();
        assert_eq!(registry.capabilities(), vec!["search".to_string()]);

        std::fs::write(dir.path().join("search.json"), "{broken").unwrap();
        assert!(matches!(
            config.capability_registry(dir.path()),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_transport_config_from_endpoint() {
        let config = ClientConfig::test_config();
        let transport = config.transport_config().unwrap();
        assert_eq!(transport.endpoint.as_str(), "http://localhost:8000/assist");
        assert_eq!(transport.timeout, Duration::from_secs(300));
        assert!(transport.api_key.is_none());
    }
}
