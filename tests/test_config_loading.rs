//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.

use sentient_agent_client::config::{ClientConfig, ConfigError};
use sentient_agent_client::transport::FramingPolicy;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[client]
sender = "alice"

[endpoint]
url = "https://agent.example.com/assist"
timeout_secs = 60

[session]
processor_id = "research-agent"

[stream]
strict_framing = true
"#
    )
    .unwrap();

    let config = ClientConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.client.sender, "alice");
    assert_eq!(config.endpoint.url, "https://agent.example.com/assist");
    assert_eq!(config.session.processor_id, "research-agent");
    assert_eq!(config.framing_policy(), FramingPolicy::Strict);

    let transport = config.transport_config().unwrap();
    assert_eq!(transport.timeout, Duration::from_secs(60));
}

#[test]
fn test_missing_file_is_read_error() {
    let result = ClientConfig::load_from_file(std::path::Path::new("/nonexistent/sentient.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[client\nsender = ").unwrap();

    let result = ClientConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_missing_required_section_is_parse_error() {
    let result = ClientConfig::from_toml("[client]\nsender = \"alice\"\n");
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_zero_timeout_rejected() {
    let result = ClientConfig::from_toml(
        r#"
[client]
sender = "alice"

[endpoint]
url = "http://localhost:8000"
timeout_secs = 0
"#,
    );
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_capability_schemas_resolve_relative_to_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("schemas")).unwrap();
    std::fs::write(
        dir.path().join("schemas/search.json"),
        r#"{"type": "object", "properties": {"terms": {"type": "array"}}, "required": ["terms"]}"#,
    )
    .unwrap();
    let config_path = dir.path().join("sentient.toml");
    std::fs::write(
        &config_path,
        r#"
[client]
sender = "alice"

[endpoint]
url = "http://localhost:8000/assist"

[capabilities]
search = "schemas/search.json"
"#,
    )
    .unwrap();

    let config = ClientConfig::load_from_file(&config_path).unwrap();
    let registry = config.capability_registry(dir.path()).unwrap();
    assert!(registry.contains("search"));
    assert!(!registry.contains("summarize"));
}

#[test]
fn test_missing_capability_schema_file() {
    let config = ClientConfig::from_toml(
        r#"
[client]
sender = "alice"

[endpoint]
url = "http://localhost:8000/assist"

[capabilities]
search = "does-not-exist.json"
"#,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        config.capability_registry(dir.path()),
        Err(ConfigError::FileRead(_))
    ));
}
