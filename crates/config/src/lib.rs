//! agdir_config
//!
//! Typed entry point over the recognized configuration surface (spec.md
//! §6). Unlike the teacher's ad hoc per-subcommand `.env` reads in
//! `control_cli`, every key here has one struct field, loaded once from
//! TOML via `serde` derives in the teacher's style (`#[serde(default)]`,
//! `#[serde(rename_all = "snake_case")]`).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("invalid TOML in {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistryType {
    Zot,
    Generic,
    Other,
}

impl Default for RegistryType {
    fn default() -> Self {
        RegistryType::Zot
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct RegistryAuth {
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub insecure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct RegistryConfig {
    pub r#type: RegistryType,
    pub address: String,
    pub repository: String,
    pub auth: RegistryAuth,
    /// If set, overrides the remote registry entirely; records are stored
    /// under this path instead (spec.md §6).
    pub local_dir: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            r#type: RegistryType::default(),
            address: "127.0.0.1:5000".to_string(),
            repository: "dir".to_string(),
            auth: RegistryAuth::default(),
            local_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ValidationConfig {
    pub disable_api: bool,
    pub schema_url: String,
    pub strict: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ImporterConfig {
    pub registry_type: Option<String>,
    pub registry_url: Option<String>,
    #[serde(default)]
    pub filters: std::collections::BTreeMap<String, String>,
    pub concurrency: Option<u32>,
    pub dry_run: bool,
    pub force: bool,
    pub debug: bool,
    pub enrich: bool,
    pub enricher_config_file: Option<String>,
    pub enricher_prompt_template: Option<String>,
    pub limit: Option<u64>,
}

impl ImporterConfig {
    pub fn concurrency_or_default(&self) -> u32 {
        self.concurrency.unwrap_or(5)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    pub registry: RegistryConfig,
    pub validation: ValidationConfig,
    pub importer: ImporterConfig,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse { path: "<inline>".to_string(), source })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_recognised_keys() {
        let config = Config::default();
        assert_eq!(config.registry.r#type, RegistryType::Zot);
        assert_eq!(config.registry.address, "127.0.0.1:5000");
        assert_eq!(config.registry.repository, "dir");
        assert_eq!(config.importer.concurrency_or_default(), 5);
    }

    #[test]
    fn parses_partial_toml_with_defaults_filled_in() {
        let toml_str = r#"
            [registry]
            address = "registry.example.com:443"

            [validation]
            disable_api = true

            [importer]
            concurrency = 8
            dry_run = true
        "#;
        let config = Config::from_toml_str(toml_str).unwrap();
        assert_eq!(config.registry.address, "registry.example.com:443");
        assert_eq!(config.registry.repository, "dir");
        assert!(config.validation.disable_api);
        assert_eq!(config.importer.concurrency_or_default(), 8);
        assert!(config.importer.dry_run);
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("agdir.toml");
        fs::write(&path, "[registry]\naddress = \"localhost:5000\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.registry.address, "localhost:5000");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::load(Path::new("/nonexistent/agdir.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
