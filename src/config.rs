use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::store::vault::{VaultConfig, ENV_ADDRESS, ENV_TOKEN};

const DEFAULT_SCOPE: &str = "wg0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Vault address. Falls back to `VAULT_ADDR`, then the Vault default.
    #[serde(default)]
    pub vault_addr: Option<String>,
    /// Vault token. Falls back to `VAULT_TOKEN`.
    #[serde(default)]
    pub vault_token: Option<String>,
    /// Per-request timeout for store calls (default: 60).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Interface scope peers are published under.
    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault_addr: None,
            vault_token: None,
            timeout_secs: default_timeout_secs(),
            scope: default_scope(),
        }
    }
}

impl Config {
    /// Default config file location: `./wirey.yaml`.
    pub fn default_path() -> PathBuf {
        PathBuf::from("wirey.yaml")
    }

    /// Load config from a YAML file. Returns None if the file does not exist.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Option<Config>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(Some(config))
    }

    /// Write a default config file with documentation comments.
    /// Returns an error if the file already exists.
    pub fn write_default_config(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!(
                "config file already exists: {}. Remove it first to regenerate.",
                path.display()
            );
        }
        let template = include_str!("config_template.yaml");
        std::fs::write(path, template)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(ref addr) = self.vault_addr {
            if !addr.starts_with("http://") && !addr.starts_with("https://") {
                anyhow::bail!("vault_addr must start with http:// or https://: {}", addr);
            }
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        if self.scope.is_empty() {
            anyhow::bail!("scope must not be empty");
        }
        if self.scope.contains('/') {
            anyhow::bail!("scope must not contain '/': {}", self.scope);
        }
        Ok(())
    }

    /// Client settings: config values first, then `VAULT_*` environment.
    pub fn vault_config(&self) -> VaultConfig {
        let mut vault = VaultConfig::with_endpoint(self.vault_addr.as_deref().unwrap_or(""));
        if self.vault_token.is_some() {
            vault.token = self.vault_token.clone();
        }
        vault.timeout = Duration::from_secs(self.timeout_secs);
        vault
    }

    /// Human-readable note on where the address and token come from.
    pub fn describe_sources(&self) -> String {
        let addr = if self.vault_addr.is_some() { "config" } else { ENV_ADDRESS };
        let token = if self.vault_token.is_some() { "config" } else { ENV_TOKEN };
        format!("address from {addr}, token from {token}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_round_trip() {
        let config = Config {
            vault_addr: Some("https://vault.example:8200".to_string()),
            scope: "office".to_string(),
            ..Config::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.vault_addr.as_deref(), Some("https://vault.example:8200"));
        assert_eq!(parsed.scope, "office");
        assert_eq!(parsed.timeout_secs, 60);
    }

    #[test]
    fn yaml_missing_fields_default() {
        let config: Config = serde_yaml::from_str("vault_addr: http://127.0.0.1:8200\n").unwrap();
        assert_eq!(config.scope, "wg0");
        assert_eq!(config.timeout_secs, 60);
        assert!(config.vault_token.is_none());
    }

    #[test]
    fn template_parses_and_validates() {
        let config: Config = serde_yaml::from_str(include_str!("config_template.yaml")).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_bad_address() {
        let config = Config {
            vault_addr: Some("vault:8200".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_timeout_and_bad_scope() {
        let zero = Config {
            timeout_secs: 0,
            ..Config::default()
        };
        assert!(zero.validate().is_err());

        let empty = Config {
            scope: String::new(),
            ..Config::default()
        };
        assert!(empty.validate().is_err());

        for scope in ["/wg0", "wg0/", "office/lab"] {
            let slashed = Config {
                scope: scope.to_string(),
                ..Config::default()
            };
            assert!(slashed.validate().is_err(), "{scope} accepted");
        }
    }

    #[test]
    fn vault_config_prefers_explicit_values() {
        let config = Config {
            vault_addr: Some("http://10.9.8.7:8200".to_string()),
            vault_token: Some("s.token".to_string()),
            timeout_secs: 5,
            ..Config::default()
        };
        let vault = config.vault_config();
        assert_eq!(vault.address, "http://10.9.8.7:8200");
        assert_eq!(vault.token.as_deref(), Some("s.token"));
        assert_eq!(vault.timeout, Duration::from_secs(5));
    }

    #[test]
    fn write_default_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wirey.yaml");
        Config::write_default_config(&path).unwrap();
        assert!(Config::load_from_file(&path).unwrap().is_some());
        assert!(Config::write_default_config(&path).is_err());
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_file(&dir.path().join("nope.yaml"))
            .unwrap()
            .is_none());
    }
}
