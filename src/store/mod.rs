//! Store client abstraction — the hierarchical key/value service peers are
//! published to.
//!
//! Paths are plain `/`-separated strings. Listing a path returns its
//! immediate children; a child that has children of its own is returned with
//! a trailing `/`. Absence (`Ok(None)`) is distinct from failure.
//!
//! Implementations:
//! - `vault::VaultClient` — HashiCorp Vault over HTTP.
//! - `memory::MemoryStore` — in-process, same path semantics. Test tooling,
//!   hidden from the documented API.

#[doc(hidden)]
pub mod memory;
pub mod vault;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::peer::Fields;

#[doc(hidden)]
pub use memory::MemoryStore;
pub use vault::{VaultClient, VaultConfig};

/// Mount tuning parameters. TTLs are Vault duration strings, `"0"` = unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfigInput {
    #[serde(default)]
    pub default_lease_ttl: String,
    #[serde(default)]
    pub max_lease_ttl: String,
    #[serde(default)]
    pub force_no_cache: bool,
}

/// Request body for registering a new secrets engine mount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountInput {
    #[serde(rename = "type")]
    pub mount_type: String,
    pub description: String,
    pub config: MountConfigInput,
    pub local: bool,
    pub seal_wrap: bool,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

/// A mount as reported by the store's mount listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MountInfo {
    #[serde(rename = "type", default)]
    pub mount_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub seal_wrap: bool,
    /// Vault reports `null` for engines without options.
    #[serde(default)]
    pub options: Option<HashMap<String, String>>,
}

impl From<&MountInput> for MountInfo {
    fn from(input: &MountInput) -> Self {
        Self {
            mount_type: input.mount_type.clone(),
            description: input.description.clone(),
            local: input.local,
            seal_wrap: input.seal_wrap,
            options: Some(input.options.clone()),
        }
    }
}

/// Drop empty segments so `a//b/` and `a/b` name the same path.
pub(crate) fn clean_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait::async_trait]
pub trait StoreClient: Send + Sync {
    /// Registered mounts keyed by path with a trailing `/` (e.g. `wirey/`).
    async fn list_mounts(&self) -> Result<HashMap<String, MountInfo>>;

    /// Register a new mount at `path`.
    async fn mount(&self, path: &str, input: &MountInput) -> Result<()>;

    /// Write `fields` at `path`, replacing whatever was there.
    /// Returns the store's acknowledgement data, if it sent any.
    async fn write(&self, path: &str, fields: Fields) -> Result<Option<Fields>>;

    /// Immediate children of `path`, or `None` if nothing lives under it.
    async fn list(&self, path: &str) -> Result<Option<Vec<String>>>;

    async fn read(&self, path: &str) -> Result<Option<Fields>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_path_collapses_slashes() {
        assert_eq!(clean_path("/wirey/wg0//+/8=/"), "wirey/wg0/+/8=");
        assert_eq!(clean_path("wirey"), "wirey");
    }

    #[test]
    fn mount_input_serializes_vault_shape() {
        let input = MountInput {
            mount_type: "kv".into(),
            description: "d".into(),
            config: MountConfigInput {
                default_lease_ttl: "0".into(),
                max_lease_ttl: "0".into(),
                force_no_cache: false,
            },
            local: false,
            seal_wrap: false,
            options: HashMap::from([("version".to_string(), "1".to_string())]),
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["type"], "kv");
        assert_eq!(json["config"]["max_lease_ttl"], "0");
        assert_eq!(json["seal_wrap"], false);
        assert_eq!(json["options"]["version"], "1");
    }

    #[test]
    fn mount_info_tolerates_null_options() {
        let info: MountInfo = serde_json::from_value(serde_json::json!({
            "type": "system",
            "description": "system endpoints",
            "options": null,
            "accessor": "system_1234",
        }))
        .unwrap();
        assert_eq!(info.mount_type, "system");
        assert!(info.options.is_none());
    }
}
