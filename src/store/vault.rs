//! HashiCorp Vault HTTP client.
//!
//! Speaks the subset of the Vault API the directory needs: mount listing and
//! creation under `sys/mounts`, and logical write/list/read on KV paths.
//! A 404 on list or read means "nothing there" and maps to `Ok(None)`; every
//! other non-2xx status becomes `WireyError::Store` with Vault's `errors`.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;

use super::{clean_path, MountInfo, MountInput, StoreClient};
use crate::error::{Result, WireyError};
use crate::peer::Fields;

pub const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const ENV_ADDRESS: &str = "VAULT_ADDR";
pub const ENV_TOKEN: &str = "VAULT_TOKEN";
pub const ENV_TIMEOUT: &str = "VAULT_CLIENT_TIMEOUT";

#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub address: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl VaultConfig {
    /// Defaults overridden by `VAULT_ADDR`, `VAULT_TOKEN` and
    /// `VAULT_CLIENT_TIMEOUT` (seconds) when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(addr) = env_nonempty(ENV_ADDRESS) {
            config.address = addr;
        }
        config.token = env_nonempty(ENV_TOKEN);
        if let Some(secs) = env_nonempty(ENV_TIMEOUT) {
            match secs.parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(_) => tracing::warn!(value = %secs, "ignoring unparseable {}", ENV_TIMEOUT),
            }
        }
        config
    }

    /// Environment defaults, with `endpoint` taking precedence unless empty.
    pub fn with_endpoint(endpoint: &str) -> Self {
        let mut config = Self::from_env();
        if !endpoint.is_empty() {
            config.address = endpoint.to_string();
        }
        config
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

pub struct VaultClient {
    http: Client,
    address: String,
    base: Url,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Deserialize)]
struct SecretBody {
    #[serde(default)]
    data: Option<Fields>,
}

#[derive(Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Option<Vec<String>>,
}

impl VaultClient {
    pub fn new(config: VaultConfig) -> Result<Self> {
        let address = config.address.trim_end_matches('/').to_string();
        let base = Url::parse(&address).map_err(|e| WireyError::InvalidAddress {
            address: address.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(WireyError::InvalidAddress {
                address,
                reason: "not a hierarchical URL".to_string(),
            });
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            address,
            base,
            token: config.token,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// `<address>/v1/<path>`, each segment percent-encoded so `#`, `?` and
    /// `%` in scope names stay inside the path.
    fn url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("v1")
                .extend(clean_path(path).split('/').filter(|s| !s.is_empty()));
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, url)
            .header("X-Vault-Request", "true");
        if let Some(ref token) = self.token {
            req = req.header("X-Vault-Token", token);
        }
        req
    }

    /// Send a request and return its JSON body. Empty bodies and 204 yield
    /// `None`; so does 404 when `absent_on_404` is set.
    async fn execute(&self, req: RequestBuilder, absent_on_404: bool) -> Result<Option<Value>> {
        let response = req.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND && absent_on_404 {
            return Ok(None);
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(store_error(status, &body));
        }
        if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }
}

fn store_error(status: StatusCode, body: &str) -> WireyError {
    let errors = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.errors,
        Err(_) if body.trim().is_empty() => Vec::new(),
        Err(_) => vec![body.trim().to_string()],
    };
    WireyError::Store {
        status: status.as_u16(),
        errors,
    }
}

/// Extract `data` from a logical response body.
fn secret_data(body: Option<Value>) -> Result<Option<Fields>> {
    match body {
        Some(value) => Ok(serde_json::from_value::<SecretBody>(value)?.data),
        None => Ok(None),
    }
}

/// Mount listings put the table under `data` on current Vault versions and
/// at the top level on older ones; entries are the keys ending in `/`.
fn parse_mounts(body: Value) -> Result<HashMap<String, MountInfo>> {
    let table = match body {
        Value::Object(mut top) => match top.remove("data") {
            Some(Value::Object(data)) => data,
            _ => top,
        },
        _ => return Ok(HashMap::new()),
    };
    let mut mounts = HashMap::new();
    for (path, entry) in table {
        if !path.ends_with('/') || !entry.is_object() {
            continue;
        }
        mounts.insert(path, serde_json::from_value(entry)?);
    }
    Ok(mounts)
}

#[async_trait::async_trait]
impl StoreClient for VaultClient {
    async fn list_mounts(&self) -> Result<HashMap<String, MountInfo>> {
        let url = self.url("sys/mounts");
        let body = self.execute(self.request(Method::GET, url), false).await?;
        match body {
            Some(body) => parse_mounts(body),
            None => Ok(HashMap::new()),
        }
    }

    async fn mount(&self, path: &str, input: &MountInput) -> Result<()> {
        let url = self.url(&format!("sys/mounts/{path}"));
        self.execute(self.request(Method::POST, url).json(input), false)
            .await?;
        Ok(())
    }

    async fn write(&self, path: &str, fields: Fields) -> Result<Option<Fields>> {
        let url = self.url(path);
        let body = self
            .execute(self.request(Method::PUT, url).json(&fields), false)
            .await?;
        secret_data(body)
    }

    async fn list(&self, path: &str) -> Result<Option<Vec<String>>> {
        let mut url = self.url(path);
        url.query_pairs_mut().append_pair("list", "true");
        let body = self.execute(self.request(Method::GET, url), true).await?;
        let Some(data) = secret_data(body)? else {
            return Ok(None);
        };
        let listing: ListData = serde_json::from_value(Value::Object(data))?;
        Ok(listing.keys)
    }

    async fn read(&self, path: &str) -> Result<Option<Fields>> {
        let url = self.url(path);
        let body = self.execute(self.request(Method::GET, url), true).await?;
        secret_data(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_joins_without_double_slashes() {
        let client = VaultClient::new(VaultConfig {
            address: "http://vault.local:8200/".into(),
            ..VaultConfig::default()
        })
        .unwrap();
        assert_eq!(client.address(), "http://vault.local:8200");
        assert_eq!(
            client.url("wirey/wg0").as_str(),
            "http://vault.local:8200/v1/wirey/wg0"
        );
        assert_eq!(
            client.url("/sys/mounts").as_str(),
            "http://vault.local:8200/v1/sys/mounts"
        );
    }

    #[test]
    fn url_escapes_reserved_characters_in_segments() {
        let client = VaultClient::new(VaultConfig {
            address: "http://vault.local:8200".into(),
            ..VaultConfig::default()
        })
        .unwrap();

        let url = client.url("wirey/lab#1/QQ==");
        assert_eq!(url.path(), "/v1/wirey/lab%231/QQ==");
        assert_eq!(url.fragment(), None);

        let url = client.url("wirey/lab?x/+/8=");
        assert_eq!(url.path(), "/v1/wirey/lab%3Fx/+/8=");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn url_keeps_address_path_prefix() {
        let client = VaultClient::new(VaultConfig {
            address: "https://proxy.local/vault/".into(),
            ..VaultConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.url("sys/mounts").as_str(),
            "https://proxy.local/vault/v1/sys/mounts"
        );
    }

    #[test]
    fn unparseable_address_is_rejected() {
        for address in ["vault:8200", "not a url"] {
            let err = VaultClient::new(VaultConfig {
                address: address.into(),
                ..VaultConfig::default()
            })
            .err()
            .unwrap();
            assert!(matches!(err, WireyError::InvalidAddress { .. }), "{address}: {err}");
        }
    }

    #[test]
    fn explicit_endpoint_wins_over_default() {
        let config = VaultConfig::with_endpoint("http://10.1.1.1:8200");
        assert_eq!(config.address, "http://10.1.1.1:8200");
    }

    #[test]
    fn mounts_read_from_data_wrapper() {
        let body = json!({
            "request_id": "abc",
            "data": {
                "secret/": { "type": "kv", "description": "", "options": { "version": "1" } },
                "sys/": { "type": "system", "description": "system", "options": null }
            },
            "secret/": { "type": "kv" },
        });
        let mounts = parse_mounts(body).unwrap();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts["secret/"].options.as_ref().unwrap()["version"], "1");
        assert!(!mounts.contains_key("request_id"));
    }

    #[test]
    fn mounts_read_from_top_level() {
        let body = json!({
            "wirey/": { "type": "kv", "description": "KV exclusive for Wirey" },
            "lease_duration": 0,
        });
        let mounts = parse_mounts(body).unwrap();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts["wirey/"].mount_type, "kv");
    }

    #[test]
    fn store_error_keeps_vault_messages() {
        let err = store_error(
            StatusCode::BAD_REQUEST,
            r#"{"errors":["path is already in use at wirey/"]}"#,
        );
        match err {
            WireyError::Store { status, errors } => {
                assert_eq!(status, 400);
                assert_eq!(errors, vec!["path is already in use at wirey/".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn store_error_falls_back_to_raw_body() {
        let err = store_error(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(err.store_status(), Some(502));
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn secret_data_absent_without_body() {
        assert!(secret_data(None).unwrap().is_none());
        assert!(secret_data(Some(json!({ "data": null }))).unwrap().is_none());
        let data = secret_data(Some(json!({ "data": { "IP": "10.0.0.1" } })))
            .unwrap()
            .unwrap();
        assert_eq!(data["IP"], "10.0.0.1");
    }
}
