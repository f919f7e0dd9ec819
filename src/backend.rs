//! Peer directory backed by a key/value store.
//!
//! Every record lives at `wirey/<scope>/<base64(public key)>` inside a
//! dedicated KV v1 mount, created on first use. `join` overwrites a single
//! record; `get_peers` lists a scope and reads each record back. There is no
//! caching: each call goes to the store.

use std::collections::HashMap;

use crate::error::{Result, WireyError};
use crate::peer::{fields_to_peer, peer_to_fields, Peer};
use crate::store::{MountConfigInput, MountInput, StoreClient, VaultClient, VaultConfig};

/// Mount path owned by the directory.
pub const NAMESPACE: &str = "wirey";
const MOUNT_DESCRIPTION: &str = "KV exclusive for Wirey";

/// Registration and discovery of peers within an interface scope.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Publish `peer` under `scope`, replacing any record with the same key.
    async fn join(&self, scope: &str, peer: &Peer) -> Result<()>;

    /// Every peer registered under `scope`. Empty when nothing is registered.
    async fn get_peers(&self, scope: &str) -> Result<Vec<Peer>>;
}

pub struct VaultBackend<S: StoreClient = VaultClient> {
    client: S,
}

impl VaultBackend<VaultClient> {
    /// Connect to Vault at `endpoint` (environment defaults when empty) and
    /// make sure the directory mount exists.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let client = VaultClient::new(VaultConfig::with_endpoint(endpoint))?;
        tracing::debug!(address = %client.address(), "connecting to vault");
        Self::with_client(client).await
    }
}

impl<S: StoreClient> VaultBackend<S> {
    /// Take ownership of `client`, registering the directory mount if absent.
    pub async fn with_client(client: S) -> Result<Self> {
        let mounts = client.list_mounts().await?;
        let mount_key = format!("{NAMESPACE}/");
        if let Some(existing) = mounts.get(&mount_key) {
            tracing::debug!(
                mount = %mount_key,
                mount_type = %existing.mount_type,
                description = %existing.description,
                "directory mount present"
            );
            return Ok(Self { client });
        }

        tracing::info!(mount = %mount_key, "directory mount missing, creating it");
        client.mount(NAMESPACE, &directory_mount()).await?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &S {
        &self.client
    }

    /// Release the store handle.
    pub fn into_client(self) -> S {
        self.client
    }

    /// Collect every record key under `scope_path`, descending into folders. Keys
    /// come back relative to the scope, in store order. `None` when the scope is
    /// empty or a listed folder is gone by the time it is listed.
    async fn collect_keys(&self, scope_path: &str) -> Result<Option<Vec<String>>> {
        let Some(top) = self.client.list(scope_path).await? else {
            return Ok(None);
        };
        let mut keys = Vec::with_capacity(top.len());
        let mut pending: Vec<String> = top.into_iter().rev().collect();
        while let Some(key) = pending.pop() {
            if !key.ends_with('/') {
                keys.push(key);
                continue;
            }
            let folder_name = key.trim_end_matches('/');
            if folder_name.is_empty() {
                continue;
            }
            let folder = format!("{scope_path}/{folder_name}");
            let Some(children) = self.client.list(&folder).await? else {
                tracing::warn!(path = %folder, "key folder vanished during listing, returning no peers");
                return Ok(None);
            };
            pending.extend(children.into_iter().rev().map(|c| format!("{key}{c}")));
        }
        Ok(Some(keys))
    }
}

fn directory_mount() -> MountInput {
    MountInput {
        mount_type: "kv".to_string(),
        description: MOUNT_DESCRIPTION.to_string(),
        config: MountConfigInput {
            default_lease_ttl: "0".to_string(),
            max_lease_ttl: "0".to_string(),
            force_no_cache: false,
        },
        local: false,
        seal_wrap: false,
        options: HashMap::from([("version".to_string(), "1".to_string())]),
    }
}

/// A scope is one path segment; `/` would nest it inside another scope.
fn scope_path(scope: &str) -> Result<String> {
    if scope.is_empty() || scope.contains('/') {
        return Err(WireyError::InvalidScope {
            scope: scope.to_string(),
        });
    }
    Ok(format!("{NAMESPACE}/{scope}"))
}

/// Store path of `peer`'s record in `scope`.
pub fn record_path(scope: &str, peer: &Peer) -> Result<String> {
    Ok(format!("{}/{}", scope_path(scope)?, peer.encoded_key()))
}

#[async_trait::async_trait]
impl<S: StoreClient> Backend for VaultBackend<S> {
    async fn join(&self, scope: &str, peer: &Peer) -> Result<()> {
        peer.validate()?;
        let path = record_path(scope, peer)?;
        tracing::debug!(path = %path, ip = %peer.ip, endpoint = %peer.endpoint, "writing peer");
        let ack = self.client.write(&path, peer_to_fields(peer)).await?;
        tracing::debug!(path = %path, ack = ?ack, "peer written");
        Ok(())
    }

    async fn get_peers(&self, scope: &str) -> Result<Vec<Peer>> {
        let base = scope_path(scope)?;
        let keys = match self.collect_keys(&base).await? {
            Some(keys) if !keys.is_empty() => keys,
            _ => {
                tracing::debug!(scope = %scope, "no peers registered");
                return Ok(Vec::new());
            }
        };
        tracing::debug!(scope = %scope, count = keys.len(), "listed peer keys");

        let mut peers = Vec::with_capacity(keys.len());
        for key in keys {
            let path = format!("{base}/{key}");
            let Some(fields) = self.client.read(&path).await? else {
                // A record removed between list and read empties the whole result.
                tracing::warn!(path = %path, "peer record vanished during listing, returning no peers");
                return Ok(Vec::new());
            };
            peers.push(fields_to_peer(&path, &fields)?);
        }
        Ok(peers)
    }
}
