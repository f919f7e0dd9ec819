//! Peer model and its record form in the store.
//!
//! A peer is stored as a flat field map: `publicKey` (padded standard
//! base64 of the raw key), `IP` (canonical address text) and `endpoint`
//! (opaque). `PeerRecord` is the typed view of that map. Both directions of
//! the conversion validate at the boundary; a record that does not decode is
//! a `CorruptRecord` error, never a defaulted peer.

use std::net::IpAddr;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WireyError};

/// Generic field map as read from and written to the store.
pub type Fields = serde_json::Map<String, Value>;

pub const FIELD_PUBLIC_KEY: &str = "publicKey";
pub const FIELD_IP: &str = "IP";
pub const FIELD_ENDPOINT: &str = "endpoint";

/// Connection record for one mesh endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    pub public_key: Vec<u8>,
    pub ip: IpAddr,
    /// Advertised `host:port`, passed through untouched.
    pub endpoint: String,
}

impl Peer {
    pub fn new(public_key: impl Into<Vec<u8>>, ip: IpAddr, endpoint: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            ip,
            endpoint: endpoint.into(),
        }
    }

    /// Path segment identifying this peer within a scope.
    pub fn encoded_key(&self) -> String {
        encode_key(&self.public_key)
    }

    pub fn validate(&self) -> Result<()> {
        if self.public_key.is_empty() {
            return Err(WireyError::InvalidPeer {
                reason: "public key must not be empty".into(),
            });
        }
        Ok(())
    }
}

pub fn encode_key(key: &[u8]) -> String {
    B64.encode(key)
}

pub fn decode_key(encoded: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    B64.decode(encoded)
}

/// Typed wire form of a peer, field names as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    #[serde(rename = "IP")]
    pub ip: String,
    pub endpoint: String,
}

impl From<&Peer> for PeerRecord {
    fn from(peer: &Peer) -> Self {
        Self {
            public_key: peer.encoded_key(),
            ip: peer.ip.to_string(),
            endpoint: peer.endpoint.clone(),
        }
    }
}

impl PeerRecord {
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(FIELD_PUBLIC_KEY.into(), Value::String(self.public_key));
        fields.insert(FIELD_IP.into(), Value::String(self.ip));
        fields.insert(FIELD_ENDPOINT.into(), Value::String(self.endpoint));
        fields
    }

    /// Read a record out of a store field map. `path` is only used for errors.
    pub fn from_fields(path: &str, fields: &Fields) -> Result<Self> {
        Ok(Self {
            public_key: string_field(path, fields, FIELD_PUBLIC_KEY)?,
            ip: string_field(path, fields, FIELD_IP)?,
            endpoint: string_field(path, fields, FIELD_ENDPOINT)?,
        })
    }

    pub fn into_peer(self, path: &str) -> Result<Peer> {
        let public_key = decode_key(&self.public_key).map_err(|e| WireyError::CorruptRecord {
            path: path.to_string(),
            reason: format!("publicKey is not valid base64: {e}"),
        })?;
        let ip = self
            .ip
            .parse::<IpAddr>()
            .map_err(|_| WireyError::CorruptRecord {
                path: path.to_string(),
                reason: format!("IP {:?} is not a valid address", self.ip),
            })?;
        Ok(Peer {
            public_key,
            ip,
            endpoint: self.endpoint,
        })
    }
}

fn string_field(path: &str, fields: &Fields, name: &str) -> Result<String> {
    match fields.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(WireyError::CorruptRecord {
            path: path.to_string(),
            reason: format!("field {name} must be a string, got {other}"),
        }),
        None => Err(WireyError::CorruptRecord {
            path: path.to_string(),
            reason: format!("missing field {name}"),
        }),
    }
}

pub fn peer_to_fields(peer: &Peer) -> Fields {
    PeerRecord::from(peer).into_fields()
}

pub fn fields_to_peer(path: &str, fields: &Fields) -> Result<Peer> {
    PeerRecord::from_fields(path, fields)?.into_peer(path)
}
