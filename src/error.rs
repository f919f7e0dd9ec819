//! Error types — store transport, store-reported failures, peer records.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireyError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid store address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("store returned {status}: {}", .errors.join("; "))]
    Store { status: u16, errors: Vec<String> },

    #[error("invalid peer: {reason}")]
    InvalidPeer { reason: String },

    #[error("invalid interface scope: {scope:?}")]
    InvalidScope { scope: String },

    #[error("corrupt peer record at {path}: {reason}")]
    CorruptRecord { path: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WireyError {
    /// HTTP status reported by the store, if this error came from one.
    pub fn store_status(&self) -> Option<u16> {
        match self {
            WireyError::Store { status, .. } => Some(*status),
            WireyError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, WireyError>;
