//! Peer directory for mesh interfaces, stored in HashiCorp Vault.

pub mod backend;
pub mod config;
pub mod error;
pub mod peer;
pub mod store;

pub use backend::{Backend, VaultBackend};
pub use error::{Result, WireyError};
pub use peer::Peer;
