//! Durable backends for the diary ledger: per-identity JSON files for chains
//! and a sled tree for credentials.

pub mod file_store;
pub mod sled_store;

pub use file_store::FileStore;
pub use sled_store::SledCredentials;
