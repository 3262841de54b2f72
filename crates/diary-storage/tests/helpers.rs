#![allow(dead_code)]

use diary_core::{Identity, Miner};
use diary_storage::{FileStore, SledCredentials};
use tempfile::{tempdir, TempDir};

pub fn identity(raw: &str) -> Identity {
    Identity::parse(raw).expect("valid identity")
}

pub fn create_temp_store() -> (TempDir, FileStore) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = FileStore::new(temp_dir.path());
    (temp_dir, store)
}

pub fn create_temp_credentials() -> (TempDir, SledCredentials) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let creds = SledCredentials::open(temp_dir.path().join("passwd"))
        .expect("Failed to open credential store");
    (temp_dir, creds)
}

pub fn miner() -> Miner {
    Miner::default()
}
