use diary_core::{auth::Authenticator, sha256, AuthError, Hash, Identity};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use tracing::info;

const TREE_USERS: &str = "users";
const SALT_SIZE: usize = 16;

#[derive(Serialize, Deserialize)]
struct Credential {
    salt: [u8; SALT_SIZE],
    digest: Hash,
}

impl Credential {
    fn new(secret: &str) -> Self {
        let salt: [u8; SALT_SIZE] = rand::thread_rng().gen();
        Self {
            salt,
            digest: salted_digest(&salt, secret),
        }
    }

    fn matches(&self, secret: &str) -> bool {
        let candidate = salted_digest(&self.salt, secret);
        candidate
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

fn salted_digest(salt: &[u8], secret: &str) -> Hash {
    let mut bytes = Vec::with_capacity(salt.len() + secret.len());
    bytes.extend_from_slice(salt);
    bytes.extend_from_slice(secret.as_bytes());
    sha256(&bytes)
}

/// Salted SHA-256 credentials in a sled tree keyed by identity.
#[derive(Clone)]
pub struct SledCredentials {
    db: Db,
    users: sled::Tree,
}

impl SledCredentials {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AuthError> {
        let db = sled::open(path).map_err(backend)?;
        let users = db.open_tree(TREE_USERS).map_err(backend)?;
        info!("credential store opened");
        Ok(Self { db, users })
    }

    pub fn flush(&self) -> Result<(), AuthError> {
        self.db.flush().map_err(backend)?;
        Ok(())
    }
}

impl Authenticator for SledCredentials {
    fn exists(&self, identity: &Identity) -> Result<bool, AuthError> {
        self.users.contains_key(identity.as_str()).map_err(backend)
    }

    fn register(&self, identity: &Identity, secret: &str) -> Result<(), AuthError> {
        let bytes = bincode::serialize(&Credential::new(secret))
            .map_err(|e| AuthError::Backend(e.to_string()))?;
        let swapped = self
            .users
            .compare_and_swap(identity.as_str(), None::<&[u8]>, Some(bytes))
            .map_err(backend)?;
        if swapped.is_err() {
            return Err(AuthError::AlreadyExists(identity.to_string()));
        }
        self.flush()?;
        info!(%identity, "identity registered");
        Ok(())
    }

    fn validate(&self, identity: &Identity, secret: &str) -> Result<bool, AuthError> {
        let Some(stored) = self.users.get(identity.as_str()).map_err(backend)? else {
            return Ok(false);
        };
        let credential: Credential =
            bincode::deserialize(&stored).map_err(|e| AuthError::Backend(e.to_string()))?;
        Ok(credential.matches(secret))
    }
}

fn backend(e: sled::Error) -> AuthError {
    AuthError::Backend(e.to_string())
}
