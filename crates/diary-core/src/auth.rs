use crate::{AuthError, Identity};

/// Credential checks used by request handlers before they touch a ledger.
pub trait Authenticator: Send + Sync {
    fn exists(&self, identity: &Identity) -> Result<bool, AuthError>;
    /// Fails with [`AuthError::AlreadyExists`] for a known identity.
    fn register(&self, identity: &Identity, secret: &str) -> Result<(), AuthError>;
    /// `Ok(false)` for an unknown identity or a wrong secret.
    fn validate(&self, identity: &Identity, secret: &str) -> Result<bool, AuthError>;
}
