use crate::{
    constants::{DEFAULT_SESSION_IDLE_SECS, SESSION_TOKEN_BYTES},
    error::ApiError,
    AppState,
};
use axum::extract::FromRequestParts;
use axum::http::{header::AUTHORIZATION, request::Parts};
use diary_core::Identity;
use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry {
    identity: Identity,
    last_seen: Instant,
}

/// Bearer tokens issued at login, each bound to one identity. A token idle
/// for `idle_ttl` or longer is treated as logged out.
pub struct SessionStore {
    tokens: RwLock<HashMap<String, Entry>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SESSION_IDLE_SECS))
    }
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    pub fn open(&self, identity: Identity) -> String {
        let bytes: [u8; SESSION_TOKEN_BYTES] = rand::thread_rng().gen();
        let token = hex::encode(bytes);
        let entry = Entry {
            identity,
            last_seen: Instant::now(),
        };
        self.tokens.write().insert(token.clone(), entry);
        token
    }

    /// Identity behind a live token. Refreshes its idle timer; an expired
    /// token is dropped.
    pub fn current(&self, token: &str) -> Option<Identity> {
        let mut tokens = self.tokens.write();
        let entry = tokens.get_mut(token)?;
        if entry.last_seen.elapsed() >= self.idle_ttl {
            tokens.remove(token);
            return None;
        }
        entry.last_seen = Instant::now();
        Some(entry.identity.clone())
    }

    pub fn close(&self, token: &str) -> Option<Identity> {
        self.tokens.write().remove(token).map(|e| e.identity)
    }

    /// Whether any open session still belongs to `identity`.
    pub fn is_active(&self, identity: &Identity) -> bool {
        self.tokens.read().values().any(|e| &e.identity == identity)
    }

    /// Drop idle tokens. Returns the identities left without any session.
    pub fn purge_expired(&self) -> Vec<Identity> {
        let mut tokens = self.tokens.write();
        let mut expired = Vec::new();
        tokens.retain(|_, e| {
            let live = e.last_seen.elapsed() < self.idle_ttl;
            if !live {
                expired.push(e.identity.clone());
            }
            live
        });
        expired.sort();
        expired.dedup();
        expired.retain(|id| !tokens.values().any(|e| &e.identity == id));
        expired
    }
}

/// Request-scoped session context resolved from `Authorization: Bearer <token>`.
#[derive(Clone, Debug)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
}

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(ApiError::Unauthorized)?;
        let identity = state.sessions.current(token).ok_or(ApiError::Unauthorized)?;
        Ok(Session {
            token: token.to_string(),
            identity,
        })
    }
}
