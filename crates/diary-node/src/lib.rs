//! HTTP surface of the diary ledger: registration, login sessions, writing
//! entries and auditing the chain.

pub mod api;
mod constants;
pub mod error;
pub mod sessions;

use axum::{
    routing::{get, post},
    Json, Router,
};
use diary_core::{auth::Authenticator, registry::LedgerRegistry, Miner};
use diary_storage::{FileStore, SledCredentials};
use serde::Serialize;
use std::{path::Path, sync::Arc, time::Duration};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use error::ApiError;
pub use sessions::{Session, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<LedgerRegistry<FileStore>>,
    pub auth: Arc<dyn Authenticator>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    /// Ledgers under `<data_dir>/blockchains` and `<data_dir>/diaries`,
    /// credentials in a sled database at `<data_dir>/passwd`.
    pub fn open(data_dir: &Path, miner: Miner) -> anyhow::Result<Self> {
        let store = Arc::new(FileStore::new(data_dir));
        let auth = SledCredentials::open(data_dir.join(constants::CREDENTIALS_DIR))?;
        Ok(Self {
            registry: Arc::new(LedgerRegistry::new(store, miner)),
            auth: Arc::new(auth),
            sessions: Arc::new(SessionStore::default()),
        })
    }

    /// Replace the session store with one that expires tokens after `idle`.
    pub fn with_session_idle(mut self, idle: Duration) -> Self {
        self.sessions = Arc::new(SessionStore::new(idle));
        self
    }
}

/// Drop idle sessions and evict the cached chains of identities left without
/// one. Returns how many chains were evicted.
pub async fn expire_idle_sessions(state: &AppState) -> Result<usize, ApiError> {
    let idle = state.sessions.purge_expired();
    if idle.is_empty() {
        return Ok(0);
    }
    let registry = state.registry.clone();
    let evicted = tokio::task::spawn_blocking(move || {
        idle.iter().filter(|identity| registry.evict(identity)).count()
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(evicted, "idle sessions expired");
    Ok(evicted)
}

/// Run [`expire_idle_sessions`] every `every` until the runtime shuts down.
pub fn spawn_session_reaper(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = expire_idle_sessions(&state).await {
                warn!(error = %e, "session sweep failed");
            }
        }
    })
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/healthz", get(|| async { Json(Health { status: "ok" }) }))
        .route("/register", post(api::register))
        .route("/login", post(api::login))
        .route("/logout", post(api::logout))
        .route("/diary", get(api::show_diary).post(api::write_entry))
        .route("/validate", get(api::validate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
