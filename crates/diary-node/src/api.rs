use crate::{constants::MAX_ENTRY_BYTES, error::ApiError, sessions::Session, AppState};
use axum::{extract::State, Json};
use diary_core::{
    registry::SharedChain, verify, Block, DiaryEntry, Identity, Integrity, Ledger,
};
use diary_storage::FileStore;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct EntryIn {
    pub content: String,
}

#[derive(Serialize, Deserialize)]
pub struct SessionOut {
    pub status: String,
    pub username: String,
    pub token: String,
}

#[derive(Serialize, Deserialize)]
pub struct DiaryOut {
    pub status: String,
    pub blocks: Vec<Block>,
    pub entries: Vec<DiaryEntry>,
}

#[derive(Serialize, Deserialize)]
pub struct AppendOut {
    pub status: String,
    pub block: Block,
    pub elapsed_ms: u64,
    pub integrity: Integrity,
}

#[derive(Serialize, Deserialize)]
pub struct StatusOut {
    pub status: String,
}

/// Run blocking ledger work (mining, file I/O, chain locks) off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
}

async fn open_chain(state: &AppState, identity: Identity) -> Result<SharedChain<FileStore>, ApiError> {
    let registry = state.registry.clone();
    blocking(move || Ok(registry.open(&identity)?)).await
}

async fn ledger_copy(state: &AppState, identity: Identity) -> Result<Ledger, ApiError> {
    let chain = open_chain(state, identity).await?;
    blocking(move || Ok(chain.lock().ledger().clone())).await
}

fn session_out(state: &AppState, identity: Identity) -> Json<SessionOut> {
    let username = identity.to_string();
    let token = state.sessions.open(identity);
    Json(SessionOut {
        status: "success".into(),
        username,
        token,
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<SessionOut>, ApiError> {
    let identity = Identity::parse(creds.username)?;
    if creds.password.is_empty() {
        return Err(ApiError::BadRequest("password must not be empty".into()));
    }
    let auth = state.auth.clone();
    let (id, password) = (identity.clone(), creds.password);
    blocking(move || Ok(auth.register(&id, &password)?)).await?;

    open_chain(&state, identity.clone()).await?;
    info!(%identity, "registered");
    Ok(session_out(&state, identity))
}

pub async fn login(
    State(state): State<AppState>,
    Json(creds): Json<Credentials>,
) -> Result<Json<SessionOut>, ApiError> {
    let identity = Identity::parse(creds.username).map_err(|_| ApiError::BadCredentials)?;
    let auth = state.auth.clone();
    let (id, password) = (identity.clone(), creds.password);
    let valid = blocking(move || Ok(auth.validate(&id, &password)?)).await?;
    if !valid {
        return Err(ApiError::BadCredentials);
    }

    open_chain(&state, identity.clone()).await?;
    info!(%identity, "logged in");
    Ok(session_out(&state, identity))
}

pub async fn logout(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<StatusOut>, ApiError> {
    state.sessions.close(&session.token);
    if !state.sessions.is_active(&session.identity) {
        let (registry, identity) = (state.registry.clone(), session.identity.clone());
        blocking(move || Ok(registry.evict(&identity))).await?;
    }
    info!(identity = %session.identity, "logged out");
    Ok(Json(StatusOut {
        status: "success".into(),
    }))
}

pub async fn show_diary(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<DiaryOut>, ApiError> {
    let ledger = ledger_copy(&state, session.identity).await?;
    let entries = diary_core::view::distinct_entries(&ledger);
    Ok(Json(DiaryOut {
        status: "success".into(),
        blocks: ledger.into_blocks(),
        entries,
    }))
}

pub async fn write_entry(
    State(state): State<AppState>,
    session: Session,
    Json(entry): Json<EntryIn>,
) -> Result<Json<AppendOut>, ApiError> {
    if entry.content.trim().is_empty() {
        return Err(ApiError::BadRequest("entry content must not be empty".into()));
    }
    if entry.content.len() > MAX_ENTRY_BYTES {
        return Err(ApiError::BadRequest(format!(
            "entry content exceeds {MAX_ENTRY_BYTES} bytes"
        )));
    }

    let chain = open_chain(&state, session.identity).await?;
    let (block, elapsed, integrity) = blocking(move || {
        let mut chain = chain.lock();
        let (block, elapsed) = chain.append(entry.content)?;
        Ok((block, elapsed, chain.verify()))
    })
    .await?;

    Ok(Json(AppendOut {
        status: "success".into(),
        block,
        elapsed_ms: elapsed.as_millis() as u64,
        integrity,
    }))
}

pub async fn validate(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Integrity>, ApiError> {
    let chain = open_chain(&state, session.identity).await?;
    let (ledger, difficulty) = blocking(move || {
        let chain = chain.lock();
        Ok((chain.ledger().clone(), chain.miner().difficulty().clone()))
    })
    .await?;
    Ok(Json(verify::verify(&ledger, &difficulty)))
}
