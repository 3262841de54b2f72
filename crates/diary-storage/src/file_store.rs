use diary_core::{DiarySnapshot, Identity, Ledger, LedgerError, LedgerStore, PersistenceError};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CHAIN_DIR: &str = "blockchains";
const DIARY_DIR: &str = "diaries";

/// Two JSON files per identity under `root`:
/// `blockchains/<id>_blockchain.json` holds every block and
/// `diaries/<id>_diary.json` holds the head block's snapshot.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chain_path(&self, identity: &Identity) -> PathBuf {
        self.root
            .join(CHAIN_DIR)
            .join(format!("{identity}_blockchain.json"))
    }

    pub fn diary_path(&self, identity: &Identity) -> PathBuf {
        self.root
            .join(DIARY_DIR)
            .join(format!("{identity}_diary.json"))
    }
}

impl LedgerStore for FileStore {
    fn load(&self, identity: &Identity) -> Result<Ledger, LedgerError> {
        let chain_path = self.chain_path(identity);
        let chain_bytes = match fs::read(&chain_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LedgerError::NotFound(identity.to_string()));
            }
            Err(e) => return Err(io_error(&chain_path, e).into()),
        };
        let mut ledger: Ledger = parse(&chain_path, &chain_bytes)?;
        if ledger.is_empty() {
            return Err(PersistenceError::EmptyChainFile(chain_path).into());
        }

        let diary_path = self.diary_path(identity);
        let diary_bytes = match fs::read(&diary_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PersistenceError::TornState {
                    chain: chain_path,
                    diary: diary_path,
                }
                .into());
            }
            Err(e) => return Err(io_error(&diary_path, e).into()),
        };
        let snapshot: DiarySnapshot = parse(&diary_path, &diary_bytes)?;
        // The diary file is the stored copy of the head snapshot; an edit to
        // it shows up as a hash mismatch on the head block.
        ledger.replace_head_snapshot(snapshot)?;

        debug!(%identity, blocks = ledger.len(), "ledger read from disk");
        Ok(ledger)
    }

    fn save(&self, identity: &Identity, ledger: &Ledger) -> Result<(), LedgerError> {
        let snapshot = ledger.snapshot()?;
        let chain_path = self.chain_path(identity);
        let diary_path = self.diary_path(identity);

        write_json_atomic(&chain_path, ledger)?;
        write_json_atomic(&diary_path, snapshot)?;

        info!(%identity, blocks = ledger.len(), "ledger saved");
        Ok(())
    }
}

fn parse<T: serde::de::DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T, PersistenceError> {
    serde_json::from_slice(bytes).map_err(|source| PersistenceError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Write to a sibling temp file, fsync, then rename over `path`.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp).map_err(|e| io_error(&tmp, e))?;
        file.write_all(&bytes).map_err(|e| io_error(&tmp, e))?;
        file.sync_all().map_err(|e| io_error(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| io_error(path, e))
}

fn io_error(path: &Path, source: io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}
