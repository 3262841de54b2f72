use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by ledger operations. `Tampered` is deliberately absent:
/// verification returns an [`crate::verify::Integrity`] value instead.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no nonce in 0..{attempts} satisfies the difficulty predicate")]
    MiningExhausted { attempts: u64 },

    #[error("ledger has no blocks")]
    EmptyLedger,

    #[error("no ledger stored for identity `{0}`")]
    NotFound(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed content in {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("chain file {} exists but diary file {} is missing", .chain.display(), .diary.display())]
    TornState { chain: PathBuf, diary: PathBuf },

    #[error("chain file {} holds no blocks", .0.display())]
    EmptyChainFile(PathBuf),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity must not be empty")]
    Empty,
    #[error("identity is longer than {max} characters")]
    TooLong { max: usize },
    #[error("identity contains invalid character {0:?}")]
    InvalidChar(char),
    #[error("identity must not start with '.'")]
    LeadingDot,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DifficultyError {
    #[error("difficulty prefix must not be empty")]
    EmptyPrefix,
    #[error("difficulty prefix is longer than {max} hex digits")]
    PrefixTooLong { max: usize },
    #[error("difficulty prefix contains {0:?}; only lowercase hex digits can match a digest")]
    NotLowercaseHex(char),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity `{0}` is already registered")]
    AlreadyExists(String),
    #[error("credential backend: {0}")]
    Backend(String),
}
