use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use constants::HASH_SIZE;
use sha2::{Digest, Sha256};

pub mod auth;
pub mod chain;
pub mod constants;
pub mod error;
pub mod identity;
pub mod mine;
pub mod registry;
pub mod verify;
pub mod view;

pub use chain::{Chain, Ledger, LedgerStore};
pub use error::{AuthError, DifficultyError, IdentityError, LedgerError, PersistenceError};
pub use identity::Identity;
pub use mine::{Miner, SearchStrategy};
pub use verify::{Integrity, TamperReason};

pub type Hash = [u8; HASH_SIZE];

pub fn sha256(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

/// Nanoseconds since the Unix epoch. Falls back to microsecond precision for
/// dates outside the i64 nanosecond range (before 1677 or after 2262).
pub fn epoch_nanos(at: &DateTime<Local>) -> i64 {
    at.timestamp_nanos_opt()
        .unwrap_or_else(|| at.timestamp_micros().saturating_mul(1_000))
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiaryEntry {
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Local>,
    #[serde(rename = "content")]
    pub text: String,
}

impl DiaryEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            created_at: Local::now(),
            text: text.into(),
        }
    }
}

/// The whole diary as of one block, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiarySnapshot {
    pub entries: Vec<DiaryEntry>,
}

impl DiarySnapshot {
    pub fn new(entries: Vec<DiaryEntry>) -> Self {
        Self { entries }
    }

    /// A copy of this snapshot with `entry` appended.
    pub fn with_entry(&self, entry: DiaryEntry) -> Self {
        let mut entries = Vec::with_capacity(self.entries.len() + 1);
        entries.extend(self.entries.iter().cloned());
        entries.push(entry);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&DiaryEntry> {
        self.entries.last()
    }

    /// Canonical byte form: per entry, creation time (i64 LE nanos), text
    /// length (u64 LE) and the UTF-8 text.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let body: usize = self.entries.iter().map(|e| 16 + e.text.len()).sum();
        let mut bytes = Vec::with_capacity(body);
        for entry in &self.entries {
            bytes.extend_from_slice(&epoch_nanos(&entry.created_at).to_le_bytes());
            bytes.extend_from_slice(&(entry.text.len() as u64).to_le_bytes());
            bytes.extend_from_slice(entry.text.as_bytes());
        }
        bytes
    }

    pub fn digest(&self) -> Hash {
        sha256(&self.canonical_bytes())
    }
}

/// Every field of a block that feeds its hash except the nonce.
#[derive(Clone, Debug)]
pub struct BlockHeader {
    pub index: u64,
    pub sealed_at: i64,
    pub prev_hash: String,
    pub snapshot_digest: Hash,
}

impl BlockHeader {
    pub fn new(
        index: u64,
        sealed_at: &DateTime<Local>,
        prev_hash: impl Into<String>,
        snapshot_digest: Hash,
    ) -> Self {
        Self {
            index,
            sealed_at: epoch_nanos(sealed_at),
            prev_hash: prev_hash.into(),
            snapshot_digest,
        }
    }

    pub fn hash_bytes(&self, nonce: u64) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 8 + 8 + self.prev_hash.len() + 8 + 32);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(&self.sealed_at.to_le_bytes());
        bytes.extend_from_slice(&(self.prev_hash.len() as u64).to_le_bytes());
        bytes.extend_from_slice(self.prev_hash.as_bytes());
        bytes.extend_from_slice(&nonce.to_le_bytes());
        bytes.extend_from_slice(&self.snapshot_digest);
        bytes
    }

    pub fn digest(&self, nonce: u64) -> Hash {
        sha256(&self.hash_bytes(nonce))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    #[serde(rename = "timestamp")]
    pub sealed_at: DateTime<Local>,
    #[serde(rename = "diaryEntries")]
    pub snapshot: DiarySnapshot,
    /// Empty for the genesis block.
    #[serde(rename = "prevHash")]
    pub prev_hash: String,
    pub hash: String,
    pub nonce: u64,
}

impl Block {
    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn header(&self) -> BlockHeader {
        BlockHeader::new(
            self.index,
            &self.sealed_at,
            self.prev_hash.clone(),
            self.snapshot.digest(),
        )
    }

    /// Recompute the hash from the stored fields, ignoring `self.hash`.
    pub fn compute_hash(&self) -> String {
        hex::encode(self.header().digest(self.nonce))
    }
}

pub mod pow {
    use super::Hash;
    use crate::constants::{HASH_HEX_SIZE, HASH_SIZE, POW_HEX_PREFIX};
    use crate::DifficultyError;
    use serde::{Deserialize, Serialize};

    /// Acceptance test for a candidate digest.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Difficulty {
        /// Lowercase hex encoding must start with this literal prefix.
        HexPrefix(String),
        LeadingZeroBits(u32),
    }

    impl Default for Difficulty {
        fn default() -> Self {
            Difficulty::HexPrefix(POW_HEX_PREFIX.to_string())
        }
    }

    impl Difficulty {
        /// Validated hex-prefix rule. The prefix must be non-empty lowercase hex
        /// no longer than a hex-encoded digest, otherwise no hash (or every
        /// hash) would qualify.
        pub fn hex_prefix(prefix: &str) -> Result<Self, DifficultyError> {
            if prefix.is_empty() {
                return Err(DifficultyError::EmptyPrefix);
            }
            if prefix.len() > HASH_HEX_SIZE {
                return Err(DifficultyError::PrefixTooLong { max: HASH_HEX_SIZE });
            }
            if let Some(c) = prefix.chars().find(|c| !matches!(c, '0'..='9' | 'a'..='f')) {
                return Err(DifficultyError::NotLowercaseHex(c));
            }
            Ok(Difficulty::HexPrefix(prefix.to_string()))
        }

        pub fn is_met(&self, hash: &Hash) -> bool {
            match self {
                Difficulty::HexPrefix(prefix) => hex::encode(hash).starts_with(prefix.as_str()),
                Difficulty::LeadingZeroBits(bits) => count_leading_zero_bits(hash) >= *bits,
            }
        }

        /// Same check against an already hex-encoded digest, as stored in a block.
        pub fn is_met_hex(&self, hash_hex: &str) -> bool {
            match self {
                Difficulty::HexPrefix(prefix) => hash_hex.starts_with(prefix.as_str()),
                Difficulty::LeadingZeroBits(_) => {
                    let mut h = [0u8; HASH_SIZE];
                    match hex::decode_to_slice(hash_hex, &mut h) {
                        Ok(()) => self.is_met(&h),
                        Err(_) => false,
                    }
                }
            }
        }
    }

    pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 8;
            } else {
                total += b.leading_zeros();
                break;
            }
        }
        total
    }
}
