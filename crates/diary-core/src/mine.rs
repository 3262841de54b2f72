use crate::{
    constants::MAX_MINING_ATTEMPTS, pow::Difficulty, Block, BlockHeader, DiaryEntry,
    DiarySnapshot, Hash, Identity, LedgerError,
};
use chrono::Local;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    #[default]
    Sequential,
    /// Splits the nonce range across the rayon pool. Still yields the lowest
    /// satisfying nonce, so results match `Sequential` for the same timestamp.
    Parallel,
}

/// Bounded proof-of-work search. A block is only produced when some nonce in
/// `0..max_attempts` yields a digest that meets the difficulty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Miner {
    difficulty: Difficulty,
    max_attempts: u64,
    strategy: SearchStrategy,
}

impl Default for Miner {
    fn default() -> Self {
        Self::new(Difficulty::default(), MAX_MINING_ATTEMPTS)
    }
}

impl Miner {
    pub fn new(difficulty: Difficulty, max_attempts: u64) -> Self {
        Self {
            difficulty,
            max_attempts,
            strategy: SearchStrategy::Sequential,
        }
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn difficulty(&self) -> &Difficulty {
        &self.difficulty
    }

    pub fn max_attempts(&self) -> u64 {
        self.max_attempts
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    /// Seal `entry` on top of `previous`. The new block carries the previous
    /// snapshot plus `entry`.
    pub fn seal(&self, previous: &Block, entry: DiaryEntry) -> Result<Block, LedgerError> {
        let snapshot = previous.snapshot.with_entry(entry);
        self.search(previous.index + 1, previous.hash.clone(), snapshot)
    }

    /// Seal the first block of `identity`'s ledger, holding only the owner marker.
    pub fn seal_genesis(&self, identity: &Identity) -> Result<Block, LedgerError> {
        let snapshot = DiarySnapshot::new(vec![DiaryEntry::new(identity.genesis_marker())]);
        self.search(0, String::new(), snapshot)
    }

    fn search(
        &self,
        index: u64,
        prev_hash: String,
        snapshot: DiarySnapshot,
    ) -> Result<Block, LedgerError> {
        let sealed_at = Local::now();
        let header = BlockHeader::new(index, &sealed_at, prev_hash, snapshot.digest());
        debug!(
            index,
            max_attempts = self.max_attempts,
            strategy = ?self.strategy,
            "searching nonce"
        );

        let found = match self.strategy {
            SearchStrategy::Sequential => {
                (0..self.max_attempts).find_map(|nonce| self.try_nonce(&header, nonce))
            }
            SearchStrategy::Parallel => (0..self.max_attempts)
                .into_par_iter()
                .find_map_first(|nonce| self.try_nonce(&header, nonce)),
        };

        let Some((nonce, hash)) = found else {
            warn!(index, attempts = self.max_attempts, "nonce range exhausted");
            return Err(LedgerError::MiningExhausted {
                attempts: self.max_attempts,
            });
        };

        let hash = hex::encode(hash);
        info!(index, nonce, hash = %hash, "mined block");

        Ok(Block {
            index,
            sealed_at,
            snapshot,
            prev_hash: header.prev_hash,
            hash,
            nonce,
        })
    }

    fn try_nonce(&self, header: &BlockHeader, nonce: u64) -> Option<(u64, Hash)> {
        let hash = header.digest(nonce);
        self.difficulty.is_met(&hash).then_some((nonce, hash))
    }
}
