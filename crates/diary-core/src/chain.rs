use crate::{
    verify::{self, Integrity},
    view, Block, DiaryEntry, DiarySnapshot, Identity, LedgerError, Miner,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Ordered blocks of one identity's diary. Blocks are only ever appended.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    blocks: Vec<Block>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap blocks read back from storage. No validation happens here; run the
    /// verifier to audit them.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn head(&self) -> Result<&Block, LedgerError> {
        self.blocks.last().ok_or(LedgerError::EmptyLedger)
    }

    pub(crate) fn head_mut(&mut self) -> Result<&mut Block, LedgerError> {
        self.blocks.last_mut().ok_or(LedgerError::EmptyLedger)
    }

    /// The cumulative diary as of the head block.
    pub fn snapshot(&self) -> Result<&DiarySnapshot, LedgerError> {
        self.head().map(|b| &b.snapshot)
    }

    /// Mine the genesis block for `identity`. Idempotent: a ledger that
    /// already has blocks returns its existing genesis without mining.
    pub fn create_genesis(
        &mut self,
        identity: &Identity,
        miner: &Miner,
    ) -> Result<Block, LedgerError> {
        if let Some(existing) = self.blocks.first() {
            return Ok(existing.clone());
        }
        let genesis = miner.seal_genesis(identity)?;
        self.blocks.push(genesis.clone());
        Ok(genesis)
    }

    /// Mine a block carrying `text` on top of the head without touching the ledger.
    pub fn seal_next(&self, text: impl Into<String>, miner: &Miner) -> Result<Block, LedgerError> {
        miner.seal(self.head()?, DiaryEntry::new(text))
    }

    /// In-memory append. Storage-backed callers go through [`Chain::append`].
    pub fn append(
        &mut self,
        text: impl Into<String>,
        miner: &Miner,
    ) -> Result<(Block, Duration), LedgerError> {
        let started = Instant::now();
        let block = self.seal_next(text, miner)?;
        self.blocks.push(block.clone());
        Ok((block, started.elapsed()))
    }

    /// Replace the head block's snapshot. Used by storage adapters that keep
    /// the head snapshot in a separate file.
    pub fn replace_head_snapshot(&mut self, snapshot: DiarySnapshot) -> Result<(), LedgerError> {
        self.head_mut()?.snapshot = snapshot;
        Ok(())
    }
}

/// Persistence contract for ledgers. Lives here so storage crates can depend
/// on the core without a cycle.
pub trait LedgerStore: Send + Sync {
    /// `LedgerError::NotFound` when nothing has been saved for `identity`.
    fn load(&self, identity: &Identity) -> Result<Ledger, LedgerError>;
    /// Rewrite the whole stored ledger.
    fn save(&self, identity: &Identity, ledger: &Ledger) -> Result<(), LedgerError>;
}

/// One identity's ledger bound to its store. Every mutation is persisted
/// before it becomes visible in memory.
pub struct Chain<S: LedgerStore> {
    identity: Identity,
    ledger: Ledger,
    store: Arc<S>,
    miner: Miner,
}

impl<S: LedgerStore> Chain<S> {
    /// Load the stored ledger, or mine and persist a genesis block when none exists.
    pub fn open(identity: Identity, store: Arc<S>, miner: Miner) -> Result<Self, LedgerError> {
        let ledger = match store.load(&identity) {
            Ok(ledger) => {
                info!(%identity, blocks = ledger.len(), "ledger loaded");
                ledger
            }
            Err(LedgerError::NotFound(_)) => {
                let mut ledger = Ledger::new();
                ledger.create_genesis(&identity, &miner)?;
                store.save(&identity, &ledger)?;
                info!(%identity, "genesis block created");
                ledger
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            identity,
            ledger,
            store,
            miner,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn head(&self) -> Result<&Block, LedgerError> {
        self.ledger.head()
    }

    /// Seal `text` into a new block and persist the extended ledger. On any
    /// failure the in-memory ledger is left exactly as it was.
    pub fn append(&mut self, text: impl Into<String>) -> Result<(Block, Duration), LedgerError> {
        let started = Instant::now();
        let block = self.ledger.seal_next(text, &self.miner)?;
        let elapsed = started.elapsed();

        self.ledger.blocks.push(block.clone());
        if let Err(e) = self.store.save(&self.identity, &self.ledger) {
            self.ledger.blocks.pop();
            warn!(identity = %self.identity, error = %e, "save failed, append rolled back");
            return Err(e);
        }
        Ok((block, elapsed))
    }

    /// Full verification against this chain's difficulty.
    pub fn verify(&self) -> Integrity {
        verify::verify(&self.ledger, self.miner.difficulty())
    }

    pub fn entries(&self) -> Vec<DiaryEntry> {
        view::distinct_entries(&self.ledger)
    }
}
