//! Read-only audits of a [`Ledger`].
//!
//! [`verify_links`] only checks that every block points at its predecessor's
//! hash. [`verify`] additionally recomputes each block's hash from its stored
//! fields, so an edit inside a single block is caught even when the link to
//! the next block is left intact.

use crate::{chain::Ledger, pow::Difficulty, Block};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TamperReason {
    /// `prev_hash` differs from the previous block's `hash`.
    BrokenLink,
    /// Index is not the previous index plus one.
    IndexGap,
    /// First block is not index 0 with an empty `prev_hash`.
    MalformedGenesis,
    /// Stored `hash` does not match the recomputed digest.
    HashMismatch,
    DifficultyNotMet,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Integrity {
    Intact,
    Tampered { index: u64, reason: TamperReason },
}

impl Integrity {
    pub fn is_intact(&self) -> bool {
        matches!(self, Integrity::Intact)
    }
}

/// Link-only check. Empty and single-block ledgers are always intact.
pub fn verify_links(ledger: &Ledger) -> Integrity {
    for pair in ledger.blocks().windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        if cur.prev_hash != prev.hash {
            return tampered(cur, TamperReason::BrokenLink);
        }
    }
    Integrity::Intact
}

/// Links, index continuity, genesis shape, per-block hash recomputation and
/// the difficulty predicate. Stops at the first offending block.
pub fn verify(ledger: &Ledger, difficulty: &Difficulty) -> Integrity {
    let mut prev: Option<&Block> = None;
    for block in ledger.blocks() {
        match prev {
            None => {
                if block.index != 0 || !block.prev_hash.is_empty() {
                    return tampered(block, TamperReason::MalformedGenesis);
                }
            }
            Some(p) => {
                if block.prev_hash != p.hash {
                    return tampered(block, TamperReason::BrokenLink);
                }
                if block.index != p.index + 1 {
                    return tampered(block, TamperReason::IndexGap);
                }
            }
        }
        if block.compute_hash() != block.hash {
            return tampered(block, TamperReason::HashMismatch);
        }
        if !difficulty.is_met_hex(&block.hash) {
            return tampered(block, TamperReason::DifficultyNotMet);
        }
        prev = Some(block);
    }
    Integrity::Intact
}

fn tampered(block: &Block, reason: TamperReason) -> Integrity {
    warn!(index = block.index, ?reason, "ledger integrity check failed");
    Integrity::Tampered {
        index: block.index,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DiaryEntry, Identity, Miner};

    fn ledger_with(texts: &[&str]) -> Ledger {
        let miner = Miner::default();
        let mut ledger = Ledger::new();
        ledger
            .create_genesis(&Identity::parse("alice").unwrap(), &miner)
            .unwrap();
        for text in texts {
            ledger.append(*text, &miner).unwrap();
        }
        ledger
    }

    fn edit(ledger: &Ledger, f: impl FnOnce(&mut Vec<Block>)) -> Ledger {
        let mut blocks = ledger.clone().into_blocks();
        f(&mut blocks);
        Ledger::from_blocks(blocks)
    }

    #[test]
    fn empty_and_single_block_are_intact() {
        let difficulty = Difficulty::default();
        assert_eq!(verify_links(&Ledger::new()), Integrity::Intact);
        assert_eq!(verify(&Ledger::new(), &difficulty), Integrity::Intact);
        let one = ledger_with(&[]);
        assert!(verify_links(&one).is_intact());
        assert!(verify(&one, &difficulty).is_intact());
    }

    #[test]
    fn honest_chain_is_intact() {
        let ledger = ledger_with(&["one", "two", "three"]);
        assert!(verify_links(&ledger).is_intact());
        assert!(verify(&ledger, &Difficulty::default()).is_intact());
    }

    #[test]
    fn broken_link_is_detected_by_both() {
        let ledger = edit(&ledger_with(&["one", "two"]), |b| {
            b[1].prev_hash = "000deadbeef".into();
        });
        let expected = Integrity::Tampered {
            index: 1,
            reason: TamperReason::BrokenLink,
        };
        assert_eq!(verify_links(&ledger), expected);
        assert_eq!(verify(&ledger, &Difficulty::default()), expected);
    }

    #[test]
    fn content_edit_escapes_link_check_but_not_full_check() {
        let ledger = edit(&ledger_with(&["one", "two"]), |b| {
            b[2].snapshot.entries[1] = DiaryEntry {
                created_at: b[2].snapshot.entries[1].created_at,
                text: "rewritten".into(),
            };
        });
        assert!(verify_links(&ledger).is_intact());
        assert_eq!(
            verify(&ledger, &Difficulty::default()),
            Integrity::Tampered {
                index: 2,
                reason: TamperReason::HashMismatch,
            }
        );
    }

    #[test]
    fn index_gap_is_detected() {
        let ledger = edit(&ledger_with(&["one"]), |b| b[1].index = 5);
        assert_eq!(
            verify(&ledger, &Difficulty::default()),
            Integrity::Tampered {
                index: 5,
                reason: TamperReason::IndexGap,
            }
        );
    }

    #[test]
    fn malformed_genesis_is_detected() {
        let ledger = edit(&ledger_with(&[]), |b| b[0].prev_hash = "abc".into());
        assert_eq!(
            verify(&ledger, &Difficulty::default()),
            Integrity::Tampered {
                index: 0,
                reason: TamperReason::MalformedGenesis,
            }
        );
    }

    #[test]
    fn stricter_difficulty_flags_existing_blocks() {
        let ledger = ledger_with(&[]);
        let strict = Difficulty::HexPrefix("0".repeat(40));
        assert_eq!(
            verify(&ledger, &strict),
            Integrity::Tampered {
                index: 0,
                reason: TamperReason::DifficultyNotMet,
            }
        );
    }

    #[test]
    fn verdict_serializes_with_status_tag() {
        let json = serde_json::to_value(Integrity::Intact).unwrap();
        assert_eq!(json["status"], "intact");
        let json = serde_json::to_value(Integrity::Tampered {
            index: 3,
            reason: TamperReason::BrokenLink,
        })
        .unwrap();
        assert_eq!(json["status"], "tampered");
        assert_eq!(json["index"], 3);
        assert_eq!(json["reason"], "broken_link");
    }
}
