use crate::{chain::Ledger, DiaryEntry};
use chrono::{DateTime, Local};
use std::collections::HashSet;

/// Every diary entry exactly once, in append order.
///
/// Each block's snapshot already holds the whole diary, so only the head is
/// read. Entries are still deduplicated on `(created_at, text)` in case a
/// snapshot repeats one.
pub fn distinct_entries(ledger: &Ledger) -> Vec<DiaryEntry> {
    let Ok(snapshot) = ledger.snapshot() else {
        return Vec::new();
    };
    let mut seen: HashSet<(DateTime<Local>, &str)> = HashSet::with_capacity(snapshot.len());
    snapshot
        .entries
        .iter()
        .filter(|e| seen.insert((e.created_at, e.text.as_str())))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Block, DiarySnapshot};
    use chrono::TimeZone;

    fn entry(secs: i64, text: &str) -> DiaryEntry {
        DiaryEntry {
            created_at: Local.timestamp_opt(secs, 0).unwrap(),
            text: text.into(),
        }
    }

    fn block(index: u64, entries: Vec<DiaryEntry>) -> Block {
        Block {
            index,
            sealed_at: Local.timestamp_opt(1_700_000_000 + index as i64, 0).unwrap(),
            snapshot: DiarySnapshot::new(entries),
            prev_hash: String::new(),
            hash: String::new(),
            nonce: 0,
        }
    }

    #[test]
    fn empty_ledger_has_no_entries() {
        assert!(distinct_entries(&Ledger::new()).is_empty());
    }

    #[test]
    fn reads_head_snapshot_without_duplicates() {
        let a = entry(1, "marker");
        let b = entry(2, "hello");
        let c = entry(3, "again");
        let ledger = Ledger::from_blocks(vec![
            block(0, vec![a.clone()]),
            block(1, vec![a.clone(), b.clone()]),
            block(2, vec![a.clone(), b.clone(), b.clone(), c.clone()]),
        ]);
        let entries = distinct_entries(&ledger);
        assert_eq!(entries, vec![a, b, c]);
        assert_eq!(distinct_entries(&ledger), entries);
    }

    #[test]
    fn same_text_at_different_times_is_kept() {
        let ledger = Ledger::from_blocks(vec![block(0, vec![entry(1, "x"), entry(2, "x")])]);
        assert_eq!(distinct_entries(&ledger).len(), 2);
    }
}
