use crate::{Chain, Identity, Ledger, LedgerError, LedgerStore, Miner};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub type SharedChain<S> = Arc<Mutex<Chain<S>>>;

/// Per-identity cell. Its lock is held while the chain is opened, so first
/// opens of one identity serialize without touching other identities.
type Slot<S> = Arc<Mutex<Option<SharedChain<S>>>>;

/// One chain per active identity. Holding the per-chain mutex is the single
/// writer discipline for that identity. The registry-wide map lock is only
/// held for lookups, never across loading or mining.
pub struct LedgerRegistry<S: LedgerStore> {
    store: Arc<S>,
    miner: Miner,
    slots: Mutex<HashMap<Identity, Slot<S>>>,
}

impl<S: LedgerStore> LedgerRegistry<S> {
    pub fn new(store: Arc<S>, miner: Miner) -> Self {
        Self {
            store,
            miner,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    fn slot(&self, identity: &Identity) -> Slot<S> {
        Arc::clone(self.slots.lock().entry(identity.clone()).or_default())
    }

    /// Cached chain for `identity`, opening it (and mining genesis on first
    /// use) if needed.
    pub fn open(&self, identity: &Identity) -> Result<SharedChain<S>, LedgerError> {
        let slot = self.slot(identity);
        let mut cached = slot.lock();
        if let Some(chain) = cached.as_ref() {
            return Ok(Arc::clone(chain));
        }
        match Chain::open(identity.clone(), Arc::clone(&self.store), self.miner.clone()) {
            Ok(chain) => {
                let chain = Arc::new(Mutex::new(chain));
                *cached = Some(Arc::clone(&chain));
                Ok(chain)
            }
            Err(e) => {
                drop(cached);
                self.prune(identity, &slot);
                Err(e)
            }
        }
    }

    /// Remove an empty slot nobody else is waiting on.
    fn prune(&self, identity: &Identity, slot: &Slot<S>) {
        let mut slots = self.slots.lock();
        // map + caller
        let idle = Arc::strong_count(slot) == 2;
        if idle && slot.try_lock().is_some_and(|cached| cached.is_none()) {
            slots.remove(identity);
        }
    }

    pub fn get(&self, identity: &Identity) -> Option<SharedChain<S>> {
        let slot = self.slots.lock().get(identity).cloned()?;
        let chain = slot.lock().clone();
        chain
    }

    /// Consistent copy of an open ledger, safe to walk without holding a lock.
    pub fn snapshot(&self, identity: &Identity) -> Option<Ledger> {
        let chain = self.get(identity)?;
        let ledger = chain.lock().ledger().clone();
        Some(ledger)
    }

    /// Drop the cached chain if no caller still holds it. A chain that is
    /// in use, or still being opened, stays cached and `false` is returned,
    /// so a later `open` never builds a second writer for the same identity.
    pub fn evict(&self, identity: &Identity) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get(identity).cloned() else {
            return false;
        };
        let Some(mut cached) = slot.try_lock() else {
            return false;
        };
        // A count of 1 cannot grow while the slot is locked: only `open` and
        // `get` hand out new handles, and both take this lock.
        if cached.as_ref().is_some_and(|chain| Arc::strong_count(chain) > 1) {
            return false;
        }
        let dropped = cached.take().is_some();
        drop(cached);
        if Arc::strong_count(&slot) == 2 {
            slots.remove(identity);
        }
        dropped
    }

    /// Number of identities with a cached chain.
    pub fn active(&self) -> usize {
        let slots: Vec<_> = self.slots.lock().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::Difficulty;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingStore {
        ledgers: Mutex<HashMap<Identity, Ledger>>,
        saves: AtomicUsize,
    }

    impl LedgerStore for CountingStore {
        fn load(&self, identity: &Identity) -> Result<Ledger, LedgerError> {
            self.ledgers
                .lock()
                .get(identity)
                .cloned()
                .ok_or_else(|| LedgerError::NotFound(identity.to_string()))
        }

        fn save(&self, identity: &Identity, ledger: &Ledger) -> Result<(), LedgerError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.ledgers.lock().insert(identity.clone(), ledger.clone());
            Ok(())
        }
    }

    /// Parks the first load of `alice` until released.
    struct GatedStore {
        inner: CountingStore,
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl LedgerStore for GatedStore {
        fn load(&self, identity: &Identity) -> Result<Ledger, LedgerError> {
            if identity.as_str() == "alice" {
                if let Some(entered) = self.entered.lock().take() {
                    let _ = entered.send(());
                }
                let release = self.release.lock().take();
                if let Some(release) = release {
                    let _ = release.recv();
                }
            }
            self.inner.load(identity)
        }

        fn save(&self, identity: &Identity, ledger: &Ledger) -> Result<(), LedgerError> {
            self.inner.save(identity, ledger)
        }
    }

    fn id(raw: &str) -> Identity {
        Identity::parse(raw).unwrap()
    }

    #[test]
    fn concurrent_first_open_mines_one_genesis() {
        let registry = Arc::new(LedgerRegistry::new(
            Arc::new(CountingStore::default()),
            Miner::default(),
        ));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.open(&id("alice")).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.store().saves.load(Ordering::SeqCst), 1);
        assert_eq!(registry.active(), 1);
    }

    #[test]
    fn concurrent_appends_are_serialized() {
        let registry = Arc::new(LedgerRegistry::new(
            Arc::new(CountingStore::default()),
            Miner::default(),
        ));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let chain = registry.open(&id("alice")).unwrap();
                    let mut chain = chain.lock();
                    chain.append(format!("entry {i}")).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let ledger = registry.snapshot(&id("alice")).unwrap();
        assert_eq!(ledger.len(), 5);
        assert!(crate::verify::verify(&ledger, &Difficulty::default()).is_intact());
        assert_eq!(ledger.head().unwrap().snapshot.len(), 5);
    }

    #[test]
    fn identities_get_separate_ledgers() {
        let registry = LedgerRegistry::new(Arc::new(CountingStore::default()), Miner::default());
        let alice = registry.open(&id("alice")).unwrap();
        let bob = registry.open(&id("bob")).unwrap();
        alice.lock().append("only alice").unwrap();
        assert_eq!(registry.snapshot(&id("alice")).unwrap().len(), 2);
        assert_eq!(bob.lock().ledger().len(), 1);
        assert_eq!(bob.lock().entries()[0].text, "bob's diary");
    }

    #[test]
    fn evict_then_reopen_reloads_from_store() {
        let registry = LedgerRegistry::new(Arc::new(CountingStore::default()), Miner::default());
        registry.open(&id("alice")).unwrap().lock().append("kept").unwrap();
        assert!(registry.evict(&id("alice")));
        assert!(!registry.evict(&id("alice")));
        assert!(registry.snapshot(&id("alice")).is_none());
        let chain = registry.open(&id("alice")).unwrap();
        assert_eq!(chain.lock().ledger().len(), 2);
    }

    #[test]
    fn evict_keeps_a_chain_that_is_still_held() {
        let registry = LedgerRegistry::new(Arc::new(CountingStore::default()), Miner::default());
        let inflight = registry.open(&id("alice")).unwrap();
        assert!(!registry.evict(&id("alice")));
        assert_eq!(registry.active(), 1);

        let fresh = registry.open(&id("alice")).unwrap();
        assert!(Arc::ptr_eq(&inflight, &fresh));
        fresh.lock().append("after relogin").unwrap();
        inflight.lock().append("in flight").unwrap();

        let stored = registry.store().load(&id("alice")).unwrap();
        let texts: Vec<_> = stored.snapshot().unwrap().entries.iter().map(|e| e.text.clone()).collect();
        assert_eq!(texts, ["alice's diary", "after relogin", "in flight"]);

        drop((inflight, fresh));
        assert!(registry.evict(&id("alice")));
        assert_eq!(registry.active(), 0);
    }

    #[test]
    fn opening_one_identity_does_not_block_others() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let registry = Arc::new(LedgerRegistry::new(
            Arc::new(GatedStore {
                inner: CountingStore::default(),
                entered: Mutex::new(Some(entered_tx)),
                release: Mutex::new(Some(release_rx)),
            }),
            Miner::default(),
        ));

        let opener = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.open(&id("alice")).map(|_| ()))
        };
        entered_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let bob = registry.open(&id("bob")).map(|_| ());
                let evicted = registry.evict(&id("bob"));
                let _ = done_tx.send((bob.is_ok(), evicted));
            });
        }
        let outcome = done_rx.recv_timeout(Duration::from_secs(10));
        release_tx.send(()).unwrap();
        assert_eq!(outcome, Ok((true, true)));

        opener.join().unwrap().unwrap();
        assert_eq!(registry.active(), 1);
        assert!(!registry.evict(&id("bob")));
    }

    #[test]
    fn failed_open_leaves_no_slot_behind() {
        struct BrokenStore;
        impl LedgerStore for BrokenStore {
            fn load(&self, identity: &Identity) -> Result<Ledger, LedgerError> {
                Err(LedgerError::NotFound(identity.to_string()))
            }
            fn save(&self, _: &Identity, _: &Ledger) -> Result<(), LedgerError> {
                Err(LedgerError::EmptyLedger)
            }
        }
        let registry = LedgerRegistry::new(Arc::new(BrokenStore), Miner::default());
        assert!(registry.open(&id("alice")).is_err());
        assert_eq!(registry.slots.lock().len(), 0);
        assert_eq!(registry.active(), 0);
    }
}
