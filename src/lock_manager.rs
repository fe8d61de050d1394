//! Shared/exclusive lock table keyed by RID, per §4.7.
//!
//! Grounded on the teacher's `ConcurrentStatus`: one `Mutex`-guarded
//! map of lock state, non-blocking acquire that reports success or
//! failure rather than parking the caller, and upgrade-in-place
//! instead of releasing and re-acquiring at a stronger mode.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::record::Rid;

pub type TxnId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
enum LockState {
    Shared(HashSet<TxnId>),
    Exclusive(TxnId),
}

pub struct LockManager {
    locks: Mutex<HashMap<Rid, LockState>>,
}

impl LockManager {
    pub fn new() -> Self {
        LockManager {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Non-blocking: succeeds immediately or fails immediately, never
    /// parks the caller. The transaction layer is responsible for
    /// retrying the whole transaction on failure.
    pub fn acquire_shared(&self, txn: TxnId, rid: Rid) -> bool {
        let mut locks = self.locks.lock().unwrap();
        match locks.get_mut(&rid) {
            None => {
                let mut holders = HashSet::new();
                holders.insert(txn);
                locks.insert(rid, LockState::Shared(holders));
                true
            }
            Some(LockState::Shared(holders)) => {
                holders.insert(txn);
                true
            }
            Some(LockState::Exclusive(holder)) => *holder == txn,
        }
    }

    /// Succeeds outright, or upgrades a shared lock already solely held
    /// by `txn` in place. Never downgrades an exclusive lock, and never
    /// grants exclusive access while another transaction holds any
    /// lock on the same RID.
    pub fn acquire_exclusive(&self, txn: TxnId, rid: Rid) -> bool {
        let mut locks = self.locks.lock().unwrap();
        match locks.get_mut(&rid) {
            None => {
                locks.insert(rid, LockState::Exclusive(txn));
                true
            }
            Some(LockState::Exclusive(holder)) => *holder == txn,
            Some(LockState::Shared(holders)) => {
                if holders.len() == 1 && holders.contains(&txn) {
                    locks.insert(rid, LockState::Exclusive(txn));
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn acquire(&self, txn: TxnId, rid: Rid, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => self.acquire_shared(txn, rid),
            LockMode::Exclusive => self.acquire_exclusive(txn, rid),
        }
    }

    /// Release whatever hold `txn` has on `rid`, if any. A no-op if
    /// `txn` is not a holder, so callers can release their full
    /// acquired set unconditionally during commit/abort.
    pub fn release(&self, txn: TxnId, rid: Rid) {
        let mut locks = self.locks.lock().unwrap();
        let remove_entry = match locks.get_mut(&rid) {
            Some(LockState::Exclusive(holder)) if *holder == txn => true,
            Some(LockState::Shared(holders)) => {
                holders.remove(&txn);
                holders.is_empty()
            }
            _ => false,
        };
        if remove_entry {
            locks.remove(&rid);
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_readers_share_a_lock() {
        let lm = LockManager::new();
        assert!(lm.acquire_shared(1, 100));
        assert!(lm.acquire_shared(2, 100));
    }

    #[test]
    fn exclusive_blocks_other_shared_and_other_exclusive() {
        let lm = LockManager::new();
        assert!(lm.acquire_exclusive(1, 100));
        assert!(!lm.acquire_shared(2, 100));
        assert!(!lm.acquire_exclusive(2, 100));
        assert!(lm.acquire_exclusive(1, 100));
    }

    #[test]
    fn sole_shared_holder_can_upgrade_to_exclusive() {
        let lm = LockManager::new();
        assert!(lm.acquire_shared(1, 100));
        assert!(lm.acquire_exclusive(1, 100));
        assert!(!lm.acquire_shared(2, 100));
    }

    #[test]
    fn upgrade_fails_when_other_readers_present() {
        let lm = LockManager::new();
        assert!(lm.acquire_shared(1, 100));
        assert!(lm.acquire_shared(2, 100));
        assert!(!lm.acquire_exclusive(1, 100));
    }

    #[test]
    fn release_frees_the_rid_for_other_transactions() {
        let lm = LockManager::new();
        assert!(lm.acquire_exclusive(1, 100));
        lm.release(1, 100);
        assert!(lm.acquire_exclusive(2, 100));
    }
}
