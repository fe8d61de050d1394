//! Strict two-phase locking, per §4.8: pre-acquire every lock a
//! transaction's queries need, run them only once all locks are held,
//! then release everything on commit or abort. No lock is ever taken
//! mid-execution, so this protocol can't deadlock.
//!
//! Grounded on the teacher's `ConcurrentStatus::add_lock` retry-or-fail
//! call pattern, generalized here into an explicit pre-acquire phase
//! instead of one lock taken per page access.

use crate::error::StorageError;
use crate::lock_manager::{LockManager, TxnId};
use crate::query::{Query, QueryResult};
use crate::record::Rid;

#[derive(Debug)]
pub enum QueryOutcome {
    Committed(Vec<QueryResult>),
    Aborted,
    IntegrityViolation(String),
}

pub struct Transaction {
    pub id: TxnId,
    queries: Vec<Query>,
}

impl Transaction {
    pub fn new(id: TxnId) -> Self {
        Transaction {
            id,
            queries: Vec::new(),
        }
    }

    pub fn queue(&mut self, query: Query) {
        self.queries.push(query);
    }

    /// Pre-acquire phase: walk the queries in order, locking every RID
    /// each one names. A failed integrity check or lock acquisition
    /// rolls back whatever was acquired so far and stops before
    /// anything executes.
    pub fn run(&self, lock_manager: &LockManager) -> QueryOutcome {
        let mut acquired: Vec<Rid> = Vec::new();

        for query in &self.queries {
            if let Err(msg) = query.check_integrity() {
                self.release_all(lock_manager, &acquired);
                return QueryOutcome::IntegrityViolation(msg);
            }

            let (mode, rids) = query.lock_plan();
            for rid in rids {
                if !lock_manager.acquire(self.id, rid, mode.clone()) {
                    self.release_all(lock_manager, &acquired);
                    return QueryOutcome::Aborted;
                }
                acquired.push(rid);
            }
        }

        let mut results = Vec::with_capacity(self.queries.len());
        for query in &self.queries {
            match query.execute() {
                Ok(result) => results.push(result),
                Err(StorageError::IntegrityViolation(msg)) => {
                    self.release_all(lock_manager, &acquired);
                    return QueryOutcome::IntegrityViolation(msg);
                }
                Err(_) => {
                    self.release_all(lock_manager, &acquired);
                    return QueryOutcome::Aborted;
                }
            }
        }

        self.release_all(lock_manager, &acquired);
        QueryOutcome::Committed(results)
    }

    fn release_all(&self, lock_manager: &LockManager, acquired: &[Rid]) {
        for rid in acquired {
            lock_manager.release(self.id, *rid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPool;
    use crate::table::Table;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn table() -> (tempfile::TempDir, Arc<Table>) {
        let dir = tempdir().unwrap();
        let pool = Arc::new(BufferPool::new(dir.path(), 64));
        let (tx, _rx) = crossbeam::channel::unbounded();
        (dir, Arc::new(Table::new("t", 2, 0, pool, tx)))
    }

    #[test]
    fn single_insert_commits() {
        let (_dir, table) = table();
        let lm = LockManager::new();
        let mut txn = Transaction::new(0);
        txn.queue(Query::Insert {
            table: table.clone(),
            values: vec![1, 10],
            rid: std::cell::Cell::new(None),
        });

        match txn.run(&lm) {
            QueryOutcome::Committed(results) => assert_eq!(results.len(), 1),
            other => panic!("expected commit, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_insert_is_integrity_violation_before_locks_taken() {
        let (_dir, table) = table();
        table.insert(&[1, 10]).unwrap();
        let lm = LockManager::new();

        let mut txn = Transaction::new(1);
        txn.queue(Query::Insert {
            table: table.clone(),
            values: vec![1, 99],
            rid: std::cell::Cell::new(None),
        });

        match txn.run(&lm) {
            QueryOutcome::IntegrityViolation(_) => {}
            other => panic!("expected integrity violation, got {:?}", other),
        }
    }

    #[test]
    fn conflicting_exclusive_locks_abort_the_later_transaction() {
        let (_dir, table) = table();
        table.insert(&[1, 10]).unwrap();
        let lm = LockManager::new();

        let rid = table.index.locate(0, 1)[0];
        // Hold the lock externally to simulate another in-flight txn.
        assert!(lm.acquire_exclusive(99, rid));

        let mut txn = Transaction::new(1);
        txn.queue(Query::Update {
            table: table.clone(),
            key: 1,
            values: vec![None, Some(20)],
        });

        match txn.run(&lm) {
            QueryOutcome::Aborted => {}
            other => panic!("expected abort, got {:?}", other),
        }
    }
}
