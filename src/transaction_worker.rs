//! Drains a queue of transactions on a dedicated OS thread, retrying any
//! that abort on lock conflict, and tallies how many ultimately commit.
//!
//! Grounded on the teacher's worker-pool dispatch loop (pop a unit of
//! work, run it, loop), adapted here to retry instead of discard since
//! an aborted transaction is expected to be resubmitted rather than
//! lost. The `run`/`join` split itself mirrors the original
//! implementation's `threading.Thread`-backed worker: `run` starts the
//! background thread and returns immediately, `join` blocks until it's
//! done, so a caller can fan a batch of transactions out across many
//! workers and wait for all of them together.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::warn;

use crate::lock_manager::LockManager;
use crate::transaction::{QueryOutcome, Transaction};

/// A transaction gets this many attempts before the worker gives up on
/// it and reports it as a hard abort, so a pathological livelock
/// between two transactions can't wedge the worker forever.
const MAX_RETRIES: usize = 64;

pub struct TransactionWorker {
    queue: Mutex<VecDeque<Transaction>>,
    outcomes: Arc<Mutex<Vec<QueryOutcome>>>,
    pub committed: Arc<AtomicUsize>,
    pub aborted: Arc<AtomicUsize>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionWorker {
    pub fn new() -> Self {
        TransactionWorker {
            queue: Mutex::new(VecDeque::new()),
            outcomes: Arc::new(Mutex::new(Vec::new())),
            committed: Arc::new(AtomicUsize::new(0)),
            aborted: Arc::new(AtomicUsize::new(0)),
            handle: Mutex::new(None),
        }
    }

    pub fn add_transaction(&self, txn: Transaction) {
        self.queue.lock().unwrap().push_back(txn);
    }

    /// Spawns a background thread that runs every queued transaction to
    /// completion against `lock_manager`, retrying aborted ones until
    /// they commit, hit an integrity violation, or exhaust their
    /// retries, then returns immediately. Call `join` to wait for it.
    pub fn run(&self, lock_manager: Arc<LockManager>) {
        let mut pending: VecDeque<(Transaction, usize)> = self
            .queue
            .lock()
            .unwrap()
            .drain(..)
            .map(|t| (t, 0))
            .collect();

        let outcomes = self.outcomes.clone();
        let committed = self.committed.clone();
        let aborted = self.aborted.clone();

        let handle = std::thread::spawn(move || {
            let mut settled = Vec::new();
            while let Some((txn, retries)) = pending.pop_front() {
                match txn.run(&lock_manager) {
                    QueryOutcome::Aborted if retries < MAX_RETRIES => {
                        pending.push_back((txn, retries + 1));
                    }
                    QueryOutcome::Aborted => {
                        warn!(
                            "transaction {} aborted after {} retries, giving up",
                            txn.id, retries
                        );
                        aborted.fetch_add(1, Ordering::SeqCst);
                        settled.push(QueryOutcome::Aborted);
                    }
                    outcome @ QueryOutcome::Committed(_) => {
                        committed.fetch_add(1, Ordering::SeqCst);
                        settled.push(outcome);
                    }
                    outcome @ QueryOutcome::IntegrityViolation(_) => {
                        aborted.fetch_add(1, Ordering::SeqCst);
                        settled.push(outcome);
                    }
                }
            }
            *outcomes.lock().unwrap() = settled;
        });

        *self.handle.lock().unwrap() = Some(handle);
    }

    /// Blocks until the thread started by `run` finishes. A no-op if
    /// `run` was never called or has already been joined.
    pub fn join(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.join().expect("transaction worker thread panicked");
        }
    }

    /// The outcomes settled by the most recent `run`, in first-settled
    /// order. Empty until `join` has returned.
    pub fn take_outcomes(&self) -> Vec<QueryOutcome> {
        std::mem::take(&mut *self.outcomes.lock().unwrap())
    }

    pub fn result(&self) -> usize {
        self.committed.load(Ordering::SeqCst)
    }
}

impl Default for TransactionWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPool;
    use crate::query::Query;
    use crate::table::Table;
    use std::cell::Cell;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn committed_transactions_are_counted_in_result() {
        let dir = tempdir().unwrap();
        let pool = Arc::new(BufferPool::new(dir.path(), 64));
        let (tx, _rx) = crossbeam::channel::unbounded();
        let table = Arc::new(Table::new("t", 2, 0, pool, tx));

        let worker = TransactionWorker::new();
        for key in 0..5 {
            let mut txn = Transaction::new(key as u64);
            txn.queue(Query::Insert {
                table: table.clone(),
                values: vec![key, key * 10],
                rid: Cell::new(None),
            });
            worker.add_transaction(txn);
        }

        let lm = Arc::new(LockManager::new());
        worker.run(lm);
        worker.join();
        let outcomes = worker.take_outcomes();
        assert_eq!(outcomes.len(), 5);
        assert_eq!(worker.result(), 5);
    }
}
