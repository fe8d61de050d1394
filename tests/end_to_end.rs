//! End-to-end scenarios exercising the public surface together:
//! database, table, transaction, and the lock manager.

use std::sync::Arc;
use std::thread;

use lstore_rs::database::Database;
use lstore_rs::lock_manager::LockManager;
use lstore_rs::query::Query;
use lstore_rs::transaction::{QueryOutcome, Transaction};
use lstore_rs::transaction_worker::TransactionWorker;

#[test]
fn insert_then_select_round_trips_through_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();
    let table = db.create_table("students", 3, 0).unwrap();

    table.insert(&[1, 90, 10]).unwrap();
    table.insert(&[2, 80, 11]).unwrap();

    let rows = table.select(2, 0, &[1, 1, 1]).unwrap();
    assert_eq!(rows, vec![vec![2, 80, 11]]);
}

#[test]
fn update_chain_then_delete_leaves_no_trace_in_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();
    let table = db.create_table("students", 2, 0).unwrap();

    table.insert(&[1, 70]).unwrap();
    table.update(1, &[None, Some(75)]).unwrap();
    table.update(1, &[None, Some(80)]).unwrap();

    assert_eq!(table.select(1, 0, &[0, 1]).unwrap(), vec![vec![80]]);
    assert_eq!(
        table.select_version(1, 0, &[0, 1], -1).unwrap(),
        vec![vec![75]]
    );
    assert_eq!(
        table.select_version(1, 0, &[0, 1], -2).unwrap(),
        vec![vec![70]]
    );

    assert!(table.delete(1).unwrap());
    assert!(table.select(1, 0, &[0, 1]).unwrap().is_empty());
    assert!(table.index.locate(0, 1).is_empty());
}

#[test]
fn concurrent_readers_share_the_same_lock_without_blocking() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();
    let table = db.create_table("accounts", 2, 0).unwrap();
    table.insert(&[1, 500]).unwrap();

    let lm = Arc::new(LockManager::new());
    let mut handles = Vec::new();
    for reader_id in 0..8u64 {
        let table = table.clone();
        let lm = lm.clone();
        handles.push(thread::spawn(move || {
            let mut txn = Transaction::new(reader_id);
            txn.queue(Query::Select {
                table,
                key: 1,
                search_col: 0,
                proj: vec![0, 1],
            });
            txn.run(&lm)
        }));
    }

    for handle in handles {
        match handle.join().unwrap() {
            QueryOutcome::Committed(results) => assert_eq!(results.len(), 1),
            other => panic!("expected every reader to commit, got {:?}", other),
        }
    }
}

#[test]
fn transaction_worker_retries_a_transaction_blocked_by_a_held_lock() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();
    let table = db.create_table("accounts", 2, 0).unwrap();
    table.insert(&[1, 500]).unwrap();

    let lm = Arc::new(LockManager::new());
    let rid = table.index.locate(0, 1)[0];
    assert!(lm.acquire_exclusive(999, rid));

    let worker = TransactionWorker::new();
    let mut txn = Transaction::new(1);
    txn.queue(Query::Update {
        table: table.clone(),
        key: 1,
        values: vec![None, Some(600)],
    });
    worker.add_transaction(txn);

    lm.release(999, rid);
    worker.run(lm);
    worker.join();
    let outcomes = worker.take_outcomes();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], QueryOutcome::Committed(_)));
    assert_eq!(worker.result(), 1);
}

#[test]
fn closing_and_reopening_the_database_preserves_committed_data() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = Database::open(dir.path()).unwrap();
        let table = db.create_table("accounts", 2, 0).unwrap();
        table.insert(&[1, 500]).unwrap();
        table.insert(&[2, 250]).unwrap();
        table.update(2, &[None, Some(300)]).unwrap();
        db.close().unwrap();
    }

    let db = Database::open(dir.path()).unwrap();
    let table = db.get_table("accounts").unwrap();
    assert_eq!(table.sum(1, 2, 1).unwrap(), Some(800));
}
