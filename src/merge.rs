//! Background merge engine, per §4.9: a dedicated worker thread drains
//! a FIFO of `(page_range, base_page)` entries and rebuilds each base
//! page from its tail lineage, so repeated reads of an often-updated
//! row stop paying for a long indirection walk.
//!
//! Grounded on the teacher's dedicated-thread dispatch loop (a
//! `thread::spawn` pulling off a channel until it closes) and on
//! `crossbeam::channel` for the bounded FIFO itself, since the teacher
//! only ever queues work through `std::sync::mpsc`-style channels for
//! its own background flush thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Receiver;
use log::{debug, warn};

use crate::buffer_pool::PagePath;
use crate::consts::{INDIRECTION_COL, INDIRECTION_NULL, RID_COL};
use crate::error::StorageResult;
use crate::table::Table;

pub type MergeJob = (usize, usize);

/// Spawns the merge worker thread. It runs until `receiver`'s sending
/// half (the table's `merge_sender`) is dropped.
pub fn spawn_worker(table: Arc<Table>, receiver: Receiver<MergeJob>) -> JoinHandle<()> {
    thread::spawn(move || {
        for (page_range, page) in receiver.iter() {
            if let Err(e) = merge_base_page(&table, page_range, page) {
                warn!(
                    "merge of page_range {} page {} failed: {}",
                    page_range, page, e
                );
            }
        }
    })
}

/// Rebuild one base page in place: for every row whose indirection
/// points past the page's current TPS, walk to that latest tail
/// record and copy its user-column values into the base row, then
/// raise the TPS to the highest RID consolidated this pass. Rows
/// already tombstoned (`RID_COL == NULL_INDIRECTION`) are left alone.
fn merge_base_page(table: &Table, page_range: usize, page: usize) -> StorageResult<()> {
    let total_cols = table.total_cols();

    let rid_snapshot = table
        .buffer_pool()
        .get_physical_page_no_add(&PagePath::new(&table.name, page_range, page, RID_COL))?;
    let num_records = rid_snapshot.num_records() as usize;
    let old_tps = rid_snapshot.tps();

    let mut columns = Vec::with_capacity(total_cols);
    for col in 0..total_cols {
        columns.push(
            table
                .buffer_pool()
                .get_physical_page_no_add(&PagePath::new(&table.name, page_range, page, col))?,
        );
    }

    let mut new_tps = old_tps;
    let mut consolidated = 0usize;

    for offset in 0..num_records {
        let base_rid = columns[RID_COL].read(offset);
        if base_rid == INDIRECTION_NULL {
            continue;
        }
        let indirection = columns[INDIRECTION_COL].read(offset);
        if indirection == INDIRECTION_NULL || indirection <= old_tps {
            continue;
        }

        let latest_loc = match table.location(indirection) {
            Some(loc) => loc,
            None => continue,
        };
        let latest = table.read_record_at(&latest_loc)?;
        for col in 0..total_cols {
            if col == RID_COL || col == INDIRECTION_COL {
                continue;
            }
            columns[col].write(latest.columns[col], offset);
        }
        if indirection > new_tps {
            new_tps = indirection;
        }
        consolidated += 1;
    }

    if consolidated == 0 {
        return Ok(());
    }

    columns[RID_COL].set_tps(new_tps);

    for (col, page_copy) in columns.into_iter().enumerate() {
        table.buffer_pool().replace_page_atomically(
            &PagePath::new(&table.name, page_range, page, col),
            &page_copy,
        )?;
    }

    debug!(
        "merged page_range {} page {}: {} rows consolidated, tps now {}",
        page_range, page, consolidated, new_tps
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPool;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn merge_consolidates_latest_tail_value_into_base_page() {
        let dir = tempdir().unwrap();
        let pool = Arc::new(BufferPool::new(dir.path(), 64));
        let (tx, rx) = crossbeam::channel::unbounded();
        let table = Arc::new(Table::new("t", 2, 0, pool, tx));

        table.insert(&[1, 10]).unwrap();
        table.update(1, &[None, Some(99)]).unwrap();

        merge_base_page(&table, 0, 0).unwrap();
        let _ = rx.try_recv();

        // After merge the base row itself reflects the latest tail value.
        let base_rid = table.index.locate(0, 1)[0];
        let loc = table.location(base_rid).unwrap();
        let base_record = table.read_record_at(&loc).unwrap();
        assert_eq!(base_record.user_column(1), 99);

        assert_eq!(table.select(1, 0, &[0, 1]).unwrap(), vec![vec![99]]);
    }

    #[test]
    fn merge_is_idempotent_once_tps_catches_up() {
        let dir = tempdir().unwrap();
        let pool = Arc::new(BufferPool::new(dir.path(), 64));
        let (tx, _rx) = crossbeam::channel::unbounded();
        let table = Arc::new(Table::new("t", 2, 0, pool, tx));

        table.insert(&[1, 10]).unwrap();
        table.update(1, &[None, Some(99)]).unwrap();

        merge_base_page(&table, 0, 0).unwrap();
        merge_base_page(&table, 0, 0).unwrap();

        assert_eq!(table.select(1, 0, &[0, 1]).unwrap(), vec![vec![99]]);
    }
}
