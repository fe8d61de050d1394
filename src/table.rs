//! The table: owns the page-ranges metadata, the page directory, the
//! RID/transaction-id counters, and the column index, and implements
//! the write/versioning path of §4.6 on top of the buffer pool.
//!
//! Grounded on the teacher's `HeapTable`/`BTreeTable` (owns a `File`,
//! hands page fetches to the buffer pool, tracks a row scheme) plus
//! `ConcurrentStatus` for the "short critical section behind one
//! mutex" style of the insert/update locks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use bit_vec::BitVec;
use crossbeam::channel::Sender;
use log::{debug, info};

use crate::buffer_pool::{BufferPool, PagePath};
use crate::consts::{
    CREATE_INDICES_CONDITION, INDIRECTION_NULL, MERGE_CONDITION, NUM_METADATA_COLS, RID_COL,
    SCHEMA_ENCODING_COL,
};
use crate::error::{StorageError, StorageResult};
use crate::index::ColumnIndex;
use crate::page_range::PageRange;
use crate::record::{Record, Rid};

/// One row's physical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub page_range: usize,
    pub page: usize,
    pub offset: usize,
}

/// A projected row: the subset of user-column values a `select`/`sum`
/// call asked for, in column order.
pub type ProjectedRow = Vec<i64>;

pub struct Table {
    pub name: String,
    pub num_user_columns: usize,
    pub key_col: usize,

    buffer_pool: std::sync::Arc<BufferPool>,
    page_ranges: Mutex<Vec<PageRange>>,
    page_directory: Mutex<HashMap<Rid, Location>>,
    rid_counter: AtomicI64,
    txn_counter: AtomicU64,
    num_records: AtomicI64,

    pub index: ColumnIndex,

    insert_lock: Mutex<()>,
    update_lock: Mutex<()>,

    merge_sender: Sender<(usize, usize)>,
}

impl Table {
    pub fn new(
        name: &str,
        num_user_columns: usize,
        key_col: usize,
        buffer_pool: std::sync::Arc<BufferPool>,
        merge_sender: Sender<(usize, usize)>,
    ) -> Self {
        Table {
            name: name.to_string(),
            num_user_columns,
            key_col,
            buffer_pool,
            page_ranges: Mutex::new(Vec::new()),
            page_directory: Mutex::new(HashMap::new()),
            rid_counter: AtomicI64::new(0),
            txn_counter: AtomicU64::new(0),
            num_records: AtomicI64::new(0),
            index: ColumnIndex::new(num_user_columns, key_col),
            insert_lock: Mutex::new(()),
            update_lock: Mutex::new(()),
            merge_sender,
        }
    }

    pub fn total_cols(&self) -> usize {
        NUM_METADATA_COLS + self.num_user_columns
    }

    pub fn num_records(&self) -> i64 {
        self.num_records.load(Ordering::SeqCst)
    }

    pub fn next_transaction_id(&self) -> u64 {
        self.txn_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn buffer_pool(&self) -> &std::sync::Arc<BufferPool> {
        &self.buffer_pool
    }

    fn next_timestamp(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_micros() as i64
    }

    pub(crate) fn location(&self, rid: Rid) -> Option<Location> {
        self.page_directory.lock().unwrap().get(&rid).copied()
    }

    pub(crate) fn page_range_snapshot(&self, pr_num: usize) -> Option<PageRange> {
        self.page_ranges
            .lock()
            .unwrap()
            .iter()
            .find(|pr| pr.pr_num == pr_num)
            .copied()
    }

    fn page_has_capacity(&self, pr_num: usize, page_num: usize) -> StorageResult<bool> {
        let rid_page = self
            .buffer_pool
            .get_physical_page(&PagePath::new(&self.name, pr_num, page_num, RID_COL))?;
        let has_capacity = rid_page.lock().unwrap().has_capacity();
        Ok(has_capacity)
    }

    fn allocate_logical_page(&self, pr_num: usize, page_num: usize) -> StorageResult<()> {
        for col in 0..self.total_cols() {
            self.buffer_pool
                .create_physical_page(&PagePath::new(&self.name, pr_num, page_num, col))?;
        }
        Ok(())
    }

    fn ensure_insertable_base_page(&self) -> StorageResult<(usize, usize)> {
        let mut page_ranges = self.page_ranges.lock().unwrap();

        if page_ranges.is_empty() {
            page_ranges.push(PageRange::new(0));
        }

        let mut pr_idx = page_ranges.len() - 1;
        let needs_new_base_page = match page_ranges[pr_idx].current_base_page() {
            None => true,
            Some(p) => !self.page_has_capacity(page_ranges[pr_idx].pr_num, p)?,
        };

        if needs_new_base_page {
            if page_ranges[pr_idx].base_pages_full() {
                let new_pr_num = page_ranges.len();
                page_ranges.push(PageRange::new(new_pr_num));
                pr_idx = page_ranges.len() - 1;
            }
            let page_num = page_ranges[pr_idx]
                .insert_base_page()
                .expect("a fresh or non-full range always has base-page capacity");
            self.allocate_logical_page(page_ranges[pr_idx].pr_num, page_num)?;
        }

        let pr_num = page_ranges[pr_idx].pr_num;
        let page_num = page_ranges[pr_idx].current_base_page().unwrap();
        Ok((pr_num, page_num))
    }

    fn ensure_insertable_tail_page(&self, pr_num: usize) -> StorageResult<usize> {
        let mut page_ranges = self.page_ranges.lock().unwrap();
        let idx = page_ranges
            .iter()
            .position(|pr| pr.pr_num == pr_num)
            .ok_or_else(|| StorageError::not_found(format!("page range {}", pr_num)))?;

        let needs_new = match page_ranges[idx].current_tail_page() {
            None => true,
            Some(p) => !self.page_has_capacity(pr_num, p)?,
        };

        if needs_new {
            let page_num = page_ranges[idx].insert_tail_page();
            self.allocate_logical_page(pr_num, page_num)?;
        }

        Ok(page_ranges[idx].current_tail_page().unwrap())
    }

    /// Pre-increment `num_records` on every column of the logical page,
    /// reserving the next offset ahead of writing its value.
    fn reserve_offset(&self, pr_num: usize, page_num: usize) -> StorageResult<usize> {
        let rid_page = self
            .buffer_pool
            .get_physical_page(&PagePath::new(&self.name, pr_num, page_num, RID_COL))?;
        let offset = {
            let mut page = rid_page.lock().unwrap();
            let offset = page.num_records() as usize;
            if offset >= page.capacity() {
                return Err(StorageError::capacity(format!(
                    "page ({}, {}) is full",
                    pr_num, page_num
                )));
            }
            page.set_num_records(offset as i64 + 1);
            offset
        };

        for col in 0..self.total_cols() {
            if col == RID_COL {
                continue;
            }
            let p = self
                .buffer_pool
                .get_physical_page(&PagePath::new(&self.name, pr_num, page_num, col))?;
            p.lock().unwrap().set_num_records(offset as i64 + 1);
        }
        Ok(offset)
    }

    fn write_record_at(&self, loc: &Location, record: &Record) -> StorageResult<()> {
        for col in 0..self.total_cols() {
            let p = self.buffer_pool.get_physical_page(&PagePath::new(
                &self.name,
                loc.page_range,
                loc.page,
                col,
            ))?;
            p.lock().unwrap().write(record.columns[col], loc.offset);
        }
        Ok(())
    }

    pub(crate) fn read_record_at(&self, loc: &Location) -> StorageResult<Record> {
        let mut columns = Vec::with_capacity(self.total_cols());
        for col in 0..self.total_cols() {
            let p = self.buffer_pool.get_physical_page(&PagePath::new(
                &self.name,
                loc.page_range,
                loc.page,
                col,
            ))?;
            columns.push(p.lock().unwrap().read(loc.offset));
        }
        Ok(Record { columns })
    }

    fn read_tps(&self, loc: &Location) -> StorageResult<i64> {
        let p = self.buffer_pool.get_physical_page(&PagePath::new(
            &self.name,
            loc.page_range,
            loc.page,
            RID_COL,
        ))?;
        let tps = p.lock().unwrap().tps();
        Ok(tps)
    }

    // ---- §4.4 Table and page directory -----------------------------

    pub fn get_record(&self, rid: Rid) -> StorageResult<Option<Record>> {
        self.get_record_version(rid, 0)
    }

    pub fn get_record_column(&self, rid: Rid, col: usize) -> StorageResult<Option<i64>> {
        self.get_record_column_version(rid, 0, col)
    }

    pub fn get_record_column_version(
        &self,
        rid: Rid,
        version: i64,
        col: usize,
    ) -> StorageResult<Option<i64>> {
        Ok(self
            .get_record_version(rid, version)?
            .map(|r| r.user_column(col)))
    }

    /// `version == 0` is the latest value; `version == -k` walks `k`
    /// hops back along the indirection chain. If the chain terminates
    /// (reaches `NULL_INDIRECTION`, or loops back to `rid` itself)
    /// before `k` hops, the oldest reachable version is returned.
    pub fn get_record_version(&self, rid: Rid, version: i64) -> StorageResult<Option<Record>> {
        let base_loc = match self.location(rid) {
            Some(l) => l,
            None => return Ok(None),
        };
        let base_record = self.read_record_at(&base_loc)?;
        let indirection = base_record.indirection();

        if indirection == INDIRECTION_NULL {
            return Ok(Some(base_record));
        }

        if version == 0 {
            let tps = self.read_tps(&base_loc)?;
            if indirection <= tps {
                return Ok(Some(base_record));
            }
        }

        let hops = (-version).max(0) as usize;
        let mut current_rid = indirection;
        let mut current_record = match self.location(current_rid) {
            Some(loc) => self.read_record_at(&loc)?,
            None => return Ok(Some(base_record)),
        };

        for _ in 0..hops {
            let next = current_record.indirection();
            if next == INDIRECTION_NULL || next == rid {
                break;
            }
            match self.location(next) {
                Some(loc) => {
                    current_rid = next;
                    current_record = self.read_record_at(&loc)?;
                }
                None => break,
            }
        }
        let _ = current_rid;
        Ok(Some(current_record))
    }

    fn change_indirection(&self, base_rid: Rid, new_indirection: Rid) -> StorageResult<()> {
        let loc = self
            .location(base_rid)
            .ok_or_else(|| StorageError::not_found(format!("rid {}", base_rid)))?;
        let p = self.buffer_pool.get_physical_page(&PagePath::new(
            &self.name,
            loc.page_range,
            loc.page,
            crate::consts::INDIRECTION_COL,
        ))?;
        p.lock().unwrap().write(new_indirection, loc.offset);
        Ok(())
    }

    /// Set the bit for every user column with a non-null update value,
    /// OR'd with the previous mask.
    fn update_schema_encoding(
        &self,
        base_rid: Rid,
        old_mask: i64,
        updates: &[Option<i64>],
    ) -> StorageResult<i64> {
        let mut bits = BitVec::from_elem(updates.len(), false);
        for i in 0..updates.len() {
            if old_mask & (1 << i) != 0 {
                bits.set(i, true);
            }
        }
        for (i, u) in updates.iter().enumerate() {
            if u.is_some() {
                bits.set(i, true);
            }
        }
        let new_mask = bits
            .iter()
            .enumerate()
            .fold(0i64, |acc, (i, set)| if set { acc | (1 << i) } else { acc });
        let loc = self
            .location(base_rid)
            .ok_or_else(|| StorageError::not_found(format!("rid {}", base_rid)))?;
        let p = self.buffer_pool.get_physical_page(&PagePath::new(
            &self.name,
            loc.page_range,
            loc.page,
            SCHEMA_ENCODING_COL,
        ))?;
        p.lock().unwrap().write(new_mask, loc.offset);
        Ok(new_mask)
    }

    fn increment_num_updates(&self, pr_num: usize, page_num: usize) -> StorageResult<i64> {
        let p = self
            .buffer_pool
            .get_physical_page(&PagePath::new(&self.name, pr_num, page_num, RID_COL))?;
        let mut page = p.lock().unwrap();
        let updated = page.num_updates() + 1;
        page.set_num_updates(updated);
        Ok(updated)
    }

    /// Overwrite the RID slot with `NULL_INDIRECTION`, drop the
    /// page-directory entry, and return the indirection the record held
    /// right before deletion (so the caller can keep walking the
    /// chain).
    fn delete_record(&self, rid: Rid) -> StorageResult<Option<i64>> {
        let loc = match self.location(rid) {
            Some(l) => l,
            None => return Ok(None),
        };
        let record = self.read_record_at(&loc)?;
        let prev_indirection = record.indirection();

        let rid_page = self
            .buffer_pool
            .get_physical_page(&PagePath::new(&self.name, loc.page_range, loc.page, RID_COL))?;
        rid_page.lock().unwrap().write(INDIRECTION_NULL, loc.offset);

        self.page_directory.lock().unwrap().remove(&rid);
        Ok(Some(prev_indirection))
    }

    fn append_tail_record(
        &self,
        pr_num: usize,
        indirection: i64,
        user_cols: &[i64],
    ) -> StorageResult<Rid> {
        let rid = self.rid_counter.fetch_add(1, Ordering::SeqCst);
        let page_num = self.ensure_insertable_tail_page(pr_num)?;

        self.buffer_pool
            .pin_page(&self.name, pr_num, page_num, self.total_cols());
        let offset = self.reserve_offset(pr_num, page_num)?;
        let record = Record::new(indirection, rid, self.next_timestamp(), 0, user_cols);
        self.write_record_at(
            &Location {
                page_range: pr_num,
                page: page_num,
                offset,
            },
            &record,
        )?;
        self.buffer_pool
            .unpin_page(&self.name, pr_num, page_num, self.total_cols());

        self.page_directory.lock().unwrap().insert(
            rid,
            Location {
                page_range: pr_num,
                page: page_num,
                offset,
            },
        );
        Ok(rid)
    }

    fn all_base_rids(&self) -> Vec<Rid> {
        let mut out = Vec::new();
        let page_ranges = self.page_ranges.lock().unwrap().clone();
        for pr in page_ranges.iter() {
            for page_num in pr.base_page_numbers() {
                if let Ok(rid_page) = self
                    .buffer_pool
                    .get_physical_page(&PagePath::new(&self.name, pr.pr_num, page_num, RID_COL))
                {
                    let page = rid_page.lock().unwrap();
                    let n = page.num_records() as usize;
                    for offset in 0..n {
                        let rid = page.read(offset);
                        if rid != INDIRECTION_NULL {
                            out.push(rid);
                        }
                    }
                }
            }
        }
        out
    }

    pub fn create_index(&self, col: usize) -> StorageResult<()> {
        let mut entries = Vec::new();
        for rid in self.all_base_rids() {
            if let Some(v) = self.get_record_column_version(rid, 0, col)? {
                entries.push((rid, v));
            }
        }
        self.index.create_index(col, entries.into_iter());
        Ok(())
    }

    pub fn drop_index(&self, col: usize) {
        self.index.drop_index(col);
    }

    // ---- Catalog rehydration on reopen ------------------------------

    pub(crate) fn restore_page_range(&self, pr: PageRange) {
        self.page_ranges.lock().unwrap().push(pr);
    }

    pub(crate) fn bump_rid_counter_to_at_least(&self, value: i64) {
        let mut current = self.rid_counter.load(Ordering::SeqCst);
        while value > current {
            match self.rid_counter.compare_exchange(
                current,
                value,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    pub(crate) fn rebuild_primary_key_index_from_disk(&self) -> StorageResult<()> {
        self.create_index(self.key_col)?;
        let count = self.all_base_rids().len() as i64;
        self.num_records.store(count, Ordering::SeqCst);
        Ok(())
    }

    // ---- §4.6 Write and versioning path -----------------------------

    /// Allocates the next RID off the table's monotonic counter without
    /// writing anything. Lets a transaction's pre-acquire phase name and
    /// lock the row an insert is about to create before the insert itself
    /// runs, so a second query in the same batch touching that row is
    /// serialized against it.
    pub(crate) fn reserve_rid(&self) -> Rid {
        self.rid_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub fn insert(&self, user_cols: &[i64]) -> StorageResult<Rid> {
        self.insert_with_rid(self.reserve_rid(), user_cols)
    }

    pub(crate) fn insert_with_rid(&self, rid: Rid, user_cols: &[i64]) -> StorageResult<Rid> {
        if user_cols.len() != self.num_user_columns {
            return Err(StorageError::integrity(format!(
                "expected {} columns, got {}",
                self.num_user_columns,
                user_cols.len()
            )));
        }

        let (pr_num, page_num, offset) = {
            let _guard = self.insert_lock.lock().unwrap();

            if !self.index.is_indexed(self.key_col) {
                self.index.create_index(self.key_col, std::iter::empty());
            }
            if !self.index.locate(self.key_col, user_cols[self.key_col]).is_empty() {
                return Err(StorageError::integrity(format!(
                    "duplicate primary key {}",
                    user_cols[self.key_col]
                )));
            }

            let (pr_num, page_num) = self.ensure_insertable_base_page()?;
            self.buffer_pool
                .pin_page(&self.name, pr_num, page_num, self.total_cols());
            let offset = self.reserve_offset(pr_num, page_num)?;
            (pr_num, page_num, offset)
        };

        let record = Record::new(INDIRECTION_NULL, rid, self.next_timestamp(), 0, user_cols);
        let loc = Location {
            page_range: pr_num,
            page: page_num,
            offset,
        };
        self.write_record_at(&loc, &record)?;
        self.buffer_pool
            .unpin_page(&self.name, pr_num, page_num, self.total_cols());

        self.page_directory.lock().unwrap().insert(rid, loc);

        for col in 0..self.num_user_columns {
            self.index.add(col, user_cols[col], rid);
        }

        self.num_records.fetch_add(1, Ordering::SeqCst);
        debug!("inserted rid {} into {}", rid, self.name);
        Ok(rid)
    }

    pub fn update(&self, key_value: i64, updates: &[Option<i64>]) -> StorageResult<bool> {
        if updates.iter().all(|u| u.is_none()) {
            return Ok(true);
        }

        let rids = self.index.locate(self.key_col, key_value);
        let base_rid = match rids.first() {
            Some(r) => *r,
            None => return Ok(false),
        };

        if let Some(new_key) = updates[self.key_col] {
            if new_key != key_value
                && !self.index.locate(self.key_col, new_key).is_empty()
            {
                return Err(StorageError::integrity(format!(
                    "update would duplicate primary key {}",
                    new_key
                )));
            }
        }

        let latest = self
            .get_record_version(base_rid, 0)?
            .ok_or_else(|| StorageError::not_found(format!("rid {}", base_rid)))?;
        let mut new_values = latest.user_columns().to_vec();
        for (i, u) in updates.iter().enumerate() {
            if let Some(v) = u {
                new_values[i] = *v;
            }
        }

        let base_loc = self
            .location(base_rid)
            .ok_or_else(|| StorageError::not_found(format!("rid {}", base_rid)))?;

        let new_tail_rid = {
            let _guard = self.update_lock.lock().unwrap();

            let base_record = self.read_record_at(&base_loc)?;
            let current_indirection = base_record.indirection();

            let chain_head = if current_indirection == INDIRECTION_NULL {
                self.append_tail_record(
                    base_loc.page_range,
                    base_rid,
                    latest.user_columns(),
                )?
            } else {
                current_indirection
            };

            let new_tail_rid =
                self.append_tail_record(base_loc.page_range, chain_head, &new_values)?;

            self.change_indirection(base_rid, new_tail_rid)?;
            self.increment_num_updates(base_loc.page_range, base_loc.page)?;
            self.update_schema_encoding(base_rid, base_record.schema_encoding(), updates)?;

            new_tail_rid
        };

        for (i, u) in updates.iter().enumerate() {
            if u.is_some() && self.index.is_indexed(i) {
                self.index
                    .update_index(i, latest.user_column(i), new_values[i], base_rid);
            }
        }

        self.maybe_enqueue_merge(base_loc.page_range, base_loc.page)?;

        debug!(
            "appended tail {} for base rid {} in {}",
            new_tail_rid, base_rid, self.name
        );
        Ok(true)
    }

    fn maybe_enqueue_merge(&self, pr_num: usize, page_num: usize) -> StorageResult<()> {
        let p = self
            .buffer_pool
            .get_physical_page(&PagePath::new(&self.name, pr_num, page_num, RID_COL))?;
        let (num_updates, full) = {
            let page = p.lock().unwrap();
            (page.num_updates(), !page.has_capacity())
        };
        if full && num_updates > 0 && num_updates as usize % MERGE_CONDITION == 0 {
            info!(
                "queuing ({}, {}) for merge, {} updates accumulated",
                pr_num, page_num, num_updates
            );
            let _ = self.merge_sender.send((pr_num, page_num));
        }
        Ok(())
    }

    pub fn delete(&self, key_value: i64) -> StorageResult<bool> {
        let rids = self.index.locate(self.key_col, key_value);
        let base_rid = match rids.first() {
            Some(r) => *r,
            None => return Ok(false),
        };

        let latest_values = self
            .get_record_version(base_rid, 0)?
            .map(|r| r.user_columns().to_vec());

        let mut visited = std::collections::HashSet::new();
        let mut current = Some(base_rid);
        while let Some(rid) = current {
            if !visited.insert(rid) {
                break;
            }
            let prev_indirection = self.delete_record(rid)?;
            current = match prev_indirection {
                Some(ind) if ind != INDIRECTION_NULL && ind != rid => Some(ind),
                _ => None,
            };
        }

        if let Some(values) = latest_values {
            self.index.delete_index(&values, base_rid);
        }
        self.num_records.fetch_sub(1, Ordering::SeqCst);
        Ok(true)
    }

    pub fn select(
        &self,
        key_value: i64,
        search_col: usize,
        proj: &[i32],
    ) -> StorageResult<Vec<ProjectedRow>> {
        self.select_version(key_value, search_col, proj, 0)
    }

    pub fn select_version(
        &self,
        key_value: i64,
        search_col: usize,
        proj: &[i32],
        version: i64,
    ) -> StorageResult<Vec<ProjectedRow>> {
        if !self.index.is_indexed(search_col)
            && self.num_records() as usize >= CREATE_INDICES_CONDITION
        {
            self.create_index(search_col)?;
        }

        let mut out = Vec::new();
        if self.index.is_indexed(search_col) {
            for rid in self.index.locate(search_col, key_value) {
                if let Some(record) = self.get_record_version(rid, version)? {
                    out.push(record.project(proj));
                }
            }
        } else {
            for rid in self.all_base_rids() {
                if let Some(record) = self.get_record_version(rid, version)? {
                    if record.user_column(search_col) == key_value {
                        out.push(record.project(proj));
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn sum(&self, lo: i64, hi: i64, col: usize) -> StorageResult<Option<i64>> {
        self.sum_version(lo, hi, col, 0)
    }

    pub fn sum_version(
        &self,
        lo: i64,
        hi: i64,
        col: usize,
        version: i64,
    ) -> StorageResult<Option<i64>> {
        if !self.index.key_is_indexed() {
            return Ok(None);
        }
        let rids = self.index.locate_range(self.key_col, lo, hi);
        if rids.is_empty() {
            return Ok(None);
        }
        let mut total = 0i64;
        let mut found_any = false;
        for rid in rids {
            if let Some(v) = self.get_record_column_version(rid, version, col)? {
                total += v;
                found_any = true;
            }
        }
        Ok(if found_any { Some(total) } else { None })
    }

    pub fn increment(&self, key_value: i64, col: usize) -> StorageResult<bool> {
        let rids = self.index.locate(self.key_col, key_value);
        let base_rid = match rids.first() {
            Some(r) => *r,
            None => return Ok(false),
        };
        let current = match self.get_record_column_version(base_rid, 0, col)? {
            Some(v) => v,
            None => return Ok(false),
        };
        let mut updates = vec![None; self.num_user_columns];
        updates[col] = Some(current + 1);
        self.update(key_value, &updates)
    }

    /// All live base RIDs, for conservative lock sets when a query's
    /// search column is not indexed (see §4.8).
    pub fn live_base_rids(&self) -> Vec<Rid> {
        self.all_base_rids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn table(num_user_columns: usize, key_col: usize) -> (tempfile::TempDir, Arc<Table>) {
        let dir = tempdir().unwrap();
        let pool = Arc::new(BufferPool::new(dir.path(), 64));
        let (tx, _rx) = crossbeam::channel::unbounded();
        let table = Arc::new(Table::new("t", num_user_columns, key_col, pool, tx));
        (dir, table)
    }

    #[test]
    fn insert_then_select_returns_inserted_columns() {
        let (_dir, table) = table(2, 0);
        table.insert(&[1, 10]).unwrap();
        table.insert(&[2, 20]).unwrap();

        let rows = table.select(2, 0, &[1, 1]).unwrap();
        assert_eq!(rows, vec![vec![2, 20]]);
    }

    #[test]
    fn duplicate_primary_key_fails() {
        let (_dir, table) = table(2, 0);
        table.insert(&[1, 10]).unwrap();
        assert!(table.insert(&[1, 99]).is_err());
    }

    #[test]
    fn update_then_select_version_sees_history() {
        let (_dir, table) = table(2, 0);
        table.insert(&[1, 10]).unwrap();

        table.update(1, &[None, Some(99)]).unwrap();

        let latest = table.select(1, 0, &[0, 1]).unwrap();
        assert_eq!(latest, vec![vec![99]]);

        let original = table.select_version(1, 0, &[0, 1], -1).unwrap();
        assert_eq!(original, vec![vec![10]]);
    }

    #[test]
    fn delete_removes_record_and_index_entry() {
        let (_dir, table) = table(2, 0);
        table.insert(&[1, 10]).unwrap();
        table.update(1, &[None, Some(20)]).unwrap();

        assert!(table.delete(1).unwrap());
        assert_eq!(table.select(1, 0, &[1, 1]).unwrap(), Vec::<Vec<i64>>::new());
        assert!(table.index.locate(0, 1).is_empty());
    }

    #[test]
    fn sum_adds_projected_column_over_key_range() {
        let (_dir, table) = table(2, 0);
        table.insert(&[1, 10]).unwrap();
        table.insert(&[2, 11]).unwrap();
        table.insert(&[3, 12]).unwrap();

        assert_eq!(table.sum(1, 3, 1).unwrap(), Some(33));
    }

    #[test]
    fn fills_base_page_at_exactly_capacity_then_allocates_new_page() {
        let (_dir, table) = table(1, 0);
        let cap = crate::consts::page_capacity();
        for i in 0..cap as i64 {
            table.insert(&[i]).unwrap();
        }
        assert_eq!(table.page_range_snapshot(0).unwrap().base_page_count(), 1);

        table.insert(&[cap as i64]).unwrap();
        assert_eq!(table.page_range_snapshot(0).unwrap().base_page_count(), 2);
    }
}
