//! The external query surface (§6): one `Query` per table operation a
//! transaction can carry, each knowing which RIDs it needs locked and
//! at what mode before it may run.
//!
//! Grounded on the teacher's `OpIterator`/plan-node split: a query
//! here is a small self-describing unit a transaction can plan (decide
//! its lock set) before it executes, the same separation the teacher
//! draws between planning a scan and running it.

use std::cell::Cell;
use std::sync::Arc;

use crate::error::StorageResult;
use crate::lock_manager::LockMode;
use crate::record::Rid;
use crate::table::{ProjectedRow, Table};

#[derive(Debug, Clone)]
pub enum QueryResult {
    Inserted(Rid),
    Ok(bool),
    Rows(Vec<ProjectedRow>),
    Sum(Option<i64>),
}

pub enum Query {
    Insert {
        table: Arc<Table>,
        values: Vec<i64>,
        /// Filled in by `lock_plan` with the RID reserved for this
        /// insert, so `execute` writes the same row the pre-acquire
        /// phase already locked instead of allocating a second one.
        rid: Cell<Option<Rid>>,
    },
    Update {
        table: Arc<Table>,
        key: i64,
        values: Vec<Option<i64>>,
    },
    Delete {
        table: Arc<Table>,
        key: i64,
    },
    Select {
        table: Arc<Table>,
        key: i64,
        search_col: usize,
        proj: Vec<i32>,
    },
    SelectVersion {
        table: Arc<Table>,
        key: i64,
        search_col: usize,
        proj: Vec<i32>,
        version: i64,
    },
    Sum {
        table: Arc<Table>,
        lo: i64,
        hi: i64,
        col: usize,
    },
    SumVersion {
        table: Arc<Table>,
        lo: i64,
        hi: i64,
        col: usize,
        version: i64,
    },
    Increment {
        table: Arc<Table>,
        key: i64,
        col: usize,
    },
}

impl Query {
    pub fn table(&self) -> &Arc<Table> {
        match self {
            Query::Insert { table, .. }
            | Query::Update { table, .. }
            | Query::Delete { table, .. }
            | Query::Select { table, .. }
            | Query::SelectVersion { table, .. }
            | Query::Sum { table, .. }
            | Query::SumVersion { table, .. }
            | Query::Increment { table, .. } => table,
        }
    }

    /// The RIDs this query touches and the mode it needs them locked
    /// at, decided against the index state as it stands right now.
    /// When the search column isn't indexed, the lock set falls back
    /// to every live base RID in the table, since the matching row(s)
    /// can't be known without a full scan.
    pub fn lock_plan(&self) -> (LockMode, Vec<Rid>) {
        match self {
            Query::Insert { table, rid, .. } => {
                let reserved = table.reserve_rid();
                rid.set(Some(reserved));
                (LockMode::Exclusive, vec![reserved])
            }
            Query::Update { table, key, .. } | Query::Increment { table, key, .. } => {
                let rids = if table.index.key_is_indexed() {
                    table.index.locate(table.key_col, *key)
                } else {
                    table.live_base_rids()
                };
                (LockMode::Exclusive, rids)
            }
            Query::Delete { table, key } => {
                let rids = if table.index.key_is_indexed() {
                    table.index.locate(table.key_col, *key)
                } else {
                    table.live_base_rids()
                };
                (LockMode::Exclusive, rids)
            }
            Query::Select {
                table,
                key,
                search_col,
                ..
            } => {
                let rids = if table.index.is_indexed(*search_col) {
                    table.index.locate(*search_col, *key)
                } else {
                    table.live_base_rids()
                };
                (LockMode::Shared, rids)
            }
            Query::SelectVersion {
                table,
                key,
                search_col,
                ..
            } => {
                let rids = if table.index.is_indexed(*search_col) {
                    table.index.locate(*search_col, *key)
                } else {
                    table.live_base_rids()
                };
                (LockMode::Shared, rids)
            }
            Query::Sum { table, lo, hi, .. } | Query::SumVersion { table, lo, hi, .. } => {
                let rids = if table.index.key_is_indexed() {
                    table.index.locate_range(table.key_col, *lo, *hi)
                } else {
                    Vec::new()
                };
                (LockMode::Shared, rids)
            }
        }
    }

    /// Checked before locks are even requested: catches the integrity
    /// violations the spec calls out as pre-acquire failures (duplicate
    /// primary key on insert, primary-key collision on update) so a
    /// doomed query never takes a lock it doesn't need.
    pub fn check_integrity(&self) -> Result<(), String> {
        match self {
            Query::Insert { table, values, .. } => {
                if table.index.key_is_indexed()
                    && !table
                        .index
                        .locate(table.key_col, values[table.key_col])
                        .is_empty()
                {
                    return Err(format!(
                        "duplicate primary key {}",
                        values[table.key_col]
                    ));
                }
                Ok(())
            }
            Query::Update { table, key, values } => {
                if let Some(new_key) = values[table.key_col] {
                    if new_key != *key
                        && table.index.key_is_indexed()
                        && !table.index.locate(table.key_col, new_key).is_empty()
                    {
                        return Err(format!("update would duplicate primary key {}", new_key));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn execute(&self) -> StorageResult<QueryResult> {
        match self {
            Query::Insert { table, values, rid } => {
                let reserved = rid.get().unwrap_or_else(|| table.reserve_rid());
                table
                    .insert_with_rid(reserved, values)
                    .map(QueryResult::Inserted)
            }
            Query::Update { table, key, values } => {
                table.update(*key, values).map(QueryResult::Ok)
            }
            Query::Delete { table, key } => table.delete(*key).map(QueryResult::Ok),
            Query::Select {
                table,
                key,
                search_col,
                proj,
            } => table
                .select(*key, *search_col, proj)
                .map(QueryResult::Rows),
            Query::SelectVersion {
                table,
                key,
                search_col,
                proj,
                version,
            } => table
                .select_version(*key, *search_col, proj, *version)
                .map(QueryResult::Rows),
            Query::Sum { table, lo, hi, col } => table.sum(*lo, *hi, *col).map(QueryResult::Sum),
            Query::SumVersion {
                table,
                lo,
                hi,
                col,
                version,
            } => table
                .sum_version(*lo, *hi, *col, *version)
                .map(QueryResult::Sum),
            Query::Increment { table, key, col } => {
                table.increment(*key, *col).map(QueryResult::Ok)
            }
        }
    }
}
