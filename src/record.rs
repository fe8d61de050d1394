//! The record data model: a row of fixed-width signed integers, the
//! first [`crate::consts::NUM_METADATA_COLS`] of which are reserved
//! metadata columns (indirection, RID, timestamp, schema-encoding).

use crate::consts::{
    INDIRECTION_COL, NUM_METADATA_COLS, RID_COL, SCHEMA_ENCODING_COL, TIMESTAMP_COL,
};

/// A record identifier: monotonically increasing, never reused.
pub type Rid = i64;

/// One row: `NUM_METADATA_COLS` metadata columns followed by the table's
/// user columns, all stored as signed 64-bit integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub columns: Vec<i64>,
}

impl Record {
    pub fn new(
        indirection: i64,
        rid: Rid,
        timestamp: i64,
        schema_encoding: i64,
        user_columns: &[i64],
    ) -> Self {
        let mut columns = Vec::with_capacity(NUM_METADATA_COLS + user_columns.len());
        columns.push(indirection);
        columns.push(rid);
        columns.push(timestamp);
        columns.push(schema_encoding);
        columns.extend_from_slice(user_columns);
        Record { columns }
    }

    pub fn indirection(&self) -> i64 {
        self.columns[INDIRECTION_COL]
    }

    pub fn rid(&self) -> Rid {
        self.columns[RID_COL]
    }

    pub fn timestamp(&self) -> i64 {
        self.columns[TIMESTAMP_COL]
    }

    pub fn schema_encoding(&self) -> i64 {
        self.columns[SCHEMA_ENCODING_COL]
    }

    /// Value of user column `col` (0-indexed among user columns, i.e.
    /// not counting the metadata columns).
    pub fn user_column(&self, col: usize) -> i64 {
        self.columns[NUM_METADATA_COLS + col]
    }

    pub fn user_columns(&self) -> &[i64] {
        &self.columns[NUM_METADATA_COLS..]
    }

    pub fn num_user_columns(&self) -> usize {
        self.columns.len() - NUM_METADATA_COLS
    }

    /// Project a subset of user columns, `proj[i] != 0` keeps column i.
    pub fn project(&self, proj: &[i32]) -> Vec<i64> {
        proj.iter()
            .enumerate()
            .filter(|(_, keep)| **keep != 0)
            .map(|(i, _)| self.user_column(i))
            .collect()
    }
}
