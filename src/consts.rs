//! Engine-wide constants.
//!
//! Collected in one place the way `btree::consts` does it in the
//! teacher codebase, rather than scattering magic numbers through the
//! page/table/index modules.

/// Size, in bytes, of one physical page on disk.
pub const PAGE_SIZE: usize = 4096;

/// Width, in bytes, of one column value (big-endian signed integer).
pub const COLUMN_SIZE: usize = 8;

/// Number of `COLUMN_SIZE`-wide header fields at the front of a physical
/// page: `num_records`, `tps`, `num_updates`.
pub const HEADER_FIELDS: usize = 3;

/// Byte offset where the value body of a physical page starts.
pub const HEADER_SIZE: usize = HEADER_FIELDS * COLUMN_SIZE;

/// Maximum number of base pages a page range may hold.
pub const MAX_BASE_PAGES: usize = 16;

/// Default buffer pool capacity, in physical pages.
pub const BUFFERPOOL_SIZE: usize = 256;

/// Number of tail updates accumulated on a base page before it is
/// queued for merge (only once the base page itself is also full).
pub const MERGE_CONDITION: usize = 100;

/// Row-count threshold past which `select` on an unindexed column
/// triggers index creation instead of a full scan.
pub const CREATE_INDICES_CONDITION: usize = 50;

/// Number of metadata columns prepended to every record: indirection,
/// RID, timestamp, schema-encoding.
pub const NUM_METADATA_COLS: usize = 4;

pub const INDIRECTION_COL: usize = 0;
pub const RID_COL: usize = 1;
pub const TIMESTAMP_COL: usize = 2;
pub const SCHEMA_ENCODING_COL: usize = 3;

/// Sentinel value for "no indirection" (base record never updated, or
/// end of a tail chain).
pub const INDIRECTION_NULL: i64 = -1;

/// Number of column values that fit in the body of one physical page.
pub const fn page_capacity() -> usize {
    (PAGE_SIZE - HEADER_SIZE) / COLUMN_SIZE
}
