//! An embedded, disk-backed columnar storage engine built around a
//! base/tail lineage model: every row lives in a base page, updates
//! append immutable tail records instead of overwriting in place, and
//! a background merge engine periodically folds a page's tail history
//! back into its base page.
//!
//! Start at [`database::Database`] to open a database directory, then
//! [`database::Database::create_table`] or `get_table` for a
//! [`table::Table`] handle. Queue [`query::Query`] values onto a
//! [`transaction::Transaction`] and run it under a
//! [`lock_manager::LockManager`] for two-phase-locked, all-or-nothing
//! execution; [`transaction_worker::TransactionWorker`] does this for
//! a whole batch at once.

pub mod buffer_pool;
pub mod consts;
pub mod database;
pub mod error;
pub mod index;
pub mod lock_manager;
pub mod logging;
pub mod merge;
pub mod page;
pub mod page_range;
pub mod query;
pub mod record;
pub mod table;
pub mod transaction;
pub mod transaction_worker;
pub(crate) mod util;

pub use database::Database;
pub use error::{StorageError, StorageResult};
pub use query::{Query, QueryResult};
pub use record::{Record, Rid};
pub use table::Table;
pub use transaction::{QueryOutcome, Transaction};
pub use transaction_worker::TransactionWorker;
