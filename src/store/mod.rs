//! Store abstraction - the seam between the directory and the wide-column
//! store that backs it.
//!
//! The directory layers speak to the store exclusively through the
//! [`ColumnStore`] trait: get one column, get many columns, enumerate rows
//! carrying a given column, and atomically mutate a batch of columns under
//! one row. A session is shared between the directory and its open
//! streams as an `Arc<dyn ColumnStore>`; network transports, cluster
//! topology and replication all live behind the trait.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and as
//! an embedded backend.

mod memory;

pub use memory::{MemoryCluster, MemoryStore};

use std::collections::BTreeSet;

use bytes::Bytes;

use crate::types::BlockMap;
use crate::Result;

/// Operations against one column family of a wide-column store.
///
/// All operations are synchronous; each one round-trips to the store.
/// Mutations are timestamped with milliseconds since epoch at mutation
/// time and resolve last-write-wins per column. A single-row batch is
/// observed atomically.
pub trait ColumnStore: Send + Sync {
    /// Create the keyspace and column family if absent. Idempotent:
    /// succeeds when they already exist.
    fn ensure_schema(&self) -> Result<()>;

    /// Enumerate the rows that carry the given column, returning each row
    /// key together with that column's value. Enumeration order follows
    /// the store's partitioner and is not guaranteed.
    fn rows_with_column(&self, column: &[u8]) -> Result<Vec<(Vec<u8>, Bytes)>>;

    /// Get a single column of the given row, or `None` if the row or the
    /// column does not exist.
    fn get_column(&self, row: &[u8], column: &[u8]) -> Result<Option<Bytes>>;

    /// Get the named columns of the given row. Absent columns are simply
    /// missing from the result.
    fn get_columns(&self, row: &[u8], columns: &BTreeSet<Vec<u8>>) -> Result<BlockMap>;

    /// Atomically apply a batch of column writes to the given row. An
    /// entry without a value deletes that column. An empty batch is a
    /// row-deletion request, which the store does not support: it is
    /// accepted and ignored.
    fn set_columns(&self, row: &[u8], columns: &BlockMap) -> Result<()>;
}
