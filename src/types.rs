//! Core types shared across blockdir.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

/// Name of the column that holds the file descriptor.
pub const DESCRIPTOR_COLUMN: &str = "DESCRIPTOR";

/// Every column that holds a file block is named with this prefix.
pub const BLOCK_COLUMN_PREFIX: &str = "BLOCK-";

/// Build the column name for the given block number.
pub fn block_column_name(block_number: u32) -> String {
    format!("{}{}", BLOCK_COLUMN_PREFIX, block_number)
}

/// Milliseconds since the Unix epoch, the timestamp unit used for every
/// store mutation and descriptor field.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// An ordered map of column names to column values, used as the payload of
/// one batched row mutation.
///
/// Keys are raw column-name bytes ordered lexicographically. An entry with
/// no value is a column tombstone; an entirely empty map is a row-deletion
/// request (which the backing store does not support, see
/// [`ColumnStore::set_columns`](crate::store::ColumnStore::set_columns)).
#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    entries: BTreeMap<Vec<u8>, Option<Bytes>>,
}

impl BlockMap {
    /// Create an empty block map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a column value.
    pub fn put(&mut self, name: impl Into<Vec<u8>>, value: impl Into<Bytes>) {
        self.entries.insert(name.into(), Some(value.into()));
    }

    /// Insert a column tombstone.
    pub fn put_tombstone(&mut self, name: impl Into<Vec<u8>>) {
        self.entries.insert(name.into(), None);
    }

    /// Get the value stored under the given column name.
    pub fn get(&self, name: &[u8]) -> Option<&Bytes> {
        self.entries.get(name).and_then(|v| v.as_ref())
    }

    /// Number of entries (values and tombstones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries in column-name order.
    pub fn iter(&self) -> btree_map::Iter<'_, Vec<u8>, Option<Bytes>> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a BlockMap {
    type Item = (&'a Vec<u8>, &'a Option<Bytes>);
    type IntoIter = btree_map::Iter<'a, Vec<u8>, Option<Bytes>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
