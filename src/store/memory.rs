//! In-process wide-column store.
//!
//! Models just enough of a wide-column store for the directory layers:
//! keyspaces hold column families, column families hold rows, rows hold
//! columns with per-column write timestamps and last-write-wins
//! resolution. A [`MemoryCluster`] can be shared by several
//! [`MemoryStore`] sessions, so reopening a directory observes earlier
//! writes the way a remote cluster would.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use crate::options::Options;
use crate::store::ColumnStore;
use crate::types::{now_millis, BlockMap};
use crate::{Error, Result};

/// One column value together with its write timestamp.
#[derive(Debug, Clone)]
struct Cell {
    value: Bytes,
    timestamp: i64,
}

type Row = BTreeMap<Vec<u8>, Cell>;
type Table = Arc<RwLock<BTreeMap<Vec<u8>, Row>>>;

/// A cluster of keyspaces, each holding named column families.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    tables: RwLock<HashMap<(String, String), Table>>,
}

impl MemoryCluster {
    /// Create an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    fn create_table(&self, keyspace: &str, column_family: &str) {
        self.tables
            .write()
            .entry((keyspace.to_string(), column_family.to_string()))
            .or_default();
    }

    fn table(&self, keyspace: &str, column_family: &str) -> Result<Table> {
        self.tables
            .read()
            .get(&(keyspace.to_string(), column_family.to_string()))
            .cloned()
            .ok_or_else(|| {
                Error::Io(format!(
                    "column family {keyspace}.{column_family} does not exist"
                ))
            })
    }
}

/// A session against one column family of a [`MemoryCluster`].
pub struct MemoryStore {
    cluster: Arc<MemoryCluster>,
    keyspace: String,
    column_family: String,
}

impl MemoryStore {
    /// Create a session against the given keyspace and column family.
    pub fn new(
        cluster: Arc<MemoryCluster>,
        keyspace: impl Into<String>,
        column_family: impl Into<String>,
    ) -> Self {
        Self {
            cluster,
            keyspace: keyspace.into(),
            column_family: column_family.into(),
        }
    }

    /// Create a session using the schema names from the given options.
    pub fn from_options(cluster: Arc<MemoryCluster>, options: &Options) -> Self {
        Self::new(cluster, options.keyspace.clone(), options.column_family.clone())
    }

    fn table(&self) -> Result<Table> {
        self.cluster.table(&self.keyspace, &self.column_family)
    }
}

impl ColumnStore for MemoryStore {
    fn ensure_schema(&self) -> Result<()> {
        self.cluster.create_table(&self.keyspace, &self.column_family);
        Ok(())
    }

    fn rows_with_column(&self, column: &[u8]) -> Result<Vec<(Vec<u8>, Bytes)>> {
        let table = self.table()?;
        let rows = table.read();
        Ok(rows
            .iter()
            .filter_map(|(key, row)| {
                row.get(column)
                    .map(|cell| (key.clone(), cell.value.clone()))
            })
            .collect())
    }

    fn get_column(&self, row: &[u8], column: &[u8]) -> Result<Option<Bytes>> {
        let table = self.table()?;
        let rows = table.read();
        Ok(rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|cell| cell.value.clone()))
    }

    fn get_columns(&self, row: &[u8], columns: &BTreeSet<Vec<u8>>) -> Result<BlockMap> {
        let table = self.table()?;
        let rows = table.read();
        let mut result = BlockMap::new();
        if let Some(r) = rows.get(row) {
            for name in columns {
                if let Some(cell) = r.get(name) {
                    result.put(name.clone(), cell.value.clone());
                }
            }
        }
        Ok(result)
    }

    fn set_columns(&self, row: &[u8], columns: &BlockMap) -> Result<()> {
        if columns.is_empty() {
            // A row-deletion request. Rows cannot be deleted from the
            // store; callers express deletion through the descriptor flag.
            debug!(row = %String::from_utf8_lossy(row), "ignoring row deletion request");
            return Ok(());
        }
        let table = self.table()?;
        let mut rows = table.write();
        let row = rows.entry(row.to_vec()).or_default();
        let now = now_millis();
        for (name, value) in columns {
            match value {
                Some(value) => {
                    let stale = row
                        .get(name)
                        .map(|cell| cell.timestamp > now)
                        .unwrap_or(false);
                    if !stale {
                        row.insert(
                            name.clone(),
                            Cell {
                                value: value.clone(),
                                timestamp: now,
                            },
                        );
                    }
                }
                None => {
                    row.remove(name);
                }
            }
        }
        Ok(())
    }
}
