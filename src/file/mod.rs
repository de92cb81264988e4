//! File-to-row mapping and the buffered file streams.
//!
//! A file is one row: its blocks are columns named `BLOCK-<n>` and its
//! metadata lives in the `DESCRIPTOR` column. [`ColumnFile`] performs the
//! raw column traffic for one file; [`FileWriter`] and [`FileReader`] are
//! the buffered streams handed to consumers.

mod reader;
mod writer;

pub use reader::FileReader;
pub use writer::FileWriter;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::descriptor::FileDescriptor;
use crate::store::ColumnStore;
use crate::types::{BlockMap, DESCRIPTOR_COLUMN};
use crate::Result;

/// Raw block I/O for one file's row.
#[derive(Clone)]
pub(crate) struct ColumnFile {
    store: Arc<dyn ColumnStore>,
}

impl std::fmt::Debug for ColumnFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnFile").finish_non_exhaustive()
    }
}

impl ColumnFile {
    pub(crate) fn new(store: Arc<dyn ColumnStore>) -> Self {
        Self { store }
    }

    /// Fetch the named block columns of the file's row in one multi-get.
    pub(crate) fn read_blocks(
        &self,
        descriptor: &FileDescriptor,
        names: &BTreeSet<Vec<u8>>,
    ) -> Result<BlockMap> {
        self.store.get_columns(descriptor.name().as_bytes(), names)
    }

    /// Write the staged block columns together with the re-encoded
    /// descriptor as one batch. Readers observe either the old descriptor
    /// with the old blocks or the new descriptor with the new blocks,
    /// never a mix.
    pub(crate) fn write_blocks(
        &self,
        descriptor: &FileDescriptor,
        mut blocks: BlockMap,
    ) -> Result<()> {
        blocks.put(DESCRIPTOR_COLUMN, descriptor.encode()?);
        self.store.set_columns(descriptor.name().as_bytes(), &blocks)
    }
}
