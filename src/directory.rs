//! Directory - maps the file-directory surface onto one column family.
//!
//! Each file under the directory is one row of the column family. The
//! directory resolves names to descriptors, answers metadata queries,
//! performs logical deletion and hands out buffered streams for reading
//! and writing. The store session is shared with every stream it opens.
//!
//! # Thread Safety
//!
//! The directory is thread-safe and can be shared across threads using
//! Arc. Streams are independent: simultaneous readers are fine, and a
//! file must have at most one active writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::descriptor::FileDescriptor;
use crate::file::{ColumnFile, FileReader, FileWriter};
use crate::options::Options;
use crate::store::ColumnStore;
use crate::types::{now_millis, BlockMap, DESCRIPTOR_COLUMN};
use crate::{Error, Result};

/// A virtual file directory backed by one column family.
pub struct Directory {
    /// Shared store session, also handed to streams.
    store: Arc<dyn ColumnStore>,
    /// Block size for newly created files.
    block_size: u64,
    /// Buffer size for the streams this directory opens.
    buffer_size: usize,
    /// Whether the directory has been closed.
    closed: AtomicBool,
}

impl Directory {
    /// Open a directory over the given store session, creating the schema
    /// if it does not exist yet.
    pub fn open(store: Arc<dyn ColumnStore>, options: &Options) -> Result<Self> {
        options.validate()?;
        store.ensure_schema()?;
        debug!(
            keyspace = %options.keyspace,
            column_family = %options.column_family,
            block_size = options.block_size,
            buffer_size = options.buffer_size,
            "opened directory"
        );
        Ok(Self {
            store,
            block_size: options.block_size,
            buffer_size: options.buffer_size,
            closed: AtomicBool::new(false),
        })
    }

    /// Open a writer for the named file. An existing file is picked up
    /// where it left off; a missing or logically deleted file gets a
    /// fresh, immediately persisted empty descriptor.
    pub fn create_output(&self, name: &str) -> Result<FileWriter> {
        self.ensure_open()?;
        let descriptor = self.load_or_create_descriptor(name)?;
        Ok(FileWriter::new(
            ColumnFile::new(self.store.clone()),
            descriptor,
            self.buffer_size,
        ))
    }

    /// Open a reader for the named file. Fails with a not-found error for
    /// a missing or logically deleted file.
    pub fn open_input(&self, name: &str) -> Result<FileReader> {
        self.ensure_open()?;
        let descriptor = self
            .load_descriptor(name)?
            .ok_or_else(|| Error::not_found(name))?;
        Ok(FileReader::new(
            ColumnFile::new(self.store.clone()),
            descriptor,
            self.buffer_size,
        ))
    }

    /// Names of the files in this directory, in no particular order.
    /// Logically deleted files are skipped.
    pub fn list(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let rows = self.store.rows_with_column(DESCRIPTOR_COLUMN.as_bytes())?;
        let mut names = Vec::with_capacity(rows.len());
        for (key, payload) in rows {
            let descriptor = FileDescriptor::decode(&payload)?;
            if descriptor.is_deleted() {
                continue;
            }
            let name = String::from_utf8(key)
                .map_err(|_| Error::corruption("row key is not valid UTF-8"))?;
            names.push(name);
        }
        Ok(names)
    }

    /// Whether a file with the given name exists. Any store failure reads
    /// as absence.
    pub fn exists(&self, name: &str) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        matches!(self.load_descriptor(name), Ok(Some(_)))
    }

    /// The length of the named file in bytes.
    pub fn length(&self, name: &str) -> Result<u64> {
        self.ensure_open()?;
        let descriptor = self
            .load_descriptor(name)?
            .ok_or_else(|| Error::not_found(name))?;
        Ok(descriptor.length())
    }

    /// The time the named file was last modified, in ms since epoch.
    pub fn modified(&self, name: &str) -> Result<i64> {
        self.ensure_open()?;
        let descriptor = self
            .load_descriptor(name)?
            .ok_or_else(|| Error::not_found(name))?;
        Ok(descriptor.last_modified())
    }

    /// Set the modified time of the named file to now.
    pub fn touch(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        let mut descriptor = self
            .load_descriptor(name)?
            .ok_or_else(|| Error::not_found(name))?;
        descriptor.last_modified = now_millis();
        self.store_descriptor(&descriptor)
    }

    /// Logically delete the named file. The row and its block columns
    /// stay in the store; the file merely disappears from listing and
    /// opening. Deleting a missing or already deleted file is a no-op.
    pub fn delete(&self, name: &str) -> Result<()> {
        self.ensure_open()?;
        if let Some(mut descriptor) = self.load_descriptor(name)? {
            descriptor.deleted = true;
            self.store_descriptor(&descriptor)?;
            debug!(file = name, "logically deleted");
        }
        Ok(())
    }

    /// Close the directory. Subsequent operations fail; open streams keep
    /// their own store handle and are unaffected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::DirectoryClosed);
        }
        Ok(())
    }

    /// Fetch and decode the named file's descriptor. A logically deleted
    /// descriptor reads as absent.
    fn load_descriptor(&self, name: &str) -> Result<Option<FileDescriptor>> {
        let payload = self
            .store
            .get_column(name.as_bytes(), DESCRIPTOR_COLUMN.as_bytes())?;
        match payload {
            None => Ok(None),
            Some(payload) => {
                let mut descriptor = FileDescriptor::decode(&payload)?;
                if descriptor.is_deleted() {
                    return Ok(None);
                }
                descriptor.normalize(self.block_size);
                Ok(Some(descriptor))
            }
        }
    }

    /// Like [`load_descriptor`](Self::load_descriptor), but a missing
    /// file gets a fresh empty descriptor that is persisted right away.
    fn load_or_create_descriptor(&self, name: &str) -> Result<FileDescriptor> {
        if let Some(descriptor) = self.load_descriptor(name)? {
            return Ok(descriptor);
        }
        let descriptor = FileDescriptor::new(name, self.block_size);
        self.store_descriptor(&descriptor)?;
        debug!(file = name, "created file");
        Ok(descriptor)
    }

    /// Persist a descriptor as a single-column batch under its row.
    fn store_descriptor(&self, descriptor: &FileDescriptor) -> Result<()> {
        let mut batch = BlockMap::new();
        batch.put(DESCRIPTOR_COLUMN, descriptor.encode()?);
        self.store.set_columns(descriptor.name().as_bytes(), &batch)
    }
}
