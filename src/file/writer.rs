//! Buffered output stream for a column-backed file.
//!
//! Writes go through a write-behind buffer; draining the buffer maps the
//! byte range onto block columns and persists them together with the
//! updated descriptor as a single row batch, so round trips are bounded
//! by one per buffer regardless of how many blocks the range spans.
//!
//! An overwrite that lands inside an existing block splits it instead of
//! re-uploading its unchanged bytes: the head keeps the original column
//! under a narrowed claim, the overwritten range goes to a freshly
//! numbered column, and whatever survives past the write keeps the
//! original column at a later offset. Columns no longer referenced by the
//! descriptor are left behind as garbage; readers never fetch them.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::descriptor::{Cursor, FileDescriptor};
use crate::file::ColumnFile;
use crate::types::{now_millis, BlockMap};
use crate::{Error, Result};

/// Write-behind output stream for one file.
///
/// The writer owns a private descriptor snapshot that it mutates and
/// persists on every flush. A file must have at most one active writer;
/// concurrent writers race at the store level with last-flush-wins.
pub struct FileWriter {
    /// Raw block I/O for this file's row.
    file: ColumnFile,
    /// Privately owned descriptor snapshot.
    descriptor: FileDescriptor,
    /// Block-list position matching `buffer_start`.
    cursor: Cursor,
    /// Bytes accepted but not yet flushed.
    buffer: Vec<u8>,
    /// Logical file position of the first buffered byte.
    buffer_start: u64,
    /// Capacity at which the buffer is drained.
    buffer_size: usize,
    /// Whether the stream is still open.
    open: bool,
}

impl FileWriter {
    /// Create a writer over the given descriptor snapshot, positioned at
    /// the start of the file.
    pub(crate) fn new(
        file: ColumnFile,
        mut descriptor: FileDescriptor,
        buffer_size: usize,
    ) -> Self {
        if descriptor.blocks.is_empty() {
            let block = descriptor.allocate_block();
            descriptor.blocks.push(block);
        }
        Self {
            file,
            descriptor,
            cursor: Cursor::default(),
            buffer: Vec::with_capacity(buffer_size),
            buffer_start: 0,
            buffer_size,
            open: true,
        }
    }

    /// The current length of the file. Bytes still sitting in the buffer
    /// are not counted until they flush.
    pub fn length(&self) -> u64 {
        self.descriptor.length()
    }

    /// Append the given bytes at the current position, draining the
    /// buffer whenever it fills.
    pub fn write_bytes(&mut self, mut bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;
        while !bytes.is_empty() {
            let space = self.buffer_size - self.buffer.len();
            let take = space.min(bytes.len());
            self.buffer.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
            if self.buffer.len() == self.buffer_size {
                self.flush_buffer()?;
            }
        }
        Ok(())
    }

    /// Move the logical cursor. Pending buffered bytes are flushed first;
    /// seeking past the end of the file fails.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.ensure_open()?;
        self.flush_buffer()?;
        self.cursor = self.descriptor.seek(position)?;
        self.buffer_start = position;
        Ok(())
    }

    /// Drain the buffer and close the stream. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        let result = self.flush_buffer();
        self.open = false;
        result
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::Io("write on closed stream".into()))
        }
    }

    /// Drain the buffered range into block columns.
    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let bytes = std::mem::take(&mut self.buffer);
        self.flush_range(&bytes)?;
        self.buffer_start += bytes.len() as u64;
        self.buffer = bytes;
        self.buffer.clear();
        Ok(())
    }

    /// Map the byte range at the cursor onto blocks and persist one batch
    /// holding the rewritten columns plus the updated descriptor.
    fn flush_range(&mut self, bytes: &[u8]) -> Result<()> {
        let mut staged = BlockMap::new();
        let mut delta: i64 = 0;

        // A write starting strictly inside a block's data splits it: the
        // head keeps the first data_position bytes of the original column,
        // the block itself shrinks to the tail claim. Neither column is
        // rewritten; only the descriptor's view changes.
        let current = &self.descriptor.blocks[self.cursor.index];
        if self.cursor.data_position > 0 && self.cursor.data_position < current.data_length {
            self.descriptor
                .split_block(self.cursor.index, self.cursor.data_position);
            self.cursor.index += 1;
            self.cursor.data_position = 0;
        }

        let mut remaining = bytes;
        loop {
            self.advance_past_full_block();
            let current = &self.descriptor.blocks[self.cursor.index];
            let position = current.data_offset + self.cursor.data_position;
            let chunk = (current.block_size - position).min(remaining.len() as u64) as usize;

            let expected_start;
            let target;
            if self.cursor.data_position == 0
                && chunk as u64 > current.data_length
                && !self.descriptor.shares_column(self.cursor.index)
            {
                // The write subsumes the block from its claim start: reuse
                // the block and overwrite its column in place.
                expected_start = current.last_data_offset();
                target = self.cursor.index;
                let current = &mut self.descriptor.blocks[target];
                delta += chunk as i64 - current.data_length as i64;
                current.data_length = chunk as u64;
            } else {
                // Fresh block for the overwritten range. It goes after the
                // current block when the cursor sits at the end of its
                // data, before it otherwise.
                let mut block = self.descriptor.allocate_block();
                block.data_offset = position;
                block.data_length = chunk as u64;
                expected_start = position;
                target = if self.cursor.data_position > 0 {
                    self.cursor.index + 1
                } else {
                    self.cursor.index
                };
                self.descriptor.blocks.insert(target, block);
                delta += chunk as i64;
            }

            let block = &self.descriptor.blocks[target];
            staged.put(
                block.block_name().to_string(),
                aligned_payload(block.data_offset, &remaining[..chunk]),
            );
            delta -= self.descriptor.sweep_covered(target, expected_start) as i64;

            self.cursor = Cursor {
                index: target,
                data_position: chunk as u64,
            };
            remaining = &remaining[chunk..];
            if remaining.is_empty() {
                break;
            }
        }

        // Step off a block written out to its capacity so the next write
        // starts cleanly in the following block. Allocating a fresh block
        // is deferred until something is actually written there.
        let current = &self.descriptor.blocks[self.cursor.index];
        if self.cursor.data_position == current.data_length
            && current.data_offset + self.cursor.data_position == current.block_size
            && self.cursor.index + 1 < self.descriptor.blocks.len()
        {
            self.cursor.index += 1;
            self.cursor.data_position = 0;
        }

        let now = now_millis();
        self.descriptor.last_modified = now;
        self.descriptor.last_accessed = now;
        self.descriptor.length = (self.descriptor.length as i64 + delta) as u64;
        debug_assert_eq!(self.descriptor.length, self.descriptor.blocks_length());

        trace!(
            file = %self.descriptor.name(),
            bytes = bytes.len(),
            columns = staged.len(),
            length = self.descriptor.length,
            "flushed buffer"
        );
        self.file.write_blocks(&self.descriptor, staged)
    }

    /// When the cursor sits at the capacity edge of the current block,
    /// move to the next block, allocating and appending one if the file
    /// ends here.
    fn advance_past_full_block(&mut self) {
        let current = &self.descriptor.blocks[self.cursor.index];
        if self.cursor.data_position == current.data_length
            && current.data_offset + self.cursor.data_position == current.block_size
        {
            if self.cursor.index + 1 == self.descriptor.blocks.len() {
                let block = self.descriptor.allocate_block();
                self.descriptor.blocks.push(block);
            }
            self.cursor.index += 1;
            self.cursor.data_position = 0;
        }
    }
}

/// Build a window-aligned column payload: the payload byte at index `i`
/// holds the block window byte `i`, so fragments are padded with zeros up
/// to their data offset.
fn aligned_payload(data_offset: u64, chunk: &[u8]) -> Bytes {
    if data_offset == 0 {
        return Bytes::copy_from_slice(chunk);
    }
    let mut payload = BytesMut::zeroed(data_offset as usize);
    payload.extend_from_slice(chunk);
    payload.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ColumnStore, MemoryCluster, MemoryStore};
    use crate::types::DESCRIPTOR_COLUMN;
    use std::sync::Arc;

    fn open_store() -> Arc<dyn ColumnStore> {
        let store = MemoryStore::new(Arc::new(MemoryCluster::new()), "lucene", "index");
        store.ensure_schema().unwrap();
        Arc::new(store)
    }

    fn writer_on(store: &Arc<dyn ColumnStore>, block_size: u64, buffer_size: usize) -> FileWriter {
        FileWriter::new(
            ColumnFile::new(store.clone()),
            FileDescriptor::new("test.bin", block_size),
            buffer_size,
        )
    }

    fn reload(store: &Arc<dyn ColumnStore>, name: &str) -> FileDescriptor {
        let payload = store
            .get_column(name.as_bytes(), DESCRIPTOR_COLUMN.as_bytes())
            .unwrap()
            .expect("descriptor column missing");
        FileDescriptor::decode(&payload).unwrap()
    }

    fn claims(descriptor: &FileDescriptor) -> Vec<(String, u64, u64)> {
        descriptor
            .blocks()
            .iter()
            .map(|b| (b.block_name().to_string(), b.data_offset(), b.data_length()))
            .collect()
    }

    #[test]
    fn test_sequential_write_single_block() {
        let store = open_store();
        let mut writer = writer_on(&store, 8, 8);
        writer.write_bytes(b"ABC").unwrap();
        writer.close().unwrap();

        let descriptor = reload(&store, "test.bin");
        assert_eq!(descriptor.length(), 3);
        assert_eq!(claims(&descriptor), vec![("BLOCK-0".into(), 0, 3)]);
        assert_eq!(
            store.get_column(b"test.bin", b"BLOCK-0").unwrap().unwrap().as_ref(),
            b"ABC"
        );
    }

    #[test]
    fn test_exact_block_size_write_keeps_one_block() {
        let store = open_store();
        let mut writer = writer_on(&store, 4, 4);
        writer.write_bytes(b"ABCD").unwrap();
        writer.close().unwrap();

        let descriptor = reload(&store, "test.bin");
        assert_eq!(descriptor.length(), 4);
        assert_eq!(claims(&descriptor), vec![("BLOCK-0".into(), 0, 4)]);
    }

    #[test]
    fn test_multi_block_write() {
        let store = open_store();
        let mut writer = writer_on(&store, 16, 64);
        writer.write_bytes(&[7u8; 40]).unwrap();
        writer.close().unwrap();

        let descriptor = reload(&store, "test.bin");
        assert_eq!(descriptor.length(), 40);
        assert_eq!(
            claims(&descriptor),
            vec![
                ("BLOCK-0".into(), 0, 16),
                ("BLOCK-1".into(), 0, 16),
                ("BLOCK-2".into(), 0, 8),
            ]
        );
    }

    #[test]
    fn test_interior_overwrite_produces_fragments() {
        let store = open_store();
        let mut writer = writer_on(&store, 8, 8);
        writer.write_bytes(b"ABCDEFGH").unwrap();
        writer.close().unwrap();

        let mut writer = FileWriter::new(
            ColumnFile::new(store.clone()),
            reload(&store, "test.bin"),
            8,
        );
        writer.seek(3).unwrap();
        writer.write_bytes(b"xy").unwrap();
        writer.close().unwrap();

        let descriptor = reload(&store, "test.bin");
        assert_eq!(descriptor.length(), 8);
        assert_eq!(
            claims(&descriptor),
            vec![
                ("BLOCK-0".into(), 0, 3),
                ("BLOCK-1".into(), 3, 2),
                ("BLOCK-0".into(), 5, 3),
            ]
        );
        // The original column is untouched; the fresh fragment column is
        // window-aligned (zero padding up to its data offset).
        assert_eq!(
            store.get_column(b"test.bin", b"BLOCK-0").unwrap().unwrap().as_ref(),
            b"ABCDEFGH"
        );
        assert_eq!(
            store.get_column(b"test.bin", b"BLOCK-1").unwrap().unwrap().as_ref(),
            &[0, 0, 0, b'x', b'y'][..]
        );
    }

    #[test]
    fn test_overwrite_extending_length() {
        let store = open_store();
        let mut writer = writer_on(&store, 4, 4);
        writer.write_bytes(b"ABCD").unwrap();
        writer.close().unwrap();

        let mut writer = FileWriter::new(
            ColumnFile::new(store.clone()),
            reload(&store, "test.bin"),
            4,
        );
        writer.seek(2).unwrap();
        writer.write_bytes(b"XYZW").unwrap();
        writer.close().unwrap();

        let descriptor = reload(&store, "test.bin");
        assert_eq!(descriptor.length(), 6);
        assert_eq!(descriptor.blocks_length(), 6);
    }

    #[test]
    fn test_append_after_reopen() {
        let store = open_store();
        let mut writer = writer_on(&store, 8, 8);
        writer.write_bytes(b"ABC").unwrap();
        writer.close().unwrap();

        let mut writer = FileWriter::new(
            ColumnFile::new(store.clone()),
            reload(&store, "test.bin"),
            8,
        );
        writer.seek(3).unwrap();
        writer.write_bytes(b"DEF").unwrap();
        writer.close().unwrap();

        let descriptor = reload(&store, "test.bin");
        assert_eq!(descriptor.length(), 6);
        assert_eq!(descriptor.blocks_length(), 6);
        // The appended range is a fresh column; the original column keeps
        // its bytes under the original claim.
        assert_eq!(
            claims(&descriptor),
            vec![("BLOCK-0".into(), 0, 3), ("BLOCK-1".into(), 3, 3)]
        );
    }

    #[test]
    fn test_small_buffer_spans_blocks() {
        let store = open_store();
        let mut writer = writer_on(&store, 8, 4);
        writer.write_bytes(b"ABCDEFGHIJ").unwrap();
        writer.close().unwrap();

        let descriptor = reload(&store, "test.bin");
        assert_eq!(descriptor.length(), 10);
        assert_eq!(descriptor.blocks_length(), 10);
    }

    #[test]
    fn test_flush_per_buffer_updates_length() {
        let store = open_store();
        let mut writer = writer_on(&store, 8, 4);
        writer.write_bytes(b"AB").unwrap();
        // Not flushed yet: the descriptor still reports the old length.
        assert_eq!(writer.length(), 0);
        writer.write_bytes(b"CD").unwrap();
        // The buffer filled and drained.
        assert_eq!(writer.length(), 4);
        writer.close().unwrap();
    }

    #[test]
    fn test_seek_past_end_fails() {
        let store = open_store();
        let mut writer = writer_on(&store, 8, 8);
        writer.write_bytes(b"AB").unwrap();
        writer.close().unwrap();

        let mut writer = FileWriter::new(
            ColumnFile::new(store.clone()),
            reload(&store, "test.bin"),
            8,
        );
        assert!(matches!(
            writer.seek(3),
            Err(Error::InvalidSeek { position: 3, length: 2 })
        ));
    }

    #[test]
    fn test_write_after_close_fails() {
        let store = open_store();
        let mut writer = writer_on(&store, 8, 8);
        writer.write_bytes(b"AB").unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.write_bytes(b"C").is_err());
    }
}
