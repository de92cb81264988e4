//! Buffered input stream for a column-backed file.
//!
//! Reads go through a read-ahead buffer; refilling it resolves the run of
//! blocks covering the wanted range, fetches their columns in one
//! multi-get and copies the claimed slice out of each window-aligned
//! payload.

use std::collections::BTreeSet;

use tracing::trace;

use crate::descriptor::{Cursor, FileDescriptor};
use crate::file::ColumnFile;
use crate::{Error, Result};

/// Read-ahead input stream for one file.
///
/// The reader keeps the descriptor snapshot and length observed when the
/// file was opened; flushes by a concurrent writer are not seen without
/// reopening.
#[derive(Debug)]
pub struct FileReader {
    /// Raw block I/O for this file's row.
    file: ColumnFile,
    /// Descriptor snapshot taken at open.
    descriptor: FileDescriptor,
    /// Block-list position of the next unbuffered byte.
    cursor: Cursor,
    /// File length observed at open.
    length: u64,
    /// Logical position of the next unbuffered byte.
    position: u64,
    /// Read-ahead buffer.
    buffer: Vec<u8>,
    /// Consumption offset within `buffer`.
    buffer_pos: usize,
    /// Capacity target for each refill.
    buffer_size: usize,
}

impl FileReader {
    pub(crate) fn new(file: ColumnFile, descriptor: FileDescriptor, buffer_size: usize) -> Self {
        let length = descriptor.length();
        Self {
            file,
            descriptor,
            cursor: Cursor::default(),
            length,
            position: 0,
            buffer: Vec::new(),
            buffer_pos: 0,
            buffer_size,
        }
    }

    /// The file length observed when the stream was opened.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Read up to `out.len()` bytes into `out`, returning the number of
    /// bytes read. Returns 0 at end of file.
    pub fn read_bytes(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut copied = 0;
        while copied < out.len() {
            if self.buffer_pos == self.buffer.len() {
                self.refill()?;
                if self.buffer.is_empty() {
                    break;
                }
            }
            let take = (out.len() - copied).min(self.buffer.len() - self.buffer_pos);
            out[copied..copied + take]
                .copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + take]);
            self.buffer_pos += take;
            copied += take;
        }
        Ok(copied)
    }

    /// Move the logical cursor. Seeking past the end of the file fails.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.length {
            return Err(Error::InvalidSeek {
                position,
                length: self.length,
            });
        }
        self.cursor = self.descriptor.seek(position)?;
        self.position = position;
        self.buffer.clear();
        self.buffer_pos = 0;
        Ok(())
    }

    /// There is nothing to release; present for surface symmetry.
    pub fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Refill the read-ahead buffer from the store.
    fn refill(&mut self) -> Result<()> {
        self.buffer.clear();
        self.buffer_pos = 0;
        let want = (self.buffer_size as u64).min(self.length - self.position) as usize;
        if want == 0 {
            return Ok(());
        }
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.resize(want, 0);
        self.read_internal(&mut buffer)?;
        self.buffer = buffer;
        self.position += want as u64;
        Ok(())
    }

    /// Read exactly `out.len()` bytes starting at the cursor.
    fn read_internal(&mut self, out: &mut [u8]) -> Result<()> {
        // Collect the run of blocks covering the range, then fetch their
        // columns in a single multi-get.
        let start = self.cursor;
        let blocks = self.descriptor.blocks();
        let mut names = BTreeSet::new();
        let mut run = Vec::new();
        let mut needed = out.len() as u64;
        let mut index = start.index;
        let mut data_position = start.data_position;
        while needed > 0 && index < blocks.len() {
            let block = &blocks[index];
            let available = block.data_length() - data_position;
            if available > 0 {
                names.insert(block.block_name().as_bytes().to_vec());
                run.push(index);
                needed = needed.saturating_sub(available);
            }
            index += 1;
            data_position = 0;
        }
        if needed > 0 {
            return Err(Error::corruption(format!(
                "file {} has fewer block bytes than its length claims",
                self.descriptor.name()
            )));
        }

        trace!(
            file = %self.descriptor.name(),
            bytes = out.len(),
            columns = names.len(),
            "filling read buffer"
        );
        let payloads = self.file.read_blocks(&self.descriptor, &names)?;

        let mut offset = 0;
        for &index in &run {
            let block = &self.descriptor.blocks()[index];
            let data_position = if index == start.index {
                start.data_position
            } else {
                0
            };
            let take = ((block.data_length() - data_position) as usize).min(out.len() - offset);
            let payload = payloads.get(block.block_name().as_bytes()).ok_or_else(|| {
                Error::corruption(format!(
                    "block column {} missing for file {}",
                    block.block_name(),
                    self.descriptor.name()
                ))
            })?;
            let from = (block.data_offset() + data_position) as usize;
            let slice = payload.get(from..from + take).ok_or_else(|| {
                Error::corruption(format!(
                    "block column {} shorter than its claim for file {}",
                    block.block_name(),
                    self.descriptor.name()
                ))
            })?;
            out[offset..offset + take].copy_from_slice(slice);
            offset += take;
            self.cursor = Cursor {
                index,
                data_position: data_position + take as u64,
            };
        }

        // Step past a block consumed exactly to its end.
        let blocks = self.descriptor.blocks();
        if self.cursor.data_position == blocks[self.cursor.index].data_length()
            && self.cursor.index + 1 < blocks.len()
        {
            self.cursor.index += 1;
            self.cursor.data_position = 0;
        }
        Ok(())
    }
}
