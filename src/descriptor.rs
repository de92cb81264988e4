//! File descriptors - the inode equivalent for column-backed files.
//!
//! A descriptor carries the file metadata (name, length, timestamps, a
//! logical-deletion flag) and the ordered list of blocks whose data, read
//! in order, forms the file's byte content. It is persisted as a
//! self-describing JSON payload under the well-known `DESCRIPTOR` column
//! of the file's row, which keeps the format readable by disparate
//! clients.
//!
//! # Blocks and fragments
//!
//! Each block owns a *claim* `[dataOffset, dataOffset + dataLength)` into
//! a block-sized window; the column payload is window-aligned, so the
//! payload byte at index `i` is the window byte `i`. A block whose claim
//! does not span its whole window is a fragment. Fragments produced by
//! splitting share the original block's column; freshly written fragments
//! get a new column padded up to their `dataOffset`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::block_column_name;
use crate::{Error, Result};

/// Cursor state for a stream positioned inside a descriptor's block list.
///
/// The within-block position is transient per stream and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Cursor {
    /// Index of the current block in the descriptor's block list.
    pub index: usize,
    /// Position of the file pointer relative to the block's data,
    /// `0 ..= data_length`.
    pub data_position: u64,
}

/// One contiguous byte run of a file, stored as one column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlock {
    /// Name of the column that holds this block's bytes.
    #[serde(rename = "columnName")]
    pub(crate) block_name: String,

    /// Unique number of this block within its file, monotonic by
    /// allocation order (not necessarily by list order, since splits
    /// insert freshly numbered blocks between older ones).
    #[serde(rename = "blockNumber")]
    pub(crate) block_number: u32,

    /// Capacity ceiling of this block, fixed at creation.
    #[serde(rename = "blockSize")]
    pub(crate) block_size: u64,

    /// Offset within the block window at which valid bytes begin.
    /// Non-zero for fragments.
    #[serde(rename = "dataOffset")]
    pub(crate) data_offset: u64,

    /// Number of valid bytes beginning at `data_offset`.
    #[serde(rename = "dataLength")]
    pub(crate) data_length: u64,
}

impl FileBlock {
    /// Name of the column holding this block's bytes.
    pub fn block_name(&self) -> &str {
        &self.block_name
    }

    /// This block's allocation number.
    pub fn block_number(&self) -> u32 {
        self.block_number
    }

    /// Capacity ceiling of this block.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Offset within the block window at which valid bytes begin.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Number of valid bytes beginning at `data_offset`.
    pub fn data_length(&self) -> u64 {
        self.data_length
    }

    /// Offset just past the last valid byte, relative to the window.
    pub fn last_data_offset(&self) -> u64 {
        self.data_offset + self.data_length
    }

    /// A fragment of this block: a fresh value referencing the same
    /// column with a narrowed claim.
    pub(crate) fn fragment(&self, data_offset: u64, data_length: u64) -> FileBlock {
        FileBlock {
            block_name: self.block_name.clone(),
            block_number: self.block_number,
            block_size: self.block_size,
            data_offset,
            data_length,
        }
    }
}

/// The metadata of one file: name, length, timestamps, deletion flag and
/// the ordered block list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// File name, also the row key.
    pub(crate) name: String,

    /// Current logical byte length of the file.
    pub(crate) length: u64,

    /// Logical tombstone: the row cannot be deleted from the store, so a
    /// deleted file is merely hidden from listing and opening.
    pub(crate) deleted: bool,

    /// Timestamp at which the file was last modified (ms since epoch).
    #[serde(rename = "lastModified", default)]
    pub(crate) last_modified: i64,

    /// Timestamp at which the file was last accessed (ms since epoch).
    #[serde(rename = "lastAccessed", default)]
    pub(crate) last_accessed: i64,

    /// Maximum number of bytes any one block may hold. Older payloads may
    /// lack this field; a zero value is replaced with the directory's
    /// configured block size on load.
    #[serde(rename = "blockSize", default)]
    pub(crate) block_size: u64,

    /// The ordered list of blocks in this file.
    pub(crate) blocks: Vec<FileBlock>,

    /// Number to use for the next allocated block. Derived from the block
    /// list on first use, never persisted.
    #[serde(skip)]
    next_block_number: Option<u32>,
}

impl FileDescriptor {
    /// Create an empty descriptor for the given file name and block size.
    pub fn new(name: impl Into<String>, block_size: u64) -> Self {
        let now = crate::types::now_millis();
        Self {
            name: name.into(),
            length: 0,
            deleted: false,
            last_modified: now,
            last_accessed: now,
            block_size,
            blocks: Vec::new(),
            next_block_number: None,
        }
    }

    /// The file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current logical byte length of the file.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Whether the file has been logically deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Timestamp at which the file was last modified (ms since epoch).
    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// Timestamp at which the file was last accessed (ms since epoch).
    pub fn last_accessed(&self) -> i64 {
        self.last_accessed
    }

    /// The block size this file was created with.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// The ordered block list.
    pub fn blocks(&self) -> &[FileBlock] {
        &self.blocks
    }

    /// Sum of the data lengths over all blocks. Always equal to
    /// [`length`](Self::length) for a well-formed descriptor.
    pub fn blocks_length(&self) -> u64 {
        self.blocks.iter().map(|b| b.data_length).sum()
    }

    /// Serialize to the JSON payload stored in the descriptor column.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Deserialize from a descriptor column payload.
    pub fn decode(payload: &[u8]) -> Result<FileDescriptor> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Fill in defaults that older payloads may omit.
    pub(crate) fn normalize(&mut self, default_block_size: u64) {
        if self.block_size == 0 {
            self.block_size = default_block_size;
        }
    }

    /// Allocate a fresh, empty block with the next monotonic number.
    ///
    /// The caller decides where the block goes in the list.
    pub(crate) fn allocate_block(&mut self) -> FileBlock {
        let number = self.next_block_number();
        FileBlock {
            block_name: block_column_name(number),
            block_number: number,
            block_size: self.block_size,
            data_offset: 0,
            data_length: 0,
        }
    }

    /// The next block number, starting at zero and counting up from the
    /// highest number found in the list on first use.
    fn next_block_number(&mut self) -> u32 {
        let next = self.next_block_number.unwrap_or_else(|| {
            self.blocks
                .iter()
                .map(|b| b.block_number + 1)
                .max()
                .unwrap_or(0)
        });
        self.next_block_number = Some(next + 1);
        next
    }

    /// Locate the block containing the given logical file position.
    ///
    /// A position on a block boundary resolves to the end of the earlier
    /// block; a position equal to the file length resolves to the end of
    /// the last block.
    pub(crate) fn seek(&self, position: u64) -> Result<Cursor> {
        if position > self.length {
            return Err(Error::InvalidSeek {
                position,
                length: self.length,
            });
        }
        let mut start = 0u64;
        for (index, block) in self.blocks.iter().enumerate() {
            let end = start + block.data_length;
            if position <= end {
                return Ok(Cursor {
                    index,
                    data_position: position - start,
                });
            }
            start = end;
        }
        Ok(Cursor::default())
    }

    /// Whether another list entry references the same column as the block
    /// at `index`. Rewriting a shared column in place would corrupt the
    /// sibling fragment's bytes.
    pub(crate) fn shares_column(&self, index: usize) -> bool {
        let name = &self.blocks[index].block_name;
        self.blocks
            .iter()
            .enumerate()
            .any(|(i, b)| i != index && b.block_name == *name)
    }

    /// Split the block at `index` at data position `at`, in preparation
    /// for a write that starts inside its claim. The head keeps the
    /// original claim's first `at` bytes; the block itself shrinks to the
    /// tail. Both keep referencing the original column.
    pub(crate) fn split_block(&mut self, index: usize, at: u64) {
        let block = &mut self.blocks[index];
        debug_assert!(at > 0 && at < block.data_length);
        let head = block.fragment(block.data_offset, at);
        block.data_offset += at;
        block.data_length -= at;
        self.blocks.insert(index, head);
    }

    /// Drop or trim the blocks after `target` whose claims were covered by
    /// the freshly written claim of `blocks[target]`.
    ///
    /// Walks only the contiguous run of same-window fragments (each
    /// candidate's `data_offset` must equal the previous claim's end,
    /// starting from `expected_start`), removing fully covered ones and
    /// head-trimming a partially covered one. The trimmed remainder is the
    /// surviving tail fragment of the overwritten block. Returns the
    /// number of logical bytes dropped from the list.
    pub(crate) fn sweep_covered(&mut self, target: usize, mut expected_start: u64) -> u64 {
        let end = self.blocks[target].last_data_offset();
        let mut dropped = 0;
        let mut index = target + 1;
        while index < self.blocks.len() {
            let block = &self.blocks[index];
            if block.data_offset != expected_start || block.data_offset >= end {
                break;
            }
            expected_start = block.last_data_offset();
            if block.last_data_offset() <= end {
                dropped += block.data_length;
                self.blocks.remove(index);
            } else {
                dropped += end - block.data_offset;
                let block = &mut self.blocks[index];
                block.data_length = block.last_data_offset() - end;
                block.data_offset = end;
                break;
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_with_blocks(blocks: Vec<FileBlock>) -> FileDescriptor {
        let mut d = FileDescriptor::new("test.bin", 8);
        d.length = blocks.iter().map(|b| b.data_length).sum();
        d.blocks = blocks;
        d
    }

    fn block(number: u32, data_offset: u64, data_length: u64) -> FileBlock {
        FileBlock {
            block_name: block_column_name(number),
            block_number: number,
            block_size: 8,
            data_offset,
            data_length,
        }
    }

    #[test]
    fn test_codec_round_trip() {
        let d = descriptor_with_blocks(vec![block(0, 0, 3), block(2, 3, 2), block(0, 5, 3)]);
        let payload = d.encode().unwrap();
        let decoded = FileDescriptor::decode(&payload).unwrap();

        assert_eq!(decoded.name(), d.name());
        assert_eq!(decoded.length(), d.length());
        assert_eq!(decoded.is_deleted(), d.is_deleted());
        assert_eq!(decoded.last_modified(), d.last_modified());
        assert_eq!(decoded.last_accessed(), d.last_accessed());
        assert_eq!(decoded.block_size(), d.block_size());
        assert_eq!(decoded.blocks(), d.blocks());
    }

    #[test]
    fn test_payload_field_names_are_stable() {
        let d = descriptor_with_blocks(vec![block(1, 2, 4)]);
        let payload = d.encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        for field in ["name", "length", "deleted", "lastModified", "lastAccessed", "blockSize"] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        let entry = &json["blocks"][0];
        assert_eq!(entry["columnName"], "BLOCK-1");
        assert_eq!(entry["blockNumber"], 1);
        assert_eq!(entry["blockSize"], 8);
        assert_eq!(entry["dataOffset"], 2);
        assert_eq!(entry["dataLength"], 4);
    }

    #[test]
    fn test_decode_tolerates_absent_optional_fields() {
        // Older payloads omit blockSize and the timestamps.
        let payload = br#"{"name":"old.bin","length":5,"deleted":false,
            "blocks":[{"columnName":"BLOCK-0","blockNumber":0,"blockSize":8,
                       "dataOffset":0,"dataLength":5}]}"#;
        let mut decoded = FileDescriptor::decode(payload).unwrap();

        assert_eq!(decoded.block_size(), 0);
        assert_eq!(decoded.last_modified(), 0);
        assert_eq!(decoded.last_accessed(), 0);

        decoded.normalize(1024);
        assert_eq!(decoded.block_size(), 1024);
    }

    #[test]
    fn test_block_numbers_resume_after_decode() {
        let d = descriptor_with_blocks(vec![block(0, 0, 8), block(3, 0, 8)]);
        let mut decoded = FileDescriptor::decode(&d.encode().unwrap()).unwrap();

        let fresh = decoded.allocate_block();
        assert_eq!(fresh.block_number(), 4);
        assert_eq!(fresh.block_name(), "BLOCK-4");
        assert_eq!(fresh.block_size(), 8);

        let next = decoded.allocate_block();
        assert_eq!(next.block_number(), 5);
    }

    #[test]
    fn test_allocation_starts_at_zero() {
        let mut d = FileDescriptor::new("fresh.bin", 16);
        assert_eq!(d.allocate_block().block_number(), 0);
        assert_eq!(d.allocate_block().block_number(), 1);
    }

    #[test]
    fn test_seek_positions() {
        let d = descriptor_with_blocks(vec![block(0, 0, 3), block(1, 3, 5)]);

        assert_eq!(d.seek(0).unwrap(), Cursor { index: 0, data_position: 0 });
        assert_eq!(d.seek(2).unwrap(), Cursor { index: 0, data_position: 2 });
        // A boundary position lands at the end of the earlier block.
        assert_eq!(d.seek(3).unwrap(), Cursor { index: 0, data_position: 3 });
        assert_eq!(d.seek(5).unwrap(), Cursor { index: 1, data_position: 2 });
        // The file length lands at the end of the last block.
        assert_eq!(d.seek(8).unwrap(), Cursor { index: 1, data_position: 5 });
    }

    #[test]
    fn test_seek_past_end_fails() {
        let d = descriptor_with_blocks(vec![block(0, 0, 4)]);
        assert!(matches!(
            d.seek(5),
            Err(Error::InvalidSeek { position: 5, length: 4 })
        ));
    }

    #[test]
    fn test_seek_empty_file() {
        let d = FileDescriptor::new("empty.bin", 8);
        assert_eq!(d.seek(0).unwrap(), Cursor::default());
        assert!(d.seek(1).is_err());
    }

    #[test]
    fn test_split_block() {
        let mut d = descriptor_with_blocks(vec![block(0, 0, 8)]);
        d.split_block(0, 3);

        assert_eq!(d.blocks.len(), 2);
        assert_eq!(d.blocks[0].block_name(), "BLOCK-0");
        assert_eq!((d.blocks[0].data_offset, d.blocks[0].data_length), (0, 3));
        assert_eq!(d.blocks[1].block_name(), "BLOCK-0");
        assert_eq!((d.blocks[1].data_offset, d.blocks[1].data_length), (3, 5));
        assert_eq!(d.blocks_length(), 8);
    }

    #[test]
    fn test_shares_column() {
        let mut d = descriptor_with_blocks(vec![block(0, 0, 8), block(1, 0, 8)]);
        assert!(!d.shares_column(0));

        d.split_block(0, 2);
        assert!(d.shares_column(0));
        assert!(d.shares_column(1));
        assert!(!d.shares_column(2));
    }

    #[test]
    fn test_sweep_removes_fully_covered_fragment() {
        // New block claims [2, 4); the old tail fragment [2, 4) is covered.
        let mut d = descriptor_with_blocks(vec![block(0, 0, 2), block(2, 2, 2), block(0, 2, 2)]);
        let dropped = d.sweep_covered(1, 2);

        assert_eq!(dropped, 2);
        assert_eq!(d.blocks.len(), 2);
        assert_eq!(d.blocks[1].block_name(), "BLOCK-2");
    }

    #[test]
    fn test_sweep_trims_partially_covered_fragment() {
        // New block claims [3, 5); the old tail [3, 8) survives as [5, 8).
        let mut d = descriptor_with_blocks(vec![block(0, 0, 3), block(1, 3, 2), block(0, 3, 5)]);
        let dropped = d.sweep_covered(1, 3);

        assert_eq!(dropped, 2);
        assert_eq!(d.blocks.len(), 3);
        assert_eq!(d.blocks[2].block_name(), "BLOCK-0");
        assert_eq!((d.blocks[2].data_offset, d.blocks[2].data_length), (5, 3));
    }

    #[test]
    fn test_sweep_stops_at_next_window() {
        // The block after the written one starts a new window (offset 0);
        // its claim must survive even though its numbers look covered.
        let mut d = descriptor_with_blocks(vec![block(2, 0, 8), block(1, 0, 8)]);
        let dropped = d.sweep_covered(0, 8);

        assert_eq!(dropped, 0);
        assert_eq!(d.blocks.len(), 2);
    }
}
