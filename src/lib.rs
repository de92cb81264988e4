//! # blockdir
//!
//! A block-mapped virtual file directory layered over a distributed
//! wide-column store.
//!
//! A full-text index (or any other consumer of a flat file directory) can
//! mount one column family as a directory: each file is a row, each
//! fixed-size block of the file is one column value, and a well-known
//! `DESCRIPTOR` column holds the inode-like metadata that stitches the
//! blocks into an ordered byte stream. Because the unit transferred to
//! and from the store is a large block, a buffer's worth of data costs a
//! single round trip.
//!
//! ## Features
//!
//! - **Block-mapped files**: capped-size blocks as column values, the
//!   recommended way to keep large objects out of a single cell
//! - **Fragment-aware overwrites**: random-offset writes split existing
//!   blocks instead of re-uploading their unchanged bytes
//! - **Failure-atomic flushes**: every flush writes the blocks and the
//!   re-encoded descriptor as one row batch
//! - **Logical deletion**: rows cannot be deleted from the store, so
//!   deletion flips a descriptor flag and hides the file
//! - **Pluggable store**: anything implementing [`ColumnStore`] can back
//!   a directory; [`MemoryStore`] ships in-process
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use blockdir::{Directory, MemoryCluster, MemoryStore, Options};
//!
//! # fn main() -> blockdir::Result<()> {
//! let options = Options::new("segments");
//! let store = Arc::new(MemoryStore::from_options(
//!     Arc::new(MemoryCluster::new()),
//!     &options,
//! ));
//! let dir = Directory::open(store, &options)?;
//!
//! let mut out = dir.create_output("hello.bin")?;
//! out.write_bytes(b"hello, column family")?;
//! out.close()?;
//!
//! let mut input = dir.open_input("hello.bin")?;
//! let mut content = vec![0u8; input.length() as usize];
//! input.read_bytes(&mut content)?;
//! assert_eq!(content, b"hello, column family");
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod descriptor;
pub mod error;
pub mod options;
pub mod store;
pub mod types;

// Internal modules
mod directory;
mod file;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use options::{Options, OptionsBuilder};
pub use types::{BlockMap, BLOCK_COLUMN_PREFIX, DESCRIPTOR_COLUMN};

// Descriptor model
pub use descriptor::{FileBlock, FileDescriptor};

// Directory and streams
pub use directory::Directory;
pub use file::{FileReader, FileWriter};

// Store backends
pub use store::{ColumnStore, MemoryCluster, MemoryStore};
