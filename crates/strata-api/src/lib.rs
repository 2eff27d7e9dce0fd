//! # Strata
//!
//! Immutable paged B-tree segments, in-memory segments and composable
//! cursors: the storage core of a log-structured merge engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::fs::OpenOptions;
//! use strata::{
//!     write_segment, BTreeCursor, Cursor, FilePageManager, LivingCursor, MemorySegment,
//!     MultiCursor, SeekOp, StorageConfig,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StorageConfig::default();
//!     let file = OpenOptions::new()
//!         .read(true)
//!         .write(true)
//!         .create(true)
//!         .open("./segments.db")?;
//!
//!     // Flush a memory segment into an immutable B-tree segment
//!     let mut older = MemorySegment::new();
//!     older.insert("user:1:name", "Alice");
//!     older.insert("user:1:email", "alice@example.com");
//!     let pages = FilePageManager::new(&file, &config)?;
//!     let locator = write_segment(&mut &file, pages, &mut older.open_cursor())?;
//!
//!     // Newer writes shadow older ones; tombstones hide keys
//!     let mut newer = MemorySegment::new();
//!     newer.delete("user:1:email");
//!
//!     let mut view = LivingCursor::new(MultiCursor::new(vec![
//!         Box::new(newer.open_cursor()),
//!         Box::new(BTreeCursor::open(&file, &config, locator)?),
//!     ]));
//!
//!     view.seek(b"user:1:name", SeekOp::Eq)?;
//!     if let Some(name) = view.read_value()? {
//!         println!("Name: {}", String::from_utf8_lossy(&name));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Building Blocks
//!
//! - [`MemorySegment`]: mutable sorted map with tombstones
//! - [`SegmentWriter`] / [`write_segment`]: single-pass bulk load of a
//!   sorted cursor into pages, with overflow chains for large keys and values
//! - [`BTreeCursor`]: bidirectional cursor over a written segment
//! - [`MultiCursor`]: priority merge of several cursors, earlier wins
//! - [`LivingCursor`]: hides tombstones from any cursor
//! - [`logging`]: `tracing` subscriber setup for the storage events

pub mod logging;

// Re-export core types
pub use strata_core::{
    count_backward, count_forward, keys_backward, keys_forward, Cursor, Entries, Error, Result,
    SeekOp, Value, TOMBSTONE_LENGTH,
};

// Storage components
pub use strata_storage::{
    max_inline_key, BTreeCursor, FilePageManager, LivingCursor, MemoryCursor, MemoryPageManager,
    MemorySegment, MultiCursor, OverflowReader, PageManager, PageNum, SegmentLocator,
    SegmentWriter, StorageConfig, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE, NO_PAGE,
};
pub use strata_storage::write_segment;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
