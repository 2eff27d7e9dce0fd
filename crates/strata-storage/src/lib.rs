//! # Strata Storage
//!
//! Segment storage for Strata.
//!
//! ## ⚠️ Internal Implementation Detail
//!
//! **This crate is an internal implementation detail of Strata.**
//!
//! Users should depend on the main `strata` crate instead, which provides
//! the stable public API. This crate's API may change without notice
//! between minor versions.
//!
//! ---
//!
//! This crate provides the segment layer of an LSM-tree:
//!
//! - **Memory segment**: In-memory write buffer using BTreeMap for sorted order
//! - **Page manager**: Append-only page allocation over a file or buffer
//! - **B-tree segments**: Immutable paged trees with overflow chains
//! - **MultiCursor**: Priority merge of any number of segment cursors
//! - **LivingCursor**: Hides tombstones from a merged view
//!
//! ## Architecture
//!
//! ```text
//! Writes → MemorySegment ──write_segment──▶ B-tree pages (file / buffer)
//!              │                                  │
//!         MemoryCursor                       BTreeCursor
//!              └──────────▶ MultiCursor ◀─────────┘
//!                               │
//!                          LivingCursor → reads
//! ```

use strata_core::{Error, Result};

pub mod living;
pub mod memory;
pub mod merge;
pub mod page;
pub mod pager;
pub mod reader;
pub mod segment;
pub mod writer;

pub use living::LivingCursor;
pub use memory::{MemoryCursor, MemorySegment};
pub use merge::MultiCursor;
pub use page::{max_inline_key, OverflowReader};
pub use pager::{FilePageManager, MemoryPageManager, PageManager, PageNum, NO_PAGE};
pub use reader::BTreeCursor;
pub use segment::SegmentLocator;
pub use writer::{write_segment, SegmentWriter};

/// Default page size (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Smallest supported page size
pub const MIN_PAGE_SIZE: usize = 128;

/// Largest supported page size (16MB)
pub const MAX_PAGE_SIZE: usize = 16 * 1024 * 1024;

/// Storage configuration
///
/// The page size is not recorded in the store; writers and readers of the
/// same store must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    /// Size of every page in bytes
    pub page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StorageConfig {
    /// Set the page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::InvalidOperation(format!(
                "page size {} outside {}..={}",
                self.page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }
}
