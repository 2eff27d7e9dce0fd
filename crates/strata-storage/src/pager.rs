//! Page allocation
//!
//! A byte store is carved into fixed-size pages numbered from 1. Page `p`
//! occupies bytes `[(p - 1) * page_size, p * page_size)`; page 0 is never
//! allocated and serves as the "no page" marker inside encoded pages.
//!
//! Allocation is append-only: numbers only grow and are never handed out
//! twice, so a segment written through a page manager owns a contiguous
//! run of pages that nothing else will touch.

use std::fs::File;

use strata_core::{Error, Result};

use crate::StorageConfig;

/// Page number within a byte store (1-based)
pub type PageNum = u32;

/// Marker for "no page"
pub const NO_PAGE: PageNum = 0;

/// Byte offset of a page within its store
pub fn page_offset(page: PageNum, page_size: usize) -> u64 {
    debug_assert!(page != NO_PAGE);
    (page as u64 - 1) * page_size as u64
}

/// First page number that lies entirely past `len` bytes
fn first_free_page(len: u64, page_size: usize) -> Result<PageNum> {
    let used = len.div_ceil(page_size as u64);
    PageNum::try_from(used + 1)
        .map_err(|_| Error::InvalidOperation(format!("store of {} bytes exceeds page range", len)))
}

/// Allocator of page numbers for one byte store
pub trait PageManager {
    /// Size of every page handed out by this manager
    fn page_size(&self) -> usize;

    /// Returns the next unused page number
    fn allocate_page(&mut self) -> Result<PageNum>;

    /// Number of pages allocated through this manager so far
    fn allocated(&self) -> u32;
}

impl<P: PageManager + ?Sized> PageManager for &mut P {
    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    fn allocate_page(&mut self) -> Result<PageNum> {
        (**self).allocate_page()
    }

    fn allocated(&self) -> u32 {
        (**self).allocated()
    }
}

/// Page manager for a file-backed store
///
/// Allocation starts after the file's current extent. Each allocated page
/// is reserved by growing the file, so independent read handles see the
/// full extent even before the page bytes are written.
#[derive(Debug)]
pub struct FilePageManager {
    file: File,
    page_size: usize,
    next: PageNum,
    allocated: u32,
}

impl FilePageManager {
    /// Bind a page manager to an open file
    pub fn new(file: &File, config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        let len = file.metadata()?.len();
        let next = first_free_page(len, config.page_size)?;

        tracing::debug!(len, next, page_size = config.page_size, "file page manager opened");

        Ok(Self {
            file: file.try_clone()?,
            page_size: config.page_size,
            next,
            allocated: 0,
        })
    }
}

impl PageManager for FilePageManager {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn allocate_page(&mut self) -> Result<PageNum> {
        let page = self.next;
        let end = page_offset(page, self.page_size) + self.page_size as u64;
        if self.file.metadata()?.len() < end {
            self.file.set_len(end)?;
        }

        self.next = page
            .checked_add(1)
            .ok_or_else(|| Error::InvalidOperation("page numbers exhausted".into()))?;
        self.allocated += 1;
        Ok(page)
    }

    fn allocated(&self) -> u32 {
        self.allocated
    }
}

/// Page manager for an in-memory buffer store
///
/// The buffer is grown by the segment writer when pages are written; the
/// manager only hands out numbers past the buffer's length at creation.
#[derive(Debug)]
pub struct MemoryPageManager {
    page_size: usize,
    next: PageNum,
    allocated: u32,
}

impl MemoryPageManager {
    /// Bind a page manager to a buffer holding `buffer.len()` bytes
    pub fn new(buffer: &[u8], config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            page_size: config.page_size,
            next: first_free_page(buffer.len() as u64, config.page_size)?,
            allocated: 0,
        })
    }
}

impl PageManager for MemoryPageManager {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn allocate_page(&mut self) -> Result<PageNum> {
        let page = self.next;
        self.next = page
            .checked_add(1)
            .ok_or_else(|| Error::InvalidOperation("page numbers exhausted".into()))?;
        self.allocated += 1;
        Ok(page)
    }

    fn allocated(&self) -> u32 {
        self.allocated
    }
}
