//! B-tree segment writer
//!
//! Builds an immutable B-tree from entries supplied in strictly ascending
//! key order, in a single forward pass:
//!
//! ```text
//! entries ──▶ leaf builder ──full──▶ leaf page
//!                                       │ (page, first key)
//!                                       ▼
//!                          level 0 builder ──full──▶ interior page
//!                                                        │
//!                                                        ▼
//!                                               level 1 builder ...
//! ```
//!
//! Pages are only ever appended. A node is written after all of its
//! children, so every child page number is below its parent's and the
//! root is the last page written.

use std::io::{Read, Seek, SeekFrom, Write};

use serde::Serialize;
use strata_core::{Cursor, Error, Result};

use crate::page::{
    cell_size, encode_node, max_inline_key, node_size, overflow_capacity, InteriorCell, KeyCell,
    LeafCell, ValueCell, OVERFLOW_HEADER, PAGE_INTERIOR, PAGE_LEAF, PAGE_OVERFLOW,
};
use crate::pager::{page_offset, PageManager, PageNum, NO_PAGE};
use crate::segment::SegmentLocator;
use crate::StorageConfig;

/// Cells accumulated for the node currently being filled
struct NodeBuilder<T> {
    cells: Vec<T>,
    /// Encoded size of `cells`
    bytes: u64,
    /// Nodes already written from this builder
    written: u32,
}

impl<T: Serialize> NodeBuilder<T> {
    fn new() -> Self {
        Self {
            cells: Vec::new(),
            bytes: 0,
            written: 0,
        }
    }

    fn fits(&self, cell_bytes: u64, page_size: usize) -> Result<bool> {
        Ok(node_size(self.cells.len() + 1, self.bytes + cell_bytes)? <= page_size as u64)
    }

    fn push(&mut self, cell: T, cell_bytes: u64) {
        self.cells.push(cell);
        self.bytes += cell_bytes;
    }

    fn take(&mut self) -> Vec<T> {
        self.bytes = 0;
        self.written += 1;
        std::mem::take(&mut self.cells)
    }
}

/// Streaming B-tree segment writer
///
/// Entries are added with [`add_value`](Self::add_value) and
/// [`add_tombstone`](Self::add_tombstone); [`finish`](Self::finish) writes
/// the remaining nodes and returns the segment's locator.
pub struct SegmentWriter<'a, W, P> {
    store: &'a mut W,
    pages: P,
    page_size: usize,
    leaf: NodeBuilder<LeafCell>,
    /// Interior builders, index 0 just above the leaves
    levels: Vec<NodeBuilder<InteriorCell>>,
    last_key: Option<Vec<u8>>,
    /// Set once any operation has failed; the pages written so far do not
    /// form a usable tree
    failed: bool,
    first_page: PageNum,
    page_count: u32,
    entry_count: u64,
}

impl<'a, W: Write + Seek, P: PageManager> SegmentWriter<'a, W, P> {
    /// Create a writer appending pages to `store` through `pages`
    pub fn new(store: &'a mut W, pages: P) -> Result<Self> {
        let page_size = pages.page_size();
        StorageConfig::default().with_page_size(page_size).validate()?;

        Ok(Self {
            store,
            pages,
            page_size,
            leaf: NodeBuilder::new(),
            levels: Vec::new(),
            last_key: None,
            failed: false,
            first_page: NO_PAGE,
            page_count: 0,
            entry_count: 0,
        })
    }

    /// Add a live entry whose value is `len` bytes read from `value`
    ///
    /// Large values are copied page by page into an overflow chain, so the
    /// value is never held in memory as a whole.
    ///
    /// Any error, including out-of-order keys, leaves the writer failed:
    /// every later call and [`finish`](Self::finish) return an error.
    pub fn add_value(&mut self, key: &[u8], len: u64, value: impl Read) -> Result<()> {
        self.ensure_usable()?;
        let result = self.append_value(key, len, value);
        self.fail_on_error(result)
    }

    /// Add a tombstone for `key`
    pub fn add_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.ensure_usable()?;
        let result = self.append_tombstone(key);
        self.fail_on_error(result)
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Write all pending nodes and return the segment's locator
    pub fn finish(mut self) -> Result<SegmentLocator> {
        self.ensure_usable()?;

        let cells = self.leaf.take();
        let first_key = cells.first().map(|cell| cell.key.clone());
        let leaf = self.write_node(PAGE_LEAF, &cells)?;

        let root = match first_key {
            // empty segment: a lone empty leaf
            None => leaf,
            Some(key) => {
                self.push_child(0, leaf, key)?;
                self.close_levels()?
            }
        };

        let locator = SegmentLocator {
            root,
            first_page: self.first_page,
            page_count: self.page_count,
            entry_count: self.entry_count,
        };
        tracing::debug!(
            root = locator.root,
            first_page = locator.first_page,
            pages = locator.page_count,
            entries = locator.entry_count,
            depth = self.levels.len(),
            "segment written"
        );
        Ok(locator)
    }

    fn append_value(&mut self, key: &[u8], len: u64, mut value: impl Read) -> Result<()> {
        self.check_order(key)?;
        let cell_key = self.key_cell(key)?;

        let cell_value = if len <= self.page_size as u64 {
            let mut bytes = vec![0u8; len as usize];
            value.read_exact(&mut bytes)?;

            if self.fits_inline(&cell_key, &bytes)? {
                ValueCell::Inline(bytes)
            } else {
                let page = self.write_overflow(len, bytes.as_slice())?;
                ValueCell::Overflow { len, page }
            }
        } else {
            let page = self.write_overflow(len, value)?;
            ValueCell::Overflow { len, page }
        };

        self.push_leaf(LeafCell {
            key: cell_key,
            value: cell_value,
        })?;
        self.commit(key);
        Ok(())
    }

    fn append_tombstone(&mut self, key: &[u8]) -> Result<()> {
        self.check_order(key)?;
        let cell_key = self.key_cell(key)?;
        self.push_leaf(LeafCell {
            key: cell_key,
            value: ValueCell::Tombstone,
        })?;
        self.commit(key);
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.failed {
            return Err(Error::InvalidOperation(
                "segment writer failed earlier; its pages must not be used".to_string(),
            ));
        }
        Ok(())
    }

    fn fail_on_error(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            tracing::warn!(error = %e, entries = self.entry_count, "segment writer failed");
            self.failed = true;
        }
        result
    }

    fn check_order(&self, key: &[u8]) -> Result<()> {
        if let Some(previous) = &self.last_key {
            if key <= previous.as_slice() {
                return Err(Error::UnsortedInput {
                    previous: previous.clone(),
                    key: key.to_vec(),
                });
            }
        }
        Ok(())
    }

    /// Record `key` as written once its cell is in the leaf
    fn commit(&mut self, key: &[u8]) {
        self.last_key = Some(key.to_vec());
        self.entry_count += 1;
    }

    fn key_cell(&mut self, key: &[u8]) -> Result<KeyCell> {
        if key.len() > max_inline_key(self.page_size) {
            let len = key.len() as u64;
            let page = self.write_overflow(len, key)?;
            Ok(KeyCell::Overflow { len, page })
        } else {
            Ok(KeyCell::Inline(key.to_vec()))
        }
    }

    /// True if the value can sit inline beside its key in an empty leaf
    fn fits_inline(&self, key: &KeyCell, bytes: &[u8]) -> Result<bool> {
        let sample = LeafCell {
            key: key.clone(),
            value: ValueCell::Inline(bytes.to_vec()),
        };
        Ok(node_size(1, cell_size(&sample)?)? <= self.page_size as u64)
    }

    fn push_leaf(&mut self, cell: LeafCell) -> Result<()> {
        let size = cell_size(&cell)?;
        if !self.leaf.cells.is_empty() && !self.leaf.fits(size, self.page_size)? {
            let cells = self.leaf.take();
            let first = cells[0].key.clone();
            let page = self.write_node(PAGE_LEAF, &cells)?;
            self.push_child(0, page, first)?;
        }
        self.leaf.push(cell, size);
        Ok(())
    }

    fn push_child(&mut self, depth: usize, child: PageNum, key: KeyCell) -> Result<()> {
        if self.levels.len() == depth {
            self.levels.push(NodeBuilder::new());
        }

        let cell = InteriorCell { child, key };
        let size = cell_size(&cell)?;
        let level = &self.levels[depth];
        if !level.cells.is_empty() && !level.fits(size, self.page_size)? {
            self.flush_interior(depth)?;
        }
        self.levels[depth].push(cell, size);
        Ok(())
    }

    fn flush_interior(&mut self, depth: usize) -> Result<()> {
        let cells = self.levels[depth].take();
        let first = cells[0].key.clone();
        let page = self.write_node(PAGE_INTERIOR, &cells)?;
        self.push_child(depth + 1, page, first)
    }

    /// Flush every level bottom-up until one node covers everything
    fn close_levels(&mut self) -> Result<PageNum> {
        let mut depth = 0;
        loop {
            let top = depth + 1 == self.levels.len();
            let level = &self.levels[depth];
            if top && level.written == 0 && level.cells.len() == 1 {
                return Ok(level.cells[0].child);
            }
            self.flush_interior(depth)?;
            depth += 1;
        }
    }

    fn allocate(&mut self) -> Result<PageNum> {
        let page = self.pages.allocate_page()?;
        if self.first_page == NO_PAGE {
            self.first_page = page;
        }
        self.page_count += 1;
        Ok(page)
    }

    fn write_page(&mut self, page: PageNum, buf: &[u8]) -> Result<()> {
        self.store
            .seek(SeekFrom::Start(page_offset(page, self.page_size)))?;
        self.store.write_all(buf)?;
        Ok(())
    }

    fn write_node<T: Serialize>(&mut self, kind: u8, cells: &[T]) -> Result<PageNum> {
        let buf = encode_node(kind, cells, self.page_size)?;
        let page = self.allocate()?;
        self.write_page(page, &buf)?;
        tracing::trace!(page, kind, cells = cells.len(), "node written");
        Ok(page)
    }

    /// Copy `len` bytes from `data` into a fresh overflow chain
    fn write_overflow(&mut self, len: u64, mut data: impl Read) -> Result<PageNum> {
        let capacity = overflow_capacity(self.page_size) as u64;
        let first = self.allocate()?;
        let mut page = first;
        let mut remaining = len;
        let mut buf = vec![0u8; self.page_size];

        loop {
            let n = remaining.min(capacity) as usize;
            remaining -= n as u64;
            data.read_exact(&mut buf[OVERFLOW_HEADER..OVERFLOW_HEADER + n])?;
            buf[OVERFLOW_HEADER + n..].fill(0);

            let next = if remaining > 0 {
                self.allocate()?
            } else {
                NO_PAGE
            };
            buf[0] = PAGE_OVERFLOW;
            buf[1..OVERFLOW_HEADER].copy_from_slice(&next.to_le_bytes());
            self.write_page(page, &buf)?;

            if next == NO_PAGE {
                break;
            }
            page = next;
        }

        tracing::trace!(first, last = page, len, "overflow chain written");
        Ok(first)
    }
}

/// Write every entry of `source` as a new B-tree segment
///
/// The source must yield keys in strictly ascending order, which every
/// cursor in this crate does. Values are streamed from the source.
pub fn write_segment<W, P, C>(store: &mut W, pages: P, source: &mut C) -> Result<SegmentLocator>
where
    W: Write + Seek,
    P: PageManager,
    C: Cursor + ?Sized,
{
    let mut writer = SegmentWriter::new(store, pages)?;

    source.first()?;
    while source.is_valid() {
        let key = source.key()?.to_vec();
        let len = source.value_length()?;
        match (len, source.value()?) {
            (Some(len), Some(stream)) => writer.add_value(&key, len, stream)?,
            (None, _) => writer.add_tombstone(&key)?,
            (Some(_), None) => {
                return Err(Error::InvalidOperation(format!(
                    "source cursor has a length but no value for key {:02x?}",
                    key
                )))
            }
        }
        source.next()?;
    }

    writer.finish()
}
