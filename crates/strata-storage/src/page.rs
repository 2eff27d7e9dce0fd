//! Page format for B-tree segments
//!
//! ## Page Layout
//!
//! ```text
//! Leaf / interior page:
//! +------+---------------------------------------------+---------+
//! | kind | cell vector (bincode, varint lengths)       | zeroes  |
//! +------+---------------------------------------------+---------+
//!
//! Overflow page:
//! +------+----------------+------------------------------------------+
//! | kind | next (u32 LE)  | payload (page_size - 5 bytes, last page   |
//! |      | 0 = end        |          holds the remainder)             |
//! +------+----------------+------------------------------------------+
//! ```
//!
//! Leaf cells carry a key and a value; interior cells carry a child page
//! and that child's first key. A key longer than [`max_inline_key`], or a
//! value that does not fit inline in an otherwise-empty leaf, is stored in
//! an overflow chain and the cell records only its length and first page.
//!
//! There is no format header or version stamp; the page size is agreed out
//! of band between writer and reader.

use std::cmp::Ordering;
use std::io::{self, Read, Seek, SeekFrom};

use bincode::Options;
use serde::{Deserialize, Serialize};
use strata_core::{Error, Result};

use crate::pager::{page_offset, PageNum, NO_PAGE};

/// Page kind tags
pub(crate) const PAGE_LEAF: u8 = 1;
pub(crate) const PAGE_INTERIOR: u8 = 2;
pub(crate) const PAGE_OVERFLOW: u8 = 3;

/// Overflow page header: kind byte + next page
pub(crate) const OVERFLOW_HEADER: usize = 5;

/// Key as stored in a cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum KeyCell {
    Inline(Vec<u8>),
    Overflow { len: u64, page: PageNum },
}

/// Value as stored in a leaf cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum ValueCell {
    Inline(Vec<u8>),
    Overflow { len: u64, page: PageNum },
    Tombstone,
}

impl ValueCell {
    pub(crate) fn length(&self) -> Option<u64> {
        match self {
            ValueCell::Inline(v) => Some(v.len() as u64),
            ValueCell::Overflow { len, .. } => Some(*len),
            ValueCell::Tombstone => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LeafCell {
    pub key: KeyCell,
    pub value: ValueCell,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct InteriorCell {
    pub child: PageNum,
    pub key: KeyCell,
}

/// A decoded tree page
#[derive(Debug)]
pub(crate) enum Node {
    Leaf(Vec<LeafCell>),
    Interior(Vec<InteriorCell>),
}

/// Encoding used for cell vectors: varint integers, trailing padding allowed
fn encoding() -> impl Options {
    bincode::options().allow_trailing_bytes()
}

/// Largest key stored inline in a cell
///
/// A quarter of the usable page minus cell overhead, which guarantees that
/// every interior page has room for at least four children.
pub fn max_inline_key(page_size: usize) -> usize {
    (page_size - 1) / 4 - 16
}

/// Payload bytes carried by one overflow page
pub(crate) fn overflow_capacity(page_size: usize) -> usize {
    page_size - OVERFLOW_HEADER
}

/// Encoded size of one cell
pub(crate) fn cell_size<T: Serialize>(cell: &T) -> Result<u64> {
    encoding()
        .serialized_size(cell)
        .map_err(|e| Error::Serialization(e.to_string()))
}

/// Encoded size of a node holding `count` cells totalling `cells_bytes`
pub(crate) fn node_size(count: usize, cells_bytes: u64) -> Result<u64> {
    let prefix = encoding()
        .serialized_size(&(count as u64))
        .map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(1 + prefix + cells_bytes)
}

/// Encode a leaf or interior node into a full, zero-padded page
pub(crate) fn encode_node<T: Serialize>(kind: u8, cells: &[T], page_size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(page_size);
    buf.push(kind);
    encoding()
        .serialize_into(&mut buf, cells)
        .map_err(|e| Error::Serialization(e.to_string()))?;

    if buf.len() > page_size {
        return Err(Error::InvalidOperation(format!(
            "node of {} bytes does not fit a {} byte page",
            buf.len(),
            page_size
        )));
    }
    buf.resize(page_size, 0);
    Ok(buf)
}

/// Decode a leaf or interior page
pub(crate) fn decode_node(buf: &[u8], page: PageNum) -> Result<Node> {
    let decoding = encoding().with_limit(buf.len() as u64);
    let corrupt = |e: bincode::Error| Error::Corruption(format!("page {}: {}", page, e));

    match buf.first() {
        Some(&PAGE_LEAF) => decoding.deserialize(&buf[1..]).map(Node::Leaf).map_err(corrupt),
        Some(&PAGE_INTERIOR) => {
            let cells: Vec<InteriorCell> = decoding.deserialize(&buf[1..]).map_err(corrupt)?;
            if cells.is_empty() {
                return Err(Error::Corruption(format!(
                    "interior page {} has no children",
                    page
                )));
            }
            Ok(Node::Interior(cells))
        }
        other => Err(Error::Corruption(format!(
            "page {} is not a tree page (kind {:?})",
            page, other
        ))),
    }
}

/// Inclusive range of pages a segment may read
///
/// Every page a segment references lies between its first page and its
/// root, so no reference can lead into another segment sharing the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Extent {
    pub first: PageNum,
    pub last: PageNum,
}

impl Extent {
    pub(crate) fn check(&self, page: PageNum) -> Result<()> {
        if page == NO_PAGE || page < self.first || page > self.last {
            tracing::warn!(page, first = self.first, last = self.last, "page reference outside segment");
            return Err(Error::Corruption(format!(
                "page {} outside segment pages {}..={}",
                page, self.first, self.last
            )));
        }
        Ok(())
    }
}

/// Read one full page into `buf`
pub(crate) fn read_page<R: Read + Seek>(
    store: &mut R,
    page_size: usize,
    page: PageNum,
    buf: &mut Vec<u8>,
) -> Result<()> {
    buf.resize(page_size, 0);
    store.seek(SeekFrom::Start(page_offset(page, page_size)))?;
    store.read_exact(buf)?;
    Ok(())
}

/// Hand a storage error to an `io::Read` caller
///
/// Store errors pass through unchanged; anything else travels as the
/// payload of an `InvalidData` error and can be recovered with
/// `io::Error::into_inner` and a downcast to [`Error`].
fn into_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Streaming reader over an overflow chain
///
/// Pages are read one at a time as the caller consumes bytes, so a value
/// of any size can be read in chunks of any size.
pub struct OverflowReader<'a, R> {
    store: &'a mut R,
    page_size: usize,
    extent: Extent,
    current: PageNum,
    next: PageNum,
    remaining: u64,
    page: Vec<u8>,
    pos: usize,
    end: usize,
}

impl<'a, R: Read + Seek> OverflowReader<'a, R> {
    pub(crate) fn new(
        store: &'a mut R,
        page_size: usize,
        extent: Extent,
        first: PageNum,
        len: u64,
    ) -> Self {
        Self {
            store,
            page_size,
            extent,
            current: NO_PAGE,
            next: first,
            remaining: len,
            page: Vec::new(),
            pos: 0,
            end: 0,
        }
    }

    /// Bytes not yet returned to the caller
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Copy the next bytes of the chain into `out`, at most one page's worth
    ///
    /// Returns 0 once the whole value has been read.
    pub(crate) fn read_chunk(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() || self.remaining == 0 {
            return Ok(0);
        }
        if self.pos == self.end {
            self.load_next()?;
        }

        let n = out.len().min(self.end - self.pos);
        out[..n].copy_from_slice(&self.page[self.pos..self.pos + n]);
        self.pos += n;
        self.remaining -= n as u64;
        Ok(n)
    }

    fn load_next(&mut self) -> Result<()> {
        let page = self.next;
        if page == NO_PAGE {
            return Err(Error::Corruption(format!(
                "overflow chain ends after page {} with {} bytes missing",
                self.current, self.remaining
            )));
        }
        if page <= self.current {
            return Err(Error::Corruption(format!(
                "overflow chain steps back from page {} to {}",
                self.current, page
            )));
        }
        self.extent.check(page)?;

        read_page(self.store, self.page_size, page, &mut self.page)?;
        if self.page[0] != PAGE_OVERFLOW {
            return Err(Error::Corruption(format!(
                "page {} is not an overflow page",
                page
            )));
        }

        let mut next = [0u8; 4];
        next.copy_from_slice(&self.page[1..OVERFLOW_HEADER]);
        self.next = PageNum::from_le_bytes(next);
        self.current = page;

        let payload = (self.remaining).min(overflow_capacity(self.page_size) as u64) as usize;
        self.pos = OVERFLOW_HEADER;
        self.end = OVERFLOW_HEADER + payload;
        Ok(())
    }
}

impl<R: Read + Seek> Read for OverflowReader<'_, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.read_chunk(out).map_err(into_io)
    }
}

/// Read a whole overflow chain into memory (used for keys)
pub(crate) fn read_overflow<R: Read + Seek>(
    store: &mut R,
    page_size: usize,
    extent: Extent,
    first: PageNum,
    len: u64,
) -> Result<Vec<u8>> {
    let mut reader = OverflowReader::new(store, page_size, extent, first, len);
    let mut chunk = vec![0u8; overflow_capacity(page_size)];
    let mut buf = Vec::new();
    loop {
        let n = reader.read_chunk(&mut chunk)?;
        if n == 0 {
            return Ok(buf);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Compare the key stored in an overflow chain with `target`
///
/// Pages are read only until the first differing byte.
pub(crate) fn compare_overflow<R: Read + Seek>(
    store: &mut R,
    page_size: usize,
    extent: Extent,
    first: PageNum,
    len: u64,
    target: &[u8],
) -> Result<Ordering> {
    let mut reader = OverflowReader::new(store, page_size, extent, first, len);
    let mut chunk = vec![0u8; overflow_capacity(page_size)];
    let mut rest = target;
    loop {
        let n = reader.read_chunk(&mut chunk)?;
        if n == 0 {
            return Ok(len.cmp(&(target.len() as u64)));
        }

        let common = n.min(rest.len());
        match chunk[..common].cmp(&rest[..common]) {
            Ordering::Equal if common < n => return Ok(Ordering::Greater),
            Ordering::Equal => rest = &rest[n..],
            other => return Ok(other),
        }
    }
}
