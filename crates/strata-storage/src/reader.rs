//! B-tree segment reader
//!
//! [`BTreeCursor`] walks a segment written by the segment writer. Only the
//! root-to-leaf path of the current position is held in memory: the child
//! list of each interior node on the path, plus the decoded current leaf.
//! Moving past the end of a leaf climbs the path to the nearest ancestor
//! with a sibling in the direction of travel and descends again.
//!
//! Every page reference is checked before it is followed. Pages must lie
//! inside the segment's extent, children must sit below their parent, and
//! overflow chains must ascend. A violation is reported as
//! [`Error::Corruption`], never as a panic or an endless walk.

use std::cmp::Ordering;
use std::io::{Read, Seek};

use strata_core::cursor::require_valid;
use strata_core::{Cursor, Error, Result, SeekOp};

use crate::page::{
    compare_overflow, decode_node, read_overflow, read_page, KeyCell, LeafCell, Node,
    OverflowReader, ValueCell,
};
use crate::pager::PageNum;
use crate::segment::SegmentLocator;
use crate::StorageConfig;

/// One interior node on the current root-to-leaf path
#[derive(Debug)]
struct Frame {
    page: PageNum,
    children: Vec<PageNum>,
    idx: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    First,
    Last,
}

/// Cursor over an immutable B-tree segment
///
/// The cursor owns its store handle; pass `&File` or an
/// `io::Cursor<&[u8]>` to read a shared store without copying it.
pub struct BTreeCursor<R> {
    store: R,
    page_size: usize,
    locator: SegmentLocator,
    path: Vec<Frame>,
    keys: Vec<Vec<u8>>,
    values: Vec<ValueCell>,
    pos: Option<usize>,
    buf: Vec<u8>,
}

impl<R: Read + Seek> BTreeCursor<R> {
    /// Open a cursor on the segment at `locator`
    ///
    /// The root page is read and decoded immediately, so a wrong page size
    /// or root is reported here rather than on first movement.
    pub fn open(store: R, config: &StorageConfig, locator: SegmentLocator) -> Result<Self> {
        config.validate()?;
        locator.validate()?;

        let mut cursor = Self {
            store,
            page_size: config.page_size,
            locator,
            path: Vec::new(),
            keys: Vec::new(),
            values: Vec::new(),
            pos: None,
            buf: Vec::with_capacity(config.page_size),
        };
        cursor.read_node(locator.root, None)?;

        tracing::debug!(
            root = locator.root,
            first_page = locator.first_page,
            page_size = config.page_size,
            "segment cursor opened"
        );
        Ok(cursor)
    }

    /// Locator of the segment being read
    pub fn locator(&self) -> &SegmentLocator {
        &self.locator
    }

    /// Give back the store handle
    pub fn into_inner(self) -> R {
        self.store
    }

    fn read_node(&mut self, page: PageNum, parent: Option<PageNum>) -> Result<Node> {
        self.locator.extent().check(page)?;
        if let Some(parent) = parent {
            if page >= parent {
                tracing::warn!(page, parent, "child page not below parent");
                return Err(Error::Corruption(format!(
                    "page {} is referenced by page {} but does not sit below it",
                    page, parent
                )));
            }
        }

        read_page(&mut self.store, self.page_size, page, &mut self.buf)?;
        decode_node(&self.buf, page)
    }

    /// Materialize a key, following its overflow chain if needed
    fn load_key(&mut self, key: KeyCell, owner: PageNum) -> Result<Vec<u8>> {
        match key {
            KeyCell::Inline(bytes) => Ok(bytes),
            KeyCell::Overflow { len, page } => {
                check_chain_below(page, owner)?;
                read_overflow(
                    &mut self.store,
                    self.page_size,
                    self.locator.extent(),
                    page,
                    len,
                )
            }
        }
    }

    fn load_leaf(&mut self, page: PageNum, cells: Vec<LeafCell>) -> Result<()> {
        let mut keys = Vec::with_capacity(cells.len());
        let mut values = Vec::with_capacity(cells.len());
        for cell in cells {
            if let ValueCell::Overflow { page: chain, .. } = &cell.value {
                self.locator.extent().check(*chain)?;
                if *chain >= page {
                    return Err(Error::Corruption(format!(
                        "value chain at page {} does not sit below leaf {}",
                        chain, page
                    )));
                }
            }
            keys.push(self.load_key(cell.key, page)?);
            values.push(cell.value);
        }

        self.keys = keys;
        self.values = values;
        Ok(())
    }

    /// Descend from `page` to the first or last entry beneath it
    fn descend(&mut self, mut page: PageNum, mut parent: Option<PageNum>, edge: Edge) -> Result<()> {
        loop {
            match self.read_node(page, parent)? {
                Node::Interior(cells) => {
                    let children: Vec<PageNum> = cells.iter().map(|cell| cell.child).collect();
                    let idx = match edge {
                        Edge::First => 0,
                        Edge::Last => children.len() - 1,
                    };
                    let child = children[idx];
                    self.path.push(Frame {
                        page,
                        children,
                        idx,
                    });
                    parent = Some(page);
                    page = child;
                }
                Node::Leaf(cells) => {
                    self.load_leaf(page, cells)?;
                    self.pos = match edge {
                        Edge::First if !self.keys.is_empty() => Some(0),
                        Edge::First => None,
                        Edge::Last => self.keys.len().checked_sub(1),
                    };
                    return Ok(());
                }
            }
        }
    }

    /// Move to the nearest non-empty leaf in the given direction
    fn step_leaf(&mut self, edge: Edge) -> Result<()> {
        self.pos = None;
        loop {
            let (child, parent) = loop {
                let Some(frame) = self.path.last_mut() else {
                    self.pos = None;
                    return Ok(());
                };
                let moved = match edge {
                    Edge::First if frame.idx + 1 < frame.children.len() => {
                        frame.idx += 1;
                        true
                    }
                    Edge::Last if frame.idx > 0 => {
                        frame.idx -= 1;
                        true
                    }
                    _ => false,
                };
                if moved {
                    break (frame.children[frame.idx], frame.page);
                }
                self.path.pop();
            };

            self.descend(child, Some(parent), edge)?;
            if self.pos.is_some() {
                return Ok(());
            }
        }
    }

    /// Descend towards `target`, leaving the leaf that would hold it loaded
    fn find_leaf(&mut self, target: &[u8]) -> Result<()> {
        self.path.clear();
        let mut page = self.locator.root;
        let mut parent = None;
        loop {
            match self.read_node(page, parent)? {
                Node::Interior(cells) => {
                    // last child whose first key is <= target
                    let (mut lo, mut hi) = (0, cells.len());
                    while lo < hi {
                        let mid = lo + (hi - lo) / 2;
                        if self.compare_key(&cells[mid].key, page, target)? == Ordering::Greater {
                            hi = mid;
                        } else {
                            lo = mid + 1;
                        }
                    }
                    let idx = lo.saturating_sub(1);

                    let children: Vec<PageNum> = cells.iter().map(|cell| cell.child).collect();
                    let child = children[idx];
                    self.path.push(Frame {
                        page,
                        children,
                        idx,
                    });
                    parent = Some(page);
                    page = child;
                }
                Node::Leaf(cells) => return self.load_leaf(page, cells),
            }
        }
    }

    /// Compare a separator with `target`, reading an overflow chain only
    /// as far as the first differing byte
    fn compare_key(&mut self, key: &KeyCell, owner: PageNum, target: &[u8]) -> Result<Ordering> {
        match key {
            KeyCell::Inline(bytes) => Ok(bytes.as_slice().cmp(target)),
            KeyCell::Overflow { len, page } => {
                check_chain_below(*page, owner)?;
                compare_overflow(
                    &mut self.store,
                    self.page_size,
                    self.locator.extent(),
                    *page,
                    *len,
                    target,
                )
            }
        }
    }

    fn to_edge(&mut self, edge: Edge) -> Result<()> {
        self.path.clear();
        self.pos = None;
        self.descend(self.locator.root, None, edge)?;
        if self.pos.is_none() {
            self.step_leaf(edge)?;
        }
        Ok(())
    }

    fn step(&mut self, edge: Edge) -> Result<()> {
        match (self.pos, edge) {
            (None, _) => Ok(()),
            (Some(pos), Edge::First) if pos + 1 < self.keys.len() => {
                self.pos = Some(pos + 1);
                Ok(())
            }
            (Some(pos), Edge::Last) if pos > 0 => {
                self.pos = Some(pos - 1);
                Ok(())
            }
            (Some(_), _) => self.step_leaf(edge),
        }
    }

    fn seek_leaf(&mut self, key: &[u8], op: SeekOp) -> Result<()> {
        self.pos = None;
        self.find_leaf(key)?;

        // First entry >= key
        let idx = self.keys.partition_point(|k| k.as_slice() < key);
        let exact = idx < self.keys.len() && self.keys[idx] == key;

        match op {
            SeekOp::Eq => self.pos = exact.then_some(idx),
            SeekOp::Ge if idx < self.keys.len() => self.pos = Some(idx),
            SeekOp::Ge => self.step_leaf(Edge::First)?,
            SeekOp::Le if exact => self.pos = Some(idx),
            SeekOp::Le if idx > 0 => self.pos = Some(idx - 1),
            SeekOp::Le => self.step_leaf(Edge::Last)?,
        }
        Ok(())
    }

    /// A move that fails leaves the cursor invalid, never on a stale entry
    fn invalidate_on_error(&mut self, result: Result<()>) -> Result<()> {
        if result.is_err() {
            self.pos = None;
            self.path.clear();
            self.keys.clear();
            self.values.clear();
        }
        result
    }
}

fn check_chain_below(chain: PageNum, owner: PageNum) -> Result<()> {
    if chain >= owner {
        return Err(Error::Corruption(format!(
            "key chain at page {} does not sit below page {}",
            chain, owner
        )));
    }
    Ok(())
}

impl<R: Read + Seek> Cursor for BTreeCursor<R> {
    fn first(&mut self) -> Result<()> {
        let result = self.to_edge(Edge::First);
        self.invalidate_on_error(result)
    }

    fn last(&mut self) -> Result<()> {
        let result = self.to_edge(Edge::Last);
        self.invalidate_on_error(result)
    }

    fn next(&mut self) -> Result<()> {
        let result = self.step(Edge::First);
        self.invalidate_on_error(result)
    }

    fn prev(&mut self) -> Result<()> {
        let result = self.step(Edge::Last);
        self.invalidate_on_error(result)
    }

    fn seek(&mut self, key: &[u8], op: SeekOp) -> Result<()> {
        let result = self.seek_leaf(key, op);
        self.invalidate_on_error(result)
    }

    fn is_valid(&self) -> bool {
        self.pos.is_some()
    }

    fn key(&self) -> Result<&[u8]> {
        let pos = require_valid(self.pos)?;
        Ok(&self.keys[pos])
    }

    fn value(&mut self) -> Result<Option<Box<dyn Read + '_>>> {
        let pos = require_valid(self.pos)?;
        let extent = self.locator.extent();
        Ok(match &self.values[pos] {
            ValueCell::Tombstone => None,
            ValueCell::Inline(bytes) => Some(Box::new(bytes.as_slice()) as Box<dyn Read + '_>),
            ValueCell::Overflow { len, page } => Some(Box::new(OverflowReader::new(
                &mut self.store,
                self.page_size,
                extent,
                *page,
                *len,
            ))),
        })
    }

    fn value_length(&self) -> Result<Option<u64>> {
        let pos = require_valid(self.pos)?;
        Ok(self.values[pos].length())
    }
}
