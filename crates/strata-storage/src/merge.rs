//! MultiCursor - priority merge of segment cursors
//!
//! A [`MultiCursor`] presents several sorted cursors as one. Children are
//! ranked by position: index 0 is the newest segment and wins whenever
//! more than one child holds the same key. The losing duplicates are
//! skipped along with the winner, so each key is surfaced once.
//!
//! ## Direction changes
//!
//! While moving forward every child that is not on the current key sits
//! strictly after it; while moving backward, strictly before it. When the
//! direction flips (or after an exact seek, which leaves the other
//! children unpositioned) those children are re-seeked around the current
//! key before anything steps:
//!
//! ```text
//! next() after prev():    child.seek(key, Ge); if on key { child.next() }
//! prev() after next():    child.seek(key, Le); if on key { child.prev() }
//! ```
//!
//! Tombstones are surfaced like any other entry; wrap the merge in a
//! [`LivingCursor`](crate::LivingCursor) to hide them.

use std::cmp::Ordering;
use std::io::Read;

use strata_core::{Cursor, Error, Result, SeekOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
    Unknown,
}

/// Merged view over several cursors
pub struct MultiCursor<'a> {
    children: Vec<Box<dyn Cursor + 'a>>,
    /// Children positioned on the current key, in priority order
    reps: Vec<usize>,
    direction: Direction,
}

impl<'a> MultiCursor<'a> {
    /// Merge `children`, highest priority first
    pub fn new(children: Vec<Box<dyn Cursor + 'a>>) -> Self {
        Self {
            children,
            reps: Vec::new(),
            direction: Direction::Unknown,
        }
    }

    /// Add a child with lower priority than all existing ones
    pub fn push(&mut self, child: Box<dyn Cursor + 'a>) {
        self.children.push(child);
        self.reps.clear();
        self.direction = Direction::Unknown;
    }

    /// Number of merged children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns true if there are no children
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Recompute the current key from the valid children
    ///
    /// `wanted` is the ordering a better candidate has relative to the
    /// best so far: `Less` for the merged minimum, `Greater` for the max.
    fn settle(&mut self, wanted: Ordering) -> Result<()> {
        self.reps.clear();
        let mut best: Option<&[u8]> = None;

        for (i, child) in self.children.iter().enumerate() {
            if !child.is_valid() {
                continue;
            }
            let key = child.key()?;
            match best.map(|b| key.cmp(b)) {
                None => {
                    best = Some(key);
                    self.reps.push(i);
                }
                Some(Ordering::Equal) => self.reps.push(i),
                Some(ord) if ord == wanted => {
                    best = Some(key);
                    self.reps.clear();
                    self.reps.push(i);
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Winning child for the current key
    fn winner(&self) -> Result<usize> {
        self.reps.first().copied().ok_or(Error::InvalidCursor)
    }

    /// Position non-representative children strictly past the current key
    fn realign(&mut self, direction: Direction) -> Result<()> {
        let key = self.key()?.to_vec();
        let (op, forward) = match direction {
            Direction::Backward => (SeekOp::Le, false),
            _ => (SeekOp::Ge, true),
        };

        for (i, child) in self.children.iter_mut().enumerate() {
            if self.reps.contains(&i) {
                continue;
            }
            child.seek(&key, op)?;
            if child.is_valid() && child.key()? == key.as_slice() {
                if forward {
                    child.next()?;
                } else {
                    child.prev()?;
                }
            }
        }
        Ok(())
    }

    fn to_edge(&mut self, direction: Direction) -> Result<()> {
        self.reps.clear();
        for child in &mut self.children {
            match direction {
                Direction::Backward => child.last()?,
                _ => child.first()?,
            }
        }
        self.direction = direction;
        self.settle(wanted(direction))
    }

    fn step(&mut self, direction: Direction) -> Result<()> {
        if self.reps.is_empty() {
            return Ok(());
        }
        if self.direction != direction {
            self.realign(direction)?;
        }
        for &i in &self.reps {
            match direction {
                Direction::Backward => self.children[i].prev()?,
                _ => self.children[i].next()?,
            }
        }
        self.direction = direction;
        self.settle(wanted(direction))
    }

    fn seek_children(&mut self, key: &[u8], op: SeekOp) -> Result<()> {
        self.reps.clear();
        for child in &mut self.children {
            child.seek(key, op)?;
        }
        self.direction = match op {
            SeekOp::Ge => Direction::Forward,
            SeekOp::Le => Direction::Backward,
            // every valid child sits on `key`
            SeekOp::Eq => Direction::Unknown,
        };
        self.settle(wanted(self.direction))
    }

    /// A failed move drops the merged position
    ///
    /// Children may have been left anywhere, so nothing is valid until the
    /// next `first`, `last` or `seek` repositions all of them.
    fn invalidate_on_error(&mut self, result: Result<()>) -> Result<()> {
        if result.is_err() {
            self.reps.clear();
            self.direction = Direction::Unknown;
        }
        result
    }
}

/// Ordering a better candidate has in `direction`: the merged minimum going
/// forward, the maximum going backward
fn wanted(direction: Direction) -> Ordering {
    match direction {
        Direction::Backward => Ordering::Greater,
        _ => Ordering::Less,
    }
}

impl Cursor for MultiCursor<'_> {
    fn first(&mut self) -> Result<()> {
        let result = self.to_edge(Direction::Forward);
        self.invalidate_on_error(result)
    }

    fn last(&mut self) -> Result<()> {
        let result = self.to_edge(Direction::Backward);
        self.invalidate_on_error(result)
    }

    fn next(&mut self) -> Result<()> {
        let result = self.step(Direction::Forward);
        self.invalidate_on_error(result)
    }

    fn prev(&mut self) -> Result<()> {
        let result = self.step(Direction::Backward);
        self.invalidate_on_error(result)
    }

    fn seek(&mut self, key: &[u8], op: SeekOp) -> Result<()> {
        let result = self.seek_children(key, op);
        self.invalidate_on_error(result)
    }

    fn is_valid(&self) -> bool {
        !self.reps.is_empty()
    }

    fn key(&self) -> Result<&[u8]> {
        self.children[self.winner()?].key()
    }

    fn value(&mut self) -> Result<Option<Box<dyn Read + '_>>> {
        let i = self.winner()?;
        self.children[i].value()
    }

    fn value_length(&self) -> Result<Option<u64>> {
        self.children[self.winner()?].value_length()
    }
}
