//! Cursor abstraction shared by every segment kind.
//!
//! A cursor is a stateful, bidirectional iterator with seek support. It is
//! always in one of three states: not yet positioned, positioned on an
//! entry, or run off either end. Only the middle state is "valid", and
//! only a valid cursor may be asked for its key or value.
//!
//! ```text
//!            first()/seek()               next() past the end
//!  unpositioned ──────────────▶ on entry ─────────────────────▶ invalid
//!                                  ▲   │ prev() past the start
//!                                  └───┘ next()/prev()
//! ```
//!
//! Deleted keys are represented by tombstones: entries with no value bytes
//! whose `value_length()` is `None`. Cursors over raw segments surface
//! tombstones; filtering them out is the job of a dedicated wrapper.

use crate::{Error, Result};
use std::io::Read;

/// Logical length reported for a tombstone by [`Cursor::logical_length`].
pub const TOMBSTONE_LENGTH: i64 = -1;

/// Seek comparison mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOp {
    /// Land exactly on the target key, or become invalid
    Eq,
    /// Land on the greatest key less than or equal to the target
    Le,
    /// Land on the least key greater than or equal to the target
    Ge,
}

/// The value half of an entry: either live bytes or a deletion marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A live value
    Present(Vec<u8>),
    /// A tombstone marking deletion
    Tombstone,
}

impl Value {
    /// Returns true for a deletion marker
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Value::Tombstone)
    }

    /// Value length in bytes, `None` for a tombstone
    pub fn length(&self) -> Option<u64> {
        match self {
            Value::Present(v) => Some(v.len() as u64),
            Value::Tombstone => None,
        }
    }

    /// Borrow the value bytes, `None` for a tombstone
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Present(v) => Some(v),
            Value::Tombstone => None,
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Present(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Present(bytes.to_vec())
    }
}

/// Ordered, seekable view over one segment or a composition of segments.
///
/// Movement methods return `Result` because persisted segments read pages
/// lazily; an I/O failure from the byte store is handed back unchanged.
/// Moving while invalid is a no-op that leaves the cursor invalid, and a
/// move that fails leaves the cursor invalid rather than on a stale entry.
pub trait Cursor {
    /// Position on the smallest key
    fn first(&mut self) -> Result<()>;

    /// Position on the largest key
    fn last(&mut self) -> Result<()>;

    /// Move to the next key in sort order
    fn next(&mut self) -> Result<()>;

    /// Move to the previous key in sort order
    fn prev(&mut self) -> Result<()>;

    /// Position relative to `key` according to `op`
    fn seek(&mut self, key: &[u8], op: SeekOp) -> Result<()>;

    /// Returns true when positioned on an entry
    fn is_valid(&self) -> bool;

    /// Key of the current entry
    ///
    /// Returns [`Error::InvalidCursor`] when the cursor is not valid.
    fn key(&self) -> Result<&[u8]>;

    /// Lazily readable stream over the current value
    ///
    /// Returns `Ok(None)` for a tombstone. The stream may be read in chunks
    /// of any size; nothing forces the whole value into memory.
    fn value(&mut self) -> Result<Option<Box<dyn Read + '_>>>;

    /// Length of the current value, `None` exactly when it is a tombstone
    fn value_length(&self) -> Result<Option<u64>>;

    /// Returns true when the current entry is a tombstone
    fn is_tombstone(&self) -> Result<bool> {
        Ok(self.value_length()?.is_none())
    }

    /// Value length as a signed number, [`TOMBSTONE_LENGTH`] for tombstones
    fn logical_length(&self) -> Result<i64> {
        Ok(match self.value_length()? {
            Some(len) => len as i64,
            None => TOMBSTONE_LENGTH,
        })
    }

    /// Read the whole current value into memory
    fn read_value(&mut self) -> Result<Option<Vec<u8>>> {
        match self.value()? {
            Some(mut stream) => {
                let mut buf = Vec::new();
                stream.read_to_end(&mut buf)?;
                Ok(Some(buf))
            }
            None => Ok(None),
        }
    }

    /// Copy out the current entry
    fn current(&mut self) -> Result<(Vec<u8>, Value)> {
        let key = self.key()?.to_vec();
        let value = match self.read_value()? {
            Some(bytes) => Value::Present(bytes),
            None => Value::Tombstone,
        };
        Ok((key, value))
    }

    /// Forward iterator over every entry, starting from `first()`
    fn entries(&mut self) -> Entries<'_, Self>
    where
        Self: Sized,
    {
        Entries {
            cursor: self,
            started: false,
            done: false,
        }
    }
}

impl<C: Cursor + ?Sized> Cursor for Box<C> {
    fn first(&mut self) -> Result<()> {
        (**self).first()
    }

    fn last(&mut self) -> Result<()> {
        (**self).last()
    }

    fn next(&mut self) -> Result<()> {
        (**self).next()
    }

    fn prev(&mut self) -> Result<()> {
        (**self).prev()
    }

    fn seek(&mut self, key: &[u8], op: SeekOp) -> Result<()> {
        (**self).seek(key, op)
    }

    fn is_valid(&self) -> bool {
        (**self).is_valid()
    }

    fn key(&self) -> Result<&[u8]> {
        (**self).key()
    }

    fn value(&mut self) -> Result<Option<Box<dyn Read + '_>>> {
        (**self).value()
    }

    fn value_length(&self) -> Result<Option<u64>> {
        (**self).value_length()
    }
}

impl<C: Cursor + ?Sized> Cursor for &mut C {
    fn first(&mut self) -> Result<()> {
        (**self).first()
    }

    fn last(&mut self) -> Result<()> {
        (**self).last()
    }

    fn next(&mut self) -> Result<()> {
        (**self).next()
    }

    fn prev(&mut self) -> Result<()> {
        (**self).prev()
    }

    fn seek(&mut self, key: &[u8], op: SeekOp) -> Result<()> {
        (**self).seek(key, op)
    }

    fn is_valid(&self) -> bool {
        (**self).is_valid()
    }

    fn key(&self) -> Result<&[u8]> {
        (**self).key()
    }

    fn value(&mut self) -> Result<Option<Box<dyn Read + '_>>> {
        (**self).value()
    }

    fn value_length(&self) -> Result<Option<u64>> {
        (**self).value_length()
    }
}

/// Iterator returned by [`Cursor::entries`]
pub struct Entries<'a, C: ?Sized> {
    cursor: &'a mut C,
    started: bool,
    done: bool,
}

impl<'a, C: Cursor + ?Sized> Iterator for Entries<'a, C> {
    type Item = Result<(Vec<u8>, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let step = if self.started {
            Cursor::next(&mut *self.cursor)
        } else {
            self.started = true;
            self.cursor.first()
        };
        if let Err(e) = step {
            self.done = true;
            return Some(Err(e));
        }

        if !self.cursor.is_valid() {
            self.done = true;
            return None;
        }

        let entry = self.cursor.current();
        if entry.is_err() {
            self.done = true;
        }
        Some(entry)
    }
}

/// Count entries walking `first()` → `next()`
pub fn count_forward<C: Cursor + ?Sized>(cursor: &mut C) -> Result<usize> {
    let mut count = 0;
    cursor.first()?;
    while cursor.is_valid() {
        count += 1;
        cursor.next()?;
    }
    Ok(count)
}

/// Count entries walking `last()` → `prev()`
pub fn count_backward<C: Cursor + ?Sized>(cursor: &mut C) -> Result<usize> {
    let mut count = 0;
    cursor.last()?;
    while cursor.is_valid() {
        count += 1;
        cursor.prev()?;
    }
    Ok(count)
}

/// Collect the keys in forward order
pub fn keys_forward<C: Cursor + ?Sized>(cursor: &mut C) -> Result<Vec<Vec<u8>>> {
    let mut keys = Vec::new();
    cursor.first()?;
    while cursor.is_valid() {
        keys.push(cursor.key()?.to_vec());
        cursor.next()?;
    }
    Ok(keys)
}

/// Collect the keys in backward order
pub fn keys_backward<C: Cursor + ?Sized>(cursor: &mut C) -> Result<Vec<Vec<u8>>> {
    let mut keys = Vec::new();
    cursor.last()?;
    while cursor.is_valid() {
        keys.push(cursor.key()?.to_vec());
        cursor.prev()?;
    }
    Ok(keys)
}

/// Helper for implementors: turn "not positioned" into the standard error
pub fn require_valid<T>(position: Option<T>) -> Result<T> {
    position.ok_or(Error::InvalidCursor)
}
