//! LivingCursor - hides tombstones
//!
//! Wraps any cursor (usually a [`MultiCursor`](crate::MultiCursor) over
//! every segment) and skips tombstoned entries in the direction of travel,
//! so callers only ever see live keys.

use std::io::Read;

use strata_core::{Cursor, Error, Result, SeekOp};

/// Cursor that never surfaces a tombstone
pub struct LivingCursor<C> {
    inner: C,
    /// Set when an exact seek landed on a tombstone
    hidden: bool,
}

impl<C: Cursor> LivingCursor<C> {
    /// Wrap `inner`
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            hidden: false,
        }
    }

    /// Borrow the wrapped cursor
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// Unwrap the inner cursor
    pub fn into_inner(self) -> C {
        self.inner
    }

    fn skip_forward(&mut self) -> Result<()> {
        while self.inner.is_valid() && self.inner.is_tombstone()? {
            self.inner.next()?;
        }
        Ok(())
    }

    fn skip_backward(&mut self) -> Result<()> {
        while self.inner.is_valid() && self.inner.is_tombstone()? {
            self.inner.prev()?;
        }
        Ok(())
    }

    fn check(&self) -> Result<()> {
        if self.hidden {
            return Err(Error::InvalidCursor);
        }
        Ok(())
    }
}

impl<C: Cursor> Cursor for LivingCursor<C> {
    fn first(&mut self) -> Result<()> {
        self.hidden = false;
        self.inner.first()?;
        self.skip_forward()
    }

    fn last(&mut self) -> Result<()> {
        self.hidden = false;
        self.inner.last()?;
        self.skip_backward()
    }

    fn next(&mut self) -> Result<()> {
        if self.hidden {
            return Ok(());
        }
        self.inner.next()?;
        self.skip_forward()
    }

    fn prev(&mut self) -> Result<()> {
        if self.hidden {
            return Ok(());
        }
        self.inner.prev()?;
        self.skip_backward()
    }

    fn seek(&mut self, key: &[u8], op: SeekOp) -> Result<()> {
        self.hidden = false;
        self.inner.seek(key, op)?;
        match op {
            SeekOp::Eq => {
                self.hidden = self.inner.is_valid() && self.inner.is_tombstone()?;
                Ok(())
            }
            SeekOp::Le => self.skip_backward(),
            SeekOp::Ge => self.skip_forward(),
        }
    }

    fn is_valid(&self) -> bool {
        !self.hidden && self.inner.is_valid()
    }

    fn key(&self) -> Result<&[u8]> {
        self.check()?;
        self.inner.key()
    }

    fn value(&mut self) -> Result<Option<Box<dyn Read + '_>>> {
        self.check()?;
        self.inner.value()
    }

    fn value_length(&self) -> Result<Option<u64>> {
        self.check()?;
        self.inner.value_length()
    }
}
