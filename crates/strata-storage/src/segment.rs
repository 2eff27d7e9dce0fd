//! Segment locator
//!
//! A B-tree segment is identified by its root page. The locator adds the
//! page extent the writer used, which lets a reader refuse any page
//! reference that would stray into another segment sharing the same store.

use serde::{Deserialize, Serialize};
use strata_core::{Error, Result};

use crate::page::Extent;
use crate::pager::{PageNum, NO_PAGE};

/// Where a written segment lives in its store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentLocator {
    /// Root page, always the highest page of the segment
    pub root: PageNum,
    /// Lowest page of the segment
    pub first_page: PageNum,
    /// Number of pages the writer allocated
    pub page_count: u32,
    /// Number of entries, tombstones included (0 when unknown)
    pub entry_count: u64,
}

impl SegmentLocator {
    /// Locator from a bare root page number
    ///
    /// The extent is widened to every page up to the root.
    pub fn from_root(root: PageNum) -> Self {
        Self {
            root,
            first_page: 1,
            page_count: root,
            entry_count: 0,
        }
    }

    /// Serialize for an external manifest
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a locator produced by [`SegmentLocator::encode`]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let locator: Self =
            bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        locator.validate()?;
        Ok(locator)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.root == NO_PAGE || self.first_page == NO_PAGE || self.first_page > self.root {
            return Err(Error::InvalidOperation(format!(
                "invalid segment extent {}..={}",
                self.first_page, self.root
            )));
        }
        Ok(())
    }

    pub(crate) fn extent(&self) -> Extent {
        Extent {
            first: self.first_page,
            last: self.root,
        }
    }
}
