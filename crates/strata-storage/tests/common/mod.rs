// Common test utilities for segment integration tests
#![allow(dead_code)]

use std::fs::{File, OpenOptions};
use std::io::Cursor as IoCursor;
use std::path::PathBuf;

use strata_core::Cursor;
use strata_storage::{
    write_segment, BTreeCursor, FilePageManager, MemoryPageManager, MemorySegment,
    SegmentLocator, StorageConfig,
};
use tempfile::TempDir;

/// Small pages so that modest inputs build multi-level trees
pub const PAGE_SIZE: usize = 256;

pub fn config() -> StorageConfig {
    StorageConfig::default().with_page_size(PAGE_SIZE)
}

/// Test fixture that creates a temporary directory for segment files
pub struct SegmentFixture {
    pub temp_dir: TempDir,
}

impl SegmentFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { temp_dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Create (or truncate) a store file opened for reading and writing
    pub fn create(&self, name: &str) -> File {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.path(name))
            .expect("Failed to create store file")
    }

    /// Open an independent read-only handle on a store file
    pub fn open(&self, name: &str) -> File {
        File::open(self.path(name)).expect("Failed to open store file")
    }
}

impl Default for SegmentFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Append a segment holding every entry of `source` to a store file
pub fn write_to_file<C: Cursor + ?Sized>(file: &File, source: &mut C) -> SegmentLocator {
    let pages = FilePageManager::new(file, &config()).expect("Failed to bind page manager");
    let mut handle = file;
    write_segment(&mut handle, pages, source).expect("Failed to write segment")
}

/// Append a segment holding every entry of `source` to an in-memory store
pub fn write_to_vec<C: Cursor + ?Sized>(store: &mut Vec<u8>, source: &mut C) -> SegmentLocator {
    let pages = MemoryPageManager::new(store.as_slice(), &config()).expect("Failed to bind page manager");
    let mut io = IoCursor::new(store);
    io.set_position(io.get_ref().len() as u64);
    write_segment(&mut io, pages, source).expect("Failed to write segment")
}

/// Open a segment stored in a file
pub fn open_file(file: &File, locator: SegmentLocator) -> BTreeCursor<&File> {
    BTreeCursor::open(file, &config(), locator).expect("Failed to open segment")
}

/// Open a segment stored in memory
pub fn open_vec(store: &[u8], locator: SegmentLocator) -> BTreeCursor<IoCursor<&[u8]>> {
    BTreeCursor::open(IoCursor::new(store), &config(), locator).expect("Failed to open segment")
}

pub fn memory(entries: &[(&str, &str)]) -> MemorySegment {
    entries.iter().copied().collect()
}

pub fn key_string<C: Cursor + ?Sized>(csr: &C) -> String {
    String::from_utf8(csr.key().expect("cursor not valid").to_vec()).expect("key not utf8")
}

pub fn value_string<C: Cursor + ?Sized>(csr: &mut C) -> Option<String> {
    csr.read_value()
        .expect("Failed to read value")
        .map(|v| String::from_utf8(v).expect("value not utf8"))
}
