//! Memory segment - In-memory sorted write buffer
//!
//! The memory segment holds recent writes before they are written out as
//! an immutable B-tree segment. It uses a BTreeMap for sorted key order, so
//! a cursor over it can walk and seek without any extra sorting.

use std::collections::BTreeMap;
use std::io::Read;

use strata_core::cursor::require_valid;
use strata_core::{Cursor, Result, SeekOp, Value};

/// Memory segment - an in-memory sorted write buffer
///
/// Provides O(log n) insert, lookup, and delete. Deleting writes a
/// tombstone rather than removing the key, so the deletion survives when
/// the segment is merged over older segments.
#[derive(Debug, Default)]
pub struct MemorySegment {
    /// The underlying sorted map
    data: BTreeMap<Vec<u8>, Value>,
    /// Approximate size in bytes of keys plus values
    size_bytes: u64,
}

impl MemorySegment {
    /// Creates a new empty memory segment
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the value for a key
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.put(key.into(), Value::Present(value.into()));
    }

    /// Writes a tombstone for a key
    ///
    /// The tombstone is written whether or not the key was present, so
    /// deleting an absent key adds an entry.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.put(key.into(), Value::Tombstone);
    }

    fn put(&mut self, key: Vec<u8>, value: Value) {
        let key_size = key.len() as u64;
        let value_size = entry_size(&value);

        if let Some(old) = self.data.insert(key, value) {
            self.size_bytes -= key_size + entry_size(&old);
        }
        self.size_bytes += key_size + value_size;
    }

    /// Retrieves the entry for a key
    ///
    /// Returns:
    /// - `Some(Value::Present(..))` if the key has a value
    /// - `Some(Value::Tombstone)` if the key was deleted here
    /// - `None` if this segment knows nothing about the key
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns the approximate size of the segment in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Returns the number of entries, tombstones included
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the segment is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns an iterator over all entries in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Value)> {
        self.data.iter()
    }

    /// Clears the segment
    pub fn clear(&mut self) {
        self.data.clear();
        self.size_bytes = 0;
    }

    /// Opens a cursor over the current contents
    ///
    /// The cursor borrows the segment, so it cannot be mutated while the
    /// cursor is alive.
    pub fn open_cursor(&self) -> MemoryCursor<'_> {
        MemoryCursor {
            entries: self
                .data
                .iter()
                .map(|(k, v)| (k.as_slice(), v))
                .collect(),
            pos: None,
        }
    }
}

fn entry_size(value: &Value) -> u64 {
    match value {
        Value::Present(v) => v.len() as u64 + 1, // +1 for the type tag
        Value::Tombstone => 1,
    }
}

impl<K, V> FromIterator<(K, V)> for MemorySegment
where
    K: Into<Vec<u8>>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut segment = MemorySegment::new();
        for (k, v) in iter {
            segment.insert(k, v);
        }
        segment
    }
}

/// Cursor over a [`MemorySegment`]
pub struct MemoryCursor<'a> {
    entries: Vec<(&'a [u8], &'a Value)>,
    pos: Option<usize>,
}

impl MemoryCursor<'_> {
    fn entry(&self) -> Result<(&[u8], &Value)> {
        let pos = require_valid(self.pos)?;
        Ok(self.entries[pos])
    }
}

impl Cursor for MemoryCursor<'_> {
    fn first(&mut self) -> Result<()> {
        self.pos = if self.entries.is_empty() { None } else { Some(0) };
        Ok(())
    }

    fn last(&mut self) -> Result<()> {
        self.pos = self.entries.len().checked_sub(1);
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        self.pos = self
            .pos
            .map(|p| p + 1)
            .filter(|p| *p < self.entries.len());
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        self.pos = self.pos.and_then(|p| p.checked_sub(1));
        Ok(())
    }

    fn seek(&mut self, key: &[u8], op: SeekOp) -> Result<()> {
        // First entry >= key
        let idx = self.entries.partition_point(|(k, _)| *k < key);
        let exact = idx < self.entries.len() && self.entries[idx].0 == key;

        self.pos = match op {
            SeekOp::Eq => exact.then_some(idx),
            SeekOp::Ge => (idx < self.entries.len()).then_some(idx),
            SeekOp::Le if exact => Some(idx),
            SeekOp::Le => idx.checked_sub(1),
        };
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.pos.is_some()
    }

    fn key(&self) -> Result<&[u8]> {
        Ok(self.entry()?.0)
    }

    fn value(&mut self) -> Result<Option<Box<dyn Read + '_>>> {
        Ok(match self.entry()?.1 {
            Value::Present(v) => Some(Box::new(v.as_slice()) as Box<dyn Read + '_>),
            Value::Tombstone => None,
        })
    }

    fn value_length(&self) -> Result<Option<u64>> {
        Ok(self.entry()?.1.length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{count_backward, count_forward, keys_backward, keys_forward, Error};

    #[test]
    fn test_memory_segment_new() {
        let seg = MemorySegment::new();
        assert!(seg.is_empty());
        assert_eq!(seg.len(), 0);
        assert_eq!(seg.size_bytes(), 0);
    }

    #[test]
    fn test_memory_segment_insert_get() {
        let mut seg = MemorySegment::new();

        seg.insert("key1", "value1");
        seg.insert("key2", "value2");

        assert_eq!(seg.len(), 2);
        assert_eq!(seg.get(b"key1"), Some(&Value::Present(b"value1".to_vec())));
        assert_eq!(seg.get(b"key2"), Some(&Value::Present(b"value2".to_vec())));
        assert_eq!(seg.get(b"key3"), None);
    }

    #[test]
    fn test_insert_replaces() {
        let mut seg = MemorySegment::new();
        seg.insert("a", "foo");
        seg.insert("a", "bar");

        let mut csr = seg.open_cursor();
        csr.first().unwrap();
        assert!(csr.is_valid());
        assert_eq!(csr.key().unwrap(), b"a");
        assert_eq!(csr.read_value().unwrap(), Some(b"bar".to_vec()));
        csr.next().unwrap();
        assert!(!csr.is_valid());
    }

    #[test]
    fn test_delete_writes_tombstone() {
        let mut seg = MemorySegment::new();

        seg.insert("key", "value");
        seg.delete("key");

        assert_eq!(seg.get(b"key"), Some(&Value::Tombstone));
        assert_eq!(seg.len(), 1);
    }

    #[test]
    fn test_delete_not_there() {
        let mut seg = MemorySegment::new();
        assert_eq!(count_forward(&mut seg.open_cursor()).unwrap(), 0);
        assert_eq!(count_backward(&mut seg.open_cursor()).unwrap(), 0);

        seg.delete("");
        seg.delete("2");
        seg.delete("3");

        assert_eq!(count_forward(&mut seg.open_cursor()).unwrap(), 3);
        assert_eq!(count_backward(&mut seg.open_cursor()).unwrap(), 3);
    }

    #[test]
    fn test_size_tracking() {
        let mut seg = MemorySegment::new();

        seg.insert("key", "value");
        let after_insert = seg.size_bytes();
        assert!(after_insert > 0);

        seg.insert("key", "v");
        assert!(seg.size_bytes() < after_insert);

        seg.delete("key");
        assert_eq!(seg.size_bytes(), 4);

        seg.clear();
        assert!(seg.is_empty());
        assert_eq!(seg.size_bytes(), 0);
    }

    #[test]
    fn test_lexicographic_order() {
        let mut seg = MemorySegment::new();
        seg.insert("8", "");
        seg.insert("10", "");
        seg.insert("20", "");

        let mut csr = seg.open_cursor();
        assert_eq!(
            keys_forward(&mut csr).unwrap(),
            vec![b"10".to_vec(), b"20".to_vec(), b"8".to_vec()]
        );
        assert_eq!(
            keys_backward(&mut csr).unwrap(),
            vec![b"8".to_vec(), b"20".to_vec(), b"10".to_vec()]
        );
    }

    #[test]
    fn test_prefix_sorts_first() {
        let seg: MemorySegment = vec![("ab", "2"), ("a", "1"), ("abc", "3")]
            .into_iter()
            .collect();
        let keys = keys_forward(&mut seg.open_cursor()).unwrap();
        assert_eq!(keys, vec![b"a".to_vec(), b"ab".to_vec(), b"abc".to_vec()]);
    }

    #[test]
    fn test_seek_ops() {
        let seg: MemorySegment = vec![("c", "3"), ("e", "5"), ("g", "7")]
            .into_iter()
            .collect();
        let mut csr = seg.open_cursor();

        csr.seek(b"a", SeekOp::Le).unwrap();
        assert!(!csr.is_valid());

        csr.seek(b"d", SeekOp::Le).unwrap();
        assert_eq!(csr.key().unwrap(), b"c");

        csr.seek(b"f", SeekOp::Ge).unwrap();
        assert_eq!(csr.key().unwrap(), b"g");

        csr.seek(b"h", SeekOp::Ge).unwrap();
        assert!(!csr.is_valid());

        csr.seek(b"e", SeekOp::Eq).unwrap();
        assert_eq!(csr.read_value().unwrap(), Some(b"5".to_vec()));

        csr.seek(b"f", SeekOp::Eq).unwrap();
        assert!(!csr.is_valid());

        csr.seek(b"e", SeekOp::Le).unwrap();
        assert_eq!(csr.key().unwrap(), b"e");
    }

    #[test]
    fn test_empty_value_is_not_tombstone() {
        let mut seg = MemorySegment::new();
        seg.insert("_", "");

        let mut csr = seg.open_cursor();
        csr.seek(b"_", SeekOp::Eq).unwrap();
        assert!(csr.is_valid());
        assert_eq!(csr.value_length().unwrap(), Some(0));
        assert_eq!(csr.read_value().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_invalid_cursor_access() {
        let seg = MemorySegment::new();
        let mut csr = seg.open_cursor();
        csr.first().unwrap();
        assert!(matches!(csr.key(), Err(Error::InvalidCursor)));
        assert!(matches!(csr.value(), Err(Error::InvalidCursor)));

        // stepping while invalid stays invalid
        csr.next().unwrap();
        csr.prev().unwrap();
        assert!(!csr.is_valid());
    }
}
