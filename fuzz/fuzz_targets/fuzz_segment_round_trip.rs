#![no_main]

use std::collections::BTreeMap;
use std::io::Cursor as IoCursor;

use libfuzzer_sys::fuzz_target;
use strata_core::{Cursor, Value};
use strata_storage::{
    write_segment, BTreeCursor, MemoryPageManager, MemorySegment, StorageConfig,
};

fuzz_target!(|input: (u8, BTreeMap<Vec<u8>, Option<Vec<u8>>>)| {
    let (size_class, model) = input;
    // Limit entry count and sizes to prevent timeout
    if model.len() > 500 || model.iter().any(|(k, v)| {
        k.len() > 4096 || v.as_ref().is_some_and(|v| v.len() > 16_384)
    }) {
        return;
    }

    let page_size = 128usize << (size_class % 6);
    let config = StorageConfig::default().with_page_size(page_size);

    let mut seg = MemorySegment::new();
    for (k, v) in &model {
        match v {
            Some(v) => seg.insert(k.clone(), v.clone()),
            None => seg.delete(k.clone()),
        }
    }

    let mut store = IoCursor::new(Vec::new());
    let pages = MemoryPageManager::new(store.get_ref(), &config).unwrap();
    let locator = write_segment(&mut store, pages, &mut seg.open_cursor()).unwrap();
    assert_eq!(locator.entry_count as usize, model.len());

    let bytes = store.into_inner();
    assert_eq!(bytes.len(), locator.page_count as usize * page_size);

    let mut csr = BTreeCursor::open(IoCursor::new(bytes.as_slice()), &config, locator).unwrap();
    let entries: Vec<(Vec<u8>, Value)> = csr
        .entries()
        .collect::<strata_core::Result<_>>()
        .unwrap();
    let expected: Vec<(Vec<u8>, Value)> = model
        .into_iter()
        .map(|(k, v)| (k, v.map_or(Value::Tombstone, Value::Present)))
        .collect();
    assert_eq!(entries, expected);
});
