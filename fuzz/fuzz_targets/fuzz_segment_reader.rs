#![no_main]

use std::io::Cursor as IoCursor;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strata_core::{Cursor, SeekOp};
use strata_storage::{BTreeCursor, SegmentLocator, StorageConfig};

const PAGE_SIZE: usize = 128;

#[derive(Arbitrary, Debug)]
struct Input {
    root: u32,
    first_page: u32,
    seeks: Vec<(Vec<u8>, u8)>,
    store: Vec<u8>,
}

fuzz_target!(|input: Input| {
    // Limit store size to prevent timeout
    if input.store.len() > 1_000_000 {
        return;
    }

    let config = StorageConfig::default().with_page_size(PAGE_SIZE);
    let locator = SegmentLocator {
        root: input.root,
        first_page: input.first_page,
        page_count: input.root.saturating_sub(input.first_page) + 1,
        entry_count: 0,
    };

    // Corrupt stores must yield errors, never panics or endless walks
    let Ok(mut csr) = BTreeCursor::open(IoCursor::new(input.store.as_slice()), &config, locator)
    else {
        return;
    };

    let mut steps = 0;
    if csr.first().is_ok() {
        while csr.is_valid() && steps < 10_000 {
            let _ = csr.read_value();
            if csr.next().is_err() {
                break;
            }
            steps += 1;
        }
    }

    for (key, op) in input.seeks.iter().take(32) {
        let op = match op % 3 {
            0 => SeekOp::Eq,
            1 => SeekOp::Le,
            _ => SeekOp::Ge,
        };
        if csr.seek(key, op).is_ok() && csr.is_valid() {
            let _ = csr.prev();
            let _ = csr.next();
        }
    }
});
