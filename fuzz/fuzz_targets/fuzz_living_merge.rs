#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strata_core::{keys_backward, keys_forward, Cursor, SeekOp};
use strata_storage::{LivingCursor, MemorySegment, MultiCursor};

#[derive(Arbitrary, Debug)]
enum Op {
    Put { segment: u8, key: u8, value: u8 },
    Delete { segment: u8, key: u8 },
}

#[derive(Arbitrary, Debug)]
struct Input {
    ops: Vec<Op>,
    seeks: Vec<(u8, u8)>,
}

fuzz_target!(|input: Input| {
    let mut segments: Vec<MemorySegment> = (0..3).map(|_| MemorySegment::new()).collect();
    for op in input.ops.iter().take(500) {
        match *op {
            Op::Put { segment, key, value } => {
                segments[segment as usize % 3].insert(vec![key % 32], vec![value])
            }
            Op::Delete { segment, key } => segments[segment as usize % 3].delete(vec![key % 32]),
        }
    }

    // segment 0 is newest
    let mut model = BTreeMap::new();
    for seg in segments.iter().rev() {
        for (k, v) in seg.iter() {
            model.insert(k.clone(), v.as_bytes().map(<[u8]>::to_vec));
        }
    }
    let live: Vec<Vec<u8>> = model
        .iter()
        .filter(|(_, v)| v.is_some())
        .map(|(k, _)| k.clone())
        .collect();

    let mut lc = LivingCursor::new(MultiCursor::new(
        segments
            .iter()
            .map(|s| Box::new(s.open_cursor()) as Box<dyn Cursor + '_>)
            .collect(),
    ));

    assert_eq!(keys_forward(&mut lc).unwrap(), live);
    let mut backward = keys_backward(&mut lc).unwrap();
    backward.reverse();
    assert_eq!(backward, live);

    for &(key, op) in input.seeks.iter().take(64) {
        let target = [key % 33];
        let (op, expected) = match op % 3 {
            0 => (SeekOp::Eq, live.iter().find(|k| k.as_slice() == &target[..])),
            1 => (SeekOp::Le, live.iter().rev().find(|k| k.as_slice() <= &target[..])),
            _ => (SeekOp::Ge, live.iter().find(|k| k.as_slice() >= &target[..])),
        };
        lc.seek(&target, op).unwrap();
        assert_eq!(lc.key().ok(), expected.map(Vec::as_slice));
        if lc.is_valid() {
            let value = lc.read_value().unwrap();
            assert_eq!(value.as_ref(), model[lc.key().unwrap()].as_ref());
        }
    }
});
