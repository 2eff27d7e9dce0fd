// Integration tests for B-tree segments: write, read, seek

mod common;

use std::collections::BTreeSet;

use common::{
    key_string, memory, open_file, open_vec, value_string, write_to_file, write_to_vec,
    SegmentFixture,
};
use strata_core::{count_backward, count_forward, keys_forward, Cursor, SeekOp};
use strata_storage::{LivingCursor, MemorySegment, MultiCursor};

fn check_lexicographic(csr: &mut dyn Cursor) {
    csr.first().unwrap();
    assert_eq!(key_string(csr), "10");
    csr.next().unwrap();
    assert_eq!(key_string(csr), "20");
    csr.next().unwrap();
    assert_eq!(key_string(csr), "8");
    csr.next().unwrap();
    assert!(!csr.is_valid());

    csr.last().unwrap();
    assert_eq!(key_string(csr), "8");
    csr.prev().unwrap();
    assert_eq!(key_string(csr), "20");
    csr.prev().unwrap();
    assert_eq!(key_string(csr), "10");
    csr.prev().unwrap();
    assert!(!csr.is_valid());
}

fn check_no_le_ge(csr: &mut dyn Cursor) {
    csr.seek(b"a", SeekOp::Le).unwrap();
    assert!(!csr.is_valid());
    csr.seek(b"d", SeekOp::Le).unwrap();
    assert!(csr.is_valid());
    csr.seek(b"f", SeekOp::Ge).unwrap();
    assert!(csr.is_valid());
    csr.seek(b"h", SeekOp::Ge).unwrap();
    assert!(!csr.is_valid());
}

#[test]
fn test_simple_round_trip() {
    let fixture = SegmentFixture::new();
    let seg = memory(&[("c", "3"), ("e", "5"), ("g", "7")]);

    let file = fixture.create("simple");
    let locator = write_to_file(&file, &mut seg.open_cursor());
    assert_eq!(locator.entry_count, 3);
    drop(file);

    let reader = fixture.open("simple");
    let mut csr = open_file(&reader, locator);
    assert_eq!(
        csr.entries().collect::<strata_core::Result<Vec<_>>>().unwrap(),
        seg.open_cursor()
            .entries()
            .collect::<strata_core::Result<Vec<_>>>()
            .unwrap()
    );
}

#[test]
fn test_ten_segments_in_one_file() {
    let fixture = SegmentFixture::new();
    let file = fixture.create("ten");

    let mut locators = Vec::new();
    for i in 0..10 {
        let seg: MemorySegment = (0..50)
            .map(|q| (format!("{:04}", q * 10 + i), (i + q).to_string()))
            .collect();
        locators.push(write_to_file(&file, &mut seg.open_cursor()));
    }

    let handles: Vec<_> = (0..10).map(|_| fixture.open("ten")).collect();
    let children = handles
        .iter()
        .zip(&locators)
        .map(|(handle, locator)| Box::new(open_file(handle, *locator)) as Box<dyn Cursor + '_>)
        .collect();
    let mut merged = MultiCursor::new(children);
    let all = write_to_file(&file, &mut merged);
    drop(merged);
    assert_eq!(all.entry_count, 500);

    let mut csr = open_file(&file, all);
    csr.first().unwrap();
    let mut prev = -1;
    while csr.is_valid() {
        let cur: i32 = key_string(&csr).parse().unwrap();
        assert_eq!(prev + 1, cur);
        prev = cur;
        csr.next().unwrap();
    }
    assert_eq!(prev, 499);
}

#[test]
fn test_pairwise_merges_in_one_file() {
    let fixture = SegmentFixture::new();
    let file = fixture.create("one_file");

    let mut expected = BTreeSet::new();
    let mut locators = Vec::new();
    for step in [2, 3, 5, 7] {
        let seg: MemorySegment = (0..500)
            .map(|i| ((i * step).to_string(), i.to_string()))
            .collect();
        expected.extend((0..500).map(|i| (i * step).to_string().into_bytes()));
        locators.push(write_to_file(&file, &mut seg.open_cursor()));
    }

    let merge_pair = |a, b| {
        let fa = fixture.open("one_file");
        let fb = fixture.open("one_file");
        let mut mc = MultiCursor::new(vec![
            Box::new(open_file(&fa, a)),
            Box::new(open_file(&fb, b)),
        ]);
        write_to_file(&file, &mut mc)
    };

    let s1_2 = merge_pair(locators[0], locators[1]);
    let s3_4 = merge_pair(locators[2], locators[3]);
    let s5 = merge_pair(s1_2, s3_4);

    let mut csr = open_file(&file, s5);
    let keys = keys_forward(&mut csr).unwrap();
    assert_eq!(keys, expected.into_iter().collect::<Vec<_>>());
    assert_eq!(s5.entry_count as usize, keys.len());
}

#[test]
fn test_lexicographic() {
    let fixture = SegmentFixture::new();
    let seg = memory(&[("8", ""), ("10", ""), ("20", "")]);

    let mut csr = seg.open_cursor();
    check_lexicographic(&mut csr);

    let file = fixture.create("lexographic");
    let locator = write_to_file(&file, &mut csr);
    check_lexicographic(&mut open_file(&file, locator));
}

#[test]
fn test_weird_walk() {
    let fixture = SegmentFixture::new();

    let first: MemorySegment = (0..100).map(|i| (format!("{:03}", i), i.to_string())).collect();
    let root1 = write_to_file(&fixture.create("weird1"), &mut first.open_cursor());

    let second: MemorySegment = (0..1000).map(|i| (format!("{:05}", i), i.to_string())).collect();
    let root2 = write_to_file(&fixture.create("weird2"), &mut second.open_cursor());

    let f1 = fixture.open("weird1");
    let f2 = fixture.open("weird2");
    let mut mc = MultiCursor::new(vec![
        Box::new(open_file(&f1, root1)),
        Box::new(open_file(&f2, root2)),
    ]);

    mc.first().unwrap();
    for _ in 0..100 {
        mc.next().unwrap();
        assert!(mc.is_valid());
    }
    for _ in 0..50 {
        mc.prev().unwrap();
        assert!(mc.is_valid());
    }
    for _ in 0..100 {
        mc.next().unwrap();
        assert!(mc.is_valid());
        mc.next().unwrap();
        assert!(mc.is_valid());
        mc.prev().unwrap();
        assert!(mc.is_valid());
    }
    for (op, forward) in [
        (SeekOp::Eq, true),
        (SeekOp::Eq, false),
        (SeekOp::Le, false),
        (SeekOp::Ge, true),
    ] {
        for _ in 0..50 {
            let key = mc.key().unwrap().to_vec();
            mc.seek(&key, op).unwrap();
            assert!(mc.is_valid());
            if forward {
                mc.next().unwrap();
            } else {
                mc.prev().unwrap();
            }
            assert!(mc.is_valid());
        }
    }

    assert_eq!(key_string(&mc), "00148");
}

#[test]
fn test_hundred_thousand() {
    let fixture = SegmentFixture::new();
    let seg: MemorySegment = (0..100_000)
        .map(|i| ((i * 2).to_string(), i.to_string()))
        .collect();

    let file = fixture.create("hundredk");
    let locator = write_to_file(&file, &mut seg.open_cursor());
    assert_eq!(locator.entry_count, 100_000);

    let mut csr = open_file(&file, locator);
    assert_eq!(count_forward(&mut csr).unwrap(), 100_000);
    csr.seek(b"99998", SeekOp::Eq).unwrap();
    assert_eq!(value_string(&mut csr).as_deref(), Some("49999"));
}

#[test]
fn test_no_le_ge() {
    let fixture = SegmentFixture::new();
    let seg = memory(&[("c", "3"), ("e", "5"), ("g", "7")]);
    check_no_le_ge(&mut seg.open_cursor());

    let file = fixture.create("no_le_ge");
    let locator = write_to_file(&file, &mut seg.open_cursor());
    drop(file);

    let reader = fixture.open("no_le_ge");
    check_no_le_ge(&mut open_file(&reader, locator));
}

#[test]
fn test_long_values_and_keys() {
    let fixture = SegmentFixture::new();
    let mut s = String::from("this is a longer string");
    for _ in 0..10 {
        s = s.clone() + &s;
    }

    let v = s.as_str();
    let seg = memory(&[("k1", v), ("k2", v), ("k3", v), ("k4", v)]);
    let file = fixture.create("long_vals");
    let locator = write_to_file(&file, &mut seg.open_cursor());

    let mut csr = open_file(&file, locator);
    csr.first().unwrap();
    while csr.is_valid() {
        assert_eq!(csr.key().unwrap().len(), 2);
        assert_eq!(csr.value_length().unwrap(), Some(s.len() as u64));
        csr.next().unwrap();
    }
    csr.last().unwrap();
    while csr.is_valid() {
        assert_eq!(value_string(&mut csr).as_deref(), Some(s.as_str()));
        csr.prev().unwrap();
    }

    let keys = [s.clone(), s.repeat(2), s.repeat(3), s.repeat(4)];
    let seg: MemorySegment = keys.iter().map(|k| (k.as_str(), "k1")).collect();
    let file = fixture.create("long_keys");
    let locator = write_to_file(&file, &mut seg.open_cursor());

    let mut csr = open_file(&file, locator);
    let read: Vec<_> = keys_forward(&mut csr).unwrap();
    assert_eq!(read, keys.iter().map(|k| k.as_bytes().to_vec()).collect::<Vec<_>>());
    csr.seek(keys[2].as_bytes(), SeekOp::Eq).unwrap();
    assert_eq!(value_string(&mut csr).as_deref(), Some("k1"));
}

#[test]
fn test_seek_ge_le_in_memory_store() {
    let seg: MemorySegment = (b'a'..=b'y')
        .step_by(2)
        .zip((1..).step_by(2))
        .map(|(c, v): (u8, i32)| (vec![c], v.to_string()))
        .collect();
    assert_eq!(count_forward(&mut seg.open_cursor()).unwrap(), 13);
    assert_eq!(count_backward(&mut seg.open_cursor()).unwrap(), 13);

    let mut store = Vec::new();
    let locator = write_to_vec(&mut store, &mut seg.open_cursor());
    let mut csr = open_vec(&store, locator);

    assert_eq!(count_forward(&mut csr).unwrap(), 13);
    assert_eq!(count_backward(&mut csr).unwrap(), 13);

    csr.seek(b"n", SeekOp::Eq).unwrap();
    assert!(!csr.is_valid());
    csr.seek(b"n", SeekOp::Le).unwrap();
    assert_eq!(key_string(&csr), "m");
    csr.seek(b"n", SeekOp::Ge).unwrap();
    assert_eq!(key_string(&csr), "o");
}

#[test]
fn test_seek_ge_le_bigger() {
    let fixture = SegmentFixture::new();
    let seg: MemorySegment = (0..10_000)
        .map(|i| ((i * 2).to_string(), i.to_string()))
        .collect();

    let file = fixture.create("seek_ge_le_bigger");
    let locator = write_to_file(&file, &mut seg.open_cursor());
    let mut csr = open_file(&file, locator);

    csr.seek(b"8088", SeekOp::Eq).unwrap();
    assert!(csr.is_valid());
    csr.seek(b"8087", SeekOp::Eq).unwrap();
    assert!(!csr.is_valid());
    csr.seek(b"8087", SeekOp::Le).unwrap();
    assert_eq!(key_string(&csr), "8086");
    csr.seek(b"8087", SeekOp::Ge).unwrap();
    assert_eq!(key_string(&csr), "8088");
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

    let mut living = LivingCursor::new(seg.open_cursor());
    assert_eq!(count_forward(&mut living).unwrap(), 0);
    assert_eq!(count_backward(&mut living).unwrap(), 0);

    // tombstones survive the trip through a B-tree
    let mut store = Vec::new();
    let locator = write_to_vec(&mut store, &mut seg.open_cursor());
    let mut csr = open_vec(&store, locator);
    assert_eq!(count_forward(&mut csr).unwrap(), 3);
    csr.seek(b"", SeekOp::Eq).unwrap();
    assert!(csr.is_tombstone().unwrap());
    assert_eq!(csr.logical_length().unwrap(), -1);
    assert!(csr.read_value().unwrap().is_none());
}

#[test]
fn test_empty_segment() {
    let empty = MemorySegment::new();
    let mut store = Vec::new();
    let locator = write_to_vec(&mut store, &mut empty.open_cursor());
    assert_eq!(locator.entry_count, 0);

    let mut csr = open_vec(&store, locator);
    assert_eq!(count_forward(&mut csr).unwrap(), 0);
    assert_eq!(count_backward(&mut csr).unwrap(), 0);
    csr.seek(b"", SeekOp::Ge).unwrap();
    assert!(!csr.is_valid());

    let other = MemorySegment::new();
    let mut mc = MultiCursor::new(vec![
        Box::new(other.open_cursor()),
        Box::new(open_vec(&store, locator)),
    ]);
    mc.seek(b"", SeekOp::Le).unwrap();
    assert!(!mc.is_valid());
}

#[test]
fn test_btree_in_memory() {
    let seg = memory(&[("a", "1"), ("b", "2"), ("c", "3")]);
    assert_eq!(count_forward(&mut seg.open_cursor()).unwrap(), 3);
    assert_eq!(count_backward(&mut seg.open_cursor()).unwrap(), 3);

    let mut store = Vec::new();
    let locator = write_to_vec(&mut store, &mut seg.open_cursor());
    let mut csr = open_vec(&store, locator);

    csr.seek(b"b", SeekOp::Eq).unwrap();
    assert!(csr.is_valid());
    assert_eq!(value_string(&mut csr).as_deref(), Some("2"));
}

#[test]
fn test_empty_value() {
    let fixture = SegmentFixture::new();
    let seg = memory(&[("_", "")]);

    let mut csr = seg.open_cursor();
    csr.seek(b"_", SeekOp::Eq).unwrap();
    assert!(csr.is_valid());
    assert_eq!(csr.value_length().unwrap(), Some(0));

    let file = fixture.create("empty_val");
    let locator = write_to_file(&file, &mut csr);
    drop(file);

    let reader = fixture.open("empty_val");
    let mut csr = open_file(&reader, locator);
    csr.seek(b"_", SeekOp::Eq).unwrap();
    assert!(csr.is_valid());
    assert_eq!(csr.value_length().unwrap(), Some(0));
    assert!(!csr.is_tombstone().unwrap());
    assert_eq!(value_string(&mut csr).as_deref(), Some(""));
}

#[test]
fn test_segments_share_memory_store() {
    let a = memory(&[("a", "1"), ("c", "3")]);
    let b = memory(&[("b", "2"), ("c", "old")]);

    let mut store = Vec::new();
    let la = write_to_vec(&mut store, &mut a.open_cursor());
    let lb = write_to_vec(&mut store, &mut b.open_cursor());
    assert!(lb.first_page > la.root);

    let mut mc = MultiCursor::new(vec![
        Box::new(open_vec(&store, la)),
        Box::new(open_vec(&store, lb)),
    ]);
    assert_eq!(
        keys_forward(&mut mc).unwrap(),
        vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
    );
    mc.seek(b"c", SeekOp::Eq).unwrap();
    assert_eq!(value_string(&mut mc).as_deref(), Some("3"));
}
