use std::io::Cursor as IoCursor;

use strata::logging::LogConfig;
use strata::{
    count_forward, write_segment, BTreeCursor, Cursor, MemoryPageManager, MemorySegment,
    SeekOp, StorageConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Page-level tracing from the storage crate, compact output to stdout
    let _guard = LogConfig::pages().init()?;

    println!("=== Strata Logging Demo ===\n");

    let config = StorageConfig::default().with_page_size(256);
    let seg: MemorySegment = (0..50)
        .map(|i| (format!("key:{:03}", i), format!("value {}", i)))
        .collect();

    // Every page write is logged at trace level
    println!("1. Writing a segment...");
    let mut store = IoCursor::new(Vec::new());
    let pages = MemoryPageManager::new(store.get_ref(), &config)?;
    let locator = write_segment(&mut store, pages, &mut seg.open_cursor())?;

    println!("\n2. Opening a cursor...");
    let bytes = store.into_inner();
    let mut csr = BTreeCursor::open(IoCursor::new(bytes.as_slice()), &config, locator)?;
    println!("   {} entries", count_forward(&mut csr)?);

    println!("\n3. Seeking...");
    csr.seek(b"key:025", SeekOp::Eq)?;
    if let Some(value) = csr.read_value()? {
        println!("Found: {}", String::from_utf8_lossy(&value));
    }

    println!("\n4. Opening with a root outside the store...");
    let mut bad = locator;
    bad.root += 10;
    if let Err(e) = BTreeCursor::open(IoCursor::new(bytes.as_slice()), &config, bad) {
        println!("   rejected: {}", e);
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
