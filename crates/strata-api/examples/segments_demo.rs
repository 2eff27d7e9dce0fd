//! Demonstrates flushing memory segments to disk and reading them back
//! through a merged, tombstone-free view.
//!
//! Run with: cargo run -p strata --example segments_demo

use std::fs::{self, OpenOptions};
use std::path::Path;

use strata::{
    write_segment, BTreeCursor, Cursor, FilePageManager, LivingCursor, MemorySegment,
    MultiCursor, SegmentLocator, StorageConfig,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = Path::new("./demo_segments");
    let store_path = dir.join("store.db");
    let config = StorageConfig::default().with_page_size(1024);

    println!("=== Strata Segments Demo ===\n");

    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;

    // PART 1: two generations of writes, flushed into one store file
    println!("PART 1: Flushing two memory segments...");
    let mut locators = Vec::new();
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&store_path)?;

        let mut first = MemorySegment::new();
        first.insert("user:1:name", "Alice");
        first.insert("user:1:email", "alice@example.com");
        first.insert("user:2:name", "Bob");
        first.insert("user:2:email", "bob@example.com");
        first.insert("user:2:bio", "x".repeat(5000));

        let mut second = MemorySegment::new();
        second.insert("user:1:role", "superadmin");
        second.delete("user:2:email");

        for seg in [&first, &second] {
            let pages = FilePageManager::new(&file, &config)?;
            let locator = write_segment(&mut &file, pages, &mut seg.open_cursor())?;
            println!(
                "   wrote {} entries, pages {}..={}",
                locator.entry_count, locator.first_page, locator.root
            );
            let name = format!("segment-{}.loc", locators.len());
            fs::write(dir.join(name), locator.encode()?)?;
            locators.push(locator);
        }
    }

    // PART 2: reopen from the saved locators, newest first
    println!("\nPART 2: Reading the merged view...");
    let file = OpenOptions::new().read(true).open(&store_path)?;
    let mut children: Vec<Box<dyn Cursor + '_>> = Vec::new();
    for i in (0..locators.len()).rev() {
        let bytes = fs::read(dir.join(format!("segment-{}.loc", i)))?;
        let locator = SegmentLocator::decode(&bytes)?;
        children.push(Box::new(BTreeCursor::open(&file, &config, locator)?));
    }

    let mut view = LivingCursor::new(MultiCursor::new(children));
    for entry in view.entries() {
        let (key, value) = entry?;
        let len = value.length().unwrap_or(0);
        let shown = match value.as_bytes() {
            Some(bytes) if bytes.len() <= 32 => String::from_utf8_lossy(bytes).into_owned(),
            _ => format!("<{} bytes>", len),
        };
        println!("   {} = {}", String::from_utf8_lossy(&key), shown);
    }

    fs::remove_dir_all(dir)?;
    println!("\n=== Demo Complete ===");
    Ok(())
}
