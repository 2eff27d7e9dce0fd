#![no_main]

use libfuzzer_sys::fuzz_target;
use strata_storage::SegmentLocator;

fuzz_target!(|data: &[u8]| {
    // Decoding should never panic; whatever decodes must re-encode identically
    if let Ok(locator) = SegmentLocator::decode(data) {
        let bytes = locator.encode().unwrap();
        assert_eq!(SegmentLocator::decode(&bytes).unwrap(), locator);
    }
});
