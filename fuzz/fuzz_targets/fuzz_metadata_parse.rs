//! Fuzz target: names and sidecars found in the capture store.
//!
//! Storage survives reboots and may hold anything, so both parsers must be
//! total. Whatever parses must render back to something that parses the
//! same way.
//!
//! cargo fuzz run fuzz_metadata_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use petcam::store::RecordKey;
use petcam::store::record::{format_location, parse_location};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    if let Some(key) = RecordKey::from_image_name(text) {
        assert_eq!(RecordKey::from_image_name(&key.image_name()), Some(key));
    }

    if let Some(loc) = parse_location(text) {
        assert!(loc.latitude.is_finite() && loc.longitude.is_finite());
        assert_eq!(parse_location(&format_location(&loc)), Some(loc));
    }
});
