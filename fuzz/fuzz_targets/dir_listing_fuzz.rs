//! Fuzz test for directory listing helpers
//!
//! Splits the input into a directory and a common-prefix entry and checks
//! that normalization and child-name extraction never panic and keep their
//! shape.
//!
//! Run with: cargo +nightly fuzz run dir_listing_fuzz -- -max_total_time=60

#![no_main]

use depot_core::{child_name, normalize_dir, upload_key, DELIMITER};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let (dir, entry) = input.split_once('\n').unwrap_or((input, ""));

    let prefix = normalize_dir(dir);
    assert!(prefix.ends_with(DELIMITER));
    assert!(prefix.starts_with(dir));

    // An entry built the way a delimited listing reports it must round-trip.
    let common = format!("{}{}{}", prefix, entry.replace(DELIMITER, ""), DELIMITER);
    match child_name(&prefix, &common) {
        Some(name) => {
            assert!(!name.is_empty());
            assert!(!name.ends_with(DELIMITER));
            assert_eq!(name, entry.replace(DELIMITER, ""));
        }
        None => assert!(entry.replace(DELIMITER, "").is_empty()),
    }

    // Arbitrary entries never panic.
    let _ = child_name(&prefix, entry);

    let key = upload_key(dir, entry);
    assert!(!key.contains('\\'));
});
