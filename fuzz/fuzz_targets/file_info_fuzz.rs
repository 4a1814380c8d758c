//! Fuzz test for the DEPOT file-info resolver
//!
//! Feeds arbitrary paths to `get_file_info` looking for panics on odd
//! slicing (multi-byte characters, dotfiles, trailing separators, repeated
//! compression suffixes).
//!
//! Run with: cargo +nightly fuzz run file_info_fuzz -- -max_total_time=60

#![no_main]

use depot_core::{extname, get_file_info};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(path) = std::str::from_utf8(data) {
        let info = get_file_info(path);
        let lower = path.to_ascii_lowercase();

        // The extension is empty or dot-prefixed, and lowercase.
        assert!(info.extname.is_empty() || info.extname.starts_with('.'));
        assert_eq!(info.extname, info.extname.to_ascii_lowercase());

        // Compression flags always reflect real suffixes.
        if info.gzip {
            assert!(lower.ends_with(".gz"));
        }
        if info.br {
            assert!(lower.ends_with(".br") || lower.ends_with(".br.gz"));
        }

        // A known MIME type implies a non-empty extension.
        if info.mime_type.is_some() {
            assert!(!info.extname.is_empty());
        }

        // extname never includes a separator.
        assert!(!extname(path).contains('/'));
    }
});
