//! Fuzz target for message entity extraction.
//!
//! Run with: cargo +nightly fuzz run fuzz_extract
//!
//! Extracted URLs must be substrings of the input, and every extracted
//! command must tokenize cleanly in the command parser.

#![no_main]

use hydrator_core::commands::parse_command;
use hydrator_core::extract::{extract_bang_commands, extract_urls};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    for url in extract_urls(text) {
        assert!(text.contains(url.as_str()));
    }

    for command in extract_bang_commands(text) {
        let (name, _) = parse_command(&command).expect("extracted command tokenizes");
        assert!(!name.is_empty());
    }
});
