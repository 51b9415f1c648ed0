#![no_main]

use libfuzzer_sys::fuzz_target;
use uxfs::channel::wire::{escape_line, unescape_line};

/// Property 6 (spec §8): for any line, escaping then unescaping is the
/// identity, and an escaped line never equals the lone `.` terminator.
fuzz_target!(|data: &[u8]| {
    let escaped = escape_line(data);
    assert_ne!(escaped.as_slice(), b".");
    assert_eq!(unescape_line(&escaped), data);
});
