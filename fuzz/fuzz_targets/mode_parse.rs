#![no_main]

use libfuzzer_sys::fuzz_target;
use uxfs::table::Mode;

/// The mode-letter parser (spec §3's grammar) never panics on arbitrary
/// input, and normalization always leaves READ set on anything that
/// isn't write-only.
fuzz_target!(|letters: String| {
    let mode = Mode::parse(&letters);
    if !mode.contains(Mode::WRITE) || mode.contains(Mode::DIR) {
        assert!(mode.contains(Mode::READ));
    }
});
