#![no_main]

use std::path::PathBuf;

use libfuzzer_sys::fuzz_target;
use pod_deploy::is_excluded;

// Spec §4.4 / §9 Design Notes: the three-rule exclusion grammar (trailing
// slash, `*.ext` suffix, exact literal) must handle any relative path and
// any pattern list without panicking — including patterns with unusual
// Unicode or path separators baked into the string.
fuzz_target!(|input: (String, Vec<String>)| {
    let (relative, patterns) = input;
    let _ = is_excluded(&PathBuf::from(relative), &patterns);
});
