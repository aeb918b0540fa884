#![no_main]

use libfuzzer_sys::fuzz_target;
use pod_ast::parse_source;

// The macro expander's Phase 1 parses arbitrary project source files as
// TypeScript-family source. A syntactically broken file must surface as
// a parse error, never a panic — this is the externally-facing boundary
// of the whole expander.
fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        let _ = parse_source(source, "fuzz.ts", false);
        let _ = parse_source(source, "fuzz.tsx", true);
    }
});
