#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use pod_deploy::interpolate;

// Spec §4.4 / §9 Design Notes: `${key}` interpolation is a single,
// non-recursive pass over arbitrary template text. Any byte sequence
// (including truncated `${` tokens and non-UTF-8-adjacent boundaries)
// must produce output without panicking.
fuzz_target!(|input: (String, Vec<(String, String)>)| {
    let (template, pairs) = input;
    let context: BTreeMap<String, String> = pairs.into_iter().collect();
    let _ = interpolate(&template, &context);
});
