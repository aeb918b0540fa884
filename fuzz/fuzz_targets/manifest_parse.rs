#![no_main]

use libfuzzer_sys::fuzz_target;
use pod_types::Manifest;

// Deserializing arbitrary bytes as the `pod.deploy.yml` manifest shape
// must never panic, regardless of how malformed the YAML is.
fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = serde_yaml::from_str::<Manifest>(text);
    }
});
