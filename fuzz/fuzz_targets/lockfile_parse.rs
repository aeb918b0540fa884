#![no_main]

use libfuzzer_sys::fuzz_target;
use pod_types::LockFile;

// Spec §6: "the orchestrator MUST tolerate a missing file and an
// unparseable file (treating both as empty)". `pod_deploy::read_lock`
// already does that at the I/O layer; this target hammers the JSON
// deserialization underneath it directly.
fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(lock) = serde_json::from_str::<LockFile>(text) {
            // A value that parsed must also serialize back without
            // panicking, and round-trip to something that parses again.
            if let Ok(reserialized) = serde_json::to_string(&lock) {
                let _ = serde_json::from_str::<LockFile>(&reserialized);
            }
        }
    }
});
