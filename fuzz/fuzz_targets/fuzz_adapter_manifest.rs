#![no_main]

use libfuzzer_sys::fuzz_target;
use sentinelqms_core::adapter::parse_manifest_json;

// Arbitrary bytes at the serialization boundary must never panic; every
// malformed input is a structured error.
fuzz_target!(|data: &[u8]| {
    if let Ok(manifest) = parse_manifest_json(data) {
        // A parsed manifest always fingerprints, including when empty.
        let _ = manifest.fingerprint();
        assert_eq!(manifest.is_empty(), manifest.len() == 0);
    }
});
