#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use sentinelqms_core::{compare, DigestPair, Manifest, VerificationOutcome};

#[derive(Debug, Arbitrary)]
struct Input {
    reference_seeds: Vec<u16>,
    candidate_seeds: Vec<u16>,
}

fn manifest(seeds: &[u16]) -> Manifest {
    seeds
        .iter()
        .take(512)
        .map(|s| DigestPair::of_bytes(&s.to_be_bytes()))
        .collect()
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(input) = Input::arbitrary(&mut u) else {
        return;
    };

    let reference = manifest(&input.reference_seeds);
    let candidate = manifest(&input.candidate_seeds);

    let Ok(report) = compare(&reference, &candidate) else {
        return;
    };

    // Self-comparison is always a clean pass.
    let Ok(reflexive) = compare(&reference, &reference) else {
        return;
    };
    assert_eq!(reflexive.outcome, VerificationOutcome::Pass);
    assert!(reflexive.divergence.is_empty());

    // The element-wise diff and the set fingerprint must agree.
    assert_eq!(report.divergence.is_empty(), report.divergence.esf_equal);
    match report.outcome {
        VerificationOutcome::Pass => assert!(report.divergence.is_empty()),
        VerificationOutcome::Divergent => assert!(!report.divergence.is_empty()),
    }

    // Reversal mirrors missing and extra.
    let Ok(reversed) = compare(&candidate, &reference) else {
        return;
    };
    assert_eq!(report.divergence.missing, reversed.divergence.extra);
    assert_eq!(report.divergence.extra, reversed.divergence.missing);
    assert_eq!(report.outcome, reversed.outcome);
});
