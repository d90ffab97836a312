// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pairwise comparator: the verification engine.
//!
//! Two independent checks are computed and cross-checked: the element-wise
//! multiset difference (the *local* investigative output, bounded-scope) and
//! ESF equality (the *publishable* fixed-size claim). ESF equality is never
//! required to enumerate what differs, and the element-wise diff is never
//! required to establish the public PASS claim; the separation is
//! deliberate and must be preserved.

use crate::digest::DigestPair;
use crate::error::{SentinelError, SentinelResult};
use crate::manifest::Manifest;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationOutcome {
    Pass,
    Divergent,
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::Divergent => f.write_str("DIVERGENT"),
        }
    }
}

/// Enumerated divergence between two snapshots. `missing` and `extra` are
/// multiset differences (one element per multiplicity unit, canonical
/// order) and are disjoint by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub missing: Vec<DigestPair>,
    pub extra: Vec<DigestPair>,
    pub esf_equal: bool,
}

impl Divergence {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Coarse tamper-pattern signals derived from the divergence counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TamperSignals {
    pub deletion_detected: bool,
    pub addition_detected: bool,
    pub substitution_possible: bool,
    /// Total tamper magnitude: missing count plus extras count.
    pub tamper_k: u64,
}

/// One candidate pairing of a missing entry with an extra entry when a
/// substitution pattern is possible. A heuristic investigative pointer, not
/// a proof of substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapCandidate {
    pub missing: DigestPair,
    pub extra: DigestPair,
}

/// Disclosure-safe comparison artefact: digest pairs, counts, and flags
/// only. Never carries original filenames.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParityReport {
    pub outcome: VerificationOutcome,
    pub divergence: Divergence,
    pub reference_esf: DigestPair,
    pub candidate_esf: DigestPair,
    pub tamper: TamperSignals,
    pub swap_candidates: Vec<SwapCandidate>,
    /// Declared non-decidability: byte-identical artefacts at different
    /// positions cannot be distinguished from added/removed artefacts using
    /// digest pairs alone. Set whenever either snapshot carries duplicate
    /// pairs; surfaced, never silently resolved.
    pub rearrangement_undecidable: bool,
}

fn multiset_difference(from: &Manifest, to: &Manifest) -> Vec<DigestPair> {
    let mut out = Vec::new();
    for (pair, count) in from.iter() {
        let shortfall = count.saturating_sub(to.multiplicity(pair));
        for _ in 0..shortfall {
            out.push(*pair);
        }
    }
    out
}

/// Compares a candidate snapshot against the immutable reference snapshot.
///
/// PASS iff `missing` and `extra` are empty and the fingerprints agree.
/// The element-wise and ESF checks must agree with each other; any
/// disagreement is a correctness bug in the engine and aborts the run.
pub fn compare(reference: &Manifest, candidate: &Manifest) -> SentinelResult<ParityReport> {
    let missing = multiset_difference(reference, candidate);
    let extra = multiset_difference(candidate, reference);

    let reference_esf = reference.fingerprint();
    let candidate_esf = candidate.fingerprint();
    let esf_equal = reference_esf == candidate_esf;

    let elementwise_equal = missing.is_empty() && extra.is_empty();
    if elementwise_equal != esf_equal {
        return Err(SentinelError::InvariantViolation {
            code: "ESF_DIFF_DISAGREE",
            message: format!(
                "element-wise diff says equal={elementwise_equal} but esf_equal={esf_equal}"
            ),
        });
    }

    let outcome = if elementwise_equal {
        VerificationOutcome::Pass
    } else {
        VerificationOutcome::Divergent
    };

    let deletion_detected = !missing.is_empty();
    let addition_detected = !extra.is_empty();
    let tamper = TamperSignals {
        deletion_detected,
        addition_detected,
        substitution_possible: deletion_detected && addition_detected,
        tamper_k: (missing.len() + extra.len()) as u64,
    };

    let swap_candidates = if tamper.substitution_possible {
        missing
            .iter()
            .zip(extra.iter())
            .map(|(m, e)| SwapCandidate {
                missing: *m,
                extra: *e,
            })
            .collect()
    } else {
        Vec::new()
    };

    let rearrangement_undecidable = reference.has_duplicates() || candidate.has_duplicates();

    Ok(ParityReport {
        outcome,
        divergence: Divergence {
            missing,
            extra,
            esf_equal,
        },
        reference_esf,
        candidate_esf,
        tamper,
        swap_candidates,
        rearrangement_undecidable,
    })
}
