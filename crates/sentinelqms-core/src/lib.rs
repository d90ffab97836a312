// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

//! sentinelqms-core
//!
//! Deterministic custody-boundary hash-parity verification engine.
//!
//! Given two snapshots of an evidence corpus, expressed purely as dual
//! cryptographic digest pairs, this crate decides whether the corpus is
//! byte- and membership-identical to a reference state and, if not,
//! enumerates exactly what changed:
//! - dual digest model (SHA-256 primary, RIPEMD-160 of the primary)
//! - manifests as multisets of digest pairs
//! - order-independent evidence set fingerprint (ESF)
//! - pairwise comparator producing PASS or an enumerated divergence
//! - boundary adapter normalizing external manifest records
//! - write-once anchoring oracle seam for public ESF attestation

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod adapter;
pub mod anchor;
pub mod compare;
pub mod digest;
pub mod error;
pub mod manifest;

pub use crate::compare::{compare, Divergence, ParityReport, VerificationOutcome};
pub use crate::digest::DigestPair;
pub use crate::error::{SentinelError, SentinelResult};
pub use crate::manifest::{Manifest, ManifestEntry, MembershipRole};
