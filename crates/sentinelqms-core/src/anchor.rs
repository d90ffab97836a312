// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Public anchoring seam.
//!
//! An append-only timestamping service accepts only the ESF (or a composite
//! digest derived from ESFs) and returns an immutable reference. The engine
//! treats it as a write-once, read-verifiable oracle: local verification
//! never depends on its availability.

use crate::digest::{DigestPair, PairHasher};
use crate::error::SentinelResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DOMAIN_ANCHOR_V1: &[u8] = b"sentinelqms:anchor:v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub txid: String,
    pub block_height: u64,
}

pub trait AnchorOracle {
    /// Anchors an ESF. Write-once: re-anchoring a previously anchored ESF
    /// returns the original receipt.
    fn anchor(&mut self, esf: &DigestPair) -> SentinelResult<AnchorReceipt>;

    /// Verifies a previously issued receipt against an ESF.
    fn verify(&self, esf: &DigestPair, receipt: &AnchorReceipt) -> bool;
}

/// Composite digest binding a reference/candidate ESF pair into a single
/// anchorable value. Domain-separated so it can never collide with an
/// artefact digest.
pub fn composite_anchor_digest(reference_esf: &DigestPair, candidate_esf: &DigestPair) -> DigestPair {
    let mut hasher = PairHasher::new();
    hasher.update(DOMAIN_ANCHOR_V1);
    hasher.update(&reference_esf.encode());
    hasher.update(&candidate_esf.encode());
    hasher.finalize()
}

/// In-memory oracle double for tests and offline runs.
#[derive(Debug, Default)]
pub struct MemoryAnchor {
    entries: BTreeMap<DigestPair, AnchorReceipt>,
    next_height: u64,
}

impl MemoryAnchor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnchorOracle for MemoryAnchor {
    fn anchor(&mut self, esf: &DigestPair) -> SentinelResult<AnchorReceipt> {
        if let Some(existing) = self.entries.get(esf) {
            return Ok(existing.clone());
        }
        let block_height = self.next_height;
        self.next_height += 1;
        let mut hasher = PairHasher::new();
        hasher.update(DOMAIN_ANCHOR_V1);
        hasher.update(&esf.encode());
        hasher.update(&block_height.to_be_bytes());
        let receipt = AnchorReceipt {
            txid: hasher.finalize().sha256_hex(),
            block_height,
        };
        self.entries.insert(*esf, receipt.clone());
        Ok(receipt)
    }

    fn verify(&self, esf: &DigestPair, receipt: &AnchorReceipt) -> bool {
        self.entries.get(esf) == Some(receipt)
    }
}
