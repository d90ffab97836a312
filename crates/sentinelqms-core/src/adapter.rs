// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Boundary normalization for externally supplied manifests.
//!
//! External collaborators export a manifest as an ordered list of hex digest
//! pair records. Two field spellings are accepted and normalized here into
//! the one canonical internal representation; the core never dispatches on
//! which spelling was present. Zero-custody requirement: records carry no
//! filenames, paths, or timestamps, and unknown fields are rejected.

use crate::digest::DigestPair;
use crate::error::{SentinelError, SentinelResult};
use crate::manifest::{Manifest, ManifestEntry, MembershipRole};
use serde::Deserialize;

/// One external manifest record. `sha256`/`ripemd160` are accepted as
/// aliases for the canonical field names.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalPairRecord {
    #[serde(alias = "sha256")]
    pub primary_digest: String,
    #[serde(alias = "ripemd160")]
    pub secondary_digest: String,
    #[serde(default)]
    pub role: MembershipRole,
}

/// Normalizes external records into a canonical [`Manifest`]. Malformed
/// records are fatal and identified by position only.
pub fn parse_manifest(records: &[ExternalPairRecord]) -> SentinelResult<Manifest> {
    let mut manifest = Manifest::new();
    for (position, record) in records.iter().enumerate() {
        let pair = DigestPair::from_hex(&record.primary_digest, &record.secondary_digest)
            .map_err(|err| SentinelError::MalformedRecord {
                position,
                reason: err.to_string(),
            })?;
        manifest.insert_entry(ManifestEntry {
            pair,
            role: record.role,
        });
    }
    Ok(manifest)
}

/// Parses a JSON array of external records and normalizes it.
pub fn parse_manifest_json(payload: &[u8]) -> SentinelResult<Manifest> {
    let records: Vec<ExternalPairRecord> = serde_json::from_slice(payload)
        .map_err(|err| SentinelError::InvalidArgument(format!("manifest payload: {err}")))?;
    parse_manifest(&records)
}
