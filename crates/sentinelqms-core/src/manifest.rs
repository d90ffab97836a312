// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::digest::{DigestPair, PairHasher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Provenance role of an entry within a snapshot. Advisory metadata only:
/// entry identity and the set fingerprint are defined by the digest pair
/// alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    Required,
    Optional,
    Derived,
}

impl Default for MembershipRole {
    fn default() -> Self {
        Self::Required
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub pair: DigestPair,
    #[serde(default)]
    pub role: MembershipRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EntrySlot {
    multiplicity: u64,
    role: MembershipRole,
}

/// One evidence-set snapshot at one custody boundary.
///
/// A manifest is a multiset of digest pairs: legitimately duplicate
/// byte-identical artefacts are recorded as multiplicity, never collapsed.
/// Insertion order is irrelevant everywhere; callers must never rely on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<DigestPair, EntrySlot>,
    total: u64,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I: IntoIterator<Item = ManifestEntry>>(entries: I) -> Self {
        let mut manifest = Self::new();
        for entry in entries {
            manifest.insert_entry(entry);
        }
        manifest
    }

    pub fn from_pairs<I: IntoIterator<Item = DigestPair>>(pairs: I) -> Self {
        Self::from_entries(pairs.into_iter().map(|pair| ManifestEntry {
            pair,
            role: MembershipRole::default(),
        }))
    }

    /// Records one occurrence of the entry's digest pair. The role of the
    /// first occurrence wins; role is not part of identity.
    pub fn insert_entry(&mut self, entry: ManifestEntry) {
        let slot = self.entries.entry(entry.pair).or_insert(EntrySlot {
            multiplicity: 0,
            role: entry.role,
        });
        slot.multiplicity += 1;
        self.total += 1;
    }

    pub fn insert(&mut self, pair: DigestPair) {
        self.insert_entry(ManifestEntry {
            pair,
            role: MembershipRole::default(),
        });
    }

    /// Total multiplicity across all entries.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn distinct_len(&self) -> usize {
        self.entries.len()
    }

    pub fn multiplicity(&self, pair: &DigestPair) -> u64 {
        self.entries.get(pair).map_or(0, |slot| slot.multiplicity)
    }

    pub fn role(&self, pair: &DigestPair) -> Option<MembershipRole> {
        self.entries.get(pair).map(|slot| slot.role)
    }

    /// True when any digest pair occurs more than once. Positional identity
    /// among such duplicates is not recoverable from digest pairs.
    pub fn has_duplicates(&self) -> bool {
        self.entries.values().any(|slot| slot.multiplicity > 1)
    }

    /// Iterates entries in canonical digest order with multiplicities.
    pub fn iter(&self) -> impl Iterator<Item = (&DigestPair, u64)> {
        self.entries
            .iter()
            .map(|(pair, slot)| (pair, slot.multiplicity))
    }

    /// The evidence set fingerprint (ESF): a pure function of manifest
    /// content. Entries are taken in canonical order (lexicographic by
    /// primary digest, tie-broken by secondary, duplicates repeated per
    /// multiplicity), concatenated in their 52-byte encoding, and digested
    /// with the same dual-digest function used for artefacts.
    ///
    /// The empty manifest fingerprints to the empty-input digest pair, a
    /// valid reserved value.
    pub fn fingerprint(&self) -> DigestPair {
        let mut hasher = PairHasher::new();
        for (pair, multiplicity) in self.iter() {
            let encoded = pair.encode();
            for _ in 0..multiplicity {
                hasher.update(&encoded);
            }
        }
        hasher.finalize()
    }
}

impl FromIterator<DigestPair> for Manifest {
    fn from_iter<I: IntoIterator<Item = DigestPair>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}
