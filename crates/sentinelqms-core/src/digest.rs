// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{SentinelError, SentinelResult};
use ripemd::Ripemd160;
use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

pub const SHA256_LEN: usize = 32;
pub const RIPEMD160_LEN: usize = 20;
pub const PAIR_ENCODED_LEN: usize = SHA256_LEN + RIPEMD160_LEN;

/// Dual cryptographic digest over one artefact's raw bytes.
///
/// The secondary digest is RIPEMD-160 over the SHA-256 raw bytes, never over
/// the original content (digest-of-digest chain). A digest pair carries no
/// name, path, or timestamp; it is the only value that crosses the custody
/// boundary out of the local environment.
///
/// Ordering is lexicographic by the primary digest, tie-broken by the
/// secondary digest. This is the canonical ESF ordering; the derive relies
/// on the field order below.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DigestPair {
    pub sha256: [u8; SHA256_LEN],
    pub ripemd160: [u8; RIPEMD160_LEN],
}

impl DigestPair {
    /// Digest a complete byte slice. Pure, total: no error path for
    /// well-formed byte input.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = PairHasher::new();
        hasher.update(bytes);
        hasher.finalize()
    }

    pub fn from_hex(sha256_hex: &str, ripemd160_hex: &str) -> SentinelResult<Self> {
        Ok(Self {
            sha256: decode_exact(sha256_hex, "primary digest")?,
            ripemd160: decode_exact(ripemd160_hex, "secondary digest")?,
        })
    }

    /// Canonical 52-byte encoding: primary digest followed by secondary.
    pub fn encode(&self) -> [u8; PAIR_ENCODED_LEN] {
        let mut out = [0u8; PAIR_ENCODED_LEN];
        out[..SHA256_LEN].copy_from_slice(&self.sha256);
        out[SHA256_LEN..].copy_from_slice(&self.ripemd160);
        out
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }

    pub fn ripemd160_hex(&self) -> String {
        hex::encode(self.ripemd160)
    }
}

fn decode_exact<const N: usize>(hex_str: &str, what: &str) -> SentinelResult<[u8; N]> {
    let raw = hex::decode(hex_str)
        .map_err(|_| SentinelError::InvalidArgument(format!("{what} is not valid hex")))?;
    let arr: [u8; N] = raw.as_slice().try_into().map_err(|_| {
        SentinelError::InvalidArgument(format!("{what} must be {N} bytes, got {}", raw.len()))
    })?;
    Ok(arr)
}

/// Incremental dual-digest computation for large artefacts.
///
/// Content is fed in chunks; only `finalize` yields a digest pair. Partial
/// state is never observable, and an abandoned hasher must be dropped, not
/// resumed: digest state is not checkpointable.
#[derive(Clone, Default)]
pub struct PairHasher {
    inner: Sha256,
}

impl PairHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    pub fn finalize(self) -> DigestPair {
        let sha256: [u8; SHA256_LEN] = self.inner.finalize().into();
        let ripemd160: [u8; RIPEMD160_LEN] = Ripemd160::digest(sha256).into();
        DigestPair { sha256, ripemd160 }
    }
}

impl fmt::Debug for DigestPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DigestPair({}, {})",
            self.sha256_hex(),
            self.ripemd160_hex()
        )
    }
}

impl fmt::Display for DigestPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.sha256_hex(), self.ripemd160_hex())
    }
}

impl Serialize for DigestPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("DigestPair", 2)?;
        st.serialize_field("sha256", &self.sha256_hex())?;
        st.serialize_field("ripemd160", &self.ripemd160_hex())?;
        st.end()
    }
}

impl<'de> Deserialize<'de> for DigestPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            sha256: String,
            ripemd160: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        DigestPair::from_hex(&raw.sha256, &raw.ripemd160).map_err(D::Error::custom)
    }
}
