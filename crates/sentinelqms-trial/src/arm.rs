// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pre-registered comparison arms and the blinding map.
//!
//! Stage, arm family, node, and candidate identities are closed variant
//! types; there is no string-keyed branching with fallthrough defaults.
//! Expected match/mismatch labels come from the external blinding
//! collaborator and are never generated or altered by the engine.

use sentinelqms_core::{SentinelError, SentinelResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "stage_iiia")]
    StageIiiA,
    #[serde(rename = "stage_iv")]
    StageIv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmFamily {
    Baseline,
    Tamper,
    PositiveControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Node02,
    Node03,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateLabel {
    Candidate01,
    Candidate02,
}

impl CandidateLabel {
    pub fn other(self) -> Self {
        match self {
            Self::Candidate01 => Self::Candidate02,
            Self::Candidate02 => Self::Candidate01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperatorId(pub String);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpectedRelation {
    Match,
    Mismatch,
}

/// One blinded experimental unit: a candidate snapshot compared against the
/// baseline, with a pre-declared expected outcome. Constructed once per
/// trial design before execution, consumed read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonArm {
    pub node: NodeId,
    pub stage: Stage,
    pub family: ArmFamily,
    pub arm_code: String,
    pub operator: OperatorId,
    pub candidate_label: CandidateLabel,
    pub expected_match_candidate: CandidateLabel,
    pub expected_mismatch_candidate: CandidateLabel,
    /// Declared tamper magnitude (entries altered, added, or removed).
    pub tamper_k: u64,
    /// Declared count of byte-identical positional swaps; invisible to
    /// membership signals.
    pub swap_k: u64,
}

impl ComparisonArm {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node: NodeId,
        stage: Stage,
        family: ArmFamily,
        arm_code: impl Into<String>,
        operator: OperatorId,
        candidate_label: CandidateLabel,
        expected_match_candidate: CandidateLabel,
        expected_mismatch_candidate: CandidateLabel,
        tamper_k: u64,
        swap_k: u64,
    ) -> SentinelResult<Self> {
        if expected_match_candidate == expected_mismatch_candidate {
            return Err(SentinelError::InvalidArgument(
                "expected match candidate equals expected mismatch candidate".to_string(),
            ));
        }
        // Two candidates total, so membership in the pair is implied by the
        // check above; kept explicit in case the label domain ever widens.
        if candidate_label != expected_match_candidate
            && candidate_label != expected_mismatch_candidate
        {
            return Err(SentinelError::InvalidArgument(
                "candidate label outside the pre-registered pair".to_string(),
            ));
        }
        Ok(Self {
            node,
            stage,
            family,
            arm_code: arm_code.into(),
            operator,
            candidate_label,
            expected_match_candidate,
            expected_mismatch_candidate,
            tamper_k,
            swap_k,
        })
    }

    /// Derived from the pre-registered blinding key only, never from the
    /// observed outcome.
    pub fn expected_relation(&self) -> ExpectedRelation {
        if self.candidate_label == self.expected_match_candidate {
            ExpectedRelation::Match
        } else {
            ExpectedRelation::Mismatch
        }
    }

    /// Key identifying one comparison independent of operator.
    pub fn comparison_key(&self) -> ArmKey {
        ArmKey {
            node: self.node,
            stage: self.stage,
            family: self.family,
            arm_code: self.arm_code.clone(),
            candidate_label: self.candidate_label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArmKey {
    pub node: NodeId,
    pub stage: Stage,
    pub family: ArmFamily,
    pub arm_code: String,
    pub candidate_label: CandidateLabel,
}

impl fmt::Display for ArmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{:?}/{}/{:?}",
            self.node, self.stage, self.family, self.arm_code, self.candidate_label
        )
    }
}

/// Packet kind inferred from a source-packet descriptor string supplied by
/// the blinding collaborator. Tamper detection is deliberately tight: an
/// explicit tamper marker is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Tamper,
    PositiveControl,
    Baseline,
}

fn looks_tamper(upper: &str) -> bool {
    upper.contains("TAMPER")
}

fn looks_positive_control(upper: &str) -> bool {
    upper.contains("PC_REEXPORT")
        || (upper.contains("PACKET") && (upper.contains("_PC") || upper.contains("PC_")))
}

pub fn packet_kind(descriptor: &str) -> PacketKind {
    let upper = descriptor.trim().to_ascii_uppercase();
    if looks_tamper(&upper) {
        PacketKind::Tamper
    } else if looks_positive_control(&upper) {
        PacketKind::PositiveControl
    } else {
        PacketKind::Baseline
    }
}

/// How an expected-match assignment was derived from packet semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivationRule {
    TamperBaselineMatchesTamper,
    PositiveControlMatchesPositiveControl,
    PositiveControlNonTamperFallback,
    BaselineMatchesNonTamper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedBlinding {
    pub expected_match_candidate: CandidateLabel,
    pub expected_mismatch_candidate: CandidateLabel,
    pub rule: DerivationRule,
}

fn resolved(
    expected_match: CandidateLabel,
    rule: DerivationRule,
) -> SentinelResult<ResolvedBlinding> {
    Ok(ResolvedBlinding {
        expected_match_candidate: expected_match,
        expected_mismatch_candidate: expected_match.other(),
        rule,
    })
}

/// Derives the expected match/mismatch assignment for one arm from the
/// baseline and candidate source descriptors. Refuses to guess: any
/// ambiguity is a fatal, self-identifying error.
pub fn derive_expected_labels(
    baseline_src: &str,
    candidate01_src: &str,
    candidate02_src: &str,
) -> SentinelResult<ResolvedBlinding> {
    if baseline_src.trim().is_empty()
        || candidate01_src.trim().is_empty()
        || candidate02_src.trim().is_empty()
    {
        return Err(SentinelError::InvalidArgument(
            "missing baseline or candidate source descriptor".to_string(),
        ));
    }

    let c1 = candidate01_src.trim().to_ascii_uppercase();
    let c2 = candidate02_src.trim().to_ascii_uppercase();
    let c1_tamper = looks_tamper(&c1);
    let c2_tamper = looks_tamper(&c2);
    let c1_pc = looks_positive_control(&c1);
    let c2_pc = looks_positive_control(&c2);

    match packet_kind(baseline_src) {
        // Baseline packet is itself tampered: the tamper-like candidate is
        // the one expected to match it.
        PacketKind::Tamper => {
            if c1_tamper && !c2_tamper {
                return resolved(
                    CandidateLabel::Candidate01,
                    DerivationRule::TamperBaselineMatchesTamper,
                );
            }
            if c2_tamper && !c1_tamper {
                return resolved(
                    CandidateLabel::Candidate02,
                    DerivationRule::TamperBaselineMatchesTamper,
                );
            }
            Err(SentinelError::InvalidArgument(format!(
                "ambiguous: baseline is tamper but candidates are not uniquely tamper \
                 (candidate01={candidate01_src}, candidate02={candidate02_src})"
            )))
        }
        PacketKind::PositiveControl => {
            if c1_pc && !c2_pc {
                return resolved(
                    CandidateLabel::Candidate01,
                    DerivationRule::PositiveControlMatchesPositiveControl,
                );
            }
            if c2_pc && !c1_pc {
                return resolved(
                    CandidateLabel::Candidate02,
                    DerivationRule::PositiveControlMatchesPositiveControl,
                );
            }
            // Fallback: if exactly one candidate is tamper, the other matches.
            if c1_tamper && !c2_tamper {
                return resolved(
                    CandidateLabel::Candidate02,
                    DerivationRule::PositiveControlNonTamperFallback,
                );
            }
            if c2_tamper && !c1_tamper {
                return resolved(
                    CandidateLabel::Candidate01,
                    DerivationRule::PositiveControlNonTamperFallback,
                );
            }
            Err(SentinelError::InvalidArgument(format!(
                "ambiguous: baseline is positive control but candidates are not uniquely \
                 distinguishable (candidate01={candidate01_src}, candidate02={candidate02_src})"
            )))
        }
        PacketKind::Baseline => {
            if c1_tamper && !c2_tamper {
                return resolved(
                    CandidateLabel::Candidate02,
                    DerivationRule::BaselineMatchesNonTamper,
                );
            }
            if c2_tamper && !c1_tamper {
                return resolved(
                    CandidateLabel::Candidate01,
                    DerivationRule::BaselineMatchesNonTamper,
                );
            }
            Err(SentinelError::InvalidArgument(format!(
                "ambiguous: baseline arm but neither candidate looks tamper \
                 (candidate01={candidate01_src}, candidate02={candidate02_src})"
            )))
        }
    }
}

/// Scope of one blinding map entry: a specific node, or every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeScope {
    All,
    Node(NodeId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapStatus {
    /// Placeholder awaiting a later active mapping or an explicit override.
    Pending,
    Active(ResolvedBlinding),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlindingMapEntry {
    pub scope: NodeScope,
    pub stage: Stage,
    pub family: ArmFamily,
    pub arm_code: String,
    pub status: MapStatus,
    /// SHA-256 of the source map document, carried for provenance.
    pub source_sha256: String,
    pub manual_override: bool,
}

type MapKey = (NodeScope, Stage, ArmFamily, String);

fn key_of(entry: &BlindingMapEntry) -> MapKey {
    (
        entry.scope,
        entry.stage,
        entry.family,
        entry.arm_code.clone(),
    )
}

/// The merged blinding map with override precedence:
/// - a pending entry is replaced by a later active entry
/// - an explicit manual override replaces anything
/// - two conflicting active entries are fatal
#[derive(Debug, Clone, Default)]
pub struct BlindingMap {
    entries: BTreeMap<MapKey, BlindingMapEntry>,
}

impl BlindingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: BlindingMapEntry) -> SentinelResult<()> {
        let key = key_of(&entry);
        match self.entries.get(&key) {
            None => {
                self.entries.insert(key, entry);
            }
            Some(existing) => match (&existing.status, &entry.status) {
                (MapStatus::Pending, MapStatus::Active(_)) => {
                    self.entries.insert(key, entry);
                }
                (MapStatus::Active(a), MapStatus::Active(b)) => {
                    if a.expected_match_candidate != b.expected_match_candidate {
                        return Err(SentinelError::InvalidArgument(format!(
                            "conflicting active blinding mappings for {:?}/{:?}/{:?}/{}",
                            entry.scope, entry.stage, entry.family, entry.arm_code
                        )));
                    }
                }
                // Pending never displaces anything.
                _ => {}
            },
        }
        Ok(())
    }

    /// Unconditional replacement for explicit manual overrides.
    pub fn insert_override(&mut self, entry: BlindingMapEntry) -> SentinelResult<()> {
        if !entry.manual_override {
            return Err(SentinelError::InvalidArgument(
                "override insertion requires the manual override flag".to_string(),
            ));
        }
        if !matches!(entry.status, MapStatus::Active(_)) {
            return Err(SentinelError::InvalidArgument(
                "override entry must be active".to_string(),
            ));
        }
        self.entries.insert(key_of(&entry), entry);
        Ok(())
    }

    pub fn lookup(
        &self,
        node: NodeId,
        stage: Stage,
        family: ArmFamily,
        arm_code: &str,
    ) -> Option<&BlindingMapEntry> {
        self.entries
            .get(&(NodeScope::Node(node), stage, family, arm_code.to_string()))
            .or_else(|| {
                self.entries
                    .get(&(NodeScope::All, stage, family, arm_code.to_string()))
            })
    }

    /// Resolves the active expected-label assignment for an arm key.
    /// Missing or still-pending mappings are fatal: an arm cannot be scored
    /// without its blinding key.
    pub fn expected_for(
        &self,
        node: NodeId,
        stage: Stage,
        family: ArmFamily,
        arm_code: &str,
    ) -> SentinelResult<ResolvedBlinding> {
        match self.lookup(node, stage, family, arm_code) {
            Some(entry) => match &entry.status {
                MapStatus::Active(resolved) => Ok(*resolved),
                MapStatus::Pending => Err(SentinelError::InvalidArgument(format!(
                    "blinding mapping still pending for {node:?}/{stage:?}/{family:?}/{arm_code}"
                ))),
            },
            None => Err(SentinelError::InvalidArgument(format!(
                "no blinding mapping for {node:?}/{stage:?}/{family:?}/{arm_code}"
            ))),
        }
    }

    pub fn active_len(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e.status, MapStatus::Active(_)))
            .count()
    }
}
