// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Branch-explicit outcome classification.
//!
//! Observed comparator output is mapped against the pre-registered expected
//! relation at two independent layers: individual-file integrity (the
//! element-wise diff) and set-membership integrity (ESF equality). The
//! confusion mapping is exhaustive; there are no fallthrough defaults.

use crate::arm::{ComparisonArm, ExpectedRelation};
use sentinelqms_core::compare::ParityReport;
use sentinelqms_core::{SentinelError, SentinelResult, VerificationOutcome};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLayer {
    File,
    Membership,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfusionCell {
    TruePositive,
    FalseNegative,
    FalsePositive,
    TrueNegative,
}

impl ConfusionCell {
    pub fn is_correct(self) -> bool {
        matches!(self, Self::TruePositive | Self::TrueNegative)
    }
}

/// The positive class is "divergence present". A MISMATCH arm observed as
/// DIVERGENT is a true positive; a MATCH arm observed as DIVERGENT is a
/// false positive.
pub fn confusion_cell(expected: ExpectedRelation, observed: VerificationOutcome) -> ConfusionCell {
    match (expected, observed) {
        (ExpectedRelation::Match, VerificationOutcome::Pass) => ConfusionCell::TrueNegative,
        (ExpectedRelation::Match, VerificationOutcome::Divergent) => ConfusionCell::FalsePositive,
        (ExpectedRelation::Mismatch, VerificationOutcome::Pass) => ConfusionCell::FalseNegative,
        (ExpectedRelation::Mismatch, VerificationOutcome::Divergent) => ConfusionCell::TruePositive,
    }
}

/// Non-fatal caveats attached to a classification. Surfaced in output,
/// never resolved into the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Caveat {
    /// The arm pre-registered byte-identical positional swaps, which are
    /// invisible to membership signals; the observed outcome is only
    /// partially decidable.
    ByteIdenticalRearrangement,
    /// Duplicate digest pairs exist in a snapshot; positional identity
    /// among them is not recoverable.
    DuplicatePairsPresent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub layer: VerificationLayer,
    pub expected: ExpectedRelation,
    pub observed: VerificationOutcome,
    pub cell: ConfusionCell,
    pub correct: bool,
    pub caveats: Vec<Caveat>,
}

fn layer_outcome(report: &ParityReport, layer: VerificationLayer) -> VerificationOutcome {
    // The two layers coincide by engine invariant but are read from their
    // own signals and scored as independent series.
    let pass = match layer {
        VerificationLayer::File => report.divergence.is_empty(),
        VerificationLayer::Membership => report.divergence.esf_equal,
    };
    if pass {
        VerificationOutcome::Pass
    } else {
        VerificationOutcome::Divergent
    }
}

/// Classifies one arm's observed comparator output at one layer.
pub fn classify(
    arm: &ComparisonArm,
    report: &ParityReport,
    layer: VerificationLayer,
) -> ClassificationResult {
    let expected = arm.expected_relation();
    let observed = layer_outcome(report, layer);
    let cell = confusion_cell(expected, observed);

    let mut caveats = Vec::new();
    if arm.swap_k > 0 && report.divergence.is_empty() {
        caveats.push(Caveat::ByteIdenticalRearrangement);
    }
    if report.rearrangement_undecidable {
        caveats.push(Caveat::DuplicatePairsPresent);
    }

    ClassificationResult {
        layer,
        expected,
        observed,
        cell,
        correct: cell.is_correct(),
        caveats,
    }
}

/// A statistic that is either a value or explicitly not applicable.
/// Degenerate denominators are never coerced to a numeric default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Statistic {
    Value(f64),
    NotApplicable,
}

impl Statistic {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::NotApplicable => None,
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> Statistic {
    if denominator == 0 {
        Statistic::NotApplicable
    } else {
        Statistic::Value(numerator as f64 / denominator as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionCounts {
    pub true_positive: u64,
    pub false_negative: u64,
    pub false_positive: u64,
    pub true_negative: u64,
}

impl ConfusionCounts {
    pub fn record(&mut self, cell: ConfusionCell) {
        match cell {
            ConfusionCell::TruePositive => self.true_positive += 1,
            ConfusionCell::FalseNegative => self.false_negative += 1,
            ConfusionCell::FalsePositive => self.false_positive += 1,
            ConfusionCell::TrueNegative => self.true_negative += 1,
        }
    }

    pub fn merge(&mut self, other: &ConfusionCounts) {
        self.true_positive += other.true_positive;
        self.false_negative += other.false_negative;
        self.false_positive += other.false_positive;
        self.true_negative += other.true_negative;
    }

    pub fn total(&self) -> u64 {
        self.true_positive + self.false_negative + self.false_positive + self.true_negative
    }

    pub fn sensitivity(&self) -> Statistic {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn specificity(&self) -> Statistic {
        ratio(self.true_negative, self.true_negative + self.false_positive)
    }

    pub fn false_positive_rate(&self) -> Statistic {
        ratio(self.false_positive, self.false_positive + self.true_negative)
    }

    pub fn false_negative_rate(&self) -> Statistic {
        ratio(self.false_negative, self.false_negative + self.true_positive)
    }
}

/// Item-level confusion derived from aggregate counts.
///
/// This is a documented approximation: when per-item identity is not
/// directly observable, expected and observed tamper counts are assumed to
/// index the same conceptual set. `TP = min(expected, observed)`,
/// `FN = max(0, expected - observed)`, `FP = max(0, observed - expected)`,
/// `TN = total - TP - FN - FP`. A negative TN aborts rather than clamping.
pub fn item_confusion(
    total_items: u64,
    expected_tamper: u64,
    observed_tamper: u64,
) -> SentinelResult<ConfusionCounts> {
    let true_positive = expected_tamper.min(observed_tamper);
    let false_negative = expected_tamper.saturating_sub(observed_tamper);
    let false_positive = observed_tamper.saturating_sub(expected_tamper);
    let accounted = true_positive + false_negative + false_positive;
    let true_negative = total_items.checked_sub(accounted).ok_or_else(|| {
        SentinelError::InvariantViolation {
            code: "ITEM_TN_NEGATIVE",
            message: format!(
                "item confusion would need negative TN: total={total_items} \
                 expected={expected_tamper} observed={observed_tamper}"
            ),
        }
    })?;
    Ok(ConfusionCounts {
        true_positive,
        false_negative,
        false_positive,
        true_negative,
    })
}
