// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fail-closed quality-control gates and the run report.
//!
//! All run state is explicit: an immutable [`RunContext`] is threaded into
//! each stage and a [`RunReport`] is accumulated and merged. Nothing is
//! stashed in globals, so two runs in one process cannot contaminate each
//! other.

use crate::arm::{ArmKey, CandidateLabel, ComparisonArm, OperatorId};
use crate::classify::VerificationLayer;
use sentinelqms_core::SentinelError;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Immutable per-run configuration, declared before any arm is scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunContext {
    pub run_id: String,
    /// Expected number of scored arms; a mismatch is a hard stop.
    pub declared_arm_count: usize,
    /// Operators expected per comparison key (2 for dual-operator runs).
    pub operators_per_key: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QcLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QcEvent {
    pub level: QcLevel,
    pub code: &'static str,
    pub message: String,
}

/// Accumulated QC events for one run. Merged, never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub events: Vec<QcEvent>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, code: &'static str, message: impl Into<String>) {
        self.events.push(QcEvent {
            level: QcLevel::Info,
            code,
            message: message.into(),
        });
    }

    pub fn error(&mut self, code: &'static str, message: impl Into<String>) {
        self.events.push(QcEvent {
            level: QcLevel::Error,
            code,
            message: message.into(),
        });
    }

    pub fn merge(&mut self, other: RunReport) {
        self.events.extend(other.events);
    }

    pub fn error_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.level == QcLevel::Error)
            .count()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QcError {
    #[error("scored arm count {scored} does not match declared {declared}")]
    RowCountUnexpected { declared: usize, scored: usize },
    #[error("comparison key {key} has {got} operators, expected {expected}")]
    OperatorCountBad {
        key: String,
        expected: usize,
        got: usize,
    },
    #[error("comparison key {key} is missing its paired candidate")]
    CandidatePairIncomplete { key: String },
    #[error("comparison key {key} declares identical expected match and mismatch candidates")]
    ExpectedMatchEqualsMismatch { key: String },
    #[error("comparison key {key} carries a candidate label outside its pair")]
    CandidateLabelOutsidePair { key: String },
    #[error("reconciliation failed at {layer:?} layer: cells sum to {cells}, scored {scored}")]
    ReconciliationFailed {
        layer: VerificationLayer,
        cells: u64,
        scored: u64,
    },
    #[error(transparent)]
    Core(#[from] SentinelError),
}

/// Completeness gate run before any classification.
///
/// Checks the declared arm count, the operator count per comparison key,
/// and that every arm key has both candidates of its pre-registered pair
/// represented somewhere in the design. Violations are logged and the
/// first one aborts the run.
pub fn check_completeness(
    ctx: &RunContext,
    arms: &[ComparisonArm],
    report: &mut RunReport,
) -> Result<(), QcError> {
    if arms.len() != ctx.declared_arm_count {
        let err = QcError::RowCountUnexpected {
            declared: ctx.declared_arm_count,
            scored: arms.len(),
        };
        tracing::error!(run_id = %ctx.run_id, %err, "completeness gate failed");
        report.error("QC_ROW_COUNT", err.to_string());
        return Err(err);
    }

    let mut operators: BTreeMap<ArmKey, BTreeSet<OperatorId>> = BTreeMap::new();
    for arm in arms {
        let key = arm.comparison_key();
        if arm.expected_match_candidate == arm.expected_mismatch_candidate {
            let err = QcError::ExpectedMatchEqualsMismatch {
                key: key.to_string(),
            };
            tracing::error!(run_id = %ctx.run_id, %err, "completeness gate failed");
            report.error("QC_BLINDING_DEGENERATE", err.to_string());
            return Err(err);
        }
        if arm.candidate_label != arm.expected_match_candidate
            && arm.candidate_label != arm.expected_mismatch_candidate
        {
            let err = QcError::CandidateLabelOutsidePair {
                key: key.to_string(),
            };
            tracing::error!(run_id = %ctx.run_id, %err, "completeness gate failed");
            report.error("QC_LABEL_OUTSIDE_PAIR", err.to_string());
            return Err(err);
        }
        operators.entry(key).or_default().insert(arm.operator.clone());
    }

    for (key, ops) in &operators {
        if ops.len() != ctx.operators_per_key {
            let err = QcError::OperatorCountBad {
                key: key.to_string(),
                expected: ctx.operators_per_key,
                got: ops.len(),
            };
            tracing::error!(run_id = %ctx.run_id, %err, "completeness gate failed");
            report.error("QC_OPERATOR_COUNT", err.to_string());
            return Err(err);
        }
    }

    // Each (node, stage, family, arm_code) must field both candidate
    // labels; scoring only one side of a blinded pair is meaningless.
    let mut labels: BTreeMap<(String, String), BTreeSet<CandidateLabel>> = BTreeMap::new();
    for arm in arms {
        let group = (
            format!("{:?}/{:?}/{:?}", arm.node, arm.stage, arm.family),
            arm.arm_code.clone(),
        );
        labels.entry(group).or_default().insert(arm.candidate_label);
    }
    for ((group, arm_code), seen) in &labels {
        if seen.len() < 2 {
            let err = QcError::CandidatePairIncomplete {
                key: format!("{group}/{arm_code}"),
            };
            tracing::error!(run_id = %ctx.run_id, %err, "completeness gate failed");
            report.error("QC_PAIR_INCOMPLETE", err.to_string());
            return Err(err);
        }
    }

    report.info(
        "QC_COMPLETE",
        format!(
            "completeness gate passed: {} arms, {} comparison keys",
            arms.len(),
            operators.len()
        ),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::{ArmFamily, NodeId, Stage};

    fn ctx(declared: usize, operators: usize) -> RunContext {
        RunContext {
            run_id: "run-qc-test".to_string(),
            declared_arm_count: declared,
            operators_per_key: operators,
        }
    }

    fn arm(operator: &str, candidate: CandidateLabel) -> ComparisonArm {
        ComparisonArm::new(
            NodeId::Node02,
            Stage::StageIv,
            ArmFamily::Tamper,
            "T-01",
            OperatorId(operator.to_string()),
            candidate,
            CandidateLabel::Candidate01,
            CandidateLabel::Candidate02,
            2,
            0,
        )
        .unwrap()
    }

    fn full_design() -> Vec<ComparisonArm> {
        vec![
            arm("op-a", CandidateLabel::Candidate01),
            arm("op-b", CandidateLabel::Candidate01),
            arm("op-a", CandidateLabel::Candidate02),
            arm("op-b", CandidateLabel::Candidate02),
        ]
    }

    #[test]
    fn complete_design_passes_the_gate() {
        let mut report = RunReport::new();
        check_completeness(&ctx(4, 2), &full_design(), &mut report).unwrap();
        assert_eq!(report.error_count(), 0);
        assert!(report.events.iter().any(|e| e.code == "QC_COMPLETE"));
    }

    #[test]
    fn row_count_mismatch_is_fatal_and_logged() {
        let mut report = RunReport::new();
        let err = check_completeness(&ctx(5, 2), &full_design(), &mut report).unwrap_err();
        assert_eq!(
            err,
            QcError::RowCountUnexpected {
                declared: 5,
                scored: 4
            }
        );
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn missing_operator_is_fatal() {
        let arms = vec![
            arm("op-a", CandidateLabel::Candidate01),
            arm("op-a", CandidateLabel::Candidate02),
        ];
        let mut report = RunReport::new();
        let err = check_completeness(&ctx(2, 2), &arms, &mut report).unwrap_err();
        assert!(matches!(err, QcError::OperatorCountBad { got: 1, .. }));
    }

    #[test]
    fn missing_paired_candidate_is_fatal() {
        let arms = vec![
            arm("op-a", CandidateLabel::Candidate01),
            arm("op-b", CandidateLabel::Candidate01),
        ];
        let mut report = RunReport::new();
        let err = check_completeness(&ctx(2, 2), &arms, &mut report).unwrap_err();
        assert!(matches!(err, QcError::CandidatePairIncomplete { .. }));
    }

    #[test]
    fn merged_reports_preserve_event_order() {
        let mut first = RunReport::new();
        first.info("A", "one");
        let mut second = RunReport::new();
        second.error("B", "two");
        first.merge(second);
        assert_eq!(first.events.len(), 2);
        assert_eq!(first.events[1].code, "B");
        assert_eq!(first.error_count(), 1);
    }
}
