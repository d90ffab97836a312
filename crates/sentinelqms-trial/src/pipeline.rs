// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end trial scoring.
//!
//! Deterministic batch over the scored arms: completeness gate, per-arm
//! classification at both layers, stratified confusion tables, a
//! reconciliation identity per layer, cross-operator reproducibility, and
//! effort regressions. Same input, same report, bit for bit.

use crate::agreement::{
    cohen_kappa, effort_diagnostics, percent_agreement, EffortDiagnostics, EffortObservation,
};
use crate::arm::{ArmFamily, ArmKey, ComparisonArm, OperatorId, Stage};
use crate::classify::{
    classify, ClassificationResult, ConfusionCounts, Statistic, VerificationLayer,
};
use crate::qc::{check_completeness, QcError, RunContext, RunReport};
use sentinelqms_core::compare::ParityReport;
use sentinelqms_core::VerificationOutcome;
use serde::Serialize;
use std::collections::BTreeMap;

/// One executed arm: the pre-registered design row plus the comparator
/// output and effort telemetry observed for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredArm {
    pub arm: ComparisonArm,
    pub report: ParityReport,
    /// Wall-clock human verification time for this arm.
    pub duration_seconds: f64,
    /// Entries in the reference snapshot.
    pub corpus_size: u64,
}

/// Confusion table plus its derived rates for one slice of the trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayerMetrics {
    pub layer: VerificationLayer,
    pub counts: ConfusionCounts,
    pub sensitivity: Statistic,
    pub specificity: Statistic,
    pub false_positive_rate: Statistic,
    pub false_negative_rate: Statistic,
}

impl LayerMetrics {
    fn from_counts(layer: VerificationLayer, counts: ConfusionCounts) -> Self {
        Self {
            layer,
            counts,
            sensitivity: counts.sensitivity(),
            specificity: counts.specificity(),
            false_positive_rate: counts.false_positive_rate(),
            false_negative_rate: counts.false_negative_rate(),
        }
    }
}

/// One stratum row: confusion metrics restricted to a (stage, family)
/// cell at one layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRow {
    pub stage: Stage,
    pub family: ArmFamily,
    pub metrics: LayerMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialReport {
    pub run_id: String,
    pub scored_arms: usize,
    pub file_layer: LayerMetrics,
    pub membership_layer: LayerMetrics,
    pub strata: Vec<MetricsRow>,
    /// Fraction of multi-operator comparison keys with unanimous outcomes.
    pub operator_agreement: Statistic,
    /// Cohen's kappa between the two operators, when exactly two ran.
    pub kappa: Statistic,
    pub effort: EffortDiagnostics,
    pub qc: RunReport,
}

const LAYERS: [VerificationLayer; 2] = [VerificationLayer::File, VerificationLayer::Membership];

fn reconcile(
    layer: VerificationLayer,
    counts: &ConfusionCounts,
    scored: usize,
) -> Result<(), QcError> {
    let cells = counts.total();
    if cells != scored as u64 {
        return Err(QcError::ReconciliationFailed {
            layer,
            cells,
            scored: scored as u64,
        });
    }
    Ok(())
}

/// Observed outcomes per comparison key, keyed and ordered
/// deterministically, for the reproducibility metrics.
fn outcome_groups(
    classified: &[(ArmKey, OperatorId, ClassificationResult)],
) -> BTreeMap<ArmKey, BTreeMap<OperatorId, VerificationOutcome>> {
    let mut groups: BTreeMap<ArmKey, BTreeMap<OperatorId, VerificationOutcome>> = BTreeMap::new();
    for (key, operator, result) in classified {
        groups
            .entry(key.clone())
            .or_default()
            .insert(operator.clone(), result.observed);
    }
    groups
}

fn kappa_between_operators(
    groups: &BTreeMap<ArmKey, BTreeMap<OperatorId, VerificationOutcome>>,
) -> Result<Statistic, QcError> {
    let mut operators: Vec<&OperatorId> = groups
        .values()
        .flat_map(|by_op| by_op.keys())
        .collect();
    operators.sort();
    operators.dedup();
    if operators.len() != 2 {
        return Ok(Statistic::NotApplicable);
    }
    let (first, second) = (operators[0], operators[1]);

    let mut series_a = Vec::new();
    let mut series_b = Vec::new();
    for by_op in groups.values() {
        if let (Some(a), Some(b)) = (by_op.get(first), by_op.get(second)) {
            series_a.push(*a);
            series_b.push(*b);
        }
    }
    if series_a.is_empty() {
        return Ok(Statistic::NotApplicable);
    }
    Ok(Statistic::Value(cohen_kappa(&series_a, &series_b)?))
}

/// Scores a full trial run.
///
/// The completeness gate runs first and any violation aborts before a
/// single arm is classified. Per layer, the confusion cells must sum back
/// to the number of scored arms; a shortfall means an arm was silently
/// dropped and is fatal.
pub fn score_trial(ctx: &RunContext, scored: &[ScoredArm]) -> Result<TrialReport, QcError> {
    tracing::info!(run_id = %ctx.run_id, arms = scored.len(), "scoring trial run");

    let mut qc = RunReport::new();
    let arms: Vec<ComparisonArm> = scored.iter().map(|s| s.arm.clone()).collect();
    check_completeness(ctx, &arms, &mut qc)?;

    let mut overall: BTreeMap<VerificationLayer, ConfusionCounts> = BTreeMap::new();
    let mut strata: BTreeMap<(Stage, ArmFamily, VerificationLayer), ConfusionCounts> =
        BTreeMap::new();
    let mut file_classified: Vec<(ArmKey, OperatorId, ClassificationResult)> = Vec::new();

    for item in scored {
        for layer in LAYERS {
            let result = classify(&item.arm, &item.report, layer);
            overall.entry(layer).or_default().record(result.cell);
            strata
                .entry((item.arm.stage, item.arm.family, layer))
                .or_default()
                .record(result.cell);
            if layer == VerificationLayer::File {
                file_classified.push((
                    item.arm.comparison_key(),
                    item.arm.operator.clone(),
                    result,
                ));
            }
        }
    }

    let file_counts = overall
        .get(&VerificationLayer::File)
        .copied()
        .unwrap_or_default();
    let membership_counts = overall
        .get(&VerificationLayer::Membership)
        .copied()
        .unwrap_or_default();
    reconcile(VerificationLayer::File, &file_counts, scored.len())?;
    reconcile(VerificationLayer::Membership, &membership_counts, scored.len())?;
    qc.info(
        "QC_RECONCILED",
        format!("confusion cells reconcile to {} arms per layer", scored.len()),
    );

    let groups = outcome_groups(&file_classified);
    let grouped_outcomes: Vec<Vec<VerificationOutcome>> = groups
        .values()
        .map(|by_op| by_op.values().copied().collect())
        .collect();
    let operator_agreement = percent_agreement(&grouped_outcomes);
    let kappa = kappa_between_operators(&groups)?;

    let observations: Vec<EffortObservation> = scored
        .iter()
        .map(|s| EffortObservation {
            duration_seconds: s.duration_seconds,
            corpus_size: s.corpus_size,
            tamper_k: s.arm.tamper_k,
        })
        .collect();
    let effort = effort_diagnostics(&observations)?;

    let strata_rows = strata
        .into_iter()
        .map(|((stage, family, layer), counts)| MetricsRow {
            stage,
            family,
            metrics: LayerMetrics::from_counts(layer, counts),
        })
        .collect();

    tracing::info!(
        run_id = %ctx.run_id,
        qc_errors = qc.error_count(),
        "trial run scored"
    );

    Ok(TrialReport {
        run_id: ctx.run_id.clone(),
        scored_arms: scored.len(),
        file_layer: LayerMetrics::from_counts(VerificationLayer::File, file_counts),
        membership_layer: LayerMetrics::from_counts(VerificationLayer::Membership, membership_counts),
        strata: strata_rows,
        operator_agreement,
        kappa,
        effort,
        qc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agreement::FitOutcome;
    use crate::arm::{CandidateLabel, NodeId};
    use sentinelqms_core::{compare, DigestPair, Manifest};

    fn manifest(seeds: std::ops::Range<u8>) -> Manifest {
        seeds.map(|s| DigestPair::of_bytes(&[s])).collect()
    }

    fn design_arm(
        family: ArmFamily,
        arm_code: &str,
        operator: &str,
        candidate: CandidateLabel,
        tamper_k: u64,
    ) -> ComparisonArm {
        ComparisonArm::new(
            NodeId::Node02,
            Stage::StageIv,
            family,
            arm_code,
            OperatorId(operator.to_string()),
            candidate,
            CandidateLabel::Candidate01,
            CandidateLabel::Candidate02,
            tamper_k,
            0,
        )
        .unwrap()
    }

    /// One tamper arm key, both candidates, both operators: the matching
    /// candidate compares clean, the mismatching one diverges by k.
    fn perfect_run() -> Vec<ScoredArm> {
        let reference = manifest(0..10);
        let clean = compare(&reference, &reference.clone()).unwrap();
        let tampered = compare(&reference, &manifest(0..8)).unwrap();

        let mut scored = Vec::new();
        for operator in ["op-a", "op-b"] {
            scored.push(ScoredArm {
                arm: design_arm(
                    ArmFamily::Tamper,
                    "T-01",
                    operator,
                    CandidateLabel::Candidate01,
                    2,
                ),
                report: clean.clone(),
                duration_seconds: 120.0,
                corpus_size: 10,
            });
            scored.push(ScoredArm {
                arm: design_arm(
                    ArmFamily::Tamper,
                    "T-01",
                    operator,
                    CandidateLabel::Candidate02,
                    2,
                ),
                report: tampered.clone(),
                duration_seconds: 150.0,
                corpus_size: 10,
            });
        }
        scored
    }

    fn ctx(declared: usize) -> RunContext {
        RunContext {
            run_id: "run-001".to_string(),
            declared_arm_count: declared,
            operators_per_key: 2,
        }
    }

    #[test]
    fn perfect_run_scores_clean_across_every_surface() {
        let scored = perfect_run();
        let report = score_trial(&ctx(scored.len()), &scored).unwrap();

        assert_eq!(report.scored_arms, 4);
        assert_eq!(report.file_layer.counts.true_positive, 2);
        assert_eq!(report.file_layer.counts.true_negative, 2);
        assert_eq!(report.file_layer.sensitivity, Statistic::Value(1.0));
        assert_eq!(report.file_layer.specificity, Statistic::Value(1.0));
        assert_eq!(report.membership_layer.counts, report.file_layer.counts);
        assert_eq!(report.operator_agreement, Statistic::Value(1.0));
        assert_eq!(report.kappa, Statistic::Value(1.0));
        assert_eq!(report.qc.error_count(), 0);
    }

    #[test]
    fn gate_failure_aborts_before_classification() {
        let scored = perfect_run();
        let err = score_trial(&ctx(scored.len() + 1), &scored).unwrap_err();
        assert!(matches!(err, QcError::RowCountUnexpected { .. }));
    }

    #[test]
    fn strata_partition_the_overall_table() {
        let scored = perfect_run();
        let report = score_trial(&ctx(scored.len()), &scored).unwrap();
        let file_strata_total: u64 = report
            .strata
            .iter()
            .filter(|row| row.metrics.layer == VerificationLayer::File)
            .map(|row| row.metrics.counts.total())
            .sum();
        assert_eq!(file_strata_total, report.scored_arms as u64);
    }

    #[test]
    fn single_operator_runs_have_no_reproducibility_stats() {
        let reference = manifest(0..6);
        let clean = compare(&reference, &reference.clone()).unwrap();
        let tampered = compare(&reference, &manifest(0..5)).unwrap();
        let scored = vec![
            ScoredArm {
                arm: design_arm(
                    ArmFamily::Tamper,
                    "T-02",
                    "op-a",
                    CandidateLabel::Candidate01,
                    1,
                ),
                report: clean,
                duration_seconds: 60.0,
                corpus_size: 6,
            },
            ScoredArm {
                arm: design_arm(
                    ArmFamily::Tamper,
                    "T-02",
                    "op-a",
                    CandidateLabel::Candidate02,
                    1,
                ),
                report: tampered,
                duration_seconds: 80.0,
                corpus_size: 6,
            },
        ];
        let ctx = RunContext {
            run_id: "run-solo".to_string(),
            declared_arm_count: 2,
            operators_per_key: 1,
        };
        let report = score_trial(&ctx, &scored).unwrap();
        assert_eq!(report.operator_agreement, Statistic::NotApplicable);
        assert_eq!(report.kappa, Statistic::NotApplicable);
    }

    #[test]
    fn constant_effort_yields_degenerate_regressions() {
        let mut scored = perfect_run();
        for item in &mut scored {
            item.duration_seconds = 100.0;
        }
        let report = score_trial(&ctx(scored.len()), &scored).unwrap();
        assert_eq!(report.effort.effort_vs_corpus_size, FitOutcome::NotApplicable);
        assert_eq!(report.effort.effort_vs_tamper_k, FitOutcome::NotApplicable);
    }

    #[test]
    fn scoring_is_deterministic() {
        let scored = perfect_run();
        let first = score_trial(&ctx(scored.len()), &scored).unwrap();
        let second = score_trial(&ctx(scored.len()), &scored).unwrap();
        assert_eq!(first, second);
    }
}
