// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cross-operator reproducibility metrics and effort diagnostics.

use crate::classify::Statistic;
use sentinelqms_core::{SentinelError, SentinelResult, VerificationOutcome};
use serde::Serialize;

/// Fraction of multi-operator comparison keys on which every operator
/// reported the same outcome. Keys with fewer than two operators cannot
/// attest agreement and are excluded; if none remain the rate is not
/// applicable, which is distinct from perfect agreement.
pub fn percent_agreement(groups: &[Vec<VerificationOutcome>]) -> Statistic {
    let mut scored = 0u64;
    let mut agreeing = 0u64;
    for group in groups {
        if group.len() < 2 {
            continue;
        }
        scored += 1;
        if group.iter().all(|o| *o == group[0]) {
            agreeing += 1;
        }
    }
    if scored == 0 {
        Statistic::NotApplicable
    } else {
        Statistic::Value(agreeing as f64 / scored as f64)
    }
}

/// Cohen's kappa for two raters over PASS/DIVERGENT labels:
/// `(po - pe) / (1 - pe)` with chance agreement from the marginal
/// proportions. The degenerate branch `pe == 1` (both raters constant on
/// the same label) returns exactly 1.0 to avoid division by zero.
pub fn cohen_kappa(
    rater_a: &[VerificationOutcome],
    rater_b: &[VerificationOutcome],
) -> SentinelResult<f64> {
    if rater_a.len() != rater_b.len() {
        return Err(SentinelError::InvalidArgument(format!(
            "rater series lengths differ: {} vs {}",
            rater_a.len(),
            rater_b.len()
        )));
    }
    if rater_a.is_empty() {
        return Err(SentinelError::InvalidArgument(
            "rater series are empty".to_string(),
        ));
    }

    let n = rater_a.len() as f64;
    let observed_agreement = rater_a
        .iter()
        .zip(rater_b.iter())
        .filter(|(a, b)| a == b)
        .count() as f64
        / n;

    let a_pass = rater_a
        .iter()
        .filter(|o| **o == VerificationOutcome::Pass)
        .count() as f64
        / n;
    let b_pass = rater_b
        .iter()
        .filter(|o| **o == VerificationOutcome::Pass)
        .count() as f64
        / n;
    let chance_agreement = a_pass * b_pass + (1.0 - a_pass) * (1.0 - b_pass);

    if (1.0 - chance_agreement).abs() < f64::EPSILON {
        return Ok(1.0);
    }
    Ok((observed_agreement - chance_agreement) / (1.0 - chance_agreement))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Outcome of a regression: a fit, or an explicit not-applicable marker
/// when a variable is degenerate (zero variance).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitOutcome {
    Fit(LinearFit),
    NotApplicable,
}

/// Ordinary least squares of y on x. Length mismatch, fewer than two
/// observations, or non-finite input is a fatal argument error; zero
/// variance in either variable is the recoverable degenerate case.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> SentinelResult<FitOutcome> {
    if xs.len() != ys.len() {
        return Err(SentinelError::InvalidArgument(format!(
            "regression series lengths differ: {} vs {}",
            xs.len(),
            ys.len()
        )));
    }
    if xs.len() < 2 {
        return Err(SentinelError::InvalidArgument(
            "regression needs at least two observations".to_string(),
        ));
    }
    if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
        return Err(SentinelError::InvalidArgument(
            "regression input contains non-finite values".to_string(),
        ));
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let ss_xx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    let ss_yy: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
    if ss_xx == 0.0 || ss_yy == 0.0 {
        return Ok(FitOutcome::NotApplicable);
    }

    let ss_xy: f64 = xs
        .iter()
        .zip(ys.iter())
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    let slope = ss_xy / ss_xx;
    let intercept = mean_y - slope * mean_x;
    let r_squared = (ss_xy * ss_xy) / (ss_xx * ss_yy);

    Ok(FitOutcome::Fit(LinearFit {
        slope,
        intercept,
        r_squared,
    }))
}

/// One arm's human verification effort observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffortObservation {
    pub duration_seconds: f64,
    pub corpus_size: u64,
    pub tamper_k: u64,
}

/// Regression diagnostics relating verification effort to corpus size and
/// to tamper magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffortDiagnostics {
    pub effort_vs_corpus_size: FitOutcome,
    pub effort_vs_tamper_k: FitOutcome,
}

pub fn effort_diagnostics(observations: &[EffortObservation]) -> SentinelResult<EffortDiagnostics> {
    if observations.len() < 2 {
        // Too few points for any slope; both diagnostics are degenerate.
        return Ok(EffortDiagnostics {
            effort_vs_corpus_size: FitOutcome::NotApplicable,
            effort_vs_tamper_k: FitOutcome::NotApplicable,
        });
    }
    let durations: Vec<f64> = observations.iter().map(|o| o.duration_seconds).collect();
    let sizes: Vec<f64> = observations.iter().map(|o| o.corpus_size as f64).collect();
    let tamper: Vec<f64> = observations.iter().map(|o| o.tamper_k as f64).collect();
    Ok(EffortDiagnostics {
        effort_vs_corpus_size: linear_fit(&sizes, &durations)?,
        effort_vs_tamper_k: linear_fit(&tamper, &durations)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use VerificationOutcome::{Divergent, Pass};

    #[test]
    fn agreement_rate_counts_only_multi_operator_keys() {
        let groups = vec![
            vec![Pass, Pass],
            vec![Divergent, Divergent],
            vec![Pass, Divergent],
            vec![Pass], // single operator: excluded
        ];
        assert_eq!(percent_agreement(&groups), Statistic::Value(2.0 / 3.0));
    }

    #[test]
    fn agreement_rate_without_multi_operator_keys_is_not_applicable() {
        let groups = vec![vec![Pass], vec![Divergent]];
        assert_eq!(percent_agreement(&groups), Statistic::NotApplicable);
        assert_eq!(percent_agreement(&[]), Statistic::NotApplicable);
    }

    #[test]
    fn kappa_is_exactly_one_on_total_agreement() {
        // Mixed marginals: pe < 1, po == 1.
        let a = vec![Pass, Divergent, Pass, Divergent, Divergent];
        let kappa = cohen_kappa(&a, &a).unwrap();
        assert_eq!(kappa, 1.0);
    }

    #[test]
    fn kappa_degenerate_chance_agreement_returns_one() {
        let a = vec![Pass, Pass, Pass];
        let b = vec![Pass, Pass, Pass];
        assert_eq!(cohen_kappa(&a, &b).unwrap(), 1.0);
    }

    #[test]
    fn kappa_known_value() {
        // po = 0.75, marginals 0.75/0.5 => pe = 0.5, kappa = 0.5.
        let a = vec![Pass, Pass, Pass, Divergent];
        let b = vec![Pass, Pass, Divergent, Divergent];
        let kappa = cohen_kappa(&a, &b).unwrap();
        assert!((kappa - 0.5).abs() < 1e-12);
    }

    #[test]
    fn kappa_at_chance_is_zero() {
        let a = vec![Pass, Pass, Divergent, Divergent];
        let b = vec![Pass, Divergent, Pass, Divergent];
        let kappa = cohen_kappa(&a, &b).unwrap();
        assert!(kappa.abs() < 1e-12);
    }

    #[test]
    fn kappa_rejects_mismatched_or_empty_series() {
        assert!(cohen_kappa(&[Pass], &[]).is_err());
        assert!(cohen_kappa(&[], &[]).is_err());
    }

    #[test]
    fn linear_fit_recovers_exact_line() {
        let xs = vec![1.0, 2.0, 3.0, 4.0];
        let ys = vec![3.0, 5.0, 7.0, 9.0];
        match linear_fit(&xs, &ys).unwrap() {
            FitOutcome::Fit(fit) => {
                assert!((fit.slope - 2.0).abs() < 1e-12);
                assert!((fit.intercept - 1.0).abs() < 1e-12);
                assert!((fit.r_squared - 1.0).abs() < 1e-12);
            }
            FitOutcome::NotApplicable => panic!("expected a fit"),
        }
    }

    #[test]
    fn zero_variance_is_not_applicable() {
        let constant = vec![5.0, 5.0, 5.0];
        let varying = vec![1.0, 2.0, 3.0];
        assert_eq!(
            linear_fit(&constant, &varying).unwrap(),
            FitOutcome::NotApplicable
        );
        assert_eq!(
            linear_fit(&varying, &constant).unwrap(),
            FitOutcome::NotApplicable
        );
    }

    #[test]
    fn non_finite_input_is_fatal() {
        assert!(linear_fit(&[1.0, f64::NAN], &[1.0, 2.0]).is_err());
        assert!(linear_fit(&[1.0, 2.0], &[f64::INFINITY, 2.0]).is_err());
    }

    #[test]
    fn effort_diagnostics_fit_both_predictors() {
        let observations: Vec<EffortObservation> = (1..=5)
            .map(|i| EffortObservation {
                duration_seconds: 60.0 * i as f64,
                corpus_size: 100 * i,
                tamper_k: i,
            })
            .collect();
        let diagnostics = effort_diagnostics(&observations).unwrap();
        assert!(matches!(
            diagnostics.effort_vs_corpus_size,
            FitOutcome::Fit(fit) if (fit.r_squared - 1.0).abs() < 1e-9
        ));
        assert!(matches!(diagnostics.effort_vs_tamper_k, FitOutcome::Fit(_)));
    }

    #[test]
    fn effort_diagnostics_with_single_observation_is_degenerate() {
        let one = vec![EffortObservation {
            duration_seconds: 60.0,
            corpus_size: 10,
            tamper_k: 0,
        }];
        let diagnostics = effort_diagnostics(&one).unwrap();
        assert_eq!(diagnostics.effort_vs_corpus_size, FitOutcome::NotApplicable);
    }

    proptest! {
        #[test]
        fn kappa_stays_in_range(
            pairs in proptest::collection::vec((any::<bool>(), any::<bool>()), 1..64),
        ) {
            let to_outcome = |b: bool| if b { Pass } else { Divergent };
            let a: Vec<_> = pairs.iter().map(|(x, _)| to_outcome(*x)).collect();
            let b: Vec<_> = pairs.iter().map(|(_, y)| to_outcome(*y)).collect();
            let kappa = cohen_kappa(&a, &b).unwrap();
            prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&kappa));
        }

        #[test]
        fn agreement_rate_is_a_proportion(
            groups in proptest::collection::vec(proptest::collection::vec(any::<bool>(), 0..5), 0..16),
        ) {
            let groups: Vec<Vec<VerificationOutcome>> = groups
                .iter()
                .map(|g| g.iter().map(|b| if *b { Pass } else { Divergent }).collect())
                .collect();
            match percent_agreement(&groups) {
                Statistic::Value(rate) => prop_assert!((0.0..=1.0).contains(&rate)),
                Statistic::NotApplicable => {
                    prop_assert!(groups.iter().all(|g| g.len() < 2));
                }
            }
        }
    }
}
