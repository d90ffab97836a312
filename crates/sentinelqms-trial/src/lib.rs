// Copyright (c) 2026 SentinelQMS Contributors
// SPDX-License-Identifier: Apache-2.0

//! sentinelqms-trial
//!
//! Blinded outcome-classification and validation pipeline for the parity
//! engine:
//! - pre-registered comparison arms with blinding-derived expected relations
//! - branch-explicit confusion scoring at the file and membership layers
//! - item-level confusion approximation from aggregate counts
//! - reproducibility validation (operator agreement, Cohen's kappa, effort
//!   regression diagnostics)
//! - fail-closed QC gates over every stage, with an explicit run context
//!   and merged run report instead of shared global state

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod agreement;
pub mod arm;
pub mod classify;
pub mod pipeline;
pub mod qc;

pub use crate::arm::{ArmFamily, CandidateLabel, ComparisonArm, ExpectedRelation, NodeId, Stage};
pub use crate::classify::{classify, ConfusionCell, ConfusionCounts, Statistic, VerificationLayer};
pub use crate::pipeline::{score_trial, ScoredArm, TrialReport};
pub use crate::qc::{QcError, RunContext, RunReport};
