// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation of time-series clustering experiments
//!
//! This crate provides:
//! - Result file reading and writing (comment line, parameter literal, label rows)
//! - A validated decoder for estimator parameter literals
//! - Clustering metrics (RI, ARI, MI, NMI, AMI, ACC)
//! - Per-file evaluation with estimator display names
//! - Batch evaluation over a results directory with CSV/JSON/markdown output
//! - Seeded synthetic result files for development

pub mod error;
pub mod evaluator;
pub mod metrics;
pub mod params;
pub mod pipeline;
pub mod results;
pub mod synthetic;

pub use error::{EvalError, ParamsError, Result};
pub use evaluator::{ClusterEvaluator, EvaluationRecord, MissingKeyPolicy, NameLookup};
pub use metrics::{ClusterMetric, ContingencyTable, MetricScores};
pub use params::{EstimatorParameters, ParamValue};
pub use pipeline::{EvaluationRun, EvaluatorConfig, FailurePolicy, RunReport};
pub use results::ResultFile;
pub use synthetic::{SyntheticConfig, SyntheticEstimator};
