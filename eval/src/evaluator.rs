// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Per-file evaluation of clustering results
//!
//! A [`ClusterEvaluator`] turns one result file into one
//! [`EvaluationRecord`]: dataset, estimator identity, display name and the
//! configured metric scores. Each call is independent of every other.

use crate::error::{EvalError, Result};
use crate::metrics::{ClusterMetric, ContingencyTable, MetricScores};
use crate::params::EstimatorParameters;
use crate::results::ResultFile;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do when the naming parameter is absent from an estimator's parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeyPolicy {
    /// Surface [`EvalError::MissingNamingParameter`]
    #[default]
    Fail,
    /// Keep the estimator identity unchanged
    UseBaseName,
}

/// Outcome of building a display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameLookup {
    /// No naming key configured
    Base(String),
    /// `"{identity}-{value}"`
    Suffixed(String),
    /// A naming key is configured but the parameters lack it
    MissingKey { base: String, key: String },
}

impl NameLookup {
    /// Resolve according to `policy`
    pub fn resolve(self, policy: MissingKeyPolicy) -> Result<String> {
        match self {
            NameLookup::Base(name) | NameLookup::Suffixed(name) => Ok(name),
            NameLookup::MissingKey { base, key } => match policy {
                MissingKeyPolicy::Fail => Err(EvalError::MissingNamingParameter { key, estimator: base }),
                MissingKeyPolicy::UseBaseName => {
                    tracing::warn!("Naming parameter '{}' missing for {}, using base name", key, base);
                    Ok(base)
                }
            },
        }
    }

    /// The resolved name, falling back to the base name when the key is missing
    pub fn name_or_base(&self) -> &str {
        match self {
            NameLookup::Base(name) | NameLookup::Suffixed(name) => name,
            NameLookup::MissingKey { base, .. } => base,
        }
    }
}

/// The unit of output for one result file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub dataset: String,
    pub estimator: String,
    pub display_name: String,
    pub metric_scores: MetricScores,
}

/// Evaluator for clustering experiment result files
#[derive(Debug, Clone)]
pub struct ClusterEvaluator {
    metrics: Vec<ClusterMetric>,
    naming_parameter_key: Option<String>,
    missing_key_policy: MissingKeyPolicy,
}

impl Default for ClusterEvaluator {
    fn default() -> Self {
        Self {
            metrics: ClusterMetric::ALL.to_vec(),
            naming_parameter_key: None,
            missing_key_policy: MissingKeyPolicy::default(),
        }
    }
}

impl ClusterEvaluator {
    /// Create an evaluator from metric codes; `None` selects every metric.
    ///
    /// Fails with [`EvalError::InvalidMetric`] on the first unknown code.
    pub fn new<S: AsRef<str>>(metrics: Option<&[S]>, naming_parameter_key: Option<String>) -> Result<Self> {
        let metrics = match metrics {
            Some(codes) => ClusterMetric::parse_list(codes)?,
            None => ClusterMetric::ALL.to_vec(),
        };
        Ok(Self {
            metrics,
            naming_parameter_key,
            missing_key_policy: MissingKeyPolicy::default(),
        })
    }

    pub fn with_missing_key_policy(mut self, policy: MissingKeyPolicy) -> Self {
        self.missing_key_policy = policy;
        self
    }

    pub fn metrics(&self) -> &[ClusterMetric] {
        &self.metrics
    }

    pub fn naming_parameter_key(&self) -> Option<&str> {
        self.naming_parameter_key.as_deref()
    }

    /// Evaluate one result file
    pub fn evaluate_csv_data(&self, path: &Path) -> Result<EvaluationRecord> {
        tracing::debug!("Evaluating {}", path.display());
        let data = ResultFile::read(path)?;
        if data.label_pairs().next().is_none() {
            return Err(EvalError::NoPredictions {
                path: path.to_path_buf(),
            });
        }
        self.evaluate(&data)
    }

    /// Evaluate an already parsed result file
    pub fn evaluate(&self, data: &ResultFile) -> Result<EvaluationRecord> {
        let metric_scores = self.compute_metrics(&data.rows);
        let display_name = self
            .get_estimator_name(&data.first_line, &data.parameters)
            .resolve(self.missing_key_policy)?;

        Ok(EvaluationRecord {
            dataset: data.dataset().to_string(),
            estimator: data.estimator().to_string(),
            display_name,
            metric_scores,
        })
    }

    /// Build the display name from the comment line and parameters
    pub fn get_estimator_name(&self, estimator_details: &[String], parameters: &EstimatorParameters) -> NameLookup {
        let base = estimator_details.get(1).cloned().unwrap_or_default();
        match &self.naming_parameter_key {
            None => NameLookup::Base(base),
            Some(key) => match parameters.get(key) {
                Some(value) => NameLookup::Suffixed(format!("{}-{}", base, value)),
                None => NameLookup::MissingKey {
                    base,
                    key: key.clone(),
                },
            },
        }
    }

    /// Score prediction rows; the first row is a header and is skipped
    pub fn compute_metrics(&self, rows: &[Vec<String>]) -> MetricScores {
        let (true_class, predicted_class): (Vec<&str>, Vec<&str>) = rows
            .iter()
            .skip(1)
            .filter(|row| row.len() >= 2)
            .map(|row| (row[0].as_str(), row[1].as_str()))
            .unzip();

        let table = ContingencyTable::from_labels(&true_class, &predicted_class);
        MetricScores::compute(&self.metrics, &table)
    }
}
