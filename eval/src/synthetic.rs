// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Seeded synthetic result files for development and testing

use crate::error::Result;
use crate::params::{EstimatorParameters, ParamValue};
use crate::results::ResultFile;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A simulated estimator: how often it assigns a random cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticEstimator {
    pub name: String,
    pub metric: String,
    /// Probability that a sample is assigned a random cluster
    pub noise: f64,
    /// Rename clusters by a fixed rotation (structure preserved, identity lost)
    pub permute_labels: bool,
}

/// Shape of a synthetic experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub datasets: Vec<String>,
    pub estimators: Vec<SyntheticEstimator>,
    pub n_clusters: usize,
    pub samples_per_dataset: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            datasets: ["Trace", "Beef", "GunPoint", "ECG200"].iter().map(|s| s.to_string()).collect(),
            estimators: vec![
                SyntheticEstimator {
                    name: "kmeans".to_string(),
                    metric: "dtw".to_string(),
                    noise: 0.2,
                    permute_labels: false,
                },
                SyntheticEstimator {
                    name: "kmedoids".to_string(),
                    metric: "msm".to_string(),
                    noise: 0.35,
                    permute_labels: true,
                },
            ],
            n_clusters: 3,
            samples_per_dataset: 60,
        }
    }
}

/// Generate one result file per (estimator, dataset)
pub fn generate(config: &SyntheticConfig) -> Vec<(PathBuf, ResultFile)> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let k = config.n_clusters.max(1);
    let mut files = Vec::new();

    for dataset in &config.datasets {
        let truth: Vec<usize> = (0..config.samples_per_dataset).map(|_| rng.gen_range(0..k)).collect();

        for estimator in &config.estimators {
            let mut rows = vec![vec![format!("{}", config.samples_per_dataset), k.to_string()]];
            let mut correct = 0;
            for &t in &truth {
                let mut p = if rng.gen_bool(estimator.noise.clamp(0.0, 1.0)) {
                    rng.gen_range(0..k)
                } else {
                    t
                };
                if estimator.permute_labels {
                    p = (p + 1) % k;
                }
                if p == t {
                    correct += 1;
                }
                rows.push(vec![t.to_string(), p.to_string()]);
            }
            rows[0].insert(0, format!("{:.4}", correct as f64 / truth.len().max(1) as f64));

            let parameters: EstimatorParameters = [
                ("metric".to_string(), ParamValue::Str(estimator.metric.clone())),
                ("n_clusters".to_string(), ParamValue::Int(k as i64)),
                ("random_state".to_string(), ParamValue::Int(config.seed as i64)),
            ]
            .into_iter()
            .collect();

            let file = ResultFile {
                first_line: vec![
                    dataset.clone(),
                    estimator.name.clone(),
                    "test".to_string(),
                    "0".to_string(),
                    "MILLISECONDS".to_string(),
                    "PREDICTIONS".to_string(),
                ],
                parameters,
                rows,
            };
            let rel = PathBuf::from(&estimator.name)
                .join("Predictions")
                .join(dataset)
                .join("testResample0.csv");
            files.push((rel, file));
        }
    }

    files
}

/// Write a synthetic experiment under `root`, returning the written paths
pub fn write_experiment(config: &SyntheticConfig, root: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (rel, file) in generate(config) {
        let path = root.join(rel);
        file.save(&path)?;
        written.push(path);
    }
    tracing::info!("Wrote {} synthetic result files to {}", written.len(), root.display());
    Ok(written)
}
