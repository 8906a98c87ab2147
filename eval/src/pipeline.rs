// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Batch evaluation over a results directory
//!
//! Orchestrates:
//! - Result file discovery per estimator
//! - Per-file evaluation with a configurable failure policy
//! - Aggregation into per-metric tables
//! - Results serialization (CSV tables, JSON, markdown report)

use crate::evaluator::{ClusterEvaluator, EvaluationRecord, MissingKeyPolicy};
use crate::metrics::ClusterMetric;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// What a batch run does when a single result file cannot be evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and continue with the remaining files
    #[default]
    Skip,
    /// Stop at the first failing file
    Abort,
}

/// Configuration for an evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Directory holding one sub-directory of result files per estimator
    pub results_path: PathBuf,
    /// Directory the evaluation outputs are written under
    pub evaluation_out_path: PathBuf,
    /// Sub-directory of `evaluation_out_path` for this experiment
    pub experiment_name: String,
    /// Metric codes to compute (None = all)
    pub metrics: Option<Vec<String>>,
    /// Parameter appended to the estimator name, e.g. "metric" -> "kmeans-dtw"
    pub naming_parameter_key: Option<String>,
    pub missing_key_policy: MissingKeyPolicy,
    pub failure_policy: FailurePolicy,
    /// Carried through to the report; diagrams are rendered by external tooling
    pub draw_critical_difference_diagrams: bool,
    pub critical_diff_params: serde_json::Map<String, serde_json::Value>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            results_path: PathBuf::from("results"),
            evaluation_out_path: PathBuf::from("evaluation"),
            experiment_name: "experiment".to_string(),
            metrics: None,
            naming_parameter_key: None,
            missing_key_policy: MissingKeyPolicy::default(),
            failure_policy: FailurePolicy::default(),
            draw_critical_difference_diagrams: true,
            critical_diff_params: serde_json::Map::new(),
        }
    }
}

impl EvaluatorConfig {
    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Output directory for this experiment
    pub fn output_dir(&self) -> PathBuf {
        self.evaluation_out_path.join(&self.experiment_name)
    }
}

/// A result file that could not be evaluated
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Mean score of one estimator on one metric
#[derive(Debug, Clone, Serialize)]
pub struct EstimatorSummary {
    pub estimator: String,
    pub mean: f64,
    pub datasets: usize,
}

/// Best estimator per metric
#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub metric: ClusterMetric,
    pub best_estimator: String,
    pub best_mean: f64,
    pub estimators: Vec<EstimatorSummary>,
}

/// Complete outcome of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub config: EvaluatorConfig,
    pub metrics: Vec<ClusterMetric>,
    pub records: Vec<EvaluationRecord>,
    pub failures: Vec<FileFailure>,
    pub summary: Vec<MetricSummary>,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl RunReport {
    /// Score table for one metric: dataset -> display name -> score
    ///
    /// Several records for the same dataset and display name (e.g. test and
    /// train resamples) are averaged into one cell.
    pub fn table(&self, metric: ClusterMetric) -> BTreeMap<&str, BTreeMap<&str, f64>> {
        score_table(&self.records, metric)
    }

    /// Sorted, de-duplicated display names across all records
    pub fn estimator_names(&self) -> Vec<&str> {
        self.records
            .iter()
            .map(|r| r.display_name.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Batch evaluation over `results_path`
pub struct EvaluationRun {
    config: EvaluatorConfig,
    evaluator: ClusterEvaluator,
}

impl EvaluationRun {
    /// Validate the configuration; unknown metric codes fail here
    pub fn new(config: EvaluatorConfig) -> Result<Self> {
        let evaluator = ClusterEvaluator::new(config.metrics.as_deref(), config.naming_parameter_key.clone())
            .context("Invalid evaluator configuration")?
            .with_missing_key_policy(config.missing_key_policy);
        Ok(Self { config, evaluator })
    }

    pub fn evaluator(&self) -> &ClusterEvaluator {
        &self.evaluator
    }

    /// Collect result files for the requested estimators (all when empty)
    pub fn discover(&self, estimators: &[String]) -> Result<Vec<PathBuf>> {
        let root = &self.config.results_path;
        let dirs: Vec<PathBuf> = if estimators.is_empty() {
            let mut dirs = Vec::new();
            for entry in std::fs::read_dir(root)
                .with_context(|| format!("Failed to list results directory: {}", root.display()))?
            {
                let path = entry?.path();
                if path.is_dir() {
                    dirs.push(path);
                }
            }
            dirs
        } else {
            estimators.iter().map(|e| root.join(e)).collect()
        };

        let mut files = Vec::new();
        for dir in dirs {
            if !dir.is_dir() {
                tracing::warn!("No results directory for estimator: {}", dir.display());
                continue;
            }
            collect_csv_files(&dir, &mut files)?;
        }
        files.sort();
        tracing::info!("Found {} result files under {}", files.len(), root.display());
        Ok(files)
    }

    /// Run without a visible progress bar
    pub fn run(&self, estimators: &[String]) -> Result<RunReport> {
        self.run_with_progress(estimators, ProgressBar::hidden())
    }

    /// Evaluate every discovered file, applying the failure policy
    pub fn run_with_progress(&self, estimators: &[String], pb: ProgressBar) -> Result<RunReport> {
        let files = self.discover(estimators)?;
        self.evaluate_files(&files, pb)
    }

    /// Evaluate an explicit list of result files
    pub fn evaluate_files(&self, files: &[PathBuf], pb: ProgressBar) -> Result<RunReport> {
        pb.set_length(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} Evaluating: [{wide_bar:.cyan/blue}] {pos}/{len}") {
            pb.set_style(style);
        }

        let mut records = Vec::new();
        let mut failures = Vec::new();

        for path in files {
            match self.evaluator.evaluate_csv_data(path) {
                Ok(record) => {
                    tracing::debug!(
                        "  {} on {} - {}",
                        record.display_name,
                        record.dataset,
                        record.metric_scores.format()
                    );
                    records.push(record);
                }
                Err(e) if self.config.failure_policy == FailurePolicy::Skip => {
                    let error = format!("{:#}", anyhow::Error::from(e));
                    tracing::warn!("Skipping {}: {}", path.display(), error);
                    failures.push(FileFailure {
                        path: path.clone(),
                        error,
                    });
                }
                Err(e) => {
                    pb.abandon();
                    return Err(e).with_context(|| format!("Evaluation aborted at {}", path.display()));
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        tracing::info!("Evaluated {} files ({} failed)", records.len(), failures.len());
        if self.config.draw_critical_difference_diagrams {
            tracing::info!("Critical difference diagrams requested; tables are written for external rendering");
        }

        let metrics = self.evaluator.metrics().to_vec();
        let summary = summarize(&metrics, &records);

        Ok(RunReport {
            config: self.config.clone(),
            metrics,
            records,
            failures,
            summary,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Write per-metric CSV tables, `records.json` and `report.md`
    pub fn save(report: &RunReport, output_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

        let mut saved = Vec::new();
        let estimators = report.estimator_names();

        for &metric in &report.metrics {
            let path = output_dir.join(format!("{}.csv", metric.code()));
            let mut writer = csv::Writer::from_path(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;

            let mut header = vec!["dataset"];
            header.extend(estimators.iter().copied());
            writer.write_record(&header)?;

            for (dataset, scores) in report.table(metric) {
                let mut row = vec![dataset.to_string()];
                row.extend(
                    estimators
                        .iter()
                        .map(|e| scores.get(e).map_or(String::new(), |s| s.to_string())),
                );
                writer.write_record(&row)?;
            }
            writer.flush()?;
            saved.push(path);
        }

        let json_path = output_dir.join("records.json");
        std::fs::write(&json_path, serde_json::to_string_pretty(report)?)?;
        saved.push(json_path);

        let md_path = output_dir.join("report.md");
        std::fs::write(&md_path, Self::generate_report(report))?;
        saved.push(md_path);

        tracing::info!("Results saved to {}", output_dir.display());
        Ok(saved)
    }

    /// Generate a markdown report
    pub fn generate_report(report: &RunReport) -> String {
        let mut out = String::new();

        out.push_str(&format!("# Clustering Evaluation: {}\n\n", report.config.experiment_name));
        out.push_str(&format!("**Generated:** {}\n\n", report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
        out.push_str(&format!("**Version:** {}\n\n", report.version));
        out.push_str(&format!("- **Results path:** {}\n", report.config.results_path.display()));
        out.push_str(&format!("- **Files evaluated:** {}\n", report.records.len()));
        out.push_str(&format!("- **Files failed:** {}\n\n", report.failures.len()));

        out.push_str("## Summary\n\n");
        out.push_str("| Metric | Best Estimator | Mean |\n");
        out.push_str("|--------|----------------|------|\n");
        for s in &report.summary {
            out.push_str(&format!("| {} | {} | {:.4} |\n", s.metric, s.best_estimator, s.best_mean));
        }

        let estimators = report.estimator_names();
        for &metric in &report.metrics {
            out.push_str(&format!("\n## {} ({})\n\n", metric.description(), metric));
            out.push_str(&format!("| Dataset | {} |\n", estimators.join(" | ")));
            out.push_str(&format!("|---------|{}\n", "---|".repeat(estimators.len())));
            for (dataset, scores) in report.table(metric) {
                let cells: Vec<String> = estimators
                    .iter()
                    .map(|e| scores.get(e).map_or("-".to_string(), |s| format!("{:.4}", s)))
                    .collect();
                out.push_str(&format!("| {} | {} |\n", dataset, cells.join(" | ")));
            }
        }

        if !report.failures.is_empty() {
            out.push_str("\n## Failures\n\n");
            for failure in &report.failures {
                out.push_str(&format!("- `{}`: {}\n", failure.path.display(), failure.error));
            }
        }

        if report.config.draw_critical_difference_diagrams {
            out.push_str("\n## Critical Difference Parameters\n\n");
            out.push_str(&format!(
                "```json\n{}\n```\n",
                serde_json::to_string_pretty(&report.config.critical_diff_params).unwrap_or_default()
            ));
        }

        out
    }
}

/// Walk `dir` for `.csv` files; symbolic links are not followed
fn collect_csv_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
            files.push(path.to_path_buf());
        }
    }
    Ok(())
}

fn score_table(records: &[EvaluationRecord], metric: ClusterMetric) -> BTreeMap<&str, BTreeMap<&str, f64>> {
    let mut sums: BTreeMap<&str, BTreeMap<&str, (f64, usize)>> = BTreeMap::new();
    for record in records {
        if let Some(score) = record.metric_scores.get(metric) {
            let cell = sums
                .entry(record.dataset.as_str())
                .or_default()
                .entry(record.display_name.as_str())
                .or_insert((0.0, 0));
            cell.0 += score;
            cell.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(dataset, cells)| {
            let means: BTreeMap<&str, f64> = cells
                .into_iter()
                .map(|(name, (sum, count))| (name, sum / count as f64))
                .collect();
            (dataset, means)
        })
        .collect()
}

fn summarize(metrics: &[ClusterMetric], records: &[EvaluationRecord]) -> Vec<MetricSummary> {
    metrics
        .iter()
        .map(|&metric| {
            // Means over per-dataset cells, so duplicates count once
            let mut per_estimator: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
            for scores in score_table(records, metric).into_values() {
                for (name, score) in scores {
                    let entry = per_estimator.entry(name).or_insert((0.0, 0));
                    entry.0 += score;
                    entry.1 += 1;
                }
            }

            let estimators: Vec<EstimatorSummary> = per_estimator
                .into_iter()
                .map(|(name, (sum, count))| EstimatorSummary {
                    estimator: name.to_string(),
                    mean: sum / count as f64,
                    datasets: count,
                })
                .collect();

            let (best_estimator, best_mean) = estimators
                .iter()
                .fold(("None".to_string(), f64::NEG_INFINITY), |best, e| {
                    if e.mean > best.1 {
                        (e.estimator.clone(), e.mean)
                    } else {
                        best
                    }
                });

            MetricSummary {
                metric,
                best_estimator,
                best_mean: if best_mean.is_finite() { best_mean } else { 0.0 },
                estimators,
            }
        })
        .collect()
}
