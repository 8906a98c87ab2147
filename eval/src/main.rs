// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Clustering evaluation CLI
//!
//! Usage:
//!   cluster-eval --results ./results --output ./evaluation --experiment dtw_vs_msm
//!   cluster-eval --config eval.json --estimators kmeans,kmedoids --naming-key metric

use anyhow::Result;
use clap::Parser;
use cluster_eval::pipeline::{EvaluationRun, EvaluatorConfig, FailurePolicy};
use cluster_eval::MissingKeyPolicy;
use indicatif::ProgressBar;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cluster-eval")]
#[command(about = "Evaluate clustering experiment result files")]
#[command(version)]
struct Args {
    /// JSON configuration file (flags override its values)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory with one sub-directory of result files per estimator
    #[arg(short, long)]
    results: Option<PathBuf>,

    /// Output directory for evaluation results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Experiment name (sub-directory of the output directory)
    #[arg(short, long)]
    experiment: Option<String>,

    /// Metrics to compute (comma-separated: RI,ARI,MI,NMI,AMI,ACC; empty = all)
    #[arg(short, long)]
    metrics: Option<String>,

    /// Parameter key appended to estimator names
    #[arg(short, long)]
    naming_key: Option<String>,

    /// Estimators to evaluate (comma-separated, empty = every sub-directory)
    #[arg(long)]
    estimators: Option<String>,

    /// Stop at the first result file that fails to evaluate
    #[arg(long)]
    abort_on_error: bool,

    /// Use the bare estimator name when the naming key is missing
    #[arg(long)]
    fallback_to_base_name: bool,

    /// Do not request critical difference diagrams
    #[arg(long)]
    no_cd_diagrams: bool,
}

fn split_list(list: Option<String>) -> Vec<String> {
    list.map(|l| {
        l.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EvaluatorConfig::load(path)?,
        None => EvaluatorConfig::default(),
    };
    if let Some(results) = args.results {
        config.results_path = results;
    }
    if let Some(output) = args.output {
        config.evaluation_out_path = output;
    }
    if let Some(experiment) = args.experiment {
        config.experiment_name = experiment;
    }
    let metrics = split_list(args.metrics);
    if !metrics.is_empty() {
        config.metrics = Some(metrics);
    }
    if args.naming_key.is_some() {
        config.naming_parameter_key = args.naming_key;
    }
    if args.abort_on_error {
        config.failure_policy = FailurePolicy::Abort;
    }
    if args.fallback_to_base_name {
        config.missing_key_policy = MissingKeyPolicy::UseBaseName;
    }
    if args.no_cd_diagrams {
        config.draw_critical_difference_diagrams = false;
    }
    let estimators = split_list(args.estimators);

    tracing::info!("Clustering Evaluation");
    tracing::info!("=====================");
    tracing::info!("Results: {}", config.results_path.display());
    tracing::info!("Experiment: {}", config.experiment_name);

    let output_dir = config.output_dir();
    let run = EvaluationRun::new(config)?;
    let report = run.run_with_progress(&estimators, ProgressBar::new(0))?;

    // Print summary to console
    println!("\n{}", "=".repeat(70));
    println!("EVALUATION SUMMARY");
    println!("{}", "=".repeat(70));
    println!("\nFiles evaluated: {} ({} failed)", report.records.len(), report.failures.len());
    println!("{:-<70}", "");
    println!("{:<8} {:<30} {:>10} {:>10}", "Metric", "Best Estimator", "Mean", "Datasets");
    println!("{:-<70}", "");
    for summary in &report.summary {
        let datasets = summary
            .estimators
            .iter()
            .find(|e| e.estimator == summary.best_estimator)
            .map_or(0, |e| e.datasets);
        println!(
            "{:<8} {:<30} {:>10.4} {:>10}",
            summary.metric.code(),
            summary.best_estimator,
            summary.best_mean,
            datasets
        );
    }
    println!("{:-<70}", "");

    for failure in &report.failures {
        println!("FAILED {}: {}", failure.path.display(), failure.error);
    }

    let saved = EvaluationRun::save(&report, &output_dir)?;
    println!("\nResults saved to: {} ({} files)", output_dir.display(), saved.len());

    Ok(())
}
