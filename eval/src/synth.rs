// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Synthetic result generator
//!
//! Writes a seeded experiment in result file layout so the evaluator can be
//! exercised without real clustering runs.

use anyhow::Result;
use clap::Parser;
use cluster_eval::synthetic::{write_experiment, SyntheticConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "synth-results")]
#[command(about = "Generate synthetic clustering result files")]
#[command(version)]
struct Args {
    /// Output directory (one sub-directory per estimator)
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// Random seed for reproducibility
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Samples per dataset
    #[arg(short, long, default_value_t = 60)]
    num_samples: usize,

    /// Number of true clusters
    #[arg(short, long, default_value_t = 3)]
    clusters: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = SyntheticConfig {
        seed: args.seed,
        n_clusters: args.clusters,
        samples_per_dataset: args.num_samples,
        ..SyntheticConfig::default()
    };

    let written = write_experiment(&config, &args.output)?;
    println!("Wrote {} result files to {}", written.len(), args.output.display());
    for estimator in &config.estimators {
        println!("  {} (metric={}, noise={:.2})", estimator.name, estimator.metric, estimator.noise);
    }

    Ok(())
}
