// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Clustering agreement metrics
//!
//! All metrics are computed from a contingency table of true classes
//! against predicted clusters:
//! - Rand Index and Adjusted Rand Index (pair counting)
//! - Mutual Information, Normalized MI, Adjusted MI (natural log)
//! - Accuracy (exact label identity)
//!
//! Degenerate inputs (one label on a side, no disagreeing pairs) score by
//! the conventions common in published clustering benchmarks.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Smallest normaliser used when dividing by an entropy
const EPS: f64 = f64::EPSILON;

/// Contingency table between a true labelling and a predicted labelling
#[derive(Debug, Clone, Default)]
pub struct ContingencyTable {
    /// counts[i][j]: samples with true class i and predicted cluster j
    counts: Vec<Vec<usize>>,
    /// Samples per true class
    row_sums: Vec<usize>,
    /// Samples per predicted cluster
    col_sums: Vec<usize>,
    /// Rows where both labels are the same string
    exact_matches: usize,
    n: usize,
}

impl ContingencyTable {
    /// Build from two label sequences aligned by index
    ///
    /// # Panics
    ///
    /// Panics if the two sequences differ in length. Rows read from a result
    /// file always yield both labels, so callers only see this on misuse.
    pub fn from_labels<L: AsRef<str>>(true_labels: &[L], predicted_labels: &[L]) -> Self {
        assert_eq!(
            true_labels.len(),
            predicted_labels.len(),
            "True and predicted label lengths must match"
        );

        let mut classes: HashMap<&str, usize> = HashMap::new();
        let mut clusters: HashMap<&str, usize> = HashMap::new();
        let mut cells: Vec<(usize, usize)> = Vec::with_capacity(true_labels.len());
        let mut exact_matches = 0;

        for (truth, pred) in true_labels.iter().zip(predicted_labels.iter()) {
            let (truth, pred) = (truth.as_ref().trim(), pred.as_ref().trim());
            let next_class = classes.len();
            let i = *classes.entry(truth).or_insert(next_class);
            let next_cluster = clusters.len();
            let j = *clusters.entry(pred).or_insert(next_cluster);
            if truth == pred {
                exact_matches += 1;
            }
            cells.push((i, j));
        }

        let mut counts = vec![vec![0usize; clusters.len()]; classes.len()];
        let mut row_sums = vec![0usize; classes.len()];
        let mut col_sums = vec![0usize; clusters.len()];
        for (i, j) in cells {
            counts[i][j] += 1;
            row_sums[i] += 1;
            col_sums[j] += 1;
        }

        Self {
            counts,
            row_sums,
            col_sums,
            exact_matches,
            n: true_labels.len(),
        }
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.n
    }

    /// Number of distinct true classes
    pub fn n_classes(&self) -> usize {
        self.row_sums.len()
    }

    /// Number of distinct predicted clusters
    pub fn n_clusters(&self) -> usize {
        self.col_sums.len()
    }

    fn nonzero_cells(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.counts.iter().enumerate().flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, c)| **c > 0)
                .map(move |(j, &c)| (i, j, c))
        })
    }

    /// Pair confusion counts as `[[tn, fp], [fn, tp]]` over ordered pairs
    fn pair_confusion(&self) -> [[f64; 2]; 2] {
        let n = self.n as f64;
        let sum_squares: f64 = self.nonzero_cells().map(|(_, _, c)| (c * c) as f64).sum();
        let sum_rows_sq: f64 = self.row_sums.iter().map(|&a| (a * a) as f64).sum();
        let sum_cols_sq: f64 = self.col_sums.iter().map(|&b| (b * b) as f64).sum();

        let tp = sum_squares - n;
        let fp = sum_cols_sq - sum_squares;
        let fn_ = sum_rows_sq - sum_squares;
        let tn = n * n - fp - fn_ - sum_squares;
        [[tn, fp], [fn_, tp]]
    }

    /// Rand Index: fraction of sample pairs on which both labellings agree
    pub fn rand_index(&self) -> f64 {
        let [[tn, fp], [fn_, tp]] = self.pair_confusion();
        let numerator = tn + tp;
        let denominator = tn + fp + fn_ + tp;
        if numerator == denominator || denominator == 0.0 {
            return 1.0;
        }
        numerator / denominator
    }

    /// Adjusted Rand Index: Rand Index corrected for chance, in [-0.5, 1]
    pub fn adjusted_rand_index(&self) -> f64 {
        let [[tn, fp], [fn_, tp]] = self.pair_confusion();
        if fn_ == 0.0 && fp == 0.0 {
            return 1.0;
        }
        2.0 * (tp * tn - fn_ * fp) / ((tp + fn_) * (fn_ + tn) + (tp + fp) * (fp + tn))
    }

    /// Mutual information in nats, never negative
    pub fn mutual_information(&self) -> f64 {
        if self.n_classes() <= 1 || self.n_clusters() <= 1 {
            return 0.0;
        }
        let n = self.n as f64;
        let mi: f64 = self
            .nonzero_cells()
            .map(|(i, j, c)| {
                let n_ij = c as f64;
                let outer = self.row_sums[i] as f64 * self.col_sums[j] as f64;
                let term = (n_ij / n) * (n * n_ij / outer).ln();
                if term.abs() < EPS {
                    0.0
                } else {
                    term
                }
            })
            .sum();
        mi.max(0.0)
    }

    /// Entropy of the true class distribution
    pub fn class_entropy(&self) -> f64 {
        entropy(&self.row_sums, self.n)
    }

    /// Entropy of the predicted cluster distribution
    pub fn cluster_entropy(&self) -> f64 {
        entropy(&self.col_sums, self.n)
    }

    /// Normalized mutual information with arithmetic-mean normalisation
    pub fn normalized_mutual_information(&self) -> f64 {
        if self.both_trivial() {
            return 1.0;
        }
        let mi = self.mutual_information();
        if mi == 0.0 {
            return 0.0;
        }
        let normalizer = ((self.class_entropy() + self.cluster_entropy()) / 2.0).max(EPS);
        mi / normalizer
    }

    /// Adjusted mutual information with arithmetic-mean normalisation
    pub fn adjusted_mutual_information(&self) -> f64 {
        if self.both_trivial() {
            return 1.0;
        }
        let mi = self.mutual_information();
        let emi = self.expected_mutual_information();
        let normalizer = (self.class_entropy() + self.cluster_entropy()) / 2.0;
        let mut denominator = normalizer - emi;
        if denominator < 0.0 {
            denominator = denominator.min(-EPS);
        } else {
            denominator = denominator.max(EPS);
        }
        (mi - emi) / denominator
    }

    /// Expected mutual information of two random labellings with the
    /// same marginals (hypergeometric model)
    pub fn expected_mutual_information(&self) -> f64 {
        if self.n_classes() <= 1 || self.n_clusters() <= 1 {
            return 0.0;
        }
        let total = self.n;
        let n = total as f64;
        let ln_fact = ln_factorials(total);

        let mut emi = 0.0;
        for &a in &self.row_sums {
            for &b in &self.col_sums {
                let start = (a + b).saturating_sub(total).max(1);
                let end = a.min(b);
                for n_ij in start..=end {
                    let nij = n_ij as f64;
                    let term1 = nij / n;
                    let term2 = n.ln() + nij.ln() - (a as f64).ln() - (b as f64).ln();
                    let gln = ln_fact[a] + ln_fact[b] + ln_fact[total - a] + ln_fact[total - b]
                        - ln_fact[total]
                        - ln_fact[n_ij]
                        - ln_fact[a - n_ij]
                        - ln_fact[b - n_ij]
                        - ln_fact[total + n_ij - a - b];
                    emi += term1 * term2 * gln.exp();
                }
            }
        }
        emi
    }

    /// Accuracy: fraction of rows whose predicted label equals the true label
    pub fn accuracy(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.exact_matches as f64 / self.n as f64
    }

    fn both_trivial(&self) -> bool {
        let (r, c) = (self.n_classes(), self.n_clusters());
        (r == 1 && c == 1) || (r == 0 && c == 0)
    }
}

fn entropy(counts: &[usize], n: usize) -> f64 {
    if counts.len() <= 1 || n == 0 {
        return 0.0;
    }
    let n = n as f64;
    -counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            p * p.ln()
        })
        .sum::<f64>()
}

/// ln(k!) for k in 0..=n
fn ln_factorials(n: usize) -> Vec<f64> {
    let mut table = Vec::with_capacity(n + 1);
    let mut acc = 0.0;
    table.push(acc);
    for k in 1..=n {
        acc += (k as f64).ln();
        table.push(acc);
    }
    table
}

/// The closed set of metrics an evaluator can be configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClusterMetric {
    #[serde(rename = "RI")]
    RandIndex,
    #[serde(rename = "ARI")]
    AdjustedRandIndex,
    #[serde(rename = "MI")]
    MutualInformation,
    #[serde(rename = "NMI")]
    NormalizedMutualInformation,
    #[serde(rename = "AMI")]
    AdjustedMutualInformation,
    #[serde(rename = "ACC")]
    Accuracy,
}

impl ClusterMetric {
    /// Every metric, in reporting order
    pub const ALL: [ClusterMetric; 6] = [
        ClusterMetric::RandIndex,
        ClusterMetric::AdjustedRandIndex,
        ClusterMetric::MutualInformation,
        ClusterMetric::NormalizedMutualInformation,
        ClusterMetric::AdjustedMutualInformation,
        ClusterMetric::Accuracy,
    ];

    /// Short code used in configuration and output files
    pub fn code(&self) -> &'static str {
        match self {
            ClusterMetric::RandIndex => "RI",
            ClusterMetric::AdjustedRandIndex => "ARI",
            ClusterMetric::MutualInformation => "MI",
            ClusterMetric::NormalizedMutualInformation => "NMI",
            ClusterMetric::AdjustedMutualInformation => "AMI",
            ClusterMetric::Accuracy => "ACC",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ClusterMetric::RandIndex => "Rand index",
            ClusterMetric::AdjustedRandIndex => "Adjusted Rand index",
            ClusterMetric::MutualInformation => "Mutual information",
            ClusterMetric::NormalizedMutualInformation => "Normalized mutual information",
            ClusterMetric::AdjustedMutualInformation => "Adjusted mutual information",
            ClusterMetric::Accuracy => "Accuracy",
        }
    }

    /// Whether the score is unchanged by renaming cluster labels
    pub fn is_permutation_invariant(&self) -> bool {
        !matches!(self, ClusterMetric::Accuracy)
    }

    /// Score a precomputed contingency table
    pub fn score(&self, table: &ContingencyTable) -> f64 {
        match self {
            ClusterMetric::RandIndex => table.rand_index(),
            ClusterMetric::AdjustedRandIndex => table.adjusted_rand_index(),
            ClusterMetric::MutualInformation => table.mutual_information(),
            ClusterMetric::NormalizedMutualInformation => table.normalized_mutual_information(),
            ClusterMetric::AdjustedMutualInformation => table.adjusted_mutual_information(),
            ClusterMetric::Accuracy => table.accuracy(),
        }
    }

    /// Score two aligned label sequences
    pub fn compute<L: AsRef<str>>(&self, true_labels: &[L], predicted_labels: &[L]) -> f64 {
        self.score(&ContingencyTable::from_labels(true_labels, predicted_labels))
    }

    /// Parse a list of metric codes, keeping first-seen order and dropping duplicates
    pub fn parse_list<S: AsRef<str>>(codes: &[S]) -> Result<Vec<ClusterMetric>> {
        let mut metrics = Vec::with_capacity(codes.len());
        for code in codes {
            let metric: ClusterMetric = code.as_ref().parse()?;
            if !metrics.contains(&metric) {
                metrics.push(metric);
            }
        }
        Ok(metrics)
    }
}

impl fmt::Display for ClusterMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ClusterMetric {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        ClusterMetric::ALL
            .iter()
            .copied()
            .find(|m| m.code() == s.trim())
            .ok_or_else(|| EvalError::InvalidMetric(s.to_string()))
    }
}

/// Scores for one result file, keyed by metric
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricScores(BTreeMap<ClusterMetric, f64>);

impl MetricScores {
    /// Compute every metric in `metrics` from a single contingency table
    pub fn compute(metrics: &[ClusterMetric], table: &ContingencyTable) -> Self {
        Self(metrics.iter().map(|m| (*m, m.score(table))).collect())
    }

    pub fn get(&self, metric: ClusterMetric) -> Option<f64> {
        self.0.get(&metric).copied()
    }

    /// Look up a score by its short code ("ARI", "NMI", ...)
    pub fn get_code(&self, code: &str) -> Option<f64> {
        code.parse::<ClusterMetric>().ok().and_then(|m| self.get(m))
    }

    pub fn metrics(&self) -> impl Iterator<Item = ClusterMetric> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClusterMetric, f64)> + '_ {
        self.0.iter().map(|(m, s)| (*m, *s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Format as a single human-readable line
    pub fn format(&self) -> String {
        self.iter()
            .map(|(m, s)| format!("{}={:.4}", m, s))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(t: &[&str], p: &[&str]) -> ContingencyTable {
        ContingencyTable::from_labels(t, p)
    }

    #[test]
    fn test_perfect_agreement() {
        let labels = ["a", "b", "a", "b"];
        let t = table(&labels, &labels);

        for metric in ClusterMetric::ALL {
            if metric == ClusterMetric::MutualInformation {
                assert!((metric.score(&t) - 2f64.ln()).abs() < 1e-9);
            } else {
                assert!((metric.score(&t) - 1.0).abs() < 1e-9, "{} should be 1.0", metric);
            }
        }
    }

    #[test]
    fn test_label_permutation() {
        let t = table(&["0", "1", "0", "1"], &["1", "0", "1", "0"]);

        assert!((t.rand_index() - 1.0).abs() < 1e-9);
        assert!((t.adjusted_rand_index() - 1.0).abs() < 1e-9);
        assert!((t.normalized_mutual_information() - 1.0).abs() < 1e-9);
        assert!((t.adjusted_mutual_information() - 1.0).abs() < 1e-9);
        assert!(t.accuracy().abs() < 1e-9);
    }

    #[test]
    fn test_reference_values() {
        // Hand-computed from the contingency table [[2, 0, 0], [0, 1, 1]]
        let t = table(&["0", "0", "1", "1"], &["0", "0", "1", "2"]);

        assert!((t.rand_index() - 0.8333333333).abs() < 1e-6);
        assert!((t.adjusted_rand_index() - 0.5714285714).abs() < 1e-6);
        assert!((t.mutual_information() - 0.6931471806).abs() < 1e-6);
        assert!((t.normalized_mutual_information() - 0.8).abs() < 1e-6);
        assert!((t.accuracy() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_adjusted_mutual_information_values() {
        // Expected MI averaged over every permutation of the predicted labels
        let t = table(&["0", "0", "1", "1"], &["0", "0", "1", "2"]);
        assert!((t.expected_mutual_information() - 0.46209812037329673).abs() < 1e-9);
        assert!((t.adjusted_mutual_information() - 0.5714285714285717).abs() < 1e-9);

        let t = table(&["0", "0", "0", "1", "1", "1"], &["0", "0", "1", "1", "2", "2"]);
        assert!((t.expected_mutual_information() - 0.27725887222397877).abs() < 1e-9);
        assert!((t.adjusted_mutual_information() - 0.2987924581708893).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "label lengths must match")]
    fn test_mismatched_lengths_panic() {
        table(&["0", "1"], &["0"]);
    }

    #[test]
    fn test_independent_labellings() {
        let t = table(&["a", "a", "b", "b"], &["x", "y", "x", "y"]);

        assert!(t.mutual_information().abs() < 1e-9);
        assert!(t.normalized_mutual_information().abs() < 1e-9);
        assert!(t.adjusted_rand_index() < 0.0);
        assert!((t.rand_index() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_cluster_conventions() {
        let t = table(&["a", "a", "a"], &["z", "z", "z"]);
        assert_eq!(t.rand_index(), 1.0);
        assert_eq!(t.adjusted_rand_index(), 1.0);
        assert_eq!(t.mutual_information(), 0.0);
        assert_eq!(t.normalized_mutual_information(), 1.0);
        assert_eq!(t.adjusted_mutual_information(), 1.0);

        let t = table(&["a", "b", "c"], &["z", "z", "z"]);
        assert_eq!(t.mutual_information(), 0.0);
        assert_eq!(t.normalized_mutual_information(), 0.0);
        assert!(t.adjusted_mutual_information().abs() < 1e-9);
    }

    #[test]
    fn test_expected_mutual_information_bounds() {
        let t = table(
            &["0", "0", "0", "1", "1", "1", "2", "2"],
            &["0", "1", "0", "1", "2", "1", "2", "0"],
        );
        let emi = t.expected_mutual_information();
        assert!(emi > 0.0);
        assert!(emi < t.class_entropy().min(t.cluster_entropy()));
        assert!(t.adjusted_mutual_information() <= 1.0);
    }

    #[test]
    fn test_labels_are_trimmed() {
        let t = table(&[" 1", "2 "], &["1", "2"]);
        assert_eq!(t.accuracy(), 1.0);
    }

    #[test]
    fn test_parse_metric_codes() {
        let metrics = ClusterMetric::parse_list(&["ARI", "ACC", "ARI"]).unwrap();
        assert_eq!(metrics, vec![ClusterMetric::AdjustedRandIndex, ClusterMetric::Accuracy]);

        match ClusterMetric::parse_list(&["RI", "FM"]) {
            Err(EvalError::InvalidMetric(name)) => assert_eq!(name, "FM"),
            other => panic!("expected InvalidMetric, got {:?}", other),
        }
    }

    #[test]
    fn test_metric_scores_keys() {
        let t = table(&["a", "b"], &["a", "b"]);
        let scores = MetricScores::compute(
            &[ClusterMetric::Accuracy, ClusterMetric::RandIndex],
            &t,
        );

        assert_eq!(scores.len(), 2);
        assert_eq!(scores.get_code("ACC"), Some(1.0));
        assert_eq!(scores.get(ClusterMetric::AdjustedRandIndex), None);
        assert_eq!(scores.format(), "RI=1.0000 ACC=1.0000");

        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"RI":1.0,"ACC":1.0}"#);
    }
}
