// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Write a result file with known contents, evaluate it, and compare the
//! scores with brute-force reference computations.

use cluster_eval::{ClusterEvaluator, ClusterMetric, EstimatorParameters, ParamValue, ResultFile};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

fn pair_counting_rand_index(t: &[String], p: &[String]) -> f64 {
    let n = t.len();
    let mut agree = 0usize;
    let mut total = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            if (t[i] == t[j]) == (p[i] == p[j]) {
                agree += 1;
            }
            total += 1;
        }
    }
    agree as f64 / total as f64
}

fn choose2(x: usize) -> f64 {
    (x * x.saturating_sub(1)) as f64 / 2.0
}

fn hubert_arabie_ari(t: &[String], p: &[String]) -> f64 {
    let mut joint: HashMap<(&str, &str), usize> = HashMap::new();
    let mut rows: HashMap<&str, usize> = HashMap::new();
    let mut cols: HashMap<&str, usize> = HashMap::new();
    for (a, b) in t.iter().zip(p) {
        *joint.entry((a.as_str(), b.as_str())).or_insert(0) += 1;
        *rows.entry(a.as_str()).or_insert(0) += 1;
        *cols.entry(b.as_str()).or_insert(0) += 1;
    }
    let index: f64 = joint.values().map(|&c| choose2(c)).sum();
    let sum_a: f64 = rows.values().map(|&c| choose2(c)).sum();
    let sum_b: f64 = cols.values().map(|&c| choose2(c)).sum();
    let expected = sum_a * sum_b / choose2(t.len());
    let max = (sum_a + sum_b) / 2.0;
    (index - expected) / (max - expected)
}

fn entropy_and_mi(t: &[String], p: &[String]) -> (f64, f64, f64) {
    let n = t.len() as f64;
    let mut joint: HashMap<(&str, &str), f64> = HashMap::new();
    let mut pt: HashMap<&str, f64> = HashMap::new();
    let mut pp: HashMap<&str, f64> = HashMap::new();
    for (a, b) in t.iter().zip(p) {
        *joint.entry((a.as_str(), b.as_str())).or_insert(0.0) += 1.0 / n;
        *pt.entry(a.as_str()).or_insert(0.0) += 1.0 / n;
        *pp.entry(b.as_str()).or_insert(0.0) += 1.0 / n;
    }
    let h = |m: &HashMap<&str, f64>| -m.values().map(|&x| x * x.ln()).sum::<f64>();
    let mi: f64 = joint
        .iter()
        .map(|((a, b), &pab)| pab * (pab / (pt[a] * pp[b])).ln())
        .sum();
    (h(&pt), h(&pp), mi)
}

/// Expected mutual information by averaging over every permutation of `p`
fn permutation_expected_mi(t: &[String], p: &[String]) -> f64 {
    fn permute(k: usize, items: &mut Vec<String>, t: &[String], acc: &mut (f64, usize)) {
        if k <= 1 {
            acc.0 += entropy_and_mi(t, items).2;
            acc.1 += 1;
            return;
        }
        for i in 0..k {
            permute(k - 1, items, t, acc);
            let j = if k % 2 == 0 { i } else { 0 };
            items.swap(j, k - 1);
        }
    }

    let mut items = p.to_vec();
    let mut acc = (0.0, 0);
    permute(items.len(), &mut items, t, &mut acc);
    acc.0 / acc.1 as f64
}

#[test]
fn adjusted_mutual_information_matches_permutation_average() {
    let labels = |s: &str| s.chars().map(|c| c.to_string()).collect::<Vec<_>>();
    let truth = labels("00011222");
    let predicted = labels("00112220");

    let emi = permutation_expected_mi(&truth, &predicted);
    let (h_true, h_pred, mi) = entropy_and_mi(&truth, &predicted);
    let expected = (mi - emi) / ((h_true + h_pred) / 2.0 - emi);

    let ami = ClusterMetric::AdjustedMutualInformation.compute(&truth, &predicted);
    assert!((ami - expected).abs() < 1e-9, "got {}, expected {}", ami, expected);
}

#[test]
fn synthetic_file_round_trip() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let n = 120;
    let truth: Vec<String> = (0..n).map(|_| rng.gen_range(0..4).to_string()).collect();
    let predicted: Vec<String> = truth
        .iter()
        .map(|t| {
            if rng.gen_bool(0.3) {
                rng.gen_range(0..5).to_string()
            } else {
                t.clone()
            }
        })
        .collect();

    let mut parameters = EstimatorParameters::new();
    parameters.insert("distance", ParamValue::Str("twe".to_string()));
    parameters.insert("n_clusters", ParamValue::Int(4));

    let mut rows = vec![vec!["0.7".to_string(), "1200".to_string()]];
    rows.extend(truth.iter().zip(&predicted).map(|(t, p)| vec![t.clone(), p.clone(), String::new(), "0.5".to_string()]));

    let file = ResultFile {
        first_line: vec!["ItalyPowerDemand".to_string(), "kmeans".to_string(), "test".to_string()],
        parameters,
        rows,
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kmeans").join("ItalyPowerDemand.csv");
    file.save(&path).unwrap();

    let evaluator = ClusterEvaluator::new::<&str>(None, Some("distance".to_string())).unwrap();
    let record = evaluator.evaluate_csv_data(&path).unwrap();

    assert_eq!(record.dataset, "ItalyPowerDemand");
    assert_eq!(record.estimator, "kmeans");
    assert_eq!(record.display_name, "kmeans-twe");
    assert_eq!(record.metric_scores.len(), 6);

    let scores = &record.metric_scores;
    let (h_true, h_pred, mi) = entropy_and_mi(&truth, &predicted);
    let accuracy = truth.iter().zip(&predicted).filter(|(a, b)| a == b).count() as f64 / n as f64;

    let close = |metric: ClusterMetric, expected: f64| {
        let got = scores.get(metric).unwrap();
        assert!((got - expected).abs() < 1e-9, "{}: got {}, expected {}", metric, got, expected);
    };
    close(ClusterMetric::RandIndex, pair_counting_rand_index(&truth, &predicted));
    close(ClusterMetric::AdjustedRandIndex, hubert_arabie_ari(&truth, &predicted));
    close(ClusterMetric::MutualInformation, mi);
    close(ClusterMetric::NormalizedMutualInformation, 2.0 * mi / (h_true + h_pred));
    close(ClusterMetric::Accuracy, accuracy);

    let ami = scores.get(ClusterMetric::AdjustedMutualInformation).unwrap();
    let nmi = scores.get(ClusterMetric::NormalizedMutualInformation).unwrap();
    assert!(ami > 0.0 && ami < nmi);
    assert_eq!(ami, ClusterMetric::AdjustedMutualInformation.compute(&truth, &predicted));
}
