// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Error types for result-file evaluation

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for evaluator operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Failure to decode an estimator parameter literal
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid parameter literal at byte {offset}: {message}")]
pub struct ParamsError {
    /// Byte offset into the parameter line where decoding stopped
    pub offset: usize,
    pub message: String,
}

impl ParamsError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Errors raised while configuring the evaluator or evaluating a result file
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("The metric: {0} is invalid, available metrics are RI, ARI, MI, NMI, AMI, ACC")]
    InvalidMetric(String),

    #[error("failed to read result file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed result file {path} (line {line}): {reason}")]
    MalformedFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("bad estimator parameters in {path}")]
    Params {
        path: PathBuf,
        #[source]
        source: ParamsError,
    },

    #[error("naming parameter '{key}' not present in parameters of estimator '{estimator}'")]
    MissingNamingParameter { key: String, estimator: String },

    #[error("result file {path} contains no predictions after the header row")]
    NoPredictions { path: PathBuf },
}
