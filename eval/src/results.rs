// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Reading and writing clusterer result files
//!
//! Layout of a result file:
//!
//! ```text
//! Trace,kmeans-dtw,test,0,MILLISECONDS,PREDICTIONS     <- comment line
//! {'metric': 'dtw', 'n_clusters': 4}                  <- parameter literal
//! 0.93,1240,35                                        <- header/summary row
//! 0,0,,0.9,0.1                                        <- true,predicted,...
//! 1,1,,0.2,0.8
//! ```

use crate::error::{EvalError, Result};
use crate::params::EstimatorParameters;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// A parsed result file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFile {
    /// Comment line fields: dataset name, estimator identity, then free-form
    pub first_line: Vec<String>,
    /// Decoded parameter line
    pub parameters: EstimatorParameters,
    /// All rows after the parameter line, header row first
    pub rows: Vec<Vec<String>>,
}

impl ResultFile {
    /// Dataset name from the comment line
    pub fn dataset(&self) -> &str {
        self.first_line.first().map(String::as_str).unwrap_or_default()
    }

    /// Estimator identity from the comment line
    pub fn estimator(&self) -> &str {
        self.first_line.get(1).map(String::as_str).unwrap_or_default()
    }

    /// Read and parse a result file from disk
    pub fn read(path: &Path) -> Result<Self> {
        let mut contents = String::new();
        File::open(path)
            .and_then(|mut f| f.read_to_string(&mut contents))
            .map_err(|source| EvalError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&contents, path)
    }

    /// Parse result file contents; `path` is used for error reporting only
    pub fn parse(contents: &str, path: &Path) -> Result<Self> {
        let malformed = |line: usize, reason: &str| EvalError::MalformedFile {
            path: path.to_path_buf(),
            line,
            reason: reason.to_string(),
        };

        let mut lines = contents.splitn(3, '\n');
        let comment = lines
            .next()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| malformed(1, "missing comment line"))?;
        let parameter_line = lines
            .next()
            .map(|l| l.trim_end_matches('\r'))
            .ok_or_else(|| malformed(2, "missing parameter line"))?;
        let body = lines.next().unwrap_or_default();

        let first_line: Vec<String> = comment.split(',').map(|f| f.trim().to_string()).collect();
        if first_line.len() < 2 {
            return Err(malformed(1, "comment line needs dataset and estimator fields"));
        }

        let parameters = EstimatorParameters::parse(parameter_line.trim()).map_err(|source| EvalError::Params {
            path: path.to_path_buf(),
            source,
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(body.as_bytes());

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| malformed(idx + 3, &e.to_string()))?;
            // Body positions are 1-based and start after the two leading lines
            let line = record.position().map_or(idx + 3, |p| p.line() as usize + 2);
            if record.iter().all(|f| f.is_empty()) {
                continue;
            }
            // The header row may take any shape; data rows need both labels
            if !rows.is_empty() && record.len() < 2 {
                return Err(malformed(line, "expected at least 2 columns (true, predicted)"));
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self {
            first_line,
            parameters,
            rows,
        })
    }

    /// (true, predicted) label pairs, header row excluded
    pub fn label_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rows
            .iter()
            .skip(1)
            .filter(|row| row.len() >= 2)
            .map(|row| (row[0].as_str(), row[1].as_str()))
    }

    /// Serialise in result file layout
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut w = BufWriter::new(writer);
        let io = |source| EvalError::Io {
            path: PathBuf::from("<writer>"),
            source,
        };
        writeln!(w, "{}", self.first_line.join(",")).map_err(io)?;
        writeln!(w, "{}", self.parameters.to_literal()).map_err(io)?;
        for row in &self.rows {
            writeln!(w, "{}", row.join(",")).map_err(io)?;
        }
        w.flush().map_err(io)
    }

    /// Write to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let io = |source| EvalError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let file = File::create(path).map_err(io)?;
        self.write_to(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    const SAMPLE: &str = "Trace,kmeans-dtw,test,0,MILLISECONDS,PREDICTIONS\n\
{'metric': 'dtw', 'n_clusters': 4}\n\
0.75,1240,35\n\
0,0,,0.9,0.1\n\
1,1,,0.2,0.8\n\
1,0,,0.6,0.4\n";

    #[test]
    fn test_parse_sample() {
        let parsed = ResultFile::parse(SAMPLE, Path::new("sample.csv")).unwrap();

        assert_eq!(parsed.dataset(), "Trace");
        assert_eq!(parsed.estimator(), "kmeans-dtw");
        assert_eq!(parsed.parameters.get("n_clusters"), Some(&ParamValue::Int(4)));
        assert_eq!(parsed.rows.len(), 4);

        let pairs: Vec<_> = parsed.label_pairs().collect();
        assert_eq!(pairs, vec![("0", "0"), ("1", "1"), ("1", "0")]);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let contents = "Beef,kmedoids\r\n{}\r\nheader\r\n\r\n2,3\r\n";
        let parsed = ResultFile::parse(contents, Path::new("x.csv")).unwrap();

        assert!(parsed.parameters.is_empty());
        assert_eq!(parsed.label_pairs().collect::<Vec<_>>(), vec![("2", "3")]);
    }

    #[test]
    fn test_short_data_row() {
        let contents = "Beef,kmedoids\n{}\nheader\n1,1\n2\n";
        match ResultFile::parse(contents, Path::new("bad.csv")) {
            Err(EvalError::MalformedFile { line, .. }) => assert_eq!(line, 5),
            other => panic!("expected MalformedFile, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_lines() {
        assert!(matches!(
            ResultFile::parse("", Path::new("empty.csv")),
            Err(EvalError::MalformedFile { line: 1, .. })
        ));
        assert!(matches!(
            ResultFile::parse("Beef,kmeans", Path::new("one.csv")),
            Err(EvalError::MalformedFile { line: 2, .. })
        ));
        assert!(matches!(
            ResultFile::parse("Beef\n{}\n", Path::new("one_field.csv")),
            Err(EvalError::MalformedFile { line: 1, .. })
        ));
    }

    #[test]
    fn test_bad_parameter_literal() {
        let contents = "Beef,kmeans\n{'k': open('x')}\nheader\n1,1\n";
        assert!(matches!(
            ResultFile::parse(contents, Path::new("p.csv")),
            Err(EvalError::Params { .. })
        ));
    }

    #[test]
    fn test_save_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kmeans").join("Trace.csv");
        let parsed = ResultFile::parse(SAMPLE, Path::new("sample.csv")).unwrap();

        parsed.save(&path).unwrap();
        let reread = ResultFile::read(&path).unwrap();

        assert_eq!(reread.first_line, parsed.first_line);
        assert_eq!(reread.parameters, parsed.parameters);
        assert_eq!(reread.rows, parsed.rows);
    }

    #[test]
    fn test_read_missing_file() {
        let err = ResultFile::read(Path::new("/nonexistent/results.csv")).unwrap_err();
        assert!(matches!(err, EvalError::Io { .. }));
    }
}
