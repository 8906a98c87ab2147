// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Estimator parameter mappings
//!
//! The second line of a result file holds the estimator's parameters as a
//! literal mapping, e.g. `{'metric': 'dtw', 'n_clusters': 8, 'tol': 1e-06}`.
//! Only this grammar is accepted:
//!
//! ```text
//! mapping := '{' [ entry (',' entry)* [','] ] '}'
//! entry   := string ':' value
//! value   := string | number | True | False | None | list | tuple | mapping
//! list    := '[' [ value (',' value)* [','] ] ']'
//! tuple   := '(' [ value (',' value)* [','] ] ')'
//! ```
//!
//! Strings may use single or double quotes with `\\ \' \" \n \t` escapes.
//! Anything else (names, calls, sets) is rejected.

use crate::error::ParamsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single decoded parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
    Tuple(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value in literal syntax (strings quoted)
    pub fn to_literal(&self) -> String {
        match self {
            ParamValue::Str(s) => {
                let escaped = s
                    .replace('\\', "\\\\")
                    .replace('\'', "\\'")
                    .replace('\n', "\\n")
                    .replace('\t', "\\t");
                format!("'{}'", escaped)
            }
            other => other.to_string(),
        }
    }
}

fn join_literals(items: &[ParamValue]) -> String {
    items.iter().map(|v| v.to_literal()).collect::<Vec<_>>().join(", ")
}

fn map_literal(entries: &BTreeMap<String, ParamValue>) -> String {
    let entries: Vec<String> = entries
        .iter()
        .map(|(k, v)| format!("{}: {}", ParamValue::Str(k.clone()).to_literal(), v.to_literal()))
        .collect();
    format!("{{{}}}", entries.join(", "))
}

/// Shortest round-trip form with a signed, two-digit exponent (`1e-06`, `1e+20`)
fn float_repr(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    // Debug switches to exponent form at the same magnitudes (1e-4, 1e16)
    let repr = format!("{:?}", x);
    match repr.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => repr,
    }
}

/// Display form used for estimator names: strings appear unquoted
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::None => f.write_str("None"),
            ParamValue::Bool(true) => f.write_str("True"),
            ParamValue::Bool(false) => f.write_str("False"),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => f.write_str(&float_repr(*x)),
            ParamValue::Str(s) => f.write_str(s),
            ParamValue::List(items) => write!(f, "[{}]", join_literals(items)),
            ParamValue::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0].to_literal()),
            ParamValue::Tuple(items) => write!(f, "({})", join_literals(items)),
            ParamValue::Map(entries) => f.write_str(&map_literal(entries)),
        }
    }
}

/// Decoded parameter mapping for one estimator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EstimatorParameters(BTreeMap<String, ParamValue>);

impl EstimatorParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a parameter line
    pub fn parse(line: &str) -> Result<Self, ParamsError> {
        Decoder::new(line).mapping()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        self.0.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Encode back into the literal form accepted by [`EstimatorParameters::parse`]
    pub fn to_literal(&self) -> String {
        map_literal(&self.0)
    }
}

impl FromIterator<(String, ParamValue)> for EstimatorParameters {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Recursive-descent decoder over the bytes of one line
struct Decoder<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> ParamsError {
        ParamsError::new(self.pos, message)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParamsError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn mapping(mut self) -> Result<EstimatorParameters, ParamsError> {
        let entries = self.map_body()?;
        self.skip_whitespace();
        if self.pos < self.src.len() {
            return Err(self.error("trailing characters after mapping"));
        }
        Ok(EstimatorParameters(entries))
    }

    fn map_body(&mut self) -> Result<BTreeMap<String, ParamValue>, ParamsError> {
        let mut entries = BTreeMap::new();
        self.expect('{')?;
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.bump();
                break;
            }
            let key = match self.peek() {
                Some('\'') | Some('"') => self.string()?,
                _ => return Err(self.error("mapping keys must be quoted strings")),
            };
            self.expect(':')?;
            let value = self.value()?;
            if entries.insert(key.clone(), value).is_some() {
                return Err(self.error(format!("duplicate key '{}'", key)));
            }
            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                Some(c) => return Err(ParamsError::new(self.pos - c.len_utf8(), format!("unexpected '{}'", c))),
                None => return Err(self.error("unterminated mapping")),
            }
        }
        Ok(entries)
    }

    fn value(&mut self) -> Result<ParamValue, ParamsError> {
        self.skip_whitespace();
        match self.peek() {
            Some('\'') | Some('"') => Ok(ParamValue::Str(self.string()?)),
            Some('[') => self.list(']'),
            Some('(') => self.list(')'),
            Some('{') => Ok(ParamValue::Map(self.map_body()?)),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.keyword(),
            Some(c) => Err(self.error(format!("unexpected '{}'", c))),
            None => Err(self.error("expected a value, found end of input")),
        }
    }

    fn list(&mut self, close: char) -> Result<ParamValue, ParamsError> {
        self.bump();
        let wrap = |items| match close {
            ')' => ParamValue::Tuple(items),
            _ => ParamValue::List(items),
        };
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(wrap(items));
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(wrap(items)),
                Some(c) => return Err(ParamsError::new(self.pos - c.len_utf8(), format!("unexpected '{}' in list", c))),
                None => return Err(self.error("unterminated list")),
            }
        }
    }

    fn string(&mut self) -> Result<String, ParamsError> {
        let start = self.pos;
        let quote = self.bump().ok_or_else(|| self.error("expected a string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                    Some(c) => return Err(self.error(format!("unsupported escape '\\{}'", c))),
                    None => return Err(ParamsError::new(start, "unterminated string")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(ParamsError::new(start, "unterminated string")),
            }
        }
    }

    fn number(&mut self) -> Result<ParamValue, ParamsError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.bump();
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {}
                '.' | 'e' | 'E' => is_float = true,
                '-' | '+' if matches!(self.src[..self.pos].chars().last(), Some('e') | Some('E')) => {}
                _ => break,
            }
            self.bump();
        }
        let text: String = self.src[start..self.pos].chars().filter(|&c| c != '_').collect();
        let parsed = if is_float {
            text.parse::<f64>().ok().map(ParamValue::Float)
        } else {
            text.parse::<i64>().ok().map(ParamValue::Int)
        };
        parsed.ok_or_else(|| ParamsError::new(start, format!("invalid number '{}'", text)))
    }

    fn keyword(&mut self) -> Result<ParamValue, ParamsError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "True" => Ok(ParamValue::Bool(true)),
            "False" => Ok(ParamValue::Bool(false)),
            "None" => Ok(ParamValue::None),
            "inf" => Ok(ParamValue::Float(f64::INFINITY)),
            "nan" => Ok(ParamValue::Float(f64::NAN)),
            word => Err(ParamsError::new(start, format!("unsupported bare word '{}'", word))),
        }
    }
}
