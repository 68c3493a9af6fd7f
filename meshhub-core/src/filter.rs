//! Webhook filter expressions.
//!
//! A filter is a single comparison against one field of the event payload:
//!
//! ```text
//! $.<dot.path> <op> <literal>
//! $.<dot.path> exists
//! $.<dot.path> not exists
//! ```
//!
//! with `<op>` one of `==`, `!=`, `>`, `<`, `>=`, `<=`. Literals are a quoted
//! string, `null`, `true`/`false`, an integer, a float, or otherwise taken as
//! a raw string. There are no boolean connectives.

use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("filter must start with `$.`")]
    MissingRoot,
    #[error("empty path segment in {0:?}")]
    EmptySegment(String),
    #[error("missing operator")]
    MissingOperator,
    #[error("unknown operator in {0:?}")]
    UnknownOperator(String),
    #[error("operator {0} requires a value")]
    MissingValue(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Exists,
    NotExists,
}

impl Operator {
    /// Binary operators, longest first so `>=` wins over `>`.
    const BINARY: [(&'static str, Operator); 6] = [
        (">=", Operator::Ge),
        ("<=", Operator::Le),
        ("==", Operator::Eq),
        ("!=", Operator::Ne),
        (">", Operator::Gt),
        ("<", Operator::Lt),
    ];

    fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Exists => "exists",
            Operator::NotExists => "not exists",
        }
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    path: Vec<String>,
    op: Operator,
    value: Value,
}

impl FromStr for Filter {
    type Err = FilterParseError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let rest = expr
            .trim()
            .strip_prefix("$.")
            .ok_or(FilterParseError::MissingRoot)?;

        let path_end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-' || c == '.'))
            .unwrap_or(rest.len());
        let (raw_path, rest) = rest.split_at(path_end);

        let path: Vec<String> = raw_path.split('.').map(str::to_string).collect();
        if path.iter().any(String::is_empty) {
            return Err(FilterParseError::EmptySegment(raw_path.to_string()));
        }

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(FilterParseError::MissingOperator);
        }

        let words: Vec<&str> = rest.split_whitespace().collect();
        match words.as_slice() {
            ["exists"] => {
                return Ok(Self {
                    path,
                    op: Operator::Exists,
                    value: Value::Null,
                });
            }
            ["not", "exists"] => {
                return Ok(Self {
                    path,
                    op: Operator::NotExists,
                    value: Value::Null,
                });
            }
            _ => {}
        }

        let (op, literal) = Operator::BINARY
            .iter()
            .find_map(|(symbol, op)| rest.strip_prefix(symbol).map(|lit| (*op, lit.trim())))
            .ok_or_else(|| FilterParseError::UnknownOperator(rest.to_string()))?;
        if literal.is_empty() {
            return Err(FilterParseError::MissingValue(op.symbol()));
        }

        Ok(Self {
            path,
            op,
            value: parse_literal(literal),
        })
    }
}

impl Filter {
    pub fn operator(&self) -> Operator {
        self.op
    }

    /// Evaluate against a payload. Never errors; a missing path or a type
    /// mismatch is simply "no match".
    pub fn evaluate(&self, payload: &Value) -> bool {
        let actual = resolve(payload, &self.path);
        match (self.op, actual) {
            (Operator::Exists, found) => found.is_some(),
            (Operator::NotExists, found) => found.is_none(),
            (_, None) => false,
            (Operator::Eq, Some(actual)) => values_equal(actual, &self.value),
            (Operator::Ne, Some(actual)) => !values_equal(actual, &self.value),
            (op, Some(actual)) => match compare(actual, &self.value) {
                Some(ordering) => match op {
                    Operator::Gt => ordering == Ordering::Greater,
                    Operator::Lt => ordering == Ordering::Less,
                    Operator::Ge => ordering != Ordering::Less,
                    Operator::Le => ordering != Ordering::Greater,
                    _ => false,
                },
                None => false,
            },
        }
    }
}

fn resolve<'a>(payload: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter()
        .try_fold(payload, |current, segment| current.as_object()?.get(segment))
}

fn parse_literal(literal: &str) -> Value {
    let quoted = [('"', '"'), ('\'', '\'')].iter().find_map(|(open, close)| {
        literal
            .strip_prefix(*open)
            .and_then(|inner| inner.strip_suffix(*close))
    });
    if let Some(inner) = quoted {
        return Value::String(inner.to_string());
    }

    match literal {
        "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(int) = literal.parse::<i64>() {
                return Value::from(int);
            }
            match literal.parse::<f64>() {
                Ok(float) if float.is_finite() => Value::from(float),
                _ => Value::String(literal.to_string()),
            }
        }
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) if actual.is_number() && expected.is_number() => a == b,
        _ => actual == expected,
    }
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
