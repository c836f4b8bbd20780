// SPDX-License-Identifier: MIT

//! Runtime values that rules and actions are evaluated against
//!
//! A [`Value`] is what the caller hands to `Evaluator::evaluate` or places in an
//! `ExecutionContext` as the workflow target. Rule targets and action parameters
//! are parsed from source text into the same type so that comparisons can be
//! done across categories (text "5" against integer 5, text "2024-01-31"
//! against a date).

use chrono::NaiveDate;
use serde_json::{Map, Number};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Date format accepted in literals and text values
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A runtime value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    Date(NaiveDate),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

/// Category of a runtime value, used when a modifier rejects a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Decimal,
    Text,
    Date,
    List,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::Decimal => "decimal",
            ValueKind::Text => "text",
            ValueKind::Date => "date",
            ValueKind::List => "list",
            ValueKind::Object => "object",
        };
        write!(f, "{}", name)
    }
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Integer(_) => ValueKind::Integer,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Text(_) => ValueKind::Text,
            Value::Date(_) => ValueKind::Date,
            Value::List(_) => ValueKind::List,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Parse a bare (unquoted) literal token
    ///
    /// Tries integer, decimal, boolean and `YYYY-MM-DD` date in that order and
    /// falls back to text. `null` yields [`Value::Null`].
    pub fn parse_literal(token: &str) -> Value {
        let token = token.trim();
        if token.eq_ignore_ascii_case("null") {
            return Value::Null;
        }
        if let Ok(i) = token.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = token.parse::<f64>() {
            if f.is_finite() {
                return Value::Decimal(f);
            }
        }
        if token.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if token.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        if let Ok(d) = NaiveDate::parse_from_str(token, DATE_FORMAT) {
            return Value::Date(d);
        }
        Value::Text(token.to_string())
    }

    /// Numeric view of the value; text is parsed
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Decimal(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Exact integer view; integral text is parsed, decimals are not
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Date view of the value; text is parsed as `YYYY-MM-DD`
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Decimal(_))
    }

    /// Textual form used for text comparison and diagnostics
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Truthiness used by `CHECK` and literal conditions
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Decimal(f) => *f != 0.0,
            Value::Text(s) => {
                let s = s.trim();
                !(s.is_empty() || s.eq_ignore_ascii_case("false") || s == "0")
            }
            Value::Date(_) => true,
            Value::List(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }

    /// Look up a dotted path inside nested objects
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for part in path.split('.').filter(|p| !p.is_empty()) {
            match current {
                Value::Object(map) => current = map.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Decimal(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => match NaiveDate::parse_from_str(s, DATE_FORMAT) {
                Ok(d) => Value::Date(d),
                Err(_) => Value::Text(s.clone()),
            },
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::Number((*i).into()),
            Value::Decimal(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Date(d) => serde_json::Value::String(d.format(DATE_FORMAT).to_string()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => {
                let mut obj = Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Object(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Decimal(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

/// Three-way comparison across value categories
///
/// Numeric when both sides are numeric (text is parsed; two integers compare
/// exactly, without going through `f64`), date when both are
/// dates, boolean when both are booleans, otherwise ordinal text comparison.
/// Null compares as empty text.
pub fn compare_loose(left: &Value, right: &Value, case_insensitive: bool) -> Ordering {
    if left.is_null() && right.is_null() {
        return Ordering::Equal;
    }
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return a.total_cmp(&b);
    }
    if let (Some(a), Some(b)) = (left.as_date(), right.as_date()) {
        return a.cmp(&b);
    }
    if let (Value::Bool(a), Value::Bool(b)) = (left, right) {
        return a.cmp(b);
    }
    let (a, b) = (left.to_text(), right.to_text());
    if case_insensitive {
        a.to_lowercase().cmp(&b.to_lowercase())
    } else {
        a.cmp(&b)
    }
}

/// Loose equality built on [`compare_loose`]
pub fn equals_loose(left: &Value, right: &Value, case_insensitive: bool) -> bool {
    compare_loose(left, right, case_insensitive) == Ordering::Equal
}
