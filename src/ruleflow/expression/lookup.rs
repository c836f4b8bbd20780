// SPDX-License-Identifier: MIT

//! Membership lookups backing the `indb` modifier
//!
//! The data-access layer lives outside this crate. Callers plug it in by
//! implementing [`Lookup`]; [`MemoryLookup`] covers tests and small fixed
//! reference tables.

use super::ast::ColumnRef;
use crate::rdk::value::{equals_loose, Value};
use std::collections::HashMap;

pub trait Lookup: Send + Sync {
    /// Whether `value` occurs in `column` of `table`
    fn contains(&self, column: &ColumnRef, value: &Value) -> Result<bool, String>;
}

/// Lookup over in-memory column values
#[derive(Debug, Clone, Default)]
pub struct MemoryLookup {
    columns: HashMap<(String, String), Vec<Value>>,
}

impl MemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add values to `table.column`; table and column names match case-insensitively
    pub fn insert<I, V>(&mut self, table: &str, column: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.columns
            .entry(Self::key(table, column))
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    pub fn with<I, V>(mut self, table: &str, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.insert(table, column, values);
        self
    }

    fn key(table: &str, column: &str) -> (String, String) {
        (table.to_ascii_lowercase(), column.to_ascii_lowercase())
    }
}

impl Lookup for MemoryLookup {
    fn contains(&self, column: &ColumnRef, value: &Value) -> Result<bool, String> {
        match self.columns.get(&Self::key(&column.table, &column.column)) {
            Some(values) => Ok(values.iter().any(|v| equals_loose(v, value, false))),
            None => Err(format!("unknown column {}", column)),
        }
    }
}
