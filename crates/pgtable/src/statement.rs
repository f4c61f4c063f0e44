//! Bound statement carrier.

use serde_json::Value;
use std::collections::HashSet;

/// A rendered SQL template paired with its positional parameters.
///
/// The SQL text uses `?` placeholders; `params` matches placeholder order
/// left-to-right. `exclude_columns` travels with the statement so result-row
/// materialization can still drop columns that a `SELECT *` pulled in.
#[derive(Debug, Clone, Default)]
pub struct BoundStatement {
    sql: String,
    params: Vec<Value>,
    exclude_columns: HashSet<String>,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
            exclude_columns: HashSet::new(),
        }
    }

    pub fn with_excludes(mut self, exclude_columns: HashSet<String>) -> Self {
        self.exclude_columns = exclude_columns;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn exclude_columns(&self) -> &HashSet<String> {
        &self.exclude_columns
    }
}
