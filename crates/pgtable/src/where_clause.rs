//! Predicate accumulator shared by SELECT, UPDATE and DELETE paths.

use crate::mapper::{ColumnMapper, identity_mapper};
use serde_json::Value;

/// Connector between two adjacent conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connector {
    And,
    Or,
}

impl Connector {
    fn as_sql(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

#[derive(Clone)]
struct Condition {
    connector: Connector,
    sql: String,
    params: Vec<Value>,
}

/// Reusable WHERE clause accumulator.
///
/// Conditions are collected in call order and joined with `AND` unless
/// [`Where::or`] was called immediately before. Column names pass through
/// the configured mapper; values become `?` placeholders, never SQL text.
#[derive(Clone)]
pub struct Where {
    mapper: ColumnMapper,
    conditions: Vec<Condition>,
    next_connector: Connector,
}

impl Where {
    /// Create an accumulator with the identity column mapper.
    pub fn new() -> Self {
        Self::with_mapper(identity_mapper())
    }

    /// Create an accumulator whose column names go through `mapper`.
    pub fn with_mapper(mapper: ColumnMapper) -> Self {
        Self {
            mapper,
            conditions: Vec::new(),
            next_connector: Connector::And,
        }
    }

    /// Check if any conditions have been added.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Join the next condition with `AND` (the default).
    pub fn and(&mut self) -> &mut Self {
        self.next_connector = Connector::And;
        self
    }

    /// Join the next condition with `OR`.
    pub fn or(&mut self) -> &mut Self {
        self.next_connector = Connector::Or;
        self
    }

    fn push(&mut self, sql: String, params: Vec<Value>) -> &mut Self {
        self.conditions.push(Condition {
            connector: self.next_connector,
            sql,
            params,
        });
        self.next_connector = Connector::And;
        self
    }

    fn push_cmp(&mut self, col: &str, op: &str, val: Value) -> &mut Self {
        let col = (self.mapper)(col);
        self.push(format!("{} {} ?", col, op), vec![val])
    }

    /// `column = ?`
    pub fn eq(&mut self, col: &str, val: impl Into<Value>) -> &mut Self {
        self.push_cmp(col, "=", val.into())
    }

    /// `column <> ?`
    pub fn ne(&mut self, col: &str, val: impl Into<Value>) -> &mut Self {
        self.push_cmp(col, "<>", val.into())
    }

    /// `column <> ?`, appended only when `apply` is true.
    pub fn ne_if(&mut self, apply: bool, col: &str, val: impl Into<Value>) -> &mut Self {
        if apply {
            self.ne(col, val);
        }
        self
    }

    /// `column < ?`
    pub fn lt(&mut self, col: &str, val: impl Into<Value>) -> &mut Self {
        self.push_cmp(col, "<", val.into())
    }

    /// `column <= ?`
    pub fn lte(&mut self, col: &str, val: impl Into<Value>) -> &mut Self {
        self.push_cmp(col, "<=", val.into())
    }

    /// `column > ?`
    pub fn gt(&mut self, col: &str, val: impl Into<Value>) -> &mut Self {
        self.push_cmp(col, ">", val.into())
    }

    /// `column >= ?`
    pub fn gte(&mut self, col: &str, val: impl Into<Value>) -> &mut Self {
        self.push_cmp(col, ">=", val.into())
    }

    /// `column LIKE ?`
    pub fn like(&mut self, col: &str, val: impl Into<Value>) -> &mut Self {
        self.push_cmp(col, "LIKE", val.into())
    }

    /// `column NOT LIKE ?`
    pub fn not_like(&mut self, col: &str, val: impl Into<Value>) -> &mut Self {
        self.push_cmp(col, "NOT LIKE", val.into())
    }

    /// `column <> ?` over an already-physical column name.
    ///
    /// Used for the logical-delete condition, whose column comes from
    /// executor configuration and must not pass through the mapper again.
    pub(crate) fn ne_physical(&mut self, col: &str, val: Value) -> &mut Self {
        self.push(format!("{} <> ?", col), vec![val])
    }

    /// `column IN (?, ...)`. An empty list renders `1 = 0`.
    pub fn in_list(&mut self, col: &str, values: Vec<Value>) -> &mut Self {
        if values.is_empty() {
            return self.push("1 = 0".to_string(), Vec::new());
        }
        let col = (self.mapper)(col);
        let placeholders = vec!["?"; values.len()].join(",");
        self.push(format!("{} IN ({})", col, placeholders), values)
    }

    /// `column IS NULL`
    pub fn is_null(&mut self, col: &str) -> &mut Self {
        let col = (self.mapper)(col);
        self.push(format!("{} IS NULL", col), Vec::new())
    }

    /// `column IS NOT NULL`
    pub fn is_not_null(&mut self, col: &str) -> &mut Self {
        let col = (self.mapper)(col);
        self.push(format!("{} IS NOT NULL", col), Vec::new())
    }

    /// Render the clause, including the leading `" WHERE "`.
    ///
    /// Returns the empty string when no conditions were added.
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            return String::new();
        }
        let mut out = String::from(" WHERE ");
        for (i, cond) in self.conditions.iter().enumerate() {
            if i > 0 {
                out.push(' ');
                out.push_str(cond.connector.as_sql());
                out.push(' ');
            }
            out.push_str(&cond.sql);
        }
        out
    }

    /// Ordered parameter values matching the rendered placeholders.
    pub fn params(&self) -> Vec<Value> {
        self.conditions
            .iter()
            .flat_map(|c| c.params.iter().cloned())
            .collect()
    }
}

impl Default for Where {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Where {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Where")
            .field("sql", &self.sql())
            .field("params", &self.params())
            .finish()
    }
}
