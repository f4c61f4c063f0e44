//! Fluent single-table statement builder.
//!
//! A [`NamedTable`] accumulates column values, select fields, predicates,
//! orderings and policy flags through chained calls, then renders a
//! parameterized [`BoundStatement`] on a terminal operation and hands it to
//! the [`SqlExecutor`]. All values are bound, never interpolated.
//!
//! ```ignore
//! let id = executor
//!     .table("user")
//!     .primary("id")
//!     .set("name", "Tom")
//!     .set("age", 30)
//!     .insert()
//!     .await?;
//! ```

use crate::error::{TableError, TableResult};
use crate::executor::{RowMap, SqlExecutor};
use crate::mapper::ColumnMapper;
use crate::page::{Page, PageResult};
use crate::statement::BoundStatement;
use crate::value;
use crate::where_clause::Where;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// Sort direction for `ORDER BY` fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Default value for the primary column, consulted on insert when the
/// primary has no non-blank value yet.
#[derive(Clone)]
pub enum PrimaryDefault {
    /// A plain value.
    Literal(Value),
    /// A zero-argument producer, resolved lazily at insert time.
    Generator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl PrimaryDefault {
    fn resolve(&self) -> Value {
        match self {
            PrimaryDefault::Literal(v) => v.clone(),
            PrimaryDefault::Generator(f) => f(),
        }
    }
}

impl std::fmt::Debug for PrimaryDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimaryDefault::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            PrimaryDefault::Generator(_) => f.debug_tuple("Generator").field(&"<fn>").finish(),
        }
    }
}

/// Outcome of [`NamedTable::save`]: which path ran and what it returned.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// An insert ran; carries the primary value of the new row.
    Inserted(Value),
    /// An update ran; carries the affected row count.
    Updated(u64),
}

/// Fluent, stateful statement builder bound to one table.
///
/// Logical field names are translated to physical column names exactly once,
/// at the point they enter the builder; every name stored inside is physical.
/// The owned [`Where`] is never shared between two builders; `clone()` deep
/// copies it.
pub struct NamedTable<'a, E: SqlExecutor> {
    executor: &'a E,
    table_name: String,
    primary: Option<String>,
    default_primary: Option<PrimaryDefault>,
    /// Insertion-ordered write payload; later writes overwrite by key.
    columns: Vec<(String, Value)>,
    fields: Vec<String>,
    groups: Vec<String>,
    orders: Vec<String>,
    excludes: HashSet<String>,
    mapper: ColumnMapper,
    logic_delete_column: Option<String>,
    logic_delete_value: Value,
    use_logic: bool,
    with_blank: bool,
    where_: Where,
}

impl<'a, E: SqlExecutor> Clone for NamedTable<'a, E> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor,
            table_name: self.table_name.clone(),
            primary: self.primary.clone(),
            default_primary: self.default_primary.clone(),
            columns: self.columns.clone(),
            fields: self.fields.clone(),
            groups: self.groups.clone(),
            orders: self.orders.clone(),
            excludes: self.excludes.clone(),
            mapper: self.mapper.clone(),
            logic_delete_column: self.logic_delete_column.clone(),
            logic_delete_value: self.logic_delete_value.clone(),
            use_logic: self.use_logic,
            with_blank: self.with_blank,
            where_: self.where_.clone(),
        }
    }
}

impl<'a, E: SqlExecutor> NamedTable<'a, E> {
    /// Create a builder for `table_name`, copying the logical-delete
    /// configuration from the executor.
    pub fn new(table_name: impl Into<String>, executor: &'a E, mapper: ColumnMapper) -> Self {
        let logic_delete_value = executor
            .logic_delete_value()
            .map(value::parse_config_value)
            .unwrap_or(Value::Null);
        Self {
            executor,
            table_name: table_name.into(),
            primary: None,
            default_primary: None,
            columns: Vec::new(),
            fields: Vec::new(),
            groups: Vec::new(),
            orders: Vec::new(),
            excludes: HashSet::new(),
            logic_delete_column: executor.logic_delete_column().map(str::to_string),
            logic_delete_value,
            use_logic: false,
            with_blank: false,
            where_: Where::with_mapper(mapper.clone()),
            mapper,
        }
    }

    /// The table this builder is bound to.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    // ==================== Mutators ====================

    /// Make `delete()` a logical delete and filter logically-deleted rows
    /// out of reads.
    pub fn logic(&mut self) -> &mut Self {
        self.use_logic = true;
        self
    }

    /// Keep blank values in write operations instead of dropping them.
    pub fn with_blank(&mut self) -> &mut Self {
        self.with_blank = true;
        self
    }

    /// Set the primary column name.
    pub fn primary(&mut self, name: &str) -> &mut Self {
        self.primary = Some((self.mapper)(name));
        self
    }

    /// Set the primary column name and a default value for inserts.
    pub fn primary_value(&mut self, name: &str, default: impl Into<Value>) -> &mut Self {
        self.primary = Some((self.mapper)(name));
        self.default_primary = Some(PrimaryDefault::Literal(default.into()));
        self
    }

    /// Set the primary column name and a default-value producer for inserts.
    pub fn primary_with<F>(&mut self, name: &str, default: F) -> &mut Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.primary = Some((self.mapper)(name));
        self.default_primary = Some(PrimaryDefault::Generator(Arc::new(default)));
        self
    }

    /// Access the owned predicate accumulator.
    pub fn where_clause(&mut self) -> &mut Where {
        &mut self.where_
    }

    /// Set a column value for insert/update.
    pub fn set(&mut self, key: &str, val: impl Into<Value>) -> &mut Self {
        let key = (self.mapper)(key);
        self.set_physical(key, val.into());
        self
    }

    /// Set multiple column values for insert/update.
    pub fn set_many<I, K, V>(&mut self, pairs: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (key, val) in pairs {
            self.set(key.as_ref(), val);
        }
        self
    }

    /// Add a column to the select list. Blank names are skipped.
    pub fn column(&mut self, name: &str) -> &mut Self {
        if !name.trim().is_empty() {
            let name = (self.mapper)(name);
            self.fields.push(name);
        }
        self
    }

    /// Add several columns to the select list.
    pub fn columns<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.column(name.as_ref());
        }
        self
    }

    /// Exclude a column from both writes and reads.
    pub fn exclude(&mut self, name: &str) -> &mut Self {
        self.excludes.insert((self.mapper)(name));
        self
    }

    /// Exclude several columns from both writes and reads.
    pub fn excludes<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.exclude(name.as_ref());
        }
        self
    }

    /// Append `column asc` to the ordering.
    pub fn order_by(&mut self, col: &str) -> &mut Self {
        self.order_by_with(col, SortOrder::Asc)
    }

    /// Append `column desc` to the ordering.
    pub fn order_by_desc(&mut self, col: &str) -> &mut Self {
        self.order_by_with(col, SortOrder::Desc)
    }

    /// Append `column <direction>` to the ordering.
    pub fn order_by_with(&mut self, col: &str, order: SortOrder) -> &mut Self {
        let col = (self.mapper)(col);
        self.orders.push(format!("{} {}", col, order.as_sql()));
        self
    }

    /// Append grouping columns.
    pub fn group_by<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for col in cols {
            let col = (self.mapper)(col.as_ref());
            self.groups.push(col);
        }
        self
    }

    // ==================== Internal state helpers ====================

    fn set_physical(&mut self, key: String, val: Value) {
        match self.columns.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = val,
            None => self.columns.push((key, val)),
        }
    }

    fn remove_column(&mut self, key: &str) -> Option<Value> {
        let idx = self.columns.iter().position(|(k, _)| k == key)?;
        Some(self.columns.remove(idx).1)
    }

    fn column_value(&self, key: &str) -> Option<&Value> {
        self.columns.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn merge(&mut self, data: Option<RowMap>) {
        if let Some(data) = data {
            for (key, val) in data {
                let key = (self.mapper)(&key);
                self.set_physical(key, val);
            }
        }
    }

    /// The write-set: excluded columns dropped always, blank values dropped
    /// unless `with_blank`.
    fn filter_not_blanks(&self, with_blank: bool) -> Vec<(String, Value)> {
        self.columns
            .iter()
            .filter(|(key, _)| !self.excludes.contains(key))
            .filter(|(_, val)| with_blank || !value::is_blank(val))
            .cloned()
            .collect()
    }

    // ==================== Statement rendering ====================

    /// Render the WHERE clause for read paths, appending the logical-delete
    /// negative condition when enabled.
    ///
    /// Works on a clone of the owned predicate so rendering never mutates
    /// accumulated state; re-rendering the same state yields identical SQL.
    fn build_where(&self) -> (String, Vec<Value>) {
        let mut w = self.where_.clone();
        if self.use_logic {
            if let Some(col) = &self.logic_delete_column {
                w.and().ne_physical(col, self.logic_delete_value.clone());
            }
        }
        (w.sql(), w.params())
    }

    fn build_select(&self) -> BoundStatement {
        let fields: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| !self.excludes.contains(*f))
            .map(String::as_str)
            .collect();
        let mut sql = String::from("SELECT ");
        if fields.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&fields.join(","));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.table_name);
        let (where_sql, params) = self.build_where();
        sql.push_str(&where_sql);
        if !self.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.orders.join(","));
        }
        if !self.groups.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.groups.join(","));
        }
        BoundStatement::new(sql, params).with_excludes(self.excludes.clone())
    }

    // ==================== Terminal operations ====================

    /// Insert the accumulated column values; returns the primary value.
    pub async fn insert(&mut self) -> TableResult<Value> {
        self.do_insert(None).await
    }

    /// Merge `data` into the payload, then insert.
    pub async fn insert_with(&mut self, data: RowMap) -> TableResult<Value> {
        self.do_insert(Some(data)).await
    }

    async fn do_insert(&mut self, data: Option<RowMap>) -> TableResult<Value> {
        self.merge(data);
        if let (Some(primary), Some(default)) = (self.primary.clone(), self.default_primary.clone())
        {
            let current_blank = self
                .column_value(&primary)
                .map(value::is_blank)
                .unwrap_or(true);
            if current_blank {
                self.set_physical(primary, default.resolve());
            }
        }
        let entries = self.filter_not_blanks(self.with_blank);
        if entries.is_empty() {
            return Err(TableError::operation("parameters cannot be empty"));
        }
        let cols: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        let placeholders = vec!["?"; entries.len()].join(",");
        let sql = format!(
            "INSERT INTO {}({}) VALUES ({})",
            self.table_name,
            cols.join(","),
            placeholders
        );
        let params: Vec<Value> = entries.into_iter().map(|(_, v)| v).collect();
        let stmt = BoundStatement::new(sql, params);
        self.executor.insert(&stmt, self.primary.as_deref()).await
    }

    /// Delete matching rows; a logical delete runs the update path instead.
    ///
    /// A physical delete without any predicate is always rejected.
    pub async fn delete(&mut self) -> TableResult<u64> {
        if self.use_logic {
            let col = self.logic_delete_column.clone().ok_or_else(|| {
                TableError::operation("logical delete column is not configured")
            })?;
            let val = self.logic_delete_value.clone();
            self.set_physical(col, val);
            return self.do_update(None, self.with_blank).await;
        }
        if self.where_.is_empty() {
            return Err(TableError::operation("delete requires a condition"));
        }
        let sql = format!("DELETE FROM {}{}", self.table_name, self.where_.sql());
        let stmt = BoundStatement::new(sql, self.where_.params());
        self.executor.update(&stmt).await
    }

    /// Update matching rows with the accumulated column values.
    pub async fn update(&mut self) -> TableResult<u64> {
        self.do_update(None, self.with_blank).await
    }

    /// Merge `data` into the payload, then update.
    pub async fn update_with(&mut self, data: RowMap) -> TableResult<u64> {
        self.do_update(Some(data), self.with_blank).await
    }

    /// Update with an explicit blank-value policy for this call only.
    pub async fn update_with_opts(
        &mut self,
        data: Option<RowMap>,
        update_blank: bool,
    ) -> TableResult<u64> {
        self.do_update(data, update_blank).await
    }

    async fn do_update(&mut self, data: Option<RowMap>, update_blank: bool) -> TableResult<u64> {
        self.merge(data);
        // The primary moves out of the SET payload and into the WHERE clause.
        let primary_name = self.primary.clone();
        let primary_value = match primary_name.as_deref() {
            Some(primary) => self.remove_column(primary).filter(|v| !v.is_null()),
            None => None,
        };
        let entries = self.filter_not_blanks(update_blank);
        if entries.is_empty() {
            return Err(TableError::operation("columns to update cannot be empty"));
        }
        let assignments: Vec<String> = entries.iter().map(|(k, _)| format!("{} = ?", k)).collect();
        let mut sql = format!("UPDATE {} SET {}", self.table_name, assignments.join(","));
        let mut params: Vec<Value> = entries.into_iter().map(|(_, v)| v).collect();
        if !self.where_.is_empty() {
            sql.push_str(&self.where_.sql());
            params.extend(self.where_.params());
        } else if let Some(primary_value) = primary_value {
            let primary = primary_name.as_deref().unwrap_or_default();
            sql.push_str(&format!(" WHERE {} = ?", primary));
            params.push(primary_value);
        } else {
            return Err(TableError::operation("primary value cannot be empty"));
        }
        let stmt = BoundStatement::new(sql, params);
        self.executor.update(&stmt).await
    }

    /// Insert or update depending on the presence of a primary value.
    pub async fn save(&mut self) -> TableResult<SaveOutcome> {
        self.do_save(None, false).await
    }

    /// Merge `data`, then insert or update depending on the primary value.
    pub async fn save_with(&mut self, data: RowMap) -> TableResult<SaveOutcome> {
        self.do_save(Some(data), false).await
    }

    /// Save with an optional existence pre-check.
    ///
    /// With `before_query`, a present primary value triggers a
    /// `SELECT COUNT(*)` probe and the row's actual existence decides the
    /// path. Without it, the mere presence of a primary value is trusted to
    /// mean the row exists.
    pub async fn save_opts(
        &mut self,
        data: Option<RowMap>,
        before_query: bool,
    ) -> TableResult<SaveOutcome> {
        self.do_save(data, before_query).await
    }

    async fn do_save(
        &mut self,
        data: Option<RowMap>,
        before_query: bool,
    ) -> TableResult<SaveOutcome> {
        let primary = self
            .primary
            .clone()
            .ok_or_else(|| TableError::operation("primary key must be set"))?;
        self.merge(data);
        let primary_value = self.column_value(&primary).cloned();
        let has_primary = primary_value
            .as_ref()
            .map(|v| !value::is_blank(v))
            .unwrap_or(false);

        if before_query && has_primary {
            let probe = BoundStatement::new(
                format!(
                    "SELECT COUNT(*) FROM {} WHERE {} = ?",
                    self.table_name, primary
                ),
                vec![primary_value.unwrap_or(Value::Null)],
            );
            let count = self.executor.select_int(&probe).await?;
            if count == 0 {
                return Ok(SaveOutcome::Inserted(self.do_insert(None).await?));
            }
            return Ok(SaveOutcome::Updated(
                self.do_update(None, self.with_blank).await?,
            ));
        }

        if has_primary {
            return Ok(SaveOutcome::Updated(
                self.do_update(None, self.with_blank).await?,
            ));
        }
        Ok(SaveOutcome::Inserted(self.do_insert(None).await?))
    }

    /// Run the accumulated select and return all rows.
    pub async fn select(&self) -> TableResult<Vec<RowMap>> {
        self.executor.select(&self.build_select()).await
    }

    /// Run the accumulated select and return the first row, if any.
    pub async fn select_one(&self) -> TableResult<Option<RowMap>> {
        self.executor.select_one(&self.build_select()).await
    }

    /// Run the accumulated select as a paged query with the executor's
    /// ambient pagination window.
    pub async fn page(&self) -> TableResult<PageResult> {
        self.executor.page(&self.build_select(), None).await
    }

    /// Run the accumulated select as a paged query with an explicit window.
    pub async fn page_with(&self, limit: i64, offset: i64) -> TableResult<PageResult> {
        self.executor
            .page(&self.build_select(), Some(Page::new(limit, offset)))
            .await
    }

    /// Count matching rows.
    pub async fn count(&self) -> TableResult<i64> {
        let (where_sql, params) = self.build_where();
        let sql = format!("SELECT COUNT(1) FROM {}{}", self.table_name, where_sql);
        self.executor
            .select_int(&BoundStatement::new(sql, params))
            .await
    }

    /// Whether any row matches.
    pub async fn exists(&self) -> TableResult<bool> {
        Ok(self.count().await? > 0)
    }
}
