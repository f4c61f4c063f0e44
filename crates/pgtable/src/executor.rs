//! Statement execution gateway.
//!
//! [`SqlExecutor`] is the seam between rendered statements and the database:
//! the builder hands over a [`BoundStatement`] and the executor decides how
//! to run it. [`PgExecutor`] is the stock implementation over
//! `tokio-postgres`; tests substitute recording mocks.

use crate::error::{TableError, TableResult};
use crate::mapper::{ColumnMapper, identity_mapper};
use crate::page::{Page, PageResult};
use crate::statement::BoundStatement;
use crate::table::NamedTable;
use crate::value;
use serde_json::Value;
use tokio_postgres::Row;
use tokio_postgres::types::{ToSql, Type};

/// A result row materialized as an ordered name/value mapping.
pub type RowMap = serde_json::Map<String, Value>;

/// Executes bound statements against a SQL backend.
///
/// Also exposes the ambient configuration a [`NamedTable`] copies at
/// construction time: the logical-delete column/value and the default
/// pagination window.
pub trait SqlExecutor: Send + Sync {
    /// Run an insert and return the value of `primary` for the new row
    /// (`Value::Null` when no primary column is requested).
    fn insert(
        &self,
        stmt: &BoundStatement,
        primary: Option<&str>,
    ) -> impl std::future::Future<Output = TableResult<Value>> + Send;

    /// Run an update or delete and return the affected row count.
    fn update(
        &self,
        stmt: &BoundStatement,
    ) -> impl std::future::Future<Output = TableResult<u64>> + Send;

    /// Run a query and return all rows.
    fn select(
        &self,
        stmt: &BoundStatement,
    ) -> impl std::future::Future<Output = TableResult<Vec<RowMap>>> + Send;

    /// Run a query and return the first row, if any.
    fn select_one(
        &self,
        stmt: &BoundStatement,
    ) -> impl std::future::Future<Output = TableResult<Option<RowMap>>> + Send {
        async move {
            let rows = self.select(stmt).await?;
            Ok(rows.into_iter().next())
        }
    }

    /// Run a query and return a single integer scalar.
    fn select_int(
        &self,
        stmt: &BoundStatement,
    ) -> impl std::future::Future<Output = TableResult<i64>> + Send;

    /// Run a paged query. `page = None` uses the ambient window.
    fn page(
        &self,
        stmt: &BoundStatement,
        page: Option<Page>,
    ) -> impl std::future::Future<Output = TableResult<PageResult>> + Send;

    /// Logical-delete column name, if configured.
    fn logic_delete_column(&self) -> Option<&str> {
        None
    }

    /// Logical-delete value in its raw textual configuration form.
    fn logic_delete_value(&self) -> Option<&str> {
        None
    }

    /// Ambient pagination window used by `page(stmt, None)`.
    fn default_page(&self) -> Page {
        Page::default()
    }
}

/// Rewrite `?` placeholders to `$1..$n`, skipping single-quoted literals.
pub(crate) fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    let mut in_quote = false;
    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                out.push(ch);
            }
            '?' if !in_quote => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
            }
            _ => out.push(ch),
        }
    }
    out
}

/// `tokio-postgres` backed executor.
pub struct PgExecutor {
    client: tokio_postgres::Client,
    logic_delete_column: Option<String>,
    logic_delete_value: Option<String>,
    default_page: Page,
    mapper: ColumnMapper,
}

impl PgExecutor {
    pub fn new(client: tokio_postgres::Client) -> Self {
        Self {
            client,
            logic_delete_column: None,
            logic_delete_value: None,
            default_page: Page::default(),
            mapper: identity_mapper(),
        }
    }

    /// Configure logical deletion (column plus its textual marker value).
    pub fn with_logic_delete(
        mut self,
        column: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.logic_delete_column = Some(column.into());
        self.logic_delete_value = Some(value.into());
        self
    }

    /// Configure the ambient page size for `page(stmt, None)`.
    pub fn with_page_size(mut self, limit: i64) -> Self {
        self.default_page = Page::new(limit, 0);
        self
    }

    /// Configure the column mapper handed to tables created via [`PgExecutor::table`].
    pub fn with_mapper(mut self, mapper: ColumnMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Start a fluent single-table operation chain.
    pub fn table(&self, name: impl Into<String>) -> NamedTable<'_, Self> {
        NamedTable::new(name, self, self.mapper.clone())
    }

    async fn run_query(&self, stmt: &BoundStatement) -> TableResult<Vec<Row>> {
        let sql = numbered_placeholders(stmt.sql());
        let owned: Vec<Box<dyn ToSql + Sync + Send>> =
            stmt.params().iter().map(value::bind_param).collect();
        let params: Vec<&(dyn ToSql + Sync)> =
            owned.iter().map(|p| &**p as &(dyn ToSql + Sync)).collect();
        tracing::debug!(sql = %sql, params = stmt.params().len(), "executing statement");
        self.client
            .query(&sql, &params)
            .await
            .map_err(TableError::from_db_error)
    }

    async fn run_execute(&self, stmt: &BoundStatement) -> TableResult<u64> {
        let sql = numbered_placeholders(stmt.sql());
        let owned: Vec<Box<dyn ToSql + Sync + Send>> =
            stmt.params().iter().map(value::bind_param).collect();
        let params: Vec<&(dyn ToSql + Sync)> =
            owned.iter().map(|p| &**p as &(dyn ToSql + Sync)).collect();
        tracing::debug!(sql = %sql, params = stmt.params().len(), "executing statement");
        self.client
            .execute(&sql, &params)
            .await
            .map_err(TableError::from_db_error)
    }
}

impl SqlExecutor for PgExecutor {
    async fn insert(&self, stmt: &BoundStatement, primary: Option<&str>) -> TableResult<Value> {
        match primary {
            Some(primary) => {
                let returning =
                    BoundStatement::new(format!("{} RETURNING {}", stmt.sql(), primary), stmt.params().to_vec());
                let rows = self.run_query(&returning).await?;
                match rows.first() {
                    Some(row) => row_value(row, 0),
                    None => Ok(Value::Null),
                }
            }
            None => {
                self.run_execute(stmt).await?;
                Ok(Value::Null)
            }
        }
    }

    async fn update(&self, stmt: &BoundStatement) -> TableResult<u64> {
        self.run_execute(stmt).await
    }

    async fn select(&self, stmt: &BoundStatement) -> TableResult<Vec<RowMap>> {
        let rows = self.run_query(stmt).await?;
        rows.iter()
            .map(|row| row_to_map(row, stmt.exclude_columns()))
            .collect()
    }

    async fn select_int(&self, stmt: &BoundStatement) -> TableResult<i64> {
        let rows = self.run_query(stmt).await?;
        let row = rows
            .first()
            .ok_or_else(|| TableError::Other("scalar query returned no rows".to_string()))?;
        row.try_get::<_, i64>(0)
            .map_err(|e| TableError::decode(row.columns()[0].name(), e.to_string()))
    }

    async fn page(&self, stmt: &BoundStatement, page: Option<Page>) -> TableResult<PageResult> {
        let page = page.unwrap_or_else(|| self.default_page());
        let count =
            BoundStatement::new(format!("SELECT COUNT(1) FROM ({}) t", stmt.sql()), stmt.params().to_vec());
        let total = self.select_int(&count).await?;
        let data = BoundStatement::new(
            format!("{} LIMIT {} OFFSET {}", stmt.sql(), page.limit, page.offset),
            stmt.params().to_vec(),
        )
        .with_excludes(stmt.exclude_columns().clone());
        let list = self.select(&data).await?;
        Ok(PageResult::new(total, list))
    }

    fn logic_delete_column(&self) -> Option<&str> {
        self.logic_delete_column.as_deref()
    }

    fn logic_delete_value(&self) -> Option<&str> {
        self.logic_delete_value.as_deref()
    }

    fn default_page(&self) -> Page {
        self.default_page
    }
}

/// Materialize one row into a [`RowMap`], dropping excluded columns.
pub fn row_to_map(
    row: &Row,
    excludes: &std::collections::HashSet<String>,
) -> TableResult<RowMap> {
    let mut map = RowMap::new();
    for (idx, col) in row.columns().iter().enumerate() {
        if excludes.contains(col.name()) {
            continue;
        }
        map.insert(col.name().to_string(), row_value(row, idx)?);
    }
    Ok(map)
}

fn row_value(row: &Row, idx: usize) -> TableResult<Value> {
    let col = &row.columns()[idx];
    let ty = col.type_();
    let decode = |e: tokio_postgres::Error| TableError::decode(col.name(), e.to_string());

    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)
            .map_err(decode)?
            .map(Value::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)
            .map_err(decode)?
            .map(Value::from)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)
            .map_err(decode)?
            .map(Value::from)
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)
            .map_err(decode)?
            .map(Value::from)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .map_err(decode)?
            .and_then(|f| serde_json::Number::from_f64(f as f64).map(Value::Number))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)
            .map_err(decode)?
            .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        row.try_get::<_, Option<String>>(idx)
            .map_err(decode)?
            .map(Value::String)
    } else if *ty == Type::UUID {
        row.try_get::<_, Option<uuid::Uuid>>(idx)
            .map_err(decode)?
            .map(|u| Value::String(u.to_string()))
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .map_err(decode)?
            .map(|t| Value::String(t.to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map_err(decode)?
            .map(|t| Value::String(t.to_rfc3339()))
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<chrono::NaiveDate>>(idx)
            .map_err(decode)?
            .map(|d| Value::String(d.to_string()))
    } else if *ty == Type::TIME {
        row.try_get::<_, Option<chrono::NaiveTime>>(idx)
            .map_err(decode)?
            .map(|t| Value::String(t.to_string()))
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<Value>>(idx).map_err(decode)?
    } else {
        tracing::warn!(column = col.name(), pg_type = %ty, "unsupported column type, mapped to null");
        None
    };

    Ok(value.unwrap_or(Value::Null))
}
