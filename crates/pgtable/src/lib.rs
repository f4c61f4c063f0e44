//! # pgtable
//!
//! A fluent, single-table SQL statement builder and executor for PostgreSQL.
//!
//! ## Features
//!
//! - **Fluent accumulation**: chain column values, select fields, predicates,
//!   orderings and policy flags, then finish with one terminal call
//! - **Safe defaults**: every value is a bound parameter; DELETE without a
//!   condition is rejected; UPDATE must be conditioned by a predicate or a
//!   primary value
//! - **Logical deletion**: `logic()` turns deletes into updates and filters
//!   logically-deleted rows out of reads
//! - **Name translation**: logical field names map to physical columns
//!   exactly once, via an injected [`ColumnMapper`]
//! - **Pluggable execution**: terminal calls go through the [`SqlExecutor`]
//!   trait; [`PgExecutor`] runs on `tokio-postgres`
//!
//! ## Example
//!
//! ```ignore
//! use pgtable::{PgExecutor, snake_case_mapper};
//!
//! let executor = PgExecutor::new(client)
//!     .with_logic_delete("deleted", "1")
//!     .with_mapper(snake_case_mapper());
//!
//! // INSERT INTO user(user_name,id) VALUES (?,?)
//! let id = executor
//!     .table("user")
//!     .primary_with("id", || json!(uuid::Uuid::new_v4().to_string()))
//!     .set("userName", "alice")
//!     .insert()
//!     .await?;
//!
//! // SELECT * FROM user WHERE user_name LIKE ? AND deleted <> ?
//! let mut query = executor.table("user");
//! query.logic().where_clause().like("userName", "a%");
//! let rows = query.select().await?;
//! ```

pub mod error;
pub mod executor;
pub mod mapper;
pub mod page;
pub mod statement;
pub mod table;
pub mod value;
pub mod where_clause;

pub use error::{TableError, TableResult};
pub use executor::{PgExecutor, RowMap, SqlExecutor};
pub use mapper::{ColumnMapper, identity_mapper, snake_case_mapper};
pub use page::{Page, PageResult};
pub use statement::BoundStatement;
pub use table::{NamedTable, PrimaryDefault, SaveOutcome, SortOrder};
pub use where_clause::Where;
