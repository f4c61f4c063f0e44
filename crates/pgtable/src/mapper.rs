//! Logical-to-physical column name translation.

use heck::ToSnakeCase;
use std::sync::Arc;

/// Maps a logical field name to a physical column name.
///
/// Applied exactly once, at the point a name enters a builder; everything
/// stored inside [`NamedTable`](crate::NamedTable) and
/// [`Where`](crate::Where) is already physical.
pub type ColumnMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Mapper that passes names through unchanged.
pub fn identity_mapper() -> ColumnMapper {
    Arc::new(|name: &str| name.to_string())
}

/// Mapper that converts camelCase field names to snake_case columns.
pub fn snake_case_mapper() -> ColumnMapper {
    Arc::new(|name: &str| name.to_snake_case())
}
