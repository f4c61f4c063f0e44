//! Pagination descriptor and paged result set.

use crate::executor::RowMap;
use serde::Serialize;

/// Explicit pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
        }
    }
}

/// A page of rows plus the unpaged total.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageResult {
    pub total: i64,
    pub list: Vec<RowMap>,
}

impl PageResult {
    pub fn new(total: i64, list: Vec<RowMap>) -> Self {
        Self { total, list }
    }
}
