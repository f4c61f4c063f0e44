use super::*;
use crate::error::TableError;
use crate::mapper::{identity_mapper, snake_case_mapper};
use serde_json::json;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
struct RecordedCall {
    op: &'static str,
    sql: String,
    params: Vec<Value>,
    primary: Option<String>,
    page: Option<Page>,
}

/// Records every statement instead of executing it.
#[derive(Default)]
struct MockExecutor {
    calls: Mutex<Vec<RecordedCall>>,
    count: i64,
    logic: Option<(String, String)>,
}

impl MockExecutor {
    fn new() -> Self {
        Self::default()
    }

    fn with_logic(mut self, column: &str, value: &str) -> Self {
        self.logic = Some((column.to_string(), value.to_string()));
        self
    }

    fn with_count(mut self, count: i64) -> Self {
        self.count = count;
        self
    }

    fn record(
        &self,
        op: &'static str,
        stmt: &BoundStatement,
        primary: Option<String>,
        page: Option<Page>,
    ) {
        self.calls.lock().unwrap().push(RecordedCall {
            op,
            sql: stmt.sql().to_string(),
            params: stmt.params().to_vec(),
            primary,
            page,
        });
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn last(&self) -> RecordedCall {
        self.calls().last().expect("no statement recorded").clone()
    }
}

impl SqlExecutor for MockExecutor {
    async fn insert(&self, stmt: &BoundStatement, primary: Option<&str>) -> TableResult<Value> {
        self.record("insert", stmt, primary.map(str::to_string), None);
        Ok(json!(100))
    }

    async fn update(&self, stmt: &BoundStatement) -> TableResult<u64> {
        self.record("update", stmt, None, None);
        Ok(1)
    }

    async fn select(&self, stmt: &BoundStatement) -> TableResult<Vec<RowMap>> {
        self.record("select", stmt, None, None);
        Ok(Vec::new())
    }

    async fn select_int(&self, stmt: &BoundStatement) -> TableResult<i64> {
        self.record("select_int", stmt, None, None);
        Ok(self.count)
    }

    async fn page(&self, stmt: &BoundStatement, page: Option<Page>) -> TableResult<PageResult> {
        self.record("page", stmt, None, page);
        Ok(PageResult::default())
    }

    fn logic_delete_column(&self) -> Option<&str> {
        self.logic.as_ref().map(|(c, _)| c.as_str())
    }

    fn logic_delete_value(&self) -> Option<&str> {
        self.logic.as_ref().map(|(_, v)| v.as_str())
    }
}

fn table<'a>(exec: &'a MockExecutor) -> NamedTable<'a, MockExecutor> {
    NamedTable::new("user", exec, identity_mapper())
}

fn assert_operation_err<T: std::fmt::Debug>(result: TableResult<T>, message: &str) {
    match result {
        Err(TableError::Operation(msg)) => assert_eq!(msg, message),
        other => panic!("expected operation error, got {:?}", other),
    }
}

// ==================== Insert ====================

#[tokio::test]
async fn test_insert_with_default_primary() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.primary_value("id", 1).set("name", "Tom");
    let key = t.insert().await.unwrap();
    assert_eq!(key, json!(100));

    let call = exec.last();
    assert_eq!(call.op, "insert");
    assert_eq!(call.sql, "INSERT INTO user(name,id) VALUES (?,?)");
    assert_eq!(call.params, vec![json!("Tom"), json!(1)]);
    assert_eq!(call.primary.as_deref(), Some("id"));
}

#[tokio::test]
async fn test_insert_default_primary_generator() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.primary_with("id", || json!(42)).set("name", "Tom");
    t.insert().await.unwrap();
    let call = exec.last();
    assert_eq!(call.sql, "INSERT INTO user(name,id) VALUES (?,?)");
    assert_eq!(call.params, vec![json!("Tom"), json!(42)]);
}

#[tokio::test]
async fn test_insert_explicit_primary_wins_over_default() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.primary_value("id", 99).set("id", 7);
    t.insert().await.unwrap();
    let call = exec.last();
    assert_eq!(call.sql, "INSERT INTO user(id) VALUES (?)");
    assert_eq!(call.params, vec![json!(7)]);
}

#[tokio::test]
async fn test_insert_drops_blank_values() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.set("name", "").set("nick", Value::Null).set("age", 5);
    t.insert().await.unwrap();
    let call = exec.last();
    assert_eq!(call.sql, "INSERT INTO user(age) VALUES (?)");
    assert_eq!(call.params, vec![json!(5)]);
}

#[tokio::test]
async fn test_insert_with_blank_keeps_blank_values() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.with_blank().set("name", "").set("age", 5);
    t.insert().await.unwrap();
    assert_eq!(exec.last().sql, "INSERT INTO user(name,age) VALUES (?,?)");
}

#[tokio::test]
async fn test_insert_excluded_column_dropped() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.exclude("name").set("name", "x").set("age", 5);
    t.insert().await.unwrap();
    let call = exec.last();
    assert_eq!(call.sql, "INSERT INTO user(age) VALUES (?)");
}

#[tokio::test]
async fn test_insert_empty_write_set_fails() {
    let exec = MockExecutor::new();
    assert_operation_err(table(&exec).insert().await, "parameters cannot be empty");

    // all-blank payloads are just as empty
    let mut t = table(&exec);
    t.set("name", "");
    assert_operation_err(t.insert().await, "parameters cannot be empty");
    assert!(exec.calls().is_empty());
}

#[tokio::test]
async fn test_insert_with_payload_and_overwrite() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.set("name", "first");
    let mut data = RowMap::new();
    data.insert("name".to_string(), json!("second"));
    data.insert("age".to_string(), json!(30));
    t.insert_with(data).await.unwrap();
    let call = exec.last();
    assert_eq!(call.sql, "INSERT INTO user(name,age) VALUES (?,?)");
    assert_eq!(call.params, vec![json!("second"), json!(30)]);
}

#[tokio::test]
async fn test_mapper_applied_once_on_every_path() {
    let exec = MockExecutor::new();
    let mut t = NamedTable::new("user", &exec, snake_case_mapper());
    t.set("userName", "Tom")
        .set_many(vec![("firstName", json!("T"))])
        .column("createdAt")
        .order_by("updatedAt");
    t.insert().await.unwrap();
    assert_eq!(
        exec.last().sql,
        "INSERT INTO user(user_name,first_name) VALUES (?,?)"
    );

    let stmt = t.build_select();
    assert_eq!(
        stmt.sql(),
        "SELECT created_at FROM user ORDER BY updated_at asc"
    );
}

// ==================== Delete ====================

#[tokio::test]
async fn test_delete_requires_condition() {
    let exec = MockExecutor::new();
    assert_operation_err(table(&exec).delete().await, "delete requires a condition");
}

#[tokio::test]
async fn test_delete_with_condition() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.where_clause().eq("id", 1);
    let rows = t.delete().await.unwrap();
    assert_eq!(rows, 1);
    let call = exec.last();
    assert_eq!(call.op, "update");
    assert_eq!(call.sql, "DELETE FROM user WHERE id = ?");
    assert_eq!(call.params, vec![json!(1)]);
}

#[tokio::test]
async fn test_logical_delete_becomes_update() {
    let exec = MockExecutor::new().with_logic("deleted", "1");
    let mut t = table(&exec);
    t.logic().where_clause().eq("id", 3);
    t.delete().await.unwrap();
    let call = exec.last();
    assert_eq!(call.op, "update");
    assert_eq!(call.sql, "UPDATE user SET deleted = ? WHERE id = ?");
    assert_eq!(call.params, vec![json!(1), json!(3)]);
}

#[tokio::test]
async fn test_logical_delete_without_config_fails() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.logic().where_clause().eq("id", 3);
    assert_operation_err(
        t.delete().await,
        "logical delete column is not configured",
    );
}

// ==================== Update ====================

#[tokio::test]
async fn test_update_primary_moves_to_where() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.primary("id").set("id", 1).set("name", "Tom");
    let rows = t.update().await.unwrap();
    assert_eq!(rows, 1);
    let call = exec.last();
    assert_eq!(call.sql, "UPDATE user SET name = ? WHERE id = ?");
    assert_eq!(call.params, vec![json!("Tom"), json!(1)]);
}

#[tokio::test]
async fn test_update_predicate_wins_over_primary() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.primary("id").set("id", 1).set("name", "Tom");
    t.where_clause().eq("age", 5);
    t.update().await.unwrap();
    let call = exec.last();
    assert_eq!(call.sql, "UPDATE user SET name = ? WHERE age = ?");
    assert_eq!(call.params, vec![json!("Tom"), json!(5)]);
}

#[tokio::test]
async fn test_update_empty_columns_fails() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.primary("id").set("id", 1);
    assert_operation_err(t.update().await, "columns to update cannot be empty");
}

#[tokio::test]
async fn test_update_without_condition_or_primary_fails() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.set("name", "Tom");
    assert_operation_err(t.update().await, "primary value cannot be empty");
}

#[tokio::test]
async fn test_update_blank_override_is_per_call() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.primary("id").set("id", 1).set("name", "").set("age", 5);
    t.update_with_opts(None, true).await.unwrap();
    assert_eq!(
        exec.last().sql,
        "UPDATE user SET name = ?,age = ? WHERE id = ?"
    );
}

// ==================== Save ====================

#[tokio::test]
async fn test_save_requires_primary_column() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.set("name", "Tom");
    assert_operation_err(t.save().await, "primary key must be set");
}

#[tokio::test]
async fn test_save_updates_when_primary_present() {
    // before_query = false trusts the primary value, even for missing rows
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.primary("id").set("id", 1).set("name", "Tom");
    let outcome = t.save().await.unwrap();
    assert_eq!(outcome, SaveOutcome::Updated(1));
    assert_eq!(exec.last().op, "update");
}

#[tokio::test]
async fn test_save_inserts_when_primary_absent() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.primary("id").set("name", "Tom");
    let outcome = t.save().await.unwrap();
    assert_eq!(outcome, SaveOutcome::Inserted(json!(100)));
    assert_eq!(exec.last().op, "insert");
}

#[tokio::test]
async fn test_save_before_query_inserts_on_zero_count() {
    let exec = MockExecutor::new().with_count(0);
    let mut t = table(&exec);
    t.primary("id").set("id", 1).set("name", "Tom");
    let outcome = t.save_opts(None, true).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Inserted(json!(100)));

    let calls = exec.calls();
    assert_eq!(calls[0].op, "select_int");
    assert_eq!(calls[0].sql, "SELECT COUNT(*) FROM user WHERE id = ?");
    assert_eq!(calls[0].params, vec![json!(1)]);
    assert_eq!(calls[1].op, "insert");
}

#[tokio::test]
async fn test_save_before_query_updates_on_existing_row() {
    let exec = MockExecutor::new().with_count(1);
    let mut t = table(&exec);
    t.primary("id").set("id", 1).set("name", "Tom");
    let outcome = t.save_opts(None, true).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Updated(1));
    assert_eq!(exec.last().op, "update");
}

#[tokio::test]
async fn test_save_reads_primary_from_payload() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.primary("id");
    let mut data = RowMap::new();
    data.insert("id".to_string(), json!(9));
    data.insert("name".to_string(), json!("Tom"));
    let outcome = t.save_with(data).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Updated(1));
    assert_eq!(
        exec.last().sql,
        "UPDATE user SET name = ? WHERE id = ?"
    );
}

// ==================== Select / count / page ====================

#[tokio::test]
async fn test_select_defaults_to_star() {
    let exec = MockExecutor::new();
    let t = table(&exec);
    t.select().await.unwrap();
    assert_eq!(exec.last().sql, "SELECT * FROM user");
}

#[tokio::test]
async fn test_select_fields_orders_groups() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.columns(["a", "b", "c"])
        .exclude("b")
        .order_by("a")
        .order_by_desc("b")
        .group_by(["c"]);
    t.where_clause().gt("age", 18);
    let stmt = t.build_select();
    assert_eq!(
        stmt.sql(),
        "SELECT a,c FROM user WHERE age > ? ORDER BY a asc,b desc GROUP BY c"
    );
    assert!(stmt.exclude_columns().contains("b"));
}

#[tokio::test]
async fn test_select_skips_blank_column_names() {
    let exec = MockExecutor::new();
    let mut t = table(&exec);
    t.column("a").column("").column("  ").column("b");
    assert_eq!(t.build_select().sql(), "SELECT a,b FROM user");
}

#[tokio::test]
async fn test_logic_filter_appended_to_existing_predicate() {
    let exec = MockExecutor::new().with_logic("deleted", "1");
    let mut t = table(&exec);
    t.logic().where_clause().eq("name", "Tom");
    t.select().await.unwrap();
    let call = exec.last();
    assert_eq!(call.sql, "SELECT * FROM user WHERE name = ? AND deleted <> ?");
    assert_eq!(call.params, vec![json!("Tom"), json!(1)]);
}

#[tokio::test]
async fn test_logic_filter_alone_when_predicate_empty() {
    let exec = MockExecutor::new().with_logic("deleted", "1");
    let mut t = table(&exec);
    t.logic();
    t.select().await.unwrap();
    assert_eq!(exec.last().sql, "SELECT * FROM user WHERE deleted <> ?");

    t.count().await.unwrap();
    let call = exec.last();
    assert_eq!(call.sql, "SELECT COUNT(1) FROM user WHERE deleted <> ?");
    assert_eq!(call.params, vec![json!(1)]);
}

#[tokio::test]
async fn test_logic_value_coercion_quoted_string() {
    let exec = MockExecutor::new().with_logic("state", "'gone'");
    let mut t = table(&exec);
    t.logic();
    t.count().await.unwrap();
    assert_eq!(exec.last().params, vec![json!("gone")]);
}

#[tokio::test]
async fn test_count_without_conditions() {
    let exec = MockExecutor::new().with_count(3);
    let t = table(&exec);
    assert_eq!(t.count().await.unwrap(), 3);
    assert_eq!(exec.last().sql, "SELECT COUNT(1) FROM user");
    assert!(t.exists().await.unwrap());

    let none = MockExecutor::new().with_count(0);
    assert!(!table(&none).exists().await.unwrap());
}

#[tokio::test]
async fn test_render_is_repeatable() {
    let exec = MockExecutor::new().with_logic("deleted", "1");
    let mut t = table(&exec);
    t.logic().columns(["a", "b"]).order_by("a");
    t.where_clause().eq("name", "Tom").gt("age", 18);
    let first = t.build_select();
    let second = t.build_select();
    assert_eq!(first.sql(), second.sql());
    assert_eq!(first.params(), second.params());
}

#[tokio::test]
async fn test_page_windows() {
    let exec = MockExecutor::new();
    let t = table(&exec);
    t.page().await.unwrap();
    assert_eq!(exec.last().page, None);

    t.page_with(2, 4).await.unwrap();
    assert_eq!(exec.last().page, Some(Page::new(2, 4)));
}

// ==================== Clone semantics ====================

#[tokio::test]
async fn test_clone_has_independent_predicate() {
    let exec = MockExecutor::new();
    let mut original = table(&exec);
    original.set("name", "Tom");
    let mut copy = original.clone();
    copy.where_clause().eq("id", 1);
    copy.set("age", 5);

    assert_eq!(original.build_select().sql(), "SELECT * FROM user");
    assert_eq!(copy.build_select().sql(), "SELECT * FROM user WHERE id = ?");

    original.insert().await.unwrap();
    assert_eq!(exec.last().sql, "INSERT INTO user(name) VALUES (?)");
}
