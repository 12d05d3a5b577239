//! Planned schema changes against a scripted database.

mod common;

use common::replay::TableShape;
use common::{
    count, foreign_key_row, init_tracing, runner, MockDatabase, COLUMNS, HAS_TABLE, REFERENCING,
    TABLES,
};
use oxide_ddl::{
    ChangeBatch, Check, Column, DefaultNamingStrategy, ForeignKey, GenerationStrategy,
    HanaDialect, Index, IsolationLevel, NamingStrategy, SqlValue, Table, Unique, View,
};
use oxide_sync::{CreateTableOptions, DropTableOptions, Row, SyncError};

fn accounts() -> Table {
    Table::new("t")
        .column(Column::new("id", "integer").primary())
        .column(Column::new("tenant", "integer").primary())
}

fn referenced() -> Table {
    Table::new("t").column(Column::new("id", "integer").primary())
}

/// `t(id, parent_id)` whose parent points back at `t(id)`.
fn tree() -> Table {
    referenced()
        .column(Column::new("parent_id", "integer"))
        .foreign_key(ForeignKey::new(["parent_id"], "t", ["id"]))
}

// =============================================================================
// Columns
// =============================================================================

#[tokio::test]
async fn test_add_unique_column_creates_backing_index() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    let batch = runner
        .add_column(referenced(), Column::new("email", "varchar").unique())
        .await
        .unwrap();

    assert_eq!(
        batch.up_sql(),
        vec![
            "ALTER TABLE \"t\" ADD (\"email\" varchar(255))",
            "CREATE UNIQUE INDEX \"idx_t_email\" ON \"t\" (\"email\")",
        ]
    );
    assert_eq!(
        batch.down_sql(),
        vec![
            "DROP INDEX \"idx_t_email\"",
            "ALTER TABLE \"t\" DROP (\"email\")",
        ]
    );
    assert_eq!(db.ddl(), batch.up_sql());

    let cached = runner.cached_table("t").unwrap();
    assert!(cached.has_column("email"));
    assert!(cached.find_index("idx_t_email").is_some_and(|i| i.unique));
    assert!(cached.find_unique("idx_t_email").is_some());
}

#[tokio::test]
async fn test_add_column_with_comment_has_no_reverse_comment() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    let batch = runner
        .add_column(
            referenced(),
            Column::new("note", "nvarchar").length(80).comment("free text"),
        )
        .await
        .unwrap();

    assert_eq!(
        batch.up_sql(),
        vec![
            "ALTER TABLE \"t\" ADD (\"note\" nvarchar(80))",
            "COMMENT ON COLUMN \"t\".\"note\" IS 'free text'",
        ]
    );
    assert_eq!(batch.down_sql(), vec!["ALTER TABLE \"t\" DROP (\"note\")"]);
}

#[tokio::test]
async fn test_add_existing_column_fails() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    let error = runner
        .add_column(referenced(), Column::new("id", "integer"))
        .await
        .unwrap_err();
    assert!(matches!(error, SyncError::ColumnExists { .. }));
    assert!(db.log().is_empty());
}

#[tokio::test]
async fn test_identity_column_with_default_is_rejected() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    let column = Column::new("seq", "integer")
        .generated(GenerationStrategy::Increment)
        .default_value("1");
    let error = runner.add_column(referenced(), column).await.unwrap_err();
    assert!(matches!(error, SyncError::InvalidColumn { .. }));
    assert!(db.log().is_empty());
}

#[tokio::test]
async fn test_drop_primary_column_restores_referencing_keys() {
    let db = MockDatabase::new();
    db.rows(
        REFERENCING,
        vec![foreign_key_row("u", "fk_u_t_id_t", "t_id", "t", "id")],
    );
    let mut runner = runner(&db);

    let batch = runner.drop_column(accounts(), "tenant").await.unwrap();

    let expected = vec![
        "ALTER TABLE \"u\" DROP CONSTRAINT \"fk_u_t_id_t\"",
        "ALTER TABLE \"t\" DROP CONSTRAINT \"pk_t_id_tenant\"",
        "ALTER TABLE \"t\" DROP (\"tenant\")",
        "ALTER TABLE \"t\" ADD CONSTRAINT \"pk_t_id\" PRIMARY KEY (\"id\")",
        "ALTER TABLE \"u\" ADD CONSTRAINT \"fk_u_t_id_t\" FOREIGN KEY (\"t_id\") \
         REFERENCES \"t\" (\"id\") ON DELETE RESTRICT ON UPDATE RESTRICT",
    ];
    assert_eq!(db.ddl(), expected);
    assert_eq!(batch.up_sql(), expected);
    assert_eq!(
        batch.down_sql(),
        vec![
            "ALTER TABLE \"u\" DROP CONSTRAINT \"fk_u_t_id_t\"",
            "ALTER TABLE \"t\" DROP CONSTRAINT \"pk_t_id\"",
            "ALTER TABLE \"t\" ADD (\"tenant\" integer NOT NULL)",
            "ALTER TABLE \"t\" ADD CONSTRAINT \"pk_t_id_tenant\" PRIMARY KEY (\"id\", \"tenant\")",
            "ALTER TABLE \"u\" ADD CONSTRAINT \"fk_u_t_id_t\" FOREIGN KEY (\"t_id\") \
             REFERENCES \"t\" (\"id\") ON DELETE RESTRICT ON UPDATE RESTRICT",
        ]
    );

    let cached = runner.cached_table("t").unwrap();
    assert_eq!(cached.primary_column_names(), vec!["id".to_string()]);
    assert!(!cached.has_column("tenant"));
}

#[tokio::test]
async fn test_drop_referenced_column_leaves_key_dropped() {
    init_tracing();
    let db = MockDatabase::new();
    db.rows(
        REFERENCING,
        vec![foreign_key_row("u", "fk_u_t_id_t", "t_id", "t", "id")],
    );
    let mut runner = runner(&db);

    runner.drop_column(referenced(), "id").await.unwrap();

    assert_eq!(
        db.ddl(),
        vec![
            "ALTER TABLE \"u\" DROP CONSTRAINT \"fk_u_t_id_t\"",
            "ALTER TABLE \"t\" DROP CONSTRAINT \"pk_t_id\"",
            "ALTER TABLE \"t\" DROP (\"id\")",
        ]
    );
}

#[tokio::test]
async fn test_drop_column_drops_dependent_objects() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    let table = referenced()
        .column(Column::new("a", "integer"))
        .index(Index::new(["a"]).named("idx_t_a"))
        .check(Check::new("\"a\" > 0").columns(["a"]).named("chk_a"));

    runner.drop_column(table, "a").await.unwrap();

    assert_eq!(
        db.ddl(),
        vec![
            "DROP INDEX \"idx_t_a\"",
            "ALTER TABLE \"t\" DROP CONSTRAINT \"chk_a\"",
            "ALTER TABLE \"t\" DROP (\"a\")",
        ]
    );
    let cached = runner.cached_table("t").unwrap();
    assert!(cached.indices.is_empty());
    assert!(cached.checks.is_empty());
}

#[tokio::test]
async fn test_drop_column_drops_self_reference_to_it() {
    init_tracing();
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    let table = referenced()
        .column(Column::new("code", "integer"))
        .column(Column::new("parent_code", "integer"))
        .index(Index::new(["code"]).unique())
        .foreign_key(ForeignKey::new(["parent_code"], "t", ["code"]));

    let batch = runner.drop_column(table, "code").await.unwrap();

    assert_eq!(
        batch.up_sql(),
        vec![
            "ALTER TABLE \"t\" DROP CONSTRAINT \"fk_t_parent_code_t\"",
            "DROP INDEX \"idx_t_code\"",
            "ALTER TABLE \"t\" DROP (\"code\")",
        ]
    );
    assert_eq!(
        batch.down_sql(),
        vec![
            "ALTER TABLE \"t\" ADD (\"code\" integer)",
            "CREATE UNIQUE INDEX \"idx_t_code\" ON \"t\" (\"code\")",
            "ALTER TABLE \"t\" ADD CONSTRAINT \"fk_t_parent_code_t\" FOREIGN KEY (\"parent_code\") \
             REFERENCES \"t\" (\"code\") ON DELETE RESTRICT ON UPDATE RESTRICT",
        ]
    );
    let cached = runner.cached_table("t").unwrap();
    assert!(cached.foreign_keys.is_empty());
    assert!(cached.has_column("parent_code"));
}

#[tokio::test]
async fn test_drop_primary_column_drops_self_reference_once() {
    init_tracing();
    let db = MockDatabase::new();
    db.rows(
        REFERENCING,
        vec![foreign_key_row("t", "fk_t_parent_id_t", "parent_id", "t", "id")],
    );
    let mut runner = runner(&db);

    runner.drop_column(tree(), "id").await.unwrap();

    assert_eq!(
        db.ddl(),
        vec![
            "ALTER TABLE \"t\" DROP CONSTRAINT \"fk_t_parent_id_t\"",
            "ALTER TABLE \"t\" DROP CONSTRAINT \"pk_t_id\"",
            "ALTER TABLE \"t\" DROP (\"id\")",
        ]
    );
    let cached = runner.cached_table("t").unwrap();
    assert!(cached.foreign_keys.is_empty());
    assert!(cached.primary_column_names().is_empty());
}

#[tokio::test]
async fn test_rename_column_carries_index_and_check() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    let table = referenced()
        .column(Column::new("a", "integer"))
        .index(Index::new(["a"]))
        .check(Check::new("\"a\" > 0").columns(["a"]));
    let naming = DefaultNamingStrategy::new();
    let old_check = naming.check_constraint_name("t", "\"a\" > 0");
    let new_check = naming.check_constraint_name("t", "\"b\" > 0");

    let batch = runner.rename_column(table, "a", "b").await.unwrap();

    assert_eq!(
        batch.up_sql(),
        vec![
            "RENAME COLUMN \"t\".\"a\" TO \"b\"".to_string(),
            "RENAME INDEX \"idx_t_a\" TO \"idx_t_b\"".to_string(),
            format!("ALTER TABLE \"t\" DROP CONSTRAINT \"{old_check}\""),
            format!("ALTER TABLE \"t\" ADD CONSTRAINT \"{new_check}\" CHECK (\"b\" > 0)"),
        ]
    );
    assert_eq!(
        batch.down_sql(),
        vec![
            format!("ALTER TABLE \"t\" DROP CONSTRAINT \"{new_check}\""),
            format!("ALTER TABLE \"t\" ADD CONSTRAINT \"{old_check}\" CHECK (\"b\" > 0)"),
            "RENAME INDEX \"idx_t_b\" TO \"idx_t_a\"".to_string(),
            "RENAME COLUMN \"t\".\"b\" TO \"a\"".to_string(),
        ]
    );

    let cached = runner.cached_table("t").unwrap();
    assert!(cached.has_column("b"));
    assert!(!cached.has_column("a"));
    assert!(cached.find_index("idx_t_b").is_some());
    assert!(cached.find_check(&new_check).is_some());
}

#[tokio::test]
async fn test_rename_primary_column_repoints_references() {
    let db = MockDatabase::new();
    db.rows(
        REFERENCING,
        vec![
            foreign_key_row("t", "fk_t_parent_id_t", "parent_id", "t", "id"),
            foreign_key_row("u", "fk_u_t_id_t", "t_id", "t", "id"),
        ],
    );
    let mut runner = runner(&db);
    let dialect = HanaDialect::new();
    let pre = TableShape::of(&dialect, &tree());

    let batch = runner.rename_column(tree(), "id", "key").await.unwrap();

    let expected = vec![
        "ALTER TABLE \"t\" DROP CONSTRAINT \"fk_t_parent_id_t\"",
        "ALTER TABLE \"u\" DROP CONSTRAINT \"fk_u_t_id_t\"",
        "ALTER TABLE \"t\" DROP CONSTRAINT \"pk_t_id\"",
        "RENAME COLUMN \"t\".\"id\" TO \"key\"",
        "ALTER TABLE \"t\" ADD CONSTRAINT \"pk_t_key\" PRIMARY KEY (\"key\")",
        "ALTER TABLE \"t\" ADD CONSTRAINT \"fk_t_parent_id_t\" FOREIGN KEY (\"parent_id\") \
         REFERENCES \"t\" (\"key\") ON DELETE RESTRICT ON UPDATE RESTRICT",
        "ALTER TABLE \"u\" ADD CONSTRAINT \"fk_u_t_id_t\" FOREIGN KEY (\"t_id\") \
         REFERENCES \"t\" (\"key\") ON DELETE RESTRICT ON UPDATE RESTRICT",
    ];
    assert_eq!(batch.up_sql(), expected);
    assert_eq!(db.ddl(), expected);

    let cached = runner.cached_table("t").unwrap();
    assert_eq!(cached.primary_column_names(), vec!["key".to_string()]);
    assert_eq!(cached.foreign_keys.len(), 1);
    assert_eq!(cached.foreign_keys[0].referenced_columns, vec!["key"]);

    let mut shape = pre.clone();
    shape.apply(&batch.up_sql());
    assert_eq!(shape.facts(), TableShape::of(&dialect, cached).facts());
    shape.apply(&batch.down_sql());
    assert_eq!(shape.facts(), pre.facts());
}

#[tokio::test]
async fn test_type_change_drops_and_adds_column() {
    init_tracing();
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    let table = referenced().column(Column::new("n", "integer"));

    runner
        .change_column(table, "n", Column::new("n", "varchar").length(40))
        .await
        .unwrap();

    assert_eq!(
        db.ddl(),
        vec![
            "ALTER TABLE \"t\" DROP (\"n\")",
            "ALTER TABLE \"t\" ADD (\"n\" varchar(40))",
        ]
    );
    let cached = runner.cached_table("t").unwrap();
    assert_eq!(cached.find_column("n").unwrap().column_type, "varchar");
}

#[tokio::test]
async fn test_default_precision_spelled_out_changes_nothing() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    let table = referenced().column(Column::new("amount", "decimal"));

    let batch = runner
        .change_column(
            table,
            "amount",
            Column::new("amount", "decimal").precision(18, 0),
        )
        .await
        .unwrap();

    assert!(batch.is_empty());
    assert!(db.ddl().is_empty());
    let cached = runner.cached_table("t").unwrap();
    assert_eq!(cached.find_column("amount").unwrap().precision, Some(18));
}

#[tokio::test]
async fn test_precision_change_recreates_column() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    let table = referenced().column(Column::new("amount", "decimal"));

    runner
        .change_column(
            table,
            "amount",
            Column::new("amount", "decimal").precision(12, 2),
        )
        .await
        .unwrap();

    assert_eq!(
        db.ddl(),
        vec![
            "ALTER TABLE \"t\" DROP (\"amount\")",
            "ALTER TABLE \"t\" ADD (\"amount\" decimal(12,2))",
        ]
    );
}

#[tokio::test]
async fn test_default_change_alters_in_place() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    let table = referenced().column(Column::new("n", "integer"));

    let batch = runner
        .change_column(table, "n", Column::new("n", "integer").default_value("0"))
        .await
        .unwrap();

    assert_eq!(
        batch.up_sql(),
        vec!["ALTER TABLE \"t\" ALTER (\"n\" integer DEFAULT 0)"]
    );
    assert_eq!(
        batch.down_sql(),
        vec!["ALTER TABLE \"t\" ALTER (\"n\" integer DEFAULT NULL)"]
    );
}

#[tokio::test]
async fn test_change_missing_column_fails() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    let error = runner
        .change_column(referenced(), "missing", Column::new("missing", "integer"))
        .await
        .unwrap_err();
    assert!(matches!(error, SyncError::ColumnNotFound { .. }));
}

// =============================================================================
// Keys, indices and constraints
// =============================================================================

#[tokio::test]
async fn test_update_primary_keys_rebuilds_key() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    let table = referenced().column(Column::new("code", "integer").not_null());

    runner
        .update_primary_keys(table, &["id".to_string(), "code".to_string()])
        .await
        .unwrap();

    assert_eq!(
        db.ddl(),
        vec![
            "ALTER TABLE \"t\" DROP CONSTRAINT \"pk_t_id\"",
            "ALTER TABLE \"t\" ADD CONSTRAINT \"pk_t_code_id\" PRIMARY KEY (\"id\", \"code\")",
        ]
    );
    let cached = runner.cached_table("t").unwrap();
    assert_eq!(cached.primary_column_names().len(), 2);
}

#[tokio::test]
async fn test_update_primary_keys_drops_unrestorable_self_reference() {
    init_tracing();
    let db = MockDatabase::new();
    db.rows(
        REFERENCING,
        vec![foreign_key_row("t", "fk_t_parent_id_t", "parent_id", "t", "id")],
    );
    let mut runner = runner(&db);

    let batch = runner
        .update_primary_keys(tree(), &["id".to_string(), "parent_id".to_string()])
        .await
        .unwrap();

    assert_eq!(
        batch.up_sql(),
        vec![
            "ALTER TABLE \"t\" DROP CONSTRAINT \"fk_t_parent_id_t\"",
            "ALTER TABLE \"t\" DROP CONSTRAINT \"pk_t_id\"",
            "ALTER TABLE \"t\" ADD CONSTRAINT \"pk_t_id_parent_id\" PRIMARY KEY (\"id\", \"parent_id\")",
        ]
    );
    assert_eq!(
        batch.down_sql(),
        vec![
            "ALTER TABLE \"t\" DROP CONSTRAINT \"pk_t_id_parent_id\"",
            "ALTER TABLE \"t\" ADD CONSTRAINT \"pk_t_id\" PRIMARY KEY (\"id\")",
            "ALTER TABLE \"t\" ADD CONSTRAINT \"fk_t_parent_id_t\" FOREIGN KEY (\"parent_id\") \
             REFERENCES \"t\" (\"id\") ON DELETE RESTRICT ON UPDATE RESTRICT",
        ]
    );
    let cached = runner.cached_table("t").unwrap();
    assert!(cached.foreign_keys.is_empty());
}

#[tokio::test]
async fn test_unchanged_primary_key_is_a_no_op() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    let batch = runner
        .create_primary_key(referenced(), &["id".to_string()])
        .await
        .unwrap();
    assert!(batch.is_empty());
    assert!(db.log().is_empty());
}

#[tokio::test]
async fn test_unique_constraint_unsupported_sends_nothing() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    let error = runner
        .create_unique_constraint("t", Unique::new(["id"]))
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        SyncError::Unsupported {
            dialect: "hana",
            ..
        }
    ));
    assert!(db.log().is_empty());
    assert_eq!(db.acquired(), 0);
}

#[tokio::test]
async fn test_drop_unique_index_clears_mirror() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    runner
        .add_column(referenced(), Column::new("email", "varchar").unique())
        .await
        .unwrap();
    db.clear_log();

    let batch = runner.drop_index("t", "idx_t_email").await.unwrap();

    assert_eq!(batch.up_sql(), vec!["DROP INDEX \"idx_t_email\""]);
    let cached = runner.cached_table("t").unwrap();
    assert!(cached.find_index("idx_t_email").is_none());
    assert!(cached.find_unique("idx_t_email").is_none());
    assert!(!cached.find_column("email").unwrap().unique);
}

#[tokio::test]
async fn test_drop_unknown_index_fails() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    let error = runner
        .drop_index(referenced(), "idx_missing")
        .await
        .unwrap_err();
    assert!(matches!(error, SyncError::IndexNotFound { .. }));
}

// =============================================================================
// Tables
// =============================================================================

#[tokio::test]
async fn test_create_table_synthesizes_unique_index() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    let users = Table::new("users")
        .column(Column::new("id", "integer").primary())
        .column(Column::new("email", "nvarchar").not_null().unique());

    let batch = runner
        .create_table(users, CreateTableOptions::default())
        .await
        .unwrap();

    assert_eq!(
        batch.up_sql(),
        vec![
            "CREATE TABLE \"users\" (\"id\" integer NOT NULL, \"email\" nvarchar(255) NOT NULL, \
             CONSTRAINT \"pk_users_id\" PRIMARY KEY (\"id\"))",
            "CREATE UNIQUE INDEX \"uq_users_email\" ON \"users\" (\"email\")",
        ]
    );
    assert_eq!(
        batch.down_sql(),
        vec!["DROP INDEX \"uq_users_email\"", "DROP TABLE \"users\""]
    );
    assert!(runner.cached_table("users").is_some());
}

#[tokio::test]
async fn test_create_table_in_current_schema_shares_cache_key() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    let batch = runner
        .create_table(
            Table::new("APP.t").column(Column::new("id", "integer").primary()),
            CreateTableOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(
        batch.up_sql(),
        vec!["CREATE TABLE \"t\" (\"id\" integer NOT NULL, CONSTRAINT \"pk_t_id\" PRIMARY KEY (\"id\"))"]
    );
    assert!(runner.cached_table("t").is_some());
    assert!(runner.cached_table("APP.t").is_some());

    runner
        .add_column("APP.t", Column::new("a", "integer"))
        .await
        .unwrap();
    runner
        .add_column("t", Column::new("b", "integer"))
        .await
        .unwrap();

    assert_eq!(db.count(TABLES), 0);
    assert_eq!(db.count(COLUMNS), 0);
    let cached = runner.cached_table("t").unwrap();
    assert!(cached.has_column("a") && cached.has_column("b"));
}

#[tokio::test]
async fn test_create_table_if_not_exists_skips_existing() {
    let db = MockDatabase::new();
    db.rows(HAS_TABLE, count(1));
    let mut runner = runner(&db);

    let batch = runner
        .create_table(referenced(), CreateTableOptions::default().if_not_exists(true))
        .await
        .unwrap();
    assert!(batch.is_empty());
    assert!(db.ddl().is_empty());
}

#[tokio::test]
async fn test_drop_table_removes_cache_entry() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    runner
        .create_table(referenced(), CreateTableOptions::default())
        .await
        .unwrap();
    db.clear_log();

    let batch = runner
        .drop_table("t", DropTableOptions::default())
        .await
        .unwrap();

    assert_eq!(db.ddl(), vec!["DROP TABLE \"t\""]);
    assert_eq!(
        batch.down_sql(),
        vec!["CREATE TABLE \"t\" (\"id\" integer NOT NULL, CONSTRAINT \"pk_t_id\" PRIMARY KEY (\"id\"))"]
    );
    assert!(runner.cached_table("t").is_none());
}

#[tokio::test]
async fn test_rename_table_updates_keys_and_indices() {
    let db = MockDatabase::new();
    db.rows(
        REFERENCING,
        vec![foreign_key_row(
            "items",
            "fk_items_order_id_orders",
            "order_id",
            "orders",
            "id",
        )],
    );
    let mut runner = runner(&db);
    let orders = Table::new("orders")
        .column(Column::new("id", "integer").primary())
        .column(Column::new("user_id", "integer"))
        .index(Index::new(["user_id"]));
    runner
        .create_table(orders, CreateTableOptions::default())
        .await
        .unwrap();
    db.clear_log();

    runner.rename_table("orders", "purchases").await.unwrap();

    assert_eq!(
        db.ddl(),
        vec![
            "RENAME TABLE \"orders\" TO \"purchases\"",
            "ALTER TABLE \"items\" DROP CONSTRAINT \"fk_items_order_id_orders\"",
            "ALTER TABLE \"purchases\" DROP CONSTRAINT \"pk_orders_id\"",
            "ALTER TABLE \"purchases\" ADD CONSTRAINT \"pk_purchases_id\" PRIMARY KEY (\"id\")",
            "ALTER TABLE \"items\" ADD CONSTRAINT \"fk_items_order_id_orders\" FOREIGN KEY (\"order_id\") \
             REFERENCES \"purchases\" (\"id\") ON DELETE RESTRICT ON UPDATE RESTRICT",
            "RENAME INDEX \"idx_orders_user_id\" TO \"idx_purchases_user_id\"",
        ]
    );
    assert!(runner.cached_table("orders").is_none());
    let cached = runner.cached_table("purchases").unwrap();
    assert!(cached.find_index("idx_purchases_user_id").is_some());
}

#[tokio::test]
async fn test_rename_table_moves_self_reference_once() {
    let db = MockDatabase::new();
    db.rows(
        REFERENCING,
        vec![foreign_key_row("t", "fk_t_parent_id_t", "parent_id", "t", "id")],
    );
    let mut runner = runner(&db);

    runner.rename_table(tree(), "n").await.unwrap();

    assert_eq!(
        db.ddl(),
        vec![
            "RENAME TABLE \"t\" TO \"n\"",
            "ALTER TABLE \"n\" DROP CONSTRAINT \"fk_t_parent_id_t\"",
            "ALTER TABLE \"n\" DROP CONSTRAINT \"pk_t_id\"",
            "ALTER TABLE \"n\" ADD CONSTRAINT \"pk_n_id\" PRIMARY KEY (\"id\")",
            "ALTER TABLE \"n\" ADD CONSTRAINT \"fk_n_parent_id_n\" FOREIGN KEY (\"parent_id\") \
             REFERENCES \"n\" (\"id\") ON DELETE RESTRICT ON UPDATE RESTRICT",
        ]
    );
    let cached = runner.cached_table("n").unwrap();
    assert_eq!(cached.foreign_keys[0].referenced_table, "n");
}

// =============================================================================
// Round trips
// =============================================================================

#[tokio::test]
async fn test_replaying_down_restores_pre_image() {
    init_tracing();
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    let dialect = HanaDialect::new();
    let table = referenced()
        .column(Column::new("a", "integer"))
        .column(Column::new("b", "varchar").length(40).default_value("'x'"))
        .column(Column::new("amount", "decimal"))
        .index(Index::new(["a"]))
        .foreign_key(ForeignKey::new(["a"], "users", ["id"]))
        .check(Check::new("\"a\" > 0").columns(["a"]));
    let pre = TableShape::of(&dialect, &table);

    let mut total = ChangeBatch::default();
    total.append(runner.rename_column(table, "a", "c").await.unwrap());
    total.append(
        runner
            .change_column("t", "b", Column::new("b", "varchar").length(40).not_null())
            .await
            .unwrap(),
    );
    total.append(
        runner
            .change_column("t", "amount", Column::new("amount", "decimal").precision(12, 2))
            .await
            .unwrap(),
    );
    total.append(
        runner
            .add_column("t", Column::new("d", "varchar").length(20).unique())
            .await
            .unwrap(),
    );
    total.append(runner.drop_column("t", "id").await.unwrap());

    let cached = runner.cached_table("t").unwrap();
    let mut shape = pre.clone();
    shape.apply(&total.up_sql());
    assert_eq!(shape.facts(), TableShape::of(&dialect, cached).facts());
    assert_ne!(shape.facts(), pre.facts());

    shape.apply(&total.down_sql());
    assert_eq!(shape.facts(), pre.facts());
}

// =============================================================================
// Views
// =============================================================================

#[tokio::test]
async fn test_create_view_records_definition() {
    let db = MockDatabase::new();
    db.rows(HAS_TABLE, count(1));
    let mut runner = runner(&db);

    let batch = runner
        .create_view(View::new("v", "SELECT 1 FROM \"SYS\".\"DUMMY\""))
        .await
        .unwrap();

    assert_eq!(
        db.ddl(),
        vec![
            "CREATE VIEW \"v\" AS SELECT 1 FROM \"SYS\".\"DUMMY\"",
            "INSERT INTO \"oxide_metadata\"(\"type\", \"schema\", \"name\", \"value\") VALUES (?, ?, ?, ?)",
        ]
    );
    assert_eq!(
        batch.up[1].params,
        vec![
            SqlValue::from("VIEW"),
            SqlValue::from("APP"),
            SqlValue::from("v"),
            SqlValue::from("SELECT 1 FROM \"SYS\".\"DUMMY\""),
        ]
    );
    assert_eq!(
        batch.down_sql(),
        vec![
            "DELETE FROM \"oxide_metadata\" WHERE \"type\" = ? AND \"schema\" = ? AND \"name\" = ?",
            "DROP VIEW \"v\"",
        ]
    );
    assert!(runner.cached_view("v").is_some());
}

#[tokio::test]
async fn test_create_view_creates_metadata_table_once() {
    let db = MockDatabase::new();
    db.rows(HAS_TABLE, count(0));
    let mut runner = runner(&db);

    runner
        .create_view(View::new("v", "SELECT 1 FROM \"SYS\".\"DUMMY\""))
        .await
        .unwrap();
    runner
        .create_view(View::new("w", "SELECT 2 FROM \"SYS\".\"DUMMY\""))
        .await
        .unwrap();

    let ddl = db.ddl();
    assert!(ddl[0].starts_with("CREATE TABLE \"oxide_metadata\" (\"type\" nvarchar(255) NOT NULL"));
    assert_eq!(db.count("CREATE TABLE \"oxide_metadata\""), 1);
    assert_eq!(db.count(HAS_TABLE), 1);
}

#[tokio::test]
async fn test_drop_view_removes_definition() {
    let db = MockDatabase::new();
    db.rows(HAS_TABLE, count(1));
    let mut runner = runner(&db);
    runner
        .create_view(View::new("v", "SELECT 1 FROM \"SYS\".\"DUMMY\""))
        .await
        .unwrap();
    db.clear_log();

    let batch = runner.drop_view("v").await.unwrap();

    assert_eq!(
        db.ddl(),
        vec![
            "DELETE FROM \"oxide_metadata\" WHERE \"type\" = ? AND \"schema\" = ? AND \"name\" = ?",
            "DROP VIEW \"v\"",
        ]
    );
    assert_eq!(
        batch.down_sql(),
        vec![
            "CREATE VIEW \"v\" AS SELECT 1 FROM \"SYS\".\"DUMMY\"",
            "INSERT INTO \"oxide_metadata\"(\"type\", \"schema\", \"name\", \"value\") VALUES (?, ?, ?, ?)",
        ]
    );
    assert!(runner.cached_view("v").is_none());
}

#[tokio::test]
async fn test_drop_unknown_view_fails() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    let error = runner.drop_view("missing").await.unwrap_err();
    assert!(matches!(error, SyncError::ViewNotFound(name) if name == "missing"));
    assert!(db.ddl().is_empty());
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
async fn test_transaction_statements() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    runner
        .start_transaction(Some(IsolationLevel::Serializable))
        .await
        .unwrap();
    assert!(runner.is_transaction_active());
    let again = runner.start_transaction(None).await.unwrap_err();
    assert!(matches!(again, SyncError::TransactionAlreadyStarted));
    runner.commit_transaction().await.unwrap();
    assert!(!runner.is_transaction_active());

    assert_eq!(
        db.sql(),
        vec![
            "SET TRANSACTION AUTOCOMMIT DDL OFF",
            "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
            "COMMIT",
            "SET TRANSACTION AUTOCOMMIT DDL ON",
        ]
    );
}

#[tokio::test]
async fn test_commit_and_rollback_require_transaction() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);

    let commit = runner.commit_transaction().await.unwrap_err();
    assert!(matches!(commit, SyncError::TransactionNotStarted));
    let rollback = runner.rollback_transaction().await.unwrap_err();
    assert!(matches!(rollback, SyncError::TransactionNotStarted));

    runner.start_transaction(None).await.unwrap();
    runner.rollback_transaction().await.unwrap();
    assert_eq!(
        db.sql(),
        vec![
            "SET TRANSACTION AUTOCOMMIT DDL OFF",
            "ROLLBACK",
            "SET TRANSACTION AUTOCOMMIT DDL ON",
        ]
    );
}

// =============================================================================
// SQL memory
// =============================================================================

#[tokio::test]
async fn test_sql_memory_records_without_dispatch() {
    let db = MockDatabase::new();
    let mut runner = runner(&db);
    runner.enable_sql_memory();

    runner
        .add_column(referenced(), Column::new("a", "integer"))
        .await
        .unwrap();
    runner
        .add_column("t", Column::new("b", "integer"))
        .await
        .unwrap();

    assert!(db.log().is_empty());
    assert_eq!(db.acquired(), 0);
    assert_eq!(
        runner.sql_memory().up_sql(),
        vec![
            "ALTER TABLE \"t\" ADD (\"a\" integer)",
            "ALTER TABLE \"t\" ADD (\"b\" integer)",
        ]
    );
    assert_eq!(
        runner.sql_memory().down_sql(),
        vec![
            "ALTER TABLE \"t\" DROP (\"b\")",
            "ALTER TABLE \"t\" DROP (\"a\")",
        ]
    );
    assert!(runner.cached_table("t").unwrap().has_column("b"));

    runner.disable_sql_memory();
    assert!(!runner.is_sql_memory_enabled());
    assert!(runner.sql_memory().is_empty());
}

// =============================================================================
// Maintenance and release
// =============================================================================

fn drop_rows() -> Vec<Row> {
    vec![
        Row::new().with("query", "DROP TABLE \"APP\".\"t\" CASCADE"),
        Row::new().with("query", "DROP TABLE \"APP\".\"u\" CASCADE"),
    ]
}

#[tokio::test]
async fn test_clear_database_commits() {
    let db = MockDatabase::new();
    db.rows("AS \"query\" FROM", drop_rows());
    let mut runner = runner(&db);

    runner.clear_database().await.unwrap();

    assert_eq!(
        db.ddl(),
        vec![
            "SET TRANSACTION AUTOCOMMIT DDL OFF",
            "DROP TABLE \"APP\".\"t\" CASCADE",
            "DROP TABLE \"APP\".\"u\" CASCADE",
            "COMMIT",
            "SET TRANSACTION AUTOCOMMIT DDL ON",
        ]
    );
    assert!(!runner.is_transaction_active());
}

#[tokio::test]
async fn test_clear_database_rolls_back_on_failure() {
    let db = MockDatabase::new();
    db.rows("AS \"query\" FROM", drop_rows());
    db.fail("DROP TABLE \"APP\".\"u\"", "table is locked");
    let mut runner = runner(&db);

    let error = runner.clear_database().await.unwrap_err();

    assert!(matches!(error, SyncError::QueryFailed { .. }));
    let ddl = db.ddl();
    assert_eq!(ddl[ddl.len() - 2], "ROLLBACK");
    assert_eq!(ddl[ddl.len() - 1], "SET TRANSACTION AUTOCOMMIT DDL ON");
    assert!(!ddl.iter().any(|sql| sql == "COMMIT"));
    assert!(!runner.is_transaction_active());
}

#[tokio::test]
async fn test_release_rejects_later_statements() {
    let db = MockDatabase::new();
    let runner = runner(&db);

    runner.release().await;
    assert_eq!(db.acquired(), 0);
    assert_eq!(db.closed(), 0);

    let db = MockDatabase::new();
    let runner = common::runner(&db);
    runner.connect().await.unwrap();
    runner.release().await;
    runner.release().await;
    assert_eq!(db.acquired(), 1);
    assert_eq!(db.closed(), 1);
    assert!(runner.is_released());

    let error = runner.query("SELECT 1 FROM \"SYS\".\"DUMMY\"").await.unwrap_err();
    assert!(matches!(error, SyncError::AlreadyReleased));
}
