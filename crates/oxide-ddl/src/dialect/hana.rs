//! SAP HANA dialect.

use std::sync::Arc;

use super::{catalog, key_filter, Capabilities, Dialect, IsolationLevel, TypeDefaults};
use crate::naming::{DefaultNamingStrategy, NamingStrategy};
use crate::schema::{Column, Table};
use crate::statement::{Statement, StatementPair};

const CAPABILITIES: Capabilities = Capabilities {
    unique_constraints: false,
    exclusion_constraints: false,
    no_action_foreign_keys: false,
    identity_excludes_default: true,
    with_length: &[
        "char",
        "nchar",
        "varchar",
        "nvarchar",
        "alphanum",
        "shorttext",
        "varbinary",
    ],
    with_precision: &["decimal"],
    with_scale: &["decimal"],
    type_defaults: &[
        ("char", TypeDefaults::length(1)),
        ("nchar", TypeDefaults::length(1)),
        ("varchar", TypeDefaults::length(255)),
        ("nvarchar", TypeDefaults::length(255)),
        ("shorttext", TypeDefaults::length(255)),
        ("varbinary", TypeDefaults::length(255)),
        ("decimal", TypeDefaults::numeric(18, 0)),
    ],
};

/// SAP HANA dialect.
///
/// HANA has no UNIQUE constraint object, so uniques are emitted as unique
/// indices. It has no `NO ACTION` foreign key action either; `RESTRICT` is
/// emitted in its place.
#[derive(Debug, Clone)]
pub struct HanaDialect {
    capabilities: Capabilities,
    naming: Arc<dyn NamingStrategy>,
}

impl HanaDialect {
    /// Creates the dialect with the default naming strategy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_naming(DefaultNamingStrategy::new())
    }

    /// Creates the dialect with a custom naming strategy.
    #[must_use]
    pub fn with_naming(naming: impl NamingStrategy + 'static) -> Self {
        Self {
            capabilities: CAPABILITIES,
            naming: Arc::new(naming),
        }
    }
}

impl Default for HanaDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for HanaDialect {
    fn name(&self) -> &'static str {
        "hana"
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn naming(&self) -> &dyn NamingStrategy {
        self.naming.as_ref()
    }

    fn rename_table_sql(&self, table: &Table, new_name: &str) -> StatementPair {
        let renamed = self.escape_path(table.schema.as_deref(), new_name);
        StatementPair::new(
            Statement::new(format!(
                "RENAME TABLE {} TO {}",
                self.table_path(table),
                self.quote_identifier(new_name)
            )),
            Statement::new(format!(
                "RENAME TABLE {renamed} TO {}",
                self.quote_identifier(&table.name)
            )),
        )
    }

    fn add_column_sql(&self, table: &Table, column: &Column) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD ({})",
            self.table_path(table),
            self.column_sql(column, false, false)
        ))
    }

    fn drop_column_sql(&self, table: &Table, column: &str) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} DROP ({})",
            self.table_path(table),
            self.quote_identifier(column)
        ))
    }

    fn alter_column_sql(
        &self,
        table: &Table,
        column: &Column,
        explicit_default: bool,
        explicit_nullable: bool,
    ) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ALTER ({})",
            self.table_path(table),
            self.column_sql(column, explicit_default, explicit_nullable)
        ))
    }

    fn rename_column_sql(&self, table: &Table, old: &str, new: &str) -> StatementPair {
        let rename = |from: &str, to: &str| {
            Statement::new(format!(
                "RENAME COLUMN {}.{} TO {}",
                self.table_path(table),
                self.quote_identifier(from),
                self.quote_identifier(to)
            ))
        };
        StatementPair::new(rename(old, new), rename(new, old))
    }

    fn rename_index_sql(&self, table: &Table, old: &str, new: &str) -> StatementPair {
        let rename = |from: &str, to: &str| {
            Statement::new(format!(
                "RENAME INDEX {} TO {}",
                self.index_path(table, from),
                self.quote_identifier(to)
            ))
        };
        StatementPair::new(rename(old, new), rename(new, old))
    }

    fn begin_transaction_sql(&self, isolation: Option<IsolationLevel>) -> Vec<Statement> {
        let mut statements = vec![Statement::new("SET TRANSACTION AUTOCOMMIT DDL OFF")];
        if let Some(level) = isolation {
            statements.push(Statement::new(format!(
                "SET TRANSACTION ISOLATION LEVEL {}",
                level.to_sql()
            )));
        }
        statements
    }

    fn commit_sql(&self) -> Vec<Statement> {
        vec![
            Statement::new("COMMIT"),
            Statement::new("SET TRANSACTION AUTOCOMMIT DDL ON"),
        ]
    }

    fn rollback_sql(&self) -> Vec<Statement> {
        vec![
            Statement::new("ROLLBACK"),
            Statement::new("SET TRANSACTION AUTOCOMMIT DDL ON"),
        ]
    }

    fn identity_query(&self) -> Option<Statement> {
        Some(Statement::new(
            "SELECT CURRENT_IDENTITY_VALUE() AS \"identity\" FROM \"SYS\".\"DUMMY\"",
        ))
    }

    fn current_schema_query(&self) -> Statement {
        Statement::new(format!(
            "SELECT CURRENT_SCHEMA AS \"{}\" FROM \"SYS\".\"DUMMY\"",
            catalog::CURRENT_SCHEMA
        ))
    }

    fn current_database_query(&self) -> Statement {
        Statement::new(format!(
            "SELECT \"VALUE\" AS \"{}\" FROM \"SYS\".\"M_SYSTEM_OVERVIEW\" \
             WHERE \"SECTION\" = 'System' AND \"NAME\" = 'Instance ID'",
            catalog::CURRENT_DATABASE
        ))
    }

    fn databases_query(&self) -> Statement {
        Statement::new("SELECT \"DATABASE_NAME\" FROM \"SYS\".\"M_DATABASES\"")
    }

    fn schemas_query(&self) -> Statement {
        Statement::new("SELECT \"SCHEMA_NAME\" FROM \"SYS\".\"SCHEMAS\"")
    }

    fn has_table_query(&self, schema: &str, name: &str) -> Statement {
        Statement::new(format!(
            "SELECT COUNT(*) AS \"{}\" FROM \"SYS\".\"TABLES\" \
             WHERE \"SCHEMA_NAME\" = ? AND \"TABLE_NAME\" = ?",
            catalog::COUNT
        ))
        .bind(schema)
        .bind(name)
    }

    fn has_column_query(&self, schema: &str, table: &str, column: &str) -> Statement {
        Statement::new(format!(
            "SELECT COUNT(*) AS \"{}\" FROM \"SYS\".\"TABLE_COLUMNS\" \
             WHERE \"SCHEMA_NAME\" = ? AND \"TABLE_NAME\" = ? AND \"COLUMN_NAME\" = ?",
            catalog::COUNT
        ))
        .bind(schema)
        .bind(table)
        .bind(column)
    }

    fn tables_query(&self, keys: &[(String, String)]) -> Statement {
        let (filter, mut statement) = key_filter(Statement::new(""), None, keys);
        statement.sql = format!(
            "SELECT \"SCHEMA_NAME\", \"TABLE_NAME\" FROM \"SYS\".\"TABLES\" WHERE {filter}"
        );
        statement
    }

    fn columns_query(&self, keys: &[(String, String)]) -> Statement {
        let (filter, mut statement) = key_filter(Statement::new(""), None, keys);
        statement.sql = format!(
            "SELECT \"SCHEMA_NAME\", \"TABLE_NAME\", \"COLUMN_NAME\", \"DATA_TYPE_NAME\", \
             \"LENGTH\", \"SCALE\", \"IS_NULLABLE\", \"DEFAULT_VALUE\", \"GENERATION_TYPE\", \
             \"COMMENTS\" FROM \"SYS\".\"TABLE_COLUMNS\" WHERE {filter} ORDER BY \"POSITION\""
        );
        statement
    }

    fn constraints_query(&self, keys: &[(String, String)]) -> Statement {
        let (filter, mut statement) = key_filter(Statement::new(""), None, keys);
        statement.sql = format!(
            "SELECT \"SCHEMA_NAME\", \"TABLE_NAME\", \"COLUMN_NAME\", \"CONSTRAINT_NAME\", \
             \"IS_PRIMARY_KEY\", \"CHECK_CONDITION\" FROM \"SYS\".\"CONSTRAINTS\" WHERE {filter} \
             ORDER BY \"POSITION\""
        );
        statement
    }

    fn indices_query(&self, keys: &[(String, String)]) -> Statement {
        let (filter, mut statement) = key_filter(Statement::new(""), Some("I"), keys);
        statement.sql = format!(
            "SELECT \"I\".\"SCHEMA_NAME\", \"I\".\"TABLE_NAME\", \"I\".\"INDEX_NAME\", \
             \"I\".\"INDEX_TYPE\", \"I\".\"CONSTRAINT\", \"C\".\"COLUMN_NAME\" \
             FROM \"SYS\".\"INDEXES\" \"I\" \
             INNER JOIN \"SYS\".\"INDEX_COLUMNS\" \"C\" \
             ON \"C\".\"SCHEMA_NAME\" = \"I\".\"SCHEMA_NAME\" AND \"C\".\"INDEX_OID\" = \"I\".\"INDEX_OID\" \
             WHERE {filter} \
             AND (\"I\".\"CONSTRAINT\" IS NULL OR \"I\".\"CONSTRAINT\" != 'PRIMARY KEY') \
             AND \"I\".\"INDEX_NAME\" NOT LIKE '%_SYS_FULLTEXT_%' \
             ORDER BY \"C\".\"POSITION\""
        );
        statement
    }

    fn foreign_keys_query(&self, keys: &[(String, String)]) -> Statement {
        let (filter, mut statement) = key_filter(Statement::new(""), None, keys);
        statement.sql = format!(
            "SELECT \"SCHEMA_NAME\", \"TABLE_NAME\", \"COLUMN_NAME\", \"CONSTRAINT_NAME\", \
             \"REFERENCED_SCHEMA_NAME\", \"REFERENCED_TABLE_NAME\", \"REFERENCED_COLUMN_NAME\", \
             \"DELETE_RULE\", \"UPDATE_RULE\" FROM \"SYS\".\"REFERENTIAL_CONSTRAINTS\" \
             WHERE {filter} ORDER BY \"POSITION\""
        );
        statement
    }

    fn referencing_foreign_keys_query(&self, schema: &str, table: &str) -> Statement {
        Statement::new(
            "SELECT \"SCHEMA_NAME\", \"TABLE_NAME\", \"COLUMN_NAME\", \"CONSTRAINT_NAME\", \
             \"REFERENCED_SCHEMA_NAME\", \"REFERENCED_TABLE_NAME\", \"REFERENCED_COLUMN_NAME\", \
             \"DELETE_RULE\", \"UPDATE_RULE\" FROM \"SYS\".\"REFERENTIAL_CONSTRAINTS\" \
             WHERE \"REFERENCED_SCHEMA_NAME\" = ? AND \"REFERENCED_TABLE_NAME\" = ? \
             ORDER BY \"POSITION\"",
        )
        .bind(schema)
        .bind(table)
    }

    fn drop_all_tables_query(&self, schemas: &[String]) -> Statement {
        let placeholders = vec!["?"; schemas.len().max(1)].join(", ");
        let statement = if schemas.is_empty() {
            Statement::new("").bind("")
        } else {
            Statement::new("").bind_all(schemas.iter().map(String::as_str))
        };
        Statement {
            sql: format!(
                "SELECT 'DROP TABLE \"' || \"SCHEMA_NAME\" || '\".\"' || \"TABLE_NAME\" || '\" CASCADE' \
                 AS \"{}\" FROM \"SYS\".\"TABLES\" WHERE \"SCHEMA_NAME\" IN ({placeholders}) \
                 AND \"TABLE_NAME\" NOT IN ('SYS_AFL_GENERATOR_PARAMETERS') \
                 AND \"IS_COLUMN_TABLE\" = 'TRUE'",
                catalog::QUERY
            ),
            ..statement
        }
    }
}
