//! Database dialects.
//!
//! A dialect bundles three things: its [`Capabilities`], the DDL statement
//! builder (default methods on [`Dialect`], overridden where the dialect's
//! syntax differs), and the catalog queries used for introspection.

mod hana;

pub use hana::HanaDialect;

use serde::{Deserialize, Serialize};

use crate::naming::NamingStrategy;
use crate::schema::{
    Check, Column, Exclusion, ForeignKey, ForeignKeyAction, Index, Table, Unique, View,
};
use crate::statement::{Statement, StatementPair};

/// Column names every dialect's catalog queries project.
pub mod catalog {
    /// Schema owning the object.
    pub const SCHEMA_NAME: &str = "SCHEMA_NAME";
    /// Table owning the object.
    pub const TABLE_NAME: &str = "TABLE_NAME";
    /// Column name.
    pub const COLUMN_NAME: &str = "COLUMN_NAME";
    /// Lowercased by the introspector.
    pub const DATA_TYPE_NAME: &str = "DATA_TYPE_NAME";
    /// Length, or precision for decimal types.
    pub const LENGTH: &str = "LENGTH";
    /// Numeric scale.
    pub const SCALE: &str = "SCALE";
    /// `TRUE` or `FALSE`.
    pub const IS_NULLABLE: &str = "IS_NULLABLE";
    /// Raw default expression.
    pub const DEFAULT_VALUE: &str = "DEFAULT_VALUE";
    /// Identity generation, e.g. `ALWAYS AS IDENTITY`.
    pub const GENERATION_TYPE: &str = "GENERATION_TYPE";
    /// Column comment.
    pub const COMMENTS: &str = "COMMENTS";
    /// Constraint name.
    pub const CONSTRAINT_NAME: &str = "CONSTRAINT_NAME";
    /// `TRUE` when the constraint is the primary key.
    pub const IS_PRIMARY_KEY: &str = "IS_PRIMARY_KEY";
    /// Check constraint expression.
    pub const CHECK_CONDITION: &str = "CHECK_CONDITION";
    /// Index name.
    pub const INDEX_NAME: &str = "INDEX_NAME";
    /// Index type, `FULLTEXT` for fulltext indices.
    pub const INDEX_TYPE: &str = "INDEX_TYPE";
    /// Index constraint kind, contains `UNIQUE` for unique indices.
    pub const CONSTRAINT: &str = "CONSTRAINT";
    /// Referenced schema of a foreign key.
    pub const REFERENCED_SCHEMA_NAME: &str = "REFERENCED_SCHEMA_NAME";
    /// Referenced table of a foreign key.
    pub const REFERENCED_TABLE_NAME: &str = "REFERENCED_TABLE_NAME";
    /// Referenced column of a foreign key.
    pub const REFERENCED_COLUMN_NAME: &str = "REFERENCED_COLUMN_NAME";
    /// ON DELETE rule.
    pub const DELETE_RULE: &str = "DELETE_RULE";
    /// ON UPDATE rule.
    pub const UPDATE_RULE: &str = "UPDATE_RULE";
    /// Current schema projection.
    pub const CURRENT_SCHEMA: &str = "schema_name";
    /// Current database projection.
    pub const CURRENT_DATABASE: &str = "db_name";
    /// Database name projection.
    pub const DATABASE_NAME: &str = "DATABASE_NAME";
    /// Existence check projection.
    pub const COUNT: &str = "count";
    /// Generated DROP statement projection.
    pub const QUERY: &str = "query";
}

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevel {
    /// READ UNCOMMITTED.
    ReadUncommitted,
    /// READ COMMITTED.
    ReadCommitted,
    /// REPEATABLE READ.
    RepeatableRead,
    /// SERIALIZABLE.
    Serializable,
}

impl IsolationLevel {
    /// Returns the SQL keyword for this level.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Length, precision and scale a dialect assumes when none is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeDefaults {
    /// Default length.
    pub length: Option<u32>,
    /// Default precision.
    pub precision: Option<u32>,
    /// Default scale.
    pub scale: Option<u32>,
}

impl TypeDefaults {
    /// Defaults carrying only a length.
    #[must_use]
    pub const fn length(length: u32) -> Self {
        Self {
            length: Some(length),
            precision: None,
            scale: None,
        }
    }

    /// Defaults carrying precision and scale.
    #[must_use]
    pub const fn numeric(precision: u32, scale: u32) -> Self {
        Self {
            length: None,
            precision: Some(precision),
            scale: Some(scale),
        }
    }
}

/// What a dialect can represent natively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Native UNIQUE constraints. Without them uniques become unique indices.
    pub unique_constraints: bool,
    /// Native exclusion constraints.
    pub exclusion_constraints: bool,
    /// `NO ACTION` foreign key action. Without it `RESTRICT` is emitted.
    pub no_action_foreign_keys: bool,
    /// Identity columns cannot carry an explicit default.
    pub identity_excludes_default: bool,
    /// Types that take a length qualifier.
    pub with_length: &'static [&'static str],
    /// Types that take a precision qualifier.
    pub with_precision: &'static [&'static str],
    /// Types that take a scale qualifier.
    pub with_scale: &'static [&'static str],
    /// Per-type defaults.
    pub type_defaults: &'static [(&'static str, TypeDefaults)],
}

impl Capabilities {
    /// Keyword emitted for a foreign key action.
    #[must_use]
    pub fn foreign_key_action(&self, action: ForeignKeyAction) -> &'static str {
        if action == ForeignKeyAction::NoAction && !self.no_action_foreign_keys {
            ForeignKeyAction::Restrict.to_sql()
        } else {
            action.to_sql()
        }
    }

    /// Returns true when the type takes a length qualifier.
    #[must_use]
    pub fn has_length(&self, column_type: &str) -> bool {
        self.with_length.contains(&column_type)
    }

    /// Returns true when the type takes a precision qualifier.
    #[must_use]
    pub fn has_precision(&self, column_type: &str) -> bool {
        self.with_precision.contains(&column_type)
    }

    /// Returns true when the type takes a scale qualifier.
    #[must_use]
    pub fn has_scale(&self, column_type: &str) -> bool {
        self.with_scale.contains(&column_type)
    }

    /// Defaults assumed for the type.
    #[must_use]
    pub fn defaults(&self, column_type: &str) -> TypeDefaults {
        self.type_defaults
            .iter()
            .find(|(name, _)| *name == column_type)
            .map(|(_, defaults)| *defaults)
            .unwrap_or_default()
    }

    /// Length to emit for a column: its own, or the type default.
    #[must_use]
    pub fn effective_length(&self, column: &Column) -> Option<u32> {
        column
            .length
            .or_else(|| self.defaults(&column.column_type).length)
    }

    /// Precision a column ends up with: its own, or the type default.
    #[must_use]
    pub fn effective_precision(&self, column: &Column) -> Option<u32> {
        column
            .precision
            .or_else(|| self.defaults(&column.column_type).precision)
    }

    /// Scale a column ends up with: its own, or the type default.
    #[must_use]
    pub fn effective_scale(&self, column: &Column) -> Option<u32> {
        column
            .scale
            .or_else(|| self.defaults(&column.column_type).scale)
    }
}

/// SQL generation and catalog access for one database family.
pub trait Dialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns what the dialect supports.
    fn capabilities(&self) -> &Capabilities;

    /// Returns the naming strategy used for derived names.
    fn naming(&self) -> &dyn NamingStrategy;

    // ------------------------------------------------------------------
    // Identifiers and types
    // ------------------------------------------------------------------

    /// Quotes an identifier.
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quotes a string literal.
    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Quotes an optionally schema-qualified object name.
    fn escape_path(&self, schema: Option<&str>, name: &str) -> String {
        match schema {
            Some(schema) => format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(name)
            ),
            None => self.quote_identifier(name),
        }
    }

    /// Quoted path of a table.
    fn table_path(&self, table: &Table) -> String {
        self.escape_path(table.schema.as_deref(), &table.name)
    }

    /// Quoted, comma separated column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Type with its length or precision qualifier.
    fn full_type(&self, column: &Column) -> String {
        let caps = self.capabilities();
        let ty = &column.column_type;
        if let Some(length) = column.length {
            return format!("{ty}({length})");
        }
        match (column.precision, column.scale) {
            (Some(precision), Some(scale)) => return format!("{ty}({precision},{scale})"),
            (Some(precision), None) => return format!("{ty}({precision})"),
            _ => {}
        }
        match caps.effective_length(column) {
            Some(length) if caps.has_length(ty) => format!("{ty}({length})"),
            _ => ty.clone(),
        }
    }

    /// Column definition. `explicit_default` emits `DEFAULT NULL` when the
    /// column has no default; `explicit_nullable` emits `NULL` for nullable
    /// columns.
    fn column_sql(&self, column: &Column, explicit_default: bool, explicit_nullable: bool) -> String {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.full_type(column)
        );
        if let Some(charset) = &column.charset {
            sql.push_str(&format!(" CHARACTER SET {charset}"));
        }
        if let Some(collation) = &column.collation {
            sql.push_str(&format!(" COLLATE {collation}"));
        }
        match &column.default {
            Some(default) => sql.push_str(&format!(" DEFAULT {default}")),
            None if explicit_default => sql.push_str(" DEFAULT NULL"),
            None => {}
        }
        if column.generated.is_none() {
            if !column.nullable {
                sql.push_str(" NOT NULL");
            } else if explicit_nullable {
                sql.push_str(" NULL");
            }
        }
        if column.is_identity() {
            sql.push_str(" GENERATED ALWAYS AS IDENTITY");
        }
        sql
    }

    // ------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------

    /// Name of an index, derived when not set.
    fn index_name(&self, table: &Table, index: &Index) -> String {
        index.name.clone().unwrap_or_else(|| {
            self.naming()
                .index_name(&table.name, &index.columns, index.where_clause.as_deref())
        })
    }

    /// Name of a foreign key, derived when not set.
    fn foreign_key_name(&self, table: &Table, foreign_key: &ForeignKey) -> String {
        foreign_key.name.clone().unwrap_or_else(|| {
            self.naming().foreign_key_name(
                &table.name,
                &foreign_key.columns,
                &foreign_key.referenced_table,
                &foreign_key.referenced_columns,
            )
        })
    }

    /// Name of a unique constraint, derived when not set.
    fn unique_name(&self, table: &Table, unique: &Unique) -> String {
        unique.name.clone().unwrap_or_else(|| {
            self.naming()
                .unique_constraint_name(&table.name, &unique.columns)
        })
    }

    /// Name of a check constraint, derived when not set.
    fn check_name(&self, table: &Table, check: &Check) -> String {
        check.name.clone().unwrap_or_else(|| {
            self.naming()
                .check_constraint_name(&table.name, &check.expression)
        })
    }

    /// Name of an exclusion constraint, derived when not set.
    fn exclusion_name(&self, table: &Table, exclusion: &Exclusion) -> String {
        exclusion.name.clone().unwrap_or_else(|| {
            self.naming()
                .exclusion_constraint_name(&table.name, &exclusion.expression)
        })
    }

    /// Fills in every missing constraint and index name.
    fn assign_names(&self, table: &mut Table) {
        let snapshot = table.clone();
        for index in &mut table.indices {
            index.name = Some(self.index_name(&snapshot, index));
        }
        for foreign_key in &mut table.foreign_keys {
            foreign_key.name = Some(self.foreign_key_name(&snapshot, foreign_key));
        }
        for unique in &mut table.uniques {
            unique.name = Some(self.unique_name(&snapshot, unique));
        }
        for check in &mut table.checks {
            check.name = Some(self.check_name(&snapshot, check));
        }
        for exclusion in &mut table.exclusions {
            exclusion.name = Some(self.exclusion_name(&snapshot, exclusion));
        }
    }

    /// Adds the unique indices (or unique constraints, when supported)
    /// backing unique columns and unique constraints. Objects already
    /// backed are left alone, so repeated calls add nothing new.
    fn synthesize_uniques(&self, table: &mut Table) {
        let naming = self.naming();
        let unique_columns: Vec<String> = table
            .columns
            .iter()
            .filter(|c| c.unique)
            .map(|c| c.name.clone())
            .collect();

        if self.capabilities().unique_constraints {
            for column in unique_columns {
                let columns = vec![column];
                if !table.has_unique_over(&columns) {
                    let name = naming.unique_constraint_name(&table.name, &columns);
                    table.uniques.push(Unique::new(columns).named(name));
                }
            }
            return;
        }

        for column in unique_columns {
            let columns = vec![column];
            if !table.has_unique_over(&columns) {
                let name = naming.unique_constraint_name(&table.name, &columns);
                table.indices.push(Index::new(columns).named(name).unique());
            }
        }
        let unmirrored: Vec<Unique> = table
            .uniques
            .iter()
            .filter(|u| {
                !table
                    .indices
                    .iter()
                    .any(|i| i.unique && i.where_clause.is_none() && i.columns == u.columns)
            })
            .cloned()
            .collect();
        for unique in unmirrored {
            let name = self.unique_name(table, &unique);
            table
                .indices
                .push(Index::new(unique.columns).named(name).unique());
        }
    }

    // ------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------

    /// `CREATE TABLE` with inline checks, optional inline foreign keys and a
    /// trailing primary key. Synthesizes unique indices first.
    fn create_table_sql(&self, table: &mut Table, with_foreign_keys: bool) -> Statement {
        self.synthesize_uniques(table);
        let table = &*table;

        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_sql(c, false, false))
            .collect();

        if self.capabilities().unique_constraints {
            for unique in &table.uniques {
                parts.push(format!(
                    "CONSTRAINT {} UNIQUE ({})",
                    self.quote_identifier(&self.unique_name(table, unique)),
                    self.column_list(&unique.columns)
                ));
            }
        }
        for check in &table.checks {
            parts.push(format!(
                "CONSTRAINT {} CHECK ({})",
                self.quote_identifier(&self.check_name(table, check)),
                check.expression
            ));
        }
        if self.capabilities().exclusion_constraints {
            for exclusion in &table.exclusions {
                parts.push(format!(
                    "CONSTRAINT {} EXCLUDE {}",
                    self.quote_identifier(&self.exclusion_name(table, exclusion)),
                    exclusion.expression
                ));
            }
        }
        if with_foreign_keys {
            for foreign_key in &table.foreign_keys {
                parts.push(format!(
                    "CONSTRAINT {} {}",
                    self.quote_identifier(&self.foreign_key_name(table, foreign_key)),
                    self.foreign_key_clause(foreign_key)
                ));
            }
        }
        let primary = table.primary_column_names();
        if !primary.is_empty() {
            parts.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                self.quote_identifier(&self.naming().primary_key_name(&table.name, &primary)),
                self.column_list(&primary)
            ));
        }

        Statement::new(format!(
            "CREATE TABLE {} ({})",
            self.table_path(table),
            parts.join(", ")
        ))
    }

    /// `DROP TABLE`.
    fn drop_table_sql(&self, table: &Table) -> Statement {
        Statement::new(format!("DROP TABLE {}", self.table_path(table)))
    }

    /// Renames a table within its schema.
    fn rename_table_sql(&self, table: &Table, new_name: &str) -> StatementPair {
        let renamed = self.escape_path(table.schema.as_deref(), new_name);
        StatementPair::new(
            Statement::new(format!(
                "ALTER TABLE {} RENAME TO {}",
                self.table_path(table),
                self.quote_identifier(new_name)
            )),
            Statement::new(format!(
                "ALTER TABLE {renamed} RENAME TO {}",
                self.quote_identifier(&table.name)
            )),
        )
    }

    /// Removes every row of a table.
    fn truncate_sql(&self, table: &Table) -> Statement {
        Statement::new(format!("TRUNCATE TABLE {}", self.table_path(table)))
    }

    // ------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------

    /// Adds a column.
    fn add_column_sql(&self, table: &Table, column: &Column) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.table_path(table),
            self.column_sql(column, false, false)
        ))
    }

    /// Drops a column.
    fn drop_column_sql(&self, table: &Table, column: &str) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.table_path(table),
            self.quote_identifier(column)
        ))
    }

    /// Redefines a column in place.
    fn alter_column_sql(
        &self,
        table: &Table,
        column: &Column,
        explicit_default: bool,
        explicit_nullable: bool,
    ) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.table_path(table),
            self.column_sql(column, explicit_default, explicit_nullable)
        ))
    }

    /// Renames a column.
    fn rename_column_sql(&self, table: &Table, old: &str, new: &str) -> StatementPair {
        let rename = |from: &str, to: &str| {
            Statement::new(format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                self.table_path(table),
                self.quote_identifier(from),
                self.quote_identifier(to)
            ))
        };
        StatementPair::new(rename(old, new), rename(new, old))
    }

    /// Sets or clears a column comment.
    fn column_comment_sql(&self, table: &Table, column: &str, comment: Option<&str>) -> Statement {
        let comment = comment.map_or_else(|| "NULL".to_string(), |c| self.quote_literal(c));
        Statement::new(format!(
            "COMMENT ON COLUMN {}.{} IS {comment}",
            self.table_path(table),
            self.quote_identifier(column)
        ))
    }

    // ------------------------------------------------------------------
    // Indices
    // ------------------------------------------------------------------

    /// Quoted index name, qualified with the table's schema.
    fn index_path(&self, table: &Table, name: &str) -> String {
        self.escape_path(table.schema.as_deref(), name)
    }

    /// `CREATE [UNIQUE] [FULLTEXT] INDEX`.
    fn create_index_sql(&self, table: &Table, index: &Index) -> Statement {
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        if index.fulltext {
            sql.push_str("FULLTEXT ");
        }
        sql.push_str(&format!(
            "INDEX {} ON {} ({})",
            self.quote_identifier(&self.index_name(table, index)),
            self.table_path(table),
            self.column_list(&index.columns)
        ));
        if let Some(predicate) = &index.where_clause {
            sql.push_str(&format!(" WHERE {predicate}"));
        }
        Statement::new(sql)
    }

    /// `DROP INDEX`.
    fn drop_index_sql(&self, table: &Table, name: &str) -> Statement {
        Statement::new(format!("DROP INDEX {}", self.index_path(table, name)))
    }

    /// Renames an index.
    fn rename_index_sql(&self, table: &Table, old: &str, new: &str) -> StatementPair {
        let rename = |from: &str, to: &str| {
            Statement::new(format!(
                "ALTER INDEX {} RENAME TO {}",
                self.index_path(table, from),
                self.quote_identifier(to)
            ))
        };
        StatementPair::new(rename(old, new), rename(new, old))
    }

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    /// `FOREIGN KEY (...) REFERENCES ... ON DELETE ... ON UPDATE ...`.
    fn foreign_key_clause(&self, foreign_key: &ForeignKey) -> String {
        let caps = self.capabilities();
        format!(
            "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.column_list(&foreign_key.columns),
            self.escape_path(
                foreign_key.referenced_schema.as_deref(),
                &foreign_key.referenced_table
            ),
            self.column_list(&foreign_key.referenced_columns),
            caps.foreign_key_action(foreign_key.on_delete),
            caps.foreign_key_action(foreign_key.on_update)
        )
    }

    /// Drops a named constraint.
    fn drop_constraint_sql(&self, table: &Table, name: &str) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.table_path(table),
            self.quote_identifier(name)
        ))
    }

    /// Adds a foreign key.
    fn create_foreign_key_sql(&self, table: &Table, foreign_key: &ForeignKey) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} {}",
            self.table_path(table),
            self.quote_identifier(&self.foreign_key_name(table, foreign_key)),
            self.foreign_key_clause(foreign_key)
        ))
    }

    /// Drops a foreign key.
    fn drop_foreign_key_sql(&self, table: &Table, name: &str) -> Statement {
        self.drop_constraint_sql(table, name)
    }

    /// Adds the primary key over `columns`. The constraint name is derived
    /// from the columns.
    fn create_primary_key_sql(&self, table: &Table, columns: &[String]) -> Statement {
        let name = self.naming().primary_key_name(&table.name, columns);
        self.create_named_primary_key_sql(table, &name, columns)
    }

    /// Adds a primary key constraint under an explicit name.
    fn create_named_primary_key_sql(&self, table: &Table, name: &str, columns: &[String]) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
            self.table_path(table),
            self.quote_identifier(name),
            self.column_list(columns)
        ))
    }

    /// Drops the primary key. The name is recomputed from the table's
    /// current primary columns.
    fn drop_primary_key_sql(&self, table: &Table) -> Statement {
        let name = self
            .naming()
            .primary_key_name(&table.name, &table.primary_column_names());
        self.drop_constraint_sql(table, &name)
    }

    /// Adds a native unique constraint.
    fn create_unique_constraint_sql(&self, table: &Table, unique: &Unique) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
            self.table_path(table),
            self.quote_identifier(&self.unique_name(table, unique)),
            self.column_list(&unique.columns)
        ))
    }

    /// Drops a native unique constraint.
    fn drop_unique_constraint_sql(&self, table: &Table, name: &str) -> Statement {
        self.drop_constraint_sql(table, name)
    }

    /// Adds a check constraint.
    fn create_check_sql(&self, table: &Table, check: &Check) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
            self.table_path(table),
            self.quote_identifier(&self.check_name(table, check)),
            check.expression
        ))
    }

    /// Drops a check constraint.
    fn drop_check_sql(&self, table: &Table, name: &str) -> Statement {
        self.drop_constraint_sql(table, name)
    }

    /// Adds an exclusion constraint.
    fn create_exclusion_sql(&self, table: &Table, exclusion: &Exclusion) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} EXCLUDE {}",
            self.table_path(table),
            self.quote_identifier(&self.exclusion_name(table, exclusion)),
            exclusion.expression
        ))
    }

    /// Drops an exclusion constraint.
    fn drop_exclusion_sql(&self, table: &Table, name: &str) -> Statement {
        self.drop_constraint_sql(table, name)
    }

    // ------------------------------------------------------------------
    // Views and metadata
    // ------------------------------------------------------------------

    /// `CREATE VIEW`.
    fn create_view_sql(&self, view: &View) -> Statement {
        Statement::new(format!(
            "CREATE VIEW {} AS {}",
            self.escape_path(view.schema.as_deref(), &view.name),
            view.expression
        ))
    }

    /// `DROP VIEW`.
    fn drop_view_sql(&self, view: &View) -> Statement {
        Statement::new(format!(
            "DROP VIEW {}",
            self.escape_path(view.schema.as_deref(), &view.name)
        ))
    }

    /// Table recording view definitions.
    fn metadata_table(&self, schema: Option<&str>, name: &str) -> Table {
        let mut table = Table::new(name);
        table.schema = schema.map(str::to_string);
        table
            .column(Column::new("type", "nvarchar").length(255).not_null())
            .column(Column::new("database", "nvarchar").length(255))
            .column(Column::new("schema", "nvarchar").length(255))
            .column(Column::new("table", "nvarchar").length(255))
            .column(Column::new("name", "nvarchar").length(255))
            .column(Column::new("value", "nclob"))
    }

    /// Records a view definition. `schema` is the resolved view schema.
    fn insert_view_metadata_sql(&self, metadata: &Table, schema: &str, view: &View) -> Statement {
        Statement::new(format!(
            "INSERT INTO {}(\"type\", \"schema\", \"name\", \"value\") VALUES (?, ?, ?, ?)",
            self.table_path(metadata)
        ))
        .bind("VIEW")
        .bind(schema)
        .bind(view.name.as_str())
        .bind(view.expression.as_str())
    }

    /// Removes a view definition.
    fn delete_view_metadata_sql(&self, metadata: &Table, schema: &str, view: &View) -> Statement {
        Statement::new(format!(
            "DELETE FROM {} WHERE \"type\" = ? AND \"schema\" = ? AND \"name\" = ?",
            self.table_path(metadata)
        ))
        .bind("VIEW")
        .bind(schema)
        .bind(view.name.as_str())
    }

    /// Reads view definitions for the given (schema, name) keys, or all of
    /// them when `keys` is empty.
    fn views_query(&self, metadata: &Table, keys: &[(String, String)]) -> Statement {
        let mut sql = format!(
            "SELECT \"schema\", \"name\", \"value\" FROM {} WHERE \"type\" = ?",
            self.table_path(metadata)
        );
        let mut statement = Statement::new(String::new()).bind("VIEW");
        if !keys.is_empty() {
            let filter = vec!["(\"schema\" = ? AND \"name\" = ?)"; keys.len()].join(" OR ");
            sql.push_str(&format!(" AND ({filter})"));
            for (schema, name) in keys {
                statement = statement.bind(schema.as_str()).bind(name.as_str());
            }
        }
        statement.sql = sql;
        statement
    }

    // ------------------------------------------------------------------
    // Schemas and transactions
    // ------------------------------------------------------------------

    /// `CREATE SCHEMA`.
    fn create_schema_sql(&self, name: &str) -> Statement {
        Statement::new(format!("CREATE SCHEMA {}", self.quote_identifier(name)))
    }

    /// `DROP SCHEMA`.
    fn drop_schema_sql(&self, name: &str, cascade: bool) -> Statement {
        let cascade = if cascade { " CASCADE" } else { "" };
        Statement::new(format!(
            "DROP SCHEMA {}{cascade}",
            self.quote_identifier(name)
        ))
    }

    /// Statements opening a transaction.
    fn begin_transaction_sql(&self, isolation: Option<IsolationLevel>) -> Vec<Statement> {
        let mut statements = vec![Statement::new("BEGIN")];
        if let Some(level) = isolation {
            statements.push(Statement::new(format!(
                "SET TRANSACTION ISOLATION LEVEL {}",
                level.to_sql()
            )));
        }
        statements
    }

    /// Statements committing a transaction.
    fn commit_sql(&self) -> Vec<Statement> {
        vec![Statement::new("COMMIT")]
    }

    /// Statements rolling back a transaction.
    fn rollback_sql(&self) -> Vec<Statement> {
        vec![Statement::new("ROLLBACK")]
    }

    /// Statement reading back the identity generated by the previous
    /// insert on the same session.
    fn identity_query(&self) -> Option<Statement> {
        None
    }

    // ------------------------------------------------------------------
    // Catalog queries
    //
    // Projections use the names in [`catalog`]. Keys are resolved
    // (schema, table) pairs.
    // ------------------------------------------------------------------

    /// Current schema, projected as [`catalog::CURRENT_SCHEMA`].
    fn current_schema_query(&self) -> Statement;

    /// Current database, projected as [`catalog::CURRENT_DATABASE`].
    fn current_database_query(&self) -> Statement;

    /// All databases, projected as [`catalog::DATABASE_NAME`].
    fn databases_query(&self) -> Statement;

    /// All schemas, projected as [`catalog::SCHEMA_NAME`].
    fn schemas_query(&self) -> Statement;

    /// Counts tables named `name` in `schema`.
    fn has_table_query(&self, schema: &str, name: &str) -> Statement;

    /// Counts columns named `column` in the table.
    fn has_column_query(&self, schema: &str, table: &str, column: &str) -> Statement;

    /// Tables matching the keys.
    fn tables_query(&self, keys: &[(String, String)]) -> Statement;

    /// Columns of the matching tables, in position order.
    fn columns_query(&self, keys: &[(String, String)]) -> Statement;

    /// Constraint membership of the matching tables' columns.
    fn constraints_query(&self, keys: &[(String, String)]) -> Statement;

    /// Non-primary indices of the matching tables.
    fn indices_query(&self, keys: &[(String, String)]) -> Statement;

    /// Foreign keys owned by the matching tables.
    fn foreign_keys_query(&self, keys: &[(String, String)]) -> Statement;

    /// Foreign keys in any table referencing the given table.
    fn referencing_foreign_keys_query(&self, schema: &str, table: &str) -> Statement;

    /// One `DROP TABLE` statement per table in the given schemas, projected
    /// as [`catalog::QUERY`].
    fn drop_all_tables_query(&self, schemas: &[String]) -> Statement;
}

/// `(("SCHEMA_NAME" = ? AND "TABLE_NAME" = ?) OR ...)` over the keys, with
/// the parameters bound onto `statement`.
#[must_use]
pub fn key_filter(
    statement: Statement,
    alias: Option<&str>,
    keys: &[(String, String)],
) -> (String, Statement) {
    let prefix = alias.map(|a| format!("\"{a}\".")).unwrap_or_default();
    let clause = format!(
        "({prefix}\"{}\" = ? AND {prefix}\"{}\" = ?)",
        catalog::SCHEMA_NAME,
        catalog::TABLE_NAME
    );
    let mut statement = statement;
    for (schema, table) in keys {
        statement = statement.bind(schema.as_str()).bind(table.as_str());
    }
    let filter = if keys.is_empty() {
        "1 = 0".to_string()
    } else {
        vec![clause; keys.len()].join(" OR ")
    };
    (format!("({filter})"), statement)
}
