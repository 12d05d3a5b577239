//! Catalog introspection.
//!
//! Rebuilds [`Table`] and [`View`] values from the live catalog. The five
//! table queries are queued together and merged only after all of them have
//! answered, so a returned table always carries its keys and indices.

use std::collections::BTreeMap;

use oxide_ddl::dialect::catalog;
use oxide_ddl::schema::split_path;
use oxide_ddl::{
    Check, Column, Dialect, ForeignKey, ForeignKeyAction, GenerationStrategy, Index, Table, View,
};

use crate::channel::QueryChannel;
use crate::error::Result;
use crate::session::Row;

/// A foreign key that references the inspected table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencingKey {
    /// Owning table. Only its schema and name are filled in.
    pub owner: Table,
    /// The foreign key as stored in the owner.
    pub foreign_key: ForeignKey,
}

impl ReferencingKey {
    /// Returns true when `table` owns the key, i.e. it references itself.
    #[must_use]
    pub fn is_owned_by(&self, table: &Table) -> bool {
        self.owner.path() == table.path()
    }
}

/// Reads schema objects from the catalog over a [`QueryChannel`].
pub struct Introspector<'a> {
    dialect: &'a dyn Dialect,
    channel: &'a QueryChannel,
    current_schema: &'a str,
    explicit_schema: Option<&'a str>,
}

impl<'a> Introspector<'a> {
    /// Creates an introspector. `explicit_schema` is the configured default
    /// schema; when unset, objects in `current_schema` come back without a
    /// schema qualifier.
    #[must_use]
    pub fn new(
        dialect: &'a dyn Dialect,
        channel: &'a QueryChannel,
        current_schema: &'a str,
        explicit_schema: Option<&'a str>,
    ) -> Self {
        Self {
            dialect,
            channel,
            current_schema,
            explicit_schema,
        }
    }

    /// Schema unqualified paths resolve to.
    #[must_use]
    pub fn default_schema(&self) -> &str {
        self.explicit_schema.unwrap_or(self.current_schema)
    }

    /// Resolves a `schema.name` or bare path to a (schema, name) key.
    #[must_use]
    pub fn resolve_key(&self, path: &str) -> (String, String) {
        let (schema, name) = split_path(path);
        (
            schema.unwrap_or_else(|| self.default_schema()).to_string(),
            name.to_string(),
        )
    }

    fn model_schema(&self, schema: &str) -> Option<String> {
        if self.explicit_schema.is_none() && schema == self.current_schema {
            None
        } else {
            Some(schema.to_string())
        }
    }

    /// Loads the tables at `paths`. Missing tables are skipped; when none
    /// exist the result is empty.
    pub async fn load_tables(&self, paths: &[String]) -> Result<Vec<Table>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<(String, String)> = paths.iter().map(|p| self.resolve_key(p)).collect();

        let (tables, columns, constraints, indices, foreign_keys) = futures::try_join!(
            self.channel.execute(self.dialect.tables_query(&keys)),
            self.channel.execute(self.dialect.columns_query(&keys)),
            self.channel.execute(self.dialect.constraints_query(&keys)),
            self.channel.execute(self.dialect.indices_query(&keys)),
            self.channel.execute(self.dialect.foreign_keys_query(&keys)),
        )?;

        Ok(self.build_tables(
            &tables.records,
            &columns.records,
            &constraints.records,
            &indices.records,
            &foreign_keys.records,
        ))
    }

    /// Loads view definitions from the metadata table. An empty `paths`
    /// loads every recorded view.
    pub async fn load_views(&self, metadata: &Table, paths: &[String]) -> Result<Vec<View>> {
        let keys: Vec<(String, String)> = paths.iter().map(|p| self.resolve_key(p)).collect();
        let result = self
            .channel
            .execute(self.dialect.views_query(metadata, &keys))
            .await?;

        Ok(result
            .records
            .iter()
            .filter_map(|row| {
                let name = row.text("name")?;
                let expression = row.text("value")?;
                let schema = row
                    .text("schema")
                    .unwrap_or_else(|| self.default_schema().to_string());
                Some(View {
                    schema: self.model_schema(&schema),
                    name,
                    expression,
                })
            })
            .collect())
    }

    /// Foreign keys that reference `schema.table`, including the table's
    /// own self-references.
    pub async fn referencing_foreign_keys(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<Vec<ReferencingKey>> {
        let result = self
            .channel
            .execute(self.dialect.referencing_foreign_keys_query(schema, table))
            .await?;

        let mut grouped: BTreeMap<(String, String, String), Vec<&Row>> = BTreeMap::new();
        for row in &result.records {
            let (Some(owner_schema), Some(owner), Some(name)) = (
                row.text(catalog::SCHEMA_NAME),
                row.text(catalog::TABLE_NAME),
                row.text(catalog::CONSTRAINT_NAME),
            ) else {
                continue;
            };
            grouped
                .entry((owner_schema, owner, name))
                .or_default()
                .push(row);
        }

        Ok(grouped
            .into_iter()
            .map(|((owner_schema, owner, name), rows)| {
                let mut stub = Table::new(&owner);
                stub.schema = self.model_schema(&owner_schema);
                ReferencingKey {
                    owner: stub,
                    foreign_key: self.build_foreign_key(name, &rows),
                }
            })
            .collect())
    }

    fn build_tables(
        &self,
        tables: &[Row],
        columns: &[Row],
        constraints: &[Row],
        indices: &[Row],
        foreign_keys: &[Row],
    ) -> Vec<Table> {
        tables
            .iter()
            .filter_map(|row| {
                let schema = row.text(catalog::SCHEMA_NAME)?;
                let name = row.text(catalog::TABLE_NAME)?;
                let owned = |r: &&Row| {
                    r.text(catalog::SCHEMA_NAME).as_deref() == Some(schema.as_str())
                        && r.text(catalog::TABLE_NAME).as_deref() == Some(name.as_str())
                };
                let columns: Vec<&Row> = columns.iter().filter(owned).collect();
                let constraints: Vec<&Row> = constraints.iter().filter(owned).collect();
                let indices: Vec<&Row> = indices.iter().filter(owned).collect();
                let foreign_keys: Vec<&Row> = foreign_keys.iter().filter(owned).collect();

                let mut table = Table::new(&name);
                table.schema = self.model_schema(&schema);
                table.indices = build_indices(&indices);
                table.columns = columns
                    .iter()
                    .filter_map(|c| self.build_column(c, &constraints, &table.indices))
                    .collect();
                table.checks = build_checks(&constraints);
                table.foreign_keys = group_by(&foreign_keys, catalog::CONSTRAINT_NAME)
                    .into_iter()
                    .map(|(name, rows)| self.build_foreign_key(name, &rows))
                    .collect();
                Some(table)
            })
            .collect()
    }

    fn build_column(&self, row: &Row, constraints: &[&Row], indices: &[Index]) -> Option<Column> {
        let caps = self.dialect.capabilities();
        let name = row.text(catalog::COLUMN_NAME)?;
        let mut column = Column::new(
            name.clone(),
            row.text(catalog::DATA_TYPE_NAME).unwrap_or_default(),
        );
        let defaults = caps.defaults(&column.column_type);
        let length = row.int(catalog::LENGTH).and_then(|v| u32::try_from(v).ok());
        let scale = row.int(catalog::SCALE).and_then(|v| u32::try_from(v).ok());

        if caps.has_precision(&column.column_type) {
            column.precision = length.filter(|p| Some(*p) != defaults.precision);
            if caps.has_scale(&column.column_type) {
                column.scale = scale.filter(|s| Some(*s) != defaults.scale);
            }
        } else if caps.has_length(&column.column_type) {
            column.length = length.filter(|l| Some(*l) != defaults.length);
        }

        column.nullable = row.flag(catalog::IS_NULLABLE);
        column.default = row
            .text(catalog::DEFAULT_VALUE)
            .map(|value| self.model_default(&column.column_type, value));
        if row
            .text(catalog::GENERATION_TYPE)
            .is_some_and(|g| g.to_ascii_uppercase().contains("AS IDENTITY"))
        {
            column.generated = Some(GenerationStrategy::Increment);
        }
        column.comment = row.text(catalog::COMMENTS);
        column.primary = constraints.iter().any(|c| {
            c.text(catalog::COLUMN_NAME).as_deref() == Some(name.as_str())
                && c.flag(catalog::IS_PRIMARY_KEY)
        });
        column.unique = indices.iter().any(|i| i.unique && i.is_single(&name));
        Some(column)
    }

    fn model_default(&self, column_type: &str, value: String) -> String {
        match column_type {
            "char" | "nchar" | "varchar" | "nvarchar" | "alphanum" | "shorttext" => {
                self.dialect.quote_literal(&value)
            }
            "boolean" => value.to_ascii_lowercase(),
            _ => value,
        }
    }

    fn build_foreign_key(&self, name: String, rows: &[&Row]) -> ForeignKey {
        let caps = self.dialect.capabilities();
        let first = rows.first();
        let referenced_schema = first
            .and_then(|r| r.text(catalog::REFERENCED_SCHEMA_NAME))
            .unwrap_or_else(|| self.default_schema().to_string());
        let referenced_table = first
            .and_then(|r| r.text(catalog::REFERENCED_TABLE_NAME))
            .unwrap_or_default();
        let action = |column: &str| {
            let action = first
                .and_then(|r| r.text(column))
                .and_then(|rule| ForeignKeyAction::from_sql(&rule))
                .unwrap_or_default();
            if action == ForeignKeyAction::Restrict && !caps.no_action_foreign_keys {
                ForeignKeyAction::NoAction
            } else {
                action
            }
        };

        let mut foreign_key = ForeignKey::new(
            rows.iter().filter_map(|r| r.text(catalog::COLUMN_NAME)),
            &referenced_table,
            rows.iter()
                .filter_map(|r| r.text(catalog::REFERENCED_COLUMN_NAME)),
        )
        .named(name)
        .on_delete(action(catalog::DELETE_RULE))
        .on_update(action(catalog::UPDATE_RULE));
        foreign_key.referenced_schema = self.model_schema(&referenced_schema);
        foreign_key
    }
}

fn group_by<'r>(rows: &[&'r Row], column: &str) -> Vec<(String, Vec<&'r Row>)> {
    let mut groups: Vec<(String, Vec<&Row>)> = Vec::new();
    for &row in rows {
        let Some(key) = row.text(column) else {
            continue;
        };
        match groups.iter_mut().find(|(name, _)| *name == key) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    groups
}

fn build_indices(rows: &[&Row]) -> Vec<Index> {
    group_by(rows, catalog::INDEX_NAME)
        .into_iter()
        .map(|(name, members)| {
            let mut index = Index::new(
                members
                    .iter()
                    .filter_map(|r| r.text(catalog::COLUMN_NAME)),
            )
            .named(name);
            let first = members.first();
            index.unique = first
                .and_then(|r| r.text(catalog::CONSTRAINT))
                .is_some_and(|c| c.to_ascii_uppercase().contains("UNIQUE"));
            index.fulltext = first
                .and_then(|r| r.text(catalog::INDEX_TYPE))
                .is_some_and(|t| t.eq_ignore_ascii_case("FULLTEXT"));
            index
        })
        .collect()
}

fn build_checks(rows: &[&Row]) -> Vec<Check> {
    let checks: Vec<&Row> = rows
        .iter()
        .copied()
        .filter(|r| r.text(catalog::CHECK_CONDITION).is_some())
        .collect();
    group_by(&checks, catalog::CONSTRAINT_NAME)
        .into_iter()
        .filter_map(|(name, members)| {
            let expression = members.first()?.text(catalog::CHECK_CONDITION)?;
            Some(
                Check::new(expression)
                    .named(name)
                    .columns(members.iter().filter_map(|r| r.text(catalog::COLUMN_NAME))),
            )
        })
        .collect()
}
