//! Table operations.

use oxide_ddl::schema::split_path;
use oxide_ddl::{BatchBuilder, ChangeBatch, Dialect, Table};

use super::TableTarget;
use crate::error::{Result, SyncError};
use crate::runner::SchemaRunner;

/// Options for [`SchemaRunner::create_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTableOptions {
    /// Skip when the table already exists.
    pub if_not_exists: bool,
    /// Create foreign keys inline.
    pub foreign_keys: bool,
    /// Create the table's indices.
    pub indices: bool,
}

impl Default for CreateTableOptions {
    fn default() -> Self {
        Self {
            if_not_exists: false,
            foreign_keys: true,
            indices: true,
        }
    }
}

impl CreateTableOptions {
    /// Skips creation when the table exists.
    #[must_use]
    pub const fn if_not_exists(mut self, enabled: bool) -> Self {
        self.if_not_exists = enabled;
        self
    }

    /// Enables or disables inline foreign keys.
    #[must_use]
    pub const fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Enables or disables index creation.
    #[must_use]
    pub const fn indices(mut self, enabled: bool) -> Self {
        self.indices = enabled;
        self
    }
}

/// Options for [`SchemaRunner::drop_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTableOptions {
    /// Skip when the table does not exist.
    pub if_exists: bool,
    /// Drop the table's foreign keys first.
    pub foreign_keys: bool,
    /// Drop the table's indices first.
    pub indices: bool,
}

impl Default for DropTableOptions {
    fn default() -> Self {
        Self {
            if_exists: false,
            foreign_keys: true,
            indices: true,
        }
    }
}

impl DropTableOptions {
    /// Skips the drop when the table is missing.
    #[must_use]
    pub const fn if_exists(mut self, enabled: bool) -> Self {
        self.if_exists = enabled;
        self
    }

    /// Enables or disables dropping foreign keys first.
    #[must_use]
    pub const fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Enables or disables dropping indices first.
    #[must_use]
    pub const fn indices(mut self, enabled: bool) -> Self {
        self.indices = enabled;
        self
    }
}

impl<D: Dialect> SchemaRunner<D> {
    /// Creates a table, its indices and, optionally, its foreign keys.
    ///
    /// Unique columns and unique constraints the dialect cannot declare
    /// inline become unique indices.
    pub async fn create_table(
        &mut self,
        table: Table,
        options: CreateTableOptions,
    ) -> Result<ChangeBatch> {
        let mut table = self.normalized_table(table).await?;
        if options.if_not_exists && self.has_table(&table.path()).await? {
            return Ok(ChangeBatch::default());
        }
        if !table.exclusions.is_empty() && !self.dialect.capabilities().exclusion_constraints {
            return Err(SyncError::Unsupported {
                dialect: self.dialect.name(),
                operation: "exclusion constraints",
            });
        }
        for column in &table.columns {
            self.check_identity_default(&table, column)?;
        }

        self.dialect.assign_names(&mut table);
        let mut builder = BatchBuilder::new();
        let create = self
            .dialect
            .create_table_sql(&mut table, options.foreign_keys);
        builder.push(create, self.dialect.drop_table_sql(&table));

        if options.indices {
            for index in &table.indices {
                let name = self.dialect.index_name(&table, index);
                builder.push(
                    self.dialect.create_index_sql(&table, index),
                    self.dialect.drop_index_sql(&table, &name),
                );
            }
        }
        for column in &table.columns {
            if let Some(comment) = &column.comment {
                builder.push_up(self.dialect.column_comment_sql(
                    &table,
                    &column.name,
                    Some(comment),
                ));
            }
        }

        if !options.foreign_keys {
            table.foreign_keys.clear();
        }
        if !options.indices {
            table.indices.clear();
        }

        let description = format!("Create table {}", table.path());
        let batch = self.execute_batch(&description, builder.finish()).await?;
        self.tables = self.tables.insert(table);
        Ok(batch)
    }

    /// Drops a table. The reverse statements recreate it with its foreign
    /// keys and indices.
    pub async fn drop_table(
        &mut self,
        target: impl Into<TableTarget>,
        options: DropTableOptions,
    ) -> Result<ChangeBatch> {
        let target = target.into();
        if options.if_exists {
            let path = match &target {
                TableTarget::Table(table) => table.path(),
                TableTarget::Name(path) => path.clone(),
            };
            if !self.has_table(&path).await? {
                return Ok(ChangeBatch::default());
            }
        }
        let table = self.resolve_table(target).await?;

        let mut builder = BatchBuilder::new();
        if options.indices {
            for index in &table.indices {
                let name = self.dialect.index_name(&table, index);
                builder.push(
                    self.dialect.drop_index_sql(&table, &name),
                    self.dialect.create_index_sql(&table, index),
                );
            }
        }
        if options.foreign_keys {
            for foreign_key in &table.foreign_keys {
                let name = self.dialect.foreign_key_name(&table, foreign_key);
                builder.push_up(self.dialect.drop_foreign_key_sql(&table, &name));
            }
        }
        let mut recreated = table.clone();
        builder.push(
            self.dialect.drop_table_sql(&table),
            self.dialect.create_table_sql(&mut recreated, true),
        );

        let path = table.path();
        let batch = self
            .execute_batch(&format!("Drop table {path}"), builder.finish())
            .await?;
        self.tables = self.tables.remove(&path);
        Ok(batch)
    }

    /// Renames a table within its schema.
    ///
    /// Own foreign keys and indices carrying derived names are renamed to
    /// the names derived for the new table. Foreign keys in other tables
    /// are re-pointed at the new name. The cache is assumed to match the
    /// catalog.
    pub async fn rename_table(
        &mut self,
        target: impl Into<TableTarget>,
        new_name: &str,
    ) -> Result<ChangeBatch> {
        let old = self.resolve_table(target).await?;
        let old_key = old.path();
        let (_, bare) = split_path(new_name);
        let naming = self.dialect.naming();

        let mut renamed = old.clone();
        renamed.name = bare.to_string();

        let mut builder = BatchBuilder::new();
        builder.push_pair(self.dialect.rename_table_sql(&old, &renamed.name));

        for foreign_key in &old.foreign_keys {
            let name = self.dialect.foreign_key_name(&old, foreign_key);
            let mut existing = foreign_key.clone();
            existing.name = Some(name.clone());
            builder.push(
                self.dialect.drop_foreign_key_sql(&renamed, &name),
                self.dialect.create_foreign_key_sql(&renamed, &existing),
            );
        }

        let (schema, name) = self.resolve_key(&old_key).await?;
        let mut referencing = self
            .introspector()
            .await?
            .referencing_foreign_keys(&schema, &name)
            .await?;
        referencing.retain(|key| key.owner.path() != old_key);
        for key in &referencing {
            let fk_name = self.dialect.foreign_key_name(&key.owner, &key.foreign_key);
            builder.push(
                self.dialect.drop_foreign_key_sql(&key.owner, &fk_name),
                self.dialect
                    .create_foreign_key_sql(&key.owner, &key.foreign_key),
            );
        }

        let primary = old.primary_column_names();
        if !primary.is_empty() {
            let old_pk = naming.primary_key_name(&old.name, &primary);
            builder.push(
                self.dialect.drop_constraint_sql(&renamed, &old_pk),
                self.dialect
                    .create_named_primary_key_sql(&renamed, &old_pk, &primary),
            );
            builder.push(
                self.dialect.create_primary_key_sql(&renamed, &primary),
                self.dialect.drop_primary_key_sql(&renamed),
            );
        }

        let self_referencing = |schema: &Option<String>, table: &str| {
            *schema == old.schema && table == old.name
        };
        for foreign_key in &mut renamed.foreign_keys {
            let derived = naming.foreign_key_name(
                &old.name,
                &foreign_key.columns,
                &foreign_key.referenced_table,
                &foreign_key.referenced_columns,
            );
            if self_referencing(&foreign_key.referenced_schema, &foreign_key.referenced_table) {
                foreign_key.referenced_table = renamed.name.clone();
            }
            let current = foreign_key.name.clone().unwrap_or_else(|| derived.clone());
            if current == derived {
                foreign_key.name = Some(naming.foreign_key_name(
                    &renamed.name,
                    &foreign_key.columns,
                    &foreign_key.referenced_table,
                    &foreign_key.referenced_columns,
                ));
            } else {
                foreign_key.name = Some(current);
            }
        }
        for foreign_key in &renamed.foreign_keys {
            let name = self.dialect.foreign_key_name(&renamed, foreign_key);
            builder.push(
                self.dialect.create_foreign_key_sql(&renamed, foreign_key),
                self.dialect.drop_foreign_key_sql(&renamed, &name),
            );
        }

        for key in referencing {
            let mut foreign_key = key.foreign_key;
            foreign_key.referenced_table = renamed.name.clone();
            let fk_name = self.dialect.foreign_key_name(&key.owner, &foreign_key);
            foreign_key.name = Some(fk_name.clone());
            builder.push(
                self.dialect.create_foreign_key_sql(&key.owner, &foreign_key),
                self.dialect.drop_foreign_key_sql(&key.owner, &fk_name),
            );
        }

        let index_names: Vec<(String, Option<String>)> = old
            .indices
            .iter()
            .map(|index| {
                let current = self.dialect.index_name(&old, index);
                let predicate = index.where_clause.as_deref();
                let next = if current == naming.index_name(&old.name, &index.columns, predicate) {
                    Some(naming.index_name(&renamed.name, &index.columns, predicate))
                } else if current == naming.unique_constraint_name(&old.name, &index.columns) {
                    Some(naming.unique_constraint_name(&renamed.name, &index.columns))
                } else {
                    None
                };
                (current, next)
            })
            .collect();
        for (position, (current, next)) in index_names.into_iter().enumerate() {
            let Some(next) = next else {
                renamed.indices[position].name = Some(current);
                continue;
            };
            builder.push_pair(self.dialect.rename_index_sql(&renamed, &current, &next));
            for unique in &mut renamed.uniques {
                if unique.name.as_deref() == Some(current.as_str()) {
                    unique.name = Some(next.clone());
                }
            }
            renamed.indices[position].name = Some(next);
        }

        let description = format!("Rename table {old_key} to {}", renamed.path());
        self.run_planned(&old_key, &description, builder.finish(), renamed)
            .await
    }
}
