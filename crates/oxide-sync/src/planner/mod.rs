//! Change planner.
//!
//! Every operation follows the same steps: resolve the target table, clone
//! it, build the forward and reverse statements against the clone, run the
//! forward statements in order and finally swap the clone into the cache.
//! A failed statement aborts the operation and leaves the cache alone;
//! statements that already ran are not undone.
//!
//! Changes touching the primary key go through a rebuild: foreign keys in
//! other tables that reference this one are dropped, then the primary key,
//! then the actual change runs, then the new primary key is added and the
//! referencing foreign keys are restored where their target still exists.

mod column;
mod constraint;
mod table;
mod view;

pub use table::{CreateTableOptions, DropTableOptions};

use oxide_ddl::{BatchBuilder, ChangeBatch, Column, Dialect, SchemaChange, Table};
use tracing::warn;

use crate::error::{Result, SyncError};
use crate::introspect::ReferencingKey;
use crate::runner::SchemaRunner;

/// A table given by value or by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableTarget {
    /// Use this definition as the current state.
    Table(Table),
    /// Look the table up in the cache, introspecting it on a miss.
    Name(String),
}

impl From<Table> for TableTarget {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

impl From<&Table> for TableTarget {
    fn from(table: &Table) -> Self {
        Self::Table(table.clone())
    }
}

impl From<String> for TableTarget {
    fn from(path: String) -> Self {
        Self::Name(path)
    }
}

impl From<&str> for TableTarget {
    fn from(path: &str) -> Self {
        Self::Name(path.to_string())
    }
}

impl From<&String> for TableTarget {
    fn from(path: &String) -> Self {
        Self::Name(path.clone())
    }
}

impl<D: Dialect> SchemaRunner<D> {
    /// Applies one schema change intent.
    pub async fn apply(&mut self, change: SchemaChange) -> Result<ChangeBatch> {
        match change {
            SchemaChange::CreateTable {
                table,
                if_not_exists,
                foreign_keys,
                indices,
            } => {
                let options = CreateTableOptions {
                    if_not_exists,
                    foreign_keys,
                    indices,
                };
                self.create_table(table, options).await
            }
            SchemaChange::DropTable {
                table,
                if_exists,
                foreign_keys,
                indices,
            } => {
                let options = DropTableOptions {
                    if_exists,
                    foreign_keys,
                    indices,
                };
                self.drop_table(table, options).await
            }
            SchemaChange::RenameTable { table, new_name } => {
                self.rename_table(table, &new_name).await
            }
            SchemaChange::AddColumn { table, column } => self.add_column(table, column).await,
            SchemaChange::DropColumn { table, column } => self.drop_column(table, &column).await,
            SchemaChange::RenameColumn {
                table,
                old_name,
                new_name,
            } => self.rename_column(table, &old_name, &new_name).await,
            SchemaChange::ChangeColumn {
                table,
                old_name,
                column,
            } => self.change_column(table, &old_name, column).await,
            SchemaChange::CreatePrimaryKey { table, columns } => {
                self.create_primary_key(table, &columns).await
            }
            SchemaChange::UpdatePrimaryKeys { table, columns } => {
                self.update_primary_keys(table, &columns).await
            }
            SchemaChange::DropPrimaryKey { table } => self.drop_primary_key(table).await,
            SchemaChange::CreateForeignKey { table, foreign_key } => {
                self.create_foreign_key(table, foreign_key).await
            }
            SchemaChange::DropForeignKey { table, name } => {
                self.drop_foreign_key(table, &name).await
            }
            SchemaChange::CreateIndex { table, index } => self.create_index(table, index).await,
            SchemaChange::DropIndex { table, name } => self.drop_index(table, &name).await,
            SchemaChange::CreateCheckConstraint { table, check } => {
                self.create_check_constraint(table, check).await
            }
            SchemaChange::DropCheckConstraint { table, name } => {
                self.drop_check_constraint(table, &name).await
            }
            SchemaChange::CreateUniqueConstraint { table, unique } => {
                self.create_unique_constraint(table, unique).await
            }
            SchemaChange::DropUniqueConstraint { table, name } => {
                self.drop_unique_constraint(table, &name).await
            }
            SchemaChange::CreateExclusionConstraint { table, exclusion } => {
                self.create_exclusion_constraint(table, exclusion).await
            }
            SchemaChange::DropExclusionConstraint { table, name } => {
                self.drop_exclusion_constraint(table, &name).await
            }
            SchemaChange::CreateView { view } => self.create_view(view).await,
            SchemaChange::DropView { view } => self.drop_view(&view).await,
        }
    }

    /// Resolves a target to its current definition. A name missing from
    /// the cache is introspected once and cached.
    pub(crate) async fn resolve_table(&mut self, target: impl Into<TableTarget>) -> Result<Table> {
        match target.into() {
            TableTarget::Table(table) => self.normalized_table(table).await,
            TableTarget::Name(path) => {
                let key = self.resolve_cache_key(&path).await?;
                if let Some(table) = self.tables.get(&key) {
                    return Ok(table.clone());
                }
                let table = self
                    .introspector()
                    .await?
                    .load_tables(std::slice::from_ref(&path))
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| SyncError::TableNotFound(path.clone()))?;
                self.tables = self.tables.insert(table.clone());
                Ok(table)
            }
        }
    }

    /// Runs a planned batch and, on success, caches `table` in place of the
    /// entry at `old_key`.
    pub(crate) async fn run_planned(
        &mut self,
        old_key: &str,
        description: &str,
        batch: ChangeBatch,
        table: Table,
    ) -> Result<ChangeBatch> {
        let batch = self.execute_batch(description, batch).await?;
        self.tables = self.tables.replace(old_key, table);
        Ok(batch)
    }

    pub(crate) fn check_identity_default(&self, table: &Table, column: &Column) -> Result<()> {
        if self.dialect.capabilities().identity_excludes_default
            && column.is_identity()
            && column.default.is_some()
        {
            return Err(SyncError::InvalidColumn {
                table: table.path(),
                column: column.name.clone(),
                reason: "identity columns cannot have a default".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn column_not_found(table: &Table, column: &str) -> SyncError {
        SyncError::ColumnNotFound {
            table: table.path(),
            column: column.to_string(),
        }
    }

    /// Drops the foreign keys referencing `table`, then its primary key.
    /// Does nothing for a table without a primary key.
    pub(crate) async fn drop_primary_key_with_references(
        &self,
        table: &Table,
        builder: &mut BatchBuilder,
    ) -> Result<Vec<ReferencingKey>> {
        let primary = table.primary_column_names();
        if primary.is_empty() {
            return Ok(Vec::new());
        }

        let (schema, name) = self.resolve_key(&table.path()).await?;
        let referencing = self
            .introspector()
            .await?
            .referencing_foreign_keys(&schema, &name)
            .await?;

        for key in &referencing {
            let fk_name = self.dialect.foreign_key_name(&key.owner, &key.foreign_key);
            builder.push(
                self.dialect.drop_foreign_key_sql(&key.owner, &fk_name),
                self.dialect
                    .create_foreign_key_sql(&key.owner, &key.foreign_key),
            );
        }
        builder.push(
            self.dialect.drop_primary_key_sql(table),
            self.dialect.create_primary_key_sql(table, &primary),
        );
        Ok(referencing)
    }

    /// Adds the primary key over the table's primary columns, if any.
    pub(crate) fn add_primary_key(&self, table: &Table, builder: &mut BatchBuilder) {
        let primary = table.primary_column_names();
        if primary.is_empty() {
            return;
        }
        builder.push(
            self.dialect.create_primary_key_sql(table, &primary),
            self.dialect.drop_primary_key_sql(table),
        );
    }

    /// Recreates referencing foreign keys whose target columns are still a
    /// key of `table`. The others stay dropped; a self-reference that stays
    /// dropped is removed from `table` as well.
    pub(crate) fn restore_references(
        &self,
        table: &mut Table,
        referencing: Vec<ReferencingKey>,
        builder: &mut BatchBuilder,
    ) {
        for key in referencing {
            let fk_name = self.dialect.foreign_key_name(&key.owner, &key.foreign_key);
            let owned = key.is_owned_by(table);
            let columns_remain =
                !owned || key.foreign_key.columns.iter().all(|c| table.has_column(c));
            if columns_remain && table.is_key_target(&key.foreign_key.referenced_columns) {
                builder.push(
                    self.dialect
                        .create_foreign_key_sql(&key.owner, &key.foreign_key),
                    self.dialect.drop_foreign_key_sql(&key.owner, &fk_name),
                );
                continue;
            }
            warn!(
                table = %table.path(),
                owner = %key.owner.path(),
                foreign_key = %fk_name,
                "Referencing foreign key cannot be restored, its target is no longer a key"
            );
            if owned {
                self.remove_foreign_key(table, &fk_name);
            }
        }
    }

    /// Names of the self-references among `referencing`.
    pub(crate) fn owned_reference_names(
        &self,
        table: &Table,
        referencing: &[ReferencingKey],
    ) -> Vec<String> {
        referencing
            .iter()
            .filter(|key| key.is_owned_by(table))
            .map(|key| self.dialect.foreign_key_name(&key.owner, &key.foreign_key))
            .collect()
    }

    fn remove_foreign_key(&self, table: &mut Table, name: &str) {
        if let Some(position) = table
            .foreign_keys
            .iter()
            .position(|fk| self.dialect.foreign_key_name(table, fk) == name)
        {
            table.foreign_keys.remove(position);
        }
    }
}
