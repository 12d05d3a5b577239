//! Column operations.

use std::slice;

use oxide_ddl::{BatchBuilder, ChangeBatch, Column, Dialect, ForeignKey, Index, Table, Unique};
use tracing::warn;

use super::TableTarget;
use crate::error::{Result, SyncError};
use crate::runner::SchemaRunner;

fn replace_name(names: &mut [String], old: &str, new: &str) {
    for name in names.iter_mut().filter(|name| name.as_str() == old) {
        *name = new.to_string();
    }
}

impl<D: Dialect> SchemaRunner<D> {
    /// Adds a column.
    ///
    /// A primary column rebuilds the primary key. A unique column gets a
    /// unique index (or a unique constraint where the dialect has them).
    pub async fn add_column(
        &mut self,
        target: impl Into<TableTarget>,
        column: Column,
    ) -> Result<ChangeBatch> {
        self.add_columns(target, vec![column]).await
    }

    /// Adds several columns, one after the other.
    pub async fn add_columns(
        &mut self,
        target: impl Into<TableTarget>,
        columns: Vec<Column>,
    ) -> Result<ChangeBatch> {
        let mut table = self.resolve_table(target).await?;
        let mut total = ChangeBatch::default();
        for column in columns {
            let description = format!("Add column {} to {}", column.name, table.path());
            let (batch, next) = self.plan_add_column(&table, column).await?;
            total.append(
                self.run_planned(&table.path(), &description, batch, next.clone())
                    .await?,
            );
            table = next;
        }
        Ok(total)
    }

    /// Drops a column together with the indices, foreign keys and
    /// constraints that name it.
    pub async fn drop_column(
        &mut self,
        target: impl Into<TableTarget>,
        name: &str,
    ) -> Result<ChangeBatch> {
        self.drop_columns(target, &[name]).await
    }

    /// Drops several columns, one after the other.
    pub async fn drop_columns(
        &mut self,
        target: impl Into<TableTarget>,
        names: &[&str],
    ) -> Result<ChangeBatch> {
        let mut table = self.resolve_table(target).await?;
        let mut total = ChangeBatch::default();
        for name in names {
            let description = format!("Drop column {name} from {}", table.path());
            let (batch, next) = self.plan_drop_column(&table, name).await?;
            total.append(
                self.run_planned(&table.path(), &description, batch, next.clone())
                    .await?,
            );
            table = next;
        }
        Ok(total)
    }

    /// Renames a column, carrying its indices, foreign keys, checks and
    /// primary key membership over to the new name.
    pub async fn rename_column(
        &mut self,
        target: impl Into<TableTarget>,
        old_name: &str,
        new_name: &str,
    ) -> Result<ChangeBatch> {
        let table = self.resolve_table(target).await?;
        let mut column = table
            .find_column(old_name)
            .cloned()
            .ok_or_else(|| Self::column_not_found(&table, old_name))?;
        column.name = new_name.to_string();
        self.change_column(table, old_name, column).await
    }

    /// Changes a column to a new definition.
    ///
    /// Type, length, precision, scale and generation cannot be altered in
    /// place: such a change drops the column and adds it again, losing its
    /// data.
    pub async fn change_column(
        &mut self,
        target: impl Into<TableTarget>,
        old_name: &str,
        column: Column,
    ) -> Result<ChangeBatch> {
        self.change_columns(target, vec![(old_name.to_string(), column)])
            .await
    }

    /// Changes several columns, one after the other. Each entry pairs the
    /// current column name with its new definition.
    pub async fn change_columns(
        &mut self,
        target: impl Into<TableTarget>,
        changes: Vec<(String, Column)>,
    ) -> Result<ChangeBatch> {
        let mut table = self.resolve_table(target).await?;
        let mut total = ChangeBatch::default();
        for (old_name, column) in changes {
            let old = table
                .find_column(&old_name)
                .cloned()
                .ok_or_else(|| Self::column_not_found(&table, &old_name))?;
            if column.name != old_name && table.has_column(&column.name) {
                return Err(SyncError::ColumnExists {
                    table: table.path(),
                    column: column.name,
                });
            }
            self.check_identity_default(&table, &column)?;
            let description = format!("Change column {old_name} of {}", table.path());

            if self.requires_recreate(&old, &column) {
                warn!(
                    table = %table.path(),
                    column = %old_name,
                    "Column cannot be altered in place, dropping and adding it loses its data"
                );
                let (batch, next) = self.plan_drop_column(&table, &old_name).await?;
                total.append(
                    self.run_planned(&table.path(), &description, batch, next.clone())
                        .await?,
                );
                table = next;
                let (batch, next) = self.plan_add_column(&table, column).await?;
                total.append(
                    self.run_planned(&table.path(), &description, batch, next.clone())
                        .await?,
                );
                table = next;
            } else {
                let (batch, next) = self.plan_change_column(&table, &old, column).await?;
                total.append(
                    self.run_planned(&table.path(), &description, batch, next.clone())
                        .await?,
                );
                table = next;
            }
        }
        Ok(total)
    }

    // ------------------------------------------------------------------
    // Planning
    // ------------------------------------------------------------------

    fn requires_recreate(&self, old: &Column, new: &Column) -> bool {
        let caps = self.dialect.capabilities();
        old.generated != new.generated
            || old.column_type != new.column_type
            || caps.effective_length(old) != caps.effective_length(new)
            || caps.effective_precision(old) != caps.effective_precision(new)
            || caps.effective_scale(old) != caps.effective_scale(new)
    }

    async fn plan_add_column(&self, table: &Table, column: Column) -> Result<(ChangeBatch, Table)> {
        if table.has_column(&column.name) {
            return Err(SyncError::ColumnExists {
                table: table.path(),
                column: column.name,
            });
        }
        self.check_identity_default(table, &column)?;

        let mut builder = BatchBuilder::new();
        let mut clone = table.clone();
        let referencing = if column.primary {
            self.drop_primary_key_with_references(table, &mut builder)
                .await?
        } else {
            Vec::new()
        };

        builder.push(
            self.dialect.add_column_sql(table, &column),
            self.dialect.drop_column_sql(table, &column.name),
        );
        clone.columns.push(column.clone());

        if column.primary {
            self.add_primary_key(&clone, &mut builder);
            self.restore_references(&mut clone, referencing, &mut builder);
        }
        if column.unique && !clone.has_unique_over(slice::from_ref(&column.name)) {
            self.add_unique_column(&mut clone, &column.name, &mut builder);
        }
        if let Some(comment) = &column.comment {
            builder.push_up(
                self.dialect
                    .column_comment_sql(&clone, &column.name, Some(comment)),
            );
        }
        Ok((builder.finish(), clone))
    }

    async fn plan_drop_column(&self, table: &Table, name: &str) -> Result<(ChangeBatch, Table)> {
        let column = table
            .find_column(name)
            .cloned()
            .ok_or_else(|| Self::column_not_found(table, name))?;
        let caps = self.dialect.capabilities();
        let names_column = |columns: &[String]| columns.iter().any(|c| c == name);

        let mut builder = BatchBuilder::new();
        let mut clone = table.clone();
        let referencing = if column.primary {
            self.drop_primary_key_with_references(table, &mut builder)
                .await?
        } else {
            Vec::new()
        };

        let already_dropped = self.owned_reference_names(table, &referencing);
        let depends = |fk: &ForeignKey| {
            names_column(&fk.columns)
                || (table.is_referenced_by(fk) && names_column(&fk.referenced_columns))
        };
        for foreign_key in table.foreign_keys.iter().filter(|fk| depends(fk)) {
            let fk_name = self.dialect.foreign_key_name(table, foreign_key);
            if already_dropped.contains(&fk_name) {
                continue;
            }
            builder.push(
                self.dialect.drop_foreign_key_sql(table, &fk_name),
                self.dialect.create_foreign_key_sql(table, foreign_key),
            );
        }
        clone.foreign_keys.retain(|fk| !depends(fk));

        for index in table.indices.iter().filter(|i| names_column(&i.columns)) {
            let index_name = self.dialect.index_name(table, index);
            builder.push(
                self.dialect.drop_index_sql(table, &index_name),
                self.dialect.create_index_sql(table, index),
            );
        }
        clone.indices.retain(|i| !names_column(&i.columns));

        if caps.unique_constraints {
            for unique in table.uniques.iter().filter(|u| names_column(&u.columns)) {
                let unique_name = self.dialect.unique_name(table, unique);
                builder.push(
                    self.dialect.drop_unique_constraint_sql(table, &unique_name),
                    self.dialect.create_unique_constraint_sql(table, unique),
                );
            }
        }
        clone.uniques.retain(|u| !names_column(&u.columns));

        for check in table.checks.iter().filter(|c| c.references(name)) {
            let check_name = self.dialect.check_name(table, check);
            builder.push(
                self.dialect.drop_check_sql(table, &check_name),
                self.dialect.create_check_sql(table, check),
            );
        }
        clone.checks.retain(|c| !c.references(name));

        builder.push(
            self.dialect.drop_column_sql(table, name),
            self.dialect.add_column_sql(table, &column),
        );
        clone.remove_column(name);

        if column.primary {
            self.add_primary_key(&clone, &mut builder);
            self.restore_references(&mut clone, referencing, &mut builder);
        }
        Ok((builder.finish(), clone))
    }

    async fn plan_change_column(
        &self,
        table: &Table,
        old: &Column,
        new: Column,
    ) -> Result<(ChangeBatch, Table)> {
        let mut builder = BatchBuilder::new();
        let mut clone = table.clone();

        if old.name != new.name {
            self.plan_column_rename(&mut clone, &old.name, &new.name, &mut builder)
                .await?;
        }

        if old.default != new.default
            || old.nullable != new.nullable
            || old.charset != new.charset
            || old.collation != new.collation
        {
            let mut previous = old.clone();
            previous.name.clone_from(&new.name);
            builder.push(
                self.dialect
                    .alter_column_sql(&clone, &new, old.default.is_some(), !old.nullable),
                self.dialect.alter_column_sql(
                    &clone,
                    &previous,
                    new.default.is_some(),
                    !new.nullable,
                ),
            );
        }

        if old.comment != new.comment {
            builder.push(
                self.dialect
                    .column_comment_sql(&clone, &new.name, new.comment.as_deref()),
                self.dialect
                    .column_comment_sql(&clone, &new.name, old.comment.as_deref()),
            );
        }

        if old.primary != new.primary {
            let referencing = self
                .drop_primary_key_with_references(&clone, &mut builder)
                .await?;
            if let Some(column) = clone.find_column_mut(&new.name) {
                column.primary = new.primary;
            }
            self.add_primary_key(&clone, &mut builder);
            self.restore_references(&mut clone, referencing, &mut builder);
        }

        if old.unique != new.unique {
            if new.unique {
                if !clone.has_unique_over(slice::from_ref(&new.name)) {
                    self.add_unique_column(&mut clone, &new.name, &mut builder);
                }
            } else {
                self.drop_unique_column(&mut clone, &new.name, &mut builder);
            }
        }

        if let Some(column) = clone.find_column_mut(&new.name) {
            *column = new;
        }
        Ok((builder.finish(), clone))
    }

    /// Renames `old` to `new` in `table` and in every object naming it.
    async fn plan_column_rename(
        &self,
        table: &mut Table,
        old: &str,
        new: &str,
        builder: &mut BatchBuilder,
    ) -> Result<()> {
        let naming = self.dialect.naming();
        let pre = table.clone();
        let was_primary = pre.find_column(old).is_some_and(|c| c.primary);
        let referencing = if was_primary {
            self.drop_primary_key_with_references(&pre, builder).await?
        } else {
            Vec::new()
        };

        builder.push_pair(self.dialect.rename_column_sql(&pre, old, new));
        table.rename_column(old, new);

        let already_dropped = self.owned_reference_names(&pre, &referencing);
        if was_primary {
            self.add_primary_key(table, builder);
        }

        for (position, before) in pre.indices.iter().enumerate() {
            if !before.columns.iter().any(|c| c == old) {
                continue;
            }
            let current = self.dialect.index_name(&pre, before);
            let columns = table.indices[position].columns.clone();
            let next = if current == naming.unique_constraint_name(&pre.name, &before.columns) {
                naming.unique_constraint_name(&table.name, &columns)
            } else {
                naming.index_name(
                    &table.name,
                    &columns,
                    table.indices[position].where_clause.as_deref(),
                )
            };
            if next != current {
                builder.push_pair(self.dialect.rename_index_sql(table, &current, &next));
                for unique in &mut table.uniques {
                    if unique.name.as_deref() == Some(current.as_str()) {
                        unique.name = Some(next.clone());
                    }
                }
            }
            table.indices[position].name = Some(next);
        }

        for (position, before) in pre.foreign_keys.iter().enumerate() {
            let self_referencing = pre.is_referenced_by(before);
            let touches_referenced =
                self_referencing && before.referenced_columns.iter().any(|c| c == old);
            if !before.columns.iter().any(|c| c == old) && !touches_referenced {
                continue;
            }
            let current = self.dialect.foreign_key_name(&pre, before);
            let mut renamed = table.foreign_keys[position].clone();
            if self_referencing {
                replace_name(&mut renamed.referenced_columns, old, new);
            }
            let next = naming.foreign_key_name(
                &table.name,
                &renamed.columns,
                &renamed.referenced_table,
                &renamed.referenced_columns,
            );

            // Dropped and recreated around the primary key rebuild.
            if !already_dropped.contains(&current) {
                let mut existing = renamed.clone();
                existing.name = Some(current.clone());
                builder.push(
                    self.dialect.drop_foreign_key_sql(table, &current),
                    self.dialect.create_foreign_key_sql(table, &existing),
                );
                renamed.name = Some(next.clone());
                builder.push(
                    self.dialect.create_foreign_key_sql(table, &renamed),
                    self.dialect.drop_foreign_key_sql(table, &next),
                );
            }
            renamed.name = Some(next);
            table.foreign_keys[position] = renamed;
        }

        if was_primary {
            let referencing = referencing
                .into_iter()
                .map(|mut key| {
                    let touched = key
                        .foreign_key
                        .columns
                        .iter()
                        .chain(&key.foreign_key.referenced_columns)
                        .any(|c| c == old);
                    replace_name(&mut key.foreign_key.referenced_columns, old, new);
                    if touched && key.is_owned_by(&pre) {
                        replace_name(&mut key.foreign_key.columns, old, new);
                        key.foreign_key.name = Some(naming.foreign_key_name(
                            &table.name,
                            &key.foreign_key.columns,
                            &key.foreign_key.referenced_table,
                            &key.foreign_key.referenced_columns,
                        ));
                    }
                    key
                })
                .collect();
            self.restore_references(table, referencing, builder);
        }

        for (position, before) in pre.checks.iter().enumerate() {
            if !before.references(old) {
                continue;
            }
            let current = self.dialect.check_name(&pre, before);
            let mut renamed = table.checks[position].clone();
            let mut existing = renamed.clone();
            existing.name = Some(current.clone());
            builder.push(
                self.dialect.drop_check_sql(table, &current),
                self.dialect.create_check_sql(table, &existing),
            );

            renamed.name = None;
            let next = self.dialect.check_name(table, &renamed);
            renamed.name = Some(next.clone());
            builder.push(
                self.dialect.create_check_sql(table, &renamed),
                self.dialect.drop_check_sql(table, &next),
            );
            table.checks[position] = renamed;
        }

        if self.dialect.capabilities().unique_constraints {
            for (position, before) in pre.uniques.iter().enumerate() {
                if !before.columns.iter().any(|c| c == old) {
                    continue;
                }
                let current = self.dialect.unique_name(&pre, before);
                let mut renamed = table.uniques[position].clone();
                let mut existing = renamed.clone();
                existing.name = Some(current.clone());
                builder.push(
                    self.dialect.drop_unique_constraint_sql(table, &current),
                    self.dialect.create_unique_constraint_sql(table, &existing),
                );

                let next = naming.unique_constraint_name(&table.name, &renamed.columns);
                renamed.name = Some(next.clone());
                builder.push(
                    self.dialect.create_unique_constraint_sql(table, &renamed),
                    self.dialect.drop_unique_constraint_sql(table, &next),
                );
                table.uniques[position] = renamed;
            }
        }
        Ok(())
    }

    /// Backs a single unique column with a unique constraint, or with a
    /// unique index mirrored into `uniques` where the dialect has no unique
    /// constraints.
    fn add_unique_column(&self, table: &mut Table, column: &str, builder: &mut BatchBuilder) {
        let naming = self.dialect.naming();
        let columns = vec![column.to_string()];

        if self.dialect.capabilities().unique_constraints {
            let name = naming.unique_constraint_name(&table.name, &columns);
            let unique = Unique::new(columns).named(name.clone());
            builder.push(
                self.dialect.create_unique_constraint_sql(table, &unique),
                self.dialect.drop_unique_constraint_sql(table, &name),
            );
            table.uniques.push(unique);
            return;
        }

        let name = naming.index_name(&table.name, &columns, None);
        let index = Index::new(columns.clone()).named(name.clone()).unique();
        builder.push(
            self.dialect.create_index_sql(table, &index),
            self.dialect.drop_index_sql(table, &name),
        );
        table.indices.push(index);
        table.uniques.push(Unique::new(columns).named(name));
    }

    /// Removes whatever makes a single column unique.
    fn drop_unique_column(&self, table: &mut Table, column: &str, builder: &mut BatchBuilder) {
        let single = slice::from_ref(&column);

        if let Some(position) = table
            .indices
            .iter()
            .position(|i| i.unique && i.where_clause.is_none() && i.is_single(column))
        {
            let index = table.indices.remove(position);
            let name = self.dialect.index_name(table, &index);
            builder.push(
                self.dialect.drop_index_sql(table, &name),
                self.dialect.create_index_sql(table, &index),
            );
            table
                .uniques
                .retain(|u| u.name.as_deref() != Some(name.as_str()));
        }

        if self.dialect.capabilities().unique_constraints {
            if let Some(position) = table.uniques.iter().position(|u| u.columns == single) {
                let unique = table.uniques.remove(position);
                let name = self.dialect.unique_name(table, &unique);
                builder.push(
                    self.dialect.drop_unique_constraint_sql(table, &name),
                    self.dialect.create_unique_constraint_sql(table, &unique),
                );
            }
        } else {
            table.uniques.retain(|u| u.columns != single);
        }
    }
}
