//! Primary key, foreign key, index and constraint operations.

use std::collections::BTreeSet;

use oxide_ddl::{
    BatchBuilder, ChangeBatch, Check, Dialect, Exclusion, ForeignKey, Index, Table, Unique,
};

use super::TableTarget;
use crate::error::{Result, SyncError};
use crate::runner::SchemaRunner;

impl<D: Dialect> SchemaRunner<D> {
    fn ensure_supported(&self, supported: bool, operation: &'static str) -> Result<()> {
        if supported {
            Ok(())
        } else {
            Err(SyncError::Unsupported {
                dialect: self.dialect.name(),
                operation,
            })
        }
    }

    fn ensure_columns(table: &Table, columns: &[String]) -> Result<()> {
        match columns.iter().find(|c| !table.has_column(c)) {
            Some(missing) => Err(Self::column_not_found(table, missing)),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Primary keys
    // ------------------------------------------------------------------

    /// Adds columns to the primary key, creating it when the table has
    /// none.
    pub async fn create_primary_key(
        &mut self,
        target: impl Into<TableTarget>,
        columns: &[String],
    ) -> Result<ChangeBatch> {
        let table = self.resolve_table(target).await?;
        let mut primary = table.primary_column_names();
        for column in columns {
            if !primary.contains(column) {
                primary.push(column.clone());
            }
        }
        self.set_primary_key(table, &primary).await
    }

    /// Makes exactly `columns` the primary key.
    pub async fn update_primary_keys(
        &mut self,
        target: impl Into<TableTarget>,
        columns: &[String],
    ) -> Result<ChangeBatch> {
        let table = self.resolve_table(target).await?;
        self.set_primary_key(table, columns).await
    }

    /// Drops the primary key. Foreign keys referencing it are restored only
    /// where a unique index still backs their target columns.
    pub async fn drop_primary_key(&mut self, target: impl Into<TableTarget>) -> Result<ChangeBatch> {
        let table = self.resolve_table(target).await?;
        self.set_primary_key(table, &[]).await
    }

    async fn set_primary_key(&mut self, table: Table, columns: &[String]) -> Result<ChangeBatch> {
        Self::ensure_columns(&table, columns)?;
        let current: BTreeSet<String> = table.primary_column_names().into_iter().collect();
        let wanted: BTreeSet<String> = columns.iter().cloned().collect();
        if current == wanted {
            return Ok(ChangeBatch::default());
        }

        let mut builder = BatchBuilder::new();
        let referencing = self
            .drop_primary_key_with_references(&table, &mut builder)
            .await?;
        let mut clone = table.clone();
        clone.set_primary_columns(columns);
        self.add_primary_key(&clone, &mut builder);
        self.restore_references(&mut clone, referencing, &mut builder);

        let path = table.path();
        let description = if columns.is_empty() {
            format!("Drop primary key of {path}")
        } else {
            format!("Set primary key of {path} to ({})", columns.join(", "))
        };
        self.run_planned(&path, &description, builder.finish(), clone)
            .await
    }

    // ------------------------------------------------------------------
    // Foreign keys
    // ------------------------------------------------------------------

    /// Adds a foreign key.
    pub async fn create_foreign_key(
        &mut self,
        target: impl Into<TableTarget>,
        foreign_key: ForeignKey,
    ) -> Result<ChangeBatch> {
        self.create_foreign_keys(target, vec![foreign_key]).await
    }

    /// Adds several foreign keys.
    pub async fn create_foreign_keys(
        &mut self,
        target: impl Into<TableTarget>,
        foreign_keys: Vec<ForeignKey>,
    ) -> Result<ChangeBatch> {
        let table = self.resolve_table(target).await?;
        let mut clone = table.clone();
        let mut builder = BatchBuilder::new();
        for mut foreign_key in foreign_keys {
            Self::ensure_columns(&clone, &foreign_key.columns)?;
            let name = self.dialect.foreign_key_name(&clone, &foreign_key);
            foreign_key.name = Some(name.clone());
            builder.push(
                self.dialect.create_foreign_key_sql(&clone, &foreign_key),
                self.dialect.drop_foreign_key_sql(&clone, &name),
            );
            clone.foreign_keys.push(foreign_key);
        }
        let path = table.path();
        self.run_planned(
            &path,
            &format!("Create foreign keys on {path}"),
            builder.finish(),
            clone,
        )
        .await
    }

    /// Drops a foreign key by name.
    pub async fn drop_foreign_key(
        &mut self,
        target: impl Into<TableTarget>,
        name: &str,
    ) -> Result<ChangeBatch> {
        self.drop_foreign_keys(target, &[name]).await
    }

    /// Drops several foreign keys by name.
    pub async fn drop_foreign_keys(
        &mut self,
        target: impl Into<TableTarget>,
        names: &[&str],
    ) -> Result<ChangeBatch> {
        let table = self.resolve_table(target).await?;
        let mut clone = table.clone();
        let mut builder = BatchBuilder::new();
        for &name in names {
            let position = clone
                .foreign_keys
                .iter()
                .position(|fk| self.dialect.foreign_key_name(&clone, fk) == name)
                .ok_or_else(|| SyncError::ForeignKeyNotFound {
                    table: table.path(),
                    name: name.to_string(),
                })?;
            let foreign_key = clone.foreign_keys.remove(position);
            builder.push(
                self.dialect.drop_foreign_key_sql(&clone, name),
                self.dialect.create_foreign_key_sql(&clone, &foreign_key),
            );
        }
        let path = table.path();
        self.run_planned(
            &path,
            &format!("Drop foreign keys on {path}"),
            builder.finish(),
            clone,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Indices
    // ------------------------------------------------------------------

    /// Creates an index.
    pub async fn create_index(
        &mut self,
        target: impl Into<TableTarget>,
        index: Index,
    ) -> Result<ChangeBatch> {
        self.create_indices(target, vec![index]).await
    }

    /// Creates several indices.
    pub async fn create_indices(
        &mut self,
        target: impl Into<TableTarget>,
        indices: Vec<Index>,
    ) -> Result<ChangeBatch> {
        let table = self.resolve_table(target).await?;
        let mut clone = table.clone();
        let mut builder = BatchBuilder::new();
        for mut index in indices {
            Self::ensure_columns(&clone, &index.columns)?;
            let name = self.dialect.index_name(&clone, &index);
            index.name = Some(name.clone());
            builder.push(
                self.dialect.create_index_sql(&clone, &index),
                self.dialect.drop_index_sql(&clone, &name),
            );
            clone.indices.push(index);
        }
        let path = table.path();
        self.run_planned(
            &path,
            &format!("Create indices on {path}"),
            builder.finish(),
            clone,
        )
        .await
    }

    /// Drops an index by name. A unique index mirrored into the table's
    /// unique constraints takes the mirror with it.
    pub async fn drop_index(
        &mut self,
        target: impl Into<TableTarget>,
        name: &str,
    ) -> Result<ChangeBatch> {
        self.drop_indices(target, &[name]).await
    }

    /// Drops several indices by name.
    pub async fn drop_indices(
        &mut self,
        target: impl Into<TableTarget>,
        names: &[&str],
    ) -> Result<ChangeBatch> {
        let table = self.resolve_table(target).await?;
        let mut clone = table.clone();
        let mut builder = BatchBuilder::new();
        for &name in names {
            let position = clone
                .indices
                .iter()
                .position(|i| self.dialect.index_name(&clone, i) == name)
                .ok_or_else(|| SyncError::IndexNotFound {
                    table: table.path(),
                    name: name.to_string(),
                })?;
            let index = clone.indices.remove(position);
            builder.push(
                self.dialect.drop_index_sql(&clone, name),
                self.dialect.create_index_sql(&clone, &index),
            );

            if !self.dialect.capabilities().unique_constraints {
                clone.remove_unique(name);
            }
            if let [column] = index.columns.as_slice() {
                if index.unique && !clone.has_unique_over(&index.columns) {
                    if let Some(column) = clone.find_column_mut(column) {
                        column.unique = false;
                    }
                }
            }
        }
        let path = table.path();
        self.run_planned(
            &path,
            &format!("Drop indices on {path}"),
            builder.finish(),
            clone,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Check constraints
    // ------------------------------------------------------------------

    /// Adds a check constraint.
    pub async fn create_check_constraint(
        &mut self,
        target: impl Into<TableTarget>,
        check: Check,
    ) -> Result<ChangeBatch> {
        self.create_check_constraints(target, vec![check]).await
    }

    /// Adds several check constraints.
    pub async fn create_check_constraints(
        &mut self,
        target: impl Into<TableTarget>,
        checks: Vec<Check>,
    ) -> Result<ChangeBatch> {
        let table = self.resolve_table(target).await?;
        let mut clone = table.clone();
        let mut builder = BatchBuilder::new();
        for mut check in checks {
            let name = self.dialect.check_name(&clone, &check);
            check.name = Some(name.clone());
            builder.push(
                self.dialect.create_check_sql(&clone, &check),
                self.dialect.drop_check_sql(&clone, &name),
            );
            clone.checks.push(check);
        }
        let path = table.path();
        self.run_planned(
            &path,
            &format!("Create check constraints on {path}"),
            builder.finish(),
            clone,
        )
        .await
    }

    /// Drops a check constraint by name.
    pub async fn drop_check_constraint(
        &mut self,
        target: impl Into<TableTarget>,
        name: &str,
    ) -> Result<ChangeBatch> {
        self.drop_check_constraints(target, &[name]).await
    }

    /// Drops several check constraints by name.
    pub async fn drop_check_constraints(
        &mut self,
        target: impl Into<TableTarget>,
        names: &[&str],
    ) -> Result<ChangeBatch> {
        let table = self.resolve_table(target).await?;
        let mut clone = table.clone();
        let mut builder = BatchBuilder::new();
        for &name in names {
            let position = clone
                .checks
                .iter()
                .position(|c| self.dialect.check_name(&clone, c) == name)
                .ok_or_else(|| SyncError::CheckNotFound {
                    table: table.path(),
                    name: name.to_string(),
                })?;
            let check = clone.checks.remove(position);
            builder.push(
                self.dialect.drop_check_sql(&clone, name),
                self.dialect.create_check_sql(&clone, &check),
            );
        }
        let path = table.path();
        self.run_planned(
            &path,
            &format!("Drop check constraints on {path}"),
            builder.finish(),
            clone,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Unique constraints
    // ------------------------------------------------------------------

    /// Adds a native unique constraint. Dialects without them reject the
    /// call before any statement is sent; use a unique index instead.
    pub async fn create_unique_constraint(
        &mut self,
        target: impl Into<TableTarget>,
        unique: Unique,
    ) -> Result<ChangeBatch> {
        self.create_unique_constraints(target, vec![unique]).await
    }

    /// Adds several native unique constraints.
    pub async fn create_unique_constraints(
        &mut self,
        target: impl Into<TableTarget>,
        uniques: Vec<Unique>,
    ) -> Result<ChangeBatch> {
        self.ensure_supported(
            self.dialect.capabilities().unique_constraints,
            "unique constraints",
        )?;
        let table = self.resolve_table(target).await?;
        let mut clone = table.clone();
        let mut builder = BatchBuilder::new();
        for mut unique in uniques {
            Self::ensure_columns(&clone, &unique.columns)?;
            let name = self.dialect.unique_name(&clone, &unique);
            unique.name = Some(name.clone());
            builder.push(
                self.dialect.create_unique_constraint_sql(&clone, &unique),
                self.dialect.drop_unique_constraint_sql(&clone, &name),
            );
            clone.uniques.push(unique);
        }
        let path = table.path();
        self.run_planned(
            &path,
            &format!("Create unique constraints on {path}"),
            builder.finish(),
            clone,
        )
        .await
    }

    /// Drops a native unique constraint by name.
    pub async fn drop_unique_constraint(
        &mut self,
        target: impl Into<TableTarget>,
        name: &str,
    ) -> Result<ChangeBatch> {
        self.drop_unique_constraints(target, &[name]).await
    }

    /// Drops several native unique constraints by name.
    pub async fn drop_unique_constraints(
        &mut self,
        target: impl Into<TableTarget>,
        names: &[&str],
    ) -> Result<ChangeBatch> {
        self.ensure_supported(
            self.dialect.capabilities().unique_constraints,
            "unique constraints",
        )?;
        let table = self.resolve_table(target).await?;
        let mut clone = table.clone();
        let mut builder = BatchBuilder::new();
        for &name in names {
            let position = clone
                .uniques
                .iter()
                .position(|u| self.dialect.unique_name(&clone, u) == name)
                .ok_or_else(|| SyncError::UniqueNotFound {
                    table: table.path(),
                    name: name.to_string(),
                })?;
            let unique = clone.uniques.remove(position);
            builder.push(
                self.dialect.drop_unique_constraint_sql(&clone, name),
                self.dialect.create_unique_constraint_sql(&clone, &unique),
            );
        }
        let path = table.path();
        self.run_planned(
            &path,
            &format!("Drop unique constraints on {path}"),
            builder.finish(),
            clone,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Exclusion constraints
    // ------------------------------------------------------------------

    /// Adds an exclusion constraint.
    pub async fn create_exclusion_constraint(
        &mut self,
        target: impl Into<TableTarget>,
        mut exclusion: Exclusion,
    ) -> Result<ChangeBatch> {
        self.ensure_supported(
            self.dialect.capabilities().exclusion_constraints,
            "exclusion constraints",
        )?;
        let table = self.resolve_table(target).await?;
        let mut clone = table.clone();
        let name = self.dialect.exclusion_name(&clone, &exclusion);
        exclusion.name = Some(name.clone());

        let mut builder = BatchBuilder::new();
        builder.push(
            self.dialect.create_exclusion_sql(&clone, &exclusion),
            self.dialect.drop_exclusion_sql(&clone, &name),
        );
        clone.exclusions.push(exclusion);

        let path = table.path();
        self.run_planned(
            &path,
            &format!("Create exclusion constraint {name} on {path}"),
            builder.finish(),
            clone,
        )
        .await
    }

    /// Drops an exclusion constraint by name.
    pub async fn drop_exclusion_constraint(
        &mut self,
        target: impl Into<TableTarget>,
        name: &str,
    ) -> Result<ChangeBatch> {
        self.ensure_supported(
            self.dialect.capabilities().exclusion_constraints,
            "exclusion constraints",
        )?;
        let table = self.resolve_table(target).await?;
        let mut clone = table.clone();
        let position = clone
            .exclusions
            .iter()
            .position(|e| self.dialect.exclusion_name(&clone, e) == name)
            .ok_or_else(|| SyncError::ExclusionNotFound {
                table: table.path(),
                name: name.to_string(),
            })?;
        let exclusion = clone.exclusions.remove(position);

        let mut builder = BatchBuilder::new();
        builder.push(
            self.dialect.drop_exclusion_sql(&clone, name),
            self.dialect.create_exclusion_sql(&clone, &exclusion),
        );

        let path = table.path();
        self.run_planned(
            &path,
            &format!("Drop exclusion constraint {name} on {path}"),
            builder.finish(),
            clone,
        )
        .await
    }
}
