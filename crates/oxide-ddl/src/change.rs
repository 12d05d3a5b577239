//! Schema change intents.
//!
//! Each variant is one structural change a runner can plan and execute. The
//! runner turns it into a [`ChangeBatch`](crate::ChangeBatch) of forward and
//! reverse statements.

use serde::{Deserialize, Serialize};

use crate::schema::{Check, Column, Exclusion, ForeignKey, Index, Table, Unique, View};

/// A single structural change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaChange {
    /// Create a table.
    CreateTable {
        /// Table definition.
        table: Table,
        /// Skip when the table already exists.
        #[serde(default)]
        if_not_exists: bool,
        /// Create foreign keys inline.
        #[serde(default = "enabled")]
        foreign_keys: bool,
        /// Create indices.
        #[serde(default = "enabled")]
        indices: bool,
    },

    /// Drop a table.
    DropTable {
        /// Table path.
        table: String,
        /// Skip when the table does not exist.
        #[serde(default)]
        if_exists: bool,
        /// Drop the table's foreign keys first.
        #[serde(default = "enabled")]
        foreign_keys: bool,
        /// Drop the table's indices first.
        #[serde(default = "enabled")]
        indices: bool,
    },

    /// Rename a table.
    RenameTable {
        /// Current table path.
        table: String,
        /// New bare name.
        new_name: String,
    },

    /// Add a column.
    AddColumn {
        /// Table path.
        table: String,
        /// Column definition.
        column: Column,
    },

    /// Drop a column.
    DropColumn {
        /// Table path.
        table: String,
        /// Column name.
        column: String,
    },

    /// Rename a column.
    RenameColumn {
        /// Table path.
        table: String,
        /// Current column name.
        old_name: String,
        /// New column name.
        new_name: String,
    },

    /// Change a column definition.
    ChangeColumn {
        /// Table path.
        table: String,
        /// Current column name.
        old_name: String,
        /// New definition.
        column: Column,
    },

    /// Add columns to the primary key.
    CreatePrimaryKey {
        /// Table path.
        table: String,
        /// Columns to mark as primary.
        columns: Vec<String>,
    },

    /// Replace the primary key columns.
    UpdatePrimaryKeys {
        /// Table path.
        table: String,
        /// The complete new primary key.
        columns: Vec<String>,
    },

    /// Drop the primary key.
    DropPrimaryKey {
        /// Table path.
        table: String,
    },

    /// Create a foreign key.
    CreateForeignKey {
        /// Table path.
        table: String,
        /// Foreign key definition.
        foreign_key: ForeignKey,
    },

    /// Drop a foreign key.
    DropForeignKey {
        /// Table path.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Create an index.
    CreateIndex {
        /// Table path.
        table: String,
        /// Index definition.
        index: Index,
    },

    /// Drop an index.
    DropIndex {
        /// Table path.
        table: String,
        /// Index name.
        name: String,
    },

    /// Create a check constraint.
    CreateCheckConstraint {
        /// Table path.
        table: String,
        /// Check definition.
        check: Check,
    },

    /// Drop a check constraint.
    DropCheckConstraint {
        /// Table path.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Create a unique constraint.
    CreateUniqueConstraint {
        /// Table path.
        table: String,
        /// Unique definition.
        unique: Unique,
    },

    /// Drop a unique constraint.
    DropUniqueConstraint {
        /// Table path.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Create an exclusion constraint.
    CreateExclusionConstraint {
        /// Table path.
        table: String,
        /// Exclusion definition.
        exclusion: Exclusion,
    },

    /// Drop an exclusion constraint.
    DropExclusionConstraint {
        /// Table path.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Create a view.
    CreateView {
        /// View definition.
        view: View,
    },

    /// Drop a view.
    DropView {
        /// View path.
        view: String,
    },
}

const fn enabled() -> bool {
    true
}

impl SchemaChange {
    /// Create-table change with default options.
    #[must_use]
    pub fn create_table(table: Table) -> Self {
        Self::CreateTable {
            table,
            if_not_exists: false,
            foreign_keys: true,
            indices: true,
        }
    }

    /// Drop-table change with default options.
    #[must_use]
    pub fn drop_table(table: impl Into<String>) -> Self {
        Self::DropTable {
            table: table.into(),
            if_exists: false,
            foreign_keys: true,
            indices: true,
        }
    }

    /// Add-column change.
    #[must_use]
    pub fn add_column(table: impl Into<String>, column: Column) -> Self {
        Self::AddColumn {
            table: table.into(),
            column,
        }
    }

    /// Drop-column change.
    #[must_use]
    pub fn drop_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::DropColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Rename-column change.
    #[must_use]
    pub fn rename_column(
        table: impl Into<String>,
        old_name: impl Into<String>,
        new_name: impl Into<String>,
    ) -> Self {
        Self::RenameColumn {
            table: table.into(),
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }

    /// Change-column change.
    #[must_use]
    pub fn change_column(
        table: impl Into<String>,
        old_name: impl Into<String>,
        column: Column,
    ) -> Self {
        Self::ChangeColumn {
            table: table.into(),
            old_name: old_name.into(),
            column,
        }
    }

    /// Returns the path of the table or view this change targets.
    #[must_use]
    pub fn target(&self) -> String {
        match self {
            Self::CreateTable { table, .. } => table.path(),
            Self::CreateView { view } => view.path(),
            Self::DropView { view } => view.clone(),
            Self::DropTable { table, .. }
            | Self::RenameTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::RenameColumn { table, .. }
            | Self::ChangeColumn { table, .. }
            | Self::CreatePrimaryKey { table, .. }
            | Self::UpdatePrimaryKeys { table, .. }
            | Self::DropPrimaryKey { table }
            | Self::CreateForeignKey { table, .. }
            | Self::DropForeignKey { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::CreateCheckConstraint { table, .. }
            | Self::DropCheckConstraint { table, .. }
            | Self::CreateUniqueConstraint { table, .. }
            | Self::DropUniqueConstraint { table, .. }
            | Self::CreateExclusionConstraint { table, .. }
            | Self::DropExclusionConstraint { table, .. } => table.clone(),
        }
    }

    /// Returns a human-readable description of the change.
    #[must_use]
    pub fn description(&self) -> String {
        let target = self.target();
        match self {
            Self::CreateTable { .. } => format!("Create table {target}"),
            Self::DropTable { .. } => format!("Drop table {target}"),
            Self::RenameTable { new_name, .. } => format!("Rename table {target} to {new_name}"),
            Self::AddColumn { column, .. } => format!("Add column {} to {target}", column.name),
            Self::DropColumn { column, .. } => format!("Drop column {column} from {target}"),
            Self::RenameColumn {
                old_name, new_name, ..
            } => format!("Rename column {target}.{old_name} to {new_name}"),
            Self::ChangeColumn { old_name, .. } => format!("Change column {target}.{old_name}"),
            Self::CreatePrimaryKey { columns, .. } => {
                format!("Create primary key on {target} ({})", columns.join(", "))
            }
            Self::UpdatePrimaryKeys { columns, .. } => {
                format!("Update primary key on {target} ({})", columns.join(", "))
            }
            Self::DropPrimaryKey { .. } => format!("Drop primary key on {target}"),
            Self::CreateForeignKey { foreign_key, .. } => format!(
                "Create foreign key on {target} referencing {}",
                foreign_key.referenced_path()
            ),
            Self::DropForeignKey { name, .. } => format!("Drop foreign key {name} on {target}"),
            Self::CreateIndex { index, .. } => {
                format!("Create index on {target} ({})", index.columns.join(", "))
            }
            Self::DropIndex { name, .. } => format!("Drop index {name} on {target}"),
            Self::CreateCheckConstraint { check, .. } => {
                format!("Create check {} on {target}", check.expression)
            }
            Self::DropCheckConstraint { name, .. } => format!("Drop check {name} on {target}"),
            Self::CreateUniqueConstraint { unique, .. } => {
                format!("Create unique on {target} ({})", unique.columns.join(", "))
            }
            Self::DropUniqueConstraint { name, .. } => format!("Drop unique {name} on {target}"),
            Self::CreateExclusionConstraint { exclusion, .. } => {
                format!("Create exclusion {} on {target}", exclusion.expression)
            }
            Self::DropExclusionConstraint { name, .. } => {
                format!("Drop exclusion {name} on {target}")
            }
            Self::CreateView { .. } => format!("Create view {target}"),
            Self::DropView { .. } => format!("Drop view {target}"),
        }
    }
}
