//! Schema model and dialect-aware DDL generation.
//!
//! `oxide-ddl` is the I/O-free half of schema synchronization:
//!
//! - **Schema model** - [`Table`], [`Column`], [`Index`], [`ForeignKey`],
//!   [`Unique`], [`Check`], [`Exclusion`] and [`View`] value types
//! - **Naming** - deterministic names for constraints and indices
//! - **Dialects** - capability policy, DDL statement builder and catalog
//!   queries behind the [`Dialect`] trait
//! - **Batches** - [`ChangeBatch`] pairs forward statements with the
//!   statements that undo them
//!
//! # Example
//!
//! ```rust
//! use oxide_ddl::prelude::*;
//!
//! let dialect = HanaDialect::new();
//! let table = Table::new("t").column(Column::new("id", "integer").primary());
//! let email = Column::new("email", "varchar").unique();
//!
//! let add = dialect.add_column_sql(&table, &email);
//! assert_eq!(add.sql, r#"ALTER TABLE "t" ADD ("email" varchar(255))"#);
//! ```

pub mod change;
pub mod dialect;
pub mod naming;
pub mod schema;
pub mod statement;

pub use change::SchemaChange;
pub use dialect::{Capabilities, Dialect, HanaDialect, IsolationLevel, TypeDefaults};
pub use naming::{DefaultNamingStrategy, NamingStrategy};
pub use schema::{
    Check, Column, Exclusion, ForeignKey, ForeignKeyAction, GenerationStrategy, Index, Table,
    Unique, View,
};
pub use statement::{BatchBuilder, ChangeBatch, SqlValue, Statement, StatementPair};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::change::SchemaChange;
    pub use crate::dialect::{Capabilities, Dialect, HanaDialect, IsolationLevel};
    pub use crate::naming::{DefaultNamingStrategy, NamingStrategy};
    pub use crate::schema::{
        Check, Column, Exclusion, ForeignKey, ForeignKeyAction, GenerationStrategy, Index,
        Table, Unique, View,
    };
    pub use crate::statement::{BatchBuilder, ChangeBatch, SqlValue, Statement, StatementPair};
}
