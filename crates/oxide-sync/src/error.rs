//! Error types for schema synchronization.

use oxide_ddl::SqlValue;

/// Boxed error returned by a database session.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while running schema changes.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The runner was released and can no longer run statements.
    #[error("Query runner already released")]
    AlreadyReleased,

    /// A transaction is already active.
    #[error("Transaction already started")]
    TransactionAlreadyStarted,

    /// No transaction is active.
    #[error("Transaction not started")]
    TransactionNotStarted,

    /// The database rejected a statement.
    #[error("Query failed: {source}\n  query: {query}\n  parameters: {parameters:?}")]
    QueryFailed {
        /// The failing SQL.
        query: String,
        /// Bound parameters.
        parameters: Vec<SqlValue>,
        /// Driver error.
        #[source]
        source: BoxError,
    },

    /// The dialect cannot represent the requested object.
    #[error("{operation} is not supported by the {dialect} dialect")]
    Unsupported {
        /// Dialect name.
        dialect: &'static str,
        /// Rejected operation.
        operation: &'static str,
    },

    /// Table not found in the cache or the catalog.
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    /// View not found in the cache or the metadata table.
    #[error("View '{0}' does not exist")]
    ViewNotFound(String),

    /// Column not found in the table.
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound {
        /// Table path.
        table: String,
        /// Column name.
        column: String,
    },

    /// A column with that name already exists.
    #[error("Column '{column}' already exists in table '{table}'")]
    ColumnExists {
        /// Table path.
        table: String,
        /// Column name.
        column: String,
    },

    /// Index not found in the table.
    #[error("Index '{name}' not found in table '{table}'")]
    IndexNotFound {
        /// Table path.
        table: String,
        /// Index name.
        name: String,
    },

    /// Foreign key not found in the table.
    #[error("Foreign key '{name}' not found in table '{table}'")]
    ForeignKeyNotFound {
        /// Table path.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Check constraint not found in the table.
    #[error("Check constraint '{name}' not found in table '{table}'")]
    CheckNotFound {
        /// Table path.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Unique constraint not found in the table.
    #[error("Unique constraint '{name}' not found in table '{table}'")]
    UniqueNotFound {
        /// Table path.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// Exclusion constraint not found in the table.
    #[error("Exclusion constraint '{name}' not found in table '{table}'")]
    ExclusionNotFound {
        /// Table path.
        table: String,
        /// Constraint name.
        name: String,
    },

    /// A column definition breaks a dialect rule.
    #[error("Invalid column '{column}' in table '{table}': {reason}")]
    InvalidColumn {
        /// Table path.
        table: String,
        /// Column name.
        column: String,
        /// What is wrong.
        reason: String,
    },

    /// The session task stopped before answering.
    #[error("Session channel closed")]
    ChannelClosed,

    /// Database error while acquiring a session.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for schema synchronization.
pub type Result<T> = std::result::Result<T, SyncError>;
