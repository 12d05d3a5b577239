//! Database sessions.
//!
//! A [`SessionPool`] hands out [`Session`]s. A session is one live
//! connection; the query channel owns exactly one and runs every statement
//! on it.

use async_trait::async_trait;
use oxide_ddl::{SqlValue, Statement};

use crate::error::{BoxError, Result};

/// One result row, as ordered (column, value) pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, SqlValue)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    /// Appends a field.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.fields.push((column.into(), value.into()));
    }

    /// Returns a field by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
            })
            .map(|(_, value)| value)
    }

    /// Returns a field as text, `None` for NULL or a missing column.
    #[must_use]
    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(SqlValue::to_text)
    }

    /// Returns a field as an integer.
    #[must_use]
    pub fn int(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    /// Returns true when a `TRUE`/`FALSE` flag field is set.
    #[must_use]
    pub fn flag(&self, column: &str) -> bool {
        match self.get(column) {
            Some(SqlValue::Bool(b)) => *b,
            Some(SqlValue::Int(i)) => *i != 0,
            Some(SqlValue::Text(s)) => s.eq_ignore_ascii_case("TRUE"),
            _ => false,
        }
    }

    /// Returns the first field's value.
    #[must_use]
    pub fn first(&self) -> Option<&SqlValue> {
        self.fields.first().map(|(_, value)| value)
    }

    /// Iterates over the fields.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// What a session returns for one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Result rows.
    pub rows: Vec<Row>,
    /// Rows affected by a data-changing statement.
    pub affected: u64,
}

/// A single live database connection.
#[async_trait]
pub trait Session: Send {
    /// Runs one statement to completion.
    async fn execute(&mut self, statement: &Statement) -> std::result::Result<QueryOutput, BoxError>;

    /// Returns the connection to its pool.
    async fn close(self: Box<Self>);
}

/// Source of sessions.
#[async_trait]
pub trait SessionPool: Send + Sync {
    /// Acquires a session.
    async fn acquire(&self) -> Result<Box<dyn Session>>;
}
