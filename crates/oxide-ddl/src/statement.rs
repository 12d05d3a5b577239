//! SQL statements and reversible change batches.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A value bound to a statement parameter or read from a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Returns true for NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text content, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer, parsing text when needed.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => s.trim().parse().ok(),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Renders the value as text, `None` for NULL.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            other => write!(f, "{}", other.to_text().unwrap_or_default()),
        }
    }
}

/// A SQL statement with positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// SQL text with `?` placeholders.
    pub sql: String,
    /// Bound parameters, in placeholder order.
    #[serde(default)]
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Creates a statement without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Binds the next parameter.
    #[must_use]
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Binds several parameters.
    #[must_use]
    pub fn bind_all<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.params.extend(values.into_iter().map(Into::into));
        self
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// A forward statement together with the statement that undoes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementPair {
    /// Applies the change.
    pub up: Statement,
    /// Reverts the change.
    pub down: Statement,
}

impl StatementPair {
    /// Creates a pair.
    #[must_use]
    pub const fn new(up: Statement, down: Statement) -> Self {
        Self { up, down }
    }

    /// Returns the pair with both directions swapped.
    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            up: self.down,
            down: self.up,
        }
    }
}

/// Ordered forward statements and the statements that revert them.
///
/// `down` is in execution order: running it after `up` restores the
/// original state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    /// Forward statements.
    pub up: Vec<Statement>,
    /// Reverse statements.
    pub down: Vec<Statement>,
}

impl ChangeBatch {
    /// Returns true when the batch holds no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.up.is_empty() && self.down.is_empty()
    }

    /// Appends a batch that runs after this one. Its reverse statements run
    /// before ours.
    pub fn append(&mut self, later: Self) {
        self.up.extend(later.up);
        let mut down = later.down;
        down.append(&mut self.down);
        self.down = down;
    }

    /// Returns the forward SQL texts.
    #[must_use]
    pub fn up_sql(&self) -> Vec<&str> {
        self.up.iter().map(|s| s.sql.as_str()).collect()
    }

    /// Returns the reverse SQL texts.
    #[must_use]
    pub fn down_sql(&self) -> Vec<&str> {
        self.down.iter().map(|s| s.sql.as_str()).collect()
    }
}

/// Collects statement pairs in forward order and produces a [`ChangeBatch`]
/// whose reverse statements run in mirror order.
#[derive(Debug, Default)]
pub struct BatchBuilder {
    up: Vec<Statement>,
    down: Vec<Statement>,
}

impl BatchBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a forward statement and its inverse.
    pub fn push(&mut self, up: Statement, down: Statement) {
        self.up.push(up);
        self.down.push(down);
    }

    /// Adds a statement pair.
    pub fn push_pair(&mut self, pair: StatementPair) {
        self.push(pair.up, pair.down);
    }

    /// Adds a forward statement with no inverse.
    pub fn push_up(&mut self, up: Statement) {
        self.up.push(up);
    }

    /// Adds an inverse with no forward statement.
    pub fn push_down(&mut self, down: Statement) {
        self.down.push(down);
    }

    /// Finishes the batch.
    #[must_use]
    pub fn finish(self) -> ChangeBatch {
        let mut down = self.down;
        down.reverse();
        ChangeBatch { up: self.up, down }
    }
}
