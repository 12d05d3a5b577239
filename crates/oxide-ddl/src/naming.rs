//! Constraint and index naming.
//!
//! Names that are not supplied explicitly are derived from the table and
//! column names. Derivation is a pure function of its inputs, so a name
//! computed today can be recomputed tomorrow to drop the same object.

use std::fmt::Debug;

use sha2::{Digest, Sha256};

/// Derives names for constraints and indices.
///
/// `table` is always the bare table name, without schema.
pub trait NamingStrategy: Debug + Send + Sync {
    /// Name of the primary key constraint over `columns`.
    fn primary_key_name(&self, table: &str, columns: &[String]) -> String;

    /// Name of an index over `columns`, optionally partial.
    fn index_name(&self, table: &str, columns: &[String], where_clause: Option<&str>) -> String;

    /// Name of a unique constraint over `columns`.
    fn unique_constraint_name(&self, table: &str, columns: &[String]) -> String;

    /// Name of a foreign key from `columns` to `referenced_table`.
    fn foreign_key_name(
        &self,
        table: &str,
        columns: &[String],
        referenced_table: &str,
        referenced_columns: &[String],
    ) -> String;

    /// Name of a check constraint with the given expression.
    fn check_constraint_name(&self, table: &str, expression: &str) -> String;

    /// Name of an exclusion constraint with the given expression.
    fn exclusion_constraint_name(&self, table: &str, expression: &str) -> String;
}

/// Readable `prefix_table_columns` names, shortened with a hash suffix when
/// they exceed the identifier limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultNamingStrategy {
    max_length: usize,
}

impl DefaultNamingStrategy {
    /// Identifier limit portable across the supported databases.
    pub const MAX_LENGTH: usize = 63;

    /// Creates a strategy with the default identifier limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_length: Self::MAX_LENGTH,
        }
    }

    /// Sets the maximum identifier length.
    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    fn compose(&self, prefix: &str, table: &str, columns: &[String], tail: &[&str]) -> String {
        let mut sorted: Vec<&str> = columns.iter().map(String::as_str).collect();
        sorted.sort_unstable();

        let mut name = format!("{prefix}_{table}");
        for part in sorted.iter().chain(tail) {
            name.push('_');
            name.push_str(part);
        }
        self.fit(name)
    }

    fn fit(&self, name: String) -> String {
        if name.len() <= self.max_length {
            return name;
        }
        let hash = short_hash(&name);
        let mut cut = self.max_length.saturating_sub(hash.len() + 1);
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}_{hash}", &name[..cut])
    }
}

impl Default for DefaultNamingStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl NamingStrategy for DefaultNamingStrategy {
    fn primary_key_name(&self, table: &str, columns: &[String]) -> String {
        self.compose("pk", table, columns, &[])
    }

    fn index_name(&self, table: &str, columns: &[String], where_clause: Option<&str>) -> String {
        match where_clause {
            Some(predicate) => self.compose("idx", table, columns, &[short_hash(predicate).as_str()]),
            None => self.compose("idx", table, columns, &[]),
        }
    }

    fn unique_constraint_name(&self, table: &str, columns: &[String]) -> String {
        self.compose("uq", table, columns, &[])
    }

    fn foreign_key_name(
        &self,
        table: &str,
        columns: &[String],
        referenced_table: &str,
        _referenced_columns: &[String],
    ) -> String {
        self.compose("fk", table, columns, &[referenced_table])
    }

    fn check_constraint_name(&self, table: &str, expression: &str) -> String {
        self.compose("chk", table, &[], &[short_hash(expression).as_str()])
    }

    fn exclusion_constraint_name(&self, table: &str, expression: &str) -> String {
        self.compose("xcl", table, &[], &[short_hash(expression).as_str()])
    }
}

/// First ten hex digits of the SHA-256 of `input`.
#[must_use]
pub fn short_hash(input: &str) -> String {
    Sha256::digest(input.as_bytes())
        .iter()
        .take(5)
        .map(|b| format!("{b:02x}"))
        .collect()
}
