//! Schema model.
//!
//! Plain value types describing tables, columns, indices, constraints and
//! views. A planner clones a [`Table`] before changing it, so the untouched
//! clone is still around when the reverse statements are built.

use std::collections::BTreeSet;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Splits a `schema.name` path into its optional schema and bare name.
#[must_use]
pub fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, path),
    }
}

/// Joins an optional schema and a name into a `schema.name` path.
#[must_use]
pub fn join_path(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{schema}.{name}"),
        None => name.to_string(),
    }
}

/// Replaces every occurrence of the identifier `old` in a SQL expression,
/// quoted or bare, with `new`.
#[must_use]
pub fn rename_identifier(expression: &str, old: &str, new: &str) -> String {
    let pattern = format!(r#""{0}"|\b{0}\b"#, regex::escape(old));
    let Ok(re) = Regex::new(&pattern) else {
        return expression.to_string();
    };
    re.replace_all(expression, |caps: &Captures<'_>| {
        if caps[0].starts_with('"') {
            format!("\"{new}\"")
        } else {
            new.to_string()
        }
    })
    .into_owned()
}

fn replace_name(names: &mut [String], old: &str, new: &str) {
    for name in names.iter_mut().filter(|name| name.as_str() == old) {
        *name = new.to_string();
    }
}

fn same_set(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

/// Foreign key action (ON DELETE, ON UPDATE).
///
/// The model always stores the logical action. Dialects without `NO ACTION`
/// remap it when the statement is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action.
    #[default]
    NoAction,
    /// Reject the change immediately.
    Restrict,
    /// Propagate the change.
    Cascade,
    /// Set referencing columns to NULL.
    SetNull,
    /// Set referencing columns to their default.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL keyword for this action.
    #[must_use]
    pub const fn to_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses a referential rule as reported by a catalog.
    #[must_use]
    pub fn from_sql(rule: &str) -> Option<Self> {
        match rule.trim().to_ascii_uppercase().as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

/// How a generated column obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// Auto-incrementing number.
    Increment,
    /// Database identity column.
    Identity,
    /// Generated UUID, filled in by the application or a default.
    Uuid,
}

impl GenerationStrategy {
    /// Returns true when the database backs this strategy with an identity.
    #[must_use]
    pub const fn is_identity(self) -> bool {
        matches!(self, Self::Increment | Self::Identity)
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Dialect-neutral type token, lowercase (`varchar`, `integer`, ...).
    #[serde(rename = "type")]
    pub column_type: String,
    /// Explicit length for character and binary types.
    #[serde(default)]
    pub length: Option<u32>,
    /// Numeric precision.
    #[serde(default)]
    pub precision: Option<u32>,
    /// Numeric scale.
    #[serde(default)]
    pub scale: Option<u32>,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Default value as a literal SQL expression.
    #[serde(default)]
    pub default: Option<String>,
    /// Whether the column is part of the primary key.
    #[serde(default)]
    pub primary: bool,
    /// Whether the column holds unique values.
    #[serde(default)]
    pub unique: bool,
    /// Generation strategy, when the column is generated.
    #[serde(default)]
    pub generated: Option<GenerationStrategy>,
    /// Character set.
    #[serde(default)]
    pub charset: Option<String>,
    /// Collation.
    #[serde(default)]
    pub collation: Option<String>,
    /// Column comment.
    #[serde(default)]
    pub comment: Option<String>,
}

impl Column {
    /// Creates a nullable column of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into().to_lowercase(),
            length: None,
            precision: None,
            scale: None,
            nullable: true,
            default: None,
            primary: false,
            unique: false,
            generated: None,
            charset: None,
            collation: None,
            comment: None,
        }
    }

    /// Sets an explicit length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Marks the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the default expression.
    #[must_use]
    pub fn default_value(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    /// Marks the column as part of the primary key. Implies NOT NULL.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.nullable = false;
        self
    }

    /// Marks the column as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the column as generated.
    #[must_use]
    pub fn generated(mut self, strategy: GenerationStrategy) -> Self {
        self.generated = Some(strategy);
        self
    }

    /// Sets the character set.
    #[must_use]
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Sets the comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Returns true when the column is backed by a database identity.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.generated.is_some_and(GenerationStrategy::is_identity)
    }
}

/// An index over one or more columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name. Derived by the naming strategy when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether the index is unique.
    #[serde(default)]
    pub unique: bool,
    /// Whether the index is a fulltext index.
    #[serde(default)]
    pub fulltext: bool,
    /// Partial index predicate.
    #[serde(default)]
    pub where_clause: Option<String>,
}

impl Index {
    /// Creates an unnamed, non-unique index.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            fulltext: false,
            where_clause: None,
        }
    }

    /// Sets the index name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Makes the index a fulltext index.
    #[must_use]
    pub fn fulltext(mut self) -> Self {
        self.fulltext = true;
        self
    }

    /// Sets a partial index predicate.
    #[must_use]
    pub fn where_clause(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }

    /// Returns true when the index covers exactly the given column.
    #[must_use]
    pub fn is_single(&self, column: &str) -> bool {
        self.columns.len() == 1 && self.columns[0] == column
    }
}

/// A foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name. Derived by the naming strategy when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Owning columns.
    pub columns: Vec<String>,
    /// Schema of the referenced table.
    #[serde(default)]
    pub referenced_schema: Option<String>,
    /// Referenced table name.
    pub referenced_table: String,
    /// Referenced columns.
    pub referenced_columns: Vec<String>,
    /// ON DELETE action.
    #[serde(default)]
    pub on_delete: ForeignKeyAction,
    /// ON UPDATE action.
    #[serde(default)]
    pub on_update: ForeignKeyAction,
}

impl ForeignKey {
    /// Creates a foreign key. `referenced_table` may be `schema.name`.
    #[must_use]
    pub fn new<I, S, J, T>(columns: I, referenced_table: &str, referenced_columns: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let (schema, name) = split_path(referenced_table);
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            referenced_schema: schema.map(str::to_string),
            referenced_table: name.to_string(),
            referenced_columns: referenced_columns.into_iter().map(Into::into).collect(),
            on_delete: ForeignKeyAction::default(),
            on_update: ForeignKeyAction::default(),
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the ON DELETE action.
    #[must_use]
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Sets the ON UPDATE action.
    #[must_use]
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = action;
        self
    }

    /// Returns the `schema.name` path of the referenced table.
    #[must_use]
    pub fn referenced_path(&self) -> String {
        join_path(self.referenced_schema.as_deref(), &self.referenced_table)
    }
}

/// A unique constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unique {
    /// Constraint name.
    #[serde(default)]
    pub name: Option<String>,
    /// Constrained columns.
    pub columns: Vec<String>,
}

impl Unique {
    /// Creates an unnamed unique constraint.
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A check constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// Constraint name.
    #[serde(default)]
    pub name: Option<String>,
    /// Columns referenced by the expression.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Boolean SQL expression.
    pub expression: String,
}

impl Check {
    /// Creates an unnamed check constraint.
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            name: None,
            columns: Vec::new(),
            expression: expression.into(),
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Records the columns the expression refers to.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true when the check refers to the column.
    #[must_use]
    pub fn references(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Renames a referenced column in both the column list and expression.
    pub fn rename_column(&mut self, old: &str, new: &str) {
        replace_name(&mut self.columns, old, new);
        self.expression = rename_identifier(&self.expression, old, new);
    }
}

/// An exclusion constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusion {
    /// Constraint name.
    #[serde(default)]
    pub name: Option<String>,
    /// Exclusion expression, e.g. `USING gist ("range" WITH &&)`.
    pub expression: String,
}

impl Exclusion {
    /// Creates an unnamed exclusion constraint.
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            name: None,
            expression: expression.into(),
        }
    }

    /// Sets the constraint name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Owning schema, `None` for the session's default schema.
    #[serde(default)]
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
    /// Columns in table order.
    pub columns: Vec<Column>,
    /// Indices.
    #[serde(default)]
    pub indices: Vec<Index>,
    /// Foreign keys owned by this table.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    /// Unique constraints.
    #[serde(default)]
    pub uniques: Vec<Unique>,
    /// Check constraints.
    #[serde(default)]
    pub checks: Vec<Check>,
    /// Exclusion constraints.
    #[serde(default)]
    pub exclusions: Vec<Exclusion>,
}

impl Table {
    /// Creates an empty table. `path` may be `schema.name`.
    #[must_use]
    pub fn new(path: &str) -> Self {
        let (schema, name) = split_path(path);
        Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
            columns: Vec::new(),
            indices: Vec::new(),
            foreign_keys: Vec::new(),
            uniques: Vec::new(),
            checks: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: Index) -> Self {
        self.indices.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Adds a unique constraint.
    #[must_use]
    pub fn unique(mut self, unique: Unique) -> Self {
        self.uniques.push(unique);
        self
    }

    /// Adds a check constraint.
    #[must_use]
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Adds an exclusion constraint.
    #[must_use]
    pub fn exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    /// Returns the `schema.name` path identifying this table.
    #[must_use]
    pub fn path(&self) -> String {
        join_path(self.schema.as_deref(), &self.name)
    }

    /// Finds a column by name.
    #[must_use]
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Finds a column by name for modification.
    pub fn find_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Returns true when the column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.find_column(name).is_some()
    }

    /// Returns the primary key columns in table order.
    #[must_use]
    pub fn primary_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary).collect()
    }

    /// Returns the primary key column names in table order.
    #[must_use]
    pub fn primary_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Marks exactly the given columns as primary.
    pub fn set_primary_columns(&mut self, names: &[String]) {
        for column in &mut self.columns {
            column.primary = names.contains(&column.name);
            if column.primary {
                column.nullable = false;
            }
        }
    }

    /// Finds an index by name.
    #[must_use]
    pub fn find_index(&self, name: &str) -> Option<&Index> {
        self.indices
            .iter()
            .find(|i| i.name.as_deref() == Some(name))
    }

    /// Finds a foreign key by name.
    #[must_use]
    pub fn find_foreign_key(&self, name: &str) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.name.as_deref() == Some(name))
    }

    /// Finds a unique constraint by name.
    #[must_use]
    pub fn find_unique(&self, name: &str) -> Option<&Unique> {
        self.uniques.iter().find(|u| u.name.as_deref() == Some(name))
    }

    /// Finds a check constraint by name.
    #[must_use]
    pub fn find_check(&self, name: &str) -> Option<&Check> {
        self.checks.iter().find(|c| c.name.as_deref() == Some(name))
    }

    /// Finds an exclusion constraint by name.
    #[must_use]
    pub fn find_exclusion(&self, name: &str) -> Option<&Exclusion> {
        self.exclusions
            .iter()
            .find(|e| e.name.as_deref() == Some(name))
    }

    /// Removes a column by name.
    pub fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name != name);
    }

    /// Removes an index by name.
    pub fn remove_index(&mut self, name: &str) {
        self.indices.retain(|i| i.name.as_deref() != Some(name));
    }

    /// Removes a foreign key by name.
    pub fn remove_foreign_key(&mut self, name: &str) {
        self.foreign_keys.retain(|fk| fk.name.as_deref() != Some(name));
    }

    /// Removes a unique constraint by name.
    pub fn remove_unique(&mut self, name: &str) {
        self.uniques.retain(|u| u.name.as_deref() != Some(name));
    }

    /// Removes a check constraint by name.
    pub fn remove_check(&mut self, name: &str) {
        self.checks.retain(|c| c.name.as_deref() != Some(name));
    }

    /// Removes an exclusion constraint by name.
    pub fn remove_exclusion(&mut self, name: &str) {
        self.exclusions.retain(|e| e.name.as_deref() != Some(name));
    }

    /// Returns true when a unique index or unique constraint covers exactly
    /// the given columns.
    #[must_use]
    pub fn has_unique_over(&self, columns: &[String]) -> bool {
        self.indices
            .iter()
            .any(|i| i.unique && i.where_clause.is_none() && same_set(&i.columns, columns))
            || self.uniques.iter().any(|u| same_set(&u.columns, columns))
    }

    /// Returns true when a foreign key may reference the given columns of
    /// this table: they all exist and are backed by the primary key or by a
    /// unique index or constraint.
    #[must_use]
    pub fn is_key_target(&self, columns: &[String]) -> bool {
        if columns.is_empty() || !columns.iter().all(|c| self.has_column(c)) {
            return false;
        }
        if same_set(&self.primary_column_names(), columns) {
            return true;
        }
        if let [single] = columns {
            if self.find_column(single).is_some_and(|c| c.unique) {
                return true;
            }
        }
        self.has_unique_over(columns)
    }

    /// Returns true when `foreign_key` points back at this table.
    #[must_use]
    pub fn is_referenced_by(&self, foreign_key: &ForeignKey) -> bool {
        foreign_key.referenced_schema == self.schema && foreign_key.referenced_table == self.name
    }

    /// Renames a column and every reference to it held by indices, foreign
    /// keys, unique and check constraints. Names are left untouched.
    pub fn rename_column(&mut self, old: &str, new: &str) {
        if let Some(column) = self.find_column_mut(old) {
            column.name = new.to_string();
        }
        for index in &mut self.indices {
            replace_name(&mut index.columns, old, new);
        }
        for foreign_key in &mut self.foreign_keys {
            replace_name(&mut foreign_key.columns, old, new);
        }
        for unique in &mut self.uniques {
            replace_name(&mut unique.columns, old, new);
        }
        for check in &mut self.checks {
            check.rename_column(old, new);
        }
    }
}

/// A view definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// Owning schema, `None` for the session's default schema.
    #[serde(default)]
    pub schema: Option<String>,
    /// View name.
    pub name: String,
    /// Defining query.
    pub expression: String,
}

impl View {
    /// Creates a view. `path` may be `schema.name`.
    #[must_use]
    pub fn new(path: &str, expression: impl Into<String>) -> Self {
        let (schema, name) = split_path(path);
        Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
            expression: expression.into(),
        }
    }

    /// Returns the `schema.name` path identifying this view.
    #[must_use]
    pub fn path(&self) -> String {
        join_path(self.schema.as_deref(), &self.name)
    }
}
