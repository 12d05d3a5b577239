//! Applies generated HANA DDL to the shape of a single table, so that a
//! batch can be replayed forwards and backwards without a database.

use std::collections::{BTreeMap, BTreeSet};

use oxide_ddl::{Dialect, Table};
use regex::{Captures, Regex};

const ADD_COLUMN: &str = r#"^ALTER TABLE "([^"]+)" ADD \(("([^"]+)" .*)\)$"#;
const ALTER_COLUMN: &str = r#"^ALTER TABLE "([^"]+)" ALTER \(("([^"]+)" .*)\)$"#;
const DROP_COLUMN: &str = r#"^ALTER TABLE "([^"]+)" DROP \("([^"]+)"\)$"#;
const RENAME_COLUMN: &str = r#"^RENAME COLUMN "([^"]+)"\."([^"]+)" TO "([^"]+)"$"#;
const CREATE_INDEX: &str = r#"^CREATE (UNIQUE )?INDEX "([^"]+)" ON "([^"]+)" \(([^)]*)\)$"#;
const DROP_INDEX: &str = r#"^DROP INDEX "([^"]+)"$"#;
const RENAME_INDEX: &str = r#"^RENAME INDEX "([^"]+)" TO "([^"]+)"$"#;
const ADD_CONSTRAINT: &str = r#"^ALTER TABLE "([^"]+)" ADD CONSTRAINT "([^"]+)" (.*)$"#;
const DROP_CONSTRAINT: &str = r#"^ALTER TABLE "([^"]+)" DROP CONSTRAINT "([^"]+)"$"#;
const PRIMARY_KEY: &str = r"^PRIMARY KEY \(([^)]*)\)$";
const CHECK: &str = r"^CHECK \((.*)\)$";

fn captures<'a>(pattern: &str, sql: &'a str) -> Option<Captures<'a>> {
    Regex::new(pattern).unwrap().captures(sql)
}

fn column_list(list: &str) -> Vec<String> {
    list.split(", ")
        .map(|name| name.trim_matches('"').to_string())
        .collect()
}

/// Column definitions compare without the explicit `DEFAULT NULL` and
/// `NULL` that in-place alters spell out.
fn definition(sql: &str) -> String {
    let sql = sql.replace(" DEFAULT NULL", "");
    match sql.strip_suffix(" NULL") {
        Some(stripped) if !sql.ends_with(" NOT NULL") => stripped.to_string(),
        _ => sql,
    }
}

/// The facts about a table that DDL can observe. Constraint and index
/// names are tracked so that drops can be resolved, but are not compared.
#[derive(Debug, Clone)]
pub struct TableShape {
    name: String,
    columns: BTreeMap<String, String>,
    primary: Option<(String, BTreeSet<String>)>,
    indices: BTreeMap<String, (bool, Vec<String>)>,
    foreign_keys: BTreeMap<String, String>,
    checks: BTreeMap<String, String>,
}

/// Name-free view of a [`TableShape`].
#[derive(Debug, PartialEq, Eq)]
pub struct Facts {
    columns: BTreeMap<String, String>,
    primary: Option<BTreeSet<String>>,
    indices: BTreeSet<(bool, Vec<String>)>,
    foreign_keys: BTreeSet<String>,
    checks: BTreeSet<String>,
}

impl TableShape {
    pub fn of(dialect: &impl Dialect, table: &Table) -> Self {
        let primary = table.primary_column_names();
        Self {
            name: table.name.clone(),
            columns: table
                .columns
                .iter()
                .map(|c| (c.name.clone(), definition(&dialect.column_sql(c, false, false))))
                .collect(),
            primary: (!primary.is_empty()).then(|| {
                (
                    dialect.naming().primary_key_name(&table.name, &primary),
                    primary.into_iter().collect(),
                )
            }),
            indices: table
                .indices
                .iter()
                .map(|i| (dialect.index_name(table, i), (i.unique, i.columns.clone())))
                .collect(),
            foreign_keys: table
                .foreign_keys
                .iter()
                .map(|fk| (dialect.foreign_key_name(table, fk), dialect.foreign_key_clause(fk)))
                .collect(),
            checks: table
                .checks
                .iter()
                .map(|c| (dialect.check_name(table, c), c.expression.clone()))
                .collect(),
        }
    }

    pub fn facts(&self) -> Facts {
        Facts {
            columns: self.columns.clone(),
            primary: self.primary.as_ref().map(|(_, columns)| columns.clone()),
            indices: self.indices.values().cloned().collect(),
            foreign_keys: self.foreign_keys.values().cloned().collect(),
            checks: self.checks.values().cloned().collect(),
        }
    }

    /// Applies `statements` in order. Statements on other tables are
    /// skipped; anything unrecognized on this table panics.
    pub fn apply(&mut self, statements: &[&str]) {
        for sql in statements {
            self.apply_one(sql);
        }
    }

    fn apply_one(&mut self, sql: &str) {
        if sql.starts_with("COMMENT ON") {
            return;
        }
        if let Some(caps) = captures(ADD_COLUMN, sql) {
            if caps[1] == self.name {
                self.columns.insert(caps[3].to_string(), definition(&caps[2]));
            }
        } else if let Some(caps) = captures(ALTER_COLUMN, sql) {
            if caps[1] == self.name {
                assert!(self.columns.contains_key(&caps[3]), "no column in {sql}");
                self.columns.insert(caps[3].to_string(), definition(&caps[2]));
            }
        } else if let Some(caps) = captures(DROP_COLUMN, sql) {
            if caps[1] == self.name {
                assert!(self.columns.remove(&caps[2]).is_some(), "no column in {sql}");
            }
        } else if let Some(caps) = captures(RENAME_COLUMN, sql) {
            if caps[1] == self.name {
                self.rename_column(&caps[2], &caps[3]);
            }
        } else if let Some(caps) = captures(CREATE_INDEX, sql) {
            if caps[3] == self.name {
                self.indices
                    .insert(caps[2].to_string(), (caps.get(1).is_some(), column_list(&caps[4])));
            }
        } else if let Some(caps) = captures(DROP_INDEX, sql) {
            self.indices.remove(&caps[1]);
        } else if let Some(caps) = captures(RENAME_INDEX, sql) {
            if let Some(index) = self.indices.remove(&caps[1]) {
                self.indices.insert(caps[2].to_string(), index);
            }
        } else if let Some(caps) = captures(ADD_CONSTRAINT, sql) {
            if caps[1] == self.name {
                self.add_constraint(&caps[2], &caps[3]);
            }
        } else if let Some(caps) = captures(DROP_CONSTRAINT, sql) {
            if caps[1] == self.name {
                self.drop_constraint(&caps[2]);
            }
        } else {
            panic!("unhandled statement: {sql}");
        }
    }

    fn rename_column(&mut self, old: &str, new: &str) {
        let definition = self.columns.remove(old).unwrap_or_else(|| panic!("no column {old}"));
        let quoted_old = format!("\"{old}\"");
        let quoted_new = format!("\"{new}\"");
        self.columns
            .insert(new.to_string(), definition.replacen(&quoted_old, &quoted_new, 1));

        if let Some((_, columns)) = &mut self.primary {
            if columns.remove(old) {
                columns.insert(new.to_string());
            }
        }
        for (_, columns) in self.indices.values_mut() {
            for column in columns.iter_mut().filter(|c| c.as_str() == old) {
                *column = new.to_string();
            }
        }
        for clause in self.foreign_keys.values_mut() {
            *clause = clause.replace(&quoted_old, &quoted_new);
        }
        for expression in self.checks.values_mut() {
            *expression = expression.replace(&quoted_old, &quoted_new);
        }
    }

    fn add_constraint(&mut self, name: &str, body: &str) {
        if let Some(caps) = captures(PRIMARY_KEY, body) {
            assert!(self.primary.is_none(), "second primary key {name}");
            self.primary = Some((name.to_string(), column_list(&caps[1]).into_iter().collect()));
        } else if body.starts_with("FOREIGN KEY") {
            self.foreign_keys.insert(name.to_string(), body.to_string());
        } else if let Some(caps) = captures(CHECK, body) {
            self.checks.insert(name.to_string(), caps[1].to_string());
        } else {
            panic!("unhandled constraint: {body}");
        }
    }

    fn drop_constraint(&mut self, name: &str) {
        if self.primary.as_ref().is_some_and(|(pk, _)| pk == name) {
            self.primary = None;
        } else if self.foreign_keys.remove(name).is_none() {
            assert!(self.checks.remove(name).is_some(), "no constraint {name}");
        }
    }
}
