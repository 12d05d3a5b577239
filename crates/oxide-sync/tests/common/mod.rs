#![allow(dead_code)]

pub mod replay;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use oxide_ddl::{HanaDialect, Statement};
use oxide_sync::{
    BoxError, QueryOutput, Result, Row, RunnerOptions, SchemaRunner, Session, SessionPool,
};

// =============================================================================
// Scripted database
// =============================================================================

#[derive(Clone)]
enum Reply {
    Rows(Vec<Row>),
    Fail(String),
}

struct Rule {
    needle: String,
    reply: Reply,
}

#[derive(Default)]
struct State {
    dispatched: Vec<Statement>,
    completed: Vec<String>,
    rules: Vec<Rule>,
    delays: Vec<(String, Duration)>,
    acquired: usize,
    closed: usize,
}

/// Recording session pool. Statements are answered by the most recently
/// added rule whose needle occurs in the SQL; unmatched statements succeed
/// with no rows.
#[derive(Clone, Default)]
pub struct MockDatabase {
    state: Arc<Mutex<State>>,
}

impl MockDatabase {
    /// A database whose current schema is `APP`.
    pub fn new() -> Self {
        let db = Self::default();
        db.rows(
            "CURRENT_SCHEMA AS",
            vec![Row::new().with("schema_name", "APP")],
        );
        db
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn rows(&self, needle: &str, rows: Vec<Row>) {
        self.state().rules.push(Rule {
            needle: needle.to_string(),
            reply: Reply::Rows(rows),
        });
    }

    pub fn fail(&self, needle: &str, message: &str) {
        self.state().rules.push(Rule {
            needle: needle.to_string(),
            reply: Reply::Fail(message.to_string()),
        });
    }

    pub fn delay(&self, needle: &str, delay: Duration) {
        self.state().delays.push((needle.to_string(), delay));
    }

    pub fn session(&self) -> Box<dyn Session> {
        Box::new(MockSession {
            state: Arc::clone(&self.state),
        })
    }

    /// Statements in dispatch order.
    pub fn log(&self) -> Vec<Statement> {
        self.state().dispatched.clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.log().into_iter().map(|s| s.sql).collect()
    }

    /// Dispatched statements other than catalog reads.
    pub fn ddl(&self) -> Vec<String> {
        self.sql()
            .into_iter()
            .filter(|sql| !sql.starts_with("SELECT"))
            .collect()
    }

    /// SQL of statements in completion order.
    pub fn completed(&self) -> Vec<String> {
        self.state().completed.clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.sql().iter().filter(|sql| sql.contains(needle)).count()
    }

    pub fn clear_log(&self) {
        let mut state = self.state();
        state.dispatched.clear();
        state.completed.clear();
    }

    pub fn acquired(&self) -> usize {
        self.state().acquired
    }

    pub fn closed(&self) -> usize {
        self.state().closed
    }
}

#[async_trait]
impl SessionPool for MockDatabase {
    async fn acquire(&self) -> Result<Box<dyn Session>> {
        self.state().acquired += 1;
        Ok(self.session())
    }
}

struct MockSession {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Session for MockSession {
    async fn execute(&mut self, statement: &Statement) -> std::result::Result<QueryOutput, BoxError> {
        let (reply, delay) = {
            let mut state = self.state.lock().unwrap();
            state.dispatched.push(statement.clone());
            let reply = state
                .rules
                .iter()
                .rev()
                .find(|rule| statement.sql.contains(&rule.needle))
                .map(|rule| rule.reply.clone());
            let delay = state
                .delays
                .iter()
                .find(|(needle, _)| statement.sql.contains(needle))
                .map(|(_, delay)| *delay);
            (reply, delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state
            .lock()
            .unwrap()
            .completed
            .push(statement.sql.clone());

        match reply {
            Some(Reply::Fail(message)) => Err(message.into()),
            Some(Reply::Rows(rows)) => Ok(QueryOutput { rows, affected: 0 }),
            None => Ok(QueryOutput::default()),
        }
    }

    async fn close(self: Box<Self>) {
        self.state.lock().unwrap().closed += 1;
    }
}

// =============================================================================
// Runners and catalog rows
// =============================================================================

/// Routes log output through the test harness. Safe to call from every
/// test.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .without_time()
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn runner(db: &MockDatabase) -> SchemaRunner<HanaDialect> {
    runner_with(db, RunnerOptions::new())
}

pub fn runner_with(db: &MockDatabase, options: RunnerOptions) -> SchemaRunner<HanaDialect> {
    SchemaRunner::new(HanaDialect::new(), Arc::new(db.clone()), options)
}

pub const REFERENCING: &str = "WHERE \"REFERENCED_SCHEMA_NAME\" = ?";
pub const HAS_TABLE: &str = "SELECT COUNT(*) AS \"count\" FROM \"SYS\".\"TABLES\"";
pub const TABLES: &str = "SELECT \"SCHEMA_NAME\", \"TABLE_NAME\" FROM \"SYS\".\"TABLES\"";
pub const COLUMNS: &str = "\"COMMENTS\" FROM \"SYS\".\"TABLE_COLUMNS\"";
pub const CONSTRAINTS: &str = "FROM \"SYS\".\"CONSTRAINTS\"";
pub const INDICES: &str = "FROM \"SYS\".\"INDEXES\"";
pub const FOREIGN_KEYS: &str = "\"REFERENTIAL_CONSTRAINTS\" WHERE ((";

pub fn count(n: i64) -> Vec<Row> {
    vec![Row::new().with("count", n)]
}

/// A foreign key row as returned by the referential constraints catalog.
pub fn foreign_key_row(
    owner: &str,
    constraint: &str,
    column: &str,
    referenced_table: &str,
    referenced_column: &str,
) -> Row {
    Row::new()
        .with("SCHEMA_NAME", "APP")
        .with("TABLE_NAME", owner)
        .with("COLUMN_NAME", column)
        .with("CONSTRAINT_NAME", constraint)
        .with("REFERENCED_SCHEMA_NAME", "APP")
        .with("REFERENCED_TABLE_NAME", referenced_table)
        .with("REFERENCED_COLUMN_NAME", referenced_column)
        .with("DELETE_RULE", "RESTRICT")
        .with("UPDATE_RULE", "RESTRICT")
}
