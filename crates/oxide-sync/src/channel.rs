//! Serialized statement execution.
//!
//! A [`QueryChannel`] owns one [`Session`] inside a worker task. Callers send
//! statements over an unbounded queue and the worker runs them strictly in
//! the order they were sent, one at a time. The identity read-back after an
//! `INSERT` relies on this: it must run on the same session, right after the
//! insert, with nothing interleaved.

use std::future::Future;
use std::time::{Duration, Instant};

use oxide_ddl::{SqlValue, Statement};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::error::{Result, SyncError};
use crate::session::{QueryOutput, Row, Session};

/// Result of one statement run through a [`QueryChannel`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Result rows.
    pub records: Vec<Row>,
    /// Rows affected by a data-changing statement.
    pub affected: u64,
    /// Identity generated by an `INSERT`, when the dialect can read it back.
    pub identity: Option<SqlValue>,
}

/// Worker settings.
#[derive(Debug, Clone, Default)]
pub struct ChannelOptions {
    /// Statements slower than this are logged at `warn`.
    pub slow_query_threshold: Option<Duration>,
    /// Statement run after every `INSERT INTO` to read back the identity.
    pub identity_query: Option<Statement>,
}

impl ChannelOptions {
    /// Creates options with no threshold and no identity read-back.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the slow-query threshold.
    #[must_use]
    pub const fn slow_query_threshold(mut self, threshold: Option<Duration>) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Sets the identity read-back statement.
    #[must_use]
    pub fn identity_query(mut self, statement: Option<Statement>) -> Self {
        self.identity_query = statement;
        self
    }
}

enum Command {
    Execute {
        statement: Statement,
        reply: oneshot::Sender<Result<QueryResult>>,
    },
    Release {
        done: oneshot::Sender<()>,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Execute { statement, .. } => f.debug_tuple("Execute").field(statement).finish(),
            Self::Release { .. } => f.write_str("Release"),
        }
    }
}

/// FIFO handle onto a single session.
///
/// Cloning the handle shares the same worker and queue.
#[derive(Debug, Clone)]
pub struct QueryChannel {
    sender: mpsc::UnboundedSender<Command>,
}

impl QueryChannel {
    /// Starts a worker task owning `session`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(session: Box<dyn Session>, options: ChannelOptions) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run(session, receiver, options));
        Self { sender }
    }

    /// Queues a statement and returns a future resolving to its result.
    ///
    /// The statement joins the queue when this method is called, not when
    /// the future is first polled, so call order is dispatch order.
    pub fn execute(
        &self,
        statement: impl Into<Statement>,
    ) -> impl Future<Output = Result<QueryResult>> + Send + 'static {
        let (reply, response) = oneshot::channel();
        let sent = self.sender.send(Command::Execute {
            statement: statement.into(),
            reply,
        });
        async move {
            if sent.is_err() {
                return Err(SyncError::AlreadyReleased);
            }
            response.await.map_err(|_| SyncError::ChannelClosed)?
        }
    }

    /// Runs everything already queued, then closes the session. Statements
    /// queued afterwards fail with [`SyncError::AlreadyReleased`].
    pub async fn close(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Command::Release { done }).is_ok() {
            let _ = wait.await;
        }
    }

    /// Returns true once the worker has stopped accepting statements.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

async fn run(
    mut session: Box<dyn Session>,
    mut receiver: mpsc::UnboundedReceiver<Command>,
    options: ChannelOptions,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Execute { statement, reply } => {
                let result = dispatch(session.as_mut(), &statement, &options).await;
                let _ = reply.send(result);
            }
            Command::Release { done } => {
                receiver.close();
                while let Some(pending) = receiver.recv().await {
                    match pending {
                        Command::Execute { reply, .. } => {
                            let _ = reply.send(Err(SyncError::AlreadyReleased));
                        }
                        Command::Release { done } => {
                            let _ = done.send(());
                        }
                    }
                }
                session.close().await;
                let _ = done.send(());
                return;
            }
        }
    }
    session.close().await;
}

async fn dispatch(
    session: &mut dyn Session,
    statement: &Statement,
    options: &ChannelOptions,
) -> Result<QueryResult> {
    let output = run_one(session, statement, options).await?;
    let mut result = QueryResult {
        records: output.rows,
        affected: output.affected,
        identity: None,
    };

    if let Some(identity_query) = &options.identity_query {
        if is_insert(&statement.sql) {
            let output = run_one(session, identity_query, options).await?;
            result.identity = output
                .rows
                .first()
                .and_then(Row::first)
                .filter(|value| !value.is_null())
                .cloned();
        }
    }
    Ok(result)
}

async fn run_one(
    session: &mut dyn Session,
    statement: &Statement,
    options: &ChannelOptions,
) -> Result<QueryOutput> {
    debug!(sql = %statement.sql, parameters = ?statement.params, "Executing query");
    let started = Instant::now();
    let output = session.execute(statement).await;
    let elapsed = started.elapsed();

    if let Some(threshold) = options.slow_query_threshold {
        if elapsed > threshold {
            warn!(
                sql = %statement.sql,
                parameters = ?statement.params,
                elapsed = ?elapsed,
                "Slow query"
            );
        }
    }

    output.map_err(|source| {
        error!(
            sql = %statement.sql,
            parameters = ?statement.params,
            error = %source,
            "Query failed"
        );
        SyncError::QueryFailed {
            query: statement.sql.clone(),
            parameters: statement.params.clone(),
            source,
        }
    })
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..11)
        .is_some_and(|head| head.eq_ignore_ascii_case("INSERT INTO"))
}
