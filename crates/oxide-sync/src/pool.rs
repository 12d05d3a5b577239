//! sqlx-backed sessions.

use async_trait::async_trait;
use futures::TryStreamExt;
use oxide_ddl::{SqlValue, Statement};
use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Column as _, Either, Executor, Row as _};
use tracing::debug;

use crate::error::{BoxError, Result};
use crate::session::{QueryOutput, Row, Session, SessionPool};

/// A [`SessionPool`] over a `sqlx::AnyPool`.
#[derive(Debug, Clone)]
pub struct SqlxPool {
    pool: AnyPool,
}

impl SqlxPool {
    /// Connects to `url` with at most `max_connections` connections.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub const fn from_pool(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn inner(&self) -> &AnyPool {
        &self.pool
    }
}

#[async_trait]
impl SessionPool for SqlxPool {
    async fn acquire(&self) -> Result<Box<dyn Session>> {
        let connection = self.pool.acquire().await?;
        debug!("Acquired database session");
        Ok(Box::new(SqlxSession { connection }))
    }
}

/// A pooled sqlx connection.
pub struct SqlxSession {
    connection: PoolConnection<Any>,
}

#[async_trait]
impl Session for SqlxSession {
    async fn execute(&mut self, statement: &Statement) -> std::result::Result<QueryOutput, BoxError> {
        let mut query = sqlx::query(&statement.sql);
        for value in &statement.params {
            query = bind(query, value);
        }

        let mut output = QueryOutput::default();
        #[allow(deprecated)]
        let mut stream = (&mut *self.connection).fetch_many(query);
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(done) => output.affected += done.rows_affected(),
                Either::Right(row) => output.rows.push(decode_row(&row)),
            }
        }
        Ok(output)
    }

    async fn close(self: Box<Self>) {
        drop(self.connection);
        debug!("Released database session");
    }
}

fn bind<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Bytes(v) => query.bind(v.clone()),
    }
}

fn decode_row(row: &AnyRow) -> Row {
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        decoded.push(column.name(), decode_value(row, index));
    }
    decoded
}

fn decode_value(row: &AnyRow, index: usize) -> SqlValue {
    if let Ok(value) = row.try_get_unchecked::<Option<i64>, _>(index) {
        return value.map_or(SqlValue::Null, SqlValue::Int);
    }
    if let Ok(value) = row.try_get_unchecked::<Option<f64>, _>(index) {
        return value.map_or(SqlValue::Null, SqlValue::Float);
    }
    if let Ok(value) = row.try_get_unchecked::<Option<String>, _>(index) {
        return value.map_or(SqlValue::Null, SqlValue::Text);
    }
    if let Ok(value) = row.try_get_unchecked::<Option<bool>, _>(index) {
        return value.map_or(SqlValue::Null, SqlValue::Bool);
    }
    if let Ok(value) = row.try_get_unchecked::<Option<Vec<u8>>, _>(index) {
        return value.map_or(SqlValue::Null, SqlValue::Bytes);
    }
    SqlValue::Null
}
