//! Schema runner.
//!
//! [`SchemaRunner`] owns one database session (through its
//! [`QueryChannel`]), the table and view caches, the transaction flag and
//! the SQL memory. The planner operations live in [`crate::planner`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use oxide_ddl::dialect::catalog;
use oxide_ddl::schema::{join_path, split_path};
use oxide_ddl::{
    BatchBuilder, ChangeBatch, Dialect, IsolationLevel, Statement, Table, View,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::SchemaCache;
use crate::channel::{ChannelOptions, QueryChannel, QueryResult};
use crate::error::{Result, SyncError};
use crate::introspect::Introspector;
use crate::options::RunnerOptions;
use crate::planner::CreateTableOptions;
use crate::session::{Row, SessionPool};

#[derive(Debug, Default)]
struct SqlMemory {
    enabled: bool,
    batch: ChangeBatch,
}

/// Plans and runs schema changes against one database session.
pub struct SchemaRunner<D: Dialect> {
    pub(crate) dialect: D,
    pool: Arc<dyn SessionPool>,
    pub(crate) options: RunnerOptions,
    channel: OnceCell<QueryChannel>,
    released: AtomicBool,
    current_schema: OnceCell<String>,
    transaction_active: bool,
    pub(crate) tables: SchemaCache<Table>,
    pub(crate) views: SchemaCache<View>,
    memory: SqlMemory,
}

impl<D: Dialect> SchemaRunner<D> {
    /// Creates a runner. No session is acquired until the first statement.
    pub fn new(dialect: D, pool: Arc<dyn SessionPool>, options: RunnerOptions) -> Self {
        Self {
            dialect,
            pool,
            options,
            channel: OnceCell::new(),
            released: AtomicBool::new(false),
            current_schema: OnceCell::new(),
            transaction_active: false,
            tables: SchemaCache::default(),
            views: SchemaCache::default(),
            memory: SqlMemory::default(),
        }
    }

    /// Returns the dialect.
    #[must_use]
    pub const fn dialect(&self) -> &D {
        &self.dialect
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Returns the cached tables.
    #[must_use]
    pub const fn tables(&self) -> &SchemaCache<Table> {
        &self.tables
    }

    /// Returns the cached views.
    #[must_use]
    pub const fn views(&self) -> &SchemaCache<View> {
        &self.views
    }

    /// Returns a cached table. A schema-qualified path in the session's
    /// current schema is found once that schema has been read.
    #[must_use]
    pub fn cached_table(&self, path: &str) -> Option<&Table> {
        self.tables.get(&self.cache_key(path))
    }

    /// Returns a cached view.
    #[must_use]
    pub fn cached_view(&self, path: &str) -> Option<&View> {
        self.views.get(&self.cache_key(path))
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    pub(crate) async fn channel(&self) -> Result<&QueryChannel> {
        if self.released.load(Ordering::Acquire) {
            return Err(SyncError::AlreadyReleased);
        }
        self.channel
            .get_or_try_init(|| async {
                let session = self.pool.acquire().await?;
                info!(dialect = self.dialect.name(), "Connected");
                let options = ChannelOptions::new()
                    .slow_query_threshold(self.options.slow_query_threshold())
                    .identity_query(self.dialect.identity_query());
                Ok::<_, SyncError>(QueryChannel::spawn(session, options))
            })
            .await
    }

    /// Acquires the session. Calling it again is a no-op.
    pub async fn connect(&self) -> Result<()> {
        self.channel().await.map(|_| ())
    }

    /// Returns the session to the pool. Statements issued afterwards fail
    /// with [`SyncError::AlreadyReleased`]. Resolves immediately when the
    /// runner never connected or was already released.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(channel) = self.channel.get() {
            channel.close().await;
            info!(dialect = self.dialect.name(), "Released");
        }
    }

    /// Returns true once [`release`](Self::release) was called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Runs one statement and returns its rows.
    pub async fn query(&self, statement: impl Into<Statement>) -> Result<Vec<Row>> {
        Ok(self.query_result(statement).await?.records)
    }

    /// Runs one statement and returns the full result.
    pub async fn query_result(&self, statement: impl Into<Statement>) -> Result<QueryResult> {
        let statement = statement.into();
        self.channel().await?.execute(statement).await
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Returns true while a transaction started by this runner is open.
    #[must_use]
    pub const fn is_transaction_active(&self) -> bool {
        self.transaction_active
    }

    /// Opens a transaction, falling back to the configured isolation level.
    pub async fn start_transaction(&mut self, isolation: Option<IsolationLevel>) -> Result<()> {
        if self.transaction_active {
            return Err(SyncError::TransactionAlreadyStarted);
        }
        let isolation = isolation.or(self.options.isolation_level);
        for statement in self.dialect.begin_transaction_sql(isolation) {
            self.query(statement).await?;
        }
        self.transaction_active = true;
        debug!(isolation = ?isolation, "Transaction started");
        Ok(())
    }

    /// Commits the open transaction.
    pub async fn commit_transaction(&mut self) -> Result<()> {
        if !self.transaction_active {
            return Err(SyncError::TransactionNotStarted);
        }
        for statement in self.dialect.commit_sql() {
            self.query(statement).await?;
        }
        self.transaction_active = false;
        debug!("Transaction committed");
        Ok(())
    }

    /// Rolls back the open transaction.
    pub async fn rollback_transaction(&mut self) -> Result<()> {
        if !self.transaction_active {
            return Err(SyncError::TransactionNotStarted);
        }
        for statement in self.dialect.rollback_sql() {
            self.query(statement).await?;
        }
        self.transaction_active = false;
        debug!("Transaction rolled back");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Catalog lookups
    // ------------------------------------------------------------------

    /// Returns the session's current schema.
    pub async fn get_current_schema(&self) -> Result<String> {
        let rows = self.query(self.dialect.current_schema_query()).await?;
        Ok(first_text(&rows, catalog::CURRENT_SCHEMA).unwrap_or_default())
    }

    /// Returns the current database.
    pub async fn get_current_database(&self) -> Result<String> {
        let rows = self.query(self.dialect.current_database_query()).await?;
        Ok(first_text(&rows, catalog::CURRENT_DATABASE).unwrap_or_default())
    }

    /// Lists databases.
    pub async fn get_databases(&self) -> Result<Vec<String>> {
        let rows = self.query(self.dialect.databases_query()).await?;
        Ok(rows
            .iter()
            .filter_map(|r| r.text(catalog::DATABASE_NAME))
            .collect())
    }

    /// Lists schemas.
    pub async fn get_schemas(&self) -> Result<Vec<String>> {
        let rows = self.query(self.dialect.schemas_query()).await?;
        Ok(rows
            .iter()
            .filter_map(|r| r.text(catalog::SCHEMA_NAME))
            .collect())
    }

    /// Returns true when the database exists.
    pub async fn has_database(&self, name: &str) -> Result<bool> {
        Ok(self.get_databases().await?.iter().any(|d| d == name))
    }

    /// Returns true when the schema exists.
    pub async fn has_schema(&self, name: &str) -> Result<bool> {
        Ok(self.get_schemas().await?.iter().any(|s| s == name))
    }

    /// Returns true when the table exists.
    pub async fn has_table(&self, path: &str) -> Result<bool> {
        let (schema, name) = self.resolve_key(path).await?;
        let rows = self
            .query(self.dialect.has_table_query(&schema, &name))
            .await?;
        Ok(first_count(&rows) > 0)
    }

    /// Returns true when the table has the column.
    pub async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let (schema, name) = self.resolve_key(table).await?;
        let rows = self
            .query(self.dialect.has_column_query(&schema, &name, column))
            .await?;
        Ok(first_count(&rows) > 0)
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    pub(crate) async fn current_schema(&self) -> Result<&str> {
        self.current_schema
            .get_or_try_init(|| self.get_current_schema())
            .await
            .map(String::as_str)
    }

    /// Schema that unqualified paths resolve to.
    pub(crate) async fn default_schema(&self) -> Result<String> {
        match &self.options.schema {
            Some(schema) => Ok(schema.clone()),
            None => Ok(self.current_schema().await?.to_string()),
        }
    }

    pub(crate) async fn resolve_key(&self, path: &str) -> Result<(String, String)> {
        let (schema, name) = split_path(path);
        let schema = match schema {
            Some(schema) => schema.to_string(),
            None => self.default_schema().await?,
        };
        Ok((schema, name.to_string()))
    }

    pub(crate) async fn introspector(&self) -> Result<Introspector<'_>> {
        let channel = self.channel().await?;
        let current = self.current_schema().await?;
        Ok(Introspector::new(
            &self.dialect,
            channel,
            current,
            self.options.schema.as_deref(),
        ))
    }

    /// Loads the current schema when a qualified path has to be compared
    /// with it. Bare paths and an explicit default schema need no lookup.
    async fn load_schema_context(&self, schema: Option<&str>) -> Result<()> {
        if schema.is_some() && self.options.schema.is_none() {
            self.current_schema().await?;
        }
        Ok(())
    }

    /// Key a path is cached under, the same whether or not the current
    /// schema has been read before.
    pub(crate) async fn resolve_cache_key(&self, path: &str) -> Result<String> {
        self.load_schema_context(split_path(path).0).await?;
        Ok(self.cache_key(path))
    }

    /// Aligns a table's schema with the cache's keying.
    pub(crate) async fn normalized_table(&self, table: Table) -> Result<Table> {
        self.load_schema_context(table.schema.as_deref()).await?;
        Ok(self.normalize_table(table))
    }

    pub(crate) async fn normalized_view(&self, view: View) -> Result<View> {
        self.load_schema_context(view.schema.as_deref()).await?;
        Ok(self.normalize_view(view))
    }

    /// Key a path is cached under. A qualified path only maps onto the
    /// unqualified key once the current schema is known.
    fn cache_key(&self, path: &str) -> String {
        let (schema, name) = split_path(path);
        match (schema, self.options.schema.as_deref()) {
            (None, Some(default)) => join_path(Some(default), name),
            (Some(schema), None) if self.current_schema.get().is_some_and(|c| c == schema) => {
                name.to_string()
            }
            _ => path.to_string(),
        }
    }

    fn normalize_table(&self, mut table: Table) -> Table {
        table.schema = self.normalize_schema(table.schema);
        table
    }

    fn normalize_view(&self, mut view: View) -> View {
        view.schema = self.normalize_schema(view.schema);
        view
    }

    fn normalize_schema(&self, schema: Option<String>) -> Option<String> {
        match (schema, self.options.schema.as_deref()) {
            (None, Some(default)) => Some(default.to_string()),
            (Some(schema), None) if self.current_schema.get() == Some(&schema) => None,
            (schema, _) => schema,
        }
    }

    /// Table recording view definitions.
    #[must_use]
    pub fn metadata_table(&self) -> Table {
        self.dialect
            .metadata_table(self.options.schema.as_deref(), &self.options.metadata_table)
    }

    /// Introspects tables without touching the cache.
    pub async fn get_tables(&self, paths: &[String]) -> Result<Vec<Table>> {
        self.introspector().await?.load_tables(paths).await
    }

    /// Introspects one table without touching the cache.
    pub async fn get_table(&self, path: &str) -> Result<Option<Table>> {
        Ok(self
            .get_tables(&[path.to_string()])
            .await?
            .into_iter()
            .next())
    }

    /// Reads view definitions without touching the cache.
    pub async fn get_views(&self, paths: &[String]) -> Result<Vec<View>> {
        let metadata = self.metadata_table();
        self.introspector()
            .await?
            .load_views(&metadata, paths)
            .await
    }

    /// Reads one view definition without touching the cache.
    pub async fn get_view(&self, path: &str) -> Result<Option<View>> {
        Ok(self
            .get_views(&[path.to_string()])
            .await?
            .into_iter()
            .next())
    }

    /// Introspects tables and caches them.
    pub async fn load_tables(&mut self, paths: &[String]) -> Result<Vec<Table>> {
        let tables = self.get_tables(paths).await?;
        let mut cache = self.tables.clone();
        for table in &tables {
            cache = cache.insert(table.clone());
        }
        self.tables = cache;
        debug!(count = tables.len(), "Loaded tables");
        Ok(tables)
    }

    /// Reads view definitions and caches them.
    pub async fn load_views(&mut self, paths: &[String]) -> Result<Vec<View>> {
        let views = self.get_views(paths).await?;
        let mut cache = self.views.clone();
        for view in &views {
            cache = cache.insert(view.clone());
        }
        self.views = cache;
        debug!(count = views.len(), "Loaded views");
        Ok(views)
    }

    // ------------------------------------------------------------------
    // SQL memory
    // ------------------------------------------------------------------

    /// Starts recording planned batches instead of running them.
    pub fn enable_sql_memory(&mut self) {
        self.memory = SqlMemory {
            enabled: true,
            batch: ChangeBatch::default(),
        };
    }

    /// Stops recording and discards what was recorded.
    pub fn disable_sql_memory(&mut self) {
        self.memory = SqlMemory::default();
    }

    /// Returns true while batches are recorded instead of run.
    #[must_use]
    pub const fn is_sql_memory_enabled(&self) -> bool {
        self.memory.enabled
    }

    /// Returns everything recorded since memory was enabled or cleared.
    #[must_use]
    pub const fn sql_memory(&self) -> &ChangeBatch {
        &self.memory.batch
    }

    /// Discards the recorded statements.
    pub fn clear_sql_memory(&mut self) {
        self.memory.batch = ChangeBatch::default();
    }

    /// Runs a planned batch's forward statements in order, or records the
    /// batch while SQL memory is enabled.
    pub(crate) async fn execute_batch(
        &mut self,
        description: &str,
        batch: ChangeBatch,
    ) -> Result<ChangeBatch> {
        if self.memory.enabled {
            debug!(change = description, statements = batch.up.len(), "Recorded schema change");
            self.memory.batch.append(batch.clone());
            return Ok(batch);
        }
        if batch.up.is_empty() {
            return Ok(batch);
        }

        info!(change = description, statements = batch.up.len(), "Applying schema change");
        let channel = self.channel().await?;
        for statement in &batch.up {
            channel.execute(statement.clone()).await?;
        }
        Ok(batch)
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Removes every row of a table. Not reversible and not part of any
    /// batch.
    pub async fn clear_table(&self, path: &str) -> Result<()> {
        let table = self.normalized_table(Table::new(path)).await?;
        self.query(self.dialect.truncate_sql(&table)).await?;
        Ok(())
    }

    /// Drops every table in the default schema inside a transaction,
    /// rolling back when any drop fails. Runs in the caller's transaction
    /// when one is already open.
    pub async fn clear_database(&mut self) -> Result<()> {
        let schemas = vec![self.default_schema().await?];
        let owns_transaction = !self.transaction_active;
        if owns_transaction {
            self.start_transaction(None).await?;
        }

        match self.drop_all_tables(&schemas).await {
            Ok(count) => {
                if owns_transaction {
                    self.commit_transaction().await?;
                }
                self.tables = SchemaCache::default();
                self.views = SchemaCache::default();
                info!(schemas = ?schemas, tables = count, "Cleared database");
                Ok(())
            }
            Err(error) => {
                if owns_transaction {
                    if let Err(rollback) = self.rollback_transaction().await {
                        warn!(error = %rollback, "Rollback after failed clear failed");
                    }
                }
                Err(error)
            }
        }
    }

    async fn drop_all_tables(&self, schemas: &[String]) -> Result<usize> {
        let rows = self
            .query(self.dialect.drop_all_tables_query(schemas))
            .await?;
        let channel = self.channel().await?;
        let drops: Vec<_> = rows
            .iter()
            .filter_map(|row| row.text(catalog::QUERY))
            .map(|sql| channel.execute(sql))
            .collect();
        let count = drops.len();
        futures::future::try_join_all(drops).await?;
        Ok(count)
    }

    /// Creates a schema.
    pub async fn create_schema(&mut self, name: &str, if_not_exists: bool) -> Result<ChangeBatch> {
        if if_not_exists && self.has_schema(name).await? {
            return Ok(ChangeBatch::default());
        }
        let mut builder = BatchBuilder::new();
        builder.push(
            self.dialect.create_schema_sql(name),
            self.dialect.drop_schema_sql(name, false),
        );
        self.execute_batch(&format!("Create schema {name}"), builder.finish())
            .await
    }

    /// Drops a schema.
    pub async fn drop_schema(
        &mut self,
        name: &str,
        if_exists: bool,
        cascade: bool,
    ) -> Result<ChangeBatch> {
        if if_exists && !self.has_schema(name).await? {
            return Ok(ChangeBatch::default());
        }
        let mut builder = BatchBuilder::new();
        builder.push(
            self.dialect.drop_schema_sql(name, cascade),
            self.dialect.create_schema_sql(name),
        );
        self.execute_batch(&format!("Drop schema {name}"), builder.finish())
            .await
    }

    /// Creates the view metadata table unless it is cached or exists.
    pub async fn ensure_metadata_table(&mut self) -> Result<()> {
        let metadata = self.metadata_table();
        let path = metadata.path();
        if self.tables.contains(&self.resolve_cache_key(&path).await?)
            || self.has_table(&path).await?
        {
            return Ok(());
        }
        self.create_table(metadata, CreateTableOptions::default())
            .await?;
        Ok(())
    }
}

fn first_text(rows: &[Row], column: &str) -> Option<String> {
    rows.first().and_then(|row| row.text(column))
}

fn first_count(rows: &[Row]) -> i64 {
    rows.first()
        .and_then(|row| row.int(catalog::COUNT))
        .unwrap_or(0)
}
