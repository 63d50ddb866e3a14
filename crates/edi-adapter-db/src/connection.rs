//! Database connection and transaction primitives.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use libsql::{Builder, Connection as LibsqlConnection, Database, Transaction, params_from_iter};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};

#[cfg(feature = "memory")]
use crate::memory::DatabaseState;
use crate::schema::{ColumnType, DbValue, Row, SchemaMapping, TableSchema};
use crate::sql::{
    Query, build_count_sql, build_delete_sql, build_insert_sql, build_select_sql,
    build_update_sql,
};
use crate::{Error, Result};

/// Connection behavior for adapter tests/runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub database_url: String,
    pub auth_token: Option<String>,
    pub max_connections: usize,
    pub timeout_ms: u64,
    pub retry_attempts: usize,
}

impl ConnectionConfig {
    pub fn in_memory() -> Self {
        Self {
            database_url: ":memory:".to_string(),
            auth_token: None,
            max_connections: 1,
            timeout_ms: 5_000,
            retry_attempts: 0,
        }
    }

    pub fn local(path: impl Into<String>) -> Self {
        Self {
            database_url: path.into(),
            ..Self::remote_defaults()
        }
    }

    pub fn remote(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            database_url: url.into(),
            auth_token: Some(auth_token.into()),
            ..Self::remote_defaults()
        }
    }

    fn remote_defaults() -> Self {
        Self {
            database_url: String::new(),
            auth_token: None,
            max_connections: 8,
            timeout_ms: 5_000,
            retry_attempts: 0,
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// A single row mutation; the unit both backends execute and memory transactions replay.
#[derive(Debug, Clone)]
pub(crate) enum WriteOp {
    Insert {
        table: String,
        row: Row,
    },
    Update {
        table: String,
        filter: Row,
        updates: Row,
    },
    Delete {
        table: String,
        filter: Row,
    },
}

impl WriteOp {
    fn to_sql(&self) -> Result<(String, Vec<libsql::Value>)> {
        match self {
            WriteOp::Insert { table, row } => build_insert_sql(table, row),
            WriteOp::Update {
                table,
                filter,
                updates,
            } => build_update_sql(table, filter, updates),
            WriteOp::Delete { table, filter } => build_delete_sql(table, filter),
        }
    }
}

/// Shared handle to either a libsql database or the in-memory store.
#[derive(Clone)]
pub struct DbConnection {
    backend: DbBackend,
    config: ConnectionConfig,
}

#[derive(Clone)]
enum DbBackend {
    Libsql(Arc<LibsqlState>),
    #[cfg(feature = "memory")]
    Memory(Arc<MemoryState>),
}

struct LibsqlState {
    pool: RwLock<Option<LibsqlPool>>,
    schema: RwLock<Option<SchemaMapping>>,
    connected: AtomicBool,
}

#[cfg(feature = "memory")]
struct MemoryState {
    state: RwLock<DatabaseState>,
    schema: RwLock<Option<SchemaMapping>>,
    connected: AtomicBool,
}

impl DbConnection {
    /// Create a connection with default config (libsql in-memory).
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    /// Create a connection with explicit config (libsql backend).
    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            backend: DbBackend::Libsql(Arc::new(LibsqlState {
                pool: RwLock::new(None),
                schema: RwLock::new(None),
                connected: AtomicBool::new(false),
            })),
            config,
        }
    }

    /// Create a connection that uses the in-memory HashMap backend.
    #[cfg(feature = "memory")]
    pub fn memory() -> Self {
        Self {
            backend: DbBackend::Memory(Arc::new(MemoryState {
                state: RwLock::new(DatabaseState::default()),
                schema: RwLock::new(None),
                connected: AtomicBool::new(false),
            })),
            config: ConnectionConfig::in_memory(),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open the connection, retrying with exponential backoff.
    pub async fn connect(&self) -> Result<()> {
        match &self.backend {
            DbBackend::Libsql(state) => {
                if state.connected.load(Ordering::SeqCst) {
                    return Ok(());
                }

                let attempts = self.config.retry_attempts + 1;
                for attempt in 0..attempts {
                    match LibsqlPool::new(&self.config).await {
                        Ok(pool) => {
                            *state.pool.write().await = Some(pool);
                            state.connected.store(true, Ordering::SeqCst);
                            debug!(url = %redact_url(&self.config.database_url), "database connected");
                            return Ok(());
                        }
                        Err(err) => {
                            if attempt + 1 == attempts || matches!(err, Error::Config { .. }) {
                                return Err(err);
                            }
                            let delay_ms = 100 * (1_u64 << attempt.min(6));
                            warn!(attempt = attempt + 1, delay_ms, error = %err, "database connect failed, retrying");
                            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        }
                    }
                }

                Err(Error::Connection {
                    details: format!("Failed to connect after {attempts} attempt(s): exhausted retries"),
                })
            }
            #[cfg(feature = "memory")]
            DbBackend::Memory(state) => {
                if self.config.max_connections == 0 || self.config.timeout_ms == 0 {
                    return Err(Error::Config {
                        details: "max_connections and timeout_ms must be greater than zero".to_string(),
                    });
                }
                state.connected.store(true, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    pub async fn close(&self) {
        match &self.backend {
            DbBackend::Libsql(state) => {
                *state.pool.write().await = None;
                state.connected.store(false, Ordering::SeqCst);
            }
            #[cfg(feature = "memory")]
            DbBackend::Memory(state) => {
                state.connected.store(false, Ordering::SeqCst);
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        match &self.backend {
            DbBackend::Libsql(state) => state.connected.load(Ordering::SeqCst),
            #[cfg(feature = "memory")]
            DbBackend::Memory(state) => state.connected.load(Ordering::SeqCst),
        }
    }

    /// Cheap liveness probe used by readiness checks.
    pub async fn ping(&self) -> Result<()> {
        self.ensure_connected()?;
        match &self.backend {
            DbBackend::Libsql(state) => {
                let connection = state.acquire().await?;
                match query_count(connection.connection()?, "SELECT 1", Vec::new()).await? {
                    1 => Ok(()),
                    other => Err(Error::Connection {
                        details: format!("ping returned {other}"),
                    }),
                }
            }
            #[cfg(feature = "memory")]
            DbBackend::Memory(_) => Ok(()),
        }
    }

    /// Create tables and indexes; existing ones are left untouched.
    pub async fn apply_schema(&self, mapping: &SchemaMapping) -> Result<()> {
        self.ensure_connected()?;
        match &self.backend {
            DbBackend::Libsql(state) => {
                let connection = state.acquire().await?;
                for table in mapping.tables() {
                    let statements = std::iter::once(table.create_table_sql()).chain(table.create_index_sql());
                    for sql in statements {
                        execute(connection.connection()?, &sql, Vec::new()).await?;
                    }
                }
                *state.schema.write().await = Some(mapping.clone());
            }
            #[cfg(feature = "memory")]
            DbBackend::Memory(state) => {
                *state.schema.write().await = Some(mapping.clone());
            }
        }
        debug!(tables = ?mapping.table_names(), "schema applied");
        Ok(())
    }

    pub async fn begin_transaction(&self) -> Result<DbTransaction> {
        self.ensure_connected()?;
        match &self.backend {
            DbBackend::Libsql(state) => {
                let connection = state.acquire().await?;
                let transaction = connection
                    .connection()?
                    .transaction()
                    .await
                    .map_err(|source| Error::Libsql {
                        context: "begin transaction".to_string(),
                        source,
                    })?;
                Ok(DbTransaction {
                    backend: TransactionBackend::Libsql {
                        connection: Some(connection),
                        transaction: Some(transaction),
                    },
                    schema: state.schema.read().await.clone(),
                    active: true,
                })
            }
            #[cfg(feature = "memory")]
            DbBackend::Memory(state) => {
                let working_state = state.state.read().await.clone();
                Ok(DbTransaction {
                    backend: TransactionBackend::Memory {
                        shared: state.clone(),
                        working_state,
                        ops: Vec::new(),
                    },
                    schema: state.schema.read().await.clone(),
                    active: true,
                })
            }
        }
    }

    pub async fn insert_row(&self, table: &str, row: Row) -> Result<()> {
        self.write(WriteOp::Insert {
            table: table.to_string(),
            row,
        })
        .await
        .map(|_| ())
    }

    pub async fn update_rows(&self, table: &str, filter: &Row, updates: &Row) -> Result<usize> {
        self.write(WriteOp::Update {
            table: table.to_string(),
            filter: filter.clone(),
            updates: updates.clone(),
        })
        .await
    }

    /// Delete matching rows; children declared with cascading references go too.
    pub async fn delete_rows(&self, table: &str, filter: &Row) -> Result<usize> {
        self.write(WriteOp::Delete {
            table: table.to_string(),
            filter: filter.clone(),
        })
        .await
    }

    pub async fn select_rows(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        self.ensure_connected()?;
        match &self.backend {
            DbBackend::Libsql(state) => {
                let (sql, params) = build_select_sql(table, query);
                let schema = state.schema.read().await.clone();
                let connection = state.acquire().await?;
                query_rows(
                    connection.connection()?,
                    table,
                    &sql,
                    params,
                    schema.as_ref().and_then(|s| s.table(table)),
                )
                .await
            }
            #[cfg(feature = "memory")]
            DbBackend::Memory(state) => {
                let schema = state.schema.read().await;
                state.state.read().await.select(schema.as_ref(), table, query)
            }
        }
    }

    pub async fn select_one(&self, table: &str, query: &Query) -> Result<Option<Row>> {
        let query = query.clone().limit(1);
        Ok(self.select_rows(table, &query).await?.into_iter().next())
    }

    pub async fn count_rows(&self, table: &str, filter: &Row) -> Result<usize> {
        self.ensure_connected()?;
        match &self.backend {
            DbBackend::Libsql(state) => {
                let (sql, params) = build_count_sql(table, filter);
                let connection = state.acquire().await?;
                query_count(connection.connection()?, &sql, params).await
            }
            #[cfg(feature = "memory")]
            DbBackend::Memory(state) => {
                let schema = state.schema.read().await;
                state.state.read().await.count(schema.as_ref(), table, filter)
            }
        }
    }

    async fn write(&self, op: WriteOp) -> Result<usize> {
        self.ensure_connected()?;
        match &self.backend {
            DbBackend::Libsql(state) => {
                let (sql, params) = op.to_sql()?;
                let connection = state.acquire().await?;
                execute(connection.connection()?, &sql, params).await
            }
            #[cfg(feature = "memory")]
            DbBackend::Memory(state) => {
                let schema = state.schema.read().await;
                state.state.write().await.apply(schema.as_ref(), &op)
            }
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::Connection {
                details: "Database is not connected".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for DbConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match &self.backend {
            DbBackend::Libsql(_) => "libsql",
            #[cfg(feature = "memory")]
            DbBackend::Memory(_) => "memory",
        };
        f.debug_struct("DbConnection")
            .field("backend", &backend)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl LibsqlState {
    async fn acquire(&self) -> Result<PooledConnection> {
        let pool = self.pool.read().await.clone().ok_or_else(|| Error::Connection {
            details: "Connection pool is not initialized".to_string(),
        })?;
        pool.acquire().await
    }
}

#[derive(Clone)]
struct LibsqlPool {
    inner: Arc<LibsqlPoolInner>,
}

struct LibsqlPoolInner {
    // Keep the Database alive for the lifetime of pooled connections.
    _database: Database,
    connections: std::sync::Mutex<Vec<LibsqlConnection>>,
    semaphore: Arc<Semaphore>,
}

impl LibsqlPool {
    async fn new(config: &ConnectionConfig) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(Error::Config {
                details: "max_connections must be greater than zero".to_string(),
            });
        }
        if config.timeout_ms == 0 {
            return Err(Error::Config {
                details: "timeout_ms must be greater than zero".to_string(),
            });
        }

        let database = tokio::time::timeout(Duration::from_millis(config.timeout_ms), build_database(config))
            .await
            .map_err(|_| Error::Connection {
                details: format!("Timed out after {}ms while opening database", config.timeout_ms),
            })??;

        let pool_size = pool_size(config);
        let mut connections = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let connection = database.connect().map_err(|source| Error::Libsql {
                context: "connect database".to_string(),
                source,
            })?;
            connection
                .busy_timeout(Duration::from_millis(config.timeout_ms))
                .map_err(|source| Error::Libsql {
                    context: "set busy timeout".to_string(),
                    source,
                })?;
            execute(&connection, "PRAGMA foreign_keys = ON", Vec::new()).await?;
            connections.push(connection);
        }

        Ok(Self {
            inner: Arc::new(LibsqlPoolInner {
                _database: database,
                connections: std::sync::Mutex::new(connections),
                semaphore: Arc::new(Semaphore::new(pool_size)),
            }),
        })
    }

    async fn acquire(&self) -> Result<PooledConnection> {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Connection {
                details: "Connection pool is closed".to_string(),
            })?;

        let mut connections = self.inner.connections.lock().map_err(|_| Error::Connection {
            details: "Connection pool mutex is poisoned".to_string(),
        })?;
        let connection = connections.pop().ok_or_else(|| Error::Connection {
            details: "Connection pool exhausted".to_string(),
        })?;
        Ok(PooledConnection {
            inner: self.inner.clone(),
            connection: Some(connection),
            _permit: permit,
        })
    }
}

struct PooledConnection {
    inner: Arc<LibsqlPoolInner>,
    connection: Option<LibsqlConnection>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl PooledConnection {
    fn connection(&self) -> Result<&LibsqlConnection> {
        self.connection.as_ref().ok_or_else(|| Error::Connection {
            details: "Pooled connection missing".to_string(),
        })
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Ok(mut connections) = self.inner.connections.lock() {
                connections.push(connection);
            }
        }
    }
}

/// Unit of atomic work; dropped without commit means rolled back.
pub struct DbTransaction {
    backend: TransactionBackend,
    schema: Option<SchemaMapping>,
    active: bool,
}

enum TransactionBackend {
    Libsql {
        connection: Option<PooledConnection>,
        transaction: Option<Transaction>,
    },
    #[cfg(feature = "memory")]
    Memory {
        shared: Arc<MemoryState>,
        working_state: DatabaseState,
        ops: Vec<WriteOp>,
    },
}

impl DbTransaction {
    pub async fn insert_row(&mut self, table: &str, row: Row) -> Result<()> {
        self.write(WriteOp::Insert {
            table: table.to_string(),
            row,
        })
        .await
        .map(|_| ())
    }

    pub async fn update_rows(&mut self, table: &str, filter: &Row, updates: &Row) -> Result<usize> {
        self.write(WriteOp::Update {
            table: table.to_string(),
            filter: filter.clone(),
            updates: updates.clone(),
        })
        .await
    }

    pub async fn delete_rows(&mut self, table: &str, filter: &Row) -> Result<usize> {
        self.write(WriteOp::Delete {
            table: table.to_string(),
            filter: filter.clone(),
        })
        .await
    }

    pub async fn select_rows(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        self.ensure_active()?;
        match &self.backend {
            TransactionBackend::Libsql { transaction, .. } => {
                let tx = active_transaction(transaction)?;
                let (sql, params) = build_select_sql(table, query);
                let schema = self.schema.as_ref().and_then(|s| s.table(table));
                query_rows(tx, table, &sql, params, schema).await
            }
            #[cfg(feature = "memory")]
            TransactionBackend::Memory { working_state, .. } => {
                working_state.select(self.schema.as_ref(), table, query)
            }
        }
    }

    pub async fn select_one(&self, table: &str, query: &Query) -> Result<Option<Row>> {
        let query = query.clone().limit(1);
        Ok(self.select_rows(table, &query).await?.into_iter().next())
    }

    pub async fn count_rows(&self, table: &str, filter: &Row) -> Result<usize> {
        self.ensure_active()?;
        match &self.backend {
            TransactionBackend::Libsql { transaction, .. } => {
                let tx = active_transaction(transaction)?;
                let (sql, params) = build_count_sql(table, filter);
                query_count(tx, &sql, params).await
            }
            #[cfg(feature = "memory")]
            TransactionBackend::Memory { working_state, .. } => {
                working_state.count(self.schema.as_ref(), table, filter)
            }
        }
    }

    async fn write(&mut self, op: WriteOp) -> Result<usize> {
        self.ensure_active()?;
        match &mut self.backend {
            TransactionBackend::Libsql { transaction, .. } => {
                let tx = active_transaction(transaction)?;
                let (sql, params) = op.to_sql()?;
                execute(tx, &sql, params).await
            }
            #[cfg(feature = "memory")]
            TransactionBackend::Memory {
                working_state, ops, ..
            } => {
                let changed = working_state.apply(self.schema.as_ref(), &op)?;
                ops.push(op);
                Ok(changed)
            }
        }
    }

    pub async fn commit(mut self) -> Result<()> {
        self.ensure_active()?;
        match &mut self.backend {
            TransactionBackend::Libsql {
                transaction,
                connection,
            } => {
                let tx = transaction.take().ok_or_else(inactive)?;
                tx.commit().await.map_err(|source| Error::Libsql {
                    context: "commit transaction".to_string(),
                    source,
                })?;
                connection.take();
            }
            #[cfg(feature = "memory")]
            TransactionBackend::Memory { shared, ops, .. } => {
                // Replay against the latest committed state so concurrent commits are not lost.
                let schema = shared.schema.read().await;
                let mut committed = shared.state.write().await;
                let mut next = committed.clone();
                for op in ops.iter() {
                    next.apply(schema.as_ref(), op)?;
                }
                *committed = next;
            }
        }
        self.active = false;
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.ensure_active()?;
        match &mut self.backend {
            TransactionBackend::Libsql {
                transaction,
                connection,
            } => {
                let tx = transaction.take().ok_or_else(inactive)?;
                tx.rollback().await.map_err(|source| Error::Libsql {
                    context: "rollback transaction".to_string(),
                    source,
                })?;
                connection.take();
            }
            #[cfg(feature = "memory")]
            TransactionBackend::Memory { ops, .. } => ops.clear(),
        }
        self.active = false;
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if !self.active {
            return Err(inactive());
        }
        Ok(())
    }
}

fn inactive() -> Error {
    Error::Transaction {
        details: "Transaction is no longer active".to_string(),
    }
}

fn active_transaction(transaction: &Option<Transaction>) -> Result<&Transaction> {
    transaction.as_ref().ok_or_else(inactive)
}

/// Statement failures, with uniqueness violations surfaced as conflicts.
fn sql_error(statement: &str, source: libsql::Error) -> Error {
    let message = source.to_string();
    if message.contains("UNIQUE constraint failed") {
        Error::Conflict { details: message }
    } else {
        Error::Sql {
            statement: statement.to_string(),
            source,
        }
    }
}

async fn execute(connection: &LibsqlConnection, sql: &str, params: Vec<libsql::Value>) -> Result<usize> {
    let changed = connection
        .execute(sql, params_from_iter(params))
        .await
        .map_err(|source| sql_error(sql, source))?;
    Ok(changed as usize)
}

async fn query_count(connection: &LibsqlConnection, sql: &str, params: Vec<libsql::Value>) -> Result<usize> {
    let mut rows = connection
        .query(sql, params_from_iter(params))
        .await
        .map_err(|source| sql_error(sql, source))?;
    match rows.next().await.map_err(|source| sql_error(sql, source))? {
        Some(row) => {
            let count: i64 = row.get(0).map_err(|source| sql_error(sql, source))?;
            Ok(count.max(0) as usize)
        }
        None => Ok(0),
    }
}

async fn query_rows(
    connection: &LibsqlConnection,
    table: &str,
    sql: &str,
    params: Vec<libsql::Value>,
    schema: Option<&TableSchema>,
) -> Result<Vec<Row>> {
    let mut rows = connection
        .query(sql, params_from_iter(params))
        .await
        .map_err(|source| sql_error(sql, source))?;

    let mut output = Vec::new();
    while let Some(row) = rows.next().await.map_err(|source| sql_error(sql, source))? {
        output.push(libsql_row_to_row(table, &row, schema)?);
    }

    Ok(output)
}

async fn build_database(config: &ConnectionConfig) -> Result<Database> {
    let url = config.database_url.trim();
    if url.is_empty() {
        return Err(Error::Config {
            details: "database_url must be provided".to_string(),
        });
    }

    if is_remote_url(url) {
        let token = config.auth_token.clone().ok_or_else(|| Error::Config {
            details: "auth_token is required for remote databases".to_string(),
        })?;
        Builder::new_remote(url.to_string(), token)
            .build()
            .await
            .map_err(|source| Error::Libsql {
                context: "open remote database".to_string(),
                source,
            })
    } else {
        let path = url.strip_prefix("file:").unwrap_or(url);
        Builder::new_local(path)
            .build()
            .await
            .map_err(|source| Error::Libsql {
                context: "open local database".to_string(),
                source,
            })
    }
}

fn is_remote_url(url: &str) -> bool {
    url.starts_with("libsql://") || url.starts_with("https://") || url.starts_with("http://")
}

fn is_in_memory_url(url: &str) -> bool {
    let url = url.trim();
    url == ":memory:" || url.starts_with("file::memory:") || url.contains("mode=memory")
}

fn pool_size(config: &ConnectionConfig) -> usize {
    if is_in_memory_url(&config.database_url) {
        1
    } else {
        config.max_connections
    }
}

/// Strip query strings that may carry credentials before logging.
fn redact_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn libsql_row_to_row(table: &str, row: &libsql::Row, schema: Option<&TableSchema>) -> Result<Row> {
    let mut record = Row::new();
    for idx in 0..row.column_count() {
        let column_name = row.column_name(idx).ok_or_else(|| Error::Query {
            table: table.to_string(),
            details: format!("Missing column name for index {idx}"),
        })?;
        let value = row.get_value(idx).map_err(|source| Error::Query {
            table: table.to_string(),
            details: format!("Failed to read column '{column_name}': {source}"),
        })?;

        let db_value = match schema.and_then(|schema| schema.column(column_name)) {
            Some(column) => libsql_value_to_db_typed(table, column_name, value, column.column_type)?,
            None => libsql_value_to_db(value),
        };

        record.insert(column_name.to_string(), db_value);
    }
    Ok(record)
}

fn libsql_value_to_db(value: libsql::Value) -> DbValue {
    match value {
        libsql::Value::Null => DbValue::Null,
        libsql::Value::Integer(value) => DbValue::Integer(value),
        libsql::Value::Real(value) => DbValue::Decimal(value),
        libsql::Value::Text(value) => DbValue::String(value),
        libsql::Value::Blob(value) => DbValue::Blob(value),
    }
}

fn libsql_value_to_db_typed(
    table: &str,
    column: &str,
    value: libsql::Value,
    column_type: ColumnType,
) -> Result<DbValue> {
    match (value, column_type) {
        (libsql::Value::Null, _) => Ok(DbValue::Null),
        (libsql::Value::Text(value), ColumnType::String) => Ok(DbValue::String(value)),
        (libsql::Value::Blob(value), ColumnType::String) => {
            String::from_utf8(value)
                .map(DbValue::String)
                .map_err(|_| Error::Schema {
                    details: format!("Invalid UTF-8 for string column '{table}.{column}' while reading blob value"),
                })
        }
        (libsql::Value::Blob(value), ColumnType::Blob) => Ok(DbValue::Blob(value)),
        (libsql::Value::Text(value), ColumnType::Blob) => Ok(DbValue::Blob(value.into_bytes())),
        (libsql::Value::Integer(value), ColumnType::Integer) => Ok(DbValue::Integer(value)),
        (libsql::Value::Real(value), ColumnType::Decimal) => Ok(DbValue::Decimal(value)),
        (libsql::Value::Integer(value), ColumnType::Decimal) => Ok(DbValue::Decimal(value as f64)),
        (libsql::Value::Integer(value), ColumnType::Boolean) => Ok(DbValue::Boolean(value != 0)),
        (libsql::Value::Text(value), ColumnType::Boolean) => match value.as_str() {
            "true" | "TRUE" | "1" => Ok(DbValue::Boolean(true)),
            "false" | "FALSE" | "0" => Ok(DbValue::Boolean(false)),
            _ => Err(Error::Schema {
                details: format!("Invalid boolean value for '{table}.{column}': '{value}'"),
            }),
        },
        (other, expected) => Err(Error::Schema {
            details: format!("Type mismatch for '{table}.{column}': expected {expected:?}, found {other:?}"),
        }),
    }
}
