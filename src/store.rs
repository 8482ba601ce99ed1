//! Driver boundary: statement execution over sqlx pools, row decoding, and error classification.

use crate::config::DatabaseConfig;
use crate::error::{AppError, ConfigError};
use crate::sql::{Dialect, SqlValue};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, ValueRef};
use std::str::FromStr;
use std::sync::Arc;

/// Rows come back as positional cells; the caller knows the column list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Vec<SqlValue>>,
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

impl ResultSet {
    /// First cell of the first row.
    pub fn scalar(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|r| r.first())
    }
}

/// Executes one parameterized statement. Integrity violations surface as `AppError::Integrity`.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, AppError>;
}

/// An executor bundled with the dialect its SQL must be written in.
#[derive(Clone)]
pub struct Database {
    executor: Arc<dyn Executor>,
    dialect: Dialect,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("dialect", &self.dialect).finish()
    }
}

impl Database {
    pub fn new(executor: Arc<dyn Executor>, dialect: Dialect) -> Self {
        Database { executor, dialect }
    }

    pub fn sqlite(pool: SqlitePool) -> Self {
        Self::new(Arc::new(pool), Dialect::Sqlite)
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(pool), Dialect::Postgres)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, AppError> {
        tracing::debug!(sql = %sql, params = ?params, "query");
        self.executor.execute(sql, params).await
    }

    /// Open a pool for the configured provider. In-memory SQLite is pinned to one connection.
    pub async fn connect(config: &DatabaseConfig) -> Result<Database, AppError> {
        let dialect = Dialect::from_provider(&config.provider)?;
        match dialect {
            Dialect::Sqlite => {
                let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
                let pool = if config.url.contains(":memory:") {
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                        .connect_with(options)
                        .await?
                } else {
                    SqlitePoolOptions::new()
                        .max_connections(config.max_connections)
                        .connect_with(options)
                        .await?
                };
                Ok(Database::sqlite(pool))
            }
            Dialect::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect(&config.url)
                    .await?;
                Ok(Database::postgres(pool))
            }
            Dialect::MySql | Dialect::Generic => Err(ConfigError::Validation(format!(
                "provider '{}' generates SQL but has no executor",
                config.provider
            ))
            .into()),
        }
    }

    /// `SELECT 1` round trip.
    pub async fn ping(&self) -> Result<(), AppError> {
        self.execute("SELECT 1", &[]).await.map(|_| ())
    }
}

fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start();
    head.get(..6).map(|s| s.eq_ignore_ascii_case("select")).unwrap_or(false) || sql.contains(" RETURNING ")
}

fn is_insert(sql: &str) -> bool {
    let head = sql.trim_start();
    head.get(..6).map(|s| s.eq_ignore_ascii_case("insert")).unwrap_or(false)
}

/// Constraint failures become `Integrity`; everything else stays a driver error.
pub fn classify(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if is_integrity(db.as_ref()) {
            return AppError::Integrity(db.message().to_string());
        }
    }
    AppError::Db(err)
}

fn is_integrity(db: &dyn sqlx::error::DatabaseError) -> bool {
    use sqlx::error::ErrorKind;
    if matches!(
        db.kind(),
        ErrorKind::UniqueViolation | ErrorKind::ForeignKeyViolation | ErrorKind::NotNullViolation | ErrorKind::CheckViolation
    ) {
        return true;
    }
    match db.code() {
        // SQLSTATE class 23
        Some(code) if code.len() == 5 => code.starts_with("23"),
        // SQLite extended result code with primary code SQLITE_CONSTRAINT
        Some(code) => code.parse::<i32>().map(|c| c & 0xff == 19).unwrap_or(false),
        None => false,
    }
}

#[async_trait]
impl Executor for SqlitePool {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, AppError> {
        let mut query = sqlx::query(sql);
        for p in params {
            query = query.bind(p.clone());
        }
        if returns_rows(sql) {
            let rows = query.fetch_all(self).await.map_err(classify)?;
            return Ok(ResultSet {
                rows: rows.iter().map(sqlite_row).collect(),
                ..Default::default()
            });
        }
        let done = query.execute(self).await.map_err(classify)?;
        Ok(ResultSet {
            rows: Vec::new(),
            rows_affected: done.rows_affected(),
            last_insert_id: is_insert(sql).then(|| done.last_insert_rowid()),
        })
    }
}

#[async_trait]
impl Executor for PgPool {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<ResultSet, AppError> {
        let mut query = sqlx::query(sql);
        for p in params {
            query = query.bind(p.clone());
        }
        if returns_rows(sql) {
            let rows = query.fetch_all(self).await.map_err(classify)?;
            let rows: Vec<Vec<SqlValue>> = rows.iter().map(pg_row).collect();
            let last_insert_id = if is_insert(sql) {
                rows.first().and_then(|r| match r.first() {
                    Some(SqlValue::Integer(n)) => Some(*n),
                    _ => None,
                })
            } else {
                None
            };
            return Ok(ResultSet {
                rows_affected: if is_insert(sql) { rows.len() as u64 } else { 0 },
                rows,
                last_insert_id,
            });
        }
        let done = query.execute(self).await.map_err(classify)?;
        Ok(ResultSet {
            rows: Vec::new(),
            rows_affected: done.rows_affected(),
            last_insert_id: None,
        })
    }
}

fn sqlite_row(row: &SqliteRow) -> Vec<SqlValue> {
    (0..row.len()).map(|i| sqlite_cell(row, i)).collect()
}

fn sqlite_cell(row: &SqliteRow, i: usize) -> SqlValue {
    match row.try_get_raw(i) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Err(_) => return SqlValue::Null,
        _ => {}
    }
    if let Ok(n) = row.try_get::<i64, _>(i) {
        return SqlValue::Integer(n);
    }
    if let Ok(f) = row.try_get::<f64, _>(i) {
        return SqlValue::Float(f);
    }
    if let Ok(s) = row.try_get::<String, _>(i) {
        return SqlValue::Text(s);
    }
    if let Ok(b) = row.try_get::<Vec<u8>, _>(i) {
        return SqlValue::Blob(b);
    }
    SqlValue::Null
}

fn pg_row(row: &PgRow) -> Vec<SqlValue> {
    (0..row.len()).map(|i| pg_cell(row, i)).collect()
}

fn pg_cell(row: &PgRow, i: usize) -> SqlValue {
    match row.try_get_raw(i) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Err(_) => return SqlValue::Null,
        _ => {}
    }
    if let Ok(n) = row.try_get::<i16, _>(i) {
        return SqlValue::Integer(n.into());
    }
    if let Ok(n) = row.try_get::<i32, _>(i) {
        return SqlValue::Integer(n.into());
    }
    if let Ok(n) = row.try_get::<i64, _>(i) {
        return SqlValue::Integer(n);
    }
    if let Ok(f) = row.try_get::<f32, _>(i) {
        return SqlValue::Float(f.into());
    }
    if let Ok(f) = row.try_get::<f64, _>(i) {
        return SqlValue::Float(f);
    }
    if let Ok(b) = row.try_get::<bool, _>(i) {
        return SqlValue::Integer(i64::from(b));
    }
    if let Ok(s) = row.try_get::<String, _>(i) {
        return SqlValue::Text(s);
    }
    if let Ok(d) = row.try_get::<chrono::NaiveDateTime, _>(i) {
        return SqlValue::DateTime(d);
    }
    if let Ok(d) = row.try_get::<chrono::NaiveDate, _>(i) {
        return SqlValue::Date(d);
    }
    if let Ok(b) = row.try_get::<Vec<u8>, _>(i) {
        return SqlValue::Blob(b);
    }
    SqlValue::Null
}
