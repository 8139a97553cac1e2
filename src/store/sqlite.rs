//! SQLite store backed by an sqlx connection pool.
//!
//! # Responsibilities
//! - Bind JSON parameters positionally by their JSON type
//! - Decode result rows into JSON objects keyed by column name
//! - Map SQLite result codes onto `StoreErrorKind`

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions,
    SqliteQueryResult, SqliteRow,
};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use crate::store::{
    Rollback, Row, RunResult, Store, StoreError, StoreErrorKind, StoreTransaction,
};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

// Primary SQLite result codes (extended codes carry them in the low byte).
const SQLITE_ERROR: i64 = 1;
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;
const SQLITE_IOERR: i64 = 10;
const SQLITE_CONSTRAINT: i64 = 19;
const SQLITE_MISMATCH: i64 = 20;

/// `Store` implementation over an sqlx `SqlitePool`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url`.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(map_error)?
            .create_if_missing(true)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(map_error)?;

        tracing::info!(url = %url, max_connections, "SQLite pool opened");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, query: &str, params: &[Value]) -> Result<Option<Row>, StoreError> {
        let row = bind_params(query, params)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_error)?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn all(&self, query: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
        let rows = bind_params(query, params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn run(&self, query: &str, params: &[Value]) -> Result<RunResult, StoreError> {
        let result = bind_params(query, params)
            .execute(&self.pool)
            .await
            .map_err(map_error)?;
        Ok(run_result(&result))
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await.map_err(map_error)?;
        Ok(Box::new(SqliteTransaction { tx: Some(tx) }))
    }
}

/// Open SQLite transaction. Dropping it unfinished rolls back.
struct SqliteTransaction {
    tx: Option<sqlx::Transaction<'static, Sqlite>>,
}

impl SqliteTransaction {
    fn active(&mut self) -> Result<&mut sqlx::Transaction<'static, Sqlite>, StoreError> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::new(StoreErrorKind::Other, "transaction already finished"))
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn get(&mut self, query: &str, params: &[Value]) -> Result<Option<Row>, StoreError> {
        let tx = self.active()?;
        let row = bind_params(query, params)
            .fetch_optional(&mut **tx)
            .await
            .map_err(map_error)?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn all(&mut self, query: &str, params: &[Value]) -> Result<Vec<Row>, StoreError> {
        let tx = self.active()?;
        let rows = bind_params(query, params)
            .fetch_all(&mut **tx)
            .await
            .map_err(map_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn run(&mut self, query: &str, params: &[Value]) -> Result<RunResult, StoreError> {
        let tx = self.active()?;
        let result = bind_params(query, params)
            .execute(&mut **tx)
            .await
            .map_err(map_error)?;
        Ok(run_result(&result))
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        match self.tx.take() {
            Some(tx) => tx.commit().await.map_err(map_error),
            None => Err(StoreError::new(
                StoreErrorKind::Other,
                "transaction already finished",
            )),
        }
    }

    async fn rollback(&mut self) -> Result<Rollback, StoreError> {
        match self.tx.take() {
            Some(tx) => {
                tx.rollback().await.map_err(map_error)?;
                Ok(Rollback::RolledBack)
            }
            // sqlx rolls back a transaction whose commit failed when it drops.
            None => Ok(Rollback::Released),
        }
    }
}

fn bind_params<'q>(query: &'q str, params: &[Value]) -> SqliteQuery<'q> {
    let mut q = sqlx::query(query);
    for param in params {
        q = match param {
            Value::Null => q.bind(None::<i64>),
            Value::Bool(b) => q.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => q.bind(i),
                None => q.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => q.bind(s.clone()),
            // Nested values are stored as their JSON text.
            other => q.bind(other.to_string()),
        };
    }
    q
}

fn decode_row(row: &SqliteRow) -> Result<Row, StoreError> {
    let mut out = Map::with_capacity(row.len());
    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx).map_err(map_error)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(idx).map_err(map_error)?),
                "REAL" | "NUMERIC" => {
                    let f = row.try_get::<f64, _>(idx).map_err(map_error)?;
                    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
                }
                "BLOB" => {
                    let bytes = row.try_get::<Vec<u8>, _>(idx).map_err(map_error)?;
                    Value::Array(bytes.into_iter().map(Value::from).collect())
                }
                _ => Value::String(row.try_get::<String, _>(idx).map_err(map_error)?),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn run_result(result: &SqliteQueryResult) -> RunResult {
    let last_id = result.last_insert_rowid();
    RunResult {
        changes: result.rows_affected(),
        last_id: (last_id != 0).then_some(last_id),
    }
}

fn classify_code(code: &str) -> StoreErrorKind {
    let Ok(code) = code.parse::<i64>() else {
        return StoreErrorKind::Other;
    };
    match code & 0xff {
        SQLITE_BUSY => StoreErrorKind::Busy,
        SQLITE_LOCKED => StoreErrorKind::Locked,
        SQLITE_IOERR => StoreErrorKind::ConnectionReset,
        SQLITE_CONSTRAINT | SQLITE_MISMATCH => StoreErrorKind::Constraint,
        SQLITE_ERROR => StoreErrorKind::Syntax,
        _ => StoreErrorKind::Other,
    }
}

fn map_error(err: sqlx::Error) -> StoreError {
    let kind = match &err {
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| classify_code(&code))
            .unwrap_or(StoreErrorKind::Other),
        sqlx::Error::PoolTimedOut => StoreErrorKind::LockTimeout,
        sqlx::Error::Io(_) => StoreErrorKind::ConnectionReset,
        sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => StoreErrorKind::Unavailable,
        _ => StoreErrorKind::Other,
    };
    StoreError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extended_codes_use_primary_byte() {
        // SQLITE_BUSY_SNAPSHOT (517) and SQLITE_CONSTRAINT_UNIQUE (2067)
        assert_eq!(classify_code("517"), StoreErrorKind::Busy);
        assert_eq!(classify_code("262"), StoreErrorKind::Locked);
        assert_eq!(classify_code("2067"), StoreErrorKind::Constraint);
        assert_eq!(classify_code("1"), StoreErrorKind::Syntax);
        assert_eq!(classify_code("not-a-code"), StoreErrorKind::Other);
    }

    #[test]
    fn test_pool_timeout_is_lock_timeout() {
        assert_eq!(
            map_error(sqlx::Error::PoolTimedOut).kind,
            StoreErrorKind::LockTimeout
        );
        assert_eq!(
            map_error(sqlx::Error::PoolClosed).kind,
            StoreErrorKind::Unavailable
        );
    }

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::from_pool(pool)
    }

    #[tokio::test]
    async fn test_rollback_reports_what_happened() {
        let store = memory_store().await;
        store.run("CREATE TABLE t (id INTEGER)", &[]).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.run("INSERT INTO t (id) VALUES (1)", &[]).await.unwrap();
        assert_eq!(tx.rollback().await.unwrap(), Rollback::RolledBack);
        // Handle already consumed
        assert_eq!(tx.rollback().await.unwrap(), Rollback::Released);
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(tx.rollback().await.unwrap(), Rollback::Released);
        assert!(tx.commit().await.is_err());
        drop(tx);

        assert!(store.all("SELECT * FROM t", &[]).await.unwrap().is_empty());
    }
}
