//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use resilient_db::config::DataAccessConfig;
use resilient_db::store::{
    Rollback, Row, RunResult, Store, StoreError, StoreErrorKind, StoreTransaction,
};
use resilient_db::ManagedDataAccess;

/// Programmable in-memory store.
///
/// `run` statements are recorded as applied writes; inside a transaction
/// they are staged and only applied on commit. Any statement containing
/// `FAIL` fails with a constraint violation. A failed commit releases the
/// transaction handle and drops its staged writes, as sqlx does.
#[derive(Default)]
pub struct ScriptedStore {
    failures: Mutex<VecDeque<StoreErrorKind>>,
    delay: Mutex<Option<Duration>>,
    rows: Mutex<Vec<Row>>,
    writes: Arc<Mutex<Vec<String>>>,
    counters: Mutex<HashMap<&'static str, u32>>,
    calls: AtomicU32,
    rollbacks: Arc<AtomicU32>,
    commit_failure: Arc<Mutex<Option<StoreErrorKind>>>,
    rollback_failure: Arc<Mutex<Option<StoreErrorKind>>>,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next `times` statements with `kind`.
    pub fn fail_next(&self, kind: StoreErrorKind, times: usize) {
        let mut failures = self.failures.lock().unwrap();
        failures.extend(std::iter::repeat(kind).take(times));
    }

    /// Fail the next transaction commit with `kind`.
    pub fn fail_next_commit(&self, kind: StoreErrorKind) {
        *self.commit_failure.lock().unwrap() = Some(kind);
    }

    /// Fail the next transaction rollback with `kind`.
    pub fn fail_next_rollback(&self, kind: StoreErrorKind) {
        *self.rollback_failure.lock().unwrap() = Some(kind);
    }

    /// Sleep this long before answering every statement.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Rows returned by `get` (first) and `all`.
    pub fn set_rows(&self, rows: Vec<Value>) {
        *self.rows.lock().unwrap() = rows
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                other => panic!("row must be an object, got {other}"),
            })
            .collect();
    }

    /// Statements that reached the store, including failed ones.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls per operation name (`get`, `all`, `run`, `begin`).
    pub fn calls_of(&self, op: &'static str) -> u32 {
        self.counters.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    /// Writes that were applied, in order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    /// Rollback calls, whatever their outcome.
    pub fn rollbacks(&self) -> u32 {
        self.rollbacks.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: &'static str, query: &str) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.counters.lock().unwrap().entry(op).or_default() += 1;

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.failures.lock().unwrap().pop_front();
        if let Some(kind) = scripted {
            return Err(StoreError::new(kind, format!("scripted {kind:?}")));
        }
        fail_marker(query)
    }
}

fn fail_marker(query: &str) -> Result<(), StoreError> {
    if query.contains("FAIL") {
        Err(StoreError::new(
            StoreErrorKind::Constraint,
            "UNIQUE constraint failed: bets.id",
        ))
    } else {
        Ok(())
    }
}

#[async_trait]
impl Store for ScriptedStore {
    async fn get(&self, query: &str, _params: &[Value]) -> Result<Option<Row>, StoreError> {
        self.enter("get", query).await?;
        Ok(self.rows.lock().unwrap().first().cloned())
    }

    async fn all(&self, query: &str, _params: &[Value]) -> Result<Vec<Row>, StoreError> {
        self.enter("all", query).await?;
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn run(&self, query: &str, _params: &[Value]) -> Result<RunResult, StoreError> {
        self.enter("run", query).await?;
        let mut writes = self.writes.lock().unwrap();
        writes.push(query.to_string());
        Ok(RunResult {
            changes: 1,
            last_id: Some(writes.len() as i64),
        })
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        self.enter("begin", "BEGIN").await?;
        Ok(Box::new(ScriptedTransaction {
            staged: Vec::new(),
            rows: self.rows.lock().unwrap().clone(),
            writes: self.writes.clone(),
            rollbacks: self.rollbacks.clone(),
            commit_failure: self.commit_failure.clone(),
            rollback_failure: self.rollback_failure.clone(),
            released: false,
        }))
    }
}

struct ScriptedTransaction {
    staged: Vec<String>,
    rows: Vec<Row>,
    writes: Arc<Mutex<Vec<String>>>,
    rollbacks: Arc<AtomicU32>,
    commit_failure: Arc<Mutex<Option<StoreErrorKind>>>,
    rollback_failure: Arc<Mutex<Option<StoreErrorKind>>>,
    released: bool,
}

#[async_trait]
impl StoreTransaction for ScriptedTransaction {
    async fn get(&mut self, query: &str, _params: &[Value]) -> Result<Option<Row>, StoreError> {
        fail_marker(query)?;
        Ok(self.rows.first().cloned())
    }

    async fn all(&mut self, query: &str, _params: &[Value]) -> Result<Vec<Row>, StoreError> {
        fail_marker(query)?;
        Ok(self.rows.clone())
    }

    async fn run(&mut self, query: &str, _params: &[Value]) -> Result<RunResult, StoreError> {
        fail_marker(query)?;
        self.staged.push(query.to_string());
        Ok(RunResult {
            changes: 1,
            last_id: None,
        })
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let failure = self.commit_failure.lock().unwrap().take();
        if let Some(kind) = failure {
            self.staged.clear();
            self.released = true;
            return Err(StoreError::new(kind, "scripted commit failure"));
        }
        self.writes.lock().unwrap().append(&mut self.staged);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<Rollback, StoreError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        let failure = self.rollback_failure.lock().unwrap().take();
        if let Some(kind) = failure {
            return Err(StoreError::new(kind, "scripted rollback failure"));
        }
        self.staged.clear();
        if self.released {
            Ok(Rollback::Released)
        } else {
            Ok(Rollback::RolledBack)
        }
    }
}

/// Log lines written while the guard from `capture_logs` is alive.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Route this thread's tracing output into a buffer. Works with the
/// default current-thread `#[tokio::test]` runtime.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

/// Defaults with a small breaker threshold and short deadlines.
pub fn test_config() -> DataAccessConfig {
    let mut config = DataAccessConfig::default();
    config.breaker.failure_threshold = 3;
    config.breaker.open_duration_ms = 1_000;
    config.queries.timeout_ms = 500;
    config.queries.slow_query_ms = 200;
    config.health_check.timeout_ms = 100;
    config
}

pub fn managed(store: Arc<ScriptedStore>) -> ManagedDataAccess {
    ManagedDataAccess::new(store, &test_config())
}

pub fn bet_row(id: i64, stake: f64) -> Value {
    json!({ "id": id, "user_id": 7, "stake": stake, "status": "open" })
}
