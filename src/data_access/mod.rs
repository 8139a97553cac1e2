//! Resilient data access.
//!
//! `ManagedDataAccess` wraps a `Store` with deadlines, a circuit breaker,
//! bounded retries, slow-query logging and transactions.

mod classify;
mod health;
mod managed;
mod options;
mod transaction;

pub use classify::QueryKind;
pub use health::HealthReport;
pub use managed::{truncate_query, ManagedDataAccess};
pub use options::{OperationType, QueryOptions};
pub use transaction::Transaction;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::store::{Row, RunResult};

/// Raw result of `execute_query`; its shape follows the query's `QueryKind`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    Row(Option<Row>),
    Rows(Vec<Row>),
    Run(RunResult),
}

impl QueryResult {
    /// First row, if any.
    pub fn into_row(self) -> Option<Row> {
        match self {
            QueryResult::Row(row) => row,
            QueryResult::Rows(rows) => rows.into_iter().next(),
            QueryResult::Run(_) => None,
        }
    }

    /// All rows; a mutation yields none.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryResult::Row(row) => row.into_iter().collect(),
            QueryResult::Rows(rows) => rows,
            QueryResult::Run(_) => Vec::new(),
        }
    }

    /// Mutation summary; reads report no changes.
    pub fn into_run(self) -> RunResult {
        match self {
            QueryResult::Run(result) => result,
            _ => RunResult::default(),
        }
    }

    /// Decode every row into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        self.into_rows().into_iter().map(decode_row).collect()
    }
}

pub(crate) fn decode_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}
