//! Managed access over a real SQLite database.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;

use resilient_db::error::{DataErrorKind, Error};
use resilient_db::store::SqliteStore;
use resilient_db::ManagedDataAccess;

mod common;

#[derive(Debug, Deserialize, PartialEq)]
struct Bet {
    id: i64,
    user_id: i64,
    stake: f64,
    status: String,
}

async fn setup() -> ManagedDataAccess {
    // One connection so every statement sees the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let access = ManagedDataAccess::new(
        Arc::new(SqliteStore::from_pool(pool)),
        &common::test_config(),
    );
    let write = access.write_options();
    access
        .execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, balance REAL NOT NULL CHECK (balance >= 0))",
            &[],
            write,
        )
        .await
        .unwrap();
    access
        .execute(
            "CREATE TABLE bets (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL, stake REAL NOT NULL, status TEXT NOT NULL)",
            &[],
            write,
        )
        .await
        .unwrap();
    access
        .execute("INSERT INTO users (id, balance) VALUES (7, 10.0)", &[], write)
        .await
        .unwrap();
    access
}

#[tokio::test]
async fn test_insert_and_read_back() {
    let access = setup().await;

    let result = access
        .execute(
            "INSERT INTO bets (user_id, stake, status) VALUES (?, ?, ?)",
            &[json!(7), json!(2.5), json!("open")],
            access.write_options(),
        )
        .await
        .unwrap();
    assert_eq!(result.changes, 1);
    assert_eq!(result.last_id, Some(1));

    let bet: Option<Bet> = access
        .query_one("SELECT * FROM bets WHERE id = ?", &[json!(1)], access.read_options())
        .await
        .unwrap();
    assert_eq!(
        bet,
        Some(Bet {
            id: 1,
            user_id: 7,
            stake: 2.5,
            status: "open".into()
        })
    );

    let missing: Option<Bet> = access.safe_get("SELECT * FROM bets WHERE id = ?", &[json!(99)]).await;
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_constraint_violation_is_data_error() {
    let access = setup().await;

    let err = access
        .execute(
            "INSERT INTO users (id, balance) VALUES (7, 1.0)",
            &[],
            access.write_options(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Data {
            kind: DataErrorKind::Constraint,
            ..
        }
    ));
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn test_bad_sql_is_data_error() {
    let access = setup().await;

    let err = access
        .query_many::<Value>("SELEC nonsense", &[], access.read_options())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Data { .. }));
    assert!(access.safe_all::<Value>("SELEC nonsense", &[]).await.is_empty());
}

#[tokio::test]
async fn test_failed_transaction_leaves_no_partial_write() {
    let access = setup().await;

    // Debit succeeds, then the second debit breaks the balance check.
    let err = access
        .execute_transaction(|tx| {
            Box::pin(async move {
                tx.run(
                    "INSERT INTO bets (user_id, stake, status) VALUES (7, 8.0, 'open')",
                    &[],
                )
                .await?;
                tx.run("UPDATE users SET balance = balance - 8.0 WHERE id = 7", &[])
                    .await?;
                tx.run("UPDATE users SET balance = balance - 8.0 WHERE id = 7", &[])
                    .await?;
                Ok(())
            })
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Data { .. }));

    let bets: Vec<Bet> = access.safe_all("SELECT * FROM bets", &[]).await;
    assert!(bets.is_empty());
    let balance: Option<Value> = access
        .safe_get("SELECT balance FROM users WHERE id = 7", &[])
        .await;
    assert_eq!(balance, Some(json!({ "balance": 10.0 })));
}

#[tokio::test]
async fn test_transaction_commit_is_visible() {
    let access = setup().await;

    let bet_id = access
        .execute_transaction(|tx| {
            Box::pin(async move {
                tx.run("UPDATE users SET balance = balance - 4.0 WHERE id = 7", &[])
                    .await?;
                let result = tx
                    .run(
                        "INSERT INTO bets (user_id, stake, status) VALUES (?, ?, 'open')",
                        &[json!(7), json!(4.0)],
                    )
                    .await?;
                Ok(result.last_id)
            })
        })
        .await
        .unwrap();
    assert_eq!(bet_id, Some(1));

    let balance: Option<Value> = access
        .safe_get("SELECT balance FROM users WHERE id = 7", &[])
        .await;
    assert_eq!(balance, Some(json!({ "balance": 6.0 })));
}

#[tokio::test]
async fn test_health_check_against_sqlite() {
    let access = setup().await;
    let report = access.health_check().await;
    assert!(report.is_healthy);
    assert!(report.error_message.is_none());
}
