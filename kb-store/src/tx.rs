//! Transaction runner: wraps a closure in a SQLite transaction with
//! guaranteed rollback on error, surfacing commit and rollback failures as
//! their own distinct error variants rather than folding them into whatever
//! error the closure itself returned. Every entry point also takes a
//! [`CancellationToken`](kb_core::CancellationToken), honored immediately
//! before the transaction opens and again immediately before commit.

use kb_core::errors::{StoreError, StoreResult};
use kb_core::CancellationToken;
use rusqlite::Connection;
use tracing::error;

/// Run `f` inside a read-write transaction on the writer connection. On
/// success, commits and returns `f`'s output. On failure inside `f`, rolls
/// back and returns the original error — unless the rollback itself fails,
/// in which case both errors are preserved in a [`StoreError::RollbackError`].
pub fn with_tx<T>(conn: &mut Connection, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
    with_tx_cancellable(conn, &CancellationToken::none(), f)
}

/// Same as [`with_tx`], but checks `token` before opening the transaction and
/// again immediately before commit, surfacing `Cancelled` instead of
/// proceeding once the token has fired.
pub fn with_tx_cancellable<T>(
    conn: &mut Connection,
    token: &CancellationToken,
    f: impl FnOnce(&Connection) -> StoreResult<T>,
) -> StoreResult<T> {
    token.check()?;
    let tx = conn.transaction()?;
    match f(&tx) {
        Ok(value) => {
            token.check()?;
            tx.commit().map_err(|e| StoreError::CommitError(e.to_string()))?;
            Ok(value)
        }
        Err(original) => {
            let original_msg = original.to_string();
            match tx.rollback() {
                Ok(()) => Err(original),
                Err(rollback_err) => {
                    error!(original = %original_msg, rollback = %rollback_err, "rollback failed after transaction error");
                    Err(StoreError::RollbackError {
                        original: original_msg,
                        rollback: rollback_err.to_string(),
                    })
                }
            }
        }
    }
}

/// Run `f` against a deferred transaction, intended for a connection already
/// configured read-only (`PRAGMA query_only = ON`, as every pooled reader
/// connection is — see `pragmas::configure_readonly_connection`). Takes `&
/// Connection` rather than `&mut Connection` (via rusqlite's
/// `unchecked_transaction`) so it composes with [`crate::pool::ConnectionPool::with_reader`],
/// which only ever hands out shared references to its pooled readers. A
/// write attempted by `f` is rejected by the engine itself, not by this
/// function; on the ordinary all-reads path there is nothing for the commit
/// to flush, but it is issued anyway to release the snapshot deterministically
/// rather than leaving the transaction open until `conn` drops.
pub fn with_tx_read_only<T>(conn: &Connection, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
    with_tx_read_only_cancellable(conn, &CancellationToken::none(), f)
}

pub fn with_tx_read_only_cancellable<T>(
    conn: &Connection,
    token: &CancellationToken,
    f: impl FnOnce(&Connection) -> StoreResult<T>,
) -> StoreResult<T> {
    token.check()?;
    let tx = conn.unchecked_transaction()?;
    match f(&tx) {
        Ok(value) => {
            token.check()?;
            tx.commit().map_err(|e| StoreError::CommitError(e.to_string()))?;
            Ok(value)
        }
        Err(original) => {
            let original_msg = original.to_string();
            match tx.rollback() {
                Ok(()) => Err(original),
                Err(rollback_err) => {
                    error!(original = %original_msg, rollback = %rollback_err, "rollback failed after read-only transaction error");
                    Err(StoreError::RollbackError {
                        original: original_msg,
                        rollback: rollback_err.to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{migrations, pragmas};
    use kb_core::config::PragmaConfig;
    use kb_core::errors::StoreError;
    use std::time::Duration;

    fn fresh_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        migrations::run_core(&mut conn, 4).unwrap();
        conn
    }

    #[test]
    fn successful_closure_commits() {
        let mut conn = fresh_conn();
        with_tx(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO entities (name, entity_type, embedding, created_at, updated_at)
                 VALUES ('e1', 't', randomblob(16), '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn failing_closure_rolls_back() {
        let mut conn = fresh_conn();
        let result: StoreResult<()> = with_tx(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO entities (name, entity_type, embedding, created_at, updated_at)
                 VALUES ('e1', 't', randomblob(16), '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                [],
            )?;
            Err(StoreError::ConstraintError("deliberate failure".into()))
        });
        assert!(result.is_err());
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 0, "the insert must not survive the rollback");
    }

    #[test]
    fn read_only_connection_rejects_a_write_attempt() {
        let conn = fresh_conn();
        pragmas::configure_readonly_connection(&conn, &PragmaConfig::default()).unwrap();
        let result: StoreResult<()> = with_tx_read_only(&conn, |tx| {
            tx.execute(
                "INSERT INTO entities (name, entity_type, embedding, created_at, updated_at)
                 VALUES ('e1', 't', randomblob(16), '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        });
        assert!(result.is_err(), "query_only must reject the write");
    }

    #[test]
    fn read_only_transaction_commits_cleanly_on_reads() {
        let conn = fresh_conn();
        pragmas::configure_readonly_connection(&conn, &PragmaConfig::default()).unwrap();
        let count = with_tx_read_only(&conn, |tx| -> StoreResult<i64> {
            tx.query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0))
                .map_err(StoreError::from)
        })
        .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn cancelled_token_short_circuits_before_opening_the_transaction() {
        let mut conn = fresh_conn();
        let token = CancellationToken::none();
        token.cancel();
        let result: StoreResult<()> = with_tx_cancellable(&mut conn, &token, |_tx| Ok(()));
        assert!(matches!(result, Err(StoreError::Cancelled)));
    }

    #[test]
    fn expired_deadline_is_honored() {
        let mut conn = fresh_conn();
        let token = CancellationToken::with_timeout(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(20));
        let result: StoreResult<()> = with_tx_cancellable(&mut conn, &token, |_tx| Ok(()));
        assert!(matches!(result, Err(StoreError::Cancelled)));
    }
}
