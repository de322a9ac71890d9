//! Transaction scope
//!
//! Commits when the wrapped operation succeeds and rolls back when it fails,
//! returning the operation's error unchanged. A rollback that itself fails is
//! logged and does not replace the original error.

use sluice_core::{observe, Connection, Result};
use std::time::Instant;

/// An open transaction on a borrowed connection.
///
/// Dropping the guard without calling [`commit`](Self::commit) rolls back.
pub struct TransactionGuard<'c, C: Connection> {
    conn: &'c mut C,
    active: bool,
    started: Instant,
}

impl<'c, C: Connection> TransactionGuard<'c, C> {
    pub fn begin(conn: &'c mut C) -> Result<Self> {
        conn.begin()?;
        tracing::trace!("Transaction started");
        Ok(Self {
            conn,
            active: true,
            started: Instant::now(),
        })
    }

    /// The connection the transaction runs on.
    pub fn conn(&mut self) -> &mut C {
        &mut *self.conn
    }

    /// Commit. If the commit fails the transaction is rolled back before the
    /// commit error is returned.
    pub fn commit(mut self) -> Result<()> {
        self.active = false;
        match self.conn.commit() {
            Ok(()) => {
                observe::record_transaction(self.started.elapsed(), true);
                tracing::trace!("Transaction committed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Commit failed, rolling back");
                self.rollback_quietly();
                Err(e)
            }
        }
    }

    pub fn rollback(mut self) -> Result<()> {
        self.active = false;
        let result = self.conn.rollback();
        observe::record_transaction(self.started.elapsed(), false);
        result
    }

    fn rollback_quietly(&mut self) {
        if let Err(e) = self.conn.rollback() {
            tracing::warn!(error = %e, "Rollback failed");
        }
        observe::record_transaction(self.started.elapsed(), false);
    }
}

impl<'c, C: Connection> Drop for TransactionGuard<'c, C> {
    fn drop(&mut self) {
        if self.active {
            tracing::warn!("Transaction dropped without commit, rolling back");
            self.active = false;
            self.rollback_quietly();
        }
    }
}

/// Run `op` inside a transaction on `conn`.
pub fn run_in_transaction<C, T, F>(conn: &mut C, op: F) -> Result<T>
where
    C: Connection,
    F: FnOnce(&mut C) -> Result<T>,
{
    let mut txn = TransactionGuard::begin(conn)?;
    match op(txn.conn()) {
        Ok(value) => {
            txn.commit()?;
            Ok(value)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Operation failed, rolling back transaction");
            if let Err(rollback_err) = txn.rollback() {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

/// Wrap a connection-taking operation so every invocation is transactional.
pub fn transactional<C, T, F>(mut op: F) -> impl FnMut(&mut C) -> Result<T>
where
    C: Connection,
    F: FnMut(&mut C) -> Result<T>,
{
    move |conn: &mut C| run_in_transaction(conn, &mut op)
}
