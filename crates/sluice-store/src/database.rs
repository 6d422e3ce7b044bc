// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use sluice_core::SluiceError;
use tokio_rusqlite::Connection;
use tracing::debug;

/// A WAL-mode SQLite database with the log schema migrated.
///
/// Wraps a single [`tokio_rusqlite::Connection`]; every query goes through
/// [`connection()`](Database::connection)`.call(...)` and runs on the one
/// background thread, which is what keeps concurrent writers from ever
/// seeing `SQLITE_BUSY`.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if absent) the database at `path`, switch it to WAL
    /// mode, and run any pending embedded migrations.
    pub async fn open(path: &str) -> Result<Self, SluiceError> {
        let conn = Connection::open(path).await.map_err(map_tr_err)?;
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;",
            )?;
            crate::migrations::run_migrations(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
        debug!(path, "log store opened");
        Ok(Database { conn })
    }

    /// The underlying connection handle.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL so everything written so far lands in the main
    /// database file.
    pub async fn close(&self) -> Result<(), SluiceError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("log store WAL checkpoint complete");
        Ok(())
    }
}

/// Map a tokio-rusqlite error into the store error variant.
pub(crate) fn map_tr_err(err: tokio_rusqlite::Error) -> SluiceError {
    SluiceError::store(err)
}
