// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured store sink backed by SQLite.
//!
//! Plain messages land in `log` with their numeric category code; access
//! messages keep their request fields as typed columns in `access_log`.
//! Retention cleanup deletes by category and cutoff timestamp, with the
//! `EventHit` cutoff applied to `access_log` instead of `log`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;
use sluice_core::{Category, LogMessage, LogSink, RetentionCutoffs, SluiceError};
use tokio::sync::OnceCell;

use crate::database::{map_tr_err, Database};

/// A [`LogSink`] writing to a WAL-mode SQLite database.
///
/// The database handle lives in a [`OnceCell`], so `open` is naturally
/// idempotent and `write` opens lazily on first use.
pub struct StoreSink {
    target: Option<String>,
    db: OnceCell<Database>,
}

impl StoreSink {
    pub fn new() -> Self {
        StoreSink {
            target: None,
            db: OnceCell::new(),
        }
    }

    async fn database(&self) -> Result<&Database, SluiceError> {
        let Some(target) = self.target.clone() else {
            return Err(SluiceError::MissingTarget { sink: "store" });
        };
        self.db
            .get_or_try_init(|| async move { Database::open(&target).await })
            .await
    }
}

impl Default for StoreSink {
    fn default() -> Self {
        StoreSink::new()
    }
}

#[async_trait]
impl LogSink for StoreSink {
    fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    fn set_target(&mut self, target: &str) -> Result<(), SluiceError> {
        if target.trim().is_empty() {
            return Err(SluiceError::InvalidTarget {
                sink: "store",
                reason: "database path is empty".to_string(),
            });
        }
        // Retargeting forgets any open database.
        self.db = OnceCell::new();
        self.target = Some(target.to_string());
        Ok(())
    }

    async fn open(&mut self) -> Result<(), SluiceError> {
        self.database().await.map(|_| ())
    }

    async fn close(&mut self) -> Result<(), SluiceError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
        }
        self.db = OnceCell::new();
        Ok(())
    }

    async fn write(&mut self, message: &LogMessage) -> Result<(), SluiceError> {
        let db = self.database().await?;
        let logged_at = sql_timestamp(&message.timestamp);

        match &message.access {
            Some(fields) => {
                let fields = fields.clone();
                db.connection()
                    .call(move |conn| {
                        conn.execute(
                            "INSERT INTO access_log (logged_at, host_address, url, referrer,
                                                     languages, browser, browser_major, browser_minor)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                            params![
                                logged_at,
                                fields.host_address,
                                fields.url,
                                fields.referrer,
                                fields.languages,
                                fields.browser,
                                fields.browser_major,
                                fields.browser_minor,
                            ],
                        )?;
                        Ok(())
                    })
                    .await
                    .map_err(map_tr_err)
            }
            None => {
                let category = message.category.code();
                let source = message.source.clone();
                let text = message.text.clone();
                db.connection()
                    .call(move |conn| {
                        conn.execute(
                            "INSERT INTO log (logged_at, category, source, message)
                             VALUES (?1, ?2, ?3, ?4)",
                            params![logged_at, category, source, text],
                        )?;
                        Ok(())
                    })
                    .await
                    .map_err(map_tr_err)
            }
        }
    }

    /// Delete rows older than each category's cutoff. Size and generation
    /// arguments are file-sink concerns and are ignored here.
    async fn clean_up(
        &mut self,
        _max_size_kb: u64,
        _max_generations: u32,
        cutoffs: Option<&RetentionCutoffs>,
    ) -> Result<(), SluiceError> {
        let db = self.database().await?;
        let Some(cutoffs) = cutoffs else {
            return Ok(());
        };

        let mut log_cutoffs = Vec::new();
        let mut access_cutoff = None;
        for (category, cutoff) in cutoffs {
            let stamp = sql_timestamp(cutoff);
            if *category == Category::EventHit {
                access_cutoff = Some(stamp);
            } else {
                log_cutoffs.push((category.code(), stamp));
            }
        }

        db.connection()
            .call(move |conn| {
                for (code, stamp) in &log_cutoffs {
                    conn.execute(
                        "DELETE FROM log WHERE category = ?1 AND logged_at < ?2",
                        params![code, stamp],
                    )?;
                }
                if let Some(stamp) = &access_cutoff {
                    conn.execute(
                        "DELETE FROM access_log WHERE logged_at < ?1",
                        params![stamp],
                    )?;
                }
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Fixed-width UTC timestamp (`2026-01-01T00:00:00.000Z`) so string
/// comparison in SQL matches chronological order.
fn sql_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
