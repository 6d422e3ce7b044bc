// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message fan-out across the configured sinks.
//!
//! The dispatcher owns every sink instance: one [`FileSink`] per distinct
//! file path, one [`StoreSink`] per distinct store path, one shared
//! [`EmailSink`], and the console. Sinks stay open across messages; the
//! engine closes them at shutdown.
//!
//! All destination I/O happens while the engine holds the dispatch lock, so
//! sink methods take `&mut self` without further synchronization here.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use sluice_config::{FileRetentionConfig, SluiceConfig, StoreRetentionConfig};
use sluice_core::{
    Category, ConsoleSink, LogMessage, LogSink, RetentionCutoffs, SinkKind, SluiceError,
};
use sluice_email::EmailSink;
use sluice_file::FileSink;
use sluice_store::StoreSink;
use tracing::{debug, error, warn};

use crate::route::RouteTable;

/// Owns the routing table and the sink instances it fans out to.
pub struct Dispatcher {
    table: RouteTable,
    console: ConsoleSink,
    files: HashMap<String, FileSink>,
    stores: HashMap<String, StoreSink>,
    /// Present only when some category routes email. The destination address
    /// is set per entry during fan-out.
    email: Option<EmailSink>,
    store_policy: StoreRetentionConfig,
    file_policy: FileRetentionConfig,
}

impl Dispatcher {
    /// Build the dispatcher and its sinks from the parsed table.
    ///
    /// File sinks are created here so destination validation (and leading
    /// directory creation) happens at startup, not at first write.
    pub fn new(table: RouteTable, config: &SluiceConfig) -> Result<Dispatcher, SluiceError> {
        let mut files = HashMap::new();
        for path in table.file_targets() {
            let mut sink = FileSink::new();
            sink.set_target(path)?;
            files.insert(path.to_string(), sink);
        }

        let mut stores = HashMap::new();
        for path in table.store_targets() {
            let mut sink = StoreSink::new();
            sink.set_target(path)?;
            stores.insert(path.to_string(), sink);
        }

        let email = table
            .routes_email()
            .then(|| EmailSink::new(config.email.clone()));

        Ok(Dispatcher {
            table,
            console: ConsoleSink::new(),
            files,
            stores,
            email,
            store_policy: config.store_retention.clone(),
            file_policy: config.file_retention.clone(),
        })
    }

    /// Fan one message out to its category's destinations, in config order.
    ///
    /// Each destination write is individually fault-isolated: a failure is
    /// logged and counted, and the walk continues, so one faulty destination
    /// never blocks the others. Returns the failure count.
    pub async fn dispatch(&mut self, message: &LogMessage) -> usize {
        let resolved: Vec<(SinkKind, Option<String>)> = self
            .table
            .routes_for(message.category)
            .resolve()
            .into_iter()
            .map(|(kind, target)| (kind, target.map(str::to_string)))
            .collect();

        let mut failed = 0;
        for (kind, target) in resolved {
            let target = target.as_deref();
            let result = match kind {
                SinkKind::Console => self.console.write(message).await,
                SinkKind::File => self.write_file(target, message).await,
                SinkKind::Store => self.write_store(target, message).await,
                SinkKind::Email => self.write_email(target, message).await,
            };
            if let Err(e) = result {
                failed += 1;
                error!(
                    sink = %kind,
                    destination = target.unwrap_or(""),
                    error = %e,
                    "destination write failed"
                );
            }
        }
        failed
    }

    /// Dispatch a drained batch in order, totaling failures.
    pub async fn dispatch_batch(&mut self, batch: &[LogMessage]) -> usize {
        let mut failed = 0;
        for message in batch {
            failed += self.dispatch(message).await;
        }
        failed
    }

    /// Apply the enabled retention policies to every owned sink.
    ///
    /// Runs under the dispatch lock, so retention never interleaves with a
    /// message fan-out. Failures are logged and isolated per sink.
    pub async fn sweep(&mut self) {
        if self.store_policy.auto_clean_up {
            let cutoffs = retention_cutoffs(self.store_policy.retain_days);
            for (path, sink) in &mut self.stores {
                if let Err(e) = sink.clean_up(0, 0, Some(&cutoffs)).await {
                    error!(path = path.as_str(), error = %e, "store retention sweep failed");
                }
            }
        }

        if self.file_policy.auto_clean_up {
            for (path, sink) in &mut self.files {
                let result = sink
                    .clean_up(
                        self.file_policy.roll_over_size_kb,
                        self.file_policy.roll_over_file_count,
                        None,
                    )
                    .await;
                if let Err(e) = result {
                    error!(path = path.as_str(), error = %e, "file retention sweep failed");
                }
            }
        }

        debug!("retention sweep completed");
    }

    /// True when either retention policy wants the background sweep loop.
    pub fn sweeps_enabled(&self) -> bool {
        self.store_policy.auto_clean_up || self.file_policy.auto_clean_up
    }

    /// Close every sink, flushing buffered output. Close failures are logged
    /// and do not stop the remaining sinks from closing.
    pub async fn close_all(&mut self) {
        for (path, sink) in &mut self.files {
            if let Err(e) = sink.close().await {
                warn!(path = path.as_str(), error = %e, "file sink close failed");
            }
        }
        for (path, sink) in &mut self.stores {
            if let Err(e) = sink.close().await {
                warn!(path = path.as_str(), error = %e, "store sink close failed");
            }
        }
        if let Some(email) = self.email.as_mut() {
            if let Err(e) = email.close().await {
                warn!(error = %e, "email sink close failed");
            }
        }
    }

    async fn write_file(
        &mut self,
        target: Option<&str>,
        message: &LogMessage,
    ) -> Result<(), SluiceError> {
        let Some(path) = target else {
            return Err(SluiceError::MissingTarget { sink: "file" });
        };
        let Some(sink) = self.files.get_mut(path) else {
            return Err(SluiceError::Internal(format!("no file sink for `{path}`")));
        };
        sink.write(message).await
    }

    async fn write_store(
        &mut self,
        target: Option<&str>,
        message: &LogMessage,
    ) -> Result<(), SluiceError> {
        // An unsuffixed `Database` entry leaves the destination unset; that
        // is a usage error surfaced per write.
        let Some(path) = target else {
            return Err(SluiceError::MissingTarget { sink: "store" });
        };
        let Some(sink) = self.stores.get_mut(path) else {
            return Err(SluiceError::Internal(format!("no store sink for `{path}`")));
        };
        sink.write(message).await
    }

    async fn write_email(
        &mut self,
        target: Option<&str>,
        message: &LogMessage,
    ) -> Result<(), SluiceError> {
        let Some(address) = target else {
            return Err(SluiceError::MissingTarget { sink: "email" });
        };
        let Some(email) = self.email.as_mut() else {
            return Err(SluiceError::Internal("no email sink configured".to_string()));
        };
        email.set_target(address)?;
        email.write(message).await
    }
}

/// One cutoff per category, all at `now - retain_days`.
fn retention_cutoffs(retain_days: u32) -> RetentionCutoffs {
    let cutoff = Utc::now() - Duration::days(i64::from(retain_days));
    Category::all()
        .into_iter()
        .map(|category| (category, cutoff))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_config::RoutesConfig;

    fn config(routes: RoutesConfig) -> SluiceConfig {
        SluiceConfig {
            routes,
            ..SluiceConfig::default()
        }
    }

    fn build(config: &SluiceConfig) -> Dispatcher {
        let table = RouteTable::build(config).unwrap();
        Dispatcher::new(table, config).unwrap()
    }

    #[tokio::test]
    async fn console_only_dispatch_has_no_failures() {
        let mut dispatcher = build(&SluiceConfig::default());
        let message = LogMessage::new(Category::Information, "test", "hello");
        assert_eq!(dispatcher.dispatch(&message).await, 0);
    }

    #[tokio::test]
    async fn file_routes_write_through_to_the_path() {
        let dir = tempfile::Builder::new()
            .prefix("sluicedispatch")
            .tempdir()
            .unwrap();
        let path = dir.path().join("app.log");
        let cfg = config(RoutesConfig {
            information: format!("File~{}", path.display()),
            non_fatal_error: "Console".to_string(),
            fatal_error: "Console".to_string(),
            event_hit: "Console".to_string(),
        });
        let mut dispatcher = build(&cfg);

        let message = LogMessage::new(Category::Information, "svc", "started");
        assert_eq!(dispatcher.dispatch(&message).await, 0);
        dispatcher.close_all().await;

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Information [svc] started"));
    }

    #[tokio::test]
    async fn unsuffixed_database_counts_one_failure_but_others_still_write() {
        let dir = tempfile::Builder::new()
            .prefix("sluicedispatch")
            .tempdir()
            .unwrap();
        let path = dir.path().join("app.log");
        let cfg = config(RoutesConfig {
            information: format!("Database, File~{}", path.display()),
            non_fatal_error: "Console".to_string(),
            fatal_error: "Console".to_string(),
            event_hit: "Console".to_string(),
        });
        let mut dispatcher = build(&cfg);

        let message = LogMessage::new(Category::Information, "svc", "kept going");
        assert_eq!(dispatcher.dispatch(&message).await, 1);
        dispatcher.close_all().await;

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("kept going"));
    }

    #[tokio::test]
    async fn store_routes_persist_rows() {
        let dir = tempfile::Builder::new()
            .prefix("sluicedispatch")
            .tempdir()
            .unwrap();
        let db = dir.path().join("logs.db");
        let cfg = config(RoutesConfig {
            information: format!("Database~{}", db.display()),
            non_fatal_error: "Console".to_string(),
            fatal_error: "Console".to_string(),
            event_hit: "Console".to_string(),
        });
        let mut dispatcher = build(&cfg);

        let message = LogMessage::new(Category::Information, "svc", "persisted");
        assert_eq!(dispatcher.dispatch(&message).await, 0);
        dispatcher.close_all().await;

        let conn = rusqlite::Connection::open(&db).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn sweep_rolls_an_oversized_file() {
        let dir = tempfile::Builder::new()
            .prefix("sluicedispatch")
            .tempdir()
            .unwrap();
        let path = dir.path().join("app.log");
        let mut cfg = config(RoutesConfig {
            information: format!("File~{}", path.display()),
            non_fatal_error: "Console".to_string(),
            fatal_error: "Console".to_string(),
            event_hit: "Console".to_string(),
        });
        // Zero threshold rolls any non-empty file.
        cfg.file_retention.auto_clean_up = true;
        cfg.file_retention.roll_over_size_kb = 0;
        cfg.file_retention.roll_over_file_count = 5;
        let mut dispatcher = build(&cfg);
        assert!(dispatcher.sweeps_enabled());

        let message = LogMessage::new(Category::Information, "svc", "fills the file");
        assert_eq!(dispatcher.dispatch(&message).await, 0);
        dispatcher.sweep().await;
        dispatcher.close_all().await;

        let rolled = {
            let mut name = path.clone().into_os_string();
            name.push("_1");
            std::path::PathBuf::from(name)
        };
        assert!(rolled.exists());
    }
}
