// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the sluice log service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and the structured
//! store sink that persists plain log rows and typed access rows.

pub mod database;
pub mod migrations;
pub mod sink;

pub use database::Database;
pub use sink::StoreSink;
