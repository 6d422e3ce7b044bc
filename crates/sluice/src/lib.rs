// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sluice: an in-process log service with cross-process coordination.
//!
//! Messages are queued in memory and delivered by a paced background loop
//! to the sinks each category routes to (console, file, structured store,
//! email). A retention loop applies the configured cleanup policies. On a
//! shared machine, [`acquire`] coordinates processes using the same
//! identity: the first binds a derived loopback port and hosts the engine,
//! the rest proxy to it over a line-JSON wire.
//!
//! # Usage
//!
//! ```no_run
//! use sluice::{acquire, Category, SluiceConfig};
//!
//! # async fn run() -> Result<(), sluice::SluiceError> {
//! let log = acquire("MyService", SluiceConfig::default()).await?;
//! log.log(Category::Information, "startup", "service ready").await?;
//! log.flush().await?;
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod dispatch;
pub mod engine;
pub mod route;
pub mod rpc;

pub use coordinator::{acquire, derive_port, SluiceHandle};
pub use dispatch::Dispatcher;
pub use engine::Engine;
pub use route::RouteTable;

// Re-export what callers need to drive the service without naming the
// member crates.
pub use sluice_config::{load_and_validate, load_and_validate_str, SluiceConfig};
pub use sluice_core::{AccessRequest, Category, LogMessage, SluiceError};
