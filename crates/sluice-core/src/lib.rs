// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the sluice log service.
//!
//! This crate provides the log event model, the sink contract implemented by
//! every destination, route spec parsing, the console sink, and the error
//! type shared across the workspace.

pub mod console;
pub mod error;
pub mod message;
pub mod route;
pub mod sink;

// Re-export key items at crate root for ergonomic imports.
pub use console::ConsoleSink;
pub use error::SluiceError;
pub use message::{
    format_error_chain, AccessFields, AccessMessage, AccessRequest, Category, LogMessage,
};
pub use route::{RouteSet, RouteSpecError, SinkKind, DEFAULT_FILE_TARGET};
pub use sink::{LogSink, RetentionCutoffs};
