// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The sink contract implemented by every log destination.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SluiceError;
use crate::message::{Category, LogMessage};

/// Per-category retention cutoffs: rows older than the cutoff are purged.
pub type RetentionCutoffs = HashMap<Category, DateTime<Utc>>;

/// A log destination.
///
/// Lifecycle contract, honored by every implementation:
///
/// - `open` is idempotent; opening an open sink is a no-op.
/// - `close` is idempotent, flushes buffered output, and is safe on a sink
///   that was never opened.
/// - `write` lazily opens an unopened sink, so a write after `close`
///   re-opens. No buffering survives a completed `write`.
/// - Sinks without a notion of destination or retention fail the
///   corresponding operations with [`SluiceError::Unsupported`].
/// - Destination-requiring sinks fail with [`SluiceError::MissingTarget`]
///   when used before a destination was assigned. That is a usage error and
///   is never retried.
#[async_trait]
pub trait LogSink: Send {
    /// The currently assigned destination, if the sink has one.
    fn target(&self) -> Option<&str>;

    /// Assign the destination. Validates eagerly and fails fast rather than
    /// deferring the fault to `write`.
    fn set_target(&mut self, target: &str) -> Result<(), SluiceError>;

    async fn open(&mut self) -> Result<(), SluiceError>;

    async fn close(&mut self) -> Result<(), SluiceError>;

    async fn write(&mut self, message: &LogMessage) -> Result<(), SluiceError>;

    /// Write a sequence of messages in order. The default is a sequential
    /// per-message write; sinks may override to batch.
    async fn write_batch(&mut self, messages: &[LogMessage]) -> Result<(), SluiceError> {
        for message in messages {
            self.write(message).await?;
        }
        Ok(())
    }

    /// Apply retention. File-backed sinks interpret `max_size_kb` and
    /// `max_generations` as rollover parameters; dated stores interpret
    /// `cutoffs`. Sinks with nothing to retain fail with `Unsupported`.
    async fn clean_up(
        &mut self,
        max_size_kb: u64,
        max_generations: u32,
        cutoffs: Option<&RetentionCutoffs>,
    ) -> Result<(), SluiceError>;
}
