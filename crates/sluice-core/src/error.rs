// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the sluice log service.

use thiserror::Error;

/// The primary error type used across the sink contract and the orchestration
/// engine.
#[derive(Debug, Error)]
pub enum SluiceError {
    /// Configuration faults detected at construction time (route spec parse
    /// errors, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A destination value was rejected by a sink's setter.
    #[error("invalid {sink} destination: {reason}")]
    InvalidTarget { sink: &'static str, reason: String },

    /// An operation required a destination that was never set. This is a
    /// usage error and is never retried.
    #[error("cannot use {sink} sink without a destination")]
    MissingTarget { sink: &'static str },

    /// The sink kind does not support the requested operation.
    #[error("{sink} sink does not support {op}")]
    Unsupported { sink: &'static str, op: &'static str },

    /// File I/O failure, reported after the open retry budget is exhausted.
    #[error("unable to open or write output file: {source}")]
    Io {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Structured store failure (connection, query, migration).
    #[error("store error: {source}")]
    Store {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// SMTP transport failure. Degraded to a console record inside the email
    /// sink; callers outside the sink should not observe this variant.
    #[error("email transport error: {source}")]
    Email {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Coordinator wire failure (connect, encode/decode, or a host-side
    /// error response).
    #[error("remote log host error: {message}")]
    Remote { message: String },

    /// One or more destination writes failed during a synchronous flush.
    /// Each failure was already logged and the remaining destinations were
    /// still attempted.
    #[error("{failed} destination write(s) failed during flush")]
    Delivery { failed: usize },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SluiceError {
    /// Wrap an I/O failure cause.
    pub fn io(source: std::io::Error) -> Self {
        SluiceError::Io {
            source: Box::new(source),
        }
    }

    /// Wrap a store layer failure cause.
    pub fn store<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SluiceError::Store {
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_render_their_context() {
        let missing = SluiceError::MissingTarget { sink: "file" };
        assert_eq!(
            missing.to_string(),
            "cannot use file sink without a destination"
        );

        let unsupported = SluiceError::Unsupported {
            sink: "console",
            op: "clean_up",
        };
        assert_eq!(
            unsupported.to_string(),
            "console sink does not support clean_up"
        );

        let delivery = SluiceError::Delivery { failed: 3 };
        assert_eq!(
            delivery.to_string(),
            "3 destination write(s) failed during flush"
        );
    }

    #[test]
    fn io_wraps_the_cause() {
        let err = SluiceError::io(std::io::Error::other("disk on fire"));
        assert!(err.to_string().contains("disk on fire"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
