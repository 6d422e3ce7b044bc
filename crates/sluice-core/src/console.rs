// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Console sink: writes the canonical line to stdout.
//!
//! Also serves as the degradation destination for the email sink, which is
//! why it lives in the core crate rather than beside the other sinks.

use async_trait::async_trait;

use crate::error::SluiceError;
use crate::message::LogMessage;
use crate::sink::{LogSink, RetentionCutoffs};

/// Sink that prints each message's canonical line to stdout.
///
/// Has no destination and no retention; `set_target` and `clean_up` are
/// unsupported operations.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        ConsoleSink
    }
}

#[async_trait]
impl LogSink for ConsoleSink {
    fn target(&self) -> Option<&str> {
        None
    }

    fn set_target(&mut self, _target: &str) -> Result<(), SluiceError> {
        Err(SluiceError::Unsupported {
            sink: "console",
            op: "set_target",
        })
    }

    async fn open(&mut self) -> Result<(), SluiceError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SluiceError> {
        Ok(())
    }

    async fn write(&mut self, message: &LogMessage) -> Result<(), SluiceError> {
        println!("{}", message.format_line());
        Ok(())
    }

    async fn clean_up(
        &mut self,
        _max_size_kb: u64,
        _max_generations: u32,
        _cutoffs: Option<&RetentionCutoffs>,
    ) -> Result<(), SluiceError> {
        Err(SluiceError::Unsupported {
            sink: "console",
            op: "clean_up",
        })
    }
}
