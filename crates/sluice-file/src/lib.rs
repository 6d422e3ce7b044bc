// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File destination for the sluice log service.
//!
//! One formatted line per message, appended and flushed under a process-wide
//! lock, with size-based rollover into numbered generation files
//! (`SystemLog.txt_1` is the newest, higher suffixes are older).

pub mod rollover;
pub mod sink;

pub use sink::{FileSink, APP_DIR_TOKEN};
