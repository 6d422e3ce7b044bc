// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the sluice log service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use sluice_core::Category;

/// Top-level sluice configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SluiceConfig {
    /// Per-category route specs.
    #[serde(default)]
    pub routes: RoutesConfig,

    /// Structured store retention settings.
    #[serde(default)]
    pub store_retention: StoreRetentionConfig,

    /// File rollover retention settings.
    #[serde(default)]
    pub file_retention: FileRetentionConfig,

    /// SMTP relay settings for the email sink.
    #[serde(default)]
    pub email: EmailConfig,
}

/// One route spec string per category.
///
/// A spec is a comma-separated list of sink-kind entries with optional
/// `~destination` suffixes; see `sluice_core::route`. An empty string routes
/// the category nowhere and its events are discarded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutesConfig {
    #[serde(default = "default_route_spec")]
    pub information: String,

    #[serde(default = "default_route_spec")]
    pub non_fatal_error: String,

    #[serde(default = "default_route_spec")]
    pub fatal_error: String,

    #[serde(default = "default_route_spec")]
    pub event_hit: String,
}

impl RoutesConfig {
    /// The raw spec string configured for a category.
    pub fn spec_for(&self, category: Category) -> &str {
        match category {
            Category::Information => &self.information,
            Category::NonFatalError => &self.non_fatal_error,
            Category::FatalError => &self.fatal_error,
            Category::EventHit => &self.event_hit,
        }
    }
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            information: default_route_spec(),
            non_fatal_error: default_route_spec(),
            fatal_error: default_route_spec(),
            event_hit: default_route_spec(),
        }
    }
}

fn default_route_spec() -> String {
    "Console".to_string()
}

/// Dated retention for the structured store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreRetentionConfig {
    /// When true, the background retention loop prunes store rows.
    #[serde(default)]
    pub auto_clean_up: bool,

    /// Rows older than this many days are pruned.
    #[serde(default = "default_retain_days")]
    pub retain_days: u32,
}

impl Default for StoreRetentionConfig {
    fn default() -> Self {
        Self {
            auto_clean_up: false,
            retain_days: default_retain_days(),
        }
    }
}

fn default_retain_days() -> u32 {
    30
}

/// Size-based rollover retention for file sinks.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileRetentionConfig {
    /// When true, the background retention loop rolls oversized log files.
    #[serde(default)]
    pub auto_clean_up: bool,

    /// A live file strictly larger than this rolls to a `_1` generation.
    /// Zero rolls any non-empty file.
    #[serde(default = "default_roll_over_size_kb")]
    pub roll_over_size_kb: u64,

    /// Upper bound on retained generation files.
    #[serde(default = "default_roll_over_file_count")]
    pub roll_over_file_count: u32,
}

impl Default for FileRetentionConfig {
    fn default() -> Self {
        Self {
            auto_clean_up: false,
            roll_over_size_kb: default_roll_over_size_kb(),
            roll_over_file_count: default_roll_over_file_count(),
        }
    }
}

fn default_roll_over_size_kb() -> u64 {
    512
}

fn default_roll_over_file_count() -> u32 {
    10
}

/// SMTP relay settings used by the email sink.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Sender mailbox on outgoing alert mail.
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            from_address: default_from_address(),
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_from_address() -> String {
    "sluice@localhost".to_string()
}
