// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the sluice logging service.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, environment variable
//! overrides, and Elm-style diagnostic error rendering with typo
//! suggestions. Route specs are parsed here once at load time so a bad sink
//! keyword or a recipient-less email entry fails startup instead of
//! surfacing mid-delivery.
//!
//! # Usage
//!
//! ```no_run
//! use sluice_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("fatal_error routes: {}", config.routes.fatal_error);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    EmailConfig, FileRetentionConfig, RoutesConfig, SluiceConfig, StoreRetentionConfig,
};
pub use validation::validate_config;

/// Load configuration from the XDG hierarchy and validate it.
///
/// The high-level entry point: loads TOML files plus env overrides via
/// Figment, then runs post-deserialization validation (route specs, SMTP
/// sanity, retention windows). Figment errors come back as rich miette
/// diagnostics with typo suggestions.
///
/// Returns either a valid `SluiceConfig` or a list of diagnostic errors.
pub fn load_and_validate() -> Result<SluiceConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and for embedders that manage their own config source.
pub fn load_and_validate_str(toml_content: &str) -> Result<SluiceConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}
