// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: route specs must parse against the closed sink-kind set,
//! email addresses must look like mailboxes, and retention windows must be
//! usable when auto cleanup is switched on.

use sluice_core::{RouteSet, RouteSpecError, SinkKind};

use crate::diagnostic::{suggest_key, ConfigError};
use crate::model::SluiceConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SluiceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    for (key, spec) in [
        ("information", config.routes.information.as_str()),
        ("non_fatal_error", config.routes.non_fatal_error.as_str()),
        ("fatal_error", config.routes.fatal_error.as_str()),
        ("event_hit", config.routes.event_hit.as_str()),
    ] {
        match RouteSet::parse(spec) {
            Ok(routes) => {
                for address in routes.email_targets() {
                    if !is_plausible_mailbox(address) {
                        errors.push(ConfigError::Validation {
                            message: format!(
                                "routes.{key}: `{address}` is not a valid email address"
                            ),
                        });
                    }
                }
            }
            Err(spec_errors) => {
                let valid = SinkKind::keywords();
                for spec_error in spec_errors {
                    errors.push(match spec_error {
                        RouteSpecError::UnknownKind { keyword } => {
                            let suggestion = suggest_key(&keyword, &valid);
                            ConfigError::UnknownSinkKind {
                                category: key.to_string(),
                                keyword,
                                suggestion,
                                valid_kinds: valid.join(", "),
                            }
                        }
                        RouteSpecError::MissingEmailAddress { entry } => {
                            ConfigError::MissingEmailAddress {
                                category: key.to_string(),
                                entry,
                            }
                        }
                    });
                }
            }
        }
    }

    if config.email.smtp_host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "email.smtp_host must not be empty".to_string(),
        });
    }

    if config.email.smtp_port == 0 {
        errors.push(ConfigError::Validation {
            message: "email.smtp_port must be non-zero".to_string(),
        });
    }

    if !is_plausible_mailbox(&config.email.from_address) {
        errors.push(ConfigError::Validation {
            message: format!(
                "email.from_address `{}` is not a valid email address",
                config.email.from_address
            ),
        });
    }

    if config.store_retention.auto_clean_up && config.store_retention.retain_days < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "store_retention.retain_days must be at least 1 when auto_clean_up is enabled, got {}",
                config.store_retention.retain_days
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Cheap mailbox shape check: one `@` with non-empty, whitespace-free sides.
///
/// Full RFC parsing happens when the email sink binds the address; this is a
/// startup pre-flight so typos surface before any message is queued.
fn is_plausible_mailbox(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !address.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
