// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route spec parsing: the textual `Kind~destination` lists that map a
//! category to its ordered destinations.
//!
//! A spec is a comma-separated list of entries, each a sink-kind keyword with
//! an optional `~destination` suffix, e.g.
//! `File~errors.log, Email~ops@example.com, Email~oncall@example.com`.
//!
//! Destination rules differ by kind and the asymmetry is deliberate:
//! `File`/`Database` keep ONE effective destination per category (the last
//! entry wins, applied to every entry of that kind), while `Email` entries
//! accumulate an ordered address list and a message's fan-out walks the
//! addresses in order.

use std::str::FromStr;

use strum::{Display, EnumString};
use thiserror::Error;

/// Destination written when a `File` entry carries no `~path` suffix.
pub const DEFAULT_FILE_TARGET: &str = "SystemLog.txt";

/// The kind of sink a route entry addresses.
///
/// The configuration keyword for [`SinkKind::Store`] is `Database`, matched
/// case-insensitively like the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SinkKind {
    Console,
    File,
    #[strum(serialize = "Database")]
    Store,
    Email,
}

impl SinkKind {
    /// The closed keyword set accepted in route specs.
    pub fn keywords() -> [&'static str; 4] {
        ["Console", "File", "Database", "Email"]
    }
}

/// A malformed route spec entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteSpecError {
    /// The keyword is not in the closed sink-kind set.
    #[error("unknown sink kind `{keyword}`")]
    UnknownKind { keyword: String },

    /// An `Email` entry must carry its own `~address` destination.
    #[error("email route entry `{entry}` is missing a `~address` destination")]
    MissingEmailAddress { entry: String },
}

/// The parsed routes of a single category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSet {
    /// Entry kinds in config order, duplicates preserved.
    entries: Vec<SinkKind>,
    /// Effective file destination (last `File` entry wins).
    file_target: Option<String>,
    /// Effective store destination (last `Database` entry wins). `None` when
    /// every `Database` entry was unsuffixed; writes then fail as usage
    /// errors at dispatch.
    store_target: Option<String>,
    /// Ordered email addresses, one per `Email` entry.
    email_targets: Vec<String>,
}

impl RouteSet {
    /// Parse a route spec. Collects all entry errors rather than failing at
    /// the first, so configuration diagnostics can report everything at once.
    pub fn parse(spec: &str) -> Result<RouteSet, Vec<RouteSpecError>> {
        let mut routes = RouteSet::default();
        let mut errors = Vec::new();

        for raw in spec.split(',').map(str::trim) {
            if raw.is_empty() {
                continue;
            }
            let (keyword, target) = match raw.split_once('~') {
                Some((keyword, target)) => (keyword.trim(), Some(target.trim())),
                None => (raw, None),
            };
            let target = target.filter(|t| !t.is_empty());

            match SinkKind::from_str(keyword) {
                Ok(SinkKind::Console) => routes.entries.push(SinkKind::Console),
                Ok(SinkKind::File) => {
                    routes.file_target =
                        Some(target.unwrap_or(DEFAULT_FILE_TARGET).to_string());
                    routes.entries.push(SinkKind::File);
                }
                Ok(SinkKind::Store) => {
                    if let Some(target) = target {
                        routes.store_target = Some(target.to_string());
                    }
                    routes.entries.push(SinkKind::Store);
                }
                Ok(SinkKind::Email) => match target {
                    Some(address) => {
                        routes.email_targets.push(address.to_string());
                        routes.entries.push(SinkKind::Email);
                    }
                    None => errors.push(RouteSpecError::MissingEmailAddress {
                        entry: raw.to_string(),
                    }),
                },
                Err(_) => errors.push(RouteSpecError::UnknownKind {
                    keyword: keyword.to_string(),
                }),
            }
        }

        if errors.is_empty() {
            Ok(routes)
        } else {
            Err(errors)
        }
    }

    /// True when the category routes to nothing and its events are
    /// discarded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SinkKind] {
        &self.entries
    }

    pub fn file_target(&self) -> Option<&str> {
        self.file_target.as_deref()
    }

    pub fn store_target(&self) -> Option<&str> {
        self.store_target.as_deref()
    }

    pub fn email_targets(&self) -> &[String] {
        &self.email_targets
    }

    /// The ordered `(kind, destination)` pairs for ONE message's fan-out.
    ///
    /// The email rotation index is local to this call: every message starts
    /// again at the first address, so entry k of the fan-out always goes to
    /// address k.
    pub fn resolve(&self) -> Vec<(SinkKind, Option<&str>)> {
        let mut resolved = Vec::with_capacity(self.entries.len());
        let mut email_idx = 0;
        for kind in &self.entries {
            let target = match kind {
                SinkKind::Console => None,
                SinkKind::File => self.file_target.as_deref(),
                SinkKind::Store => self.store_target.as_deref(),
                SinkKind::Email => {
                    let address = self.email_targets.get(email_idx).map(String::as_str);
                    email_idx += 1;
                    address
                }
            };
            resolved.push((*kind, target));
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_parse_case_insensitively() {
        assert_eq!(SinkKind::from_str("console").unwrap(), SinkKind::Console);
        assert_eq!(SinkKind::from_str("FILE").unwrap(), SinkKind::File);
        assert_eq!(SinkKind::from_str("database").unwrap(), SinkKind::Store);
        assert_eq!(SinkKind::from_str("Email").unwrap(), SinkKind::Email);
        assert!(SinkKind::from_str("syslog").is_err());
    }

    #[test]
    fn store_kind_renders_its_config_keyword() {
        assert_eq!(SinkKind::Store.to_string(), "Database");
    }

    #[test]
    fn unsuffixed_file_defaults_its_destination() {
        let routes = RouteSet::parse("File").unwrap();
        assert_eq!(routes.file_target(), Some("SystemLog.txt"));
        assert_eq!(routes.entries(), &[SinkKind::File]);
    }

    #[test]
    fn last_file_destination_wins_but_order_is_preserved() {
        let routes = RouteSet::parse("File~first.log, Console, File~second.log").unwrap();
        assert_eq!(routes.file_target(), Some("second.log"));
        assert_eq!(
            routes.entries(),
            &[SinkKind::File, SinkKind::Console, SinkKind::File]
        );
        // Both file entries resolve to the effective destination.
        let resolved = routes.resolve();
        assert_eq!(resolved[0], (SinkKind::File, Some("second.log")));
        assert_eq!(resolved[2], (SinkKind::File, Some("second.log")));
    }

    #[test]
    fn email_entries_accumulate_ordered_addresses() {
        let routes =
            RouteSet::parse("File, Email~a@example.com, Email~b@example.com").unwrap();
        assert_eq!(
            routes.email_targets(),
            &["a@example.com".to_string(), "b@example.com".to_string()]
        );

        let resolved = routes.resolve();
        assert_eq!(resolved[0], (SinkKind::File, Some("SystemLog.txt")));
        assert_eq!(resolved[1], (SinkKind::Email, Some("a@example.com")));
        assert_eq!(resolved[2], (SinkKind::Email, Some("b@example.com")));

        // The rotation index is message-local: resolving again starts over.
        let again = routes.resolve();
        assert_eq!(again[1], (SinkKind::Email, Some("a@example.com")));
        assert_eq!(again[2], (SinkKind::Email, Some("b@example.com")));
    }

    #[test]
    fn email_without_address_is_an_error() {
        let errors = RouteSet::parse("Email").unwrap_err();
        assert_eq!(
            errors,
            vec![RouteSpecError::MissingEmailAddress {
                entry: "Email".to_string()
            }]
        );
        // An empty suffix counts as missing too.
        assert!(RouteSet::parse("Email~").is_err());
    }

    #[test]
    fn unknown_keyword_is_an_error_naming_the_keyword() {
        let errors = RouteSet::parse("Console, Syslog~udp://x").unwrap_err();
        assert_eq!(
            errors,
            vec![RouteSpecError::UnknownKind {
                keyword: "Syslog".to_string()
            }]
        );
    }

    #[test]
    fn all_entry_errors_are_collected() {
        let errors = RouteSet::parse("Nope, Email, AlsoNope~x").unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn unsuffixed_database_leaves_the_store_destination_unset() {
        let routes = RouteSet::parse("Database").unwrap();
        assert_eq!(routes.store_target(), None);
        assert_eq!(routes.resolve(), vec![(SinkKind::Store, None)]);
    }

    #[test]
    fn empty_and_whitespace_entries_are_dropped() {
        let routes = RouteSet::parse(" , Console ,, ").unwrap();
        assert_eq!(routes.entries(), &[SinkKind::Console]);
        assert!(RouteSet::parse("").unwrap().is_empty());
        assert!(RouteSet::parse("   ").unwrap().is_empty());
    }
}
