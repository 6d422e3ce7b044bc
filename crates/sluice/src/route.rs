// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-category routing table, built once from configuration.
//!
//! Every category's spec is parsed eagerly at build time, so a malformed
//! route surfaces as a startup error instead of at first dispatch.

use sluice_config::SluiceConfig;
use sluice_core::{Category, RouteSet, SinkKind, SluiceError};

/// The parsed routes of all four categories.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    information: RouteSet,
    non_fatal_error: RouteSet,
    fatal_error: RouteSet,
    event_hit: RouteSet,
}

impl RouteTable {
    /// Parse every category's route spec, aggregating malformed entries
    /// across all categories into one error.
    pub fn build(config: &SluiceConfig) -> Result<RouteTable, SluiceError> {
        let mut table = RouteTable::default();
        let mut problems = Vec::new();

        for category in Category::all() {
            match RouteSet::parse(config.routes.spec_for(category)) {
                Ok(routes) => *table.slot_mut(category) = routes,
                Err(errors) => {
                    for error in errors {
                        problems.push(format!("routes.{category}: {error}"));
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(table)
        } else {
            Err(SluiceError::Config(problems.join("; ")))
        }
    }

    /// The routes a message of `category` fans out to.
    pub fn routes_for(&self, category: Category) -> &RouteSet {
        match category {
            Category::Information => &self.information,
            Category::NonFatalError => &self.non_fatal_error,
            Category::FatalError => &self.fatal_error,
            Category::EventHit => &self.event_hit,
        }
    }

    /// Distinct file paths across all categories, in first-seen order.
    pub fn file_targets(&self) -> Vec<&str> {
        let mut targets = Vec::new();
        for category in Category::all() {
            if let Some(path) = self.routes_for(category).file_target()
                && !targets.contains(&path)
            {
                targets.push(path);
            }
        }
        targets
    }

    /// Distinct store paths across all categories, in first-seen order.
    pub fn store_targets(&self) -> Vec<&str> {
        let mut targets = Vec::new();
        for category in Category::all() {
            if let Some(path) = self.routes_for(category).store_target()
                && !targets.contains(&path)
            {
                targets.push(path);
            }
        }
        targets
    }

    /// True when at least one category has an email entry.
    pub fn routes_email(&self) -> bool {
        Category::all()
            .into_iter()
            .any(|c| self.routes_for(c).entries().contains(&SinkKind::Email))
    }

    fn slot_mut(&mut self, category: Category) -> &mut RouteSet {
        match category {
            Category::Information => &mut self.information,
            Category::NonFatalError => &mut self.non_fatal_error,
            Category::FatalError => &mut self.fatal_error,
            Category::EventHit => &mut self.event_hit,
        }
    }
}
