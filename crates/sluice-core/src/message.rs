// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log event model: categories, messages, and web access messages.
//!
//! A [`LogMessage`] captures its timestamp at construction, so queued events
//! keep the time they were reported rather than the time they were delivered.
//! The canonical output line rendered by [`LogMessage::format_line`] is shared
//! by the console, file, and email sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Severity / routing category of a log event.
///
/// The numeric codes are stable and are what the structured store persists.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Information = 1,
    NonFatalError = 2,
    FatalError = 3,
    /// A web/access traffic event. Informational, but routed and retained
    /// separately from `Information`.
    EventHit = 4,
}

impl Category {
    /// Stable numeric code used by the structured store.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// All categories, in code order. Retention cutoffs are computed over
    /// this set.
    pub fn all() -> [Category; 4] {
        [
            Category::Information,
            Category::NonFatalError,
            Category::FatalError,
            Category::EventHit,
        ]
    }
}

/// A single log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessage {
    pub category: Category,
    pub source: String,
    pub text: String,
    /// Captured when the message is constructed, not when it is delivered.
    pub timestamp: DateTime<Utc>,
    /// Structured web request fields, present only for access messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessFields>,
}

impl LogMessage {
    /// Create a message stamped with the current time.
    pub fn new(category: Category, source: impl Into<String>, text: impl Into<String>) -> Self {
        LogMessage {
            category,
            source: source.into(),
            text: text.into(),
            timestamp: Utc::now(),
            access: None,
        }
    }

    /// Render the canonical output line:
    /// `<yyyy/MM/dd HH:mm:ss> - <Category> [<source>] <text>`.
    pub fn format_line(&self) -> String {
        format!(
            "{} - {} [{}] {}",
            self.timestamp.format("%Y/%m/%d %H:%M:%S"),
            self.category,
            self.source,
            self.text
        )
    }
}

/// Structured fields extracted from an inbound web request.
///
/// Carried alongside the composed text so the structured store can persist
/// typed columns instead of re-parsing the line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessFields {
    pub host_address: String,
    pub url: String,
    pub referrer: String,
    /// Semicolon-joined accepted languages, in request order.
    pub languages: String,
    pub browser: String,
    pub browser_major: i32,
    pub browser_minor: String,
}

impl AccessFields {
    /// Compose the canonical access text.
    pub fn compose_text(&self) -> String {
        format!(
            "IP={}, Url={}, Referrer={}, Languages={}, Browser={}, Version={}.{}",
            self.host_address,
            self.url,
            self.referrer,
            self.languages,
            self.browser,
            self.browser_major,
            self.browser_minor
        )
    }
}

/// Input shape describing an inbound web request. Field extraction is
/// deliberately forgiving: malformed values collapse to defaults and are
/// never surfaced as errors.
#[derive(Debug, Clone, Default)]
pub struct AccessRequest {
    pub host_address: String,
    pub url: String,
    pub referrer: Option<String>,
    pub languages: Vec<String>,
    pub agent: Option<String>,
    pub agent_version: Option<String>,
}

/// A web access event: a [`LogMessage`] specialization fixed to
/// [`Category::EventHit`] with source `"HttpRequest"`.
#[derive(Debug, Clone)]
pub struct AccessMessage {
    fields: AccessFields,
    timestamp: DateTime<Utc>,
}

impl AccessMessage {
    /// Extract an access message from a request description, stamping it
    /// with the current time.
    pub fn from_request(request: AccessRequest) -> Self {
        let (browser_major, browser_minor) = split_agent_version(request.agent_version.as_deref());
        AccessMessage {
            fields: AccessFields {
                host_address: request.host_address,
                url: request.url,
                referrer: request.referrer.unwrap_or_default(),
                languages: request.languages.join(";"),
                browser: request
                    .agent
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
                browser_major,
                browser_minor,
            },
            timestamp: Utc::now(),
        }
    }

    pub fn host_address(&self) -> &str {
        &self.fields.host_address
    }

    pub fn url(&self) -> &str {
        &self.fields.url
    }

    pub fn referrer(&self) -> &str {
        &self.fields.referrer
    }

    /// Semicolon-joined accepted languages.
    pub fn languages(&self) -> &str {
        &self.fields.languages
    }

    pub fn browser(&self) -> &str {
        &self.fields.browser
    }

    pub fn browser_major(&self) -> i32 {
        self.fields.browser_major
    }

    pub fn browser_minor(&self) -> &str {
        &self.fields.browser_minor
    }

    /// Convert into the queueable [`LogMessage`], composing the canonical
    /// access text and keeping the structured fields attached.
    pub fn into_message(self) -> LogMessage {
        LogMessage {
            category: Category::EventHit,
            source: "HttpRequest".to_string(),
            text: self.fields.compose_text(),
            timestamp: self.timestamp,
            access: Some(self.fields),
        }
    }
}

/// Split an agent version string into (major, minor).
///
/// The left part of the first `.` parses as the integer major; the remainder
/// parses as a decimal and is rendered back as the minor string. Anything
/// unparseable collapses to `0` / `"0"`.
fn split_agent_version(version: Option<&str>) -> (i32, String) {
    let Some(version) = version else {
        return (0, "0".to_string());
    };
    match version.split_once('.') {
        Some((major, minor)) => {
            let major = major.trim().parse::<i32>().unwrap_or(0);
            let minor = minor
                .trim()
                .parse::<f64>()
                .map(|m| m.to_string())
                .unwrap_or_else(|_| "0".to_string());
            (major, minor)
        }
        None => (version.trim().parse::<i32>().unwrap_or(0), "0".to_string()),
    }
}

/// Render an error and its `source()` chain as a multi-line fatal-error text.
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut cause = error.source();
    while let Some(err) = cause {
        text.push_str("\nCaused by: ");
        text.push_str(&err.to_string());
        cause = err.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_message() -> LogMessage {
        LogMessage {
            category: Category::Information,
            source: "svc".to_string(),
            text: "started".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            access: None,
        }
    }

    #[test]
    fn category_codes_are_stable() {
        assert_eq!(Category::Information.code(), 1);
        assert_eq!(Category::NonFatalError.code(), 2);
        assert_eq!(Category::FatalError.code(), 3);
        assert_eq!(Category::EventHit.code(), 4);
    }

    #[test]
    fn category_parses_case_insensitively() {
        use std::str::FromStr;
        assert_eq!(
            Category::from_str("fatalerror").unwrap(),
            Category::FatalError
        );
        assert_eq!(
            Category::from_str("EventHit").unwrap(),
            Category::EventHit
        );
        assert!(Category::from_str("verbose").is_err());
    }

    #[test]
    fn category_display_round_trips() {
        use std::str::FromStr;
        for category in Category::all() {
            let rendered = category.to_string();
            assert_eq!(Category::from_str(&rendered).unwrap(), category);
        }
    }

    #[test]
    fn line_format_is_exact() {
        assert_eq!(
            fixed_message().format_line(),
            "2024/01/01 00:00:00 - Information [svc] started"
        );
    }

    #[test]
    fn timestamp_captured_at_construction() {
        let before = Utc::now();
        let msg = LogMessage::new(Category::Information, "svc", "event");
        let after = Utc::now();
        assert!(msg.timestamp >= before && msg.timestamp <= after);
    }

    #[test]
    fn message_serde_round_trips_with_access_fields() {
        let msg = AccessMessage::from_request(AccessRequest {
            host_address: "10.0.0.1".to_string(),
            url: "/index".to_string(),
            referrer: Some("/prev".to_string()),
            languages: vec!["en".to_string(), "fr".to_string()],
            agent: Some("TestBrowser".to_string()),
            agent_version: Some("5.5".to_string()),
        })
        .into_message();

        let json = serde_json::to_string(&msg).unwrap();
        let parsed: LogMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.category, Category::EventHit);
        assert_eq!(parsed.text, msg.text);
        assert_eq!(parsed.access.unwrap().languages, "en;fr");
    }

    #[test]
    fn plain_message_serde_omits_access() {
        let json = serde_json::to_string(&fixed_message()).unwrap();
        assert!(!json.contains("access"));
    }

    #[test]
    fn access_text_is_composed_exactly() {
        let msg = AccessMessage::from_request(AccessRequest {
            host_address: "192.168.0.9".to_string(),
            url: "/shop/basket".to_string(),
            referrer: Some("/shop".to_string()),
            languages: vec!["en-GB".to_string(), "en".to_string()],
            agent: Some("TestBrowser".to_string()),
            agent_version: Some("5.5".to_string()),
        });

        assert_eq!(
            msg.clone().into_message().text,
            "IP=192.168.0.9, Url=/shop/basket, Referrer=/shop, \
             Languages=en-GB;en, Browser=TestBrowser, Version=5.5"
        );
        assert_eq!(msg.browser_major(), 5);
        assert_eq!(msg.browser_minor(), "5");
    }

    #[test]
    fn access_defaults_apply_when_fields_are_absent() {
        let msg = AccessMessage::from_request(AccessRequest {
            host_address: "10.1.1.1".to_string(),
            url: "/".to_string(),
            ..AccessRequest::default()
        });

        assert_eq!(msg.browser(), "Unknown");
        assert_eq!(msg.browser_major(), 0);
        assert_eq!(msg.browser_minor(), "0");
        assert_eq!(msg.languages(), "");
        assert_eq!(msg.referrer(), "");
        assert!(msg.into_message().text.ends_with("Browser=Unknown, Version=0.0"));
    }

    #[test]
    fn malformed_versions_are_swallowed() {
        assert_eq!(split_agent_version(Some("abc")), (0, "0".to_string()));
        assert_eq!(split_agent_version(Some("7.junk")), (7, "0".to_string()));
        assert_eq!(split_agent_version(Some("5.1.2")), (5, "1.2".to_string()));
        assert_eq!(split_agent_version(Some("5.")), (5, "0".to_string()));
        assert_eq!(split_agent_version(Some("")), (0, "0".to_string()));
        assert_eq!(split_agent_version(None), (0, "0".to_string()));
    }

    #[test]
    fn access_message_is_event_hit_from_http_request() {
        let msg = AccessMessage::from_request(AccessRequest::default()).into_message();
        assert_eq!(msg.category, Category::EventHit);
        assert_eq!(msg.source, "HttpRequest");
    }

    #[test]
    fn error_chain_renders_each_cause() {
        let inner = std::io::Error::other("disk unplugged");
        let outer = std::io::Error::other(inner);
        let text = format_error_chain(&outer);
        assert!(text.starts_with("disk unplugged"));
        assert!(text.contains("\nCaused by: disk unplugged"));
    }
}
