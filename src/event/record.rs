//! One line of the agent event log
//!
//! The log is written by `kd emit` (and by older emitter scripts), one JSON
//! object per line. Every field is optional on read: the reader must degrade
//! to defaults, never fail, on content it does not understand.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Agent id of the orchestrating persona
pub const MAIN_AGENT_ID: &str = "main-agent";

/// Sentinel id for records with neither `agent_id` nor `agent_name`
pub const UNKNOWN_AGENT: &str = "unknown agent";

/// Role label used when a record carries none
pub const DEFAULT_ROLE: &str = "Professional Agent";

/// A single agent event
///
/// # Wire fields
/// - `ts`: ISO-8601 timestamp (epoch 0 when missing or unparseable)
/// - `agent_id` / `agent_name`: identity of the originating agent
/// - `role`: free-text display role
/// - `action`: short state token ("typing", "waiting", "running", ...)
/// - `task`: workflow token such as `/kd-dev-story`
/// - `message`: human-readable status
/// - `source`: which IDE or tool emitted the line
/// - `target_agent_id`: agent (or `,;|`-separated role tokens) receiving delegated work
///
/// Unknown keys are ignored. Non-string scalars are stringified and
/// `null`/arrays/objects read as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub target_agent_id: Option<String>,

    /// Inferred by the delegation synthesizer, never present in the log
    #[serde(skip_deserializing, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

/// Accept any JSON scalar as a string; treat null and containers as absent
fn lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Treat empty strings like missing fields
fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

impl EventRecord {
    /// Parse one log line, returning `None` for anything that is not a JSON object
    pub fn parse_line(line: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(line).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Stable identity: `agent_id`, then `agent_name`, then the unknown sentinel
    pub fn agent_id(&self) -> &str {
        self.key().unwrap_or(UNKNOWN_AGENT)
    }

    /// Identity key if the record carries one
    pub fn key(&self) -> Option<&str> {
        non_empty(self.agent_id.as_ref()).or_else(|| non_empty(self.agent_name.as_ref()))
    }

    /// Display name, defaulting to the identity
    pub fn agent_name(&self) -> &str {
        non_empty(self.agent_name.as_ref()).unwrap_or_else(|| self.agent_id())
    }

    pub fn role(&self) -> &str {
        non_empty(self.role.as_ref()).unwrap_or(DEFAULT_ROLE)
    }

    pub fn action(&self) -> Option<&str> {
        non_empty(self.action.as_ref())
    }

    pub fn task(&self) -> Option<&str> {
        non_empty(self.task.as_ref())
    }

    pub fn message(&self) -> Option<&str> {
        non_empty(self.message.as_ref())
    }

    pub fn source(&self) -> Option<&str> {
        non_empty(self.source.as_ref())
    }

    pub fn target(&self) -> Option<&str> {
        non_empty(self.target_agent_id.as_ref()).filter(|t| !t.trim().is_empty())
    }

    /// Event time in epoch milliseconds; 0 when missing or unparseable
    pub fn timestamp_millis(&self) -> i64 {
        self.ts.as_deref().map_or(0, parse_timestamp_millis)
    }

    /// Is this an event of the orchestrating agent?
    ///
    /// True for the reserved `main-agent` id or any role mentioning
    /// "master" or "main".
    pub fn is_main(&self) -> bool {
        let id = self.agent_id.as_deref().unwrap_or_default().to_lowercase();
        let role = self.role.as_deref().unwrap_or_default().to_lowercase();
        id == MAIN_AGENT_ID || role.contains("master") || role.contains("main")
    }

    /// Content signature of this event for at-most-once announcements
    pub fn signature(&self) -> String {
        signature_of([
            self.ts.as_deref(),
            self.action.as_deref(),
            self.task.as_deref(),
            self.message.as_deref(),
            self.source.as_deref(),
            self.target_agent_id.as_deref(),
        ])
    }

    /// Build an event stamped with the current time (used by `kd emit`)
    pub fn now(agent_id: &str, agent_name: &str, role: &str, action: &str, source: &str) -> Self {
        Self {
            ts: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            agent_id: Some(agent_id.to_string()),
            agent_name: Some(agent_name.to_string()),
            role: Some(role.to_string()),
            action: Some(action.to_string()),
            source: Some(source.to_string()),
            ..Self::default()
        }
    }
}

/// `ts|action|task|message|source|target_agent_id`, absent parts empty
pub fn signature_of(parts: [Option<&str>; 6]) -> String {
    parts
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect::<Vec<_>>()
        .join("|")
}

/// Parse an ISO-8601 timestamp into epoch milliseconds
///
/// Accepts RFC 3339 (`2024-01-01T00:00:00Z`, offsets, fractions), a naive
/// date-time read as UTC, or a bare date. Anything else is epoch 0.
pub fn parse_timestamp_millis(raw: &str) -> i64 {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.timestamp_millis();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return naive.and_utc().timestamp_millis();
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map_or(0, |naive| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_full_record() {
        let line = r#"{"ts":"2024-01-01T00:00:00Z","agent_id":"main-agent","agent_name":"Amad","role":"Master Agent","action":"typing","task":"kd-arch","source":"cli"}"#;
        let event = EventRecord::parse_line(line).unwrap();
        assert_eq!(event.agent_id(), "main-agent");
        assert_eq!(event.agent_name(), "Amad");
        assert_eq!(event.task(), Some("kd-arch"));
        assert!(event.is_main());
        assert!(!event.synthetic);
    }

    #[test]
    fn test_parse_line_rejects_non_objects() {
        for line in ["not json", "[1,2,3]", "42", "\"text\"", "null", "{\"ts\":"] {
            assert!(EventRecord::parse_line(line).is_none(), "line: {line}");
        }
    }

    #[test]
    fn test_parse_line_tolerates_odd_values() {
        let line = r#"{"agent_id":7,"role":null,"action":["x"],"extra":{"deep":true},"synthetic":true}"#;
        let event = EventRecord::parse_line(line).unwrap();
        assert_eq!(event.agent_id(), "7");
        assert_eq!(event.role(), DEFAULT_ROLE);
        assert_eq!(event.action(), None);
        // Never trust the flag from disk
        assert!(!event.synthetic);
    }

    #[test]
    fn test_identity_fallbacks() {
        let named = EventRecord {
            agent_name: Some("Sari".to_string()),
            ..EventRecord::default()
        };
        assert_eq!(named.agent_id(), "Sari");
        assert_eq!(named.agent_name(), "Sari");

        let anonymous = EventRecord::default();
        assert_eq!(anonymous.agent_id(), UNKNOWN_AGENT);
        assert_eq!(anonymous.key(), None);
        assert_eq!(anonymous.agent_name(), UNKNOWN_AGENT);
    }

    #[test]
    fn test_timestamp_parsing() {
        assert_eq!(parse_timestamp_millis("1970-01-01T00:00:01Z"), 1000);
        assert_eq!(parse_timestamp_millis("1970-01-01T01:00:00+01:00"), 0);
        assert_eq!(parse_timestamp_millis("1970-01-01T00:00:00.250"), 250);
        assert_eq!(parse_timestamp_millis("1970-01-02"), 86_400_000);
        assert_eq!(parse_timestamp_millis("yesterday"), 0);
        assert_eq!(EventRecord::default().timestamp_millis(), 0);
    }

    #[test]
    fn test_is_main_by_role() {
        let event = EventRecord {
            agent_id: Some("amad".to_string()),
            role: Some("Main Orchestrator".to_string()),
            ..EventRecord::default()
        };
        assert!(event.is_main());

        let event = EventRecord {
            agent_id: Some("qa-agent".to_string()),
            role: Some("QA".to_string()),
            ..EventRecord::default()
        };
        assert!(!event.is_main());
    }

    #[test]
    fn test_signature_layout() {
        let event = EventRecord {
            ts: Some("t".to_string()),
            action: Some("typing".to_string()),
            source: Some("cli".to_string()),
            ..EventRecord::default()
        };
        assert_eq!(event.signature(), "t|typing|||cli|");
    }

    #[test]
    fn test_synthetic_flag_not_serialized_when_false() {
        let json = serde_json::to_string(&EventRecord::now("a", "A", "QA", "reading", "cli")).unwrap();
        assert!(!json.contains("synthetic"));
        assert!(json.contains("\"agent_id\":\"a\""));
    }
}
