//! Per-agent state folded from the event stream

use crate::event::{signature_of, EventRecord, MAIN_AGENT_ID};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Action counted for events that carry none
const UNKNOWN_ACTION: &str = "unknown";

/// Derived activity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Waiting,
}

impl AgentStatus {
    /// Waiting if the action mentions wait, idle, done or complete
    pub fn from_action(action: Option<&str>) -> Self {
        let action = action.unwrap_or_default().to_lowercase();
        if ["wait", "idle", "done", "complete"]
            .iter()
            .any(|k| action.contains(k))
        {
            AgentStatus::Waiting
        } else {
            AgentStatus::Active
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Waiting => "waiting",
        }
    }
}

/// Current view of one logical agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentState {
    pub agent_id: String,
    pub agent_name: String,
    pub role: String,
    pub source: Option<String>,
    pub last_action: Option<String>,
    pub last_task: Option<String>,
    pub last_message: Option<String>,
    pub last_ts: Option<String>,
    pub last_target: Option<String>,
    pub total: usize,
    pub actions: BTreeMap<String, usize>,
    pub status: AgentStatus,
    /// The latest folded event was synthesized
    pub inferred: bool,
}

impl AgentState {
    fn new(agent_id: String) -> Self {
        Self {
            agent_id,
            agent_name: String::new(),
            role: String::new(),
            source: None,
            last_action: None,
            last_task: None,
            last_message: None,
            last_ts: None,
            last_target: None,
            total: 0,
            actions: BTreeMap::new(),
            status: AgentStatus::Active,
            inferred: false,
        }
    }

    /// Last write wins for every descriptive field
    fn apply(&mut self, event: &EventRecord) {
        self.agent_name = event.agent_name().to_string();
        self.role = event.role().to_string();
        self.source = event.source().map(ToString::to_string);
        self.last_action = event.action().map(ToString::to_string);
        self.last_task = event.task().map(ToString::to_string);
        self.last_message = event.message().map(ToString::to_string);
        self.last_ts = event.ts.clone().filter(|ts| !ts.is_empty());
        self.last_target = event.target().map(ToString::to_string);
        self.status = AgentStatus::from_action(event.action());
        self.inferred = event.synthetic;

        self.total += 1;
        *self
            .actions
            .entry(event.action().unwrap_or(UNKNOWN_ACTION).to_string())
            .or_insert(0) += 1;
    }

    pub fn is_main(&self) -> bool {
        self.agent_id == MAIN_AGENT_ID
    }

    /// Content signature of the latest folded event
    pub fn signature(&self) -> String {
        signature_of([
            self.last_ts.as_deref(),
            self.last_action.as_deref(),
            self.last_task.as_deref(),
            self.last_message.as_deref(),
            self.source.as_deref(),
            self.last_target.as_deref(),
        ])
    }
}

/// Fold events in stream order into one state per agent
///
/// Keys are `agent_id`, else `agent_name`, else `unknown-N` where N counts
/// keyless events within this fold. The result lists `main-agent` first,
/// then agents by descending event count, ties in first-seen order.
pub fn fold_agents(events: &[EventRecord]) -> Vec<AgentState> {
    let mut agents: Vec<AgentState> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut keyless = 0usize;

    for event in events {
        let key = match event.key() {
            Some(key) => key.to_string(),
            None => {
                keyless += 1;
                format!("unknown-{keyless}")
            }
        };

        let slot = *index.entry(key.clone()).or_insert_with(|| {
            agents.push(AgentState::new(key));
            agents.len() - 1
        });
        agents[slot].apply(event);
    }

    // Stable sort keeps first-seen order for ties
    agents.sort_by(|a, b| b.is_main().cmp(&a.is_main()).then(b.total.cmp(&a.total)));
    agents
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, action: &str) -> EventRecord {
        EventRecord {
            agent_id: Some(id.to_string()),
            action: Some(action.to_string()),
            ..EventRecord::default()
        }
    }

    #[test]
    fn test_status_keywords() {
        let cases = [
            (Some("waiting"), AgentStatus::Waiting),
            (Some("IDLE"), AgentStatus::Waiting),
            (Some("done"), AgentStatus::Waiting),
            (Some("task completed"), AgentStatus::Waiting),
            (Some("typing"), AgentStatus::Active),
            (None, AgentStatus::Active),
        ];
        for (action, expected) in cases {
            assert_eq!(AgentStatus::from_action(action), expected, "action: {action:?}");
        }
    }

    #[test]
    fn test_fold_last_write_wins() {
        let mut first = event("qa-agent", "reading");
        first.ts = Some("2024-01-01T00:00:09Z".to_string());
        first.task = Some("kd-test".to_string());
        let mut second = event("qa-agent", "waiting");
        // Earlier timestamp, later in the stream: still wins
        second.ts = Some("2024-01-01T00:00:01Z".to_string());
        second.synthetic = true;

        let agents = fold_agents(&[first, second]);
        assert_eq!(agents.len(), 1);
        let qa = &agents[0];
        assert_eq!(qa.total, 2);
        assert_eq!(qa.last_action.as_deref(), Some("waiting"));
        assert_eq!(qa.last_task, None);
        assert_eq!(qa.last_ts.as_deref(), Some("2024-01-01T00:00:01Z"));
        assert_eq!(qa.status, AgentStatus::Waiting);
        assert!(qa.inferred);
        assert_eq!(qa.actions.get("reading"), Some(&1));
        assert_eq!(qa.actions.get("waiting"), Some(&1));
    }

    #[test]
    fn test_order_main_first_then_count_then_first_seen() {
        let events = vec![
            event("qa-agent", "reading"),
            event("dev-agent", "typing"),
            event("ops-agent", "running"),
            event("dev-agent", "typing"),
            event("main-agent", "typing"),
            event("ops-agent", "running"),
        ];
        let agents = fold_agents(&events);
        let ids: Vec<&str> = agents.iter().map(|a| a.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["main-agent", "dev-agent", "ops-agent", "qa-agent"]);
    }

    #[test]
    fn test_keys_fall_back_to_name_then_placeholder() {
        let named = EventRecord {
            agent_name: Some("Sari".to_string()),
            ..EventRecord::default()
        };
        let events = vec![named.clone(), EventRecord::default(), named, EventRecord::default()];
        let agents = fold_agents(&events);
        let ids: Vec<&str> = agents.iter().map(|a| a.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["Sari", "unknown-1", "unknown-2"]);
        assert_eq!(agents[1].agent_name, "unknown agent");
        assert_eq!(agents[1].role, "Professional Agent");
        assert_eq!(agents[1].actions.get("unknown"), Some(&1));
    }

    #[test]
    fn test_signature_tracks_latest_event() {
        let mut e = event("a", "typing");
        e.ts = Some("t1".to_string());
        e.source = Some("cli".to_string());
        e.target_agent_id = Some("qa".to_string());
        let agents = fold_agents(&[e]);
        assert_eq!(agents[0].signature(), "t1|typing|||cli|qa");
    }
}
