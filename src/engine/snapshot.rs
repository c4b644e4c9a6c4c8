//! The folded view every presentation adapter renders

use super::state::AgentState;
use crate::event::EventRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One pass over the event window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Raw plus synthetic events folded in this pass
    pub total_events: usize,
    pub agents: Vec<AgentState>,
    /// Most recent first
    pub recent: Vec<EventRecord>,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            total_events: 0,
            agents: Vec::new(),
            recent: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn agent(&self, agent_id: &str) -> Option<&AgentState> {
        self.agents.iter().find(|a| a.agent_id == agent_id)
    }

    /// Equal apart from `updated_at`
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.total_events == other.total_events
            && self.agents == other.agents
            && self.recent == other.recent
    }
}

/// Last `max_events` of the stream, newest first
pub(super) fn recent_events(stream: &[EventRecord], max_events: usize) -> Vec<EventRecord> {
    stream.iter().rev().take(max_events).cloned().collect()
}
