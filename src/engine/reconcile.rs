//! Lifecycle notifications for stateful presentation layers
//!
//! Compares each snapshot against what the presentation layer already knows
//! and emits created/closed/pulse notifications. A pulse is announced at
//! most once per distinct event signature. The known set, the announced
//! signatures and the numeric identity map live in an injected
//! [`StateStore`], so nothing here depends on process-global state.

use super::state::AgentState;
use super::Snapshot;
use crate::errors::{KdError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything the reconciler remembers between ticks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerState {
    /// Next numeric identity to hand out
    pub next_id: u64,
    /// Agent key -> numeric identity, never reassigned
    pub ids: BTreeMap<String, u64>,
    /// Known agent key -> last announced signature
    pub known: BTreeMap<String, String>,
}

impl Default for ReconcilerState {
    fn default() -> Self {
        Self {
            next_id: 1,
            ids: BTreeMap::new(),
            known: BTreeMap::new(),
        }
    }
}

/// Persistence for [`ReconcilerState`]
pub trait StateStore {
    fn load(&self) -> Result<ReconcilerState>;
    fn save(&mut self, state: &ReconcilerState) -> Result<()>;
}

/// In-process store; state dies with the observer
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: ReconcilerState,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<ReconcilerState> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &ReconcilerState) -> Result<()> {
        self.state = state.clone();
        Ok(())
    }
}

/// JSON file store (`.kracked/runtime/observer-state.json`)
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, reason: impl ToString) -> KdError {
        KdError::StateStore {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<ReconcilerState> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| self.error(e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ReconcilerState::default()),
            Err(e) => Err(self.error(e)),
        }
    }

    /// Write to a sibling temp file, then rename over the old state
    fn save(&mut self, state: &ReconcilerState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.error(e))?;
        Ok(())
    }
}

/// One lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Notification {
    /// Agent appeared in this pass
    Created {
        key: String,
        id: u64,
        name: String,
        role: String,
        inferred: bool,
    },
    /// Agent known before is gone from this pass
    Closed { key: String, id: u64 },
    /// Agent's latest event changed since the last announcement
    Pulse {
        key: String,
        id: u64,
        name: String,
        role: String,
        action: Option<String>,
        task: Option<String>,
        message: Option<String>,
        status: super::AgentStatus,
    },
}

impl Notification {
    pub fn key(&self) -> &str {
        match self {
            Notification::Created { key, .. }
            | Notification::Closed { key, .. }
            | Notification::Pulse { key, .. } => key,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Notification::Created { id, .. }
            | Notification::Closed { id, .. }
            | Notification::Pulse { id, .. } => *id,
        }
    }

    fn pulse(agent: &AgentState, id: u64) -> Self {
        Notification::Pulse {
            key: agent.agent_id.clone(),
            id,
            name: agent.agent_name.clone(),
            role: agent.role.clone(),
            action: agent.last_action.clone(),
            task: agent.last_task.clone(),
            message: agent.last_message.clone(),
            status: agent.status,
        }
    }
}

/// Diff emitter over consecutive snapshots
#[derive(Debug)]
pub struct Reconciler<S: StateStore> {
    store: S,
    state: ReconcilerState,
}

impl<S: StateStore> Reconciler<S> {
    /// Load prior state from the store; an unreadable store starts fresh
    pub fn new(store: S) -> Self {
        let state = store.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load observer state, starting fresh");
            ReconcilerState::default()
        });
        Self { store, state }
    }

    pub fn state(&self) -> &ReconcilerState {
        &self.state
    }

    /// Numeric identity for a key, assigned on first sight
    pub fn identity(&mut self, key: &str) -> u64 {
        if let Some(id) = self.state.ids.get(key) {
            return *id;
        }
        let id = self.state.next_id;
        self.state.next_id += 1;
        self.state.ids.insert(key.to_string(), id);
        id
    }

    /// Diff `snapshot` against the known set
    ///
    /// Order: closed agents by key, then created/pulse in snapshot order.
    pub fn reconcile(&mut self, snapshot: &Snapshot) -> Vec<Notification> {
        let before = self.state.clone();
        let mut notifications = Vec::new();

        let gone: Vec<String> = self
            .state
            .known
            .keys()
            .filter(|key| snapshot.agent(key).is_none())
            .cloned()
            .collect();
        for key in gone {
            self.state.known.remove(&key);
            let id = self.identity(&key);
            notifications.push(Notification::Closed { key, id });
        }

        for agent in &snapshot.agents {
            let id = self.identity(&agent.agent_id);
            let signature = agent.signature();
            match self.state.known.get(&agent.agent_id) {
                None => {
                    notifications.push(Notification::Created {
                        key: agent.agent_id.clone(),
                        id,
                        name: agent.agent_name.clone(),
                        role: agent.role.clone(),
                        inferred: agent.inferred,
                    });
                    notifications.push(Notification::pulse(agent, id));
                }
                Some(announced) if *announced == signature => continue,
                Some(_) => notifications.push(Notification::pulse(agent, id)),
            }
            self.state.known.insert(agent.agent_id.clone(), signature);
        }

        if self.state != before {
            if let Err(e) = self.store.save(&self.state) {
                tracing::warn!(error = %e, "Failed to persist observer state");
            }
        }

        if !notifications.is_empty() {
            tracing::debug!(count = notifications.len(), "Reconciled snapshot");
        }
        notifications
    }
}
