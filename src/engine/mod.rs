//! The shared observer engine
//!
//! One pipeline feeds every presentation adapter:
//!
//! ```text
//! events.jsonl -> read_tail -> DelegationSynthesizer -> fold_agents -> Snapshot -> Reconciler
//! ```
//!
//! Everything after the read is pure: a fixed event window always folds to
//! the same snapshot apart from `updated_at`.

mod inference;
mod poll;
mod reconcile;
mod roles;
mod roster;
mod snapshot;
mod state;
mod synthesis;

pub use inference::{HintEntry, InferenceTables, TaskEntry};
pub use poll::TickGuard;
pub use reconcile::{JsonFileStore, MemoryStore, Notification, Reconciler};
pub use roles::{Role, RoleSet};
pub use roster::Roster;
pub use snapshot::Snapshot;
pub use state::{fold_agents, AgentState, AgentStatus};
pub use synthesis::DelegationSynthesizer;

use crate::errors::Result;
use crate::event::{store, EventRecord};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Window sizes passed through from the presentation adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Raw log lines considered per pass
    pub max_history: usize,
    /// Entries kept in `Snapshot::recent`
    pub max_events: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_history: 250,
            max_events: 12,
        }
    }
}

impl EngineOptions {
    /// Flag values over these values, each window at least 1
    #[must_use]
    pub fn with_overrides(self, max_history: Option<usize>, max_events: Option<usize>) -> Self {
        Self {
            max_history: max_history.unwrap_or(self.max_history).max(1),
            max_events: max_events.unwrap_or(self.max_events).max(1),
        }
    }
}

/// Snapshot builder bound to one project's files
#[derive(Debug, Clone)]
pub struct Engine {
    events_path: PathBuf,
    roster_path: Option<PathBuf>,
    options: EngineOptions,
    tables: InferenceTables,
}

impl Engine {
    pub fn new(events_path: impl Into<PathBuf>, options: EngineOptions) -> Self {
        Self {
            events_path: events_path.into(),
            roster_path: None,
            options,
            tables: InferenceTables::default(),
        }
    }

    /// Re-read this roster file on every snapshot
    #[must_use]
    pub fn with_roster_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.roster_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_tables(mut self, tables: InferenceTables) -> Self {
        self.tables = tables;
        self
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Current roster, or the built-in names when none is configured
    pub fn roster(&self) -> Roster {
        self.roster_path
            .as_deref()
            .map_or_else(Roster::default, Roster::load)
    }

    /// Read the log tail and fold it
    ///
    /// Only environmental failures reading the log are errors.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let raw = store::read_tail(&self.events_path, self.options.max_history)?;
        Ok(self.build(&raw, &self.roster()))
    }

    /// Pure part of the pipeline
    pub fn build(&self, raw: &[EventRecord], roster: &Roster) -> Snapshot {
        let stream = DelegationSynthesizer::new(&self.tables, roster).with_synthesized(raw);
        Snapshot {
            total_events: stream.len(),
            agents: fold_agents(&stream),
            recent: snapshot::recent_events(&stream, self.options.max_events),
            updated_at: Utc::now(),
        }
    }
}
