//! State shared between the poller and the route handlers

use crate::engine::{Notification, Snapshot};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One feed entry as served by `/api/notifications`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub notification: Notification,
}

/// Bounded ring of lifecycle notifications with monotonically rising sequence numbers
///
/// Sequence numbers restart at 1 with every process, so clients pair them
/// with [`NotificationFeed::boot`].
#[derive(Debug, Clone)]
pub struct NotificationFeed {
    boot: String,
    capacity: usize,
    next_seq: u64,
    entries: VecDeque<FeedEntry>,
}

impl NotificationFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            boot: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            capacity: capacity.max(1),
            next_seq: 1,
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, notification: Notification) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(FeedEntry {
            seq: self.next_seq,
            at: Utc::now(),
            notification,
        });
        self.next_seq += 1;
    }

    /// Identifies this feed's numbering; changes when the server restarts
    pub fn boot(&self) -> &str {
        &self.boot
    }

    /// Sequence number of the newest entry, 0 before the first
    pub fn latest(&self) -> u64 {
        self.next_seq - 1
    }

    /// Entries with `seq > after`, oldest first
    pub fn after(&self, after: u64) -> Vec<FeedEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.seq > after)
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Result of the latest poll plus the lifecycle feed
#[derive(Debug)]
pub struct ObserverState {
    pub snapshot: Snapshot,
    /// Set while the most recent tick failed
    pub error: Option<String>,
    pub feed: NotificationFeed,
}

impl ObserverState {
    pub fn new(notification_buffer: usize) -> Self {
        Self {
            snapshot: Snapshot::empty(),
            error: None,
            feed: NotificationFeed::new(notification_buffer),
        }
    }

    /// Store a successful tick and its notifications
    pub fn apply(&mut self, snapshot: Snapshot, notifications: Vec<Notification>) {
        if self.error.take().is_some() {
            tracing::info!("Event log readable again");
        }
        self.snapshot = snapshot;
        for notification in notifications {
            self.feed.push(notification);
        }
    }

    /// Record a failed tick; the last good snapshot stays in place
    pub fn fail(&mut self, error: String) {
        if self.error.as_deref() != Some(error.as_str()) {
            tracing::warn!(error = %error, "Snapshot tick failed");
        }
        self.error = Some(error);
    }
}

pub type SharedState = Arc<RwLock<ObserverState>>;

pub fn shared(notification_buffer: usize) -> SharedState {
    Arc::new(RwLock::new(ObserverState::new(notification_buffer)))
}
