//! Terminal observer state
//!
//! The app never reads the log itself. Poll ticks run on the blocking pool
//! and come back as [`Event::Snapshot`]; the app reconciles each snapshot,
//! keeps a short lifecycle ticker and flags when a redraw is due.

mod keyboard;

use crate::engine::{MemoryStore, Notification, Reconciler, Snapshot};
use crate::event::{Event, PollOutcome};
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::path::PathBuf;

/// Lifecycle lines kept in the ticker
pub const TICKER_CAPACITY: usize = 8;

/// Settings shown in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveSettings {
    pub events_path: PathBuf,
    pub interval_ms: u64,
    pub max_events: usize,
    pub max_history: usize,
    pub notify: bool,
}

/// Connection indicator
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkStatus {
    /// No tick has completed yet
    #[default]
    Connecting,
    Online,
    /// The last tick hit an environmental error
    Offline(String),
}

/// One ticker line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerEntry {
    pub at: DateTime<Local>,
    pub notification: Notification,
}

/// Application state and logic
pub struct App {
    pub settings: ObserveSettings,
    pub snapshot: Snapshot,
    pub status: LinkStatus,
    pub ticker: VecDeque<TickerEntry>,
    pub should_quit: bool,
    pub show_help: bool,
    /// Dirty flag: true if UI needs re-render
    pub needs_render: bool,
    /// Set by `r`; the main loop schedules an immediate tick
    refresh_requested: bool,
    reconciler: Reconciler<MemoryStore>,
}

impl App {
    pub fn new(settings: ObserveSettings) -> Self {
        Self {
            settings,
            snapshot: Snapshot::empty(),
            status: LinkStatus::Connecting,
            ticker: VecDeque::with_capacity(TICKER_CAPACITY),
            should_quit: false,
            show_help: false,
            needs_render: true, // Always render first frame
            refresh_requested: false,
            reconciler: Reconciler::new(MemoryStore::new()),
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Resize => self.needs_render = true,
            Event::Snapshot(outcome) => self.apply_outcome(*outcome),
        }
    }

    /// Take a fresh poll result
    ///
    /// A failure keeps the last good snapshot on screen but flips the
    /// indicator to Offline until a tick succeeds again.
    pub fn apply_outcome(&mut self, outcome: PollOutcome) {
        match outcome {
            PollOutcome::Ok(snapshot) => {
                if self.status != LinkStatus::Online {
                    tracing::info!(agents = snapshot.agents.len(), "Observer online");
                }
                let notifications = self.reconciler.reconcile(&snapshot);
                self.record(notifications);

                if self.status != LinkStatus::Online || !snapshot.same_content(&self.snapshot) {
                    self.needs_render = true;
                }
                self.snapshot = snapshot;
                self.status = LinkStatus::Online;
            }
            PollOutcome::Failed(error) => {
                if !matches!(&self.status, LinkStatus::Offline(e) if *e == error) {
                    tracing::warn!(error = %error, "Observer offline");
                    self.needs_render = true;
                }
                self.status = LinkStatus::Offline(error);
            }
        }
    }

    fn record(&mut self, notifications: Vec<Notification>) {
        let now = Local::now();
        for notification in notifications {
            tracing::debug!(id = notification.id(), key = %notification.key(), "Lifecycle change");
            if self.settings.notify {
                if let Some((title, body)) = crate::notify::describe(&notification) {
                    crate::notify::send(&title, &body);
                }
            }
            if self.ticker.len() == TICKER_CAPACITY {
                self.ticker.pop_front();
            }
            self.ticker.push_back(TickerEntry {
                at: now,
                notification,
            });
            self.needs_render = true;
        }
    }

    /// Consume a pending `r` press
    pub fn take_refresh_request(&mut self) -> bool {
        std::mem::take(&mut self.refresh_requested)
    }

    /// Mark UI as rendered (clears dirty flag)
    pub fn rendered(&mut self) {
        self.needs_render = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineOptions};
    use crate::event::EventRecord;

    fn app() -> App {
        App::new(ObserveSettings {
            events_path: PathBuf::from("events.jsonl"),
            interval_ms: 1000,
            max_events: 12,
            max_history: 250,
            notify: false,
        })
    }

    fn snapshot_of(lines: &[&str]) -> Snapshot {
        let raw: Vec<EventRecord> = lines.iter().filter_map(|l| EventRecord::parse_line(l)).collect();
        let engine = Engine::new("events.jsonl", EngineOptions::default());
        engine.build(&raw, &engine.roster())
    }

    const MAIN_TEST: &str =
        r#"{"ts":"2024-01-01T00:00:00Z","agent_id":"main-agent","role":"Master Agent","action":"typing","task":"kd-test"}"#;

    #[test]
    fn test_starts_connecting_and_goes_online() {
        let mut app = app();
        assert_eq!(app.status, LinkStatus::Connecting);

        app.rendered();
        app.apply_outcome(PollOutcome::Ok(Snapshot::empty()));
        assert_eq!(app.status, LinkStatus::Online);
        assert!(app.needs_render);
    }

    #[test]
    fn test_failure_keeps_snapshot_and_recovers() {
        let mut app = app();
        app.apply_outcome(PollOutcome::Ok(snapshot_of(&[MAIN_TEST])));
        assert_eq!(app.snapshot.agents.len(), 2);

        app.apply_outcome(PollOutcome::Failed("permission denied".to_string()));
        assert_eq!(app.status, LinkStatus::Offline("permission denied".to_string()));
        assert_eq!(app.snapshot.agents.len(), 2);

        app.apply_outcome(PollOutcome::Ok(snapshot_of(&[MAIN_TEST])));
        assert_eq!(app.status, LinkStatus::Online);
    }

    #[test]
    fn test_ticker_records_lifecycle_once() {
        let mut app = app();
        app.apply_outcome(PollOutcome::Ok(snapshot_of(&[MAIN_TEST])));
        // created + pulse for main-agent and qa-agent
        assert_eq!(app.ticker.len(), 4);

        app.rendered();
        app.apply_outcome(PollOutcome::Ok(snapshot_of(&[MAIN_TEST])));
        assert_eq!(app.ticker.len(), 4);
        assert!(!app.needs_render);

        app.apply_outcome(PollOutcome::Ok(Snapshot::empty()));
        assert_eq!(app.ticker.len(), 6);
        assert!(matches!(
            app.ticker.back().map(|e| &e.notification),
            Some(Notification::Closed { .. })
        ));
    }

    #[test]
    fn test_resize_forces_redraw() {
        let mut app = app();
        app.rendered();
        app.handle_event(Event::Resize);
        assert!(app.needs_render);
    }

    #[test]
    fn test_ticker_is_bounded() {
        let mut app = app();
        for n in 0..20 {
            let line = format!(r#"{{"ts":"2024-01-01T00:00:{n:02}Z","agent_id":"a{n}","action":"typing"}}"#);
            app.apply_outcome(PollOutcome::Ok(snapshot_of(&[&line])));
        }
        assert_eq!(app.ticker.len(), TICKER_CAPACITY);
    }
}
