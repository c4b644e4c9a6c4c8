//! Delegation synthesis
//!
//! The log usually only carries the main agent's own events. When its latest
//! event implies delegated work, or any event names a delegation target, the
//! synthesizer fabricates one event per implied role so the delegate shows up
//! in the snapshot. Synthetic events are regenerated every pass and never
//! written back; a role with real activity since the trigger is left alone.

use super::{InferenceTables, Role, RoleSet, Roster};
use crate::event::EventRecord;
use std::borrow::Cow;

/// Substrings in a main event's action/message that imply delegation
/// when no role could be inferred
const DELEGATION_SIGNALS: [&str; 5] = ["delegat", "consult", "ask", "help", "assist"];

/// Source tag for synthetic events whose trigger has none
const DEFAULT_SOURCE: &str = "kd";

/// Why a synthetic event was produced; selects its message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// Implied by the latest main-agent event
    MainAgent,
    /// Named in some event's `target_agent_id`
    Target,
}

impl Trigger {
    fn message(self, name: &str) -> String {
        match self {
            Trigger::MainAgent => format!("{name} handling delegated task"),
            Trigger::Target => format!("{name} responding to main-agent delegation"),
        }
    }
}

/// Produces synthetic delegate events from a raw event window
#[derive(Debug, Clone, Copy)]
pub struct DelegationSynthesizer<'a> {
    tables: &'a InferenceTables,
    roster: &'a Roster,
}

impl<'a> DelegationSynthesizer<'a> {
    pub fn new(tables: &'a InferenceTables, roster: &'a Roster) -> Self {
        Self { tables, roster }
    }

    /// Raw events followed by any synthetic ones
    ///
    /// Borrows the input untouched when nothing was synthesized.
    pub fn with_synthesized<'e>(&self, raw: &'e [EventRecord]) -> Cow<'e, [EventRecord]> {
        let synthetic = self.synthesize(raw);
        if synthetic.is_empty() {
            return Cow::Borrowed(raw);
        }
        let mut combined = Vec::with_capacity(raw.len() + synthetic.len());
        combined.extend_from_slice(raw);
        combined.extend(synthetic);
        Cow::Owned(combined)
    }

    /// Synthetic events only: main-agent pass first, then the target pass
    pub fn synthesize(&self, raw: &[EventRecord]) -> Vec<EventRecord> {
        let mut synthetic = Vec::new();

        if let Some(main) = latest_main(raw) {
            let roles = self.roles_for_main(main);
            let since = main.timestamp_millis();
            for role in roles {
                if self.has_activity_since(raw, role, since) {
                    tracing::trace!(role = %role, "Delegate already active, not synthesizing");
                    continue;
                }
                synthetic.push(self.delegate_event(main, role, Trigger::MainAgent));
            }
        }

        for (role, parent) in self.latest_targets(raw) {
            if self.has_activity_since(raw, role, parent.timestamp_millis()) {
                tracing::trace!(role = %role, "Target already active, not synthesizing");
                continue;
            }
            synthetic.push(self.delegate_event(parent, role, Trigger::Target));
        }

        if !synthetic.is_empty() {
            tracing::trace!(count = synthetic.len(), "Synthesized delegate events");
        }
        synthetic
    }

    /// Roles implied by the main agent's task, message and action
    fn roles_for_main(&self, main: &EventRecord) -> RoleSet {
        let mut roles = self.tables.roles_for_task(main.task().unwrap_or_default());
        roles.extend(self.tables.roles_from_text(main.message().unwrap_or_default()));
        roles.extend(self.tables.roles_from_text(main.action().unwrap_or_default()));

        if roles.is_empty() {
            let signal = format!(
                "{} {}",
                main.action().unwrap_or_default(),
                main.message().unwrap_or_default()
            )
            .to_lowercase();
            if DELEGATION_SIGNALS.iter().any(|s| signal.contains(s)) {
                roles.insert(Role::Analyst);
            }
        }
        roles
    }

    /// Latest event naming each role as a target, in first-seen role order
    ///
    /// Equal timestamps resolve to the later event in file order.
    fn latest_targets<'e>(&self, raw: &'e [EventRecord]) -> Vec<(Role, &'e EventRecord)> {
        let mut latest: Vec<(Role, &EventRecord)> = Vec::new();
        for event in raw {
            let Some(target) = event.target() else {
                continue;
            };
            let ts = event.timestamp_millis();
            for role in self.tables.roles_from_target(target, self.roster) {
                match latest.iter_mut().find(|(r, _)| *r == role) {
                    Some(slot) if ts >= slot.1.timestamp_millis() => slot.1 = event,
                    Some(_) => {}
                    None => latest.push((role, event)),
                }
            }
        }
        latest
    }

    /// Does any raw event at or after `since` show this role doing real work?
    fn has_activity_since(&self, raw: &[EventRecord], role: Role, since: i64) -> bool {
        let id = role.agent_id();
        let name = self.roster.name(role).trim().to_lowercase();

        raw.iter()
            .filter(|e| !e.synthetic && e.timestamp_millis() >= since)
            .any(|e| {
                let event_id = e.agent_id.as_deref().unwrap_or_default().trim().to_lowercase();
                let event_name = e.agent_name.as_deref().unwrap_or_default().trim().to_lowercase();
                let event_role = e.role.as_deref().unwrap_or_default().trim().to_lowercase();

                event_id == id
                    || (!name.is_empty() && event_name == name)
                    || role.named_in(&event_role)
            })
    }

    fn delegate_event(&self, parent: &EventRecord, role: Role, trigger: Trigger) -> EventRecord {
        let name = self.roster.name(role);
        EventRecord {
            ts: parent.ts.clone(),
            agent_id: Some(role.agent_id()),
            agent_name: Some(name.to_string()),
            role: Some(role.title().to_string()),
            action: Some(delegated_action(parent.action(), role).to_string()),
            task: parent.task().map(ToString::to_string),
            message: Some(trigger.message(name)),
            source: Some(parent.source().unwrap_or(DEFAULT_SOURCE).to_string()),
            target_agent_id: None,
            synthetic: true,
        }
    }
}

/// Most recent main-agent event; on equal timestamps the later line wins
pub fn latest_main(raw: &[EventRecord]) -> Option<&EventRecord> {
    raw.iter()
        .filter(|e| e.is_main())
        .fold(None, |best: Option<&EventRecord>, e| match best {
            Some(b) if e.timestamp_millis() < b.timestamp_millis() => Some(b),
            _ => Some(e),
        })
}

/// A waiting main agent means waiting delegates; otherwise the role's default
fn delegated_action(main_action: Option<&str>, role: Role) -> &'static str {
    let action = main_action.unwrap_or_default().to_lowercase();
    if action.contains("wait") || action.contains("idle") {
        "waiting"
    } else {
        role.delegated_action()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(ts: &str, id: &str, role: &str, action: &str) -> EventRecord {
        EventRecord {
            ts: Some(ts.to_string()),
            agent_id: Some(id.to_string()),
            role: Some(role.to_string()),
            action: Some(action.to_string()),
            source: Some("cli".to_string()),
            ..EventRecord::default()
        }
    }

    fn main_event(ts: &str, action: &str, task: Option<&str>) -> EventRecord {
        EventRecord {
            task: task.map(ToString::to_string),
            agent_name: Some("Amad".to_string()),
            ..event(ts, "main-agent", "Master Agent", action)
        }
    }

    fn ids(events: &[EventRecord]) -> Vec<&str> {
        events.iter().map(EventRecord::agent_id).collect()
    }

    fn run(raw: &[EventRecord]) -> Vec<EventRecord> {
        run_with(raw, &Roster::default())
    }

    fn run_with(raw: &[EventRecord], roster: &Roster) -> Vec<EventRecord> {
        let tables = InferenceTables::default();
        DelegationSynthesizer::new(&tables, roster).synthesize(raw)
    }

    #[test]
    fn test_main_task_synthesizes_each_role() {
        let raw = vec![main_event("2024-01-01T00:00:00Z", "typing", Some("kd-arch"))];
        let synthetic = run(&raw);

        assert_eq!(ids(&synthetic), vec!["architect-agent", "security-agent"]);
        let architect = &synthetic[0];
        assert!(architect.synthetic);
        assert_eq!(architect.ts.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(architect.agent_name(), "Architect");
        assert_eq!(architect.role(), "Architect");
        assert_eq!(architect.action(), Some("reading"));
        assert_eq!(architect.task(), Some("kd-arch"));
        assert_eq!(architect.source(), Some("cli"));
        assert_eq!(architect.message(), Some("Architect handling delegated task"));
    }

    #[test]
    fn test_real_activity_suppresses_synthesis() {
        let raw = vec![
            main_event("2024-01-01T00:00:00Z", "typing", Some("kd-arch")),
            EventRecord {
                agent_name: Some("Sari".to_string()),
                ..event("2024-01-01T00:00:05Z", "security-agent", "Security", "reading")
            },
        ];
        assert_eq!(ids(&run(&raw)), vec!["architect-agent"]);
    }

    #[test]
    fn test_activity_before_trigger_does_not_count() {
        let raw = vec![
            event("2023-12-31T23:00:00Z", "engineer-agent", "Engineer", "typing"),
            main_event("2024-01-01T00:00:00Z", "typing", Some("kd-dev-story")),
        ];
        assert_eq!(ids(&run(&raw)), vec!["engineer-agent"]);
    }

    #[test]
    fn test_activity_matched_by_roster_name_or_role_text() {
        let roster = Roster::default().with_name(Role::Engineer, "Ezra");
        let by_name = vec![
            main_event("2024-01-01T00:00:00Z", "typing", Some("kd-dev-story")),
            EventRecord {
                agent_name: Some("EZRA".to_string()),
                ..event("2024-01-01T00:00:01Z", "ezra-1", "Builder", "typing")
            },
        ];
        assert!(run_with(&by_name, &roster).is_empty());

        let by_role = vec![
            main_event("2024-01-01T00:00:00Z", "typing", Some("kd-story")),
            event("2024-01-01T00:00:00Z", "tl-1", "Senior Tech Lead", "typing"),
        ];
        assert!(run(&by_role).is_empty());
    }

    #[test]
    fn test_waiting_main_makes_waiting_delegates() {
        let raw = vec![main_event("2024-01-01T00:00:00Z", "Idle", Some("kd-deploy"))];
        let synthetic = run(&raw);
        assert_eq!(ids(&synthetic), vec!["devops-agent"]);
        assert_eq!(synthetic[0].action(), Some("waiting"));
    }

    #[test]
    fn test_latest_main_wins() {
        let raw = vec![
            main_event("2024-01-01T00:00:09Z", "typing", Some("kd-prd")),
            main_event("2024-01-01T00:00:01Z", "typing", Some("kd-test")),
        ];
        // File order is not time order; the later timestamp decides
        assert_eq!(ids(&run(&raw)), vec!["pm-agent"]);
    }

    #[test]
    fn test_signal_words_fall_back_to_analyst() {
        let raw = vec![main_event("2024-01-01T00:00:00Z", "consulting", None)];
        let synthetic = run(&raw);
        assert_eq!(ids(&synthetic), vec!["analyst-agent"]);

        let quiet = vec![main_event("2024-01-01T00:00:00Z", "typing", None)];
        assert!(run(&quiet).is_empty());
    }

    #[test]
    fn test_target_pass() {
        let mut trigger = event("2024-01-01T00:00:03Z", "pm-agent", "PM", "typing");
        trigger.target_agent_id = Some("qa-agent; Engineer".to_string());
        trigger.source = None;
        let raw = vec![trigger];

        let synthetic = run(&raw);
        assert_eq!(ids(&synthetic), vec!["qa-agent", "engineer-agent"]);
        assert_eq!(
            synthetic[0].message(),
            Some("QA responding to main-agent delegation")
        );
        assert_eq!(synthetic[0].source(), Some("kd"));
        assert_eq!(synthetic[1].action(), Some("typing"));
    }

    #[test]
    fn test_target_pass_uses_latest_trigger_per_role() {
        let mut early = event("2024-01-01T00:00:01Z", "main-agent", "Master Agent", "typing");
        early.target_agent_id = Some("qa".to_string());
        let mut late = event("2024-01-01T00:00:05Z", "main-agent", "Master Agent", "waiting");
        late.target_agent_id = Some("qa".to_string());
        let qa_between = event("2024-01-01T00:00:03Z", "qa-agent", "QA", "reading");

        // QA was active after the early trigger but not after the late one
        let raw = vec![early, qa_between, late];
        let synthetic = run(&raw);
        assert_eq!(ids(&synthetic), vec!["qa-agent"]);
        assert_eq!(synthetic[0].action(), Some("waiting"));
    }

    #[test]
    fn test_with_synthesized_borrows_when_empty() {
        let tables = InferenceTables::default();
        let roster = Roster::default();
        let synthesizer = DelegationSynthesizer::new(&tables, &roster);

        let quiet = vec![event("2024-01-01T00:00:00Z", "qa-agent", "QA", "reading")];
        assert!(matches!(synthesizer.with_synthesized(&quiet), Cow::Borrowed(_)));
        assert!(matches!(synthesizer.with_synthesized(&[]), Cow::Borrowed(_)));

        let busy = vec![main_event("2024-01-01T00:00:00Z", "typing", Some("kd-test"))];
        let combined = synthesizer.with_synthesized(&busy);
        assert_eq!(ids(&combined), vec!["main-agent", "qa-agent"]);
    }

    #[test]
    fn test_synthetic_ts_stays_absent_without_trigger_ts() {
        let mut raw = vec![main_event("", "typing", Some("kd-prd"))];
        raw[0].ts = None;
        let synthetic = run(&raw);
        assert_eq!(synthetic.len(), 1);
        assert_eq!(synthetic[0].ts, None);
    }
}
