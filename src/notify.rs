//! Desktop notifications for newly delegated agents
//!
//! Uses notify-rust (libnotify on Linux, native APIs on macOS).

use crate::engine::Notification as Lifecycle;
use notify_rust::Notification;

/// Send a desktop notification without blocking the caller
pub fn send(title: &str, message: &str) {
    let title = title.to_string();
    let message = message.to_string();

    std::thread::spawn(move || {
        if let Err(e) = Notification::new()
            .summary(&title)
            .body(&message)
            .timeout(5000)
            .show()
        {
            tracing::debug!(error = %e, "Desktop notification failed");
        }
    });
}

/// Title and body for a lifecycle notification worth interrupting for
///
/// Only agents inferred from delegation qualify; real agents announce
/// themselves in the log.
pub fn describe(notification: &Lifecycle) -> Option<(String, String)> {
    match notification {
        Lifecycle::Created {
            name,
            role,
            inferred: true,
            ..
        } => Some((
            "KD delegate active".to_string(),
            format!("{name} ({role}) picked up delegated work"),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_inferred_creations_are_described() {
        let created = |inferred| Lifecycle::Created {
            key: "qa-agent".to_string(),
            id: 2,
            name: "QA".to_string(),
            role: "QA".to_string(),
            inferred,
        };

        let (title, body) = describe(&created(true)).unwrap();
        assert_eq!(title, "KD delegate active");
        assert!(body.contains("QA (QA)"));
        assert!(describe(&created(false)).is_none());
        assert!(describe(&Lifecycle::Closed {
            key: "qa-agent".to_string(),
            id: 2
        })
        .is_none());
    }
}
