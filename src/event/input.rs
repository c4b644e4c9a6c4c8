use super::Event;
use crossterm::event::{self, Event as CrosstermEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How often the terminal is polled for input
const INPUT_POLL: Duration = Duration::from_millis(50);

/// Map a terminal event onto an observer event, dropping what the app ignores
fn translate(raw: CrosstermEvent) -> Option<Event> {
    match raw {
        // Windows reports both press and release
        CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
        CrosstermEvent::Resize(..) => Some(Event::Resize),
        _ => None,
    }
}

/// Forward terminal input until `cancel` fires or the receiver is gone
pub async fn listen(tx: mpsc::Sender<Event>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("Input listener cancelled");
                return;
            }
            () = tokio::time::sleep(INPUT_POLL) => {}
        }

        // Drain everything queued since the last poll
        while event::poll(Duration::ZERO).unwrap_or(false) {
            let raw = match event::read() {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::debug!(error = %e, "Failed to read terminal event");
                    break;
                }
            };
            if let Some(event) = translate(raw) {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyEventState, KeyModifiers};

    #[test]
    fn test_translate_keeps_presses_and_resizes() {
        let press = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(matches!(translate(CrosstermEvent::Key(press)), Some(Event::Key(_))));
        assert!(matches!(translate(CrosstermEvent::Resize(80, 24)), Some(Event::Resize)));

        let release = KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert!(translate(CrosstermEvent::Key(release)).is_none());
        assert!(translate(CrosstermEvent::FocusGained).is_none());
    }
}
