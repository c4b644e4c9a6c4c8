//! Keyboard input handling

use super::App;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

impl App {
    /// Handle keyboard input
    pub fn handle_key(&mut self, key: KeyEvent) {
        // Handle Ctrl+C always
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match key.code {
            // Esc closes help before it quits
            KeyCode::Esc if self.show_help => {
                self.show_help = false;
                self.needs_render = true;
            }
            KeyCode::Char('q' | 'Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('r') => {
                tracing::debug!("Manual refresh requested");
                self.refresh_requested = true;
            }
            KeyCode::Char('?') => {
                self.show_help = !self.show_help;
                self.needs_render = true;
            }
            _ => {}
        }
    }
}
