//! Terminal setup and restoration for `kd observe`

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use crate::errors::{KdError, Result};
use ratatui::prelude::*;
use std::io::{self, stdout, Stdout};

/// Type alias for our terminal backend
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Enter raw mode and the alternate screen
///
/// Installs a panic hook first so a panic report lands on a restored
/// terminal instead of the alternate screen.
///
/// # Errors
/// Returns [`KdError::Terminal`] if terminal setup fails (e.g., not a TTY).
pub fn init() -> Result<Tui> {
    install_panic_hook();
    enter().map_err(KdError::Terminal)
}

fn enter() -> io::Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

/// Leave the alternate screen and raw mode. Safe to call more than once.
pub fn restore() -> Result<()> {
    leave().map_err(KdError::Terminal)
}

fn leave() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen)?;
    Ok(())
}

/// Chain a terminal restore in front of the current (color-eyre) panic hook
fn install_panic_hook() {
    let report = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore();
        report(info);
    }));
}

/// Restores the terminal when dropped, including during a panic unwind
pub struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = restore();
    }
}
