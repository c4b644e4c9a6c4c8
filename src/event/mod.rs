pub mod input;
mod record;
pub mod store;

pub use record::{parse_timestamp_millis, signature_of, EventRecord, MAIN_AGENT_ID};

use crate::engine::Snapshot;

/// Application events for the terminal observer loop
#[derive(Debug)]
pub enum Event {
    /// Keyboard input
    Key(crossterm::event::KeyEvent),
    /// Terminal size changed
    Resize,
    /// A poll tick finished (boxed to reduce enum size)
    Snapshot(Box<PollOutcome>),
}

/// Result of one poll tick
#[derive(Debug)]
pub enum PollOutcome {
    Ok(Snapshot),
    /// Environmental error that stopped the read
    Failed(String),
}
