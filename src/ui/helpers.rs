//! UI helper functions

use crate::event::parse_timestamp_millis;
use chrono::{Local, TimeZone};
use ratatui::layout::{Constraint, Flex, Layout, Rect};

/// Truncate a string to `max_len` characters with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}

/// Left-align into exactly `width` characters
pub fn fit(s: &str, width: usize) -> String {
    format!("{:<width$}", truncate(s, width))
}

/// Format an event timestamp as local HH:MM:SS, `-` when absent
pub fn format_timestamp(ts: Option<&str>) -> String {
    let Some(raw) = ts.filter(|t| !t.trim().is_empty()) else {
        return "-".to_string();
    };
    match Local.timestamp_millis_opt(parse_timestamp_millis(raw)).single() {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => "??:??:??".to_string(),
    }
}

/// Popup area of `percent_x` by `percent_y` centered in `r`
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let [column] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(r);
    let [popup] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(column);
    popup
}
