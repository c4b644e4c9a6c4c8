//! UI rendering for `kd observe`
//!
//! Fixed vertical layout: header with link status, agent table, recent
//! events, lifecycle ticker and a one-line footer.

mod helpers;

use crate::app::{App, LinkStatus, TickerEntry, TICKER_CAPACITY};
use crate::config::colors;
use crate::engine::{AgentState, AgentStatus, Notification};
use crate::event::EventRecord;
use helpers::{centered_rect, fit, format_timestamp, truncate};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    prelude::*,
    style::{Modifier, Style},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame,
};

/// Main render function
pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),                           // Header
            Constraint::Min(6),                              // Agents
            Constraint::Min(6),                              // Recent events
            Constraint::Length(TICKER_CAPACITY as u16 + 2), // Lifecycle ticker
            Constraint::Length(1),                           // Footer
        ])
        .split(f.area());

    render_header(f, chunks[0], app);
    render_agents(f, chunks[1], app);
    render_recent(f, chunks[2], app);
    render_ticker(f, chunks[3], app);
    render_footer(f, chunks[4]);

    if app.show_help {
        render_help(f);
    }
}

fn panel(title: String) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::BORDER))
        .border_type(BorderType::Rounded)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let (status_text, status_color) = match &app.status {
        LinkStatus::Connecting => ("CONNECTING".to_string(), colors::MUTED),
        LinkStatus::Online => ("ONLINE".to_string(), colors::ACTIVE),
        LinkStatus::Offline(error) => (format!("OFFLINE: {error}"), colors::OFFLINE),
    };
    let settings = &app.settings;

    let lines = vec![
        Line::from(vec![
            Span::styled(
                "KD OBSERVER ",
                Style::default().fg(colors::ACCENT).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("[{status_text}]"),
                Style::default().fg(status_color).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(
            format!("events: {}", settings.events_path.display()),
            Style::default().fg(colors::MUTED),
        )),
        Line::from(Span::styled(
            format!(
                "refresh: {}ms | max-events: {} | max-history: {} | total: {}",
                settings.interval_ms,
                settings.max_events,
                settings.max_history,
                app.snapshot.total_events
            ),
            Style::default().fg(colors::MUTED),
        )),
    ];

    let header = Paragraph::new(lines).block(panel(String::new()));
    f.render_widget(header, area);
}

fn agent_style(agent: &AgentState) -> Style {
    let color = match (agent.status, agent.inferred) {
        (AgentStatus::Waiting, _) => colors::WAITING,
        (AgentStatus::Active, true) => colors::INFERRED,
        (AgentStatus::Active, false) => colors::ACTIVE,
    };
    Style::default().fg(color)
}

fn agent_row(agent: &AgentState) -> String {
    let marker = if agent.inferred { "*" } else { " " };
    format!(
        "{marker}{} {} {} {:>5}  {}",
        fit(&agent.agent_name, 20),
        fit(&agent.role, 18),
        fit(agent.last_action.as_deref().unwrap_or("-"), 12),
        agent.total,
        format_timestamp(agent.last_ts.as_deref()),
    )
}

fn render_agents(f: &mut Frame, area: Rect, app: &App) {
    let agents = &app.snapshot.agents;
    let block = panel(format!(" Agents online ({}) ", agents.len()));

    if agents.is_empty() {
        let empty = Paragraph::new("Waiting for events...")
            .style(Style::default().fg(colors::MUTED))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let mut lines = vec![Line::from(Span::styled(
        format!(
            " {} {} {} {:>5}  {}",
            fit("name", 20),
            fit("role", 18),
            fit("action", 12),
            "total",
            "last"
        ),
        Style::default().fg(colors::FG).add_modifier(Modifier::BOLD),
    ))];

    // Header line plus borders
    let rows = usize::from(area.height.saturating_sub(3));
    lines.extend(
        agents
            .iter()
            .take(rows)
            .map(|agent| Line::from(Span::styled(agent_row(agent), agent_style(agent)))),
    );

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn event_row(event: &EventRecord, width: usize) -> String {
    let head = format!(
        "{} {} {} {} ",
        format_timestamp(event.ts.as_deref()),
        fit(event.agent_name(), 16),
        fit(event.action().unwrap_or("-"), 10),
        fit(event.task().unwrap_or("-"), 16),
    );
    let rest = width.saturating_sub(head.chars().count());
    format!("{head}{}", truncate(event.message().unwrap_or("-"), rest))
}

fn render_recent(f: &mut Frame, area: Rect, app: &App) {
    let recent = &app.snapshot.recent;
    let block = panel(format!(" Recent events ({}) ", recent.len()));
    let width = usize::from(area.width.saturating_sub(2));
    let rows = usize::from(area.height.saturating_sub(2));

    let lines: Vec<Line> = recent
        .iter()
        .take(rows)
        .map(|event| {
            let color = if event.synthetic {
                colors::INFERRED
            } else {
                colors::FG
            };
            Line::from(Span::styled(event_row(event, width), Style::default().fg(color)))
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

/// Label, text and color for one ticker entry
fn ticker_parts(notification: &Notification) -> (&'static str, String, Color) {
    match notification {
        Notification::Created {
            name, role, id, inferred, ..
        } => {
            let how = if *inferred { "delegated" } else { "joined" };
            ("+", format!("#{id} {name} ({role}) {how}"), colors::ACTIVE)
        }
        Notification::Closed { key, id } => ("-", format!("#{id} {key} left"), colors::MUTED),
        Notification::Pulse {
            name,
            action,
            task,
            message,
            status,
            id,
            ..
        } => {
            let mut text = format!("#{id} {name} {}", action.as_deref().unwrap_or("-"));
            if let Some(task) = task {
                text.push_str(&format!(" [{task}]"));
            }
            if let Some(message) = message {
                text.push_str(&format!(": {message}"));
            }
            let color = match status {
                AgentStatus::Waiting => colors::WAITING,
                AgentStatus::Active => colors::FG,
            };
            ("~", text, color)
        }
    }
}

fn ticker_line(entry: &TickerEntry, width: usize) -> Line<'static> {
    let (label, text, color) = ticker_parts(&entry.notification);
    let head = format!("{} {label} ", entry.at.format("%H:%M:%S"));
    let rest = width.saturating_sub(head.chars().count());
    Line::from(vec![
        Span::styled(head, Style::default().fg(colors::MUTED)),
        Span::styled(truncate(&text, rest), Style::default().fg(color)),
    ])
}

fn render_ticker(f: &mut Frame, area: Rect, app: &App) {
    let width = usize::from(area.width.saturating_sub(2));
    // Newest at the bottom
    let lines: Vec<Line> = app.ticker.iter().map(|e| ticker_line(e, width)).collect();
    f.render_widget(Paragraph::new(lines).block(panel(" Lifecycle ".to_string())), area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let footer = Paragraph::new(" q/Esc:quit  r:refresh  ?:help  * inferred delegate")
        .style(Style::default().fg(colors::MUTED))
        .alignment(Alignment::Left);
    f.render_widget(footer, area);
}

fn render_help(f: &mut Frame) {
    let area = centered_rect(50, 50, f.area());

    let help_text = r"
  q, Q, Esc   Quit (Esc closes help first)
  Ctrl+C      Quit
  r           Refresh now
  ?           Toggle help

  Colors
  green       Active agent
  blue, *     Delegate inferred from the main agent
  yellow      Waiting, idle or done
";

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(colors::FG))
        .block(
            Block::default()
                .title(" Help ")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(colors::ACCENT))
                .border_type(BorderType::Double)
                .title_bottom(Line::from(" ?:close ").centered())
                .style(Style::default().bg(colors::BG)),
        );

    f.render_widget(Clear, area);
    f.render_widget(help, area);
}
