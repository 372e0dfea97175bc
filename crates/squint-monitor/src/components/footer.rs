//! Footer component with keyboard shortcuts, status messages and poll health.

use crate::ui::Theme;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use squint_core::Snapshot;

/// Version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP: &str =
    "j/k:nav  space:select  x:cancel  +/-:nice  [/]:throttle  a:attach  p/m/r/u:filter  ?:help  q:quit";

/// Left-hand footer text when something more important than the key help
/// should be shown.
pub struct StatusLine<'a> {
    pub text: &'a str,
    pub is_error: bool,
}

pub struct Footer;

impl Footer {
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        status: Option<StatusLine<'_>>,
        snapshot: &Snapshot,
        theme: &Theme,
    ) {
        let version = format!("v{}", VERSION);
        let health = health_span(snapshot, theme);
        let health_width = health.width() as u16;

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(health_width + 2),
                Constraint::Length(version.len() as u16 + 1),
            ])
            .split(area);

        let left_content = match status {
            Some(status) => Line::from(Span::styled(
                status.text.to_string(),
                Style::default()
                    .fg(if status.is_error {
                        theme.error
                    } else {
                        theme.selected
                    })
                    .add_modifier(Modifier::BOLD),
            )),
            None => Line::from(Span::styled(HELP, Style::default().fg(theme.muted))),
        };
        frame.render_widget(Paragraph::new(left_content), chunks[0]);
        frame.render_widget(Paragraph::new(Line::from(health)), chunks[1]);
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                version,
                Style::default().fg(theme.muted),
            ))),
            chunks[2],
        );
    }
}

/// "updated 12:00:01" when healthy, failure count and age when not.
fn health_span(snapshot: &Snapshot, theme: &Theme) -> Span<'static> {
    if snapshot.poller_stopped {
        return Span::styled(
            "polling stopped, restart squint",
            Style::default().fg(theme.error).add_modifier(Modifier::BOLD),
        );
    }
    let Some(refreshed_at) = snapshot.refreshed_at else {
        return if snapshot.is_stale() {
            Span::styled(
                format!("no data ({} failed polls)", snapshot.consecutive_failures),
                Style::default().fg(theme.error),
            )
        } else {
            Span::styled("waiting for data", Style::default().fg(theme.muted))
        };
    };

    if snapshot.is_stale() {
        let age = (chrono::Local::now() - refreshed_at).num_seconds().max(0) as u64;
        Span::styled(
            format!(
                "stale {} ({} failed polls)",
                squint_parsers::format_duration(age),
                snapshot.consecutive_failures
            ),
            Style::default().fg(theme.error).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled(
            format!("updated {}", refreshed_at.format("%H:%M:%S")),
            Style::default().fg(theme.success),
        )
    }
}
