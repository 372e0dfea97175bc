//! Header component with cluster identity and clock.

use crate::ui::Theme;
use chrono::Local;
use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use squint_core::ClusterInfo;

pub struct Header;

impl Header {
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        info: Option<&ClusterInfo>,
        remote: Option<&str>,
        job_count: usize,
        theme: &Theme,
    ) {
        let datetime = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let separator = Span::styled(" │ ", Style::default().fg(theme.muted));

        let mut spans = vec![Span::styled(
            "squint",
            Style::default()
                .fg(theme.foreground)
                .add_modifier(Modifier::BOLD),
        )];
        match info {
            Some(info) => {
                spans.push(separator.clone());
                spans.push(Span::styled(
                    info.cluster_name().unwrap_or("cluster").to_string(),
                    Style::default().fg(theme.highlight),
                ));
                spans.push(separator.clone());
                spans.push(Span::raw(format!("{} ", info.current_user)));
                spans.push(Span::styled(
                    remote.map_or_else(|| "(local)".to_string(), |r| format!("via {}", r)),
                    Style::default().fg(theme.muted),
                ));
            }
            None => {
                spans.push(separator.clone());
                spans.push(Span::styled("connecting…", Style::default().fg(theme.warning)));
            }
        }
        spans.push(separator);
        spans.push(Span::raw(format!("{} jobs", job_count)));

        let datetime_line = Line::from(Span::styled(datetime, Style::default().fg(theme.warning)))
            .alignment(Alignment::Right);

        let block = Block::default()
            .borders(Borders::ALL)
            .title_top(datetime_line);
        frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }
}
