//! Job table component.

use crate::selection::Selection;
use crate::ui::{Theme, state_color};
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::Span,
    widgets::{Block, Borders, Cell, Row, Table, TableState},
};
use squint_slurm::{Job, JobState};

const HEADERS: [&str; 11] = [
    " ", "JOBID", "ARRAY", "USER", "NAME", "STATE", "PARTITION", "NODES", "CPUS", "GRES", "TIME",
];

pub struct JobTable;

impl JobTable {
    /// Render the jobs at `visible` (indices into `jobs`).
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        jobs: &[Job],
        visible: &[usize],
        cursor: Option<usize>,
        selection: &Selection,
        filter_summary: &str,
        theme: &Theme,
    ) {
        let header = Row::new(HEADERS.iter().map(|h| Cell::from(*h))).style(
            Style::default()
                .fg(theme.foreground)
                .add_modifier(Modifier::BOLD),
        );

        let rows: Vec<Row> = visible
            .iter()
            .filter_map(|&i| jobs.get(i))
            .map(|job| job_row(job, selection.contains(&job.job_id), theme))
            .collect();

        let mut title = format!(" Jobs ({}/{}) ", visible.len(), jobs.len());
        if !filter_summary.is_empty() {
            title = format!("{}[{}] ", title, filter_summary);
        }
        if !selection.is_empty() {
            title = format!("{}{} selected ", title, selection.len());
        }

        let widths = [
            Constraint::Length(1),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Min(12),
            Constraint::Length(13),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(5),
            Constraint::Length(14),
            Constraint::Length(11),
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title))
            .row_highlight_style(
                Style::default()
                    .bg(theme.muted)
                    .add_modifier(Modifier::BOLD),
            );

        let mut table_state = TableState::default();
        table_state.select(cursor);
        frame.render_stateful_widget(table, area, &mut table_state);
    }
}

fn job_row<'a>(job: &'a Job, selected: bool, theme: &Theme) -> Row<'a> {
    let state = job.job_state();
    let mark = if selected {
        Span::styled("●", Style::default().fg(theme.selected))
    } else {
        Span::raw(" ")
    };
    let cpus = job.cpu_count.map(|c| c.to_string()).unwrap_or_default();
    let state_label = match state {
        JobState::Unrecognized => job.state.clone(),
        known => known.label(),
    };

    Row::new(vec![
        Cell::from(mark),
        Cell::from(job.job_id.as_str()),
        Cell::from(job.array_label()),
        Cell::from(job.user.as_str()),
        Cell::from(job.name.as_str()),
        Cell::from(Span::styled(
            state_label,
            Style::default().fg(state_color(state)),
        )),
        Cell::from(job.partition.as_str()),
        Cell::from(job.nodes_label()),
        Cell::from(cpus),
        Cell::from(job.generic_resources.as_str()),
        Cell::from(job.elapsed_time.as_str()),
    ])
}
