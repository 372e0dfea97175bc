//! Modal popups drawn over the job table.

use crate::ui::Theme;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use squint_core::Credentials;

/// Mutation waiting for the user to confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    CancelJobs(Vec<String>),
    CancelAllMine,
    CancelNewest,
    CancelOldest,
}

impl ConfirmAction {
    pub fn prompt(&self) -> String {
        match self {
            Self::CancelJobs(ids) if ids.len() == 1 => format!("Cancel job {}?", ids[0]),
            Self::CancelJobs(ids) => {
                let mut shown = ids.iter().take(8).cloned().collect::<Vec<_>>().join(", ");
                if ids.len() > 8 {
                    shown.push_str(", …");
                }
                format!("Cancel {} jobs ({})?", ids.len(), shown)
            }
            Self::CancelAllMine => "Cancel ALL of your jobs?".to_string(),
            Self::CancelNewest => "Cancel your most recently submitted job?".to_string(),
            Self::CancelOldest => "Cancel your oldest job?".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordField {
    Username,
    #[default]
    Password,
}

/// Username and masked password entry.
#[derive(Debug, Clone, Default)]
pub struct PasswordForm {
    /// Empty means the user from the destination or the environment.
    pub username: String,
    pub password: String,
    pub focus: PasswordField,
    pub error: Option<String>,
}

impl PasswordForm {
    pub fn new(error: Option<String>) -> Self {
        Self {
            error,
            ..Default::default()
        }
    }

    pub fn push(&mut self, c: char) {
        match self.focus {
            PasswordField::Username => self.username.push(c),
            PasswordField::Password => self.password.push(c),
        }
    }

    pub fn pop(&mut self) {
        match self.focus {
            PasswordField::Username => self.username.pop(),
            PasswordField::Password => self.password.pop(),
        };
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            PasswordField::Username => PasswordField::Password,
            PasswordField::Password => PasswordField::Username,
        };
    }

    pub fn credentials(&self) -> Credentials {
        let username = self.username.trim();
        Credentials {
            username: (!username.is_empty()).then(|| username.to_string()),
            password: self.password.clone(),
        }
    }
}

pub enum Popup {
    Connecting,
    Password(PasswordForm),
    Confirm(ConfirmAction),
    /// `fatal` messages end the program when dismissed.
    Message {
        title: String,
        text: String,
        fatal: bool,
    },
    Help,
}

impl Popup {
    pub fn render(&self, frame: &mut Frame, theme: &Theme, remote: Option<&str>) {
        match self {
            Self::Connecting => {
                let target = remote.unwrap_or("local scheduler");
                render_box(
                    frame,
                    centered_rect(40, 5, frame.area()),
                    " Connecting ",
                    vec![Line::from(format!("Connecting to {}…", target))],
                    theme,
                );
            }
            Self::Password(form) => render_password(frame, form, remote, theme),
            Self::Confirm(action) => {
                let lines = vec![
                    Line::from(action.prompt()),
                    Line::from(""),
                    Line::from(Span::styled(
                        "y / Enter: confirm    n / Esc: back",
                        Style::default().fg(theme.muted),
                    )),
                ];
                render_box(frame, centered_rect(60, 7, frame.area()), " Confirm ", lines, theme);
            }
            Self::Message { title, text, fatal } => {
                let hint = if *fatal {
                    "Press any key to exit"
                } else {
                    "Press any key to close"
                };
                let mut lines: Vec<Line> = text.lines().map(|l| Line::from(l.to_string())).collect();
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(hint, Style::default().fg(theme.muted))));
                let height = lines.len() as u16 + 2;
                render_box(
                    frame,
                    centered_rect(60, height, frame.area()),
                    &format!(" {} ", title),
                    lines,
                    theme,
                );
            }
            Self::Help => {
                let lines = HELP_TEXT.lines().map(Line::from).collect::<Vec<_>>();
                let height = lines.len() as u16 + 2;
                render_box(frame, centered_rect(60, height, frame.area()), " Help ", lines, theme);
            }
        }
    }
}

const HELP_TEXT: &str = r#"
  Navigation
  j/k / ↑↓     Move cursor
  g / G        First / last job
  space        Toggle selection

  Actions
  x            Cancel selected (or cursor) jobs
  X            Cancel all of your jobs
  N / O        Cancel your newest / oldest job
  + / -        Nice up / down (pending jobs)
  ] / [        Array throttle up / down (pending arrays)
  a            Attach to a running job
  y            Copy job id

  Filters
  p            All partitions / mine only
  m            My jobs
  r            Running only
  u            GPU jobs
  /            Job name contains…
  n            Node name contains…
  Esc          Clear filters and selection

  ?            This help
  q / Ctrl+C   Quit
"#;

fn render_password(frame: &mut Frame, form: &PasswordForm, remote: Option<&str>, theme: &Theme) {
    let focused = |field: PasswordField| {
        if form.focus == field {
            Style::default()
                .fg(theme.highlight)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.foreground)
        }
    };
    let cursor = |field: PasswordField| if form.focus == field { "▏" } else { "" };

    let mut lines = vec![Line::from(format!(
        "Password login for {}",
        remote.unwrap_or("the cluster")
    ))];
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(theme.error).add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Username: ", focused(PasswordField::Username)),
        Span::raw(if form.username.is_empty() && form.focus != PasswordField::Username {
            "(default)".to_string()
        } else {
            form.username.clone()
        }),
        Span::raw(cursor(PasswordField::Username)),
    ]));
    lines.push(Line::from(vec![
        Span::styled("Password: ", focused(PasswordField::Password)),
        Span::raw("*".repeat(form.password.chars().count())),
        Span::raw(cursor(PasswordField::Password)),
    ]));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab: switch field   Enter: connect   Esc: quit",
        Style::default().fg(theme.muted),
    )));

    let height = lines.len() as u16 + 2;
    render_box(frame, centered_rect(50, height, frame.area()), " Login ", lines, theme);
}

fn render_box(frame: &mut Frame, area: Rect, title: &str, lines: Vec<Line>, theme: &Theme) {
    frame.render_widget(Clear, area);
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .alignment(Alignment::Left)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title.to_string())
                .style(Style::default().bg(theme.background)),
        )
        .style(Style::default().fg(theme.foreground).bg(theme.background));
    frame.render_widget(paragraph, area);
}

/// Horizontally centered by percentage, vertically by row count.
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let height = height.min(area.height);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(area.height.saturating_sub(height) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_edits_focused_field() {
        let mut form = PasswordForm::new(None);
        for c in "pw".chars() {
            form.push(c);
        }
        form.toggle_focus();
        for c in "bob".chars() {
            form.push(c);
        }
        form.pop();
        assert_eq!(form.password, "pw");
        assert_eq!(form.username, "bo");
    }

    #[test]
    fn test_blank_username_means_default() {
        let mut form = PasswordForm::new(Some("wrong password".into()));
        form.username = "  ".into();
        form.password = "secret".into();
        let credentials = form.credentials();
        assert_eq!(credentials.username, None);
        assert_eq!(credentials.password, "secret");
    }

    #[test]
    fn test_confirm_prompts() {
        assert_eq!(
            ConfirmAction::CancelJobs(vec!["12".into()]).prompt(),
            "Cancel job 12?"
        );
        let many: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
        let prompt = ConfirmAction::CancelJobs(many).prompt();
        assert!(prompt.starts_with("Cancel 10 jobs (1, 2"));
        assert!(prompt.ends_with("…)?"));
    }
}
