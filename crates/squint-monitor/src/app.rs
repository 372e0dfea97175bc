//! Main TUI application.

use crate::components::{
    ConfirmAction, Footer, Header, JobTable, PasswordForm, Popup, StatusLine,
};
use crate::filter::{FilterScope, JobFilter};
use crate::selection::Selection;
use crate::ui::Theme;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};
use squint_core::{ClusterSession, SessionError, SessionEvent, Snapshot};
use squint_slurm::Job;
use std::time::{Duration, Instant};

/// How long a status message replaces the key help.
const STATUS_TTL: Duration = Duration::from_secs(4);

/// Which substring filter is being typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTarget {
    Name,
    Node,
}

/// Main application state.
pub struct App {
    pub session: ClusterSession,
    pub should_quit: bool,
    pub theme: Theme,
    pub filter: JobFilter,
    selection: Selection,
    snapshot: Snapshot,
    visible: Vec<usize>,
    cursor: usize,
    popup: Option<Popup>,
    input: Option<InputTarget>,
    status_message: Option<(String, bool, Instant)>,
    last_notice: u64,
    pending_attach: Option<Vec<String>>,
    fatal_error: Option<String>,
}

impl App {
    /// Wrap a session and start connecting without credentials.
    pub fn new(mut session: ClusterSession, theme: Theme) -> Self {
        session.connect(None);
        Self {
            session,
            should_quit: false,
            theme,
            filter: JobFilter::default(),
            selection: Selection::default(),
            snapshot: Snapshot::default(),
            visible: Vec::new(),
            cursor: 0,
            popup: Some(Popup::Connecting),
            input: None,
            status_message: None,
            last_notice: 0,
            pending_attach: None,
            fatal_error: None,
        }
    }

    /// Drain session events and pick up a newer snapshot. Call once per frame.
    pub fn on_tick(&mut self) {
        while let Some(event) = self.session.try_recv_event() {
            self.handle_session_event(event);
        }

        let snapshot = self.session.snapshot();
        if let Some(notice) = &snapshot.last_notice {
            if notice.seq > self.last_notice {
                self.last_notice = notice.seq;
                self.set_status(notice.text.clone(), notice.is_error);
            }
        }
        if snapshot.generation != self.snapshot.generation {
            self.snapshot = snapshot;
            self.selection.retain_present(&self.snapshot.jobs);
            self.update_job_list();
        } else {
            // Health fields change without a new generation.
            self.snapshot = snapshot;
        }
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::NeedsPassword => {
                self.popup = Some(Popup::Password(PasswordForm::new(None)));
            }
            SessionEvent::WrongPassword => {
                self.popup = Some(Popup::Password(PasswordForm::new(Some(
                    "Wrong password, try again".to_string(),
                ))));
            }
            SessionEvent::Ready => {
                self.popup = None;
                let name = self
                    .session
                    .info()
                    .and_then(|i| i.cluster_name())
                    .unwrap_or("cluster")
                    .to_string();
                self.set_status(format!("Connected to {}", name), false);
                self.update_job_list();
            }
            SessionEvent::Failed(e) => {
                let text = e.to_string();
                self.fatal_error = Some(text.clone());
                self.popup = Some(Popup::Message {
                    title: "Connection failed".to_string(),
                    text,
                    fatal: true,
                });
            }
        }
    }

    /// Recompute the visible rows, keeping the cursor on the same job.
    pub fn update_job_list(&mut self) {
        let current = self.selected_job().map(|j| j.job_id.clone());

        let (user, partitions) = match self.session.info() {
            Some(info) => (info.current_user.as_str(), info.my_partitions.as_slice()),
            None => ("", &[][..]),
        };
        let scope = FilterScope {
            current_user: user,
            my_partitions: partitions,
        };
        self.visible = self.filter.apply(&self.snapshot.jobs, &scope);

        let jobs = &self.snapshot.jobs;
        if let Some(pos) = current.and_then(|id| {
            self.visible
                .iter()
                .position(|&i| jobs.get(i).is_some_and(|j| j.job_id == id))
        }) {
            self.cursor = pos;
        }
        self.cursor = self.cursor.min(self.visible.len().saturating_sub(1));
    }

    /// Jobs currently shown, in table order.
    pub fn visible_jobs(&self) -> impl Iterator<Item = &Job> {
        self.visible.iter().filter_map(|&i| self.snapshot.jobs.get(i))
    }

    pub fn selected_job(&self) -> Option<&Job> {
        self.visible
            .get(self.cursor)
            .and_then(|&i| self.snapshot.jobs.get(i))
    }

    pub fn popup(&self) -> Option<&Popup> {
        self.popup.as_ref()
    }

    /// Argv of an attach requested since the last call.
    pub fn take_pending_attach(&mut self) -> Option<Vec<String>> {
        self.pending_attach.take()
    }

    /// Set when the session failed for good; reported after the terminal is restored.
    pub fn fatal_error(&self) -> Option<&str> {
        self.fatal_error.as_deref()
    }

    pub fn set_status(&mut self, message: impl Into<String>, is_error: bool) {
        self.status_message = Some((message.into(), is_error, Instant::now()));
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn select_next(&mut self) {
        let len = self.visible.len();
        if len > 0 {
            self.cursor = (self.cursor + 1) % len;
        }
    }

    pub fn select_previous(&mut self) {
        let len = self.visible.len();
        if len > 0 {
            self.cursor = self.cursor.checked_sub(1).unwrap_or(len - 1);
        }
    }

    pub fn select_first(&mut self) {
        self.cursor = 0;
    }

    pub fn select_last(&mut self) {
        self.cursor = self.visible.len().saturating_sub(1);
    }

    fn toggle_selection(&mut self) {
        if let Some(id) = self.selected_job().map(|j| j.job_id.clone()) {
            self.selection.toggle(&id);
            self.select_next();
        }
    }

    fn update_filter(&mut self, change: impl FnOnce(&mut JobFilter)) {
        change(&mut self.filter);
        self.update_job_list();
    }

    fn clear_filters(&mut self) {
        self.filter = JobFilter::default();
        self.selection.clear();
        self.update_job_list();
    }

    /// Explicit selection if any, otherwise the job under the cursor.
    fn cancel_targets(&self) -> Vec<String> {
        if self.selection.is_empty() {
            self.selected_job()
                .map(|j| vec![j.job_id.clone()])
                .unwrap_or_default()
        } else {
            self.selection.ids_in(&self.snapshot.jobs)
        }
    }

    fn confirm(&mut self, action: ConfirmAction) {
        if !self.session.is_ready() {
            self.set_status(SessionError::NotReady.to_string(), true);
            return;
        }
        if matches!(&action, ConfirmAction::CancelJobs(ids) if ids.is_empty()) {
            self.set_status(SessionError::EmptySelection.to_string(), true);
            return;
        }
        self.popup = Some(Popup::Confirm(action));
    }

    fn run_confirmed(&mut self, action: ConfirmAction) {
        tracing::info!("User confirmed {:?}", action);
        let result = match &action {
            ConfirmAction::CancelJobs(ids) => self.session.cancel_jobs(ids.as_slice()),
            ConfirmAction::CancelAllMine => self.session.cancel_my_jobs(),
            ConfirmAction::CancelNewest => self.session.cancel_my_newest_job(),
            ConfirmAction::CancelOldest => self.session.cancel_my_oldest_job(),
        };
        match result {
            Ok(_) => {
                if let ConfirmAction::CancelJobs(ids) = &action {
                    self.selection.clear();
                    self.set_status(format!("Cancelling {} job(s)", ids.len()), false);
                } else {
                    self.set_status("Cancel request queued", false);
                }
            }
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn adjust_nice(&mut self, delta: i32) {
        let Some(job) = self.selected_job().cloned() else {
            return;
        };
        let nice = job.nice.unwrap_or(0).saturating_add(delta);
        match self.session.set_nice(&job, nice) {
            Ok(_) => self.set_status(format!("Job {}: nice → {}", job.job_id, nice), false),
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn adjust_throttle(&mut self, delta: i32) {
        let Some(job) = self.selected_job().cloned() else {
            return;
        };
        let current = job.array_throttle.or(job.array_task_count()).unwrap_or(1);
        let throttle = current.saturating_add_signed(delta).max(1);
        match self.session.set_array_throttle(&job, throttle) {
            Ok(_) => self.set_status(
                format!("Job {}: throttle → {}", job.array_base_id, throttle),
                false,
            ),
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    fn request_attach(&mut self) {
        let Some(job) = self.selected_job().cloned() else {
            return;
        };
        match self.session.attach_command(&job) {
            Ok(argv) => self.pending_attach = Some(argv),
            Err(e) => self.set_status(e.to_string(), true),
        }
    }

    /// Copy the job id under the cursor to the clipboard.
    fn copy_job_id(&mut self) {
        let Some(id) = self.selected_job().map(|j| j.job_id.clone()) else {
            self.set_status("No job selected", true);
            return;
        };
        match arboard::Clipboard::new() {
            Ok(mut clipboard) => match clipboard.set_text(id.clone()) {
                Ok(()) => self.set_status(format!("Copied {}", id), false),
                Err(_) => self.set_status("Failed to copy to clipboard", true),
            },
            Err(_) => self.set_status("Clipboard not available", true),
        }
    }

    /// Handle a key event.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit();
            return;
        }
        if let Some(popup) = self.popup.take() {
            self.handle_popup_key(popup, key);
            return;
        }
        if let Some(target) = self.input {
            self.handle_input_key(target, key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.quit(),
            KeyCode::Char('j') | KeyCode::Down => self.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.select_previous(),
            KeyCode::Char('g') | KeyCode::Home => self.select_first(),
            KeyCode::Char('G') | KeyCode::End => self.select_last(),
            KeyCode::Char(' ') => self.toggle_selection(),
            KeyCode::Char('x') => self.confirm(ConfirmAction::CancelJobs(self.cancel_targets())),
            KeyCode::Char('X') => self.confirm(ConfirmAction::CancelAllMine),
            KeyCode::Char('N') => self.confirm(ConfirmAction::CancelNewest),
            KeyCode::Char('O') => self.confirm(ConfirmAction::CancelOldest),
            KeyCode::Char('+') => self.adjust_nice(1),
            KeyCode::Char('-') => self.adjust_nice(-1),
            KeyCode::Char(']') => self.adjust_throttle(1),
            KeyCode::Char('[') => self.adjust_throttle(-1),
            KeyCode::Char('a') => self.request_attach(),
            KeyCode::Char('y') => self.copy_job_id(),
            KeyCode::Char('p') => self.update_filter(|f| f.all_partitions = !f.all_partitions),
            KeyCode::Char('m') => self.update_filter(|f| f.only_mine = !f.only_mine),
            KeyCode::Char('r') => self.update_filter(|f| f.only_running = !f.only_running),
            KeyCode::Char('u') => self.update_filter(|f| f.only_gpu = !f.only_gpu),
            KeyCode::Char('/') => self.input = Some(InputTarget::Name),
            KeyCode::Char('n') => self.input = Some(InputTarget::Node),
            KeyCode::Esc => self.clear_filters(),
            KeyCode::Char('?') => self.popup = Some(Popup::Help),
            _ => {}
        }
    }

    fn handle_popup_key(&mut self, popup: Popup, key: KeyEvent) {
        match popup {
            Popup::Connecting => {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    self.quit();
                }
                self.popup = Some(Popup::Connecting);
            }
            Popup::Password(mut form) => match key.code {
                KeyCode::Enter => {
                    self.session.connect(Some(form.credentials()));
                    self.popup = Some(Popup::Connecting);
                }
                KeyCode::Esc => self.quit(),
                KeyCode::Tab | KeyCode::BackTab => {
                    form.toggle_focus();
                    self.popup = Some(Popup::Password(form));
                }
                KeyCode::Backspace => {
                    form.pop();
                    self.popup = Some(Popup::Password(form));
                }
                KeyCode::Char(c) => {
                    form.push(c);
                    self.popup = Some(Popup::Password(form));
                }
                _ => self.popup = Some(Popup::Password(form)),
            },
            Popup::Confirm(action) => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.run_confirmed(action),
                KeyCode::Char('n') | KeyCode::Esc => {}
                _ => self.popup = Some(Popup::Confirm(action)),
            },
            Popup::Message { fatal, .. } => {
                if fatal {
                    self.quit();
                }
            }
            Popup::Help => {}
        }
    }

    fn handle_input_key(&mut self, target: InputTarget, key: KeyEvent) {
        let field = match target {
            InputTarget::Name => &mut self.filter.name,
            InputTarget::Node => &mut self.filter.node,
        };
        match key.code {
            KeyCode::Enter => self.input = None,
            KeyCode::Esc => {
                field.clear();
                self.input = None;
            }
            KeyCode::Backspace => {
                field.pop();
            }
            KeyCode::Char(c) => field.push(c),
            _ => {}
        }
        self.update_job_list();
    }

    /// Poll for events and handle them.
    pub fn poll_events(&mut self, timeout: Duration) -> std::io::Result<bool> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                self.handle_key(key);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Render the UI.
    pub fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(5),    // Job table
                Constraint::Length(1), // Footer
            ])
            .split(frame.area());

        let remote = self.session.remote_target();
        Header::render(
            frame,
            chunks[0],
            self.session.info(),
            remote.as_deref(),
            self.snapshot.jobs.len(),
            &self.theme,
        );

        let cursor = (!self.visible.is_empty()).then_some(self.cursor);
        let mut summary = self.filter.summary();
        if let Some(target) = self.input {
            let label = match target {
                InputTarget::Name => "name",
                InputTarget::Node => "node",
            };
            summary = format!("typing {} filter", label);
        }
        JobTable::render(
            frame,
            chunks[1],
            &self.snapshot.jobs,
            &self.visible,
            cursor,
            &self.selection,
            &summary,
            &self.theme,
        );

        let status = self
            .status_message
            .as_ref()
            .filter(|(_, _, at)| at.elapsed() < STATUS_TTL)
            .map(|(text, is_error, _)| StatusLine {
                text,
                is_error: *is_error,
            });
        Footer::render(frame, chunks[2], status, &self.snapshot, &self.theme);

        if let Some(popup) = &self.popup {
            popup.render(frame, &self.theme, remote.as_deref());
        }
    }
}
