//! Color themes.

use ratatui::style::Color;
use squint_slurm::JobState;

pub struct Theme {
    pub background: Color,
    pub foreground: Color,
    pub highlight: Color,
    pub muted: Color,
    pub selected: Color,
    pub success: Color,
    pub error: Color,
    pub warning: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            background: Color::Black,
            foreground: Color::White,
            highlight: Color::Cyan,
            muted: Color::DarkGray,
            selected: Color::Magenta,
            success: Color::Green,
            error: Color::Red,
            warning: Color::Yellow,
        }
    }

    pub fn light() -> Self {
        Self {
            background: Color::White,
            foreground: Color::Black,
            highlight: Color::Blue,
            muted: Color::Gray,
            selected: Color::Magenta,
            success: Color::Green,
            error: Color::Red,
            warning: Color::Yellow,
        }
    }
}

/// Display color for every scheduler state.
pub fn state_color(state: JobState) -> Color {
    match state {
        JobState::Running => Color::Green,
        JobState::Pending => Color::Yellow,
        JobState::Completing | JobState::StageOut => Color::Cyan,
        JobState::Configuring | JobState::Resizing | JobState::Signaling => Color::LightCyan,
        JobState::Completed => Color::Blue,
        JobState::Suspended | JobState::Stopped => Color::Magenta,
        JobState::Requeued
        | JobState::RequeueFed
        | JobState::RequeueHold
        | JobState::ResvDelHold
        | JobState::Preempted => Color::LightYellow,
        JobState::Cancelled | JobState::Revoked | JobState::Deadline => Color::Gray,
        JobState::Failed
        | JobState::BootFail
        | JobState::NodeFail
        | JobState::OutOfMemory
        | JobState::SpecialExit
        | JobState::Timeout => Color::Red,
        JobState::Unrecognized => Color::DarkGray,
    }
}
