use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders};

use crate::engine::TaskState;

// ── Colour constants ──────────────────────────────────────────────────
pub const COLOR_OK: Color = Color::Green;
pub const COLOR_FAIL: Color = Color::Red;
pub const COLOR_RUNNING: Color = Color::Yellow;
pub const COLOR_PENDING: Color = Color::DarkGray;
pub const COLOR_SELECTED_BG: Color = Color::DarkGray;

// ── Helpers ───────────────────────────────────────────────────────────

pub fn task_state_color(state: TaskState) -> Color {
    match state {
        TaskState::Succeeded => COLOR_OK,
        TaskState::Failed | TaskState::TimedOut => COLOR_FAIL,
        TaskState::Running => COLOR_RUNNING,
        TaskState::Queued => COLOR_PENDING,
    }
}

pub fn make_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(style)
}
