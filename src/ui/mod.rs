//! Terminal UI rendering using ratatui.
//!
//! Each view lives in its own submodule with a `render` function. All of
//! them read from [`App::state`](crate::app::App::state) and nothing else.
//!
//! ## Submodules
//!
//! - [`status`]: Status cards for the current machine snapshot
//! - [`event_log`]: Table of recent events, newest first
//! - [`common`]: Header, tabs, error banner, footer and help overlay
//! - [`theme`]: Light/dark theme support with terminal auto-detection
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Header (machine, health, execution)  │
//! ├──────────────────────────────────────┤
//! │ Tabs                                 │
//! ├──────────────────────────────────────┤
//! │ Error banner (only when a loop fails)│
//! ├──────────────────────────────────────┤
//! │                                      │
//! │ status::render | event_log::render   │
//! │                                      │
//! ├──────────────────────────────────────┤
//! │ Footer (cadence, API, keys)          │
//! └──────────────────────────────────────┘
//! ```

pub mod common;
pub mod event_log;
pub mod status;
pub mod theme;

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::Style,
    widgets::Paragraph,
    Frame,
};

pub use theme::Theme;

use crate::app::{App, View};

/// Minimum terminal size for a usable display.
const MIN_WIDTH: u16 = 60;
const MIN_HEIGHT: u16 = 14;

/// Draw one full frame.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = format!(
            "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
            area.width, area.height, MIN_WIDTH, MIN_HEIGHT
        );
        let paragraph = Paragraph::new(msg)
            .alignment(Alignment::Center)
            .style(Style::default().fg(app.theme.warning));
        let centered = Rect::new(0, (area.height / 2).saturating_sub(2), area.width, 5u16.min(area.height));
        frame.render_widget(paragraph, centered);
        return;
    }

    let banner_height = if app.has_error() { 1 } else { 0 };
    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(banner_height),
        Constraint::Min(8),
        Constraint::Length(1),
    ])
    .split(area);

    common::render_header(frame, app, chunks[0]);
    common::render_tabs(frame, app, chunks[1]);
    if app.has_error() {
        common::render_error_banner(frame, app, chunks[2]);
    }

    match app.current_view {
        View::Status => status::render(frame, app, chunks[3]),
        View::Events => event_log::render(frame, app, chunks[3]),
    }

    common::render_status_bar(frame, app, chunks[4]);

    if app.show_help {
        common::render_help(frame, app, area);
    }
}
