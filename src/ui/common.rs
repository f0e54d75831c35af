//! Common UI components shared across views.
//!
//! This module contains the header bar, tab bar, error banner, footer and
//! help overlay.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs},
    Frame,
};

use crate::app::{App, View};
use crate::data::duration::format_interval;
use crate::data::ConnectionHealth;

/// Render the header bar with machine identity and connection health.
pub fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let state = &app.state;
    let health_style = app.theme.health_style(state.health);

    let mut spans = vec![
        Span::styled(" ● ", health_style),
        Span::styled("CNC MONITOR ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("│ "),
        Span::styled(
            app.machine_id.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(" │ "),
    ];

    if state.loading && state.status.is_none() {
        spans.push(Span::styled(
            "Connecting...",
            Style::default().add_modifier(Modifier::DIM),
        ));
    } else {
        spans.push(Span::styled(state.health.label().to_uppercase(), health_style));
    }

    if let Some(status) = &state.status {
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(
            status.execution.label().to_string(),
            app.theme.execution_style(&status.execution),
        ));
        if let Some(family) = &status.controller_family {
            spans.push(Span::raw(format!(" │ {}", family)));
        }
        if let Some(alarm) = status.alarm() {
            spans.push(Span::raw(" │ "));
            spans.push(Span::styled(format!("ALARM {}", alarm), app.theme.alarm_style()));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Render the tab bar showing available views.
pub fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let events_title = match app.event_count() {
        0 => " 2:Events ".to_string(),
        n => format!(" 2:Events ({}) ", n),
    };
    let titles: Vec<Line> = vec![Line::from(" 1:Status "), Line::from(events_title)];

    let selected = match app.current_view {
        View::Status => 0,
        View::Events => 1,
    };

    let tabs = Tabs::new(titles)
        .select(selected)
        .style(app.theme.tab_inactive)
        .highlight_style(app.theme.tab_active)
        .divider("|");

    frame.render_widget(tabs, area);
}

/// Render a one-line banner for the latest failure of each loop.
pub fn render_error_banner(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();

    if let Some(err) = &app.state.status_error {
        let prefix = if app.state.status.is_some() {
            " Status (showing last data): "
        } else {
            " Status: "
        };
        spans.push(Span::styled(prefix, app.theme.alarm_style()));
        spans.push(Span::raw(err.to_string()));
    }

    if let Some(err) = &app.state.events_error {
        if !spans.is_empty() {
            spans.push(Span::raw("  │"));
        }
        spans.push(Span::styled(" Events: ", app.theme.alarm_style()));
        spans.push(Span::raw(err.to_string()));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().fg(app.theme.critical));
    frame.render_widget(paragraph, area);
}

/// Render the footer.
///
/// Shows polling cadence, the API endpoint and the controls, or a temporary
/// status message while one is active.
pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(msg) = app.get_status_message() {
        let paragraph =
            Paragraph::new(format!(" {} ", msg)).style(Style::default().fg(app.theme.highlight));
        frame.render_widget(paragraph, area);
        return;
    }

    let controls = match app.current_view {
        View::Status => "Tab:switch e:export ?:help q:quit",
        View::Events => "↑↓:scroll Tab:switch e:export ?:help q:quit",
    };

    let status = format!(
        " {} | status every {}, events every {} | {} | {}",
        app.current_view.label(),
        format_interval(app.status_interval),
        format_interval(app.events_interval),
        app.api_base_url,
        controls,
    );

    let paragraph = Paragraph::new(status).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Render the help overlay as a centered modal.
pub fn render_help(frame: &mut Frame, app: &App, area: Rect) {
    let section = |title: &'static str| {
        Line::from(vec![Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        )])
    };

    let help_text = vec![
        Line::from(vec![Span::styled("Keyboard Shortcuts", app.theme.header)]),
        Line::from(""),
        section(" Views"),
        Line::from("  Tab/S-Tab   Switch views"),
        Line::from("  1 / 2       Status / Events"),
        Line::from(""),
        section(" Events"),
        Line::from("  ↑/↓ j/k     Scroll"),
        Line::from("  PgUp/PgDn   Jump 10 rows"),
        Line::from("  Home/End    Newest/oldest"),
        Line::from(""),
        section(" General"),
        Line::from("  e           Export to JSON"),
        Line::from("  q           Quit"),
        Line::from(""),
        section(" Health"),
        Line::from(vec![
            Span::styled("  connected    ", app.theme.health_style(ConnectionHealth::Connected)),
            Span::raw("fresh data"),
        ]),
        Line::from(vec![
            Span::styled("  unstable     ", app.theme.health_style(ConnectionHealth::Unstable)),
            Span::raw("data is late"),
        ]),
        Line::from(vec![
            Span::styled("  disconnected ", app.theme.health_style(ConnectionHealth::Disconnected)),
            Span::raw("fetch failed"),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.highlight));

    let paragraph = Paragraph::new(help_text).block(block);

    let help_width = 42u16.min(area.width.saturating_sub(4));
    let help_height = 25u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(help_width)) / 2;
    let y = area.y + (area.height.saturating_sub(help_height)) / 2;
    let help_area = Rect::new(x, y, help_width, help_height);

    frame.render_widget(Clear, help_area);
    frame.render_widget(paragraph, help_area);
}
