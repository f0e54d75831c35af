//! Status view rendering.
//!
//! Shows the latest machine snapshot as a grid of cards. When the latest
//! fetch failed the last snapshot stays on screen with a warning border.

use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::client::PollError;
use crate::data::duration::{format_age, format_interval};
use crate::data::MachineStatus;
use crate::store::StatusView;

/// Render the Status view.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    match app.state.status_view() {
        StatusView::Loading => render_loading(frame, app, area),
        StatusView::Unavailable(err) => render_unavailable(frame, app, err, area),
        StatusView::Live(status) => render_cards(frame, app, status, false, area),
        StatusView::Stale(status, _) => render_cards(frame, app, status, true, area),
    }
}

fn render_loading(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Status ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let lines = vec![
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled(
            format!("Waiting for first status from {}...", app.machine_id),
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    let paragraph = Paragraph::new(lines).alignment(Alignment::Center).block(block);
    frame.render_widget(paragraph, area);
}

fn render_unavailable(frame: &mut Frame, app: &App, err: &PollError, area: Rect) {
    let block = Block::default()
        .title(" Status ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.critical));

    let lines = vec![
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled("No status received", app.theme.alarm_style())),
        Line::from(""),
        Line::from(err.to_string()),
        Line::from(Span::styled(
            format!("Retrying every {}", format_interval(app.status_interval)),
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    frame.render_widget(paragraph, area);
}

fn render_cards(frame: &mut Frame, app: &App, status: &MachineStatus, stale: bool, area: Rect) {
    let rows = Layout::vertical([
        Constraint::Length(5),
        Constraint::Length(5),
        Constraint::Min(4),
    ])
    .split(area);

    let top = Layout::horizontal([Constraint::Fill(1); 4]).split(rows[0]);
    let middle = Layout::horizontal([Constraint::Fill(1); 4]).split(rows[1]);

    let plain = app.theme.value;
    let border = if stale {
        app.theme.warning
    } else {
        app.theme.border
    };

    let cards = [
        (top[0], "Spindle", format!("{:.0}", status.rpm), "rpm", plain),
        (top[1], "Feed", format!("{:.0}", status.feed_rate), "mm/min", plain),
        (
            top[2],
            "Load",
            status.spindle_load_pct.map_or_else(|| "-".to_string(), |l| format!("{:.0}%", l)),
            "spindle",
            load_style(app, status.spindle_load_pct),
        ),
        (
            top[3],
            "Execution",
            status.execution.label().to_string(),
            "",
            app.theme.execution_style(&status.execution).add_modifier(Modifier::BOLD),
        ),
        (middle[0], "Mode", status.mode.label().to_string(), "", plain),
        (
            middle[1],
            "Tool",
            status.tool_id.clone().unwrap_or_else(|| "-".to_string()),
            "",
            plain,
        ),
        (
            middle[2],
            "Parts",
            status.part_count.map_or_else(|| "-".to_string(), |n| n.to_string()),
            "count",
            plain,
        ),
        (
            middle[3],
            "Data age",
            data_age(Utc::now(), status.timestamp_utc),
            "since sample",
            app.theme.health_style(app.state.health).add_modifier(Modifier::BOLD),
        ),
    ];

    for (rect, title, value, unit, style) in cards {
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(value, style)),
            Line::from(Span::styled(unit, Style::default().add_modifier(Modifier::DIM))),
        ];
        let block = Block::default()
            .title(format!(" {} ", title))
            .borders(Borders::ALL)
            .border_type(app.theme.border_type)
            .border_style(Style::default().fg(border));
        frame.render_widget(
            Paragraph::new(lines).alignment(Alignment::Center).block(block),
            rect,
        );
    }

    render_details(frame, app, status, stale, rows[2]);
}

/// Alarm line plus sample metadata.
fn render_details(frame: &mut Frame, app: &App, status: &MachineStatus, stale: bool, area: Rect) {
    let alarm_line = match status.alarm() {
        Some(alarm) => Line::from(vec![
            Span::styled(" ALARM ", app.theme.alarm_style()),
            Span::styled(alarm, app.theme.alarm_style()),
        ]),
        None => Line::from(Span::styled(" No active alarm", Style::default().fg(app.theme.healthy))),
    };

    let mut meta = vec![
        Span::raw(format!(
            " Sampled {} UTC",
            status.timestamp_utc.format("%Y-%m-%d %H:%M:%S")
        )),
        Span::raw(format!(
            " │ server cadence {}",
            format_interval(std::time::Duration::from_millis(status.update_interval_ms))
        )),
    ];
    if let Some(source) = &status.source {
        meta.push(Span::raw(format!(" │ source {}", source)));
    }

    let title = if stale {
        " Details (last known) "
    } else {
        " Details "
    };
    let border = if status.alarm().is_some() {
        app.theme.critical
    } else if stale {
        app.theme.warning
    } else {
        app.theme.border
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(border));

    let lines = vec![
        alarm_line,
        Line::from(Span::styled("", Style::default())),
        Line::from(meta).style(Style::default().add_modifier(Modifier::DIM)),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), area);
}

fn load_style(app: &App, load: Option<f64>) -> Style {
    match load {
        Some(l) if l >= 90.0 => app.theme.alarm_style(),
        Some(l) if l >= 75.0 => Style::default().fg(app.theme.warning).add_modifier(Modifier::BOLD),
        _ => app.theme.value,
    }
}

/// Age of a sample at `now`. Samples from the future show as zero.
fn data_age(now: DateTime<Utc>, sampled_at: DateTime<Utc>) -> String {
    let age = (now - sampled_at).to_std().unwrap_or_default();
    format_age(age)
}
