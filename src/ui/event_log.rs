//! Events view rendering.

use ratatui::{
    layout::{Alignment, Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_interval;
use crate::data::MachineEvent;
use crate::store::EventsView;

/// Render the Events view in server order (newest first).
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    match app.state.events_view() {
        EventsView::Loading => render_message(
            frame,
            app,
            area,
            Span::styled("Loading events...", Style::default().add_modifier(Modifier::DIM)),
            app.theme.border,
        ),
        EventsView::Unavailable(err) => render_message(
            frame,
            app,
            area,
            Span::styled(format!("No events received: {}", err), app.theme.alarm_style()),
            app.theme.critical,
        ),
        EventsView::Live([]) | EventsView::Stale([], _) => render_message(
            frame,
            app,
            area,
            Span::styled("No events recorded", Style::default().add_modifier(Modifier::DIM)),
            app.theme.border,
        ),
        EventsView::Live(_) => render_table(frame, app, false, area),
        EventsView::Stale(_, _) => render_table(frame, app, true, area),
    }
}

fn render_table(frame: &mut Frame, app: &App, stale: bool, area: Rect) {
    let events = app.events();

    let header = Row::new(vec![
        Cell::from("Time (UTC)"),
        Cell::from("Execution"),
        Cell::from("Mode"),
        Cell::from("RPM"),
        Cell::from("Feed"),
        Cell::from("Load"),
        Cell::from("Tool"),
        Cell::from("Alarm"),
    ])
    .height(1)
    .style(app.theme.header);

    let rows: Vec<Row> = events.iter().map(|e| event_row(app, e)).collect();

    let widths = [
        Constraint::Length(10),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(5),
        Constraint::Fill(1),
        Constraint::Fill(2),
    ];

    let selected = app.selected_event_index.min(events.len().saturating_sub(1));
    let title = format!(
        " Events{} [{}/{}] refresh {} ",
        if stale { " (last known)" } else { "" },
        selected + 1,
        events.len(),
        format_interval(app.events_interval),
    );
    let border = if stale {
        app.theme.warning
    } else {
        app.theme.border
    };

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(app.theme.border_type)
                .border_style(Style::default().fg(border)),
        )
        .row_highlight_style(app.theme.selected)
        .highlight_symbol("▶ ");

    let mut state = TableState::default();
    state.select(Some(selected));

    frame.render_stateful_widget(table, area, &mut state);
}

fn event_row<'a>(app: &App, event: &'a MachineEvent) -> Row<'a> {
    let alarm = event.alarm();
    let row = Row::new(vec![
        Cell::from(event.timestamp_utc.format("%H:%M:%S").to_string()),
        Cell::from(event.execution.label()).style(app.theme.execution_style(&event.execution)),
        Cell::from(event.mode.as_ref().map_or("-", |m| m.label())),
        Cell::from(format!("{:.0}", event.rpm)),
        Cell::from(format!("{:.0}", event.feed_rate)),
        Cell::from(
            event
                .spindle_load_pct
                .map_or_else(|| "-".to_string(), |l| format!("{:.0}%", l)),
        ),
        Cell::from(event.tool_id.as_deref().unwrap_or("-")),
        Cell::from(alarm.clone().unwrap_or_default()).style(app.theme.alarm_style()),
    ]);

    if alarm.is_some() {
        row.style(Style::default().fg(app.theme.critical))
    } else {
        row
    }
}

fn render_message(
    frame: &mut Frame,
    app: &App,
    area: Rect,
    message: Span<'_>,
    border: ratatui::style::Color,
) {
    let block = Block::default()
        .title(" Events ")
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(border));

    let lines = vec![Line::from(""), Line::from(""), Line::from(message)];
    let paragraph = Paragraph::new(lines).alignment(Alignment::Center).block(block);
    frame.render_widget(paragraph, area);
}
