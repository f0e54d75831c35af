//! Application state and navigation logic.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::json;

use crate::data::{MachineEvent, MachineId};
use crate::settings::Settings;
use crate::store::{PresentationState, StateReader};
use crate::ui::Theme;

/// How long a status message stays in the footer.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// The current view/tab in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Live status cards for the machine.
    Status,
    /// Recent events, newest first.
    Events,
}

impl View {
    pub fn next(self) -> Self {
        match self {
            View::Status => View::Events,
            View::Events => View::Status,
        }
    }

    // Two views, so prev and next coincide
    pub fn prev(self) -> Self {
        self.next()
    }

    pub fn label(&self) -> &'static str {
        match self {
            View::Status => "Status",
            View::Events => "Events",
        }
    }
}

/// Main application state.
///
/// The app never writes to the store; it only keeps the latest snapshot
/// pulled through its [`StateReader`].
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,

    reader: StateReader,
    pub state: PresentationState,

    // Shown in header and footer
    pub machine_id: MachineId,
    pub api_base_url: String,
    pub status_interval: Duration,
    pub events_interval: Duration,

    pub selected_event_index: usize,
    pub theme: Theme,
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create an app reading from `reader`, detecting the terminal theme.
    pub fn new(reader: StateReader, settings: &Settings) -> Self {
        Self::with_theme(reader, settings, Theme::auto_detect())
    }

    pub fn with_theme(mut reader: StateReader, settings: &Settings, theme: Theme) -> Self {
        let state = reader.snapshot();
        Self {
            running: true,
            current_view: View::Status,
            show_help: false,
            reader,
            state,
            machine_id: settings.machine_id.clone(),
            api_base_url: settings.api_base_url.clone(),
            status_interval: settings.status_interval,
            events_interval: settings.events_interval,
            selected_event_index: 0,
            theme,
            status_message: None,
        }
    }

    /// Pull the latest state from the store.
    ///
    /// Returns true if the state changed since the last refresh.
    pub fn refresh(&mut self) -> bool {
        let Some(state) = self.reader.poll() else {
            return false;
        };
        self.state = state;

        let count = self.event_count();
        if self.selected_event_index >= count {
            self.selected_event_index = count.saturating_sub(1);
        }
        true
    }

    /// Events in the order the server delivered them (newest first).
    pub fn events(&self) -> &[MachineEvent] {
        self.state.events.as_deref().unwrap_or_default()
    }

    pub fn event_count(&self) -> usize {
        self.state.events.as_ref().map_or(0, Vec::len)
    }

    /// True if either loop's latest attempt failed.
    pub fn has_error(&self) -> bool {
        self.state.status_error.is_some() || self.state.events_error.is_some()
    }

    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// The current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        match &self.status_message {
            Some((msg, time)) if time.elapsed() < STATUS_MESSAGE_TTL => Some(msg),
            _ => None,
        }
    }

    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
    }

    pub fn prev_view(&mut self) {
        self.current_view = self.current_view.prev();
    }

    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
    }

    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    /// Move event selection down by n rows. Only the events view has a selection.
    pub fn select_next_n(&mut self, n: usize) {
        if self.current_view == View::Events {
            let max = self.event_count().saturating_sub(1);
            self.selected_event_index = (self.selected_event_index + n).min(max);
        }
    }

    pub fn select_prev_n(&mut self, n: usize) {
        if self.current_view == View::Events {
            self.selected_event_index = self.selected_event_index.saturating_sub(n);
        }
    }

    pub fn select_first(&mut self) {
        if self.current_view == View::Events {
            self.selected_event_index = 0;
        }
    }

    pub fn select_last(&mut self) {
        if self.current_view == View::Events {
            self.selected_event_index = self.event_count().saturating_sub(1);
        }
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Export the current presentation state to a JSON file.
    pub fn export_state(&self, path: &Path) -> Result<()> {
        write_export(path, &self.machine_id, &self.state)
    }
}

/// Build the JSON document written by exports.
pub fn export_document(machine_id: &MachineId, state: &PresentationState) -> serde_json::Value {
    json!({
        "machine_id": machine_id,
        "exported_at": Utc::now(),
        "health": state.health,
        "loading": state.loading,
        "status": state.status,
        "status_error": state.status_error,
        "events": state.events,
        "events_error": state.events_error,
    })
}

/// Write an export document to `path`.
pub fn write_export(path: &Path, machine_id: &MachineId, state: &PresentationState) -> Result<()> {
    let json = serde_json::to_string_pretty(&export_document(machine_id, state))?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PollError;
    use crate::data::machine::fixtures::{event_at, status_at};
    use crate::data::ConnectionHealth;
    use crate::settings::Overrides;
    use crate::store::{EventsUpdate, StateStore, StatusUpdate};
    use chrono::TimeDelta;
    use config::Environment;
    use std::collections::HashMap;

    fn settings() -> Settings {
        let env = Environment::with_prefix("CNC_MONITOR_TEST").source(Some(HashMap::new()));
        Settings::load_with(None, env, Overrides::default()).unwrap()
    }

    fn app(store: &StateStore) -> App {
        App::with_theme(store.reader(), &settings(), Theme::dark())
    }

    #[test]
    fn test_starts_on_status_view_loading() {
        let store = StateStore::new();
        let app = app(&store);
        assert_eq!(app.current_view, View::Status);
        assert!(app.state.loading);
        assert!(!app.has_error());
        assert_eq!(app.machine_id.as_str(), "CNC-SIM-001");
    }

    #[test]
    fn test_refresh_picks_up_commits() {
        let store = StateStore::new();
        let mut app = app(&store);
        assert!(!app.refresh());

        store.writer::<StatusUpdate>().commit(StatusUpdate::Fetched {
            status: status_at(Utc::now(), 1000),
            health: ConnectionHealth::Connected,
        });

        assert!(app.refresh());
        assert_eq!(app.state.health, ConnectionHealth::Connected);
        assert!(!app.refresh());
    }

    #[test]
    fn test_events_keep_server_order() {
        let store = StateStore::new();
        let now = Utc::now();
        store.writer::<EventsUpdate>().commit(EventsUpdate::Fetched(vec![
            event_at(now - TimeDelta::seconds(20), 100.0),
            event_at(now, 300.0),
            event_at(now - TimeDelta::seconds(10), 200.0),
        ]));
        let mut app = app(&store);
        app.refresh();

        let rpms: Vec<f64> = app.events().iter().map(|e| e.rpm).collect();
        assert_eq!(rpms, vec![100.0, 300.0, 200.0]);
    }

    #[test]
    fn test_events_empty_before_first_fetch() {
        let store = StateStore::new();
        let app = app(&store);
        assert!(app.events().is_empty());
    }

    #[test]
    fn test_selection_clamped_when_events_shrink() {
        let store = StateStore::new();
        let writer = store.writer::<EventsUpdate>();
        writer.commit(EventsUpdate::Fetched(
            (0..5).map(|i| event_at(Utc::now(), i as f64)).collect(),
        ));
        let mut app = app(&store);
        app.set_view(View::Events);
        app.select_last();
        assert_eq!(app.selected_event_index, 4);

        writer.commit(EventsUpdate::Fetched(vec![event_at(Utc::now(), 1.0)]));
        app.refresh();
        assert_eq!(app.selected_event_index, 0);
    }

    #[test]
    fn test_navigation() {
        let store = StateStore::new();
        store.writer::<EventsUpdate>().commit(EventsUpdate::Fetched(
            (0..30).map(|i| event_at(Utc::now(), i as f64)).collect(),
        ));
        let mut app = app(&store);

        // Selection only moves on the events view
        app.select_next();
        assert_eq!(app.selected_event_index, 0);

        app.next_view();
        assert_eq!(app.current_view, View::Events);
        app.select_next_n(10);
        app.select_next();
        assert_eq!(app.selected_event_index, 11);
        app.select_prev_n(20);
        assert_eq!(app.selected_event_index, 0);
        app.select_next_n(100);
        assert_eq!(app.selected_event_index, 29);

        app.prev_view();
        assert_eq!(app.current_view, View::Status);
    }

    #[test]
    fn test_status_message_expires() {
        let store = StateStore::new();
        let mut app = app(&store);
        app.set_status_message("Exported".to_string());
        assert_eq!(app.get_status_message(), Some("Exported"));

        app.status_message = Some(("old".to_string(), Instant::now() - Duration::from_secs(5)));
        assert_eq!(app.get_status_message(), None);
    }

    #[test]
    fn test_export_state() {
        let store = StateStore::new();
        store.writer::<StatusUpdate>().commit(StatusUpdate::Failed(PollError::transport(
            "connection refused",
        )));
        let mut app = app(&store);
        app.refresh();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        app.export_state(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["machine_id"], "CNC-SIM-001");
        assert_eq!(value["health"], "disconnected");
        assert_eq!(value["loading"], false);
        assert!(value["status"].is_null());
        assert_eq!(value["status_error"]["kind"], "transport-failure");
    }
}
