use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::{App, View};

/// File written by the in-app export key.
pub const EXPORT_FILE: &str = "cnc_monitor_export.json";

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // Any key closes help
    if app.show_help {
        app.show_help = false;
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),

        KeyCode::Tab => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.prev_view();
            } else {
                app.next_view();
            }
        }
        KeyCode::BackTab => app.prev_view(),
        KeyCode::Char('1') => app.set_view(View::Status),
        KeyCode::Char('2') => app.set_view(View::Events),
        KeyCode::Left | KeyCode::Char('h') => app.prev_view(),
        KeyCode::Right | KeyCode::Char('l') => app.next_view(),

        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::PageUp => app.select_prev_n(10),
        KeyCode::PageDown => app.select_next_n(10),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),

        KeyCode::Char('?') => app.toggle_help(),

        KeyCode::Char('e') => {
            let export_path = PathBuf::from(EXPORT_FILE);
            match app.export_state(&export_path) {
                Ok(()) => {
                    app.set_status_message(format!("Exported to {}", export_path.display()));
                }
                Err(e) => {
                    app.set_status_message(format!("Export failed: {}", e));
                }
            }
        }

        _ => {}
    }
}

/// Handle mouse events
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.select_prev(),
        MouseEventKind::ScrollDown => app.select_next(),

        // Tab bar is the second row; approximate tab positions
        MouseEventKind::Down(MouseButton::Left) if mouse.row == 1 => {
            if mouse.column < 13 {
                app.set_view(View::Status);
            } else if mouse.column < 30 {
                app.set_view(View::Events);
            }
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::machine::fixtures::event_at;
    use crate::settings::{Overrides, Settings};
    use crate::store::{EventsUpdate, StateStore};
    use crate::ui::Theme;
    use chrono::Utc;
    use config::Environment;
    use std::collections::HashMap;

    fn app_with_events(n: usize) -> App {
        let env = Environment::with_prefix("CNC_MONITOR_TEST").source(Some(HashMap::new()));
        let settings = Settings::load_with(None, env, Overrides::default()).unwrap();
        let store = StateStore::new();
        store.writer::<EventsUpdate>().commit(EventsUpdate::Fetched(
            (0..n).map(|i| event_at(Utc::now(), i as f64)).collect(),
        ));
        let mut app = App::with_theme(store.reader(), &settings, Theme::dark());
        app.refresh();
        app
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_quit() {
        let mut app = app_with_events(0);
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.running);
    }

    #[test]
    fn test_view_switching() {
        let mut app = app_with_events(0);
        handle_key_event(&mut app, key(KeyCode::Char('2')));
        assert_eq!(app.current_view, View::Events);
        handle_key_event(&mut app, key(KeyCode::Tab));
        assert_eq!(app.current_view, View::Status);
        handle_key_event(&mut app, key(KeyCode::BackTab));
        assert_eq!(app.current_view, View::Events);
        handle_key_event(&mut app, key(KeyCode::Char('1')));
        assert_eq!(app.current_view, View::Status);
    }

    #[test]
    fn test_help_swallows_next_key() {
        let mut app = app_with_events(0);
        handle_key_event(&mut app, key(KeyCode::Char('?')));
        assert!(app.show_help);

        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.show_help);
        assert!(app.running);
    }

    #[test]
    fn test_event_scrolling() {
        let mut app = app_with_events(25);
        app.set_view(View::Events);

        handle_key_event(&mut app, key(KeyCode::PageDown));
        handle_key_event(&mut app, key(KeyCode::Char('j')));
        assert_eq!(app.selected_event_index, 11);
        handle_key_event(&mut app, key(KeyCode::End));
        assert_eq!(app.selected_event_index, 24);
        handle_key_event(&mut app, key(KeyCode::Home));
        assert_eq!(app.selected_event_index, 0);

        handle_mouse_event(&mut app, mouse(MouseEventKind::ScrollDown, 10, 10));
        handle_mouse_event(&mut app, mouse(MouseEventKind::ScrollDown, 10, 10));
        handle_mouse_event(&mut app, mouse(MouseEventKind::ScrollUp, 10, 10));
        assert_eq!(app.selected_event_index, 1);
    }

    #[test]
    fn test_tab_click() {
        let mut app = app_with_events(0);
        handle_mouse_event(&mut app, mouse(MouseEventKind::Down(MouseButton::Left), 15, 1));
        assert_eq!(app.current_view, View::Events);
        handle_mouse_event(&mut app, mouse(MouseEventKind::Down(MouseButton::Left), 3, 1));
        assert_eq!(app.current_view, View::Status);
    }
}
