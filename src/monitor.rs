//! The polling subsystem: one store, two pollers.

use std::sync::Arc;

use tracing::info;

use crate::client::TelemetryClient;
use crate::poller::{EventsJob, EventsPoller, Poller, StatusJob, StatusPoller};
use crate::settings::Settings;
use crate::store::{PresentationState, StateReader, StateStore};

/// A running monitor for one machine.
///
/// Activation creates a fresh [`StateStore`] and starts the status and
/// events loops independently. Deactivation (explicit or on drop) stops both;
/// nothing is written to the store afterwards.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cnc_monitor::{HttpTelemetryClient, Monitor, Settings};
///
/// # tokio_test::block_on(async {
/// let settings = Settings::load(None).unwrap();
/// let client = HttpTelemetryClient::builder()
///     .endpoint(settings.api_base_url.clone())
///     .build()
///     .unwrap();
///
/// let mut monitor = Monitor::activate(Arc::new(client), &settings);
/// let mut reader = monitor.reader();
/// reader.changed().await.unwrap();
/// println!("{:?}", reader.snapshot().health);
/// monitor.deactivate();
/// # });
/// ```
#[derive(Debug)]
pub struct Monitor {
    store: StateStore,
    status: StatusPoller,
    events: EventsPoller,
}

impl Monitor {
    /// Start polling. Must be called from within a tokio runtime.
    pub fn activate(client: Arc<dyn TelemetryClient>, settings: &Settings) -> Self {
        let store = StateStore::new();

        let mut status = Poller::new(
            StatusJob::new(
                client.clone(),
                settings.machine_id.clone(),
                settings.staleness_multiplier,
            ),
            settings.status_poller(),
            store.writer(),
        );
        let mut events = Poller::new(
            EventsJob::new(client.clone(), settings.machine_id.clone(), settings.events_limit),
            settings.events_poller(),
            store.writer(),
        );

        info!(
            machine = %settings.machine_id,
            api = client.description(),
            "Monitor activated"
        );

        status.start();
        events.start();

        Self {
            store,
            status,
            events,
        }
    }

    /// Read-only handle for the renderer.
    pub fn reader(&self) -> StateReader {
        self.store.reader()
    }

    /// Clone of the current presentation state.
    pub fn snapshot(&self) -> PresentationState {
        self.store.snapshot()
    }

    pub fn status_poller(&self) -> &StatusPoller {
        &self.status
    }

    pub fn events_poller(&self) -> &EventsPoller {
        &self.events
    }

    /// Stop both loops. Idempotent.
    pub fn deactivate(&mut self) {
        self.status.stop();
        self.events.stop();
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::ScriptedClient;
    use crate::client::PollError;
    use crate::data::machine::fixtures::{event_at, status_at};
    use crate::data::ConnectionHealth;
    use crate::poller::PollerState;
    use crate::settings::Overrides;
    use crate::store::{EventsView, StatusView};
    use chrono::{TimeDelta, Utc};
    use config::Environment;
    use std::collections::HashMap;
    use std::time::Duration;

    fn settings() -> Settings {
        let env = Environment::with_prefix("CNC_MONITOR_TEST").source(Some(HashMap::new()));
        Settings::load_with(None, env, Overrides::default()).unwrap()
    }

    async fn next_state(reader: &mut StateReader) -> PresentationState {
        reader.changed().await.unwrap();
        reader.snapshot()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fresh_status_is_connected() {
        let client = Arc::new(ScriptedClient::new());
        client.push_status(Ok(status_at(Utc::now(), 1000)));
        let monitor = Monitor::activate(client.clone(), &settings());
        let mut reader = monitor.reader();

        let state = next_state(&mut reader).await;
        assert_eq!(state.health, ConnectionHealth::Connected);
        assert!(state.status_error.is_none());
        assert!(!state.loading);
        assert!(matches!(state.status_view(), StatusView::Live(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_status_is_unstable() {
        let client = Arc::new(ScriptedClient::new());
        client.push_status(Ok(status_at(Utc::now() - TimeDelta::milliseconds(5000), 1000)));
        let monitor = Monitor::activate(client.clone(), &settings());
        let mut reader = monitor.reader();

        let state = next_state(&mut reader).await;
        assert_eq!(state.health, ConnectionHealth::Unstable);
        assert!(state.status.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_keeps_previous_status() {
        let client = Arc::new(ScriptedClient::new());
        client.push_status(Ok(status_at(Utc::now(), 1000)));
        client.push_status(Err(PollError::transport("connection reset")));
        let monitor = Monitor::activate(client.clone(), &settings());
        let mut reader = monitor.reader();

        let first = next_state(&mut reader).await;
        let second = next_state(&mut reader).await;

        assert_eq!(second.status, first.status);
        assert_eq!(second.status_error, Some(PollError::transport("connection reset")));
        assert_eq!(second.health, ConnectionHealth::Disconnected);
        assert!(matches!(second.status_view(), StatusView::Stale(_, _)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_events_replace_previous_sequence() {
        let client = Arc::new(ScriptedClient::new());
        client.push_events(Ok(vec![event_at(Utc::now(), 1500.0), event_at(Utc::now(), 1400.0)]));
        client.push_events(Ok(Vec::new()));
        let monitor = Monitor::activate(client.clone(), &settings());
        let mut reader = monitor.reader();

        let first = next_state(&mut reader).await;
        assert_eq!(first.events.as_ref().map(Vec::len), Some(2));

        let second = next_state(&mut reader).await;
        assert_eq!(second.events, Some(Vec::new()));
        assert!(second.events_error.is_none());
        assert_eq!(second.events_view(), EventsView::Live(&[]));
        assert_eq!(client.last_limit(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_failure_leaves_status_alone() {
        let client = Arc::new(ScriptedClient::new());
        let release_status = client.hold_status();
        client.push_events(Err(PollError::protocol(500, "database unavailable")));
        let monitor = Monitor::activate(client.clone(), &settings());
        let mut reader = monitor.reader();

        let state = next_state(&mut reader).await;
        assert!(matches!(state.events_view(), EventsView::Unavailable(_)));
        assert!(state.status.is_none());
        assert!(state.status_error.is_none());
        assert!(state.loading);

        release_status.send(Ok(status_at(Utc::now(), 1000))).unwrap();
        let state = next_state(&mut reader).await;
        assert_eq!(state.health, ConnectionHealth::Connected);
        assert_eq!(
            state.events_error,
            Some(PollError::protocol(500, "database unavailable"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_with_fetch_in_flight() {
        let client = Arc::new(ScriptedClient::new());
        let release = client.hold_status();
        let mut monitor = Monitor::activate(client.clone(), &settings());
        let reader = monitor.reader();

        while client.status_calls() == 0 {
            tokio::task::yield_now().await;
        }
        let at_deactivation = monitor.snapshot();
        monitor.deactivate();
        assert_eq!(monitor.status_poller().state(), PollerState::Stopped);
        assert_eq!(monitor.events_poller().state(), PollerState::Stopped);

        release.send(Ok(status_at(Utc::now(), 1000))).unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(monitor.snapshot(), at_deactivation);
        assert!(!reader.has_changed());
    }
}
