//! Presentation state shared between the pollers and the renderer.
//!
//! The store is a `tokio::sync::watch` channel holding one
//! [`PresentationState`]. Writers apply whole updates under the channel's
//! lock, so a reader always sees a complete state and never a half-applied
//! one.
//!
//! ```text
//! StatusPoller ──StatusUpdate──▶ SliceWriter ─┐
//!                                             ├──▶ watch<PresentationState> ──▶ StateReader (UI)
//! EventsPoller ──EventsUpdate──▶ SliceWriter ─┘
//! ```
//!
//! Each poller owns a [`SliceWriter`] typed by its update kind. A status
//! update cannot touch event fields and vice versa.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::client::PollError;
use crate::data::{ConnectionHealth, MachineEvent, MachineStatus};

/// Everything the renderer reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationState {
    /// Last successfully fetched status. Kept on failure.
    pub status: Option<MachineStatus>,
    /// Outcome of the latest status attempt, if it failed.
    pub status_error: Option<PollError>,
    pub health: ConnectionHealth,
    /// Last successfully fetched events, newest first. Kept on failure.
    pub events: Option<Vec<MachineEvent>>,
    /// Outcome of the latest events attempt, if it failed.
    pub events_error: Option<PollError>,
    /// True until the status loop has produced its first outcome.
    pub loading: bool,
}

impl Default for PresentationState {
    fn default() -> Self {
        Self {
            status: None,
            status_error: None,
            health: ConnectionHealth::Disconnected,
            events: None,
            events_error: None,
            loading: true,
        }
    }
}

/// What the status area should show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatusView<'a> {
    /// Nothing has arrived yet.
    Loading,
    /// The latest attempt failed and no data has ever arrived.
    Unavailable(&'a PollError),
    Live(&'a MachineStatus),
    /// Showing old data because the latest attempt failed.
    Stale(&'a MachineStatus, &'a PollError),
}

/// What the events area should show.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventsView<'a> {
    Loading,
    Unavailable(&'a PollError),
    Live(&'a [MachineEvent]),
    Stale(&'a [MachineEvent], &'a PollError),
}

impl PresentationState {
    pub fn status_view(&self) -> StatusView<'_> {
        match (&self.status, &self.status_error) {
            (Some(status), Some(err)) => StatusView::Stale(status, err),
            (Some(status), None) => StatusView::Live(status),
            (None, Some(err)) => StatusView::Unavailable(err),
            (None, None) => StatusView::Loading,
        }
    }

    pub fn events_view(&self) -> EventsView<'_> {
        match (&self.events, &self.events_error) {
            (Some(events), Some(err)) => EventsView::Stale(events, err),
            (Some(events), None) => EventsView::Live(events),
            (None, Some(err)) => EventsView::Unavailable(err),
            (None, None) => EventsView::Loading,
        }
    }
}

/// An update that touches only the fields owned by one poller.
pub trait SliceUpdate: Send + 'static {
    /// Name of the owning slice, for logs.
    const SLICE: &'static str;

    fn apply(self, state: &mut PresentationState);
}

/// Outcome of one status fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Fetched {
        status: MachineStatus,
        health: ConnectionHealth,
    },
    Failed(PollError),
}

impl SliceUpdate for StatusUpdate {
    const SLICE: &'static str = "status";

    fn apply(self, state: &mut PresentationState) {
        match self {
            StatusUpdate::Fetched { status, health } => {
                state.status = Some(status);
                state.status_error = None;
                state.health = health;
            }
            StatusUpdate::Failed(err) => {
                // Previous status stays visible
                state.status_error = Some(err);
                state.health = ConnectionHealth::Disconnected;
            }
        }
        state.loading = false;
    }
}

/// Outcome of one events fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum EventsUpdate {
    Fetched(Vec<MachineEvent>),
    Failed(PollError),
}

impl SliceUpdate for EventsUpdate {
    const SLICE: &'static str = "events";

    fn apply(self, state: &mut PresentationState) {
        match self {
            EventsUpdate::Fetched(events) => {
                state.events = Some(events);
                state.events_error = None;
            }
            EventsUpdate::Failed(err) => {
                state.events_error = Some(err);
            }
        }
    }
}

/// Owner of the presentation state.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Debug, Clone)]
pub struct StateStore {
    tx: Arc<watch::Sender<PresentationState>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Create a store holding the initial (loading) state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PresentationState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Create a read-only handle for the renderer.
    pub fn reader(&self) -> StateReader {
        StateReader {
            rx: self.tx.subscribe(),
        }
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> PresentationState {
        self.tx.borrow().clone()
    }

    /// Create an active writer for one slice.
    pub fn writer<U: SliceUpdate>(&self) -> SliceWriter<U> {
        SliceWriter {
            tx: self.tx.clone(),
            active: Arc::new(AtomicBool::new(true)),
            _update: PhantomData,
        }
    }
}

/// Read-only view of the store.
#[derive(Debug, Clone)]
pub struct StateReader {
    rx: watch::Receiver<PresentationState>,
}

impl StateReader {
    /// Returns the latest state if it changed since the last call.
    ///
    /// Non-blocking; intended for the render loop.
    pub fn poll(&mut self) -> Option<PresentationState> {
        if self.rx.has_changed().unwrap_or(false) {
            Some(self.rx.borrow_and_update().clone())
        } else {
            None
        }
    }

    /// Clone of the current state, marking it seen.
    pub fn snapshot(&mut self) -> PresentationState {
        self.rx.borrow_and_update().clone()
    }

    /// True if a write happened since the state was last seen.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next write.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }
}

/// Write handle for one slice of the state.
///
/// The activation flag is only flipped while holding the channel's write
/// lock, so once [`SliceWriter::deactivate`] returns no later
/// [`SliceWriter::commit`] can modify the state.
#[derive(Debug)]
pub struct SliceWriter<U> {
    tx: Arc<watch::Sender<PresentationState>>,
    active: Arc<AtomicBool>,
    _update: PhantomData<fn(U)>,
}

impl<U: SliceUpdate> SliceWriter<U> {
    /// Apply an update. Returns `false` if the writer was deactivated.
    pub fn commit(&self, update: U) -> bool {
        let active = &self.active;
        self.tx.send_if_modified(move |state| {
            if !active.load(Ordering::Acquire) {
                return false;
            }
            update.apply(state);
            true
        })
    }

    /// Permanently disable this writer.
    pub fn deactivate(&self) {
        let active = &self.active;
        self.tx.send_if_modified(|_| {
            active.store(false, Ordering::Release);
            false
        });
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
