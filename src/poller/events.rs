//! Events loop: recent event history.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{PollJob, Poller};
use crate::client::TelemetryClient;
use crate::data::MachineId;
use crate::store::EventsUpdate;

/// Poller for recent machine events.
pub type EventsPoller = Poller<EventsJob>;

/// Fetches the latest `limit` events. Never touches connection health.
#[derive(Debug)]
pub struct EventsJob {
    client: Arc<dyn TelemetryClient>,
    machine_id: MachineId,
    limit: NonZeroUsize,
}

impl EventsJob {
    pub fn new(client: Arc<dyn TelemetryClient>, machine_id: MachineId, limit: NonZeroUsize) -> Self {
        Self {
            client,
            machine_id,
            limit,
        }
    }
}

#[async_trait]
impl PollJob for EventsJob {
    type Update = EventsUpdate;

    fn name(&self) -> &'static str {
        "events"
    }

    async fn run(&self) -> EventsUpdate {
        match self.client.fetch_events(&self.machine_id, self.limit).await {
            Ok(events) => {
                debug!(machine = %self.machine_id, count = events.len(), "Events fetched");
                EventsUpdate::Fetched(events)
            }
            Err(err) => {
                warn!(machine = %self.machine_id, kind = err.kind(), error = %err, "Events fetch failed");
                EventsUpdate::Failed(err)
            }
        }
    }
}
