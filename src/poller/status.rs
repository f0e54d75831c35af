//! Status loop: current machine status and connection health.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use super::{PollJob, Poller};
use crate::client::TelemetryClient;
use crate::data::{ConnectionHealth, MachineId};
use crate::store::StatusUpdate;

/// Poller for the current machine status.
pub type StatusPoller = Poller<StatusJob>;

/// Fetches the machine status and classifies connection health.
#[derive(Debug)]
pub struct StatusJob {
    client: Arc<dyn TelemetryClient>,
    machine_id: MachineId,
    staleness_multiplier: f64,
}

impl StatusJob {
    pub fn new(
        client: Arc<dyn TelemetryClient>,
        machine_id: MachineId,
        staleness_multiplier: f64,
    ) -> Self {
        Self {
            client,
            machine_id,
            staleness_multiplier,
        }
    }
}

#[async_trait]
impl PollJob for StatusJob {
    type Update = StatusUpdate;

    fn name(&self) -> &'static str {
        "status"
    }

    async fn run(&self) -> StatusUpdate {
        match self.client.fetch_status(&self.machine_id).await {
            Ok(status) => {
                // Observed at completion, not at request time
                let health =
                    ConnectionHealth::classify(Utc::now(), &status, self.staleness_multiplier);
                if health == ConnectionHealth::Unstable {
                    warn!(
                        machine = %self.machine_id,
                        timestamp_utc = %status.timestamp_utc,
                        update_interval_ms = status.update_interval_ms,
                        "Status data is stale"
                    );
                }
                StatusUpdate::Fetched { status, health }
            }
            Err(err) => {
                warn!(machine = %self.machine_id, kind = err.kind(), error = %err, "Status fetch failed");
                StatusUpdate::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::ScriptedClient;
    use crate::client::PollError;
    use crate::data::machine::fixtures::status_at;
    use chrono::TimeDelta;

    fn job(client: &Arc<ScriptedClient>) -> StatusJob {
        StatusJob::new(client.clone(), MachineId::new("CNC-SIM-001").unwrap(), 3.0)
    }

    #[tokio::test]
    async fn test_fresh_status_is_connected() {
        let client = Arc::new(ScriptedClient::new());
        client.push_status(Ok(status_at(Utc::now(), 1000)));

        match job(&client).run().await {
            StatusUpdate::Fetched { health, .. } => assert_eq!(health, ConnectionHealth::Connected),
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stale_status_is_unstable() {
        let client = Arc::new(ScriptedClient::new());
        client.push_status(Ok(status_at(Utc::now() - TimeDelta::milliseconds(5000), 1000)));

        match job(&client).run().await {
            StatusUpdate::Fetched { health, .. } => assert_eq!(health, ConnectionHealth::Unstable),
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_becomes_failed_update() {
        let client = Arc::new(ScriptedClient::new());
        client.push_status(Err(PollError::protocol(500, "boom")));

        assert_eq!(
            job(&client).run().await,
            StatusUpdate::Failed(PollError::protocol(500, "boom"))
        );
    }
}
