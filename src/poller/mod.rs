//! Fixed-interval poll loops.
//!
//! A [`Poller`] repeats one [`PollJob`] on a fixed cadence and commits each
//! outcome to its slice of the store. The same state machine drives both the
//! status loop ([`StatusPoller`]) and the events loop ([`EventsPoller`]).
//!
//! ```text
//!        start()            stop() / drop
//! Idle ──────────▶ Active ──────────────▶ Stopped
//! ```
//!
//! The loop task only keeps time. Each tick spawns an attempt task that
//! awaits the fetch and commits the result, so a slow request never delays
//! the stop signal. After `stop()` the writer is deactivated; attempts still
//! in flight run to completion but their results are discarded.

mod events;
mod status;

pub use events::{EventsJob, EventsPoller};
pub use status::{StatusJob, StatusPoller};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::store::{SliceUpdate, SliceWriter};

/// One fetch-and-classify step of a poll loop.
#[async_trait]
pub trait PollJob: Send + Sync + 'static {
    /// The store update this job produces.
    type Update: SliceUpdate;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Perform one fetch and turn its outcome into an update.
    ///
    /// Failures are part of the update; this never errors.
    async fn run(&self) -> Self::Update;
}

/// What to do when a tick fires while the previous attempt is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the new attempt. Completions arrive in initiation order.
    #[default]
    Skip,
    /// Start it anyway. The last attempt to complete wins, which can
    /// briefly show an older snapshot after a newer one.
    Concurrent,
}

impl std::str::FromStr for OverlapPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(OverlapPolicy::Skip),
            "concurrent" => Ok(OverlapPolicy::Concurrent),
            other => anyhow::bail!("Unknown overlap policy: {} (expected skip or concurrent)", other),
        }
    }
}

/// Scheduling parameters for a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    pub overlap: OverlapPolicy,
}

impl PollerConfig {
    /// `interval` must be non-zero; [`Poller::start`] refuses a zero interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            overlap: OverlapPolicy::default(),
        }
    }

    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }
}

/// Lifecycle state of a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Created, not started.
    Idle,
    /// Loop running.
    Active,
    /// Deactivated; no further store writes.
    Stopped,
}

/// A fixed-interval loop running one [`PollJob`].
pub struct Poller<J: PollJob> {
    job: Arc<J>,
    config: PollerConfig,
    writer: Arc<SliceWriter<J::Update>>,
    state: PollerState,
    stop_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl<J: PollJob> Poller<J> {
    /// Create an idle poller committing to `writer`.
    pub fn new(job: J, config: PollerConfig, writer: SliceWriter<J::Update>) -> Self {
        Self {
            job: Arc::new(job),
            config,
            writer: Arc::new(writer),
            state: PollerState::Idle,
            stop_tx: None,
            handle: None,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    /// Start the loop: one fetch immediately, then one per interval.
    ///
    /// Must be called from within a tokio runtime. Returns `false` (and does
    /// nothing) unless the poller is idle and its interval is non-zero.
    pub fn start(&mut self) -> bool {
        if self.state != PollerState::Idle {
            warn!(
                poller = self.job.name(),
                state = ?self.state,
                "Ignoring start of a poller that is not idle"
            );
            return false;
        }
        if self.config.interval.is_zero() {
            error!(poller = self.job.name(), "Refusing to start with a zero interval");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            self.job.clone(),
            self.writer.clone(),
            self.config,
            stop_rx,
        ));

        info!(
            poller = self.job.name(),
            interval_ms = self.config.interval.as_millis() as u64,
            overlap = ?self.config.overlap,
            "Poller started"
        );

        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);
        self.state = PollerState::Active;
        true
    }

    /// Stop the loop. Idempotent.
    ///
    /// When this returns, no completion (including one already in flight)
    /// will write to the store.
    pub fn stop(&mut self) {
        if self.state == PollerState::Stopped {
            return;
        }

        self.writer.deactivate();

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }

        if self.state == PollerState::Active {
            info!(poller = self.job.name(), "Poller stopped");
        }
        self.state = PollerState::Stopped;
    }
}

impl<J: PollJob> std::fmt::Debug for Poller<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("job", &self.job.name())
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

impl<J: PollJob> Drop for Poller<J> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clears the in-flight flag when an attempt ends, including by panic.
struct InFlightGuard {
    poller: &'static str,
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!(poller = self.poller, "Poll attempt panicked");
        }
        self.flag.store(false, Ordering::Release);
    }
}

async fn run_loop<J: PollJob>(
    job: Arc<J>,
    writer: Arc<SliceWriter<J::Update>>,
    config: PollerConfig,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let in_flight = Arc::new(AtomicBool::new(false));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if config.overlap == OverlapPolicy::Skip
                    && in_flight.swap(true, Ordering::AcqRel)
                {
                    debug!(poller = job.name(), "Previous attempt still pending, skipping tick");
                    continue;
                }

                let job = job.clone();
                let writer = writer.clone();
                let in_flight = in_flight.clone();
                tokio::spawn(async move {
                    let _guard = InFlightGuard {
                        poller: job.name(),
                        flag: in_flight,
                    };
                    debug!(poller = job.name(), "Fetching");
                    let update = job.run().await;
                    if !writer.commit(update) {
                        debug!(
                            poller = job.name(),
                            slice = J::Update::SLICE,
                            "Discarding result that completed after stop"
                        );
                    }
                });
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
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
    use crate::data::{ConnectionHealth, MachineId};
    use crate::store::{StateStore, StatusUpdate};
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    /// Panics on its first run, then reports a transport failure.
    struct FlakyJob {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl PollJob for FlakyJob {
        type Update = StatusUpdate;

        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn run(&self) -> StatusUpdate {
            if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first attempt blows up");
            }
            StatusUpdate::Failed(PollError::transport("refused"))
        }
    }

    fn status_poller(
        client: &Arc<ScriptedClient>,
        store: &StateStore,
        overlap: OverlapPolicy,
    ) -> StatusPoller {
        let job = StatusJob::new(client.clone(), MachineId::new("CNC-SIM-001").unwrap(), 3.0);
        let config = PollerConfig::new(Duration::from_secs(1)).with_overlap(overlap);
        Poller::new(job, config, store.writer())
    }

    async fn wait_for_calls(client: &ScriptedClient, n: usize) {
        while client.status_calls() < n {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_overlap_policy_parse() {
        assert_eq!("skip".parse::<OverlapPolicy>().unwrap(), OverlapPolicy::Skip);
        assert_eq!(" Concurrent ".parse::<OverlapPolicy>().unwrap(), OverlapPolicy::Concurrent);
        assert!("sometimes".parse::<OverlapPolicy>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle() {
        let client = Arc::new(ScriptedClient::new());
        let store = StateStore::new();
        let mut poller = status_poller(&client, &store, OverlapPolicy::Skip);

        assert_eq!(poller.state(), PollerState::Idle);
        assert!(poller.start());
        assert_eq!(poller.state(), PollerState::Active);
        assert!(!poller.start());

        poller.stop();
        assert_eq!(poller.state(), PollerState::Stopped);
        poller.stop();
        assert!(!poller.start());
        assert_eq!(poller.state(), PollerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_immediately_then_on_interval() {
        let client = Arc::new(ScriptedClient::new());
        for _ in 0..3 {
            client.push_status(Ok(status_at(Utc::now(), 1000)));
        }
        let store = StateStore::new();
        let mut poller = status_poller(&client, &store, OverlapPolicy::Skip);

        poller.start();
        wait_for_calls(&client, 1).await;
        assert_eq!(client.status_calls(), 1);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(client.status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_loop() {
        let client = Arc::new(ScriptedClient::new());
        client.push_status(Err(PollError::transport("refused")));
        client.push_status(Ok(status_at(Utc::now(), 1000)));
        let store = StateStore::new();
        let mut reader = store.reader();
        let mut poller = status_poller(&client, &store, OverlapPolicy::Skip);

        poller.start();
        reader.changed().await.unwrap();
        assert_eq!(reader.snapshot().health, ConnectionHealth::Disconnected);

        reader.changed().await.unwrap();
        let state = reader.snapshot();
        assert_eq!(state.health, ConnectionHealth::Connected);
        assert!(state.status_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_policy_drops_ticks_while_pending() {
        let client = Arc::new(ScriptedClient::new());
        let release = client.hold_status();
        let store = StateStore::new();
        let mut reader = store.reader();
        let mut poller = status_poller(&client, &store, OverlapPolicy::Skip);

        poller.start();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(client.status_calls(), 1);

        client.push_status(Ok(status_at(Utc::now(), 1000)));
        release.send(Ok(status_at(Utc::now(), 1000))).unwrap();
        reader.changed().await.unwrap();

        // The next tick after completion fetches again
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(client.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_policy_last_completion_wins() {
        let client = Arc::new(ScriptedClient::new());
        let first = client.hold_status();
        let second = client.hold_status();
        let store = StateStore::new();
        let mut reader = store.reader();
        let mut poller = status_poller(&client, &store, OverlapPolicy::Concurrent);

        poller.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(client.status_calls(), 2);

        let mut older = status_at(Utc::now(), 1000);
        older.rpm = 1.0;
        let mut newer = status_at(Utc::now(), 1000);
        newer.rpm = 2.0;

        // The newer request answers first, the older one last
        second.send(Ok(newer)).unwrap();
        reader.changed().await.unwrap();
        assert_eq!(reader.snapshot().status.unwrap().rpm, 2.0);

        first.send(Ok(older)).unwrap();
        reader.changed().await.unwrap();
        assert_eq!(reader.snapshot().status.unwrap().rpm, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_after_stop_is_discarded() {
        let client = Arc::new(ScriptedClient::new());
        let release = client.hold_status();
        let store = StateStore::new();
        let reader = store.reader();
        let mut poller = status_poller(&client, &store, OverlapPolicy::Skip);

        poller.start();
        wait_for_calls(&client, 1).await;
        let at_stop = store.snapshot();
        poller.stop();

        release.send(Ok(status_at(Utc::now(), 1000))).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(store.snapshot(), at_stop);
        assert!(!reader.has_changed());
        assert_eq!(client.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_refused() {
        let client = Arc::new(ScriptedClient::new());
        let store = StateStore::new();
        let job = StatusJob::new(client.clone(), MachineId::new("CNC-SIM-001").unwrap(), 3.0);
        let mut poller = Poller::new(job, PollerConfig::new(Duration::ZERO), store.writer());

        assert!(!poller.start());
        assert_eq!(poller.state(), PollerState::Idle);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(client.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_attempt_does_not_block_skip_policy() {
        let store = StateStore::new();
        let mut reader = store.reader();
        let job = FlakyJob {
            runs: AtomicUsize::new(0),
        };
        let config = PollerConfig::new(Duration::from_secs(1)).with_overlap(OverlapPolicy::Skip);
        let mut poller = Poller::new(job, config, store.writer());

        poller.start();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(poller.job.runs.load(Ordering::SeqCst), 3);
        assert_eq!(poller.state(), PollerState::Active);
        assert!(reader.has_changed());
        assert!(reader.snapshot().status_error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let client = Arc::new(ScriptedClient::new());
        let store = StateStore::new();
        {
            let mut poller = status_poller(&client, &store, OverlapPolicy::Concurrent);
            poller.start();
            wait_for_calls(&client, 1).await;
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(client.status_calls(), 1);
    }
}
