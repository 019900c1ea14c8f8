//! Host-side poll loop
//!
//! Runs `fetch_data` on a fixed interval, publishes the result on a watch
//! channel and hands changed tokens/device ids to the persistence hook. A
//! failed cycle keeps the previous snapshot available and only flips the
//! health flag.

use crate::client::WattsonClient;
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::{PersistentState, TokenPersistence, persist_if_changed};
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, MissedTickBehavior, interval};

const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// What subscribers see after each cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorState {
    /// Last good snapshot, kept across failed cycles
    pub data: Option<Snapshot>,
    pub last_update_success: bool,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub total_polls: u64,
    pub failed_polls: u64,
}

/// Single-flight poller for one client
pub struct PollCoordinator<P: TokenPersistence> {
    client: WattsonClient,
    store: P,
    last_persisted: Option<PersistentState>,
    poll_interval: Duration,
    state_tx: watch::Sender<Arc<CoordinatorState>>,
    shutdown_tx: mpsc::UnboundedSender<()>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,
    logger: StructuredLogger,
}

impl<P: TokenPersistence> PollCoordinator<P> {
    /// `last_persisted` is the state the client was warm-started from, if any.
    /// Periods under one second are raised to one second.
    pub fn new(
        client: WattsonClient,
        store: P,
        poll_interval: Duration,
        last_persisted: Option<PersistentState>,
    ) -> Self {
        let (state_tx, _) = watch::channel(Arc::new(CoordinatorState::default()));
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        Self {
            client,
            store,
            last_persisted,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            state_tx,
            shutdown_tx,
            shutdown_rx,
            logger: get_logger("coordinator"),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<CoordinatorState>> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> Arc<CoordinatorState> {
        self.state_tx.borrow().clone()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn client(&self) -> &WattsonClient {
        &self.client
    }

    /// Sender that stops `run` after the current cycle
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<()> {
        self.shutdown_tx.clone()
    }

    /// One poll cycle; returns whether the fetch succeeded
    pub async fn refresh(&mut self) -> bool {
        let result = self.client.fetch_data().await;

        let mut next = (*self.state()).clone();
        next.total_polls = next.total_polls.saturating_add(1);
        let success = match result {
            Ok(snapshot) => {
                next.data = Some(snapshot);
                next.last_update_success = true;
                next.last_error = None;
                next.last_success_at = Some(Utc::now());
                true
            }
            Err(e) => {
                self.logger.error(&format!("Poll cycle failed: {}", e));
                next.last_update_success = false;
                next.last_error = Some(e.to_string());
                next.failed_polls = next.failed_polls.saturating_add(1);
                false
            }
        };
        self.state_tx.send_replace(Arc::new(next));

        // Tokens may have rotated even when the data fetch failed
        let current = PersistentState::capture(&self.client);
        match persist_if_changed(&self.store, &mut self.last_persisted, &current).await {
            Ok(true) => self.logger.debug("Persisted updated tokens and device ids"),
            Ok(false) => {}
            Err(e) => self
                .logger
                .warn(&format!("Failed to persist state: {}", e)),
        }

        success
    }

    /// Poll until a shutdown signal arrives; the first cycle runs immediately
    pub async fn run(&mut self) -> Result<()> {
        self.logger.info(&format!(
            "Polling every {}s",
            self.poll_interval.as_secs()
        ));
        let mut poll_interval = interval(self.poll_interval);
        poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    self.refresh().await;
                }
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }
        Ok(())
    }
}
