//! Selection state machine
//!
//! One task owns the [`Switcher`] and drives it through subscribe, probe, activate and
//! check. Pool and Current Fastest live in the struct, so nothing here is shared or locked;
//! observers follow progress through the status channel.

mod state;

pub use state::{SelectionState, SwitcherStatus};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::check::ReachabilityCheck;
use crate::models::{FailureKind, FailureOutcome, ProxyDescriptor, ProxyPool};
use crate::probe::LatencyProber;
use crate::sink::ConfigSink;
use crate::subscription::{FetchError, SubscriptionFetcher};

/// Selection loop configuration
#[derive(Debug, Clone)]
pub struct SwitcherConfig {
    /// Subscription URL or single share link
    pub subscribe_url: Option<String>,
    /// Sleep at each sleep point
    pub interval: Duration,
    /// Reachability attempts before the active proxy is rejected
    pub check_attempts: u32,
    /// Consecutive probe failures, or failed check rounds, before eviction
    pub max_consecutive_failures: u32,
}

impl Default for SwitcherConfig {
    fn default() -> Self {
        Self {
            subscribe_url: None,
            interval: Duration::from_secs(10),
            check_attempts: 5,
            max_consecutive_failures: 1,
        }
    }
}

pub struct Switcher {
    config: SwitcherConfig,
    fetcher: SubscriptionFetcher,
    prober: LatencyProber,
    sink: Arc<dyn ConfigSink>,
    checker: Arc<dyn ReachabilityCheck>,
    pool: ProxyPool,
    current: Option<Arc<ProxyDescriptor>>,
    status_tx: watch::Sender<SwitcherStatus>,
}

impl Switcher {
    pub fn new(
        config: SwitcherConfig,
        fetcher: SubscriptionFetcher,
        prober: LatencyProber,
        sink: Arc<dyn ConfigSink>,
        checker: Arc<dyn ReachabilityCheck>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SwitcherStatus::default());
        Self {
            pool: ProxyPool::new(config.max_consecutive_failures),
            config,
            fetcher,
            prober,
            sink,
            checker,
            current: None,
            status_tx,
        }
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    /// Current Fastest proxy, if one is selected
    pub fn current(&self) -> Option<&Arc<ProxyDescriptor>> {
        self.current.as_ref()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SwitcherStatus> {
        self.status_tx.subscribe()
    }

    /// Run the loop until `shutdown` flips to true
    #[instrument(skip(self, shutdown))]
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Switcher started (interval {}s, source {})",
            self.config.interval.as_secs(),
            self.config.subscribe_url.as_deref().unwrap_or("<unset>")
        );

        let mut state = SelectionState::ReadyForSubscribe;
        self.publish(state);

        loop {
            if *shutdown.borrow() {
                break;
            }

            if state.is_sleep_point() {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }
            }

            state = self.step(state).await;
        }

        info!("Switcher shutting down");
    }

    /// Perform one transition out of `state`; sleeping is left to [`Switcher::run`]
    pub async fn step(&mut self, state: SelectionState) -> SelectionState {
        let next = match state {
            SelectionState::ReadyForSubscribe => self.subscribe().await,
            SelectionState::FindFastestProxy => self.find_fastest().await,
            SelectionState::SwitchToFastest => self.switch_to_fastest().await,
            SelectionState::Check => self.check().await,
            SelectionState::SubscriptionNotUpdated
            | SelectionState::Done
            | SelectionState::TemporaryAnomaly
            | SelectionState::Error => SelectionState::ReadyForSubscribe,
        };

        debug!("{} -> {}", state, next);
        self.publish(next);
        next
    }

    async fn subscribe(&mut self) -> SelectionState {
        let Some(url) = self.config.subscribe_url.clone() else {
            error!("No subscription URL configured");
            return SelectionState::Error;
        };

        match self.fetcher.fetch(&url).await {
            Ok(descriptors) => {
                let stats = self.pool.merge(descriptors);
                info!(
                    "Pool updated: {} added, {} replaced, {} total",
                    stats.added,
                    stats.replaced,
                    self.pool.len()
                );
                SelectionState::FindFastestProxy
            }
            Err(FetchError::NotModified) => {
                info!("Subscription not updated");
                SelectionState::SubscriptionNotUpdated
            }
            Err(e) if e.is_configuration_error() => {
                error!(url = %url, "Subscription unusable: {}", e);
                SelectionState::Error
            }
            Err(e) => {
                warn!(url = %url, "Subscription fetch failed, retrying next cycle: {}", e);
                SelectionState::TemporaryAnomaly
            }
        }
    }

    async fn find_fastest(&mut self) -> SelectionState {
        let report = self.prober.probe(self.pool.descriptors()).await;

        for failure in &report.failed {
            let id = failure.descriptor.id();
            match self.pool.record_failure(id, FailureKind::Probe) {
                FailureOutcome::Evicted => {
                    warn!("Evicted {}: {}", failure.descriptor.label(), failure.error);
                    self.clear_current_if(id);
                }
                FailureOutcome::Retained { failures } => {
                    debug!("{} failed ({} in a row): {}", id, failures, failure.error);
                }
                FailureOutcome::Unknown => {}
            }
        }
        for success in &report.ranked {
            self.pool
                .record_success(success.descriptor.id(), FailureKind::Probe);
        }

        match report.winner() {
            Some(winner) => {
                info!(
                    "Fastest proxy: {} ({:.1}ms)",
                    winner.descriptor.label(),
                    winner.latency_ms()
                );
                self.current = Some(winner.descriptor.clone());
                SelectionState::SwitchToFastest
            }
            None if self.current.is_some() => {
                warn!("No reachable proxy, keeping the current one");
                SelectionState::Check
            }
            None => {
                warn!("No reachable proxy in a pool of {}", self.pool.len());
                SelectionState::TemporaryAnomaly
            }
        }
    }

    async fn switch_to_fastest(&mut self) -> SelectionState {
        let Some(current) = self.current.clone() else {
            return SelectionState::FindFastestProxy;
        };

        match self.sink.activate(&current).await {
            Ok(()) => info!("Activated {}", current.label()),
            // The check that follows decides whether the proxy is usable.
            Err(e) => error!("Failed to activate {}: {}", current.label(), e),
        }
        SelectionState::Check
    }

    async fn check(&mut self) -> SelectionState {
        let Some(current) = self.current.clone() else {
            return SelectionState::FindFastestProxy;
        };

        for attempt in 1..=self.config.check_attempts {
            match self.checker.check().await {
                Ok(status) => {
                    info!("{} verified (HTTP {})", current.label(), status);
                    self.pool.record_success(current.id(), FailureKind::Check);
                    return SelectionState::Done;
                }
                Err(e) => warn!(
                    "Check {}/{} through {} failed: {}",
                    attempt,
                    self.config.check_attempts,
                    current.id(),
                    e
                ),
            }
        }

        match self.pool.record_failure(current.id(), FailureKind::Check) {
            FailureOutcome::Evicted => warn!("Removed {} after failed checks", current.label()),
            FailureOutcome::Retained { failures } => warn!(
                "{} failed verification ({} rounds in a row)",
                current.label(),
                failures
            ),
            FailureOutcome::Unknown => {}
        }
        self.current = None;
        SelectionState::FindFastestProxy
    }

    fn clear_current_if(&mut self, id: &str) {
        if self.current.as_ref().is_some_and(|c| c.id() == id) {
            self.current = None;
        }
    }

    fn publish(&self, state: SelectionState) {
        self.status_tx.send_replace(SwitcherStatus {
            state,
            current: self.current.as_ref().map(|c| c.id().to_string()),
            pool_size: self.pool.len(),
            updated_at: Utc::now(),
        });
    }
}

/// Handle to stop a running [`Switcher`]
pub struct SwitcherHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl SwitcherHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for SwitcherHandle {
    fn default() -> Self {
        Self::new().0
    }
}
