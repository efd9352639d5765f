//! Control loop driver.
//!
//! Moves through `Bootstrapping -> Running -> Draining -> Stopped`. While
//! running it either polls the store on a fixed interval or consumes a
//! subscription, reopening it whenever the server closes it. Only one
//! reconciliation step is in flight at any time.

use std::sync::Arc;
use std::time::Duration;

use dbconf_ops::DatabaseOps;
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::audit::OperatorAuditLogger;
use crate::error::Result;
use crate::orphan::{OrphanCollector, ProtectedNames};
use crate::reconciler::{Intent, Outcome, Reconciler};
use crate::registrar::{self, Readiness, SchemaRegistrar};
use crate::shutdown::ShutdownListener;
use crate::store::{Event, ResourceStore};

/// How desired state reaches the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// List everything every `interval`.
    Poll { interval: Duration },
    /// Consume change events from a subscription.
    Stream,
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub mode: Mode,
    /// Wait before retrying a failed subscribe or reopening an empty one.
    pub resubscribe_delay: Duration,
    /// Run a full pass before every (re)subscribe.
    pub resync_on_subscribe: bool,
    pub bootstrap_attempts: u32,
    pub bootstrap_delay: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Poll {
                interval: Duration::from_secs(1),
            },
            resubscribe_delay: Duration::from_secs(1),
            resync_on_subscribe: true,
            bootstrap_attempts: registrar::DEFAULT_BOOTSTRAP_ATTEMPTS,
            bootstrap_delay: registrar::DEFAULT_BOOTSTRAP_DELAY,
        }
    }
}

/// Lifecycle state of a [`Driver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Bootstrapping,
    Running,
    Draining,
    Stopped,
}

/// Summary of one full pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Desired records listed.
    pub records: usize,
    pub created: usize,
    pub owner_changed: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub invalid: usize,
    pub failed: usize,
}

impl CycleReport {
    fn new(cycle: u64) -> Self {
        Self {
            cycle,
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::OwnerChanged { .. } => self.owner_changed += 1,
            Outcome::Deleted => self.deleted += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Invalid => self.invalid += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    /// Number of changes applied to the database server.
    pub fn changes(&self) -> usize {
        self.created + self.owner_changed + self.deleted
    }
}

/// Drives reconciliation of one desired-state kind against one server.
pub struct Driver<S, O, R> {
    store: S,
    reconciler: Reconciler<O>,
    registrar: R,
    config: DriverConfig,
    audit: Arc<OperatorAuditLogger>,
    shutdown: ShutdownListener,
    state: watch::Sender<DriverState>,
    /// Passes and events handled so far.
    cycle: u64,
    /// Subscriptions opened so far.
    subscription: u64,
}

impl<S, O, R> Driver<S, O, R>
where
    S: ResourceStore,
    O: DatabaseOps,
    R: SchemaRegistrar,
{
    pub fn new(
        store: S,
        ops: O,
        registrar: R,
        audit: Arc<OperatorAuditLogger>,
        config: DriverConfig,
        shutdown: ShutdownListener,
    ) -> Self {
        let (state, _) = watch::channel(DriverState::Bootstrapping);
        Self {
            store,
            reconciler: Reconciler::new(ops, Arc::clone(&audit)),
            registrar,
            config,
            audit,
            shutdown,
            state,
            cycle: 0,
            subscription: 0,
        }
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<DriverState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: DriverState) {
        debug!(?state, "Driver state changed");
        self.state.send_replace(state);
    }

    /// Run until shutdown is requested.
    ///
    /// Returns `Ok` on cooperative shutdown. Only bootstrap failures are
    /// returned as errors; everything after that is logged and retried.
    pub async fn run(mut self) -> Result<()> {
        let result = self.run_until_drained().await;
        self.set_state(DriverState::Stopped);
        info!(cycles = self.cycle, "Driver stopped");
        result
    }

    async fn run_until_drained(&mut self) -> Result<()> {
        self.set_state(DriverState::Bootstrapping);
        let readiness = registrar::wait_until_ready(
            &self.registrar,
            self.config.bootstrap_attempts,
            self.config.bootstrap_delay,
            &self.shutdown,
        )
        .await?;

        match readiness {
            Readiness::Ready(attempts) => {
                self.audit
                    .bootstrap_completed(self.registrar.schema(), attempts);
            }
            Readiness::Cancelled => {
                info!("Shutdown requested during bootstrap");
                return Ok(());
            }
        }

        self.set_state(DriverState::Running);
        match self.config.mode {
            Mode::Poll { interval } => self.run_poll(interval).await,
            Mode::Stream => self.run_stream().await,
        }
        self.set_state(DriverState::Draining);
        Ok(())
    }

    /// Sleep for `duration`. Returns false if shutdown was requested first.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.shutdown.requested() => false,
        }
    }

    async fn run_poll(&mut self, interval: Duration) {
        info!(?interval, "Polling desired state");
        while !self.shutdown.is_requested() {
            match self.poll_once().await {
                Ok(report) => info!(
                    cycle = report.cycle,
                    records = report.records,
                    created = report.created,
                    owner_changed = report.owner_changed,
                    deleted = report.deleted,
                    invalid = report.invalid,
                    failed = report.failed,
                    "Poll cycle finished"
                ),
                Err(e) => warn!(cycle = self.cycle, "Poll cycle aborted: {}", e),
            }

            if !self.pause(interval).await {
                break;
            }
        }
    }

    async fn run_stream(&mut self) {
        info!("Streaming desired state");
        'subscriptions: while !self.shutdown.is_requested() {
            if self.config.resync_on_subscribe {
                if let Err(e) = self.poll_once().await {
                    warn!(cycle = self.cycle, "Resync before subscribing failed: {}", e);
                }
                if self.shutdown.is_requested() {
                    break;
                }
            }

            let mut events = match self.store.subscribe().await {
                Ok(events) => events,
                Err(e) => {
                    warn!("Subscribe failed: {}", e);
                    if !self.pause(self.config.resubscribe_delay).await {
                        break;
                    }
                    continue;
                }
            };

            self.subscription += 1;
            if self.subscription > 1 {
                self.audit.stream_reconnected(self.subscription);
            }
            info!(subscription = self.subscription, "Subscription opened");

            let mut delivered = 0u64;
            loop {
                let event = tokio::select! {
                    event = events.next() => event,
                    _ = self.shutdown.requested() => break 'subscriptions,
                };

                match event {
                    Some(event) => {
                        delivered += 1;
                        self.dispatch(event).await;
                    }
                    None => {
                        info!(subscription = self.subscription, delivered, "Subscription closed, reopening");
                        break;
                    }
                }
            }

            // A stream that closes straight away must not turn into a busy loop.
            if delivered == 0 && !self.pause(self.config.resubscribe_delay).await {
                break;
            }
        }
    }

    /// One full pass: list, reconcile every record, collect orphans.
    ///
    /// Fails only when the store or the server cannot be listed. Records
    /// that fail validation or reconciliation are counted and skipped.
    pub async fn poll_once(&mut self) -> Result<CycleReport> {
        self.cycle += 1;
        let cycle = self.cycle;
        self.full_pass(cycle)
            .instrument(info_span!("cycle", cycle))
            .await
    }

    async fn full_pass(&self, cycle: u64) -> Result<CycleReport> {
        let records = self.store.list().await?;
        // An unreachable server aborts the pass before any record is tried.
        self.reconciler.observe().await?;
        let mut report = CycleReport::new(cycle);
        report.records = records.len();

        for record in &records {
            let outcome = self.reconciler.reconcile(record, Intent::Present).await;
            report.record(&outcome);
        }

        let protected: ProtectedNames = records.iter().collect();
        for collected in OrphanCollector::collect(&self.reconciler, &protected).await? {
            report.record(&collected.outcome);
        }

        Ok(report)
    }

    /// Apply one subscription event.
    ///
    /// Returns `None` for error events, which are logged and dropped.
    pub async fn dispatch(&mut self, event: Event) -> Option<Outcome> {
        self.cycle += 1;
        let cycle = self.cycle;

        let (record, intent) = match event {
            Event::Added(record) | Event::Modified(record) => (record, Intent::Present),
            Event::Deleted(record) => (record, Intent::Absent),
            Event::Error(e) => {
                warn!(cycle, "Dropping subscription event: {}", e);
                return None;
            }
        };

        debug!(cycle, %record, ?intent, "Dispatching event");
        let outcome = self
            .reconciler
            .reconcile(&record, intent)
            .instrument(info_span!("event", cycle))
            .await;
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_report_counts() {
        let mut report = CycleReport::new(3);
        report.record(&Outcome::Created);
        report.record(&Outcome::OwnerChanged {
            previous: "alice".to_string(),
        });
        report.record(&Outcome::Unchanged);
        report.record(&Outcome::Invalid);
        report.record(&Outcome::Deleted);

        assert_eq!(report.cycle, 3);
        assert_eq!(report.changes(), 3);
        assert_eq!(report.unchanged, 1);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(
            config.mode,
            Mode::Poll {
                interval: Duration::from_secs(1)
            }
        );
        assert!(config.resync_on_subscribe);
        assert_eq!(config.bootstrap_attempts, 10);
        assert_eq!(config.bootstrap_delay, Duration::from_millis(200));
    }
}
