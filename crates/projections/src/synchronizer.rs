//! Projection synchronizer: feeds events from the store to projections.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use common::AggregateId;
use event_store::{EventEnvelope, EventStore, RecordedEvent, Version};
use tokio::sync::{Mutex, Notify, watch};
use tokio::time::MissedTickBehavior;

use crate::Result;
use crate::projection::{Outcome, Projection, ProjectionPosition};

/// Tuning for the background loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynchronizerConfig {
    /// Maximum number of events read from the store per request.
    pub batch_size: usize,

    /// Upper bound on the wait between two catch-up passes when no append
    /// notification arrives.
    pub poll_interval: Duration,

    /// How often buffered out-of-order events are retried.
    pub gap_retry_interval: Duration,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            poll_interval: Duration::from_millis(250),
            gap_retry_interval: Duration::from_secs(1),
        }
    }
}

/// Counts of what a synchronization pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Events that advanced at least one projection.
    pub applied: u64,

    /// Events every projection had already seen.
    pub duplicates: u64,

    /// Events no projection was interested in.
    pub ignored: u64,

    /// Events parked because an earlier version is still missing.
    pub buffered: u64,

    /// Malformed events set aside so the feed can move on.
    pub rejected: u64,
}

impl SyncReport {
    /// Returns true if nothing was delivered.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Applied => {
                self.applied += 1;
                metrics::counter!("projections_events_processed").increment(1);
            }
            Delivery::Duplicate => {
                self.duplicates += 1;
                metrics::counter!("projection_duplicates_total").increment(1);
            }
            Delivery::Ignored => self.ignored += 1,
            Delivery::Gap => {
                self.buffered += 1;
                metrics::counter!("projection_gaps_total").increment(1);
            }
            Delivery::Rejected => {
                self.rejected += 1;
                metrics::counter!("projection_rejected_total").increment(1);
            }
        }
    }
}

/// A snapshot of the synchronizer's progress.
///
/// Published after every event, so reading it never waits for a running
/// pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncProgress {
    /// How far the global feed has been consumed.
    pub position: ProjectionPosition,

    /// Out-of-order events waiting for their predecessors.
    pub pending: usize,

    /// Malformed events that were set aside.
    pub rejected: usize,
}

/// Combined result of handing one event to every projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Applied,
    Duplicate,
    Ignored,
    Gap,
    Rejected,
}

type PendingEvents = HashMap<AggregateId, BTreeMap<Version, EventEnvelope>>;

#[derive(Default)]
struct SyncState {
    position: ProjectionPosition,
    pending: PendingEvents,
    rejected: Vec<EventEnvelope>,
}

impl SyncState {
    fn progress(&self) -> SyncProgress {
        SyncProgress {
            position: self.position,
            pending: self.pending.values().map(BTreeMap::len).sum(),
            rejected: self.rejected.len(),
        }
    }
}

/// Delivers events from an event store to projections.
///
/// The synchronizer consumes the store's global feed with `read_all_from`
/// and remembers the feed position of the last event it consumed.
/// Projections decide per event whether it is new, a duplicate or ahead of
/// its predecessors. Events that are ahead are parked in a per-aggregate
/// buffer and delivered again, in version order, once the missing events
/// have been applied.
///
/// An event that no projection can decode is logged, set aside and
/// counted, and the feed moves on. Any other projection error stops the
/// pass before the failing event, and the next pass starts with it again.
///
/// Passes are serialized: only one catch-up, redelivery or rebuild runs at
/// a time. [`progress`](Self::progress) does not wait for them.
pub struct ProjectionSynchronizer<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    config: SynchronizerConfig,
    state: Mutex<SyncState>,
    progress: watch::Sender<SyncProgress>,
}

impl<S: EventStore> ProjectionSynchronizer<S> {
    /// Creates a new synchronizer with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, SynchronizerConfig::default())
    }

    /// Creates a new synchronizer with an explicit configuration.
    pub fn with_config(store: S, config: SynchronizerConfig) -> Self {
        let (progress, _) = watch::channel(SyncProgress::default());
        Self {
            store,
            projections: Vec::new(),
            config: SynchronizerConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
            state: Mutex::new(SyncState::default()),
            progress,
        }
    }

    /// Registers a projection with this synchronizer.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        tracing::debug!(projection = projection.name(), "projection registered");
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Returns the latest published progress.
    pub fn progress(&self) -> SyncProgress {
        *self.progress.borrow()
    }

    /// Returns how far the global feed has been consumed.
    pub fn position(&self) -> ProjectionPosition {
        self.progress().position
    }

    /// Returns the number of buffered out-of-order events.
    pub fn pending_count(&self) -> usize {
        self.progress().pending
    }

    /// Returns the malformed events that were set aside.
    pub async fn rejected_events(&self) -> Vec<EventEnvelope> {
        self.state.lock().await.rejected.clone()
    }

    /// Reads the feed after the current position until it is exhausted and
    /// delivers every event.
    ///
    /// The position only moves past an event once it was delivered,
    /// buffered or rejected, so a failing pass resumes at the failed event.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<SyncReport> {
        let mut state = self.state.lock().await;
        let mut report = SyncReport::default();

        loop {
            let batch = self
                .store
                .read_all_from(state.position.last, self.config.batch_size)
                .await?;
            let exhausted = batch.len() < self.config.batch_size;

            for RecordedEvent { position, event } in batch {
                let delivered = self.deliver_and_drain(&mut state, event, &mut report).await;
                if delivered.is_ok() {
                    state.position = state.position.advance(position);
                }
                self.publish(&state);
                delivered?;
            }

            if exhausted {
                break;
            }
        }

        if !report.is_empty() {
            tracing::debug!(position = %state.position, ?report, "catch-up complete");
        }

        Ok(report)
    }

    /// Delivers a single event to all registered projections.
    ///
    /// Used for redelivery; does not move the feed position.
    #[tracing::instrument(
        skip(self, event),
        fields(aggregate_id = %event.aggregate_id, version = %event.version)
    )]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<SyncReport> {
        let mut state = self.state.lock().await;
        let mut report = SyncReport::default();
        let result = self
            .deliver_and_drain(&mut state, event.clone(), &mut report)
            .await;
        self.publish(&state);
        result.map(|()| report)
    }

    /// Delivers buffered events again.
    #[tracing::instrument(skip(self))]
    pub async fn retry_pending(&self) -> Result<SyncReport> {
        let mut state = self.state.lock().await;
        let mut report = SyncReport::default();

        let ids: Vec<AggregateId> = state.pending.keys().cloned().collect();
        for aggregate_id in ids {
            let drained = self
                .drain_pending(&mut state, &aggregate_id, &mut report)
                .await;
            self.publish(&state);
            drained?;

            if let Some((version, _)) = state
                .pending
                .get(&aggregate_id)
                .and_then(|events| events.first_key_value())
            {
                tracing::warn!(
                    %aggregate_id,
                    next_buffered = %version,
                    "projection still waiting for missing events"
                );
            }
        }

        Ok(report)
    }

    /// Resets all projections and replays the whole feed.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<SyncReport> {
        {
            let mut state = self.state.lock().await;
            for projection in &self.projections {
                projection.reset().await?;
            }
            *state = SyncState::default();
            self.publish(&state);
        }
        tracing::info!("projections reset, replaying feed");
        self.run_catch_up().await
    }

    /// Runs until `shutdown` turns true or its sender is dropped.
    ///
    /// Each iteration catches up, then waits for an append notification,
    /// the poll interval or the gap retry tick, whichever comes first.
    /// Errors are logged and the next iteration tries again.
    #[tracing::instrument(skip_all, name = "projection_synchronizer")]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let notifier = self.store.append_notifier();
        let mut gap_retry = tokio::time::interval(self.config.gap_retry_interval);
        gap_retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            push = notifier.is_some(),
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "projection synchronizer started"
        );

        while !*shutdown.borrow() {
            if let Err(e) = self.run_catch_up().await {
                tracing::error!(error = %e, "projection catch-up failed");
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = appended(notifier.as_deref()) => {}
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = gap_retry.tick() => {
                    if self.pending_count() > 0
                        && let Err(e) = self.retry_pending().await
                    {
                        tracing::error!(error = %e, "retrying buffered events failed");
                    }
                }
            }
        }

        tracing::info!("projection synchronizer stopped");
    }

    fn publish(&self, state: &SyncState) {
        self.progress.send_replace(state.progress());
    }

    async fn deliver(&self, event: &EventEnvelope) -> Result<Delivery> {
        let mut applied = false;
        let mut duplicate = false;
        let mut gap = false;
        let mut malformed = false;

        for projection in &self.projections {
            match projection.handle(event).await {
                Ok(Outcome::Applied) => applied = true,
                Ok(Outcome::Duplicate) => duplicate = true,
                Ok(Outcome::Ignored) => {}
                Err(e) if e.is_gap() => {
                    tracing::debug!(projection = projection.name(), error = %e, "event ahead of projection");
                    gap = true;
                }
                Err(e) if e.is_malformed_event() => {
                    tracing::error!(
                        projection = projection.name(),
                        aggregate_id = %event.aggregate_id,
                        version = %event.version,
                        event_type = %event.event_type,
                        error = %e,
                        "malformed event set aside"
                    );
                    malformed = true;
                }
                Err(e) => return Err(e),
            }
        }

        // Redelivery is harmless to projections that already applied the
        // event, so a gap anywhere parks it for everyone.
        Ok(if malformed {
            Delivery::Rejected
        } else if gap {
            Delivery::Gap
        } else if applied {
            Delivery::Applied
        } else if duplicate {
            Delivery::Duplicate
        } else {
            Delivery::Ignored
        })
    }

    async fn deliver_and_drain(
        &self,
        state: &mut SyncState,
        event: EventEnvelope,
        report: &mut SyncReport,
    ) -> Result<()> {
        let delivery = self.deliver(&event).await?;
        report.record(delivery);

        match delivery {
            Delivery::Gap => {
                state
                    .pending
                    .entry(event.aggregate_id.clone())
                    .or_default()
                    .insert(event.version, event);
            }
            Delivery::Applied => {
                self.drain_pending(state, &event.aggregate_id, report)
                    .await?;
            }
            Delivery::Rejected => state.rejected.push(event),
            Delivery::Duplicate | Delivery::Ignored => {}
        }

        Ok(())
    }

    /// Delivers buffered events of one aggregate in version order until one
    /// of them is still ahead.
    async fn drain_pending(
        &self,
        state: &mut SyncState,
        aggregate_id: &AggregateId,
        report: &mut SyncReport,
    ) -> Result<()> {
        loop {
            let Some(events) = state.pending.get_mut(aggregate_id) else {
                return Ok(());
            };
            let Some((version, event)) = events.pop_first() else {
                state.pending.remove(aggregate_id);
                return Ok(());
            };

            match self.deliver(&event).await {
                Ok(Delivery::Gap) => {
                    events.insert(version, event);
                    return Ok(());
                }
                Ok(Delivery::Rejected) => {
                    report.record(Delivery::Rejected);
                    state.rejected.push(event);
                }
                Ok(delivery) => report.record(delivery),
                Err(e) => {
                    events.insert(version, event);
                    return Err(e);
                }
            }
        }
    }
}

async fn appended(notifier: Option<&Notify>) {
    match notifier {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}
