//! Command handling infrastructure.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use common::AggregateId;
use event_store::{EventEnvelope, EventStore, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,

    /// Number of load-handle-append cycles it took (1 without conflicts).
    pub attempts: u32,
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action. A command is
/// cloned once per attempt, so it must be cheap to clone.
pub trait Command: Clone + Debug + Send + Sync {
    /// Returns the command type name, used as a metrics label and recorded
    /// in the metadata of the events it produces.
    fn command_type(&self) -> &'static str;
}

/// Bounded retry policy for optimistic-concurrency conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,

    /// Delay before the second attempt; grows linearly afterwards.
    pub base_delay: Duration,
}

impl RetryConfig {
    /// Creates a retry policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that gives up on the first conflict.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay to wait after `attempt` failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(5))
    }
}

/// Handler for executing commands against aggregates.
///
/// One command is one load-handle-append cycle:
/// 1. Read the aggregate's stream and fold it from the default state
/// 2. Let the aggregate turn the command into events (or reject it)
/// 3. Append the events with the observed version as expected version
///
/// A lost race restarts the cycle, up to [`RetryConfig::max_attempts`].
/// Rejections and storage failures are returned as they are.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    retry: RetryConfig,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new command handler with the default retry policy.
    pub fn new(store: S) -> Self {
        Self::with_retry(store, RetryConfig::default())
    }

    /// Creates a new command handler with an explicit retry policy.
    pub fn with_retry(store: S, retry: RetryConfig) -> Self {
        Self {
            store,
            retry,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the retry policy.
    pub fn retry_config(&self) -> RetryConfig {
        self.retry
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the aggregate doesn't exist, returns a default instance at
    /// `Version::initial()`.
    pub async fn load(&self, aggregate_id: &AggregateId) -> Result<A, DomainError> {
        let history = self.store.read_stream(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in &history.events {
            let event: A::Event = envelope.decode()?;
            aggregate.apply(event);
        }
        aggregate.set_version(history.version);

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: &AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Executes a command and persists the resulting events.
    #[tracing::instrument(
        skip(self, command),
        fields(
            aggregate_type = A::aggregate_type(),
            command = command.command_type(),
        )
    )]
    pub async fn execute(
        &self,
        aggregate_id: &AggregateId,
        command: A::Command,
    ) -> Result<CommandResult<A>, DomainError>
    where
        DomainError: From<A::Error>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut aggregate = self.load(aggregate_id).await?;
            let current_version = aggregate.version();

            let events = aggregate.handle(aggregate_id, command.clone())?;

            if events.is_empty() {
                return Ok(CommandResult {
                    aggregate,
                    events,
                    new_version: current_version,
                    attempts: attempt,
                });
            }

            let envelopes =
                self.build_envelopes(aggregate_id, current_version, &command, &events)?;

            match self
                .store
                .append(aggregate_id, current_version, envelopes)
                .await
            {
                Ok(new_version) => {
                    aggregate.apply_events(events.iter().cloned());
                    aggregate.set_version(new_version);

                    tracing::debug!(%new_version, attempt, "command applied");
                    return Ok(CommandResult {
                        aggregate,
                        events,
                        new_version,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_concurrency_conflict() => {
                    metrics::counter!("command_conflicts_total").increment(1);

                    if attempt >= self.retry.max_attempts {
                        tracing::warn!(attempt, "giving up after repeated concurrency conflicts");
                        return Err(DomainError::ConcurrencyExhausted {
                            aggregate_id: aggregate_id.clone(),
                            attempts: attempt,
                        });
                    }

                    tracing::debug!(attempt, error = %e, "concurrency conflict, retrying");
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Builds event envelopes from domain events.
    fn build_envelopes(
        &self,
        aggregate_id: &AggregateId,
        current_version: Version,
        command: &A::Command,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id.clone())
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .metadata("command", serde_json::json!(command.command_type()))
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}
