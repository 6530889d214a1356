use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, FeedPosition, RecordedEvent, Result,
    Version,
    store::{EventStore, StreamHistory, validate_events_for_append},
};

const SELECT_COLUMNS: &str =
    "id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata";

/// PostgreSQL-backed event store implementation.
///
/// Optimistic concurrency is enforced twice: by comparing the stored
/// version inside the append transaction, and by the
/// `unique_aggregate_version` constraint for writers that race past that
/// check.
///
/// The global feed is ordered by `(tx_id, position)`: the writing
/// transaction first, then the `BIGSERIAL` sequence. `read_all_from` only
/// returns rows written by transactions older than the oldest one still in
/// flight. A sequence value taken by a transaction that commits late
/// therefore sorts after everything already handed out, and nothing is
/// skipped. Appends to different aggregates never wait on each other.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store over a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::new(row.try_get::<String, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    fn row_to_recorded(row: PgRow) -> Result<RecordedEvent> {
        let position = FeedPosition::new(
            from_db(row.try_get("tx_id")?),
            from_db(row.try_get("position")?),
        );
        Ok(RecordedEvent {
            position,
            event: Self::row_to_event(row)?,
        })
    }

    async fn current_version<'e, E>(executor: E, aggregate_id: &AggregateId) -> Result<Version>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_str())
                .fetch_one(executor)
                .await?;
        Ok(Version::new(version.unwrap_or(0)))
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(
        &self,
        aggregate_id: &AggregateId,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Version> {
        validate_events_for_append(aggregate_id, expected_version, &events)?;

        let mut tx = self.pool.begin().await?;

        let actual = Self::current_version(&mut *tx, aggregate_id).await?;
        if actual != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual,
            });
        }

        let mut last_version = expected_version;
        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_str())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                // A concurrent writer committed this version first.
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_version")
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id: aggregate_id.clone(),
                        expected: expected_version,
                        actual: event.version,
                    };
                }
                EventStoreError::StorageUnavailable(e)
            })?;

            last_version = event.version;
        }

        tx.commit().await?;
        metrics::counter!("events_appended_total").increment(events.len() as u64);
        Ok(last_version)
    }

    async fn read_stream(&self, aggregate_id: &AggregateId) -> Result<StreamHistory> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM events WHERE aggregate_id = $1 ORDER BY version ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(aggregate_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        let events = rows
            .into_iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>>>()?;
        let version = events.last().map(|e| e.version).unwrap_or_default();
        Ok(StreamHistory { events, version })
    }

    async fn get_aggregate_version(&self, aggregate_id: &AggregateId) -> Result<Version> {
        Self::current_version(&self.pool, aggregate_id).await
    }

    async fn read_all_from(
        &self,
        after: FeedPosition,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>> {
        let sql = format!(
            r#"
            SELECT tx_id, position, {SELECT_COLUMNS} FROM events
            WHERE (tx_id, position) > ($1, $2)
              AND tx_id < pg_snapshot_xmin(pg_current_snapshot())::text::bigint
            ORDER BY tx_id ASC, position ASC
            LIMIT $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(to_db(after.transaction))
            .bind(to_db(after.sequence))
            .bind(to_db(limit as u64))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_recorded).collect()
    }
}

fn to_db(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_db(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}
