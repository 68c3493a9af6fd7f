//! Storage seams used by the pipeline.
//!
//! Handlers and the cleanup scheduler talk to these traits rather than to a
//! pool directly; [`DatabaseProcessor`] is the PostgreSQL implementation.

use crate::entities::advertisement::NewAdvertisement;
use crate::entities::event_log::NewEventLog;
use crate::entities::event_receiver::RecordEventReceiver;
use crate::entities::message::NewMessage;
use crate::entities::node::NodeSighting;
use crate::entities::retention::{PurgeCount, PurgeEvents, PurgeInactiveNodes};
use crate::entities::telemetry::NewTelemetry;
use crate::entities::trace_path::NewTracePath;
use crate::entities::EventTable;
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The kind-specific row of an ingested event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventRow {
    Message(NewMessage),
    Advertisement(NewAdvertisement),
    TracePath(NewTracePath),
    Telemetry(NewTelemetry),
    Log(NewEventLog),
}

impl EventRow {
    pub fn table(&self) -> EventTable {
        match self {
            EventRow::Message(_) => EventTable::Messages,
            EventRow::Advertisement(_) => EventTable::Advertisements,
            EventRow::TracePath(_) => EventTable::TracePaths,
            EventRow::Telemetry(_) => EventTable::Telemetry,
            EventRow::Log(_) => EventTable::EventsLog,
        }
    }

    pub fn event_hash(&self) -> Option<&str> {
        match self {
            EventRow::Message(row) => Some(&row.event_hash),
            EventRow::Advertisement(row) => Some(&row.event_hash),
            EventRow::TracePath(row) => Some(&row.event_hash),
            EventRow::Telemetry(row) => Some(&row.event_hash),
            EventRow::Log(_) => None,
        }
    }
}

/// Everything one event writes, applied atomically by [`IngestStore::persist`].
#[derive(Debug, Clone, PartialEq)]
pub struct IngestRecord {
    /// The gateway that published the event.
    pub receiver: NodeSighting,
    /// A second node the event is about (advertised node, telemetry source).
    pub subject: Option<NodeSighting>,
    pub row: EventRow,
    /// Signal quality at the receiving gateway.
    pub snr: Option<f64>,
    pub received_at: OffsetDateTime,
}

impl IngestRecord {
    /// The receiver-tracking insert for this record, if its kind is hashed.
    pub fn receiver_entry(&self, receiver_node_id: Uuid) -> Option<RecordEventReceiver> {
        let event_type = self.row.table().receiver_event_type()?;
        let event_hash = self.row.event_hash()?;
        Some(RecordEventReceiver {
            event_type,
            event_hash: event_hash.to_string(),
            receiver_node_id,
            snr: self.snr,
            received_at: self.received_at,
        })
    }
}

/// Result of persisting one [`IngestRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    pub receiver_node_id: Uuid,
    /// `false` when another gateway already stored this event.
    pub event_inserted: bool,
    /// `false` when this gateway was already recorded for the event, or the
    /// kind is not tracked.
    pub receiver_recorded: bool,
}

#[async_trait]
pub trait IngestStore: Send + Sync {
    /// Upsert the nodes, insert the event row, then record the receiver,
    /// all in one transaction.
    async fn persist(&self, record: IngestRecord) -> Result<PersistOutcome, StoreError>;
}

#[async_trait]
pub trait RetentionStore: Send + Sync {
    async fn purge_events(
        &self,
        table: EventTable,
        cutoff: OffsetDateTime,
        dry_run: bool,
    ) -> Result<PurgeCount, StoreError>;

    async fn purge_inactive_nodes(
        &self,
        cutoff: OffsetDateTime,
        dry_run: bool,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
impl IngestStore for DatabaseProcessor {
    #[tracing::instrument(skip_all, err, name = "SQL:PersistEvent", fields(table = %record.row.table()))]
    async fn persist(&self, record: IngestRecord) -> Result<PersistOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let receiver_node_id = record.receiver.upsert_tx(&mut tx).await?;
        let subject_node_id = match &record.subject {
            Some(subject) => Some(subject.upsert_tx(&mut tx).await?),
            None => None,
        };

        let mut event_inserted =
            insert_row_tx(&mut tx, &record, receiver_node_id, subject_node_id).await?;
        if let Some(event_hash) = record.row.event_hash().filter(|_| !event_inserted) {
            let table = record.row.table();
            // A purge may have removed the conflicting row since our insert.
            if !table.lock_event_tx(&mut tx, event_hash).await? {
                event_inserted =
                    insert_row_tx(&mut tx, &record, receiver_node_id, subject_node_id).await?;
            }
        }

        // The event row (ours or another gateway's) exists at this point.
        let receiver_recorded = match record.receiver_entry(receiver_node_id) {
            Some(entry) => entry.execute_tx(&mut tx).await?,
            None => false,
        };

        tx.commit().await?;

        Ok(PersistOutcome {
            receiver_node_id,
            event_inserted,
            receiver_recorded,
        })
    }
}

async fn insert_row_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    record: &IngestRecord,
    receiver_node_id: Uuid,
    subject_node_id: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    let received_at = record.received_at;
    match &record.row {
        EventRow::Message(row) => row.insert_tx(tx, receiver_node_id, received_at).await,
        EventRow::Advertisement(row) => {
            row.insert_tx(tx, receiver_node_id, subject_node_id, received_at)
                .await
        }
        EventRow::TracePath(row) => row.insert_tx(tx, receiver_node_id, received_at).await,
        EventRow::Telemetry(row) => {
            row.insert_tx(tx, receiver_node_id, subject_node_id, received_at)
                .await
        }
        EventRow::Log(row) => row.insert_tx(tx, receiver_node_id, received_at).await,
    }
}

#[async_trait]
impl RetentionStore for DatabaseProcessor {
    async fn purge_events(
        &self,
        table: EventTable,
        cutoff: OffsetDateTime,
        dry_run: bool,
    ) -> Result<PurgeCount, StoreError> {
        Ok(self
            .process(PurgeEvents {
                table,
                cutoff,
                dry_run,
            })
            .await?)
    }

    async fn purge_inactive_nodes(
        &self,
        cutoff: OffsetDateTime,
        dry_run: bool,
    ) -> Result<u64, StoreError> {
        Ok(self.process(PurgeInactiveNodes { cutoff, dry_run }).await?)
    }
}
