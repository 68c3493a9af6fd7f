//! Persisted tables and the statements that write them.
//!
//! Write paths that must share the ingestion transaction are associated
//! functions taking `&mut sqlx::Transaction`; standalone statements are
//! `Processor` impls on [`DatabaseProcessor`](crate::framework::DatabaseProcessor).

pub mod advertisement;
pub mod event_log;
pub mod event_receiver;
pub mod message;
pub mod node;
pub mod retention;
pub mod telemetry;
pub mod trace_path;

/// The per-kind event tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventTable {
    Advertisements,
    Messages,
    Telemetry,
    TracePaths,
    EventsLog,
}

impl EventTable {
    pub const ALL: [EventTable; 5] = [
        EventTable::Advertisements,
        EventTable::Messages,
        EventTable::Telemetry,
        EventTable::TracePaths,
        EventTable::EventsLog,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            EventTable::Advertisements => "advertisements",
            EventTable::Messages => "messages",
            EventTable::Telemetry => "telemetry",
            EventTable::TracePaths => "trace_paths",
            EventTable::EventsLog => "events_log",
        }
    }

    /// The `event_type` recorded in `event_receivers` for rows of this
    /// table. `None` for tables without a content hash.
    pub fn receiver_event_type(self) -> Option<&'static str> {
        match self {
            EventTable::Advertisements => Some("advertisement"),
            EventTable::Messages => Some("message"),
            EventTable::Telemetry => Some("telemetry"),
            EventTable::TracePaths => Some("trace"),
            EventTable::EventsLog => None,
        }
    }
}

impl EventTable {
    /// Hold a key-share lock on the stored row for `event_hash` until the
    /// transaction ends, so a concurrent purge cannot delete it while a
    /// receiver row pointing at it is being written.
    ///
    /// Returns `false` if no such row exists any more.
    pub async fn lock_event_tx(
        self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        event_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let table = self.table_name();
        let row: Option<i32> = sqlx::query_scalar(&format!(
            "SELECT 1 FROM {table} WHERE event_hash = $1 FOR KEY SHARE"
        ))
        .bind(event_hash)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.is_some())
    }
}

impl std::fmt::Display for EventTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}
