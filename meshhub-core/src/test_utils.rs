//! In-memory store mirroring the PostgreSQL conflict semantics.

use crate::entities::EventTable;
use crate::entities::retention::PurgeCount;
use crate::store::{EventRow, IngestRecord, IngestStore, PersistOutcome, RetentionStore, StoreError};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;
use uuid::Uuid;

pub fn gateway_key(n: u8) -> String {
    format!("{:02x}{}", n, "0".repeat(62))
}

pub fn node_key(n: u8) -> String {
    format!("{}{:02x}", "f".repeat(62), n)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub id: Uuid,
    pub public_key: String,
    pub name: Option<String>,
    pub adv_type: Option<String>,
    pub flags: Option<i64>,
    pub first_seen: OffsetDateTime,
    pub last_seen: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct StoredEvent {
    table: EventTable,
    event_hash: Option<String>,
    log_event_type: Option<String>,
    created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct StoredReceiver {
    event_type: &'static str,
    event_hash: String,
    receiver_node_id: Uuid,
}

#[derive(Default)]
struct State {
    nodes: Vec<StoredNode>,
    events: Vec<StoredEvent>,
    receivers: Vec<StoredReceiver>,
}

impl State {
    fn upsert_node(&mut self, sighting: &crate::entities::node::NodeSighting) -> Uuid {
        if let Some(node) = self
            .nodes
            .iter_mut()
            .find(|n| n.public_key == sighting.public_key)
        {
            node.last_seen = node.last_seen.max(sighting.seen_at);
            node.name = sighting.name.clone().or(node.name.take());
            node.adv_type = sighting.adv_type.clone().or(node.adv_type.take());
            node.flags = sighting.flags.or(node.flags);
            return node.id;
        }
        let id = Uuid::now_v7();
        self.nodes.push(StoredNode {
            id,
            public_key: sighting.public_key.clone(),
            name: sighting.name.clone(),
            adv_type: sighting.adv_type.clone(),
            flags: sighting.flags,
            first_seen: sighting.seen_at,
            last_seen: sighting.seen_at,
        });
        id
    }
}

/// Test double for [`IngestStore`] and [`RetentionStore`].
///
/// `created_at` of an event is its `received_at`, so tests age rows by
/// ingesting them with an old receive time.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_purges: AtomicBool,
}

impl MemoryStore {
    pub fn fail_purges(&self, fail: bool) {
        self.fail_purges.store(fail, Ordering::SeqCst);
    }

    pub fn event_count(&self, table: EventTable) -> usize {
        let state = self.state.lock().unwrap();
        state.events.iter().filter(|e| e.table == table).count()
    }

    pub fn receiver_count(&self) -> usize {
        self.state.lock().unwrap().receivers.len()
    }

    pub fn node_count(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }

    pub fn node(&self, public_key: &str) -> Option<StoredNode> {
        let state = self.state.lock().unwrap();
        state.nodes.iter().find(|n| n.public_key == public_key).cloned()
    }

    pub fn logged_event_types(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .events
            .iter()
            .filter_map(|e| e.log_event_type.clone())
            .collect()
    }
}

#[async_trait]
impl IngestStore for MemoryStore {
    async fn persist(&self, record: IngestRecord) -> Result<PersistOutcome, StoreError> {
        let mut state = self.state.lock().unwrap();

        let receiver_node_id = state.upsert_node(&record.receiver);
        if let Some(subject) = &record.subject {
            state.upsert_node(subject);
        }

        let table = record.row.table();
        let event_hash = record.row.event_hash().map(str::to_string);
        let duplicate = event_hash.as_ref().is_some_and(|hash| {
            state
                .events
                .iter()
                .any(|e| e.table == table && e.event_hash.as_ref() == Some(hash))
        });
        if !duplicate {
            let log_event_type = match &record.row {
                EventRow::Log(row) => Some(row.event_type.clone()),
                _ => None,
            };
            state.events.push(StoredEvent {
                table,
                event_hash,
                log_event_type,
                created_at: record.received_at,
            });
        }

        let receiver_recorded = match record.receiver_entry(receiver_node_id) {
            Some(entry) => {
                let exists = state.receivers.iter().any(|r| {
                    r.event_type == entry.event_type
                        && r.event_hash == entry.event_hash
                        && r.receiver_node_id == entry.receiver_node_id
                });
                if !exists {
                    state.receivers.push(StoredReceiver {
                        event_type: entry.event_type,
                        event_hash: entry.event_hash,
                        receiver_node_id,
                    });
                }
                !exists
            }
            None => false,
        };

        Ok(PersistOutcome {
            receiver_node_id,
            event_inserted: !duplicate,
            receiver_recorded,
        })
    }
}

#[async_trait]
impl RetentionStore for MemoryStore {
    async fn purge_events(
        &self,
        table: EventTable,
        cutoff: OffsetDateTime,
        dry_run: bool,
    ) -> Result<PurgeCount, StoreError> {
        if self.fail_purges.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut state = self.state.lock().unwrap();

        let doomed: Vec<Option<String>> = state
            .events
            .iter()
            .filter(|e| e.table == table && e.created_at < cutoff)
            .map(|e| e.event_hash.clone())
            .collect();
        let event_type = table.receiver_event_type();
        let is_doomed_receiver = |r: &StoredReceiver| {
            Some(r.event_type) == event_type && doomed.contains(&Some(r.event_hash.clone()))
        };
        let receivers = state.receivers.iter().filter(|r| is_doomed_receiver(r)).count();

        if !dry_run {
            state.receivers.retain(|r| !is_doomed_receiver(r));
            state
                .events
                .retain(|e| !(e.table == table && e.created_at < cutoff));
        }

        Ok(PurgeCount {
            events: doomed.len() as u64,
            receivers: receivers as u64,
        })
    }

    async fn purge_inactive_nodes(
        &self,
        cutoff: OffsetDateTime,
        dry_run: bool,
    ) -> Result<u64, StoreError> {
        if self.fail_purges.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut state = self.state.lock().unwrap();

        let doomed: Vec<Uuid> = state
            .nodes
            .iter()
            .filter(|n| n.last_seen < cutoff)
            .map(|n| n.id)
            .collect();
        if !dry_run {
            state.nodes.retain(|n| !doomed.contains(&n.id));
            state
                .receivers
                .retain(|r| !doomed.contains(&r.receiver_node_id));
        }
        Ok(doomed.len() as u64)
    }
}
