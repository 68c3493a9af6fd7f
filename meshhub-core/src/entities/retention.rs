use crate::entities::EventTable;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use time::OffsetDateTime;

/// Rows removed (or that would be removed) from one event table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeCount {
    pub events: u64,
    /// Junction rows pointing at the purged events.
    pub receivers: u64,
}

#[derive(Debug, Clone)]
/// Delete, or with `dry_run` only count, the rows of `table` created before
/// `cutoff` together with their `event_receivers` rows.
///
/// Events go first and their receivers second, as separate statements in one
/// transaction. The second statement takes a fresh snapshot, so it also sees
/// receivers committed by an ingest that held the event row locked (see
/// [`EventTable::lock_event_tx`]) while the first statement waited.
pub struct PurgeEvents {
    pub table: EventTable,
    pub cutoff: OffsetDateTime,
    pub dry_run: bool,
}

impl Processor<PurgeEvents> for DatabaseProcessor {
    type Output = PurgeCount;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:PurgeEvents")]
    async fn process(&self, cmd: PurgeEvents) -> Result<PurgeCount, sqlx::Error> {
        let table = cmd.table.table_name();
        if cmd.dry_run {
            let receivers_sql = format!(
                "event_receivers WHERE event_type = $2 \
                 AND event_hash IN (SELECT event_hash FROM {table} WHERE created_at < $1)"
            );
            let events: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(*) FROM {table} WHERE created_at < $1"
            ))
            .bind(cmd.cutoff)
            .fetch_one(&self.pool)
            .await?;
            let receivers: i64 = match cmd.table.receiver_event_type() {
                Some(event_type) => {
                    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {receivers_sql}"))
                        .bind(cmd.cutoff)
                        .bind(event_type)
                        .fetch_one(&self.pool)
                        .await?
                }
                None => 0,
            };
            return Ok(PurgeCount {
                events: events.max(0) as u64,
                receivers: receivers.max(0) as u64,
            });
        }

        let Some(event_type) = cmd.table.receiver_event_type() else {
            let events = sqlx::query(&format!("DELETE FROM {table} WHERE created_at < $1"))
                .bind(cmd.cutoff)
                .execute(&self.pool)
                .await?
                .rows_affected();
            return Ok(PurgeCount {
                events,
                receivers: 0,
            });
        };

        let mut tx = self.pool.begin().await?;
        let purged: Vec<String> = sqlx::query_scalar(&format!(
            "DELETE FROM {table} WHERE created_at < $1 RETURNING event_hash"
        ))
        .bind(cmd.cutoff)
        .fetch_all(&mut *tx)
        .await?;
        let receivers = if purged.is_empty() {
            0
        } else {
            sqlx::query(
                "DELETE FROM event_receivers WHERE event_type = $1 AND event_hash = ANY($2)",
            )
            .bind(event_type)
            .bind(&purged)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        };
        tx.commit().await?;

        let events = purged.len() as u64;
        Ok(PurgeCount { events, receivers })
    }
}

#[derive(Debug, Clone)]
/// Delete, or with `dry_run` only count, nodes whose `last_seen` is before
/// `cutoff`. Their receiver rows go with them via `ON DELETE CASCADE`.
pub struct PurgeInactiveNodes {
    pub cutoff: OffsetDateTime,
    pub dry_run: bool,
}

impl Processor<PurgeInactiveNodes> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:PurgeInactiveNodes")]
    async fn process(&self, cmd: PurgeInactiveNodes) -> Result<u64, sqlx::Error> {
        if cmd.dry_run {
            let count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM nodes WHERE last_seen < $1")
                    .bind(cmd.cutoff)
                    .fetch_one(&self.pool)
                    .await?;
            return Ok(count.max(0) as u64);
        }

        let result = sqlx::query("DELETE FROM nodes WHERE last_seen < $1")
            .bind(cmd.cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
