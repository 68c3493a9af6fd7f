//! Which gateway heard which logical event.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use time::OffsetDateTime;
use uuid::Uuid;

const INSERT_RECEIVER: &str = r#"
    INSERT INTO event_receivers (id, event_type, event_hash, receiver_node_id, snr, received_at)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (event_type, event_hash, receiver_node_id) DO NOTHING
"#;

/// Record that `receiver_node_id` observed the event `(event_type, event_hash)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEventReceiver {
    pub event_type: &'static str,
    pub event_hash: String,
    pub receiver_node_id: Uuid,
    pub snr: Option<f64>,
    pub received_at: OffsetDateTime,
}

impl RecordEventReceiver {
    /// Insert the junction row; a repeat of the same triple is a no-op.
    ///
    /// Returns `true` only when a new row was written. Concurrent callers
    /// racing on the same triple never error.
    ///
    /// The event row for `event_hash` must already be visible to `tx`.
    pub async fn execute_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<bool, sqlx::Error> {
        let result = self
            .bind_insert(sqlx::query(INSERT_RECEIVER))
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    fn bind_insert<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        query
            .bind(Uuid::now_v7())
            .bind(self.event_type)
            .bind(&self.event_hash)
            .bind(self.receiver_node_id)
            .bind(self.snr)
            .bind(self.received_at)
    }
}

impl Processor<RecordEventReceiver> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RecordEventReceiver")]
    async fn process(&self, cmd: RecordEventReceiver) -> Result<bool, sqlx::Error> {
        let result = cmd
            .bind_insert(sqlx::query(INSERT_RECEIVER))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
