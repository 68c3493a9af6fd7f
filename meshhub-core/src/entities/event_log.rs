use serde_json::Value;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

/// A raw event without a dedicated table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEventLog {
    pub event_type: String,
    pub payload: Value,
}

impl NewEventLog {
    /// Log rows carry no hash and are always inserted.
    pub async fn insert_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        receiver_node_id: Uuid,
        received_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO events_log (id, receiver_node_id, event_type, payload, received_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(receiver_node_id)
        .bind(&self.event_type)
        .bind(Json(&self.payload))
        .bind(received_at)
        .execute(&mut **tx)
        .await?;
        Ok(true)
    }
}
