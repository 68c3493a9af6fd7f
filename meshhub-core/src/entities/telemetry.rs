use serde_json::{Map, Value};
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

/// A telemetry report ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTelemetry {
    pub node_public_key: String,
    pub lpp_data: Option<String>,
    pub parsed_data: Option<Map<String, Value>>,
    pub event_hash: String,
}

impl NewTelemetry {
    /// `node_id` is the reporting node, not the gateway.
    pub async fn insert_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        receiver_node_id: Uuid,
        node_id: Option<Uuid>,
        received_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO telemetry (
                id, receiver_node_id, node_id, node_public_key, lpp_data, parsed_data,
                event_hash, received_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (event_hash) DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(receiver_node_id)
        .bind(node_id)
        .bind(&self.node_public_key)
        .bind(&self.lpp_data)
        .bind(self.parsed_data.as_ref().map(Json))
        .bind(&self.event_hash)
        .bind(received_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
