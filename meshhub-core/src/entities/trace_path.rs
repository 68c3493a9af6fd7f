use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

/// A completed path trace ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTracePath {
    pub initiator_tag: i64,
    pub path_len: Option<i32>,
    pub flags: Option<i32>,
    pub auth: Option<i64>,
    pub path_hashes: Option<Vec<String>>,
    pub snr_values: Option<Vec<f64>>,
    pub hop_count: Option<i32>,
    pub event_hash: String,
}

impl NewTracePath {
    pub async fn insert_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        receiver_node_id: Uuid,
        received_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO trace_paths (
                id, receiver_node_id, initiator_tag, path_len, flags, auth,
                path_hashes, snr_values, hop_count, event_hash, received_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (event_hash) DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(receiver_node_id)
        .bind(self.initiator_tag)
        .bind(self.path_len)
        .bind(self.flags)
        .bind(self.auth)
        .bind(self.path_hashes.as_ref().map(Json))
        .bind(self.snr_values.as_ref().map(Json))
        .bind(self.hop_count)
        .bind(&self.event_hash)
        .bind(received_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
