use time::OffsetDateTime;
use uuid::Uuid;

/// Whether a message was addressed to the gateway or sent on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "message_type")]
pub enum MessageType {
    Contact,
    Channel,
}

/// A text message ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub message_type: MessageType,
    pub pubkey_prefix: Option<String>,
    pub channel_idx: Option<i32>,
    pub text: String,
    pub path_len: Option<i32>,
    pub txt_type: Option<i32>,
    pub signature: Option<String>,
    pub snr: Option<f64>,
    pub sender_timestamp: Option<i64>,
    pub event_hash: String,
}

impl NewMessage {
    /// Insert unless a message with the same hash already exists.
    ///
    /// Returns `true` if a row was written.
    pub async fn insert_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        receiver_node_id: Uuid,
        received_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (
                id, receiver_node_id, message_type, pubkey_prefix, channel_idx, text,
                path_len, txt_type, signature, snr, sender_timestamp, event_hash, received_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (event_hash) DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(receiver_node_id)
        .bind(self.message_type)
        .bind(&self.pubkey_prefix)
        .bind(self.channel_idx)
        .bind(&self.text)
        .bind(self.path_len)
        .bind(self.txt_type)
        .bind(&self.signature)
        .bind(self.snr)
        .bind(self.sender_timestamp)
        .bind(&self.event_hash)
        .bind(received_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
