use time::OffsetDateTime;
use uuid::Uuid;

/// An advertisement ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdvertisement {
    pub public_key: String,
    pub name: Option<String>,
    pub adv_type: Option<String>,
    pub flags: Option<i64>,
    pub event_hash: String,
}

impl NewAdvertisement {
    /// Insert unless the same advertisement was already stored in this
    /// time bucket. `node_id` is the advertised node.
    pub async fn insert_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        receiver_node_id: Uuid,
        node_id: Option<Uuid>,
        received_at: OffsetDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO advertisements (
                id, receiver_node_id, node_id, public_key, name, adv_type, flags,
                event_hash, received_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (event_hash) DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(receiver_node_id)
        .bind(node_id)
        .bind(&self.public_key)
        .bind(&self.name)
        .bind(&self.adv_type)
        .bind(self.flags)
        .bind(&self.event_hash)
        .bind(received_at)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
