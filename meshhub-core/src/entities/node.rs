use time::OffsetDateTime;
use uuid::Uuid;

/// One observation of a node, as sender, receiver or advertised identity.
///
/// `None` attributes leave the stored value untouched, so a bare sighting
/// only bumps `last_seen` while an advertisement fills in name and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSighting {
    pub public_key: String,
    pub name: Option<String>,
    pub adv_type: Option<String>,
    pub flags: Option<i64>,
    pub seen_at: OffsetDateTime,
}

impl NodeSighting {
    /// A sighting that carries nothing but the key.
    pub fn bare(public_key: impl Into<String>, seen_at: OffsetDateTime) -> Self {
        Self {
            public_key: public_key.into(),
            name: None,
            adv_type: None,
            flags: None,
            seen_at,
        }
    }

    /// Create the node or bump its `last_seen`, returning its id.
    pub async fn upsert_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<Uuid, sqlx::Error> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO nodes (id, public_key, name, adv_type, flags, first_seen, last_seen)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (public_key) DO UPDATE SET
                last_seen = GREATEST(nodes.last_seen, EXCLUDED.last_seen),
                name = COALESCE(EXCLUDED.name, nodes.name),
                adv_type = COALESCE(EXCLUDED.adv_type, nodes.adv_type),
                flags = COALESCE(EXCLUDED.flags, nodes.flags)
            RETURNING id
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(&self.public_key)
        .bind(&self.name)
        .bind(&self.adv_type)
        .bind(self.flags)
        .bind(self.seen_at)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }
}
