use sqlx::PgPool;

/// Pool-backed executor.
///
/// SQL statements are modelled as `Processor<Query>` impls on this type; it
/// also implements the store traits the pipeline depends on.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
