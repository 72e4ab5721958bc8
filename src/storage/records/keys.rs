use time::OffsetDateTime;

#[derive(sqlx::FromRow)]
pub(crate) struct KeyPairRecord {
    pub user_id: i64,
    pub public_key: String,
    pub private_key: String,
    pub created_at: OffsetDateTime,
}

impl From<KeyPairRecord> for crate::domain::keys::KeyPair {
    fn from(record: KeyPairRecord) -> Self {
        Self {
            user_id: record.user_id,
            public_key: record.public_key,
            private_key: record.private_key,
            created_at: record.created_at,
        }
    }
}
