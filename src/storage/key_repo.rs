use crate::domain::keys::KeyPair;
use crate::error::Result;
use crate::storage::records::keys::KeyPairRecord;
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct KeyRepository {
    pool: PgPool,
}

impl KeyRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores a key pair, replacing any existing one. A single statement, so
    /// regeneration can never leave a half-written row.
    pub async fn upsert(&self, user_id: i64, public_key: &str, private_key: &str) -> Result<KeyPair> {
        let record = sqlx::query_as::<_, KeyPairRecord>(
            r#"
            INSERT INTO user_encryption_keys (user_id, public_key, private_key)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET public_key = $2, private_key = $3, created_at = NOW()
            RETURNING user_id, public_key, private_key, created_at
            "#,
        )
        .bind(user_id)
        .bind(public_key)
        .bind(private_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    /// Stores a key pair only if the user has none. Returns `false` when a
    /// row already existed (and was left untouched).
    pub async fn insert_if_absent(&self, user_id: i64, public_key: &str, private_key: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_encryption_keys (user_id, public_key, private_key)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(public_key)
        .bind(private_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn fetch_public_key(&self, user_id: i64) -> Result<Option<String>> {
        let key = sqlx::query_scalar("SELECT public_key FROM user_encryption_keys WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(key)
    }

    pub async fn fetch_key_pair(&self, user_id: i64) -> Result<Option<KeyPair>> {
        let record = sqlx::query_as::<_, KeyPairRecord>(
            r#"
            SELECT user_id, public_key, private_key, created_at
            FROM user_encryption_keys
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }

    pub async fn exists(&self, user_id: i64) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM user_encryption_keys WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }
}
