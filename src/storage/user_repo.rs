use crate::domain::user::Role;
use crate::error::Result;
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Role of a user, or `None` when no such user exists. The role column is
    /// CHECK-constrained, so an unparseable value is a schema fault.
    pub async fn fetch_role(&self, user_id: i64) -> Result<Option<Role>> {
        let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        role.map(|r| r.parse().map_err(|()| crate::error::AppError::Internal)).transpose()
    }

    pub async fn exists(&self, user_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}
