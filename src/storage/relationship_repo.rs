use crate::error::Result;
use sqlx::PgPool;

#[derive(Clone, Debug)]
pub struct RelationshipRepository {
    pool: PgPool,
}

impl RelationshipRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Whether the patient's profile currently points at the doctor's
    /// profile. Recomputed on every call so association changes take effect
    /// immediately.
    pub async fn association_exists(&self, doctor_user_id: i64, patient_user_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM patient_profiles p
                JOIN doctor_profiles d ON p.doctor_id = d.id
                WHERE p.user_id = $1 AND d.user_id = $2
            )
            "#,
        )
        .bind(patient_user_id)
        .bind(doctor_user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
