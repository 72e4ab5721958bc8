use crate::domain::message::{ChatMessage, FileMetadata, OutgoingPayload};
use crate::error::Result;
use crate::storage::records::message::ChatMessageRecord;
use sqlx::PgPool;
use sqlx::types::Json;

const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, sender_encrypted_text, recipient_encrypted_text, \
     sender_encrypted_file, recipient_encrypted_file, file_metadata, created_at, is_read";

#[derive(Clone, Debug)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a message and returns the stored row with its assigned id and
    /// timestamp. One statement; an interrupted send leaves nothing behind.
    pub async fn insert(&self, sender_id: i64, recipient_id: i64, payload: &OutgoingPayload) -> Result<ChatMessage> {
        let record = sqlx::query_as::<_, ChatMessageRecord>(&format!(
            r#"
            INSERT INTO chat_messages (
                sender_id, recipient_id,
                sender_encrypted_text, recipient_encrypted_text,
                sender_encrypted_file, recipient_encrypted_file,
                file_metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {MESSAGE_COLUMNS}
            "#
        ))
        .bind(sender_id)
        .bind(recipient_id)
        .bind(payload.sender_encrypted_text.as_deref())
        .bind(payload.recipient_encrypted_text.as_deref())
        .bind(payload.sender_encrypted_file.as_deref())
        .bind(payload.recipient_encrypted_file.as_deref())
        .bind(payload.file_metadata.clone().map(Json::<FileMetadata>))
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    /// All messages exchanged between the two users, oldest first. Insert ids
    /// give the total order.
    pub async fn fetch_conversation(&self, user_a: i64, user_b: i64) -> Result<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, ChatMessageRecord>(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM chat_messages
            WHERE (sender_id = $1 AND recipient_id = $2) OR (sender_id = $2 AND recipient_id = $1)
            ORDER BY id ASC
            "#
        ))
        .bind(user_a)
        .bind(user_b)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Into::into).collect())
    }

    /// Marks everything the peer sent to the viewer as read.
    pub async fn mark_read(&self, viewer_id: i64, peer_id: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE chat_messages
            SET is_read = TRUE
            WHERE sender_id = $1 AND recipient_id = $2 AND NOT is_read
            "#,
        )
        .bind(peer_id)
        .bind(viewer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn fetch_by_id(&self, message_id: i64) -> Result<Option<ChatMessage>> {
        let record = sqlx::query_as::<_, ChatMessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = $1"
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }
}
