use crate::domain::message::FileMetadata;
use sqlx::types::Json;
use time::OffsetDateTime;

#[derive(sqlx::FromRow)]
pub(crate) struct ChatMessageRecord {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub sender_encrypted_text: Option<String>,
    pub recipient_encrypted_text: Option<String>,
    pub sender_encrypted_file: Option<Vec<u8>>,
    pub recipient_encrypted_file: Option<Vec<u8>>,
    pub file_metadata: Option<Json<FileMetadata>>,
    pub created_at: OffsetDateTime,
    pub is_read: bool,
}

impl From<ChatMessageRecord> for crate::domain::message::ChatMessage {
    fn from(record: ChatMessageRecord) -> Self {
        Self {
            id: record.id,
            sender_id: record.sender_id,
            recipient_id: record.recipient_id,
            sender_encrypted_text: record.sender_encrypted_text,
            recipient_encrypted_text: record.recipient_encrypted_text,
            sender_encrypted_file: record.sender_encrypted_file,
            recipient_encrypted_file: record.recipient_encrypted_file,
            file_metadata: record.file_metadata.map(|Json(meta)| meta),
            created_at: record.created_at,
            is_read: record.is_read,
        }
    }
}
