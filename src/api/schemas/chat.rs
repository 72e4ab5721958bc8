use crate::domain::message::{ConversationEntry, FileMetadata};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Body of POST /chat/send. Ciphertext only: text copies are serialized
/// envelope JSON, file copies are base64 of the encrypted bytes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub recipient_id: i64,
    pub sender_encrypted_message: Option<String>,
    pub recipient_encrypted_message: Option<String>,
    pub sender_encrypted_file: Option<String>,
    pub recipient_encrypted_file: Option<String>,
    pub file_metadata: Option<FileMetadata>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub message: String,
    pub message_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// One history row, already projected to the viewer's ciphertext copy.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_message: Option<String>,
    pub has_file: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_metadata: Option<FileMetadata>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub is_read: bool,
    pub is_from_doctor: bool,
}

impl From<ConversationEntry> for HistoryEntry {
    fn from(entry: ConversationEntry) -> Self {
        Self {
            id: entry.id,
            sender_id: entry.sender_id,
            recipient_id: entry.recipient_id,
            encrypted_message: entry.encrypted_message,
            has_file: entry.has_file,
            file_metadata: entry.file_metadata,
            timestamp: entry.timestamp,
            is_read: entry.is_read,
            is_from_doctor: entry.is_from_doctor,
        }
    }
}
