use crate::domain::message::{ChatMessage, FileMetadata};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The `new_message` event pushed to a recipient's channel. Text messages
/// carry both ciphertext copies inline so an open conversation can render
/// without a refetch; file messages carry metadata only and the blob is
/// fetched over HTTP. The push is advisory either way; history remains the
/// source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessageEvent {
    pub message_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub is_from_doctor: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_encrypted_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_encrypted_message: Option<String>,
    pub has_file: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_metadata: Option<FileMetadata>,
}

impl NewMessageEvent {
    #[must_use]
    pub fn for_stored(message: &ChatMessage, is_from_doctor: bool) -> Self {
        Self {
            message_id: message.id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            timestamp: message.created_at,
            is_from_doctor,
            sender_encrypted_message: message.sender_encrypted_text.clone(),
            recipient_encrypted_message: message.recipient_encrypted_text.clone(),
            has_file: message.has_file(),
            file_metadata: message.file_metadata.clone(),
        }
    }
}
