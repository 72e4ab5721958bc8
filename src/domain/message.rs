use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Metadata describing an encrypted file attachment. The `type` field carries
/// the MIME type the client should restore after decrypting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// One stored chat message. Text and file payloads each exist as two
/// independently encrypted copies, one per party; this subsystem never sees
/// the plaintext behind either.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub sender_encrypted_text: Option<String>,
    pub recipient_encrypted_text: Option<String>,
    pub sender_encrypted_file: Option<Vec<u8>>,
    pub recipient_encrypted_file: Option<Vec<u8>>,
    pub file_metadata: Option<FileMetadata>,
    pub created_at: OffsetDateTime,
    pub is_read: bool,
}

impl ChatMessage {
    #[must_use]
    pub const fn has_file(&self) -> bool {
        self.sender_encrypted_file.is_some()
    }

    /// The text ciphertext the given viewer is allowed to see: the sender
    /// copy for the sender, the recipient copy for everyone else. The other
    /// party's copy never leaves the store.
    #[must_use]
    pub fn text_copy_for(&self, viewer_id: i64) -> Option<&str> {
        if viewer_id == self.sender_id {
            self.sender_encrypted_text.as_deref()
        } else {
            self.recipient_encrypted_text.as_deref()
        }
    }

    #[must_use]
    pub fn file_copy_for(&self, viewer_id: i64) -> Option<&[u8]> {
        if viewer_id == self.sender_id {
            self.sender_encrypted_file.as_deref()
        } else {
            self.recipient_encrypted_file.as_deref()
        }
    }

    #[must_use]
    pub fn involves(&self, user_id: i64) -> bool {
        self.sender_id == user_id || self.recipient_id == user_id
    }
}

/// One history row as a specific viewer is allowed to see it: their own
/// ciphertext copy, never the other party's.
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub encrypted_message: Option<String>,
    pub has_file: bool,
    pub file_metadata: Option<FileMetadata>,
    pub timestamp: OffsetDateTime,
    pub is_read: bool,
    pub is_from_doctor: bool,
}

impl ConversationEntry {
    #[must_use]
    pub fn viewed_by(message: &ChatMessage, viewer_id: i64, is_from_doctor: bool) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            encrypted_message: message.text_copy_for(viewer_id).map(ToOwned::to_owned),
            has_file: message.has_file(),
            file_metadata: message.file_metadata.clone(),
            timestamp: message.created_at,
            is_read: message.is_read,
            is_from_doctor,
        }
    }
}

/// An encrypted attachment ready for download, still ciphertext; only the
/// viewer's private key can open it.
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// A pre-encrypted outgoing message as submitted by the sender.
#[derive(Debug, Clone, Default)]
pub struct OutgoingPayload {
    pub sender_encrypted_text: Option<String>,
    pub recipient_encrypted_text: Option<String>,
    pub sender_encrypted_file: Option<Vec<u8>>,
    pub recipient_encrypted_file: Option<Vec<u8>>,
    pub file_metadata: Option<FileMetadata>,
}

impl OutgoingPayload {
    /// A message must carry a complete text pair and/or a complete file pair;
    /// file payloads must come with metadata.
    ///
    /// # Errors
    /// Returns `AppError::BadRequest` when the payload is incomplete.
    pub fn validate(&self) -> Result<()> {
        let text_fields = [self.sender_encrypted_text.is_some(), self.recipient_encrypted_text.is_some()];
        let file_fields = [self.sender_encrypted_file.is_some(), self.recipient_encrypted_file.is_some()];

        let has_text = match text_fields {
            [true, true] => true,
            [false, false] => false,
            _ => {
                return Err(AppError::BadRequest("Both encrypted message copies are required".to_string()));
            }
        };

        let has_file = match file_fields {
            [true, true] => true,
            [false, false] => false,
            _ => {
                return Err(AppError::BadRequest("Both encrypted file copies are required".to_string()));
            }
        };

        if !has_text && !has_file {
            return Err(AppError::BadRequest("A message requires an encrypted text or file payload".to_string()));
        }

        if has_file && self.file_metadata.is_none() {
            return Err(AppError::BadRequest("File metadata is required for file attachments".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_payload() -> OutgoingPayload {
        OutgoingPayload {
            sender_encrypted_text: Some("env-a".to_string()),
            recipient_encrypted_text: Some("env-b".to_string()),
            ..OutgoingPayload::default()
        }
    }

    #[test]
    fn test_text_payload_valid() {
        assert!(text_payload().validate().is_ok());
    }

    #[test]
    fn test_empty_payload_rejected() {
        let payload = OutgoingPayload::default();
        assert!(matches!(payload.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_half_text_pair_rejected() {
        let payload = OutgoingPayload {
            sender_encrypted_text: Some("env-a".to_string()),
            ..OutgoingPayload::default()
        };
        assert!(matches!(payload.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_file_without_metadata_rejected() {
        let payload = OutgoingPayload {
            sender_encrypted_file: Some(vec![1, 2, 3]),
            recipient_encrypted_file: Some(vec![4, 5, 6]),
            file_metadata: None,
            ..OutgoingPayload::default()
        };
        assert!(matches!(payload.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_file_with_metadata_valid() {
        let payload = OutgoingPayload {
            sender_encrypted_file: Some(vec![1, 2, 3]),
            recipient_encrypted_file: Some(vec![4, 5, 6]),
            file_metadata: Some(FileMetadata {
                filename: "scan.pdf".to_string(),
                content_type: "application/pdf".to_string(),
            }),
            ..OutgoingPayload::default()
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_text_copy_selection_per_viewer() {
        let msg = ChatMessage {
            id: 1,
            sender_id: 20,
            recipient_id: 10,
            sender_encrypted_text: Some("sender-copy".to_string()),
            recipient_encrypted_text: Some("recipient-copy".to_string()),
            sender_encrypted_file: None,
            recipient_encrypted_file: None,
            file_metadata: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            is_read: false,
        };

        assert_eq!(msg.text_copy_for(20), Some("sender-copy"));
        assert_eq!(msg.text_copy_for(10), Some("recipient-copy"));
    }
}
