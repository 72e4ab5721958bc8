use crate::config::MessagingConfig;
use crate::domain::message::{ChatMessage, ConversationEntry, FileDownload, OutgoingPayload};
use crate::domain::notification::NewMessageEvent;
use crate::domain::user::Role;
use crate::error::{AppError, Result};
use crate::services::notification::NotificationService;
use crate::services::relationship_service::RelationshipService;
use crate::storage::message_repo::MessageRepository;
use crate::storage::user_repo::UserRepository;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct Metrics {
    sent_total: Counter<u64>,
    history_size: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("telereach-server");
        Self {
            sent_total: meter
                .u64_counter("telereach_messages_sent_total")
                .with_description("Messages accepted for storage")
                .build(),
            history_size: meter
                .u64_histogram("telereach_history_fetch_size")
                .with_description("Number of messages returned by a history fetch")
                .build(),
        }
    }
}

/// Messaging core: validates, authorizes, persists, and fans out. Handles
/// ciphertext only; the plaintext never reaches this process.
#[derive(Clone, Debug)]
pub struct MessageService {
    repo: MessageRepository,
    users: UserRepository,
    relationships: RelationshipService,
    notifier: Arc<dyn NotificationService>,
    config: MessagingConfig,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        repo: MessageRepository,
        users: UserRepository,
        relationships: RelationshipService,
        notifier: Arc<dyn NotificationService>,
        config: MessagingConfig,
    ) -> Self {
        Self { repo, users, relationships, notifier, config, metrics: Metrics::new() }
    }

    /// Stores a dual-encrypted message and notifies the recipient's channel.
    /// The insert is one atomic statement; a push failure after a successful
    /// insert is logged but never surfaced as a send failure.
    ///
    /// # Errors
    /// `AppError::BadRequest` for incomplete or oversized payloads,
    /// `AppError::NotFound` for an unknown recipient,
    /// `AppError::Forbidden` when no doctor-patient relationship exists.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, payload),
        fields(sender_id = %sender_id, recipient_id = %recipient_id)
    )]
    pub async fn send(
        &self,
        sender_id: i64,
        sender_role: Role,
        recipient_id: i64,
        payload: OutgoingPayload,
    ) -> Result<ChatMessage> {
        payload.validate()?;
        self.check_file_size(&payload)?;

        if !self.users.exists(recipient_id).await? {
            return Err(AppError::NotFound);
        }

        if !self.relationships.authorize(sender_id, sender_role, recipient_id).await? {
            self.metrics.sent_total.add(1, &[KeyValue::new("status", "rejected")]);
            return Err(AppError::Forbidden);
        }

        let message = match self.repo.insert(sender_id, recipient_id, &payload).await {
            Ok(message) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "success")]);
                message
            }
            Err(e) => {
                self.metrics.sent_total.add(1, &[KeyValue::new("status", "failure")]);
                return Err(e);
            }
        };

        tracing::debug!(message_id = %message.id, "Message stored");

        let event = NewMessageEvent::for_stored(&message, sender_role == Role::Doctor);
        self.notifier.notify(recipient_id, event).await;

        Ok(message)
    }

    /// Conversation between the viewer and a peer, oldest first, each row
    /// projected to the viewer's own ciphertext copy. Side effect: everything
    /// the peer sent to the viewer is marked read.
    ///
    /// # Errors
    /// `AppError::Database` if a query fails.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self),
        fields(viewer_id = %viewer_id, peer_id = %peer_id)
    )]
    pub async fn history(&self, viewer_id: i64, viewer_role: Role, peer_id: i64) -> Result<Vec<ConversationEntry>> {
        let messages = self.repo.fetch_conversation(viewer_id, peer_id).await?;
        self.metrics.history_size.record(messages.len() as u64, &[]);

        let marked = self.repo.mark_read(viewer_id, peer_id).await?;
        if marked > 0 {
            tracing::debug!(count = marked, "Marked incoming messages read");
        }

        Ok(messages
            .iter()
            .map(|message| {
                // In a doctor-patient pair the sender's role follows from the
                // viewer's: the viewer sent it, or the opposite party did.
                let is_from_doctor = if message.sender_id == viewer_id {
                    viewer_role == Role::Doctor
                } else {
                    viewer_role == Role::Patient
                };
                ConversationEntry::viewed_by(message, viewer_id, is_from_doctor)
            })
            .collect())
    }

    /// The viewer-appropriate encrypted file blob of a message.
    ///
    /// # Errors
    /// `AppError::NotFound` for an unknown message or one without a file,
    /// `AppError::Forbidden` when the viewer is neither sender nor recipient.
    #[tracing::instrument(
        err(level = "debug"),
        skip(self),
        fields(viewer_id = %viewer_id, message_id = %message_id)
    )]
    pub async fn fetch_file(&self, viewer_id: i64, message_id: i64) -> Result<FileDownload> {
        let message = self.repo.fetch_by_id(message_id).await?.ok_or(AppError::NotFound)?;

        if !message.involves(viewer_id) {
            return Err(AppError::Forbidden);
        }

        let bytes = message.file_copy_for(viewer_id).ok_or(AppError::NotFound)?.to_vec();
        let metadata = message.file_metadata.as_ref().ok_or(AppError::Internal)?;

        Ok(FileDownload { bytes, filename: metadata.filename.clone(), content_type: metadata.content_type.clone() })
    }

    fn check_file_size(&self, payload: &OutgoingPayload) -> Result<()> {
        let limit = self.config.max_file_size_bytes;
        let oversize = [&payload.sender_encrypted_file, &payload.recipient_encrypted_file]
            .into_iter()
            .flatten()
            .any(|blob| blob.len() > limit);

        if oversize {
            return Err(AppError::BadRequest(format!("Encrypted file exceeds the {limit} byte limit")));
        }
        Ok(())
    }
}
