use crate::domain::user::Role;
use crate::error::Result;
use crate::storage::relationship_repo::RelationshipRepository;

/// Gatekeeper for message exchange: only an active doctor-patient pair may
/// talk. Stateless; every call goes back to the store so association changes
/// apply immediately.
#[derive(Clone, Debug)]
pub struct RelationshipService {
    repo: RelationshipRepository,
}

impl RelationshipService {
    #[must_use]
    pub fn new(repo: RelationshipRepository) -> Self {
        Self { repo }
    }

    /// Whether the sender may message the recipient. A doctor may message
    /// their own patients; a patient may message their own doctor; nothing
    /// else is authorized.
    #[tracing::instrument(skip(self), fields(sender_id = %sender_id, recipient_id = %recipient_id))]
    pub async fn authorize(&self, sender_id: i64, sender_role: Role, recipient_id: i64) -> Result<bool> {
        match sender_role {
            Role::Doctor => self.repo.association_exists(sender_id, recipient_id).await,
            Role::Patient => self.repo.association_exists(recipient_id, sender_id).await,
        }
    }
}
