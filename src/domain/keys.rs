use time::OffsetDateTime;

/// A user's RSA key pair, PEM-encoded. The private key is sensitive: it is
/// stored at rest and only ever served to its owner.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub user_id: i64,
    pub public_key: String,
    pub private_key: String,
    pub created_at: OffsetDateTime,
}

/// A freshly generated or client-supplied PEM pair, not yet persisted.
#[derive(Debug, Clone)]
pub struct PemKeyPair {
    pub public_key: String,
    pub private_key: String,
}

/// Outcome of provisioning keys for a peer that may already hold some.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExists,
}
