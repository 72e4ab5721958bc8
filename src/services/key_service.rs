use crate::domain::keys::{KeyPair, PemKeyPair, ProvisionOutcome};
use crate::error::{AppError, Result};
use crate::services::crypto_service::{CryptoError, CryptoService};
use crate::storage::key_repo::KeyRepository;
use crate::storage::user_repo::UserRepository;
use opentelemetry::{KeyValue, global, metrics::Counter};

#[derive(Clone, Debug)]
struct Metrics {
    provisioned_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("telereach-server");
        Self {
            provisioned_total: meter
                .u64_counter("telereach_key_pairs_provisioned_total")
                .with_description("Key pairs written to the key store")
                .build(),
        }
    }
}

/// Key lifecycle: provisioning (server- or client-generated), overwrite
/// semantics, and lookups for the messaging routes.
#[derive(Clone, Debug)]
pub struct KeyService {
    repo: KeyRepository,
    users: UserRepository,
    crypto: CryptoService,
    metrics: Metrics,
}

impl KeyService {
    #[must_use]
    pub fn new(repo: KeyRepository, users: UserRepository, crypto: CryptoService) -> Self {
        Self { repo, users, crypto, metrics: Metrics::new() }
    }

    /// Provisions a key pair for a user, overwriting any existing one.
    /// Client-supplied keys are used as-is after a well-formedness check;
    /// otherwise a fresh pair is generated server-side. Safe to call
    /// repeatedly.
    ///
    /// # Errors
    /// `AppError::BadRequest` for unparseable client keys,
    /// `AppError::Database` if the store write fails.
    #[tracing::instrument(err(level = "warn"), skip(self, client_keys), fields(user_id = %user_id))]
    pub async fn provision(&self, user_id: i64, client_keys: Option<PemKeyPair>) -> Result<KeyPair> {
        let (pair, source) = match client_keys {
            Some(pair) => {
                self.crypto
                    .validate_pem_pair(&pair)
                    .map_err(|_| AppError::BadRequest("Invalid PEM key pair".to_string()))?;
                (pair, "client")
            }
            None => (self.generate_pair()?, "server"),
        };

        let stored = self.repo.upsert(user_id, &pair.public_key, &pair.private_key).await?;
        self.metrics.provisioned_total.add(1, &[KeyValue::new("source", source)]);
        tracing::debug!(source, "Key pair provisioned");

        Ok(stored)
    }

    /// Generates and stores a pair for a peer that has none yet. Reports
    /// `AlreadyExists` without touching the row otherwise.
    ///
    /// # Errors
    /// `AppError::NotFound` if the target user does not exist.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(target_user_id = %target_user_id))]
    pub async fn provision_if_absent(&self, target_user_id: i64) -> Result<ProvisionOutcome> {
        if !self.users.exists(target_user_id).await? {
            return Err(AppError::NotFound);
        }

        // Cheap pre-check; the insert below is ON CONFLICT DO NOTHING, so a
        // concurrent provision still cannot overwrite an existing pair.
        if self.repo.exists(target_user_id).await? {
            return Ok(ProvisionOutcome::AlreadyExists);
        }

        let pair = self.generate_pair()?;
        if self.repo.insert_if_absent(target_user_id, &pair.public_key, &pair.private_key).await? {
            self.metrics.provisioned_total.add(1, &[KeyValue::new("source", "peer-triggered")]);
            Ok(ProvisionOutcome::Created)
        } else {
            Ok(ProvisionOutcome::AlreadyExists)
        }
    }

    /// Public key of any user. Absence is a normal outcome for new accounts.
    ///
    /// # Errors
    /// `AppError::NotFound` when the user has no keys.
    #[tracing::instrument(err(level = "debug"), skip(self), fields(user_id = %user_id))]
    pub async fn get_public_key(&self, user_id: i64) -> Result<String> {
        self.repo.fetch_public_key(user_id).await?.ok_or(AppError::NotFound)
    }

    /// Full key pair, private half included. Routes must only call this for
    /// the authenticated owner.
    ///
    /// # Errors
    /// `AppError::NotFound` when the user has no keys.
    #[tracing::instrument(err(level = "debug"), skip(self), fields(user_id = %user_id))]
    pub async fn get_key_pair(&self, user_id: i64) -> Result<KeyPair> {
        self.repo.fetch_key_pair(user_id).await?.ok_or(AppError::NotFound)
    }

    fn generate_pair(&self) -> Result<PemKeyPair> {
        self.crypto.generate_key_pair().map_err(|e: CryptoError| {
            tracing::error!(error = %e, "Server-side key generation failed");
            AppError::Internal
        })
    }
}
