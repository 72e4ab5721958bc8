use crate::domain::keys::KeyPair;
use serde::{Deserialize, Serialize};

/// Body of POST /encryption-keys/generate. Both halves or neither: supplying
/// only one is rejected.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateKeysRequest {
    pub public_key: Option<String>,
    pub private_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct KeyPairBody {
    pub public_key: String,
    pub private_key: String,
}

impl From<KeyPair> for KeyPairBody {
    fn from(pair: KeyPair) -> Self {
        Self { public_key: pair.public_key, private_key: pair.private_key }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateKeysResponse {
    pub message: String,
    pub keys: KeyPairBody,
}

#[derive(Debug, Serialize)]
pub struct TriggerGenerationResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    pub public_key: String,
}
