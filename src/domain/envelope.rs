use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// AES block size; the IV is always exactly one block.
pub const IV_LEN: usize = 16;

/// One encrypted copy of a message or file: AES-CBC ciphertext, the IV, and
/// the per-message AES key wrapped under the target's RSA public key. Stored
/// and transmitted as a single JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub encrypted_message: String,
    pub iv: String,
    pub encrypted_key: String,
}

impl Envelope {
    #[must_use]
    pub fn from_parts(ciphertext: &[u8], iv: &[u8], wrapped_key: &[u8]) -> Self {
        Self {
            encrypted_message: BASE64.encode(ciphertext),
            iv: BASE64.encode(iv),
            encrypted_key: BASE64.encode(wrapped_key),
        }
    }

    /// Decodes the three base64 components, enforcing the fixed IV length.
    /// `None` covers every malformed shape; callers fold it into their own
    /// uniform failure so the cause is not observable.
    #[must_use]
    pub fn decode_parts(&self) -> Option<(Vec<u8>, Vec<u8>, Vec<u8>)> {
        let ciphertext = BASE64.decode(&self.encrypted_message).ok()?;
        let iv = BASE64.decode(&self.iv).ok()?;
        let wrapped_key = BASE64.decode(&self.encrypted_key).ok()?;

        if iv.len() != IV_LEN {
            return None;
        }

        Some((ciphertext, iv, wrapped_key))
    }
}
