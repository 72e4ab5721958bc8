use crate::domain::envelope::{Envelope, IV_LEN};
use crate::domain::keys::PemKeyPair;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const RSA_BITS: usize = 2048;
const AES_KEY_LEN: usize = 32;
const AES_BLOCK: usize = 16;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key generation failed")]
    KeyGeneration,
    #[error("Invalid key")]
    InvalidKey,
    #[error("Encryption failed")]
    Encryption,
    // One variant for every decrypt failure: wrong key, bad padding and
    // malformed envelopes must stay indistinguishable to callers.
    #[error("Decryption failed")]
    Decryption,
}

/// Hybrid envelope codec: a fresh 256-bit AES key and 16-byte IV per call,
/// AES-256-CBC over the plaintext, and the AES key wrapped under the target's
/// RSA public key with OAEP/SHA-256. Two calls over the same plaintext always
/// yield different envelopes.
///
/// The messaging routes never call `decrypt` on message content; it exists
/// for key validation and for clients that delegate crypto to their own
/// tooling.
#[derive(Clone, Copy, Debug, Default)]
pub struct CryptoService;

impl CryptoService {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Generates a 2048-bit RSA pair with the standard public exponent,
    /// PEM-encoded (PKCS#8 private, SPKI public).
    ///
    /// # Errors
    /// Returns `CryptoError::KeyGeneration` if generation or encoding fails.
    pub fn generate_key_pair(&self) -> Result<PemKeyPair, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_BITS).map_err(|_| CryptoError::KeyGeneration)?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key.to_pkcs8_pem(LineEnding::LF).map_err(|_| CryptoError::KeyGeneration)?;
        let public_pem = public_key.to_public_key_pem(LineEnding::LF).map_err(|_| CryptoError::KeyGeneration)?;

        Ok(PemKeyPair { public_key: public_pem, private_key: private_pem.to_string() })
    }

    /// Checks that a client-supplied pair is well-formed PEM. Entropy and
    /// provenance are the client's responsibility.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidKey` if either PEM fails to parse.
    pub fn validate_pem_pair(&self, pair: &PemKeyPair) -> Result<(), CryptoError> {
        parse_public_key(&pair.public_key)?;
        parse_private_key(&pair.private_key).map_err(|_| CryptoError::InvalidKey)?;
        Ok(())
    }

    /// Encrypts a plaintext for whoever holds the private half of the given
    /// public key.
    ///
    /// # Errors
    /// `CryptoError::InvalidKey` for an unparseable public key,
    /// `CryptoError::Encryption` if wrapping fails.
    pub fn encrypt(&self, plaintext: &str, recipient_public_key_pem: &str) -> Result<Envelope, CryptoError> {
        let public_key = parse_public_key(recipient_public_key_pem)?;

        let mut key = [0u8; AES_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let data = plaintext.as_bytes();
        let mut buffer = vec![0u8; data.len() + AES_BLOCK];
        buffer[..data.len()].copy_from_slice(data);

        let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into())
            .encrypt_padded_mut::<Pkcs7>(&mut buffer, data.len())
            .map_err(|_| CryptoError::Encryption)?;

        let wrapped_key =
            public_key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), &key).map_err(|_| CryptoError::Encryption)?;

        Ok(Envelope::from_parts(ciphertext, &iv, &wrapped_key))
    }

    /// Recovers the plaintext from an envelope with the matching private key.
    ///
    /// # Errors
    /// `CryptoError::Decryption`, regardless of cause.
    pub fn decrypt(&self, envelope: &Envelope, private_key_pem: &str) -> Result<String, CryptoError> {
        let private_key = parse_private_key(private_key_pem)?;
        let (ciphertext, iv, wrapped_key) = envelope.decode_parts().ok_or(CryptoError::Decryption)?;

        let key = private_key.decrypt(Oaep::new::<Sha256>(), &wrapped_key).map_err(|_| CryptoError::Decryption)?;
        let key: [u8; AES_KEY_LEN] = key.try_into().map_err(|_| CryptoError::Decryption)?;
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| CryptoError::Decryption)?;

        let mut buffer = ciphertext;
        let plaintext = Aes256CbcDec::new(&key.into(), &iv.into())
            .decrypt_padded_mut::<Pkcs7>(&mut buffer)
            .map_err(|_| CryptoError::Decryption)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| CryptoError::Decryption)
    }

    /// Decrypts an envelope serialized as JSON, as stored and transmitted.
    ///
    /// # Errors
    /// `CryptoError::Decryption`, regardless of cause.
    pub fn decrypt_json(&self, envelope_json: &str, private_key_pem: &str) -> Result<String, CryptoError> {
        let envelope: Envelope = serde_json::from_str(envelope_json).map_err(|_| CryptoError::Decryption)?;
        self.decrypt(&envelope, private_key_pem)
    }
}

// PKCS#8 is what we emit; PKCS#1 covers clients using older tooling.
fn parse_public_key(pem: &str) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem).map_err(|_| CryptoError::InvalidKey))
}

fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, CryptoError> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem).map_err(|_| CryptoError::Decryption))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_and_pair() -> (CryptoService, PemKeyPair) {
        let service = CryptoService::new();
        let pair = service.generate_key_pair().expect("key generation");
        (service, pair)
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let (service, pair) = service_and_pair();
        let plaintext = "How has your balance been since the last visit?";

        let envelope = service.encrypt(plaintext, &pair.public_key).unwrap();
        let recovered = service.decrypt(&envelope, &pair.private_key).unwrap();

        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn test_encryption_is_randomized() {
        let (service, pair) = service_and_pair();
        let plaintext = "same plaintext";

        let first = service.encrypt(plaintext, &pair.public_key).unwrap();
        let second = service.encrypt(plaintext, &pair.public_key).unwrap();

        assert_ne!(first, second);
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.encrypted_key, second.encrypted_key);
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let (service, pair) = service_and_pair();
        let other = service.generate_key_pair().unwrap();

        let envelope = service.encrypt("for the right key only", &pair.public_key).unwrap();
        let result = service.decrypt(&envelope, &other.private_key);

        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_decrypt_malformed_json_fails() {
        let (service, pair) = service_and_pair();

        let result = service.decrypt_json("{not valid json", &pair.private_key);
        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_decrypt_tampered_ciphertext_fails() {
        let (service, pair) = service_and_pair();
        let mut envelope = service.encrypt("untampered", &pair.public_key).unwrap();
        envelope.encrypted_message = envelope.encrypted_key.clone();

        let result = service.decrypt(&envelope, &pair.private_key);
        assert!(matches!(result, Err(CryptoError::Decryption)));
    }

    #[test]
    fn test_envelope_json_is_storable() {
        let (service, pair) = service_and_pair();
        let envelope = service.encrypt("stored as one blob", &pair.public_key).unwrap();

        let json = serde_json::to_string(&envelope).unwrap();
        let recovered = service.decrypt_json(&json, &pair.private_key).unwrap();

        assert_eq!(recovered, "stored as one blob");
    }

    #[test]
    fn test_validate_accepts_generated_pair() {
        let (service, pair) = service_and_pair();
        assert!(service.validate_pem_pair(&pair).is_ok());
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let service = CryptoService::new();
        let pair = PemKeyPair { public_key: "not a pem".to_string(), private_key: "also not".to_string() };

        assert!(matches!(service.validate_pem_pair(&pair), Err(CryptoError::InvalidKey)));
    }
}
