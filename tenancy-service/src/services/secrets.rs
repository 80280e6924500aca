//! Secret codec: encrypts credential values at rest and produces their
//! masked display form.
//!
//! Wire format for stored values: base64(nonce (12) || ciphertext || tag),
//! AES-256-GCM under a process-wide master key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use thiserror::Error;

/// Total width of a masked secret.
const MASK_WIDTH: usize = 12;
/// At most this many trailing characters stay visible.
const VISIBLE_SUFFIX: usize = 4;
const MASK_CHAR: char = '*';

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("master key must be 64 hex characters (32 bytes)")]
    InvalidKey,
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed (wrong key or corrupted value)")]
    Decrypt,
    #[error("stored value is not valid base64")]
    Encoding,
}

/// Encrypts, decrypts, and masks credential field values.
#[derive(Clone)]
pub struct SecretCodec {
    key: [u8; 32],
}

impl SecretCodec {
    /// Build a codec from a hex-encoded 32-byte master key.
    pub fn from_hex(hex_key: &Secret<String>) -> Result<Self, CodecError> {
        let bytes = hex::decode(hex_key.expose_secret().trim()).map_err(|_| CodecError::InvalidKey)?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| CodecError::InvalidKey)?;
        Ok(Self { key })
    }

    /// Deterministic dev-mode key so local setups work without provisioning
    /// one. Refused in production by config validation.
    pub fn dev() -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"propstack-dev-master-key-not-for-production");
        let digest = hasher.finalize();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypt a plaintext field value into its at-rest string form.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CodecError::Encrypt)?;

        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CodecError::Encrypt)?;

        let mut payload = Vec::with_capacity(12 + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    /// Decrypt a stored value produced by [`Self::encrypt`].
    pub fn decrypt(&self, stored: &str) -> Result<String, CodecError> {
        let payload = BASE64.decode(stored).map_err(|_| CodecError::Encoding)?;
        if payload.len() < 12 {
            return Err(CodecError::Decrypt);
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CodecError::Decrypt)?;
        let nonce = Nonce::from_slice(&payload[..12]);
        let plaintext = cipher
            .decrypt(nonce, &payload[12..])
            .map_err(|_| CodecError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CodecError::Decrypt)
    }
}

/// Masked display form of a secret: fixed width, at most the last four
/// characters visible, fully starred when the value is too short for a
/// suffix to be safe. Deterministic in the plaintext.
pub fn mask_secret(plaintext: &str) -> String {
    let chars: Vec<char> = plaintext.chars().collect();
    if chars.len() <= 2 * VISIBLE_SUFFIX {
        return MASK_CHAR.to_string().repeat(MASK_WIDTH);
    }
    let suffix: String = chars[chars.len() - VISIBLE_SUFFIX..].iter().collect();
    let stars = MASK_CHAR.to_string().repeat(MASK_WIDTH - VISIBLE_SUFFIX);
    format!("{}{}", stars, suffix)
}
