//! Sealed storage for provider credentials using AES-256-GCM.
//!
//! Credentials are serialized to JSON, encrypted, and stored as base64
//! `nonce || ciphertext || tag`. The key comes from the environment and the
//! plaintext never leaves this module except through `open`.

use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

use crate::google::StoredCredentials;

const NONCE_LENGTH: usize = 12;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed")]
    Seal,

    #[error("Decryption failed or data tampered")]
    Open,

    #[error("Invalid credential payload: {0}")]
    Payload(String),
}

/// Encrypts and decrypts credential envelopes
pub struct CredentialVault {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl CredentialVault {
    /// Build a vault from a 32-byte base64-encoded key
    pub fn from_base64_key(key_b64: &str) -> Result<Self, VaultError> {
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(key_b64)
            .map_err(|e| VaultError::InvalidKey(e.to_string()))?;

        if key_bytes.len() != 32 {
            return Err(VaultError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                key_bytes.len()
            )));
        }

        let unbound_key = UnboundKey::new(&AES_256_GCM, &key_bytes)
            .map_err(|_| VaultError::InvalidKey("unusable key material".to_string()))?;

        Ok(Self {
            key: LessSafeKey::new(unbound_key),
            rng: SystemRandom::new(),
        })
    }

    /// Seal credentials into a base64 envelope
    pub fn seal(&self, credentials: &StoredCredentials) -> Result<String, VaultError> {
        let plaintext =
            serde_json::to_vec(credentials).map_err(|e| VaultError::Payload(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        self.rng.fill(&mut nonce_bytes).map_err(|_| VaultError::Seal)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext;
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| VaultError::Seal)?;

        let mut envelope = nonce_bytes.to_vec();
        envelope.extend_from_slice(&in_out);

        Ok(base64::engine::general_purpose::STANDARD.encode(&envelope))
    }

    /// Open a base64 envelope back into credentials
    pub fn open(&self, envelope_b64: &str) -> Result<StoredCredentials, VaultError> {
        let envelope = base64::engine::general_purpose::STANDARD
            .decode(envelope_b64)
            .map_err(|_| VaultError::Open)?;

        if envelope.len() < NONCE_LENGTH {
            return Err(VaultError::Open);
        }

        let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LENGTH);
        let mut nonce_array = [0u8; NONCE_LENGTH];
        nonce_array.copy_from_slice(nonce_bytes);
        let nonce = Nonce::assume_unique_for_key(nonce_array);

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| VaultError::Open)?;

        serde_json::from_slice(plaintext).map_err(|e| VaultError::Payload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn test_vault() -> CredentialVault {
        let key_bytes = b"12345678901234567890123456789012";
        let key_b64 = base64::engine::general_purpose::STANDARD.encode(key_bytes);
        CredentialVault::from_base64_key(&key_b64).unwrap()
    }

    fn credentials() -> StoredCredentials {
        StoredCredentials {
            access_token: "ya29.secret-access".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_seal_open_round_trip() {
        let vault = test_vault();
        let sealed = vault.seal(&credentials()).unwrap();

        assert!(!sealed.contains("secret-access"));

        let opened = vault.open(&sealed).unwrap();
        assert_eq!(opened.access_token, "ya29.secret-access");
        assert_eq!(opened.refresh_token.as_deref(), Some("1//refresh"));
    }

    #[test]
    fn test_tampered_envelope_rejected() {
        let vault = test_vault();
        let mut sealed = vault.seal(&credentials()).unwrap();
        sealed.insert(10, 'A');

        assert!(vault.open(&sealed).is_err());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let vault = test_vault();
        let sealed = vault.seal(&credentials()).unwrap();

        let other_key = base64::engine::general_purpose::STANDARD
            .encode(b"abcdefghijklmnopqrstuvwxyz012345");
        let other_vault = CredentialVault::from_base64_key(&other_key).unwrap();

        assert!(other_vault.open(&sealed).is_err());
    }

    #[test]
    fn test_invalid_key_length() {
        let short = base64::engine::general_purpose::STANDARD.encode(b"too-short");
        assert!(matches!(
            CredentialVault::from_base64_key(&short),
            Err(VaultError::InvalidKey(_))
        ));
    }
}
