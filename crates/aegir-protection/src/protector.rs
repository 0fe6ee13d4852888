//! Purpose-scoped `protect`/`unprotect` capability.
//!
//! A protector is keyed by an ordered list of purpose labels. The labels
//! used to unprotect must match the labels used to protect exactly; any
//! divergence changes the derived key and authentication fails. This scopes
//! each ciphertext to one specific use.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::ProtectionError;

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Purpose-scoped authenticated encryption capability.
pub trait DataProtector: Send + Sync {
    /// Encrypt and authenticate `plaintext` under the given purpose chain.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::Crypto`] on encryption failure.
    fn protect(&self, purposes: &[&str], plaintext: &[u8]) -> Result<Vec<u8>, ProtectionError>;

    /// Reverse [`DataProtector::protect`]. Fails unless the purpose chain
    /// matches the one used at protection time.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::InvalidToken`] when the payload is
    /// malformed or fails authentication (including purpose mismatch).
    fn unprotect(&self, purposes: &[&str], ciphertext: &[u8]) -> Result<Vec<u8>, ProtectionError>;
}

/// AES-256-GCM protector with per-purpose-chain key derivation.
///
/// The working key is `SHA-256(root_key ‖ len(p1) ‖ p1 ‖ len(p2) ‖ p2 …)`,
/// so distinct purpose chains never share a key and label-boundary
/// ambiguity (`["ab","c"]` vs `["a","bc"]`) cannot collide.
pub struct AesGcmProtector {
    root_key: Vec<u8>,
}

impl AesGcmProtector {
    /// Create a protector from root key material.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectionError::InvalidKey`] for an empty root key.
    pub fn new(root_key: impl Into<Vec<u8>>) -> Result<Self, ProtectionError> {
        let root_key = root_key.into();
        if root_key.is_empty() {
            return Err(ProtectionError::InvalidKey(
                "protection root key must not be empty".into(),
            ));
        }
        Ok(Self { root_key })
    }

    fn derive_key(&self, purposes: &[&str]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.root_key);
        for purpose in purposes {
            hasher.update((purpose.len() as u64).to_le_bytes());
            hasher.update(purpose.as_bytes());
        }
        hasher.finalize().into()
    }

    fn cipher(&self, purposes: &[&str]) -> Result<Aes256Gcm, ProtectionError> {
        let key = self.derive_key(purposes);
        Aes256Gcm::new_from_slice(&key)
            .map_err(|e| ProtectionError::Crypto(format!("cipher construction failed: {e}")))
    }
}

impl DataProtector for AesGcmProtector {
    fn protect(&self, purposes: &[&str], plaintext: &[u8]) -> Result<Vec<u8>, ProtectionError> {
        let cipher = self.cipher(purposes)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| ProtectionError::Crypto(format!("encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn unprotect(&self, purposes: &[&str], ciphertext: &[u8]) -> Result<Vec<u8>, ProtectionError> {
        if ciphertext.len() <= NONCE_LEN {
            return Err(ProtectionError::InvalidToken(
                "protected payload too short".into(),
            ));
        }
        let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
        let cipher = self.cipher(purposes)?;

        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), body)
            .map_err(|_| {
                ProtectionError::InvalidToken("payload failed authentication".into())
            })
    }
}

impl std::fmt::Debug for AesGcmProtector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmProtector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protector() -> AesGcmProtector {
        AesGcmProtector::new(b"root-key-material".to_vec()).unwrap()
    }

    #[test]
    fn test_empty_root_key_fails_fast() {
        assert!(matches!(
            AesGcmProtector::new(Vec::new()),
            Err(ProtectionError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_protect_unprotect_round_trip() {
        let protector = protector();
        let purposes = ["aegir", "access", "reference"];

        let protected = protector.protect(&purposes, b"payload").unwrap();
        let recovered = protector.unprotect(&purposes, &protected).unwrap();

        assert_eq!(recovered, b"payload");
    }

    #[test]
    fn test_mismatched_purposes_fail() {
        let protector = protector();
        let protected = protector
            .protect(&["aegir", "access", "reference"], b"payload")
            .unwrap();

        let result = protector.unprotect(&["aegir", "refresh", "reference"], &protected);
        assert!(matches!(result, Err(ProtectionError::InvalidToken(_))));
    }

    #[test]
    fn test_purpose_boundaries_are_unambiguous() {
        let protector = protector();
        let protected = protector.protect(&["ab", "c"], b"payload").unwrap();

        // Same concatenated bytes, different chain: must not decrypt.
        let result = protector.unprotect(&["a", "bc"], &protected);
        assert!(matches!(result, Err(ProtectionError::InvalidToken(_))));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let protector = protector();
        let purposes = ["aegir", "access", "reference"];
        let mut protected = protector.protect(&purposes, b"payload").unwrap();
        let last = protected.len() - 1;
        protected[last] ^= 0x01;

        let result = protector.unprotect(&purposes, &protected);
        assert!(matches!(result, Err(ProtectionError::InvalidToken(_))));
    }

    #[test]
    fn test_truncated_payload_is_invalid_not_panic() {
        let protector = protector();
        let result = protector.unprotect(&["aegir"], &[0u8; 5]);
        assert!(matches!(result, Err(ProtectionError::InvalidToken(_))));
    }

    #[test]
    fn test_nonce_varies_between_calls() {
        let protector = protector();
        let purposes = ["aegir"];
        let a = protector.protect(&purposes, b"payload").unwrap();
        let b = protector.protect(&purposes, b"payload").unwrap();
        assert_ne!(a, b);
    }
}
