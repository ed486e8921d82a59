//! Symmetric cipher: ChaCha20-Poly1305 with a 256-bit key.
//!
//! Wire format of an encrypted blob: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! A fresh random nonce is generated on every [`encrypt`] call.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CryptoError, Result};

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Poly1305 tag length in bytes.
pub const TAG_LEN: usize = 16;

/// A 256-bit symmetric encryption key for ChaCha20-Poly1305.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: KEY_LEN,
                    got: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encrypt with an explicit nonce. Returns ciphertext with the tag appended.
    pub fn encrypt_with_nonce(&self, plaintext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    /// Decrypt ciphertext (with tag) produced under the given nonce.
    pub fn decrypt_with_nonce(&self, ciphertext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher =
            ChaCha20Poly1305::new_from_slice(&self.0).map_err(|_| CryptoError::Decryption)?;

        cipher
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|_| CryptoError::Decryption)
    }

    /// Encrypt into the `nonce || ciphertext` blob format with a fresh nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = self.encrypt_with_nonce(plaintext, &nonce)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce.0);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a `nonce || ciphertext` blob.
    pub fn open(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Malformed(format!(
                "blob too short: {} bytes, need at least {}",
                blob.len(),
                NONCE_LEN + TAG_LEN
            )));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);
        self.decrypt_with_nonce(ciphertext, &EncryptionNonce(nonce))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; NONCE_LEN]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// Encrypt `plaintext` under a raw 32-byte key.
///
/// Returns `nonce || ciphertext`. Fails with [`CryptoError::InvalidKeyLength`]
/// if `key` is not exactly 32 bytes.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    EncryptionKey::from_slice(key)?.seal(plaintext)
}

/// Decrypt a `nonce || ciphertext` blob under a raw 32-byte key.
pub fn decrypt(blob: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    EncryptionKey::from_slice(key)?.open(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = EncryptionKey::generate();
        let blob = encrypt(b"hello, world!", key.as_bytes()).unwrap();

        assert_eq!(blob.len(), NONCE_LEN + 13 + TAG_LEN);
        assert_eq!(decrypt(&blob, key.as_bytes()).unwrap(), b"hello, world!");
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = EncryptionKey::generate();
        let a = encrypt(b"same", key.as_bytes()).unwrap();
        let b = encrypt(b"same", key.as_bytes()).unwrap();

        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_length() {
        let err = encrypt(b"data", &[0u8; 16]).unwrap_err();
        assert_eq!(
            err,
            CryptoError::InvalidKeyLength {
                expected: 32,
                got: 16
            }
        );

        assert!(matches!(
            decrypt(&[0u8; 64], &[0u8; 31]),
            Err(CryptoError::InvalidKeyLength { got: 31, .. })
        ));
    }

    #[test]
    fn test_blob_too_short() {
        let key = EncryptionKey::generate();
        let err = decrypt(&[1u8; NONCE_LEN + 3], key.as_bytes()).unwrap_err();
        assert!(matches!(err, CryptoError::Malformed(_)));
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let key1 = EncryptionKey::generate();
        let key2 = EncryptionKey::generate();
        let blob = encrypt(b"secret", key1.as_bytes()).unwrap();

        assert_eq!(decrypt(&blob, key2.as_bytes()), Err(CryptoError::Decryption));
    }

    #[test]
    fn test_corrupted_blob_fails() {
        let key = EncryptionKey::generate();
        let mut blob = encrypt(b"lab results", key.as_bytes()).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;

        assert_eq!(decrypt(&blob, key.as_bytes()), Err(CryptoError::Decryption));
    }

    #[test]
    fn test_empty_plaintext() {
        let key = EncryptionKey::generate();
        let blob = encrypt(b"", key.as_bytes()).unwrap();
        assert_eq!(decrypt(&blob, key.as_bytes()).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = EncryptionKey::from_bytes([0xab; 32]);
        assert!(!format!("{:?}", key).contains("ab"));
    }

    proptest! {
        #[test]
        fn roundtrip_any_plaintext(
            plaintext in prop::collection::vec(any::<u8>(), 0..2048),
            key in any::<[u8; 32]>(),
        ) {
            let blob = encrypt(&plaintext, &key).unwrap();
            prop_assert_eq!(decrypt(&blob, &key).unwrap(), plaintext);
        }
    }
}
