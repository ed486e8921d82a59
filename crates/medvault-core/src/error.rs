//! Error types for MedVault core primitives.

use thiserror::Error;

/// Errors raised by the cipher and key material handling.
///
/// A `CryptoError` means the key is wrong or the data is damaged. Retrying
/// with the same key will fail the same way.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: wrong key or corrupted data")]
    Decryption,

    #[error("invalid secret: {0}")]
    InvalidSecret(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
