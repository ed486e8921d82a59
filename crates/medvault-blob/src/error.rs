//! Error types for the blob client.

use medvault_core::CryptoError;
use thiserror::Error;

/// Failures talking to the blob store. Transient; the operation may be retried.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Connection, DNS or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success status.
    #[error("blob store returned status {status} for {target}")]
    Status { status: u16, target: String },

    /// The call did not finish within the configured timeout.
    #[error("blob store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// No blob at the given address.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The store's response could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors from [`crate::EncryptedBlobClient`].
#[derive(Debug, Error)]
pub enum BlobError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl BlobError {
    /// Whether retrying the same call might succeed.
    ///
    /// Crypto failures are deterministic for a given key and blob.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BlobError::Storage(_))
    }
}

/// Result type for transport operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, BlobError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retryable_classification() {
        assert!(BlobError::from(StorageError::Timeout(Duration::from_secs(1))).is_retryable());
        assert!(BlobError::from(StorageError::NotFound("x".into())).is_retryable());
        assert!(!BlobError::from(CryptoError::Decryption).is_retryable());
    }
}
