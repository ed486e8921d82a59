//! Encrypt-before-send, decrypt-after-receive client over a [`BlobTransport`].

use std::time::Duration;

use bytes::Bytes;
use medvault_core::cipher;

use crate::error::{BlobError, Result, StorageError};
use crate::transport::BlobTransport;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where an encrypted blob was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Content address returned by the transport.
    pub address: String,

    /// Size of the ciphertext in bytes.
    pub size: usize,
}

/// Blob store client that only ever moves ciphertext over the transport.
pub struct EncryptedBlobClient<T> {
    transport: T,
    timeout: Duration,
}

impl<T: BlobTransport> EncryptedBlobClient<T> {
    /// Create a client with the default timeout.
    pub fn new(transport: T) -> Self {
        Self::with_timeout(transport, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit per-call timeout.
    pub fn with_timeout(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Encrypt `plaintext` under `key` and store it.
    ///
    /// Nothing is sent if encryption fails.
    pub async fn store_encrypted(&self, plaintext: &[u8], key: &[u8]) -> Result<StoredBlob> {
        let blob = cipher::encrypt(plaintext, key)?;
        let size = blob.len();

        let address = tokio::time::timeout(self.timeout, self.transport.put(Bytes::from(blob)))
            .await
            .map_err(|_| StorageError::Timeout(self.timeout))??;

        tracing::debug!(address = %address, size, "stored encrypted blob");
        Ok(StoredBlob { address, size })
    }

    /// Fetch the blob at `address` and decrypt it under `key`.
    pub async fn retrieve_and_decrypt(&self, address: &str, key: &[u8]) -> Result<Vec<u8>> {
        let blob = tokio::time::timeout(self.timeout, self.transport.get(address))
            .await
            .map_err(|_| StorageError::Timeout(self.timeout))??;

        cipher::decrypt(&blob, key).map_err(BlobError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageResult;
    use crate::transport::memory::MemoryBlobTransport;
    use async_trait::async_trait;
    use medvault_core::{CryptoError, EncryptionKey};

    fn key() -> EncryptionKey {
        EncryptionKey::from_bytes([9u8; 32])
    }

    #[tokio::test]
    async fn test_store_then_retrieve() {
        let client = EncryptedBlobClient::new(MemoryBlobTransport::new());
        let key = key();

        let stored = client
            .store_encrypted(b"penicillin allergy", key.as_bytes())
            .await
            .unwrap();
        let plain = client
            .retrieve_and_decrypt(&stored.address, key.as_bytes())
            .await
            .unwrap();

        assert_eq!(plain, b"penicillin allergy");
    }

    #[tokio::test]
    async fn test_transport_never_sees_plaintext() {
        let transport = std::sync::Arc::new(MemoryBlobTransport::new());
        let client = EncryptedBlobClient::new(transport.clone());

        let stored = client
            .store_encrypted(b"secret diagnosis", key().as_bytes())
            .await
            .unwrap();
        let raw = transport.get(&stored.address).await.unwrap();

        assert!(!raw
            .windows(b"secret diagnosis".len())
            .any(|w| w == b"secret diagnosis"));
    }

    #[tokio::test]
    async fn test_bad_key_sends_nothing() {
        let client = EncryptedBlobClient::new(MemoryBlobTransport::new());
        let err = client.store_encrypted(b"x", &[0u8; 16]).await.unwrap_err();

        assert!(matches!(
            err,
            BlobError::Crypto(CryptoError::InvalidKeyLength { .. })
        ));
        assert!(!err.is_retryable());
        assert_eq!(client.transport().put_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_key_is_crypto_error() {
        let client = EncryptedBlobClient::new(MemoryBlobTransport::new());
        let stored = client.store_encrypted(b"x", key().as_bytes()).await.unwrap();

        let other = EncryptionKey::from_bytes([1u8; 32]);
        let err = client
            .retrieve_and_decrypt(&stored.address, other.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Crypto(CryptoError::Decryption)));
    }

    #[tokio::test]
    async fn test_missing_blob_is_retryable() {
        let client = EncryptedBlobClient::new(MemoryBlobTransport::new());
        let err = client
            .retrieve_and_decrypt("missing", key().as_bytes())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    struct StalledTransport;

    #[async_trait]
    impl BlobTransport for StalledTransport {
        async fn put(&self, _data: Bytes) -> StorageResult<String> {
            std::future::pending().await
        }

        async fn get(&self, _address: &str) -> StorageResult<Bytes> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_storage_error() {
        let client = EncryptedBlobClient::with_timeout(StalledTransport, Duration::from_secs(2));
        let err = client
            .retrieve_and_decrypt("addr", key().as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Storage(StorageError::Timeout(_))));
    }
}
