//! Transport abstraction for the blob store.
//!
//! A transport moves opaque bytes to and from a content-addressed store. It
//! never sees plaintext: [`crate::EncryptedBlobClient`] encrypts before `put`
//! and decrypts after `get`.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// Transport trait for storing and fetching blobs.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait BlobTransport: Send + Sync {
    /// Store bytes and return their content address.
    async fn put(&self, data: Bytes) -> StorageResult<String>;

    /// Fetch the bytes stored at `address`.
    async fn get(&self, address: &str) -> StorageResult<Bytes>;
}

#[async_trait]
impl<T: BlobTransport + ?Sized> BlobTransport for std::sync::Arc<T> {
    async fn put(&self, data: Bytes) -> StorageResult<String> {
        (**self).put(data).await
    }

    async fn get(&self, address: &str) -> StorageResult<Bytes> {
        (**self).get(address).await
    }
}

/// A simple in-memory transport for testing.
///
/// Addresses are the blake3 hex digest of the stored bytes.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::RwLock;

    use crate::error::StorageError;

    /// In-memory content-addressed blob store.
    #[derive(Default)]
    pub struct MemoryBlobTransport {
        blobs: RwLock<HashMap<String, Bytes>>,
        puts: AtomicUsize,
        gets: AtomicUsize,
        offline: AtomicBool,
    }

    impl MemoryBlobTransport {
        /// Create an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of `put` calls made so far, including failed ones.
        pub fn put_count(&self) -> usize {
            self.puts.load(Ordering::SeqCst)
        }

        /// Number of `get` calls made so far, including failed ones.
        pub fn get_count(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }

        /// Number of stored blobs.
        pub fn len(&self) -> usize {
            self.blobs.read().map(|b| b.len()).unwrap_or(0)
        }

        /// Whether nothing is stored.
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        /// Make every subsequent call fail with a transport error.
        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        /// Flip a byte of the stored blob. Returns false if nothing is stored there.
        pub fn corrupt(&self, address: &str) -> bool {
            let Ok(mut blobs) = self.blobs.write() else {
                return false;
            };
            match blobs.get_mut(address) {
                Some(blob) if !blob.is_empty() => {
                    let mut bytes = blob.to_vec();
                    let last = bytes.len() - 1;
                    bytes[last] ^= 0x01;
                    *blob = Bytes::from(bytes);
                    true
                }
                _ => false,
            }
        }

        /// Drop the blob at `address`. Returns false if nothing was stored there.
        pub fn remove(&self, address: &str) -> bool {
            self.blobs
                .write()
                .map(|mut b| b.remove(address).is_some())
                .unwrap_or(false)
        }

        fn check_online(&self) -> StorageResult<()> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(StorageError::Transport("blob store offline".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BlobTransport for MemoryBlobTransport {
        async fn put(&self, data: Bytes) -> StorageResult<String> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;

            let address = blake3::hash(&data).to_hex().to_string();
            self.blobs
                .write()
                .map_err(|e| StorageError::Transport(e.to_string()))?
                .insert(address.clone(), data);
            Ok(address)
        }

        async fn get(&self, address: &str) -> StorageResult<Bytes> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.check_online()?;

            self.blobs
                .read()
                .map_err(|e| StorageError::Transport(e.to_string()))?
                .get(address)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(address.to_string()))
        }
    }
}
