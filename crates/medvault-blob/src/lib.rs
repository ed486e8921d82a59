//! # MedVault Blob
//!
//! Client for the content-addressed blob store that holds encrypted
//! documents.
//!
//! ## Key Types
//!
//! - [`BlobTransport`] - Moves opaque bytes to and from the store
//! - [`EncryptedBlobClient`] - Encrypts before `put`, decrypts after `get`
//! - [`HttpBlobTransport`] - IPFS HTTP API transport
//! - [`MemoryBlobTransport`] - In-memory transport for tests
//!
//! ## Error Model
//!
//! [`BlobError::Storage`] is transient and may be retried.
//! [`BlobError::Crypto`] means the key or data is wrong, and retrying with the
//! same key fails the same way.

pub mod client;
pub mod error;
pub mod http;
pub mod transport;

pub use client::{EncryptedBlobClient, StoredBlob, DEFAULT_TIMEOUT};
pub use error::{BlobError, Result, StorageError, StorageResult};
pub use http::{HttpBlobConfig, HttpBlobTransport};
pub use transport::memory::MemoryBlobTransport;
pub use transport::BlobTransport;
