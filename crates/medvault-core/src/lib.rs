//! # MedVault Core
//!
//! Pure primitives for MedVault: identifiers, document categories, the
//! symmetric cipher, and deterministic key derivation.
//!
//! This crate contains no I/O, no storage, no networking. Everything here is
//! pure computation, safe to call concurrently from any number of requests.
//!
//! ## Key Types
//!
//! - [`SubjectId`], [`DocumentId`], [`TokenId`], [`GrantId`] - Identifier newtypes
//! - [`DocumentCategory`] / [`AccessCategory`] - What a document is, and what a
//!   credential may disclose
//! - [`EncryptionKey`] - A 256-bit ChaCha20-Poly1305 key
//! - [`KeyDeriver`] - HMAC-SHA256 derivation from the process master secret
//! - [`Clock`] - Injectable time source
//!
//! ## Encryption Model
//!
//! Every document is encrypted under its own key, derived from the master
//! secret and the (subject, document) pair. Keys are never stored: they are
//! recomputed on demand, so decryption needs no key-storage side channel.
//!
//! ```rust
//! use medvault_core::{cipher, KeyDeriver, KeyPolicy, MasterSecret};
//!
//! let deriver = KeyDeriver::new(MasterSecret::from_bytes(vec![7u8; 32]));
//! let key = deriver.derive(&KeyPolicy::subject_document("u1", "d1"));
//!
//! let blob = cipher::encrypt(b"blood type: O-", key.as_bytes()).unwrap();
//! let plain = cipher::decrypt(&blob, key.as_bytes()).unwrap();
//! assert_eq!(plain, b"blood type: O-");
//! ```

pub mod cipher;
pub mod clock;
pub mod error;
pub mod kdf;
pub mod types;

pub use cipher::{EncryptionKey, EncryptionNonce, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CryptoError, Result};
pub use kdf::{derive_key, DerivedKey, KeyDeriver, KeyPolicy, MasterSecret};
pub use types::{
    AccessCategory, DocumentCategory, DocumentId, GrantId, ResponderMeta, SubjectId, TokenId,
};
