//! Deterministic key derivation from the process master secret.
//!
//! `key = HMAC-SHA256(master_secret, len(c0) || c0 || len(c1) || c1 || ...)`
//! where each `len` is the component's byte length as a 4-byte big-endian
//! integer. Same inputs always produce the same key; keys are recomputed on
//! demand and never stored.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::{EncryptionKey, KEY_LEN};
use crate::error::{CryptoError, Result};
use crate::types::{DocumentId, SubjectId};

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted length for long-lived secrets.
pub const MIN_SECRET_LEN: usize = 32;

/// The process-wide master secret. Loaded once at startup.
///
/// Compromise of this value exposes every derived key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret(Vec<u8>);

impl MasterSecret {
    /// Wrap raw secret bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Wrap raw secret bytes, rejecting secrets shorter than 32 bytes.
    pub fn from_bytes_checked(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(CryptoError::InvalidSecret(format!(
                "master secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::InvalidSecret(e.to_string()))?;
        Self::from_bytes_checked(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterSecret(<redacted>)")
    }
}

/// A key derived from the master secret for one context.
#[derive(Clone)]
pub struct DerivedKey(EncryptionKey);

impl DerivedKey {
    /// Get the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        self.0.as_bytes()
    }

    /// Borrow as a cipher key.
    pub fn as_encryption_key(&self) -> &EncryptionKey {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Derive a key from the master secret and an ordered list of context strings.
pub fn derive_key(master: &MasterSecret, context: &[&str]) -> DerivedKey {
    let mut mac = HmacSha256::new_from_slice(master.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");

    for component in context {
        mac.update(&(component.len() as u32).to_be_bytes());
        mac.update(component.as_bytes());
    }

    let out: [u8; KEY_LEN] = mac.finalize().into_bytes().into();
    DerivedKey(EncryptionKey::from_bytes(out))
}

/// Which context a key is derived for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Subject-only. Used for DID documents.
    Subject { subject_id: SubjectId },

    /// Subject plus document. Used for medical documents, so one leaked
    /// document key exposes nothing else of the same subject.
    SubjectDocument {
        subject_id: SubjectId,
        document_id: DocumentId,
    },
}

impl KeyPolicy {
    /// Subject-only policy.
    pub fn subject(subject_id: impl Into<SubjectId>) -> Self {
        KeyPolicy::Subject {
            subject_id: subject_id.into(),
        }
    }

    /// Subject and document policy.
    pub fn subject_document(
        subject_id: impl Into<SubjectId>,
        document_id: impl Into<DocumentId>,
    ) -> Self {
        KeyPolicy::SubjectDocument {
            subject_id: subject_id.into(),
            document_id: document_id.into(),
        }
    }

    /// The context components fed to [`derive_key`].
    pub fn context(&self) -> Vec<&str> {
        match self {
            KeyPolicy::Subject { subject_id } => vec![subject_id.as_str()],
            KeyPolicy::SubjectDocument {
                subject_id,
                document_id,
            } => vec![subject_id.as_str(), document_id.as_str()],
        }
    }
}

/// Derives keys from an owned master secret.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    master: MasterSecret,
}

impl KeyDeriver {
    /// Create a deriver over the given master secret.
    pub fn new(master: MasterSecret) -> Self {
        Self { master }
    }

    /// Derive the key for a policy.
    pub fn derive(&self, policy: &KeyPolicy) -> DerivedKey {
        derive_key(&self.master, &policy.context())
    }
}
