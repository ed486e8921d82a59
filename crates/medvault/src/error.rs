//! Error types for the Vault.

use std::time::Duration;

use medvault_blob::BlobError;
use medvault_core::{CryptoError, DocumentId, SubjectId};
use medvault_store::StoreError;
use medvault_tokens::{AuthorityError, EnvelopeError, TokenError};
use thiserror::Error;

use crate::disclosure::DisclosureStage;

/// Message shown to callers for every credential failure.
pub const INVALID_CREDENTIAL_MESSAGE: &str = "invalid or expired credential";

/// Errors loading configuration or secrets.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid secret in {name}: {source}")]
    InvalidSecret {
        name: &'static str,
        #[source]
        source: CryptoError,
    },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, source: CryptoError) -> Self {
        ConfigError::InvalidSecret { name, source }
    }
}

/// Failures from the external ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger could not be reached or failed internally.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the grant.
    #[error("ledger rejected grant: {0}")]
    Rejected(String),

    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),
}

/// Errors that can occur during Vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Token(TokenError),

    #[error(transparent)]
    Envelope(EnvelopeError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("blob error: {0}")]
    Blob(#[from] BlobError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("subject not found: {0}")]
    SubjectNotFound(SubjectId),

    /// A requested document does not exist, belongs to someone else, or is inactive.
    #[error("unknown document: {0}")]
    UnknownDocument(DocumentId),

    #[error("document already exists: {0}")]
    DuplicateDocument(DocumentId),

    #[error("no confirmed DID document for subject {0}")]
    DidDocumentUnavailable(SubjectId),

    #[error("intake worker has stopped")]
    IntakeClosed,

    /// A disclosure request stopped before any document was released.
    #[error("disclosure rejected at {stage}: {source}")]
    Rejected {
        stage: DisclosureStage,
        #[source]
        source: Box<VaultError>,
    },
}

impl From<AuthorityError> for VaultError {
    fn from(e: AuthorityError) -> Self {
        match e {
            AuthorityError::Token(e) => VaultError::Token(e),
            AuthorityError::Envelope(e) => VaultError::Envelope(e),
            AuthorityError::Store(e) => VaultError::Store(e),
        }
    }
}

impl VaultError {
    pub(crate) fn rejected(stage: DisclosureStage, source: impl Into<VaultError>) -> Self {
        VaultError::Rejected {
            stage,
            source: Box::new(source.into()),
        }
    }

    /// Whether the presented credential was refused.
    pub fn is_authorization_failure(&self) -> bool {
        match self {
            VaultError::Token(_) | VaultError::Envelope(_) => true,
            VaultError::Rejected { source, .. } => source.is_authorization_failure(),
            _ => false,
        }
    }

    /// The stage a rejected disclosure stopped at.
    pub fn stage(&self) -> Option<DisclosureStage> {
        match self {
            VaultError::Rejected { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying error of a rejected disclosure, or self.
    pub fn root(&self) -> &VaultError {
        match self {
            VaultError::Rejected { source, .. } => source.root(),
            other => other,
        }
    }

    /// A message safe to show to the party that presented the credential.
    ///
    /// Every credential failure yields the same text, so callers cannot tell
    /// an expired credential from a forged or revoked one.
    pub fn public_message(&self) -> &'static str {
        if self.is_authorization_failure() {
            return INVALID_CREDENTIAL_MESSAGE;
        }
        match self.root() {
            VaultError::SubjectNotFound(_) => "subject not found",
            VaultError::UnknownDocument(_) => "unknown document",
            VaultError::Ledger(_) => "access grant could not be issued",
            VaultError::DidDocumentUnavailable(_) => "DID document not available",
            _ => "internal error",
        }
    }
}

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
