//! Error types for credential issuance and verification.

use medvault_store::StoreError;
use thiserror::Error;

/// Access token failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token expired")]
    Expired,

    #[error("token signature invalid")]
    SignatureInvalid,

    #[error("token revoked")]
    Revoked,

    #[error("invalid token duration: {0} hours (must be 1..={})", crate::MAX_TOKEN_HOURS)]
    InvalidDuration(u32),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Emergency envelope failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("envelope expired")]
    Expired,

    #[error("envelope signature mismatch")]
    SignatureMismatch,

    #[error("envelope revoked")]
    Revoked,
}

/// Errors from [`crate::TokenAuthority`].
#[derive(Debug, Error)]
pub enum AuthorityError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("credential store error: {0}")]
    Store(#[from] StoreError),
}

impl AuthorityError {
    /// Whether the presented credential itself was rejected.
    ///
    /// False for store failures, which say nothing about the credential.
    pub fn is_credential_rejection(&self) -> bool {
        !matches!(self, AuthorityError::Store(_))
    }
}

/// Result type for authority operations.
pub type Result<T> = std::result::Result<T, AuthorityError>;
