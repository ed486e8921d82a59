//! Persisted record types.

use serde::{Deserialize, Serialize};

use medvault_core::{
    AccessCategory, DocumentCategory, DocumentId, GrantId, ResponderMeta, SubjectId, TokenId,
};

/// Status of a unit of background work (document upload, DID document).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Pending,
    Confirmed,
    Failed,
}

impl ProcessingStatus {
    /// Stable string form, used in storage.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "PENDING",
            ProcessingStatus::Confirmed => "CONFIRMED",
            ProcessingStatus::Failed => "FAILED",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ProcessingStatus::Pending),
            "CONFIRMED" => Some(ProcessingStatus::Confirmed),
            "FAILED" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }

    /// Whether the work has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessingStatus::Pending)
    }
}

/// A patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub subject_id: SubjectId,

    /// Decentralized identifier registered for the subject.
    pub did: String,

    /// On-chain address of the subject.
    pub wallet_address: Option<String>,

    /// Blob address of the encrypted DID document, once stored.
    pub did_document_address: Option<String>,

    pub did_status: ProcessingStatus,
}

impl SubjectRecord {
    /// A new subject with no DID document yet.
    pub fn new(subject_id: impl Into<SubjectId>, did: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            did: did.into(),
            wallet_address: None,
            did_document_address: None,
            did_status: ProcessingStatus::Pending,
        }
    }
}

/// Metadata of an encrypted medical document.
///
/// The ciphertext lives in the blob store at `blob_address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: DocumentId,
    pub subject_id: SubjectId,
    pub category: DocumentCategory,
    pub title: String,

    /// Set once the upload is confirmed.
    pub blob_address: Option<String>,

    /// Upload time (Unix ms).
    pub uploaded_at: i64,

    pub status: ProcessingStatus,

    /// False once the subject has deleted or revoked the document.
    pub active: bool,
}

impl DocumentRecord {
    /// Whether this document may be disclosed.
    pub fn is_disclosable(&self) -> bool {
        self.active && self.status == ProcessingStatus::Confirmed && self.blob_address.is_some()
    }
}

/// What kind of credential a record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialKind {
    /// A signed access token of the given category.
    AccessToken { category: AccessCategory },
    /// An emergency envelope (always emergency category).
    EmergencyEnvelope,
}

impl CredentialKind {
    /// The access category this credential authorizes.
    pub fn access_category(&self) -> AccessCategory {
        match self {
            CredentialKind::AccessToken { category } => *category,
            CredentialKind::EmergencyEnvelope => AccessCategory::Emergency,
        }
    }

    /// Stable string form of the kind, used in storage.
    pub const fn kind_str(&self) -> &'static str {
        match self {
            CredentialKind::AccessToken { .. } => "ACCESS_TOKEN",
            CredentialKind::EmergencyEnvelope => "EMERGENCY_ENVELOPE",
        }
    }
}

/// The persisted row behind an issued credential (the "QR code" row).
///
/// Verification consults `active` for revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub token_id: TokenId,
    pub subject_id: SubjectId,
    pub kind: CredentialKind,
    pub document_ids: Vec<DocumentId>,
    pub issued_at: i64,
    pub expires_at: i64,
    pub active: bool,
    pub revoked_at: Option<i64>,
}

/// Outcome of a revocation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// The credential was active and is now revoked.
    Revoked,
    /// The credential was already revoked; nothing changed.
    AlreadyRevoked,
    /// No credential with that id.
    NotFound,
    /// The credential belongs to a different subject.
    NotOwner,
}

/// Result of inserting a record that must be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted.
    Inserted,
    /// A record with the same id already exists (not overwritten).
    AlreadyExists,
}

/// Append-only audit entry written once per successful disclosure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrantRecord {
    pub record_id: String,
    pub subject_id: SubjectId,

    /// The credential that was presented.
    pub token_id: TokenId,

    /// Grant identifier returned by the ledger.
    pub ledger_grant_id: GrantId,

    pub responder: ResponderMeta,

    /// Document categories the grant discloses.
    pub categories: Vec<DocumentCategory>,

    /// Authoritative grant expiry from the ledger (Unix ms).
    pub expires_at: i64,

    pub created_at: i64,
}

impl AccessGrantRecord {
    /// Generate a fresh record id.
    pub fn new_record_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
