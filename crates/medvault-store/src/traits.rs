//! DataStore trait: the abstract interface for record persistence.
//!
//! This trait keeps the disclosure pipeline storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use medvault_core::{DocumentCategory, DocumentId, SubjectId, TokenId};

use crate::error::Result;
use crate::records::{
    AccessGrantRecord, CredentialRecord, DocumentRecord, InsertResult, ProcessingStatus,
    RevokeOutcome, SubjectRecord,
};

/// The DataStore trait: async interface for subjects, documents, credentials
/// and grant records.
///
/// All methods are async to support both blocking (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Append-only grants**: grant records are never updated or deleted.
/// - **Single-shot revocation**: `mark_revoked` is one conditional update, so
///   concurrent revocations and verifications need no in-process lock.
/// - **Fail closed**: `is_revoked` reports `true` for unknown credentials.
#[async_trait]
pub trait DataStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Subjects
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a subject.
    async fn upsert_subject(&self, subject: &SubjectRecord) -> Result<()>;

    /// Get a subject by id.
    async fn get_subject(&self, subject_id: &SubjectId) -> Result<Option<SubjectRecord>>;

    /// Record the outcome of DID document processing.
    ///
    /// Fails with `NotFound` if the subject does not exist.
    async fn set_did_document(
        &self,
        subject_id: &SubjectId,
        status: ProcessingStatus,
        address: Option<&str>,
    ) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a document. Never overwrites an existing document id.
    async fn insert_document(&self, document: &DocumentRecord) -> Result<InsertResult>;

    /// Get a document by id.
    async fn get_document(&self, document_id: &DocumentId) -> Result<Option<DocumentRecord>>;

    /// Transition a document's processing status, optionally setting its blob address.
    ///
    /// Fails with `NotFound` if the document does not exist.
    async fn set_document_status(
        &self,
        document_id: &DocumentId,
        status: ProcessingStatus,
        blob_address: Option<&str>,
    ) -> Result<()>;

    /// Deactivate a subject's document. Returns false if no active document matched.
    async fn deactivate_document(
        &self,
        subject_id: &SubjectId,
        document_id: &DocumentId,
    ) -> Result<bool>;

    /// Find the subject's disclosable documents.
    ///
    /// Returns documents that are active and confirmed, whose category is in
    /// `categories`, and (when `ids` is given) whose id is in `ids`.
    /// Ordered by `uploaded_at`, then `document_id`.
    async fn find_active_documents(
        &self,
        subject_id: &SubjectId,
        ids: Option<&[DocumentId]>,
        categories: &[DocumentCategory],
    ) -> Result<Vec<DocumentRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist an issued credential.
    async fn insert_credential(&self, record: &CredentialRecord) -> Result<InsertResult>;

    /// Get a credential by id.
    async fn get_credential(&self, token_id: &TokenId) -> Result<Option<CredentialRecord>>;

    /// Revoke a credential on behalf of its subject.
    ///
    /// Only an active credential owned by `subject_id` transitions.
    async fn mark_revoked(
        &self,
        token_id: &TokenId,
        subject_id: &SubjectId,
        at: i64,
    ) -> Result<RevokeOutcome>;

    /// Whether a credential must be rejected as revoked.
    ///
    /// Unknown credentials count as revoked.
    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Grant records
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a grant record.
    async fn create_grant_record(&self, record: &AccessGrantRecord) -> Result<()>;

    /// All grant records for a subject, oldest first.
    async fn grant_records_for(&self, subject_id: &SubjectId) -> Result<Vec<AccessGrantRecord>>;
}

/// Apply the `find_active_documents` filter to one record.
pub(crate) fn matches_filter(
    document: &DocumentRecord,
    subject_id: &SubjectId,
    ids: Option<&[DocumentId]>,
    categories: &[DocumentCategory],
) -> bool {
    &document.subject_id == subject_id
        && document.is_disclosable()
        && categories.contains(&document.category)
        && ids.map_or(true, |ids| ids.contains(&document.document_id))
}

/// Sort documents into the order `find_active_documents` promises.
pub(crate) fn sort_documents(documents: &mut [DocumentRecord]) {
    documents.sort_by(|a, b| {
        a.uploaded_at
            .cmp(&b.uploaded_at)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
}
