//! A DataStore wrapper that counts calls and can inject failures.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use medvault_core::{DocumentCategory, DocumentId, SubjectId, TokenId};
use medvault_store::{
    AccessGrantRecord, CredentialRecord, DataStore, DocumentRecord, InsertResult,
    ProcessingStatus, Result, RevokeOutcome, StoreError, SubjectRecord,
};

/// Delegates to `S`, counting the calls the disclosure pipeline makes.
pub struct CountingStore<S> {
    inner: S,
    grant_writes: AtomicUsize,
    document_lookups: AtomicUsize,
    revocation_checks: AtomicUsize,
    fail_grant_writes: AtomicBool,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            grant_writes: AtomicUsize::new(0),
            document_lookups: AtomicUsize::new(0),
            revocation_checks: AtomicUsize::new(0),
            fail_grant_writes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of `create_grant_record` calls, failed ones included.
    pub fn grant_writes(&self) -> usize {
        self.grant_writes.load(Ordering::SeqCst)
    }

    /// Number of `find_active_documents` calls.
    pub fn document_lookups(&self) -> usize {
        self.document_lookups.load(Ordering::SeqCst)
    }

    /// Number of `is_revoked` calls.
    pub fn revocation_checks(&self) -> usize {
        self.revocation_checks.load(Ordering::SeqCst)
    }

    /// Make every `create_grant_record` call fail.
    pub fn fail_grant_writes(&self, fail: bool) {
        self.fail_grant_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl<S: DataStore> DataStore for CountingStore<S> {
    async fn upsert_subject(&self, subject: &SubjectRecord) -> Result<()> {
        self.inner.upsert_subject(subject).await
    }

    async fn get_subject(&self, subject_id: &SubjectId) -> Result<Option<SubjectRecord>> {
        self.inner.get_subject(subject_id).await
    }

    async fn set_did_document(
        &self,
        subject_id: &SubjectId,
        status: ProcessingStatus,
        address: Option<&str>,
    ) -> Result<()> {
        self.inner.set_did_document(subject_id, status, address).await
    }

    async fn insert_document(&self, document: &DocumentRecord) -> Result<InsertResult> {
        self.inner.insert_document(document).await
    }

    async fn get_document(&self, document_id: &DocumentId) -> Result<Option<DocumentRecord>> {
        self.inner.get_document(document_id).await
    }

    async fn set_document_status(
        &self,
        document_id: &DocumentId,
        status: ProcessingStatus,
        blob_address: Option<&str>,
    ) -> Result<()> {
        self.inner
            .set_document_status(document_id, status, blob_address)
            .await
    }

    async fn deactivate_document(
        &self,
        subject_id: &SubjectId,
        document_id: &DocumentId,
    ) -> Result<bool> {
        self.inner.deactivate_document(subject_id, document_id).await
    }

    async fn find_active_documents(
        &self,
        subject_id: &SubjectId,
        ids: Option<&[DocumentId]>,
        categories: &[DocumentCategory],
    ) -> Result<Vec<DocumentRecord>> {
        self.document_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner
            .find_active_documents(subject_id, ids, categories)
            .await
    }

    async fn insert_credential(&self, record: &CredentialRecord) -> Result<InsertResult> {
        self.inner.insert_credential(record).await
    }

    async fn get_credential(&self, token_id: &TokenId) -> Result<Option<CredentialRecord>> {
        self.inner.get_credential(token_id).await
    }

    async fn mark_revoked(
        &self,
        token_id: &TokenId,
        subject_id: &SubjectId,
        at: i64,
    ) -> Result<RevokeOutcome> {
        self.inner.mark_revoked(token_id, subject_id, at).await
    }

    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool> {
        self.revocation_checks.fetch_add(1, Ordering::SeqCst);
        self.inner.is_revoked(token_id).await
    }

    async fn create_grant_record(&self, record: &AccessGrantRecord) -> Result<()> {
        self.grant_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_grant_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "grant log unavailable",
            )));
        }
        self.inner.create_grant_record(record).await
    }

    async fn grant_records_for(&self, subject_id: &SubjectId) -> Result<Vec<AccessGrantRecord>> {
        self.inner.grant_records_for(subject_id).await
    }
}
