//! In-memory implementation of the DataStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use medvault_core::{DocumentCategory, DocumentId, SubjectId, TokenId};

use crate::error::{Result, StoreError};
use crate::records::{
    AccessGrantRecord, CredentialRecord, DocumentRecord, InsertResult, ProcessingStatus,
    RevokeOutcome, SubjectRecord,
};
use crate::traits::{matches_filter, sort_documents, DataStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    subjects: HashMap<SubjectId, SubjectRecord>,
    documents: HashMap<DocumentId, DocumentRecord>,
    credentials: HashMap<TokenId, CredentialRecord>,

    /// Append-only, in insertion order.
    grants: Vec<AccessGrantRecord>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn upsert_subject(&self, subject: &SubjectRecord) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .subjects
            .insert(subject.subject_id.clone(), subject.clone());
        Ok(())
    }

    async fn get_subject(&self, subject_id: &SubjectId) -> Result<Option<SubjectRecord>> {
        Ok(self.read()?.subjects.get(subject_id).cloned())
    }

    async fn set_did_document(
        &self,
        subject_id: &SubjectId,
        status: ProcessingStatus,
        address: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.write()?;
        let subject = inner
            .subjects
            .get_mut(subject_id)
            .ok_or_else(|| StoreError::NotFound(format!("subject {}", subject_id)))?;

        subject.did_status = status;
        if let Some(address) = address {
            subject.did_document_address = Some(address.to_string());
        }
        Ok(())
    }

    async fn insert_document(&self, document: &DocumentRecord) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if inner.documents.contains_key(&document.document_id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner
            .documents
            .insert(document.document_id.clone(), document.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_document(&self, document_id: &DocumentId) -> Result<Option<DocumentRecord>> {
        Ok(self.read()?.documents.get(document_id).cloned())
    }

    async fn set_document_status(
        &self,
        document_id: &DocumentId,
        status: ProcessingStatus,
        blob_address: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.write()?;
        let document = inner
            .documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))?;

        document.status = status;
        if let Some(address) = blob_address {
            document.blob_address = Some(address.to_string());
        }
        Ok(())
    }

    async fn deactivate_document(
        &self,
        subject_id: &SubjectId,
        document_id: &DocumentId,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.documents.get_mut(document_id) {
            Some(doc) if &doc.subject_id == subject_id && doc.active => {
                doc.active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_active_documents(
        &self,
        subject_id: &SubjectId,
        ids: Option<&[DocumentId]>,
        categories: &[DocumentCategory],
    ) -> Result<Vec<DocumentRecord>> {
        let inner = self.read()?;
        let mut found: Vec<DocumentRecord> = inner
            .documents
            .values()
            .filter(|doc| matches_filter(doc, subject_id, ids, categories))
            .cloned()
            .collect();
        sort_documents(&mut found);
        Ok(found)
    }

    async fn insert_credential(&self, record: &CredentialRecord) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if inner.credentials.contains_key(&record.token_id) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner
            .credentials
            .insert(record.token_id.clone(), record.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_credential(&self, token_id: &TokenId) -> Result<Option<CredentialRecord>> {
        Ok(self.read()?.credentials.get(token_id).cloned())
    }

    async fn mark_revoked(
        &self,
        token_id: &TokenId,
        subject_id: &SubjectId,
        at: i64,
    ) -> Result<RevokeOutcome> {
        let mut inner = self.write()?;
        let Some(record) = inner.credentials.get_mut(token_id) else {
            return Ok(RevokeOutcome::NotFound);
        };

        if &record.subject_id != subject_id {
            return Ok(RevokeOutcome::NotOwner);
        }
        if !record.active {
            return Ok(RevokeOutcome::AlreadyRevoked);
        }

        record.active = false;
        record.revoked_at = Some(at);
        Ok(RevokeOutcome::Revoked)
    }

    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool> {
        let inner = self.read()?;
        Ok(inner
            .credentials
            .get(token_id)
            .map_or(true, |record| !record.active))
    }

    async fn create_grant_record(&self, record: &AccessGrantRecord) -> Result<()> {
        let mut inner = self.write()?;
        if inner
            .grants
            .iter()
            .any(|existing| existing.record_id == record.record_id)
        {
            return Err(StoreError::InvalidData(format!(
                "grant record {} already exists",
                record.record_id
            )));
        }
        inner.grants.push(record.clone());
        Ok(())
    }

    async fn grant_records_for(&self, subject_id: &SubjectId) -> Result<Vec<AccessGrantRecord>> {
        let inner = self.read()?;
        Ok(inner
            .grants
            .iter()
            .filter(|grant| &grant.subject_id == subject_id)
            .cloned()
            .collect())
    }
}
