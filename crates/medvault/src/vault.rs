//! The Vault: the caller-facing API.
//!
//! The Vault brings together the data store, the blob store, the ledger and
//! the credential authority. Every collaborator is injected at construction;
//! there is no global state.

use std::sync::Arc;

use tokio::task::JoinHandle;

use medvault_blob::{BlobTransport, EncryptedBlobClient};
use medvault_core::{
    AccessCategory, Clock, DocumentCategory, DocumentId, KeyDeriver, KeyPolicy, ResponderMeta,
    SubjectId, TokenId,
};
use medvault_store::{
    AccessGrantRecord, DataStore, ProcessingStatus, RevokeOutcome, SubjectRecord,
};
use medvault_tokens::{IssuedEnvelope, IssuedToken, TokenAuthority};

use crate::config::{VaultConfig, VaultSecrets};
use crate::disclosure::{Disclosure, DisclosureOrchestrator, DisclosureRequest};
use crate::error::{Result, VaultError};
use crate::intake::{self, IntakeHandle};
use crate::ledger::Ledger;

/// The main Vault struct.
///
/// Provides a unified API for:
/// - Registering subjects and ingesting documents
/// - Issuing access tokens and emergency envelopes
/// - Disclosing documents to a credential holder
/// - Revoking credentials and reading the audit trail
pub struct Vault<S: DataStore> {
    store: Arc<S>,
    authority: Arc<TokenAuthority<S>>,
    blobs: Arc<EncryptedBlobClient<Arc<dyn BlobTransport>>>,
    keys: Arc<KeyDeriver>,
    clock: Arc<dyn Clock>,
    disclosure: DisclosureOrchestrator<S>,
}

impl<S: DataStore + 'static> Vault<S> {
    /// Create a new vault instance.
    pub fn new(
        secrets: VaultSecrets,
        store: Arc<S>,
        blob_transport: Arc<dyn BlobTransport>,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
        config: VaultConfig,
    ) -> Self {
        let VaultSecrets {
            master,
            signing,
            envelope,
        } = secrets;

        let authority = Arc::new(TokenAuthority::new(
            store.clone(),
            &signing,
            envelope,
            clock.clone(),
        ));
        let blobs = Arc::new(EncryptedBlobClient::with_timeout(
            blob_transport,
            config.blob_timeout,
        ));
        let keys = Arc::new(KeyDeriver::new(master));

        let disclosure = DisclosureOrchestrator {
            store: store.clone(),
            authority: authority.clone(),
            blobs: blobs.clone(),
            ledger,
            keys: keys.clone(),
            clock: clock.clone(),
            config,
        };

        Self {
            store,
            authority,
            blobs,
            keys,
            clock,
            disclosure,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Get the credential authority.
    pub fn authority(&self) -> &TokenAuthority<S> {
        &self.authority
    }

    pub fn config(&self) -> &VaultConfig {
        &self.disclosure.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subjects and documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Register or update a subject.
    pub async fn register_subject(&self, subject: &SubjectRecord) -> Result<()> {
        self.store.upsert_subject(subject).await?;
        tracing::info!(subject = %subject.subject_id, "registered subject");
        Ok(())
    }

    /// Start an intake worker on the current runtime.
    ///
    /// The worker stops once every returned handle is dropped.
    pub fn spawn_intake(&self, capacity: usize) -> (IntakeHandle<S>, JoinHandle<()>) {
        let (handle, worker) = intake::channel(
            capacity,
            self.store.clone(),
            self.blobs.clone(),
            self.keys.clone(),
            self.clock.clone(),
        );
        (handle, worker.spawn())
    }

    /// Start an intake worker with the configured queue capacity.
    pub fn spawn_default_intake(&self) -> (IntakeHandle<S>, JoinHandle<()>) {
        self.spawn_intake(self.config().intake_queue_capacity)
    }

    /// Decrypt the subject's confirmed DID document.
    pub async fn read_did_document(&self, subject_id: &SubjectId) -> Result<Vec<u8>> {
        let subject = self
            .store
            .get_subject(subject_id)
            .await?
            .ok_or_else(|| VaultError::SubjectNotFound(subject_id.clone()))?;

        let address = match (subject.did_status, subject.did_document_address) {
            (ProcessingStatus::Confirmed, Some(address)) => address,
            _ => return Err(VaultError::DidDocumentUnavailable(subject_id.clone())),
        };

        let key = self.keys.derive(&KeyPolicy::subject(subject_id.clone()));
        Ok(self
            .blobs
            .retrieve_and_decrypt(&address, key.as_bytes())
            .await?)
    }

    /// Decrypt one of the subject's own documents.
    pub async fn read_document(
        &self,
        subject_id: &SubjectId,
        document_id: &DocumentId,
    ) -> Result<Vec<u8>> {
        let document = self
            .store
            .get_document(document_id)
            .await?
            .filter(|d| &d.subject_id == subject_id && d.is_disclosable())
            .ok_or_else(|| VaultError::UnknownDocument(document_id.clone()))?;

        let address = document
            .blob_address
            .ok_or_else(|| VaultError::UnknownDocument(document_id.clone()))?;
        let key = self.keys.derive(&KeyPolicy::subject_document(
            subject_id.clone(),
            document_id.clone(),
        ));
        Ok(self
            .blobs
            .retrieve_and_decrypt(&address, key.as_bytes())
            .await?)
    }

    /// Withdraw a document from all future disclosures.
    pub async fn deactivate_document(
        &self,
        subject_id: &SubjectId,
        document_id: &DocumentId,
    ) -> Result<bool> {
        let changed = self
            .store
            .deactivate_document(subject_id, document_id)
            .await?;
        if changed {
            tracing::info!(subject = %subject_id, document = %document_id, "deactivated document");
        }
        Ok(changed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue an access token for documents the subject owns.
    ///
    /// Every id must name an active document of the subject.
    pub async fn issue_access_token(
        &self,
        subject_id: &SubjectId,
        document_ids: &[DocumentId],
        category: AccessCategory,
        duration_hours: u32,
    ) -> Result<IssuedToken> {
        for document_id in document_ids {
            let owned = self
                .store
                .get_document(document_id)
                .await?
                .map_or(false, |d| &d.subject_id == subject_id && d.active);
            if !owned {
                return Err(VaultError::UnknownDocument(document_id.clone()));
            }
        }

        Ok(self
            .authority
            .issue_access_token(subject_id, document_ids, category, duration_hours)
            .await?)
    }

    /// Issue an emergency envelope naming all of the subject's confirmed
    /// documents in emergency categories.
    pub async fn issue_emergency_envelope(&self, subject_id: &SubjectId) -> Result<IssuedEnvelope> {
        let subject = self
            .store
            .get_subject(subject_id)
            .await?
            .ok_or_else(|| VaultError::SubjectNotFound(subject_id.clone()))?;

        let documents = self
            .store
            .find_active_documents(subject_id, None, &DocumentCategory::EMERGENCY)
            .await?;
        let ids: Vec<DocumentId> = documents.into_iter().map(|d| d.document_id).collect();

        Ok(self
            .authority
            .issue_emergency_envelope(subject_id, &subject.did, &ids)
            .await?)
    }

    /// Revoke a credential. Only the subject it was issued to may revoke it.
    pub async fn revoke(&self, token_id: &TokenId, subject_id: &SubjectId) -> Result<RevokeOutcome> {
        Ok(self.authority.revoke(token_id, subject_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Disclosure
    // ─────────────────────────────────────────────────────────────────────────

    /// Disclose the documents a credential covers to `responder`.
    pub async fn disclose(&self, credential: &str, responder: ResponderMeta) -> Result<Disclosure> {
        self.disclosure
            .disclose(DisclosureRequest::new(credential, responder))
            .await
    }

    /// Disclose with the full request, including an approved subset for share tokens.
    pub async fn disclose_request(&self, request: DisclosureRequest) -> Result<Disclosure> {
        self.disclosure.disclose(request).await
    }

    /// The subject's audit trail, oldest first.
    pub async fn grant_records(&self, subject_id: &SubjectId) -> Result<Vec<AccessGrantRecord>> {
        Ok(self.store.grant_records_for(subject_id).await?)
    }
}
