//! The disclosure pipeline.
//!
//! A request moves through
//! `RECEIVED → TOKEN_VERIFIED → GRANT_ISSUED → LOGGED → DOCUMENTS_RESOLVED →
//! AGGREGATED → RESPONDED`. Every step before `LOGGED` can reject the request;
//! once the grant is logged, a document that cannot be fetched or decrypted is
//! skipped without failing the rest.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::Instrument;

use medvault_blob::{BlobTransport, EncryptedBlobClient};
use medvault_core::{
    AccessCategory, Clock, DocumentCategory, DocumentId, GrantId, KeyDeriver, KeyPolicy,
    ResponderMeta, SubjectId, TokenId,
};
use medvault_store::{AccessGrantRecord, DataStore, DocumentRecord};
use medvault_tokens::{TokenAuthority, VerifiedCredential};

use crate::config::VaultConfig;
use crate::error::{LedgerError, Result, VaultError};
use crate::ledger::{GrantRequest, Ledger};

/// Where a disclosure request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisclosureStage {
    Received,
    TokenVerified,
    GrantIssued,
    Logged,
    DocumentsResolved,
    Aggregated,
    Responded,
}

impl DisclosureStage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DisclosureStage::Received => "RECEIVED",
            DisclosureStage::TokenVerified => "TOKEN_VERIFIED",
            DisclosureStage::GrantIssued => "GRANT_ISSUED",
            DisclosureStage::Logged => "LOGGED",
            DisclosureStage::DocumentsResolved => "DOCUMENTS_RESOLVED",
            DisclosureStage::Aggregated => "AGGREGATED",
            DisclosureStage::Responded => "RESPONDED",
        }
    }
}

impl fmt::Display for DisclosureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A responder presenting a credential.
#[derive(Debug, Clone)]
pub struct DisclosureRequest {
    /// Serialized access token or emergency envelope.
    pub credential: String,

    pub responder: ResponderMeta,

    /// For share tokens, the subset of documents the subject approved for
    /// this request. Ignored for emergency credentials.
    pub approved_documents: Option<Vec<DocumentId>>,
}

impl DisclosureRequest {
    pub fn new(credential: impl Into<String>, responder: ResponderMeta) -> Self {
        Self {
            credential: credential.into(),
            responder,
            approved_documents: None,
        }
    }

    /// Restrict a share disclosure to these documents.
    pub fn with_approved_documents(mut self, documents: Vec<DocumentId>) -> Self {
        self.approved_documents = Some(documents);
        self
    }
}

/// One decrypted document.
#[derive(Clone, PartialEq, Eq)]
pub struct DisclosedDocument {
    pub document_id: DocumentId,
    pub title: String,
    pub plaintext: Vec<u8>,
    pub uploaded_at: i64,
}

impl fmt::Debug for DisclosedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisclosedDocument")
            .field("document_id", &self.document_id)
            .field("title", &self.title)
            .field("plaintext", &format_args!("<{} bytes>", self.plaintext.len()))
            .field("uploaded_at", &self.uploaded_at)
            .finish()
    }
}

/// Decrypted documents grouped by category.
///
/// Within a category, documents are ordered by upload time, then id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisclosurePacket {
    by_category: BTreeMap<DocumentCategory, Vec<DisclosedDocument>>,
}

impl DisclosurePacket {
    fn insert(&mut self, category: DocumentCategory, document: DisclosedDocument) {
        let documents = self.by_category.entry(category).or_default();
        let at = documents
            .binary_search_by(|d| {
                (d.uploaded_at, &d.document_id).cmp(&(document.uploaded_at, &document.document_id))
            })
            .unwrap_or_else(|i| i);
        documents.insert(at, document);
    }

    /// Documents in one category.
    pub fn get(&self, category: DocumentCategory) -> &[DisclosedDocument] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Categories with at least one document.
    pub fn categories(&self) -> impl Iterator<Item = DocumentCategory> + '_ {
        self.by_category.keys().copied()
    }

    /// Every document, grouped by category.
    pub fn documents(&self) -> impl Iterator<Item = (DocumentCategory, &DisclosedDocument)> {
        self.by_category
            .iter()
            .flat_map(|(category, docs)| docs.iter().map(move |d| (*category, d)))
    }

    /// Total number of documents.
    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the responder learns about the credential they presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSummary {
    pub token_id: TokenId,
    pub subject_id: SubjectId,
    pub category: AccessCategory,
    pub emergency_envelope: bool,
    pub expires_at: i64,
}

impl From<&VerifiedCredential> for CredentialSummary {
    fn from(credential: &VerifiedCredential) -> Self {
        Self {
            token_id: credential.token_id().clone(),
            subject_id: credential.subject_id().clone(),
            category: credential.category(),
            emergency_envelope: matches!(credential, VerifiedCredential::Emergency(_)),
            expires_at: credential.expires_at(),
        }
    }
}

/// The response to a successful disclosure.
#[derive(Debug, Clone)]
pub struct Disclosure {
    pub grant_id: GrantId,

    /// Grant expiry as reported by the ledger (Unix ms).
    pub expires_at: i64,

    /// Id of the audit entry written for this disclosure.
    pub grant_record_id: String,

    pub credential: CredentialSummary,
    pub packet: DisclosurePacket,
}

/// Runs disclosure requests against the Vault's collaborators.
pub struct DisclosureOrchestrator<S> {
    pub(crate) store: Arc<S>,
    pub(crate) authority: Arc<TokenAuthority<S>>,
    pub(crate) blobs: Arc<EncryptedBlobClient<Arc<dyn BlobTransport>>>,
    pub(crate) ledger: Arc<dyn Ledger>,
    pub(crate) keys: Arc<KeyDeriver>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: VaultConfig,
}

impl<S: DataStore> DisclosureOrchestrator<S> {
    /// Run one request to completion.
    pub async fn disclose(&self, request: DisclosureRequest) -> Result<Disclosure> {
        let span = tracing::info_span!(
            "disclosure",
            responder = %request.responder.name,
            stage = tracing::field::Empty,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: DisclosureRequest) -> Result<Disclosure> {
        let DisclosureRequest {
            credential,
            responder,
            approved_documents,
        } = request;

        // RECEIVED → TOKEN_VERIFIED
        enter(DisclosureStage::Received);
        let credential = self
            .authority
            .verify_credential(&credential)
            .await
            .map_err(|e| reject(DisclosureStage::Received, e))?;
        let subject_id = credential.subject_id().clone();

        // TOKEN_VERIFIED → GRANT_ISSUED
        enter(DisclosureStage::TokenVerified);
        let grant = self
            .issue_grant(&credential, &responder)
            .await
            .map_err(|e| reject(DisclosureStage::TokenVerified, e))?;

        // GRANT_ISSUED → LOGGED
        enter(DisclosureStage::GrantIssued);
        let category = credential.category();
        let record = AccessGrantRecord {
            record_id: AccessGrantRecord::new_record_id(),
            subject_id: subject_id.clone(),
            token_id: credential.token_id().clone(),
            ledger_grant_id: grant.grant_id.clone(),
            responder,
            categories: category.authorized_categories().to_vec(),
            expires_at: grant.expires_at,
            created_at: self.clock.now_millis(),
        };
        self.store
            .create_grant_record(&record)
            .await
            .map_err(|e| reject(DisclosureStage::GrantIssued, e))?;

        // LOGGED → DOCUMENTS_RESOLVED
        enter(DisclosureStage::Logged);
        let ids = requested_ids(&credential, approved_documents.as_deref());
        let documents = self
            .store
            .find_active_documents(
                &subject_id,
                Some(ids.as_slice()),
                category.authorized_categories(),
            )
            .await?;

        // DOCUMENTS_RESOLVED → AGGREGATED
        enter(DisclosureStage::DocumentsResolved);
        let requested = documents.len();
        let packet = self.aggregate(&subject_id, documents).await;

        // AGGREGATED → RESPONDED
        enter(DisclosureStage::Aggregated);
        tracing::info!(
            subject = %subject_id,
            token = %credential.token_id(),
            grant = %grant.grant_id,
            requested,
            disclosed = packet.len(),
            "disclosure complete"
        );
        enter(DisclosureStage::Responded);

        Ok(Disclosure {
            grant_id: grant.grant_id,
            expires_at: grant.expires_at,
            grant_record_id: record.record_id,
            credential: CredentialSummary::from(&credential),
            packet,
        })
    }

    async fn issue_grant(
        &self,
        credential: &VerifiedCredential,
        responder: &ResponderMeta,
    ) -> Result<crate::ledger::LedgerGrant> {
        let subject_id = credential.subject_id();
        let subject = self
            .store
            .get_subject(subject_id)
            .await?
            .ok_or_else(|| VaultError::SubjectNotFound(subject_id.clone()))?;

        let request = GrantRequest {
            subject_did: subject.did,
            responder_address: responder.wallet_address.clone(),
            responder: responder.clone(),
            duration_seconds: self.config.grant_duration.as_secs(),
            access_level: credential.category().into(),
            location: responder.location.clone(),
        };

        let timeout = self.config.ledger_timeout;
        let grant = tokio::time::timeout(timeout, self.ledger.issue_grant(&request))
            .await
            .map_err(|_| LedgerError::Timeout(timeout))??;

        tracing::debug!(grant = %grant.grant_id, expires_at = grant.expires_at, "grant issued");
        Ok(grant)
    }

    /// Fetch and decrypt documents with bounded parallelism.
    ///
    /// Failures are logged and skipped.
    async fn aggregate(
        &self,
        subject_id: &SubjectId,
        documents: Vec<DocumentRecord>,
    ) -> DisclosurePacket {
        let concurrency = self.config.disclosure_concurrency.max(1);

        let results: Vec<Option<(DocumentCategory, DisclosedDocument)>> =
            stream::iter(documents)
                .map(|document| self.open_document(subject_id, document))
                .buffer_unordered(concurrency)
                .collect()
                .await;

        let mut packet = DisclosurePacket::default();
        for (category, document) in results.into_iter().flatten() {
            packet.insert(category, document);
        }
        packet
    }

    async fn open_document(
        &self,
        subject_id: &SubjectId,
        document: DocumentRecord,
    ) -> Option<(DocumentCategory, DisclosedDocument)> {
        let Some(address) = document.blob_address.as_deref() else {
            tracing::warn!(document = %document.document_id, "skipping document without blob address");
            return None;
        };

        let key = self.keys.derive(&KeyPolicy::subject_document(
            subject_id.clone(),
            document.document_id.clone(),
        ));

        match self.blobs.retrieve_and_decrypt(address, key.as_bytes()).await {
            Ok(plaintext) => Some((
                document.category,
                DisclosedDocument {
                    document_id: document.document_id,
                    title: document.title,
                    plaintext,
                    uploaded_at: document.uploaded_at,
                },
            )),
            Err(e) => {
                tracing::warn!(
                    document = %document.document_id,
                    retryable = e.is_retryable(),
                    error = %e,
                    "skipping undecryptable document"
                );
                None
            }
        }
    }
}

fn enter(stage: DisclosureStage) {
    tracing::Span::current().record("stage", stage.as_str());
    tracing::debug!(stage = %stage, "disclosure stage");
}

fn reject(stage: DisclosureStage, error: impl Into<VaultError>) -> VaultError {
    let error = VaultError::rejected(stage, error);
    tracing::info!(stage = %stage, error = %error, "disclosure rejected");
    error
}

/// The credential's document ids, narrowed to the approved subset for share tokens.
fn requested_ids(
    credential: &VerifiedCredential,
    approved: Option<&[DocumentId]>,
) -> Vec<DocumentId> {
    let named = credential.document_ids();
    match (credential.category(), approved) {
        (AccessCategory::Share, Some(approved)) => named
            .iter()
            .filter(|id| approved.contains(id))
            .cloned()
            .collect(),
        _ => named.to_vec(),
    }
}
