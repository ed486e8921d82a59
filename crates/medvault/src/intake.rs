//! Background encryption and upload of new documents.
//!
//! Submitting writes a `PENDING` record and queues a job. The worker derives
//! the key, stores the encrypted blob, and moves the record to `CONFIRMED`
//! (with its blob address) or `FAILED`. Submitters can await the outcome
//! through [`IntakeTicket::wait`] or poll the store.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use medvault_blob::{BlobTransport, EncryptedBlobClient};
use medvault_core::{Clock, DocumentCategory, DocumentId, KeyDeriver, KeyPolicy, SubjectId};
use medvault_store::{DataStore, DocumentRecord, InsertResult, ProcessingStatus};

use crate::error::{Result, VaultError};

/// What an intake job is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeTarget {
    Document(DocumentId),
    DidDocument(SubjectId),
}

/// Final state of an intake job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeOutcome {
    pub target: IntakeTarget,
    pub status: ProcessingStatus,
    pub blob_address: Option<String>,
    pub error: Option<String>,
}

/// Receipt for a queued job.
#[derive(Debug)]
pub struct IntakeTicket {
    target: IntakeTarget,
    done: oneshot::Receiver<IntakeOutcome>,
}

impl IntakeTicket {
    pub fn target(&self) -> &IntakeTarget {
        &self.target
    }

    /// Wait for the worker to finish the job.
    pub async fn wait(self) -> Result<IntakeOutcome> {
        self.done.await.map_err(|_| VaultError::IntakeClosed)
    }
}

struct IntakeJob {
    subject_id: SubjectId,
    target: IntakeTarget,
    plaintext: Vec<u8>,
    done: oneshot::Sender<IntakeOutcome>,
}

impl IntakeJob {
    fn policy(&self) -> KeyPolicy {
        match &self.target {
            IntakeTarget::Document(document_id) => {
                KeyPolicy::subject_document(self.subject_id.clone(), document_id.clone())
            }
            IntakeTarget::DidDocument(_) => KeyPolicy::subject(self.subject_id.clone()),
        }
    }
}

/// Submits jobs to a running intake worker.
pub struct IntakeHandle<S> {
    sender: mpsc::Sender<IntakeJob>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for IntakeHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S: DataStore> IntakeHandle<S> {
    /// Record a new document as `PENDING` and queue its upload.
    pub async fn submit_document(
        &self,
        subject_id: &SubjectId,
        document_id: DocumentId,
        category: DocumentCategory,
        title: impl Into<String>,
        plaintext: Vec<u8>,
    ) -> Result<IntakeTicket> {
        let record = DocumentRecord {
            document_id: document_id.clone(),
            subject_id: subject_id.clone(),
            category,
            title: title.into(),
            blob_address: None,
            uploaded_at: self.clock.now_millis(),
            status: ProcessingStatus::Pending,
            active: true,
        };
        if self.store.insert_document(&record).await? == InsertResult::AlreadyExists {
            return Err(VaultError::DuplicateDocument(document_id));
        }

        let target = IntakeTarget::Document(document_id.clone());
        match self.enqueue(subject_id, target, plaintext).await {
            Ok(ticket) => Ok(ticket),
            Err(e) => {
                self.store
                    .set_document_status(&document_id, ProcessingStatus::Failed, None)
                    .await?;
                Err(e)
            }
        }
    }

    /// Mark the subject's DID document `PENDING` and queue its upload.
    pub async fn submit_did_document(
        &self,
        subject_id: &SubjectId,
        plaintext: Vec<u8>,
    ) -> Result<IntakeTicket> {
        if self.store.get_subject(subject_id).await?.is_none() {
            return Err(VaultError::SubjectNotFound(subject_id.clone()));
        }
        self.store
            .set_did_document(subject_id, ProcessingStatus::Pending, None)
            .await?;

        let target = IntakeTarget::DidDocument(subject_id.clone());
        match self.enqueue(subject_id, target, plaintext).await {
            Ok(ticket) => Ok(ticket),
            Err(e) => {
                self.store
                    .set_did_document(subject_id, ProcessingStatus::Failed, None)
                    .await?;
                Err(e)
            }
        }
    }

    async fn enqueue(
        &self,
        subject_id: &SubjectId,
        target: IntakeTarget,
        plaintext: Vec<u8>,
    ) -> Result<IntakeTicket> {
        let (done, receiver) = oneshot::channel();
        let job = IntakeJob {
            subject_id: subject_id.clone(),
            target: target.clone(),
            plaintext,
            done,
        };
        self.sender
            .send(job)
            .await
            .map_err(|_| VaultError::IntakeClosed)?;

        tracing::debug!(subject = %subject_id, target = ?target, "queued intake job");
        Ok(IntakeTicket {
            target,
            done: receiver,
        })
    }
}

/// Processes intake jobs until every handle is dropped.
pub struct IntakeWorker<S> {
    receiver: mpsc::Receiver<IntakeJob>,
    processor: Processor<S>,
}

struct Processor<S> {
    store: Arc<S>,
    blobs: Arc<EncryptedBlobClient<Arc<dyn BlobTransport>>>,
    keys: Arc<KeyDeriver>,
}

impl<S: DataStore + 'static> IntakeWorker<S> {
    /// Run the worker on the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process jobs in order until the queue closes.
    pub async fn run(mut self) {
        while let Some(job) = self.receiver.recv().await {
            self.processor.process(job).await;
        }
        tracing::debug!("intake queue closed");
    }
}

impl<S: DataStore> Processor<S> {
    async fn process(&self, job: IntakeJob) {
        let key = self.keys.derive(&job.policy());
        let IntakeJob {
            subject_id,
            target,
            plaintext,
            done,
        } = job;

        let (status, blob_address, error) =
            match self.blobs.store_encrypted(&plaintext, key.as_bytes()).await {
                Ok(stored) => (ProcessingStatus::Confirmed, Some(stored.address), None),
                Err(e) => {
                    tracing::warn!(
                        subject = %subject_id,
                        target = ?target,
                        retryable = e.is_retryable(),
                        error = %e,
                        "intake upload failed"
                    );
                    (ProcessingStatus::Failed, None, Some(e.to_string()))
                }
            };
        drop(plaintext);

        let recorded = match &target {
            IntakeTarget::Document(document_id) => {
                self.store
                    .set_document_status(document_id, status, blob_address.as_deref())
                    .await
            }
            IntakeTarget::DidDocument(subject_id) => {
                self.store
                    .set_did_document(subject_id, status, blob_address.as_deref())
                    .await
            }
        };

        let outcome = match recorded {
            Ok(()) => {
                tracing::info!(subject = %subject_id, target = ?target, status = status.as_str(), "intake finished");
                IntakeOutcome {
                    target,
                    status,
                    blob_address,
                    error,
                }
            }
            Err(e) => {
                tracing::warn!(subject = %subject_id, target = ?target, error = %e, "failed to record intake status");
                IntakeOutcome {
                    target,
                    status: ProcessingStatus::Failed,
                    blob_address,
                    error: Some(e.to_string()),
                }
            }
        };

        // The submitter may have dropped its ticket.
        let _ = done.send(outcome);
    }
}

/// Create a connected handle and worker.
pub(crate) fn channel<S: DataStore>(
    capacity: usize,
    store: Arc<S>,
    blobs: Arc<EncryptedBlobClient<Arc<dyn BlobTransport>>>,
    keys: Arc<KeyDeriver>,
    clock: Arc<dyn Clock>,
) -> (IntakeHandle<S>, IntakeWorker<S>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        IntakeHandle {
            sender,
            store: store.clone(),
            clock,
        },
        IntakeWorker {
            receiver,
            processor: Processor { store, blobs, keys },
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvault_blob::MemoryBlobTransport;
    use medvault_core::{ManualClock, MasterSecret};
    use medvault_store::{MemoryStore, SubjectRecord};

    struct Setup {
        store: Arc<MemoryStore>,
        transport: Arc<MemoryBlobTransport>,
        blobs: Arc<EncryptedBlobClient<Arc<dyn BlobTransport>>>,
        keys: Arc<KeyDeriver>,
    }

    fn setup() -> Setup {
        let transport = Arc::new(MemoryBlobTransport::new());
        let dyn_transport: Arc<dyn BlobTransport> = transport.clone();
        Setup {
            store: Arc::new(MemoryStore::new()),
            transport,
            blobs: Arc::new(EncryptedBlobClient::new(dyn_transport)),
            keys: Arc::new(KeyDeriver::new(MasterSecret::from_bytes(vec![4; 32]))),
        }
    }

    fn start(setup: &Setup) -> IntakeHandle<MemoryStore> {
        let (handle, worker) = channel(
            4,
            setup.store.clone(),
            setup.blobs.clone(),
            setup.keys.clone(),
            Arc::new(ManualClock::new(500)),
        );
        worker.spawn();
        handle
    }

    #[tokio::test]
    async fn test_document_confirmed_with_address() {
        let setup = setup();
        let handle = start(&setup);
        let subject = SubjectId::from("u1");

        let ticket = handle
            .submit_document(
                &subject,
                "d1".into(),
                DocumentCategory::Allergies,
                "Allergies",
                b"peanuts".to_vec(),
            )
            .await
            .unwrap();
        let outcome = ticket.wait().await.unwrap();
        assert_eq!(outcome.status, ProcessingStatus::Confirmed);

        let record = setup.store.get_document(&"d1".into()).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Confirmed);
        assert_eq!(record.blob_address, outcome.blob_address);
        assert_eq!(record.uploaded_at, 500);

        let key = setup.keys.derive(&KeyPolicy::subject_document("u1", "d1"));
        let plain = setup
            .blobs
            .retrieve_and_decrypt(record.blob_address.as_deref().unwrap(), key.as_bytes())
            .await
            .unwrap();
        assert_eq!(plain, b"peanuts");
    }

    #[tokio::test]
    async fn test_upload_failure_marks_failed() {
        let setup = setup();
        setup.transport.set_offline(true);
        let handle = start(&setup);

        let outcome = handle
            .submit_document(
                &"u1".into(),
                "d1".into(),
                DocumentCategory::LabResults,
                "Labs",
                b"x".to_vec(),
            )
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(outcome.status, ProcessingStatus::Failed);
        assert!(outcome.error.is_some());
        let record = setup.store.get_document(&"d1".into()).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Failed);
        assert!(!record.is_disclosable());
    }

    #[tokio::test]
    async fn test_duplicate_document_rejected() {
        let setup = setup();
        let handle = start(&setup);
        let subject = SubjectId::from("u1");

        handle
            .submit_document(&subject, "d1".into(), DocumentCategory::Other, "a", vec![1])
            .await
            .unwrap();
        let err = handle
            .submit_document(&subject, "d1".into(), DocumentCategory::Other, "b", vec![2])
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::DuplicateDocument(_)));
    }

    #[tokio::test]
    async fn test_did_document_uses_subject_key() {
        let setup = setup();
        let handle = start(&setup);
        let subject = SubjectId::from("u1");

        let err = handle
            .submit_did_document(&subject, b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::SubjectNotFound(_)));

        setup
            .store
            .upsert_subject(&SubjectRecord::new("u1", "did:example:u1"))
            .await
            .unwrap();
        let outcome = handle
            .submit_did_document(&subject, b"{\"id\":\"did:example:u1\"}".to_vec())
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(outcome.status, ProcessingStatus::Confirmed);

        let key = setup.keys.derive(&KeyPolicy::subject("u1"));
        let plain = setup
            .blobs
            .retrieve_and_decrypt(outcome.blob_address.as_deref().unwrap(), key.as_bytes())
            .await
            .unwrap();
        assert_eq!(plain, b"{\"id\":\"did:example:u1\"}");
    }

    #[tokio::test]
    async fn test_stopped_worker_fails_submission() {
        let setup = setup();
        let (handle, worker) = channel(
            1,
            setup.store.clone(),
            setup.blobs.clone(),
            setup.keys.clone(),
            Arc::new(ManualClock::new(0)),
        );
        drop(worker);

        let err = handle
            .submit_document(&"u1".into(), "d1".into(), DocumentCategory::Other, "t", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::IntakeClosed));

        let record = setup.store.get_document(&"d1".into()).await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Failed);
    }
}
