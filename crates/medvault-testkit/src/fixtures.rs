//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use medvault::ledger::memory::MemoryLedger;
use medvault::{Vault, VaultConfig, VaultSecrets};
use medvault_blob::{EncryptedBlobClient, MemoryBlobTransport};
use medvault_core::{
    Clock, DocumentCategory, DocumentId, KeyDeriver, KeyPolicy, ManualClock, MasterSecret, SubjectId,
};
use medvault_store::{DataStore, DocumentRecord, MemoryStore, ProcessingStatus, SubjectRecord};

use crate::counting::CountingStore;

/// Master secret used by every fixture.
pub const MASTER_SECRET: [u8; 32] = [0x4d; 32];

/// Token and envelope signing secret used by every fixture.
pub const SIGNING_SECRET: [u8; 32] = [0x53; 32];

/// Start time of every fixture clock (Unix ms).
pub const START_MILLIS: i64 = 1_700_000_000_000;

/// Secrets matching [`MASTER_SECRET`] and [`SIGNING_SECRET`].
pub fn test_secrets() -> VaultSecrets {
    VaultSecrets::from_bytes(MASTER_SECRET.to_vec(), SIGNING_SECRET.to_vec())
        .expect("fixture secrets are long enough")
}

/// Route tracing output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .try_init();
}

/// A vault wired to in-memory collaborators and a manual clock.
pub struct TestVault<S: DataStore = MemoryStore> {
    pub vault: Vault<CountingStore<S>>,
    pub store: Arc<CountingStore<S>>,
    pub blobs: Arc<MemoryBlobTransport>,
    pub ledger: Arc<MemoryLedger>,
    pub clock: Arc<ManualClock>,
    keys: KeyDeriver,
    client: EncryptedBlobClient<Arc<MemoryBlobTransport>>,
}

impl TestVault<MemoryStore> {
    /// Create a fixture over a fresh memory store.
    pub fn new() -> Self {
        Self::with_config(VaultConfig::default())
    }

    pub fn with_config(config: VaultConfig) -> Self {
        TestVault::with_store(MemoryStore::new(), config)
    }
}

impl Default for TestVault<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DataStore + 'static> TestVault<S> {
    /// Create a fixture over any store.
    pub fn with_store(store: S, config: VaultConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START_MILLIS));
        let store = Arc::new(CountingStore::new(store));
        let blobs = Arc::new(MemoryBlobTransport::new());
        let ledger = Arc::new(MemoryLedger::new(clock.clone()));

        let vault = Vault::new(
            test_secrets(),
            store.clone(),
            blobs.clone(),
            ledger.clone(),
            clock.clone(),
            config,
        );

        Self {
            vault,
            store,
            blobs: blobs.clone(),
            ledger,
            clock,
            keys: KeyDeriver::new(MasterSecret::from_bytes(MASTER_SECRET.to_vec())),
            client: EncryptedBlobClient::new(blobs),
        }
    }

    /// Register a subject with DID `did:example:<id>`.
    pub async fn add_subject(&self, subject_id: &str) -> SubjectRecord {
        let subject = SubjectRecord::new(subject_id, format!("did:example:{}", subject_id));
        self.vault
            .register_subject(&subject)
            .await
            .expect("register subject");
        subject
    }

    /// Seed a confirmed document whose blob is already in the blob store.
    ///
    /// Advances the clock by one millisecond so upload times are distinct.
    pub async fn add_document(
        &self,
        subject_id: &str,
        document_id: &str,
        category: DocumentCategory,
        plaintext: &[u8],
    ) -> DocumentRecord {
        let subject_id = SubjectId::new(subject_id);
        let document_id = DocumentId::new(document_id);
        let key = self.keys.derive(&KeyPolicy::subject_document(
            subject_id.clone(),
            document_id.clone(),
        ));
        let stored = self
            .client
            .store_encrypted(plaintext, key.as_bytes())
            .await
            .expect("store blob");

        let record = DocumentRecord {
            document_id,
            subject_id,
            category,
            title: format!("{} document", category),
            blob_address: Some(stored.address),
            uploaded_at: self.clock.now_millis(),
            status: ProcessingStatus::Confirmed,
            active: true,
        };
        self.store
            .insert_document(&record)
            .await
            .expect("insert document");
        self.clock.advance(1);
        record
    }

    /// Flip a byte of the document's stored ciphertext.
    pub fn corrupt(&self, document: &DocumentRecord) {
        let address = document.blob_address.as_deref().expect("confirmed document");
        assert!(self.blobs.corrupt(address), "blob should exist");
    }

    /// Remove the document's blob from the blob store.
    pub fn lose(&self, document: &DocumentRecord) {
        let address = document.blob_address.as_deref().expect("confirmed document");
        assert!(self.blobs.remove(address), "blob should exist");
    }
}
