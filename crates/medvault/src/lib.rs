//! # MedVault
//!
//! Encrypted custody of medical documents, and controlled disclosure of them
//! to third parties who present a credential.
//!
//! ## Overview
//!
//! - **Documents** are encrypted under a key derived per (subject, document)
//!   and stored as opaque blobs; the Vault keeps only metadata.
//! - **Credentials** are signed access tokens or emergency envelopes. The
//!   subject can revoke either before it expires.
//! - **Disclosure** verifies a credential, records a grant on the ledger,
//!   writes an audit entry, and only then decrypts the covered documents.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use medvault::blob::{BlobError, HttpBlobConfig, HttpBlobTransport};
//! use medvault::core::{ResponderMeta, SystemClock};
//! use medvault::ledger::{HttpLedger, HttpLedgerConfig};
//! use medvault::store::{SqliteStore, SubjectRecord};
//! use medvault::{Vault, VaultConfig, VaultSecrets};
//!
//! async fn example() -> medvault::Result<()> {
//!     let vault = Vault::new(
//!         VaultSecrets::from_env()?,
//!         Arc::new(SqliteStore::open("vault.db")?),
//!         Arc::new(HttpBlobTransport::new(HttpBlobConfig::default()).map_err(BlobError::from)?),
//!         Arc::new(HttpLedger::new(HttpLedgerConfig::default())?),
//!         Arc::new(SystemClock),
//!         VaultConfig::default(),
//!     );
//!
//!     vault
//!         .register_subject(&SubjectRecord::new("u1", "did:example:u1"))
//!         .await?;
//!     let envelope = vault.issue_emergency_envelope(&"u1".into()).await?;
//!
//!     let disclosure = vault
//!         .disclose(&envelope.serialized, ResponderMeta::named("Dr. A"))
//!         .await?;
//!     println!("{} documents", disclosure.packet.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `medvault::core` - Identifiers, cipher and key derivation
//! - `medvault::store` - Data store abstraction and SQLite
//! - `medvault::blob` - Encrypted blob client
//! - `medvault::tokens` - Access tokens and emergency envelopes

pub mod config;
pub mod disclosure;
pub mod error;
pub mod intake;
pub mod ledger;
pub mod vault;

// Re-export component crates
pub use medvault_blob as blob;
pub use medvault_core as core;
pub use medvault_store as store;
pub use medvault_tokens as tokens;

// Re-export main types for convenience
pub use config::{VaultConfig, VaultSecrets};
pub use disclosure::{
    CredentialSummary, DisclosedDocument, Disclosure, DisclosurePacket, DisclosureRequest,
    DisclosureStage,
};
pub use error::{ConfigError, LedgerError, Result, VaultError, INVALID_CREDENTIAL_MESSAGE};
pub use intake::{IntakeHandle, IntakeOutcome, IntakeTarget, IntakeTicket};
pub use ledger::{AccessLevel, GrantRequest, Ledger, LedgerGrant};
pub use vault::Vault;
