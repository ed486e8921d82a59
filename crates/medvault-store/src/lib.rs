//! # MedVault Store
//!
//! Storage abstraction for MedVault. Provides a trait-based interface for
//! subjects, document metadata, issued credentials and the append-only
//! grant log, with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`DataStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`CredentialRecord`] - The row behind an issued credential
//! - [`AccessGrantRecord`] - One audit entry per disclosure
//!
//! ## Usage
//!
//! ```rust,no_run
//! use medvault_store::{DataStore, SqliteStore, SubjectRecord};
//!
//! async fn example() {
//!     let store = SqliteStore::open("vault.db").unwrap();
//!     store
//!         .upsert_subject(&SubjectRecord::new("u1", "did:example:u1"))
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **No overwrites**: inserting an existing document or credential id returns `AlreadyExists`
//! - **Fail closed**: an unknown credential is reported as revoked
//! - **Append-only audit**: grant records cannot be updated or deleted

pub mod error;
pub mod memory;
pub mod migration;
pub mod records;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use records::{
    AccessGrantRecord, CredentialKind, CredentialRecord, DocumentRecord, InsertResult,
    ProcessingStatus, RevokeOutcome, SubjectRecord,
};
pub use sqlite::SqliteStore;
pub use traits::DataStore;
