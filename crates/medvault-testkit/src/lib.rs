//! # MedVault Testkit
//!
//! Testing utilities for MedVault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a [`TestVault`] wired to in-memory collaborators and a manual clock
//! - **Counting store**: a [`CountingStore`] wrapper that counts pipeline calls
//!   and can fail grant-record writes on demand
//! - **Generators**: Proptest strategies for property-based testing
//!
//! The end-to-end disclosure scenarios live in this crate's `tests/` directory.
//!
//! ## Test Fixtures
//!
//! ```rust
//! use medvault_core::{DocumentCategory, ResponderMeta};
//! use medvault_testkit::TestVault;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let fixture = TestVault::new();
//! fixture.add_subject("u1").await;
//! fixture
//!     .add_document("u1", "d1", DocumentCategory::Allergies, b"penicillin")
//!     .await;
//!
//! let envelope = fixture
//!     .vault
//!     .issue_emergency_envelope(&"u1".into())
//!     .await
//!     .unwrap();
//! let disclosure = fixture
//!     .vault
//!     .disclose(&envelope.serialized, ResponderMeta::named("Dr. A"))
//!     .await
//!     .unwrap();
//! assert_eq!(disclosure.packet.len(), 1);
//! # });
//! ```

pub mod counting;
pub mod fixtures;
pub mod generators;

pub use counting::CountingStore;
pub use fixtures::{init_tracing, test_secrets, TestVault, MASTER_SECRET, SIGNING_SECRET, START_MILLIS};
pub use generators::DocumentSeed;
