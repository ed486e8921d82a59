//! Proptest generators for property-based testing.

use proptest::prelude::*;

use medvault_core::{AccessCategory, DocumentCategory, DocumentId, ResponderMeta, SubjectId};

/// Generate a SubjectId.
pub fn subject_id() -> impl Strategy<Value = SubjectId> {
    "[a-z][a-z0-9]{0,15}".prop_map(SubjectId::new)
}

/// Generate a DocumentId.
pub fn document_id() -> impl Strategy<Value = DocumentId> {
    "doc-[a-z0-9]{1,12}".prop_map(DocumentId::new)
}

/// Generate any DocumentCategory.
pub fn document_category() -> impl Strategy<Value = DocumentCategory> {
    prop::sample::select(DocumentCategory::ALL.to_vec())
}

/// Generate an AccessCategory.
pub fn access_category() -> impl Strategy<Value = AccessCategory> {
    prop_oneof![Just(AccessCategory::Emergency), Just(AccessCategory::Share)]
}

/// Generate document bytes of specified max length.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a responder.
pub fn responder() -> impl Strategy<Value = ResponderMeta> {
    (
        "[A-Z][a-z]{1,10}",
        prop::option::of("[A-Z][a-z]{2,12} (Hospital|Clinic)"),
    )
        .prop_map(|(name, organization)| {
            let responder = ResponderMeta::named(format!("Dr. {}", name));
            match organization {
                Some(organization) => responder.with_organization(organization),
                None => responder,
            }
        })
}

/// A document to seed into a fixture.
#[derive(Debug, Clone)]
pub struct DocumentSeed {
    pub document_id: String,
    pub category: DocumentCategory,
    pub plaintext: Vec<u8>,
}

/// Generate between 1 and `max` documents with distinct ids.
pub fn document_seeds(max: usize) -> impl Strategy<Value = Vec<DocumentSeed>> {
    prop::collection::vec((document_category(), plaintext(256)), 1..=max.max(1)).prop_map(
        |documents| {
            documents
                .into_iter()
                .enumerate()
                .map(|(i, (category, plaintext))| DocumentSeed {
                    document_id: format!("d{}", i),
                    category,
                    plaintext,
                })
                .collect()
        },
    )
}
