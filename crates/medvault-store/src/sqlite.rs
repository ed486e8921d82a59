//! SQLite implementation of the DataStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use medvault_core::{
    AccessCategory, DocumentCategory, DocumentId, ResponderMeta, SubjectId, TokenId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::records::{
    AccessGrantRecord, CredentialKind, CredentialRecord, DocumentRecord, InsertResult,
    ProcessingStatus, RevokeOutcome, SubjectRecord,
};
use crate::traits::{matches_filter, DataStore};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(StoreError::InvalidData(message)),
    )
}

fn parse_status(row: &Row<'_>, idx: usize) -> rusqlite::Result<ProcessingStatus> {
    let raw: String = row.get(idx)?;
    ProcessingStatus::parse(&raw)
        .ok_or_else(|| conversion_error(idx, format!("unknown status: {}", raw)))
}

fn parse_category(row: &Row<'_>, idx: usize) -> rusqlite::Result<DocumentCategory> {
    let raw: String = row.get(idx)?;
    DocumentCategory::parse(&raw)
        .ok_or_else(|| conversion_error(idx, format!("unknown category: {}", raw)))
}

fn encode_cbor<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_cbor<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let bytes: Vec<u8> = row.get(idx)?;
    ciborium::from_reader(&bytes[..]).map_err(|e| conversion_error(idx, e.to_string()))
}

const SUBJECT_COLUMNS: &str =
    "subject_id, did, wallet_address, did_document_address, did_status";

fn row_to_subject(row: &Row<'_>) -> rusqlite::Result<SubjectRecord> {
    Ok(SubjectRecord {
        subject_id: SubjectId::new(row.get::<_, String>(0)?),
        did: row.get(1)?,
        wallet_address: row.get(2)?,
        did_document_address: row.get(3)?,
        did_status: parse_status(row, 4)?,
    })
}

const DOCUMENT_COLUMNS: &str =
    "document_id, subject_id, category, title, blob_address, uploaded_at, status, active";

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        document_id: DocumentId::new(row.get::<_, String>(0)?),
        subject_id: SubjectId::new(row.get::<_, String>(1)?),
        category: parse_category(row, 2)?,
        title: row.get(3)?,
        blob_address: row.get(4)?,
        uploaded_at: row.get(5)?,
        status: parse_status(row, 6)?,
        active: row.get(7)?,
    })
}

const CREDENTIAL_COLUMNS: &str =
    "token_id, subject_id, kind, category, document_ids, issued_at, expires_at, active, revoked_at";

fn row_to_credential(row: &Row<'_>) -> rusqlite::Result<CredentialRecord> {
    let kind: String = row.get(2)?;
    let category: String = row.get(3)?;
    let category = AccessCategory::parse(&category)
        .ok_or_else(|| conversion_error(3, format!("unknown access category: {}", category)))?;

    let kind = match kind.as_str() {
        "ACCESS_TOKEN" => CredentialKind::AccessToken { category },
        "EMERGENCY_ENVELOPE" => CredentialKind::EmergencyEnvelope,
        other => return Err(conversion_error(2, format!("unknown credential kind: {}", other))),
    };

    Ok(CredentialRecord {
        token_id: TokenId::new(row.get::<_, String>(0)?),
        subject_id: SubjectId::new(row.get::<_, String>(1)?),
        kind,
        document_ids: decode_cbor(row, 4)?,
        issued_at: row.get(5)?,
        expires_at: row.get(6)?,
        active: row.get(7)?,
        revoked_at: row.get(8)?,
    })
}

const GRANT_COLUMNS: &str = "record_id, subject_id, token_id, ledger_grant_id, responder, \
     categories, expires_at, created_at";

fn row_to_grant(row: &Row<'_>) -> rusqlite::Result<AccessGrantRecord> {
    let responder: String = row.get(4)?;
    let responder: ResponderMeta =
        serde_json::from_str(&responder).map_err(|e| conversion_error(4, e.to_string()))?;

    Ok(AccessGrantRecord {
        record_id: row.get(0)?,
        subject_id: SubjectId::new(row.get::<_, String>(1)?),
        token_id: TokenId::new(row.get::<_, String>(2)?),
        ledger_grant_id: row.get::<_, String>(3)?.into(),
        responder,
        categories: decode_cbor(row, 5)?,
        expires_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[async_trait]
impl DataStore for SqliteStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Subjects
    // ─────────────────────────────────────────────────────────────────────────

    async fn upsert_subject(&self, subject: &SubjectRecord) -> Result<()> {
        let subject = subject.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO subjects (subject_id, did, wallet_address, did_document_address, did_status)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(subject_id) DO UPDATE SET
                    did = excluded.did,
                    wallet_address = excluded.wallet_address,
                    did_document_address = excluded.did_document_address,
                    did_status = excluded.did_status",
                params![
                    subject.subject_id.as_str(),
                    subject.did,
                    subject.wallet_address,
                    subject.did_document_address,
                    subject.did_status.as_str(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_subject(&self, subject_id: &SubjectId) -> Result<Option<SubjectRecord>> {
        let subject_id = subject_id.clone();
        self.run(move |conn| {
            let sql = format!("SELECT {} FROM subjects WHERE subject_id = ?1", SUBJECT_COLUMNS);
            Ok(conn
                .query_row(&sql, params![subject_id.as_str()], row_to_subject)
                .optional()?)
        })
        .await
    }

    async fn set_did_document(
        &self,
        subject_id: &SubjectId,
        status: ProcessingStatus,
        address: Option<&str>,
    ) -> Result<()> {
        let subject_id = subject_id.clone();
        let address = address.map(str::to_string);
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE subjects
                 SET did_status = ?2, did_document_address = COALESCE(?3, did_document_address)
                 WHERE subject_id = ?1",
                params![subject_id.as_str(), status.as_str(), address],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("subject {}", subject_id)));
            }
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_document(&self, document: &DocumentRecord) -> Result<InsertResult> {
        let document = document.clone();
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO documents
                    (document_id, subject_id, category, title, blob_address, uploaded_at, status, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    document.document_id.as_str(),
                    document.subject_id.as_str(),
                    document.category.as_str(),
                    document.title,
                    document.blob_address,
                    document.uploaded_at,
                    document.status.as_str(),
                    document.active,
                ],
            )?;
            Ok(if inserted == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn get_document(&self, document_id: &DocumentId) -> Result<Option<DocumentRecord>> {
        let document_id = document_id.clone();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM documents WHERE document_id = ?1",
                DOCUMENT_COLUMNS
            );
            Ok(conn
                .query_row(&sql, params![document_id.as_str()], row_to_document)
                .optional()?)
        })
        .await
    }

    async fn set_document_status(
        &self,
        document_id: &DocumentId,
        status: ProcessingStatus,
        blob_address: Option<&str>,
    ) -> Result<()> {
        let document_id = document_id.clone();
        let blob_address = blob_address.map(str::to_string);
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE documents
                 SET status = ?2, blob_address = COALESCE(?3, blob_address)
                 WHERE document_id = ?1",
                params![document_id.as_str(), status.as_str(), blob_address],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("document {}", document_id)));
            }
            Ok(())
        })
        .await
    }

    async fn deactivate_document(
        &self,
        subject_id: &SubjectId,
        document_id: &DocumentId,
    ) -> Result<bool> {
        let subject_id = subject_id.clone();
        let document_id = document_id.clone();
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE documents SET active = 0
                 WHERE document_id = ?1 AND subject_id = ?2 AND active = 1",
                params![document_id.as_str(), subject_id.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn find_active_documents(
        &self,
        subject_id: &SubjectId,
        ids: Option<&[DocumentId]>,
        categories: &[DocumentCategory],
    ) -> Result<Vec<DocumentRecord>> {
        if ids.map_or(false, |ids| ids.is_empty()) || categories.is_empty() {
            return Ok(Vec::new());
        }

        let subject_id = subject_id.clone();
        let ids = ids.map(<[DocumentId]>::to_vec);
        let categories = categories.to_vec();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM documents
                 WHERE subject_id = ?1 AND active = 1 AND status = ?2 AND blob_address IS NOT NULL
                 ORDER BY uploaded_at, document_id",
                DOCUMENT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![subject_id.as_str(), ProcessingStatus::Confirmed.as_str()],
                row_to_document,
            )?;

            let mut found = Vec::new();
            for row in rows {
                let document = row?;
                if matches_filter(&document, &subject_id, ids.as_deref(), &categories) {
                    found.push(document);
                }
            }
            Ok(found)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Credentials
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_credential(&self, record: &CredentialRecord) -> Result<InsertResult> {
        let record = record.clone();
        self.run(move |conn| {
            let document_ids = encode_cbor(&record.document_ids)?;
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO credentials
                    (token_id, subject_id, kind, category, document_ids, issued_at, expires_at, active, revoked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.token_id.as_str(),
                    record.subject_id.as_str(),
                    record.kind.kind_str(),
                    record.kind.access_category().as_str(),
                    document_ids,
                    record.issued_at,
                    record.expires_at,
                    record.active,
                    record.revoked_at,
                ],
            )?;
            Ok(if inserted == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn get_credential(&self, token_id: &TokenId) -> Result<Option<CredentialRecord>> {
        let token_id = token_id.clone();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM credentials WHERE token_id = ?1",
                CREDENTIAL_COLUMNS
            );
            Ok(conn
                .query_row(&sql, params![token_id.as_str()], row_to_credential)
                .optional()?)
        })
        .await
    }

    async fn mark_revoked(
        &self,
        token_id: &TokenId,
        subject_id: &SubjectId,
        at: i64,
    ) -> Result<RevokeOutcome> {
        let token_id = token_id.clone();
        let subject_id = subject_id.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "UPDATE credentials SET active = 0, revoked_at = ?3
                 WHERE token_id = ?1 AND subject_id = ?2 AND active = 1",
                params![token_id.as_str(), subject_id.as_str(), at],
            )?;

            let outcome = if changed > 0 {
                RevokeOutcome::Revoked
            } else {
                let owner: Option<String> = tx
                    .query_row(
                        "SELECT subject_id FROM credentials WHERE token_id = ?1",
                        params![token_id.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?;

                match owner {
                    None => RevokeOutcome::NotFound,
                    Some(owner) if owner != subject_id.as_str() => RevokeOutcome::NotOwner,
                    Some(_) => RevokeOutcome::AlreadyRevoked,
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn is_revoked(&self, token_id: &TokenId) -> Result<bool> {
        let token_id = token_id.clone();
        self.run(move |conn| {
            let active: Option<bool> = conn
                .query_row(
                    "SELECT active FROM credentials WHERE token_id = ?1",
                    params![token_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(!active.unwrap_or(false))
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grant records
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_grant_record(&self, record: &AccessGrantRecord) -> Result<()> {
        let record = record.clone();
        self.run(move |conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT seq FROM grant_records WHERE record_id = ?1",
                    params![record.record_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                return Err(StoreError::InvalidData(format!(
                    "grant record {} already exists",
                    record.record_id
                )));
            }

            let responder = serde_json::to_string(&record.responder)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let categories = encode_cbor(&record.categories)?;

            conn.execute(
                "INSERT INTO grant_records
                    (record_id, subject_id, token_id, ledger_grant_id, responder, categories, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.record_id,
                    record.subject_id.as_str(),
                    record.token_id.as_str(),
                    record.ledger_grant_id.as_str(),
                    responder,
                    categories,
                    record.expires_at,
                    record.created_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn grant_records_for(&self, subject_id: &SubjectId) -> Result<Vec<AccessGrantRecord>> {
        let subject_id = subject_id.clone();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM grant_records WHERE subject_id = ?1 ORDER BY seq",
                GRANT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![subject_id.as_str()], row_to_grant)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: &str, category: DocumentCategory, uploaded_at: i64) -> DocumentRecord {
        DocumentRecord {
            document_id: id.into(),
            subject_id: "u1".into(),
            category,
            title: format!("title {}", id),
            blob_address: Some(format!("addr-{}", id)),
            uploaded_at,
            status: ProcessingStatus::Confirmed,
            active: true,
        }
    }

    fn credential(id: &str, kind: CredentialKind) -> CredentialRecord {
        CredentialRecord {
            token_id: id.into(),
            subject_id: "u1".into(),
            kind,
            document_ids: vec!["d2".into(), "d1".into()],
            issued_at: 100,
            expires_at: 200,
            active: true,
            revoked_at: None,
        }
    }

    #[tokio::test]
    async fn test_subject_roundtrip_and_did_update() {
        let store = SqliteStore::open_memory().unwrap();
        let mut subject = SubjectRecord::new("u1", "did:example:u1");
        subject.wallet_address = Some("0xabc".into());
        store.upsert_subject(&subject).await.unwrap();

        let id = SubjectId::from("u1");
        assert_eq!(store.get_subject(&id).await.unwrap(), Some(subject));

        store
            .set_did_document(&id, ProcessingStatus::Confirmed, Some("bafy"))
            .await
            .unwrap();
        let loaded = store.get_subject(&id).await.unwrap().unwrap();
        assert_eq!(loaded.did_status, ProcessingStatus::Confirmed);
        assert_eq!(loaded.did_document_address.as_deref(), Some("bafy"));

        let missing = store
            .set_did_document(&"nobody".into(), ProcessingStatus::Failed, None)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_document_lifecycle() {
        let store = SqliteStore::open_memory().unwrap();
        let mut pending = document("d1", DocumentCategory::Allergies, 10);
        pending.status = ProcessingStatus::Pending;
        pending.blob_address = None;

        assert_eq!(
            store.insert_document(&pending).await.unwrap(),
            InsertResult::Inserted
        );
        assert_eq!(
            store.insert_document(&pending).await.unwrap(),
            InsertResult::AlreadyExists
        );

        let subject = SubjectId::from("u1");
        let found = store
            .find_active_documents(&subject, None, &DocumentCategory::ALL)
            .await
            .unwrap();
        assert!(found.is_empty());

        store
            .set_document_status(&"d1".into(), ProcessingStatus::Confirmed, Some("addr"))
            .await
            .unwrap();
        let found = store
            .find_active_documents(&subject, None, &DocumentCategory::ALL)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].blob_address.as_deref(), Some("addr"));

        assert!(store
            .deactivate_document(&subject, &"d1".into())
            .await
            .unwrap());
        let found = store
            .find_active_documents(&subject, None, &DocumentCategory::ALL)
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_find_active_orders_by_upload_then_id() {
        let store = SqliteStore::open_memory().unwrap();
        for doc in [
            document("c", DocumentCategory::Allergies, 2),
            document("b", DocumentCategory::Conditions, 1),
            document("a", DocumentCategory::BloodType, 2),
            document("x", DocumentCategory::Insurance, 0),
        ] {
            store.insert_document(&doc).await.unwrap();
        }

        let found = store
            .find_active_documents(&"u1".into(), None, &DocumentCategory::EMERGENCY)
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        let wanted = [DocumentId::from("c"), DocumentId::from("x")];
        let found = store
            .find_active_documents(&"u1".into(), Some(&wanted[..]), &DocumentCategory::EMERGENCY)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].document_id.as_str(), "c");
    }

    #[tokio::test]
    async fn test_credential_roundtrip_and_revoke() {
        let store = SqliteStore::open_memory().unwrap();
        let access = credential(
            "t1",
            CredentialKind::AccessToken {
                category: AccessCategory::Share,
            },
        );
        let envelope = credential("t2", CredentialKind::EmergencyEnvelope);
        store.insert_credential(&access).await.unwrap();
        store.insert_credential(&envelope).await.unwrap();

        assert_eq!(
            store.get_credential(&"t1".into()).await.unwrap(),
            Some(access)
        );
        assert_eq!(
            store.get_credential(&"t2".into()).await.unwrap(),
            Some(envelope)
        );

        let owner = SubjectId::from("u1");
        assert_eq!(
            store
                .mark_revoked(&"t1".into(), &"u2".into(), 5)
                .await
                .unwrap(),
            RevokeOutcome::NotOwner
        );
        assert!(!store.is_revoked(&"t1".into()).await.unwrap());

        assert_eq!(
            store.mark_revoked(&"t1".into(), &owner, 5).await.unwrap(),
            RevokeOutcome::Revoked
        );
        assert_eq!(
            store.mark_revoked(&"t1".into(), &owner, 6).await.unwrap(),
            RevokeOutcome::AlreadyRevoked
        );
        assert_eq!(
            store.mark_revoked(&"t9".into(), &owner, 6).await.unwrap(),
            RevokeOutcome::NotFound
        );

        assert!(store.is_revoked(&"t1".into()).await.unwrap());
        assert!(store.is_revoked(&"t9".into()).await.unwrap());
        assert!(!store.is_revoked(&"t2".into()).await.unwrap());

        let revoked = store.get_credential(&"t1".into()).await.unwrap().unwrap();
        assert_eq!(revoked.revoked_at, Some(5));
    }

    #[tokio::test]
    async fn test_concurrent_revocations_single_winner() {
        let store = Arc::new(SqliteStore::open_memory().unwrap());
        store
            .insert_credential(&credential("t1", CredentialKind::EmergencyEnvelope))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .mark_revoked(&"t1".into(), &"u1".into(), i)
                    .await
                    .unwrap()
            }));
        }

        let mut revoked = 0;
        for handle in handles {
            if handle.await.unwrap() == RevokeOutcome::Revoked {
                revoked += 1;
            }
        }
        assert_eq!(revoked, 1);
    }

    #[tokio::test]
    async fn test_grant_records_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.db");

        let grant = AccessGrantRecord {
            record_id: AccessGrantRecord::new_record_id(),
            subject_id: "u1".into(),
            token_id: "t1".into(),
            ledger_grant_id: "g-1".into(),
            responder: ResponderMeta::named("Medic").with_location("Route 9"),
            categories: vec![DocumentCategory::Allergies, DocumentCategory::BloodType],
            expires_at: 3_600_000,
            created_at: 1,
        };

        {
            let store = SqliteStore::open(&path).unwrap();
            store.create_grant_record(&grant).await.unwrap();
            assert!(store.create_grant_record(&grant).await.is_err());
        }

        let store = SqliteStore::open(&path).unwrap();
        let records = store.grant_records_for(&"u1".into()).await.unwrap();
        assert_eq!(records, vec![grant]);
        assert!(store
            .grant_records_for(&"u2".into())
            .await
            .unwrap()
            .is_empty());
    }
}
