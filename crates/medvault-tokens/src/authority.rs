//! Credential issuance with persistence, and verification with revocation.

use std::sync::Arc;

use medvault_core::{AccessCategory, Clock, DocumentId, SubjectId, TokenId};
use medvault_store::{
    CredentialKind, CredentialRecord, DataStore, InsertResult, RevokeOutcome, StoreError,
};

use crate::access::{AccessToken, AccessTokenCodec, IssuedToken};
use crate::emergency::{EmergencyEnvelope, EnvelopeSigner, IssuedEnvelope};
use crate::error::{EnvelopeError, Result, TokenError};
use crate::secret::SigningSecret;

/// A credential that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifiedCredential {
    Access(AccessToken),
    Emergency(EmergencyEnvelope),
}

impl VerifiedCredential {
    pub fn subject_id(&self) -> &SubjectId {
        match self {
            VerifiedCredential::Access(t) => &t.subject_id,
            VerifiedCredential::Emergency(e) => &e.subject_id,
        }
    }

    pub fn token_id(&self) -> &TokenId {
        match self {
            VerifiedCredential::Access(t) => &t.token_id,
            VerifiedCredential::Emergency(e) => &e.envelope_id,
        }
    }

    pub fn document_ids(&self) -> &[DocumentId] {
        match self {
            VerifiedCredential::Access(t) => &t.document_ids,
            VerifiedCredential::Emergency(e) => &e.document_ids,
        }
    }

    /// Envelopes are always emergency access.
    pub fn category(&self) -> AccessCategory {
        match self {
            VerifiedCredential::Access(t) => t.category,
            VerifiedCredential::Emergency(_) => AccessCategory::Emergency,
        }
    }

    /// Unix ms.
    pub fn expires_at(&self) -> i64 {
        match self {
            VerifiedCredential::Access(t) => t.expires_at,
            VerifiedCredential::Emergency(e) => e.expires_at(),
        }
    }
}

/// Whether a serialized credential looks like a compact JWT.
pub fn is_access_token_shape(serialized: &str) -> bool {
    serialized.trim().split('.').count() == 3
}

/// Issues credentials, records them, and checks them against the revocation list.
pub struct TokenAuthority<S> {
    store: Arc<S>,
    tokens: AccessTokenCodec,
    envelopes: EnvelopeSigner,
    clock: Arc<dyn Clock>,
}

impl<S: DataStore> TokenAuthority<S> {
    /// Create an authority.
    ///
    /// Envelopes are signed with `envelope_secret` when given, otherwise with
    /// `signing_secret`.
    pub fn new(
        store: Arc<S>,
        signing_secret: &SigningSecret,
        envelope_secret: Option<SigningSecret>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let envelope_secret = envelope_secret.unwrap_or_else(|| signing_secret.clone());
        Self {
            tokens: AccessTokenCodec::new(signing_secret, clock.clone()),
            envelopes: EnvelopeSigner::new(envelope_secret, clock.clone()),
            store,
            clock,
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    async fn persist(&self, record: CredentialRecord) -> Result<()> {
        match self.store.insert_credential(&record).await? {
            InsertResult::Inserted => Ok(()),
            InsertResult::AlreadyExists => Err(StoreError::InvalidData(format!(
                "credential {} already exists",
                record.token_id
            ))
            .into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Issuance
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue and record an access token.
    pub async fn issue_access_token(
        &self,
        subject_id: &SubjectId,
        document_ids: &[DocumentId],
        category: AccessCategory,
        duration_hours: u32,
    ) -> Result<IssuedToken> {
        let issued = self
            .tokens
            .issue(subject_id, document_ids, category, duration_hours)?;

        self.persist(CredentialRecord {
            token_id: issued.token_id.clone(),
            subject_id: subject_id.clone(),
            kind: CredentialKind::AccessToken { category },
            document_ids: issued.document_ids.clone(),
            issued_at: issued.issued_at,
            expires_at: issued.expires_at,
            active: true,
            revoked_at: None,
        })
        .await?;

        tracing::info!(
            subject = %subject_id,
            token = %issued.token_id,
            category = %category,
            documents = issued.document_ids.len(),
            "issued access token"
        );
        Ok(issued)
    }

    /// Issue and record an emergency envelope.
    pub async fn issue_emergency_envelope(
        &self,
        subject_id: &SubjectId,
        did: &str,
        document_ids: &[DocumentId],
    ) -> Result<IssuedEnvelope> {
        let issued = self.envelopes.issue(subject_id, did, document_ids)?;
        let envelope = &issued.envelope;

        self.persist(CredentialRecord {
            token_id: envelope.envelope_id.clone(),
            subject_id: subject_id.clone(),
            kind: CredentialKind::EmergencyEnvelope,
            document_ids: envelope.document_ids.clone(),
            issued_at: envelope.issued_at_millis,
            expires_at: envelope.expires_at(),
            active: true,
            revoked_at: None,
        })
        .await?;

        tracing::info!(
            subject = %subject_id,
            envelope = %envelope.envelope_id,
            documents = envelope.document_ids.len(),
            "issued emergency envelope"
        );
        Ok(issued)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify an access token: signature, expiry, then revocation.
    pub async fn verify_access_token(&self, serialized: &str) -> Result<AccessToken> {
        let token = self.tokens.verify(serialized)?;
        if self.store.is_revoked(&token.token_id).await? {
            return Err(TokenError::Revoked.into());
        }
        Ok(token)
    }

    /// Verify an emergency envelope: signature, age, then revocation.
    pub async fn verify_envelope(&self, serialized: &str) -> Result<EmergencyEnvelope> {
        let envelope = self.envelopes.verify(serialized)?;
        if self.store.is_revoked(&envelope.envelope_id).await? {
            return Err(EnvelopeError::Revoked.into());
        }
        Ok(envelope)
    }

    /// Verify either kind of credential, chosen by its shape.
    pub async fn verify_credential(&self, serialized: &str) -> Result<VerifiedCredential> {
        let serialized = serialized.trim();
        if is_access_token_shape(serialized) {
            self.verify_access_token(serialized)
                .await
                .map(VerifiedCredential::Access)
        } else {
            self.verify_envelope(serialized)
                .await
                .map(VerifiedCredential::Emergency)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Revocation
    // ─────────────────────────────────────────────────────────────────────────

    /// Revoke a credential on behalf of the subject it was issued to.
    pub async fn revoke(&self, token_id: &TokenId, subject_id: &SubjectId) -> Result<RevokeOutcome> {
        let outcome = self
            .store
            .mark_revoked(token_id, subject_id, self.clock.now_millis())
            .await?;

        match outcome {
            RevokeOutcome::Revoked => {
                tracing::info!(subject = %subject_id, token = %token_id, "revoked credential")
            }
            other => {
                tracing::debug!(subject = %subject_id, token = %token_id, outcome = ?other, "revocation had no effect")
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthorityError;
    use medvault_core::ManualClock;
    use medvault_store::MemoryStore;

    const NOW: i64 = 1_700_000_000_000;

    fn authority() -> (TokenAuthority<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW));
        let authority = TokenAuthority::new(
            Arc::new(MemoryStore::new()),
            &SigningSecret::from_bytes(vec![8; 32]),
            None,
            clock.clone(),
        );
        (authority, clock)
    }

    fn docs() -> Vec<DocumentId> {
        vec!["d1".into(), "d2".into()]
    }

    #[tokio::test]
    async fn test_issue_persists_record() {
        let (authority, _) = authority();
        let issued = authority
            .issue_access_token(&"u1".into(), &docs(), AccessCategory::Share, 4)
            .await
            .unwrap();

        let record = authority
            .store()
            .get_credential(&issued.token_id)
            .await
            .unwrap()
            .unwrap();
        assert!(record.active);
        assert_eq!(record.subject_id.as_str(), "u1");
        assert_eq!(record.document_ids, docs());
        assert_eq!(record.expires_at, issued.expires_at);
    }

    #[tokio::test]
    async fn test_verify_credential_dispatches_on_shape() {
        let (authority, _) = authority();
        let token = authority
            .issue_access_token(&"u1".into(), &docs(), AccessCategory::Share, 1)
            .await
            .unwrap();
        let envelope = authority
            .issue_emergency_envelope(&"u1".into(), "did:example:u1", &docs())
            .await
            .unwrap();

        let verified = authority.verify_credential(&token.serialized).await.unwrap();
        assert!(matches!(verified, VerifiedCredential::Access(_)));
        assert_eq!(verified.token_id(), &token.token_id);

        let verified = authority
            .verify_credential(&envelope.serialized)
            .await
            .unwrap();
        assert!(matches!(verified, VerifiedCredential::Emergency(_)));
        assert_eq!(verified.category(), AccessCategory::Emergency);
        assert_eq!(verified.document_ids(), docs().as_slice());
    }

    #[tokio::test]
    async fn test_revoke_then_verify_fails() {
        let (authority, _) = authority();
        let subject = SubjectId::from("u1");
        let token = authority
            .issue_access_token(&subject, &docs(), AccessCategory::Share, 1)
            .await
            .unwrap();

        assert_eq!(
            authority.revoke(&token.token_id, &subject).await.unwrap(),
            RevokeOutcome::Revoked
        );
        let err = authority
            .verify_access_token(&token.serialized)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Token(TokenError::Revoked)));
        assert!(err.is_credential_rejection());

        assert_eq!(
            authority.revoke(&token.token_id, &subject).await.unwrap(),
            RevokeOutcome::AlreadyRevoked
        );
    }

    #[tokio::test]
    async fn test_revoked_envelope_rejected() {
        let (authority, _) = authority();
        let subject = SubjectId::from("u1");
        let issued = authority
            .issue_emergency_envelope(&subject, "did:example:u1", &docs())
            .await
            .unwrap();

        authority
            .revoke(&issued.envelope.envelope_id, &subject)
            .await
            .unwrap();
        let err = authority
            .verify_credential(&issued.serialized)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Envelope(EnvelopeError::Revoked)));
    }

    #[tokio::test]
    async fn test_only_issuing_subject_may_revoke() {
        let (authority, _) = authority();
        let token = authority
            .issue_access_token(&"u1".into(), &docs(), AccessCategory::Share, 1)
            .await
            .unwrap();

        assert_eq!(
            authority
                .revoke(&token.token_id, &"u2".into())
                .await
                .unwrap(),
            RevokeOutcome::NotOwner
        );
        assert!(authority
            .verify_access_token(&token.serialized)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unrecorded_credential_is_revoked() {
        let (authority, clock) = authority();
        // Same secret, but never persisted through the authority.
        let codec = AccessTokenCodec::new(&SigningSecret::from_bytes(vec![8; 32]), clock);
        let stray = codec
            .issue(&"u1".into(), &docs(), AccessCategory::Share, 1)
            .unwrap();

        let err = authority
            .verify_access_token(&stray.serialized)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Token(TokenError::Revoked)));
    }

    #[tokio::test]
    async fn test_expired_before_revocation_check() {
        let (authority, clock) = authority();
        let token = authority
            .issue_access_token(&"u1".into(), &docs(), AccessCategory::Share, 1)
            .await
            .unwrap();

        clock.advance(3_600_000);
        let err = authority
            .verify_credential(&token.serialized)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthorityError::Token(TokenError::Expired)));
    }

    #[tokio::test]
    async fn test_dedicated_envelope_secret() {
        let clock = Arc::new(ManualClock::new(NOW));
        let store = Arc::new(MemoryStore::new());
        let signing = SigningSecret::from_bytes(vec![8; 32]);

        let dedicated = TokenAuthority::new(
            store.clone(),
            &signing,
            Some(SigningSecret::from_bytes(vec![9; 32])),
            clock.clone(),
        );
        let shared = TokenAuthority::new(store, &signing, None, clock);

        let issued = dedicated
            .issue_emergency_envelope(&"u1".into(), "did:example:u1", &docs())
            .await
            .unwrap();
        assert!(dedicated.verify_envelope(&issued.serialized).await.is_ok());
        assert!(matches!(
            shared.verify_envelope(&issued.serialized).await,
            Err(AuthorityError::Envelope(EnvelopeError::SignatureMismatch))
        ));
    }
}
