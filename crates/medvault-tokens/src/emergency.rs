//! Emergency envelopes.
//!
//! An envelope is the JSON object
//! `{envelopeId, subjectId, did, documentIds, issuedAtMillis, signature}`,
//! where `signature` is the hex HMAC-SHA256 of the canonical JSON of every
//! other field. The serialized form is the standard base64 of the signed JSON.
//! Envelopes are valid for 24 hours from issuance.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use medvault_core::{Clock, DocumentId, SubjectId, TokenId};

use crate::access::dedup_ids;
use crate::error::EnvelopeError;
use crate::secret::SigningSecret;

type HmacSha256 = Hmac<Sha256>;

/// How long an envelope stays valid.
pub const ENVELOPE_TTL_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// A verified emergency envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyEnvelope {
    pub envelope_id: TokenId,
    pub subject_id: SubjectId,
    pub did: String,
    pub document_ids: Vec<DocumentId>,
    pub issued_at_millis: i64,
    pub signature: String,
}

impl EmergencyEnvelope {
    /// When the envelope stops being accepted (Unix ms).
    pub fn expires_at(&self) -> i64 {
        self.issued_at_millis + ENVELOPE_TTL_MILLIS
    }
}

/// The signed fields, keys in sorted order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedFields<'a> {
    did: &'a str,
    document_ids: &'a [DocumentId],
    envelope_id: &'a TokenId,
    issued_at_millis: i64,
    subject_id: &'a SubjectId,
}

impl<'a> SignedFields<'a> {
    fn of(envelope: &'a EmergencyEnvelope) -> Self {
        Self {
            did: &envelope.did,
            document_ids: &envelope.document_ids,
            envelope_id: &envelope.envelope_id,
            issued_at_millis: envelope.issued_at_millis,
            subject_id: &envelope.subject_id,
        }
    }
}

/// A freshly issued envelope.
#[derive(Debug, Clone)]
pub struct IssuedEnvelope {
    /// Base64 form handed to the subject (typically rendered as a QR code).
    pub serialized: String,
    pub envelope: EmergencyEnvelope,
}

/// Signs and verifies emergency envelopes.
pub struct EnvelopeSigner {
    secret: SigningSecret,
    clock: Arc<dyn Clock>,
}

impl EnvelopeSigner {
    /// Create a signer over `secret`.
    pub fn new(secret: SigningSecret, clock: Arc<dyn Clock>) -> Self {
        Self { secret, clock }
    }

    fn mac(&self, envelope: &EmergencyEnvelope) -> Result<HmacSha256, EnvelopeError> {
        let canonical = serde_json::to_vec(&SignedFields::of(envelope))
            .map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        mac.update(&canonical);
        Ok(mac)
    }

    /// Issue an envelope for `subject_id` naming `document_ids`.
    pub fn issue(
        &self,
        subject_id: &SubjectId,
        did: &str,
        document_ids: &[DocumentId],
    ) -> Result<IssuedEnvelope, EnvelopeError> {
        let mut envelope = EmergencyEnvelope {
            envelope_id: TokenId::generate(),
            subject_id: subject_id.clone(),
            did: did.to_string(),
            document_ids: dedup_ids(document_ids),
            issued_at_millis: self.clock.now_millis(),
            signature: String::new(),
        };
        envelope.signature = hex::encode(self.mac(&envelope)?.finalize().into_bytes());

        let json =
            serde_json::to_vec(&envelope).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        Ok(IssuedEnvelope {
            serialized: STANDARD.encode(json),
            envelope,
        })
    }

    /// Verify the signature (constant time), then the 24 hour age limit.
    pub fn verify(&self, serialized: &str) -> Result<EmergencyEnvelope, EnvelopeError> {
        let json = STANDARD
            .decode(serialized.trim())
            .map_err(|e| EnvelopeError::Malformed(format!("base64: {}", e)))?;
        let envelope: EmergencyEnvelope =
            serde_json::from_slice(&json).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        let signature =
            hex::decode(&envelope.signature).map_err(|_| EnvelopeError::SignatureMismatch)?;
        self.mac(&envelope)?
            .verify_slice(&signature)
            .map_err(|_| EnvelopeError::SignatureMismatch)?;

        if self.clock.now_millis() - envelope.issued_at_millis > ENVELOPE_TTL_MILLIS {
            return Err(EnvelopeError::Expired);
        }

        Ok(envelope)
    }
}
