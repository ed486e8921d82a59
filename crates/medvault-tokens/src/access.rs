//! Signed access tokens (JWT, HS256).
//!
//! Claims are `sub, jti, docs, cat, iat, exp`, with `iat`/`exp` in seconds.
//! The library's own expiry check is disabled; expiry is judged against the
//! injected [`Clock`].

use std::collections::HashSet;
use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{crypto, decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use medvault_core::{AccessCategory, Clock, DocumentId, SubjectId, TokenId};

use crate::error::TokenError;
use crate::secret::SigningSecret;

/// Longest permitted token lifetime: 30 days.
pub const MAX_TOKEN_HOURS: u32 = 720;

const HOUR_MILLIS: i64 = 3_600_000;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    jti: String,
    docs: Vec<String>,
    cat: AccessCategory,
    iat: i64,
    exp: i64,
}

/// A verified access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub subject_id: SubjectId,
    pub token_id: TokenId,
    pub document_ids: Vec<DocumentId>,
    pub category: AccessCategory,
    /// Unix ms, second precision.
    pub issued_at: i64,
    /// Unix ms, second precision.
    pub expires_at: i64,
}

/// A freshly issued token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The compact JWT handed to the subject.
    pub serialized: String,
    pub token_id: TokenId,
    /// The de-duplicated document ids the token names.
    pub document_ids: Vec<DocumentId>,
    /// Clock reading at issuance (Unix ms).
    pub issued_at: i64,
    /// `issued_at` plus the requested duration, rounded up to a whole second.
    pub expires_at: i64,
}

/// Remove repeated ids, keeping the first occurrence of each.
pub fn dedup_ids(ids: &[DocumentId]) -> Vec<DocumentId> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Issues and verifies access tokens.
pub struct AccessTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl AccessTokenCodec {
    /// Create a codec signing with `secret`.
    pub fn new(secret: &SigningSecret, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            clock,
        }
    }

    /// Issue a token for `subject_id` covering `document_ids`.
    ///
    /// `duration_hours` must be in `1..=MAX_TOKEN_HOURS`.
    pub fn issue(
        &self,
        subject_id: &SubjectId,
        document_ids: &[DocumentId],
        category: AccessCategory,
        duration_hours: u32,
    ) -> Result<IssuedToken, TokenError> {
        if duration_hours == 0 || duration_hours > MAX_TOKEN_HOURS {
            return Err(TokenError::InvalidDuration(duration_hours));
        }

        let token_id = TokenId::generate();
        let document_ids = dedup_ids(document_ids);
        let now = self.clock.now_millis();
        let iat = now.div_euclid(1000);
        // Round up so the token lives at least the requested duration.
        let exp = (now + i64::from(duration_hours) * HOUR_MILLIS + 999).div_euclid(1000);

        let claims = Claims {
            sub: subject_id.to_string(),
            jti: token_id.to_string(),
            docs: document_ids.iter().map(|d| d.to_string()).collect(),
            cat: category,
            iat,
            exp,
        };

        let serialized = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            serialized,
            token_id,
            document_ids,
            issued_at: now,
            expires_at: exp * 1000,
        })
    }

    /// Verify signature, then expiry.
    ///
    /// The MAC over `header.payload` is checked before either segment is
    /// parsed, so any altered byte is a signature failure.
    pub fn verify(&self, serialized: &str) -> Result<AccessToken, TokenError> {
        let (message, signature) = match serialized.rsplit_once('.') {
            Some(parts) if serialized.split('.').count() == 3 => parts,
            _ => {
                return Err(TokenError::Malformed(
                    "expected three dot-separated segments".into(),
                ))
            }
        };
        let valid = crypto::verify(
            signature,
            message.as_bytes(),
            &self.decoding,
            Algorithm::HS256,
        )
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
        if !valid {
            return Err(TokenError::SignatureInvalid);
        }

        let data = decode::<Claims>(serialized, &self.decoding, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            },
        )?;
        let claims = data.claims;

        let expires_at = claims.exp * 1000;
        if self.clock.now_millis() >= expires_at {
            return Err(TokenError::Expired);
        }

        Ok(AccessToken {
            subject_id: claims.sub.into(),
            token_id: claims.jti.into(),
            document_ids: claims.docs.into_iter().map(DocumentId::from).collect(),
            category: claims.cat,
            issued_at: claims.iat * 1000,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvault_core::ManualClock;
    use proptest::prelude::*;

    fn codec(clock: Arc<ManualClock>) -> AccessTokenCodec {
        AccessTokenCodec::new(&SigningSecret::from_bytes(vec![5; 32]), clock)
    }

    fn ids(raw: &[&str]) -> Vec<DocumentId> {
        raw.iter().map(|s| DocumentId::from(*s)).collect()
    }

    #[test]
    fn test_issue_then_verify() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let codec = codec(clock);
        let issued = codec
            .issue(&"u1".into(), &ids(&["d1", "d2"]), AccessCategory::Share, 1)
            .unwrap();

        let token = codec.verify(&issued.serialized).unwrap();
        assert_eq!(token.subject_id.as_str(), "u1");
        assert_eq!(token.token_id, issued.token_id);
        assert_eq!(token.document_ids, ids(&["d1", "d2"]));
        assert_eq!(token.category, AccessCategory::Share);
        assert_eq!(token.expires_at - token.issued_at, HOUR_MILLIS);
    }

    #[test]
    fn test_duplicate_ids_keep_first_occurrence() {
        let codec = codec(Arc::new(ManualClock::new(0)));
        let issued = codec
            .issue(&"u1".into(), &ids(&["d2", "d1", "d2", "d3", "d1"]), AccessCategory::Share, 1)
            .unwrap();
        assert_eq!(issued.document_ids, ids(&["d2", "d1", "d3"]));
    }

    #[test]
    fn test_duration_bounds() {
        let codec = codec(Arc::new(ManualClock::new(0)));
        let subject = SubjectId::from("u1");

        assert_eq!(
            codec.issue(&subject, &[], AccessCategory::Share, 0).unwrap_err(),
            TokenError::InvalidDuration(0)
        );
        assert_eq!(
            codec
                .issue(&subject, &[], AccessCategory::Share, MAX_TOKEN_HOURS + 1)
                .unwrap_err(),
            TokenError::InvalidDuration(MAX_TOKEN_HOURS + 1)
        );
        assert!(codec
            .issue(&subject, &[], AccessCategory::Share, MAX_TOKEN_HOURS)
            .is_ok());
    }

    #[test]
    fn test_expires_after_duration() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let codec = codec(clock.clone());
        let issued = codec
            .issue(&"u1".into(), &ids(&["d1"]), AccessCategory::Emergency, 2)
            .unwrap();

        clock.advance(2 * HOUR_MILLIS - 1_000);
        assert!(codec.verify(&issued.serialized).is_ok());

        clock.advance(1_000);
        assert_eq!(
            codec.verify(&issued.serialized).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn test_any_changed_character_fails_signature() {
        let codec = codec(Arc::new(ManualClock::new(1_700_000_000_000)));
        let issued = codec
            .issue(&"u1".into(), &ids(&["d1"]), AccessCategory::Share, 1)
            .unwrap();

        for (idx, original) in issued.serialized.char_indices() {
            if original == '.' {
                continue;
            }
            let replacement = if original == 'A' { "B" } else { "A" };
            let mut tampered = issued.serialized.clone();
            tampered.replace_range(idx..idx + 1, replacement);

            assert_eq!(
                codec.verify(&tampered).unwrap_err(),
                TokenError::SignatureInvalid,
                "position {}",
                idx
            );
        }
    }

    #[test]
    fn test_wrong_segment_count_is_malformed() {
        let codec = codec(Arc::new(ManualClock::new(0)));
        for serialized in ["a.b", "a.b.c.d", ""] {
            assert!(matches!(
                codec.verify(serialized),
                Err(TokenError::Malformed(_))
            ));
        }
    }

    #[test]
    fn test_unaligned_clock_keeps_full_duration() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_750));
        let codec = codec(clock.clone());
        let issued = codec
            .issue(&"u1".into(), &ids(&["d1"]), AccessCategory::Share, 1)
            .unwrap();

        assert_eq!(issued.issued_at, 1_700_000_000_750);
        assert_eq!(issued.expires_at, 1_700_000_000_750 + HOUR_MILLIS + 250);

        clock.set(issued.issued_at + HOUR_MILLIS);
        assert!(codec.verify(&issued.serialized).is_ok());

        clock.set(issued.expires_at);
        assert_eq!(
            codec.verify(&issued.serialized).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn test_other_secret_fails_signature() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let issued = codec(clock.clone())
            .issue(&"u1".into(), &[], AccessCategory::Share, 1)
            .unwrap();

        let other = AccessTokenCodec::new(&SigningSecret::from_bytes(vec![6; 32]), clock);
        assert_eq!(
            other.verify(&issued.serialized).unwrap_err(),
            TokenError::SignatureInvalid
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = codec(Arc::new(ManualClock::new(0)));
        assert!(matches!(
            codec.verify("not-a-token"),
            Err(TokenError::Malformed(_))
        ));
    }

    proptest! {
        #[test]
        fn issued_tokens_verify(
            subject in "[a-z0-9]{1,12}",
            docs in proptest::collection::vec("[a-z0-9]{1,8}", 0..6),
            hours in 1u32..=MAX_TOKEN_HOURS,
        ) {
            let codec = codec(Arc::new(ManualClock::new(1_700_000_000_000)));
            let doc_ids: Vec<DocumentId> = docs.iter().map(|d| DocumentId::from(d.as_str())).collect();
            let issued = codec
                .issue(&subject.as_str().into(), &doc_ids, AccessCategory::Share, hours)
                .unwrap();
            let token = codec.verify(&issued.serialized).unwrap();
            prop_assert_eq!(token.subject_id.as_str(), subject.as_str());
            prop_assert_eq!(token.document_ids, dedup_ids(&doc_ids));
        }
    }
}
