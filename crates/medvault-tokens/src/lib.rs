//! # MedVault Tokens
//!
//! Credentials that let a third party read a subject's documents.
//!
//! Two signing disciplines are kept as separate types:
//!
//! - [`AccessTokenCodec`] - JWT (HS256) access tokens with a caller-chosen
//!   lifetime of 1 to 720 hours, for routine sharing or emergencies
//! - [`EnvelopeSigner`] - HMAC-SHA256 signed emergency envelopes, valid for
//!   24 hours, meant to be printed as a QR code
//!
//! [`TokenAuthority`] composes both with a [`medvault_store::DataStore`]:
//! every issued credential is recorded, and verification consults the record
//! so a subject can revoke a credential before it expires. A credential
//! without a record is rejected as revoked.

pub mod access;
pub mod authority;
pub mod emergency;
pub mod error;
pub mod secret;

pub use access::{AccessToken, AccessTokenCodec, IssuedToken, MAX_TOKEN_HOURS};
pub use authority::{is_access_token_shape, TokenAuthority, VerifiedCredential};
pub use emergency::{EmergencyEnvelope, EnvelopeSigner, IssuedEnvelope, ENVELOPE_TTL_MILLIS};
pub use error::{AuthorityError, EnvelopeError, Result, TokenError};
pub use secret::SigningSecret;
