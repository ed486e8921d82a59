//! Runtime configuration and secret loading.

use std::time::Duration;

use medvault_core::MasterSecret;
use medvault_tokens::SigningSecret;

use crate::error::ConfigError;

/// Environment variable holding the hex master secret.
pub const MASTER_SECRET_ENV: &str = "MEDVAULT_MASTER_SECRET";

/// Environment variable holding the hex signing secret.
pub const SIGNING_SECRET_ENV: &str = "MEDVAULT_SIGNING_SECRET";

/// Optional environment variable holding a dedicated hex envelope secret.
pub const ENVELOPE_SECRET_ENV: &str = "MEDVAULT_ENVELOPE_SECRET";

/// Configuration for the Vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Documents decrypted in parallel per disclosure.
    pub disclosure_concurrency: usize,

    /// Timeout for each blob store call.
    pub blob_timeout: Duration,

    /// Timeout for each ledger call.
    pub ledger_timeout: Duration,

    /// Lifetime requested for each ledger grant.
    pub grant_duration: Duration,

    /// Bound of the intake job queue.
    pub intake_queue_capacity: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            disclosure_concurrency: 4,
            blob_timeout: Duration::from_secs(30),
            ledger_timeout: Duration::from_secs(30),
            grant_duration: Duration::from_secs(60 * 60),
            intake_queue_capacity: 64,
        }
    }
}

/// Long-lived secrets, loaded once at startup.
#[derive(Debug, Clone)]
pub struct VaultSecrets {
    /// Root of every document and DID document key.
    pub master: MasterSecret,

    /// Signs access tokens, and envelopes unless `envelope` is set.
    pub signing: SigningSecret,

    /// Dedicated envelope signing secret.
    pub envelope: Option<SigningSecret>,
}

impl VaultSecrets {
    /// Build from raw bytes. Each secret must be at least 32 bytes.
    pub fn from_bytes(master: Vec<u8>, signing: Vec<u8>) -> Result<Self, ConfigError> {
        Ok(Self {
            master: MasterSecret::from_bytes_checked(master)
                .map_err(|source| ConfigError::invalid(MASTER_SECRET_ENV, source))?,
            signing: SigningSecret::from_bytes_checked(signing)
                .map_err(|source| ConfigError::invalid(SIGNING_SECRET_ENV, source))?,
            envelope: None,
        })
    }

    /// Build from hex strings.
    pub fn from_hex(master: &str, signing: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            master: MasterSecret::from_hex(master)
                .map_err(|source| ConfigError::invalid(MASTER_SECRET_ENV, source))?,
            signing: SigningSecret::from_hex(signing)
                .map_err(|source| ConfigError::invalid(SIGNING_SECRET_ENV, source))?,
            envelope: None,
        })
    }

    /// Sign envelopes with a dedicated secret.
    pub fn with_envelope_secret(mut self, envelope: SigningSecret) -> Self {
        self.envelope = Some(envelope);
        self
    }

    /// Load hex secrets from `MEDVAULT_MASTER_SECRET`, `MEDVAULT_SIGNING_SECRET`
    /// and the optional `MEDVAULT_ENVELOPE_SECRET`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load hex secrets through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let master = lookup(MASTER_SECRET_ENV).ok_or(ConfigError::Missing(MASTER_SECRET_ENV))?;
        let signing =
            lookup(SIGNING_SECRET_ENV).ok_or(ConfigError::Missing(SIGNING_SECRET_ENV))?;
        let secrets = Self::from_hex(&master, &signing)?;

        match lookup(ENVELOPE_SECRET_ENV).filter(|v| !v.trim().is_empty()) {
            Some(envelope) => {
                let envelope = SigningSecret::from_hex(&envelope)
                    .map_err(|source| ConfigError::invalid(ENVELOPE_SECRET_ENV, source))?;
                Ok(secrets.with_envelope_secret(envelope))
            }
            None => Ok(secrets),
        }
    }
}
