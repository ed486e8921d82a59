//! The external ledger that records access grants.
//!
//! The ledger is the authority on a grant's id and expiry. The Vault only asks
//! it to issue a grant and stores what it answers.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use medvault_core::{AccessCategory, GrantId, ResponderMeta};

use crate::error::LedgerError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Access level recorded with a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    /// Emergency categories only.
    Emergency,
    /// Everything the credential names.
    Full,
}

impl From<AccessCategory> for AccessLevel {
    fn from(category: AccessCategory) -> Self {
        match category {
            AccessCategory::Emergency => AccessLevel::Emergency,
            AccessCategory::Share => AccessLevel::Full,
        }
    }
}

/// A request to record a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    /// DID of the subject whose documents are disclosed.
    pub subject_did: String,

    /// On-chain address of the responder, when known.
    pub responder_address: Option<String>,

    pub responder: ResponderMeta,
    pub duration_seconds: u64,
    pub access_level: AccessLevel,
    pub location: Option<String>,
}

/// The ledger's answer to a grant request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerGrant {
    pub grant_id: GrantId,

    /// Unix ms.
    pub expires_at: i64,
}

/// Ledger trait for recording access grants.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Record a grant and return its id and expiry.
    async fn issue_grant(&self, request: &GrantRequest) -> Result<LedgerGrant>;
}

#[async_trait]
impl<T: Ledger + ?Sized> Ledger for std::sync::Arc<T> {
    async fn issue_grant(&self, request: &GrantRequest) -> Result<LedgerGrant> {
        (**self).issue_grant(request).await
    }
}

/// An in-memory ledger for testing.
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use medvault_core::Clock;

    /// Issues sequential grant ids and remembers every request.
    pub struct MemoryLedger {
        clock: Arc<dyn Clock>,
        next_id: AtomicU64,
        requests: Mutex<Vec<GrantRequest>>,
        failure: Mutex<Option<LedgerError>>,
        delay: Mutex<Option<Duration>>,
    }

    impl MemoryLedger {
        /// Create a ledger whose grant expiries follow `clock`.
        pub fn new(clock: Arc<dyn Clock>) -> Self {
            Self {
                clock,
                next_id: AtomicU64::new(1),
                requests: Mutex::new(Vec::new()),
                failure: Mutex::new(None),
                delay: Mutex::new(None),
            }
        }

        /// Fail every subsequent call with `failure`, or stop failing with `None`.
        pub fn fail_with(&self, failure: Option<LedgerError>) {
            if let Ok(mut slot) = self.failure.lock() {
                *slot = failure;
            }
        }

        /// Sleep this long before answering.
        pub fn set_delay(&self, delay: Option<Duration>) {
            if let Ok(mut slot) = self.delay.lock() {
                *slot = delay;
            }
        }

        /// Number of `issue_grant` calls, including failed ones.
        pub fn call_count(&self) -> usize {
            self.requests.lock().map(|r| r.len()).unwrap_or(0)
        }

        /// Every request received, oldest first.
        pub fn requests(&self) -> Vec<GrantRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Ledger for MemoryLedger {
        async fn issue_grant(&self, request: &GrantRequest) -> Result<LedgerGrant> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }

            let delay = self.delay.lock().ok().and_then(|d| *d);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let failure = self.failure.lock().ok().and_then(|f| f.clone());
            if let Some(failure) = failure {
                return Err(failure);
            }

            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(LedgerGrant {
                grant_id: GrantId::new(format!("grant-{}", id)),
                expires_at: self.clock.now_millis() + request.duration_seconds as i64 * 1000,
            })
        }
    }
}

/// Endpoint and limits for [`HttpLedger`].
#[derive(Debug, Clone)]
pub struct HttpLedgerConfig {
    /// Base URL of the ledger relay.
    pub rpc_url: String,

    /// Client-level timeout per request.
    pub timeout: Duration,
}

impl Default for HttpLedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Ledger reached over a JSON HTTP relay.
///
/// `issue_grant` posts the request to `{rpc_url}/grants` and expects
/// `{"grantId": ..., "expiresAt": ...}` back. 4xx answers are rejections,
/// everything else that fails is unavailability.
#[derive(Debug, Clone)]
pub struct HttpLedger {
    client: reqwest::Client,
    config: HttpLedgerConfig,
}

impl HttpLedger {
    /// Build a ledger client with its own HTTP client.
    pub fn new(config: HttpLedgerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LedgerError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    /// Build a ledger client over an existing HTTP client.
    pub fn with_client(client: reqwest::Client, config: HttpLedgerConfig) -> Self {
        Self { client, config }
    }

    fn grants_url(&self) -> String {
        format!("{}/grants", self.config.rpc_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn issue_grant(&self, request: &GrantRequest) -> Result<LedgerGrant> {
        let response = self
            .client
            .post(self.grants_url())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Timeout(self.config.timeout)
                } else {
                    LedgerError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(LedgerError::Unavailable(format!("status {}", status)));
        }

        response
            .json::<LedgerGrant>()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryLedger;
    use super::*;
    use medvault_core::ManualClock;
    use std::sync::Arc;

    fn request() -> GrantRequest {
        GrantRequest {
            subject_did: "did:example:u1".into(),
            responder_address: None,
            responder: ResponderMeta::named("Dr. A"),
            duration_seconds: 3600,
            access_level: AccessCategory::Emergency.into(),
            location: None,
        }
    }

    #[tokio::test]
    async fn test_memory_ledger_issues_sequential_grants() {
        let ledger = MemoryLedger::new(Arc::new(ManualClock::new(1_000)));

        let first = ledger.issue_grant(&request()).await.unwrap();
        let second = ledger.issue_grant(&request()).await.unwrap();

        assert_eq!(first.grant_id.as_str(), "grant-1");
        assert_eq!(second.grant_id.as_str(), "grant-2");
        assert_eq!(first.expires_at, 1_000 + 3_600_000);
        assert_eq!(ledger.call_count(), 2);
    }

    #[tokio::test]
    async fn test_memory_ledger_failure_switch() {
        let ledger = MemoryLedger::new(Arc::new(ManualClock::new(0)));
        ledger.fail_with(Some(LedgerError::Unavailable("down".into())));
        assert!(ledger.issue_grant(&request()).await.is_err());

        ledger.fail_with(None);
        assert!(ledger.issue_grant(&request()).await.is_ok());
        assert_eq!(ledger.call_count(), 2);
    }

    #[test]
    fn test_grant_request_wire_format() {
        let json = serde_json::to_value(request()).unwrap();
        assert_eq!(json["subjectDid"], "did:example:u1");
        assert_eq!(json["accessLevel"], "EMERGENCY");
        assert_eq!(json["durationSeconds"], 3600);

        let grant: LedgerGrant =
            serde_json::from_str(r#"{"grantId":"0x1f","expiresAt":42}"#).unwrap();
        assert_eq!(grant.grant_id.as_str(), "0x1f");
        assert_eq!(grant.expires_at, 42);
    }

    #[test]
    fn test_http_grants_url() {
        let ledger = HttpLedger::new(HttpLedgerConfig {
            rpc_url: "http://ledger.local/".into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(ledger.grants_url(), "http://ledger.local/grants");
    }
}
