//! Status-code handling of the HTTP blob transport and ledger client,
//! against a local server that answers each request with a canned response.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use medvault::blob::{BlobError, BlobTransport, HttpBlobConfig, HttpBlobTransport, StorageError};
use medvault::core::{AccessCategory, ResponderMeta};
use medvault::ledger::{GrantRequest, HttpLedger, HttpLedgerConfig, Ledger};
use medvault::LedgerError;

/// Accept one connection, read the whole request, answer with `status` and
/// `body`. The handle yields the request line.
async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let head = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();

        head.lines().next().unwrap_or_default().to_string()
    });

    (base_url, handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);

        let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
        let complete = if head.contains("transfer-encoding: chunked") {
            data.ends_with(b"0\r\n\r\n")
        } else {
            data.len() >= end + 4 + content_length(&head)
        };
        if complete {
            return head;
        }
    }
    String::from_utf8_lossy(&data).to_ascii_lowercase()
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn blob_transport(base_url: &str) -> HttpBlobTransport {
    HttpBlobTransport::with_client(
        client(),
        HttpBlobConfig {
            api_url: base_url.to_string(),
            gateway_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
        },
    )
}

fn ledger(base_url: &str) -> HttpLedger {
    HttpLedger::with_client(
        client(),
        HttpLedgerConfig {
            rpc_url: base_url.to_string(),
            timeout: Duration::from_secs(5),
        },
    )
}

fn grant_request() -> GrantRequest {
    GrantRequest {
        subject_did: "did:example:u1".into(),
        responder_address: None,
        responder: ResponderMeta::named("Dr. A"),
        duration_seconds: 3600,
        access_level: AccessCategory::Emergency.into(),
        location: Some("Station 12".into()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Blob transport
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_blob_put_returns_pinned_hash() {
    let (base_url, server) =
        serve_once("200 OK", r#"{"Name":"blob","Hash":"QmAbc","Size":"12"}"#).await;

    let address = blob_transport(&base_url)
        .put(Bytes::from_static(b"ciphertext"))
        .await
        .unwrap();

    assert_eq!(address, "QmAbc");
    assert!(server
        .await
        .unwrap()
        .starts_with("post /api/v0/add?pin=true "));
}

#[tokio::test]
async fn test_blob_put_server_error_is_status() {
    let (base_url, _server) = serve_once("502 Bad Gateway", "").await;

    let err = blob_transport(&base_url)
        .put(Bytes::from_static(b"ciphertext"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Status { status: 502, .. }));
}

#[tokio::test]
async fn test_blob_get_returns_body() {
    let (base_url, server) = serve_once("200 OK", "opaque").await;

    let data = blob_transport(&base_url).get("bafy1").await.unwrap();

    assert_eq!(data, Bytes::from_static(b"opaque"));
    assert!(server.await.unwrap().starts_with("get /ipfs/bafy1 "));
}

#[tokio::test]
async fn test_blob_get_missing_is_not_found() {
    let (base_url, _server) = serve_once("404 Not Found", "").await;

    let err = blob_transport(&base_url).get("bafy1").await.unwrap_err();

    assert!(matches!(&err, StorageError::NotFound(address) if address == "bafy1"));
}

#[tokio::test]
async fn test_blob_get_server_error_is_retryable() {
    let (base_url, _server) = serve_once("500 Internal Server Error", "boom").await;

    let err = blob_transport(&base_url).get("bafy1").await.unwrap_err();

    assert!(matches!(err, StorageError::Status { status: 500, .. }));
    assert!(BlobError::from(err).is_retryable());
}

#[tokio::test]
async fn test_blob_put_unparseable_answer_is_invalid_response() {
    let (base_url, _server) = serve_once("200 OK", r#"{"Name":"blob"}"#).await;

    let err = blob_transport(&base_url)
        .put(Bytes::from_static(b"ciphertext"))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::InvalidResponse(_)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Ledger
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ledger_success_returns_grant() {
    let (base_url, server) =
        serve_once("201 Created", r#"{"grantId":"0x1f","expiresAt":42}"#).await;

    let grant = ledger(&base_url).issue_grant(&grant_request()).await.unwrap();

    assert_eq!(grant.grant_id.as_str(), "0x1f");
    assert_eq!(grant.expires_at, 42);
    assert!(server.await.unwrap().starts_with("post /grants "));
}

#[tokio::test]
async fn test_ledger_client_error_is_rejection() {
    let (base_url, _server) = serve_once("400 Bad Request", "responder unknown").await;

    let err = ledger(&base_url)
        .issue_grant(&grant_request())
        .await
        .unwrap_err();

    assert!(matches!(&err, LedgerError::Rejected(message) if message.contains("responder unknown")));
}

#[tokio::test]
async fn test_ledger_server_error_is_unavailable() {
    let (base_url, _server) = serve_once("503 Service Unavailable", "").await;

    let err = ledger(&base_url)
        .issue_grant(&grant_request())
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Unavailable(_)));
}

#[tokio::test]
async fn test_ledger_bad_json_is_invalid_response() {
    let (base_url, _server) = serve_once("200 OK", "not json").await;

    let err = ledger(&base_url)
        .issue_grant(&grant_request())
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_ledger_unreachable_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let err = ledger(&base_url)
        .issue_grant(&grant_request())
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Unavailable(_)));
}
