//! Retrying JSON calls shared by both remote systems (asset feed and catalog).
//!
//! One request per attempt; transient failures back off exponentially from a
//! configured base with no jitter. Application-level error payloads inside an
//! otherwise-200 response count as transient too, which is how query-language
//! `errors` arrays get the same retry treatment as a 503.

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::error::SyncError;

/// HTTP statuses worth another attempt.
pub const RETRYABLE_STATUS: [u16; 5] = [429, 500, 502, 503, 504];

/// Shared HTTP client; one connection pool serves both remote systems.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, SyncError> {
    reqwest::Client::builder()
        .user_agent(concat!("shopmedia-sync/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| SyncError::config(format!("failed to build HTTP client: {e}")))
}

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS.contains(&status)
}

/// Attempt budget and backoff base for one logical call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `n` (1-based): `base * 2^(n-1)`.
    pub fn delay_before(&self, retry_number: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry_number.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Issue a JSON request with retries, returning the decoded body.
///
/// `build_request` is called once per attempt because a request builder is
/// consumed on send. `app_errors` inspects a decoded 2xx body and returns a
/// message when the payload itself reports failure; such responses are
/// retried like any transient error.
///
/// Fails immediately on non-retryable HTTP statuses and on 2xx bodies that do
/// not decode as JSON; fails with the last seen status/message once the
/// attempt budget is spent.
pub async fn call_json<B, E>(
    policy: &RetryPolicy,
    operation: &str,
    build_request: B,
    app_errors: E,
) -> Result<Value, SyncError>
where
    B: Fn() -> reqwest::RequestBuilder,
    E: Fn(&Value) -> Option<String>,
{
    let mut last_status: Option<u16> = None;
    let mut last_failure = String::from("no attempt made");

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            let delay = policy.delay_before(attempt - 1);
            warn!(
                operation,
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                last_failure = %last_failure,
                "retrying after transient failure"
            );
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                last_status = Some(status);
                if response.status().is_success() {
                    let body: Value = response.json().await.map_err(|e| {
                        SyncError::remote(operation, Some(status), format!("invalid JSON body: {e}"))
                    })?;
                    match app_errors(&body) {
                        None => return Ok(body),
                        Some(message) => last_failure = message,
                    }
                } else if is_retryable_status(status) {
                    last_failure = format!("HTTP {status}");
                } else {
                    let body = response.text().await.unwrap_or_default();
                    return Err(SyncError::remote(
                        operation,
                        Some(status),
                        format!("HTTP {status}: {}", snippet(&body)),
                    ));
                }
            }
            Err(e) => {
                last_status = e.status().map(|s| s.as_u16());
                last_failure = e.to_string();
            }
        }
    }

    Err(SyncError::remote(
        operation,
        last_status,
        format!(
            "gave up after {} attempts: {last_failure}",
            policy.max_attempts
        ),
    ))
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() > 300 {
        let head: String = trimmed.chars().take(300).collect();
        format!("{head}...")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[test]
    fn test_default_policy_matches_documented_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_before(1), Duration::from_millis(500));
        assert_eq!(policy.delay_before(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_before(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_retryable_status_set() {
        for status in RETRYABLE_STATUS {
            assert!(is_retryable_status(status));
        }
        assert!(!is_retryable_status(200));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(404));
    }

    fn http_json(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn http_status(code: u16, reason: &str) -> String {
        format!("HTTP/1.1 {code} {reason}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
    }

    /// Serve one canned response per connection, counting connections.
    async fn serve_scripted(responses: Vec<String>) -> (SocketAddr, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_inner = hits.clone();
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                hits_inner.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (addr, hits)
    }

    fn tiny_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_two_503s_then_success_retries_with_doubling_delays() {
        let (addr, hits) = serve_scripted(vec![
            http_status(503, "Service Unavailable"),
            http_status(503, "Service Unavailable"),
            http_json(r#"{"ok":true}"#),
        ])
        .await;

        let client = reqwest::Client::new();
        let url = format!("http://{addr}/");
        let started = Instant::now();
        let body = call_json(&tiny_policy(3), "fixture", || client.get(&url), |_| None)
            .await
            .unwrap();
        // Two delayed retries: base then base*2.
        assert!(started.elapsed() >= Duration::from_millis(15));
        assert_eq!(body["ok"], true);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_surface_remote_call_error() {
        let (addr, hits) = serve_scripted(vec![
            http_status(503, "Service Unavailable"),
            http_status(503, "Service Unavailable"),
            http_status(503, "Service Unavailable"),
        ])
        .await;

        let client = reqwest::Client::new();
        let url = format!("http://{addr}/");
        let err = call_json(&tiny_policy(3), "fixture", || client.get(&url), |_| None)
            .await
            .unwrap_err();
        match err {
            SyncError::RemoteCall { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_status_fails_on_first_attempt() {
        let (addr, hits) = serve_scripted(vec![http_status(404, "Not Found")]).await;

        let client = reqwest::Client::new();
        let url = format!("http://{addr}/");
        let err = call_json(&tiny_policy(3), "fixture", || client.get(&url), |_| None)
            .await
            .unwrap_err();
        match err {
            SyncError::RemoteCall { status, .. } => assert_eq!(status, Some(404)),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_app_level_errors_are_retried_then_recovered() {
        let (addr, hits) = serve_scripted(vec![
            http_json(r#"{"errors":[{"message":"throttled"}]}"#),
            http_json(r#"{"data":{"fine":1}}"#),
        ])
        .await;

        let client = reqwest::Client::new();
        let url = format!("http://{addr}/");
        let body = call_json(
            &tiny_policy(3),
            "fixture",
            || client.get(&url),
            |v| {
                v.get("errors")
                    .and_then(|e| e.as_array())
                    .filter(|a| !a.is_empty())
                    .map(|a| format!("{} application error(s)", a.len()))
            },
        )
        .await
        .unwrap();
        assert_eq!(body["data"]["fine"], 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
