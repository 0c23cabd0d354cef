use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::client::{is_terminal, SessionClient, SessionStatus, PHASE_POLL_TIMEOUT};

/// Fixed extension added to the poll timeout before giving up.
const GRACE_BUFFER: Duration = Duration::from_secs(120);

/// Poll session status until a terminal phase is reached.
///
/// Transient request failures are logged and retried on the next
/// interval; only the computed deadline ends the loop without a
/// terminal phase.
pub async fn poll_session(
    client: &SessionClient,
    name: &str,
    poll_interval_secs: u64,
    timeout_minutes: u64,
) -> SessionStatus {
    info!(
        "Polling session {} every {}s (timeout: {}m + 2m buffer)",
        name, poll_interval_secs, timeout_minutes
    );
    let deadline = Instant::now() + Duration::from_secs(timeout_minutes * 60) + GRACE_BUFFER;
    poll_session_until(client, name, poll_interval_secs, deadline).await
}

/// Poll loop with an explicit deadline.
pub async fn poll_session_until(
    client: &SessionClient,
    name: &str,
    poll_interval_secs: u64,
    deadline: Instant,
) -> SessionStatus {
    while Instant::now() < deadline {
        match client.get_session_status(name).await {
            Ok(status) => {
                let phase = if status.phase.is_empty() {
                    "Unknown"
                } else {
                    status.phase.as_str()
                };
                info!("Session {}: phase={}", name, phase);

                if is_terminal(&status.phase) {
                    return status;
                }
            }
            Err(e) => {
                warn!("Poll request failed (will retry): {}", e);
            }
        }

        tokio::time::sleep(Duration::from_secs(poll_interval_secs)).await;
    }

    error!("Polling timed out waiting for session completion");
    SessionStatus {
        phase: PHASE_POLL_TIMEOUT.to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SessionClient;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn stops_on_terminal_phase_after_two_intervals() {
        let mut server = mockito::Server::new_async().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mock = server
            .mock("GET", "/projects/demo/agentic-sessions/s1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    br#"{"status":{"phase":"Running"}}"#.to_vec()
                } else {
                    br#"{"status":{"phase":"Completed","result":"ok","completionTime":"2025-01-01T00:00:00Z"}}"#
                        .to_vec()
                }
            })
            .expect(3)
            .create_async()
            .await;

        let client = SessionClient::new(&server.url(), "tok", "demo", true).unwrap();
        let status = poll_session(&client, "s1", 0, 0).await;

        assert_eq!(status.phase, "Completed");
        assert_eq!(status.result, "ok");
        assert_eq!(status.completion_time, "2025-01-01T00:00:00Z");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn transient_failures_do_not_abort_the_loop() {
        let mut server = mockito::Server::new_async().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mock = server
            .mock("GET", "/projects/demo/agentic-sessions/s1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    // Unparseable body stands in for a transient failure.
                    b"not json".to_vec()
                } else {
                    br#"{"status":{"phase":"Stopped"}}"#.to_vec()
                }
            })
            .expect(2)
            .create_async()
            .await;

        let client = SessionClient::new(&server.url(), "tok", "demo", true).unwrap();
        let status = poll_session(&client, "s1", 0, 0).await;

        assert_eq!(status.phase, "Stopped");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn expired_deadline_returns_poll_timeout_sentinel() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/projects/demo/agentic-sessions/s1")
            .expect(0)
            .create_async()
            .await;

        let client = SessionClient::new(&server.url(), "tok", "demo", true).unwrap();
        let status = poll_session_until(&client, "s1", 0, Instant::now()).await;

        assert_eq!(status.phase, PHASE_POLL_TIMEOUT);
        assert_eq!(status.result, "");
        assert_eq!(status.completion_time, "");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_terminal_phases_keep_polling() {
        let mut server = mockito::Server::new_async().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        server
            .mock("GET", "/projects/demo/agentic-sessions/s1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body_from_request(move |_| {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 => br#"{"status":{"phase":"Pending"}}"#.to_vec(),
                    1 => br#"{"status":{}}"#.to_vec(),
                    _ => br#"{"status":{"phase":"Failed","result":"crashed"}}"#.to_vec(),
                }
            })
            .expect(3)
            .create_async()
            .await;

        let client = SessionClient::new(&server.url(), "tok", "demo", true).unwrap();
        let status = poll_session(&client, "s1", 0, 0).await;

        assert_eq!(status.phase, "Failed");
        assert_eq!(status.result, "crashed");
    }
}
