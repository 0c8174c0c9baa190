//! Mock HTTP server for streaming and REST endpoints.
//!
//! Wraps wiremock. Streaming bodies are served in full and then end, which a
//! stream consumer sees as silence after the last line.

use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A mock API server for stream consumers.
pub struct MockStreamServer {
    server: MockServer,
}

impl MockStreamServer {
    /// Start a new mock server.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL of the mock server.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Absolute URL for a path on the mock server.
    #[must_use]
    pub fn url(&self, request_path: &str) -> String {
        format!("{}{request_path}", self.server.uri())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Response Setup
    // ─────────────────────────────────────────────────────────────────────────────

    /// Serve `lines` as a `\r\n`-delimited body for `http_method` on
    /// `request_path`.
    pub async fn stream_lines(&self, http_method: &str, request_path: &str, lines: &[&str]) {
        Mock::given(method(http_method))
            .and(path(request_path))
            .respond_with(stream_response(lines))
            .mount(&self.server)
            .await;
    }

    /// Like [`stream_lines`](Self::stream_lines), but only for requests whose
    /// body is exactly `expected_body`.
    pub async fn stream_lines_for_body(
        &self,
        http_method: &str,
        request_path: &str,
        expected_body: &str,
        lines: &[&str],
    ) {
        Mock::given(method(http_method))
            .and(path(request_path))
            .and(body_string(expected_body))
            .respond_with(stream_response(lines))
            .mount(&self.server)
            .await;
    }

    /// Serve an empty `200` body: the stream opens and never yields a line.
    pub async fn stream_empty(&self, http_method: &str, request_path: &str) {
        Mock::given(method(http_method))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    /// Respond to any request on `request_path` with an error status.
    pub async fn expect_error(&self, request_path: &str, status: u16, body: &str) {
        Mock::given(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────────

    /// All received requests.
    pub async fn received_requests(&self) -> Vec<wiremock::Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Received requests to `request_path`.
    pub async fn requests_to(&self, request_path: &str) -> Vec<wiremock::Request> {
        self.received_requests()
            .await
            .into_iter()
            .filter(|r| r.url.path() == request_path)
            .collect()
    }

    /// Verify that at least one request was received to the given path.
    ///
    /// # Panics
    ///
    /// Panics if no matching request was found.
    pub async fn assert_received(&self, request_path: &str) {
        let received = self.received_requests().await;
        assert!(
            received.iter().any(|r| r.url.path() == request_path),
            "No request received to path '{}'. Received: {:?}",
            request_path,
            received.iter().map(|r| r.url.path()).collect::<Vec<_>>()
        );
    }
}

fn stream_response(lines: &[&str]) -> ResponseTemplate {
    let mut body = lines.join("\r\n");
    body.push_str("\r\n");
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "application/json")
}
