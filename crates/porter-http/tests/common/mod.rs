//! Common test utilities for connector testing.

#![allow(dead_code)]

use std::sync::Once;
use std::time::Duration;

use porter_http::{Connector, TransferOptions};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

static TRACING: Once = Once::new();

/// Install a test tracing subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Connector with the given options and a fresh pooled client.
pub fn connector(options: TransferOptions) -> Connector {
    init_tracing();
    Connector::builder()
        .options(options)
        .build()
        .expect("Failed to build connector")
}

/// HTTP mock server wrapper with convenience methods
pub struct TestHttpServer {
    server: MockServer,
}

impl TestHttpServer {
    /// Start a new mock server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get URL for a specific path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.server.uri(), path)
    }

    /// Access the underlying MockServer
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Register an endpoint returning `status` with a text body
    pub async fn respond(&self, endpoint: &str, status: u16, body: &str) {
        Mock::given(path(endpoint))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    /// Register a redirect from `endpoint` to `location`
    pub async fn redirect(&self, endpoint: &str, status: u16, location: &str) {
        Mock::given(path(endpoint))
            .respond_with(ResponseTemplate::new(status).insert_header("Location", location))
            .mount(&self.server)
            .await;
    }

    /// Register a method-specific endpoint
    pub async fn route(&self, verb: &str, endpoint: &str, response: ResponseTemplate) {
        Mock::given(method(verb))
            .and(path(endpoint))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Register an endpoint with simulated latency
    pub async fn with_latency(&self, endpoint: &str, latency: Duration) {
        Mock::given(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_delay(latency))
            .mount(&self.server)
            .await;
    }

    /// Get all requests received at `endpoint`
    pub async fn received_at(&self, endpoint: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == endpoint)
            .collect()
    }
}

/// URL of a local port nothing listens on.
pub fn unused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No local address").port();
    drop(listener);
    format!("http://127.0.0.1:{port}/")
}
